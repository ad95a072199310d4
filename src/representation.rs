use crate::util::MAC;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::net::Ipv4Addr;

/// Datapath identifier of a switch.
#[derive(Hash, Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Ord, PartialOrd)]
pub struct DeviceID(pub u64);

impl Display for DeviceID {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Eq, Hash, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectPoint {
    pub device: DeviceID,
    pub port: u32,
}

impl Debug for ConnectPoint {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{:?}[{}]", self.device, self.port)
    }
}

/// A bidirectional switch-to-switch link, reported once per direction by
/// discovery. Both directions land in the same adjacency entries.
#[derive(Eq, Hash, Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub src: ConnectPoint,
    pub dst: ConnectPoint,
}

impl Link {
    pub fn new(src: DeviceID, src_port: u32, dst: DeviceID, dst_port: u32) -> Link {
        Link {
            src: ConnectPoint {
                device: src,
                port: src_port,
            },
            dst: ConnectPoint {
                device: dst,
                port: dst_port,
            },
        }
    }
}

#[derive(Eq, Hash, Copy, Clone, Debug, PartialEq)]
pub struct Host {
    pub ip: Ipv4Addr,
    pub mac: MAC,
    pub location: ConnectPoint,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Core,
    Aggregation,
    Edge,
}
