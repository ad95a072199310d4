use crate::core::connection::Connection;
use crate::representation::{ConnectPoint, DeviceID, Link};
use crate::util::flow::Flow;
use bytes::Bytes;
use std::fmt::{Debug, Formatter};

/// Everything the control loop reacts to, one at a time and in arrival order.
pub enum CoreEvent {
    /// Switch features received on a fresh control channel.
    DeviceAdded {
        device: DeviceID,
        connection: Box<dyn Connection>,
    },
    DeviceLost(DeviceID),
    LinkDetected(Link),
    LinkLost(Link),
    PacketReceived(PacketReceived),
    FlowRemoved {
        device: DeviceID,
        flow: Flow,
    },
    FlowStats {
        device: DeviceID,
        flows: Vec<Flow>,
    },
    Poll,
}

impl Debug for CoreEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CoreEvent::DeviceAdded { device, .. } => write!(f, "DeviceAdded({})", device),
            CoreEvent::DeviceLost(device) => write!(f, "DeviceLost({})", device),
            CoreEvent::LinkDetected(link) => write!(f, "LinkDetected({:?} -> {:?})", link.src, link.dst),
            CoreEvent::LinkLost(link) => write!(f, "LinkLost({:?} -> {:?})", link.src, link.dst),
            CoreEvent::PacketReceived(p) => write!(f, "PacketReceived({:?}, {} bytes)", p.from, p.packet.len()),
            CoreEvent::FlowRemoved { device, flow } => {
                write!(f, "FlowRemoved({}, priority {})", device, flow.priority)
            }
            CoreEvent::FlowStats { device, flows } => {
                write!(f, "FlowStats({}, {} flows)", device, flows.len())
            }
            CoreEvent::Poll => write!(f, "Poll"),
        }
    }
}

/// A packet-in. `buffer_id` is `None` when the switch did not buffer it.
#[derive(Debug, Clone)]
pub struct PacketReceived {
    pub packet: Bytes,
    pub from: ConnectPoint,
    pub buffer_id: Option<u32>,
}
