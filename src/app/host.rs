use crate::representation::{ConnectPoint, DeviceID, Host};
use crate::util::MAC;
use log::info;
use std::collections::HashMap;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LearnResult {
    Added,
    Refreshed,
    Moved { from: ConnectPoint },
}

/// IP to attachment point. Last write wins; entries never expire.
#[derive(Debug, Default)]
pub struct HostRegistry {
    hosts: HashMap<Ipv4Addr, Host>,
}

impl HostRegistry {
    pub fn new() -> HostRegistry {
        Default::default()
    }

    pub fn learn(&mut self, ip: Ipv4Addr, mac: MAC, location: ConnectPoint) -> LearnResult {
        let host = Host { ip, mac, location };
        match self.hosts.insert(ip, host) {
            None => {
                info!(target:"host", "host {} ({}) at {:?}", ip, mac, location);
                LearnResult::Added
            }
            Some(old) if old.location == location => LearnResult::Refreshed,
            Some(old) => {
                info!(target:"host", "host {} moved {:?} -> {:?}", ip, old.location, location);
                LearnResult::Moved { from: old.location }
            }
        }
    }

    pub fn lookup(&self, ip: Ipv4Addr) -> Option<&Host> {
        self.hosts.get(&ip)
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.hosts.contains_key(&ip)
    }

    pub fn hosts_at(&self, device: DeviceID) -> impl Iterator<Item = &Host> {
        self.hosts
            .values()
            .filter(move |h| h.location.device == device)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cp(device: u64, port: u32) -> ConnectPoint {
        ConnectPoint {
            device: DeviceID(device),
            port,
        }
    }

    #[test]
    fn last_write_wins() {
        let mut registry = HostRegistry::new();
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        let mac = MAC([0, 0, 0, 0, 0, 1]);
        assert_eq!(registry.learn(ip, mac, cp(13, 1)), LearnResult::Added);
        assert_eq!(registry.learn(ip, mac, cp(13, 1)), LearnResult::Refreshed);
        assert_eq!(
            registry.learn(ip, mac, cp(14, 2)),
            LearnResult::Moved { from: cp(13, 1) }
        );
        assert_eq!(registry.lookup(ip).unwrap().location, cp(14, 2));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.hosts_at(DeviceID(14)).count(), 1);
        assert_eq!(registry.hosts_at(DeviceID(13)).count(), 0);
        assert!(registry.lookup(Ipv4Addr::new(10, 0, 0, 2)).is_none());
    }
}
