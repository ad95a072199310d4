//! Address and port arithmetic of a k-ary fat-tree.
//!
//! Datapath ids are assigned tier by tier: cores `1..=(k/2)²`, then `k²/2`
//! aggregation switches, then `k²/2` edge switches, pod-major. Host `n`
//! (1-based) owns `host_network + n` and hangs off edge
//! `pod * k/2 + edge_in_pod` at port `slot + 1`.

use crate::representation::{ConnectPoint, DeviceID, Link, Tier};
use std::net::Ipv4Addr;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct HostLocation {
    pub pod: u32,
    pub edge_in_pod: u32,
    pub slot: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FatTree {
    k: u32,
    host_network: Ipv4Addr,
}

impl FatTree {
    pub fn new(k: u32, host_network: Ipv4Addr) -> FatTree {
        FatTree { k, host_network }
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn half(&self) -> u32 {
        self.k / 2
    }

    pub fn hosts_per_edge(&self) -> u32 {
        self.half()
    }

    pub fn hosts_per_pod(&self) -> u32 {
        self.half() * self.half()
    }

    pub fn host_count(&self) -> u32 {
        self.k * self.hosts_per_pod()
    }

    pub fn core_count(&self) -> u32 {
        self.half() * self.half()
    }

    fn first_agg(&self) -> u64 {
        1 + self.core_count() as u64
    }

    fn first_edge(&self) -> u64 {
        self.first_agg() + (self.k * self.half()) as u64
    }

    fn end(&self) -> u64 {
        self.first_edge() + (self.k * self.half()) as u64
    }

    pub fn core(&self, index: u32) -> DeviceID {
        DeviceID(1 + index as u64)
    }

    pub fn agg(&self, pod: u32, col: u32) -> DeviceID {
        DeviceID(self.first_agg() + (pod * self.half() + col) as u64)
    }

    pub fn edge(&self, pod: u32, edge_in_pod: u32) -> DeviceID {
        DeviceID(self.first_edge() + (pod * self.half() + edge_in_pod) as u64)
    }

    pub fn devices(&self) -> impl Iterator<Item = DeviceID> {
        (1..self.end()).map(DeviceID)
    }

    pub fn tier(&self, device: DeviceID) -> Option<Tier> {
        match device.0 {
            0 => None,
            d if d < self.first_agg() => Some(Tier::Core),
            d if d < self.first_edge() => Some(Tier::Aggregation),
            d if d < self.end() => Some(Tier::Edge),
            _ => None,
        }
    }

    /// `(pod, column)` of an aggregation switch.
    pub fn agg_position(&self, device: DeviceID) -> Option<(u32, u32)> {
        match self.tier(device) {
            Some(Tier::Aggregation) => {
                let i = (device.0 - self.first_agg()) as u32;
                Some((i / self.half(), i % self.half()))
            }
            _ => None,
        }
    }

    /// `(pod, edge_in_pod)` of an edge switch.
    pub fn edge_position(&self, device: DeviceID) -> Option<(u32, u32)> {
        match self.tier(device) {
            Some(Tier::Edge) => {
                let i = (device.0 - self.first_edge()) as u32;
                Some((i / self.half(), i % self.half()))
            }
            _ => None,
        }
    }

    pub fn pod_of(&self, device: DeviceID) -> Option<u32> {
        self.agg_position(device)
            .or_else(|| self.edge_position(device))
            .map(|(pod, _)| pod)
    }

    /// 1-based host number of `ip`, if it lies in the host range.
    pub fn host_index(&self, ip: Ipv4Addr) -> Option<u32> {
        let n = u32::from(ip).checked_sub(u32::from(self.host_network))?;
        if n >= 1 && n <= self.host_count() {
            Some(n)
        } else {
            None
        }
    }

    /// `None` when `host_network + n` runs past the address space.
    pub fn host_ip(&self, n: u32) -> Option<Ipv4Addr> {
        u32::from(self.host_network).checked_add(n).map(Ipv4Addr::from)
    }

    /// Whether every host address lands in the /24 of `host_network`,
    /// below its broadcast address.
    pub fn fits_host_network(&self) -> bool {
        (u32::from(self.host_network) & 0xff)
            .checked_add(self.host_count())
            .map_or(false, |last| last < 0xff)
    }

    pub fn locate(&self, ip: Ipv4Addr) -> Option<HostLocation> {
        let i = self.host_index(ip)? - 1;
        Some(HostLocation {
            pod: i / self.hosts_per_pod(),
            edge_in_pod: (i % self.hosts_per_pod()) / self.hosts_per_edge(),
            slot: i % self.hosts_per_edge(),
        })
    }

    pub fn host_attachment(&self, ip: Ipv4Addr) -> Option<ConnectPoint> {
        let loc = self.locate(ip)?;
        Some(ConnectPoint {
            device: self.edge(loc.pod, loc.edge_in_pod),
            port: loc.slot + 1,
        })
    }

    pub fn all_hosts(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        (1..=self.host_count()).filter_map(move |n| self.host_ip(n))
    }

    pub fn hosts_of_pod(&self, pod: u32) -> Vec<Ipv4Addr> {
        let first = pod * self.hosts_per_pod() + 1;
        (first..first + self.hosts_per_pod())
            .filter_map(|n| self.host_ip(n))
            .collect()
    }

    pub fn hosts_of_edge(&self, device: DeviceID) -> Vec<Ipv4Addr> {
        match self.edge_position(device) {
            Some((pod, e)) => {
                let first = pod * self.hosts_per_pod() + e * self.hosts_per_edge() + 1;
                (first..first + self.hosts_per_edge())
                    .filter_map(|n| self.host_ip(n))
                    .collect()
            }
            None => Vec::new(),
        }
    }

    /// Edge port facing host slot `slot`.
    pub fn host_port(&self, slot: u32) -> u32 {
        slot + 1
    }

    /// Aggregation port facing edge `edge_in_pod` of its pod.
    pub fn edge_port(&self, edge_in_pod: u32) -> u32 {
        edge_in_pod + 1
    }

    /// Core port facing `pod`.
    pub fn core_port(&self, pod: u32) -> u32 {
        pod + 1
    }

    pub fn is_host_port(&self, device: DeviceID, port: u32) -> bool {
        self.tier(device) == Some(Tier::Edge) && port >= 1 && port <= self.half()
    }

    pub fn is_uplink(&self, device: DeviceID, port: u32) -> bool {
        match self.tier(device) {
            Some(Tier::Edge) | Some(Tier::Aggregation) => port > self.half() && port <= self.k,
            _ => false,
        }
    }

    /// Ports toward the next tier up. Cores have none.
    pub fn uplink_ports(&self, device: DeviceID) -> Vec<u32> {
        match self.tier(device) {
            Some(Tier::Edge) | Some(Tier::Aggregation) => (self.half() + 1..=self.k).collect(),
            _ => Vec::new(),
        }
    }

    /// Ports toward the next tier down: hosts, edges or pods.
    pub fn downlink_ports(&self, device: DeviceID) -> Vec<u32> {
        match self.tier(device) {
            Some(Tier::Edge) | Some(Tier::Aggregation) => (1..=self.half()).collect(),
            Some(Tier::Core) => (1..=self.k).collect(),
            None => Vec::new(),
        }
    }

    /// Canonical switch-to-switch wiring, one `Link` per cable.
    pub fn reference_links(&self) -> Vec<Link> {
        let half = self.half();
        let mut links = Vec::new();
        for pod in 0..self.k {
            for e in 0..half {
                for a in 0..half {
                    links.push(Link::new(
                        self.edge(pod, e),
                        half + a + 1,
                        self.agg(pod, a),
                        self.edge_port(e),
                    ));
                }
            }
            for col in 0..half {
                for j in 0..half {
                    links.push(Link::new(
                        self.agg(pod, col),
                        half + j + 1,
                        self.core(j * half + col),
                        self.core_port(pod),
                    ));
                }
            }
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k4() -> FatTree {
        FatTree::new(4, Ipv4Addr::new(10, 0, 0, 0))
    }

    #[test]
    fn dpid_ranges() {
        let f = k4();
        assert_eq!(f.tier(DeviceID(1)), Some(Tier::Core));
        assert_eq!(f.tier(DeviceID(4)), Some(Tier::Core));
        assert_eq!(f.tier(DeviceID(5)), Some(Tier::Aggregation));
        assert_eq!(f.tier(DeviceID(12)), Some(Tier::Aggregation));
        assert_eq!(f.tier(DeviceID(13)), Some(Tier::Edge));
        assert_eq!(f.tier(DeviceID(20)), Some(Tier::Edge));
        assert_eq!(f.tier(DeviceID(21)), None);
        assert_eq!(f.tier(DeviceID(0)), None);
        assert_eq!(f.devices().count(), 20);
    }

    #[test]
    fn host_addressing() {
        let f = k4();
        assert_eq!(f.host_count(), 16);
        let h9 = f.locate(Ipv4Addr::new(10, 0, 0, 9)).unwrap();
        assert_eq!(
            h9,
            HostLocation {
                pod: 2,
                edge_in_pod: 0,
                slot: 0
            }
        );
        assert_eq!(
            f.host_attachment(Ipv4Addr::new(10, 0, 0, 1)),
            Some(ConnectPoint {
                device: DeviceID(13),
                port: 1
            })
        );
        assert_eq!(
            f.host_attachment(Ipv4Addr::new(10, 0, 0, 9)),
            Some(ConnectPoint {
                device: DeviceID(17),
                port: 1
            })
        );
        assert_eq!(
            f.host_attachment(Ipv4Addr::new(10, 0, 0, 16)),
            Some(ConnectPoint {
                device: DeviceID(20),
                port: 2
            })
        );
        assert!(f.locate(Ipv4Addr::new(10, 0, 0, 17)).is_none());
        assert!(f.locate(Ipv4Addr::new(10, 0, 0, 0)).is_none());
        assert!(f.locate(Ipv4Addr::new(10, 0, 0, 100)).is_none());
        assert_eq!(
            f.hosts_of_edge(DeviceID(14)),
            vec![Ipv4Addr::new(10, 0, 0, 3), Ipv4Addr::new(10, 0, 0, 4)]
        );
        assert_eq!(f.hosts_of_pod(3).len(), 4);
    }

    #[test]
    fn host_range_near_top_of_address_space() {
        assert!(k4().fits_host_network());
        assert!(FatTree::new(4, Ipv4Addr::new(10, 0, 0, 238)).fits_host_network());
        assert!(!FatTree::new(4, Ipv4Addr::new(10, 0, 0, 239)).fits_host_network());

        let f = FatTree::new(4, Ipv4Addr::new(255, 255, 255, 250));
        assert!(!f.fits_host_network());
        assert_eq!(f.host_ip(5), Some(Ipv4Addr::new(255, 255, 255, 255)));
        assert_eq!(f.host_ip(6), None);
        assert_eq!(f.all_hosts().count(), 5);
        assert_eq!(f.hosts_of_pod(1).len(), 1);
        assert!(f.hosts_of_edge(DeviceID(20)).is_empty());
    }

    #[test]
    fn reference_wiring() {
        let f = k4();
        let links = f.reference_links();
        // k³/4 cables between edge and aggregation, as many again up to core
        assert_eq!(links.len(), 32);
        assert!(links.contains(&Link::new(DeviceID(13), 3, DeviceID(5), 1)));
        assert!(links.contains(&Link::new(DeviceID(14), 4, DeviceID(6), 2)));
        assert!(links.contains(&Link::new(DeviceID(5), 3, DeviceID(1), 1)));
        assert!(links.contains(&Link::new(DeviceID(6), 4, DeviceID(4), 1)));
        assert!(links.contains(&Link::new(DeviceID(9), 3, DeviceID(1), 3)));
        // every switch port is used exactly once
        let mut used = std::collections::HashSet::new();
        for l in &links {
            assert!(used.insert(l.src));
            assert!(used.insert(l.dst));
        }
    }

    #[test]
    fn port_roles() {
        let f = k4();
        assert!(f.is_host_port(DeviceID(13), 2));
        assert!(!f.is_host_port(DeviceID(13), 3));
        assert!(!f.is_host_port(DeviceID(5), 1));
        assert!(f.is_uplink(DeviceID(5), 4));
        assert!(!f.is_uplink(DeviceID(1), 4));
        assert_eq!(f.uplink_ports(DeviceID(13)), vec![3, 4]);
        assert!(f.uplink_ports(DeviceID(2)).is_empty());
        assert_eq!(f.downlink_ports(DeviceID(2)), vec![1, 2, 3, 4]);
        assert_eq!(f.pod_of(DeviceID(11)), Some(3));
        assert_eq!(f.pod_of(DeviceID(1)), None);
    }
}
