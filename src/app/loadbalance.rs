pub mod wlc;
pub mod wrr;

use crate::config::{FabricConfig, LoadBalancingPolicy};
use crate::representation::DeviceID;
use log::{debug, info};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use wrr::WeightedRoundRobin;

/// One schedulable target: a backend server or a switch uplink port.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WeightedEntry<K> {
    pub key: K,
    pub weight: u32,
    pub active: u64,
    /// Set while the switch owning the counter is disconnected.
    pub stale: bool,
}

#[derive(Debug, Clone)]
pub struct Pool<K> {
    entries: Vec<WeightedEntry<K>>,
    weights: Vec<u32>,
    wrr: WeightedRoundRobin,
}

impl<K> Pool<K>
where
    K: Copy + Eq,
{
    pub fn new<I: IntoIterator<Item = (K, u32)>>(targets: I) -> Pool<K> {
        let entries: Vec<WeightedEntry<K>> = targets
            .into_iter()
            .map(|(key, weight)| WeightedEntry {
                key,
                weight,
                active: 0,
                stale: false,
            })
            .collect();
        let weights: Vec<u32> = entries.iter().map(|e| e.weight).collect();
        Pool {
            wrr: WeightedRoundRobin::new(&weights),
            weights,
            entries,
        }
    }

    /// Under WLC the winner's counter is bumped before any rule is installed.
    pub fn select(&mut self, policy: LoadBalancingPolicy) -> Option<K> {
        match policy {
            LoadBalancingPolicy::None => None,
            LoadBalancingPolicy::Wrr => {
                let i = self.wrr.next(&self.weights)?;
                Some(self.entries[i].key)
            }
            LoadBalancingPolicy::Wlc => {
                let i = wlc::least_connection(&self.entries)?;
                let entry = &mut self.entries[i];
                entry.active += 1;
                Some(entry.key)
            }
        }
    }

    fn entry_mut(&mut self, key: K) -> Option<&mut WeightedEntry<K>> {
        self.entries.iter_mut().find(|e| e.key == key)
    }

    /// Floors at zero. Returns whether a counter actually moved.
    pub fn release(&mut self, key: K) -> bool {
        match self.entry_mut(key) {
            Some(entry) if entry.active > 0 => {
                entry.active -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn set_active(&mut self, key: K, active: u64) -> bool {
        match self.entry_mut(key) {
            Some(entry) => {
                entry.active = active;
                entry.stale = false;
                true
            }
            None => false,
        }
    }

    pub fn mark_stale(&mut self, key: K) {
        if let Some(entry) = self.entry_mut(key) {
            entry.stale = true;
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.iter().map(|e| e.key)
    }

    pub fn get(&self, key: K) -> Option<&WeightedEntry<K>> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn entries(&self) -> &[WeightedEntry<K>] {
        &self.entries
    }
}

/// Backend and uplink scheduling under one policy.
#[derive(Debug)]
pub struct LoadBalancer {
    policy: LoadBalancingPolicy,
    uplink_balancing: bool,
    backends: Pool<Ipv4Addr>,
    ports: HashMap<DeviceID, Pool<u32>>,
}

impl LoadBalancer {
    pub fn new(config: &FabricConfig) -> LoadBalancer {
        LoadBalancer {
            policy: config.balancing,
            uplink_balancing: config.uplink_balancing,
            backends: Pool::new(config.backends.iter().map(|b| (b.ip, b.weight))),
            ports: HashMap::new(),
        }
    }

    pub fn policy(&self) -> LoadBalancingPolicy {
        self.policy
    }

    /// Counters only mean something when the policy reads them.
    pub fn tracks_connections(&self) -> bool {
        self.policy == LoadBalancingPolicy::Wlc
    }

    pub fn balances_uplinks(&self) -> bool {
        self.uplink_balancing && self.policy != LoadBalancingPolicy::None
    }

    pub fn select_backend(&mut self) -> Option<Ipv4Addr> {
        let backend = self.backends.select(self.policy)?;
        debug!(target:"loadbalance", "{:?} picked backend {}", self.policy, backend);
        Some(backend)
    }

    /// Registers the uplinks of `device` with their weights. Existing pools
    /// are kept so counters survive a reconnect until the next reset.
    pub fn init_uplinks(&mut self, device: DeviceID, ports: &[(u32, u32)]) {
        self.ports
            .entry(device)
            .or_insert_with(|| Pool::new(ports.iter().copied()));
    }

    pub fn select_port(&mut self, device: DeviceID) -> Option<u32> {
        let policy = self.policy;
        let port = self.ports.get_mut(&device)?.select(policy)?;
        debug!(target:"loadbalance", "{:?} picked uplink {:?}[{}]", policy, device, port);
        Some(port)
    }

    pub fn release_backend(&mut self, backend: Ipv4Addr) -> bool {
        self.backends.release(backend)
    }

    pub fn release_port(&mut self, device: DeviceID, port: u32) -> bool {
        match self.ports.get_mut(&device) {
            Some(pool) => pool.release(port),
            None => false,
        }
    }

    /// Overwrites every uplink counter of `device`; ports absent from
    /// `counts` drop to zero.
    pub fn reconcile_ports(&mut self, device: DeviceID, counts: &HashMap<u32, u64>) {
        if let Some(pool) = self.ports.get_mut(&device) {
            let keys: Vec<u32> = pool.keys().collect();
            for port in keys {
                pool.set_active(port, counts.get(&port).copied().unwrap_or(0));
            }
        }
    }

    pub fn reconcile_backend(&mut self, backend: Ipv4Addr, count: u64) {
        self.backends.set_active(backend, count);
    }

    pub fn mark_device_stale(&mut self, device: DeviceID, backends: &[Ipv4Addr]) {
        if let Some(pool) = self.ports.get_mut(&device) {
            let keys: Vec<u32> = pool.keys().collect();
            for port in keys {
                pool.mark_stale(port);
            }
        }
        for backend in backends {
            self.backends.mark_stale(*backend);
        }
    }

    /// A freshly wiped switch holds no balanced rules.
    pub fn reset_device(&mut self, device: DeviceID, backends: &[Ipv4Addr]) {
        self.reconcile_ports(device, &HashMap::new());
        for backend in backends {
            self.backends.set_active(*backend, 0);
        }
    }

    pub fn backends(&self) -> &[WeightedEntry<Ipv4Addr>] {
        self.backends.entries()
    }

    pub fn ports(&self, device: DeviceID) -> Option<&[WeightedEntry<u32>]> {
        self.ports.get(&device).map(|p| p.entries())
    }

    pub fn log_status(&self) {
        for b in self.backends.entries() {
            info!(
                target:"loadbalance",
                "backend {} active {} weight {}{}",
                b.key,
                b.active,
                b.weight,
                if b.stale { " (stale)" } else { "" }
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_floors_at_zero() {
        let mut pool = Pool::new(vec![('A', 1)]);
        assert!(!pool.release('A'));
        pool.select(LoadBalancingPolicy::Wlc);
        assert_eq!(pool.get('A').unwrap().active, 1);
        assert!(pool.release('A'));
        assert!(!pool.release('A'));
        assert_eq!(pool.get('A').unwrap().active, 0);
        assert!(!pool.release('Z'));
    }

    #[test]
    fn wrr_leaves_counters_alone() {
        let mut pool = Pool::new(vec![('A', 3), ('B', 2)]);
        pool.select(LoadBalancingPolicy::Wrr);
        assert!(pool.entries().iter().all(|e| e.active == 0));
        assert_eq!(pool.select(LoadBalancingPolicy::None), None);
    }

    #[test]
    fn stale_then_reset() {
        let mut config = FabricConfig::default();
        config.balancing = LoadBalancingPolicy::Wlc;
        config.uplink_balancing = true;
        let mut lb = LoadBalancer::new(&config);
        lb.init_uplinks(DeviceID(13), &[(3, 3), (4, 2)]);
        assert_eq!(lb.select_port(DeviceID(13)), Some(3));
        let backend = lb.select_backend().unwrap();
        assert_eq!(backend, Ipv4Addr::new(10, 0, 0, 1));

        lb.mark_device_stale(DeviceID(13), &[backend]);
        assert!(lb.ports(DeviceID(13)).unwrap()[0].stale);
        assert!(lb.backends()[0].stale);
        assert_eq!(lb.ports(DeviceID(13)).unwrap()[0].active, 1);

        lb.reset_device(DeviceID(13), &[backend]);
        let port = &lb.ports(DeviceID(13)).unwrap()[0];
        assert_eq!((port.active, port.stale), (0, false));
        assert_eq!((lb.backends()[0].active, lb.backends()[0].stale), (0, false));
    }

    #[test]
    fn reconcile_overwrites_ports() {
        let mut config = FabricConfig::default();
        config.balancing = LoadBalancingPolicy::Wlc;
        let mut lb = LoadBalancer::new(&config);
        lb.init_uplinks(DeviceID(5), &[(3, 1), (4, 1)]);
        lb.select_port(DeviceID(5));
        lb.select_port(DeviceID(5));
        let mut counts = HashMap::new();
        counts.insert(4, 7);
        lb.reconcile_ports(DeviceID(5), &counts);
        let ports = lb.ports(DeviceID(5)).unwrap();
        assert_eq!(ports[0].active, 0);
        assert_eq!(ports[1].active, 7);
    }
}
