use crate::app::graph::TopologyGraph;
use crate::app::host::HostRegistry;
use crate::app::loadbalance::LoadBalancer;
use crate::app::proxyarp::ArpDedup;
use crate::config::FabricConfig;
use crate::context::FlowProgrammer;
use crate::fattree::FatTree;
use crate::representation::DeviceID;
use crate::util::MAC;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

pub enum MergeResult<T> {
    ADDED(T),
    MERGED,
    CONFLICT,
}

/// All mutable controller state. Touched by one event at a time.
pub struct ControllerState {
    pub config: FabricConfig,
    pub fabric: FatTree,
    pub graph: TopologyGraph,
    pub hosts: HostRegistry,
    pub arp_dedup: ArpDedup,
    pub balancer: LoadBalancer,
    pub mac_tables: HashMap<DeviceID, HashMap<MAC, u32>>,
    pub programmer: FlowProgrammer,
}

impl ControllerState {
    pub fn new(config: FabricConfig) -> ControllerState {
        ControllerState {
            fabric: config.fabric(),
            graph: TopologyGraph::new(),
            hosts: HostRegistry::new(),
            arp_dedup: ArpDedup::new(config.arp_dedup_bound),
            balancer: LoadBalancer::new(&config),
            mac_tables: HashMap::new(),
            programmer: FlowProgrammer::new(),
            config,
        }
    }

    /// Switch a backend hangs off: learned location first, address scheme
    /// otherwise.
    pub fn backend_device(&self, backend: Ipv4Addr) -> Option<DeviceID> {
        match self.hosts.lookup(backend) {
            Some(host) => Some(host.location.device),
            None => self.fabric.host_attachment(backend).map(|cp| cp.device),
        }
    }

    /// Backends whose connection counters are owned by `device`.
    pub fn backends_at(&self, device: DeviceID) -> Vec<Ipv4Addr> {
        self.balancer
            .backends()
            .iter()
            .map(|b| b.key)
            .filter(|ip| self.backend_device(*ip) == Some(device))
            .collect()
    }
}

/// Shared handle to the controller state.
#[derive(Clone)]
pub struct CommonState {
    inner: Arc<Mutex<ControllerState>>,
}

impl CommonState {
    pub fn new(state: ControllerState) -> CommonState {
        CommonState {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub fn lock(&self) -> MutexGuard<ControllerState> {
        self.inner.lock()
    }
}
