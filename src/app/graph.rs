use crate::app::common::MergeResult;
use crate::representation::{DeviceID, Link};
use log::debug;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Switch adjacency with a cache of equal-cost shortest paths.
///
/// Every mutation drops the whole cache.
#[derive(Debug, Default)]
pub struct TopologyGraph {
    adjacency: HashMap<DeviceID, BTreeMap<DeviceID, u32>>,
    cache: HashMap<(DeviceID, DeviceID), Vec<Path>>,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Path {
    pub devices: Vec<DeviceID>,
}

impl Path {
    pub fn hop_count(&self) -> usize {
        self.devices.len().saturating_sub(1)
    }

    pub fn src(&self) -> Option<DeviceID> {
        self.devices.first().copied()
    }

    pub fn dst(&self) -> Option<DeviceID> {
        self.devices.last().copied()
    }
}

impl TopologyGraph {
    pub fn new() -> TopologyGraph {
        Default::default()
    }

    pub fn add_device(&mut self, device: DeviceID) {
        if !self.adjacency.contains_key(&device) {
            self.adjacency.insert(device, BTreeMap::new());
            self.cache.clear();
        }
    }

    /// Unknown endpoints are added implicitly. A link already present with a
    /// different port is overwritten and reported as a conflict.
    pub fn add_link(&mut self, link: &Link) -> MergeResult<()> {
        let forward = self.set_port(link.src.device, link.dst.device, link.src.port);
        let backward = self.set_port(link.dst.device, link.src.device, link.dst.port);
        let result = match (forward, backward) {
            (None, None) => MergeResult::ADDED(()),
            (Some(a), Some(b)) if a == link.src.port && b == link.dst.port => MergeResult::MERGED,
            (Some(_), Some(_)) => MergeResult::CONFLICT,
            _ => MergeResult::ADDED(()),
        };
        if !matches!(result, MergeResult::MERGED) {
            self.cache.clear();
        }
        result
    }

    fn set_port(&mut self, from: DeviceID, to: DeviceID, port: u32) -> Option<u32> {
        self.adjacency.entry(from).or_default().insert(to, port)
    }

    pub fn remove_link(&mut self, link: &Link) {
        let mut changed = false;
        if let Some(n) = self.adjacency.get_mut(&link.src.device) {
            changed |= n.remove(&link.dst.device).is_some();
        }
        if let Some(n) = self.adjacency.get_mut(&link.dst.device) {
            changed |= n.remove(&link.src.device).is_some();
        }
        if changed {
            self.cache.clear();
        }
    }

    pub fn remove_device(&mut self, device: DeviceID) {
        self.adjacency.remove(&device);
        for neighbors in self.adjacency.values_mut() {
            neighbors.remove(&device);
        }
        self.cache.clear();
    }

    pub fn port_towards(&self, from: DeviceID, to: DeviceID) -> Option<u32> {
        self.adjacency.get(&from)?.get(&to).copied()
    }

    pub fn neighbor_at(&self, device: DeviceID, port: u32) -> Option<DeviceID> {
        self.adjacency
            .get(&device)?
            .iter()
            .find(|(_, p)| **p == port)
            .map(|(n, _)| *n)
    }

    pub fn cached_pairs(&self) -> usize {
        self.cache.len()
    }

    /// All minimum-hop paths from `src` to `dst`, in discovery order.
    /// Empty when unreachable.
    pub fn ecmp_paths(&mut self, src: DeviceID, dst: DeviceID) -> Vec<Path> {
        if let Some(paths) = self.cache.get(&(src, dst)) {
            return paths.clone();
        }
        let paths = self.search(src, dst);
        debug!(target:"graph", "{} equal-cost paths {} -> {}", paths.len(), src, dst);
        self.cache.insert((src, dst), paths.clone());
        paths
    }

    /// Deterministic pick among the equal-cost paths.
    pub fn first_path(&mut self, src: DeviceID, dst: DeviceID) -> Option<Path> {
        self.ecmp_paths(src, dst).into_iter().next()
    }

    fn search(&self, src: DeviceID, dst: DeviceID) -> Vec<Path> {
        if !self.adjacency.contains_key(&src) {
            return Vec::new();
        }
        if src == dst {
            return vec![Path { devices: vec![src] }];
        }
        let mut paths = Vec::new();
        let mut shortest: Option<usize> = None;
        let mut depth_of = HashMap::new();
        depth_of.insert(src, 0usize);
        let mut queue = VecDeque::new();
        queue.push_back(vec![src]);

        while let Some(path) = queue.pop_front() {
            let depth = path.len() - 1;
            if matches!(shortest, Some(limit) if depth > limit) {
                break;
            }
            let node = path[depth];
            if node == dst {
                shortest = Some(depth);
                paths.push(Path { devices: path });
                continue;
            }
            if shortest.is_some() {
                continue;
            }
            let neighbors = match self.adjacency.get(&node) {
                Some(n) => n,
                None => continue,
            };
            for next in neighbors.keys() {
                if path.contains(next) {
                    continue;
                }
                let next_depth = depth + 1;
                let expand = match depth_of.get(next) {
                    Some(seen) => next_depth <= *seen,
                    None => true,
                };
                if expand {
                    depth_of.insert(*next, next_depth);
                    let mut extended = path.clone();
                    extended.push(*next);
                    queue.push_back(extended);
                }
            }
        }
        paths
    }
}
