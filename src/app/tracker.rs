use crate::app::common::ControllerState;
use crate::representation::DeviceID;
use crate::util::flow::{Flow, PRIORITY_BALANCED, PRIORITY_NAT};
use log::{debug, info, warn};
use std::collections::HashMap;

/// A rule expired or was evicted on `device`.
pub fn on_flow_removed(state: &mut ControllerState, device: DeviceID, flow: &Flow) {
    state.programmer.forget_flow(device, flow);
    if !state.balancer.tracks_connections() {
        return;
    }
    match flow.priority {
        PRIORITY_NAT => {
            if let Some(backend) = flow.rewritten_ipv4_dst() {
                if state.balancer.release_backend(backend) {
                    debug!(target:"tracker", "backend {} released by {}", backend, device);
                }
            }
        }
        PRIORITY_BALANCED => {
            for port in flow.output_ports() {
                if state.balancer.release_port(device, port) {
                    debug!(target:"tracker", "uplink {:?}[{}] released", device, port);
                }
            }
        }
        _ => {}
    }
}

/// Overwrites the counters `device` owns with what its table actually holds.
pub fn on_flow_stats(state: &mut ControllerState, device: DeviceID, flows: &[Flow]) {
    if !state.programmer.is_connected(device) {
        debug!(target:"tracker", "stats from untracked device {} discarded", device);
        return;
    }
    if !state.balancer.tracks_connections() {
        return;
    }
    let mut ports: HashMap<u32, u64> = HashMap::new();
    for flow in flows.iter().filter(|f| f.priority == PRIORITY_BALANCED) {
        for port in flow.output_ports() {
            *ports.entry(port).or_insert(0) += 1;
        }
    }
    state.balancer.reconcile_ports(device, &ports);

    for backend in state.backends_at(device) {
        let count = flows
            .iter()
            .filter(|f| f.priority == PRIORITY_NAT && f.rewritten_ipv4_dst() == Some(backend))
            .count() as u64;
        state.balancer.reconcile_backend(backend, count);
    }
}

/// Timer tick: ask every switch for its flows and report backend load.
pub fn on_poll(state: &mut ControllerState) {
    for device in state.programmer.devices() {
        if let Err(e) = state.programmer.request_flow_stats(device) {
            warn!(target:"tracker", "stats request to {} failed: {}", device, e);
        }
    }
    if state.balancer.policy() != crate::config::LoadBalancingPolicy::None {
        info!(target:"tracker", "{} switches, {} hosts", state.programmer.devices().len(), state.hosts.len());
        state.balancer.log_status();
    }
}
