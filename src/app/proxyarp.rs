use crate::app::common::ControllerState;
use crate::app::forwarding;
use crate::config::{ForwardingPolicy, LoadBalancingPolicy};
use crate::core::connection::PacketOut;
use crate::event::PacketReceived;
use crate::fattree::FatTree;
use crate::representation::{DeviceID, Tier};
use crate::util::flow::{FlowAction, FlowActions, OutputPort, PacketHeaders};
use log::{debug, info, warn};
use rusty_fabric_packet::packet::arp::{ArpOp, ETHERNET_TYPE_ARP};
use rusty_fabric_packet::packet::{Arp, Ethernet, Packet};
use smallvec::smallvec;
use std::collections::HashSet;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ArpKey {
    pub device: DeviceID,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub opcode: ArpOp,
}

/// Loop suppression for flooded ARP. Once the set grows past `bound` it
/// is emptied wholesale.
#[derive(Debug)]
pub struct ArpDedup {
    seen: HashSet<ArpKey>,
    bound: usize,
}

impl ArpDedup {
    pub fn new(bound: usize) -> ArpDedup {
        ArpDedup {
            seen: HashSet::new(),
            bound,
        }
    }

    /// `true` on first sighting.
    pub fn check_and_insert(&mut self, key: ArpKey) -> bool {
        if !self.seen.insert(key) {
            return false;
        }
        if self.seen.len() > self.bound {
            debug!(target:"proxyarp", "dedup set over {} entries, clearing", self.bound);
            self.seen.clear();
        }
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Where an ARP packet for `target` goes next from `device`, never back out
/// of `in_port`.
pub fn arp_out_ports(fabric: &FatTree, device: DeviceID, in_port: u32, target: Ipv4Addr) -> Vec<u32> {
    let target_loc = fabric.locate(target);
    let ports = match fabric.tier(device) {
        Some(Tier::Edge) => {
            if fabric.is_host_port(device, in_port) {
                match target_loc {
                    Some(loc) if fabric.edge(loc.pod, loc.edge_in_pod) == device => {
                        vec![fabric.host_port(loc.slot)]
                    }
                    _ => fabric.uplink_ports(device),
                }
            } else {
                fabric.downlink_ports(device)
            }
        }
        Some(Tier::Aggregation) => {
            if fabric.is_uplink(device, in_port) {
                fabric.downlink_ports(device)
            } else {
                match target_loc {
                    Some(loc) if fabric.pod_of(device) == Some(loc.pod) => {
                        vec![fabric.edge_port(loc.edge_in_pod)]
                    }
                    _ => fabric.uplink_ports(device),
                }
            }
        }
        Some(Tier::Core) => match target_loc {
            Some(loc) => vec![fabric.core_port(loc.pod)],
            None => fabric.downlink_ports(device),
        },
        None => Vec::new(),
    };
    ports.into_iter().filter(|p| *p != in_port).collect()
}

pub fn on_arp_received(state: &mut ControllerState, packet: &PacketReceived, headers: &PacketHeaders) {
    let eth = match Ethernet::<Arp>::parse(&packet.packet) {
        Some(eth) => eth,
        None => {
            warn!(target:"proxyarp", "malformed arp from {:?}", packet.from);
            return;
        }
    };
    let arp = eth.payload;
    let (sender_ip, target_ip, sender_mac) = match (
        arp.get_sender_ipv4(),
        arp.get_target_ipv4(),
        arp.get_sender_mac(),
    ) {
        (Some(s), Some(t), Some(m)) => (s, t, m),
        _ => {
            warn!(target:"proxyarp", "non-ipv4 arp from {:?}", packet.from);
            return;
        }
    };
    forwarding::learn_host(state, sender_ip, sender_mac, packet.from);

    if target_ip == state.config.vip {
        if arp.opcode == ArpOp::Request && state.config.balancing != LoadBalancingPolicy::None {
            reply_for_vip(state, packet, &arp);
        }
        return;
    }

    let key = ArpKey {
        device: packet.from.device,
        src: sender_ip,
        dst: target_ip,
        opcode: arp.opcode,
    };
    if !state.arp_dedup.check_and_insert(key) {
        debug!(target:"proxyarp", "duplicate arp {:?}", key);
        return;
    }

    let actions: FlowActions = match state.config.forwarding {
        ForwardingPolicy::FatTreeAware => {
            arp_out_ports(&state.fabric, packet.from.device, packet.from.port, target_ip)
                .into_iter()
                .map(|p| FlowAction::Output(OutputPort::Physical(p)))
                .collect()
        }
        ForwardingPolicy::LearningSwitch => {
            let known = state
                .mac_tables
                .get(&packet.from.device)
                .and_then(|t| t.get(&headers.eth_dst))
                .copied();
            match known {
                Some(port) if port == packet.from.port => smallvec![],
                Some(port) => smallvec![FlowAction::Output(OutputPort::Physical(port))],
                None => smallvec![FlowAction::Output(OutputPort::Flood)],
            }
        }
    };
    if actions.is_empty() {
        debug!(target:"proxyarp", "arp {} -> {} has nowhere to go from {:?}", sender_ip, target_ip, packet.from);
        return;
    }
    let (device, out) = forwarding::packet_out_for(packet, packet.from.device, actions);
    if let Err(e) = state.programmer.send_packet(device, out) {
        warn!(target:"proxyarp", "arp packet-out failed: {}", e);
    }
}

fn reply_for_vip(state: &ControllerState, packet: &PacketReceived, request: &Arp) {
    let vip_mac = state.config.vip_mac;
    let vip = state.config.vip.octets();
    let reply = Ethernet {
        dst: request.sender_mac,
        src: vip_mac.as_ref(),
        ether_type: ETHERNET_TYPE_ARP,
        payload: Arp::ipv4(
            ArpOp::Reply,
            vip_mac.as_ref(),
            &vip,
            request.sender_mac,
            request.sender_ip,
        ),
    }
    .to_bytes();
    let out = PacketOut {
        buffer_id: None,
        in_port: None,
        actions: smallvec![FlowAction::Output(OutputPort::Physical(packet.from.port))],
        payload: reply,
    };
    match state.programmer.send_packet(packet.from.device, out) {
        Ok(()) => info!(target:"proxyarp", "answered arp for VIP on {:?}", packet.from),
        Err(e) => warn!(target:"proxyarp", "VIP arp reply failed: {}", e),
    }
}
