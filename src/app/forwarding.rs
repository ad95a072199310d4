//! Packet-in pipeline and proactive rules at switch bring-up.

use crate::app::common::ControllerState;
use crate::app::graph::{Path, TopologyGraph};
use crate::app::{nat, proxyarp};
use crate::config::{ForwardingPolicy, UnknownDestination};
use crate::core::connection::{Connection, PacketOut};
use crate::error::DeviceError;
use crate::event::PacketReceived;
use crate::representation::{ConnectPoint, DeviceID, Host, Link, Tier};
use crate::util::flow::*;
use crate::util::MAC;
use bytes::Bytes;
use log::{debug, info, warn};
use rusty_fabric_packet::packet::arp::ETHERNET_TYPE_ARP;
use rusty_fabric_packet::packet::ethernet::{ETHERNET_TYPE_IPV4, ETHERNET_TYPE_IPV6, ETHERNET_TYPE_LLDP};
use smallvec::smallvec;
use std::collections::HashMap;
use std::net::Ipv4Addr;

pub fn on_device_added(state: &mut ControllerState, device: DeviceID, connection: Box<dyn Connection>) {
    state.programmer.add_device(device, connection);
    state.graph.add_device(device);
    state.mac_tables.insert(device, HashMap::new());
    let backends = state.backends_at(device);
    state.balancer.reset_device(device, &backends);
    match install_proactive(state, device) {
        Ok(n) => info!(target:"forwarding", "device {} ({:?}) up, {} rules", device, state.fabric.tier(device), n),
        Err(e) => warn!(target:"forwarding", "device {} bring-up aborted: {}", device, e),
    }
}

pub fn on_device_lost(state: &mut ControllerState, device: DeviceID) {
    state.programmer.remove_device(device);
    state.graph.remove_device(device);
    state.mac_tables.remove(&device);
    let backends = state.backends_at(device);
    state.balancer.mark_device_stale(device, &backends);
    info!(target:"forwarding", "device {} lost", device);
}

pub fn on_link_detected(state: &mut ControllerState, link: &Link) {
    if let crate::app::common::MergeResult::ADDED(()) = state.graph.add_link(link) {
        info!(target:"graph", "link {:?} <-> {:?}", link.src, link.dst);
    }
}

pub fn on_link_lost(state: &mut ControllerState, link: &Link) {
    state.graph.remove_link(link);
    info!(target:"graph", "link {:?} <-> {:?} removed", link.src, link.dst);
}

/// Rules a switch starts with: table-miss, IPv6 drop, and under the
/// fat-tree policy its tier routes.
pub fn proactive_flows(state: &ControllerState, device: DeviceID) -> Vec<Flow> {
    let config = &state.config;
    let fabric = &state.fabric;
    let mut flows = vec![
        Flow::new(PRIORITY_TABLE_MISS, FlowMatch::any()).action(FlowAction::Output(
            OutputPort::Controller {
                max_len: config.miss_send_len,
            },
        )),
        Flow::new(PRIORITY_IPV6_DROP, FlowMatch::ipv6()),
    ];
    if config.forwarding != ForwardingPolicy::FatTreeAware {
        return flows;
    }
    let host_rule = |ip: Ipv4Addr, port: u32| {
        Flow::new(PRIORITY_HOST, FlowMatch::ipv4().with_ipv4_dst(ip)).output(port)
    };
    match fabric.tier(device) {
        Some(Tier::Core) => {
            for ip in fabric.all_hosts() {
                if let Some(loc) = fabric.locate(ip) {
                    flows.push(host_rule(ip, fabric.core_port(loc.pod)));
                }
            }
        }
        Some(Tier::Aggregation) => {
            if let Some(pod) = fabric.pod_of(device) {
                for ip in fabric.hosts_of_pod(pod) {
                    if let Some(loc) = fabric.locate(ip) {
                        flows.push(host_rule(ip, fabric.edge_port(loc.edge_in_pod)));
                    }
                }
            }
        }
        Some(Tier::Edge) => {
            for ip in fabric.hosts_of_edge(device) {
                if let Some(loc) = fabric.locate(ip) {
                    flows.push(host_rule(ip, fabric.host_port(loc.slot)));
                }
            }
        }
        None => {}
    }
    if !state.balancer.balances_uplinks() {
        if let Some(uplink) = fabric.uplink_ports(device).first() {
            flows.push(Flow::new(PRIORITY_DEFAULT_UPLINK, FlowMatch::ipv4()).output(*uplink));
        }
    }
    flows
}

fn install_proactive(state: &mut ControllerState, device: DeviceID) -> Result<usize, DeviceError> {
    state.programmer.delete_flows(device, &FlowMatch::any())?;
    let flows = proactive_flows(state, device);
    let n = flows.len();
    for flow in flows {
        state.programmer.insert_flow(device, flow)?;
    }
    if state.config.forwarding == ForwardingPolicy::FatTreeAware && state.balancer.balances_uplinks() {
        let uplinks: Vec<(u32, u32)> = state
            .fabric
            .uplink_ports(device)
            .into_iter()
            .enumerate()
            .map(|(i, p)| (p, state.config.uplink_weight(i)))
            .collect();
        if !uplinks.is_empty() {
            state.balancer.init_uplinks(device, &uplinks);
        }
    }
    Ok(n)
}

/// Records where `ip` lives. A host-facing port always wins; anything seen
/// through a switch-to-switch port only fills a gap, at the location the
/// address scheme gives when there is one.
pub fn learn_host(state: &mut ControllerState, ip: Ipv4Addr, mac: MAC, from: ConnectPoint) {
    if ip.is_unspecified() || ip.is_broadcast() || ip == state.config.vip || mac.is_broadcast() {
        return;
    }
    let host_facing = match state.config.forwarding {
        ForwardingPolicy::FatTreeAware => state.fabric.is_host_port(from.device, from.port),
        ForwardingPolicy::LearningSwitch => state.graph.neighbor_at(from.device, from.port).is_none(),
    };
    if host_facing {
        state.hosts.learn(ip, mac, from);
    } else if !state.hosts.contains(ip) {
        if let Some(attachment) = state.fabric.host_attachment(ip) {
            state.hosts.learn(ip, mac, attachment);
        }
    }
}

/// Entry point for every packet-in.
pub fn on_packet(state: &mut ControllerState, packet: &PacketReceived) {
    let headers = match PacketHeaders::parse(packet.from.port, &packet.packet) {
        Ok(h) => h,
        Err(e) => {
            warn!(target:"forwarding", "dropping packet from {:?}: {}", packet.from, e);
            return;
        }
    };
    if headers.eth_type == ETHERNET_TYPE_LLDP
        || headers.eth_type == ETHERNET_TYPE_IPV6
        || headers.eth_dst.is_ipv6_multicast()
    {
        return;
    }
    if !headers.eth_src.is_broadcast() {
        state
            .mac_tables
            .entry(packet.from.device)
            .or_default()
            .insert(headers.eth_src, packet.from.port);
    }
    match headers.eth_type {
        ETHERNET_TYPE_ARP => proxyarp::on_arp_received(state, packet, &headers),
        ETHERNET_TYPE_IPV4 => on_ipv4(state, packet, &headers),
        other => {
            if state.config.forwarding == ForwardingPolicy::LearningSwitch {
                on_l2(state, packet, &headers);
            } else {
                debug!(target:"forwarding", "ignoring ethertype {:#06x} from {:?}", other, packet.from);
            }
        }
    }
}

fn on_ipv4(state: &mut ControllerState, packet: &PacketReceived, headers: &PacketHeaders) {
    let (src, dst) = match (headers.ipv4_src, headers.ipv4_dst) {
        (Some(s), Some(d)) => (s, d),
        _ => return,
    };
    learn_host(state, src, headers.eth_src, packet.from);
    debug!(target:"forwarding", "ipv4 {} -> {} at {:?}", src, dst, packet.from);

    if dst == state.config.vip {
        on_vip_packet(state, packet, headers, src);
        return;
    }
    match state.config.forwarding {
        ForwardingPolicy::LearningSwitch => on_l2(state, packet, headers),
        ForwardingPolicy::FatTreeAware => {
            if state.balancer.balances_uplinks() && needs_uplink(state, packet.from, dst) {
                on_balanced_uplink(state, packet, headers);
            } else {
                route_direct(state, packet, src, dst);
            }
        }
    }
}

// Remote-bound traffic entering from below at an edge or aggregation switch.
fn needs_uplink(state: &ControllerState, from: ConnectPoint, dst: Ipv4Addr) -> bool {
    let fabric = &state.fabric;
    let loc = match fabric.locate(dst) {
        Some(loc) => loc,
        None => return false,
    };
    match fabric.tier(from.device) {
        Some(Tier::Edge) => {
            fabric.is_host_port(from.device, from.port)
                && fabric.edge(loc.pod, loc.edge_in_pod) != from.device
        }
        Some(Tier::Aggregation) => {
            !fabric.is_uplink(from.device, from.port) && fabric.pod_of(from.device) != Some(loc.pod)
        }
        _ => false,
    }
}

/// A packet-out toward `device`, paired with the switch it goes to. The
/// switch buffer and ingress port only mean something on the switch that
/// raised the packet-in. A buffered packet-in holds a truncated copy, so
/// it is never re-injected elsewhere; the origin drops its buffer instead.
pub fn packet_out_for(
    packet: &PacketReceived,
    device: DeviceID,
    actions: FlowActions,
) -> (DeviceID, PacketOut) {
    let origin = packet.from.device;
    match packet.buffer_id {
        Some(id) if origin == device => (
            device,
            PacketOut {
                buffer_id: Some(id),
                in_port: Some(packet.from.port),
                actions,
                payload: Bytes::new(),
            },
        ),
        Some(id) => {
            debug!(target:"forwarding", "releasing buffer {} on {}, path starts at {}", id, origin, device);
            (
                origin,
                PacketOut {
                    buffer_id: Some(id),
                    in_port: Some(packet.from.port),
                    actions: FlowActions::new(),
                    payload: Bytes::new(),
                },
            )
        }
        None if origin == device => (
            device,
            PacketOut {
                buffer_id: None,
                in_port: Some(packet.from.port),
                actions,
                payload: packet.packet.clone(),
            },
        ),
        None => (
            device,
            PacketOut {
                buffer_id: None,
                in_port: None,
                actions,
                payload: packet.packet.clone(),
            },
        ),
    }
}

/// Installs `chain` hop by hop. A hop that cannot be programmed ends the
/// chain; the rest is skipped.
pub fn install_chain(state: &mut ControllerState, chain: Vec<(DeviceID, Flow)>) -> usize {
    let mut installed = 0;
    for (device, flow) in chain {
        if let Err(e) = state.programmer.insert_flow(device, flow) {
            warn!(target:"forwarding", "skipping rest of chain: {}", e);
            break;
        }
        installed += 1;
    }
    installed
}

/// Rules for `src -> dst` along `path` (which starts at `src`'s switch)
/// followed by the rules for the way back. `None` if a hop lost its link.
pub fn direct_chains(
    graph: &TopologyGraph,
    path: &Path,
    src: &Host,
    dst: &Host,
    idle_timeout: u16,
) -> Option<(Vec<(DeviceID, Flow)>, Vec<(DeviceID, Flow)>)> {
    let hops = &path.devices;
    let last = hops.len().checked_sub(1)?;
    let rule = |from: Ipv4Addr, to: Ipv4Addr, port: u32| {
        Flow::new(
            PRIORITY_DIRECT,
            FlowMatch::ipv4().with_ipv4_src(from).with_ipv4_dst(to),
        )
        .output(port)
        .with_idle_timeout(idle_timeout)
    };
    let mut forward = Vec::with_capacity(hops.len());
    for (i, device) in hops.iter().enumerate() {
        let port = if i == last {
            dst.location.port
        } else {
            graph.port_towards(*device, hops[i + 1])?
        };
        forward.push((*device, rule(src.ip, dst.ip, port)));
    }
    let mut reverse = Vec::with_capacity(hops.len());
    for (i, device) in hops.iter().enumerate().rev() {
        let port = if i == 0 {
            src.location.port
        } else {
            graph.port_towards(*device, hops[i - 1])?
        };
        reverse.push((*device, rule(dst.ip, src.ip, port)));
    }
    Some((forward, reverse))
}

fn route_direct(state: &mut ControllerState, packet: &PacketReceived, src: Ipv4Addr, dst: Ipv4Addr) {
    let dst_host = match state.hosts.lookup(dst) {
        Some(h) => *h,
        None => {
            unknown_destination(state, packet, dst);
            return;
        }
    };
    let src_host = match state.hosts.lookup(src) {
        Some(h) => *h,
        None => {
            warn!(target:"forwarding", "source {} has no known attachment, dropping", src);
            return;
        }
    };
    let path = match state
        .graph
        .first_path(src_host.location.device, dst_host.location.device)
    {
        Some(p) => p,
        None => {
            warn!(target:"forwarding", "no path {} -> {}, dropping", src, dst);
            return;
        }
    };
    let (forward, reverse) = match direct_chains(
        &state.graph,
        &path,
        &src_host,
        &dst_host,
        state.config.flow_idle_timeout,
    ) {
        Some(chains) => chains,
        None => return,
    };
    let first = forward.first().map(|(d, f)| (*d, f.actions.clone()));
    install_chain(state, forward);
    install_chain(state, reverse);
    info!(target:"forwarding", "path {} -> {} via {:?}", src, dst, path.devices);
    if let Some((device, actions)) = first {
        let (device, out) = packet_out_for(packet, device, actions);
        if let Err(e) = state.programmer.send_packet(device, out) {
            warn!(target:"forwarding", "packet-out failed: {}", e);
        }
    }
}

fn unknown_destination(state: &mut ControllerState, packet: &PacketReceived, dst: Ipv4Addr) {
    match state.config.unknown_destination {
        UnknownDestination::Drop => {
            warn!(target:"forwarding", "unknown destination {}, dropping", dst);
        }
        UnknownDestination::Flood => {
            debug!(target:"forwarding", "unknown destination {}, flooding", dst);
            let (device, out) = packet_out_for(
                packet,
                packet.from.device,
                smallvec![FlowAction::Output(OutputPort::Flood)],
            );
            if let Err(e) = state.programmer.send_packet(device, out) {
                warn!(target:"forwarding", "packet-out failed: {}", e);
            }
        }
    }
}

fn on_vip_packet(state: &mut ControllerState, packet: &PacketReceived, headers: &PacketHeaders, client_ip: Ipv4Addr) {
    let client = match state.hosts.lookup(client_ip) {
        Some(h) => Host {
            mac: headers.eth_src,
            ..*h
        },
        None => {
            warn!(target:"nat", "VIP client {} has no known attachment", client_ip);
            return;
        }
    };
    let backend_ip = match state.balancer.select_backend() {
        Some(ip) => ip,
        None => {
            warn!(target:"nat", "no backend for VIP traffic from {}", client_ip);
            return;
        }
    };
    let backend = match state.hosts.lookup(backend_ip) {
        Some(h) => *h,
        None => {
            warn!(target:"nat", "backend {} not learned yet, dropping", backend_ip);
            state.balancer.release_backend(backend_ip);
            return;
        }
    };
    let service = nat::VirtualService {
        vip: state.config.vip,
        vip_mac: state.config.vip_mac,
        idle_timeout: state.config.balanced_idle_timeout,
        notify_removal: state.balancer.tracks_connections(),
    };
    let chains = state
        .graph
        .first_path(client.location.device, backend.location.device)
        .and_then(|path| nat::nat_chains(&state.graph, &path, &client, &backend, &service));
    let chains = match chains {
        Some(c) => c,
        None => {
            warn!(target:"nat", "no path {} -> backend {}, dropping", client_ip, backend_ip);
            state.balancer.release_backend(backend_ip);
            return;
        }
    };
    let first = chains.forward.first().map(|(d, f)| (*d, f.actions.clone()));
    install_chain(state, chains.forward);
    install_chain(state, chains.reverse);
    info!(target:"nat", "VIP flow {} -> {} ({})", client_ip, backend_ip, backend.mac);
    if let Some((device, actions)) = first {
        let (device, out) = packet_out_for(packet, device, actions);
        if let Err(e) = state.programmer.send_packet(device, out) {
            warn!(target:"nat", "packet-out failed: {}", e);
        }
    }
}

fn on_balanced_uplink(state: &mut ControllerState, packet: &PacketReceived, headers: &PacketHeaders) {
    let device = packet.from.device;
    let port = match state.balancer.select_port(device) {
        Some(p) => p,
        None => {
            warn!(target:"forwarding", "no uplink to balance on {}", device);
            return;
        }
    };
    let mut matches = FlowMatch::ipv4();
    matches.ipv4_src = headers.ipv4_src;
    matches.ipv4_dst = headers.ipv4_dst;
    matches.ip_proto = headers.ip_proto;
    matches.tp_src = headers.tp_src;
    matches.tp_dst = headers.tp_dst;
    let mut flow = Flow::new(PRIORITY_BALANCED, matches)
        .output(port)
        .with_idle_timeout(state.config.balanced_idle_timeout);
    if state.balancer.tracks_connections() {
        flow = flow.with_notify_removal();
    }
    let actions = flow.actions.clone();
    if let Err(e) = state.programmer.insert_flow(device, flow) {
        warn!(target:"forwarding", "balanced rule on {} failed: {}", device, e);
        state.balancer.release_port(device, port);
        return;
    }
    let (device, out) = packet_out_for(packet, device, actions);
    if let Err(e) = state.programmer.send_packet(device, out) {
        warn!(target:"forwarding", "packet-out failed: {}", e);
    }
}

fn on_l2(state: &mut ControllerState, packet: &PacketReceived, headers: &PacketHeaders) {
    let device = packet.from.device;
    let known = state
        .mac_tables
        .get(&device)
        .and_then(|t| t.get(&headers.eth_dst))
        .copied();
    let port = match known {
        Some(p) if p == packet.from.port => return,
        Some(p) => p,
        None => {
            if let Some(ip) = headers.ipv4_dst {
                unknown_destination(state, packet, ip);
            } else if state.config.unknown_destination == UnknownDestination::Flood {
                let (device, out) =
                    packet_out_for(packet, device, smallvec![FlowAction::Output(OutputPort::Flood)]);
                if let Err(e) = state.programmer.send_packet(device, out) {
                    warn!(target:"forwarding", "packet-out failed: {}", e);
                }
            }
            return;
        }
    };
    let flow = Flow::new(
        PRIORITY_LEARNING,
        FlowMatch::any()
            .with_in_port(packet.from.port)
            .with_eth_src(headers.eth_src)
            .with_eth_dst(headers.eth_dst),
    )
    .output(port)
    .with_idle_timeout(state.config.flow_idle_timeout);
    let actions = flow.actions.clone();
    if let Err(e) = state.programmer.insert_flow(device, flow) {
        warn!(target:"forwarding", "learning rule on {} failed: {}", device, e);
        return;
    }
    let (device, out) = packet_out_for(packet, device, actions);
    if let Err(e) = state.programmer.send_packet(device, out) {
        warn!(target:"forwarding", "packet-out failed: {}", e);
    }
}
