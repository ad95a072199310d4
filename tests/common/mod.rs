#![allow(dead_code)]

use bytes::Bytes;
use rusty_fabric::app::common::ControllerState;
use rusty_fabric::core::connection::{ChannelConnection, PacketOut, SwitchRequest};
use rusty_fabric::event::{CoreEvent, PacketReceived};
use rusty_fabric::representation::{ConnectPoint, DeviceID};
use rusty_fabric::util::flow::{FlowAction, OutputPort, PacketHeaders};
use rusty_fabric::util::MAC;
use rusty_fabric::{Controller, FabricApp, FabricConfig};
use rusty_fabric_packet::packet::arp::{ArpOp, ETHERNET_TYPE_ARP};
use rusty_fabric_packet::packet::ethernet::ETHERNET_TYPE_IPV4;
use rusty_fabric_packet::packet::ipv4::IP_PROTOCOL_TCP;
use rusty_fabric_packet::packet::{Arp, Ethernet, Ipv4, Packet, TransportPorts};
use std::net::Ipv4Addr;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub fn init_logger() {
    let _ = flexi_logger::Logger::with_str("debug").start();
}

pub fn ip(n: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, n)
}

pub fn mac(n: u8) -> MAC {
    MAC([0, 0, 0, 0, 0, n])
}

pub fn cp(device: u64, port: u32) -> ConnectPoint {
    ConnectPoint {
        device: DeviceID(device),
        port,
    }
}

pub fn arp_request(sender: u8, target: Ipv4Addr) -> Bytes {
    let sender_mac = mac(sender);
    let sender_ip = ip(sender).octets();
    let target_ip = target.octets();
    let broadcast = MAC::broadcast();
    let frame = Ethernet {
        dst: broadcast.as_ref(),
        src: sender_mac.as_ref(),
        ether_type: ETHERNET_TYPE_ARP,
        payload: Arp::ipv4(
            ArpOp::Request,
            sender_mac.as_ref(),
            &sender_ip,
            MAC::zero().as_ref(),
            &target_ip,
        ),
    }
    .to_bytes();
    frame
}

pub fn tcp(
    src_mac: MAC,
    src: Ipv4Addr,
    dst_mac: MAC,
    dst: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
) -> Bytes {
    let s = src.octets();
    let d = dst.octets();
    let frame = Ethernet {
        dst: dst_mac.as_ref(),
        src: src_mac.as_ref(),
        ether_type: ETHERNET_TYPE_IPV4,
        payload: Ipv4::new(
            &s,
            &d,
            IP_PROTOCOL_TCP,
            TransportPorts::new(src_port, dst_port),
        ),
    }
    .to_bytes();
    frame
}

/// A controller wired to every switch of the reference fat-tree through
/// recording channels.
pub struct Fabric {
    pub controller: Controller,
    pub requests: UnboundedReceiver<(DeviceID, SwitchRequest)>,
    pub sender: UnboundedSender<(DeviceID, SwitchRequest)>,
}

impl Fabric {
    pub fn new(config: FabricConfig) -> Fabric {
        init_logger();
        let fabric = config.fabric();
        let mut controller = Controller::new(config).unwrap();
        let (sender, requests) = unbounded_channel();
        for device in fabric.devices() {
            controller.handle(CoreEvent::DeviceAdded {
                device,
                connection: Box::new(ChannelConnection::new(device, sender.clone())),
            });
        }
        for link in fabric.reference_links() {
            controller.handle(CoreEvent::LinkDetected(link));
        }
        let mut f = Fabric {
            controller,
            requests,
            sender,
        };
        f.drain();
        f
    }

    pub fn drain(&mut self) -> Vec<(DeviceID, SwitchRequest)> {
        let mut out = Vec::new();
        while let Ok(r) = self.requests.try_recv() {
            out.push(r);
        }
        out
    }

    pub fn handle(&mut self, event: CoreEvent) -> Vec<(DeviceID, SwitchRequest)> {
        self.controller.handle(event);
        self.drain()
    }

    pub fn packet_in(&mut self, from: ConnectPoint, packet: Bytes) -> Vec<(DeviceID, SwitchRequest)> {
        self.handle(CoreEvent::PacketReceived(PacketReceived {
            packet,
            from,
            buffer_id: None,
        }))
    }

    /// Lets host `n` announce itself with an ARP request from its port.
    pub fn announce(&mut self, n: u8, target: Ipv4Addr) {
        let at = self.controller.state().lock().fabric.host_attachment(ip(n));
        if let Some(at) = at {
            self.packet_in(at, arp_request(n, target));
        }
    }
}

pub fn packet_outs(requests: &[(DeviceID, SwitchRequest)]) -> Vec<(DeviceID, PacketOut)> {
    requests
        .iter()
        .filter_map(|(d, r)| match r {
            SwitchRequest::PacketOut(p) => Some((*d, p.clone())),
            _ => None,
        })
        .collect()
}

pub fn flow_mods(requests: &[(DeviceID, SwitchRequest)]) -> Vec<(DeviceID, rusty_fabric::util::flow::Flow)> {
    requests
        .iter()
        .filter_map(|(d, r)| match r {
            SwitchRequest::FlowMod(f) => Some((*d, f.clone())),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Host(ConnectPoint, PacketHeaders),
    Controller(DeviceID),
    Dropped(DeviceID),
    Loop,
}

/// Follows a packet through the mirrored flow tables, hop by hop.
pub fn walk(state: &ControllerState, start: ConnectPoint, mut headers: PacketHeaders) -> Delivery {
    let mut at = start;
    headers.in_port = start.port;
    for _ in 0..16 {
        let flow = match state
            .programmer
            .flow_table(at.device)
            .and_then(|t| t.lookup(&headers))
        {
            Some(f) => f.clone(),
            None => return Delivery::Dropped(at.device),
        };
        let mut out = None;
        for action in flow.actions.iter() {
            match action {
                FlowAction::SetField(field) => headers.apply(field),
                FlowAction::Output(OutputPort::Physical(p)) => out = Some(*p),
                FlowAction::Output(OutputPort::Controller { .. }) => {
                    return Delivery::Controller(at.device)
                }
                FlowAction::Output(_) => {}
            }
        }
        let port = match out {
            Some(p) => p,
            None => return Delivery::Dropped(at.device),
        };
        match state.graph.neighbor_at(at.device, port) {
            Some(next) => {
                let in_port = match state.graph.port_towards(next, at.device) {
                    Some(p) => p,
                    None => return Delivery::Dropped(next),
                };
                at = ConnectPoint {
                    device: next,
                    port: in_port,
                };
                headers.in_port = in_port;
            }
            None => {
                return Delivery::Host(
                    ConnectPoint {
                        device: at.device,
                        port,
                    },
                    headers,
                )
            }
        }
    }
    Delivery::Loop
}

pub fn tcp_headers(src_mac: MAC, src: Ipv4Addr, dst_mac: MAC, dst: Ipv4Addr) -> PacketHeaders {
    PacketHeaders::parse(0, &tcp(src_mac, src, dst_mac, dst, 40000, 80)).unwrap()
}
