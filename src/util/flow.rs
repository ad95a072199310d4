use crate::error::PacketError;
use crate::util::MAC;
use rusty_fabric_packet::packet::ethernet::{ETHERNET_TYPE_IPV4, ETHERNET_TYPE_IPV6};
use rusty_fabric_packet::packet::ipv4::{IP_PROTOCOL_TCP, IP_PROTOCOL_UDP};
use rusty_fabric_packet::packet::{Ethernet, Ipv4, Packet, TransportPorts};
use smallvec::SmallVec;
use std::net::Ipv4Addr;

pub const PRIORITY_IPV6_DROP: u16 = 200;
pub const PRIORITY_NAT: u16 = 150;
pub const PRIORITY_DIRECT: u16 = 110;
pub const PRIORITY_HOST: u16 = 100;
pub const PRIORITY_BALANCED: u16 = 60;
pub const PRIORITY_DEFAULT_UPLINK: u16 = 50;
pub const PRIORITY_LEARNING: u16 = 10;
pub const PRIORITY_TABLE_MISS: u16 = 0;

/// Match predicate of a rule. `None` fields are wildcards.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FlowMatch {
    pub in_port: Option<u32>,
    pub eth_type: Option<u16>,
    pub eth_src: Option<MAC>,
    pub eth_dst: Option<MAC>,
    pub ipv4_src: Option<Ipv4Addr>,
    pub ipv4_dst: Option<Ipv4Addr>,
    pub ip_proto: Option<u8>,
    pub tp_src: Option<u16>,
    pub tp_dst: Option<u16>,
}

impl FlowMatch {
    pub fn any() -> FlowMatch {
        FlowMatch::default()
    }

    pub fn eth_type(eth_type: u16) -> FlowMatch {
        FlowMatch {
            eth_type: Some(eth_type),
            ..Default::default()
        }
    }

    pub fn ipv4() -> FlowMatch {
        FlowMatch::eth_type(ETHERNET_TYPE_IPV4)
    }

    pub fn ipv6() -> FlowMatch {
        FlowMatch::eth_type(ETHERNET_TYPE_IPV6)
    }

    pub fn with_in_port(mut self, port: u32) -> Self {
        self.in_port = Some(port);
        self
    }

    pub fn with_eth_src(mut self, mac: MAC) -> Self {
        self.eth_src = Some(mac);
        self
    }

    pub fn with_eth_dst(mut self, mac: MAC) -> Self {
        self.eth_dst = Some(mac);
        self
    }

    pub fn with_ipv4_src(mut self, ip: Ipv4Addr) -> Self {
        self.ipv4_src = Some(ip);
        self
    }

    pub fn with_ipv4_dst(mut self, ip: Ipv4Addr) -> Self {
        self.ipv4_dst = Some(ip);
        self
    }

    pub fn with_ip_proto(mut self, proto: u8) -> Self {
        self.ip_proto = Some(proto);
        self
    }

    pub fn with_tp_dst(mut self, port: u16) -> Self {
        self.tp_dst = Some(port);
        self
    }

    pub fn is_match(&self, headers: &PacketHeaders) -> bool {
        fn check<T: PartialEq>(want: &Option<T>, got: Option<T>) -> bool {
            match want {
                Some(w) => got.as_ref() == Some(w),
                None => true,
            }
        }
        check(&self.in_port, Some(headers.in_port))
            && check(&self.eth_type, Some(headers.eth_type))
            && check(&self.eth_src, Some(headers.eth_src))
            && check(&self.eth_dst, Some(headers.eth_dst))
            && check(&self.ipv4_src, headers.ipv4_src)
            && check(&self.ipv4_dst, headers.ipv4_dst)
            && check(&self.ip_proto, headers.ip_proto)
            && check(&self.tp_src, headers.tp_src)
            && check(&self.tp_dst, headers.tp_dst)
    }

    /// Non-strict containment: every field pinned by `self` is pinned to the
    /// same value in `other`. This is how a flow delete selects its victims.
    pub fn covers(&self, other: &FlowMatch) -> bool {
        fn check<T: PartialEq>(want: &Option<T>, got: &Option<T>) -> bool {
            want.is_none() || want == got
        }
        check(&self.in_port, &other.in_port)
            && check(&self.eth_type, &other.eth_type)
            && check(&self.eth_src, &other.eth_src)
            && check(&self.eth_dst, &other.eth_dst)
            && check(&self.ipv4_src, &other.ipv4_src)
            && check(&self.ipv4_dst, &other.ipv4_dst)
            && check(&self.ip_proto, &other.ip_proto)
            && check(&self.tp_src, &other.tp_src)
            && check(&self.tp_dst, &other.tp_dst)
    }
}

/// Header fields a rule can match on, lifted out of a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketHeaders {
    pub in_port: u32,
    pub eth_src: MAC,
    pub eth_dst: MAC,
    pub eth_type: u16,
    pub ipv4_src: Option<Ipv4Addr>,
    pub ipv4_dst: Option<Ipv4Addr>,
    pub ip_proto: Option<u8>,
    pub tp_src: Option<u16>,
    pub tp_dst: Option<u16>,
}

impl PacketHeaders {
    pub fn parse(in_port: u32, frame: &[u8]) -> Result<PacketHeaders, PacketError> {
        let eth = Ethernet::<&[u8]>::parse(frame).ok_or(PacketError::Malformed("ethernet"))?;
        let mut headers = PacketHeaders {
            in_port,
            eth_src: eth.get_src_mac(),
            eth_dst: eth.get_dst_mac(),
            eth_type: eth.ether_type,
            ipv4_src: None,
            ipv4_dst: None,
            ip_proto: None,
            tp_src: None,
            tp_dst: None,
        };
        if eth.ether_type == ETHERNET_TYPE_IPV4 {
            let ip = Ipv4::<&[u8]>::parse(eth.payload).ok_or(PacketError::Malformed("ipv4"))?;
            headers.ipv4_src = Some(ip.get_src());
            headers.ipv4_dst = Some(ip.get_dst());
            headers.ip_proto = Some(ip.protocol());
            if ip.protocol() == IP_PROTOCOL_TCP || ip.protocol() == IP_PROTOCOL_UDP {
                // truncated packet-ins may cut the transport header short
                if let Some(ports) = TransportPorts::parse(ip.payload) {
                    headers.tp_src = Some(ports.src_port);
                    headers.tp_dst = Some(ports.dst_port);
                }
            }
        }
        Ok(headers)
    }

    pub fn apply(&mut self, field: &SetField) {
        match field {
            SetField::EthSrc(mac) => self.eth_src = *mac,
            SetField::EthDst(mac) => self.eth_dst = *mac,
            SetField::Ipv4Src(ip) => self.ipv4_src = Some(*ip),
            SetField::Ipv4Dst(ip) => self.ipv4_dst = Some(*ip),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OutputPort {
    Physical(u32),
    Controller { max_len: u16 },
    Flood,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SetField {
    EthSrc(MAC),
    EthDst(MAC),
    Ipv4Src(Ipv4Addr),
    Ipv4Dst(Ipv4Addr),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FlowAction {
    Output(OutputPort),
    SetField(SetField),
}

pub type FlowActions = SmallVec<[FlowAction; 4]>;

/// A match-action rule as pushed with a flow-mod. An empty action list drops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flow {
    pub priority: u16,
    pub matches: FlowMatch,
    pub actions: FlowActions,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub notify_removal: bool,
}

impl Flow {
    pub fn new(priority: u16, matches: FlowMatch) -> Flow {
        Flow {
            priority,
            matches,
            actions: SmallVec::new(),
            idle_timeout: 0,
            hard_timeout: 0,
            notify_removal: false,
        }
    }

    pub fn action(mut self, action: FlowAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn output(self, port: u32) -> Self {
        self.action(FlowAction::Output(OutputPort::Physical(port)))
    }

    pub fn set_field(self, field: SetField) -> Self {
        self.action(FlowAction::SetField(field))
    }

    pub fn with_idle_timeout(mut self, seconds: u16) -> Self {
        self.idle_timeout = seconds;
        self
    }

    pub fn with_notify_removal(mut self) -> Self {
        self.notify_removal = true;
        self
    }

    pub fn is_drop(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn output_ports(&self) -> impl Iterator<Item = u32> + '_ {
        self.actions.iter().filter_map(|a| match a {
            FlowAction::Output(OutputPort::Physical(p)) => Some(*p),
            _ => None,
        })
    }

    pub fn rewritten_ipv4_dst(&self) -> Option<Ipv4Addr> {
        self.actions.iter().find_map(|a| match a {
            FlowAction::SetField(SetField::Ipv4Dst(ip)) => Some(*ip),
            _ => None,
        })
    }

    fn same_rule(&self, other: &Flow) -> bool {
        self.priority == other.priority && self.matches == other.matches
    }
}

/// Controller-side mirror of one switch's flow table.
#[derive(Clone, Debug, Default)]
pub struct FlowTable {
    flows: Vec<Flow>,
}

impl FlowTable {
    /// An add with identical priority and match replaces the old rule.
    pub fn insert(&mut self, flow: Flow) -> Option<Flow> {
        match self.flows.iter().position(|f| f.same_rule(&flow)) {
            Some(i) => Some(std::mem::replace(&mut self.flows[i], flow)),
            None => {
                self.flows.push(flow);
                None
            }
        }
    }

    pub fn delete(&mut self, filter: &FlowMatch) -> Vec<Flow> {
        let (removed, kept): (Vec<Flow>, Vec<Flow>) = self
            .flows
            .drain(..)
            .partition(|f| filter.covers(&f.matches));
        self.flows = kept;
        removed
    }

    pub fn remove_exact(&mut self, flow: &Flow) -> bool {
        match self.flows.iter().position(|f| f.same_rule(flow)) {
            Some(i) => {
                self.flows.remove(i);
                true
            }
            None => false,
        }
    }

    /// Highest priority wins; among equals the earliest installed.
    pub fn lookup(&self, headers: &PacketHeaders) -> Option<&Flow> {
        let mut best: Option<&Flow> = None;
        for flow in self.flows.iter().filter(|f| f.matches.is_match(headers)) {
            match best {
                Some(b) if b.priority >= flow.priority => {}
                _ => best = Some(flow),
            }
        }
        best
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flow> {
        self.flows.iter()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
