use crate::app::graph::{Path, TopologyGraph};
use crate::representation::{DeviceID, Host};
use crate::util::flow::{Flow, FlowMatch, SetField, PRIORITY_NAT};
use crate::util::MAC;
use std::net::Ipv4Addr;

/// Identity the backends hide behind, plus how their rules age.
#[derive(Debug, Clone, Copy)]
pub struct VirtualService {
    pub vip: Ipv4Addr,
    pub vip_mac: MAC,
    pub idle_timeout: u16,
    pub notify_removal: bool,
}

#[derive(Debug, Clone)]
pub struct NatChains {
    /// Client switch first.
    pub forward: Vec<(DeviceID, Flow)>,
    /// Backend switch first.
    pub reverse: Vec<(DeviceID, Flow)>,
}

/// Rewrite chains for `client <-> VIP` served by `backend`, along `path`
/// from the client's switch to the backend's.
///
/// Forward traffic keeps `client -> VIP` until the last hop swaps in the
/// backend's addresses. Replies are masked as the VIP on the first hop, so
/// the remaining hops match `VIP -> client`; the last one restores the
/// client's MAC. `None` if a hop has no link to its successor.
pub fn nat_chains(
    graph: &TopologyGraph,
    path: &Path,
    client: &Host,
    backend: &Host,
    service: &VirtualService,
) -> Option<NatChains> {
    let hops = &path.devices;
    let last = hops.len().checked_sub(1)?;
    let new_flow = |matches: FlowMatch| {
        let flow = Flow::new(PRIORITY_NAT, matches).with_idle_timeout(service.idle_timeout);
        if service.notify_removal {
            flow.with_notify_removal()
        } else {
            flow
        }
    };

    let mut forward = Vec::with_capacity(hops.len());
    for (i, device) in hops.iter().enumerate() {
        let flow = new_flow(
            FlowMatch::ipv4()
                .with_ipv4_src(client.ip)
                .with_ipv4_dst(service.vip),
        );
        let flow = if i == last {
            flow.set_field(SetField::Ipv4Dst(backend.ip))
                .set_field(SetField::EthDst(backend.mac))
                .output(backend.location.port)
        } else {
            flow.output(graph.port_towards(*device, hops[i + 1])?)
        };
        forward.push((*device, flow));
    }

    let mut reverse = Vec::with_capacity(hops.len());
    for (i, device) in hops.iter().enumerate().rev() {
        let mut flow = if i == last {
            new_flow(
                FlowMatch::ipv4()
                    .with_ipv4_src(backend.ip)
                    .with_ipv4_dst(client.ip),
            )
            .set_field(SetField::Ipv4Src(service.vip))
            .set_field(SetField::EthSrc(service.vip_mac))
        } else {
            new_flow(
                FlowMatch::ipv4()
                    .with_ipv4_src(service.vip)
                    .with_ipv4_dst(client.ip),
            )
        };
        flow = if i == 0 {
            flow.set_field(SetField::EthDst(client.mac))
                .output(client.location.port)
        } else {
            flow.output(graph.port_towards(*device, hops[i - 1])?)
        };
        reverse.push((*device, flow));
    }
    Some(NatChains { forward, reverse })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::representation::{ConnectPoint, Link};
    use crate::util::flow::{FlowAction, OutputPort};

    fn host(n: u8, device: u64, port: u32) -> Host {
        Host {
            ip: Ipv4Addr::new(10, 0, 0, n),
            mac: MAC([0, 0, 0, 0, 0, n]),
            location: ConnectPoint {
                device: DeviceID(device),
                port,
            },
        }
    }

    fn service() -> VirtualService {
        VirtualService {
            vip: Ipv4Addr::new(10, 0, 0, 100),
            vip_mac: MAC([0, 0, 0, 0, 1, 0]),
            idle_timeout: 60,
            notify_removal: true,
        }
    }

    #[test]
    fn co_located_collapses_to_one_rule_each_way() {
        let mut graph = TopologyGraph::new();
        graph.add_device(DeviceID(13));
        let path = graph.first_path(DeviceID(13), DeviceID(13)).unwrap();
        let client = host(2, 13, 2);
        let backend = host(1, 13, 1);
        let chains = nat_chains(&graph, &path, &client, &backend, &service()).unwrap();
        assert_eq!(chains.forward.len(), 1);
        assert_eq!(chains.reverse.len(), 1);
        let reverse = &chains.reverse[0].1;
        assert_eq!(
            reverse.actions.to_vec(),
            vec![
                FlowAction::SetField(SetField::Ipv4Src(Ipv4Addr::new(10, 0, 0, 100))),
                FlowAction::SetField(SetField::EthSrc(MAC([0, 0, 0, 0, 1, 0]))),
                FlowAction::SetField(SetField::EthDst(MAC([0, 0, 0, 0, 0, 2]))),
                FlowAction::Output(OutputPort::Physical(2)),
            ]
        );
        assert_eq!(chains.forward[0].1.rewritten_ipv4_dst(), Some(backend.ip));
        assert!(chains.forward[0].1.notify_removal);
    }

    #[test]
    fn intermediate_hops_match_masked_reply() {
        let mut graph = TopologyGraph::new();
        graph.add_link(&Link::new(DeviceID(13), 3, DeviceID(5), 1));
        graph.add_link(&Link::new(DeviceID(5), 2, DeviceID(14), 3));
        let path = graph.first_path(DeviceID(14), DeviceID(13)).unwrap();
        let client = host(3, 14, 1);
        let backend = host(1, 13, 1);
        let chains = nat_chains(&graph, &path, &client, &backend, &service()).unwrap();
        let devices: Vec<DeviceID> = chains.reverse.iter().map(|(d, _)| *d).collect();
        assert_eq!(devices, vec![DeviceID(13), DeviceID(5), DeviceID(14)]);
        assert_eq!(chains.reverse[0].1.matches.ipv4_src, Some(backend.ip));
        assert_eq!(chains.reverse[1].1.matches.ipv4_src, Some(service().vip));
        assert_eq!(chains.reverse[1].1.output_ports().collect::<Vec<_>>(), vec![2]);
        assert_eq!(chains.forward[1].1.output_ports().collect::<Vec<_>>(), vec![1]);
        assert!(chains.forward[1].1.rewritten_ipv4_dst().is_none());
    }
}
