use super::Packet;
use crate::MAC;
use bytes::BufMut;
use nom::bytes::complete::take;
use nom::number::complete::{be_u8, be_u16};
use std::net::Ipv4Addr;

pub const ETHERNET_TYPE_ARP: u16 = 0x806;

#[derive(Debug, Clone)]
pub struct Arp<'a> {
    pub hw_type: u16,
    pub proto_type: u16,
    pub hw_addr_len: u8,
    pub proto_addr_len: u8,
    pub opcode: ArpOp,
    pub sender_mac: &'a [u8],
    pub sender_ip: &'a [u8],
    pub target_mac: &'a [u8],
    pub target_ip: &'a [u8],
}

impl<'a> Arp<'a> {
    /// An Ethernet/IPv4 ARP body; addresses are borrowed from the caller.
    pub fn ipv4(
        opcode: ArpOp,
        sender_mac: &'a [u8],
        sender_ip: &'a [u8],
        target_mac: &'a [u8],
        target_ip: &'a [u8],
    ) -> Arp<'a> {
        Arp {
            hw_type: 1,
            proto_type: 0x800,
            hw_addr_len: 6,
            proto_addr_len: 4,
            opcode,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        }
    }

    pub fn get_sender_mac(&self) -> Option<MAC> {
        MAC::from_slice(self.sender_mac)
    }

    pub fn get_sender_ipv4(&self) -> Option<Ipv4Addr> {
        to_ipv4(self.proto_addr_len, self.sender_ip)
    }

    pub fn get_target_ipv4(&self) -> Option<Ipv4Addr> {
        to_ipv4(self.proto_addr_len, self.target_ip)
    }
}

fn to_ipv4(len: u8, b: &[u8]) -> Option<Ipv4Addr> {
    if len != 4 || b.len() != 4 {
        return None;
    }
    let mut s = [0u8; 4];
    s.clone_from_slice(b);
    Some(Ipv4Addr::from(s))
}

impl<'a> Packet<'a> for Arp<'a> {
    type Inner = ();

    fn parse(b: &'a [u8]) -> Option<Self> {
        let (b, hw_type) = be_u16::<_, ()>(b).ok()?;
        let (b, proto_type) = be_u16::<_, ()>(b).ok()?;
        let (b, hw_addr_len) = be_u8::<_, ()>(b).ok()?;
        let (b, proto_addr_len) = be_u8::<_, ()>(b).ok()?;
        let (b, opcode) = be_u16::<_, ()>(b).ok()?;
        let opcode = ArpOp::from(opcode);
        let (b, sender_mac) = take::<_, _, ()>(hw_addr_len)(b).ok()?;
        let (b, sender_ip) = take::<_, _, ()>(proto_addr_len)(b).ok()?;
        let (b, target_mac) = take::<_, _, ()>(hw_addr_len)(b).ok()?;
        let (_b, target_ip) = take::<_, _, ()>(proto_addr_len)(b).ok()?;
        Some(Arp {
            hw_type,
            proto_type,
            hw_addr_len,
            proto_addr_len,
            opcode,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        })
    }

    fn header_len(&self) -> usize {
        8 + 2 * self.hw_addr_len as usize + 2 * self.proto_addr_len as usize
    }

    fn put_header<B: BufMut>(&self, buf: &mut B) {
        buf.put_u16(self.hw_type);
        buf.put_u16(self.proto_type);
        buf.put_u8(self.hw_addr_len);
        buf.put_u8(self.proto_addr_len);
        buf.put_u16(self.opcode.into());
        buf.put_slice(self.sender_mac);
        buf.put_slice(self.sender_ip);
        buf.put_slice(self.target_mac);
        buf.put_slice(self.target_ip);
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ArpOp {
    Request,
    Reply,
    Unknown(u16),
}

impl From<u16> for ArpOp {
    fn from(op: u16) -> Self {
        match op {
            0x1 => ArpOp::Request,
            0x2 => ArpOp::Reply,
            other => ArpOp::Unknown(other),
        }
    }
}

impl From<ArpOp> for u16 {
    fn from(op: ArpOp) -> Self {
        match op {
            ArpOp::Request => 0x1,
            ArpOp::Reply => 0x2,
            ArpOp::Unknown(o) => o,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Ethernet;

    #[test]
    fn request_in_frame() {
        let sender_mac = [0, 0, 0, 0, 0, 1];
        let sender_ip = [10, 0, 0, 1];
        let target_ip = [10, 0, 0, 9];
        let frame = Ethernet {
            dst: MAC::broadcast().as_ref(),
            src: &sender_mac[..],
            ether_type: ETHERNET_TYPE_ARP,
            payload: Arp::ipv4(
                ArpOp::Request,
                &sender_mac,
                &sender_ip,
                MAC::zero().as_ref(),
                &target_ip,
            ),
        }
        .to_bytes();
        assert_eq!(frame.len(), 42);

        let eth = Ethernet::<Arp>::parse(&frame).unwrap();
        assert_eq!(eth.ether_type, ETHERNET_TYPE_ARP);
        let arp = eth.payload;
        assert_eq!(arp.opcode, ArpOp::Request);
        assert_eq!(arp.get_sender_ipv4(), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(arp.get_target_ipv4(), Some(Ipv4Addr::new(10, 0, 0, 9)));
        assert_eq!(arp.get_sender_mac(), Some(MAC(sender_mac)));
    }

    #[test]
    fn truncated_body() {
        let body = [0u8, 1, 8, 0, 6, 4, 0, 1, 0, 0, 0];
        assert!(Arp::parse(&body).is_none());
    }
}
