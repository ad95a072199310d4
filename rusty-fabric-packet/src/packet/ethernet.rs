use super::Packet;
use crate::MAC;
use bytes::BufMut;
use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use std::fmt::{Debug, Formatter};

pub const ETHERNET_TYPE_IPV4: u16 = 0x0800;
pub const ETHERNET_TYPE_IPV6: u16 = 0x86dd;
pub const ETHERNET_TYPE_LLDP: u16 = 0x88cc;

#[derive(Clone)]
pub struct Ethernet<'a, P> {
    pub dst: &'a [u8],
    pub src: &'a [u8],
    pub ether_type: u16,
    pub payload: P,
}

impl<'a, P> Ethernet<'a, P> {
    pub fn get_src_mac(&self) -> MAC {
        MAC::from_slice(self.src).unwrap_or_default()
    }

    pub fn get_dst_mac(&self) -> MAC {
        MAC::from_slice(self.dst).unwrap_or_default()
    }
}

impl<'a, P> Debug for Ethernet<'a, P> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "src: {} dst: {} type: {:#06x}",
            self.get_src_mac(),
            self.get_dst_mac(),
            self.ether_type
        )
    }
}

impl<'a, P> Packet<'a> for Ethernet<'a, P>
where
    P: Packet<'a>,
{
    type Inner = P;

    fn parse(b: &'a [u8]) -> Option<Self> {
        let (b, dst) = take::<_, _, ()>(6u8)(b).ok()?;
        let (b, src) = take::<_, _, ()>(6u8)(b).ok()?;
        let (b, ether_type) = be_u16::<_, ()>(b).ok()?;
        let payload = P::parse(b)?;
        Some(Ethernet {
            dst,
            src,
            ether_type,
            payload,
        })
    }

    fn header_len(&self) -> usize {
        14
    }

    fn put_header<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.dst);
        buf.put_slice(self.src);
        buf.put_u16(self.ether_type);
    }

    fn inner(&self) -> Option<&P> {
        Some(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_frame_is_rejected() {
        let frame = [0xffu8; 13];
        assert!(Ethernet::<&[u8]>::parse(&frame).is_none());
    }

    #[test]
    fn header_fields() {
        let mut frame = vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        frame.extend_from_slice(&[0, 0, 0, 0, 0, 1]);
        frame.extend_from_slice(&[0x88, 0xcc, 0xde, 0xad]);
        let eth = Ethernet::<&[u8]>::parse(&frame).unwrap();
        assert!(eth.get_dst_mac().is_broadcast());
        assert_eq!(eth.get_src_mac(), MAC([0, 0, 0, 0, 0, 1]));
        assert_eq!(eth.ether_type, ETHERNET_TYPE_LLDP);
        assert_eq!(eth.payload, &[0xde, 0xad][..]);
        assert_eq!(eth.to_bytes().as_ref(), &frame[..]);
    }
}
