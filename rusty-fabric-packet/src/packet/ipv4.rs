use super::Packet;
use bytes::BufMut;
use nom::bytes::complete::take;
use nom::number::complete::{be_u8, be_u16};
use std::net::Ipv4Addr;

pub const IP_PROTOCOL_TCP: u8 = 6;
pub const IP_PROTOCOL_UDP: u8 = 17;

#[derive(Debug, Clone)]
pub struct Ipv4<'a, P> {
    version: u8,
    ihl: u8,
    dscp: u8,
    ecn: u8,
    total_len: u16,
    identification: u16,
    flags: u8,
    frag_offset: u16,
    ttl: u8,
    protocol: u8,
    hdr_checksum: u16,
    src: &'a [u8],
    dst: &'a [u8],
    options: &'a [u8],
    pub payload: P,
}

impl<'a, P> Ipv4<'a, P>
where
    P: Packet<'a>,
{
    /// A header without options; the checksum is left for the switch to fix up.
    pub fn new(src: &'a [u8], dst: &'a [u8], protocol: u8, payload: P) -> Self {
        let total_len = (20 + payload.encoded_len()) as u16;
        Ipv4 {
            version: 4,
            ihl: 5,
            dscp: 0,
            ecn: 0,
            total_len,
            identification: 0,
            flags: 0b010,
            frag_offset: 0,
            ttl: 64,
            protocol,
            hdr_checksum: 0,
            src,
            dst,
            options: &[],
            payload,
        }
    }
}

impl<'a, P> Ipv4<'a, P> {
    pub fn get_src(&self) -> Ipv4Addr {
        slice_to_ipv4(self.src)
    }

    pub fn get_dst(&self) -> Ipv4Addr {
        slice_to_ipv4(self.dst)
    }

    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }
}

fn slice_to_ipv4(b: &[u8]) -> Ipv4Addr {
    let mut s = [0u8; 4];
    s.clone_from_slice(b);
    Ipv4Addr::from(s)
}

impl<'a, P> Packet<'a> for Ipv4<'a, P>
where
    P: Packet<'a>,
{
    type Inner = P;

    fn parse(b: &'a [u8]) -> Option<Self> {
        let (b, version_ihl) = be_u8::<_, ()>(b).ok()?;
        let version = (version_ihl & 0b11110000) >> 4;
        let ihl = version_ihl & 0b00001111;
        if version != 4 || ihl < 5 {
            return None;
        }
        let (b, dscp_ecn) = be_u8::<_, ()>(b).ok()?;
        let dscp = (dscp_ecn & 0b11111100) >> 2;
        let ecn = dscp_ecn & 0b00000011;
        let (b, total_len) = be_u16::<_, ()>(b).ok()?;
        let (b, identification) = be_u16::<_, ()>(b).ok()?;
        let (b, flags_fragmentoffset) = be_u16::<_, ()>(b).ok()?;
        let flags = ((flags_fragmentoffset & 0b1110_0000_0000_0000) >> 13) as u8;
        let frag_offset = flags_fragmentoffset & 0b0001_1111_1111_1111;
        let (b, ttl) = be_u8::<_, ()>(b).ok()?;
        let (b, protocol) = be_u8::<_, ()>(b).ok()?;
        let (b, hdr_checksum) = be_u16::<_, ()>(b).ok()?;
        let (b, src) = take::<_, _, ()>(4u8)(b).ok()?;
        let (b, dst) = take::<_, _, ()>(4u8)(b).ok()?;
        let (b, options) = take::<_, _, ()>((ihl as usize - 5) * 4)(b).ok()?;
        let payload = P::parse(b)?;
        Some(Self {
            version,
            ihl,
            dscp,
            ecn,
            total_len,
            identification,
            flags,
            frag_offset,
            ttl,
            protocol,
            hdr_checksum,
            src,
            dst,
            options,
            payload,
        })
    }

    fn header_len(&self) -> usize {
        20 + self.options.len()
    }

    fn put_header<B: BufMut>(&self, buf: &mut B) {
        let version_ihl = (self.version << 4) + (self.ihl & 0b00001111);
        buf.put_u8(version_ihl);
        let dscp_ecn = (self.dscp << 2) + (self.ecn & 0b00000011);
        buf.put_u8(dscp_ecn);
        buf.put_u16(self.total_len);
        buf.put_u16(self.identification);
        let flags_fragmentoffset =
            ((self.flags as u16) << 13) + (self.frag_offset & 0b0001_1111_1111_1111);
        buf.put_u16(flags_fragmentoffset);
        buf.put_u8(self.ttl);
        buf.put_u8(self.protocol);
        buf.put_u16(self.hdr_checksum);
        buf.put_slice(self.src);
        buf.put_slice(self.dst);
        buf.put_slice(self.options);
    }

    fn inner(&self) -> Option<&P> {
        Some(&self.payload)
    }
}
