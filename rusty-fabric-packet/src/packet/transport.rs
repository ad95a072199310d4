use super::Packet;
use bytes::BufMut;
use nom::number::complete::be_u16;

/// The leading port pair shared by TCP and UDP headers.
///
/// Packet-ins are usually truncated, so only the first four bytes of the
/// transport header are required; the rest is carried through untouched.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TransportPorts<'a> {
    pub src_port: u16,
    pub dst_port: u16,
    pub rest: &'a [u8],
}

impl<'a> TransportPorts<'a> {
    pub fn new(src_port: u16, dst_port: u16) -> Self {
        TransportPorts {
            src_port,
            dst_port,
            rest: &[],
        }
    }
}

impl<'a> Packet<'a> for TransportPorts<'a> {
    type Inner = ();

    fn parse(b: &'a [u8]) -> Option<Self> {
        let (b, src_port) = be_u16::<_, ()>(b).ok()?;
        let (rest, dst_port) = be_u16::<_, ()>(b).ok()?;
        Some(TransportPorts {
            src_port,
            dst_port,
            rest,
        })
    }

    fn header_len(&self) -> usize {
        4 + self.rest.len()
    }

    fn put_header<B: BufMut>(&self, buf: &mut B) {
        buf.put_u16(self.src_port);
        buf.put_u16(self.dst_port);
        buf.put_slice(self.rest);
    }
}
