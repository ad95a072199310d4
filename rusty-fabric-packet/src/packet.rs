use bytes::{BufMut, Bytes, BytesMut};

pub use arp::Arp;
pub use ethernet::Ethernet;
pub use ipv4::Ipv4;
pub use transport::TransportPorts;

pub mod arp;
pub mod ethernet;
pub mod ipv4;
pub mod transport;

/// One protocol layer, borrowed out of the frame it was parsed from.
///
/// A layer writes only its own header; whatever it carries is a nested
/// `Packet` reached through `inner`. Leaf layers carry `()`.
pub trait Packet<'a>: Sized {
    type Inner: Packet<'a>;

    /// `None` when `b` is too short or does not hold this layer.
    fn parse(b: &'a [u8]) -> Option<Self>;

    fn header_len(&self) -> usize;

    fn put_header<B: BufMut>(&self, buf: &mut B);

    fn inner(&self) -> Option<&Self::Inner> {
        None
    }

    /// Header plus everything nested below it.
    fn encoded_len(&self) -> usize {
        self.header_len() + self.inner().map_or(0, |inner| inner.encoded_len())
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.put_header(buf);
        if let Some(inner) = self.inner() {
            inner.encode(buf);
        }
    }

    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }
}

/// End of the layer chain.
impl<'a> Packet<'a> for () {
    type Inner = ();

    fn parse(_b: &'a [u8]) -> Option<Self> {
        Some(())
    }

    fn header_len(&self) -> usize {
        0
    }

    fn put_header<B: BufMut>(&self, _buf: &mut B) {}
}

/// Bytes nobody decodes further, kept as they arrived.
impl<'a> Packet<'a> for &'a [u8] {
    type Inner = ();

    fn parse(b: &'a [u8]) -> Option<Self> {
        Some(b)
    }

    fn header_len(&self) -> usize {
        self.len()
    }

    fn put_header<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_bytes_pass_through() {
        let raw = [1u8, 2, 3];
        let parsed = <&[u8]>::parse(&raw).unwrap();
        assert_eq!(parsed.encoded_len(), 3);
        assert_eq!(parsed.to_bytes().as_ref(), &raw[..]);
        assert!(().to_bytes().is_empty());
    }
}
