use serde::de::{self, Deserialize, Deserializer};
use serde::{Serialize, Serializer};
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// A 48-bit Ethernet address.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct MAC(pub [u8; 6]);

impl MAC {
    pub fn broadcast() -> MAC {
        MAC([0xff; 6])
    }

    pub fn zero() -> MAC {
        MAC([0; 6])
    }

    pub fn from_slice(s: &[u8]) -> Option<MAC> {
        if s.len() != 6 {
            return None;
        }
        let mut mac = [0u8; 6];
        mac.copy_from_slice(s);
        Some(MAC(mac))
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    /// IPv6 multicast frames are addressed to 33:33:xx:xx:xx:xx.
    pub fn is_ipv6_multicast(&self) -> bool {
        self.0[0] == 0x33 && self.0[1] == 0x33
    }
}

impl AsRef<[u8]> for MAC {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 6]> for MAC {
    fn from(b: [u8; 6]) -> Self {
        MAC(b)
    }
}

impl Display for MAC {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl Debug for MAC {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMacError(pub String);

impl Display for ParseMacError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "invalid mac address: {}", self.0)
    }
}

impl std::error::Error for ParseMacError {}

impl FromStr for MAC {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.replace(|c: char| c == ':' || c == '-', "");
        let bytes = hex::decode(&raw).map_err(|_| ParseMacError(s.to_owned()))?;
        MAC::from_slice(&bytes).ok_or_else(|| ParseMacError(s.to_owned()))
    }
}

impl Serialize for MAC {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MAC {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let mac: MAC = "00:00:00:00:01:00".parse().unwrap();
        assert_eq!(mac, MAC([0, 0, 0, 0, 1, 0]));
        assert_eq!(mac.to_string(), "00:00:00:00:01:00");
        assert!("00:00:00:01:00".parse::<MAC>().is_err());
        assert!("zz:00:00:00:01:00".parse::<MAC>().is_err());
    }

    #[test]
    fn serde_as_string() {
        let mac = MAC([0x33, 0x33, 0, 0, 0, 0x16]);
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"33:33:00:00:00:16\"");
        let back: MAC = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mac);
        assert!(back.is_ipv6_multicast());
    }
}
