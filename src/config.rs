use crate::error::ConfigError;
use crate::fattree::FatTree;
use crate::util::MAC;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ForwardingPolicy {
    LearningSwitch,
    FatTreeAware,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum UnknownDestination {
    Drop,
    Flood,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum LoadBalancingPolicy {
    None,
    Wrr,
    Wlc,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub ip: Ipv4Addr,
    pub weight: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    pub k: u32,
    pub host_network: Ipv4Addr,
    pub forwarding: ForwardingPolicy,
    pub unknown_destination: UnknownDestination,
    pub balancing: LoadBalancingPolicy,
    pub vip: Ipv4Addr,
    pub vip_mac: MAC,
    pub backends: Vec<BackendConfig>,
    pub uplink_balancing: bool,
    pub uplink_weights: Vec<u32>,
    pub arp_dedup_bound: usize,
    pub flow_idle_timeout: u16,
    pub balanced_idle_timeout: u16,
    pub miss_send_len: u16,
    pub poll_interval_ms: u64,
}

impl Default for FabricConfig {
    fn default() -> Self {
        FabricConfig {
            k: 4,
            host_network: Ipv4Addr::new(10, 0, 0, 0),
            forwarding: ForwardingPolicy::FatTreeAware,
            unknown_destination: UnknownDestination::Drop,
            balancing: LoadBalancingPolicy::Wrr,
            vip: Ipv4Addr::new(10, 0, 0, 100),
            vip_mac: MAC([0, 0, 0, 0, 1, 0]),
            backends: vec![
                BackendConfig {
                    ip: Ipv4Addr::new(10, 0, 0, 1),
                    weight: 3,
                },
                BackendConfig {
                    ip: Ipv4Addr::new(10, 0, 0, 2),
                    weight: 2,
                },
                BackendConfig {
                    ip: Ipv4Addr::new(10, 0, 0, 3),
                    weight: 1,
                },
            ],
            uplink_balancing: false,
            uplink_weights: vec![3, 2],
            arp_dedup_bound: 100,
            flow_idle_timeout: 30,
            balanced_idle_timeout: 60,
            miss_send_len: 128,
            poll_interval_ms: 5000,
        }
    }
}

impl FabricConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FabricConfig, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|error| ConfigError::Io {
            path: path.display().to_string(),
            error,
        })?;
        Self::from_slice(&content)
    }

    pub fn from_slice(content: &[u8]) -> Result<FabricConfig, ConfigError> {
        let config: FabricConfig = serde_json::from_slice(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k < 2 || self.k % 2 != 0 {
            return Err(ConfigError::Invalid(format!("k must be even and >= 2, got {}", self.k)));
        }
        if (self.k as u64).pow(3) / 4 > 254 {
            return Err(ConfigError::Invalid(format!(
                "k = {} needs more hosts than one /24 holds",
                self.k
            )));
        }
        if self.balancing != LoadBalancingPolicy::None && self.backends.is_empty() {
            return Err(ConfigError::Invalid("load balancing needs at least one backend".to_owned()));
        }
        if let Some(b) = self.backends.iter().find(|b| b.weight == 0) {
            return Err(ConfigError::Invalid(format!("backend {} has weight 0", b.ip)));
        }
        if self.uplink_weights.iter().any(|w| *w == 0) {
            return Err(ConfigError::Invalid("uplink weights must be >= 1".to_owned()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".to_owned()));
        }
        if !self.fabric().fits_host_network() {
            return Err(ConfigError::Invalid(format!(
                "{} hosts do not fit in the /24 after {}",
                self.fabric().host_count(),
                self.host_network
            )));
        }
        if self.fabric().host_index(self.vip).is_some() {
            return Err(ConfigError::Invalid(format!(
                "VIP {} collides with a host address",
                self.vip
            )));
        }
        Ok(())
    }

    pub fn fabric(&self) -> FatTree {
        FatTree::new(self.k, self.host_network)
    }

    /// Weight of the `n`th uplink (0-based). Missing entries weigh 1.
    pub fn uplink_weight(&self, n: usize) -> u32 {
        self.uplink_weights.get(n).copied().unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_object() {
        let config = FabricConfig::from_slice(b"{}").unwrap();
        assert_eq!(config.k, 4);
        assert_eq!(config.balancing, LoadBalancingPolicy::Wrr);
        assert_eq!(config.vip_mac.to_string(), "00:00:00:00:01:00");
        assert_eq!(config.backends.len(), 3);
        assert_eq!(config.uplink_weight(1), 2);
        assert_eq!(config.uplink_weight(5), 1);
    }

    #[test]
    fn parse_overrides() {
        let json = br#"{
            "k": 2,
            "balancing": "Wlc",
            "vip_mac": "02:00:00:00:00:aa",
            "backends": [{"ip": "10.0.0.1", "weight": 1}],
            "unknown_destination": "Flood"
        }"#;
        let config = FabricConfig::from_slice(json).unwrap();
        assert_eq!(config.k, 2);
        assert_eq!(config.balancing, LoadBalancingPolicy::Wlc);
        assert_eq!(config.unknown_destination, UnknownDestination::Flood);
        assert_eq!(config.vip_mac, MAC([2, 0, 0, 0, 0, 0xaa]));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            FabricConfig::from_slice(br#"{"k": 3}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FabricConfig::from_slice(br#"{"k": 12}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FabricConfig::from_slice(br#"{"vip": "10.0.0.5"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FabricConfig::from_slice(br#"{"backends": [{"ip": "10.0.0.1", "weight": 0}]}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FabricConfig::from_slice(br#"{"host_network": "255.255.255.250"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FabricConfig::from_slice(br#"{"host_network": "10.0.0.240"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FabricConfig::from_slice(b"not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
