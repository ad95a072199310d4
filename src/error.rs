use crate::representation::DeviceID;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Device {:?} not connected", device)]
    DeviceNotConnected { device: DeviceID },
    #[error("Device {:?} control channel closed", device)]
    ChannelClosed { device: DeviceID },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file {} error: {:?}", path, error)]
    Io { path: String, error: std::io::Error },
    #[error("Config parse error")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum PacketError {
    #[error("Malformed {0} header")]
    Malformed(&'static str),
}

#[derive(Error, Debug)]
pub enum MyError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Packet(#[from] PacketError),
}

pub type Result<T> = std::result::Result<T, MyError>;
