use crate::error::DeviceError;
use crate::representation::DeviceID;
use crate::util::flow::{Flow, FlowActions, FlowMatch};
use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;

/// Controller-to-switch messages of the OpenFlow 1.3 subset in use.
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchRequest {
    FlowMod(Flow),
    /// Non-strict delete with wildcard out port and group.
    DeleteFlows(FlowMatch),
    PacketOut(PacketOut),
    FlowStatsRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PacketOut {
    pub buffer_id: Option<u32>,
    /// `None` stands for the CONTROLLER pseudo-port.
    pub in_port: Option<u32>,
    pub actions: FlowActions,
    /// Empty when `buffer_id` refers to a switch-side buffer.
    pub payload: Bytes,
}

/// Write half of a switch control channel. Framing and handshakes belong to
/// whatever transport sits behind it.
pub trait Connection: Send {
    fn send(&self, request: SwitchRequest) -> Result<(), DeviceError>;
}

/// A connection that hands requests to a channel, tagged with the device.
pub struct ChannelConnection {
    pub device: DeviceID,
    pub sender: UnboundedSender<(DeviceID, SwitchRequest)>,
}

impl ChannelConnection {
    pub fn new(device: DeviceID, sender: UnboundedSender<(DeviceID, SwitchRequest)>) -> Self {
        ChannelConnection { device, sender }
    }
}

impl Connection for ChannelConnection {
    fn send(&self, request: SwitchRequest) -> Result<(), DeviceError> {
        self.sender
            .send((self.device, request))
            .map_err(|_| DeviceError::ChannelClosed {
                device: self.device,
            })
    }
}
