use crate::core::connection::{Connection, PacketOut, SwitchRequest};
use crate::error::DeviceError;
use crate::representation::DeviceID;
use crate::util::flow::{Flow, FlowMatch, FlowTable};
use log::{debug, error};
use std::collections::HashMap;

/// Pushes rules and packets to switches and mirrors what was installed.
///
/// The mirror only records requests the channel accepted; switch-side
/// timeouts are learned back through flow-removed events.
#[derive(Default)]
pub struct FlowProgrammer {
    connections: HashMap<DeviceID, Box<dyn Connection>>,
    tables: HashMap<DeviceID, FlowTable>,
}

impl FlowProgrammer {
    pub fn new() -> FlowProgrammer {
        Default::default()
    }

    /// A reconnecting switch replaces its old channel and starts with an
    /// empty mirror.
    pub fn add_device(&mut self, device: DeviceID, connection: Box<dyn Connection>) {
        self.connections.insert(device, connection);
        self.tables.insert(device, FlowTable::default());
    }

    pub fn remove_device(&mut self, device: DeviceID) -> bool {
        self.tables.remove(&device);
        self.connections.remove(&device).is_some()
    }

    pub fn is_connected(&self, device: DeviceID) -> bool {
        self.connections.contains_key(&device)
    }

    pub fn devices(&self) -> Vec<DeviceID> {
        let mut devices: Vec<DeviceID> = self.connections.keys().copied().collect();
        devices.sort();
        devices
    }

    fn send(&self, device: DeviceID, request: SwitchRequest) -> Result<(), DeviceError> {
        let connection = self
            .connections
            .get(&device)
            .ok_or(DeviceError::DeviceNotConnected { device })?;
        connection.send(request).map_err(|e| {
            error!(target:"core", "{}", e);
            e
        })
    }

    pub fn insert_flow(&mut self, device: DeviceID, flow: Flow) -> Result<(), DeviceError> {
        self.send(device, SwitchRequest::FlowMod(flow.clone()))?;
        debug!(target:"core", "flow on {}: {:?}", device, flow);
        self.tables.entry(device).or_default().insert(flow);
        Ok(())
    }

    pub fn delete_flows(
        &mut self,
        device: DeviceID,
        filter: &FlowMatch,
    ) -> Result<Vec<Flow>, DeviceError> {
        self.send(device, SwitchRequest::DeleteFlows(filter.clone()))?;
        Ok(self
            .tables
            .get_mut(&device)
            .map(|t| t.delete(filter))
            .unwrap_or_default())
    }

    pub fn send_packet(&self, device: DeviceID, packet: PacketOut) -> Result<(), DeviceError> {
        self.send(device, SwitchRequest::PacketOut(packet))
    }

    pub fn request_flow_stats(&self, device: DeviceID) -> Result<(), DeviceError> {
        self.send(device, SwitchRequest::FlowStatsRequest)
    }

    pub fn flow_table(&self, device: DeviceID) -> Option<&FlowTable> {
        self.tables.get(&device)
    }

    /// Drops a rule the switch reported as removed.
    pub fn forget_flow(&mut self, device: DeviceID, flow: &Flow) -> bool {
        match self.tables.get_mut(&device) {
            Some(table) => table.remove_exact(flow),
            None => false,
        }
    }
}
