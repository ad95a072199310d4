use crate::app::common::{CommonState, ControllerState};
use crate::config::FabricConfig;
use crate::core::connection::Connection;
use crate::error::ConfigError;
use crate::event::{CoreEvent, PacketReceived};
use crate::representation::{DeviceID, Link};
use crate::util::flow::Flow;
use log::trace;

pub mod common;
pub mod forwarding;
pub mod graph;
pub mod host;
pub mod loadbalance;
pub mod nat;
pub mod proxyarp;
pub mod tracker;

/// One callback per kind of control-channel or discovery event.
pub trait FabricApp {
    fn on_device_added(&mut self, device: DeviceID, connection: Box<dyn Connection>);

    fn on_device_lost(&mut self, device: DeviceID);

    fn on_link_detected(&mut self, link: Link);

    fn on_link_lost(&mut self, link: Link);

    fn on_packet(&mut self, packet: PacketReceived);

    fn on_flow_removed(&mut self, device: DeviceID, flow: Flow);

    fn on_flow_stats(&mut self, device: DeviceID, flows: Vec<Flow>);

    fn on_poll(&mut self) {}

    fn handle(&mut self, event: CoreEvent) {
        trace!(target:"core", "{:?}", event);
        match event {
            CoreEvent::DeviceAdded { device, connection } => self.on_device_added(device, connection),
            CoreEvent::DeviceLost(device) => self.on_device_lost(device),
            CoreEvent::LinkDetected(link) => self.on_link_detected(link),
            CoreEvent::LinkLost(link) => self.on_link_lost(link),
            CoreEvent::PacketReceived(packet) => self.on_packet(packet),
            CoreEvent::FlowRemoved { device, flow } => self.on_flow_removed(device, flow),
            CoreEvent::FlowStats { device, flows } => self.on_flow_stats(device, flows),
            CoreEvent::Poll => self.on_poll(),
        }
    }
}

/// The fabric controller: every handler runs under the state lock.
#[derive(Clone)]
pub struct Controller {
    state: CommonState,
}

impl Controller {
    /// Rejects configurations that `FabricConfig::validate` refuses.
    pub fn new(config: FabricConfig) -> Result<Controller, ConfigError> {
        config.validate()?;
        Ok(Controller {
            state: CommonState::new(ControllerState::new(config)),
        })
    }

    pub fn state(&self) -> CommonState {
        self.state.clone()
    }
}

impl FabricApp for Controller {
    fn on_device_added(&mut self, device: DeviceID, connection: Box<dyn Connection>) {
        forwarding::on_device_added(&mut self.state.lock(), device, connection);
    }

    fn on_device_lost(&mut self, device: DeviceID) {
        forwarding::on_device_lost(&mut self.state.lock(), device);
    }

    fn on_link_detected(&mut self, link: Link) {
        forwarding::on_link_detected(&mut self.state.lock(), &link);
    }

    fn on_link_lost(&mut self, link: Link) {
        forwarding::on_link_lost(&mut self.state.lock(), &link);
    }

    fn on_packet(&mut self, packet: PacketReceived) {
        forwarding::on_packet(&mut self.state.lock(), &packet);
    }

    fn on_flow_removed(&mut self, device: DeviceID, flow: Flow) {
        tracker::on_flow_removed(&mut self.state.lock(), device, &flow);
    }

    fn on_flow_stats(&mut self, device: DeviceID, flows: Vec<Flow>) {
        tracker::on_flow_stats(&mut self.state.lock(), device, &flows);
    }

    fn on_poll(&mut self) {
        tracker::on_poll(&mut self.state.lock());
    }
}
