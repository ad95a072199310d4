pub mod connection;

use crate::app::{Controller, FabricApp};
use crate::config::FabricConfig;
use crate::error::ConfigError;
use crate::event::CoreEvent;
use log::info;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Single event loop: switch events and poll ticks are handled one at a
/// time, in arrival order.
pub struct Core {
    receiver: UnboundedReceiver<CoreEvent>,
    controller: Controller,
    poll_interval: Duration,
}

/// Feeds events into a running `Core`.
#[derive(Clone)]
pub struct CoreHandle {
    sender: UnboundedSender<CoreEvent>,
}

impl CoreHandle {
    /// `false` once the loop has stopped.
    pub fn send(&self, event: CoreEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

impl Core {
    pub fn new(config: FabricConfig) -> Result<(Core, CoreHandle), ConfigError> {
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let controller = Controller::new(config)?;
        let (sender, receiver) = unbounded_channel();
        let core = Core {
            receiver,
            controller,
            poll_interval,
        };
        Ok((core, CoreHandle { sender }))
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Runs until every `CoreHandle` is dropped.
    pub async fn run(mut self) {
        let mut poll = tokio::time::interval(self.poll_interval);
        // the first tick completes immediately
        poll.tick().await;
        loop {
            tokio::select! {
                event = self.receiver.recv() => match event {
                    Some(event) => self.controller.handle(event),
                    None => break,
                },
                _ = poll.tick() => self.controller.handle(CoreEvent::Poll),
            }
        }
        info!(target:"core", "event channel closed, stopping");
    }
}
