//! OpenFlow 1.3 control plane for k-ary fat-tree fabrics: proactive tier
//! routing, equal-cost paths, ARP loop suppression and VIP load balancing
//! with WRR or WLC scheduling.

pub mod app;
pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod event;
pub mod fattree;
pub mod representation;
pub mod util;

pub use crate::app::{Controller, FabricApp};
pub use crate::config::FabricConfig;
pub use crate::core::{Core, CoreHandle};
pub use crate::error::{MyError, Result};
