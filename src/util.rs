pub mod flow;

pub use rusty_fabric_packet::MAC;
