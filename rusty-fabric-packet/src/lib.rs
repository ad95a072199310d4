pub mod mac;
pub mod packet;

pub use mac::MAC;
