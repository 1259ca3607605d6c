// Device module - Per-device facade over one communication manager
pub mod server;

pub use server::DeviceServer;
