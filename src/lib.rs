//! CockpitLink Library
//!
//! Transport-agnostic communication layer for cockpit hardware devices,
//! providing serial and TCP/IP line-oriented transports behind one
//! manager contract, with a per-device facade for the application layer.

pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::communication::{CommunicationManager, DeviceEvent, MockManager};
pub use crate::core::device::DeviceServer;
pub use crate::domain::config::{ConnectionConfig, SerialConfig, TcpConfig};
pub use crate::domain::error::{LinkError, LinkResult};
pub use crate::infrastructure::serial::SerialPortManager;
pub use crate::infrastructure::tcp::TcpIpManager;
