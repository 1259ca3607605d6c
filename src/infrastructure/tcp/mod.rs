// TCP module - TCP/IP communication manager
pub mod manager;

pub use manager::TcpIpManager;
