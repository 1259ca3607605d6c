// Serial module - Serial port communication manager
pub mod manager;

pub use manager::SerialPortManager;
