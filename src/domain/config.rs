use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::error::{LinkError, LinkResult};

/// Connection configuration for one device endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConnectionConfig {
    #[serde(rename = "serial")]
    Serial {
        port: String,
        baud_rate: u32,
        #[serde(default = "default_serial_timeout_ms")]
        timeout_ms: u64,
    },
    #[serde(rename = "tcp")]
    Tcp {
        host: String,
        port: u16,
        #[serde(default = "default_connect_timeout_ms")]
        connect_timeout_ms: u64,
    },
}

impl ConnectionConfig {
    pub fn validate(&self) -> LinkResult<()> {
        match self {
            ConnectionConfig::Serial { port, baud_rate, .. } => {
                if port.is_empty() {
                    return Err(LinkError::Config {
                        message: "Serial port name must not be empty".to_string(),
                    });
                }
                if *baud_rate == 0 {
                    return Err(LinkError::Config {
                        message: "Baud rate must be greater than zero".to_string(),
                    });
                }
                Ok(())
            }
            ConnectionConfig::Tcp { host, port, .. } => {
                if host.is_empty() {
                    return Err(LinkError::Config {
                        message: "TCP host must not be empty".to_string(),
                    });
                }
                if *port == 0 {
                    return Err(LinkError::Config {
                        message: "TCP port must be greater than zero".to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Serial connection parameters
///
/// Framing is fixed at 8 data bits, no parity, one stop bit, no flow
/// control; only the port name and baud rate vary per device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    #[serde(default = "default_serial_timeout_ms")]
    pub timeout_ms: u64,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            timeout_ms: default_serial_timeout_ms(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> LinkResult<()> {
        ConnectionConfig::from(self.clone()).validate()
    }
}

/// TCP connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl TcpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    /// Endpoint identity string, e.g. "192.168.1.101:8080".
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> LinkResult<()> {
        ConnectionConfig::from(self.clone()).validate()
    }
}

impl From<SerialConfig> for ConnectionConfig {
    fn from(config: SerialConfig) -> Self {
        ConnectionConfig::Serial {
            port: config.port,
            baud_rate: config.baud_rate,
            timeout_ms: config.timeout_ms,
        }
    }
}

impl From<TcpConfig> for ConnectionConfig {
    fn from(config: TcpConfig) -> Self {
        ConnectionConfig::Tcp {
            host: config.host,
            port: config.port,
            connect_timeout_ms: config.connect_timeout_ms,
        }
    }
}

fn default_serial_timeout_ms() -> u64 {
    500
}

fn default_connect_timeout_ms() -> u64 {
    3000
}
