use async_trait::async_trait;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::communication::{CommunicationManager, DeviceEvent, EVENT_CHANNEL_CAPACITY};
use crate::domain::config::SerialConfig;
use crate::domain::error::LinkResult;

/// Interval between polls of the serial port for inbound bytes.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

struct SerialLink {
    port: Arc<Mutex<Box<dyn SerialPort>>>,
    reader: JoinHandle<()>,
}

struct Shared {
    id: String,
    connected: AtomicBool,
    link: Mutex<Option<SerialLink>>,
    events: broadcast::Sender<DeviceEvent>,
}

impl Shared {
    fn emit(&self, event: DeviceEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Exactly-once teardown: taking the link out under the lock makes a
    /// second arrival a no-op. The state flip precedes the notification so
    /// a listener calling back into `is_connected` sees consistent state.
    async fn teardown(&self) {
        // Holding the lock across the whole teardown serializes it against
        // a racing connect
        let mut guard = self.link.lock().await;
        let Some(link) = guard.take() else { return };

        link.reader.abort();
        drop(link.port);

        self.connected.store(false, Ordering::SeqCst);
        info!("Closed serial port {}", self.id);
        self.emit(DeviceEvent::StatusChanged(false));
    }
}

/// Serial communication manager
///
/// Framing is fixed at 8-N-1 with no flow control to match device
/// firmware; read and write timeouts bound every blocking call. Inbound
/// bytes are drained by a background polling task that emits one
/// `DataReceived` per complete line. Serial read and write errors are
/// treated as transient glitches: they are logged but do not close the
/// connection, unlike the TCP variant.
pub struct SerialPortManager {
    shared: Arc<Shared>,
    config: SerialConfig,
}

impl SerialPortManager {
    pub fn new(config: SerialConfig) -> LinkResult<Self> {
        config.validate()?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            id: config.port.clone(),
            connected: AtomicBool::new(false),
            link: Mutex::new(None),
            events,
        });

        Ok(Self { shared, config })
    }

    /// Enumerate currently present serial endpoints.
    pub fn available_ports() -> Vec<String> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                warn!("Failed to enumerate serial ports: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl CommunicationManager for SerialPortManager {
    fn id(&self) -> &str {
        &self.shared.id
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) {
        if self.is_connected() {
            return;
        }
        let mut link = self.shared.link.lock().await;
        if link.is_some() {
            return;
        }

        let opened = serialport::new(&self.config.port, self.config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(self.config.timeout())
            .open();

        let port = match opened {
            Ok(port) => port,
            Err(e) => {
                warn!("Failed to open serial port {}: {}", self.shared.id, e);
                drop(link);
                self.shared.emit(DeviceEvent::StatusChanged(false));
                return;
            }
        };

        let port = Arc::new(Mutex::new(port));
        let reader = tokio::spawn(read_loop(Arc::clone(&self.shared), Arc::clone(&port)));
        *link = Some(SerialLink { port, reader });
        drop(link);

        self.shared.connected.store(true, Ordering::SeqCst);
        info!("Opened serial port {}", self.shared.id);
        self.shared.emit(DeviceEvent::StatusChanged(true));
    }

    async fn disconnect(&self) {
        self.shared.teardown().await;
    }

    async fn send_data(&self, data: &str) {
        if !self.is_connected() {
            return;
        }
        let port = {
            let link = self.shared.link.lock().await;
            let Some(link) = link.as_ref() else { return };
            Arc::clone(&link.port)
        };

        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.extend_from_slice(data.as_bytes());
        frame.push(b'\n');

        let mut port = port.lock().await;
        match port.write_all(&frame).and_then(|_| port.flush()) {
            Ok(()) => debug!("Sent {} bytes to {}", frame.len(), self.shared.id),
            // Write timeouts on serial are often transient; the port stays open
            Err(e) => error!("Failed to write to serial port {}: {}", self.shared.id, e),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.shared.events.subscribe()
    }
}

impl Drop for SerialPortManager {
    fn drop(&mut self) {
        // Best-effort release of the OS handle; no events from Drop
        if let Ok(mut link) = self.shared.link.try_lock() {
            if let Some(link) = link.take() {
                link.reader.abort();
            }
        }
    }
}

/// Background receive task
///
/// Polls the port, accumulates bytes, and emits every fully terminated
/// line currently buffered (there may be more than one per poll) in
/// buffer order. Read errors other than timeouts are logged and ignored;
/// the connection stays up.
async fn read_loop(shared: Arc<Shared>, port: Arc<Mutex<Box<dyn SerialPort>>>) {
    let mut buffer = vec![0u8; 1024];
    let mut pending = String::new();

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;

        let result = {
            let mut port = port.lock().await;
            port.read(&mut buffer)
        };

        match result {
            Ok(0) => continue,
            Ok(n) => {
                pending.push_str(&String::from_utf8_lossy(&buffer[..n]));
                for line in drain_complete_lines(&mut pending) {
                    debug!("Received line from {}: {}", shared.id, line);
                    shared.emit(DeviceEvent::DataReceived(line));
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                warn!("Read error on serial port {}: {}", shared.id, e);
            }
        }
    }
}

/// Splits off every complete newline-terminated line, leaving any partial
/// trailing fragment in `pending`. Each line is trimmed of its terminator
/// and surrounding whitespace.
fn drain_complete_lines(pending: &mut String) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = pending.find('\n') {
        let line: String = pending.drain(..=pos).collect();
        lines.push(line.trim().to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn create_test_manager(port: &str) -> SerialPortManager {
        SerialPortManager::new(SerialConfig::new(port, 115200)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(SerialPortManager::new(SerialConfig::new("", 115200)).is_err());
        assert!(SerialPortManager::new(SerialConfig::new("COM3", 0)).is_err());
    }

    #[test]
    fn test_identity_available_while_disconnected() {
        let manager = create_test_manager("/dev/ttyUSB0");
        assert_eq!(manager.id(), "/dev/ttyUSB0");
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_connect_failure_emits_status_false() {
        let manager = create_test_manager("/dev/ttyNOSUCHPORT");
        let mut rx = manager.subscribe();

        manager.connect().await;

        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        assert_eq!(event, DeviceEvent::StatusChanged(false));
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_while_disconnected_emits_nothing() {
        let manager = create_test_manager("/dev/ttyNOSUCHPORT");
        let mut rx = manager.subscribe();

        manager.disconnect().await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_dropped() {
        let manager = create_test_manager("/dev/ttyNOSUCHPORT");
        // Must neither panic nor emit
        let mut rx = manager.subscribe();
        manager.send_data("IDENT").await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_available_ports_does_not_panic() {
        let _ = SerialPortManager::available_ports();
    }

    #[test]
    fn test_drain_two_lines_from_one_chunk() {
        let mut pending = String::from("PING\r\nPONG\r\n");
        let lines = drain_complete_lines(&mut pending);
        assert_eq!(lines, vec!["PING".to_string(), "PONG".to_string()]);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_drain_keeps_partial_fragment() {
        let mut pending = String::from("PING\nPO");
        let lines = drain_complete_lines(&mut pending);
        assert_eq!(lines, vec!["PING".to_string()]);
        assert_eq!(pending, "PO");

        pending.push_str("NG\n");
        let lines = drain_complete_lines(&mut pending);
        assert_eq!(lines, vec!["PONG".to_string()]);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_drain_trims_surrounding_whitespace() {
        let mut pending = String::from("  IDENT 42  \r\n");
        let lines = drain_complete_lines(&mut pending);
        assert_eq!(lines, vec!["IDENT 42".to_string()]);
    }

    #[test]
    fn test_drain_without_terminator_yields_nothing() {
        let mut pending = String::from("INCOMPLETE");
        assert!(drain_complete_lines(&mut pending).is_empty());
        assert_eq!(pending, "INCOMPLETE");
    }
}
