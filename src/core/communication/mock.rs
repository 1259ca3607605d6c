use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

use crate::core::communication::event::{DeviceEvent, EVENT_CHANNEL_CAPACITY};
use crate::core::communication::manager::CommunicationManager;

/// In-memory manager double for deterministic testing without real I/O
///
/// Honors the same contract as the production transports: idempotent
/// connect/disconnect with exactly-once status notifications, and silent
/// drops while disconnected. Inbound traffic and transport-detected
/// closure are driven explicitly via [`MockManager::inject_line`] and
/// [`MockManager::drop_link`].
pub struct MockManager {
    id: String,
    connected: AtomicBool,
    events: broadcast::Sender<DeviceEvent>,
    sent: Mutex<Vec<String>>,
}

impl MockManager {
    pub fn new(id: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            id: id.into(),
            connected: AtomicBool::new(false),
            events,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Simulate one decoded inbound line arriving from the device.
    pub fn inject_line(&self, line: &str) {
        if self.connected.load(Ordering::SeqCst) {
            let _ = self
                .events
                .send(DeviceEvent::DataReceived(line.trim().to_string()));
        }
    }

    /// Simulate a transport-detected closure (device unplugged, socket
    /// reset).
    pub fn drop_link(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(DeviceEvent::StatusChanged(false));
        }
    }

    /// Commands recorded by `send_data` while connected.
    pub fn sent_data(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommunicationManager for MockManager {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) {
        if self.connected.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.events.send(DeviceEvent::StatusChanged(true));
    }

    async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.events.send(DeviceEvent::StatusChanged(false));
    }

    async fn send_data(&self, data: &str) {
        if !self.connected.load(Ordering::SeqCst) {
            return;
        }
        self.sent.lock().unwrap().push(data.to_string());
    }

    fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }
}
