use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::core::communication::{CommunicationManager, DeviceEvent, EVENT_CHANNEL_CAPACITY};

/// Per-device facade over one communication manager
///
/// Pure delegation layer: the only object the application layer touches
/// for a device. The manager is injected at construction so either
/// transport variant, or a test double, can sit behind the same facade.
/// Both event kinds are re-published unchanged through the facade's own
/// channel by a relay task established once at construction.
pub struct DeviceServer {
    manager: Arc<dyn CommunicationManager>,
    events: broadcast::Sender<DeviceEvent>,
    relay: JoinHandle<()>,
}

impl DeviceServer {
    pub fn new(manager: Arc<dyn CommunicationManager>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut upstream = manager.subscribe();
        let downstream = events.clone();
        let device_id = manager.id().to_string();

        let relay = tokio::spawn(async move {
            loop {
                match upstream.recv().await {
                    Ok(event) => {
                        let _ = downstream.send(event);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Event relay for {} lagged, {} events dropped", device_id, missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self {
            manager,
            events,
            relay,
        }
    }

    /// Device identity, e.g. "COM3" or "192.168.1.101:8080".
    pub fn id(&self) -> &str {
        self.manager.id()
    }

    pub fn is_running(&self) -> bool {
        self.manager.is_connected()
    }

    pub async fn start(&self) {
        self.manager.connect().await;
    }

    pub async fn stop(&self) {
        self.manager.disconnect().await;
    }

    pub async fn send_data(&self, data: &str) {
        self.manager.send_data(data).await;
    }

    /// Subscribe to the relayed event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }
}

impl Drop for DeviceServer {
    fn drop(&mut self) {
        self.relay.abort();
    }
}
