use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::core::communication::event::DeviceEvent;

/// Unified contract for device communication managers
///
/// Both production transports (serial, TCP/IP) and the test double
/// implement this. Lifecycle operations are fire-and-forget from the
/// caller's perspective: transport failures are logged and reported
/// through the event stream, never returned or panicked.
#[async_trait]
pub trait CommunicationManager: Send + Sync {
    /// Stable endpoint identity (port name or "host:port"), available
    /// even when disconnected.
    fn id(&self) -> &str;

    /// Current connection state, consistent with the last emitted
    /// `StatusChanged` event.
    fn is_connected(&self) -> bool;

    /// Establish the transport. No-op when already connected; a failed
    /// attempt leaves the manager disconnected and emits
    /// `StatusChanged(false)`.
    async fn connect(&self);

    /// Release the transport. No-op when already disconnected; otherwise
    /// emits `StatusChanged(false)` exactly once, as the last observable
    /// event of the teardown.
    async fn disconnect(&self);

    /// Send one command line; the wire terminator is appended by the
    /// transport. Silently dropped when disconnected.
    async fn send_data(&self, data: &str);

    /// Subscribe to this manager's event stream.
    fn subscribe(&self) -> broadcast::Receiver<DeviceEvent>;
}
