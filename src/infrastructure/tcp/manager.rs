use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::communication::{CommunicationManager, DeviceEvent, EVENT_CHANNEL_CAPACITY};
use crate::domain::config::TcpConfig;
use crate::domain::error::LinkResult;

struct TcpLink {
    writer: OwnedWriteHalf,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
}

struct Shared {
    id: String,
    connected: AtomicBool,
    link: Mutex<Option<TcpLink>>,
    events: broadcast::Sender<DeviceEvent>,
}

impl Shared {
    fn emit(&self, event: DeviceEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Exactly-once teardown. The caller-facing disconnect, the read
    /// task's closure path, and the write-failure path all funnel through
    /// here; taking the link out under the lock makes every arrival after
    /// the first a no-op. Ordering matters: cancel the token first so the
    /// read loop observes cancellation promptly, then close the stream,
    /// then clear state, and emit the notification last so a listener
    /// calling back into `is_connected` sees consistent state.
    async fn teardown(&self) {
        // Holding the lock across the whole teardown serializes it against
        // a racing connect
        let mut guard = self.link.lock().await;
        let Some(mut link) = guard.take() else { return };

        link.cancel.cancel();
        if let Err(e) = link.writer.shutdown().await {
            debug!("Error shutting down stream to {}: {}", self.id, e);
        }
        // The read task exits on cancellation; dropping the handle detaches it
        drop(link.reader);

        self.connected.store(false, Ordering::SeqCst);
        info!("Disconnected from {}", self.id);
        self.emit(DeviceEvent::StatusChanged(false));
    }
}

/// TCP/IP communication manager
///
/// On successful connect a dedicated read task is spawned, governed by a
/// cancellation token. TCP failures are treated as terminal: a read error,
/// a clean remote close, or a write failure all force a disconnect with a
/// single `StatusChanged(false)`. This is deliberately stricter than the
/// serial variant, where glitches are transient.
pub struct TcpIpManager {
    shared: Arc<Shared>,
    config: TcpConfig,
}

impl TcpIpManager {
    pub fn new(config: TcpConfig) -> LinkResult<Self> {
        config.validate()?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            id: config.endpoint(),
            connected: AtomicBool::new(false),
            link: Mutex::new(None),
            events,
        });

        Ok(Self { shared, config })
    }
}

#[async_trait]
impl CommunicationManager for TcpIpManager {
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

        let endpoint = (self.config.host.as_str(), self.config.port);
        let stream = match tokio::time::timeout(
            self.config.connect_timeout(),
            TcpStream::connect(endpoint),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("Failed to connect to {}: {}", self.shared.id, e);
                drop(link);
                self.shared.emit(DeviceEvent::StatusChanged(false));
                return;
            }
            Err(_) => {
                warn!("Connection attempt to {} timed out", self.shared.id);
                drop(link);
                self.shared.emit(DeviceEvent::StatusChanged(false));
                return;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY on {}: {}", self.shared.id, e);
        }

        let (read_half, writer) = stream.into_split();
        let cancel = CancellationToken::new();
        let reader = tokio::spawn(read_loop(
            Arc::clone(&self.shared),
            read_half,
            cancel.clone(),
        ));
        *link = Some(TcpLink {
            writer,
            cancel,
            reader,
        });
        drop(link);

        self.shared.connected.store(true, Ordering::SeqCst);
        info!("Connected to {}", self.shared.id);
        self.shared.emit(DeviceEvent::StatusChanged(true));
    }

    async fn disconnect(&self) {
        self.shared.teardown().await;
    }

    async fn send_data(&self, data: &str) {
        if !self.is_connected() {
            return;
        }

        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.extend_from_slice(data.as_bytes());
        frame.push(b'\n');

        let mut failed = false;
        {
            let mut link = self.shared.link.lock().await;
            let Some(link) = link.as_mut() else { return };
            match link.writer.write_all(&frame).await {
                Ok(()) => match link.writer.flush().await {
                    Ok(()) => debug!("Sent {} bytes to {}", frame.len(), self.shared.id),
                    Err(e) => {
                        error!("Failed to flush stream to {}: {}", self.shared.id, e);
                        failed = true;
                    }
                },
                Err(e) => {
                    error!("Failed to write to {}: {}", self.shared.id, e);
                    failed = true;
                }
            }
        }

        // A failed write leaves the transport unusable
        if failed {
            self.shared.teardown().await;
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.shared.events.subscribe()
    }
}

impl Drop for TcpIpManager {
    fn drop(&mut self) {
        // Best-effort release of the socket; no events from Drop
        if let Ok(mut link) = self.shared.link.try_lock() {
            if let Some(link) = link.take() {
                link.cancel.cancel();
            }
        }
    }
}

/// Dedicated receive task, one per connection
///
/// Awaits one line at a time until cancelled or the connection is lost. A
/// clean remote close, an I/O error, or any unexpected failure all end
/// the loop and force a disconnect; cancellation means a disconnect is
/// already in progress, so the loop just exits.
async fn read_loop(shared: Arc<Shared>, read_half: OwnedReadHalf, cancel: CancellationToken) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        tokio::select! {
            // Biased so that once cancellation is observed no further
            // lines are delivered, even if a read is already complete
            biased;
            _ = cancel.cancelled() => return,
            result = reader.read_line(&mut line) => match result {
                Ok(0) => {
                    info!("Connection to {} closed by remote", shared.id);
                    break;
                }
                Ok(_) => {
                    let text = line.trim();
                    debug!("Received line from {}: {}", shared.id, text);
                    shared.emit(DeviceEvent::DataReceived(text.to_string()));
                }
                Err(e) if is_connection_error(&e) => {
                    debug!("Connection to {} lost: {}", shared.id, e);
                    break;
                }
                Err(e) => {
                    error!("Unexpected read error on {}: {}", shared.id, e);
                    break;
                }
            }
        }
    }

    shared.teardown().await;
}

fn is_connection_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
    )
}
