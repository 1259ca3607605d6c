/// Capacity of each manager's broadcast event channel.
///
/// Slow subscribers that fall further behind than this observe a lagged
/// receive rather than blocking the transport.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events published by a communication manager
///
/// Per manager instance, events are delivered in emission order:
/// `DataReceived` once per decoded inbound line in wire arrival order, and
/// `StatusChanged` on every confirmed connection-state transition. A
/// `StatusChanged(false)` is the last event after a disconnect, though a
/// late in-flight `DataReceived` may still precede it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// One inbound line, trimmed of its terminator and surrounding whitespace.
    DataReceived(String),
    /// Connection state transition; true = connected.
    StatusChanged(bool),
}
