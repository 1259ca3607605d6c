// Communication module - Manager contract and event types
pub mod event;
pub mod manager;
pub mod mock;

pub use event::{DeviceEvent, EVENT_CHANNEL_CAPACITY};
pub use manager::CommunicationManager;
pub use mock::MockManager;
