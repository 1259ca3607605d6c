// Infrastructure module - Transport implementations and adapters
pub mod logging;
pub mod serial;
pub mod tcp;
