use thiserror::Error;

/// CockpitLink unified error type
///
/// Only construction-time validation surfaces these to callers; runtime
/// transport failures are logged and reported through the event stream
/// instead of being returned.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

pub type LinkResult<T> = Result<T, LinkError>;
