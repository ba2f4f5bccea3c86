#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("io error: {0:#}")]
    IoError(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,

    #[error("engine closed")]
    EngineClosed,

    #[error("engine rejected startDownload: {0}")]
    StartRejected(String),
}

pub type Result<T> = core::result::Result<T, Error>;
