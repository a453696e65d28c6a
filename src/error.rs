//! Error taxonomy.
//!
//! Nothing in here is process-fatal. The variants differ in where they are
//! handled:
//! - [`Error::MalformedDescriptor`] / [`Error::UnsupportedFeature`]: caught at the
//!   point of origin, the device (or parse step) is skipped and the scan goes on.
//! - [`Error::HandshakeFailed`] / [`Error::Transport`]: tear the active connection
//!   down and hand control back to the scan loop.
//! - [`Error::Timeout`]: an expected control value while polling; it only ever
//!   surfaces through the session's timeout-streak counter.

use crate::device::TransferError;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad framing or length in bytes that came from the device.
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(String),

    /// Well-formed input using a feature this driver does not implement (e.g. long HID items).
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),

    /// A protocol-specific initialization sequence did not complete.
    #[error("handshake failed at {step}: {reason}")]
    HandshakeFailed { step: &'static str, reason: String },

    /// A bounded transfer ran out of time.
    #[error("transfer timed out")]
    Timeout,

    /// Any other USB-layer fault, often a physical disconnect.
    #[error("usb transport error: {0}")]
    Transport(TransferError),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedDescriptor(msg.into())
    }

    /// `true` for the expected "nothing arrived in time" outcome.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// `true` for errors the session loop recovers from by skipping a device
    /// or returning to scanning.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Error::InvalidConfig(_) | Error::Io(_) | Error::Toml(_) | Error::Json(_)
        )
    }
}

impl From<TransferError> for Error {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Timeout => Error::Timeout,
            other => Error::Transport(other),
        }
    }
}
