//! Error types for report streams.
//!
//! Timeouts and cancellation are deliberately absent: both surface as empty
//! reads, never as errors.

use thiserror::Error;

/// Errors that can occur while opening or driving a report stream.
#[derive(Error, Debug)]
pub enum HidStreamError {
    /// The opener could not produce a handle for the device.
    #[error("Failed to open device {device}: {reason}")]
    DeviceOpenFailed {
        /// Rendered device address.
        device: String,
        /// Failure reason reported by the opener.
        reason: String,
    },

    /// Operation attempted before `open` or after `close`.
    #[error("Device is not open")]
    DeviceNotOpen,

    /// `open` called on an interface that is already open.
    #[error("Device is already open")]
    AlreadyOpen,

    /// The device hung up while the stream was in use.
    #[error("Device disconnected: {0}")]
    DeviceDisconnected(String),

    /// Opaque failure reported by the transport.
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O error from a platform adapter.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A payload chunk does not fit into one report.
    #[error("Invalid report: {len} bytes exceeds report size {max}")]
    InvalidReport {
        /// Length of the offending chunk.
        len: usize,
        /// Maximum payload per report.
        max: usize,
    },
}

impl HidStreamError {
    /// Create a device open failure.
    #[must_use]
    pub fn open_failed(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeviceOpenFailed {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a disconnected error.
    #[must_use]
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::DeviceDisconnected(device.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Check if this error means the device can no longer be used.
    pub fn is_device_unavailable(&self) -> bool {
        matches!(
            self,
            Self::DeviceOpenFailed { .. } | Self::DeviceDisconnected(_)
        )
    }

    /// Check if this error was caused by misuse of the stream API rather than
    /// by the device.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotOpen
                | Self::AlreadyOpen
                | Self::InvalidConfiguration(_)
                | Self::InvalidReport { .. }
        )
    }
}

/// A specialized `Result` type for report stream operations.
pub type HidStreamResult<T> = std::result::Result<T, HidStreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HidStreamError::open_failed("/dev/hidraw3", "permission denied");
        assert_eq!(
            err.to_string(),
            "Failed to open device /dev/hidraw3: permission denied"
        );

        let err = HidStreamError::DeviceNotOpen;
        assert_eq!(err.to_string(), "Device is not open");
    }

    #[test]
    fn test_error_classification() {
        assert!(HidStreamError::disconnected("1209:f1d0").is_device_unavailable());
        assert!(!HidStreamError::transport("EIO").is_device_unavailable());
        assert!(HidStreamError::DeviceNotOpen.is_caller_error());
        assert!(HidStreamError::AlreadyOpen.is_caller_error());
        assert!(!HidStreamError::transport("EIO").is_caller_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: HidStreamError = io.into();
        assert!(matches!(err, HidStreamError::Io(_)));
        assert!(err.to_string().contains("pipe closed"));
    }
}
