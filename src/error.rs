//! Error types for wlanscope.
//!
//! - [`enum@Error`] - Main error enum that wraps all error types
//! - [`CaptureError`] - Errors from pcap/ivs container handling
//! - [`DissectError`] - Errors from the external dissection service and its gate
//!
//! Container errors abort the operation that raised them. Dissection errors are
//! per-frame: the registry logs them and moves on to the next frame.

use std::time::Duration;

use thiserror::Error;

/// Main error type for wlanscope operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Error reading, indexing or writing a capture container
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Error decoding a frame through the dissection service
    #[error("Dissection error: {0}")]
    Dissect(#[from] DissectError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to capture containers.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Bad magic number or truncated global header
    #[error("Invalid {kind} container: {reason}")]
    InvalidFormat { kind: &'static str, reason: String },

    /// Link type not in the supported enumeration
    #[error("Unsupported link type: {link_type}")]
    UnsupportedLinkType { link_type: u32 },

    /// Sequence number not present in the container index
    #[error("Record {seq} out of range (container holds {available} records)")]
    OutOfRange { seq: u64, available: u64 },

    /// Payload length does not fit the 32-bit captured-length field
    #[error("Payload of {len} bytes is too large for a pcap record")]
    PayloadTooLarge { len: usize },
}

/// Errors related to frame dissection.
#[derive(Error, Debug)]
pub enum DissectError {
    /// The dissection service could not produce a handle
    #[error("Dissector rejected frame {seq}: {reason}")]
    Rejected { seq: u64, reason: String },

    /// Nothing to decode
    #[error("Frame {seq} has no payload to dissect")]
    MissingData { seq: u64 },

    /// The dissection gate could not be acquired in time
    #[error("Dissection gate not acquired within {waited:?}")]
    GateTimeout { waited: Duration },
}

impl Error {
    /// Shorthand for an invalid pcap header.
    pub(crate) fn invalid_pcap(reason: impl Into<String>) -> Self {
        Error::Capture(CaptureError::InvalidFormat {
            kind: "pcap",
            reason: reason.into(),
        })
    }

    /// Shorthand for an invalid ivs header.
    pub(crate) fn invalid_ivs(reason: impl Into<String>) -> Self {
        Error::Capture(CaptureError::InvalidFormat {
            kind: "ivs",
            reason: reason.into(),
        })
    }

    /// Whether this error is a container format problem (bad signature or link type).
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Error::Capture(CaptureError::InvalidFormat { .. })
                | Error::Capture(CaptureError::UnsupportedLinkType { .. })
        )
    }

    /// Whether this error is an out-of-range read.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Error::Capture(CaptureError::OutOfRange { .. }))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
