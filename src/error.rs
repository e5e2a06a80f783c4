//! Error types for telemetry reconstruction.
//!
//! All errors implement [`std::error::Error`] and carry structured context
//! identifying the packet, file, or scan that failed.
//!
//! ## Error Categories
//!
//! - **Decode errors**: a captured datagram does not match any known wire
//!   format, or its embedded type tag disagrees with its length. These are
//!   fatal for the whole run; skipping a corrupt packet would desynchronize
//!   slot-index bookkeeping downstream.
//! - **File errors**: problems reading a capture directory or persisting the
//!   descriptor cache.
//! - **Roster errors**: the packet stream ended before enough roster
//!   fragments arrived to resolve driver identities.
//!
//! Stream exhaustion is deliberately *not* an error: iteration APIs return
//! `Ok(None)` when the capture is consumed, and every consumer loop is
//! expected to handle that as normal termination.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for reconstruction operations.
pub type Result<T, E = ReplayError> = std::result::Result<T, E>;

/// Main error type for telemetry reconstruction.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReplayError {
    /// A datagram whose byte length matches none of the three wire formats.
    #[error("unrecognized packet length: {length} bytes")]
    UnrecognizedPacketLength { length: usize },

    /// The type tag embedded in the packet (low 2 bits of the tag byte)
    /// disagrees with the variant selected by the packet's length.
    #[error("invalid packet type: length selects type {expected}, tag byte says {found}")]
    InvalidPacketType { expected: u8, found: u8 },

    /// A structural decode failure inside an otherwise well-sized packet.
    #[error("parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("capture file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a capture directory: {path}")]
    NotADirectory { path: PathBuf },

    /// The stream ended before roster packets covered the reported
    /// participant count. Fatal: identities cannot be resolved.
    #[error("roster incomplete: needed {needed} names, found {found} before stream end")]
    RosterIncomplete { needed: usize, found: usize },

    /// The descriptor scan could not locate a required race boundary.
    #[error("descriptor scan failed: no packet in {state} state found")]
    MissingRaceBoundary { state: &'static str },

    #[error("descriptor cache error: {path}")]
    Descriptor {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ReplayError {
    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        ReplayError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        ReplayError::File { path, source }
    }

    /// Helper constructor for descriptor cache errors.
    pub fn descriptor_error(
        path: PathBuf,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ReplayError::Descriptor { path, source: Box::new(source) }
    }

    /// Whether this error indicates a corrupt or incompatible capture, as
    /// opposed to an environmental problem (missing files, permissions).
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            ReplayError::UnrecognizedPacketLength { .. }
                | ReplayError::InvalidPacketType { .. }
                | ReplayError::Parse { .. }
        )
    }
}

impl From<std::io::Error> for ReplayError {
    fn from(err: std::io::Error) -> Self {
        ReplayError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_traits_validation() {
        // Compile-time check: ReplayError must be Send + Sync + 'static
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<ReplayError>();

        let error = ReplayError::UnrecognizedPacketLength { length: 512 };
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn decode_errors_classified() {
        assert!(ReplayError::UnrecognizedPacketLength { length: 12 }.is_decode_error());
        assert!(ReplayError::InvalidPacketType { expected: 0, found: 2 }.is_decode_error());
        assert!(ReplayError::parse("participant sample", "truncated").is_decode_error());
        assert!(
            !ReplayError::file_error(
                PathBuf::from("/capture"),
                std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            )
            .is_decode_error()
        );
    }

    #[test]
    fn messages_carry_context() {
        let err = ReplayError::UnrecognizedPacketLength { length: 999 };
        assert!(err.to_string().contains("999"));

        let err = ReplayError::InvalidPacketType { expected: 1, found: 3 };
        let msg = err.to_string();
        assert!(msg.contains('1') && msg.contains('3'));

        let err = ReplayError::RosterIncomplete { needed: 16, found: 4 };
        let msg = err.to_string();
        assert!(msg.contains("16") && msg.contains('4'));
    }

    #[test]
    fn io_error_converts_to_file_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ReplayError = io_err.into();
        assert!(matches!(err, ReplayError::File { .. }));
    }
}
