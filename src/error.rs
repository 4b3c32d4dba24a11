// Error types for CertiTrack
//
// Each component has its own structured error enum so callers can match
// exhaustively instead of string-inspecting a generic error.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the TLS scanner. Every variant carries the target
/// identity (`host:port`) for diagnostics.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Connection or handshake did not complete within the timeout
    #[error("timeout after {timeout:?} connecting to {target}")]
    Timeout { target: String, timeout: Duration },

    /// Hostname could not be resolved
    #[error("DNS resolution failed for {target}: {detail}")]
    DnsResolution { target: String, detail: String },

    /// Remote host refused the TCP connection
    #[error("connection refused by {target}")]
    ConnectionRefused { target: String },

    /// TLS handshake failed
    #[error("TLS handshake failed with {target}: {detail}")]
    TlsHandshake { target: String, detail: String },

    /// Anything else (certificate parsing, I/O, ...)
    #[error("unexpected error scanning {target}: {detail}")]
    Unexpected { target: String, detail: String },
}

impl ScanError {
    /// Target identity (`host:port`) this error relates to
    pub fn target(&self) -> &str {
        match self {
            ScanError::Timeout { target, .. }
            | ScanError::DnsResolution { target, .. }
            | ScanError::ConnectionRefused { target }
            | ScanError::TlsHandshake { target, .. }
            | ScanError::Unexpected { target, .. } => target,
        }
    }
}

/// Errors produced while reading a CSV import file.
///
/// Row-level problems are not represented here: a malformed row becomes an
/// `Observation` with `parse_error` set, so one bad row never aborts the
/// batch. This enum covers failures of the input as a whole.
#[derive(Debug, Error)]
pub enum CsvImportError {
    #[error("failed to read CSV input: {0}")]
    Io(#[from] io::Error),

    #[error("malformed CSV stream: {0}")]
    Malformed(#[from] csv::Error),
}

/// Errors from the certificate store.
///
/// A `StoreError` during a batch commit is fatal to the whole batch: nothing
/// is applied and the caller reports a single failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serial number {serial} already present in the inventory")]
    SerialConflict { serial: String },

    #[error("no certificate record with id {id}")]
    NotFound { id: u64 },

    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the notification pipeline. A failure for one rule is logged
/// and processing continues with the next rule.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Neither the rule nor the global configuration names a recipient
    #[error("no recipients configured for rule '{rule}'")]
    NoRecipients { rule: String },

    /// Notifications are disabled in the configuration
    #[error("notifications are disabled in the configuration")]
    Disabled,

    #[error("invalid email address: {0}")]
    Address(String),

    #[error("message build error: {0}")]
    Message(String),

    #[error("mail transport error: {0}")]
    Transport(String),

    #[error("notification log error: {0}")]
    Log(#[from] StoreError),
}

impl From<lettre::address::AddressError> for NotifyError {
    fn from(err: lettre::address::AddressError) -> Self {
        NotifyError::Address(err.to_string())
    }
}

impl From<lettre::error::Error> for NotifyError {
    fn from(err: lettre::error::Error) -> Self {
        NotifyError::Message(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for NotifyError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        NotifyError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_carries_target() {
        let err = ScanError::ConnectionRefused {
            target: "internal.example:8443".to_string(),
        };
        assert_eq!(err.target(), "internal.example:8443");
        assert!(err.to_string().contains("internal.example:8443"));
    }

    #[test]
    fn test_timeout_display() {
        let err = ScanError::Timeout {
            target: "slow.example:443".to_string(),
            timeout: Duration::from_secs(5),
        };
        let msg = err.to_string();
        assert!(msg.contains("timeout"));
        assert!(msg.contains("slow.example:443"));
    }

    #[test]
    fn test_serial_conflict_display() {
        let err = StoreError::SerialConflict {
            serial: "0AB1".to_string(),
        };
        assert!(err.to_string().contains("0AB1"));
    }
}
