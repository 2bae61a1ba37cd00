//! Error types module
//!
//! Failures are split by how far they are allowed to travel:
//! - [`ValidationError`] rejects files before any upload item exists.
//! - [`TransmitError`] is fatal for one item and never for its batch.
//! - [`EnrichError`] is logged and swallowed; it never fails an item.
//! - [`OrchestrationError`] is a batch-level failure outside any single item.

use thiserror::Error;
use uuid::Uuid;

use crate::models::ItemState;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for swallowed failures like enrichment
    Warn,
    /// Error level - for item or batch failures
    Error,
}

/// Rejection of a candidate file (or of a whole incoming set) before admission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{file_name}: file too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge {
        file_name: String,
        size: usize,
        max: usize,
    },

    #[error("{file_name}: unsupported media type {content_type} (allowed: {allowed:?})")]
    UnsupportedMediaType {
        file_name: String,
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("{file_name}: empty file")]
    EmptyFile { file_name: String },

    #[error("Batch limit exceeded: {accepted} already accepted + {incoming} incoming > {max}")]
    BatchLimitExceeded {
        accepted: usize,
        incoming: usize,
        max: usize,
    },
}

/// Fatal failure of the `uploading` stage for one item.
#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("Upload request failed: {0}")]
    Request(String),

    #[error("Upload failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Upload response contained no uploaded asset record")]
    MissingAssetRecord,

    #[error("Could not obtain credentials: {0}")]
    Credentials(String),

    #[error("Upload cancelled")]
    Cancelled,
}

/// Failure of the best-effort enrichment call. Never surfaced as an item failure.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Enrichment request failed: {0}")]
    Request(String),

    #[error("Enrichment failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Uploaded asset has no id to enrich")]
    MissingAssetId,

    #[error("Enrichment is disabled")]
    Disabled,

    #[error("Could not obtain credentials: {0}")]
    Credentials(String),
}

/// Failure outside any single item.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Admission failed: {0}")]
    Admission(#[from] ValidationError),

    #[error("Batch runtime failure: {0}")]
    Runtime(String),
}

/// Attempted move against the pipeline graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Item {item_id}: illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub item_id: Uuid,
    pub from: ItemState,
    pub to: ItemState,
}

impl ValidationError {
    pub fn log_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

impl TransmitError {
    pub fn log_level(&self) -> LogLevel {
        match self {
            TransmitError::Cancelled => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

impl EnrichError {
    pub fn log_level(&self) -> LogLevel {
        match self {
            EnrichError::Disabled => LogLevel::Debug,
            _ => LogLevel::Warn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_offending_file() {
        let err = ValidationError::UnsupportedMediaType {
            file_name: "c.exe".to_string(),
            content_type: "application/x-msdownload".to_string(),
            allowed: vec!["image/jpeg".to_string()],
        };
        assert!(err.to_string().starts_with("c.exe:"));
    }

    #[test]
    fn admission_error_wraps_validation_error() {
        let err: OrchestrationError = ValidationError::BatchLimitExceeded {
            accepted: 8,
            incoming: 3,
            max: 10,
        }
        .into();
        assert!(matches!(err, OrchestrationError::Admission(_)));
    }

    #[test]
    fn enrichment_failures_log_as_warnings() {
        assert_eq!(
            EnrichError::Request("timeout".to_string()).log_level(),
            LogLevel::Warn
        );
        assert_eq!(EnrichError::Disabled.log_level(), LogLevel::Debug);
        assert_eq!(
            TransmitError::MissingAssetRecord.log_level(),
            LogLevel::Error
        );
    }
}
