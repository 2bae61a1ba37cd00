//! Transmitter trait for the `uploading` stage.
//!
//! Implementations send one payload to the remote asset store and return the
//! asset records it created. An implementation must report a response without
//! any asset record as [`TransmitError::MissingAssetRecord`], even when the
//! transport itself succeeded.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransmitError;
use crate::models::{MetadataEnvelope, UploadedAsset};

/// Everything needed to transmit one item.
#[derive(Debug, Clone)]
pub struct TransmitRequest {
    pub file_name: String,
    pub content_type: String,
    pub payload: Bytes,
    pub envelope: MetadataEnvelope,
    /// Credential fetched by the pipeline for this stage.
    pub bearer_token: String,
}

#[async_trait]
pub trait Transmitter: Send + Sync {
    /// Store the payload. A successful result is never empty.
    async fn transmit(&self, request: TransmitRequest) -> Result<Vec<UploadedAsset>, TransmitError>;
}
