//! Enricher trait for the best-effort `analyzing` stage.

use async_trait::async_trait;

use crate::error::EnrichError;

#[derive(Debug, Clone)]
pub struct EnrichRequest {
    pub asset_id: String,
    pub hints: serde_json::Value,
    pub bearer_token: String,
}

/// Derives descriptive metadata for an already stored asset.
///
/// Errors are never fatal to the item that triggered them; callers log and
/// keep the upload's own metadata.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, request: EnrichRequest) -> Result<serde_json::Value, EnrichError>;
}

/// Enricher used when analysis is turned off.
pub struct DisabledEnricher;

#[async_trait]
impl Enricher for DisabledEnricher {
    async fn enrich(&self, _request: EnrichRequest) -> Result<serde_json::Value, EnrichError> {
        Err(EnrichError::Disabled)
    }
}
