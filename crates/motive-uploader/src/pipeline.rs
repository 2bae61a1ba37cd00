//! Per-item pipeline: `pending -> optimizing -> uploading -> analyzing -> complete`.
//!
//! Only the `uploading` stage can fail an item. Optimization falls back to the
//! original bytes and enrichment falls back to the upload's own metadata.

use bytes::Bytes;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use motive_core::constants::{PROGRESS_OPTIMIZED, PROGRESS_UPLOAD_RESPONDED, PROGRESS_UPLOAD_STARTED};
use motive_core::models::{BatchContext, ItemState, UploadItem, UploadedAsset};
use motive_core::{
    extract_asset_id, normalize_delivery_url, CredentialProvider, EnrichError, EnrichRequest,
    Enricher, LogLevel, TransitionError, TransmitError, TransmitRequest, Transmitter,
};
use motive_processing::{OptimizeOutcome, Optimizer};

use crate::progress::{ItemView, ProgressEvent, ProgressSender};

pub const CANCELLED_DETAIL: &str = "cancelled";

/// Collaborators shared by every pipeline of a batch.
#[derive(Clone)]
pub struct UploaderServices {
    pub transmitter: Arc<dyn Transmitter>,
    pub enricher: Arc<dyn Enricher>,
    pub optimizer: Arc<dyn Optimizer>,
    pub credentials: Arc<dyn CredentialProvider>,
}

/// Drives one [`UploadItem`] through its stages.
///
/// The pipeline owns its item for the duration of [`ItemPipeline::run`] and
/// reports every change through the progress channel.
#[derive(Clone)]
pub struct ItemPipeline {
    services: UploaderServices,
    batch_id: Uuid,
    context: Arc<BatchContext>,
    progress: Option<ProgressSender>,
    cancel: CancellationToken,
}

impl ItemPipeline {
    pub fn new(services: UploaderServices, batch_id: Uuid, context: Arc<BatchContext>) -> Self {
        Self {
            services,
            batch_id,
            context,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the item to a terminal state and hand it back.
    #[tracing::instrument(
        skip(self, item),
        fields(batch.id = %self.batch_id, item.id = %item.id(), file_name = %item.file_name())
    )]
    pub async fn run(&self, mut item: UploadItem) -> UploadItem {
        if let Err(e) = self.drive(&mut item).await {
            tracing::error!(error = %e, "Pipeline left the item graph");
            if !item.state().is_terminal() {
                if let Err(e) = item.fail(e.to_string()) {
                    tracing::error!(error = %e, "Could not record pipeline failure");
                }
                self.publish(&item);
            }
        }
        item
    }

    async fn drive(&self, item: &mut UploadItem) -> Result<(), TransitionError> {
        if self.cancel.is_cancelled() {
            return self.fail(item, TransmitError::Cancelled);
        }

        item.advance(ItemState::Optimizing)?;
        self.publish(item);

        let (payload, content_type) = self.optimize(item).await;
        item.set_progress(PROGRESS_OPTIMIZED);
        self.publish(item);

        if self.cancel.is_cancelled() {
            return self.fail(item, TransmitError::Cancelled);
        }

        item.advance(ItemState::Uploading)?;
        item.set_progress(PROGRESS_UPLOAD_STARTED);
        self.publish(item);

        let asset = match self.transmit(item, payload, content_type).await {
            Ok(asset) => asset,
            Err(e) => return self.fail(item, e),
        };
        item.set_progress(PROGRESS_UPLOAD_RESPONDED);
        self.publish(item);

        let result_url = normalize_delivery_url(&asset.url);
        item.begin_analyzing(result_url, asset.metadata.clone())?;
        self.publish(item);

        match self.enrich(item, &asset).await {
            Ok(metadata) => {
                item.apply_enrichment(metadata)?;
                tracing::debug!("Enrichment applied");
            }
            Err(e) => log_enrich_error(&e),
        }

        item.complete()?;
        self.publish(item);
        tracing::info!(result_url = item.result_url().unwrap_or_default(), "Item complete");
        Ok(())
    }

    /// Optimized payload, or the original bytes when optimization is skipped,
    /// fails, or panics.
    async fn optimize(&self, item: &UploadItem) -> (Bytes, String) {
        let source = item.source();
        let outcome = AssertUnwindSafe(self.services.optimizer.optimize(source))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(anyhow::anyhow!("optimizer panicked")));
        match outcome {
            Ok(OptimizeOutcome::Optimized { data, content_type }) => {
                tracing::debug!(
                    original_bytes = source.size(),
                    optimized_bytes = data.len(),
                    content_type = %content_type,
                    "Payload optimized"
                );
                (data, content_type)
            }
            Ok(OptimizeOutcome::Skipped { reason }) => {
                tracing::debug!(reason = %reason, "Optimization skipped");
                (source.data.clone(), source.content_type.clone())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Optimization failed, uploading original");
                (source.data.clone(), source.content_type.clone())
            }
        }
    }

    async fn transmit(
        &self,
        item: &UploadItem,
        payload: Bytes,
        content_type: String,
    ) -> Result<UploadedAsset, TransmitError> {
        let bearer_token = self
            .services
            .credentials
            .bearer_token()
            .await
            .map_err(|e| TransmitError::Credentials(e.to_string()))?;

        let request = TransmitRequest {
            file_name: item.file_name().to_string(),
            content_type,
            payload,
            envelope: self
                .context
                .envelope(self.batch_id, item.id(), item.file_name()),
            bearer_token,
        };

        let assets = tokio::select! {
            _ = self.cancel.cancelled() => return Err(TransmitError::Cancelled),
            result = self.services.transmitter.transmit(request) => result?,
        };

        if assets.len() > 1 {
            tracing::debug!(assets = assets.len(), "Upload produced several assets, using the first");
        }
        assets
            .into_iter()
            .next()
            .ok_or(TransmitError::MissingAssetRecord)
    }

    async fn enrich(
        &self,
        item: &UploadItem,
        asset: &UploadedAsset,
    ) -> Result<serde_json::Value, EnrichError> {
        let asset_id = asset
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| item.result_url().and_then(extract_asset_id))
            .ok_or(EnrichError::MissingAssetId)?;

        let bearer_token = self
            .services
            .credentials
            .bearer_token()
            .await
            .map_err(|e| EnrichError::Credentials(e.to_string()))?;

        let request = EnrichRequest {
            asset_id,
            hints: self.context.hints.clone(),
            bearer_token,
        };

        let enrich = AssertUnwindSafe(self.services.enricher.enrich(request)).catch_unwind();
        tokio::select! {
            _ = self.cancel.cancelled() => Err(EnrichError::Request("abandoned after cancellation".to_string())),
            result = enrich => result.unwrap_or_else(|_| Err(EnrichError::Request("enricher panicked".to_string()))),
        }
    }

    fn fail(&self, item: &mut UploadItem, error: TransmitError) -> Result<(), TransitionError> {
        match error.log_level() {
            LogLevel::Debug => tracing::debug!(error = %error, "Item failed"),
            LogLevel::Warn => tracing::warn!(error = %error, "Item failed"),
            LogLevel::Error => tracing::error!(error = %error, "Item failed"),
        }

        let detail = match error {
            TransmitError::Cancelled => CANCELLED_DETAIL.to_string(),
            other => other.to_string(),
        };
        item.fail(detail)?;
        self.publish(item);
        Ok(())
    }

    fn publish(&self, item: &UploadItem) {
        if let Some(sender) = &self.progress {
            // The tracker outlives every pipeline; a closed channel only means nobody is watching.
            let _ = sender.send(ProgressEvent {
                item: ItemView::from(item),
            });
        }
    }
}

fn log_enrich_error(error: &EnrichError) {
    match error.log_level() {
        LogLevel::Debug => tracing::debug!(error = %error, "Enrichment skipped"),
        LogLevel::Warn | LogLevel::Error => {
            tracing::warn!(error = %error, "Enrichment failed, keeping upload metadata")
        }
    }
}
