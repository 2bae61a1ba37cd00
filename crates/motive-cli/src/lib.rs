use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use motive_api_client::{ApiClient, HttpEnricher, HttpTransmitter};
use motive_core::models::SourceFile;
use motive_core::{DisabledEnricher, Enricher, StaticCredentials, UploaderConfig};
use motive_processing::{
    content_type_for_path, ImageOptimizer, ItemValidator, NoopOptimizer, Optimizer,
};
use motive_uploader::{BatchProgress, UploaderServices};

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Read a local file, declaring its media type from the extension.
///
/// The size ceiling is checked against file metadata before any bytes are read.
pub async fn read_source_file(path: &Path, validator: &ItemValidator) -> Result<SourceFile> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
    validator.validate_file_size(&file_name, size)?;

    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(SourceFile::new(file_name, content_type_for_path(path), data))
}

/// HTTP-backed collaborators for a configured environment.
pub fn build_services(config: &UploaderConfig) -> Result<UploaderServices> {
    let token = config
        .api_token
        .clone()
        .context("MOTIVE_API_TOKEN is not set")?;
    let api = ApiClient::from_config(config)?;

    let optimizer: Arc<dyn Optimizer> = if config.optimize_images {
        Arc::new(ImageOptimizer::from_config(config)?)
    } else {
        Arc::new(NoopOptimizer)
    };
    let enricher: Arc<dyn Enricher> = if config.enrichment_enabled {
        Arc::new(HttpEnricher::new(api.clone()))
    } else {
        Arc::new(DisabledEnricher)
    };

    Ok(UploaderServices {
        transmitter: Arc::new(HttpTransmitter::new(api)),
        enricher,
        optimizer,
        credentials: Arc::new(StaticCredentials::new(token)),
    })
}

/// One-line status, e.g. `[ 40%] 2/5 complete, 1 active, 1 pending, 1 failed`.
pub fn progress_line(progress: &BatchProgress) -> String {
    let s = &progress.snapshot;
    format!(
        "[{:>3}%] {}/{} complete, {} active, {} pending, {} failed",
        s.percent, s.complete, s.total, s.active, s.pending, s.error
    )
}
