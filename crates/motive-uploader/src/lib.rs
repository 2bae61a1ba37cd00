//! Motive Uploader
//!
//! Concurrent batch upload: admitted files become [`UploadItem`]s, each driven
//! by its own [`ItemPipeline`] under a [`BatchOrchestrator`]. Progress is
//! published by a tracker task as [`BatchProgress`] snapshots.
//!
//! [`UploadItem`]: motive_core::models::UploadItem

pub mod orchestrator;
pub mod pipeline;
pub mod progress;

pub use orchestrator::{BatchOrchestrator, BatchRun};
pub use pipeline::{ItemPipeline, UploaderServices, CANCELLED_DETAIL};
pub use progress::{
    BatchProgress, ItemView, ProgressAggregator, ProgressEvent, ProgressSnapshot, ProgressTracker,
};
