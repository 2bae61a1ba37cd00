//! Motive Core Library
//!
//! This crate provides the domain models, error types, configuration and the
//! collaborator traits (transmitter, enricher, credentials) shared by every
//! Motive uploader component.

pub mod config;
pub mod constants;
pub mod credentials;
pub mod delivery_url;
pub mod enricher;
pub mod error;
pub mod models;
pub mod transmitter;

// Re-export commonly used types
pub use config::UploaderConfig;
pub use credentials::{CredentialProvider, StaticCredentials};
pub use delivery_url::{extract_asset_id, is_delivery_url, normalize_delivery_url, with_variant};
pub use enricher::{DisabledEnricher, EnrichRequest, Enricher};
pub use error::{
    EnrichError, LogLevel, OrchestrationError, TransitionError, TransmitError, ValidationError,
};
pub use transmitter::{TransmitRequest, Transmitter};
