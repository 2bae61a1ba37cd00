//! Optimizer trait for the `optimizing` stage.
//!
//! Optimization is cosmetic: the pipeline treats an error here as "upload the
//! original bytes" and never as an item failure.

use async_trait::async_trait;
use bytes::Bytes;

use motive_core::models::SourceFile;

/// Result of an optimization attempt that did not error.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizeOutcome {
    /// Replacement payload, possibly in a different media type.
    Optimized { data: Bytes, content_type: String },
    /// Deliberately left untouched.
    Skipped { reason: String },
}

#[async_trait]
pub trait Optimizer: Send + Sync {
    async fn optimize(&self, file: &SourceFile) -> anyhow::Result<OptimizeOutcome>;
}

/// Optimizer used when local re-encoding is turned off.
pub struct NoopOptimizer;

#[async_trait]
impl Optimizer for NoopOptimizer {
    async fn optimize(&self, _file: &SourceFile) -> anyhow::Result<OptimizeOutcome> {
        Ok(OptimizeOutcome::Skipped {
            reason: "optimization disabled".to_string(),
        })
    }
}
