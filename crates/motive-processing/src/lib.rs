//! Motive Processing Library
//!
//! Local, side-effect-free work done before a file leaves the machine:
//! admission validation and the optional re-encoding performed in the
//! `optimizing` stage.

pub mod optimizer;
pub mod validator;

#[cfg(feature = "image")]
pub mod compression;

pub use optimizer::{NoopOptimizer, OptimizeOutcome, Optimizer};
pub use validator::{content_type_for_extension, content_type_for_path, BatchAdmission, ItemValidator};

#[cfg(feature = "image")]
pub use compression::{ImageOptimizer, QualityPreset};
