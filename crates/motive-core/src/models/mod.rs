//! Data models for the uploader
//!
//! Each sub-module covers one part of a batch's life: the per-file upload
//! item and its state machine, the assets returned by the transmitter, and
//! the batch-level summary handed back to the caller.

mod asset;
mod batch;
mod upload;

pub use asset::*;
pub use batch::*;
pub use upload::*;
