//! Shared limits and progress checkpoints.

/// Hard ceiling on a single source file (50 MiB).
pub const MAX_FILE_SIZE_BYTES: usize = 50 * 1024 * 1024;

/// Still-image media types accepted by default.
pub const DEFAULT_ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/avif",
    "image/heic",
    "image/heif",
    "image/tiff",
    "image/bmp",
];

/// Default number of items allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 4;

/// Longest edge the optimizer will keep before downscaling.
pub const DEFAULT_OPTIMIZE_MAX_DIMENSION: u32 = 3000;

// Per-item progress checkpoints
pub const PROGRESS_PENDING: u8 = 0;
pub const PROGRESS_OPTIMIZED: u8 = 25;
pub const PROGRESS_UPLOAD_STARTED: u8 = 30;
pub const PROGRESS_UPLOAD_RESPONDED: u8 = 50;
pub const PROGRESS_ANALYZING: u8 = 75;
pub const PROGRESS_COMPLETE: u8 = 100;
