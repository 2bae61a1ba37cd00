//! Configuration module
//!
//! Uploader settings are read from the environment (a `.env` file is loaded
//! first when present). Every value has a default so a bare environment only
//! needs `MOTIVE_API_TOKEN`.

use std::env;

use crate::constants::{
    DEFAULT_ALLOWED_CONTENT_TYPES, DEFAULT_MAX_CONCURRENT_UPLOADS, DEFAULT_OPTIMIZE_MAX_DIMENSION,
    MAX_FILE_SIZE_BYTES,
};

const DEFAULT_API_URL: &str = "http://localhost:3000";
const HTTP_TIMEOUT_SECS: u64 = 60;
const QUALITY_PRESETS: &[&str] = &["normal", "better", "best", "lighter", "lightest"];

#[derive(Clone, Debug)]
pub struct UploaderConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub http_timeout_secs: u64,
    // Admission
    pub max_file_size_bytes: usize,
    pub allowed_content_types: Vec<String>,
    /// `None` = no per-batch limit.
    pub max_batch_size: Option<usize>,
    // Scheduling
    /// `0` = unbounded, every item in flight at once.
    pub max_concurrent_uploads: usize,
    // Optimizing stage
    pub optimize_images: bool,
    pub optimize_max_dimension: u32,
    pub optimize_quality: String,
    // Analyzing stage
    pub enrichment_enabled: bool,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            allowed_content_types: DEFAULT_ALLOWED_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_batch_size: None,
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
            optimize_images: true,
            optimize_max_dimension: DEFAULT_OPTIMIZE_MAX_DIMENSION,
            optimize_quality: "normal".to_string(),
            enrichment_enabled: true,
        }
    }
}

impl UploaderConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let max_file_size_bytes = env::var("MAX_FILE_SIZE_MB")
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .and_then(megabytes_to_bytes)
            .unwrap_or(defaults.max_file_size_bytes);

        let allowed_content_types = env::var("ALLOWED_CONTENT_TYPES")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|ct| ct.trim().to_lowercase())
                    .filter(|ct| !ct.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.allowed_content_types);

        let config = Self {
            api_url: env::var("MOTIVE_API_URL")
                .or_else(|_| env::var("API_URL"))
                .unwrap_or(defaults.api_url),
            api_token: env::var("MOTIVE_API_TOKEN")
                .or_else(|_| env::var("API_TOKEN"))
                .ok()
                .filter(|s| !s.is_empty()),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| HTTP_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(HTTP_TIMEOUT_SECS),
            max_file_size_bytes,
            allowed_content_types,
            max_batch_size: env::var("MAX_BATCH_SIZE")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .filter(|&n: &usize| n > 0),
            max_concurrent_uploads: env::var("MAX_CONCURRENT_UPLOADS")
                .unwrap_or_else(|_| DEFAULT_MAX_CONCURRENT_UPLOADS.to_string())
                .parse()
                .unwrap_or(DEFAULT_MAX_CONCURRENT_UPLOADS),
            optimize_images: env::var("OPTIMIZE_IMAGES")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
            optimize_max_dimension: env::var("OPTIMIZE_MAX_DIMENSION")
                .unwrap_or_else(|_| DEFAULT_OPTIMIZE_MAX_DIMENSION.to_string())
                .parse()
                .unwrap_or(DEFAULT_OPTIMIZE_MAX_DIMENSION),
            optimize_quality: env::var("OPTIMIZE_QUALITY")
                .unwrap_or(defaults.optimize_quality)
                .to_lowercase(),
            enrichment_enabled: env::var("ENRICHMENT_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "MOTIVE_API_URL must start with http:// or https://"
            ));
        }

        if self.max_file_size_bytes == 0 || self.max_file_size_bytes > MAX_FILE_SIZE_BYTES {
            return Err(anyhow::anyhow!(
                "MAX_FILE_SIZE_MB must be between 1 and {}",
                MAX_FILE_SIZE_BYTES / (1024 * 1024)
            ));
        }

        if self.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_CONTENT_TYPES must not be empty"));
        }

        if let Some(ct) = self
            .allowed_content_types
            .iter()
            .find(|ct| !ct.starts_with("image/"))
        {
            return Err(anyhow::anyhow!(
                "ALLOWED_CONTENT_TYPES only accepts still-image types, got {}",
                ct
            ));
        }

        if !QUALITY_PRESETS.contains(&self.optimize_quality.as_str()) {
            return Err(anyhow::anyhow!(
                "OPTIMIZE_QUALITY must be one of {}",
                QUALITY_PRESETS.join(", ")
            ));
        }

        if self.optimize_max_dimension == 0 {
            return Err(anyhow::anyhow!("OPTIMIZE_MAX_DIMENSION must be positive"));
        }

        Ok(())
    }

    /// Override the concurrency limit and re-check the result.
    pub fn with_max_concurrent_uploads(mut self, limit: usize) -> Result<Self, anyhow::Error> {
        self.max_concurrent_uploads = limit;
        self.validate()?;
        Ok(self)
    }

    /// Base URL without a trailing slash.
    pub fn api_base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

/// `None` when the product does not fit in `usize`.
fn megabytes_to_bytes(mb: usize) -> Option<usize> {
    mb.checked_mul(1024 * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = UploaderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_file_size_bytes, 50 * 1024 * 1024);
        assert_eq!(config.max_concurrent_uploads, 4);
        assert!(config.max_batch_size.is_none());
    }

    #[test]
    fn rejects_non_http_url() {
        let config = UploaderConfig {
            api_url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_size_above_ceiling() {
        let config = UploaderConfig {
            max_file_size_bytes: MAX_FILE_SIZE_BYTES + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_image_content_types() {
        let config = UploaderConfig {
            allowed_content_types: vec!["image/png".to_string(), "video/mp4".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_quality_preset() {
        let config = UploaderConfig {
            optimize_quality: "ultra".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn api_base_url_trims_trailing_slash() {
        let config = UploaderConfig {
            api_url: "https://admin.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.api_base_url(), "https://admin.example.com");
    }

    #[test]
    fn megabyte_conversion_does_not_overflow() {
        assert_eq!(megabytes_to_bytes(50), Some(50 * 1024 * 1024));
        assert_eq!(megabytes_to_bytes(usize::MAX), None);
        assert_eq!(megabytes_to_bytes(usize::MAX / 1024), None);
    }

    #[test]
    fn concurrency_override_revalidates() {
        let config = UploaderConfig::default()
            .with_max_concurrent_uploads(0)
            .unwrap();
        assert_eq!(config.max_concurrent_uploads, 0);

        let broken = UploaderConfig {
            optimize_quality: "ultra".to_string(),
            ..Default::default()
        };
        assert!(broken.with_max_concurrent_uploads(8).is_err());
    }
}
