use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

use motive_core::models::SourceFile;
use motive_core::UploaderConfig;

use crate::optimizer::{OptimizeOutcome, Optimizer};

/// Quality presets for image compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityPreset {
    #[default]
    Normal, // Default quality, balanced size and quality
    Better,   // Higher quality, ≈125% file size
    Best,     // Near pristine quality, ≈170% file size
    Lighter,  // Smaller files, ≈80% file size
    Lightest, // Maximum compression, ≈50% file size
}

impl QualityPreset {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(QualityPreset::Normal),
            "better" => Ok(QualityPreset::Better),
            "best" => Ok(QualityPreset::Best),
            "lighter" => Ok(QualityPreset::Lighter),
            "lightest" => Ok(QualityPreset::Lightest),
            _ => Err(anyhow!("Invalid quality preset: {}", s)),
        }
    }

    /// Get quality value for JPEG (0-100)
    pub fn jpeg_quality(self) -> u8 {
        match self {
            QualityPreset::Normal => 80,
            QualityPreset::Better => 85,
            QualityPreset::Best => 95,
            QualityPreset::Lighter => 70,
            QualityPreset::Lightest => 55,
        }
    }
}

/// Re-encodes still images before upload: downscales to a maximum edge and
/// writes JPEG (PNG when the image has transparency).
///
/// The result is only used when it is smaller than the original.
#[derive(Debug, Clone)]
pub struct ImageOptimizer {
    max_dimension: u32,
    quality: QualityPreset,
}

impl ImageOptimizer {
    pub fn new(max_dimension: u32, quality: QualityPreset) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            quality,
        }
    }

    pub fn from_config(config: &UploaderConfig) -> Result<Self> {
        Ok(Self::new(
            config.optimize_max_dimension,
            QualityPreset::parse(&config.optimize_quality)?,
        ))
    }

    /// CPU-bound part of [`Optimizer::optimize`].
    pub fn optimize_bytes(&self, data: &[u8], content_type: &str) -> Result<OptimizeOutcome> {
        let format = match ImageFormat::from_mime_type(content_type) {
            Some(ImageFormat::Gif) => {
                return Ok(OptimizeOutcome::Skipped {
                    reason: "animated formats are uploaded as-is".to_string(),
                })
            }
            Some(f @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP)) => f,
            _ => {
                return Ok(OptimizeOutcome::Skipped {
                    reason: format!("no local encoder for {}", content_type),
                })
            }
        };

        let img = image::load_from_memory_with_format(data, format)
            .context("Failed to decode image")?;

        let (width, height) = img.dimensions();
        let img = if width.max(height) > self.max_dimension {
            img.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3)
        } else {
            img
        };

        let (encoded, out_type) = if img.color().has_alpha() {
            (Self::encode_png(&img)?, "image/png")
        } else {
            (self.encode_jpeg(&img)?, "image/jpeg")
        };

        if encoded.len() >= data.len() {
            return Ok(OptimizeOutcome::Skipped {
                reason: "re-encoding did not reduce size".to_string(),
            });
        }

        Ok(OptimizeOutcome::Optimized {
            data: encoded,
            content_type: out_type.to_string(),
        })
    }

    fn encode_jpeg(&self, img: &DynamicImage) -> Result<Bytes> {
        let rgb = img.to_rgb8();
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality.jpeg_quality());
        encoder
            .encode_image(&rgb)
            .context("Failed to encode JPEG")?;
        Ok(Bytes::from(buffer))
    }

    fn encode_png(img: &DynamicImage) -> Result<Bytes> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        img.write_to(&mut cursor, ImageFormat::Png)
            .context("Failed to encode PNG")?;
        Ok(Bytes::from(buffer))
    }
}

#[async_trait]
impl Optimizer for ImageOptimizer {
    async fn optimize(&self, file: &SourceFile) -> Result<OptimizeOutcome> {
        let optimizer = self.clone();
        let data = file.data.clone();
        let content_type = file.content_type.clone();
        // Image decode is CPU-bound; run off the async pool to avoid blocking other items.
        tokio::task::spawn_blocking(move || optimizer.optimize_bytes(&data, &content_type))
            .await
            .context("Optimizer task failed")?
    }
}
