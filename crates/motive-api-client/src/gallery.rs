//! Gallery processing: canvas extension and matte previews.
//!
//! The processing service renders a preview and returns it either as a
//! `data:` URL or as a plain URL. A preview the user accepts is uploaded as a
//! new asset through any [`Transmitter`].

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use motive_core::models::{MetadataEnvelope, SourceFile, UploadedAsset};
use motive_core::{normalize_delivery_url, TransmitError, TransmitRequest, Transmitter};

use crate::{ApiClient, IMAGES_PREFIX};

pub const DEFAULT_CANVAS_PADDING: f32 = 0.05;
pub const DEFAULT_MATTE_WIDTH: u32 = 1920;
pub const DEFAULT_MATTE_HEIGHT: u32 = 1080;
pub const DEFAULT_MATTE_COLOR: &str = "#000000";

/// Extend an image's canvas to a target height, keeping the subject padded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendCanvasRequest {
    pub image_url: String,
    pub desired_height: u32,
    /// Fraction of the output height kept clear above and below the subject.
    pub padding_pct: f32,
    /// Background detection threshold; `None` lets the service pick one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_threshold: Option<u8>,
}

impl ExtendCanvasRequest {
    pub fn new(image_url: impl Into<String>, desired_height: u32) -> Self {
        Self {
            image_url: image_url.into(),
            desired_height,
            padding_pct: DEFAULT_CANVAS_PADDING,
            white_threshold: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.desired_height == 0 {
            return Err(anyhow!("desired height must be positive"));
        }
        if !(0.0..0.5).contains(&self.padding_pct) {
            return Err(anyhow!(
                "padding must be in [0, 0.5), got {}",
                self.padding_pct
            ));
        }
        Ok(())
    }
}

/// Place an image on a solid-colour matte of fixed dimensions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatteRequest {
    pub image_url: String,
    pub width: u32,
    pub height: u32,
    /// Percentage of the matte kept as border, `0 <= p < 50`.
    pub padding_percent: f32,
    pub color: String,
}

impl MatteRequest {
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            width: DEFAULT_MATTE_WIDTH,
            height: DEFAULT_MATTE_HEIGHT,
            padding_percent: 0.0,
            color: DEFAULT_MATTE_COLOR.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!("matte dimensions must be positive"));
        }
        if !(0.0..50.0).contains(&self.padding_percent) {
            return Err(anyhow!(
                "padding must be in [0, 50), got {}",
                self.padding_percent
            ));
        }
        if !is_hex_color(&self.color) {
            return Err(anyhow!("color must be #RRGGBB, got {}", self.color));
        }
        Ok(())
    }
}

fn is_hex_color(color: &str) -> bool {
    color
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// A rendered preview.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessedImage {
    Inline { content_type: String, data: Bytes },
    Remote(String),
}

impl ProcessedImage {
    /// Parse the `processedImageUrl` value returned by the service.
    pub fn parse(value: &str) -> Result<Self> {
        let Some(rest) = value.strip_prefix("data:") else {
            return Ok(ProcessedImage::Remote(value.to_string()));
        };

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| anyhow!("malformed data URL"))?;
        let content_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| anyhow!("only base64 data URLs are supported"))?;
        let data = STANDARD
            .decode(payload.trim())
            .context("Failed to decode preview payload")?;

        Ok(ProcessedImage::Inline {
            content_type: if content_type.is_empty() {
                "image/png".to_string()
            } else {
                content_type.to_string()
            },
            data: Bytes::from(data),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessResponse {
    #[serde(default)]
    success: bool,
    processed_image_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the gallery processing endpoints.
#[derive(Clone, Debug)]
pub struct GalleryClient {
    api: ApiClient,
}

impl GalleryClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    #[tracing::instrument(skip(self, token, request), fields(desired_height = request.desired_height))]
    pub async fn extend_canvas(
        &self,
        token: &str,
        request: &ExtendCanvasRequest,
    ) -> Result<ProcessedImage> {
        request.validate()?;
        self.process(&format!("{}/extend-canvas", IMAGES_PREFIX), token, request)
            .await
    }

    #[tracing::instrument(skip(self, token, request), fields(width = request.width, height = request.height))]
    pub async fn generate_matte(&self, token: &str, request: &MatteRequest) -> Result<ProcessedImage> {
        request.validate()?;
        self.process(&format!("{}/matte", IMAGES_PREFIX), token, request)
            .await
    }

    async fn process<B: Serialize>(&self, path: &str, token: &str, body: &B) -> Result<ProcessedImage> {
        let response: ProcessResponse = self.api.post_json(path, token, body).await?;

        if !response.success {
            return Err(anyhow!(
                "Processing failed: {}",
                response.error.unwrap_or_else(|| "unknown error".to_string())
            ));
        }

        let url = response
            .processed_image_url
            .ok_or_else(|| anyhow!("Processing response carried no image"))?;
        ProcessedImage::parse(&url)
    }

    /// Materialize a preview as an uploadable file.
    pub async fn fetch_preview(&self, preview: &ProcessedImage, file_name: &str) -> Result<SourceFile> {
        match preview {
            ProcessedImage::Inline { content_type, data } => {
                Ok(SourceFile::new(file_name, content_type.clone(), data.clone()))
            }
            ProcessedImage::Remote(url) => {
                let (data, content_type) = self.api.get_bytes(url).await?;
                Ok(SourceFile::new(
                    file_name,
                    content_type.unwrap_or_else(|| "image/jpeg".to_string()),
                    data,
                ))
            }
        }
    }

    /// Upload an accepted preview as a new asset and return its canonical record.
    #[tracing::instrument(skip_all, fields(file_name = %file_name))]
    pub async fn replace_image(
        &self,
        transmitter: &dyn Transmitter,
        preview: &ProcessedImage,
        file_name: &str,
        envelope: MetadataEnvelope,
        token: &str,
    ) -> Result<UploadedAsset> {
        let file = self.fetch_preview(preview, file_name).await?;

        let assets = transmitter
            .transmit(TransmitRequest {
                file_name: file.file_name,
                content_type: file.content_type,
                payload: file.data,
                envelope,
                bearer_token: token.to_string(),
            })
            .await
            .context("Failed to upload processed image")?;

        let mut asset = assets
            .into_iter()
            .next()
            .ok_or(TransmitError::MissingAssetRecord)?;
        asset.url = normalize_delivery_url(&asset.url);
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    fn gallery(server: &mockito::ServerGuard) -> GalleryClient {
        GalleryClient::new(ApiClient::new(server.url(), Duration::from_secs(5)).unwrap())
    }

    #[test]
    fn parses_base64_data_url() {
        let encoded = STANDARD.encode(b"png-bytes");
        let preview = ProcessedImage::parse(&format!("data:image/png;base64,{encoded}")).unwrap();
        assert_eq!(
            preview,
            ProcessedImage::Inline {
                content_type: "image/png".to_string(),
                data: Bytes::from_static(b"png-bytes"),
            }
        );
    }

    #[test]
    fn plain_url_is_remote() {
        assert_eq!(
            ProcessedImage::parse("https://cdn.example.com/tmp/p.jpg").unwrap(),
            ProcessedImage::Remote("https://cdn.example.com/tmp/p.jpg".to_string())
        );
    }

    #[test]
    fn rejects_malformed_data_urls() {
        assert!(ProcessedImage::parse("data:image/png;base64").is_err());
        assert!(ProcessedImage::parse("data:text/plain,hello").is_err());
        assert!(ProcessedImage::parse("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn extend_canvas_validation() {
        let mut request = ExtendCanvasRequest::new("https://x/a.jpg", 2700);
        assert!(request.validate().is_ok());
        request.padding_pct = 0.5;
        assert!(request.validate().is_err());
        request.padding_pct = 0.05;
        request.desired_height = 0;
        assert!(request.validate().is_err());
    }

    #[test]
    fn matte_validation() {
        let mut request = MatteRequest::new("https://x/a.jpg");
        assert_eq!((request.width, request.height), (1920, 1080));
        assert!(request.validate().is_ok());
        request.padding_percent = 50.0;
        assert!(request.validate().is_err());
        request.padding_percent = 10.0;
        request.color = "black".to_string();
        assert!(request.validate().is_err());
        request.color = "#fFfF00".to_string();
        assert!(request.validate().is_ok());
    }

    #[tokio::test]
    async fn extend_canvas_returns_inline_preview() {
        let mut server = mockito::Server::new_async().await;
        let encoded = STANDARD.encode(b"jpeg");
        let mock = server
            .mock("POST", "/api/images/extend-canvas")
            .match_body(Matcher::PartialJson(json!({
                "imageUrl": "https://cdn.example.com/deliver/abc",
                "desiredHeight": 2700
            })))
            .with_status(200)
            .with_body(
                json!({
                    "success": true,
                    "processedImageUrl": format!("data:image/jpeg;base64,{encoded}")
                })
                .to_string(),
            )
            .create_async()
            .await;

        let preview = gallery(&server)
            .extend_canvas(
                "t",
                &ExtendCanvasRequest::new("https://cdn.example.com/deliver/abc", 2700),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(matches!(preview, ProcessedImage::Inline { ref content_type, .. } if content_type == "image/jpeg"));
    }

    #[tokio::test]
    async fn matte_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/images/matte")
            .with_status(200)
            .with_body(r#"{"success":false,"error":"source not reachable"}"#)
            .create_async()
            .await;

        let err = gallery(&server)
            .generate_matte("t", &MatteRequest::new("https://x/a.jpg"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("source not reachable"));
    }

    #[tokio::test]
    async fn fetch_remote_preview_uses_declared_type() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tmp/p.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("png")
            .create_async()
            .await;

        let preview = ProcessedImage::Remote(format!("{}/tmp/p.png", server.url()));
        let file = gallery(&server)
            .fetch_preview(&preview, "p.png")
            .await
            .unwrap();
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.size(), 3);
    }

    struct RecordingTransmitter {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transmitter for RecordingTransmitter {
        async fn transmit(
            &self,
            request: TransmitRequest,
        ) -> Result<Vec<UploadedAsset>, TransmitError> {
            self.seen.lock().unwrap().push(request.file_name);
            Ok(vec![UploadedAsset {
                id: Some("new-id".to_string()),
                url: "https://cdn.example.com/deliver/new-id/public".to_string(),
                metadata: serde_json::Value::Null,
            }])
        }
    }

    #[tokio::test]
    async fn replace_image_uploads_preview_and_normalizes_url() {
        let server = mockito::Server::new_async().await;
        let transmitter = RecordingTransmitter {
            seen: Mutex::new(Vec::new()),
        };
        let preview = ProcessedImage::Inline {
            content_type: "image/jpeg".to_string(),
            data: Bytes::from_static(b"jpeg"),
        };
        let envelope = MetadataEnvelope {
            batch_id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            original_file_name: "front-extended.jpg".to_string(),
            target: None,
            hints: serde_json::Value::Null,
        };

        let asset = gallery(&server)
            .replace_image(&transmitter, &preview, "front-extended.jpg", envelope, "t")
            .await
            .unwrap();

        assert_eq!(asset.url, "https://cdn.example.com/deliver/new-id");
        assert_eq!(
            transmitter.seen.lock().unwrap().as_slice(),
            ["front-extended.jpg".to_string()]
        );
    }
}
