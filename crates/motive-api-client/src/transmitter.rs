use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use motive_core::models::UploadedAsset;
use motive_core::{TransmitError, TransmitRequest, Transmitter};

use crate::{error_message, ApiClient, IMAGES_PREFIX};

/// Upload response envelope. Older deployments return `assets` instead of `images`.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default, alias = "assets")]
    images: Vec<UploadedAsset>,
    #[serde(default)]
    error: Option<String>,
}

fn default_success() -> bool {
    true
}

/// [`Transmitter`] backed by `POST /api/images/upload`.
#[derive(Clone, Debug)]
pub struct HttpTransmitter {
    api: ApiClient,
}

impl HttpTransmitter {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn build_form(request: &TransmitRequest) -> Result<Form, TransmitError> {
        let file_part = Part::bytes(request.payload.to_vec())
            .file_name(request.file_name.clone())
            .mime_str(&request.content_type)
            .map_err(|e| TransmitError::Request(format!("invalid content type: {}", e)))?;

        let metadata = serde_json::to_string(&request.envelope)
            .map_err(|e| TransmitError::Request(format!("failed to encode metadata: {}", e)))?;
        let metadata_part = Part::text(metadata)
            .mime_str("application/json")
            .map_err(|e| TransmitError::Request(e.to_string()))?;

        Ok(Form::new()
            .part("file", file_part)
            .part("metadata", metadata_part))
    }
}

#[async_trait]
impl Transmitter for HttpTransmitter {
    #[tracing::instrument(
        skip(self, request),
        fields(item.id = %request.envelope.item_id, file_name = %request.file_name)
    )]
    async fn transmit(&self, request: TransmitRequest) -> Result<Vec<UploadedAsset>, TransmitError> {
        let form = Self::build_form(&request)?;
        let path = format!("{}/upload", IMAGES_PREFIX);

        let response = self
            .api
            .post_multipart_response(&path, &request.bearer_token, form)
            .await
            .map_err(|e| TransmitError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransmitError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(TransmitError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let parsed: UploadResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::debug!(error = %e, "Upload response is not a recognizable envelope");
            TransmitError::MissingAssetRecord
        })?;

        if !parsed.success {
            return Err(TransmitError::Status {
                status: status.as_u16(),
                message: parsed
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| "Upload rejected by server".to_string()),
            });
        }

        if parsed.images.is_empty() {
            return Err(TransmitError::MissingAssetRecord);
        }

        tracing::debug!(assets = parsed.images.len(), "Upload stored");
        Ok(parsed.images)
    }
}
