use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use motive_core::{EnrichError, EnrichRequest, Enricher};

use crate::{error_message, ApiClient, IMAGES_PREFIX};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    image_id: &'a str,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    hints: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    metadata: serde_json::Value,
}

/// [`Enricher`] backed by `POST /api/images/analyze`.
#[derive(Clone, Debug)]
pub struct HttpEnricher {
    api: ApiClient,
}

impl HttpEnricher {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Enricher for HttpEnricher {
    #[tracing::instrument(skip(self, request), fields(asset.id = %request.asset_id))]
    async fn enrich(&self, request: EnrichRequest) -> Result<serde_json::Value, EnrichError> {
        if request.asset_id.trim().is_empty() {
            return Err(EnrichError::MissingAssetId);
        }

        let body = AnalyzeRequest {
            image_id: &request.asset_id,
            hints: &request.hints,
        };
        let path = format!("{}/analyze", IMAGES_PREFIX);

        let response = self
            .api
            .post_json_response(&path, &request.bearer_token, &body)
            .await
            .map_err(|e| EnrichError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EnrichError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(EnrichError::Status {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        let parsed: AnalyzeResponse = serde_json::from_str(&text)
            .map_err(|e| EnrichError::Request(format!("invalid analyze response: {}", e)))?;

        if parsed.metadata.is_null() {
            return Err(EnrichError::Request(
                "analyze response carried no metadata".to_string(),
            ));
        }

        Ok(parsed.metadata)
    }
}
