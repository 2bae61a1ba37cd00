//! HTTP client for the Motive admin API.
//!
//! Provides a minimal client with per-request bearer auth and the HTTP
//! implementations of the uploader's collaborators: [`HttpTransmitter`],
//! [`HttpEnricher`] and the gallery processing client ([`GalleryClient`]).

pub mod enricher;
pub mod gallery;
pub mod transmitter;

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use motive_core::UploaderConfig;

/// API path prefix for image endpoints.
pub const IMAGES_PREFIX: &str = "/api/images";

/// HTTP client for the Motive admin API.
///
/// Holds no credentials: every call takes the bearer token its caller fetched
/// for that stage.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &UploaderConfig) -> Result<Self> {
        Self::new(
            config.api_base_url().to_string(),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(request: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bearer {}", token))
    }

    /// POST JSON and return the raw response; status handling is left to the caller.
    pub async fn post_json_response<B: serde::Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> reqwest::Result<Response> {
        let request = self.client.post(self.build_url(path)).json(body);
        Self::bearer(request, token).send().await
    }

    /// POST multipart form and return the raw response.
    pub async fn post_multipart_response(
        &self,
        path: &str,
        token: &str,
        form: reqwest::multipart::Form,
    ) -> reqwest::Result<Response> {
        let request = self.client.post(self.build_url(path)).multipart(form);
        Self::bearer(request, token).send().await
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .post_json_response(path, token, body)
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "API request failed with status {}: {}",
                status,
                error_message(status, &error_text)
            ));
        }

        let body: T = response
            .json()
            .await
            .context("Failed to parse response as JSON")?;

        Ok(body)
    }

    /// GET an absolute URL and return the body with its declared content type.
    pub async fn get_bytes(&self, url: &str) -> Result<(bytes::Bytes, Option<String>)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "Download of {} failed with status {}",
                url,
                status
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let data = response
            .bytes()
            .await
            .context("Failed to read response body")?;

        Ok((data, content_type))
    }

    /// Raw client for custom requests.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Human-readable cause from an error response body.
///
/// Prefers a JSON `error` or `message` field, then the raw body, then the
/// status reason.
pub fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message", "details"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                if !msg.trim().is_empty() {
                    return msg.trim().to_string();
                }
            }
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}

pub use enricher::HttpEnricher;
pub use gallery::{ExtendCanvasRequest, GalleryClient, MatteRequest, ProcessedImage};
pub use transmitter::HttpTransmitter;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_json_error_field() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error":"Invalid file"}"#),
            "Invalid file"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":"Quota exceeded"}"#),
            "Quota exceeded"
        );
    }

    #[test]
    fn error_message_falls_back_to_body_then_reason() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down\n"),
            "upstream down"
        );
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, ""),
            "Internal Server Error"
        );
    }

    #[test]
    fn base_url_is_trimmed() {
        let client =
            ApiClient::new("https://admin.example.com/".to_string(), Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            client.build_url("/api/images/upload"),
            "https://admin.example.com/api/images/upload"
        );
    }
}
