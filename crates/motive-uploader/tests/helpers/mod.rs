//! Test doubles for the uploader's collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use motive_core::models::{SourceFile, UploadedAsset};
use motive_core::{
    CredentialProvider, DisabledEnricher, EnrichError, EnrichRequest, Enricher, TransmitError,
    TransmitRequest, Transmitter,
};
use motive_processing::NoopOptimizer;
use motive_uploader::UploaderServices;

pub fn jpeg(name: &str) -> SourceFile {
    SourceFile::new(name, "image/jpeg", vec![0xFFu8, 0xD8, 0xFF, 0xE0])
}

pub fn jpegs(n: usize) -> Vec<SourceFile> {
    (1..=n).map(|i| jpeg(&format!("photo-{i}.jpg"))).collect()
}

fn stem(file_name: &str) -> &str {
    file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem)
}

/// Stores every payload at `https://cdn.example.com/deliver/<stem>/public`.
#[derive(Default)]
pub struct MockTransmitter {
    failures: HashMap<String, u16>,
    panics_on: Option<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
    pub tokens: Mutex<Vec<String>>,
}

impl MockTransmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, file_name: &str, status: u16) -> Self {
        self.failures.insert(file_name.to_string(), status);
        self
    }

    pub fn panic_on(mut self, file_name: &str) -> Self {
        self.panics_on = Some(file_name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transmitter for MockTransmitter {
    async fn transmit(&self, request: TransmitRequest) -> Result<Vec<UploadedAsset>, TransmitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(request.bearer_token.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panics_on.as_deref() == Some(request.file_name.as_str()) {
            panic!("transmitter blew up on {}", request.file_name);
        }

        if let Some(status) = self.failures.get(&request.file_name) {
            return Err(TransmitError::Status {
                status: *status,
                message: format!("storage rejected {}", request.file_name),
            });
        }

        let id = stem(&request.file_name);
        Ok(vec![UploadedAsset {
            id: Some(id.to_string()),
            url: format!("https://cdn.example.com/deliver/{id}/public"),
            metadata: json!({
                "uploadedAs": request.file_name,
                "itemId": request.envelope.item_id,
            }),
        }])
    }
}

pub enum EnrichBehavior {
    Succeed(serde_json::Value),
    Fail,
    Panic,
    /// Signal `entered`, then never return.
    Hang,
}

pub struct MockEnricher {
    behavior: EnrichBehavior,
    pub calls: AtomicUsize,
    pub asset_ids: Mutex<Vec<String>>,
    pub entered: Arc<Notify>,
}

impl MockEnricher {
    pub fn new(behavior: EnrichBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            asset_ids: Mutex::new(Vec::new()),
            entered: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl Enricher for MockEnricher {
    async fn enrich(&self, request: EnrichRequest) -> Result<serde_json::Value, EnrichError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.asset_ids.lock().unwrap().push(request.asset_id.clone());

        match &self.behavior {
            EnrichBehavior::Succeed(value) => Ok(value.clone()),
            EnrichBehavior::Fail => Err(EnrichError::Status {
                status: 502,
                message: "vision model unavailable".to_string(),
            }),
            EnrichBehavior::Panic => panic!("enricher blew up"),
            EnrichBehavior::Hang => {
                self.entered.notify_one();
                std::future::pending().await
            }
        }
    }
}

/// Hands out a fresh token per call and counts calls.
#[derive(Default)]
pub struct CountingCredentials {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CredentialProvider for CountingCredentials {
    async fn bearer_token(&self) -> anyhow::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("token-{n}"))
    }
}

pub fn services(
    transmitter: Arc<MockTransmitter>,
    enricher: Option<Arc<MockEnricher>>,
    credentials: Arc<CountingCredentials>,
) -> UploaderServices {
    UploaderServices {
        transmitter,
        enricher: match enricher {
            Some(enricher) => enricher,
            None => Arc::new(DisabledEnricher),
        },
        optimizer: Arc::new(NoopOptimizer),
        credentials,
    }
}
