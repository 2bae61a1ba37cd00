use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Asset record returned by the transmitter for a stored upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedAsset {
    /// Asset identifier used to key enrichment. Some storage backends omit it.
    #[serde(default)]
    pub id: Option<String>,
    pub url: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Parent record the uploaded assets belong to (e.g. a car).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetAssociation {
    pub entity: String,
    pub entity_id: String,
}

impl TargetAssociation {
    pub fn new(entity: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            entity_id: entity_id.into(),
        }
    }
}

/// Metadata sent alongside each payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEnvelope {
    pub batch_id: Uuid,
    pub item_id: Uuid,
    pub original_file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetAssociation>,
    /// Hints forwarded to the enrichment step (vehicle info, angle, etc.)
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub hints: serde_json::Value,
}

/// Batch-wide context folded into every item's envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchContext {
    pub target: Option<TargetAssociation>,
    pub hints: serde_json::Value,
}

impl BatchContext {
    pub fn for_target(target: TargetAssociation) -> Self {
        Self {
            target: Some(target),
            hints: serde_json::Value::Null,
        }
    }

    pub fn with_hints(mut self, hints: serde_json::Value) -> Self {
        self.hints = hints;
        self
    }

    pub fn envelope(&self, batch_id: Uuid, item_id: Uuid, file_name: &str) -> MetadataEnvelope {
        MetadataEnvelope {
            batch_id,
            item_id,
            original_file_name: file_name.to_string(),
            target: self.target.clone(),
            hints: self.hints.clone(),
        }
    }
}
