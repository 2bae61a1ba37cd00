use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::constants::{PROGRESS_ANALYZING, PROGRESS_COMPLETE, PROGRESS_PENDING};
use crate::error::TransitionError;

/// Pipeline state of a single upload item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    Optimizing,
    Uploading,
    Analyzing,
    Complete,
    Error,
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Complete | ItemState::Error)
    }

    /// Optimizing, uploading or analyzing.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ItemState::Optimizing | ItemState::Uploading | ItemState::Analyzing
        )
    }

    /// Edges of the pipeline graph.
    ///
    /// `analyzing` only leads to `complete`: once an asset is stored the item
    /// holds a result URL and can no longer fail.
    pub fn can_transition_to(self, next: ItemState) -> bool {
        use ItemState::*;
        matches!(
            (self, next),
            (Pending, Optimizing)
                | (Pending, Error)
                | (Optimizing, Uploading)
                | (Optimizing, Error)
                | (Uploading, Analyzing)
                | (Uploading, Error)
                | (Analyzing, Complete)
        )
    }
}

impl Display for ItemState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ItemState::Pending => write!(f, "pending"),
            ItemState::Optimizing => write!(f, "optimizing"),
            ItemState::Uploading => write!(f, "uploading"),
            ItemState::Analyzing => write!(f, "analyzing"),
            ItemState::Complete => write!(f, "complete"),
            ItemState::Error => write!(f, "error"),
        }
    }
}

impl FromStr for ItemState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemState::Pending),
            "optimizing" => Ok(ItemState::Optimizing),
            "uploading" => Ok(ItemState::Uploading),
            "analyzing" => Ok(ItemState::Analyzing),
            "complete" => Ok(ItemState::Complete),
            "error" => Ok(ItemState::Error),
            _ => Err(anyhow::anyhow!("Invalid item state: {}", s)),
        }
    }
}

/// The original payload of an upload item and what the caller declared about it.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl SourceFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// One file's journey through the pipeline.
///
/// Mutation goes through the transition methods so the pipeline graph,
/// progress monotonicity and the result/error exclusivity hold at all times.
#[derive(Debug, Clone)]
pub struct UploadItem {
    id: Uuid,
    source: SourceFile,
    state: ItemState,
    progress_percent: u8,
    result_url: Option<String>,
    result_metadata: serde_json::Value,
    error_detail: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UploadItem {
    pub fn new(source: SourceFile) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source,
            state: ItemState::Pending,
            progress_percent: PROGRESS_PENDING,
            result_url: None,
            result_metadata: serde_json::Value::Null,
            error_detail: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn file_name(&self) -> &str {
        &self.source.file_name
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn result_url(&self) -> Option<&str> {
        self.result_url.as_deref()
    }

    pub fn result_metadata(&self) -> &serde_json::Value {
        &self.result_metadata
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Move along the pipeline graph.
    pub fn advance(&mut self, next: ItemState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                item_id: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Raise progress; lower values are ignored.
    pub fn set_progress(&mut self, percent: u8) {
        let percent = percent.min(PROGRESS_COMPLETE);
        if percent > self.progress_percent {
            self.progress_percent = percent;
            self.updated_at = Utc::now();
        }
    }

    /// Upload succeeded: record the canonical URL and the upload's metadata.
    pub fn begin_analyzing(
        &mut self,
        result_url: String,
        metadata: serde_json::Value,
    ) -> Result<(), TransitionError> {
        self.advance(ItemState::Analyzing)?;
        self.result_url = Some(result_url);
        self.result_metadata = metadata;
        self.set_progress(PROGRESS_ANALYZING);
        Ok(())
    }

    /// Replace the metadata with the enrichment result. Only valid while analyzing.
    pub fn apply_enrichment(&mut self, metadata: serde_json::Value) -> Result<(), TransitionError> {
        if self.state != ItemState::Analyzing {
            return Err(TransitionError {
                item_id: self.id,
                from: self.state,
                to: ItemState::Analyzing,
            });
        }
        self.result_metadata = metadata;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.advance(ItemState::Complete)?;
        self.set_progress(PROGRESS_COMPLETE);
        Ok(())
    }

    /// Terminal failure. Progress stays where the item got to.
    pub fn fail(&mut self, detail: impl Into<String>) -> Result<(), TransitionError> {
        self.advance(ItemState::Error)?;
        let detail = detail.into();
        self.error_detail = Some(if detail.trim().is_empty() {
            "Upload failed".to_string()
        } else {
            detail
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> UploadItem {
        UploadItem::new(SourceFile::new("a.jpg", "image/jpeg", vec![1u8, 2, 3]))
    }

    #[test]
    fn new_item_is_pending_at_zero() {
        let item = item();
        assert_eq!(item.state(), ItemState::Pending);
        assert_eq!(item.progress_percent(), 0);
        assert!(item.result_url().is_none());
        assert!(item.error_detail().is_none());
        assert!(item.result_metadata().is_null());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(item().id(), item().id());
    }

    #[test]
    fn happy_path_transitions() {
        let mut item = item();
        item.advance(ItemState::Optimizing).unwrap();
        item.advance(ItemState::Uploading).unwrap();
        item.begin_analyzing("https://cdn/deliver/abc".to_string(), json!({"a": 1}))
            .unwrap();
        assert_eq!(item.progress_percent(), PROGRESS_ANALYZING);
        item.apply_enrichment(json!({"b": 2})).unwrap();
        item.complete().unwrap();
        assert_eq!(item.state(), ItemState::Complete);
        assert_eq!(item.progress_percent(), 100);
        assert_eq!(item.result_url(), Some("https://cdn/deliver/abc"));
        assert_eq!(item.result_metadata(), &json!({"b": 2}));
    }

    #[test]
    fn backward_transition_rejected() {
        let mut item = item();
        item.advance(ItemState::Optimizing).unwrap();
        item.advance(ItemState::Uploading).unwrap();
        let err = item.advance(ItemState::Optimizing).unwrap_err();
        assert_eq!(err.from, ItemState::Uploading);
        assert_eq!(err.to, ItemState::Optimizing);
        assert_eq!(item.state(), ItemState::Uploading);
    }

    #[test]
    fn analyzing_item_cannot_fail() {
        let mut item = item();
        item.advance(ItemState::Optimizing).unwrap();
        item.advance(ItemState::Uploading).unwrap();
        item.begin_analyzing("u".to_string(), json!({})).unwrap();
        assert!(item.fail("boom").is_err());
        assert_eq!(item.result_url(), Some("u"));
        assert!(item.error_detail().is_none());
    }

    #[test]
    fn fail_keeps_progress_and_sets_detail() {
        let mut item = item();
        item.advance(ItemState::Optimizing).unwrap();
        item.set_progress(25);
        item.advance(ItemState::Uploading).unwrap();
        item.set_progress(30);
        item.fail("status 500").unwrap();
        assert_eq!(item.state(), ItemState::Error);
        assert_eq!(item.progress_percent(), 30);
        assert_eq!(item.error_detail(), Some("status 500"));
        assert!(item.result_url().is_none());
    }

    #[test]
    fn blank_error_detail_is_replaced() {
        let mut item = item();
        item.fail("  ").unwrap();
        assert_eq!(item.error_detail(), Some("Upload failed"));
    }

    #[test]
    fn progress_never_decreases() {
        let mut item = item();
        item.set_progress(50);
        item.set_progress(30);
        assert_eq!(item.progress_percent(), 50);
        item.set_progress(250);
        assert_eq!(item.progress_percent(), 100);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for next in [
            ItemState::Pending,
            ItemState::Optimizing,
            ItemState::Uploading,
            ItemState::Analyzing,
            ItemState::Complete,
            ItemState::Error,
        ] {
            assert!(!ItemState::Complete.can_transition_to(next));
            assert!(!ItemState::Error.can_transition_to(next));
        }
    }

    #[test]
    fn state_round_trips_through_str() {
        for state in [ItemState::Pending, ItemState::Analyzing, ItemState::Error] {
            assert_eq!(state.to_string().parse::<ItemState>().unwrap(), state);
        }
        assert!("done".parse::<ItemState>().is_err());
    }
}
