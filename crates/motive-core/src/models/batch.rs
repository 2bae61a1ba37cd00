use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of an item that reached `complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSuccess {
    pub result_url: String,
    pub result_metadata: serde_json::Value,
}

/// An item that ended in `error`, for inline reporting next to the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub item_id: Uuid,
    pub file_name: String,
    pub error_detail: String,
}

/// Outcome of one batch run.
///
/// `successes` is in completion order; no cross-item ordering is implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub total: usize,
    pub successes: Vec<BatchSuccess>,
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    pub fn empty(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            total: 0,
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    /// Derived, never stored: `total - successes`.
    pub fn failure_count(&self) -> usize {
        self.total.saturating_sub(self.successes.len())
    }

    pub fn is_complete_success(&self) -> bool {
        self.failure_count() == 0
    }

    /// "N of M succeeded"
    pub fn describe(&self) -> String {
        format!("{} of {} succeeded", self.success_count(), self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_count_is_derived() {
        let summary = BatchSummary {
            batch_id: Uuid::nil(),
            total: 3,
            successes: vec![BatchSuccess {
                result_url: "u".to_string(),
                result_metadata: json!({}),
            }],
            failures: Vec::new(),
        };
        assert_eq!(summary.failure_count(), 2);
        assert!(!summary.is_complete_success());
        assert_eq!(summary.describe(), "1 of 3 succeeded");
    }

    #[test]
    fn empty_summary_is_a_success() {
        let summary = BatchSummary::empty(Uuid::nil());
        assert_eq!(summary.failure_count(), 0);
        assert!(summary.is_complete_success());
        assert_eq!(summary.describe(), "0 of 0 succeeded");
    }
}
