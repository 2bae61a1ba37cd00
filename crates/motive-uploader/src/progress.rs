//! Batch progress: pure aggregation plus the tracker task that owns item views.
//!
//! Pipelines never share item state. Each one sends [`ProgressEvent`]s over an
//! mpsc channel; the tracker applies them to its own map and publishes a fresh
//! [`BatchProgress`] on a watch channel after every event.

use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use motive_core::models::{ItemState, UploadItem};

/// Read-only view of one item, as rendered next to its file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub id: Uuid,
    pub file_name: String,
    pub state: ItemState,
    pub progress_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl From<&UploadItem> for ItemView {
    fn from(item: &UploadItem) -> Self {
        Self {
            id: item.id(),
            file_name: item.file_name().to_string(),
            state: item.state(),
            progress_percent: item.progress_percent(),
            result_url: item.result_url().map(str::to_string),
            error_detail: item.error_detail().map(str::to_string),
        }
    }
}

/// Counts by state plus overall completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub pending: usize,
    /// Optimizing, uploading or analyzing.
    pub active: usize,
    pub complete: usize,
    pub error: usize,
    pub total: usize,
    /// `round(complete / total * 100)`, `0` for an empty batch.
    pub percent: u8,
}

impl ProgressSnapshot {
    pub fn is_finished(&self) -> bool {
        self.complete + self.error == self.total
    }
}

/// Derives a [`ProgressSnapshot`] from item states.
pub struct ProgressAggregator;

impl ProgressAggregator {
    pub fn snapshot<I>(states: I) -> ProgressSnapshot
    where
        I: IntoIterator<Item = ItemState>,
    {
        let mut snapshot = ProgressSnapshot::default();
        for state in states {
            snapshot.total += 1;
            match state {
                ItemState::Pending => snapshot.pending += 1,
                ItemState::Complete => snapshot.complete += 1,
                ItemState::Error => snapshot.error += 1,
                ItemState::Optimizing | ItemState::Uploading | ItemState::Analyzing => {
                    snapshot.active += 1
                }
            }
        }

        snapshot.percent = if snapshot.total == 0 {
            0
        } else {
            ((snapshot.complete as f64 / snapshot.total as f64) * 100.0).round() as u8
        };
        snapshot
    }

    pub fn snapshot_items(items: &[UploadItem]) -> ProgressSnapshot {
        Self::snapshot(items.iter().map(UploadItem::state))
    }
}

/// State change reported by a pipeline.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub item: ItemView,
}

/// What callers observe through the watch channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchProgress {
    pub snapshot: ProgressSnapshot,
    /// In admission order.
    pub items: Vec<ItemView>,
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// Handles to a running tracker.
pub struct ProgressTracker {
    pub sender: ProgressSender,
    pub receiver: watch::Receiver<BatchProgress>,
    pub handle: JoinHandle<()>,
}

impl ProgressTracker {
    /// Start a tracker seeded with the batch's items.
    ///
    /// The task ends once every clone of `sender` is dropped.
    pub fn spawn(initial: Vec<ItemView>) -> Self {
        let (sender, mut events) = mpsc::unbounded_channel::<ProgressEvent>();

        let order: Vec<Uuid> = initial.iter().map(|view| view.id).collect();
        let mut views: HashMap<Uuid, ItemView> =
            initial.into_iter().map(|view| (view.id, view)).collect();

        let (publisher, receiver) = watch::channel(render(&order, &views));

        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if apply(&mut views, event.item) {
                    publisher.send_replace(render(&order, &views));
                }
            }
            tracing::debug!(items = order.len(), "Progress tracker finished");
        });

        Self {
            sender,
            receiver,
            handle,
        }
    }
}

/// Returns whether the view changed. Unknown ids and out-of-order updates are
/// dropped; a failure report is accepted from any non-terminal state.
fn apply(views: &mut HashMap<Uuid, ItemView>, update: ItemView) -> bool {
    let Some(current) = views.get_mut(&update.id) else {
        tracing::warn!(item.id = %update.id, "Progress event for unknown item");
        return false;
    };

    if current.state.is_terminal() {
        return false;
    }
    let forced_failure = update.state == ItemState::Error;
    if update.state != current.state
        && !forced_failure
        && !current.state.can_transition_to(update.state)
    {
        tracing::debug!(
            item.id = %update.id,
            from = %current.state,
            to = %update.state,
            "Ignoring stale progress event"
        );
        return false;
    }

    let next = ItemView {
        progress_percent: current.progress_percent.max(update.progress_percent),
        ..update
    };
    if *current == next {
        return false;
    }

    *current = next;
    true
}

fn render(order: &[Uuid], views: &HashMap<Uuid, ItemView>) -> BatchProgress {
    let items: Vec<ItemView> = order.iter().filter_map(|id| views.get(id).cloned()).collect();
    BatchProgress {
        snapshot: ProgressAggregator::snapshot(items.iter().map(|view| view.state)),
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motive_core::models::SourceFile;

    fn view(state: ItemState, progress: u8) -> ItemView {
        ItemView {
            id: Uuid::new_v4(),
            file_name: "a.jpg".to_string(),
            state,
            progress_percent: progress,
            result_url: None,
            error_detail: None,
        }
    }

    #[test]
    fn empty_batch_is_zero_percent() {
        let snapshot = ProgressAggregator::snapshot(std::iter::empty());
        assert_eq!(snapshot, ProgressSnapshot::default());
        assert_eq!(snapshot.percent, 0);
    }

    #[test]
    fn counts_by_state_and_rounds_percent() {
        use ItemState::*;
        let snapshot =
            ProgressAggregator::snapshot([Pending, Optimizing, Uploading, Analyzing, Complete, Error]);
        assert_eq!(snapshot.pending, 1);
        assert_eq!(snapshot.active, 3);
        assert_eq!(snapshot.complete, 1);
        assert_eq!(snapshot.error, 1);
        assert_eq!(snapshot.total, 6);
        // 1/6 = 16.67%
        assert_eq!(snapshot.percent, 17);
        assert!(!snapshot.is_finished());
    }

    #[test]
    fn errors_do_not_count_towards_percent() {
        use ItemState::*;
        let snapshot = ProgressAggregator::snapshot([Complete, Complete, Error]);
        assert_eq!(snapshot.percent, 67);
        assert!(snapshot.is_finished());
    }

    #[test]
    fn snapshot_items_reads_item_states() {
        let items = vec![
            UploadItem::new(SourceFile::new("a.jpg", "image/jpeg", vec![1u8])),
            UploadItem::new(SourceFile::new("b.jpg", "image/jpeg", vec![1u8])),
        ];
        let snapshot = ProgressAggregator::snapshot_items(&items);
        assert_eq!(snapshot.pending, 2);
        assert_eq!(snapshot.total, 2);
    }

    #[test]
    fn apply_keeps_progress_monotonic() {
        let initial = view(ItemState::Uploading, 50);
        let id = initial.id;
        let mut views = HashMap::from([(id, initial.clone())]);

        let stale = ItemView {
            progress_percent: 30,
            ..initial.clone()
        };
        assert!(!apply(&mut views, stale));
        assert_eq!(views[&id].progress_percent, 50);

        let analyzing = ItemView {
            state: ItemState::Analyzing,
            progress_percent: 75,
            ..initial
        };
        assert!(apply(&mut views, analyzing));
        assert_eq!(views[&id].progress_percent, 75);
    }

    #[test]
    fn apply_ignores_updates_after_terminal_state() {
        let done = view(ItemState::Complete, 100);
        let id = done.id;
        let mut views = HashMap::from([(id, done.clone())]);
        let late = ItemView {
            state: ItemState::Error,
            ..done
        };
        assert!(!apply(&mut views, late));
        assert_eq!(views[&id].state, ItemState::Complete);
    }

    #[tokio::test]
    async fn tracker_publishes_after_each_event() {
        let first = view(ItemState::Pending, 0);
        let second = view(ItemState::Pending, 0);
        let tracker = ProgressTracker::spawn(vec![first.clone(), second.clone()]);
        let mut receiver = tracker.receiver.clone();
        assert_eq!(receiver.borrow().snapshot.pending, 2);

        tracker
            .sender
            .send(ProgressEvent {
                item: ItemView {
                    state: ItemState::Optimizing,
                    ..first.clone()
                },
            })
            .unwrap();
        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow().snapshot.active, 1);

        drop(tracker.sender);
        tracker.handle.await.unwrap();
        let progress = receiver.borrow().clone();
        assert_eq!(progress.items[0].id, first.id);
        assert_eq!(progress.items[1].id, second.id);
    }
}
