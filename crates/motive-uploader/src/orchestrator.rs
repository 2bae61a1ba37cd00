//! Batch orchestration: one pipeline per admitted file, all joined before the summary.

use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use motive_core::constants::DEFAULT_MAX_CONCURRENT_UPLOADS;
use motive_core::models::{
    BatchContext, BatchFailure, BatchSuccess, BatchSummary, ItemState, SourceFile, UploadItem,
};
use motive_core::{OrchestrationError, UploaderConfig};
use motive_processing::BatchAdmission;

use crate::pipeline::{ItemPipeline, UploaderServices};
use crate::progress::{BatchProgress, ItemView, ProgressEvent, ProgressSender, ProgressTracker};

/// Final state of one pipeline task.
enum ItemOutcome {
    Finished(UploadItem),
    Panicked { item_id: Uuid, file_name: String },
}

/// Runs a batch of uploads concurrently and reports one [`BatchSummary`].
///
/// One item's failure never affects another: every pipeline is joined, none is
/// cancelled because a sibling failed, and nothing is retried.
#[derive(Clone)]
pub struct BatchOrchestrator {
    services: UploaderServices,
    context: Arc<BatchContext>,
    /// `0` = unbounded.
    max_concurrent: usize,
    admission: Option<BatchAdmission>,
}

impl BatchOrchestrator {
    pub fn new(services: UploaderServices) -> Self {
        Self {
            services,
            context: Arc::new(BatchContext::default()),
            max_concurrent: DEFAULT_MAX_CONCURRENT_UPLOADS,
            admission: None,
        }
    }

    pub fn from_config(services: UploaderServices, config: &UploaderConfig) -> Self {
        Self::new(services)
            .with_max_concurrent(config.max_concurrent_uploads)
            .with_admission(BatchAdmission::from_config(config))
    }

    pub fn with_context(mut self, context: BatchContext) -> Self {
        self.context = Arc::new(context);
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Re-check files on entry. Without it, callers are expected to admit files first.
    pub fn with_admission(mut self, admission: BatchAdmission) -> Self {
        self.admission = Some(admission);
        self
    }

    /// Upload `files` and wait for every item to reach a terminal state.
    pub async fn run(&self, files: Vec<SourceFile>) -> Result<BatchSummary, OrchestrationError> {
        self.run_with_progress(files)?.wait().await
    }

    /// Start a batch and return handles to observe, cancel and await it.
    #[tracing::instrument(skip(self, files), fields(files = files.len()))]
    pub fn run_with_progress(&self, files: Vec<SourceFile>) -> Result<BatchRun, OrchestrationError> {
        let files = match &self.admission {
            Some(admission) => admission.admit(0, files)?,
            None => files,
        };

        let batch_id = Uuid::new_v4();
        let items: Vec<UploadItem> = files.into_iter().map(UploadItem::new).collect();
        let tracker = ProgressTracker::spawn(items.iter().map(ItemView::from).collect());
        let cancel = CancellationToken::new();

        tracing::info!(
            batch.id = %batch_id,
            items = items.len(),
            max_concurrent = self.max_concurrent,
            "Starting upload batch"
        );

        let orchestrator = self.clone();
        let token = cancel.clone();
        let sender = tracker.sender;
        let tracker_handle = tracker.handle;
        let handle = tokio::spawn(async move {
            let summary = orchestrator.execute(batch_id, items, sender, token).await;
            // Senders are gone once every pipeline has ended; wait for the last publish.
            if let Err(e) = tracker_handle.await {
                tracing::error!(batch.id = %batch_id, error = %e, "Progress tracker failed");
            }
            summary
        });

        Ok(BatchRun {
            batch_id,
            progress: tracker.receiver,
            cancel,
            handle,
        })
    }

    async fn execute(
        &self,
        batch_id: Uuid,
        items: Vec<UploadItem>,
        progress: ProgressSender,
        cancel: CancellationToken,
    ) -> BatchSummary {
        let mut summary = BatchSummary::empty(batch_id);
        summary.total = items.len();

        let semaphore = (self.max_concurrent > 0).then(|| Arc::new(Semaphore::new(self.max_concurrent)));
        let pipeline = ItemPipeline::new(self.services.clone(), batch_id, self.context.clone())
            .with_progress(progress.clone())
            .with_cancellation(cancel);

        let mut launched: Vec<(Uuid, String)> = Vec::with_capacity(items.len());
        let mut tasks = JoinSet::new();

        for item in items {
            launched.push((item.id(), item.file_name().to_string()));
            let pipeline = pipeline.clone();
            let semaphore = semaphore.clone();
            let progress = progress.clone();

            tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };

                let pending_view = ItemView::from(&item);

                match AssertUnwindSafe(pipeline.run(item)).catch_unwind().await {
                    Ok(item) => ItemOutcome::Finished(item),
                    Err(_) => {
                        // The tracker keeps the furthest progress it has seen for this item,
                        // so only state and detail matter here.
                        let _ = progress.send(ProgressEvent {
                            item: ItemView {
                                state: ItemState::Error,
                                error_detail: Some("Upload pipeline panicked".to_string()),
                                ..pending_view.clone()
                            },
                        });
                        ItemOutcome::Panicked {
                            item_id: pending_view.id,
                            file_name: pending_view.file_name,
                        }
                    }
                }
            });
        }
        drop(pipeline);
        drop(progress);

        let mut finished: HashSet<Uuid> = HashSet::with_capacity(launched.len());

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(ItemOutcome::Finished(item)) => {
                    finished.insert(item.id());
                    record(&mut summary, &item);
                }
                Ok(ItemOutcome::Panicked { item_id, file_name }) => {
                    tracing::error!(
                        batch.id = %batch_id,
                        item.id = %item_id,
                        file_name = %file_name,
                        "Upload pipeline panicked"
                    );
                    finished.insert(item_id);
                    summary.failures.push(BatchFailure {
                        item_id,
                        file_name,
                        error_detail: "Upload pipeline panicked".to_string(),
                    });
                }
                Err(e) => {
                    tracing::error!(batch.id = %batch_id, error = %e, "Upload task did not finish");
                }
            }
        }

        // Tasks that died without an outcome still count as failed items.
        for (item_id, file_name) in launched {
            if !finished.contains(&item_id) {
                summary.failures.push(BatchFailure {
                    item_id,
                    file_name,
                    error_detail: "Upload task aborted".to_string(),
                });
            }
        }

        tracing::info!(
            batch.id = %batch_id,
            total = summary.total,
            succeeded = summary.success_count(),
            failed = summary.failure_count(),
            "Upload batch finished"
        );

        summary
    }
}

fn record(summary: &mut BatchSummary, item: &UploadItem) {
    match (item.state(), item.result_url()) {
        (ItemState::Complete, Some(url)) => summary.successes.push(BatchSuccess {
            result_url: url.to_string(),
            result_metadata: item.result_metadata().clone(),
        }),
        (state, _) => summary.failures.push(BatchFailure {
            item_id: item.id(),
            file_name: item.file_name().to_string(),
            error_detail: item
                .error_detail()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Upload ended in state {}", state)),
        }),
    }
}

/// A batch in flight.
pub struct BatchRun {
    batch_id: Uuid,
    progress: watch::Receiver<BatchProgress>,
    cancel: CancellationToken,
    handle: JoinHandle<BatchSummary>,
}

impl BatchRun {
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Live progress; the last value published is the final state of every item.
    pub fn progress(&self) -> watch::Receiver<BatchProgress> {
        self.progress.clone()
    }

    /// Stop items that have not uploaded yet. Stored uploads are never rolled back.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) -> Result<BatchSummary, OrchestrationError> {
        self.handle
            .await
            .map_err(|e| OrchestrationError::Runtime(e.to_string()))
    }
}
