//! Concurrent batch enrichment.
//!
//! [`BatchPipeline`] runs a set of work items through extraction and
//! merges every result into a shared [`KnowledgeGraph`], bounded by a
//! semaphore. Progress is checkpointed per item so an interrupted run
//! can resume without redoing finished work. One item failing never
//! aborts the run.

pub mod checkpoint;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{GraftError, GraftResult};
use crate::extract::KnowledgeExtractor;
use crate::graph::KnowledgeGraph;

pub use checkpoint::{CheckpointRecord, CheckpointStore, ItemStatus};

/// One unit of batch work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Stable identifier, also the checkpoint key.
    pub id: String,
    /// Text to extract from.
    pub text: String,
    /// Per-item domain override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Tally of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Items dispatched to a worker this run.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items skipped because a checkpoint already marks them done.
    pub skipped: usize,
}

/// Batch driver over a shared extractor, graph, and checkpoint store.
pub struct BatchPipeline {
    extractor: Arc<KnowledgeExtractor>,
    graph: Arc<KnowledgeGraph>,
    checkpoints: Arc<CheckpointStore>,
    stop: Arc<AtomicBool>,
    default_domain: String,
}

impl BatchPipeline {
    pub fn new(
        extractor: Arc<KnowledgeExtractor>,
        graph: Arc<KnowledgeGraph>,
        checkpoints: Arc<CheckpointStore>,
        default_domain: impl Into<String>,
    ) -> Self {
        Self {
            extractor,
            graph,
            checkpoints,
            stop: Arc::new(AtomicBool::new(false)),
            default_domain: default_domain.into(),
        }
    }

    /// Handle for requesting a graceful stop from another task. The
    /// flag is honored between dispatches; in-flight items finish.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// The graph results are merged into.
    pub fn graph(&self) -> Arc<KnowledgeGraph> {
        Arc::clone(&self.graph)
    }

    /// Run the items with at most `concurrency` in flight.
    ///
    /// Every item's outcome is recorded in the checkpoint store as it
    /// completes, so an interrupted run resumes where it left off.
    pub async fn run(&self, items: Vec<WorkItem>, concurrency: usize) -> GraftResult<RunSummary> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut workers: JoinSet<(String, GraftResult<()>)> = JoinSet::new();
        let mut summary = RunSummary::default();

        for item in items {
            if self.stop.load(Ordering::SeqCst) {
                tracing::info!("stop requested, halting dispatch");
                break;
            }
            if self.checkpoints.is_done(&item.id) {
                tracing::debug!(item = %item.id, "already done, skipping");
                summary.skipped += 1;
                continue;
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| GraftError::Internal("worker semaphore closed".to_string()))?;
            summary.attempted += 1;

            let extractor = Arc::clone(&self.extractor);
            let graph = Arc::clone(&self.graph);
            let checkpoints = Arc::clone(&self.checkpoints);
            let domain = item
                .domain
                .clone()
                .unwrap_or_else(|| self.default_domain.clone());

            workers.spawn(async move {
                let _permit = permit;
                let outcome = match extractor.extract(&item.text, &domain).await {
                    Ok(result) => {
                        let merged = graph.merge(&result);
                        tracing::debug!(
                            item = %item.id,
                            entities_added = merged.entities_added,
                            relationships_added = merged.relationships_added,
                            "item merged"
                        );
                        checkpoints.record(&item.id, ItemStatus::Succeeded, None);
                        Ok(())
                    }
                    Err(err) => {
                        checkpoints.record(&item.id, ItemStatus::Failed, Some(err.to_string()));
                        Err(err)
                    }
                };
                // Persist per item so a crash loses at most in-flight work.
                if let Err(err) = checkpoints.flush() {
                    tracing::warn!(error = %err, "checkpoint flush failed");
                }
                (item.id, outcome)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, Ok(()))) => summary.succeeded += 1,
                Ok((id, Err(err))) => {
                    tracing::warn!(item = %id, error = %err, "item failed");
                    summary.failed += 1;
                }
                Err(err) => {
                    tracing::error!(error = %err, "worker panicked");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "batch run complete"
        );
        Ok(summary)
    }
}
