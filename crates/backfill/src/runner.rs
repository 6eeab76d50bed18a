//! Concurrent backfill over many symbol-dates.
//!
//! Each key runs as its own task on the tokio runtime. The CPU-bound build runs
//! inside `spawn_blocking`, and a semaphore caps how many keys are in flight.
//! A failing key is retried with a fixed delay, then reported; it never stops
//! the other keys.

use crate::plan::{backfill_date, BackfillReport, SymbolDate};
use crate::source::TickSource;
use crate::store::BarStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tickbar_bars::BarBuilder;
use tickbar_core::{BackfillConfig, Error, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// A key that still failed after all retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillFailure {
    pub key: SymbolDate,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Error from the last attempt.
    pub error: String,
}

/// Results of a backfill run, each list ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackfillSummary {
    pub completed: Vec<BackfillReport>,
    pub failed: Vec<BackfillFailure>,
}

impl BackfillSummary {
    /// Whether every key succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Log every failed key at error level.
    pub fn log_failures(&self) {
        for failure in &self.failed {
            error!(
                key = %failure.key,
                attempts = failure.attempts,
                error = %failure.error,
                "backfill failed"
            );
        }
    }
}

/// Shared collaborators of a backfill run.
#[derive(Clone)]
pub struct Backfill {
    source: Arc<dyn TickSource>,
    store: Arc<dyn BarStore>,
    builder: Arc<BarBuilder>,
    config: BackfillConfig,
}

impl Backfill {
    pub fn new(
        source: Arc<dyn TickSource>,
        store: Arc<dyn BarStore>,
        builder: BarBuilder,
        config: BackfillConfig,
    ) -> Self {
        Self {
            source,
            store,
            builder: Arc::new(builder),
            config,
        }
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.config.retry_delay_ms)
    }

    /// Process every key.
    pub async fn run(&self, keys: Vec<SymbolDate>) -> BackfillSummary {
        let total = keys.len();
        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks = JoinSet::new();

        for key in keys {
            let semaphore = Arc::clone(&semaphore);
            let job = self.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    let failure = BackfillFailure {
                        key,
                        attempts: 0,
                        error: "worker pool closed".to_string(),
                    };
                    return Err(failure);
                };
                job.run_key(key).await
            });
        }

        let mut summary = BackfillSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(report)) => summary.completed.push(report),
                Ok(Err(failure)) => summary.failed.push(failure),
                Err(e) => error!(error = %e, "backfill task aborted"),
            }
        }
        summary.completed.sort_by(|a, b| a.key.cmp(&b.key));
        summary.failed.sort_by(|a, b| a.key.cmp(&b.key));

        info!(
            total,
            completed = summary.completed.len(),
            failed = summary.failed.len(),
            "backfill finished"
        );
        summary
    }

    /// Run one key with retries.
    async fn run_key(&self, key: SymbolDate) -> std::result::Result<BackfillReport, BackfillFailure> {
        let attempts = self.config.max_retries + 1;
        let mut attempt = 1;
        loop {
            match self.attempt(&key).await {
                Ok(report) => {
                    info!(
                        key = %report.key,
                        ticks = report.ticks,
                        bars = report.bars,
                        attempt,
                        "backfilled"
                    );
                    return Ok(report);
                }
                Err(e) if attempt < attempts => {
                    warn!(key = %key, attempt, error = %e, "backfill attempt failed, retrying");
                    tokio::time::sleep(self.retry_delay()).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(key = %key, attempts, error = %e, "giving up on key");
                    return Err(BackfillFailure {
                        key,
                        attempts,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    async fn attempt(&self, key: &SymbolDate) -> Result<BackfillReport> {
        let source = Arc::clone(&self.source);
        let store = Arc::clone(&self.store);
        let builder = Arc::clone(&self.builder);
        let key = key.clone();
        tokio::task::spawn_blocking(move || {
            backfill_date(source.as_ref(), store.as_ref(), &builder, &key)
        })
        .await
        .map_err(|e| Error::Other(format!("backfill worker panicked: {}", e)))?
    }
}
