//! # Batch Dispatch
//!
//! Supervising layer between the queue consumer and a [`SubService`]. Each message of a
//! batch is handled in its own task, bounded by a semaphore. A failed message is reported
//! and left unacknowledged for redelivery; it never affects the other messages.
//!
//! A `FatalFault` halts the dispatcher: messages that have not started yet are skipped,
//! messages already in flight run to completion, and every later batch is skipped outright.
//! The hosting process is expected to exit and be restarted by its supervisor.

use crate::services::{QueueMessage, SubService};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// One message that did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItemFailure {
    pub message_id: String,
    pub kind: String,
    pub error: String,
}

/// Outcome of one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Handled successfully; safe to acknowledge
    pub processed: Vec<String>,
    /// Failed; leave unacknowledged so the queue redelivers
    pub failures: Vec<BatchItemFailure>,
    /// Never started because the dispatcher was halted
    pub skipped: Vec<String>,
    /// The fault that halted the dispatcher, if one occurred in this batch
    pub fatal: Option<BatchItemFailure>,
}

impl BatchReport {
    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    /// Message ids the queue should redeliver
    pub fn redeliver_ids(&self) -> Vec<&str> {
        self.failures
            .iter()
            .map(|f| f.message_id.as_str())
            .chain(self.skipped.iter().map(String::as_str))
            .collect()
    }
}

enum ItemOutcome {
    Processed(String),
    Failed(BatchItemFailure),
    Fatal(BatchItemFailure),
    Skipped(String),
}

pub struct BatchDispatcher<H: ?Sized> {
    handler: Arc<H>,
    semaphore: Arc<Semaphore>,
    halted: Arc<AtomicBool>,
    max_concurrency: usize,
    message_timeout: Option<Duration>,
}

impl<H: SubService + ?Sized + 'static> BatchDispatcher<H> {
    pub fn new(handler: Arc<H>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);

        Self {
            handler,
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            halted: Arc::new(AtomicBool::new(false)),
            max_concurrency,
            message_timeout: None,
        }
    }

    /// Deadline applied to messages that arrive without one
    pub fn with_message_timeout(mut self, timeout: Duration) -> Self {
        self.message_timeout = Some(timeout);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// True once a fatal fault has been observed
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Handle every message of `batch` and report the per-message outcome
    pub async fn dispatch(&self, batch: Vec<QueueMessage>) -> BatchReport {
        let started = Instant::now();
        let batch_size = batch.len();
        debug!(batch_size, "Dispatching batch");

        let mut task_futures = Vec::with_capacity(batch_size);

        for record in batch {
            let record = match (record.deadline, self.message_timeout) {
                (None, Some(timeout)) => record.with_timeout(timeout),
                _ => record,
            };
            let handler = self.handler.clone();
            let semaphore = self.semaphore.clone();
            let halted = self.halted.clone();
            let message_id = record.message_id.clone();

            let future = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return ItemOutcome::Skipped(record.message_id),
                };

                if halted.load(Ordering::SeqCst) {
                    return ItemOutcome::Skipped(record.message_id);
                }

                match handler.handle(&record).await {
                    Ok(()) => ItemOutcome::Processed(record.message_id),
                    Err(err) => {
                        let failure = BatchItemFailure {
                            message_id: record.message_id.clone(),
                            kind: err.kind().to_string(),
                            error: err.to_string(),
                        };

                        if err.is_fatal() {
                            halted.store(true, Ordering::SeqCst);
                            error!(
                                message_id = %record.message_id,
                                error = %err,
                                "Fatal fault, halting dispatch"
                            );
                            ItemOutcome::Fatal(failure)
                        } else {
                            warn!(
                                message_id = %record.message_id,
                                error = %err,
                                "Message failed"
                            );
                            ItemOutcome::Failed(failure)
                        }
                    }
                }
            });

            task_futures.push((message_id, future));
        }

        let (ids, handles): (Vec<_>, Vec<_>) = task_futures.into_iter().unzip();
        let results = futures::future::join_all(handles).await;

        let mut report = BatchReport::default();
        for (message_id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(ItemOutcome::Processed(id)) => report.processed.push(id),
                Ok(ItemOutcome::Failed(failure)) => report.failures.push(failure),
                Ok(ItemOutcome::Skipped(id)) => report.skipped.push(id),
                Ok(ItemOutcome::Fatal(failure)) => {
                    report.failures.push(failure.clone());
                    if report.fatal.is_none() {
                        report.fatal = Some(failure);
                    }
                }
                Err(join_error) => {
                    error!(message_id = %message_id, error = %join_error, "Handler task failed");
                    report.failures.push(BatchItemFailure {
                        message_id,
                        kind: "task".to_string(),
                        error: join_error.to_string(),
                    });
                }
            }
        }

        info!(
            processed = report.processed.len(),
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            fatal = report.is_fatal(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Batch processing complete"
        );

        report
    }
}
