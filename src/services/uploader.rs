//! Bulk upload of partitions with split, retry and escalation.
//!
//! Each batch moves through `PENDING -> SENT -> {ACKED, RETRY, FATAL}`.
//! [`IndexUploader::attempt`] performs one SENT step and classifies the result;
//! [`IndexUploader::upload`] drives the transitions for a whole partition:
//!
//! - payload too large: the batch is halved and both halves start over;
//!   a single document that is still too large is escalated
//! - throttled or transient: the batch is retried after a capped exponential
//!   backoff and escalated once its attempts are used up
//! - partial failure: the failed ids are recorded, the rest is acknowledged
//! - anything else: escalated immediately
//!
//! Before the first send, a partition is cut into batches whose encoded bulk
//! body stays within the configured byte budget. Bodies are only known after
//! resolution, so the cut uses the exact request size rather than an estimate.

use std::sync::Arc;

use crate::backend::wire;
use crate::backend::{BackendError, SearchBackend};
use crate::error::Result;
use crate::models::{Config, EscalatedBatch, FailedDocument, IndexDocument, PartitionReport};
use crate::pipeline::{RetryPolicy, StopSignal};

/// Result of sending one batch once.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The backend accepted the batch; `failed` lists refused documents
    Acked {
        indexed: usize,
        failed: Vec<FailedDocument>,
    },
    /// The batch is too large and must be halved
    Split,
    /// Worth sending again after a backoff
    Retry(BackendError),
    /// Sending again cannot help
    Fatal(String),
}

/// A slice of a partition with its own attempt counter.
#[derive(Debug)]
struct Batch {
    documents: Vec<IndexDocument>,
    attempts: u32,
}

impl Batch {
    fn new(documents: Vec<IndexDocument>) -> Self {
        Self {
            documents,
            attempts: 0,
        }
    }

    fn ids(&self) -> Vec<String> {
        self.documents.iter().map(|doc| doc.id.clone()).collect()
    }
}

/// Uploads partitions of documents into one index.
#[derive(Clone)]
pub struct IndexUploader {
    backend: Arc<dyn SearchBackend>,
    index: String,
    policy: RetryPolicy,
    batch_bytes: usize,
}

impl IndexUploader {
    pub fn new(backend: Arc<dyn SearchBackend>, index: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            index: index.into(),
            policy,
            batch_bytes: usize::MAX,
        }
    }

    pub fn from_config(backend: Arc<dyn SearchBackend>, config: &Config) -> Self {
        Self::new(
            backend,
            &config.backend.index,
            RetryPolicy::from_config(&config.upload),
        )
        .with_batch_bytes(config.ingest.target_partition_bytes)
    }

    /// Cap the encoded size of each first-attempt bulk request.
    pub fn with_batch_bytes(mut self, bytes: usize) -> Self {
        self.batch_bytes = bytes.max(1);
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Create the target index unless it already exists.
    pub async fn ensure_index(&self) -> Result<()> {
        self.backend.ensure_index(&self.index).await?;
        log::info!("Index '{}' is ready", self.index);
        Ok(())
    }

    /// Send `documents` once and classify the outcome.
    pub async fn attempt(&self, documents: &[IndexDocument]) -> AttemptOutcome {
        match self.backend.bulk_upsert(&self.index, documents).await {
            Ok(response) => {
                let failures = response.failures();
                if !documents.is_empty() && failures.len() >= documents.len() {
                    let first = failures
                        .first()
                        .map(|(_, reason)| reason.clone())
                        .unwrap_or_default();
                    let error = if response.all_throttled() {
                        BackendError::Throttled(first)
                    } else {
                        BackendError::Transient(format!(
                            "every document in the batch failed: {first}"
                        ))
                    };
                    return AttemptOutcome::Retry(error);
                }

                let failed: Vec<FailedDocument> = failures
                    .into_iter()
                    .map(|(id, reason)| FailedDocument { id, reason })
                    .collect();
                AttemptOutcome::Acked {
                    indexed: documents.len() - failed.len(),
                    failed,
                }
            }
            Err(BackendError::PayloadTooLarge) => AttemptOutcome::Split,
            Err(error) if error.is_retryable() => AttemptOutcome::Retry(error),
            Err(error) => AttemptOutcome::Fatal(error.to_string()),
        }
    }

    /// Upload one partition, never returning before every document is either
    /// acknowledged, reported as failed, escalated, or abandoned on stop.
    pub async fn upload(
        &self,
        partition: usize,
        documents: Vec<IndexDocument>,
        stop: &StopSignal,
    ) -> PartitionReport {
        let mut report = PartitionReport::new(partition, documents.len());
        if documents.is_empty() {
            return report;
        }

        // Popped from the end, so the first batch goes last on the stack
        let mut stack: Vec<Batch> = self.cut(documents).into_iter().rev().collect();
        while let Some(mut batch) = stack.pop() {
            if stop.is_stopped() {
                stack.push(batch);
                abandon(&mut report, stack);
                break;
            }

            batch.attempts += 1;
            report.attempts += 1;

            match self.attempt(&batch.documents).await {
                AttemptOutcome::Acked { indexed, failed } => {
                    for doc in &failed {
                        log::warn!(
                            "Partition {}: document {} rejected: {}",
                            partition,
                            doc.id,
                            doc.reason
                        );
                    }
                    report.indexed += indexed;
                    report.failed.extend(failed);
                }
                AttemptOutcome::Split if batch.documents.len() > 1 => {
                    let mid = batch.documents.len() / 2;
                    let right = batch.documents.split_off(mid);
                    log::warn!(
                        "Partition {}: payload too large, splitting {} documents into {} + {}",
                        partition,
                        batch.documents.len() + right.len(),
                        batch.documents.len(),
                        right.len()
                    );
                    stack.push(Batch::new(right));
                    stack.push(Batch::new(batch.documents));
                }
                AttemptOutcome::Split => {
                    escalate(
                        &mut report,
                        &batch,
                        "payload too large for a single document".to_string(),
                    );
                }
                AttemptOutcome::Retry(error) if self.policy.allows_retry(batch.attempts) => {
                    let delay = self.policy.delay(batch.attempts - 1);
                    log::warn!(
                        "Partition {}: attempt {}/{} failed ({}), retrying in {:?}",
                        partition,
                        batch.attempts,
                        self.policy.max_attempts,
                        error,
                        delay
                    );
                    if !stop.sleep(delay).await {
                        stack.push(batch);
                        abandon(&mut report, stack);
                        break;
                    }
                    stack.push(batch);
                }
                AttemptOutcome::Retry(error) => {
                    let reason = format!("gave up after {} attempts: {}", batch.attempts, error);
                    escalate(&mut report, &batch, reason);
                }
                AttemptOutcome::Fatal(reason) => escalate(&mut report, &batch, reason),
            }
        }

        report
    }

    /// Cut documents into batches whose bulk body fits `batch_bytes`.
    ///
    /// A document larger than the budget on its own gets a batch to itself.
    fn cut(&self, documents: Vec<IndexDocument>) -> Vec<Batch> {
        let mut batches = Vec::new();
        let mut current = Vec::new();
        let mut current_bytes = 0usize;

        for doc in documents {
            let size = wire::bulk_size(&self.index, &doc);
            if !current.is_empty() && current_bytes.saturating_add(size) > self.batch_bytes {
                batches.push(Batch::new(std::mem::take(&mut current)));
                current_bytes = 0;
            }
            current_bytes = current_bytes.saturating_add(size);
            current.push(doc);
        }
        if !current.is_empty() {
            batches.push(Batch::new(current));
        }

        if batches.len() > 1 {
            log::debug!(
                "Cut {} documents into {} batches of at most {} bytes",
                batches.iter().map(|b| b.documents.len()).sum::<usize>(),
                batches.len(),
                self.batch_bytes
            );
        }
        batches
    }
}

fn escalate(report: &mut PartitionReport, batch: &Batch, reason: String) {
    let ids = batch.ids();
    log::error!(
        "Partition {}: escalating {} document(s) [{}]: {}",
        report.partition,
        ids.len(),
        ids.join(", "),
        reason
    );
    report.escalated.push(EscalatedBatch {
        partition: report.partition,
        ids,
        reason,
    });
}

fn abandon(report: &mut PartitionReport, remaining: Vec<Batch>) {
    let before = report.abandoned.len();
    for batch in remaining {
        report.abandoned.extend(batch.ids());
    }
    log::warn!(
        "Partition {}: stop requested, {} document(s) not sent",
        report.partition,
        report.abandoned.len() - before
    );
}
