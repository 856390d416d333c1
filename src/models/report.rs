//! Upload and run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document the backend refused while accepting the rest of its batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDocument {
    pub id: String,
    pub reason: String,
}

/// A batch that reached the fatal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalatedBatch {
    /// Partition the batch was carved from
    pub partition: usize,
    pub ids: Vec<String>,
    pub reason: String,
}

/// Outcome of uploading one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionReport {
    pub partition: usize,
    pub documents: usize,
    pub indexed: usize,
    /// Total send attempts across all batches of this partition
    pub attempts: u32,
    pub failed: Vec<FailedDocument>,
    pub escalated: Vec<EscalatedBatch>,
    /// Ids left unsent because a stop was requested
    pub abandoned: Vec<String>,
}

impl PartitionReport {
    pub fn new(partition: usize, documents: usize) -> Self {
        Self {
            partition,
            documents,
            ..Self::default()
        }
    }

    /// True when nothing in the partition was escalated or abandoned.
    pub fn is_acked(&self) -> bool {
        self.escalated.is_empty() && self.abandoned.is_empty()
    }

    /// Ids of every document that did not make it into the index.
    pub fn unindexed_ids(&self) -> impl Iterator<Item = &str> {
        self.failed
            .iter()
            .map(|f| f.id.as_str())
            .chain(self.escalated.iter().flat_map(|b| b.ids.iter().map(String::as_str)))
            .chain(self.abandoned.iter().map(String::as_str))
    }
}

/// Summary of a full ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub index: String,
    pub records_loaded: usize,
    pub malformed_rows: usize,
    pub dropped_missing_id: usize,
    pub dropped_missing_title: usize,
    pub filtered_out: usize,
    pub partitions_total: usize,
    pub partitions_acked: usize,
    pub partitions_escalated: usize,
    pub documents_indexed: usize,
    pub empty_bodies: usize,
    pub failed_documents: Vec<FailedDocument>,
    pub escalated_batches: Vec<EscalatedBatch>,
    pub abandoned: usize,
    pub stopped: bool,
}

impl IngestReport {
    pub fn new(index: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            start_time: now,
            end_time: now,
            index: index.into(),
            records_loaded: 0,
            malformed_rows: 0,
            dropped_missing_id: 0,
            dropped_missing_title: 0,
            filtered_out: 0,
            partitions_total: 0,
            partitions_acked: 0,
            partitions_escalated: 0,
            documents_indexed: 0,
            empty_bodies: 0,
            failed_documents: Vec::new(),
            escalated_batches: Vec::new(),
            abandoned: 0,
            stopped: false,
        }
    }

    /// Fold one partition's outcome into the run totals.
    pub fn absorb(&mut self, partition: PartitionReport) {
        self.partitions_total += 1;
        if partition.escalated.is_empty() {
            self.partitions_acked += 1;
        } else {
            self.partitions_escalated += 1;
        }
        self.documents_indexed += partition.indexed;
        self.abandoned += partition.abandoned.len();
        self.failed_documents.extend(partition.failed);
        self.escalated_batches.extend(partition.escalated);
    }

    pub fn dropped(&self) -> usize {
        self.dropped_missing_id + self.dropped_missing_title
    }

    /// True when every cleaned record reached the index.
    pub fn is_clean(&self) -> bool {
        self.failed_documents.is_empty()
            && self.escalated_batches.is_empty()
            && self.abandoned == 0
    }
}
