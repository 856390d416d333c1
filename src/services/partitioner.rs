//! Size-bounded partitioning of cleaned records.

use crate::backend::wire::ACTION_LINE_OVERHEAD;
use crate::models::{CleanedRecord, IngestConfig};

/// An ordered slice of records uploaded as one unit.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Position in emission order, starting at 0
    pub seq: usize,
    pub records: Vec<CleanedRecord>,
    /// Sum of [`estimate_size`] over `records`
    pub estimated_bytes: usize,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Estimated bulk payload contribution of one record, excluding its body.
///
/// Counts the serialized document plus the action header line and the two
/// line terminators.
pub fn estimate_size(record: &CleanedRecord) -> usize {
    let document = serde_json::to_vec(record).map_or(0, |bytes| bytes.len());
    document + ACTION_LINE_OVERHEAD + record.id.len() + 2
}

/// Lazily groups records into partitions.
///
/// Records are accumulated in source order until adding the next one would
/// push the partition past `target_bytes` or past `max_documents`; the
/// partition is cut before that record. A record larger than `target_bytes`
/// on its own is emitted as a single-record partition.
pub struct Partitioner<I> {
    records: I,
    target_bytes: usize,
    max_documents: usize,
    pending: Option<(CleanedRecord, usize)>,
    next_seq: usize,
}

impl<I> Partitioner<I>
where
    I: Iterator<Item = CleanedRecord>,
{
    pub fn new(
        records: impl IntoIterator<IntoIter = I>,
        target_bytes: usize,
        max_documents: usize,
    ) -> Self {
        Self {
            records: records.into_iter(),
            target_bytes,
            max_documents: max_documents.max(1),
            pending: None,
            next_seq: 0,
        }
    }

    fn next_record(&mut self) -> Option<(CleanedRecord, usize)> {
        self.pending.take().or_else(|| {
            self.records.next().map(|record| {
                let size = estimate_size(&record);
                (record, size)
            })
        })
    }
}

impl<I> Iterator for Partitioner<I>
where
    I: Iterator<Item = CleanedRecord>,
{
    type Item = Partition;

    fn next(&mut self) -> Option<Partition> {
        let mut records = Vec::new();
        let mut estimated_bytes = 0;

        while let Some((record, size)) = self.next_record() {
            let full = records.len() >= self.max_documents
                || (!records.is_empty() && estimated_bytes + size > self.target_bytes);
            if full {
                self.pending = Some((record, size));
                break;
            }
            if records.is_empty() && size > self.target_bytes {
                log::warn!(
                    "Record {} alone exceeds the partition target ({} > {} bytes)",
                    record.id,
                    size,
                    self.target_bytes
                );
            }
            estimated_bytes += size;
            records.push(record);
        }

        if records.is_empty() {
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        Some(Partition {
            seq,
            records,
            estimated_bytes,
        })
    }
}

/// Partition `records` with the given byte target and document cap.
pub fn partition<R>(
    records: R,
    target_bytes: usize,
    max_documents: usize,
) -> Partitioner<R::IntoIter>
where
    R: IntoIterator<Item = CleanedRecord>,
{
    Partitioner::new(records, target_bytes, max_documents)
}

/// Partition using the limits from the ingest configuration.
pub fn partition_with_config<R>(records: R, config: &IngestConfig) -> Partitioner<R::IntoIter>
where
    R: IntoIterator<Item = CleanedRecord>,
{
    partition(
        records,
        config.target_partition_bytes,
        config.max_partition_documents,
    )
}
