// src/pipeline/ingest.rs

//! Ingestion pipeline: load, clean, partition, resolve bodies, upload.

use std::sync::Arc;

use chrono::Utc;
use futures::{StreamExt, future, stream};

use crate::backend::SearchBackend;
use crate::error::Result;
use crate::models::{Config, EscalatedBatch, IngestReport, PartitionReport};
use crate::pipeline::StopSignal;
use crate::services::{
    BodyResolver, IndexUploader, Partition, RecordCleaner, RecordStore, ResolvedPartition,
    partition_with_config,
};

/// Run a full ingestion of the configured dataset into `backend`.
///
/// Partitions are processed by at most `ingest.workers` concurrent workers,
/// each resolving bodies and then uploading its own partition. Upload
/// failures are collected in the report; only failing to read the dataset or
/// to prepare the index aborts the run. Once `stop` is raised no further
/// partitions are started.
pub async fn run_ingest(
    config: &Config,
    backend: Arc<dyn SearchBackend>,
    stop: StopSignal,
) -> Result<IngestReport> {
    let mut report = IngestReport::new(&config.backend.index);
    log::info!(
        "Ingesting {} into '{}'",
        config.ingest.dataset.display(),
        config.backend.index
    );

    let store = RecordStore::from_config(&config.ingest)?;
    let loaded = tokio::task::spawn_blocking(move || store.load()).await??;
    report.records_loaded = loaded.records.len() + loaded.malformed;
    report.malformed_rows = loaded.malformed;

    let cleaned = RecordCleaner::from_config(&config.ingest).clean(loaded.records);
    report.dropped_missing_id = cleaned.dropped_missing_id;
    report.dropped_missing_title = cleaned.dropped_missing_title;
    report.filtered_out = cleaned.filtered_out;
    let total = cleaned.records.len();
    log::info!("{} records to index", total);

    let uploader = IndexUploader::from_config(backend, config);
    uploader.ensure_index().await?;

    let workers = config.ingest.workers.max(1);
    let show_progress = config.logging.show_progress;
    let mut dispatched = 0;

    let mut results = stream::iter(partition_with_config(cleaned.records, &config.ingest))
        .take_while(|_| future::ready(!stop.is_stopped()))
        .map(|partition| process_partition(partition, &uploader, &stop))
        .buffer_unordered(workers);

    while let Some((partition, empty_bodies)) = results.next().await {
        dispatched += partition.documents;
        report.empty_bodies += empty_bodies;

        if show_progress {
            log::info!(
                "Partition {}: {}/{} indexed in {} attempt(s) ({} of {} records dispatched)",
                partition.partition,
                partition.indexed,
                partition.documents,
                partition.attempts,
                dispatched,
                total
            );
        }
        report.absorb(partition);
    }

    report.stopped = stop.is_stopped();
    if dispatched < total {
        log::warn!(
            "Stopped before dispatching {} of {} records",
            total - dispatched,
            total
        );
        report.abandoned += total - dispatched;
    }
    report.end_time = Utc::now();

    log::info!(
        "Ingest finished: {} indexed, {} failed, {} escalated batches, {} abandoned",
        report.documents_indexed,
        report.failed_documents.len(),
        report.escalated_batches.len(),
        report.abandoned
    );
    Ok(report)
}

/// Resolve bodies for one partition off the async runtime, then upload it.
async fn process_partition(
    partition: Partition,
    uploader: &IndexUploader,
    stop: &StopSignal,
) -> (PartitionReport, usize) {
    log::debug!(
        "Partition {}: {} records, ~{} bytes",
        partition.seq,
        partition.len(),
        partition.estimated_bytes
    );
    let resolved =
        match resolve_blocking(partition, |partition| BodyResolver.resolve_partition(partition))
            .await
        {
            Ok(resolved) => resolved,
            Err(report) => return (report, 0),
        };

    let report = uploader
        .upload(resolved.seq, resolved.documents, stop)
        .await;
    (report, resolved.empty_bodies)
}

/// Run `resolve` on the blocking pool.
///
/// A resolver that panics escalates the whole partition instead of ending
/// the run, so sibling partitions keep uploading.
async fn resolve_blocking<F>(
    partition: Partition,
    resolve: F,
) -> std::result::Result<ResolvedPartition, PartitionReport>
where
    F: FnOnce(Partition) -> ResolvedPartition + Send + 'static,
{
    let seq = partition.seq;
    let ids: Vec<String> = partition.records.iter().map(|r| r.id.clone()).collect();

    tokio::task::spawn_blocking(move || resolve(partition))
        .await
        .map_err(|e| {
            let reason = format!("body resolution failed: {e}");
            log::error!(
                "Partition {}: escalating {} document(s): {}",
                seq,
                ids.len(),
                reason
            );
            let mut report = PartitionReport::new(seq, ids.len());
            report.escalated.push(EscalatedBatch {
                partition: seq,
                ids,
                reason,
            });
            report
        })
}
