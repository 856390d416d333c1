// src/utils/log.rs

//! Console report formatting with server-style timestamps.
//!
//! Diagnostic logging goes through the `log` facade; these helpers print the
//! human-facing summaries at the end of a command.

use chrono::Local;

use crate::models::IngestReport;

/// Maximum failed ids listed in a summary before truncating.
const MAX_LISTED_IDS: usize = 20;

/// Format a line with timestamp
fn format_line(message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] [INFO] {}", timestamp, message)
}

/// Print a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    println!("{}", format_line(&border));
    println!("{}", format_line(&format!("  {}", title)));
    println!("{}", format_line(&border));
}

/// Print a sub-item (indented)
pub fn sub_item(message: &str) {
    println!("{}", format_line(&format!("    {}", message)));
}

/// Print a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("{}", format_line(&format!("[SUMMARY] {}", title)));
    for (key, value) in items {
        println!("{}", format_line(&format!("    {}: {}", key, value)));
    }
}

/// Key/value lines describing an ingestion run.
pub fn ingest_summary_items(report: &IngestReport) -> Vec<(&'static str, String)> {
    let elapsed = report.end_time - report.start_time;
    vec![
        ("Index", report.index.clone()),
        ("Records loaded", report.records_loaded.to_string()),
        ("Malformed rows", report.malformed_rows.to_string()),
        (
            "Dropped",
            format!(
                "{} ({} without id, {} without title)",
                report.dropped(),
                report.dropped_missing_id,
                report.dropped_missing_title
            ),
        ),
        ("Filtered by keyword", report.filtered_out.to_string()),
        (
            "Partitions",
            format!(
                "{} ({} acked, {} escalated)",
                report.partitions_total, report.partitions_acked, report.partitions_escalated
            ),
        ),
        ("Documents indexed", report.documents_indexed.to_string()),
        ("Empty bodies", report.empty_bodies.to_string()),
        ("Failed documents", report.failed_documents.len().to_string()),
        ("Abandoned", report.abandoned.to_string()),
        ("Stopped early", report.stopped.to_string()),
        ("Started", report.start_time.to_rfc3339()),
        (
            "Elapsed",
            format!("{:.1}s", elapsed.num_milliseconds() as f64 / 1000.0),
        ),
    ]
}

/// Print the end-of-run summary of an ingestion.
pub fn print_ingest_report(report: &IngestReport) {
    summary("Ingest", &ingest_summary_items(report));

    if !report.failed_documents.is_empty() {
        header("Failed documents");
        for doc in report.failed_documents.iter().take(MAX_LISTED_IDS) {
            sub_item(&format!("{}: {}", doc.id, doc.reason));
        }
        if report.failed_documents.len() > MAX_LISTED_IDS {
            sub_item(&format!(
                "... and {} more",
                report.failed_documents.len() - MAX_LISTED_IDS
            ));
        }
    }

    if !report.escalated_batches.is_empty() {
        header("Escalated batches");
        for batch in &report.escalated_batches {
            sub_item(&format!(
                "partition {} ({} documents): {}",
                batch.partition,
                batch.ids.len(),
                batch.reason
            ));
        }
    }
}
