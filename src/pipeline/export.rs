// src/pipeline/export.rs

//! Offline export of cleaned documents to a CSV file.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::models::{Config, IndexDocument};
use crate::services::{BodyResolver, RecordCleaner, RecordStore};

/// One row of the exported table.
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    id: &'a str,
    title: &'a str,
    #[serde(rename = "abstract")]
    abstract_text: &'a str,
    authors: String,
    body: &'a str,
    url: &'a str,
    publish_time: &'a str,
    journal: &'a str,
}

impl<'a> From<&'a IndexDocument> for ExportRow<'a> {
    fn from(doc: &'a IndexDocument) -> Self {
        Self {
            id: &doc.id,
            title: &doc.title,
            abstract_text: &doc.abstract_text,
            authors: doc.authors.join("; "),
            body: &doc.body,
            url: &doc.url,
            publish_time: &doc.publish_time,
            journal: &doc.journal,
        }
    }
}

/// Load, clean and resolve bodies for the configured dataset and write the
/// documents to `output` without contacting the backend.
///
/// Returns the number of rows written.
pub async fn run_export(config: &Config, output: impl AsRef<Path>) -> Result<usize> {
    let store = RecordStore::from_config(&config.ingest)?;
    let cleaner = RecordCleaner::from_config(&config.ingest);
    let output: PathBuf = output.as_ref().to_path_buf();

    let written = tokio::task::spawn_blocking(move || export_blocking(&store, &cleaner, &output))
        .await??;
    Ok(written)
}

fn export_blocking(store: &RecordStore, cleaner: &RecordCleaner, output: &Path) -> Result<usize> {
    let loaded = store.load()?;
    let cleaned = cleaner.clean(loaded.records);

    let mut writer = csv::Writer::from_path(output)?;
    let mut written = 0;
    for record in cleaned.records {
        let doc = BodyResolver.resolve_record(record);
        writer.serialize(ExportRow::from(&doc))?;
        written += 1;
    }
    writer.flush()?;

    log::info!("Exported {} documents to {}", written, output.display());
    Ok(written)
}
