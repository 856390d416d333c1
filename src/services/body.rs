//! Full-text body resolution from parsed-paper JSON files.
//!
//! A body-source file looks like:
//!
//! ```json
//! { "body_text": [ { "text": "...", "section": "Introduction" }, ... ] }
//! ```
//!
//! Paragraphs from the `abstract` section are skipped because the abstract is
//! already carried by the metadata row.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
use crate::models::{CleanedRecord, IndexDocument};
use crate::services::Partition;

const ABSTRACT_SECTION: &str = "abstract";

#[derive(Debug, Deserialize)]
struct BodySource {
    #[serde(default)]
    body_text: Vec<Paragraph>,
}

#[derive(Debug, Deserialize)]
struct Paragraph {
    #[serde(default)]
    text: String,
    #[serde(default)]
    section: String,
}

/// Documents built from one partition.
#[derive(Debug)]
pub struct ResolvedPartition {
    pub seq: usize,
    pub documents: Vec<IndexDocument>,
    /// Documents for which no source yielded any body text
    pub empty_bodies: usize,
}

/// Extracts body text from a record's body-source files.
///
/// Holds no state; safe to run concurrently for different records.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyResolver;

impl BodyResolver {
    /// Body text of the first source that yields any, or an empty string.
    ///
    /// Later sources are treated as alternative renderings of the same paper
    /// and are not read once a body has been found. Missing or unparsable
    /// files are skipped.
    pub fn resolve<P: AsRef<Path>>(&self, sources: &[P]) -> String {
        for source in sources {
            let path = source.as_ref();
            match Self::read_body(path) {
                Ok(body) if !body.is_empty() => return body,
                Ok(_) => log::debug!("No body paragraphs in {}", path.display()),
                Err(error) => log::warn!("Skipping body source {}: {}", path.display(), error),
            }
        }
        String::new()
    }

    /// Build the index document for a cleaned record.
    pub fn resolve_record(&self, mut record: CleanedRecord) -> IndexDocument {
        let sources: Vec<PathBuf> = std::mem::take(&mut record.body_sources);
        let body = self.resolve(&sources);
        IndexDocument::from_record(record, body)
    }

    /// Build documents for a whole partition, keeping record order.
    pub fn resolve_partition(&self, partition: Partition) -> ResolvedPartition {
        let mut empty_bodies = 0;
        let documents = partition
            .records
            .into_iter()
            .map(|record| {
                let document = self.resolve_record(record);
                if document.body.is_empty() {
                    empty_bodies += 1;
                }
                document
            })
            .collect();

        ResolvedPartition {
            seq: partition.seq,
            documents,
            empty_bodies,
        }
    }

    /// Concatenate every non-abstract paragraph of one file.
    fn read_body(path: &Path) -> Result<String> {
        let content = fs::read(path)?;
        let source: BodySource = serde_json::from_slice(&content)?;

        let paragraphs: Vec<&str> = source
            .body_text
            .iter()
            .filter(|p| !p.section.trim().eq_ignore_ascii_case(ABSTRACT_SECTION))
            .map(|p| p.text.as_str())
            .filter(|text| !text.is_empty())
            .collect();

        Ok(paragraphs.join("\n"))
    }
}
