//! Record cleaning: required-field filtering and default filling.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use unicode_segmentation::UnicodeSegmentation;

use crate::models::{CleanedRecord, IngestConfig, RawRecord};

/// Why a record was dropped during cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingId,
    MissingTitle,
}

/// Cleaned records plus counts of what was removed.
#[derive(Debug, Default)]
pub struct CleanOutcome {
    pub records: Vec<CleanedRecord>,
    pub dropped_missing_id: usize,
    pub dropped_missing_title: usize,
    /// Records removed by the keyword filter
    pub filtered_out: usize,
}

impl CleanOutcome {
    pub fn dropped(&self) -> usize {
        self.dropped_missing_id + self.dropped_missing_title
    }
}

/// Turns raw rows into records that are safe to index.
#[derive(Debug, Clone, Default)]
pub struct RecordCleaner {
    data_dir: PathBuf,
    keywords: Vec<Vec<String>>,
}

impl RecordCleaner {
    /// Create a cleaner resolving relative body paths against `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            keywords: Vec::new(),
        }
    }

    /// Keep only records whose title contains a word of one of the keywords.
    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        self.keywords = keywords
            .into_iter()
            .map(|keyword| words(keyword.as_ref()))
            .filter(|parts| !parts.is_empty())
            .collect();
        self
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(&config.data_dir).with_keywords(&config.keywords)
    }

    /// Clean a batch of records, preserving source order.
    pub fn clean(&self, records: impl IntoIterator<Item = RawRecord>) -> CleanOutcome {
        let mut outcome = CleanOutcome::default();

        for raw in records {
            match self.clean_record(raw) {
                Ok(record) if self.matches_keywords(&record.title) => {
                    outcome.records.push(record)
                }
                Ok(record) => {
                    log::debug!("Filtered out {} (no keyword in title)", record.id);
                    outcome.filtered_out += 1;
                }
                Err(DropReason::MissingId) => outcome.dropped_missing_id += 1,
                Err(DropReason::MissingTitle) => outcome.dropped_missing_title += 1,
            }
        }

        if outcome.dropped() > 0 {
            log::warn!(
                "Dropped {} records ({} without id, {} without title)",
                outcome.dropped(),
                outcome.dropped_missing_id,
                outcome.dropped_missing_title
            );
        }
        outcome
    }

    /// Clean one record, or say why it must be dropped.
    pub fn clean_record(&self, raw: RawRecord) -> Result<CleanedRecord, DropReason> {
        let id = required(raw.id).ok_or(DropReason::MissingId)?;
        let title = match required(raw.title) {
            Some(title) => title,
            None => {
                log::debug!("Dropping {}: missing title", id);
                return Err(DropReason::MissingTitle);
            }
        };

        let body_sources = split_list(raw.pdf_json_files.as_deref())
            .chain(split_list(raw.pmc_json_files.as_deref()))
            .map(|path| self.resolve_path(path))
            .collect();

        Ok(CleanedRecord {
            id,
            title,
            abstract_text: raw.abstract_text.unwrap_or_default(),
            authors: split_list(raw.authors.as_deref())
                .map(String::from)
                .collect(),
            url: raw.url.unwrap_or_default(),
            publish_time: raw.publish_time.unwrap_or_default(),
            journal: raw.journal.unwrap_or_default(),
            body_sources,
        })
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    fn matches_keywords(&self, title: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let title_words: HashSet<String> = words(title).into_iter().collect();
        self.keywords
            .iter()
            .any(|parts| parts.iter().any(|part| title_words.contains(part)))
    }
}

/// Trimmed value, or `None` when absent or blank.
fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a `;` separated cell into trimmed, non-empty parts.
fn split_list(value: Option<&str>) -> impl Iterator<Item = &str> {
    value
        .into_iter()
        .flat_map(|v| v.split(';'))
        .map(str::trim)
        .filter(|part| !part.is_empty())
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .unicode_words()
        .map(String::from)
        .collect()
}
