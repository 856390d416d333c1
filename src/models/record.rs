//! Source rows and their cleaned form.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One row of the metadata table, exactly as read.
///
/// Every column is text. A cell that is empty in the source is `None`, so the
/// difference between "absent" and "present but blank" survives until the
/// cleaning boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "cord_uid", alias = "id", default)]
    pub id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,

    /// `;` separated author names
    #[serde(default)]
    pub authors: Option<String>,

    #[serde(default)]
    pub publish_time: Option<String>,

    #[serde(default)]
    pub journal: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    /// `;` separated paths of parsed-PDF body files
    #[serde(default)]
    pub pdf_json_files: Option<String>,

    /// `;` separated paths of PMC body files
    #[serde(default)]
    pub pmc_json_files: Option<String>,
}

/// A record that passed cleaning.
///
/// `id` and `title` are non-empty; every optional text field is a (possibly
/// empty) string. Serialization produces the metadata half of the indexed
/// document and is what partition sizing measures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanedRecord {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub url: String,
    pub publish_time: String,
    pub journal: String,

    /// Candidate body files, in preference order
    #[serde(skip)]
    pub body_sources: Vec<PathBuf>,
}
