//! Metadata table loading.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::{IngestConfig, RawRecord};

/// Rows read from the metadata table.
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<RawRecord>,
    /// Rows that could not be decoded and were skipped
    pub malformed: usize,
}

/// Reads raw records from a delimited text table.
///
/// Every column is read as text and empty cells come back as `None`. A row
/// that cannot be decoded is skipped and counted; only failing to read the
/// file itself is an error.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    delimiter: u8,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self {
            path: path.into(),
            delimiter,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        Ok(Self::new(&config.dataset, config.delimiter_byte()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every row of the backing file.
    pub fn load(&self) -> Result<LoadedRecords> {
        let file = File::open(&self.path)?;
        let loaded = Self::from_reader(file, self.delimiter)?;
        log::info!(
            "Loaded {} records from {} ({} malformed rows skipped)",
            loaded.records.len(),
            self.path.display(),
            loaded.malformed
        );
        Ok(loaded)
    }

    /// Load rows from any reader. The first row must be the header.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<LoadedRecords> {
        let mut csv = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(reader);

        let mut loaded = LoadedRecords::default();
        for result in csv.deserialize::<RawRecord>() {
            match result {
                Ok(record) => loaded.records.push(record),
                Err(error) if error.is_io_error() => return Err(error.into()),
                Err(error) => {
                    loaded.malformed += 1;
                    let line = error.position().map_or(0, |p| p.line());
                    log::warn!("Skipping malformed row at line {}: {}", line, error);
                }
            }
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "cord_uid,sha,title,doi,abstract,publish_time,authors,journal,url,pdf_json_files,pmc_json_files\n";

    #[test]
    fn test_reads_columns_as_text() {
        let data = format!(
            "{HEADER}ug7v899j,abc,\"Clinical features, outcomes\",10.1186/x,An abstract,2001-07-04,\"Madani, Tariq A; Al-Ghamdi, Aisha A\",BMC Infect Dis,https://doi.org/x,document_parses/pdf_json/abc.json,\n"
        );
        let loaded = RecordStore::from_reader(data.as_bytes(), b',').unwrap();

        assert_eq!(loaded.malformed, 0);
        let record = &loaded.records[0];
        assert_eq!(record.id.as_deref(), Some("ug7v899j"));
        assert_eq!(record.title.as_deref(), Some("Clinical features, outcomes"));
        assert_eq!(record.publish_time.as_deref(), Some("2001-07-04"));
        assert_eq!(
            record.authors.as_deref(),
            Some("Madani, Tariq A; Al-Ghamdi, Aisha A")
        );
        assert_eq!(
            record.pdf_json_files.as_deref(),
            Some("document_parses/pdf_json/abc.json")
        );
    }

    #[test]
    fn test_empty_cells_are_absent() {
        let data = format!("{HEADER}x1,,Title only,,,,,,,,\n");
        let loaded = RecordStore::from_reader(data.as_bytes(), b',').unwrap();

        let record = &loaded.records[0];
        assert_eq!(record.title.as_deref(), Some("Title only"));
        assert_eq!(record.abstract_text, None);
        assert_eq!(record.authors, None);
        assert_eq!(record.pmc_json_files, None);
    }

    #[test]
    fn test_short_rows_and_id_alias() {
        let data = "id\ttitle\nx1\tTab separated\nx2\n";
        let loaded = RecordStore::from_reader(data.as_bytes(), b'\t').unwrap();

        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[0].id.as_deref(), Some("x1"));
        assert_eq!(loaded.records[1].title, None);
    }

    #[test]
    fn test_invalid_utf8_row_is_skipped() {
        let mut data = b"cord_uid,title\nok1,Fine\nbad1,".to_vec();
        data.extend_from_slice(&[0xff, 0xfe]);
        data.extend_from_slice(b"\nok2,Also fine\n");

        let loaded = RecordStore::from_reader(&data[..], b',').unwrap();
        assert_eq!(loaded.malformed, 1);
        let ids: Vec<_> = loaded
            .records
            .iter()
            .filter_map(|r| r.id.as_deref())
            .collect();
        assert_eq!(ids, vec!["ok1", "ok2"]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "cord_uid,title\na,One\nb,Two\n").unwrap();

        let store = RecordStore::new(file.path(), b',');
        assert_eq!(store.load().unwrap().records.len(), 2);
    }

    #[test]
    fn test_missing_file_is_error() {
        let store = RecordStore::new("/nonexistent/metadata.csv", b',');
        assert!(store.load().is_err());
    }
}
