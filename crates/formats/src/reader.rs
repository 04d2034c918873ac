//! Unified table reader abstraction
//!
//! Provides a common interface over CSV and JSONL tables with format
//! detection based on file extensions.

use crate::csv_reader::CsvReader;
use crate::jsonl::JsonlReader;
use crate::{Error, Record, Result};
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Trait for table readers providing a unified interface
pub trait TableReader: Iterator<Item = Result<Record>> {
    /// Column names, when the format declares them up front
    fn columns(&self) -> Option<&[String]>;

    /// Number of records read so far
    fn records_processed(&self) -> usize;
}

impl<R: Read> TableReader for CsvReader<R> {
    fn columns(&self) -> Option<&[String]> {
        Some(self.headers())
    }

    fn records_processed(&self) -> usize {
        CsvReader::records_processed(self)
    }
}

impl<R: Read> TableReader for JsonlReader<R> {
    fn columns(&self) -> Option<&[String]> {
        None
    }

    fn records_processed(&self) -> usize {
        JsonlReader::records_processed(self)
    }
}

/// Table formats recognised by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Jsonl,
}

impl TableFormat {
    /// Detect from the file name; `.gz` looks at the extension underneath
    pub fn detect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut extension = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
        if extension.as_deref() == Some("gz") {
            extension = path
                .file_stem()
                .map(Path::new)
                .and_then(|stem| stem.extension())
                .and_then(|e| e.to_str())
                .map(str::to_lowercase);
        }

        match extension.as_deref() {
            Some("csv") => Ok(TableFormat::Csv),
            Some("jsonl") | Some("json") | Some("ndjson") => Ok(TableFormat::Jsonl),
            Some(other) => Err(Error::UnsupportedFormat(format!(
                "Unsupported file extension: {}",
                other
            ))),
            None => Err(Error::UnsupportedFormat(format!(
                "No file extension found: {}",
                path.display()
            ))),
        }
    }
}

/// Open a table with automatic format detection
///
/// Supported formats:
/// - `.csv` - comma-separated with a header row
/// - `.jsonl`, `.json`, `.ndjson` - JSON Lines
/// - any of the above followed by `.gz`
pub fn open_table<P: AsRef<Path>>(path: P) -> Result<Box<dyn TableReader>> {
    let path = path.as_ref();
    let format = TableFormat::detect(path)?;

    info!("Opening table: {:?} (format: {:?})", path, format);

    match format {
        TableFormat::Csv => Ok(Box::new(CsvReader::open(path)?)),
        TableFormat::Jsonl => Ok(Box::new(JsonlReader::open(path)?)),
    }
}

/// Read every record of a table
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Vec<Record>> {
    open_table(path)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_csv_table() {
        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path().with_extension("csv");

        {
            let mut file = std::fs::File::create(&temp_path).unwrap();
            writeln!(file, "COLONIA,LATITUD").unwrap();
            writeln!(file, "Centro,29.08").unwrap();
        }

        let mut reader = open_table(&temp_path).unwrap();
        assert_eq!(reader.columns().unwrap(), &["COLONIA", "LATITUD"]);
        let records: Vec<_> = reader.by_ref().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(reader.records_processed(), 1);

        std::fs::remove_file(temp_path).unwrap();
    }

    #[test]
    fn test_open_jsonl_table() {
        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path().with_extension("jsonl");

        {
            let mut file = std::fs::File::create(&temp_path).unwrap();
            writeln!(file, r#"{{"COLONIA": "Centro"}}"#).unwrap();
            writeln!(file, r#"{{"COLONIA": "Pitic"}}"#).unwrap();
        }

        let records = read_table(&temp_path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].data["COLONIA"], "Centro");

        std::fs::remove_file(temp_path).unwrap();
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(TableFormat::detect("a/incidents.csv").unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::detect("incidents.CSV.gz").unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::detect("incidents.jsonl.gz").unwrap(), TableFormat::Jsonl);
        assert!(matches!(TableFormat::detect("x.txt"), Err(Error::UnsupportedFormat(_))));
        assert!(matches!(TableFormat::detect("noext"), Err(Error::UnsupportedFormat(_))));
    }
}
