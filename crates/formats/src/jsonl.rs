//! Streaming JSONL (JSON Lines) table reader
//!
//! One JSON object per line, optionally gzip-compressed. A line that is not
//! a JSON object is a schema error: a linkage run never skips input rows.

use crate::{Error, Record, Result};
use flate2::read::GzDecoder;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Buffer size for the underlying reader
const BUFFER_SIZE: usize = 64 * 1024;

/// Streaming JSONL reader that processes files line-by-line
pub struct JsonlReader<R: Read> {
    reader: BufReader<R>,
    line_number: usize,
    records_read: usize,
    bytes_read: u64,
}

impl JsonlReader<Box<dyn Read>> {
    /// Open a JSONL file, decompressing `.gz` files
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let reader: Box<dyn Read> = match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => {
                debug!("Opening gzip-compressed JSONL file: {:?}", path);
                Box::new(GzDecoder::new(file))
            }
            _ => {
                debug!("Opening plain JSONL file: {:?}", path);
                Box::new(file)
            }
        };
        Ok(Self::new(reader))
    }
}

impl<R: Read> JsonlReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(BUFFER_SIZE, reader),
            line_number: 0,
            records_read: 0,
            bytes_read: 0,
        }
    }

    pub fn records_processed(&self) -> usize {
        self.records_read
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: Read> Iterator for JsonlReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();

        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(n) => {
                    self.bytes_read += n as u64;
                    self.line_number += 1;

                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    return Some(match serde_json::from_str::<Value>(trimmed) {
                        Ok(value @ Value::Object(_)) => {
                            self.records_read += 1;
                            Ok(Record::new(value, self.line_number))
                        }
                        Ok(_) => Err(Error::Malformed {
                            line: self.line_number,
                            message: "expected a JSON object".to_string(),
                        }),
                        Err(e) => Err(Error::Malformed {
                            line: self.line_number,
                            message: e.to_string(),
                        }),
                    });
                }
                Err(e) => return Some(Err(Error::Io(e))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_jsonl_reader_basic() {
        let data = r#"{"COLONIA": "Centro", "LATITUD": 29.08}
{"COLONIA": "Pitic", "LATITUD": null}"#;

        let reader = JsonlReader::new(data.as_bytes());
        let records: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].data["COLONIA"], "Centro");
        assert_eq!(records[1].source_line, 2);
    }

    #[test]
    fn test_jsonl_reader_with_empty_lines() {
        let data = "{\"a\": 1}\n\n{\"a\": 2}\n\n";

        let reader = JsonlReader::new(data.as_bytes());
        let records: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].source_line, 3);
    }

    #[test]
    fn test_jsonl_reader_rejects_malformed_lines() {
        let data = "{\"a\": 1}\n{invalid json}\n[1, 2]\n";

        let results: Vec<_> = JsonlReader::new(data.as_bytes()).collect();
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Malformed { line: 2, .. })));
        assert!(matches!(results[2], Err(Error::Malformed { line: 3, .. })));
    }

    #[test]
    fn test_jsonl_reader_progress_tracking() {
        let data = "{\"a\": 1}\n{\"a\": 2}";

        let mut reader = JsonlReader::new(data.as_bytes());
        assert_eq!(reader.records_processed(), 0);

        let _ = reader.next();
        assert_eq!(reader.records_processed(), 1);
        assert!(reader.bytes_processed() > 0);
    }

    #[test]
    fn test_jsonl_reader_gzip() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path().with_extension("jsonl.gz");

        {
            let file = File::create(&temp_path).unwrap();
            let mut encoder = GzEncoder::new(file, Compression::default());
            writeln!(encoder, r#"{{"COLONIA": "Centro"}}"#).unwrap();
            writeln!(encoder, r#"{{"COLONIA": "Pitic"}}"#).unwrap();
            encoder.finish().unwrap();
        }

        let reader = JsonlReader::open(&temp_path).unwrap();
        let records: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].data["COLONIA"], "Pitic");

        std::fs::remove_file(temp_path).unwrap();
    }
}
