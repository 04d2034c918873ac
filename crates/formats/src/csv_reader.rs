//! Streaming CSV table reader
//!
//! The first row is the header. Cells that are not valid UTF-8 are decoded
//! as Latin-1, which is how the municipal exports are usually encoded.

use crate::{Error, Record, Result};
use csv::{ByteRecord, ReaderBuilder};
use flate2::read::GzDecoder;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

pub struct CsvReader<R: Read> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    row: ByteRecord,
    records_read: usize,
}

impl CsvReader<Box<dyn Read>> {
    /// Open a CSV file, decompressing `.gz` files
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader: Box<dyn Read> = match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => {
                debug!("Opening gzip-compressed CSV file: {:?}", path);
                Box::new(GzDecoder::new(file))
            }
            _ => {
                debug!("Opening plain CSV file: {:?}", path);
                Box::new(file)
            }
        };
        Self::new(reader)
    }
}

impl<R: Read> CsvReader<R> {
    /// Wrap a reader and consume the header row
    pub fn new(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = reader
            .byte_headers()?
            .iter()
            .map(|h| decode_cell(h).trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        Ok(Self {
            reader,
            headers,
            row: ByteRecord::new(),
            records_read: 0,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records_processed(&self) -> usize {
        self.records_read
    }

    fn to_record(&self) -> Result<Record> {
        let line = self
            .row
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(self.records_read + 1);
        if self.row.len() != self.headers.len() {
            return Err(Error::Malformed {
                line,
                message: format!(
                    "expected {} fields, found {}",
                    self.headers.len(),
                    self.row.len()
                ),
            });
        }
        let data: Map<String, Value> = self
            .headers
            .iter()
            .zip(self.row.iter())
            .map(|(header, cell)| (header.clone(), Value::String(decode_cell(cell))))
            .collect();
        Ok(Record::new(Value::Object(data), line))
    }
}

impl<R: Read> Iterator for CsvReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut row = std::mem::take(&mut self.row);
        let read = self.reader.read_byte_record(&mut row);
        self.row = row;
        match read {
            Ok(false) => None,
            Ok(true) => {
                self.records_read += 1;
                Some(self.to_record())
            }
            Err(e) => Some(Err(Error::Csv(e))),
        }
    }
}

/// UTF-8 when valid, else Latin-1
fn decode_cell(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_csv_reader_basic() {
        let data = "CVE_COL,COLONIA,POBTOT\n001,Centro,1200\n002,\"Pitic, Viejo\",\n";
        let reader = CsvReader::new(data.as_bytes()).unwrap();
        assert_eq!(reader.headers(), &["CVE_COL", "COLONIA", "POBTOT"]);

        let records: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].data["CVE_COL"], "001");
        assert_eq!(records[1].text("COLONIA").as_deref(), Some("Pitic, Viejo"));
        assert_eq!(records[1].text("POBTOT"), None);
        assert_eq!(records[1].source_line, 3);
    }

    #[test]
    fn test_csv_reader_strips_bom_and_decodes_latin1() {
        let mut data = b"\xef\xbb\xbfCOLONIA\n".to_vec();
        data.extend_from_slice(b"Pe\xf1a Blanca\n");
        let reader = CsvReader::new(data.as_slice()).unwrap();
        assert_eq!(reader.headers(), &["COLONIA"]);

        let records: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(records[0].text("COLONIA").as_deref(), Some("Peña Blanca"));
    }

    #[test]
    fn test_csv_reader_ragged_row_is_an_error() {
        let data = "a,b\n1,2\n3\n";
        let results: Vec<_> = CsvReader::new(data.as_bytes()).unwrap().collect();
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_csv_reader_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "COLONIA,LATITUD").unwrap();
        writeln!(temp_file, "Centro,29.08").unwrap();
        temp_file.flush().unwrap();

        let mut reader = CsvReader::open(temp_file.path()).unwrap();
        let record = reader.next().unwrap().unwrap();
        assert_eq!(record.data["LATITUD"], "29.08");
        assert_eq!(reader.records_processed(), 1);
        assert!(reader.next().is_none());
    }
}
