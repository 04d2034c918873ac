//! Name-mapping persistence as a two-column `original,canonical` CSV

use crate::csv_reader::CsvReader;
use crate::{Error, Result};
use geolink_names::NameMapping;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};

pub const ORIGINAL_COLUMN: &str = "original";
pub const CANONICAL_COLUMN: &str = "canonical";

/// Write a mapping, one row per raw name in name order
pub fn write_mapping<W: Write>(writer: W, mapping: &NameMapping) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([ORIGINAL_COLUMN, CANONICAL_COLUMN])?;
    for (original, canonical) in mapping.iter() {
        csv.write_record([original, canonical])?;
    }
    csv.flush()?;
    Ok(())
}

/// Read a mapping; a repeated original keeps its first canonical name
pub fn read_mapping<R: Read>(reader: R) -> Result<NameMapping> {
    let reader = CsvReader::new(reader)?;
    for column in [ORIGINAL_COLUMN, CANONICAL_COLUMN] {
        if !reader.headers().iter().any(|h| h == column) {
            return Err(Error::MissingColumn {
                table: "mapping",
                field: column,
                candidates: column.to_string(),
            });
        }
    }

    let mut mapping = NameMapping::new();
    for record in reader {
        let record = record?;
        let original = record.raw_text(ORIGINAL_COLUMN).unwrap_or_default();
        let canonical = record.raw_text(CANONICAL_COLUMN).unwrap_or_default();
        if !mapping.insert(original.clone(), canonical) {
            warn!(
                "Mapping line {}: '{}' already mapped, keeping the first",
                record.source_line, original
            );
        }
    }
    Ok(mapping)
}

pub fn load_mapping<P: AsRef<Path>>(path: P) -> Result<NameMapping> {
    let mapping = read_mapping(File::open(path.as_ref())?)?;
    info!(
        "Loaded mapping of {} names onto {} canonical names from {:?}",
        mapping.len(),
        mapping.canonical_count(),
        path.as_ref()
    );
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_mapping_reads_back() {
        let mapping = NameMapping::from_pairs([
            ("PARQUE INDUSTRIAL ", "PARQUE INDUSTRIAL"),
            ("Col. Centro, Hermosillo", "Centro"),
        ]);
        let mut buffer = Vec::new();
        write_mapping(&mut buffer, &mapping).unwrap();

        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with("original,canonical\n"));
        assert!(text.contains("\"Col. Centro, Hermosillo\",Centro"));

        let restored = read_mapping(buffer.as_slice()).unwrap();
        assert_eq!(restored, mapping);
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let result = read_mapping("original,label\na,b\n".as_bytes());
        assert!(matches!(
            result,
            Err(Error::MissingColumn { field: "canonical", .. })
        ));
    }

    #[test]
    fn test_repeated_original_keeps_first() {
        let mapping = read_mapping("original,canonical\na,X\na,Y\n".as_bytes()).unwrap();
        assert_eq!(mapping.resolve("a"), "X");
        assert_eq!(mapping.len(), 1);
    }
}
