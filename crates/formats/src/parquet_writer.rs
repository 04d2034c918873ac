//! Parquet copy of the unified per-polygon table
//!
//! The schema is fixed: identifiers and labels are `Utf8`, counts are
//! `UInt64`, measures are nullable `Float64`. Timestamps and distributions
//! use the same text encoding as the CSV output. The parquet footer is only
//! written by `ArrowWriter::close`, so a writer that is dropped early leaves a
//! corrupt file.

use crate::csv_writer::{distribution, TIMESTAMP_FORMAT};
use crate::{Error, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use geolink_core::UnifiedRow;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::io::Write;
use std::sync::Arc;

/// Rows per record batch
const BATCH_SIZE: usize = 4096;

/// Arrow schema of the unified table
pub fn unified_schema() -> Arc<Schema> {
    let utf8 = |name: &str, nullable: bool| Field::new(name, DataType::Utf8, nullable);
    let float = |name: &str| Field::new(name, DataType::Float64, true);
    let count = |name: &str| Field::new(name, DataType::UInt64, false);
    Arc::new(Schema::new(vec![
        utf8("polygon_id", false),
        utf8("name", false),
        utf8("postal_code", true),
        Field::new("area_km2", DataType::Float64, false),
        float("population"),
        float("households"),
        float("schooling_years"),
        float("pct_under_18"),
        float("pct_male"),
        float("pct_female"),
        float("margination"),
        count("total_incidents"),
        count("high_severity"),
        count("medium_severity"),
        count("low_severity"),
        count("weekend_incidents"),
        count("payday_incidents"),
        utf8("first_incident", true),
        utf8("last_incident", true),
        utf8("categories", false),
        utf8("weekdays", false),
        utf8("parts_of_day", false),
        float("rate_per_1k"),
        float("high_severity_rate_per_1k"),
        Field::new("severity_score", DataType::Float64, false),
        float("density"),
        float("composite_risk_index"),
    ]))
}

fn rows_to_batch(rows: &[UnifiedRow], schema: &Arc<Schema>) -> Result<RecordBatch> {
    let text = |f: &dyn Fn(&UnifiedRow) -> Option<String>| -> ArrayRef {
        Arc::new(rows.iter().map(f).collect::<StringArray>())
    };
    let float = |f: &dyn Fn(&UnifiedRow) -> Option<f64>| -> ArrayRef {
        Arc::new(rows.iter().map(f).collect::<Float64Array>())
    };
    let count = |f: &dyn Fn(&UnifiedRow) -> u64| -> ArrayRef {
        Arc::new(UInt64Array::from(rows.iter().map(f).collect::<Vec<u64>>()))
    };
    let timestamp =
        |t: Option<chrono::NaiveDateTime>| t.map(|t| t.format(TIMESTAMP_FORMAT).to_string());

    let columns: Vec<ArrayRef> = vec![
        text(&|r| Some(r.polygon_id.clone())),
        text(&|r| Some(r.name.clone())),
        text(&|r| r.postal_code.clone()),
        float(&|r| Some(r.area_km2)),
        float(&|r| r.population),
        float(&|r| r.households),
        float(&|r| r.schooling_years),
        float(&|r| r.pct_under_18),
        float(&|r| r.pct_male),
        float(&|r| r.pct_female),
        float(&|r| r.margination),
        count(&|r| r.stats.total),
        count(&|r| r.stats.high),
        count(&|r| r.stats.medium),
        count(&|r| r.stats.low),
        count(&|r| r.stats.weekend),
        count(&|r| r.stats.payday),
        text(&|r| timestamp(r.stats.first_seen)),
        text(&|r| timestamp(r.stats.last_seen)),
        text(&|r| Some(distribution(&r.stats.categories))),
        text(&|r| Some(distribution(&r.stats.weekdays))),
        text(&|r| Some(distribution(&r.stats.parts_of_day))),
        float(&|r| r.indices.rate_per_1k),
        float(&|r| r.indices.high_severity_rate_per_1k),
        float(&|r| Some(r.indices.severity_score)),
        float(&|r| r.indices.density),
        float(&|r| r.indices.composite_risk_index),
    ];

    RecordBatch::try_new(schema.clone(), columns).map_err(Error::ArrowError)
}

/// Write the unified table as a snappy-compressed parquet file
pub fn write_unified_parquet<W: Write + Send>(writer: W, rows: &[UnifiedRow]) -> Result<()> {
    let schema = unified_schema();
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut arrow_writer = ArrowWriter::try_new(writer, schema.clone(), Some(props))?;
    for chunk in rows.chunks(BATCH_SIZE) {
        arrow_writer.write(&rows_to_batch(chunk, &schema)?)?;
    }
    arrow_writer.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_writer::tests::sample_row;
    use crate::csv_writer::UNIFIED_COLUMNS;
    use arrow::array::Array;

    #[test]
    fn test_schema_matches_csv_columns() {
        let schema = unified_schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, UNIFIED_COLUMNS);
    }

    #[test]
    fn test_batch_values() {
        let schema = unified_schema();
        let batch = rows_to_batch(&[sample_row(), sample_row()], &schema).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let rate = batch
            .column_by_name("rate_per_1k")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(rate.value(0), 2.5);

        let composite = batch.column_by_name("composite_risk_index").unwrap();
        assert!(composite.is_null(0));

        let total = batch
            .column_by_name("total_incidents")
            .unwrap()
            .as_any()
            .downcast_ref::<UInt64Array>()
            .unwrap();
        assert_eq!(total.value(1), 3);
    }

    #[test]
    fn test_write_parquet_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_unified_parquet(file.reopen().unwrap(), &[sample_row()]).unwrap();
        let bytes = std::fs::read(file.path()).unwrap();
        // Parquet files start and end with the PAR1 magic
        assert_eq!(&bytes[..4], b"PAR1");
        assert_eq!(&bytes[bytes.len() - 4..], b"PAR1");
    }
}
