//! Table readers, WKT parsing and output writers
//!
//! Input tables are CSV or JSONL (optionally gzipped) and are bound to the
//! core model types by column name. Outputs are staged and committed together
//! through [`OutputBatch`].

pub mod atomic;
pub mod csv_reader;
pub mod csv_writer;
pub mod error;
pub mod geojson;
pub mod jsonl;
pub mod mapping_io;
pub mod parquet_writer;
pub mod reader;
pub mod record;
pub mod schema;
pub mod wkt;

pub use atomic::{write_run_outputs, OutputBatch};
pub use csv_writer::{write_linked_incidents_csv, write_unified_csv, write_variant_report_csv};
pub use error::{Error, Result};
pub use geojson::write_geojson;
pub use mapping_io::{load_mapping, read_mapping, write_mapping};
pub use parquet_writer::write_unified_parquet;
pub use reader::{open_table, read_table, TableFormat, TableReader};
pub use record::Record;
pub use schema::{
    distinct_names, load_demographics, load_incidents, load_polygons, ColumnOverrides,
    DemographicColumns, IncidentColumns, PolygonColumns,
};
pub use wkt::parse_wkt;
