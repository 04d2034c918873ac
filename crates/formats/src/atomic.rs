//! All-or-nothing output
//!
//! Every output of a run is written to a temporary file in the destination
//! directory first. Nothing is renamed into place until every file has been
//! written, so a failed run leaves the directory as it was.

use crate::csv_writer::{write_linked_incidents_csv, write_unified_csv, write_variant_report_csv};
use crate::geojson::write_geojson;
use crate::mapping_io::write_mapping;
use crate::parquet_writer::write_unified_parquet;
use crate::{Error, Result};
use geolink_core::{Diagnostics, LinkageOutput, LinkageStats};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const UNIFIED_CSV: &str = "unified.csv";
pub const UNIFIED_GEOJSON: &str = "unified.geojson";
pub const UNIFIED_PARQUET: &str = "unified.parquet";
pub const LINKED_INCIDENTS_CSV: &str = "linked_incidents.csv";
pub const NAME_MAPPING_CSV: &str = "name_mapping.csv";
pub const NAME_VARIANTS_CSV: &str = "name_variants.csv";
pub const DIAGNOSTICS_JSON: &str = "diagnostics.json";

/// Files staged for one run
pub struct OutputBatch {
    dir: PathBuf,
    staged: Vec<(PathBuf, NamedTempFile)>,
}

impl OutputBatch {
    /// Stage outputs under `dir`, creating it if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            staged: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one file into a temporary sibling of `dir/name`
    pub fn stage<F>(&mut self, name: &str, write: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
    {
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            write(&mut writer)?;
            writer.flush()?;
        }
        debug!("Staged {} at {}", name, temp.path().display());
        self.staged.push((self.dir.join(name), temp));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Move every staged file into place
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.staged.len());
        for (path, temp) in self.staged {
            temp.persist(&path).map_err(|e| Error::Persist {
                path: path.clone(),
                source: e.error,
            })?;
            written.push(path);
        }
        info!("Wrote {} files to {}", written.len(), self.dir.display());
        Ok(written)
    }
}

#[derive(Serialize)]
struct DiagnosticsFile<'a> {
    stats: &'a LinkageStats,
    diagnostics: &'a Diagnostics,
}

/// Stage and commit every output of a linkage run
pub fn write_run_outputs<P: AsRef<Path>>(
    dir: P,
    output: &LinkageOutput,
    parquet: bool,
) -> Result<Vec<PathBuf>> {
    let mut batch = OutputBatch::new(dir)?;

    batch.stage(UNIFIED_CSV, |w| write_unified_csv(w, &output.rows))?;
    batch.stage(UNIFIED_GEOJSON, |w| write_geojson(w, &output.polygons, &output.rows))?;
    if parquet {
        batch.stage(UNIFIED_PARQUET, |w| write_unified_parquet(w, &output.rows))?;
    }
    batch.stage(LINKED_INCIDENTS_CSV, |w| {
        write_linked_incidents_csv(w, &output.linked_incidents())
    })?;
    batch.stage(NAME_MAPPING_CSV, |w| write_mapping(w, &output.mapping))?;
    batch.stage(NAME_VARIANTS_CSV, |w| {
        write_variant_report_csv(w, &output.diagnostics.variant_groups)
    })?;
    batch.stage(DIAGNOSTICS_JSON, |w| {
        let file = DiagnosticsFile {
            stats: &output.stats,
            diagnostics: &output.diagnostics,
        };
        serde_json::to_writer_pretty(&mut *w, &file)?;
        writeln!(w)?;
        Ok(())
    })?;

    batch.commit()
}
