//! Run configuration files

use anyhow::{Context, Result};
use geolink_core::{IndexWeights, PipelineConfig, ResolverConfig};
use geolink_formats::ColumnOverrides;
use geolink_names::{GroupingConfig, Lexicon};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete configuration of a `link` run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub inputs: InputsConfig,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub grouping: GroupingSection,
    #[serde(default)]
    pub spatial: ResolverConfig,
    #[serde(default)]
    pub weights: IndexWeights,
    #[serde(default)]
    pub columns: ColumnOverrides,
}

/// Input tables; relative paths are taken from the config file's directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputsConfig {
    pub polygons: PathBuf,
    pub incidents: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demographics: Option<PathBuf>,
    /// Existing `original,canonical` mapping; names are regrouped when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputsConfig {
    pub directory: PathBuf,
    #[serde(default = "default_parquet")]
    pub parquet: bool,
}

fn default_parquet() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupingSection {
    #[serde(flatten)]
    pub config: GroupingConfig,
    /// Word lists replacing the bundled lexicon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexicon: Option<PathBuf>,
}

impl RunConfig {
    /// Load configuration from a file (YAML or TOML)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let config: Self = match extension {
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            "toml" => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            _ => {
                return Err(anyhow::anyhow!(
                    "Unsupported config file format: {}. Use .yaml, .yml, or .toml",
                    extension
                ))
            }
        };

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.relative_to(base))
    }

    /// Save configuration to a file
    #[allow(dead_code)]
    pub fn save(&self, path: &Path) -> Result<()> {
        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let content = match extension {
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            "toml" => toml::to_string_pretty(self)?,
            _ => {
                return Err(anyhow::anyhow!(
                    "Unsupported config file format: {}. Use .yaml, .yml, or .toml",
                    extension
                ))
            }
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Anchor relative paths at `base`
    fn relative_to(mut self, base: &Path) -> Self {
        let anchor = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        anchor(&mut self.inputs.polygons);
        anchor(&mut self.inputs.incidents);
        anchor(&mut self.outputs.directory);
        for path in [
            self.inputs.demographics.as_mut(),
            self.inputs.mapping.as_mut(),
            self.grouping.lexicon.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            anchor(path);
        }
        self
    }

    /// Engine configuration, with the lexicon file loaded
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let lexicon = match &self.grouping.lexicon {
            Some(path) => Some(
                Lexicon::from_path(path)
                    .with_context(|| format!("Failed to load lexicon: {}", path.display()))?,
            ),
            None => None,
        };
        Ok(PipelineConfig {
            grouping: self.grouping.config.clone(),
            lexicon,
            resolver: self.spatial.clone(),
            weights: self.weights.clone(),
        })
    }

    /// Layout of a typical run
    #[allow(dead_code)]
    pub fn example() -> Self {
        Self {
            inputs: InputsConfig {
                polygons: "colonias.csv".into(),
                incidents: "incidents.csv".into(),
                demographics: Some("census.csv".into()),
                mapping: None,
            },
            outputs: OutputsConfig {
                directory: "out".into(),
                parquet: true,
            },
            grouping: GroupingSection::default(),
            spatial: ResolverConfig::default(),
            weights: IndexWeights::default(),
            columns: ColumnOverrides::default(),
        }
    }

    /// Geocoded points are trusted: no buffer, tight grouping
    #[allow(dead_code)]
    pub fn strict(self) -> Self {
        Self {
            grouping: GroupingSection {
                config: GroupingConfig::strict(),
                ..self.grouping
            },
            spatial: ResolverConfig {
                buffer_meters: 0.0,
                ..self.spatial
            },
            ..self
        }
    }

    /// Noisy free-text names and loose geocoding
    #[allow(dead_code)]
    pub fn lenient(self) -> Self {
        Self {
            grouping: GroupingSection {
                config: GroupingConfig::lenient(),
                ..self.grouping
            },
            spatial: ResolverConfig {
                buffer_meters: 1000.0,
                ..self.spatial
            },
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_example_config() {
        let config = RunConfig::example();
        assert!(config.outputs.parquet);
        assert_eq!(config.spatial.buffer_meters, 500.0);
        let pipeline = config.pipeline_config().unwrap();
        assert!(pipeline.lexicon.is_none());
        assert_eq!(pipeline.grouping.threshold, 0.90);
    }

    #[test]
    fn test_save_and_load_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.yaml");
        let config = RunConfig::example().strict();

        config.save(&path).unwrap();
        let loaded = RunConfig::load(&path).unwrap();

        assert_eq!(loaded.inputs.polygons, dir.path().join("colonias.csv"));
        assert_eq!(loaded.grouping.config.threshold, 0.96);
        assert_eq!(loaded.spatial.buffer_meters, 0.0);
    }

    #[test]
    fn test_save_and_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.toml");
        let config = RunConfig::example().lenient();

        config.save(&path).unwrap();
        let loaded = RunConfig::load(&path).unwrap();

        assert_eq!(loaded.grouping.config, config.grouping.config);
        assert_eq!(loaded.weights, config.weights);
        assert_eq!(loaded.outputs.directory, dir.path().join("out"));
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        write!(
            file,
            "inputs:\n  polygons: /data/colonias.csv\n  incidents: /data/incidents.jsonl\n\
             outputs:\n  directory: /data/out\n\
             grouping:\n  threshold: 0.88\n  metric: jaro_winkler\n\
             columns:\n  incidents:\n    name: colonia_hecho\n"
        )
        .unwrap();

        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.inputs.polygons, PathBuf::from("/data/colonias.csv"));
        assert_eq!(config.inputs.demographics, None);
        assert!(config.outputs.parquet);
        assert_eq!(config.grouping.config.threshold, 0.88);
        assert!(config.grouping.config.use_blocking);
        assert_eq!(config.spatial, ResolverConfig::default());
        assert_eq!(config.columns.incidents.name.as_deref(), Some("colonia_hecho"));
    }

    #[test]
    fn test_unsupported_format() {
        let config = RunConfig::example();
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("json");

        assert!(config.save(&path).is_err());
    }

    #[test]
    fn test_missing_lexicon_file() {
        let mut config = RunConfig::example();
        config.grouping.lexicon = Some("/nonexistent/lexicon.toml".into());
        assert!(config.pipeline_config().is_err());
    }
}
