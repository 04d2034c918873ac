//! End-to-end linkage run
//!
//! Groups raw names, links incidents and demographic records to polygons,
//! validates the links, aggregates per polygon and derives the indices. Each
//! stage takes the previous stage's output by value or reference and returns
//! a new value; nothing is mutated after it is produced.

use crate::aggregate::{aggregate, PolygonStats};
use crate::canonical::CanonicalKeys;
use crate::demographics::{join_demographics, DemographicJoin};
use crate::diagnostics::{self, Diagnostics};
use crate::indices::{compute_indices, IndexInputs, IndexWeights, PolygonIndices};
use crate::model::{
    Assignment, DemographicPayload, IncidentPayload, LinkMethod, PointRecord, PolygonRecord,
};
use crate::observer::{RunObserver, SilentObserver, Stage};
use crate::polygons::PolygonSet;
use crate::resolver::{Resolver, ResolverConfig};
use crate::validator::Validator;
use crate::{Error, Result};
use geolink_names::{
    Grouping, GroupingConfig, Lexicon, NameGrouper, NameMapping, RawNameRecord, SimilarityMetric,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Run statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkageStats {
    pub polygons: usize,
    pub incidents: usize,
    pub exact: usize,
    pub buffered: usize,
    pub name_fallback: usize,
    pub unresolved: usize,
    pub corrected: usize,
    pub demographic_records: usize,
    pub demographics_linked: usize,
    pub polygons_with_incidents: usize,
    pub composite_indices: usize,
    pub distinct_names: usize,
    pub canonical_names: usize,
}

impl LinkageStats {
    fn percent(part: usize, whole: usize) -> f64 {
        if whole > 0 {
            (part as f64 / whole as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Share of incidents linked to a polygon
    pub fn linkage_rate(&self) -> f64 {
        Self::percent(self.incidents - self.unresolved, self.incidents)
    }

    pub fn correction_rate(&self) -> f64 {
        Self::percent(self.corrected, self.incidents)
    }

    pub fn demographic_linkage_rate(&self) -> f64 {
        Self::percent(self.demographics_linked, self.demographic_records)
    }

    /// Share of polygons with a composite index
    pub fn index_coverage(&self) -> f64 {
        Self::percent(self.composite_indices, self.polygons)
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub grouping: GroupingConfig,
    /// Word lists; the bundled lexicon when `None`
    pub lexicon: Option<Lexicon>,
    pub resolver: ResolverConfig,
    pub weights: IndexWeights,
}

/// Tables for one run, fully loaded
#[derive(Debug, Clone, Default)]
pub struct LinkageInputs {
    pub polygons: Vec<PolygonRecord>,
    pub incidents: Vec<PointRecord<IncidentPayload>>,
    pub demographics: Vec<PointRecord<DemographicPayload>>,
    /// Existing raw-to-canonical mapping; names are regrouped when `None`
    pub mapping: Option<NameMapping>,
}

/// One row of the unified per-polygon table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedRow {
    pub polygon_id: String,
    pub name: String,
    pub postal_code: Option<String>,
    pub area_km2: f64,
    pub population: Option<f64>,
    pub households: Option<f64>,
    pub schooling_years: Option<f64>,
    pub pct_under_18: Option<f64>,
    pub pct_male: Option<f64>,
    pub pct_female: Option<f64>,
    pub margination: Option<f64>,
    #[serde(flatten)]
    pub stats: PolygonStats,
    #[serde(flatten)]
    pub indices: PolygonIndices,
}

/// One incident with its final link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedIncident {
    pub row: usize,
    pub raw_name: Option<String>,
    pub canonical_name: Option<String>,
    pub polygon_id: Option<String>,
    pub polygon_name: Option<String>,
    pub method: LinkMethod,
    pub corrected: bool,
    pub corrected_from: Option<String>,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct LinkageOutput {
    pub polygons: PolygonSet,
    pub incidents: Vec<PointRecord<IncidentPayload>>,
    /// Validated incident assignments, in input order
    pub assignments: Vec<Assignment>,
    pub mapping: NameMapping,
    /// `None` when an existing mapping was supplied
    pub grouping: Option<Grouping>,
    pub demographics: DemographicJoin,
    /// Slot order
    pub rows: Vec<UnifiedRow>,
    pub diagnostics: Diagnostics,
    pub stats: LinkageStats,
}

impl LinkageOutput {
    pub fn linked_incidents(&self) -> Vec<LinkedIncident> {
        self.assignments
            .iter()
            .map(|a| {
                let point = &self.incidents[a.record];
                let polygon = a.polygon.map(|slot| self.polygons.get(slot));
                LinkedIncident {
                    row: point.row,
                    raw_name: point.raw_name.clone(),
                    canonical_name: point
                        .raw_name
                        .as_deref()
                        .map(|raw| self.mapping.resolve(raw).to_string()),
                    polygon_id: polygon.map(|p| p.id.clone()),
                    polygon_name: polygon.map(|p| p.name.clone()),
                    method: a.method,
                    corrected: a.is_corrected(),
                    corrected_from: a.corrected_from.map(|slot| self.polygons.get(slot).id.clone()),
                }
            })
            .collect()
    }
}

/// Entity-resolution and spatial-linkage pipeline
pub struct LinkagePipeline {
    config: PipelineConfig,
    grouper: NameGrouper,
}

impl LinkagePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.resolver.validate()?;
        config.weights.validate()?;
        let lexicon = match &config.lexicon {
            Some(lexicon) => lexicon.clone(),
            None => Lexicon::embedded()?,
        };
        let grouper = NameGrouper::with_lexicon(config.grouping.clone(), lexicon)?;
        Ok(Self { config, grouper })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn grouper(&self) -> &NameGrouper {
        &self.grouper
    }

    /// Run without progress reporting
    pub fn run(&self, inputs: LinkageInputs) -> Result<LinkageOutput> {
        self.run_with_observer(inputs, &mut SilentObserver)
    }

    pub fn run_with_observer(
        &self,
        inputs: LinkageInputs,
        observer: &mut dyn RunObserver,
    ) -> Result<LinkageOutput> {
        let LinkageInputs {
            polygons,
            incidents,
            demographics,
            mapping,
        } = inputs;

        check_coordinates(&incidents, "incident")?;
        check_coordinates(&demographics, "demographic")?;

        let polygons = PolygonSet::new(polygons)?;
        info!(
            "Linking {} incidents and {} demographic records to {} polygons",
            incidents.len(),
            demographics.len(),
            polygons.len()
        );

        let (mapping, grouping) = match mapping {
            Some(mapping) => {
                info!("Using supplied mapping with {} names", mapping.len());
                (mapping, None)
            }
            None => {
                let names = raw_name_counts(&incidents, &demographics);
                observer.stage_started(Stage::NameGrouping, names.len());
                let grouping = self.grouper.group(&names);
                observer.stage_finished(Stage::NameGrouping, grouping.groups.len());
                (grouping.mapping.clone(), Some(grouping))
            }
        };

        let resolver = Resolver::new(&polygons, &mapping, self.config.resolver.clone())?;
        let resolution = resolver.resolve(&incidents, observer);
        let validator = Validator::new(&polygons, CanonicalKeys::new(&mapping));
        let validation = validator.validate(&incidents, resolution.assignments, observer);

        let demographic_join =
            join_demographics(&polygons, &demographics, &mapping, &self.config.resolver, observer)?;

        let stats = aggregate(&polygons, &incidents, &validation.assignments, observer);

        let index_inputs: Vec<IndexInputs> = (0..polygons.len())
            .map(|slot| {
                let attributes = &polygons.get(slot).attributes;
                let demographic = demographic_join.get(slot);
                IndexInputs {
                    population: demographic.and_then(|d| d.population).or(attributes.population),
                    area_km2: Some(polygons.area_km2(slot)),
                    margination: demographic.and_then(|d| d.margination).or(attributes.margination),
                }
            })
            .collect();
        let indices = compute_indices(&stats, &index_inputs, &self.config.weights, observer);

        let rows: Vec<UnifiedRow> = stats
            .into_iter()
            .zip(indices)
            .zip(&index_inputs)
            .enumerate()
            .map(|(slot, ((stats, indices), inputs))| {
                let polygon = polygons.get(slot);
                let demographic = demographic_join.get(slot);
                let field = |f: fn(&DemographicPayload) -> Option<f64>| demographic.and_then(f);
                UnifiedRow {
                    polygon_id: polygon.id.clone(),
                    name: polygon.name.clone(),
                    postal_code: polygon.attributes.postal_code.clone(),
                    area_km2: polygons.area_km2(slot),
                    population: inputs.population,
                    households: field(|d| d.households),
                    schooling_years: field(|d| d.schooling_years),
                    pct_under_18: field(|d| d.pct_under_18),
                    pct_male: field(|d| d.pct_male),
                    pct_female: field(|d| d.pct_female),
                    margination: inputs.margination,
                    stats,
                    indices,
                }
            })
            .collect();

        let diagnostics = Diagnostics {
            unresolved_incidents: diagnostics::unresolved_records(
                &polygons,
                &incidents,
                &validation.assignments,
            ),
            unresolved_demographics: diagnostics::unresolved_records(
                &polygons,
                &demographics,
                &demographic_join.assignments,
            ),
            corrections: diagnostics::correction_records(
                &polygons,
                &incidents,
                &validation.corrections,
            ),
            multi_variant_groups: grouping.as_ref().map_or(0, |g| g.stats.multi_variant_groups),
            variant_groups: grouping.as_ref().map(diagnostics::variant_report).unwrap_or_default(),
            incident_cascade: resolution.steps,
            demographic_cascade: demographic_join.steps.clone(),
            ambiguous_matches: resolution.ambiguous,
            polygons_without_incidents: rows
                .iter()
                .filter(|r| r.stats.total == 0)
                .map(|r| r.polygon_id.clone())
                .collect(),
            polygons_without_demographics: diagnostics::polygons_without_demographics(
                &polygons,
                &demographic_join,
            ),
            duplicate_demographics: demographic_join.duplicates,
        };

        let count = |method: LinkMethod| {
            validation
                .assignments
                .iter()
                .filter(|a| a.method == method)
                .count()
        };
        let stats = LinkageStats {
            polygons: polygons.len(),
            incidents: incidents.len(),
            exact: count(LinkMethod::Exact),
            buffered: count(LinkMethod::Buffered),
            name_fallback: count(LinkMethod::NameFallback),
            unresolved: count(LinkMethod::Unresolved),
            corrected: validation.corrections.len(),
            demographic_records: demographics.len(),
            demographics_linked: demographic_join
                .assignments
                .iter()
                .filter(|a| a.is_resolved())
                .count(),
            polygons_with_incidents: rows.iter().filter(|r| r.stats.total > 0).count(),
            composite_indices: rows
                .iter()
                .filter(|r| r.indices.composite_risk_index.is_some())
                .count(),
            distinct_names: mapping.len(),
            canonical_names: mapping.canonical_count(),
        };

        info!(
            "Linked {:.1}% of incidents ({} unresolved, {} corrected)",
            stats.linkage_rate(),
            stats.unresolved,
            stats.corrected
        );

        Ok(LinkageOutput {
            polygons,
            incidents,
            assignments: validation.assignments,
            mapping,
            grouping,
            demographics: demographic_join,
            rows,
            diagnostics,
            stats,
        })
    }
}

/// Raw names across both point tables, with occurrence counts
fn raw_name_counts(
    incidents: &[PointRecord<IncidentPayload>],
    demographics: &[PointRecord<DemographicPayload>],
) -> Vec<RawNameRecord> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    let names = incidents
        .iter()
        .filter_map(|p| p.raw_name.as_deref())
        .chain(demographics.iter().filter_map(|p| p.raw_name.as_deref()));
    for name in names {
        *counts.entry(name).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(name, frequency)| RawNameRecord::new(name, frequency))
        .collect()
}

fn check_coordinates<P>(points: &[PointRecord<P>], table: &str) -> Result<()> {
    match points.iter().find(|p| p.location.is_some_and(|c| !c.is_finite())) {
        Some(point) => Err(Error::Schema(format!(
            "{} row {} has non-finite coordinates",
            table, point.row
        ))),
        None => Ok(()),
    }
}

/// Builder for pipeline configuration
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.config.grouping.threshold = threshold;
        self
    }

    pub fn metric(mut self, metric: SimilarityMetric) -> Self {
        self.config.grouping.metric = metric;
        self
    }

    pub fn strip_prefixes(mut self, strip: bool) -> Self {
        self.config.grouping.strip_prefixes = strip;
        self
    }

    pub fn lexicon(mut self, lexicon: Lexicon) -> Self {
        self.config.lexicon = Some(lexicon);
        self
    }

    pub fn buffer_meters(mut self, meters: f64) -> Self {
        self.config.resolver.buffer_meters = meters;
        self
    }

    pub fn name_fallback(mut self, enabled: bool) -> Self {
        self.config.resolver.name_fallback = enabled;
        self
    }

    pub fn weights(mut self, weights: IndexWeights) -> Self {
        self.config.weights = weights;
        self
    }

    pub fn build(self) -> Result<LinkagePipeline> {
        LinkagePipeline::new(self.config)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
