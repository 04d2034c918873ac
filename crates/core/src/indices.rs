//! Derived per-polygon indices
//!
//! Rates and density are present only when their inputs are; the composite
//! index is computed over the polygons where all four components exist and
//! each component is min-max scaled across exactly those polygons.

use crate::aggregate::PolygonStats;
use crate::observer::{RunObserver, Stage};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Weights of the composite index components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexWeights {
    pub rate: f64,
    pub severity: f64,
    pub margination: f64,
    pub density: f64,
}

impl Default for IndexWeights {
    fn default() -> Self {
        Self {
            rate: 0.4,
            severity: 0.3,
            margination: 0.2,
            density: 0.1,
        }
    }
}

impl IndexWeights {
    pub fn validate(&self) -> Result<()> {
        let weights = [self.rate, self.severity, self.margination, self.density];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::InvalidConfig(
                "index weights must be non-negative numbers".to_string(),
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(Error::InvalidConfig("index weights sum to zero".to_string()));
        }
        Ok(())
    }
}

/// Inputs for one polygon
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndexInputs {
    pub population: Option<f64>,
    pub area_km2: Option<f64>,
    pub margination: Option<f64>,
}

/// Derived values for one polygon
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PolygonIndices {
    pub rate_per_1k: Option<f64>,
    pub high_severity_rate_per_1k: Option<f64>,
    pub severity_score: f64,
    pub density: Option<f64>,
    pub composite_risk_index: Option<f64>,
}

impl PolygonIndices {
    /// Values that need no cross-polygon scaling
    pub fn local(stats: &PolygonStats, inputs: &IndexInputs) -> Self {
        let population = inputs.population.filter(|p| p.is_finite() && *p > 0.0);
        let rate = |count: u64| population.map(|p| count as f64 / p * 1000.0);
        let density = match (population, inputs.area_km2) {
            (Some(p), Some(area)) if area.is_finite() && area > 0.0 => Some(p / area),
            _ => None,
        };
        Self {
            rate_per_1k: rate(stats.total),
            high_severity_rate_per_1k: rate(stats.high),
            severity_score: stats.weighted_severity() as f64 / stats.total.max(1) as f64,
            density,
            composite_risk_index: None,
        }
    }
}

/// Min-max scale into [0, 1]; a constant column maps to 0
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    values
        .iter()
        .map(|v| if span > 0.0 { (v - min) / span } else { 0.0 })
        .collect()
}

/// Compute indices for every polygon, in slot order
pub fn compute_indices(
    stats: &[PolygonStats],
    inputs: &[IndexInputs],
    weights: &IndexWeights,
    observer: &mut dyn RunObserver,
) -> Vec<PolygonIndices> {
    observer.stage_started(Stage::Indices, stats.len());

    let mut indices: Vec<PolygonIndices> = stats
        .iter()
        .zip(inputs)
        .map(|(s, i)| PolygonIndices::local(s, i))
        .collect();

    // (slot, rate, severity, margination, density) where every component exists
    let complete: Vec<(usize, [f64; 4])> = indices
        .iter()
        .zip(inputs)
        .enumerate()
        .filter_map(|(slot, (idx, input))| {
            let margination = input.margination.filter(|m| m.is_finite())?;
            Some((
                slot,
                [idx.rate_per_1k?, idx.severity_score, margination, idx.density?],
            ))
        })
        .collect();

    if !complete.is_empty() {
        let column = |c: usize| -> Vec<f64> {
            min_max_normalize(&complete.iter().map(|(_, v)| v[c]).collect::<Vec<_>>())
        };
        let (rate, severity, margination, density) = (column(0), column(1), column(2), column(3));
        for (row, (slot, _)) in complete.iter().enumerate() {
            let composite = weights.rate * rate[row]
                + weights.severity * severity[row]
                + weights.margination * margination[row]
                + weights.density * density[row];
            indices[*slot].composite_risk_index = Some(composite * 100.0);
        }
    }

    info!(
        "Composite index computed for {} of {} polygons",
        complete.len(),
        stats.len()
    );
    observer.stage_finished(Stage::Indices, complete.len());
    indices
}
