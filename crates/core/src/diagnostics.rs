//! Audit report for a linkage run
//!
//! Everything a reviewer needs to see what did not link cleanly: unresolved
//! records with their nearest polygon, validator corrections, name groups with
//! several variants, per-step cascade counts and polygons missing data.

use crate::demographics::DemographicJoin;
use crate::model::{Assignment, PointRecord};
use crate::polygons::PolygonSet;
use crate::resolver::CascadeStep;
use crate::validator::Correction;
use geolink_names::{CanonicalNameGroup, Grouping};
use serde::Serialize;

/// A record left without a polygon
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedRecord {
    pub row: usize,
    pub raw_name: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    /// Closest polygon, for records with coordinates
    pub nearest_polygon: Option<String>,
    pub nearest_distance_m: Option<f64>,
}

/// A reassignment made by the validator, by polygon id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionRecord {
    pub row: usize,
    pub raw_name: Option<String>,
    pub from_polygon: String,
    pub to_polygon: String,
}

/// One name group with more than one variant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantGroupReport {
    pub representative: String,
    pub canonical: String,
    pub variant_count: usize,
    pub variants: Vec<String>,
    pub total_frequency: u64,
}

impl From<&CanonicalNameGroup> for VariantGroupReport {
    fn from(group: &CanonicalNameGroup) -> Self {
        Self {
            representative: group.representative.clone(),
            canonical: group.canonical.clone(),
            variant_count: group.variant_count(),
            variants: group.members.iter().map(|m| m.name.clone()).collect(),
            total_frequency: group.total_frequency,
        }
    }
}

/// Variant groups of a grouping run, largest total frequency first
pub fn variant_report(grouping: &Grouping) -> Vec<VariantGroupReport> {
    let mut report: Vec<VariantGroupReport> = grouping
        .multi_variant_groups()
        .map(VariantGroupReport::from)
        .collect();
    report.sort_by(|a, b| {
        b.total_frequency
            .cmp(&a.total_frequency)
            .then_with(|| a.representative.cmp(&b.representative))
    });
    report
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub unresolved_incidents: Vec<UnresolvedRecord>,
    pub unresolved_demographics: Vec<UnresolvedRecord>,
    pub corrections: Vec<CorrectionRecord>,
    pub multi_variant_groups: usize,
    pub variant_groups: Vec<VariantGroupReport>,
    pub incident_cascade: Vec<CascadeStep>,
    pub demographic_cascade: Vec<CascadeStep>,
    pub ambiguous_matches: usize,
    pub polygons_without_incidents: Vec<String>,
    pub polygons_without_demographics: Vec<String>,
    pub duplicate_demographics: usize,
}

impl Diagnostics {
    pub fn has_issues(&self) -> bool {
        !self.unresolved_incidents.is_empty()
            || !self.unresolved_demographics.is_empty()
            || !self.corrections.is_empty()
            || self.ambiguous_matches > 0
    }
}

/// Unresolved records with the nearest polygon for those with coordinates
pub fn unresolved_records<P>(
    polygons: &PolygonSet,
    points: &[PointRecord<P>],
    assignments: &[Assignment],
) -> Vec<UnresolvedRecord> {
    assignments
        .iter()
        .filter(|a| !a.is_resolved())
        .map(|a| {
            let point = &points[a.record];
            let nearest = point.location.and_then(|loc| polygons.nearest(&loc));
            UnresolvedRecord {
                row: point.row,
                raw_name: point.raw_name.clone(),
                longitude: point.location.map(|c| c.x),
                latitude: point.location.map(|c| c.y),
                nearest_polygon: nearest.map(|(slot, _)| polygons.get(slot).id.clone()),
                nearest_distance_m: nearest.map(|(_, d)| d),
            }
        })
        .collect()
}

pub fn correction_records<P>(
    polygons: &PolygonSet,
    points: &[PointRecord<P>],
    corrections: &[Correction],
) -> Vec<CorrectionRecord> {
    corrections
        .iter()
        .map(|c| CorrectionRecord {
            row: points[c.record].row,
            raw_name: points[c.record].raw_name.clone(),
            from_polygon: polygons.get(c.from).id.clone(),
            to_polygon: polygons.get(c.to).id.clone(),
        })
        .collect()
}

pub fn polygons_without_demographics(polygons: &PolygonSet, join: &DemographicJoin) -> Vec<String> {
    join.missing_slots().map(|slot| polygons.get(slot).id.clone()).collect()
}
