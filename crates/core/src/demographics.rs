//! Joins demographic records to polygons
//!
//! Records carrying a known administrative key are joined on it. The rest go
//! through the same resolver cascade and validator as incidents. When several
//! records land on one polygon the first in input order wins.

use crate::canonical::CanonicalKeys;
use crate::model::{Assignment, DemographicPayload, LinkMethod, PointRecord};
use crate::observer::RunObserver;
use crate::polygons::PolygonSet;
use crate::resolver::{CascadeStep, Resolver, ResolverConfig};
use crate::validator::Validator;
use crate::Result;
use geolink_names::NameMapping;
use tracing::{info, warn};

/// Demographic attributes per polygon slot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemographicJoin {
    /// Slot order; `None` for polygons without a demographic record
    pub by_polygon: Vec<Option<DemographicPayload>>,
    /// One per input record, in input order
    pub assignments: Vec<Assignment>,
    pub keyed: usize,
    /// Records dropped because their polygon already had one
    pub duplicates: usize,
    pub steps: Vec<CascadeStep>,
    pub corrections: usize,
}

impl DemographicJoin {
    pub fn get(&self, slot: usize) -> Option<&DemographicPayload> {
        self.by_polygon.get(slot).and_then(Option::as_ref)
    }

    pub fn unresolved_count(&self) -> usize {
        self.assignments.iter().filter(|a| !a.is_resolved()).count()
    }

    pub fn missing_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_polygon
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_none())
            .map(|(slot, _)| slot)
    }
}

/// The record's position data with its input index as payload
fn indexed(record: &PointRecord<DemographicPayload>, index: usize) -> PointRecord<usize> {
    PointRecord::new(record.row, record.raw_name.clone(), record.location, index)
}

pub fn join_demographics(
    polygons: &PolygonSet,
    records: &[PointRecord<DemographicPayload>],
    mapping: &NameMapping,
    config: &ResolverConfig,
    observer: &mut dyn RunObserver,
) -> Result<DemographicJoin> {
    let mut assignments: Vec<Assignment> = (0..records.len()).map(Assignment::unresolved).collect();
    let mut keyed = 0;

    // Records without a usable key, with their payload replaced by the input index
    let mut pending: Vec<PointRecord<usize>> = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let key = record.payload.polygon_key.as_deref().map(str::trim).filter(|k| !k.is_empty());
        match key.map(|k| (k, polygons.slot_of(k))) {
            Some((_, Some(slot))) => {
                assignments[i] = Assignment::linked(i, slot, LinkMethod::Key);
                keyed += 1;
            }
            Some((k, None)) => {
                warn!("Demographic row {} has unknown polygon key '{}'", record.row, k);
                pending.push(indexed(record, i));
            }
            None => pending.push(indexed(record, i)),
        }
    }

    let mut steps = Vec::new();
    let mut corrections = 0;
    if !pending.is_empty() {
        let resolver = Resolver::new(polygons, mapping, config.clone())?;
        let resolution = resolver.resolve(&pending, observer);
        let validator = Validator::new(polygons, CanonicalKeys::new(mapping));
        let outcome = validator.validate(&pending, resolution.assignments, observer);

        for assignment in outcome.assignments {
            let original = pending[assignment.record].payload;
            assignments[original] = Assignment {
                record: original,
                ..assignment
            };
        }
        steps = resolution.steps;
        corrections = outcome.corrections.len();
    }

    let mut by_polygon: Vec<Option<DemographicPayload>> = vec![None; polygons.len()];
    let mut duplicates = 0;
    for assignment in &assignments {
        let Some(slot) = assignment.polygon else { continue };
        let record = &records[assignment.record];
        if by_polygon[slot].is_some() {
            duplicates += 1;
            warn!(
                "Demographic row {} duplicates polygon '{}'; keeping the first",
                record.row,
                polygons.get(slot).id
            );
        } else {
            by_polygon[slot] = Some(record.payload.clone());
        }
    }

    let join = DemographicJoin {
        by_polygon,
        assignments,
        keyed,
        duplicates,
        steps,
        corrections,
    };
    info!(
        "Demographics: {} keyed, {} unresolved, {} duplicates, {} polygons without data",
        join.keyed,
        join.unresolved_count(),
        join.duplicates,
        join.missing_slots().count()
    );
    Ok(join)
}
