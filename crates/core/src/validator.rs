//! Reconciles spatial assignments with name evidence
//!
//! A resolved record whose canonical key differs from its polygon's key is
//! moved to the first polygon carrying that key, if any. The cascade method is
//! kept and the previous slot is remembered. Without a name match the spatial
//! assignment stands.

use crate::canonical::{CanonicalKeys, PolygonNames};
use crate::model::{Assignment, PointRecord};
use crate::observer::{RunObserver, Stage, PROGRESS_INTERVAL};
use crate::polygons::PolygonSet;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// A reassignment made by the validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correction {
    pub record: usize,
    pub from: usize,
    pub to: usize,
}

/// Validated assignments plus what the validator did to them
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub assignments: Vec<Assignment>,
    pub corrections: Vec<Correction>,
    /// Resolved records whose key already matched their polygon, or that
    /// carry no name to compare
    pub confirmed: usize,
    /// Mismatched records kept on their spatial polygon
    pub kept_spatial: usize,
}

pub struct Validator<'a> {
    polygons: &'a PolygonSet,
    keys: CanonicalKeys,
    names: PolygonNames,
}

impl<'a> Validator<'a> {
    pub fn new(polygons: &'a PolygonSet, keys: CanonicalKeys) -> Self {
        let names = PolygonNames::new(polygons, &keys);
        Self {
            polygons,
            keys,
            names,
        }
    }

    pub fn validate<P>(
        &self,
        points: &[PointRecord<P>],
        assignments: Vec<Assignment>,
        observer: &mut dyn RunObserver,
    ) -> ValidationOutcome {
        observer.stage_started(Stage::Validation, assignments.len());

        let mut key_cache: HashMap<&str, String> = HashMap::new();
        let mut corrections = Vec::new();
        let mut confirmed = 0;
        let mut kept_spatial = 0;

        let mut validated = Vec::with_capacity(assignments.len());
        for (done, assignment) in assignments.into_iter().enumerate() {
            if done > 0 && done % PROGRESS_INTERVAL == 0 {
                observer.stage_progress(Stage::Validation, done);
            }

            let Some(current) = assignment.polygon else {
                validated.push(assignment);
                continue;
            };

            let raw = points[assignment.record].raw_name();
            let key = key_cache.entry(raw).or_insert_with(|| self.keys.key(raw));

            if key.is_empty() || key.as_str() == self.names.key(current) {
                confirmed += 1;
                validated.push(assignment);
            } else if let Some(&target) = self.names.slots_with_key(key).first() {
                debug!(
                    "Record {} moved from '{}' to '{}' by name '{}'",
                    points[assignment.record].row,
                    self.polygons.get(current).id,
                    self.polygons.get(target).id,
                    key
                );
                corrections.push(Correction {
                    record: assignment.record,
                    from: current,
                    to: target,
                });
                validated.push(Assignment {
                    polygon: Some(target),
                    corrected_from: Some(current),
                    ..assignment
                });
            } else {
                kept_spatial += 1;
                validated.push(assignment);
            }
        }

        info!(
            "Validation: {} confirmed, {} corrected, {} kept on spatial evidence",
            confirmed,
            corrections.len(),
            kept_spatial
        );
        observer.stage_finished(Stage::Validation, corrections.len());

        ValidationOutcome {
            assignments: validated,
            corrections,
            confirmed,
            kept_spatial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coord;
    use crate::model::{IncidentPayload, LinkMethod};
    use crate::observer::tests::RecordingObserver;
    use crate::observer::SilentObserver;
    use crate::polygons::tests::square_polygon;
    use geolink_names::NameMapping;

    fn polygons() -> PolygonSet {
        PolygonSet::new(vec![
            square_polygon("P1", "Centro", -110.96, 29.08, 0.01),
            square_polygon("P2", "Las Quintas", -110.95, 29.08, 0.01),
            square_polygon("P3", "Pitic", -110.90, 29.00, 0.01),
        ])
        .unwrap()
    }

    fn point(row: usize, name: &str) -> PointRecord {
        PointRecord::new(
            row,
            Some(name.to_string()),
            Some(Coord::lon_lat(-110.955, 29.085)),
            IncidentPayload::default(),
        )
    }

    #[test]
    fn test_mismatch_with_named_polygon_is_corrected() {
        let set = polygons();
        let mapping = NameMapping::new();
        let validator = Validator::new(&set, CanonicalKeys::new(&mapping));
        let p1 = set.slot_of("P1").unwrap();
        let p3 = set.slot_of("P3").unwrap();
        let points = vec![point(0, "PITIC")];

        let outcome = validator.validate(
            &points,
            vec![Assignment::linked(0, p1, LinkMethod::Exact)],
            &mut SilentObserver,
        );
        let assignment = outcome.assignments[0];
        assert_eq!(assignment.polygon, Some(p3));
        assert_eq!(assignment.corrected_from, Some(p1));
        assert_eq!(assignment.method, LinkMethod::Exact);
        assert_eq!(outcome.corrections, vec![Correction { record: 0, from: p1, to: p3 }]);
    }

    #[test]
    fn test_mismatch_without_named_polygon_keeps_spatial() {
        let set = polygons();
        let mapping = NameMapping::new();
        let validator = Validator::new(&set, CanonicalKeys::new(&mapping));
        let p1 = set.slot_of("P1").unwrap();
        let points = vec![point(0, "Villa de Seris")];

        let outcome = validator.validate(
            &points,
            vec![Assignment::linked(0, p1, LinkMethod::Buffered)],
            &mut SilentObserver,
        );
        assert_eq!(outcome.assignments[0].polygon, Some(p1));
        assert!(!outcome.assignments[0].is_corrected());
        assert_eq!(outcome.kept_spatial, 1);
    }

    #[test]
    fn test_matching_key_through_mapping_is_confirmed() {
        let set = polygons();
        let mapping = NameMapping::from_pairs([("CENTRO HISTORICO", "Centro")]);
        let validator = Validator::new(&set, CanonicalKeys::new(&mapping));
        let p1 = set.slot_of("P1").unwrap();
        let points = vec![point(0, "CENTRO HISTORICO"), point(1, "  centro ")];

        let outcome = validator.validate(
            &points,
            vec![
                Assignment::linked(0, p1, LinkMethod::Exact),
                Assignment::linked(1, p1, LinkMethod::Exact),
            ],
            &mut SilentObserver,
        );
        assert_eq!(outcome.confirmed, 2);
        assert!(outcome.corrections.is_empty());
    }

    #[test]
    fn test_unresolved_and_unnamed_records_pass_through() {
        let set = polygons();
        let mapping = NameMapping::new();
        let validator = Validator::new(&set, CanonicalKeys::new(&mapping));
        let p2 = set.slot_of("P2").unwrap();
        let mut unnamed = point(1, "");
        unnamed.raw_name = None;
        let points = vec![point(0, "Pitic"), unnamed];

        let outcome = validator.validate(
            &points,
            vec![Assignment::unresolved(0), Assignment::linked(1, p2, LinkMethod::Exact)],
            &mut SilentObserver,
        );
        assert_eq!(outcome.assignments[0], Assignment::unresolved(0));
        assert_eq!(outcome.assignments[1].polygon, Some(p2));
        assert!(outcome.corrections.is_empty());
    }

    #[test]
    fn test_link_confirmed_by_folded_polygon_name_is_kept() {
        let set = PolygonSet::new(vec![
            square_polygon("P1", "Villa Satelite", -110.96, 29.08, 0.01),
            square_polygon("P2", "Villa Satelites", -110.95, 29.08, 0.01),
        ])
        .unwrap();
        let mapping = NameMapping::from_pairs([
            ("VILLA SATELITE", "VILLA SATELITE"),
            ("Villa Satelites", "VILLA SATELITE"),
        ]);
        let validator = Validator::new(&set, CanonicalKeys::new(&mapping));
        let p2 = set.slot_of("P2").unwrap();
        let points = vec![point(0, "Villa Satelites")];

        let outcome = validator.validate(
            &points,
            vec![Assignment::linked(0, p2, LinkMethod::Exact)],
            &mut SilentObserver,
        );
        assert_eq!(outcome.assignments[0].polygon, Some(p2));
        assert!(!outcome.assignments[0].is_corrected());
        assert!(outcome.corrections.is_empty());
        assert_eq!(outcome.confirmed, 1);
    }

    #[test]
    fn test_progress_counts_unresolved_records() {
        let set = polygons();
        let mapping = NameMapping::new();
        let validator = Validator::new(&set, CanonicalKeys::new(&mapping));
        let points: Vec<PointRecord> = (0..2500).map(|row| point(row, "Centro")).collect();
        let assignments = (0..points.len()).map(Assignment::unresolved).collect();

        let mut observer = RecordingObserver::default();
        let outcome = validator.validate(&points, assignments, &mut observer);
        assert_eq!(outcome.assignments.len(), 2500);
        assert_eq!(observer.progress_events, 2);
        assert_eq!(observer.started, vec![(Stage::Validation, 2500)]);
    }
}
