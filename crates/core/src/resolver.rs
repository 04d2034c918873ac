//! Cascading point-to-polygon resolution
//!
//! Three steps, each applied only to the records still unresolved:
//!
//! 1. exact containment of the lon/lat point
//! 2. containment in the polygon grown by the buffer distance, measured in
//!    the polygon's local metric frame
//! 3. equality of the record's canonical name key with a polygon name key
//!    (also the only chance for records without coordinates)
//!
//! Ties are broken deterministically and logged as warnings.

use crate::canonical::{CanonicalKeys, PolygonNames};
use crate::model::{Assignment, LinkMethod, PointRecord};
use crate::observer::{RunObserver, Stage, PROGRESS_INTERVAL};
use crate::polygons::PolygonSet;
use crate::{Error, Result};
use geolink_names::NameMapping;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Default buffer distance in metres
pub const DEFAULT_BUFFER_METERS: f64 = 500.0;

/// Buffered distances closer than this count as a tie
const DISTANCE_TIE_METERS: f64 = 1e-3;

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Buffer distance for step 2; zero skips the step
    pub buffer_meters: f64,
    /// Run the name-equality step
    pub name_fallback: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            buffer_meters: DEFAULT_BUFFER_METERS,
            name_fallback: true,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.buffer_meters.is_finite() || self.buffer_meters < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "buffer distance must be a non-negative number of metres, got {}",
                self.buffer_meters
            )));
        }
        Ok(())
    }
}

/// Outcome of one cascade step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeStep {
    pub method: LinkMethod,
    /// Unresolved records the step looked at
    pub attempted: usize,
    pub resolved: usize,
    /// Unresolved records left after the step
    pub unresolved_after: usize,
}

/// Assignments for every record plus per-step accounting
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// One entry per input record, in input order
    pub assignments: Vec<Assignment>,
    pub steps: Vec<CascadeStep>,
    /// Matches where several polygons tied
    pub ambiguous: usize,
}

impl Resolution {
    pub fn unresolved_count(&self) -> usize {
        self.assignments.iter().filter(|a| !a.is_resolved()).count()
    }

    pub fn count(&self, method: LinkMethod) -> usize {
        self.assignments.iter().filter(|a| a.method == method).count()
    }
}

/// Cascading resolver over a polygon set
pub struct Resolver<'a> {
    polygons: &'a PolygonSet,
    keys: CanonicalKeys,
    names: PolygonNames,
    config: ResolverConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(
        polygons: &'a PolygonSet,
        mapping: &NameMapping,
        config: ResolverConfig,
    ) -> Result<Self> {
        config.validate()?;
        let keys = CanonicalKeys::new(mapping);
        let names = PolygonNames::new(polygons, &keys);
        Ok(Self {
            polygons,
            keys,
            names,
            config,
        })
    }

    /// Resolve every record
    pub fn resolve<P>(
        &self,
        points: &[PointRecord<P>],
        observer: &mut dyn RunObserver,
    ) -> Resolution {
        let mut assignments: Vec<Assignment> =
            (0..points.len()).map(Assignment::unresolved).collect();
        let mut steps = Vec::with_capacity(3);
        let mut ambiguous = 0;

        info!(
            "Resolving {} records against {} polygons",
            points.len(),
            self.polygons.len()
        );

        steps.push(self.exact_step(points, &mut assignments, &mut ambiguous, observer));

        if self.config.buffer_meters > 0.0 {
            steps.push(self.buffered_step(points, &mut assignments, &mut ambiguous, observer));
        }

        if self.config.name_fallback {
            steps.push(self.name_step(points, &mut assignments, &mut ambiguous, observer));
        }

        for step in &steps {
            info!(
                "  {}: {} of {} linked, {} left",
                step.method, step.resolved, step.attempted, step.unresolved_after
            );
        }

        Resolution {
            assignments,
            steps,
            ambiguous,
        }
    }

    fn exact_step<P>(
        &self,
        points: &[PointRecord<P>],
        assignments: &mut [Assignment],
        ambiguous: &mut usize,
        observer: &mut dyn RunObserver,
    ) -> CascadeStep {
        let pending = pending_with_location(points, assignments);
        observer.stage_started(Stage::ExactContainment, pending.len());

        let mut resolved = 0;
        for (done, &i) in pending.iter().enumerate() {
            if let Some(location) = points[i].location {
                let hits = self.polygons.containing(&location);
                if let Some(&first) = hits.first() {
                    if hits.len() > 1 {
                        *ambiguous += 1;
                        warn!(
                            "Record {} lies in {} polygons; using '{}'",
                            points[i].row,
                            hits.len(),
                            self.polygons.get(first).id
                        );
                    }
                    assignments[i] = Assignment::linked(i, first, LinkMethod::Exact);
                    resolved += 1;
                }
            }
            report_progress(observer, Stage::ExactContainment, done);
        }

        observer.stage_finished(Stage::ExactContainment, resolved);
        self.step(LinkMethod::Exact, pending.len(), resolved, assignments)
    }

    fn buffered_step<P>(
        &self,
        points: &[PointRecord<P>],
        assignments: &mut [Assignment],
        ambiguous: &mut usize,
        observer: &mut dyn RunObserver,
    ) -> CascadeStep {
        let pending = pending_with_location(points, assignments);
        observer.stage_started(Stage::BufferedContainment, pending.len());

        let mut resolved = 0;
        for (done, &i) in pending.iter().enumerate() {
            if let Some(location) = points[i].location {
                let hits = self
                    .polygons
                    .within_distance(&location, self.config.buffer_meters);
                if let Some(&(nearest, distance)) = hits.first() {
                    let tied: Vec<usize> = hits
                        .iter()
                        .take_while(|&&(_, d)| d - distance <= DISTANCE_TIE_METERS)
                        .map(|&(slot, _)| slot)
                        .collect();
                    let slot = tied.iter().copied().min().unwrap_or(nearest);
                    if tied.len() > 1 {
                        *ambiguous += 1;
                        warn!(
                            "Record {} is {:.1} m from several polygons; using '{}'",
                            points[i].row,
                            distance,
                            self.polygons.get(slot).id
                        );
                    }
                    debug!(
                        "Record {} linked to '{}' at {:.1} m",
                        points[i].row,
                        self.polygons.get(slot).id,
                        distance
                    );
                    assignments[i] = Assignment::linked(i, slot, LinkMethod::Buffered);
                    resolved += 1;
                }
            }
            report_progress(observer, Stage::BufferedContainment, done);
        }

        observer.stage_finished(Stage::BufferedContainment, resolved);
        self.step(LinkMethod::Buffered, pending.len(), resolved, assignments)
    }

    fn name_step<P>(
        &self,
        points: &[PointRecord<P>],
        assignments: &mut [Assignment],
        ambiguous: &mut usize,
        observer: &mut dyn RunObserver,
    ) -> CascadeStep {
        let pending: Vec<usize> = (0..points.len())
            .filter(|&i| !assignments[i].is_resolved())
            .collect();
        observer.stage_started(Stage::NameFallback, pending.len());

        let mut key_cache: HashMap<&str, String> = HashMap::new();
        let mut resolved = 0;
        for (done, &i) in pending.iter().enumerate() {
            let raw = points[i].raw_name();
            let key = key_cache.entry(raw).or_insert_with(|| self.keys.key(raw));
            if !key.is_empty() {
                let slots = self.names.slots_with_key(key);
                if let Some(&first) = slots.first() {
                    if slots.len() > 1 {
                        *ambiguous += 1;
                        warn!(
                            "Name '{}' matches {} polygons; using '{}'",
                            key,
                            slots.len(),
                            self.polygons.get(first).id
                        );
                    }
                    assignments[i] = Assignment::linked(i, first, LinkMethod::NameFallback);
                    resolved += 1;
                }
            }
            report_progress(observer, Stage::NameFallback, done);
        }

        observer.stage_finished(Stage::NameFallback, resolved);
        self.step(LinkMethod::NameFallback, pending.len(), resolved, assignments)
    }

    fn step(
        &self,
        method: LinkMethod,
        attempted: usize,
        resolved: usize,
        assignments: &[Assignment],
    ) -> CascadeStep {
        CascadeStep {
            method,
            attempted,
            resolved,
            unresolved_after: assignments.iter().filter(|a| !a.is_resolved()).count(),
        }
    }
}

fn pending_with_location<P>(
    points: &[PointRecord<P>],
    assignments: &[Assignment],
) -> Vec<usize> {
    (0..points.len())
        .filter(|&i| !assignments[i].is_resolved() && points[i].location.is_some())
        .collect()
}

fn report_progress(observer: &mut dyn RunObserver, stage: Stage, done: usize) {
    if (done + 1) % PROGRESS_INTERVAL == 0 {
        observer.stage_progress(stage, done + 1);
    }
}
