//! Spatial and nominal linkage engine
//!
//! Links incident and demographic records to neighborhood polygons through
//! an exact, buffered and name-based cascade, reconciles the links with name
//! evidence, and derives per-polygon statistics and risk indices.

pub mod aggregate;
pub mod canonical;
pub mod demographics;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod indices;
pub mod model;
pub mod observer;
pub mod pipeline;
pub mod polygons;
pub mod projection;
pub mod resolver;
pub mod spatial_index;
pub mod validator;

pub use aggregate::PolygonStats;
pub use canonical::CanonicalKeys;
pub use diagnostics::Diagnostics;
pub use error::{Error, Result};
pub use geometry::{Coord, MultiPolygon, Polygon, Ring};
pub use indices::{IndexWeights, PolygonIndices};
pub use model::{
    Assignment, DemographicPayload, IncidentPayload, LinkMethod, PointRecord, PolygonAttributes,
    PolygonRecord, Severity,
};
pub use observer::{RunObserver, SilentObserver, Stage};
pub use pipeline::{
    LinkageInputs, LinkageOutput, LinkagePipeline, LinkageStats, LinkedIncident, PipelineBuilder,
    PipelineConfig, UnifiedRow,
};
pub use polygons::PolygonSet;
pub use resolver::{ResolverConfig, DEFAULT_BUFFER_METERS};
