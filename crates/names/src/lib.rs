//! Place-name cleaning and variant grouping
//!
//! This crate turns free-text neighborhood names into comparable keys and
//! clusters spelling variants under one canonical name.

pub mod error;
pub mod grouping;
pub mod lexicon;
pub mod mapping;
pub mod normalize;
pub mod rules;
pub mod similarity;

pub use error::{Error, Result};
pub use grouping::{CanonicalNameGroup, Grouping, GroupingConfig, NameGrouper, RawNameRecord};
pub use lexicon::Lexicon;
pub use mapping::NameMapping;
pub use normalize::TextNormalizer;
pub use similarity::SimilarityMetric;
