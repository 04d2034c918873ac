//! Records flowing through the linkage engine

use crate::geometry::{Coord, MultiPolygon};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Optional attributes carried by a polygon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolygonAttributes {
    /// Area in km²; computed from the geometry when absent
    pub area_km2: Option<f64>,
    /// Population recorded on the boundary file itself
    pub population: Option<f64>,
    /// Margination score
    pub margination: Option<f64>,
    pub postal_code: Option<String>,
}

/// A canonical neighborhood boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonRecord {
    /// Administrative key
    pub id: String,
    pub name: String,
    pub geometry: MultiPolygon,
    #[serde(default)]
    pub attributes: PolygonAttributes,
}

impl PolygonRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, geometry: MultiPolygon) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            geometry,
            attributes: PolygonAttributes::default(),
        }
    }

    pub fn with_attributes(mut self, attributes: PolygonAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Incident severity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Parse a tier label in English or Spanish, any case
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "HIGH" | "ALTA" | "ALTO" | "H" | "3" => Some(Severity::High),
            "MEDIUM" | "MEDIA" | "MEDIO" | "M" | "2" => Some(Severity::Medium),
            "LOW" | "BAJA" | "BAJO" | "L" | "1" => Some(Severity::Low),
            _ => None,
        }
    }

    /// Weight used by the severity score
    pub fn weight(&self) -> u64 {
        match self {
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

/// Attributes of one incident report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentPayload {
    pub timestamp: Option<NaiveDateTime>,
    pub severity: Option<Severity>,
    pub category: Option<String>,
    pub part_of_day: Option<String>,
    /// Day-of-week label; derived from the timestamp when absent
    pub weekday: Option<String>,
    pub weekend: bool,
    pub payday: bool,
}

/// Attributes of one demographic record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemographicPayload {
    /// Administrative key, when the source carries one
    pub polygon_key: Option<String>,
    pub population: Option<f64>,
    pub households: Option<f64>,
    pub schooling_years: Option<f64>,
    pub pct_under_18: Option<f64>,
    pub pct_male: Option<f64>,
    pub pct_female: Option<f64>,
    pub margination: Option<f64>,
}

/// A record to be linked to a polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord<P = IncidentPayload> {
    /// Position in the source table
    pub row: usize,
    pub raw_name: Option<String>,
    /// Longitude/latitude, when geocoded
    pub location: Option<Coord>,
    pub payload: P,
}

impl<P> PointRecord<P> {
    pub fn new(row: usize, raw_name: Option<String>, location: Option<Coord>, payload: P) -> Self {
        Self {
            row,
            raw_name,
            location,
            payload,
        }
    }

    pub fn raw_name(&self) -> &str {
        self.raw_name.as_deref().unwrap_or("")
    }
}

/// How a record was linked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMethod {
    /// Joined on the administrative key carried by the record
    Key,
    Exact,
    Buffered,
    NameFallback,
    Unresolved,
}

impl LinkMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkMethod::Key => "key",
            LinkMethod::Exact => "exact",
            LinkMethod::Buffered => "buffered",
            LinkMethod::NameFallback => "name_fallback",
            LinkMethod::Unresolved => "unresolved",
        }
    }
}

impl std::fmt::Display for LinkMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link between a record and a polygon slot of a [`crate::polygons::PolygonSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Index of the record in its input slice
    pub record: usize,
    /// Polygon slot; `None` while unresolved
    pub polygon: Option<usize>,
    pub method: LinkMethod,
    /// Slot chosen by the cascade before the validator reassigned it
    pub corrected_from: Option<usize>,
}

impl Assignment {
    pub fn unresolved(record: usize) -> Self {
        Self {
            record,
            polygon: None,
            method: LinkMethod::Unresolved,
            corrected_from: None,
        }
    }

    pub fn linked(record: usize, polygon: usize, method: LinkMethod) -> Self {
        Self {
            record,
            polygon: Some(polygon),
            method,
            corrected_from: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.polygon.is_some()
    }

    pub fn is_corrected(&self) -> bool {
        self.corrected_from.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("ALTA"), Some(Severity::High));
        assert_eq!(Severity::parse(" media "), Some(Severity::Medium));
        assert_eq!(Severity::parse("Low"), Some(Severity::Low));
        assert_eq!(Severity::parse("n/a"), None);
        assert_eq!(Severity::High.weight(), 3);
    }

    #[test]
    fn test_assignment_states() {
        let unresolved = Assignment::unresolved(4);
        assert!(!unresolved.is_resolved());
        assert_eq!(unresolved.method, LinkMethod::Unresolved);

        let linked = Assignment::linked(4, 2, LinkMethod::Buffered);
        assert!(linked.is_resolved());
        assert!(!linked.is_corrected());
    }

    #[test]
    fn test_link_method_serde() {
        let json = serde_json::to_string(&LinkMethod::NameFallback).unwrap();
        assert_eq!(json, "\"name_fallback\"");
        assert_eq!(LinkMethod::Exact.to_string(), "exact");
    }

    #[test]
    fn test_point_raw_name_default() {
        let point: PointRecord = PointRecord::new(0, None, None, IncidentPayload::default());
        assert_eq!(point.raw_name(), "");
    }
}
