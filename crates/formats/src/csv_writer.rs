//! Flat CSV outputs: the unified per-polygon table, the linked-incident
//! table and the name-variant report
//!
//! Distributions are written as compact JSON objects in a single cell.
//! Absent values are empty cells.

use crate::Result;
use geolink_core::diagnostics::VariantGroupReport;
use geolink_core::{LinkedIncident, UnifiedRow};
use std::collections::BTreeMap;
use std::io::Write;

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column order of the unified table
pub const UNIFIED_COLUMNS: &[&str] = &[
    "polygon_id",
    "name",
    "postal_code",
    "area_km2",
    "population",
    "households",
    "schooling_years",
    "pct_under_18",
    "pct_male",
    "pct_female",
    "margination",
    "total_incidents",
    "high_severity",
    "medium_severity",
    "low_severity",
    "weekend_incidents",
    "payday_incidents",
    "first_incident",
    "last_incident",
    "categories",
    "weekdays",
    "parts_of_day",
    "rate_per_1k",
    "high_severity_rate_per_1k",
    "severity_score",
    "density",
    "composite_risk_index",
];

pub const LINKED_INCIDENT_COLUMNS: &[&str] = &[
    "row",
    "raw_name",
    "canonical_name",
    "polygon_id",
    "polygon_name",
    "method",
    "corrected",
    "corrected_from",
];

pub const VARIANT_COLUMNS: &[&str] = &[
    "representative",
    "canonical",
    "variant_count",
    "variants",
    "total_frequency",
];

fn opt_f64(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn opt_str(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

pub(crate) fn distribution(counts: &BTreeMap<String, u64>) -> String {
    serde_json::to_string(counts).unwrap_or_default()
}

/// Cells of one unified row, in [`UNIFIED_COLUMNS`] order
pub fn unified_cells(row: &UnifiedRow) -> Vec<String> {
    let stats = &row.stats;
    let indices = &row.indices;
    vec![
        row.polygon_id.clone(),
        row.name.clone(),
        opt_str(row.postal_code.as_deref()),
        row.area_km2.to_string(),
        opt_f64(row.population),
        opt_f64(row.households),
        opt_f64(row.schooling_years),
        opt_f64(row.pct_under_18),
        opt_f64(row.pct_male),
        opt_f64(row.pct_female),
        opt_f64(row.margination),
        stats.total.to_string(),
        stats.high.to_string(),
        stats.medium.to_string(),
        stats.low.to_string(),
        stats.weekend.to_string(),
        stats.payday.to_string(),
        stats
            .first_seen
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default(),
        stats
            .last_seen
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default(),
        distribution(&stats.categories),
        distribution(&stats.weekdays),
        distribution(&stats.parts_of_day),
        opt_f64(indices.rate_per_1k),
        opt_f64(indices.high_severity_rate_per_1k),
        indices.severity_score.to_string(),
        opt_f64(indices.density),
        opt_f64(indices.composite_risk_index),
    ]
}

pub fn write_unified_csv<W: Write>(writer: W, rows: &[UnifiedRow]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(UNIFIED_COLUMNS)?;
    for row in rows {
        csv.write_record(unified_cells(row))?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_linked_incidents_csv<W: Write>(writer: W, incidents: &[LinkedIncident]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(LINKED_INCIDENT_COLUMNS)?;
    for incident in incidents {
        csv.write_record([
            incident.row.to_string(),
            opt_str(incident.raw_name.as_deref()),
            opt_str(incident.canonical_name.as_deref()),
            opt_str(incident.polygon_id.as_deref()),
            opt_str(incident.polygon_name.as_deref()),
            incident.method.to_string(),
            incident.corrected.to_string(),
            opt_str(incident.corrected_from.as_deref()),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Variants are joined with ` | `
pub fn write_variant_report_csv<W: Write>(writer: W, report: &[VariantGroupReport]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(VARIANT_COLUMNS)?;
    for group in report {
        csv.write_record([
            group.representative.clone(),
            group.canonical.clone(),
            group.variant_count.to_string(),
            group.variants.join(" | "),
            group.total_frequency.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::csv_reader::CsvReader;
    use geolink_core::{LinkMethod, PolygonIndices, PolygonStats};

    pub(crate) fn sample_row() -> UnifiedRow {
        let mut stats = PolygonStats {
            total: 3,
            high: 2,
            low: 1,
            ..Default::default()
        };
        stats.categories.insert("Robo".to_string(), 3);
        UnifiedRow {
            polygon_id: "001".to_string(),
            name: "Centro".to_string(),
            postal_code: Some("83000".to_string()),
            area_km2: 1.5,
            population: Some(1200.0),
            households: None,
            schooling_years: None,
            pct_under_18: None,
            pct_male: None,
            pct_female: None,
            margination: Some(0.4),
            stats,
            indices: PolygonIndices {
                rate_per_1k: Some(2.5),
                high_severity_rate_per_1k: Some(1.0),
                severity_score: 7.0 / 3.0,
                density: Some(800.0),
                composite_risk_index: None,
            },
        }
    }

    #[test]
    fn test_unified_csv() {
        let mut buffer = Vec::new();
        write_unified_csv(&mut buffer, &[sample_row()]).unwrap();

        let mut reader = CsvReader::new(buffer.as_slice()).unwrap();
        assert_eq!(reader.headers().len(), UNIFIED_COLUMNS.len());
        let record = reader.next().unwrap().unwrap();
        assert_eq!(record.text("polygon_id").as_deref(), Some("001"));
        assert_eq!(record.text("total_incidents").as_deref(), Some("3"));
        assert_eq!(record.text("categories").as_deref(), Some(r#"{"Robo":3}"#));
        assert_eq!(record.text("rate_per_1k").as_deref(), Some("2.5"));
        assert_eq!(record.text("households"), None);
        assert_eq!(record.text("composite_risk_index"), None);
    }

    #[test]
    fn test_linked_incidents_csv() {
        let incidents = vec![
            LinkedIncident {
                row: 2,
                raw_name: Some("PITIC".to_string()),
                canonical_name: Some("Pitic".to_string()),
                polygon_id: Some("003".to_string()),
                polygon_name: Some("Pitic".to_string()),
                method: LinkMethod::Exact,
                corrected: true,
                corrected_from: Some("001".to_string()),
            },
            LinkedIncident {
                row: 3,
                raw_name: None,
                canonical_name: None,
                polygon_id: None,
                polygon_name: None,
                method: LinkMethod::Unresolved,
                corrected: false,
                corrected_from: None,
            },
        ];
        let mut buffer = Vec::new();
        write_linked_incidents_csv(&mut buffer, &incidents).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], LINKED_INCIDENT_COLUMNS.join(","));
        assert_eq!(lines[1], "2,PITIC,Pitic,003,Pitic,exact,true,001");
        assert_eq!(lines[2], "3,,,,,unresolved,false,");
    }

    #[test]
    fn test_variant_report_csv() {
        let report = vec![VariantGroupReport {
            representative: "VILLA SATELITE".to_string(),
            canonical: "VILLA SATELITE".to_string(),
            variant_count: 2,
            variants: vec!["VILLA SATELITE".to_string(), "Villa Satélite".to_string()],
            total_frequency: 15,
        }];
        let mut buffer = Vec::new();
        write_variant_report_csv(&mut buffer, &report).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(
            text.contains("VILLA SATELITE,VILLA SATELITE,2,VILLA SATELITE | Villa Satélite,15")
        );
    }
}
