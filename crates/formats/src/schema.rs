//! Binds input tables to the linkage model
//!
//! Each logical field is looked up by an explicit override first, then by a
//! list of known column names (exact, then case-insensitive). Required fields
//! missing from a table and unparseable geometry, coordinates or numbers are
//! schema errors. Unparseable timestamps and unknown severity labels only
//! drop that value.

use crate::reader::read_table;
use crate::wkt::parse_wkt;
use crate::{Error, Record, Result};
use chrono::{NaiveDate, NaiveDateTime};
use geolink_core::{
    Coord, DemographicPayload, IncidentPayload, PointRecord, PolygonAttributes, PolygonRecord,
    Severity,
};
use geolink_names::RawNameRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, warn};

const POLYGON_ID: &[&str] = &["CVE_COL", "cve_col", "polygon_id", "id"];
const POLYGON_NAME: &[&str] = &["COLONIA", "nom_col", "nombre", "name"];
const POLYGON_GEOMETRY: &[&str] = &["POLIGONO_WKT", "geometry", "wkt", "geom"];
const POLYGON_AREA: &[&str] = &["area_km2", "AREA_KM2"];
const POLYGON_POPULATION: &[&str] = &["POBTOT", "poblacion_total", "population"];
const MARGINATION: &[&str] = &["IM_2020", "indice_marginacion", "margination"];
const POSTAL_CODE: &[&str] = &["CP", "cp", "codigo_postal", "postal_code"];

const POINT_NAME: &[&str] = &["COLONIA", "colonia", "nom_col", "name"];
const LATITUDE: &[&str] = &["LATITUD", "latitud", "lat", "latitude"];
const LONGITUDE: &[&str] = &["LONGITUD", "longitud", "lon", "lng", "longitude"];
const TIMESTAMP: &[&str] = &["Timestamp", "FECHA", "fecha", "timestamp"];
const SEVERITY: &[&str] = &["Nivel_Severidad", "severidad", "severity"];
const CATEGORY: &[&str] = &["Categoria_Incidente", "categoria", "category"];
const PART_OF_DAY: &[&str] = &["ParteDelDia", "parte_del_dia", "part_of_day"];
const WEEKDAY: &[&str] = &["DiaDeLaSemana", "dia_semana", "weekday"];
const WEEKEND: &[&str] = &["EsFinDeSemana", "fin_de_semana", "weekend"];
const PAYDAY: &[&str] = &["EsQuincena", "quincena", "payday"];

const DEMOGRAPHIC_KEY: &[&str] = &["cve_col", "CVE_COL", "polygon_id"];
const DEMOGRAPHIC_NAME: &[&str] = &["nom_col", "COLONIA", "colonia", "name"];
const HOUSEHOLDS: &[&str] = &["viviendas_totales", "VIVTOT", "households"];
const SCHOOLING: &[&str] = &[
    "escolaridad_años_prom",
    "escolaridad_anos_prom",
    "GRAPROES",
    "schooling_years",
];
const PCT_UNDER_18: &[&str] = &["pctj_menores18", "pct_under_18"];
const PCT_MALE: &[&str] = &["pctj_hombres", "pct_male"];
const PCT_FEMALE: &[&str] = &["pctj_mujeres", "pct_female"];

/// Cell values read as missing numbers
const NULL_MARKERS: &[&str] = &["nan", "null", "none", "na", "n/a"];

/// Timestamp layouts tried in order
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Column overrides for the polygon table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolygonColumns {
    pub id: Option<String>,
    pub name: Option<String>,
    pub geometry: Option<String>,
    pub area_km2: Option<String>,
    pub population: Option<String>,
    pub margination: Option<String>,
    pub postal_code: Option<String>,
}

/// Column overrides for the incident table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentColumns {
    pub name: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub timestamp: Option<String>,
    pub severity: Option<String>,
    pub category: Option<String>,
    pub part_of_day: Option<String>,
    pub weekday: Option<String>,
    pub weekend: Option<String>,
    pub payday: Option<String>,
}

/// Column overrides for the demographic table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemographicColumns {
    pub key: Option<String>,
    pub name: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub population: Option<String>,
    pub households: Option<String>,
    pub schooling_years: Option<String>,
    pub pct_under_18: Option<String>,
    pub pct_male: Option<String>,
    pub pct_female: Option<String>,
    pub margination: Option<String>,
}

/// Column overrides for every table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnOverrides {
    pub polygons: PolygonColumns,
    pub incidents: IncidentColumns,
    pub demographics: DemographicColumns,
}

/// Resolves logical fields to the columns of one table
struct ColumnBinder {
    table: &'static str,
    columns: BTreeSet<String>,
}

impl ColumnBinder {
    fn new(table: &'static str, records: &[Record]) -> Self {
        let columns = records.iter().flat_map(Record::columns).collect();
        Self { table, columns }
    }

    fn find(
        &self,
        field: &'static str,
        configured: Option<&String>,
        aliases: &[&str],
    ) -> Result<Option<String>> {
        if let Some(name) = configured {
            return if self.columns.contains(name) {
                Ok(Some(name.clone()))
            } else {
                Err(self.missing(field, &[name.as_str()]))
            };
        }
        if let Some(exact) = aliases.iter().find(|a| self.columns.contains(**a)) {
            return Ok(Some(exact.to_string()));
        }
        Ok(aliases.iter().find_map(|alias| {
            self.columns
                .iter()
                .find(|c| c.eq_ignore_ascii_case(alias))
                .cloned()
        }))
    }

    fn require(
        &self,
        field: &'static str,
        configured: Option<&String>,
        aliases: &[&str],
    ) -> Result<String> {
        let candidates: Vec<&str> = match configured {
            Some(name) => vec![name.as_str()],
            None => aliases.to_vec(),
        };
        self.find(field, configured, aliases)?
            .ok_or_else(|| self.missing(field, &candidates))
    }

    fn missing(&self, field: &'static str, candidates: &[&str]) -> Error {
        Error::MissingColumn {
            table: self.table,
            field,
            candidates: candidates.join(", "),
        }
    }
}

fn schema_error(table: &'static str, record: &Record, message: String) -> Error {
    Error::Schema {
        table,
        line: record.source_line,
        message,
    }
}

/// Numeric cell; blank and null markers are `None`
fn number(table: &'static str, record: &Record, column: Option<&str>) -> Result<Option<f64>> {
    let Some(column) = column else { return Ok(None) };
    match record.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || NULL_MARKERS.contains(&trimmed.to_lowercase().as_str()) {
                return Ok(None);
            }
            trimmed.parse::<f64>().map(Some).map_err(|_| {
                schema_error(
                    table,
                    record,
                    format!("'{}' in column {} is not a number", trimmed, column),
                )
            })
        }
        Some(other) => Err(schema_error(
            table,
            record,
            format!("{} in column {} is not a number", other, column),
        )),
    }
}

/// Yes/no flag; `Sí`, `si`, `yes`, `true`, `1` and JSON `true` are yes
fn flag(record: &Record, column: Option<&str>) -> bool {
    let Some(value) = column.and_then(|c| record.get(c)) else {
        return false;
    };
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "sí" | "si" | "s" | "yes" | "y" | "true" | "1" | "verdadero"
        ),
        _ => false,
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn timestamp(record: &Record, column: Option<&str>) -> Option<NaiveDateTime> {
    let text = record.text(column?)?;
    let parsed = parse_timestamp(&text);
    if parsed.is_none() {
        warn!("Line {}: unrecognised timestamp '{}'", record.source_line, text);
    }
    parsed
}

fn location(
    table: &'static str,
    record: &Record,
    latitude: Option<&str>,
    longitude: Option<&str>,
) -> Result<Option<Coord>> {
    let lat = number(table, record, latitude)?;
    let lon = number(table, record, longitude)?;
    match (lon, lat) {
        (Some(lon), Some(lat)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                return Err(schema_error(
                    table,
                    record,
                    format!("coordinates ({}, {}) are out of range", lat, lon),
                ));
            }
            Ok(Some(Coord::lon_lat(lon, lat)))
        }
        (None, None) => Ok(None),
        _ => {
            debug!("Line {}: only one coordinate present, treating as missing", record.source_line);
            Ok(None)
        }
    }
}

/// Bind polygon rows
pub fn bind_polygons(records: &[Record], columns: &PolygonColumns) -> Result<Vec<PolygonRecord>> {
    const TABLE: &str = "polygon";
    let binder = ColumnBinder::new(TABLE, records);
    let id = binder.require("id", columns.id.as_ref(), POLYGON_ID)?;
    let name = binder.require("name", columns.name.as_ref(), POLYGON_NAME)?;
    let geometry = binder.require("geometry", columns.geometry.as_ref(), POLYGON_GEOMETRY)?;
    let area = binder.find("area_km2", columns.area_km2.as_ref(), POLYGON_AREA)?;
    let population = binder.find("population", columns.population.as_ref(), POLYGON_POPULATION)?;
    let margination = binder.find("margination", columns.margination.as_ref(), MARGINATION)?;
    let postal_code = binder.find("postal_code", columns.postal_code.as_ref(), POSTAL_CODE)?;

    records
        .iter()
        .map(|record| -> Result<PolygonRecord> {
            let wkt = record
                .text(&geometry)
                .ok_or_else(|| schema_error(TABLE, record, "empty geometry".to_string()))?;
            let shape = parse_wkt(&wkt).map_err(|e| schema_error(TABLE, record, e.to_string()))?;
            let attributes = PolygonAttributes {
                area_km2: number(TABLE, record, area.as_deref())?,
                population: number(TABLE, record, population.as_deref())?,
                margination: number(TABLE, record, margination.as_deref())?,
                postal_code: postal_code.as_deref().and_then(|c| record.text(c)),
            };
            Ok(PolygonRecord::new(
                record.text(&id).unwrap_or_default(),
                record.text(&name).unwrap_or_default(),
                shape,
            )
            .with_attributes(attributes))
        })
        .collect()
}

/// Bind incident rows
pub fn bind_incidents(
    records: &[Record],
    columns: &IncidentColumns,
) -> Result<Vec<PointRecord<IncidentPayload>>> {
    const TABLE: &str = "incident";
    let binder = ColumnBinder::new(TABLE, records);
    let name = binder.require("name", columns.name.as_ref(), POINT_NAME)?;
    let latitude = binder.find("latitude", columns.latitude.as_ref(), LATITUDE)?;
    let longitude = binder.find("longitude", columns.longitude.as_ref(), LONGITUDE)?;
    let ts = binder.find("timestamp", columns.timestamp.as_ref(), TIMESTAMP)?;
    let severity = binder.find("severity", columns.severity.as_ref(), SEVERITY)?;
    let category = binder.find("category", columns.category.as_ref(), CATEGORY)?;
    let part_of_day = binder.find("part_of_day", columns.part_of_day.as_ref(), PART_OF_DAY)?;
    let weekday = binder.find("weekday", columns.weekday.as_ref(), WEEKDAY)?;
    let weekend = binder.find("weekend", columns.weekend.as_ref(), WEEKEND)?;
    let payday = binder.find("payday", columns.payday.as_ref(), PAYDAY)?;

    if latitude.is_none() || longitude.is_none() {
        warn!("Incident table has no coordinate columns; linking by name only");
    }

    let mut unknown_severity: BTreeMap<String, usize> = BTreeMap::new();
    let points = records
        .iter()
        .map(|record| -> Result<PointRecord<IncidentPayload>> {
            let severity = severity.as_deref().and_then(|c| record.text(c)).and_then(|label| {
                let parsed = Severity::parse(&label);
                if parsed.is_none() {
                    *unknown_severity.entry(label).or_default() += 1;
                }
                parsed
            });
            let payload = IncidentPayload {
                timestamp: timestamp(record, ts.as_deref()),
                severity,
                category: category.as_deref().and_then(|c| record.text(c)),
                part_of_day: part_of_day.as_deref().and_then(|c| record.text(c)),
                weekday: weekday.as_deref().and_then(|c| record.text(c)),
                weekend: flag(record, weekend.as_deref()),
                payday: flag(record, payday.as_deref()),
            };
            Ok(PointRecord::new(
                record.source_line,
                record.raw_text(&name),
                location(TABLE, record, latitude.as_deref(), longitude.as_deref())?,
                payload,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    for (label, count) in &unknown_severity {
        warn!("Unknown severity label '{}' on {} incidents", label, count);
    }
    Ok(points)
}

/// Bind demographic rows
pub fn bind_demographics(
    records: &[Record],
    columns: &DemographicColumns,
) -> Result<Vec<PointRecord<DemographicPayload>>> {
    const TABLE: &str = "demographic";
    let binder = ColumnBinder::new(TABLE, records);
    let key = binder.find("key", columns.key.as_ref(), DEMOGRAPHIC_KEY)?;
    let name = binder.find("name", columns.name.as_ref(), DEMOGRAPHIC_NAME)?;
    if key.is_none() && name.is_none() && !records.is_empty() {
        return Err(binder.missing("key or name", &[DEMOGRAPHIC_KEY, DEMOGRAPHIC_NAME].concat()));
    }
    let latitude = binder.find("latitude", columns.latitude.as_ref(), LATITUDE)?;
    let longitude = binder.find("longitude", columns.longitude.as_ref(), LONGITUDE)?;
    let population = binder.find("population", columns.population.as_ref(), POLYGON_POPULATION)?;
    let households = binder.find("households", columns.households.as_ref(), HOUSEHOLDS)?;
    let schooling = binder.find("schooling_years", columns.schooling_years.as_ref(), SCHOOLING)?;
    let under_18 = binder.find("pct_under_18", columns.pct_under_18.as_ref(), PCT_UNDER_18)?;
    let male = binder.find("pct_male", columns.pct_male.as_ref(), PCT_MALE)?;
    let female = binder.find("pct_female", columns.pct_female.as_ref(), PCT_FEMALE)?;
    let margination = binder.find("margination", columns.margination.as_ref(), MARGINATION)?;

    records
        .iter()
        .map(|record| -> Result<PointRecord<DemographicPayload>> {
            let payload = DemographicPayload {
                polygon_key: key.as_deref().and_then(|c| record.text(c)),
                population: number(TABLE, record, population.as_deref())?,
                households: number(TABLE, record, households.as_deref())?,
                schooling_years: number(TABLE, record, schooling.as_deref())?,
                pct_under_18: number(TABLE, record, under_18.as_deref())?,
                pct_male: number(TABLE, record, male.as_deref())?,
                pct_female: number(TABLE, record, female.as_deref())?,
                margination: number(TABLE, record, margination.as_deref())?,
            };
            Ok(PointRecord::new(
                record.source_line,
                name.as_deref().and_then(|c| record.raw_text(c)),
                location(TABLE, record, latitude.as_deref(), longitude.as_deref())?,
                payload,
            ))
        })
        .collect()
}

pub fn load_polygons<P: AsRef<Path>>(
    path: P,
    columns: &PolygonColumns,
) -> Result<Vec<PolygonRecord>> {
    let polygons = bind_polygons(&read_table(path.as_ref())?, columns)?;
    info!("Loaded {} polygons from {:?}", polygons.len(), path.as_ref());
    Ok(polygons)
}

pub fn load_incidents<P: AsRef<Path>>(
    path: P,
    columns: &IncidentColumns,
) -> Result<Vec<PointRecord<IncidentPayload>>> {
    let incidents = bind_incidents(&read_table(path.as_ref())?, columns)?;
    info!("Loaded {} incidents from {:?}", incidents.len(), path.as_ref());
    Ok(incidents)
}

pub fn load_demographics<P: AsRef<Path>>(
    path: P,
    columns: &DemographicColumns,
) -> Result<Vec<PointRecord<DemographicPayload>>> {
    let demographics = bind_demographics(&read_table(path.as_ref())?, columns)?;
    info!("Loaded {} demographic records from {:?}", demographics.len(), path.as_ref());
    Ok(demographics)
}

/// Distinct raw names of one column with their occurrence counts
pub fn distinct_names(records: &[Record], column: &str) -> Result<Vec<RawNameRecord>> {
    let binder = ColumnBinder::new("name", records);
    let column = binder.require("name", Some(&column.to_string()), &[])?;
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        if let Some(name) = record.raw_text(&column) {
            *counts.entry(name).or_default() += 1;
        }
    }
    Ok(counts
        .into_iter()
        .map(|(name, frequency)| RawNameRecord::new(name, frequency))
        .collect())
}
