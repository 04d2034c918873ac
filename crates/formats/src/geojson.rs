//! GeoJSON FeatureCollection of the unified table
//!
//! One feature per polygon: the polygon geometry plus every unified column
//! as a property. Single-part geometries are written as `Polygon`.

use crate::Result;
use geolink_core::{MultiPolygon, PolygonSet, Ring, UnifiedRow};
use serde_json::{json, Value};
use std::io::Write;

fn ring_coordinates(ring: &Ring) -> Value {
    Value::Array(ring.coords().iter().map(|c| json!([c.x, c.y])).collect())
}

pub fn geometry_value(geometry: &MultiPolygon) -> Value {
    let polygons: Vec<Value> = geometry
        .polygons()
        .iter()
        .map(|p| {
            Value::Array(
                std::iter::once(&p.exterior)
                    .chain(p.holes.iter())
                    .map(ring_coordinates)
                    .collect(),
            )
        })
        .collect();

    match <[Value; 1]>::try_from(polygons) {
        Ok([single]) => json!({"type": "Polygon", "coordinates": single}),
        Err(parts) => json!({"type": "MultiPolygon", "coordinates": parts}),
    }
}

/// Build the collection; `rows` are in slot order of `polygons`
pub fn feature_collection(polygons: &PolygonSet, rows: &[UnifiedRow]) -> Result<Value> {
    let features = polygons
        .iter()
        .zip(rows)
        .map(|(polygon, row)| -> Result<Value> {
            Ok(json!({
                "type": "Feature",
                "id": polygon.id,
                "geometry": geometry_value(&polygon.geometry),
                "properties": serde_json::to_value(row)?,
            }))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(json!({"type": "FeatureCollection", "features": features}))
}

pub fn write_geojson<W: Write>(
    writer: W,
    polygons: &PolygonSet,
    rows: &[UnifiedRow],
) -> Result<()> {
    serde_json::to_writer(writer, &feature_collection(polygons, rows)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_writer::tests::sample_row;
    use crate::wkt::parse_wkt;
    use geolink_core::PolygonRecord;

    #[test]
    fn test_single_part_geometry_is_a_polygon() {
        let geometry = parse_wkt("POLYGON ((0 0, 1 0, 1 1, 0 0))").unwrap();
        let value = geometry_value(&geometry);
        assert_eq!(value["type"], "Polygon");
        assert_eq!(value["coordinates"][0][0], json!([0.0, 0.0]));
        assert_eq!(value["coordinates"][0].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_multi_part_geometry() {
        let geometry = parse_wkt(
            "MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)), \
             ((5 5, 6 5, 6 6, 5 5), (5.5 5.2, 5.8 5.2, 5.8 5.5, 5.5 5.2)))",
        )
        .unwrap();
        let value = geometry_value(&geometry);
        assert_eq!(value["type"], "MultiPolygon");
        assert_eq!(value["coordinates"].as_array().unwrap().len(), 2);
        assert_eq!(value["coordinates"][1].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_feature_properties_carry_unified_columns() {
        let geometry = parse_wkt("POLYGON ((0 0, 1 0, 1 1, 0 0))").unwrap();
        let set = PolygonSet::new(vec![PolygonRecord::new("001", "Centro", geometry)]).unwrap();

        let mut buffer = Vec::new();
        write_geojson(&mut buffer, &set, &[sample_row()]).unwrap();
        let value: Value = serde_json::from_slice(&buffer).unwrap();

        assert_eq!(value["type"], "FeatureCollection");
        let feature = &value["features"][0];
        assert_eq!(feature["id"], "001");
        assert_eq!(feature["properties"]["total"], 3);
        assert_eq!(feature["properties"]["rate_per_1k"], 2.5);
        assert_eq!(feature["properties"]["composite_risk_index"], Value::Null);
        assert_eq!(feature["properties"]["categories"]["Robo"], 3);
    }
}
