//! Nom parser for WKT polygon geometries
//!
//! Accepts `POLYGON` and `MULTIPOLYGON` in any case, with optional `Z`/`M`
//! dimension tags (extra ordinates are dropped) and an optional `SRID=n;`
//! prefix. Coordinates are `x y`, i.e. longitude first.

use crate::{Error, Result};
use geolink_core::{Coord, MultiPolygon, Polygon, Ring};
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{all_consuming, map, opt, value},
    multi::separated_list1,
    number::complete::double,
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};

/// Raw parse output: polygons as lists of rings as lists of points
type RawPolygon = Vec<Vec<Coord>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Polygon,
    MultiPolygon,
}

/// Parse WKT into a validated multipolygon
pub fn parse_wkt(input: &str) -> Result<MultiPolygon> {
    let (_, polygons) = parse_geometry(input.trim()).map_err(|e| {
        let snippet: String = input.trim().chars().take(40).collect();
        Error::Wkt(format!("cannot parse '{}...': {}", snippet, e))
    })?;

    let polygons = polygons
        .into_iter()
        .map(|rings| -> Result<Polygon> {
            let mut rings = rings.into_iter().map(Ring::new);
            let exterior = rings
                .next()
                .ok_or_else(|| Error::Wkt("polygon without rings".to_string()))??;
            let holes = rings.collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Polygon::new(exterior, holes))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MultiPolygon::new(polygons)?)
}

fn parse_geometry(input: &str) -> IResult<&str, Vec<RawPolygon>> {
    all_consuming(delimited(
        tuple((multispace0, opt(srid))),
        body,
        multispace0,
    ))(input)
}

fn srid(input: &str) -> IResult<&str, ()> {
    value(
        (),
        tuple((tag_no_case("SRID="), digit1, char(';'), multispace0)),
    )(input)
}

fn keyword(input: &str) -> IResult<&str, Kind> {
    let kind = alt((
        value(Kind::MultiPolygon, tag_no_case("MULTIPOLYGON")),
        value(Kind::Polygon, tag_no_case("POLYGON")),
    ));
    let dimension = opt(preceded(
        multispace1,
        alt((tag_no_case("ZM"), tag_no_case("Z"), tag_no_case("M"))),
    ));
    terminated(kind, tuple((dimension, multispace0)))(input)
}

fn body(input: &str) -> IResult<&str, Vec<RawPolygon>> {
    let (rest, kind) = keyword(input)?;
    match kind {
        Kind::Polygon => map(rings, |r| vec![r])(rest),
        Kind::MultiPolygon => parenthesized(separated_list1(comma, rings))(rest),
    }
}

/// `((x y, ...), (x y, ...))`
fn rings(input: &str) -> IResult<&str, RawPolygon> {
    parenthesized(separated_list1(comma, ring))(input)
}

/// `(x y, x y, ...)`
fn ring(input: &str) -> IResult<&str, Vec<Coord>> {
    parenthesized(separated_list1(comma, point))(input)
}

/// `x y [z [m]]`
fn point(input: &str) -> IResult<&str, Coord> {
    let (rest, (x, _, y, _)) = tuple((double, multispace1, double, opt(extra_ordinates)))(input)?;
    Ok((rest, Coord::new(x, y)))
}

fn extra_ordinates(input: &str) -> IResult<&str, ()> {
    value(
        (),
        tuple((multispace1, double, opt(preceded(multispace1, double)))),
    )(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(multispace0, char(','), multispace0)(input)
}

fn parenthesized<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(
        terminated(tag("("), multispace0),
        inner,
        preceded(multispace0, tag(")")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_polygon() {
        let geometry = parse_wkt("POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))").unwrap();
        assert_eq!(geometry.polygons().len(), 1);
        assert!((geometry.area() - 1.0).abs() < 1e-12);
        assert!(geometry.contains(&Coord::new(0.5, 0.5)));
    }

    #[test]
    fn test_parse_polygon_with_hole() {
        let geometry = parse_wkt(
            "POLYGON((0 0,4 0,4 4,0 4,0 0),(1 1,2 1,2 2,1 2,1 1))",
        )
        .unwrap();
        assert!((geometry.area() - 15.0).abs() < 1e-12);
        assert!(!geometry.contains(&Coord::new(1.5, 1.5)));
    }

    #[test]
    fn test_parse_multipolygon() {
        let geometry = parse_wkt(
            "MULTIPOLYGON (((-110.96 29.08, -110.95 29.08, -110.95 29.09, -110.96 29.09, -110.96 29.08)), \
             ((-110.90 29.00, -110.89 29.00, -110.89 29.01, -110.90 29.00)))",
        )
        .unwrap();
        assert_eq!(geometry.polygons().len(), 2);
        assert!(geometry.contains(&Coord::lon_lat(-110.955, 29.085)));
    }

    #[test]
    fn test_case_dimension_and_srid() {
        let geometry = parse_wkt("SRID=4326;polygon z ((0 0 5, 2 0 5, 2 2 5, 0 0 5))").unwrap();
        assert!((geometry.area() - 2.0).abs() < 1e-12);
        let geometry = parse_wkt("  Polygon((1e0 0,1 1,0 1,1e0 0))  ").unwrap();
        assert_eq!(geometry.polygons().len(), 1);
    }

    #[test]
    fn test_rejects_invalid_wkt() {
        for input in [
            "",
            "POINT (1 2)",
            "POLYGON EMPTY",
            "POLYGON ((0 0, 1 0, 1 1, 0 0)",
            "POLYGON ((0 0, 1 0))",
            "MULTIPOLYGON ((0 0, 1 0, 1 1, 0 0))",
            "POLYGON ((0 0, 1 0, 1 1, 0 0)) trailing",
        ] {
            assert!(parse_wkt(input).is_err(), "accepted {input:?}");
        }
    }
}
