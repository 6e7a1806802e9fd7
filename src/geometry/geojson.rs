// SPDX-License-Identifier: MIT
//! GeoJSON export
//!
//! Export is strict: coordinates must lie within [-90,90]x[-180,180], line
//! strings need two distinct points, polygon rings three, and a polygon may
//! carry at most one exterior ring. Rings are closed on output.

use serde_json::{json, Map, Value};

use super::{in_range, Geometry, LineString, Point, Polygon};
use crate::error::GeoExportError;

fn coordinates(point: &Point) -> Result<Value, GeoExportError> {
    if !in_range(point.north, point.east) {
        return Err(GeoExportError::CoordinatesOutOfRange {
            north: point.north,
            east: point.east,
        });
    }
    Ok(match point.up {
        Some(up) => json!([point.east, point.north, up as f64 / 1000.0]),
        None => json!([point.east, point.north]),
    })
}

fn line_coordinates(line: &LineString) -> Result<Vec<Value>, GeoExportError> {
    line.deduplicated().into_iter().map(coordinates).collect()
}

fn ring_coordinates(ring: &LineString, index: usize) -> Result<Value, GeoExportError> {
    let mut coords = line_coordinates(ring)?;
    if !ring.is_closed() {
        if let Some(first) = ring.points.first() {
            coords.push(coordinates(first)?);
        }
    }
    if coords.len() < 4 {
        return Err(GeoExportError::RingTooShort {
            ring: index,
            points: coords.len().saturating_sub(1),
        });
    }
    Ok(Value::Array(coords))
}

fn polygon_coordinates(polygon: &Polygon) -> Result<Value, GeoExportError> {
    if polygon.rings.is_empty() {
        return Err(GeoExportError::NoRings);
    }
    let exteriors = polygon.exterior_count();
    if exteriors > 1 {
        return Err(GeoExportError::MultipleExteriorRings(exteriors));
    }

    let exterior = polygon.exterior_index();
    let mut rings = vec![ring_coordinates(&polygon.rings[exterior], exterior)?];
    for (index, ring) in polygon.rings.iter().enumerate() {
        if index != exterior {
            rings.push(ring_coordinates(ring, index)?);
        }
    }
    Ok(Value::Array(rings))
}

fn properties(geometry: &Geometry) -> Map<String, Value> {
    let mut props = Map::new();
    if let Some(designator) = geometry.designator() {
        props.insert("designator".into(), json!(designator));
    }
    props.insert("type".into(), json!(geometry.kind_name()));

    let mut non_zero = |key: &str, value: Value, zero: bool| {
        if !zero {
            props.insert(key.into(), value);
        }
    };
    match geometry {
        Geometry::Point(p) => {
            non_zero("color", json!(p.color), p.color == 0);
            non_zero(
                "horizontalAccuracy",
                json!(p.horizontal_accuracy),
                p.horizontal_accuracy == 0.0,
            );
            non_zero(
                "verticalAccuracy",
                json!(p.vertical_accuracy),
                p.vertical_accuracy == 0.0,
            );
        }
        Geometry::LineString(l) => {
            non_zero("width", json!(l.width), l.width == 0);
            non_zero("length", json!(l.length), l.length == 0);
            non_zero("color", json!(l.color), l.color == 0);
        }
        Geometry::Polygon(p) => {
            non_zero("area", json!(p.area), p.area == 0);
            non_zero("color", json!(p.color), p.color == 0);
        }
    }
    props
}

/// A GeoJSON Feature for `geometry`
pub fn feature(geometry: &Geometry) -> Result<Value, GeoExportError> {
    let shape = match geometry {
        Geometry::Point(p) => json!({ "type": "Point", "coordinates": coordinates(p)? }),
        Geometry::LineString(l) => {
            let coords = line_coordinates(l)?;
            if coords.len() < 2 {
                return Err(GeoExportError::TooFewPoints(coords.len()));
            }
            json!({ "type": "LineString", "coordinates": coords })
        }
        Geometry::Polygon(p) => json!({ "type": "Polygon", "coordinates": polygon_coordinates(p)? }),
    };
    Ok(json!({
        "type": "Feature",
        "geometry": shape,
        "properties": properties(geometry),
    }))
}

/// A FeatureCollection of every exportable geometry, plus the export
/// failures of the others keyed by element path
pub fn feature_collection(geometries: &[Geometry]) -> (Value, Vec<(String, GeoExportError)>) {
    let mut features = Vec::with_capacity(geometries.len());
    let mut failures = Vec::new();
    for geometry in geometries {
        match feature(geometry) {
            Ok(f) => features.push(f),
            Err(e) => failures.push((geometry.path().to_string(), e)),
        }
    }
    (
        json!({ "type": "FeatureCollection", "features": features }),
        failures,
    )
}
