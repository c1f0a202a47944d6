//! GeoJSON conversion for decoded features.

use crate::codec::Feature;
use fgbstream_types::column::properties_to_json;
use fgbstream_types::{Coord, Geometry};
use geojson::{FeatureCollection, Value};

fn positions(coords: &[Coord]) -> Vec<Vec<f64>> {
    coords.iter().map(Coord::position).collect()
}

fn rings(rings: &[Vec<Coord>]) -> Vec<Vec<Vec<f64>>> {
    rings.iter().map(|ring| positions(ring)).collect()
}

/// Convert a geometry to GeoJSON, keeping z where present.
///
/// Curve and surface kinds have no GeoJSON counterpart. Their rings become
/// a line string (or multi line string) and their parts are appended as a
/// geometry collection.
pub fn geometry_to_geojson(geometry: &Geometry) -> geojson::Geometry {
    let value = match geometry {
        Geometry::Point(c) => Value::Point(c.position()),
        Geometry::MultiPoint(cs) => Value::MultiPoint(positions(cs)),
        Geometry::LineString(cs) => Value::LineString(positions(cs)),
        Geometry::MultiLineString(lines) => Value::MultiLineString(rings(lines)),
        Geometry::Polygon(polygon) => Value::Polygon(rings(polygon)),
        Geometry::MultiPolygon(polygons) => {
            Value::MultiPolygon(polygons.iter().map(|p| rings(p)).collect())
        }
        Geometry::GeometryCollection(parts) => {
            Value::GeometryCollection(parts.iter().map(geometry_to_geojson).collect())
        }
        Geometry::Extended {
            rings: own_rings,
            parts,
            ..
        } => {
            let lines = match own_rings.as_slice() {
                [] => None,
                [ring] => Some(Value::LineString(positions(ring))),
                many => Some(Value::MultiLineString(rings(many))),
            };
            match (lines, parts.is_empty()) {
                (Some(lines), true) => lines,
                (lines, _) => Value::GeometryCollection(
                    lines
                        .map(geojson::Geometry::new)
                        .into_iter()
                        .chain(parts.iter().map(geometry_to_geojson))
                        .collect(),
                ),
            }
        }
    };
    geojson::Geometry::new(value)
}

impl Feature {
    pub fn to_geojson(&self) -> geojson::Feature {
        geojson::Feature {
            bbox: None,
            geometry: self.geometry.as_ref().map(geometry_to_geojson),
            id: None,
            properties: Some(properties_to_json(&self.properties)),
            foreign_members: None,
        }
    }
}

pub fn to_feature_collection<'a>(features: impl IntoIterator<Item = &'a Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: features.into_iter().map(Feature::to_geojson).collect(),
        foreign_members: None,
    }
}
