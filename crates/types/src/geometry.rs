//! Geometry kinds and the decoded, coordinate-based geometry tree.

use crate::bbox::BoundingBox2D;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The 18 geometry kinds a container may declare, with their wire tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum GeometryType {
    #[default]
    Unknown = 0,
    Point = 1,
    LineString = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
    CircularString = 8,
    CompoundCurve = 9,
    CurvePolygon = 10,
    MultiCurve = 11,
    MultiSurface = 12,
    Curve = 13,
    Surface = 14,
    PolyhedralSurface = 15,
    #[serde(rename = "TIN")]
    Tin = 16,
    Triangle = 17,
}

impl GeometryType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Kinds whose payload is a sequence of child geometries rather than
    /// rings of the parent's own coordinate buffer.
    pub fn has_parts(self) -> bool {
        matches!(
            self,
            GeometryType::MultiPolygon
                | GeometryType::GeometryCollection
                | GeometryType::CompoundCurve
                | GeometryType::CurvePolygon
                | GeometryType::MultiCurve
                | GeometryType::MultiSurface
                | GeometryType::Curve
                | GeometryType::Surface
                | GeometryType::PolyhedralSurface
                | GeometryType::Tin
        )
    }
}

impl TryFrom<u8> for GeometryType {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => GeometryType::Unknown,
            1 => GeometryType::Point,
            2 => GeometryType::LineString,
            3 => GeometryType::Polygon,
            4 => GeometryType::MultiPoint,
            5 => GeometryType::MultiLineString,
            6 => GeometryType::MultiPolygon,
            7 => GeometryType::GeometryCollection,
            8 => GeometryType::CircularString,
            9 => GeometryType::CompoundCurve,
            10 => GeometryType::CurvePolygon,
            11 => GeometryType::MultiCurve,
            12 => GeometryType::MultiSurface,
            13 => GeometryType::Curve,
            14 => GeometryType::Surface,
            15 => GeometryType::PolyhedralSurface,
            16 => GeometryType::Tin,
            17 => GeometryType::Triangle,
            other => return Err(other),
        })
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryType::Tin => "TIN",
            other => return write!(f, "{:?}", other),
        };
        f.write_str(name)
    }
}

/// One vertex. `z` and `m` are present only when the container stores them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<f64>,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: None,
            m: None,
        }
    }

    pub fn with_z(mut self, z: f64) -> Self {
        self.z = Some(z);
        self
    }

    pub fn with_m(mut self, m: f64) -> Self {
        self.m = Some(m);
        self
    }

    /// Position as a GeoJSON-style array: `[x, y]` or `[x, y, z]`.
    pub fn position(&self) -> Vec<f64> {
        match self.z {
            Some(z) => vec![self.x, self.y, z],
            None => vec![self.x, self.y],
        }
    }
}

impl From<Coord> for geo::Coord<f64> {
    fn from(c: Coord) -> Self {
        geo::coord! { x: c.x, y: c.y }
    }
}

/// A decoded geometry.
///
/// Simple and multi kinds hold their coordinates directly; collections hold
/// child geometries. Children are owned by their parent, so the tree is
/// acyclic by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Coord),
    MultiPoint(Vec<Coord>),
    LineString(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    Polygon(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
    GeometryCollection(Vec<Geometry>),
    /// Curve, surface and triangulated kinds, kept with their raw rings and parts.
    Extended {
        kind: GeometryType,
        rings: Vec<Vec<Coord>>,
        parts: Vec<Geometry>,
    },
}

impl Geometry {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::LineString(_) => GeometryType::LineString,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::Polygon(_) => GeometryType::Polygon,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryType::GeometryCollection,
            Geometry::Extended { kind, .. } => *kind,
        }
    }

    /// Visit every coordinate of this geometry, children included.
    pub fn for_each_coord(&self, f: &mut impl FnMut(&Coord)) {
        match self {
            Geometry::Point(c) => f(c),
            Geometry::MultiPoint(cs) | Geometry::LineString(cs) => cs.iter().for_each(f),
            Geometry::MultiLineString(rings) | Geometry::Polygon(rings) => {
                rings.iter().flatten().for_each(f)
            }
            Geometry::MultiPolygon(polys) => polys.iter().flatten().flatten().for_each(f),
            Geometry::GeometryCollection(parts) => {
                for part in parts {
                    part.for_each_coord(f);
                }
            }
            Geometry::Extended { rings, parts, .. } => {
                rings.iter().flatten().for_each(&mut *f);
                for part in parts {
                    part.for_each_coord(f);
                }
            }
        }
    }

    /// Bounding box over all coordinates, or `None` for an empty geometry.
    pub fn bounds(&self) -> Option<BoundingBox2D> {
        let mut acc: Option<(f64, f64, f64, f64)> = None;
        self.for_each_coord(&mut |c| {
            acc = Some(match acc {
                None => (c.x, c.y, c.x, c.y),
                Some((min_x, min_y, max_x, max_y)) => {
                    (min_x.min(c.x), min_y.min(c.y), max_x.max(c.x), max_y.max(c.y))
                }
            });
        });
        acc.map(|(min_x, min_y, max_x, max_y)| BoundingBox2D::new(min_x, min_y, max_x, max_y))
    }

    /// Convert to a 2D `geo` geometry, dropping z/m.
    ///
    /// Returns `None` for the extended curve/surface kinds, which `geo` has no
    /// representation for.
    pub fn to_geo(&self) -> Option<geo::Geometry<f64>> {
        Some(match self {
            Geometry::Point(c) => geo::Geometry::Point(geo::Point::from(geo::Coord::from(*c))),
            Geometry::MultiPoint(cs) => geo::Geometry::MultiPoint(geo::MultiPoint::new(
                cs.iter()
                    .map(|c| geo::Point::from(geo::Coord::from(*c)))
                    .collect(),
            )),
            Geometry::LineString(cs) => geo::Geometry::LineString(line_string(cs)),
            Geometry::MultiLineString(lines) => geo::Geometry::MultiLineString(
                geo::MultiLineString::new(lines.iter().map(|l| line_string(l)).collect()),
            ),
            Geometry::Polygon(rings) => geo::Geometry::Polygon(polygon(rings)),
            Geometry::MultiPolygon(polys) => geo::Geometry::MultiPolygon(geo::MultiPolygon::new(
                polys.iter().map(|rings| polygon(rings)).collect(),
            )),
            Geometry::GeometryCollection(parts) => {
                geo::Geometry::GeometryCollection(geo::GeometryCollection::new_from(
                    parts
                        .iter()
                        .map(Geometry::to_geo)
                        .collect::<Option<Vec<_>>>()?,
                ))
            }
            Geometry::Extended { .. } => return None,
        })
    }
}

fn line_string(coords: &[Coord]) -> geo::LineString<f64> {
    geo::LineString::new(coords.iter().copied().map(geo::Coord::from).collect())
}

fn polygon(rings: &[Vec<Coord>]) -> geo::Polygon<f64> {
    let mut rings = rings.iter();
    let exterior = rings
        .next()
        .map(|r| line_string(r))
        .unwrap_or_else(|| geo::LineString::new(Vec::new()));
    geo::Polygon::new(exterior, rings.map(|r| line_string(r)).collect())
}
