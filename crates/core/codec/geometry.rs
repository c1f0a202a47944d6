//! Geometry table decoding and assembly into [`Geometry`] values.

use super::header::geometry_type;
use super::table::Table;
use crate::error::{FgbError, Result};
use fgbstream_types::{Coord, Geometry, GeometryType};

pub(crate) mod slot {
    pub const ENDS: u16 = 0;
    pub const XY: u16 = 1;
    pub const Z: u16 = 2;
    pub const M: u16 = 3;
    pub const T: u16 = 4;
    pub const TM: u16 = 5;
    pub const TYPE: u16 = 6;
    pub const PARTS: u16 = 7;
}

/// Borrowed view of an encoded geometry table.
#[derive(Clone, Copy)]
pub struct GeometryView<'a> {
    table: Table<'a>,
}

impl<'a> GeometryView<'a> {
    pub fn new(table: Table<'a>) -> Self {
        Self { table }
    }

    /// The geometry's own type tag.
    pub fn geometry_type(&self) -> Result<GeometryType> {
        geometry_type(self.table.get_u8(slot::TYPE, 0)?)
    }

    pub fn ends(&self) -> Result<Vec<u32>> {
        Ok(self.table.get_u32_vec(slot::ENDS)?.unwrap_or_default())
    }

    pub fn xy(&self) -> Result<Vec<f64>> {
        Ok(self.table.get_f64_vec(slot::XY)?.unwrap_or_default())
    }

    pub fn z(&self) -> Result<Option<Vec<f64>>> {
        self.table.get_f64_vec(slot::Z)
    }

    pub fn m(&self) -> Result<Option<Vec<f64>>> {
        self.table.get_f64_vec(slot::M)
    }

    pub fn t(&self) -> Result<Option<Vec<f64>>> {
        self.table.get_f64_vec(slot::T)
    }

    pub fn tm(&self) -> Result<Option<Vec<u64>>> {
        self.table.get_u64_vec(slot::TM)
    }

    pub fn parts(&self) -> Result<Vec<GeometryView<'a>>> {
        Ok(self
            .table
            .get_tables(slot::PARTS)?
            .unwrap_or_default()
            .into_iter()
            .map(GeometryView::new)
            .collect())
    }

    /// Pair the flat coordinate buffers into vertices.
    fn coords(&self) -> Result<Vec<Coord>> {
        let xy = self.xy()?;
        if xy.len() % 2 != 0 {
            return Err(FgbError::InvalidGeometry(format!(
                "odd xy buffer length {}",
                xy.len()
            )));
        }
        let n = xy.len() / 2;
        let z = self.z()?;
        let m = self.m()?;
        for (name, buf) in [("z", &z), ("m", &m)] {
            if let Some(buf) = buf
                && buf.len() != n
            {
                return Err(FgbError::InvalidGeometry(format!(
                    "{} buffer has {} values for {} coordinates",
                    name,
                    buf.len(),
                    n
                )));
            }
        }
        Ok((0..n)
            .map(|i| Coord {
                x: xy[2 * i],
                y: xy[2 * i + 1],
                z: z.as_ref().map(|z| z[i]),
                m: m.as_ref().map(|m| m[i]),
            })
            .collect())
    }

    /// Split the vertices at `ends`. No ends means a single ring.
    fn rings(&self) -> Result<Vec<Vec<Coord>>> {
        let coords = self.coords()?;
        let ends = self.ends()?;
        if ends.is_empty() {
            return Ok(vec![coords]);
        }
        let mut rings = Vec::with_capacity(ends.len());
        let mut start = 0usize;
        for end in ends {
            let end = end as usize;
            if end <= start || end > coords.len() {
                return Err(FgbError::InvalidGeometry(format!(
                    "ring end {} out of order or beyond {} coordinates",
                    end,
                    coords.len()
                )));
            }
            rings.push(coords[start..end].to_vec());
            start = end;
        }
        Ok(rings)
    }
}

/// Assemble a geometry. `header_type` wins unless it is `Unknown`, in which
/// case the geometry's own type is used.
pub fn decode_geometry(
    view: &GeometryView<'_>,
    header_type: GeometryType,
    max_depth: usize,
) -> Result<Geometry> {
    assemble(view, header_type, 0, max_depth)
}

fn assemble(
    view: &GeometryView<'_>,
    kind: GeometryType,
    depth: usize,
    max_depth: usize,
) -> Result<Geometry> {
    if depth > max_depth {
        return Err(FgbError::GeometryTooDeep(max_depth));
    }
    let kind = match kind {
        GeometryType::Unknown => view.geometry_type()?,
        other => other,
    };

    Ok(match kind {
        GeometryType::Unknown => {
            return Err(FgbError::InvalidGeometry(
                "geometry type is Unknown in both header and geometry".into(),
            ));
        }
        GeometryType::Point => {
            let coord = view
                .coords()?
                .into_iter()
                .next()
                .ok_or_else(|| FgbError::InvalidGeometry("point without coordinates".into()))?;
            Geometry::Point(coord)
        }
        GeometryType::MultiPoint => Geometry::MultiPoint(view.coords()?),
        GeometryType::LineString => Geometry::LineString(view.coords()?),
        GeometryType::MultiLineString => Geometry::MultiLineString(view.rings()?),
        GeometryType::Polygon => Geometry::Polygon(view.rings()?),
        GeometryType::MultiPolygon => {
            let parts = view.parts()?;
            if parts.is_empty() {
                // single-part multipolygons may be written without parts
                let rings = view.rings()?;
                let polygons = if rings.iter().all(Vec::is_empty) {
                    Vec::new()
                } else {
                    vec![rings]
                };
                Geometry::MultiPolygon(polygons)
            } else {
                let mut polygons = Vec::with_capacity(parts.len());
                for part in &parts {
                    match assemble(part, GeometryType::Polygon, depth + 1, max_depth)? {
                        Geometry::Polygon(rings) => polygons.push(rings),
                        other => {
                            return Err(FgbError::InvalidGeometry(format!(
                                "multipolygon part decoded as {}",
                                other.geometry_type()
                            )));
                        }
                    }
                }
                Geometry::MultiPolygon(polygons)
            }
        }
        GeometryType::GeometryCollection => {
            let mut geometries = Vec::new();
            for part in view.parts()? {
                let part_type = part.geometry_type()?;
                geometries.push(assemble(&part, part_type, depth + 1, max_depth)?);
            }
            Geometry::GeometryCollection(geometries)
        }
        GeometryType::CircularString
        | GeometryType::Triangle
        | GeometryType::CompoundCurve
        | GeometryType::CurvePolygon
        | GeometryType::MultiCurve
        | GeometryType::MultiSurface
        | GeometryType::Curve
        | GeometryType::Surface
        | GeometryType::PolyhedralSurface
        | GeometryType::Tin => {
            let rings = if view.xy()?.is_empty() {
                Vec::new()
            } else {
                view.rings()?
            };
            let mut parts = Vec::new();
            if kind.has_parts() {
                for part in view.parts()? {
                    let part_type = part.geometry_type()?;
                    parts.push(assemble(&part, part_type, depth + 1, max_depth)?);
                }
            }
            Geometry::Extended { kind, rings, parts }
        }
    })
}
