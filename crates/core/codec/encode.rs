//! Record encoders: header, column, geometry, feature and property payloads,
//! plus a writer for complete unindexed containers.

use super::builder::TableBuilder;
use super::feature::{Feature, slot as feature_slot};
use super::geometry::slot as geometry_slot;
use super::header::{column_slot, crs_slot, slot as header_slot};
use super::{MAGIC_BYTES, SIZE_PREFIX_LEN};
use crate::error::{FgbError, Result};
use fgbstream_types::{BoundingBox2D, Column, ColumnValue, Coord, Crs, Geometry, GeometryType, Header};

pub fn encode_column(column: &Column) -> TableBuilder {
    use column_slot as s;
    let mut table = TableBuilder::new()
        .add_str(s::NAME, &column.name)
        .add_u8(s::TYPE, column.column_type.as_u8());
    if let Some(title) = &column.title {
        table = table.add_str(s::TITLE, title);
    }
    if let Some(description) = &column.description {
        table = table.add_str(s::DESCRIPTION, description);
    }
    for (slot, value) in [
        (s::WIDTH, column.width),
        (s::PRECISION, column.precision),
        (s::SCALE, column.scale),
    ] {
        if value != Column::UNSPECIFIED {
            table = table.add_i32(slot, value);
        }
    }
    if !column.nullable {
        table = table.add_bool(s::NULLABLE, false);
    }
    if column.unique {
        table = table.add_bool(s::UNIQUE, true);
    }
    if column.primary_key {
        table = table.add_bool(s::PRIMARY_KEY, true);
    }
    if let Some(metadata) = &column.metadata {
        table = table.add_str(s::METADATA, metadata);
    }
    table
}

fn encode_crs(crs: &Crs) -> TableBuilder {
    use crs_slot as s;
    let mut table = TableBuilder::new();
    for (slot, value) in [
        (s::ORG, &crs.org),
        (s::NAME, &crs.name),
        (s::DESCRIPTION, &crs.description),
        (s::WKT, &crs.wkt),
        (s::CODE_STRING, &crs.code_string),
    ] {
        if let Some(value) = value {
            table = table.add_str(slot, value);
        }
    }
    if crs.code != 0 {
        table = table.add_i32(s::CODE, crs.code);
    }
    table
}

/// Encode a header table (without the leading magic and length prefix).
pub fn encode_header(header: &Header) -> Vec<u8> {
    use header_slot as s;
    let mut table = TableBuilder::new()
        .add_u8(s::GEOMETRY_TYPE, header.geometry_type.as_u8())
        .add_u64(s::FEATURES_COUNT, header.features_count)
        .add_u16(s::INDEX_NODE_SIZE, header.index_node_size);
    for (slot, value) in [
        (s::NAME, &header.name),
        (s::TITLE, &header.title),
        (s::DESCRIPTION, &header.description),
        (s::METADATA, &header.metadata),
    ] {
        if let Some(value) = value {
            table = table.add_str(slot, value);
        }
    }
    if let Some(envelope) = &header.envelope {
        table = table.add_f64_vec(s::ENVELOPE, envelope);
    }
    for (slot, flag) in [
        (s::HAS_Z, header.has_z),
        (s::HAS_M, header.has_m),
        (s::HAS_T, header.has_t),
        (s::HAS_TM, header.has_tm),
    ] {
        if flag {
            table = table.add_bool(slot, true);
        }
    }
    if !header.columns.is_empty() {
        table = table.add_tables(s::COLUMNS, header.columns.iter().map(encode_column).collect());
    }
    if let Some(crs) = &header.crs {
        table = table.add_table(s::CRS, encode_crs(crs));
    }
    table.finish()
}

/// Flat coordinate buffers for a run of vertices. `z`/`m` are written only
/// when at least one vertex carries them; gaps are filled with NaN.
fn coordinate_buffers(table: TableBuilder, coords: &[Coord]) -> TableBuilder {
    use geometry_slot as s;
    if coords.is_empty() {
        return table;
    }
    let xy: Vec<f64> = coords.iter().flat_map(|c| [c.x, c.y]).collect();
    let mut table = table.add_f64_vec(s::XY, &xy);
    if coords.iter().any(|c| c.z.is_some()) {
        let z: Vec<f64> = coords.iter().map(|c| c.z.unwrap_or(f64::NAN)).collect();
        table = table.add_f64_vec(s::Z, &z);
    }
    if coords.iter().any(|c| c.m.is_some()) {
        let m: Vec<f64> = coords.iter().map(|c| c.m.unwrap_or(f64::NAN)).collect();
        table = table.add_f64_vec(s::M, &m);
    }
    table
}

/// Cumulative ring ends. Each must fit the format's `u32` index.
fn ring_ends(lengths: impl IntoIterator<Item = usize>) -> Result<Vec<u32>> {
    let mut end = 0u32;
    lengths
        .into_iter()
        .map(|len| {
            end = u32::try_from(len)
                .ok()
                .and_then(|len| end.checked_add(len))
                .ok_or_else(|| {
                    FgbError::Overflow(format!("ring ends exceed {} coordinates", u32::MAX))
                })?;
            Ok(end)
        })
        .collect()
}

fn ring_buffers(table: TableBuilder, rings: &[Vec<Coord>]) -> Result<TableBuilder> {
    let coords: Vec<Coord> = rings.iter().flatten().copied().collect();
    let mut table = coordinate_buffers(table, &coords);
    if rings.len() > 1 {
        let ends = ring_ends(rings.iter().map(Vec::len))?;
        table = table.add_u32_vec(geometry_slot::ENDS, &ends);
    }
    Ok(table)
}

fn typed(kind: GeometryType) -> TableBuilder {
    TableBuilder::new().add_u8(geometry_slot::TYPE, kind.as_u8())
}

/// Encode a geometry table. Every table carries its own type tag so it can
/// be decoded under an `Unknown` header type.
pub fn encode_geometry(geometry: &Geometry) -> Result<TableBuilder> {
    let table = typed(geometry.geometry_type());
    Ok(match geometry {
        Geometry::Point(c) => coordinate_buffers(table, std::slice::from_ref(c)),
        Geometry::MultiPoint(cs) | Geometry::LineString(cs) => coordinate_buffers(table, cs),
        Geometry::MultiLineString(rings) | Geometry::Polygon(rings) => ring_buffers(table, rings)?,
        Geometry::MultiPolygon(polygons) => table.add_tables(
            geometry_slot::PARTS,
            polygons
                .iter()
                .map(|rings| ring_buffers(typed(GeometryType::Polygon), rings))
                .collect::<Result<_>>()?,
        ),
        Geometry::GeometryCollection(parts) => table.add_tables(
            geometry_slot::PARTS,
            parts.iter().map(encode_geometry).collect::<Result<_>>()?,
        ),
        Geometry::Extended { kind, rings, parts } => {
            let mut table = ring_buffers(table, rings)?;
            if kind.has_parts() && !parts.is_empty() {
                table = table.add_tables(
                    geometry_slot::PARTS,
                    parts.iter().map(encode_geometry).collect::<Result<_>>()?,
                );
            }
            table
        }
    })
}

/// Builds a property payload for one feature.
#[derive(Debug)]
pub struct PropertyEncoder<'a> {
    columns: &'a [Column],
    buf: Vec<u8>,
}

impl<'a> PropertyEncoder<'a> {
    pub fn new(columns: &'a [Column]) -> Self {
        Self {
            columns,
            buf: Vec::new(),
        }
    }

    /// Append the value for column `index`. The value's kind must match the
    /// column's declared type.
    pub fn push(&mut self, index: u16, value: &ColumnValue) -> Result<&mut Self> {
        let column = self
            .columns
            .get(usize::from(index))
            .ok_or(FgbError::ColumnIndexOutOfRange {
                index,
                count: self.columns.len(),
            })?;
        if column.column_type != value.column_type() {
            return Err(FgbError::ValueTypeMismatch {
                column: column.name.clone(),
                expected: column.column_type,
                found: value.column_type(),
            });
        }
        self.buf.extend_from_slice(&index.to_le_bytes());
        match value {
            ColumnValue::Byte(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            ColumnValue::UByte(v) => self.buf.push(*v),
            ColumnValue::Bool(v) => self.buf.push(u8::from(*v)),
            ColumnValue::Short(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            ColumnValue::UShort(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            ColumnValue::Int(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            ColumnValue::UInt(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            ColumnValue::Long(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            ColumnValue::ULong(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            ColumnValue::Float(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            ColumnValue::Double(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            ColumnValue::String(s) | ColumnValue::DateTime(s) => self.push_prefixed(s.as_bytes()),
            ColumnValue::Json(v) => {
                let text = serde_json::to_vec(v)?;
                self.push_prefixed(&text);
            }
            ColumnValue::Binary(b) => self.push_prefixed(b),
        }
        Ok(self)
    }

    /// Append a value by column name.
    pub fn push_named(&mut self, name: &str, value: &ColumnValue) -> Result<&mut Self> {
        let index = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| FgbError::InvalidConfig(format!("no column named {}", name)))?;
        self.push(index as u16, value)
    }

    fn push_prefixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(bytes);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Encode a feature record (without its length prefix). Properties are
/// written in column declaration order; names without a column are rejected.
pub fn encode_feature(feature: &Feature, columns: &[Column]) -> Result<Vec<u8>> {
    let mut props = PropertyEncoder::new(columns);
    for (index, column) in columns.iter().enumerate() {
        if let Some(value) = feature.properties.get(&column.name) {
            props.push(index as u16, value)?;
        }
    }
    if let Some(name) = feature
        .properties
        .keys()
        .find(|name| !columns.iter().any(|c| &c.name == *name))
    {
        return Err(FgbError::InvalidConfig(format!(
            "property {} has no column in the schema",
            name
        )));
    }

    let mut table = TableBuilder::new();
    if let Some(geometry) = &feature.geometry {
        table = table.add_table(feature_slot::GEOMETRY, encode_geometry(geometry)?);
    }
    let payload = props.finish();
    if !payload.is_empty() {
        table = table.add_bytes(feature_slot::PROPERTIES, &payload);
    }
    Ok(table.finish())
}

/// Writes a complete container without a spatial index.
///
/// `features_count` is set from the pushed features, and the envelope is
/// computed from their geometries unless the header already carries one.
#[derive(Debug)]
pub struct ContainerWriter {
    header: Header,
    features: Vec<Feature>,
}

impl ContainerWriter {
    pub fn new(header: Header) -> Self {
        Self {
            header,
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, feature: Feature) -> &mut Self {
        self.features.push(feature);
        self
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        let mut header = self.header;
        header.index_node_size = 0;
        header.features_count = self.features.len() as u64;
        if header.envelope.is_none() {
            header.envelope = self
                .features
                .iter()
                .filter_map(Feature::bounds)
                .reduce(|a, b| a.union(&b))
                .map(|b: BoundingBox2D| vec![b.min_x(), b.min_y(), b.max_x(), b.max_y()]);
        }

        let header_bytes = encode_header(&header);
        let mut out = Vec::with_capacity(MAGIC_BYTES.len() + SIZE_PREFIX_LEN + header_bytes.len());
        out.extend_from_slice(&MAGIC_BYTES);
        out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&header_bytes);
        for feature in &self.features {
            let record = encode_feature(feature, &header.columns)?;
            out.extend_from_slice(&(record.len() as u32).to_le_bytes());
            out.extend_from_slice(&record);
        }
        log::debug!(
            "wrote container: {} features, {} bytes",
            header.features_count,
            out.len()
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_header;
    use fgbstream_types::ColumnType;

    #[test]
    fn test_ring_ends_accumulate() {
        assert_eq!(ring_ends([4, 5, 3]).unwrap(), vec![4, 9, 12]);
        assert!(ring_ends([]).unwrap().is_empty());
    }

    #[test]
    fn test_ring_ends_overflow() {
        let max = u32::MAX as usize;
        assert_eq!(ring_ends([max]).unwrap(), vec![u32::MAX]);
        let err = ring_ends([max, 1]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Overflow);
        assert!(matches!(ring_ends([max + 1]), Err(FgbError::Overflow(_))));
    }

    #[test]
    fn test_property_type_mismatch() {
        let columns = vec![Column::new("n", ColumnType::Int)];
        let mut encoder = PropertyEncoder::new(&columns);
        let err = encoder.push(0, &ColumnValue::from("x")).unwrap_err();
        assert!(matches!(err, FgbError::ValueTypeMismatch { .. }));
        assert!(encoder.push(1, &ColumnValue::Int(1)).is_err());
        assert!(encoder.push_named("n", &ColumnValue::Int(1)).is_ok());
    }

    #[test]
    fn test_feature_with_unknown_property_is_rejected() {
        let columns = vec![Column::new("n", ColumnType::Int)];
        let feature = Feature::new(Geometry::Point(Coord::new(0.0, 0.0))).with_property("x", 1);
        assert!(encode_feature(&feature, &columns).is_err());
    }

    #[test]
    fn test_writer_fills_envelope_and_count() {
        let mut writer = ContainerWriter::new(Header::new(GeometryType::Point));
        writer
            .push(Feature::new(Geometry::Point(Coord::new(-1.0, 5.0))))
            .push(Feature::new(Geometry::Point(Coord::new(2.0, -3.0))));
        let bytes = writer.finish().unwrap();

        assert_eq!(&bytes[..8], &MAGIC_BYTES);
        let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let header = decode_header(&bytes[12..12 + len]).unwrap();
        assert_eq!(header.features_count, 2);
        assert_eq!(header.index_node_size, 0);
        assert_eq!(header.envelope, Some(vec![-1.0, -3.0, 2.0, 5.0]));
    }
}
