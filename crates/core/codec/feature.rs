//! Feature table decoding and whole-buffer container decoding.

use super::geometry::{GeometryView, decode_geometry};
use super::header::{decode_columns, decode_header};
use super::properties::decode_properties;
use super::table::{Table, read_u32};
use super::{HEADER_PREFIX_LEN, SIZE_PREFIX_LEN, check_header_len, check_magic};
use crate::config::Config;
use crate::error::{FgbError, Result};
use crate::index::calc_tree_size;
use fgbstream_types::{BoundingBox2D, Column, Geometry, Header, Properties};
use serde::Serialize;
use std::borrow::Cow;

pub(crate) mod slot {
    pub const GEOMETRY: u16 = 0;
    pub const PROPERTIES: u16 = 1;
    pub const COLUMNS: u16 = 2;
}

/// Borrowed view of an encoded feature table.
#[derive(Clone, Copy)]
pub struct FeatureView<'a> {
    table: Table<'a>,
}

impl<'a> FeatureView<'a> {
    /// `bytes` is one feature record without its length prefix.
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        Ok(Self {
            table: Table::root(bytes)?,
        })
    }

    pub fn geometry(&self) -> Result<Option<GeometryView<'a>>> {
        Ok(self.table.get_table(slot::GEOMETRY)?.map(GeometryView::new))
    }

    pub fn properties(&self) -> Result<&'a [u8]> {
        Ok(self.table.get_bytes(slot::PROPERTIES)?.unwrap_or_default())
    }

    /// Per-feature column override, if the record carries one.
    pub fn columns(&self) -> Result<Option<Vec<Column>>> {
        match self.table.get_tables(slot::COLUMNS)? {
            Some(tables) => Ok(Some(decode_columns(Some(tables))?)),
            None => Ok(None),
        }
    }

    pub fn decode(&self, header: &Header, max_depth: usize) -> Result<Feature> {
        let geometry = self
            .geometry()?
            .map(|view| decode_geometry(&view, header.geometry_type, max_depth))
            .transpose()?;
        let columns = match self.columns()? {
            Some(columns) if !columns.is_empty() => Cow::Owned(columns),
            _ => Cow::Borrowed(header.columns.as_slice()),
        };
        let properties = decode_properties(self.properties()?, &columns)?;
        Ok(Feature {
            geometry,
            properties,
        })
    }
}

/// A decoded feature: geometry plus properties keyed by column name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    pub geometry: Option<Geometry>,
    pub properties: Properties,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry: Some(geometry),
            properties: Properties::new(),
        }
    }

    pub fn with_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<fgbstream_types::ColumnValue>,
    ) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Decode one feature record (without its length prefix).
    pub fn decode(bytes: &[u8], header: &Header, max_depth: usize) -> Result<Self> {
        FeatureView::new(bytes)?.decode(header, max_depth)
    }

    pub fn bounds(&self) -> Option<BoundingBox2D> {
        self.geometry.as_ref().and_then(Geometry::bounds)
    }
}

/// Decode a complete in-memory container: header, skipped index, then every
/// feature record until the end of the buffer.
pub fn decode_container(bytes: &[u8]) -> Result<(Header, Vec<Feature>)> {
    decode_container_with_config(bytes, &Config::default())
}

pub fn decode_container_with_config(
    bytes: &[u8],
    config: &Config,
) -> Result<(Header, Vec<Feature>)> {
    check_magic(bytes)?;
    let header_len = check_header_len(read_u32(bytes, 8)?, config.max_header_bytes)?;
    let header_end = HEADER_PREFIX_LEN + header_len;
    let header_bytes = bytes
        .get(HEADER_PREFIX_LEN..header_end)
        .ok_or_else(|| FgbError::truncated(HEADER_PREFIX_LEN, header_len, bytes.len()))?;
    let header = decode_header(header_bytes)?;

    let mut offset = header_end;
    if header.index_node_size > 0 {
        offset += calc_tree_size(header.features_count, header.index_node_size)?;
    }

    let mut features = Vec::new();
    while offset < bytes.len() {
        let len = read_u32(bytes, offset)? as usize;
        let start = offset + SIZE_PREFIX_LEN;
        let record = bytes
            .get(start..start + len)
            .ok_or_else(|| FgbError::truncated(start, len, bytes.len().saturating_sub(start)))?;
        features.push(Feature::decode(record, &header, config.max_geometry_depth)?);
        offset = start + len;
    }
    if header.features_count > 0 && features.len() as u64 != header.features_count {
        log::warn!(
            "header declares {} features, container holds {}",
            header.features_count,
            features.len()
        );
    }
    Ok((header, features))
}
