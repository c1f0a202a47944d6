//! Header, column and CRS table decoding.

use super::table::Table;
use crate::error::{FgbError, Result};
use fgbstream_types::{Column, ColumnType, Crs, GeometryType, Header};

pub(crate) mod slot {
    pub const NAME: u16 = 0;
    pub const ENVELOPE: u16 = 1;
    pub const GEOMETRY_TYPE: u16 = 2;
    pub const HAS_Z: u16 = 3;
    pub const HAS_M: u16 = 4;
    pub const HAS_T: u16 = 5;
    pub const HAS_TM: u16 = 6;
    pub const COLUMNS: u16 = 7;
    pub const FEATURES_COUNT: u16 = 8;
    pub const INDEX_NODE_SIZE: u16 = 9;
    pub const CRS: u16 = 10;
    pub const TITLE: u16 = 11;
    pub const DESCRIPTION: u16 = 12;
    pub const METADATA: u16 = 13;
}

pub(crate) mod column_slot {
    pub const NAME: u16 = 0;
    pub const TYPE: u16 = 1;
    pub const TITLE: u16 = 2;
    pub const DESCRIPTION: u16 = 3;
    pub const WIDTH: u16 = 4;
    pub const PRECISION: u16 = 5;
    pub const SCALE: u16 = 6;
    pub const NULLABLE: u16 = 7;
    pub const UNIQUE: u16 = 8;
    pub const PRIMARY_KEY: u16 = 9;
    pub const METADATA: u16 = 10;
}

pub(crate) mod crs_slot {
    pub const ORG: u16 = 0;
    pub const CODE: u16 = 1;
    pub const NAME: u16 = 2;
    pub const DESCRIPTION: u16 = 3;
    pub const WKT: u16 = 4;
    pub const CODE_STRING: u16 = 5;
}

pub(crate) fn geometry_type(tag: u8) -> Result<GeometryType> {
    GeometryType::try_from(tag).map_err(FgbError::UnknownGeometryType)
}

pub(crate) fn decode_column(table: &Table<'_>) -> Result<Column> {
    use column_slot as s;
    let name = table
        .get_string(s::NAME, "Column.name")?
        .ok_or(FgbError::MissingField("Column.name"))?;
    let tag = table.get_u8(s::TYPE, ColumnType::Byte.as_u8())?;
    let column_type = ColumnType::try_from(tag).map_err(FgbError::UnknownColumnType)?;
    Ok(Column {
        name,
        column_type,
        title: table.get_string(s::TITLE, "Column.title")?,
        description: table.get_string(s::DESCRIPTION, "Column.description")?,
        width: table.get_i32(s::WIDTH, Column::UNSPECIFIED)?,
        precision: table.get_i32(s::PRECISION, Column::UNSPECIFIED)?,
        scale: table.get_i32(s::SCALE, Column::UNSPECIFIED)?,
        nullable: table.get_bool(s::NULLABLE, true)?,
        unique: table.get_bool(s::UNIQUE, false)?,
        primary_key: table.get_bool(s::PRIMARY_KEY, false)?,
        metadata: table.get_string(s::METADATA, "Column.metadata")?,
    })
}

pub(crate) fn decode_columns(tables: Option<Vec<Table<'_>>>) -> Result<Vec<Column>> {
    tables
        .unwrap_or_default()
        .iter()
        .map(decode_column)
        .collect()
}

fn decode_crs(table: &Table<'_>) -> Result<Crs> {
    use crs_slot as s;
    Ok(Crs {
        org: table.get_string(s::ORG, "Crs.org")?,
        code: table.get_i32(s::CODE, 0)?,
        name: table.get_string(s::NAME, "Crs.name")?,
        description: table.get_string(s::DESCRIPTION, "Crs.description")?,
        wkt: table.get_string(s::WKT, "Crs.wkt")?,
        code_string: table.get_string(s::CODE_STRING, "Crs.code_string")?,
    })
}

/// Decode a header table. `bytes` starts with the root offset, i.e. it is
/// the region following the 4-byte header length.
pub fn decode_header(bytes: &[u8]) -> Result<Header> {
    use slot as s;
    let table = Table::root(bytes)?;
    let header = Header {
        name: table.get_string(s::NAME, "Header.name")?,
        envelope: table.get_f64_vec(s::ENVELOPE)?,
        geometry_type: geometry_type(table.get_u8(s::GEOMETRY_TYPE, 0)?)?,
        has_z: table.get_bool(s::HAS_Z, false)?,
        has_m: table.get_bool(s::HAS_M, false)?,
        has_t: table.get_bool(s::HAS_T, false)?,
        has_tm: table.get_bool(s::HAS_TM, false)?,
        columns: decode_columns(table.get_tables(s::COLUMNS)?)?,
        features_count: table.get_u64(s::FEATURES_COUNT, 0)?,
        index_node_size: table.get_u16(s::INDEX_NODE_SIZE, Header::DEFAULT_INDEX_NODE_SIZE)?,
        crs: table.get_table(s::CRS)?.as_ref().map(decode_crs).transpose()?,
        title: table.get_string(s::TITLE, "Header.title")?,
        description: table.get_string(s::DESCRIPTION, "Header.description")?,
        metadata: table.get_string(s::METADATA, "Header.metadata")?,
    };
    log::debug!(
        "decoded header: {} features, geometry {}, {} columns, node size {}",
        header.features_count,
        header.geometry_type,
        header.columns.len(),
        header.index_node_size
    );
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::builder::TableBuilder;
    use crate::codec::encode::encode_header;

    #[test]
    fn test_decode_minimal_header_defaults() {
        let buf = TableBuilder::new().finish();
        let header = decode_header(&buf).unwrap();
        assert_eq!(header, Header::default());
        assert_eq!(header.index_node_size, 16);
    }

    #[test]
    fn test_decode_full_header() {
        let mut header = Header::new(GeometryType::Polygon);
        header.name = Some("parcels".into());
        header.envelope = Some(vec![-1.0, -2.0, 3.0, 4.0]);
        header.has_z = true;
        header.features_count = 1 << 33;
        header.index_node_size = 0;
        header.crs = Some(Crs::epsg(4326));
        header.title = Some("Parcels".into());
        header.metadata = Some("{\"k\":1}".into());
        header.columns = vec![
            Column::new("id", ColumnType::ULong).with_nullable(false),
            Column::new("label", ColumnType::String).with_title("Label"),
        ];

        let decoded = decode_header(&encode_header(&header)).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_column_name_is_required() {
        let column = TableBuilder::new().add_u8(column_slot::TYPE, 11);
        let buf = TableBuilder::new()
            .add_tables(slot::COLUMNS, vec![column])
            .finish();
        assert!(matches!(
            decode_header(&buf),
            Err(FgbError::MissingField("Column.name"))
        ));
    }

    #[test]
    fn test_unknown_tags() {
        let buf = TableBuilder::new().add_u8(slot::GEOMETRY_TYPE, 42).finish();
        assert!(matches!(
            decode_header(&buf),
            Err(FgbError::UnknownGeometryType(42))
        ));

        let column = TableBuilder::new()
            .add_str(column_slot::NAME, "x")
            .add_u8(column_slot::TYPE, 99);
        let buf = TableBuilder::new()
            .add_tables(slot::COLUMNS, vec![column])
            .finish();
        assert!(matches!(
            decode_header(&buf),
            Err(FgbError::UnknownColumnType(99))
        ));
    }
}
