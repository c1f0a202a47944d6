//! Property payload decoding.
//!
//! A payload is a flat run of `(u16 column index, value)` entries. Fixed-width
//! values are little-endian; string, JSON, datetime and binary values carry a
//! u32 length prefix.

use super::table::{read_u8, read_u16, read_u32, read_u64};
use crate::error::{FgbError, Result};
use fgbstream_types::{Column, ColumnType, ColumnValue, Properties};

fn take<'a>(bytes: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8]> {
    let start = *offset;
    let slice = start
        .checked_add(len)
        .and_then(|end| bytes.get(start..end))
        .ok_or_else(|| FgbError::truncated(start, len, bytes.len().saturating_sub(start)))?;
    *offset += len;
    Ok(slice)
}

fn take_prefixed<'a>(bytes: &'a [u8], offset: &mut usize) -> Result<&'a [u8]> {
    let len = read_u32(bytes, *offset)? as usize;
    *offset += 4;
    take(bytes, offset, len)
}

fn take_text(bytes: &[u8], offset: &mut usize, column: &Column) -> Result<String> {
    let raw = take_prefixed(bytes, offset)?;
    String::from_utf8(raw.to_vec()).map_err(|_| {
        log::debug!("invalid UTF-8 in column {}", column.name);
        FgbError::InvalidUtf8("property value")
    })
}

fn decode_value(bytes: &[u8], offset: &mut usize, column: &Column) -> Result<ColumnValue> {
    let pos = *offset;
    let value = match column.column_type {
        ColumnType::Byte => ColumnValue::Byte(read_u8(bytes, pos)? as i8),
        ColumnType::UByte => ColumnValue::UByte(read_u8(bytes, pos)?),
        ColumnType::Bool => ColumnValue::Bool(read_u8(bytes, pos)? != 0),
        ColumnType::Short => ColumnValue::Short(read_u16(bytes, pos)? as i16),
        ColumnType::UShort => ColumnValue::UShort(read_u16(bytes, pos)?),
        ColumnType::Int => ColumnValue::Int(read_u32(bytes, pos)? as i32),
        ColumnType::UInt => ColumnValue::UInt(read_u32(bytes, pos)?),
        ColumnType::Long => ColumnValue::Long(read_u64(bytes, pos)? as i64),
        ColumnType::ULong => ColumnValue::ULong(read_u64(bytes, pos)?),
        ColumnType::Float => ColumnValue::Float(f32::from_bits(read_u32(bytes, pos)?)),
        ColumnType::Double => ColumnValue::Double(f64::from_bits(read_u64(bytes, pos)?)),
        ColumnType::String => return Ok(ColumnValue::String(take_text(bytes, offset, column)?)),
        ColumnType::DateTime => {
            return Ok(ColumnValue::DateTime(take_text(bytes, offset, column)?));
        }
        ColumnType::Json => {
            let raw = take_prefixed(bytes, offset)?;
            return Ok(ColumnValue::Json(serde_json::from_slice(raw)?));
        }
        ColumnType::Binary => {
            return Ok(ColumnValue::Binary(take_prefixed(bytes, offset)?.to_vec()));
        }
    };
    if let Some(width) = column.column_type.fixed_width() {
        *offset += width;
    }
    Ok(value)
}

/// Decode a property payload against the active column list.
pub fn decode_properties(bytes: &[u8], columns: &[Column]) -> Result<Properties> {
    let mut properties = Properties::new();
    if columns.is_empty() {
        return Ok(properties);
    }
    let mut offset = 0usize;
    while offset < bytes.len() {
        let index = read_u16(bytes, offset)?;
        offset += 2;
        let column = columns
            .get(usize::from(index))
            .ok_or(FgbError::ColumnIndexOutOfRange {
                index,
                count: columns.len(),
            })?;
        let value = decode_value(bytes, &mut offset, column)?;
        properties.insert(column.name.clone(), value);
    }
    Ok(properties)
}
