//! Column schema and typed property values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The 15 property value kinds, with their wire tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ColumnType {
    #[default]
    Byte = 0,
    UByte = 1,
    Bool = 2,
    Short = 3,
    UShort = 4,
    Int = 5,
    UInt = 6,
    Long = 7,
    ULong = 8,
    Float = 9,
    Double = 10,
    String = 11,
    Json = 12,
    DateTime = 13,
    Binary = 14,
}

impl ColumnType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Encoded width of a fixed-size value, `None` for length-prefixed kinds.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ColumnType::Byte | ColumnType::UByte | ColumnType::Bool => Some(1),
            ColumnType::Short | ColumnType::UShort => Some(2),
            ColumnType::Int | ColumnType::UInt | ColumnType::Float => Some(4),
            ColumnType::Long | ColumnType::ULong | ColumnType::Double => Some(8),
            ColumnType::String | ColumnType::Json | ColumnType::DateTime | ColumnType::Binary => {
                None
            }
        }
    }
}

impl TryFrom<u8> for ColumnType {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => ColumnType::Byte,
            1 => ColumnType::UByte,
            2 => ColumnType::Bool,
            3 => ColumnType::Short,
            4 => ColumnType::UShort,
            5 => ColumnType::Int,
            6 => ColumnType::UInt,
            7 => ColumnType::Long,
            8 => ColumnType::ULong,
            9 => ColumnType::Float,
            10 => ColumnType::Double,
            11 => ColumnType::String,
            12 => ColumnType::Json,
            13 => ColumnType::DateTime,
            14 => ColumnType::Binary,
            other => return Err(other),
        })
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Schema entry for one property column.
///
/// `width`, `precision` and `scale` use `-1` for "unspecified".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "Column::unspecified")]
    pub width: i32,
    #[serde(default = "Column::unspecified")]
    pub precision: i32,
    #[serde(default = "Column::unspecified")]
    pub scale: i32,
    #[serde(default = "Column::default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl Column {
    pub const UNSPECIFIED: i32 = -1;

    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            title: None,
            description: None,
            width: Self::UNSPECIFIED,
            precision: Self::UNSPECIFIED,
            scale: Self::UNSPECIFIED,
            nullable: true,
            unique: false,
            primary_key: false,
            metadata: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    const fn unspecified() -> i32 {
        Self::UNSPECIFIED
    }

    const fn default_nullable() -> bool {
        true
    }
}

/// A decoded property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Byte(i8),
    UByte(u8),
    Bool(bool),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Float(f32),
    Double(f64),
    String(String),
    Json(serde_json::Value),
    /// ISO-8601 text, kept as written.
    DateTime(String),
    Binary(Vec<u8>),
}

impl ColumnValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnValue::Byte(_) => ColumnType::Byte,
            ColumnValue::UByte(_) => ColumnType::UByte,
            ColumnValue::Bool(_) => ColumnType::Bool,
            ColumnValue::Short(_) => ColumnType::Short,
            ColumnValue::UShort(_) => ColumnType::UShort,
            ColumnValue::Int(_) => ColumnType::Int,
            ColumnValue::UInt(_) => ColumnType::UInt,
            ColumnValue::Long(_) => ColumnType::Long,
            ColumnValue::ULong(_) => ColumnType::ULong,
            ColumnValue::Float(_) => ColumnType::Float,
            ColumnValue::Double(_) => ColumnType::Double,
            ColumnValue::String(_) => ColumnType::String,
            ColumnValue::Json(_) => ColumnType::Json,
            ColumnValue::DateTime(_) => ColumnType::DateTime,
            ColumnValue::Binary(_) => ColumnType::Binary,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ColumnValue::String(s) | ColumnValue::DateTime(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a JSON value. Binary becomes an array of byte values;
    /// non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            ColumnValue::Byte(v) => Value::from(*v),
            ColumnValue::UByte(v) => Value::from(*v),
            ColumnValue::Bool(v) => Value::from(*v),
            ColumnValue::Short(v) => Value::from(*v),
            ColumnValue::UShort(v) => Value::from(*v),
            ColumnValue::Int(v) => Value::from(*v),
            ColumnValue::UInt(v) => Value::from(*v),
            ColumnValue::Long(v) => Value::from(*v),
            ColumnValue::ULong(v) => Value::from(*v),
            ColumnValue::Float(v) => serde_json::Number::from_f64(f64::from(*v))
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ColumnValue::Double(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ColumnValue::String(s) | ColumnValue::DateTime(s) => Value::from(s.as_str()),
            ColumnValue::Json(v) => v.clone(),
            ColumnValue::Binary(b) => Value::from(b.clone()),
        }
    }
}

impl From<&str> for ColumnValue {
    fn from(s: &str) -> Self {
        ColumnValue::String(s.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(s: String) -> Self {
        ColumnValue::String(s)
    }
}

impl From<f64> for ColumnValue {
    fn from(v: f64) -> Self {
        ColumnValue::Double(v)
    }
}

impl From<i32> for ColumnValue {
    fn from(v: i32) -> Self {
        ColumnValue::Int(v)
    }
}

impl From<bool> for ColumnValue {
    fn from(v: bool) -> Self {
        ColumnValue::Bool(v)
    }
}

/// Decoded properties keyed by column name.
pub type Properties = BTreeMap<String, ColumnValue>;

/// Convert a property map into a JSON object.
pub fn properties_to_json(props: &Properties) -> serde_json::Map<String, serde_json::Value> {
    props
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_type_tags() {
        for tag in 0..=14u8 {
            assert_eq!(ColumnType::try_from(tag).unwrap().as_u8(), tag);
        }
        assert_eq!(ColumnType::try_from(15), Err(15));
    }

    #[test]
    fn test_fixed_width() {
        assert_eq!(ColumnType::Bool.fixed_width(), Some(1));
        assert_eq!(ColumnType::UShort.fixed_width(), Some(2));
        assert_eq!(ColumnType::Float.fixed_width(), Some(4));
        assert_eq!(ColumnType::ULong.fixed_width(), Some(8));
        assert_eq!(ColumnType::Json.fixed_width(), None);
    }

    #[test]
    fn test_column_defaults() {
        let col = Column::new("name", ColumnType::String);
        assert_eq!(col.scale, -1);
        assert_eq!(col.width, -1);
        assert!(col.nullable);
        assert!(!col.unique);
        assert!(!col.primary_key);

        let parsed: Column = serde_json::from_value(json!({"name": "n", "type": "Int"})).unwrap();
        assert_eq!(parsed, Column::new("n", ColumnType::Int));
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(ColumnValue::from("a").to_json(), json!("a"));
        assert_eq!(ColumnValue::ULong(u64::MAX).to_json(), json!(u64::MAX));
        assert_eq!(ColumnValue::Double(f64::NAN).to_json(), json!(null));
        assert_eq!(ColumnValue::Binary(vec![1, 2]).to_json(), json!([1, 2]));
        assert_eq!(
            ColumnValue::Json(json!({"k": [1, 2]})).to_json(),
            json!({"k": [1, 2]})
        );
    }

    #[test]
    fn test_properties_to_json() {
        let mut props = Properties::new();
        props.insert("name".into(), "a".into());
        props.insert("pop".into(), ColumnValue::Int(7));
        let obj = properties_to_json(&props);
        assert_eq!(serde_json::Value::Object(obj), json!({"name": "a", "pop": 7}));
    }
}
