//! Container header and coordinate reference descriptor.

use crate::bbox::BoundingBox2D;
use crate::column::Column;
use crate::geometry::GeometryType;
use serde::{Deserialize, Serialize};

/// Coordinate reference system descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Crs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(default)]
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_string: Option<String>,
}

impl Crs {
    /// An `org:code` descriptor such as `EPSG:4326`.
    pub fn epsg(code: i32) -> Self {
        Self {
            org: Some("EPSG".to_string()),
            code,
            ..Default::default()
        }
    }
}

/// Decoded container header. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `[min_x, min_y, max_x, max_y, ...]`, optionally followed by z/m/t ranges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<Vec<f64>>,
    #[serde(default)]
    pub geometry_type: GeometryType,
    #[serde(default)]
    pub has_z: bool,
    #[serde(default)]
    pub has_m: bool,
    #[serde(default)]
    pub has_t: bool,
    #[serde(default)]
    pub has_tm: bool,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub features_count: u64,
    /// Branching factor of the packed index. 0 means the container has no index.
    #[serde(default = "Header::default_index_node_size")]
    pub index_node_size: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<Crs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl Header {
    pub const DEFAULT_INDEX_NODE_SIZE: u16 = 16;

    const fn default_index_node_size() -> u16 {
        Self::DEFAULT_INDEX_NODE_SIZE
    }

    pub fn new(geometry_type: GeometryType) -> Self {
        Self {
            geometry_type,
            ..Default::default()
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.index_node_size > 0 && self.features_count > 0
    }

    /// The 2D part of the envelope, if one was written.
    pub fn bounds(&self) -> Option<BoundingBox2D> {
        self.envelope.as_deref().and_then(BoundingBox2D::from_envelope)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

impl Default for Header {
    fn default() -> Self {
        Self {
            name: None,
            envelope: None,
            geometry_type: GeometryType::Unknown,
            has_z: false,
            has_m: false,
            has_t: false,
            has_tm: false,
            columns: Vec::new(),
            features_count: 0,
            index_node_size: Self::DEFAULT_INDEX_NODE_SIZE,
            crs: None,
            title: None,
            description: None,
            metadata: None,
        }
    }
}
