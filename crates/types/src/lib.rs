//! # fgbstream-types
//!
//! Data model for FlatGeobuf containers, shared by the decoder, the encoders
//! and anything that consumes decoded features:
//!
//! - **Header**: `Header`, `Crs`
//! - **Schema and values**: `Column`, `ColumnType`, `ColumnValue`, `Properties`
//! - **Geometry**: `GeometryType`, `Geometry`, `Coord`
//! - **Bounds**: `BoundingBox2D`
//!
//! All types are serializable with Serde. Geometries convert to the `geo`
//! crate's primitives for further processing.
//!
//! ## Examples
//!
//! ```rust
//! use fgbstream_types::bbox::BoundingBox2D;
//! use fgbstream_types::geometry::{Coord, Geometry};
//!
//! let point = Geometry::Point(Coord::new(1.0, 2.0));
//! let query = BoundingBox2D::new(0.0, 0.0, 3.0, 3.0);
//! assert!(query.intersects(&point.bounds().unwrap()));
//! ```

pub mod bbox;
pub mod column;
pub mod geometry;
pub mod header;

pub use bbox::BoundingBox2D;
pub use column::{Column, ColumnType, ColumnValue, Properties};
pub use geometry::{Coord, Geometry, GeometryType};
pub use header::{Crs, Header};
