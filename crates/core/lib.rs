//! Streaming reader for FlatGeobuf containers over byte-range reads.
//!
//! ## Features
//! - **Record decoding**: header, column schema, geometry and typed properties
//!   read straight out of the container's table layout
//! - **Index search**: breadth-first walk of the packed Hilbert R-tree that
//!   merges nearby node reads into single requests
//! - **Batched feature reads**: hits are grouped into contiguous batches, each
//!   read through its own buffered client
//! - **Fan-in**: batches run as concurrent tasks merged into one stream in
//!   completion order
//!
//! ```rust
//! use fgbstream::{ContainerWriter, Feature, ReaderBuilder};
//! use fgbstream_types::{Column, ColumnType, Coord, Geometry, GeometryType, Header};
//! use futures::TryStreamExt;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> fgbstream::Result<()> {
//! let mut header = Header::new(GeometryType::Point);
//! header.columns = vec![Column::new("name", ColumnType::String)];
//! let mut writer = ContainerWriter::new(header);
//! writer.push(Feature::new(Geometry::Point(Coord::new(1.0, 2.0))).with_property("name", "a"));
//! let bytes = writer.finish()?;
//!
//! let mut reader = ReaderBuilder::new().open_bytes(bytes).await?;
//! let features: Vec<Feature> = reader.query_bbox(0.0, 0.0, 3.0, 3.0).await?.try_collect().await?;
//! assert_eq!(features.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
#[cfg(feature = "geojson")]
pub mod export;
pub mod index;
pub mod io;
pub mod merge;
pub mod reader;

pub use builder::ReaderBuilder;
pub use config::Config;
pub use error::{ErrorKind, FgbError, Result};
pub use reader::{FeatureStream, FgbReader, SessionState};

pub use batch::{Batch, BatchPlanner, FeatureLocation, plan_batches};
pub use codec::{ContainerWriter, Feature, PropertyEncoder, decode_container};
pub use index::{NodeItem, NodeRange, SearchResult, calc_tree_size, generate_level_bounds};
pub use io::{BufferedRangeClient, FileSource, InstrumentedSource, MemorySource, RangeSource};
pub use merge::StreamMerge;

#[cfg(feature = "http")]
pub use io::HttpRangeSource;

#[cfg(feature = "geojson")]
pub use export::{geometry_to_geojson, to_feature_collection};

pub use fgbstream_types::{BoundingBox2D, Header};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
