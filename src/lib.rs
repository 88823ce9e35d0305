//! mapsforge-reader - Decoder for mapsforge binary map files
//!
//! Reads the tiled vector map format used by mapsforge and its offspring
//! and turns tile requests into clipped, projected geometry: POIs as
//! points, ways as lines and polygons, each with its OSM tags and a
//! drawing layer.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mapsforge_reader::{MapElement, MapFile, QueryResult, Tile, TileDataSink, TileDataSource};
//!
//! #[derive(Default)]
//! struct Printer;
//!
//! impl TileDataSink for Printer {
//!     fn process(&mut self, element: &MapElement) {
//!         println!(
//!             "{:?} with {} points, name {:?}",
//!             element.kind(),
//!             element.num_points(),
//!             element.tags.value("name")
//!         );
//!     }
//!
//!     fn completed(&mut self, result: QueryResult) {
//!         println!("done: {:?}", result);
//!     }
//! }
//!
//! let map = MapFile::open("berlin.map")?;
//! println!("{:?}", map.info().bounding_box);
//!
//! let mut db = map.database();
//! db.query(Tile::containing(52.5163, 13.3777, 16), &mut Printer);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  Map File                            │
//! ├──────────────────────────────────────┤
//! │  header: magic, bbox, tag tables,    │
//! │          sub-file table              │
//! │  sub-file 0: index | blocks ...      │
//! │  sub-file 1: index | blocks ...      │
//! └──────────────────────────────────────┘
//!          ↓ MapFile::open (header only)
//! ┌──────────────────────────────────────┐
//! │  Arc<MapFile>: header + index cache  │
//! └──────────────────────────────────────┘
//!          ↓ one MapDatabase per worker
//! ┌──────────────────────────────────────┐
//! │  query(tile) → blocks → records →    │
//! │  project → clip → simplify → sink    │
//! └──────────────────────────────────────┘
//! ```
//!
//! Decoding problems inside a block never abort the process or the query:
//! they are logged through the [`log`] facade, the block is abandoned and
//! the query completes with [`QueryResult::Failed`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod block;
pub mod database;
pub mod decode;
/// Error types for map file operations
pub mod error;
pub mod geometry;
pub mod header;
pub mod index_cache;
pub mod language;
pub mod multi;
pub mod projection;
pub mod query;
pub mod read_buffer;
pub mod source;
pub mod tag;
/// Tile addressing
pub mod tile;
pub mod validation;

// Re-exports for Rust consumers

pub use crate::block::BlockStats;
pub use crate::database::{
    CancelHandle, MapDatabase, MapFile, MapFileOpener, MapFileOptions, QueryResult, QueryStats,
    TileDataSink, TileDataSource,
};
pub use crate::error::{MapError, Result};
pub use crate::geometry::{GeometryBuffer, GeometryType, MapElement};
pub use crate::header::{BoundingBox, FileInfo, LatLon, MapFileHeader, SubFileParameter};
pub use crate::multi::{MultiMapDataSink, MultiMapDatabase};
pub use crate::tag::{Tag, TagSet};
pub use crate::tile::Tile;

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(VERSION.split('.').count(), 3);
    }
}
