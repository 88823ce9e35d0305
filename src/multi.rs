//! Several map files answering queries as one
//!
//! Regional extracts are often split into separate files. A
//! [`MultiMapDatabase`] forwards each query to every file whose zoom range
//! covers the tile and reports a single completion for all of them.

use crate::database::{MapDatabase, MapFile, QueryResult, TileDataSink, TileDataSource};
use crate::error::{MapError, Result};
use crate::geometry::MapElement;
use crate::header::BoundingBox;
use crate::tile::Tile;
use std::sync::Arc;

/// Sink wrapper that passes elements through and remembers whether any
/// of the wrapped queries failed.
pub struct MultiMapDataSink<'a> {
    inner: &'a mut dyn TileDataSink,
    result: QueryResult,
}

impl<'a> MultiMapDataSink<'a> {
    /// Wrap `inner`.
    pub fn new(inner: &'a mut dyn TileDataSink) -> Self {
        Self {
            inner,
            result: QueryResult::Success,
        }
    }

    /// Combined result of every completion seen so far.
    pub fn result(&self) -> QueryResult {
        self.result
    }
}

impl TileDataSink for MultiMapDataSink<'_> {
    fn process(&mut self, element: &MapElement) {
        self.inner.process(element);
    }

    fn completed(&mut self, result: QueryResult) {
        if result == QueryResult::Failed {
            self.result = QueryResult::Failed;
        }
    }
}

struct Member {
    database: MapDatabase,
    zoom_range: Option<(u8, u8)>,
}

impl Member {
    fn covers(&self, zoom: u8) -> bool {
        match self.zoom_range {
            Some((min, max)) => (min..=max).contains(&zoom),
            None => true,
        }
    }
}

/// A tile source over several map files.
#[derive(Default)]
pub struct MultiMapDatabase {
    members: Vec<Member>,
}

impl std::fmt::Debug for MultiMapDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiMapDatabase")
            .field("members", &self.members.len())
            .finish()
    }
}

impl MultiMapDatabase {
    /// An empty composition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, optionally restricted to `zoom_range` (inclusive).
    ///
    /// Adding a file that is already part of the composition fails.
    pub fn add(&mut self, file: Arc<MapFile>, zoom_range: Option<(u8, u8)>) -> Result<()> {
        if let Some((min, max)) = zoom_range {
            if min > max {
                return Err(MapError::InvalidArgument(format!(
                    "invalid zoom range: {} > {}",
                    min, max
                )));
            }
        }
        let duplicate = self.members.iter().any(|m| {
            m.database
                .map_file()
                .is_some_and(|existing| Arc::ptr_eq(existing, &file))
        });
        if duplicate {
            return Err(MapError::InvalidArgument("duplicate map database".to_string()));
        }
        self.members.push(Member {
            database: file.database(),
            zoom_range,
        });
        Ok(())
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no file was added.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Union of the bounding boxes of all files still open.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.members
            .iter()
            .filter_map(|m| m.database.map_file())
            .map(|f| f.info().bounding_box)
            .reduce(|a, b| a.union(&b))
    }
}

impl TileDataSource for MultiMapDatabase {
    fn query(&mut self, tile: Tile, sink: &mut dyn TileDataSink) {
        let result = {
            let mut multi = MultiMapDataSink::new(sink);
            for member in self.members.iter_mut().filter(|m| m.covers(tile.zoom)) {
                member.database.query(tile, &mut multi);
            }
            multi.result()
        };
        sink.completed(result);
    }

    fn dispose(&mut self) {
        for member in &mut self.members {
            member.database.dispose();
        }
    }

    fn cancel(&self) {
        for member in &self.members {
            member.database.cancel();
        }
    }
}
