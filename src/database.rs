//! Opening map files and answering tile queries
//!
//! A [`MapFile`] is the shared, immutable part of an open file: the byte
//! source, the validated header, the decoder options and the index cache.
//! It lives behind an `Arc` and can serve any number of threads.
//!
//! A [`MapDatabase`] is the per-worker query object. It owns the scratch
//! buffers one query needs and streams decoded elements into a
//! [`TileDataSink`].
//!
//! # Example
//!
//! ```no_run
//! use mapsforge_reader::{MapElement, MapFile, QueryResult, Tile, TileDataSink, TileDataSource};
//!
//! struct Count(usize);
//!
//! impl TileDataSink for Count {
//!     fn process(&mut self, _element: &MapElement) {
//!         self.0 += 1;
//!     }
//!     fn completed(&mut self, result: QueryResult) {
//!         println!("{} elements, {:?}", self.0, result);
//!     }
//! }
//!
//! let map = MapFile::from("berlin.map")
//!     .preferred_language("de")
//!     .mmap()
//!     .open()?;
//! let mut db = map.database();
//! db.query(Tile::containing(52.52, 13.40, 14), &mut Count(0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::block::{decode_block, BlockContext, BlockStats, QueryScratch};
use crate::error::{MapError, Result};
use crate::geometry::MapElement;
use crate::header::{FileInfo, MapFileHeader, SubFileParameter};
use crate::index_cache::{IndexCache, IndexEntry, DEFAULT_CAPACITY};
use crate::projection::{tile_x_to_longitude, tile_y_to_latitude};
use crate::query::QueryParameters;
use crate::read_buffer::{ReadBuffer, MAXIMUM_BUFFER_SIZE};
use crate::source::{FileSource, MapSource, MemorySource, MmapSource};
use crate::tile::Tile;
use log::{debug, error, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome reported once per query through [`TileDataSink::completed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryResult {
    /// Every block of the query decoded
    Success,
    /// The query could not run, was cancelled, or at least one block failed
    Failed,
}

/// Consumer of decoded map elements.
pub trait TileDataSink {
    /// Called once per decoded element. The element is reused afterwards.
    fn process(&mut self, element: &MapElement);

    /// Called exactly once when the query is over.
    fn completed(&mut self, result: QueryResult);
}

/// Something that answers tile queries.
pub trait TileDataSource {
    /// Decode `tile` into `sink`. Never fails: problems end up in
    /// [`TileDataSink::completed`].
    fn query(&mut self, tile: Tile, sink: &mut dyn TileDataSink);

    /// Release buffers and the reference to the open file.
    fn dispose(&mut self);

    /// Ask a running or future query to stop at the next block boundary.
    fn cancel(&self);
}

/// Decoder settings fixed when a file is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapFileOptions {
    /// Index blocks kept in the LRU cache
    pub index_cache_capacity: usize,
    /// Language used to pick localized names, e.g. `de` or `en-GB`
    pub preferred_language: Option<String>,
    /// Read names from the per-block string table of version 4 files
    pub string_table: bool,
}

impl Default for MapFileOptions {
    fn default() -> Self {
        Self {
            index_cache_capacity: DEFAULT_CAPACITY,
            preferred_language: None,
            string_table: false,
        }
    }
}

/// Fluent configuration for opening a map file, see [`MapFile::from`].
#[derive(Debug, Clone)]
pub struct MapFileOpener {
    path: PathBuf,
    options: MapFileOptions,
    mmap: bool,
}

impl MapFileOpener {
    /// Number of index blocks the cache keeps (default 64).
    pub fn index_cache_capacity(mut self, capacity: usize) -> Self {
        self.options.index_cache_capacity = capacity;
        self
    }

    /// Preferred language for localized names.
    pub fn preferred_language(mut self, language: impl Into<String>) -> Self {
        self.options.preferred_language = Some(language.into());
        self
    }

    /// Enable the experimental per-block string table (version 4 files only).
    pub fn string_table(mut self, enable: bool) -> Self {
        self.options.string_table = enable;
        self
    }

    /// Memory-map the file instead of reading through a file handle.
    pub fn mmap(mut self) -> Self {
        self.mmap = true;
        self
    }

    /// Replace all options at once.
    pub fn options(mut self, options: MapFileOptions) -> Self {
        self.options = options;
        self
    }

    /// Check the file, read its header and build the shared state.
    pub fn open(self) -> Result<Arc<MapFile>> {
        let source: Box<dyn MapSource> = if self.mmap {
            Box::new(MmapSource::open(&self.path)?)
        } else {
            Box::new(FileSource::open(&self.path)?)
        };
        let mut file = MapFile::build(source, self.options)?;
        debug!(
            "opened {} ({} bytes, version {})",
            self.path.display(),
            file.info().file_size,
            file.info().file_version
        );
        file.path = Some(self.path);
        Ok(Arc::new(file))
    }
}

/// An open map file, shared between queries.
pub struct MapFile {
    source: Box<dyn MapSource>,
    header: MapFileHeader,
    options: MapFileOptions,
    index_cache: Mutex<IndexCache>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for MapFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapFile")
            .field("path", &self.path)
            .field("len", &self.source.len())
            .field("options", &self.options)
            .finish()
    }
}

impl MapFile {
    /// Start configuring how `path` is opened.
    #[allow(clippy::should_implement_trait)]
    pub fn from<P: AsRef<Path>>(path: P) -> MapFileOpener {
        MapFileOpener {
            path: path.as_ref().to_path_buf(),
            options: MapFileOptions::default(),
            mmap: false,
        }
    }

    /// Open `path` with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        Self::from(path).open()
    }

    /// Open a map file held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Arc<Self>> {
        Self::from_source(Box::new(MemorySource::new(bytes)), MapFileOptions::default())
    }

    /// Open a map file from any byte source.
    pub fn from_source(source: Box<dyn MapSource>, options: MapFileOptions) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::build(source, options)?))
    }

    fn build(source: Box<dyn MapSource>, options: MapFileOptions) -> Result<Self> {
        let index_cache = IndexCache::new(options.index_cache_capacity)?;
        let mut buffer = ReadBuffer::new();
        let header = MapFileHeader::read(source.as_ref(), &mut buffer)?;
        if options.string_table && header.info().file_version < 4 {
            warn!(
                "string table requested but file version is {}, ignoring",
                header.info().file_version
            );
        }
        Ok(Self {
            source,
            header,
            options,
            index_cache: Mutex::new(index_cache),
            path: None,
        })
    }

    /// Parsed header.
    pub fn header(&self) -> &MapFileHeader {
        &self.header
    }

    /// File metadata.
    pub fn info(&self) -> &FileInfo {
        self.header.info()
    }

    /// Options the file was opened with.
    pub fn options(&self) -> &MapFileOptions {
        &self.options
    }

    /// Path the file was opened from, if it came from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether way strings are read through the per-block string table.
    pub fn string_table_active(&self) -> bool {
        self.options.string_table && self.info().file_version >= 4
    }

    pub(crate) fn source(&self) -> &dyn MapSource {
        self.source.as_ref()
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, IndexCache>> {
        self.index_cache
            .lock()
            .map_err(|_| MapError::Io(std::io::Error::other("index cache lock poisoned")))
    }

    /// Index entry of `block_number` in the sub-file at `sub_file`.
    pub fn index_entry(&self, sub_file: usize, block_number: u64) -> Result<IndexEntry> {
        let params = self.header.sub_files().get(sub_file).ok_or_else(|| {
            MapError::InvalidArgument(format!("no sub-file with index {}", sub_file))
        })?;
        self.lock_cache()?
            .get_index_entry(self.source(), sub_file, params, block_number)
    }

    /// Forget all cached index blocks.
    pub fn clear_index_cache(&self) {
        if let Ok(mut cache) = self.index_cache.lock() {
            cache.clear();
        }
    }

    /// A new query object reading from this file.
    pub fn database(self: &Arc<Self>) -> MapDatabase {
        MapDatabase::new(Arc::clone(self))
    }
}

/// Cloneable handle that cancels the queries of one [`MapDatabase`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Counters of one finished query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    /// Blocks read and decoded, failed ones included
    pub blocks: u64,
    /// Blocks skipped because they were empty or oversized
    pub skipped_blocks: u64,
    /// Blocks that failed to read or decode
    pub failed_blocks: u64,
    /// POI elements emitted
    pub pois: usize,
    /// Way elements emitted
    pub ways: usize,
}

impl QueryStats {
    fn add(&mut self, block: BlockStats) {
        self.pois += block.pois;
        self.ways += block.ways;
    }

    /// Result reported to the sink for these counters.
    pub fn result(&self) -> QueryResult {
        if self.failed_blocks == 0 {
            QueryResult::Success
        } else {
            QueryResult::Failed
        }
    }
}

/// Per-worker query object over a shared [`MapFile`].
pub struct MapDatabase {
    file: Option<Arc<MapFile>>,
    scratch: Option<Box<QueryScratch>>,
    cancelled: Arc<AtomicBool>,
}

impl std::fmt::Debug for MapDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapDatabase")
            .field("file", &self.file)
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .finish()
    }
}

impl MapDatabase {
    /// A query object for `file`.
    pub fn new(file: Arc<MapFile>) -> Self {
        Self {
            file: Some(file),
            scratch: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The file this object reads, until [`dispose`](TileDataSource::dispose).
    pub fn map_file(&self) -> Option<&Arc<MapFile>> {
        self.file.as_ref()
    }

    /// Handle for cancelling from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancelled),
        }
    }

    /// Whether cancellation was requested. The flag stays set.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Decode `tile` into `sink` without calling `completed`.
    ///
    /// Failed blocks are logged and counted in the returned stats. An
    /// error means the query could not run at all or was cancelled.
    pub fn query_tile(&mut self, tile: Tile, sink: &mut dyn TileDataSink) -> Result<QueryStats> {
        let file = self
            .file
            .clone()
            .ok_or_else(|| MapError::InvalidArgument("map database was disposed".to_string()))?;
        if !tile.is_valid() {
            return Err(MapError::InvalidArgument(format!("invalid tile {}", tile)));
        }
        if self.is_cancelled() {
            return Err(MapError::Cancelled);
        }

        let header = file.header();
        let query_zoom = header.query_zoom_level(tile.zoom);
        let sub_file_index = header.sub_file_index(query_zoom).ok_or_else(|| {
            MapError::InvalidArgument(format!("no sub-file for zoom level {}", query_zoom))
        })?;
        let sub_file = &header.sub_files()[sub_file_index];
        let query = QueryParameters::new(tile, query_zoom, sub_file);

        let scratch = self
            .scratch
            .get_or_insert_with(|| Box::new(QueryScratch::new()));
        scratch.projection.set_tile(tile);

        let language = file.options().preferred_language.as_deref();
        let string_table = file.string_table_active();
        let mut stats = QueryStats::default();

        debug!(
            "query {}: zoom {} sub-file {} blocks {}..={} x {}..={}",
            tile,
            query_zoom,
            sub_file_index,
            query.from_block_x,
            query.to_block_x,
            query.from_block_y,
            query.to_block_y
        );

        if query.is_empty() {
            return Ok(stats);
        }

        for row in query.from_block_y..=query.to_block_y {
            for col in query.from_block_x..=query.to_block_x {
                if self.cancelled.load(Ordering::Relaxed) {
                    debug!("query {} cancelled", tile);
                    return Err(MapError::Cancelled);
                }
                scratch.set_tile_clipping(&query, row - query.from_block_y, col - query.from_block_x);

                let block = BlockAddress {
                    sub_file: sub_file_index,
                    row,
                    col,
                };
                match load_block(&file, sub_file, block, &mut scratch.buffer) {
                    Ok(BlockLoad::Loaded) => {}
                    Ok(BlockLoad::Skipped) => {
                        stats.skipped_blocks += 1;
                        continue;
                    }
                    Err(e) => {
                        error!("block {}/{} of query {}: {}", row, col, tile, e);
                        stats.blocks += 1;
                        stats.failed_blocks += 1;
                        continue;
                    }
                }

                let (tile_latitude, tile_longitude) = block_origin(sub_file, row, col);
                let ctx = BlockContext {
                    info: file.info(),
                    sub_file,
                    query: &query,
                    language,
                    string_table,
                    tile_latitude,
                    tile_longitude,
                };
                stats.blocks += 1;
                match decode_block(&ctx, scratch, sink) {
                    Ok(block_stats) => stats.add(block_stats),
                    Err(e) => {
                        error!("block {}/{} of query {}: {}", row, col, tile, e);
                        stats.failed_blocks += 1;
                    }
                }
            }
        }

        debug!(
            "query {}: {} blocks, {} failed, {} POIs, {} ways",
            tile, stats.blocks, stats.failed_blocks, stats.pois, stats.ways
        );
        Ok(stats)
    }
}

impl TileDataSource for MapDatabase {
    fn query(&mut self, tile: Tile, sink: &mut dyn TileDataSink) {
        let result = match self.query_tile(tile, sink) {
            Ok(stats) => stats.result(),
            Err(e) => {
                warn!("query {} failed: {}", tile, e);
                QueryResult::Failed
            }
        };
        sink.completed(result);
    }

    fn dispose(&mut self) {
        self.scratch = None;
        self.file = None;
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// Position of one block: sub-file index, block row and block column.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockAddress {
    pub sub_file: usize,
    pub row: i64,
    pub col: i64,
}

pub(crate) enum BlockLoad {
    Loaded,
    Skipped,
}

/// Microdegree latitude and longitude of the north-west corner of a block.
pub(crate) fn block_origin(params: &SubFileParameter, row: i64, col: i64) -> (i64, i64) {
    let zoom = params.base_zoom_level;
    (
        (tile_y_to_latitude(params.boundary_tile_top + row, zoom) * 1e6) as i64,
        (tile_x_to_longitude(params.boundary_tile_left + col, zoom) * 1e6) as i64,
    )
}

/// Read the data of one block into `buffer`, using the index to find it.
pub(crate) fn load_block(
    file: &MapFile,
    params: &SubFileParameter,
    block: BlockAddress,
    buffer: &mut ReadBuffer,
) -> Result<BlockLoad> {
    let block_number = (block.row * params.blocks_width + block.col) as u64;
    let sub_file_size = params.sub_file_size;

    let pointer = file.index_entry(block.sub_file, block_number)?.offset;
    if pointer < 1 || pointer > sub_file_size {
        return Err(MapError::decode(format!(
            "invalid current block pointer: {}",
            pointer
        )));
    }

    let next_pointer = if block_number + 1 == params.number_of_blocks as u64 {
        sub_file_size
    } else {
        let next = file.index_entry(block.sub_file, block_number + 1)?.offset;
        if next < 1 || next > sub_file_size {
            return Err(MapError::decode(format!(
                "invalid next block pointer: {}",
                next
            )));
        }
        next
    };

    let size = next_pointer.checked_sub(pointer).ok_or_else(|| {
        MapError::decode(format!(
            "block size must not be negative: {} - {}",
            next_pointer, pointer
        ))
    })?;
    if size == 0 {
        return Ok(BlockLoad::Skipped);
    }
    if size > MAXIMUM_BUFFER_SIZE as u64 {
        warn!("block {} too large: {} bytes", block_number, size);
        return Ok(BlockLoad::Skipped);
    }
    let offset = params.start_address + pointer;
    if offset + size > file.info().file_size {
        return Err(MapError::decode(format!(
            "block {} ends beyond the file: {} + {}",
            block_number, offset, size
        )));
    }

    buffer.read_from_source(file.source(), offset, size as usize)?;
    Ok(BlockLoad::Loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default() {
        let options = MapFileOptions::default();
        assert_eq!(options.index_cache_capacity, 64);
        assert!(options.preferred_language.is_none());
        assert!(!options.string_table);
    }

    #[test]
    fn test_opener_collects_options() {
        let opener = MapFile::from("/tmp/none.map")
            .index_cache_capacity(8)
            .preferred_language("de")
            .string_table(true)
            .mmap();
        assert_eq!(opener.options.index_cache_capacity, 8);
        assert_eq!(opener.options.preferred_language.as_deref(), Some("de"));
        assert!(opener.options.string_table);
        assert!(opener.mmap);
    }

    #[test]
    fn test_open_failures() {
        assert!(matches!(
            MapFile::open("/nonexistent/berlin.map"),
            Err(MapError::Io(_))
        ));
        assert!(matches!(
            MapFile::from_bytes(b"not a map file at all, just text".to_vec()),
            Err(MapError::Format(_))
        ));
        assert!(matches!(
            MapFile::from_bytes(Vec::new()),
            Err(MapError::Format(_))
        ));
    }

    #[test]
    fn test_query_stats_result() {
        let mut stats = QueryStats::default();
        assert_eq!(stats.result(), QueryResult::Success);
        stats.failed_blocks = 1;
        assert_eq!(stats.result(), QueryResult::Failed);
    }

    #[test]
    fn test_cancel_handle_is_shared() {
        let flag = Arc::new(AtomicBool::new(false));
        let handle = CancelHandle {
            flag: Arc::clone(&flag),
        };
        let other = handle.clone();
        other.cancel();
        assert!(handle.is_cancelled());
        assert!(flag.load(Ordering::Relaxed));
    }
}
