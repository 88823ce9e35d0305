//! LRU cache of sub-file index blocks
//!
//! Each sub-file starts with an index of 5-byte entries, one per block.
//! Entries are read in groups of [`INDEX_ENTRIES_PER_BLOCK`] so that
//! neighbouring blocks of a query usually hit the cache.

use crate::decode;
use crate::error::{MapError, Result};
use crate::header::{SubFileParameter, BYTES_PER_INDEX_ENTRY};
use crate::source::MapSource;
use lru::LruCache;
use rustc_hash::FxBuildHasher;
use std::io;
use std::num::NonZeroUsize;

/// Index entries per cached index block.
pub const INDEX_ENTRIES_PER_BLOCK: u64 = 128;

/// Bytes of one full index block.
pub const SIZE_OF_INDEX_BLOCK: u64 = INDEX_ENTRIES_PER_BLOCK * BYTES_PER_INDEX_ENTRY;

/// Default number of index blocks kept.
pub const DEFAULT_CAPACITY: usize = 64;

const OFFSET_MASK: u64 = 0x7F_FFFF_FFFF;
const WATER_MASK: u64 = 0x80_0000_0000;

/// Cache key: sub-file position in the header plus index block number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexCacheKey {
    /// Position of the sub-file in the header's sub-file table
    pub sub_file: usize,
    /// Block number divided by [`INDEX_ENTRIES_PER_BLOCK`]
    pub index_block: u64,
}

/// One decoded index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Block offset relative to the sub-file start
    pub offset: u64,
    /// Whether the block is covered by water only
    pub water: bool,
}

impl IndexEntry {
    /// Split a raw 40-bit entry into offset and water flag.
    pub fn from_raw(raw: u64) -> Self {
        Self {
            offset: raw & OFFSET_MASK,
            water: raw & WATER_MASK != 0,
        }
    }
}

/// Fixed-capacity LRU cache of raw index blocks.
pub struct IndexCache {
    map: LruCache<IndexCacheKey, Vec<u8>, FxBuildHasher>,
}

impl std::fmt::Debug for IndexCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCache")
            .field("len", &self.map.len())
            .field("capacity", &self.map.cap())
            .finish()
    }
}

impl IndexCache {
    /// A cache holding at most `capacity` index blocks.
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            MapError::InvalidArgument("index cache capacity must be at least 1".to_string())
        })?;
        Ok(Self {
            map: LruCache::with_hasher(capacity, FxBuildHasher),
        })
    }

    /// Maximum number of cached index blocks.
    pub fn capacity(&self) -> usize {
        self.map.cap().get()
    }

    /// Index blocks currently cached.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drop every cached block.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Look up the index entry of `block_number` in sub-file `sub_file`,
    /// reading its index block from `source` on a miss.
    pub fn get_index_entry(
        &mut self,
        source: &dyn MapSource,
        sub_file: usize,
        params: &SubFileParameter,
        block_number: u64,
    ) -> Result<IndexEntry> {
        if block_number >= params.number_of_blocks.max(0) as u64 {
            return Err(MapError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid block number: {}", block_number),
            )));
        }

        let key = IndexCacheKey {
            sub_file,
            index_block: block_number / INDEX_ENTRIES_PER_BLOCK,
        };

        if !self.map.contains(&key) {
            let block = read_index_block(source, params, key.index_block)?;
            self.map.put(key, block);
        }
        let block = self
            .map
            .get(&key)
            .ok_or_else(|| MapError::decode("index block missing after insert"))?;

        let mut at = ((block_number % INDEX_ENTRIES_PER_BLOCK) * BYTES_PER_INDEX_ENTRY) as usize;
        let raw = decode::read_five_bytes(block, &mut at)?;
        Ok(IndexEntry::from_raw(raw))
    }
}

fn read_index_block(
    source: &dyn MapSource,
    params: &SubFileParameter,
    index_block: u64,
) -> Result<Vec<u8>> {
    let position = params.index_start_address + index_block * SIZE_OF_INDEX_BLOCK;
    let remaining = params.index_end_address.saturating_sub(position);
    let size = SIZE_OF_INDEX_BLOCK.min(remaining) as usize;

    let mut block = vec![0u8; size];
    let got = source.read_at(position, &mut block)?;
    if got != size {
        return Err(MapError::short_read(size, got, position));
    }
    Ok(block)
}
