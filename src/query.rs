//! Query planning: which blocks to read for a tile, and which of their
//! ways to keep.
//!
//! A sub-file stores one block per tile at its base zoom level. A request
//! at a coarser zoom covers a square of base tiles. A request at a finer
//! zoom lies inside a single base tile, and each way in that block
//! carries a 16-bit mask of the sub-tiles (4x4 at two levels below the
//! base zoom) it touches; the planner computes the mask of the requested
//! tile so the decoder can skip ways that miss it.
//!
//! ```text
//!  first level            second level bits
//!  +--------+--------+    +------+------+------+------+
//!  | 0xcc00 | 0x3300 |    |0x8000|0x4000|0x2000|0x1000|
//!  +--------+--------+    |0x0800|0x0400|0x0200|0x0100|
//!  | 0x00cc | 0x0033 |    |0x0080|0x0040|0x0020|0x0010|
//!  +--------+--------+    |0x0008|0x0004|0x0002|0x0001|
//!                         +------+------+------+------+
//! ```

use crate::header::SubFileParameter;
use crate::tile::Tile;

/// Blocks and filter for one tile query against one sub-file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryParameters {
    /// Zoom level the sub-file was chosen for
    pub query_zoom_level: u8,
    /// First base tile column covered by the request
    pub from_base_tile_x: i64,
    /// First base tile row covered by the request
    pub from_base_tile_y: i64,
    /// Last base tile column covered by the request
    pub to_base_tile_x: i64,
    /// Last base tile row covered by the request
    pub to_base_tile_y: i64,
    /// First block column to read
    pub from_block_x: i64,
    /// First block row to read
    pub from_block_y: i64,
    /// Last block column to read
    pub to_block_x: i64,
    /// Last block row to read
    pub to_block_y: i64,
    /// Sub-tile mask ways must intersect
    pub query_tile_bitmask: u16,
    /// Whether `query_tile_bitmask` applies
    pub use_tile_bitmask: bool,
}

impl QueryParameters {
    /// Plan a query for `tile` against `sub_file`.
    pub fn new(tile: Tile, query_zoom_level: u8, sub_file: &SubFileParameter) -> Self {
        let mut params = QueryParameters {
            query_zoom_level,
            ..Default::default()
        };
        params.calculate_base_tiles(tile, sub_file);
        params.calculate_blocks(sub_file);
        params
    }

    /// Map the requested tile onto the sub-file's base tiles.
    pub fn calculate_base_tiles(&mut self, tile: Tile, sub_file: &SubFileParameter) {
        let x = tile.x as i64;
        let y = tile.y as i64;
        let base = sub_file.base_zoom_level;

        if tile.zoom < base {
            let diff = base - tile.zoom;
            self.from_base_tile_x = x << diff;
            self.from_base_tile_y = y << diff;
            self.to_base_tile_x = self.from_base_tile_x + (1 << diff) - 1;
            self.to_base_tile_y = self.from_base_tile_y + (1 << diff) - 1;
            self.use_tile_bitmask = false;
        } else if tile.zoom > base {
            let diff = tile.zoom - base;
            self.from_base_tile_x = x >> diff;
            self.from_base_tile_y = y >> diff;
            self.to_base_tile_x = self.from_base_tile_x;
            self.to_base_tile_y = self.from_base_tile_y;
            self.use_tile_bitmask = true;
            self.query_tile_bitmask = calculate_tile_bitmask(tile, diff);
        } else {
            self.from_base_tile_x = x;
            self.from_base_tile_y = y;
            self.to_base_tile_x = x;
            self.to_base_tile_y = y;
            self.use_tile_bitmask = false;
        }
    }

    /// Clamp the base tile range to the blocks the sub-file stores.
    pub fn calculate_blocks(&mut self, sub_file: &SubFileParameter) {
        self.from_block_x = (self.from_base_tile_x - sub_file.boundary_tile_left).max(0);
        self.from_block_y = (self.from_base_tile_y - sub_file.boundary_tile_top).max(0);
        self.to_block_x =
            (self.to_base_tile_x - sub_file.boundary_tile_left).min(sub_file.blocks_width - 1);
        self.to_block_y =
            (self.to_base_tile_y - sub_file.boundary_tile_top).min(sub_file.blocks_height - 1);
    }

    /// Whether the clamped range selects no block at all.
    pub fn is_empty(&self) -> bool {
        self.from_block_x > self.to_block_x || self.from_block_y > self.to_block_y
    }

    /// Number of blocks the query visits.
    pub fn block_count(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        ((self.to_block_x - self.from_block_x + 1) * (self.to_block_y - self.from_block_y + 1))
            as u64
    }
}

/// Sub-tile mask of `tile`, `zoom_level_difference` levels below the base zoom.
///
/// A difference of one selects a quadrant (four bits). Any larger
/// difference selects one of the sixteen second-level sub-tiles that
/// contains the tile.
pub fn calculate_tile_bitmask(tile: Tile, zoom_level_difference: u8) -> u16 {
    if zoom_level_difference == 1 {
        return first_level_tile_bitmask(tile.x, tile.y);
    }

    let shift = zoom_level_difference.saturating_sub(2) as u32;
    let subtile_x = tile.x >> shift;
    let subtile_y = tile.y >> shift;
    let parent_x = subtile_x >> 1;
    let parent_y = subtile_y >> 1;

    let quadrant = first_level_tile_bitmask(parent_x, parent_y);
    let [ul, ur, ll, lr] = match quadrant {
        0xcc00 => [0x8000, 0x4000, 0x0800, 0x0400],
        0x3300 => [0x2000, 0x1000, 0x0200, 0x0100],
        0x00cc => [0x0080, 0x0040, 0x0008, 0x0004],
        _ => [0x0020, 0x0010, 0x0002, 0x0001],
    };
    match (subtile_x & 1, subtile_y & 1) {
        (0, 0) => ul,
        (1, 0) => ur,
        (0, _) => ll,
        _ => lr,
    }
}

fn first_level_tile_bitmask(x: u32, y: u32) -> u16 {
    match (x & 1, y & 1) {
        (0, 0) => 0xcc00,
        (1, 0) => 0x3300,
        (0, _) => 0x00cc,
        _ => 0x0033,
    }
}
