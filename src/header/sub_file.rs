use super::info::BoundingBox;
use crate::projection::{latitude_to_tile_y, longitude_to_tile_x};
use serde::Serialize;

/// Bytes per entry in a sub-file's block index.
pub const BYTES_PER_INDEX_ENTRY: u64 = 5;

/// Length of the debug signature in front of a sub-file index.
pub const SIGNATURE_LENGTH_INDEX: u64 = 16;

/// Layout of one sub-file: the blocks pre-tiled at one base zoom level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SubFileParameter {
    /// Zoom level at which blocks map one-to-one onto tiles
    pub base_zoom_level: u8,
    /// Lowest zoom level this sub-file answers for
    pub zoom_level_min: u8,
    /// Highest zoom level this sub-file answers for
    pub zoom_level_max: u8,
    /// Absolute offset of the sub-file
    pub start_address: u64,
    /// Absolute offset of the first index entry
    pub index_start_address: u64,
    /// Absolute offset just past the last index entry
    pub index_end_address: u64,
    /// Size of the sub-file in bytes
    pub sub_file_size: u64,
    /// Northernmost tile row at the base zoom level
    pub boundary_tile_top: i64,
    /// Southernmost tile row at the base zoom level
    pub boundary_tile_bottom: i64,
    /// Westernmost tile column at the base zoom level
    pub boundary_tile_left: i64,
    /// Easternmost tile column at the base zoom level
    pub boundary_tile_right: i64,
    /// Block columns
    pub blocks_width: i64,
    /// Block rows
    pub blocks_height: i64,
    /// `blocks_width * blocks_height`
    pub number_of_blocks: i64,
}

impl SubFileParameter {
    /// Derive the block grid from the file's bounding box.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        base_zoom_level: u8,
        zoom_level_min: u8,
        zoom_level_max: u8,
        start_address: u64,
        sub_file_size: u64,
        bounding_box: &BoundingBox,
        debug_file: bool,
    ) -> Self {
        let index_start_address = if debug_file {
            start_address + SIGNATURE_LENGTH_INDEX
        } else {
            start_address
        };

        let boundary_tile_bottom =
            latitude_to_tile_y(bounding_box.min_latitude(), base_zoom_level);
        let boundary_tile_left =
            longitude_to_tile_x(bounding_box.min_longitude(), base_zoom_level);
        let boundary_tile_top = latitude_to_tile_y(bounding_box.max_latitude(), base_zoom_level);
        let boundary_tile_right =
            longitude_to_tile_x(bounding_box.max_longitude(), base_zoom_level);

        let blocks_width = boundary_tile_right - boundary_tile_left + 1;
        let blocks_height = boundary_tile_bottom - boundary_tile_top + 1;
        let number_of_blocks = blocks_width * blocks_height;

        Self {
            base_zoom_level,
            zoom_level_min,
            zoom_level_max,
            start_address,
            index_start_address,
            index_end_address: index_start_address
                + number_of_blocks as u64 * BYTES_PER_INDEX_ENTRY,
            sub_file_size,
            boundary_tile_top,
            boundary_tile_bottom,
            boundary_tile_left,
            boundary_tile_right,
            blocks_width,
            blocks_height,
            number_of_blocks,
        }
    }

    /// Rows in each block's zoom table.
    pub fn zoom_table_rows(&self) -> usize {
        (self.zoom_level_max - self.zoom_level_min) as usize + 1
    }

    /// Absolute offset one past the end of the sub-file.
    pub fn end_address(&self) -> u64 {
        self.start_address + self.sub_file_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_grid_for_small_box() {
        // a box around central Berlin
        let bbox = BoundingBox {
            min_latitude_e6: 52_400_000,
            min_longitude_e6: 13_200_000,
            max_latitude_e6: 52_600_000,
            max_longitude_e6: 13_600_000,
        };
        let p = SubFileParameter::new(14, 12, 21, 1000, 5000, &bbox, false);
        assert!(p.blocks_width >= 1 && p.blocks_height >= 1);
        assert_eq!(p.number_of_blocks, p.blocks_width * p.blocks_height);
        assert_eq!(p.index_start_address, 1000);
        assert_eq!(
            p.index_end_address,
            1000 + p.number_of_blocks as u64 * BYTES_PER_INDEX_ENTRY
        );
        assert!(p.boundary_tile_top <= p.boundary_tile_bottom);
        assert_eq!(p.zoom_table_rows(), 10);

        let debug = SubFileParameter::new(14, 12, 21, 1000, 5000, &bbox, true);
        assert_eq!(debug.index_start_address, 1016);
    }
}
