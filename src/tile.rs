use crate::projection::{
    latitude_to_tile_y, longitude_to_tile_x, tile_x_to_longitude, tile_y_to_latitude,
};
use serde::Serialize;
use std::fmt;

/// Deepest zoom level a tile request may use.
pub const MAX_TILE_ZOOM: u8 = 30;

/// A square region of the projected map addressed by column, row and zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Tile {
    /// Column, counted eastwards from the antimeridian
    pub x: u32,
    /// Row, counted southwards from the northern edge
    pub y: u32,
    /// Zoom level; the world is `2^zoom` tiles wide
    pub zoom: u8,
}

impl Tile {
    /// Create a tile.
    pub const fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// The tile containing the given coordinate.
    pub fn containing(latitude: f64, longitude: f64, zoom: u8) -> Self {
        Self {
            x: longitude_to_tile_x(longitude, zoom) as u32,
            y: latitude_to_tile_y(latitude, zoom) as u32,
            zoom,
        }
    }

    /// Whether row and column lie inside the world at this zoom.
    pub fn is_valid(&self) -> bool {
        if self.zoom > MAX_TILE_ZOOM {
            return false;
        }
        let count = 1u64 << self.zoom;
        (self.x as u64) < count && (self.y as u64) < count
    }

    /// Western and eastern edge longitudes.
    pub fn longitude_span(&self) -> (f64, f64) {
        (
            tile_x_to_longitude(self.x as i64, self.zoom),
            tile_x_to_longitude(self.x as i64 + 1, self.zoom),
        )
    }

    /// Southern and northern edge latitudes.
    pub fn latitude_span(&self) -> (f64, f64) {
        (
            tile_y_to_latitude(self.y as i64 + 1, self.zoom),
            tile_y_to_latitude(self.y as i64, self.zoom),
        )
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}
