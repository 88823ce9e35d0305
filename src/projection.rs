//! Web Mercator math shared by the header parser, the query planner and
//! the tile projection
//!
//! Coordinates in a map file are integer microdegrees. The functions here
//! take and return plain degrees; convert with [`micro_to_degrees`] and
//! [`degrees_to_micro`].
//!
//! Pixel space follows the usual slippy-map convention: the world at zoom
//! `z` is `TILE_SIZE << z` pixels square, with `y` growing southwards.

use std::f64::consts::PI;

/// Edge length of a tile in pixels.
pub const TILE_SIZE: u32 = 512;

/// Northernmost latitude representable in Web Mercator.
pub const LATITUDE_MAX: f64 = 85.05112877980659;

/// Scale between degrees and stored microdegrees.
pub const COORDINATE_FACTOR: f64 = 1_000_000.0;

/// Convert stored microdegrees to degrees.
#[inline]
pub fn micro_to_degrees(micro: i32) -> f64 {
    micro as f64 / COORDINATE_FACTOR
}

/// Convert degrees to microdegrees, truncating toward zero.
#[inline]
pub fn degrees_to_micro(degrees: f64) -> i64 {
    (degrees * COORDINATE_FACTOR) as i64
}

/// Side length of the world in pixels at `zoom`.
#[inline]
pub fn map_size(zoom: u8) -> i64 {
    (TILE_SIZE as i64) << zoom
}

/// Longitude to absolute pixel X.
pub fn longitude_to_pixel_x(longitude: f64, zoom: u8) -> f64 {
    (longitude + 180.0) / 360.0 * map_size(zoom) as f64
}

/// Latitude to absolute pixel Y.
pub fn latitude_to_pixel_y(latitude: f64, zoom: u8) -> f64 {
    let sin_latitude = (latitude * (PI / 180.0)).sin();
    let pixel_y = 0.5 - ((1.0 + sin_latitude) / (1.0 - sin_latitude)).ln() / (4.0 * PI);
    pixel_y * map_size(zoom) as f64
}

/// Absolute pixel X to longitude.
pub fn pixel_x_to_longitude(pixel_x: f64, zoom: u8) -> f64 {
    360.0 * (pixel_x / map_size(zoom) as f64 - 0.5)
}

/// Absolute pixel Y to latitude.
pub fn pixel_y_to_latitude(pixel_y: f64, zoom: u8) -> f64 {
    let y = 0.5 - pixel_y / map_size(zoom) as f64;
    90.0 - 360.0 * (-y * 2.0 * PI).exp().atan() / PI
}

fn pixel_to_tile(pixel: f64, zoom: u8) -> i64 {
    let max_tile = ((1u64 << zoom) - 1) as f64;
    (pixel / TILE_SIZE as f64).clamp(0.0, max_tile) as i64
}

/// Absolute pixel X to tile X, clamped to the world.
pub fn pixel_x_to_tile_x(pixel_x: f64, zoom: u8) -> i64 {
    pixel_to_tile(pixel_x, zoom)
}

/// Absolute pixel Y to tile Y, clamped to the world.
pub fn pixel_y_to_tile_y(pixel_y: f64, zoom: u8) -> i64 {
    pixel_to_tile(pixel_y, zoom)
}

/// Tile X containing `longitude`.
pub fn longitude_to_tile_x(longitude: f64, zoom: u8) -> i64 {
    pixel_x_to_tile_x(longitude_to_pixel_x(longitude, zoom), zoom)
}

/// Tile Y containing `latitude`.
pub fn latitude_to_tile_y(latitude: f64, zoom: u8) -> i64 {
    pixel_y_to_tile_y(latitude_to_pixel_y(latitude, zoom), zoom)
}

/// Longitude of the western edge of tile column `tile_x`.
pub fn tile_x_to_longitude(tile_x: i64, zoom: u8) -> f64 {
    pixel_x_to_longitude((tile_x * TILE_SIZE as i64) as f64, zoom)
}

/// Latitude of the northern edge of tile row `tile_y`.
pub fn tile_y_to_latitude(tile_y: i64, zoom: u8) -> f64 {
    pixel_y_to_latitude((tile_y * TILE_SIZE as i64) as f64, zoom)
}

/// Normalized Mercator `y` in `[0, 1]` to latitude.
pub fn to_latitude(y: f64) -> f64 {
    90.0 - 360.0 * ((y - 0.5) * 2.0 * PI).exp().atan() / PI
}

/// Normalized Mercator `x` in `[0, 1]` to longitude.
pub fn to_longitude(x: f64) -> f64 {
    360.0 * (x - 0.5)
}

/// Latitude to normalized Mercator `y`.
pub fn latitude_to_y(latitude: f64) -> f64 {
    let sin_latitude = (latitude * (PI / 180.0)).sin();
    (0.5 - ((1.0 + sin_latitude) / (1.0 - sin_latitude)).ln() / (4.0 * PI)).clamp(0.0, 1.0)
}

/// Longitude to normalized Mercator `x`.
pub fn longitude_to_x(longitude: f64) -> f64 {
    (longitude + 180.0) / 360.0
}
