use super::{GeometryBuffer, MapElement};
use crate::error::Result;
use crate::projection::{COORDINATE_FACTOR, TILE_SIZE};
use crate::tile::Tile;
use std::f64::consts::PI;

/// Maps microdegree coordinates into the pixel space of one tile.
///
/// The origin is the tile's top-left corner; `x` grows east and `y`
/// grows south, so a coordinate inside the tile lands in
/// `[0, TILE_SIZE]` on both axes.
#[derive(Debug, Clone, Default)]
pub struct TileProjection {
    dx: i64,
    dy: i64,
    divx: f64,
    divy: f64,
}

impl TileProjection {
    /// A projection for `tile`.
    pub fn new(tile: Tile) -> Self {
        let mut projection = Self::default();
        projection.set_tile(tile);
        projection
    }

    /// Re-target the projection at `tile`.
    pub fn set_tile(&mut self, tile: Tile) {
        let size = TILE_SIZE as i64;
        let x = tile.x as i64 * size;
        let y = tile.y as i64 * size + size;
        let half_extents = (size << tile.zoom) >> 1;

        self.dx = x - half_extents;
        self.dy = y - half_extents;
        self.divx = (180.0 * COORDINATE_FACTOR) / half_extents as f64;
        self.divy = (PI * 2.0) / half_extents as f64;
    }

    /// Longitude in microdegrees to tile pixel `x`.
    pub fn project_lon(&self, lon: f64) -> f32 {
        (lon / self.divx - self.dx as f64) as f32
    }

    /// Latitude in microdegrees to tile pixel `y`.
    pub fn project_lat(&self, lat: f64) -> f32 {
        let s = (lat * ((PI / 180.0) / COORDINATE_FACTOR)).sin();
        let r = ((1.0 + s) / (1.0 - s)).ln();
        (TILE_SIZE as f64 - (r / self.divy + self.dy as f64)) as f32
    }

    /// Replace `out`'s geometry with the single projected point.
    pub fn project_point(&self, lat: i64, lon: i64, out: &mut MapElement) -> Result<()> {
        out.clear();
        out.start_points()?;
        out.add_point(self.project_lon(lon as f64), self.project_lat(lat as f64));
        Ok(())
    }

    /// Project raw `(lon, lat)` microdegree pairs of every ring in place.
    ///
    /// Consecutive points that land on the same pixel coordinate collapse
    /// into one, and a polygon ring loses its closing point when it equals
    /// the first. Ring counts in the index shrink accordingly.
    pub fn project(&self, geom: &mut GeometryBuffer) {
        let is_poly = geom.is_poly();
        let mut in_pos = 0;
        let mut out_pos = 0;
        for idx in 0..geom.index.len() {
            let len = geom.index[idx];
            if len == 0 {
                continue;
            }
            if len < 0 {
                break;
            }
            let end = in_pos + len as usize;
            let first = out_pos;
            let mut cnt = 0;
            let (mut plon, mut plat) = (0.0f32, 0.0f32);
            while in_pos < end {
                let lon = self.project_lon(geom.points[in_pos] as f64);
                let lat = self.project_lat(geom.points[in_pos + 1] as f64);
                in_pos += 2;
                if cnt != 0 && lat == plat && lon == plon {
                    continue;
                }
                plon = lon;
                plat = lat;
                geom.points[out_pos] = lon;
                geom.points[out_pos + 1] = lat;
                out_pos += 2;
                cnt += 2;
            }
            if is_poly && geom.points[first] == plon && geom.points[first + 1] == plat {
                geom.index[idx] = cnt - 2;
                out_pos -= 2;
            } else {
                geom.index[idx] = cnt;
            }
        }
        geom.point_pos = out_pos;
    }
}
