//! Reusable geometry containers and tile-local post-processing
//!
//! A [`GeometryBuffer`] stores interleaved `x, y` floats in `points` and
//! per-ring float counts in `index`:
//!
//! - a positive entry is the float count of one line or ring
//! - `0` separates polygons (the next ring is a new outer ring)
//! - a negative entry ends the list
//!
//! One geometry kind is active between calls to [`GeometryBuffer::clear`].
//! Buffers are scratch space: the decoder refills the same buffer for
//! every record of a query.
//!
//! # Example
//!
//! ```rust
//! use mapsforge_reader::geometry::{GeometryBuffer, GeometryType};
//!
//! let mut geom = GeometryBuffer::new(4, 4);
//! geom.start_line().unwrap();
//! geom.add_point(0.0, 0.0);
//! geom.add_point(10.0, 5.0);
//! assert_eq!(geom.kind(), GeometryType::Line);
//! assert_eq!(geom.rings().count(), 1);
//! assert_eq!(geom.points(), &[0.0, 0.0, 10.0, 5.0]);
//! ```

mod area;
mod clip;
mod element;
mod line_clip;
mod tile_projection;

pub use area::is_area;
pub use clip::TileClipper;
pub use element::{MapElement, DEFAULT_LAYER};
pub use line_clip::{ClipResult, LineClipper};
pub use tile_projection::TileProjection;

use crate::error::{MapError, Result};
use serde::Serialize;

const GROW_INDICES: usize = 64;
const GROW_POINTS: usize = 512;

/// Kind of geometry held by a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryType {
    /// Nothing started since the last clear
    None,
    /// One or more points
    Point,
    /// One or more line strings
    Line,
    /// One or more polygons with optional holes
    Poly,
}

/// Interleaved coordinates plus ring index.
#[derive(Debug, Clone)]
pub struct GeometryBuffer {
    pub(crate) points: Vec<f32>,
    pub(crate) index: Vec<i32>,
    pub(crate) index_pos: usize,
    pub(crate) point_pos: usize,
    pub(crate) kind: GeometryType,
}

impl Default for GeometryBuffer {
    fn default() -> Self {
        Self::new(32, 4)
    }
}

impl GeometryBuffer {
    /// A buffer with room for `num_points` points and `num_indices` index entries.
    pub fn new(num_points: usize, num_indices: usize) -> Self {
        let points = if num_points == 0 {
            GROW_POINTS
        } else {
            num_points * 2
        };
        let indices = if num_indices == 0 {
            GROW_INDICES
        } else {
            num_indices
        };
        Self {
            points: vec![0.0; points],
            index: vec![0; indices],
            index_pos: 0,
            point_pos: 0,
            kind: GeometryType::None,
        }
    }

    /// Reset to an empty buffer of kind `None`, keeping allocations.
    pub fn clear(&mut self) {
        self.index[0] = 0;
        self.index_pos = 0;
        self.point_pos = 0;
        self.kind = GeometryType::None;
    }

    /// Active geometry kind.
    pub fn kind(&self) -> GeometryType {
        self.kind
    }

    /// Whether the buffer holds polygons.
    pub fn is_poly(&self) -> bool {
        self.kind == GeometryType::Poly
    }

    /// Whether the buffer holds lines.
    pub fn is_line(&self) -> bool {
        self.kind == GeometryType::Line
    }

    /// Whether the buffer holds points.
    pub fn is_point(&self) -> bool {
        self.kind == GeometryType::Point
    }

    /// Written coordinates as `x, y` pairs.
    pub fn points(&self) -> &[f32] {
        &self.points[..self.point_pos]
    }

    /// Number of written points.
    pub fn num_points(&self) -> usize {
        self.point_pos >> 1
    }

    /// The whole index array. Readers stop at the first negative entry.
    pub fn index(&self) -> &[i32] {
        &self.index
    }

    /// Position of the ring currently being written.
    pub fn index_pos(&self) -> usize {
        self.index_pos
    }

    /// Iterate the coordinate slice of every ring or line, skipping
    /// polygon separators.
    pub fn rings(&self) -> Rings<'_> {
        Rings {
            geom: self,
            idx: 0,
            offset: 0,
        }
    }

    /// Append a point to the current ring, growing storage when full.
    pub fn add_point(&mut self, x: f32, y: f32) {
        if self.point_pos + 2 > self.points.len() {
            self.ensure_point_size((self.point_pos >> 1) + 1);
        }
        self.points[self.point_pos] = x;
        self.points[self.point_pos + 1] = y;
        self.point_pos += 2;
        self.index[self.index_pos] += 2;
    }

    /// Switch to point mode.
    pub fn start_points(&mut self) -> Result<()> {
        self.set_or_check_mode(GeometryType::Point)?;
        if self.index.len() > self.index_pos + 1 {
            self.index[self.index_pos + 1] = -1;
        }
        Ok(())
    }

    /// Begin a new line string.
    pub fn start_line(&mut self) -> Result<()> {
        self.set_or_check_mode(GeometryType::Line)?;
        if self.index[self.index_pos] > 0 && self.index[0] >= 0 {
            self.index_pos += 1;
            if self.index_pos >= self.index.len() {
                self.ensure_index_size(self.index_pos);
            }
            self.index[self.index_pos] = 0;
        }
        if self.index.len() > self.index_pos + 1 {
            self.index[self.index_pos + 1] = -1;
        }
        Ok(())
    }

    /// Begin a new polygon, closing the previous one with a `0` separator.
    pub fn start_polygon(&mut self) -> Result<()> {
        let start = self.kind == GeometryType::None;
        self.set_or_check_mode(GeometryType::Poly)?;
        if self.index_pos + 3 > self.index.len() {
            self.ensure_index_size(self.index_pos + 2);
        }
        if !start && self.index[self.index_pos] != 0 {
            self.index_pos += 1;
            self.index[self.index_pos] = 0;
            self.index_pos += 1;
        }
        self.index[self.index_pos] = 0;
        if self.index.len() > self.index_pos + 1 {
            self.index[self.index_pos + 1] = -1;
        }
        Ok(())
    }

    /// Begin an inner ring of the current polygon.
    pub fn start_hole(&mut self) -> Result<()> {
        if self.kind != GeometryType::Poly {
            return Err(MapError::Geometry(format!(
                "hole started on {:?} geometry",
                self.kind
            )));
        }
        if self.index_pos + 2 > self.index.len() {
            self.ensure_index_size(self.index_pos + 1);
        }
        self.index_pos += 1;
        self.index[self.index_pos] = 0;
        if self.index.len() > self.index_pos + 1 {
            self.index[self.index_pos + 1] = -1;
        }
        Ok(())
    }

    /// Make room for `size` points, keeping existing coordinates.
    pub fn ensure_point_size(&mut self, size: usize) {
        if size * 2 < self.points.len() {
            return;
        }
        self.points.resize(size * 2 + GROW_POINTS, 0.0);
    }

    /// Make room for index position `size`, keeping existing entries.
    pub fn ensure_index_size(&mut self, size: usize) {
        if size < self.index.len() {
            return;
        }
        self.index.resize(size + GROW_INDICES, 0);
    }

    pub(crate) fn set_kind(&mut self, kind: GeometryType) {
        self.kind = kind;
    }

    fn set_or_check_mode(&mut self, mode: GeometryType) -> Result<()> {
        if self.kind == mode {
            return Ok(());
        }
        if self.kind != GeometryType::None {
            return Err(MapError::Geometry(format!(
                "buffer not cleared: {:?} requested on {:?} geometry",
                mode, self.kind
            )));
        }
        self.kind = mode;
        Ok(())
    }

    /// Drop points closer than `sqrt(min_sq_dist)` to their predecessor.
    ///
    /// With `keep_lines` the last point of a ring is always kept so a line
    /// never collapses to one point. Polygon rings whose last point equals
    /// the first lose the duplicate.
    pub fn simplify(&mut self, min_sq_dist: f32, keep_lines: bool) {
        let mut out_pos = 0;
        let mut in_pos = 0;
        for idx in 0..self.index.len() {
            let len = self.index[idx];
            if len < 0 {
                break;
            }
            if len == 0 {
                continue;
            }
            let end = len as usize;
            let first = out_pos;
            let mut px = self.points[in_pos];
            let mut py = self.points[in_pos + 1];
            in_pos += 2;
            self.points[out_pos] = px;
            self.points[out_pos + 1] = py;
            out_pos += 2;
            let mut cnt = 2;

            let mut pt = 2;
            while pt < end {
                let cx = self.points[in_pos];
                let cy = self.points[in_pos + 1];
                in_pos += 2;
                let dx = cx - px;
                let dy = cy - py;
                if dx * dx + dy * dy < min_sq_dist && (!keep_lines || pt < end - 2) {
                    pt += 2;
                    continue;
                }
                px = cx;
                py = cy;
                self.points[out_pos] = cx;
                self.points[out_pos + 1] = cy;
                out_pos += 2;
                cnt += 2;
                pt += 2;
            }

            if self.kind == GeometryType::Poly
                && self.points[first] == px
                && self.points[first + 1] == py
            {
                cnt -= 2;
                out_pos -= 2;
            }
            self.index[idx] = cnt;
        }
        self.point_pos = out_pos;
    }
}

/// Iterator over ring coordinate slices, see [`GeometryBuffer::rings`].
pub struct Rings<'a> {
    geom: &'a GeometryBuffer,
    idx: usize,
    offset: usize,
}

impl<'a> Iterator for Rings<'a> {
    type Item = &'a [f32];

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(&len) = self.geom.index.get(self.idx) {
            self.idx += 1;
            if len < 0 {
                self.idx = self.geom.index.len();
                return None;
            }
            if len == 0 {
                continue;
            }
            let start = self.offset;
            let end = start + len as usize;
            self.offset = end;
            return self.geom.points.get(start..end);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mode_mismatch_rejected() {
        let mut geom = GeometryBuffer::default();
        geom.start_line().unwrap();
        assert!(geom.start_polygon().is_err());
        assert!(geom.start_hole().is_err());
        geom.clear();
        geom.start_polygon().unwrap();
        geom.start_hole().unwrap();
    }

    #[test]
    fn test_polygon_separators() {
        let mut geom = GeometryBuffer::new(8, 1);
        geom.start_polygon().unwrap();
        for (x, y) in [(0.0, 0.0), (4.0, 0.0), (4.0, 4.0)] {
            geom.add_point(x, y);
        }
        geom.start_hole().unwrap();
        for (x, y) in [(1.0, 1.0), (2.0, 1.0), (2.0, 2.0)] {
            geom.add_point(x, y);
        }
        geom.start_polygon().unwrap();
        for (x, y) in [(9.0, 9.0), (10.0, 9.0), (10.0, 10.0)] {
            geom.add_point(x, y);
        }
        assert_eq!(&geom.index()[..5], &[6, 6, 0, 6, -1]);
        let rings: Vec<_> = geom.rings().collect();
        assert_eq!(rings.len(), 3);
        assert_eq!(rings[2], &[9.0, 9.0, 10.0, 9.0, 10.0, 10.0]);
    }

    #[test]
    fn test_multiple_lines() {
        let mut geom = GeometryBuffer::new(2, 4);
        geom.start_line().unwrap();
        geom.add_point(0.0, 0.0);
        geom.add_point(1.0, 0.0);
        geom.start_line().unwrap();
        geom.add_point(5.0, 5.0);
        geom.add_point(6.0, 5.0);
        assert_eq!(&geom.index()[..3], &[4, 4, -1]);
        assert_eq!(geom.index_pos(), 1);
    }

    #[test]
    fn test_simplify_collapses_near_points() {
        let mut geom = GeometryBuffer::default();
        geom.start_line().unwrap();
        for (x, y) in [(0.0, 0.0), (0.2, 0.2), (5.0, 0.0), (5.1, 0.0)] {
            geom.add_point(x, y);
        }
        geom.simplify(1.0, true);
        // the near last point is kept to preserve the line end
        assert_eq!(geom.points(), &[0.0, 0.0, 5.0, 0.0, 5.1, 0.0]);
        assert_eq!(geom.index()[0], 6);
    }

    #[test]
    fn test_simplify_drops_polygon_closing_point() {
        let mut geom = GeometryBuffer::default();
        geom.start_polygon().unwrap();
        for (x, y) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 0.0)] {
            geom.add_point(x, y);
        }
        geom.simplify(1.0, true);
        assert_eq!(geom.index()[0], 6);
        assert_eq!(geom.num_points(), 3);
    }

    proptest! {
        #[test]
        fn prop_growth_preserves_points(coords in prop::collection::vec((-1e4f32..1e4, -1e4f32..1e4), 1..2000)) {
            let mut geom = GeometryBuffer::new(1, 1);
            geom.start_line().unwrap();
            for &(x, y) in &coords {
                geom.add_point(x, y);
            }
            prop_assert_eq!(geom.num_points(), coords.len());
            prop_assert_eq!(geom.index()[0] as usize, coords.len() * 2);
            for (i, &(x, y)) in coords.iter().enumerate() {
                prop_assert_eq!(geom.points()[2 * i], x);
                prop_assert_eq!(geom.points()[2 * i + 1], y);
            }
        }
    }
}
