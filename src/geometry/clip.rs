//! Clip polygons and lines to a rectangle.
//!
//! Rings are clipped independently, one half-plane at a time, so the
//! output is not guaranteed to be valid simple-feature geometry: inner
//! and outer rings may touch after clipping.

use super::line_clip::LineClipper;
use super::GeometryBuffer;
use crate::error::Result;

#[derive(Debug, Clone, Copy)]
enum Edge {
    Left,
    Top,
    Right,
    Bottom,
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    xmin: f32,
    ymin: f32,
    xmax: f32,
    ymax: f32,
}

/// Polygon and line clipper with its own scratch buffer.
#[derive(Debug, Clone)]
pub struct TileClipper {
    rect: Rect,
    line_clipper: LineClipper,
    scratch: GeometryBuffer,
}

impl TileClipper {
    /// A clipper for `[xmin, xmax] x [ymin, ymax]`.
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            rect: Rect {
                xmin,
                ymin,
                xmax,
                ymax,
            },
            line_clipper: LineClipper::new(xmin, ymin, xmax, ymax),
            scratch: GeometryBuffer::new(10, 1),
        }
    }

    /// Replace the clip rectangle.
    pub fn set_rect(&mut self, xmin: f32, ymin: f32, xmax: f32, ymax: f32) {
        self.rect = Rect {
            xmin,
            ymin,
            xmax,
            ymax,
        };
        self.line_clipper.set_rect(xmin, ymin, xmax, ymax);
    }

    /// Clip `geom` in place.
    ///
    /// Returns `Ok(false)` when nothing usable is left: no polygon ring of
    /// three points, or no line of two points. Point geometry passes
    /// through untouched.
    pub fn clip(&mut self, geom: &mut GeometryBuffer) -> Result<bool> {
        if geom.is_poly() {
            let out = &mut self.scratch;
            out.clear();
            clip_edge(&self.rect, geom, out, Edge::Left)?;
            geom.clear();
            clip_edge(&self.rect, out, geom, Edge::Top)?;
            out.clear();
            clip_edge(&self.rect, geom, out, Edge::Right)?;
            geom.clear();
            clip_edge(&self.rect, out, geom, Edge::Bottom)?;
            if geom.index_pos == 0 && geom.index[0] < 6 {
                return Ok(false);
            }
        } else if geom.is_line() {
            let out = &mut self.scratch;
            let num_lines = self.line_clipper.clip_line(geom, out)?;

            geom.ensure_index_size(num_lines + 1);
            geom.index[..num_lines].copy_from_slice(&out.index[..num_lines]);
            geom.index[num_lines] = -1;
            geom.ensure_point_size(out.point_pos >> 1);
            geom.points[..out.point_pos].copy_from_slice(&out.points[..out.point_pos]);
            geom.index_pos = out.index_pos;
            geom.point_pos = out.point_pos;

            if geom.index_pos == 0 && geom.index[0] < 4 {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn clip_edge(
    rect: &Rect,
    input: &GeometryBuffer,
    out: &mut GeometryBuffer,
    edge: Edge,
) -> Result<()> {
    out.start_polygon()?;
    let mut outer = true;
    let mut point_pos = 0;
    for &len in &input.index {
        if len < 0 {
            break;
        }
        if len == 0 {
            out.start_polygon()?;
            outer = true;
            continue;
        }
        let len = len as usize;
        if len < 6 {
            point_pos += len;
            continue;
        }
        if !outer {
            out.start_hole()?;
        }
        let ring = &input.points[point_pos..point_pos + len];
        match edge {
            Edge::Left => clip_ring(ring, out, |x, _| x > rect.xmin, |px, py, cx, cy| {
                (rect.xmin, py + (cy - py) * (rect.xmin - px) / (cx - px))
            }),
            Edge::Right => clip_ring(ring, out, |x, _| x < rect.xmax, |px, py, cx, cy| {
                (rect.xmax, py + (cy - py) * (rect.xmax - px) / (cx - px))
            }),
            Edge::Top => clip_ring(ring, out, |_, y| y < rect.ymax, |px, py, cx, cy| {
                (px + (cx - px) * (rect.ymax - py) / (cy - py), rect.ymax)
            }),
            Edge::Bottom => clip_ring(ring, out, |_, y| y > rect.ymin, |px, py, cx, cy| {
                (px + (cx - px) * (rect.ymin - py) / (cy - py), rect.ymin)
            }),
        }
        point_pos += len;
        outer = false;
    }
    Ok(())
}

/// One Sutherland–Hodgman pass over a closed ring. The ring wraps: the
/// last point is the predecessor of the first.
fn clip_ring<I, X>(ring: &[f32], out: &mut GeometryBuffer, inside: I, intersect: X)
where
    I: Fn(f32, f32) -> bool,
    X: Fn(f32, f32, f32, f32) -> (f32, f32),
{
    let n = ring.len();
    let mut px = ring[n - 2];
    let mut py = ring[n - 1];
    for pair in ring.chunks_exact(2) {
        let (cx, cy) = (pair[0], pair[1]);
        let prev_inside = inside(px, py);
        if inside(cx, cy) {
            if !prev_inside {
                let (ix, iy) = intersect(px, py, cx, cy);
                out.add_point(ix, iy);
            }
            out.add_point(cx, cy);
        } else if prev_inside {
            let (ix, iy) = intersect(px, py, cx, cy);
            out.add_point(ix, iy);
        }
        px = cx;
        py = cy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polygon(rings: &[&[(f32, f32)]]) -> GeometryBuffer {
        let mut geom = GeometryBuffer::default();
        geom.start_polygon().unwrap();
        for (i, ring) in rings.iter().enumerate() {
            if i > 0 {
                geom.start_hole().unwrap();
            }
            for &(x, y) in ring.iter() {
                geom.add_point(x, y);
            }
        }
        geom
    }

    #[test]
    fn test_polygon_inside_is_unchanged() {
        let square: &[(f32, f32)] = &[(10.0, 10.0), (100.0, 10.0), (100.0, 100.0), (10.0, 100.0)];
        let hole: &[(f32, f32)] = &[(40.0, 40.0), (60.0, 40.0), (60.0, 60.0)];
        let mut geom = polygon(&[square, hole]);
        let before: Vec<f32> = geom.points().to_vec();

        let mut clipper = TileClipper::new(-16.0, -16.0, 528.0, 528.0);
        assert!(clipper.clip(&mut geom).unwrap());
        assert_eq!(geom.points(), before.as_slice());
        assert_eq!(&geom.index()[..3], &[8, 6, -1]);
    }

    #[test]
    fn test_clip_is_idempotent() {
        let tri: &[(f32, f32)] = &[(5.0, 50.0), (50.0, 5.0), (80.0, 80.0)];
        let mut geom = polygon(&[tri]);
        let input: Vec<f32> = geom.points().to_vec();
        let mut clipper = TileClipper::new(0.0, 0.0, 100.0, 100.0);

        assert!(clipper.clip(&mut geom).unwrap());
        assert_eq!(geom.points(), input.as_slice());
        assert!(clipper.clip(&mut geom).unwrap());
        assert_eq!(geom.points(), input.as_slice());
    }

    #[test]
    fn test_polygon_crossing_left_edge() {
        let sq: &[(f32, f32)] = &[(-10.0, 10.0), (10.0, 10.0), (10.0, 20.0), (-10.0, 20.0)];
        let mut geom = polygon(&[sq]);
        let mut clipper = TileClipper::new(0.0, 0.0, 100.0, 100.0);
        assert!(clipper.clip(&mut geom).unwrap());
        for pair in geom.points().chunks(2) {
            assert!(pair[0] >= 0.0);
        }
        assert_eq!(geom.num_points(), 4);
    }

    #[test]
    fn test_polygon_outside_rejected() {
        let sq: &[(f32, f32)] = &[(200.0, 200.0), (300.0, 200.0), (300.0, 300.0)];
        let mut geom = polygon(&[sq]);
        let mut clipper = TileClipper::new(0.0, 0.0, 100.0, 100.0);
        assert!(!clipper.clip(&mut geom).unwrap());
    }

    #[test]
    fn test_line_copied_back() {
        let mut geom = GeometryBuffer::default();
        geom.start_line().unwrap();
        for (x, y) in [(-10.0, 5.0), (5.0, 5.0), (5.0, 50.0)] {
            geom.add_point(x, y);
        }
        let mut clipper = TileClipper::new(0.0, 0.0, 10.0, 10.0);
        assert!(clipper.clip(&mut geom).unwrap());
        assert_eq!(geom.points(), &[0.0, 5.0, 5.0, 5.0, 5.0, 10.0]);
        assert_eq!(&geom.index()[..2], &[6, -1]);

        let mut outside = GeometryBuffer::default();
        outside.start_line().unwrap();
        outside.add_point(20.0, 20.0);
        outside.add_point(30.0, 30.0);
        assert!(!clipper.clip(&mut outside).unwrap());
    }
}
