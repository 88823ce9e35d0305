//! Cohen–Sutherland line clipping against an axis-aligned rectangle

use super::GeometryBuffer;
use crate::error::Result;

const INSIDE: u8 = 0;
const LEFT: u8 = 1;
const RIGHT: u8 = 2;
const BOTTOM: u8 = 4;
const TOP: u8 = 8;

/// Result of feeding the next vertex into [`LineClipper::clip_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum ClipResult {
    /// The segment misses the rectangle
    Outside = 0,
    /// The segment lies entirely inside
    Inside = 1,
    /// The segment crosses the boundary; the clipped ends are available
    Clipped = -1,
}

/// Stateful segment clipper.
///
/// Call [`clip_start`](Self::clip_start) with the first vertex of a line,
/// then [`clip_next`](Self::clip_next) for each following vertex. Points
/// exactly on the boundary count as inside.
#[derive(Debug, Clone)]
pub struct LineClipper {
    xmin: f32,
    ymin: f32,
    xmax: f32,
    ymax: f32,
    prev_outcode: u8,
    prev_x: f32,
    prev_y: f32,
    /// Clipped segment start after [`ClipResult::Clipped`]
    pub out_x1: f32,
    /// See `out_x1`
    pub out_y1: f32,
    /// Clipped segment end after [`ClipResult::Clipped`]
    pub out_x2: f32,
    /// See `out_x2`
    pub out_y2: f32,
}

impl LineClipper {
    /// A clipper for the rectangle `[xmin, xmax] x [ymin, ymax]`.
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            prev_outcode: INSIDE,
            prev_x: 0.0,
            prev_y: 0.0,
            out_x1: 0.0,
            out_y1: 0.0,
            out_x2: 0.0,
            out_y2: 0.0,
        }
    }

    /// Replace the clip rectangle.
    pub fn set_rect(&mut self, xmin: f32, ymin: f32, xmax: f32, ymax: f32) {
        self.xmin = xmin;
        self.ymin = ymin;
        self.xmax = xmax;
        self.ymax = ymax;
    }

    fn outcode(&self, x: f32, y: f32) -> u8 {
        let mut code = INSIDE;
        if x < self.xmin {
            code |= LEFT;
        } else if x > self.xmax {
            code |= RIGHT;
        }
        if y < self.ymin {
            code |= BOTTOM;
        } else if y > self.ymax {
            code |= TOP;
        }
        code
    }

    /// Begin a line at `(x0, y0)`. Returns whether the point is inside.
    pub fn clip_start(&mut self, x0: f32, y0: f32) -> bool {
        self.prev_x = x0;
        self.prev_y = y0;
        self.prev_outcode = self.outcode(x0, y0);
        self.prev_outcode == INSIDE
    }

    /// Clip the segment from the previous vertex to `(x1, y1)`.
    pub fn clip_next(&mut self, x1: f32, y1: f32) -> ClipResult {
        let code = self.outcode(x1, y1);
        let result = if self.prev_outcode | code == 0 {
            ClipResult::Inside
        } else if self.prev_outcode & code != 0 {
            ClipResult::Outside
        } else if self.clip(self.prev_x, self.prev_y, x1, y1, self.prev_outcode, code) {
            ClipResult::Clipped
        } else {
            ClipResult::Outside
        };
        self.prev_outcode = code;
        self.prev_x = x1;
        self.prev_y = y1;
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn clip(
        &mut self,
        mut x0: f32,
        mut y0: f32,
        mut x1: f32,
        mut y1: f32,
        mut code0: u8,
        mut code1: u8,
    ) -> bool {
        loop {
            if code0 | code1 == 0 {
                self.out_x1 = x0;
                self.out_y1 = y0;
                self.out_x2 = x1;
                self.out_y2 = y1;
                return true;
            }
            if code0 & code1 != 0 {
                return false;
            }
            let code_out = if code0 == 0 { code1 } else { code0 };
            let (x, y) = if code_out & TOP != 0 {
                (x0 + (x1 - x0) * (self.ymax - y0) / (y1 - y0), self.ymax)
            } else if code_out & BOTTOM != 0 {
                (x0 + (x1 - x0) * (self.ymin - y0) / (y1 - y0), self.ymin)
            } else if code_out & RIGHT != 0 {
                (self.xmax, y0 + (y1 - y0) * (self.xmax - x0) / (x1 - x0))
            } else {
                (self.xmin, y0 + (y1 - y0) * (self.xmin - x0) / (x1 - x0))
            };
            let code = self.outcode(x, y);
            if code_out == code0 {
                x0 = x;
                y0 = y;
                code0 = code;
            } else {
                x1 = x;
                y1 = y;
                code1 = code;
            }
        }
    }

    /// Clip every line of `input` into `out`, which is cleared first.
    ///
    /// A line leaving and re-entering the rectangle is split. Lines of
    /// fewer than two points are dropped. Returns the number of lines
    /// written.
    pub fn clip_line(&mut self, input: &GeometryBuffer, out: &mut GeometryBuffer) -> Result<usize> {
        out.clear();
        let mut point_pos = 0;
        let mut num_lines = 0;
        for &len in &input.index {
            if len < 0 {
                break;
            }
            let len = len as usize;
            if len < 4 {
                point_pos += len;
                continue;
            }
            let end = point_pos + len;
            let mut x = input.points[point_pos];
            let mut y = input.points[point_pos + 1];
            let mut in_pos = point_pos + 2;

            let mut inside = self.clip_start(x, y);
            if inside {
                out.start_line()?;
                out.add_point(x, y);
                num_lines += 1;
            }
            while in_pos < end {
                x = input.points[in_pos];
                y = input.points[in_pos + 1];
                in_pos += 2;
                match self.clip_next(x, y) {
                    ClipResult::Outside => inside = false,
                    ClipResult::Inside => out.add_point(x, y),
                    ClipResult::Clipped => {
                        if inside {
                            out.add_point(self.out_x2, self.out_y2);
                        } else {
                            out.start_line()?;
                            num_lines += 1;
                            out.add_point(self.out_x1, self.out_y1);
                            out.add_point(self.out_x2, self.out_y2);
                        }
                        inside = self.clip_start(x, y);
                    }
                }
            }
            point_pos = end;
        }
        Ok(num_lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[(f32, f32)]) -> GeometryBuffer {
        let mut geom = GeometryBuffer::default();
        geom.start_line().unwrap();
        for &(x, y) in points {
            geom.add_point(x, y);
        }
        geom
    }

    #[test]
    fn test_boundary_points_are_inside() {
        let mut clipper = LineClipper::new(0.0, 0.0, 10.0, 10.0);
        assert!(clipper.clip_start(0.0, 10.0));
        assert_eq!(clipper.clip_next(10.0, 0.0), ClipResult::Inside);
        assert!(!clipper.clip_start(-0.001, 5.0));
    }

    #[test]
    fn test_segment_results() {
        let mut clipper = LineClipper::new(0.0, 0.0, 10.0, 10.0);
        clipper.clip_start(-5.0, 5.0);
        assert_eq!(clipper.clip_next(-1.0, 20.0), ClipResult::Outside);

        clipper.clip_start(-5.0, 5.0);
        assert_eq!(clipper.clip_next(5.0, 5.0), ClipResult::Clipped);
        assert_eq!((clipper.out_x1, clipper.out_y1), (0.0, 5.0));
        assert_eq!((clipper.out_x2, clipper.out_y2), (5.0, 5.0));

        // both ends outside on different sides, crossing the rectangle
        clipper.clip_start(-5.0, 5.0);
        assert_eq!(clipper.clip_next(15.0, 5.0), ClipResult::Clipped);
        assert_eq!((clipper.out_x1, clipper.out_x2), (0.0, 10.0));

        // diagonal past a corner
        clipper.clip_start(-5.0, 8.0);
        assert_eq!(clipper.clip_next(5.0, 20.0), ClipResult::Outside);
    }

    #[test]
    fn test_reentering_line_is_split() {
        let input = line(&[(2.0, 2.0), (20.0, 2.0), (20.0, 8.0), (2.0, 8.0)]);
        let mut out = GeometryBuffer::default();
        let mut clipper = LineClipper::new(0.0, 0.0, 10.0, 10.0);

        let n = clipper.clip_line(&input, &mut out).unwrap();
        assert_eq!(n, 2);
        let lines: Vec<_> = out.rings().collect();
        assert_eq!(lines[0], &[2.0, 2.0, 10.0, 2.0]);
        assert_eq!(lines[1], &[10.0, 8.0, 2.0, 8.0]);
    }

    #[test]
    fn test_line_fully_outside_yields_nothing() {
        let input = line(&[(20.0, 20.0), (30.0, 25.0)]);
        let mut out = GeometryBuffer::default();
        let mut clipper = LineClipper::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(clipper.clip_line(&input, &mut out).unwrap(), 0);
    }
}
