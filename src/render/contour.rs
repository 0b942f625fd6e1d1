//! Contour lines by marching squares.
//!
//! Works in grid index space: `x` is the column (longitude index) and `y`
//! the row (latitude index) of a [`GridField`]. Callers map the points to
//! geographic and then pixel coordinates.

use std::collections::HashMap;

use crate::fields::GridField;

/// A point in grid index space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A line segment between two points
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

/// A connected isoline
#[derive(Debug, Clone)]
pub struct Contour {
    pub level: f32,
    pub points: Vec<Point>,
    pub closed: bool,
}

/// Marching squares over a row-major grid
pub fn march_squares(data: &[f32], width: usize, height: usize, level: f32) -> Vec<Segment> {
    if width < 2 || height < 2 || data.len() != width * height {
        return vec![];
    }

    let mut segments = Vec::new();
    for y in 0..(height - 1) {
        for x in 0..(width - 1) {
            let tl = data[y * width + x];
            let tr = data[y * width + x + 1];
            let bl = data[(y + 1) * width + x];
            let br = data[(y + 1) * width + x + 1];

            if tl.is_nan() || tr.is_nan() || bl.is_nan() || br.is_nan() {
                continue;
            }

            let mut case = 0u8;
            if tl >= level {
                case |= 1;
            }
            if tr >= level {
                case |= 2;
            }
            if br >= level {
                case |= 4;
            }
            if bl >= level {
                case |= 8;
            }
            if case == 0 || case == 15 {
                continue;
            }

            let (xf, yf) = (x as f32, y as f32);
            let top = interpolate_edge(xf, yf, xf + 1.0, yf, tl, tr, level);
            let right = interpolate_edge(xf + 1.0, yf, xf + 1.0, yf + 1.0, tr, br, level);
            let bottom = interpolate_edge(xf, yf + 1.0, xf + 1.0, yf + 1.0, bl, br, level);
            let left = interpolate_edge(xf, yf, xf, yf + 1.0, tl, bl, level);
            let seg = |start, end| Segment { start, end };

            match case {
                1 | 14 => segments.push(seg(left, top)),
                2 | 13 => segments.push(seg(top, right)),
                3 | 12 => segments.push(seg(left, right)),
                4 | 11 => segments.push(seg(right, bottom)),
                6 | 9 => segments.push(seg(top, bottom)),
                7 | 8 => segments.push(seg(left, bottom)),
                5 | 10 => {
                    // saddle: resolve with the cell-centre average
                    let centre = (tl + tr + bl + br) / 4.0;
                    let centre_high = centre >= level;
                    if (case == 5) == centre_high {
                        segments.push(seg(left, bottom));
                        segments.push(seg(top, right));
                    } else {
                        segments.push(seg(left, top));
                        segments.push(seg(right, bottom));
                    }
                }
                _ => {}
            }
        }
    }

    // a level that hits a grid value exactly yields zero-length pieces
    segments.retain(|s| key(s.start) != key(s.end));
    segments
}

fn interpolate_edge(x1: f32, y1: f32, x2: f32, y2: f32, val1: f32, val2: f32, level: f32) -> Point {
    if (val2 - val1).abs() < 1e-12 {
        return Point::new((x1 + x2) / 2.0, (y1 + y2) / 2.0);
    }
    let t = ((level - val1) / (val2 - val1)).clamp(0.0, 1.0);
    Point::new(x1 + t * (x2 - x1), y1 + t * (y2 - y1))
}

/// Endpoint key; segment ends shared by neighbouring cells are bit-identical
/// up to float noise, so a coarse quantisation is enough
fn key(p: Point) -> (i64, i64) {
    ((p.x * 1.0e4).round() as i64, (p.y * 1.0e4).round() as i64)
}

/// Join segments that share endpoints into polylines
pub fn connect_segments(segments: &[Segment], level: f32) -> Vec<Contour> {
    let mut by_end: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, s) in segments.iter().enumerate() {
        by_end.entry(key(s.start)).or_default().push(i);
        by_end.entry(key(s.end)).or_default().push(i);
    }

    let mut used = vec![false; segments.len()];
    let mut contours = Vec::new();

    let next_from = |p: Point, used: &[bool]| -> Option<(usize, Point)> {
        by_end.get(&key(p))?.iter().find(|&&i| !used[i]).map(|&i| {
            let s = segments[i];
            if key(s.start) == key(p) {
                (i, s.end)
            } else {
                (i, s.start)
            }
        })
    };

    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut points = vec![segments[start].start, segments[start].end];

        // grow forward from the tail
        while let Some(&tail) = points.last() {
            match next_from(tail, &used) {
                Some((i, p)) => {
                    used[i] = true;
                    points.push(p);
                }
                None => break,
            }
        }
        // then backward from the head
        let mut head = Vec::new();
        let mut cursor = points[0];
        while let Some((i, p)) = next_from(cursor, &used) {
            used[i] = true;
            head.push(p);
            cursor = p;
        }
        if !head.is_empty() {
            head.reverse();
            head.extend(points);
            points = head;
        }

        let closed = points.len() > 2 && key(points[0]) == key(points[points.len() - 1]);
        contours.push(Contour {
            level,
            points,
            closed,
        });
    }

    contours
}

/// All isolines of a field at the given levels
pub fn contour_field(field: &GridField, levels: &[f32]) -> Vec<Contour> {
    let (rows, cols) = field.shape();
    let data: Vec<f32> = field.values().iter().copied().collect();
    let Some((min, max)) = field.finite_range() else {
        return vec![];
    };

    levels
        .iter()
        .filter(|&&level| level >= min && level <= max)
        .flat_map(|&level| connect_segments(&march_squares(&data, cols, rows, level), level))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn bump(n: usize) -> GridField {
        let c = (n as f32 - 1.0) / 2.0;
        let values = Array2::from_shape_fn((n, n), |(r, col)| {
            let d2 = (r as f32 - c).powi(2) + (col as f32 - c).powi(2);
            10.0 - d2.sqrt()
        });
        let axis: Vec<f64> = (0..n).map(|i| i as f64).collect();
        GridField::new(values, axis.clone(), axis, "1").unwrap()
    }

    #[test]
    fn test_single_cell_crossing() {
        let data = [0.0, 2.0, 0.0, 2.0];
        let segments = march_squares(&data, 2, 2, 1.0);
        assert_eq!(segments.len(), 1);
        assert!((segments[0].start.x - 0.5).abs() < 1e-6);
        assert!((segments[0].end.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_nan_cells_are_skipped() {
        let data = [0.0, 2.0, f32::NAN, 2.0];
        assert!(march_squares(&data, 2, 2, 1.0).is_empty());
    }

    #[test]
    fn test_bump_gives_one_closed_ring() {
        let field = bump(11);
        let contours = contour_field(&field, &[7.0]);
        assert_eq!(contours.len(), 1);
        assert!(contours[0].closed);
        assert!(contours[0].points.len() > 8);
    }

    #[test]
    fn test_levels_outside_range_are_dropped() {
        let field = bump(11);
        assert!(contour_field(&field, &[50.0, -50.0]).is_empty());
    }
}
