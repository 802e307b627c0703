//! Polyline stroke paths and their SVG path-data encoding.
//!
//! # Responsibility
//! - Store the ordered points of one ink stroke.
//! - Encode as `M x y L x y ...` and decode SVG path data leniently.
//!
//! # Invariants
//! - Curves are reduced to their end points when decoding.
//! - Decoding stops at the first malformed token and keeps what was read.

use std::fmt::Write as _;

use crate::model::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
}

impl PathPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance_to(self, other: PathPoint) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

impl From<Point> for PathPoint {
    fn from(value: Point) -> Self {
        Self::new(f64::from(value.x), f64::from(value.y))
    }
}

/// Axis-aligned bounds of a path, inclusive on every edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathBounds {
    pub min: PathPoint,
    pub max: PathPoint,
}

impl PathBounds {
    pub fn contains(&self, point: PathPoint) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StrokePath {
    points: Vec<PathPoint>,
}

impl StrokePath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<PathPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }

    pub fn push(&mut self, point: PathPoint) {
        self.points.push(point);
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total polyline length.
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| pair[0].distance_to(pair[1]))
            .sum()
    }

    pub fn bounds(&self) -> Option<PathBounds> {
        let first = *self.points.first()?;
        let mut bounds = PathBounds {
            min: first,
            max: first,
        };
        for point in &self.points[1..] {
            bounds.min.x = bounds.min.x.min(point.x);
            bounds.min.y = bounds.min.y.min(point.y);
            bounds.max.x = bounds.max.x.max(point.x);
            bounds.max.y = bounds.max.y.max(point.y);
        }
        Some(bounds)
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        for point in &mut self.points {
            point.x += dx;
            point.y += dy;
        }
    }

    /// Scales every point about `origin`.
    pub fn scale_about(&mut self, origin: PathPoint, factor: f64) {
        for point in &mut self.points {
            point.x = origin.x + (point.x - origin.x) * factor;
            point.y = origin.y + (point.y - origin.y) * factor;
        }
    }

    pub fn to_svg(&self) -> String {
        let mut out = String::new();
        for (index, point) in self.points.iter().enumerate() {
            let command = if index == 0 { 'M' } else { 'L' };
            if index > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{command}{} {}", point.x, point.y);
        }
        out
    }

    /// Decodes SVG path data into a polyline.
    pub fn from_svg(data: &str) -> Self {
        PathParser::new(data).parse()
    }
}

struct PathParser<'a> {
    bytes: &'a [u8],
    pos: usize,
    points: Vec<PathPoint>,
    current: PathPoint,
    subpath_start: PathPoint,
}

impl<'a> PathParser<'a> {
    fn new(data: &'a str) -> Self {
        Self {
            bytes: data.as_bytes(),
            pos: 0,
            points: Vec::new(),
            current: PathPoint::default(),
            subpath_start: PathPoint::default(),
        }
    }

    fn parse(mut self) -> StrokePath {
        let mut command: Option<u8> = None;
        loop {
            self.skip_separators();
            let Some(&byte) = self.bytes.get(self.pos) else {
                break;
            };
            if byte.is_ascii_alphabetic() {
                self.pos += 1;
                if matches!(byte, b'Z' | b'z') {
                    self.close_subpath();
                    command = None;
                    continue;
                }
                command = Some(byte);
            } else if command.is_none() {
                break;
            }

            let Some(active) = command else {
                break;
            };
            match self.segment(active) {
                Some(next) => command = Some(next),
                None => break,
            }
        }
        StrokePath::from_points(self.points)
    }

    /// Reads one segment for `command`; returns the command implied for
    /// following coordinate groups.
    fn segment(&mut self, command: u8) -> Option<u8> {
        let relative = command.is_ascii_lowercase();
        let base = if relative {
            self.current
        } else {
            PathPoint::default()
        };
        let target = match command.to_ascii_uppercase() {
            b'M' | b'L' | b'T' => {
                let [x, y] = self.numbers::<2>()?;
                PathPoint::new(base.x + x, base.y + y)
            }
            b'H' => {
                let [x] = self.numbers::<1>()?;
                PathPoint::new(base.x + x, self.current.y)
            }
            b'V' => {
                let [y] = self.numbers::<1>()?;
                PathPoint::new(self.current.x, base.y + y)
            }
            b'C' => {
                let [_, _, _, _, x, y] = self.numbers::<6>()?;
                PathPoint::new(base.x + x, base.y + y)
            }
            b'S' | b'Q' => {
                let [_, _, x, y] = self.numbers::<4>()?;
                PathPoint::new(base.x + x, base.y + y)
            }
            b'A' => {
                let [_, _, _, _, _, x, y] = self.numbers::<7>()?;
                PathPoint::new(base.x + x, base.y + y)
            }
            _ => return None,
        };

        self.points.push(target);
        self.current = target;
        match command {
            b'M' => {
                self.subpath_start = target;
                Some(b'L')
            }
            b'm' => {
                self.subpath_start = target;
                Some(b'l')
            }
            other => Some(other),
        }
    }

    fn close_subpath(&mut self) {
        if self.points.last() != Some(&self.subpath_start) && !self.points.is_empty() {
            self.points.push(self.subpath_start);
        }
        self.current = self.subpath_start;
    }

    fn numbers<const N: usize>(&mut self) -> Option<[f64; N]> {
        let mut values = [0.0; N];
        for value in &mut values {
            self.skip_separators();
            *value = self.number()?;
        }
        Some(values)
    }

    fn number(&mut self) -> Option<f64> {
        let start = self.pos;
        let mut end = start;
        if matches!(self.bytes.get(end), Some(b'+' | b'-')) {
            end += 1;
        }
        let digits_start = end;
        while matches!(self.bytes.get(end), Some(b) if b.is_ascii_digit()) {
            end += 1;
        }
        if self.bytes.get(end) == Some(&b'.') {
            end += 1;
            while matches!(self.bytes.get(end), Some(b) if b.is_ascii_digit()) {
                end += 1;
            }
        }
        let mantissa = &self.bytes[digits_start..end];
        if !mantissa.iter().any(u8::is_ascii_digit) {
            return None;
        }
        if matches!(self.bytes.get(end), Some(b'e' | b'E')) {
            let mut exp_end = end + 1;
            if matches!(self.bytes.get(exp_end), Some(b'+' | b'-')) {
                exp_end += 1;
            }
            let exp_digits = exp_end;
            while matches!(self.bytes.get(exp_end), Some(b) if b.is_ascii_digit()) {
                exp_end += 1;
            }
            if exp_end > exp_digits {
                end = exp_end;
            }
        }

        let text = std::str::from_utf8(&self.bytes[start..end]).ok()?;
        let value = text.parse::<f64>().ok()?;
        self.pos = end;
        Some(value)
    }

    fn skip_separators(&mut self) {
        while matches!(self.bytes.get(self.pos), Some(b) if b.is_ascii_whitespace() || *b == b',') {
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PathPoint, StrokePath};

    #[test]
    fn writer_emits_move_then_lines() {
        let path = StrokePath::from_points(vec![
            PathPoint::new(10.0, 20.0),
            PathPoint::new(30.5, -4.0),
        ]);
        assert_eq!(path.to_svg(), "M10 20 L30.5 -4");
        assert_eq!(StrokePath::from_svg(&path.to_svg()), path);
        assert_eq!(StrokePath::new().to_svg(), "");
    }

    #[test]
    fn reader_handles_relative_and_compact_commands() {
        let path = StrokePath::from_svg("m10,10 l5-5 h10 V0 z");
        assert_eq!(
            path.points(),
            &[
                PathPoint::new(10.0, 10.0),
                PathPoint::new(15.0, 5.0),
                PathPoint::new(25.0, 5.0),
                PathPoint::new(25.0, 0.0),
                PathPoint::new(10.0, 10.0),
            ]
        );
    }

    #[test]
    fn reader_reduces_curves_to_end_points() {
        let path = StrokePath::from_svg("M0 0 C1 1 2 2 3 3 Q4 4 5 5 S6 6 7 7 T8 8");
        let xs: Vec<f64> = path.points().iter().map(|point| point.x).collect();
        assert_eq!(xs, vec![0.0, 3.0, 5.0, 7.0, 8.0]);
    }

    #[test]
    fn reader_keeps_points_before_malformed_token() {
        let path = StrokePath::from_svg("M0 0 L10 10 L20 oops L30 30");
        assert_eq!(path.points().len(), 2);
        assert!(StrokePath::from_svg("garbage").is_empty());
        assert!(StrokePath::from_svg("10 10").is_empty());
    }

    #[test]
    fn implicit_pairs_after_move_are_lines() {
        let path = StrokePath::from_svg("M0 0 10 0 10 10");
        assert_eq!(path.points().len(), 3);
        assert_eq!(path.length(), 20.0);
    }
}
