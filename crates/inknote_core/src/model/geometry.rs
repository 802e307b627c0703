//! Integer geometry and color primitives shared by pages and objects.
//!
//! # Invariants
//! - A rect with `width <= 0` or `height <= 0` is empty: it contains no point
//!   and intersects nothing.
//! - Arithmetic that can leave `i32` range is done in `i64` and saturated.

use std::fmt::{Display, Formatter};

/// Integer point in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Integer size in page units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Returns whether `point` lies inside the half-open area of this rect.
    pub fn contains(&self, point: Point) -> bool {
        if self.is_empty() {
            return false;
        }
        let (px, py) = (i64::from(point.x), i64::from(point.y));
        let (left, top) = (i64::from(self.x), i64::from(self.y));
        px >= left
            && px < left + i64::from(self.width)
            && py >= top
            && py < top + i64::from(self.height)
    }

    /// Returns whether both rects are non-empty and share some area.
    pub fn intersects(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        let (l1, t1) = (i64::from(self.x), i64::from(self.y));
        let (r1, b1) = (l1 + i64::from(self.width), t1 + i64::from(self.height));
        let (l2, t2) = (i64::from(other.x), i64::from(other.y));
        let (r2, b2) = (l2 + i64::from(other.width), t2 + i64::from(other.height));
        l1 < r2 && l2 < r1 && t1 < b2 && t2 < b1
    }

    pub fn translated(&self, delta: Point) -> Self {
        Self::new(
            saturate(i64::from(self.x) + i64::from(delta.x)),
            saturate(i64::from(self.y) + i64::from(delta.y)),
            self.width,
            self.height,
        )
    }

    /// Center using inclusive right/bottom edges, rounded toward zero.
    pub fn center(&self) -> Point {
        let right = i64::from(self.x) + i64::from(self.width) - 1;
        let bottom = i64::from(self.y) + i64::from(self.height) - 1;
        Point::new(
            saturate((i64::from(self.x) + right) / 2),
            saturate((i64::from(self.y) + bottom) / 2),
        )
    }

    /// Scales around the center; each dimension is truncated toward zero.
    ///
    /// Zero or negative results are kept as-is.
    pub fn scaled(&self, factor: f64) -> Self {
        let center = self.center();
        let width = truncate_to_i32(f64::from(self.width) * factor);
        let height = truncate_to_i32(f64::from(self.height) * factor);
        Self::new(
            saturate(i64::from(center.x) - (i64::from(width) - 1) / 2),
            saturate(i64::from(center.y) - (i64::from(height) - 1) / 2),
            width,
            height,
        )
    }
}

/// RGBA color serialized in `#rrggbb` / `#aarrggbb` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 255
    }

    /// Formats as `#rrggbb` for opaque colors, `#aarrggbb` otherwise.
    pub fn to_hex(&self) -> String {
        if self.is_opaque() {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.a, self.r, self.g, self.b)
        }
    }

    /// Parses `#rgb`, `#rrggbb` or `#aarrggbb`.
    pub fn from_hex(value: &str) -> Option<Self> {
        let digits = value.trim().strip_prefix('#')?;
        if !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return None;
        }
        let byte = |index: usize| u8::from_str_radix(&digits[index..index + 2], 16).ok();
        match digits.len() {
            3 => {
                let nibble = |index: usize| {
                    u8::from_str_radix(&digits[index..index + 1], 16)
                        .ok()
                        .map(|v| v * 17)
                };
                Some(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(2)?, byte(4)?, byte(6)?, byte(0)?)),
            _ => None,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub(crate) fn saturate(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn truncate_to_i32(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    // `as` truncates toward zero and saturates at the i32 bounds.
    value as i32
}
