//! Core types shared across the toolkit.
//!
//! Geometry lives in two flavors: `Vec2` (f64) for reactive geometry cells,
//! where ratio arithmetic like `size * 0.05` must not truncate, and
//! `Point2`/`Rect` (i32, half-open) for pixel-space regions, clipping and
//! blitting.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

// =============================================================================
// Vec2 - continuous geometry
// =============================================================================

/// A 2D vector of f64, used by the reactive geometry cells.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };
    pub const ONE: Self = Self { x: 1.0, y: 1.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise maximum.
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y))
    }

    /// Component-wise minimum.
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y))
    }

    /// Round to the nearest pixel position.
    pub fn round(self) -> Point2 {
        Point2::new(self.x.round() as i32, self.y.round() as i32)
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Vec2> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: Vec2) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y)
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl From<Point2> for Vec2 {
    fn from(p: Point2) -> Self {
        Self::new(p.x as f64, p.y as f64)
    }
}

// =============================================================================
// Point2 - pixel coordinates
// =============================================================================

/// An integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Point2 {
    pub x: i32,
    pub y: i32,
}

impl Point2 {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

// =============================================================================
// Rect - half-open pixel rectangle
// =============================================================================

/// An axis-aligned pixel rectangle, half-open: `min` inclusive, `max`
/// exclusive. Empty when either axis is degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub min: Point2,
    pub max: Point2,
}

impl Rect {
    /// The all-covering clip sentinel used by unclipped components.
    pub const INFINITE: Self = Self {
        min: Point2::new(i32::MIN / 2, i32::MIN / 2),
        max: Point2::new(i32::MAX / 2, i32::MAX / 2),
    };

    pub const EMPTY: Self = Self {
        min: Point2::ZERO,
        max: Point2::ZERO,
    };

    pub const fn new(min: Point2, max: Point2) -> Self {
        Self { min, max }
    }

    /// Construct from an origin and a size, rounding to pixels.
    pub fn from_pos_size(pos: Vec2, size: Vec2) -> Self {
        Self {
            min: pos.round(),
            max: (pos + size).round(),
        }
    }

    pub const fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            min: Point2::new(x, y),
            max: Point2::new(x + w, y + h),
        }
    }

    pub fn width(&self) -> i32 {
        (self.max.x - self.min.x).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.max.y - self.min.y).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y
    }

    pub fn contains(&self, p: Point2) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    /// True if this rect fully contains `other`.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        !other.is_empty()
            && other.min.x >= self.min.x
            && other.min.y >= self.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    /// True if the two rects share any area.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    /// The overlapping area of two rects (possibly empty).
    pub fn intersect(&self, other: &Rect) -> Rect {
        let min = Point2::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y));
        let max = Point2::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y));
        if max.x <= min.x || max.y <= min.y {
            Rect::EMPTY
        } else {
            Rect { min, max }
        }
    }

    /// The minimal rect covering both inputs. Empty inputs are ignored.
    pub fn encompass(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect {
            min: Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn translate(&self, by: Point2) -> Rect {
        Rect {
            min: self.min + by,
            max: self.max + by,
        }
    }
}

// =============================================================================
// Rgba
// =============================================================================

/// An 8-bit-per-channel color with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);
    pub const GRAY: Self = Self::rgb(128, 128, 128);

    pub const fn is_opaque(&self) -> bool {
        self.a == 255
    }

    pub const fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Create from a 0xRRGGBB integer.
    pub const fn from_rgb_int(rgb: u32) -> Self {
        Self::rgb(
            ((rgb >> 16) & 0xFF) as u8,
            ((rgb >> 8) & 0xFF) as u8,
            (rgb & 0xFF) as u8,
        )
    }

    /// Alpha-blend `src` over `dst` (straight alpha).
    pub fn blend(src: Self, dst: Self) -> Self {
        if src.is_opaque() || dst.is_transparent() {
            return src;
        }
        if src.is_transparent() {
            return dst;
        }
        let sa = src.a as u32;
        let da = dst.a as u32;
        let out_a = sa + da * (255 - sa) / 255;
        if out_a == 0 {
            return Self::TRANSPARENT;
        }
        let channel = |s: u8, d: u8| {
            let s = s as u32;
            let d = d as u32;
            ((s * sa + d * da * (255 - sa) / 255) / out_a) as u8
        };
        Self {
            r: channel(src.r, dst.r),
            g: channel(src.g, dst.g),
            b: channel(src.b, dst.b),
            a: out_a as u8,
        }
    }

    /// Tint scaled by a coverage mask value (0..=255), used when
    /// compositing glyph masks.
    pub fn cover(tint: Self, coverage: u8) -> Self {
        Self {
            r: tint.r,
            g: tint.g,
            b: tint.b,
            a: ((tint.a as u32 * coverage as u32) / 255) as u8,
        }
    }
}

/// How source pixels land on a destination buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlitMode {
    /// Overwrite destination pixels, alpha included.
    Replace,
    /// Copy source pixels verbatim where they carry any alpha, skip the
    /// rest. The fast path for visuals that fully cover what they draw.
    Mask,
    /// Alpha-blend over the destination.
    Blend,
}

// =============================================================================
// Input vocabulary
// =============================================================================

/// Mouse button identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    Extra(u8),
}

/// Keyboard key identity. Deliberately small: the platform layer owns
/// keymaps, the dispatcher only needs hashable identity for waiter pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Enter,
    Escape,
    Backspace,
    Tab,
    Space,
    Left,
    Right,
    Up,
    Down,
    Shift,
    Control,
    Alt,
    Char(char),
    Other(u32),
}

/// Cursor icon requested while hovering a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    /// No preference; the dispatcher keeps whatever is already showing.
    #[default]
    Unspecified,
    Arrow,
    Hand,
    Text,
    Move,
    ResizeHorizontal,
    ResizeVertical,
    ResizeNesw,
    ResizeNwse,
}

// =============================================================================
// Tests
// =============================================================================
