//! Integer geometry used throughout the selection engine.
//!
//! Coordinates are in document pixel space with the y axis pointing down.
//! A pixel `(x, y)` covers the unit square from `(x, y)` to `(x + 1, y + 1)`.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Integer 2D vector, used for pixel, corner and tile coordinates.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VecI {
    pub x: i32,
    pub y: i32,
}

impl VecI {
    pub const ZERO: VecI = VecI { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile containing `pos` for a given tile size (floor division).
    pub fn tile_of(pos: VecI, tile_size: i32) -> VecI {
        VecI::new(pos.x.div_euclid(tile_size), pos.y.div_euclid(tile_size))
    }

    /// True when `0 <= x < size.x` and `0 <= y < size.y`.
    pub fn is_inside(self, size: VecI) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < size.x && self.y < size.y
    }
}

impl fmt::Display for VecI {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl Add for VecI {
    type Output = VecI;
    fn add(self, rhs: VecI) -> VecI {
        VecI::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for VecI {
    type Output = VecI;
    fn sub(self, rhs: VecI) -> VecI {
        VecI::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<i32> for VecI {
    type Output = VecI;
    fn mul(self, rhs: i32) -> VecI {
        VecI::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for VecI {
    type Output = VecI;
    fn neg(self) -> VecI {
        VecI::new(-self.x, -self.y)
    }
}

/// Axis-aligned integer rectangle, half-open: `[left, right) x [top, bottom)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RectI {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl RectI {
    pub fn new(pos: VecI, size: VecI) -> Self {
        Self {
            left: pos.x,
            top: pos.y,
            right: pos.x + size.x,
            bottom: pos.y + size.y,
        }
    }

    pub fn from_sides(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_zero_or_negative_area(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Pixel count of the rectangle, zero when degenerate.
    pub fn area(&self) -> u64 {
        if self.is_zero_or_negative_area() {
            0
        } else {
            self.width() as u64 * self.height() as u64
        }
    }

    pub fn intersect(&self, other: &RectI) -> RectI {
        RectI {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }

    /// Smallest rectangle containing both (degenerate inputs are ignored).
    pub fn union(&self, other: &RectI) -> RectI {
        if self.is_zero_or_negative_area() {
            return *other;
        }
        if other.is_zero_or_negative_area() {
            return *self;
        }
        RectI {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// One of the four unit directions a boundary edge can travel in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];

    pub fn vector(self) -> VecI {
        match self {
            Direction::Up => VecI::new(0, -1),
            Direction::Right => VecI::new(1, 0),
            Direction::Down => VecI::new(0, 1),
            Direction::Left => VecI::new(-1, 0),
        }
    }

    /// Direction of a unit vector, `None` for anything else.
    pub fn from_unit(v: VecI) -> Option<Direction> {
        match (v.x, v.y) {
            (0, -1) => Some(Direction::Up),
            (1, 0) => Some(Direction::Right),
            (0, 1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            _ => None,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
        }
    }

    /// Clockwise on screen (y down): Up -> Right -> Down -> Left.
    pub fn turn_right(self) -> Direction {
        match self {
            Direction::Up => Direction::Right,
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
        }
    }

    pub fn turn_left(self) -> Direction {
        self.turn_right().opposite()
    }

    /// Dense index for per-direction tables.
    pub fn index(self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Right => 1,
            Direction::Down => 2,
            Direction::Left => 3,
        }
    }
}
