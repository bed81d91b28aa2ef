//! Integer index space: cell coordinates and half-open boxes of cells.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// Three-component integer cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct IntVector {
    /// X component.
    pub x: i32,
    /// Y component.
    pub y: i32,
    /// Z component.
    pub z: i32,
}

impl IntVector {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0, 0, 0);
    /// The unit vector, used as the identity refinement ratio.
    pub const ONE: Self = Self::new(1, 1, 1);

    /// Create a vector from its components.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Vector with every component set to `v`.
    #[must_use]
    pub const fn splat(v: i32) -> Self {
        Self::new(v, v, v)
    }

    /// Component by axis index (0 = x, 1 = y, 2 = z).
    #[must_use]
    pub const fn get(self, axis: usize) -> i32 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Copy of `self` with one component replaced.
    #[must_use]
    pub const fn with(mut self, axis: usize, value: i32) -> Self {
        match axis {
            0 => self.x = value,
            1 => self.y = value,
            _ => self.z = value,
        }
        self
    }

    /// Component-wise minimum.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// Component-wise floor division. Divisors must be positive.
    #[must_use]
    pub fn div_floor(self, ratio: Self) -> Self {
        Self::new(
            self.x.div_euclid(ratio.x),
            self.y.div_euclid(ratio.y),
            self.z.div_euclid(ratio.z),
        )
    }

    /// Component-wise ceiling division. Divisors must be positive.
    #[must_use]
    pub fn div_ceil(self, ratio: Self) -> Self {
        let ceil = |v: i32, r: i32| -(-v).div_euclid(r);
        Self::new(
            ceil(self.x, ratio.x),
            ceil(self.y, ratio.y),
            ceil(self.z, ratio.z),
        )
    }

    /// True when every component is strictly positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.x > 0 && self.y > 0 && self.z > 0
    }
}

impl Add for IntVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for IntVector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul for IntVector {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }
}

impl Neg for IntVector {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Display for IntVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

/// Half-open box of cells `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRange {
    /// Inclusive lower corner.
    pub low: IntVector,
    /// Exclusive upper corner.
    pub high: IntVector,
}

impl IndexRange {
    /// Create a range from its corners.
    #[must_use]
    pub const fn new(low: IntVector, high: IntVector) -> Self {
        Self { low, high }
    }

    /// True when the range contains no cell.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.high.x <= self.low.x || self.high.y <= self.low.y || self.high.z <= self.low.z
    }

    /// Number of cells, zero for empty ranges.
    #[must_use]
    pub fn volume(&self) -> i64 {
        if self.is_empty() {
            return 0;
        }
        let extent = self.high - self.low;
        i64::from(extent.x) * i64::from(extent.y) * i64::from(extent.z)
    }

    /// Number of cells along each axis.
    #[must_use]
    pub fn extent(&self) -> IntVector {
        (self.high - self.low).max(IntVector::ZERO)
    }

    /// Overlap of two ranges, `None` when they do not share a cell.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let range = Self::new(self.low.max(other.low), self.high.min(other.high));
        (!range.is_empty()).then_some(range)
    }

    /// True when the two ranges share at least one cell.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.intersect(other).is_some()
    }

    /// True when `other` lies entirely inside `self`.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        other.is_empty()
            || (self.low.min(other.low) == self.low && self.high.max(other.high) == self.high)
    }

    /// Grow by `extent` cells on every side.
    #[must_use]
    pub fn dilate(&self, extent: i32) -> Self {
        let g = IntVector::splat(extent);
        Self::new(self.low - g, self.high + g)
    }

    /// Grow by `extent` cells on both sides of a single axis.
    #[must_use]
    pub fn dilate_axis(&self, axis: usize, extent: i32) -> Self {
        Self::new(
            self.low.with(axis, self.low.get(axis) - extent),
            self.high.with(axis, self.high.get(axis) + extent),
        )
    }

    /// Shift by `offset`.
    #[must_use]
    pub fn translate(&self, offset: IntVector) -> Self {
        Self::new(self.low + offset, self.high + offset)
    }

    /// Map onto a coarser index space. The result covers every coarse cell
    /// that overlaps any fine cell of `self`.
    #[must_use]
    pub fn coarsen(&self, ratio: IntVector) -> Self {
        Self::new(self.low.div_floor(ratio), self.high.div_ceil(ratio))
    }

    /// Map onto a finer index space.
    #[must_use]
    pub fn refine(&self, ratio: IntVector) -> Self {
        Self::new(self.low * ratio, self.high * ratio)
    }

    /// Smallest range covering both.
    #[must_use]
    pub fn union_hull(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::new(self.low.min(other.low), self.high.max(other.high))
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.low, self.high)
    }
}
