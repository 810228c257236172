//! Planar rotation math shared by the transform tree.
//!
//! [`Angle`] is a radians newtype so rotations cannot be confused with
//! plain scalars, and so rotation of vectors, wrapping, and approximate
//! comparison live in one place.

use std::f32::consts::{PI, TAU};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Tolerance for pose comparisons. Moves smaller than this are treated as
/// no-ops by the mutators.
pub const POSE_EPSILON: f32 = 1.0e-4;

/// A planar rotation in radians, counter-clockwise positive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Angle(pub f32);

impl Angle {
    pub const ZERO: Self = Self(0.0);

    #[must_use]
    pub fn from_radians(radians: f32) -> Self {
        Self(radians)
    }

    #[must_use]
    pub fn from_degrees(degrees: f32) -> Self {
        Self(degrees.to_radians())
    }

    #[must_use]
    pub fn radians(self) -> f32 {
        self.0
    }

    #[must_use]
    pub fn degrees(self) -> f32 {
        self.0.to_degrees()
    }

    /// Rotate a vector by this angle about the origin.
    #[must_use]
    pub fn rotate_vec(self, v: Vec2) -> Vec2 {
        let (sin, cos) = self.0.sin_cos();
        Vec2::new(cos * v.x - sin * v.y, sin * v.x + cos * v.y)
    }

    /// The same heading wrapped into `[-PI, PI)`.
    ///
    /// Ancestor walks accumulate raw sums; wrap at the point of use when a
    /// canonical heading is needed.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self((self.0 + PI).rem_euclid(TAU) - PI)
    }

    /// Whether two angles describe the same heading within
    /// [`POSE_EPSILON`], ignoring full turns.
    #[must_use]
    pub fn approx_eq(self, other: Self) -> bool {
        (self - other).normalized().0.abs() < POSE_EPSILON
    }
}

impl Add for Angle {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Angle {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Angle {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Angle {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Angle {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}
