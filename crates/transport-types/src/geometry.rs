//! Vectors and rotations in the simulator's frame.
//!
//! The world is y-up.  A robot facing yaw `0` looks down `+z` and its right
//! hand points along `+x`.  Angles at API boundaries are in degrees, matching
//! the simulator's joint targets.
//!
//! # Example
//!
//! ```rust
//! use transport_types::geometry::{Quaternion, Vector3};
//!
//! // A quarter turn about y maps forward onto the robot's right.
//! let q = Quaternion::from_yaw(90.0);
//! let v = q.rotate(Vector3::FORWARD);
//! assert!((v.x - 1.0).abs() < 1e-5);
//! assert!(v.z.abs() < 1e-5);
//! ```

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Vector3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector (position, offset, or Euler angles in degrees).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);
    pub const UP: Vector3 = Vector3::new(0.0, 1.0, 0.0);
    pub const FORWARD: Vector3 = Vector3::new(0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Distance in the floor plane, ignoring height.
    pub fn horizontal_distance(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Self) -> Self {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Self) -> Self {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Vector3;

    fn mul(self, rhs: f32) -> Self {
        Vector3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vector3 {
    type Output = Vector3;

    fn neg(self) -> Self {
        Vector3::new(-self.x, -self.y, -self.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Quaternion
// ────────────────────────────────────────────────────────────────────────────

/// A unit quaternion.  Serialized in the simulator's `x, y, z, w` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `degrees` about a unit `axis`.
    pub fn from_axis_angle(axis: Vector3, degrees: f32) -> Self {
        let half = degrees.to_radians() * 0.5;
        let s = half.sin();
        Self::new(axis.x * s, axis.y * s, axis.z * s, half.cos())
    }

    /// Rotation about the vertical axis.
    pub fn from_yaw(degrees: f32) -> Self {
        Self::from_axis_angle(Vector3::UP, degrees)
    }

    /// Rotation about the horizontal x axis.
    pub fn from_pitch(degrees: f32) -> Self {
        Self::from_axis_angle(Vector3::new(1.0, 0.0, 0.0), degrees)
    }

    /// Hamilton product: `self` applied after `rhs`.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }

    /// Conjugate (the inverse of a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Rotate a vector: `q * v * q⁻¹`.
    pub fn rotate(self, v: Vector3) -> Vector3 {
        let p = Self::new(v.x, v.y, v.z, 0.0);
        let r = self.mul(p).mul(self.conjugate());
        Vector3::new(r.x, r.y, r.z)
    }

    /// Rotation about the local x axis in degrees, for a rotation composed as
    /// yaw then pitch.  Uses `atan2(2(xw − yz), 1 − 2(x² + z²))`, which is
    /// independent of the yaw component.
    pub fn pitch(self) -> f32 {
        let num = 2.0 * (self.x * self.w - self.y * self.z);
        let den = 1.0 - 2.0 * (self.x * self.x + self.z * self.z);
        num.atan2(den).to_degrees()
    }

    /// Heading about the vertical axis in degrees, assuming the rotation is a
    /// yaw possibly followed by a local pitch.
    pub fn yaw(self) -> f32 {
        let forward = self.rotate(Vector3::FORWARD);
        forward.x.atan2(forward.z).to_degrees()
    }
}
