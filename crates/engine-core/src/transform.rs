//! Rigid-body transform math.
//!
//! Convention used everywhere in the workspace:
//! - column vectors, a point maps as `x' = R·x + t`;
//! - homogeneous form `[[R t], [0 0 0 1]]`;
//! - `A × B` means "apply `B`, then `A`", so left-multiplying a delta onto
//!   a placement expresses the delta in the *parent* frame.
//!
//! Flat layouts:
//! - 12 values: `R` row-major in `[0..9]`, `t` in `[9..12]`;
//! - 16 values: the 4×4 homogeneous matrix, row-major.

use std::ops::Mul;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A 3×3 matrix stored row-major.
///
/// Used for rotations, but orthonormality is not enforced: the engine
/// accepts whatever the caller sends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix3(pub [[f64; 3]; 3]);

impl Matrix3 {
    pub const IDENTITY: Matrix3 = Matrix3([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    /// Build from loosely shaped rows, rejecting anything that is not
    /// exactly 3×3 with finite entries.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        if rows.len() != 3 {
            return Err(Error::Validation(format!(
                "rotation must be 3x3, got {} rows",
                rows.len()
            )));
        }

        let mut m = [[0.0; 3]; 3];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != 3 {
                return Err(Error::Validation(format!(
                    "rotation must be 3x3, row {} has {} columns",
                    i,
                    row.len()
                )));
            }
            for (j, v) in row.iter().enumerate() {
                if !v.is_finite() {
                    return Err(Error::Validation(format!(
                        "rotation entry ({}, {}) is not finite",
                        i, j
                    )));
                }
                m[i][j] = *v;
            }
        }

        Ok(Matrix3(m))
    }

    /// Elementary rotation about X by `angle` radians.
    pub fn rot_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Matrix3([[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]])
    }

    /// Elementary rotation about Y by `angle` radians.
    pub fn rot_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Matrix3([[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]])
    }

    /// Elementary rotation about Z by `angle` radians.
    pub fn rot_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Matrix3([[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]])
    }

    /// `Rz(rz) · Ry(ry) · Rx(rx)`: X is applied first, Z last.
    ///
    /// The order matters; swapping it gives a different orientation for the
    /// same three angles.
    pub fn from_euler(rx: f64, ry: f64, rz: f64) -> Self {
        Matrix3::rot_z(rz) * Matrix3::rot_y(ry) * Matrix3::rot_x(rx)
    }

    pub fn rows(&self) -> &[[f64; 3]; 3] {
        &self.0
    }

    /// `M · v`.
    pub fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.0;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }
}

impl Mul for Matrix3 {
    type Output = Matrix3;

    fn mul(self, rhs: Matrix3) -> Matrix3 {
        let a = &self.0;
        let b = &rhs.0;
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }
        Matrix3(out)
    }
}

/// Rotation plus translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub rotation: Matrix3,
    pub translation: [f64; 3],
}

impl Default for RigidTransform {
    fn default() -> Self {
        RigidTransform::IDENTITY
    }
}

impl RigidTransform {
    pub const IDENTITY: RigidTransform = RigidTransform {
        rotation: Matrix3::IDENTITY,
        translation: [0.0, 0.0, 0.0],
    };

    pub fn new(rotation: Matrix3, translation: [f64; 3]) -> Self {
        RigidTransform {
            rotation,
            translation,
        }
    }

    /// `T(v)`: identity rotation, translation `v`.
    pub fn from_translation(v: [f64; 3]) -> Self {
        RigidTransform::new(Matrix3::IDENTITY, v)
    }

    /// Pure rotation about the origin.
    pub fn from_rotation(rotation: Matrix3) -> Self {
        RigidTransform::new(rotation, [0.0, 0.0, 0.0])
    }

    /// Parse the 12-value layout.
    pub fn from_array12(values: &[f64]) -> Result<Self> {
        if values.len() != 12 {
            return Err(Error::Validation(format!(
                "transform array must have 12 values, got {}",
                values.len()
            )));
        }

        let r = Matrix3([
            [values[0], values[1], values[2]],
            [values[3], values[4], values[5]],
            [values[6], values[7], values[8]],
        ]);
        Ok(RigidTransform::new(r, [values[9], values[10], values[11]]))
    }

    pub fn to_array12(&self) -> [f64; 12] {
        let r = &self.rotation.0;
        let t = &self.translation;
        [
            r[0][0], r[0][1], r[0][2], //
            r[1][0], r[1][1], r[1][2], //
            r[2][0], r[2][1], r[2][2], //
            t[0], t[1], t[2],
        ]
    }

    /// Parse a row-major 4×4 homogeneous matrix. The bottom row must be `0 0 0 1`.
    pub fn from_homogeneous(values: &[f64]) -> Result<Self> {
        if values.len() != 16 {
            return Err(Error::Validation(format!(
                "homogeneous transform must have 16 values, got {}",
                values.len()
            )));
        }
        if values[12..16] != [0.0, 0.0, 0.0, 1.0] {
            return Err(Error::Validation(
                "homogeneous transform bottom row must be [0, 0, 0, 1]".to_string(),
            ));
        }

        let r = Matrix3([
            [values[0], values[1], values[2]],
            [values[4], values[5], values[6]],
            [values[8], values[9], values[10]],
        ]);
        Ok(RigidTransform::new(r, [values[3], values[7], values[11]]))
    }

    pub fn to_homogeneous(&self) -> [f64; 16] {
        let r = &self.rotation.0;
        let t = &self.translation;
        [
            r[0][0], r[0][1], r[0][2], t[0], //
            r[1][0], r[1][1], r[1][2], t[1], //
            r[2][0], r[2][1], r[2][2], t[2], //
            0.0, 0.0, 0.0, 1.0,
        ]
    }

    /// `self × rhs`: apply `rhs` first, then `self`.
    pub fn compose(&self, rhs: &RigidTransform) -> RigidTransform {
        let rotated = self.rotation.apply(rhs.translation);
        RigidTransform {
            rotation: self.rotation * rhs.rotation,
            translation: [
                rotated[0] + self.translation[0],
                rotated[1] + self.translation[1],
                rotated[2] + self.translation[2],
            ],
        }
    }

    pub fn apply_point(&self, p: [f64; 3]) -> [f64; 3] {
        let r = self.rotation.apply(p);
        [
            r[0] + self.translation[0],
            r[1] + self.translation[1],
            r[2] + self.translation[2],
        ]
    }

    /// `T(d) × self`: move along the parent frame's axes, not the object's own.
    pub fn translated(&self, d: [f64; 3]) -> RigidTransform {
        RigidTransform::from_translation(d).compose(self)
    }

    /// `R × self`: rotate about the parent frame's origin.
    pub fn rotated_about_origin(&self, rotation: Matrix3) -> RigidTransform {
        RigidTransform::from_rotation(rotation).compose(self)
    }

    /// `T(p) × R × T(-p) × self` where `p` is this transform's translation:
    /// rotate about the object's own origin, which therefore stays put.
    pub fn rotated_in_place(&self, rotation: Matrix3) -> RigidTransform {
        let p = self.translation;
        let swing = RigidTransform::from_translation(p)
            .compose(&RigidTransform::from_rotation(rotation))
            .compose(&RigidTransform::from_translation([-p[0], -p[1], -p[2]]));
        swing.compose(self)
    }
}

impl Mul for RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: RigidTransform) -> RigidTransform {
        self.compose(&rhs)
    }
}
