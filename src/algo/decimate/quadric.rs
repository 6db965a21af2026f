//! Quadric error matrices.
//!
//! A [`Quadric`] is a 4x4 symmetric matrix `Q` encoding the quadratic form
//! `v^T Q v` over homogeneous points `v = (x, y, z, 1)`. Built from a single
//! plane it measures squared signed distance to that plane; summed over many
//! planes it is the Garland-Heckbert error metric used to rank and place
//! edge collapses. The type also works standalone for implicit-surface style
//! evaluation, exposing the scalar error and its gradient.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use nalgebra::{Matrix4, Point3, Vector3, Vector4};

/// A quadric error matrix.
///
/// The matrix is stored verbatim; constructors that take an arbitrary matrix
/// leave symmetry to the caller, while [`Quadric::from_plane`] and sums of
/// plane quadrics are symmetric by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric {
    m: Matrix4<f64>,
}

impl Quadric {
    /// Determinant magnitude below which the position system is treated as
    /// singular. Accumulated quadrics of near-planar neighborhoods land
    /// close to, but rarely exactly at, zero.
    pub const SINGULAR_EPS: f64 = 1e-10;

    /// The zero quadric.
    pub fn zero() -> Self {
        Self {
            m: Matrix4::zeros(),
        }
    }

    /// Wrap an arbitrary 4x4 matrix.
    pub fn from_matrix(m: Matrix4<f64>) -> Self {
        Self { m }
    }

    /// Build the rank-1 quadric of the plane `n . p + d = 0`.
    ///
    /// `n` must be a unit normal; the result is the outer product of the
    /// homogeneous plane vector `(n_x, n_y, n_z, d)` with itself.
    pub fn from_plane(n: &Vector3<f64>, d: f64) -> Self {
        let a = Vector4::new(n.x, n.y, n.z, d);
        Self { m: a * a.transpose() }
    }

    /// Access the underlying matrix.
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.m
    }

    /// Evaluate `p^T Q p` for the homogeneous point `p = (x, y, z, 1)`.
    pub fn value(&self, p: &Point3<f64>) -> f64 {
        let v = p.coords.push(1.0);
        v.dot(&(self.m * v))
    }

    /// Evaluate the gradient of [`Quadric::value`] with respect to `(x, y, z)`,
    /// holding the homogeneous coordinate fixed at 1: the first three
    /// components of `2 (Q p)`.
    pub fn gradient(&self, p: &Point3<f64>) -> Vector3<f64> {
        let v = p.coords.push(1.0);
        (2.0 * (self.m * v)).xyz()
    }

    /// Solve for the position minimizing this quadric, subject to the
    /// homogeneous coordinate staying 1.
    ///
    /// The last row of `Q` is overwritten with `(0, 0, 0, 1)` and the system
    /// `Qpos v = (0, 0, 0, 1)^T` is solved by inversion. Returns `None` when
    /// the system is singular within [`Quadric::SINGULAR_EPS`] — the caller
    /// is expected to fall back to evaluating candidate positions directly.
    pub fn minimizer(&self) -> Option<Point3<f64>> {
        let mut qpos = self.m;
        qpos[(3, 0)] = 0.0;
        qpos[(3, 1)] = 0.0;
        qpos[(3, 2)] = 0.0;
        qpos[(3, 3)] = 1.0;

        if qpos.determinant().abs() < Self::SINGULAR_EPS {
            return None;
        }

        let inv = qpos.try_inverse()?;
        let v = inv * Vector4::new(0.0, 0.0, 0.0, 1.0);
        Some(Point3::new(v.x, v.y, v.z))
    }
}

impl Default for Quadric {
    fn default() -> Self {
        Self::zero()
    }
}

impl Add for Quadric {
    type Output = Quadric;

    fn add(self, rhs: Quadric) -> Quadric {
        Quadric { m: self.m + rhs.m }
    }
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, rhs: Quadric) {
        self.m += rhs.m;
    }
}

impl Sum for Quadric {
    fn sum<I: Iterator<Item = Quadric>>(iter: I) -> Quadric {
        iter.fold(Quadric::zero(), Add::add)
    }
}
