use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum BoxError {
    #[error("Box edge lengths must be positive, got ({0}, {1}, {2})")]
    NonPositiveEdge(f64, f64, f64),
}

/// A periodic triclinic simulation cell.
///
/// The cell is parameterized by three edge lengths and three tilt factors,
/// giving the (column-major) cell matrix
///
/// ```text
///     | lx   xy*ly   xz*lz |
/// h = | 0    ly      yz*lz |
///     | 0    0       lz    |
/// ```
///
/// so the volume is always `lx * ly * lz`. Tilt factors outside the reduced
/// range `[-0.5, 0.5]` describe the same lattice as a lower-shear cell; see
/// [`SimBox::lattice_reduce`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimBox {
    lx: f64,
    ly: f64,
    lz: f64,
    xy: f64,
    xz: f64,
    yz: f64,
}

impl SimBox {
    /// Creates an orthorhombic box.
    pub fn new(lx: f64, ly: f64, lz: f64) -> Result<Self, BoxError> {
        Self::with_tilt(lx, ly, lz, 0.0, 0.0, 0.0)
    }

    /// Creates a cubic box with edge `l`.
    pub fn cubic(l: f64) -> Result<Self, BoxError> {
        Self::new(l, l, l)
    }

    /// Creates a triclinic box from edge lengths and tilt factors.
    pub fn with_tilt(lx: f64, ly: f64, lz: f64, xy: f64, xz: f64, yz: f64) -> Result<Self, BoxError> {
        if lx <= 0.0 || ly <= 0.0 || lz <= 0.0 {
            return Err(BoxError::NonPositiveEdge(lx, ly, lz));
        }
        Ok(Self { lx, ly, lz, xy, xz, yz })
    }

    pub fn lengths(&self) -> (f64, f64, f64) {
        (self.lx, self.ly, self.lz)
    }

    pub fn tilts(&self) -> (f64, f64, f64) {
        (self.xy, self.xz, self.yz)
    }

    pub fn volume(&self) -> f64 {
        self.lx * self.ly * self.lz
    }

    /// The shortest distance between opposite faces, a lower bound for safe
    /// interaction ranges under the minimum-image convention.
    pub fn shortest_perpendicular(&self) -> f64 {
        let h = self.cell_matrix();
        let a1 = h.column(0).into_owned();
        let a2 = h.column(1).into_owned();
        let a3 = h.column(2).into_owned();
        let v = self.volume();
        let w1 = v / a2.cross(&a3).norm();
        let w2 = v / a3.cross(&a1).norm();
        let w3 = v / a1.cross(&a2).norm();
        w1.min(w2).min(w3)
    }

    pub fn cell_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.lx,
            self.xy * self.ly,
            self.xz * self.lz,
            0.0,
            self.ly,
            self.yz * self.lz,
            0.0,
            0.0,
            self.lz,
        )
    }

    /// Converts a Cartesian position to fractional coordinates in `[..)^3`
    /// (not wrapped).
    pub fn fractional(&self, position: &Point3<f64>) -> Vector3<f64> {
        // Back-substitution against the upper-triangular cell matrix.
        let z = position.z / self.lz;
        let y = (position.y - self.yz * self.lz * z) / self.ly;
        let x = (position.x - self.xy * self.ly * y - self.xz * self.lz * z) / self.lx;
        Vector3::new(x, y, z)
    }

    pub fn cartesian(&self, fraction: &Vector3<f64>) -> Point3<f64> {
        Point3::from(self.cell_matrix() * fraction)
    }

    /// Wraps a position into the primary image.
    pub fn wrap(&self, position: &Point3<f64>) -> Point3<f64> {
        let mut f = self.fractional(position);
        for i in 0..3 {
            f[i] -= f[i].floor();
        }
        self.cartesian(&f)
    }

    /// Minimum-image separation vector.
    pub fn min_image(&self, delta: &Vector3<f64>) -> Vector3<f64> {
        let mut f = self.fractional(&Point3::from(*delta));
        for i in 0..3 {
            f[i] -= f[i].round();
        }
        self.cartesian(&f).coords
    }

    /// Maps the position from this box's fractional frame into `target`.
    ///
    /// Used by box moves to rescale all particles affinely when the cell
    /// changes.
    pub fn transform_into(&self, target: &SimBox, position: &Point3<f64>) -> Point3<f64> {
        target.cartesian(&self.fractional(position))
    }

    /// Remaps tilt factors beyond `threshold` to the equivalent lower-shear
    /// cell by subtracting whole lattice vectors (`a3 -= n a2`, `a3 -= n
    /// a1`, `a2 -= n a1`). Returns `true` when any tilt factor changed;
    /// callers must re-wrap particle positions afterwards since the lattice
    /// vectors have been recombined.
    pub fn lattice_reduce(&mut self, threshold: f64) -> bool {
        let mut reduced = false;
        if self.yz.abs() > threshold {
            let n = (self.yz * self.lz / self.ly).round();
            if n != 0.0 {
                // a3 -= n * a2 also shifts the x-component of a3.
                self.xz -= n * self.xy * self.ly / self.lz;
                self.yz -= n * self.ly / self.lz;
                reduced = true;
            }
        }
        if self.xz.abs() > threshold {
            let n = (self.xz * self.lz / self.lx).round();
            if n != 0.0 {
                self.xz -= n * self.lx / self.lz;
                reduced = true;
            }
        }
        if self.xy.abs() > threshold {
            let n = (self.xy * self.ly / self.lx).round();
            if n != 0.0 {
                self.xy -= n * self.lx / self.ly;
                reduced = true;
            }
        }
        reduced
    }

    /// Component-wise comparison within an absolute tolerance.
    pub fn approx_eq(&self, other: &SimBox, tolerance: f64) -> bool {
        (self.lx - other.lx).abs() <= tolerance
            && (self.ly - other.ly).abs() <= tolerance
            && (self.lz - other.lz).abs() <= tolerance
            && (self.xy - other.xy).abs() <= tolerance
            && (self.xz - other.xz).abs() <= tolerance
            && (self.yz - other.yz).abs() <= tolerance
    }

    pub(crate) fn set_lengths(&mut self, lx: f64, ly: f64, lz: f64) {
        self.lx = lx;
        self.ly = ly;
        self.lz = lz;
    }

    pub(crate) fn set_tilts(&mut self, xy: f64, xz: f64, yz: f64) {
        self.xy = xy;
        self.xz = xz;
        self.yz = yz;
    }
}
