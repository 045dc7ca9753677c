//! External fields: scalar energies of a posed body in an external
//! potential, plus hard confinement walls.
//!
//! Field × shape compatibility is checked once when the field is attached
//! to the integrator, never per move.

use crate::core::shape::gjk::support_world;
use crate::core::shape::{Pose, ShapeParams};
use nalgebra::{Point3, Vector3};

/// A scalar-valued external potential over particle poses.
///
/// Hard constraints are expressed as infinite energies; the trial move
/// engine folds the energy difference into its Metropolis factor, so an
/// infinite penalty is an unconditional rejection.
pub trait ExternalField: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the field can evaluate this shape type. Checked at attach
    /// time for every configured type.
    fn supports(&self, shape: &ShapeParams) -> bool;

    fn energy(&self, shape: &ShapeParams, pose: &Pose) -> f64;
}

/// Hard planar wall: the half-space `normal . (x - origin) >= 0` is
/// allowed.
#[derive(Debug, Clone)]
pub struct PlanarWall {
    pub origin: Point3<f64>,
    pub normal: Vector3<f64>,
}

impl PlanarWall {
    pub fn new(origin: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self { origin, normal: normal.normalize() }
    }
}

impl ExternalField for PlanarWall {
    fn name(&self) -> &'static str {
        "planar_wall"
    }

    fn supports(&self, _shape: &ShapeParams) -> bool {
        // The deepest point against the wall is a single support query, so
        // every convex variant works.
        true
    }

    fn energy(&self, shape: &ShapeParams, pose: &Pose) -> f64 {
        let deepest = support_world(shape, pose, &-self.normal);
        if self.normal.dot(&(deepest - self.origin)) < 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }
}

/// Hard spherical wall: the shape must stay inside a sphere of the given
/// radius.
///
/// Containment requires the farthest point of the body from the wall
/// center, which a support query cannot provide in general; only spheres
/// and (sphero)polyhedra are supported, and other shape types are rejected
/// when the field is attached.
#[derive(Debug, Clone)]
pub struct SphericalWall {
    pub origin: Point3<f64>,
    pub radius: f64,
}

impl SphericalWall {
    pub fn new(origin: Point3<f64>, radius: f64) -> Self {
        Self { origin, radius }
    }
}

impl ExternalField for SphericalWall {
    fn name(&self) -> &'static str {
        "spherical_wall"
    }

    fn supports(&self, shape: &ShapeParams) -> bool {
        matches!(shape, ShapeParams::Sphere(_) | ShapeParams::ConvexPolyhedron(_))
    }

    fn energy(&self, shape: &ShapeParams, pose: &Pose) -> f64 {
        let contained = match shape {
            ShapeParams::Sphere(p) => {
                (pose.position - self.origin).norm() + 0.5 * p.diameter <= self.radius
            }
            ShapeParams::ConvexPolyhedron(p) => p.vertices.iter().all(|v| {
                let world = pose.position + pose.orientation.transform_vector(&v.coords);
                (world - self.origin).norm() + p.sweep_radius <= self.radius
            }),
            _ => unreachable!("rejected at attach time"),
        };
        if contained { 0.0 } else { f64::INFINITY }
    }
}

/// Harmonic restraint to the nearest site of a reference lattice,
/// `E = k * |x - site|^2`.
#[derive(Debug, Clone)]
pub struct HarmonicRestraint {
    pub stiffness: f64,
    pub sites: Vec<Point3<f64>>,
}

impl HarmonicRestraint {
    pub fn new(stiffness: f64, sites: Vec<Point3<f64>>) -> Self {
        Self { stiffness, sites }
    }
}

impl ExternalField for HarmonicRestraint {
    fn name(&self) -> &'static str {
        "harmonic_restraint"
    }

    fn supports(&self, _shape: &ShapeParams) -> bool {
        true
    }

    fn energy(&self, _shape: &ShapeParams, pose: &Pose) -> f64 {
        let nearest = self
            .sites
            .iter()
            .map(|site| (pose.position - site).norm_squared())
            .fold(f64::INFINITY, f64::min);
        if nearest.is_finite() {
            self.stiffness * nearest
        } else {
            0.0
        }
    }
}
