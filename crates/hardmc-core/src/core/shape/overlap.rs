//! The shape overlap oracle: boolean overlap tests and forward sweep
//! distances between posed bodies under periodic boundary conditions.
//!
//! Sphere pairs are resolved analytically; everything convex goes through
//! the GJK distance query; unions decompose into their members. Callers
//! only ever see `overlap` and `sweep_distance`.

use super::gjk::{self, CONTACT_EPS};
use super::{Pose, ShapeParams, SphereParams};
use crate::core::models::simbox::SimBox;
use nalgebra::{Point3, Vector3};
use thiserror::Error;

const MAX_ADVANCEMENT_STEPS: usize = 256;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum SweepError {
    #[error("Sweep query started from an overlapping configuration")]
    InitialOverlap,

    #[error("Conservative advancement did not converge within {0} steps")]
    NoConvergence(usize),
}

/// Tests two posed bodies for overlap, using the nearest periodic image.
///
/// Touching contact (separation exactly zero for sphere pairs) does not
/// count as overlap.
pub fn overlap(
    a: &ShapeParams,
    pose_a: &Pose,
    b: &ShapeParams,
    pose_b: &Pose,
    cell: &SimBox,
) -> bool {
    let pose_b = nearest_image_pose(pose_a, pose_b, cell);
    overlap_pair(a, pose_a, b, &pose_b)
}

/// Separation between two posed bodies (nearest image); `0.0` on overlap.
pub fn separation(
    a: &ShapeParams,
    pose_a: &Pose,
    b: &ShapeParams,
    pose_b: &Pose,
    cell: &SimBox,
) -> f64 {
    let pose_b = nearest_image_pose(pose_a, pose_b, cell);
    distance_pair(a, pose_a, b, &pose_b)
}

/// Distance body `a` can translate along the unit vector `direction` before
/// first contact with `b`, up to `max_sweep`.
///
/// `Ok(None)` means no collision within the budget. Errors are numerical
/// failures the caller is expected to count, not propagate.
pub fn sweep_distance(
    a: &ShapeParams,
    pose_a: &Pose,
    direction: &Vector3<f64>,
    b: &ShapeParams,
    pose_b: &Pose,
    cell: &SimBox,
    max_sweep: f64,
) -> Result<Option<f64>, SweepError> {
    if let (ShapeParams::Sphere(sa), ShapeParams::Sphere(sb)) = (a, b) {
        let r = cell.min_image(&(pose_b.position - pose_a.position));
        return sphere_sweep(sa, sb, &r, direction, max_sweep);
    }

    // Conservative advancement: with a static partner and unit speed, the
    // gap can close by at most the current separation per unit distance.
    let mut travelled = 0.0;
    for _ in 0..MAX_ADVANCEMENT_STEPS {
        let pose_t = Pose::new(pose_a.position + direction * travelled, pose_a.orientation);
        let gap = separation(a, &pose_t, b, pose_b, cell);
        if gap < CONTACT_EPS {
            if travelled == 0.0 {
                return Err(SweepError::InitialOverlap);
            }
            return Ok(Some(travelled));
        }
        travelled += gap;
        if travelled > max_sweep {
            return Ok(None);
        }
    }
    Err(SweepError::NoConvergence(MAX_ADVANCEMENT_STEPS))
}

fn sphere_sweep(
    a: &SphereParams,
    b: &SphereParams,
    r: &Vector3<f64>,
    direction: &Vector3<f64>,
    max_sweep: f64,
) -> Result<Option<f64>, SweepError> {
    let contact = 0.5 * (a.diameter + b.diameter);
    let b_coeff = r.dot(direction);
    let c_coeff = r.norm_squared() - contact * contact;
    if c_coeff < -CONTACT_EPS * contact {
        return Err(SweepError::InitialOverlap);
    }
    let discriminant = b_coeff * b_coeff - c_coeff;
    if discriminant < 0.0 {
        return Ok(None);
    }
    let t = b_coeff - discriminant.sqrt();
    if t < 0.0 || t > max_sweep {
        return Ok(None);
    }
    Ok(Some(t))
}

/// Anchors `pose_b` at the image of `b` nearest to `a`.
fn nearest_image_pose(pose_a: &Pose, pose_b: &Pose, cell: &SimBox) -> Pose {
    let r = cell.min_image(&(pose_b.position - pose_a.position));
    Pose::new(pose_a.position + r, pose_b.orientation)
}

fn overlap_pair(a: &ShapeParams, pose_a: &Pose, b: &ShapeParams, pose_b: &Pose) -> bool {
    match (a, b) {
        (ShapeParams::Sphere(sa), ShapeParams::Sphere(sb)) => {
            let contact = 0.5 * (sa.diameter + sb.diameter);
            (pose_b.position - pose_a.position).norm_squared() < contact * contact
        }
        (ShapeParams::SphereUnion(ua), _) => ua
            .members
            .iter()
            .any(|m| overlap_pair(&member_shape(m.diameter), &member_pose(pose_a, &m.center), b, pose_b)),
        (_, ShapeParams::SphereUnion(ub)) => ub
            .members
            .iter()
            .any(|m| overlap_pair(a, pose_a, &member_shape(m.diameter), &member_pose(pose_b, &m.center))),
        _ => gjk::distance(a, pose_a, b, pose_b) < CONTACT_EPS,
    }
}

fn distance_pair(a: &ShapeParams, pose_a: &Pose, b: &ShapeParams, pose_b: &Pose) -> f64 {
    match (a, b) {
        (ShapeParams::Sphere(sa), ShapeParams::Sphere(sb)) => {
            let contact = 0.5 * (sa.diameter + sb.diameter);
            ((pose_b.position - pose_a.position).norm() - contact).max(0.0)
        }
        (ShapeParams::SphereUnion(ua), _) => ua
            .members
            .iter()
            .map(|m| distance_pair(&member_shape(m.diameter), &member_pose(pose_a, &m.center), b, pose_b))
            .fold(f64::INFINITY, f64::min),
        (_, ShapeParams::SphereUnion(ub)) => ub
            .members
            .iter()
            .map(|m| distance_pair(a, pose_a, &member_shape(m.diameter), &member_pose(pose_b, &m.center)))
            .fold(f64::INFINITY, f64::min),
        _ => gjk::distance(a, pose_a, b, pose_b),
    }
}

fn member_shape(diameter: f64) -> ShapeParams {
    ShapeParams::Sphere(SphereParams { diameter, ignore_statistics: true })
}

fn member_pose(parent: &Pose, center: &Point3<f64>) -> Pose {
    Pose::at(parent.position + parent.orientation.transform_vector(&center.coords))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shape::test_shapes;
    use crate::core::shape::{SphereUnionParams, UnionMember};

    fn cell() -> SimBox {
        SimBox::cubic(20.0).unwrap()
    }

    fn pose(x: f64, y: f64, z: f64) -> Pose {
        Pose::at(Point3::new(x, y, z))
    }

    #[test]
    fn spheres_overlap_below_contact_distance() {
        let a = ShapeParams::sphere(1.0);
        let b = ShapeParams::sphere(2.0);
        // Contact distance is 1.5.
        assert!(overlap(&a, &pose(0.0, 0.0, 0.0), &b, &pose(1.49, 0.0, 0.0), &cell()));
        assert!(!overlap(&a, &pose(0.0, 0.0, 0.0), &b, &pose(1.5, 0.0, 0.0), &cell()));
        assert!(!overlap(&a, &pose(0.0, 0.0, 0.0), &b, &pose(1.51, 0.0, 0.0), &cell()));
    }

    #[test]
    fn overlap_respects_periodic_images() {
        let a = ShapeParams::sphere(1.0);
        let b = ShapeParams::sphere(1.0);
        // 19.5 apart in a box of 20 is 0.5 through the boundary.
        assert!(overlap(&a, &pose(0.2, 0.0, 0.0), &b, &pose(19.7, 0.0, 0.0), &cell()));
    }

    #[test]
    fn sphere_sweep_hits_at_analytic_distance() {
        let a = ShapeParams::sphere(1.0);
        let b = ShapeParams::sphere(1.0);
        let hit = sweep_distance(
            &a,
            &pose(0.0, 0.0, 0.0),
            &Vector3::x(),
            &b,
            &pose(5.0, 0.0, 0.0),
            &cell(),
            10.0,
        )
        .unwrap()
        .unwrap();
        assert!((hit - 4.0).abs() < 1e-12);
    }

    #[test]
    fn sphere_sweep_misses_when_offset_exceeds_contact() {
        let a = ShapeParams::sphere(1.0);
        let b = ShapeParams::sphere(1.0);
        let result = sweep_distance(
            &a,
            &pose(0.0, 0.0, 0.0),
            &Vector3::x(),
            &b,
            &pose(5.0, 1.5, 0.0),
            &cell(),
            10.0,
        )
        .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn sphere_sweep_from_overlap_is_an_error() {
        let a = ShapeParams::sphere(1.0);
        let b = ShapeParams::sphere(1.0);
        let result = sweep_distance(
            &a,
            &pose(0.0, 0.0, 0.0),
            &Vector3::x(),
            &b,
            &pose(0.5, 0.0, 0.0),
            &cell(),
            10.0,
        );
        assert_eq!(result, Err(SweepError::InitialOverlap));
    }

    #[test]
    fn cube_sweep_matches_face_gap() {
        let cube = test_shapes::cube(1.0);
        let hit = sweep_distance(
            &cube,
            &pose(0.0, 0.0, 0.0),
            &Vector3::x(),
            &cube,
            &pose(3.0, 0.0, 0.0),
            &cell(),
            10.0,
        )
        .unwrap()
        .unwrap();
        // Faces touch after travelling 2 (gap of 3 minus two half-edges).
        assert!((hit - 2.0).abs() < 1e-6, "hit {hit}");
    }

    #[test]
    fn union_overlap_uses_member_geometry() {
        let dumbbell = ShapeParams::SphereUnion(SphereUnionParams {
            members: vec![
                UnionMember { center: Point3::new(-1.0, 0.0, 0.0), diameter: 1.0 },
                UnionMember { center: Point3::new(1.0, 0.0, 0.0), diameter: 1.0 },
            ],
            ignore_statistics: false,
        });
        let probe = ShapeParams::sphere(1.0);
        // Overlaps the right lobe only.
        assert!(overlap(&dumbbell, &pose(0.0, 0.0, 0.0), &probe, &pose(1.8, 0.0, 0.0), &cell()));
        // The waist between the lobes is empty.
        assert!(!overlap(&dumbbell, &pose(0.0, 0.0, 0.0), &probe, &pose(0.0, 1.4, 0.0), &cell()));
        assert!(overlap(&dumbbell, &pose(0.0, 0.0, 0.0), &probe, &pose(-1.0, 0.9, 0.0), &cell()));
    }
}
