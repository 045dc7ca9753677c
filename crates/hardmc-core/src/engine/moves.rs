//! Elementary random move kernels shared by the engines.

use nalgebra::{Point3, Unit, UnitQuaternion, Vector3};
use rand::Rng;
use rand_distr::StandardNormal;

/// Uniform unit vector on the sphere.
pub(crate) fn random_unit_vector(rng: &mut impl Rng) -> Vector3<f64> {
    loop {
        let v = Vector3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let n: f64 = v.norm_squared();
        if n > 1e-12 && n <= 1.0 {
            return v / n.sqrt();
        }
    }
}

/// Uniform point in a ball of the given radius.
pub(crate) fn random_in_ball(rng: &mut impl Rng, radius: f64) -> Vector3<f64> {
    loop {
        let v = Vector3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        if v.norm_squared() <= 1.0 {
            return v * radius;
        }
    }
}

/// Small rotation: uniform axis, angle uniform in `[0, max_angle]`.
pub(crate) fn small_rotation(rng: &mut impl Rng, max_angle: f64) -> UnitQuaternion<f64> {
    let axis = Unit::new_normalize(random_unit_vector(rng));
    let angle = rng.gen_range(0.0..max_angle);
    UnitQuaternion::from_axis_angle(&axis, angle)
}

/// Uniform random orientation (Shoemake's subgroup algorithm).
pub(crate) fn random_orientation(rng: &mut impl Rng) -> UnitQuaternion<f64> {
    let u1: f64 = rng.gen_range(0.0..1.0);
    let u2: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
    let u3: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
    let a = (1.0 - u1).sqrt();
    let b = u1.sqrt();
    UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(
        a * u2.sin(),
        a * u2.cos(),
        b * u3.sin(),
        b * u3.cos(),
    ))
}

/// Maxwell-distributed velocity at unit thermal energy and unit mass.
pub(crate) fn maxwell_velocity(rng: &mut impl Rng) -> Vector3<f64> {
    Vector3::new(
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
    )
}

/// Uniform point inside the sphere of radius `r` about `center`.
pub(crate) fn position_in_sphere(
    rng: &mut impl Rng,
    center: &Point3<f64>,
    r: f64,
) -> Point3<f64> {
    center + random_in_ball(rng, r)
}

/// Uniform point in the spherical cap of height `h` of the sphere of radius
/// `r` about `center`, with the cap axis along `axis` (toward the partner
/// sphere).
pub(crate) fn position_in_spherical_cap(
    rng: &mut impl Rng,
    center: &Point3<f64>,
    r: f64,
    h: f64,
    axis: &Vector3<f64>,
) -> Point3<f64> {
    let axis = axis.normalize();
    // Sample the axial coordinate from the cap's cross-sectional area
    // distribution by inversion of the (r - z)(something) CDF via rejection
    // against the disk radius.
    loop {
        let z = rng.gen_range((r - h)..r);
        let disk_sq = r * r - z * z;
        let u: f64 = rng.gen_range(0.0..1.0);
        // Accept z proportional to the disk area at that height.
        if u * r * r > disk_sq {
            continue;
        }
        let disk_r_max = disk_sq.sqrt();
        let phi = rng.gen_range(0.0..std::f64::consts::TAU);
        let rho = disk_r_max * rng.gen_range(0.0f64..1.0).sqrt();
        // Orthonormal frame with `axis` as the pole.
        let ortho = if axis.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
        let e1 = (ortho - axis * axis.dot(&ortho)).normalize();
        let e2 = axis.cross(&e1);
        return center + axis * z + e1 * (rho * phi.cos()) + e2 * (rho * phi.sin());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn unit_vectors_are_normalized() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let v = random_unit_vector(&mut rng);
            assert!((v.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn ball_samples_stay_inside_radius() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..100 {
            assert!(random_in_ball(&mut rng, 0.3).norm() <= 0.3 + 1e-12);
        }
    }

    #[test]
    fn small_rotations_respect_angle_bound() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let q = small_rotation(&mut rng, 0.2);
            assert!(q.angle() <= 0.2 + 1e-12);
        }
    }

    #[test]
    fn random_orientations_are_unit_quaternions() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..100 {
            let q = random_orientation(&mut rng);
            assert!((q.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn cap_samples_lie_in_the_cap() {
        let mut rng = StdRng::seed_from_u64(5);
        let center = Point3::new(1.0, -2.0, 0.5);
        let (r, h) = (2.0, 0.7);
        let axis = Vector3::new(0.0, 0.0, 1.0);
        for _ in 0..200 {
            let p = position_in_spherical_cap(&mut rng, &center, r, h, &axis);
            let d = p - center;
            assert!(d.norm() <= r + 1e-9, "inside the sphere");
            assert!(d.z >= r - h - 1e-9, "above the cap base plane");
        }
    }
}
