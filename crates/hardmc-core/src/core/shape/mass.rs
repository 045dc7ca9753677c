//! Mass properties of triangulated convex bodies at unit density, computed
//! with the divergence theorem over the outward-oriented surface.

use nalgebra::{Matrix3, Point3, Vector3};

/// Signed volume enclosed by an outward-oriented triangulation.
pub(crate) fn polyhedron_volume(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> f64 {
    faces
        .iter()
        .map(|&[i, j, k]| {
            let a = vertices[i].coords;
            let b = vertices[j].coords;
            let c = vertices[k].coords;
            a.dot(&b.cross(&c)) / 6.0
        })
        .sum()
}

/// Centroid of the enclosed volume.
pub(crate) fn polyhedron_centroid(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Point3<f64> {
    let mut weighted = Vector3::zeros();
    let mut volume = 0.0;
    for &[i, j, k] in faces {
        let a = vertices[i].coords;
        let b = vertices[j].coords;
        let c = vertices[k].coords;
        let v = a.dot(&b.cross(&c)) / 6.0;
        weighted += v * (a + b + c) / 4.0;
        volume += v;
    }
    Point3::from(weighted / volume)
}

/// Moment-of-inertia tensor about the body centroid at unit density.
pub(crate) fn polyhedron_inertia(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Matrix3<f64> {
    // Integrals of 1, x, y, z, x², y², z², xy, yz, zx over the volume
    // (Eberly, "Polyhedral Mass Properties").
    let mut intg = [0.0f64; 10];

    for &[i0, i1, i2] in faces {
        let v0 = vertices[i0].coords;
        let v1 = vertices[i1].coords;
        let v2 = vertices[i2].coords;
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let d = e1.cross(&e2);

        let mut f1 = Vector3::zeros();
        let mut f2 = Vector3::zeros();
        let mut f3 = Vector3::zeros();
        let mut g0 = Vector3::zeros();
        let mut g1 = Vector3::zeros();
        let mut g2 = Vector3::zeros();
        for axis in 0..3 {
            let (w0, w1, w2) = (v0[axis], v1[axis], v2[axis]);
            let temp0 = w0 + w1;
            let temp1 = w0 * w0;
            let temp2 = temp1 + w1 * temp0;
            f1[axis] = temp0 + w2;
            f2[axis] = temp2 + w2 * f1[axis];
            f3[axis] = w0 * temp1 + w1 * temp2 + w2 * f2[axis];
            g0[axis] = f2[axis] + w0 * (f1[axis] + w0);
            g1[axis] = f2[axis] + w1 * (f1[axis] + w1);
            g2[axis] = f2[axis] + w2 * (f1[axis] + w2);
        }

        intg[0] += d.x * f1.x;
        intg[1] += d.x * f2.x;
        intg[2] += d.y * f2.y;
        intg[3] += d.z * f2.z;
        intg[4] += d.x * f3.x;
        intg[5] += d.y * f3.y;
        intg[6] += d.z * f3.z;
        intg[7] += d.x * (v0.y * g0.x + v1.y * g1.x + v2.y * g2.x);
        intg[8] += d.y * (v0.z * g0.y + v1.z * g1.y + v2.z * g2.y);
        intg[9] += d.z * (v0.x * g0.z + v1.x * g1.z + v2.x * g2.z);
    }

    intg[0] /= 6.0;
    for v in &mut intg[1..4] {
        *v /= 24.0;
    }
    for v in &mut intg[4..7] {
        *v /= 60.0;
    }
    for v in &mut intg[7..10] {
        *v /= 120.0;
    }

    let mass = intg[0];
    let cm = Vector3::new(intg[1], intg[2], intg[3]) / mass;

    let ixx = intg[5] + intg[6] - mass * (cm.y * cm.y + cm.z * cm.z);
    let iyy = intg[4] + intg[6] - mass * (cm.z * cm.z + cm.x * cm.x);
    let izz = intg[4] + intg[5] - mass * (cm.x * cm.x + cm.y * cm.y);
    let ixy = -(intg[7] - mass * cm.x * cm.y);
    let iyz = -(intg[8] - mass * cm.y * cm.z);
    let ixz = -(intg[9] - mass * cm.z * cm.x);

    Matrix3::new(ixx, ixy, ixz, ixy, iyy, iyz, ixz, iyz, izz)
}

pub(crate) fn polyhedron_inertia_determinant(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> f64 {
    polyhedron_inertia(vertices, faces).determinant()
}
