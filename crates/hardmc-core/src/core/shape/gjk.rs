//! GJK distance query between convex bodies given by support functions.
//!
//! Operates on the Minkowski difference of two posed shapes; the returned
//! distance is zero when the bodies interpenetrate. All shape variants
//! funnel through [`ShapeParams::support`], so no pairwise special cases
//! exist here.

use super::{Pose, ShapeParams};
use nalgebra::{Point3, Vector3};

const MAX_ITERATIONS: usize = 64;
const REL_TOLERANCE: f64 = 1e-10;
pub(crate) const CONTACT_EPS: f64 = 1e-9;

/// Support point of a posed shape in world coordinates.
pub(crate) fn support_world(
    shape: &ShapeParams,
    pose: &Pose,
    direction: &Vector3<f64>,
) -> Point3<f64> {
    let body_direction = pose.orientation.inverse_transform_vector(direction);
    let local = shape.support(&body_direction);
    pose.position + pose.orientation.transform_vector(&local.coords)
}

fn minkowski_support(
    a: &ShapeParams,
    pose_a: &Pose,
    b: &ShapeParams,
    pose_b: &Pose,
    direction: &Vector3<f64>,
) -> Vector3<f64> {
    support_world(a, pose_a, direction) - support_world(b, pose_b, &-direction)
}

/// Separation distance between two posed convex bodies; `0.0` on overlap.
pub(crate) fn distance(a: &ShapeParams, pose_a: &Pose, b: &ShapeParams, pose_b: &Pose) -> f64 {
    let mut direction = pose_b.position - pose_a.position;
    if direction.norm_squared() < 1e-24 {
        direction = Vector3::x();
    }

    let mut simplex = vec![minkowski_support(a, pose_a, b, pose_b, &direction)];

    for _ in 0..MAX_ITERATIONS {
        let closest = closest_point_and_reduce(&mut simplex);
        let dist = closest.norm();
        if dist < CONTACT_EPS {
            return 0.0;
        }

        let w = minkowski_support(a, pose_a, b, pose_b, &-closest);

        // No further progress toward the origin: |v| is the distance.
        if dist * dist - closest.dot(&w) <= REL_TOLERANCE * dist * dist {
            return dist;
        }
        if simplex.iter().any(|p| (p - w).norm_squared() < 1e-24) {
            return dist;
        }
        simplex.push(w);
    }

    // Rounded support functions may converge slowly; the current iterate is
    // an upper bound within tolerance.
    closest_point_and_reduce(&mut simplex).norm()
}

/// Closest point of the simplex hull to the origin; shrinks the simplex to
/// the minimal supporting sub-simplex.
fn closest_point_and_reduce(simplex: &mut Vec<Vector3<f64>>) -> Vector3<f64> {
    match simplex.len() {
        1 => simplex[0],
        2 => {
            let (point, keep) = closest_on_segment(simplex[0], simplex[1]);
            retain(simplex, &keep);
            point
        }
        3 => {
            let (point, keep) = closest_on_triangle(simplex[0], simplex[1], simplex[2]);
            retain(simplex, &keep);
            point
        }
        4 => closest_on_tetrahedron(simplex),
        _ => unreachable!("simplex holds at most four points"),
    }
}

fn retain(simplex: &mut Vec<Vector3<f64>>, keep: &[usize]) {
    let kept: Vec<_> = keep.iter().map(|&i| simplex[i]).collect();
    *simplex = kept;
}

fn closest_on_segment(a: Vector3<f64>, b: Vector3<f64>) -> (Vector3<f64>, Vec<usize>) {
    let ab = b - a;
    let denom = ab.norm_squared();
    if denom < 1e-24 {
        return (a, vec![0]);
    }
    let t = -a.dot(&ab) / denom;
    if t <= 0.0 {
        (a, vec![0])
    } else if t >= 1.0 {
        (b, vec![1])
    } else {
        (a + ab * t, vec![0, 1])
    }
}

fn closest_on_triangle(
    a: Vector3<f64>,
    b: Vector3<f64>,
    c: Vector3<f64>,
) -> (Vector3<f64>, Vec<usize>) {
    let ab = b - a;
    let ac = c - a;
    let ap = -a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return (a, vec![0]);
    }

    let bp = -b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return (b, vec![1]);
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return (a + ab * v, vec![0, 1]);
    }

    let cp = -c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return (c, vec![2]);
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return (a + ac * w, vec![0, 2]);
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return (b + (c - b) * w, vec![1, 2]);
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    (a + ab * v + ac * w, vec![0, 1, 2])
}

fn closest_on_tetrahedron(simplex: &mut Vec<Vector3<f64>>) -> Vector3<f64> {
    let points = [simplex[0], simplex[1], simplex[2], simplex[3]];
    // Faces listed with the index of the excluded vertex.
    let faces: [([usize; 3], usize); 4] = [
        ([0, 1, 2], 3),
        ([0, 1, 3], 2),
        ([0, 2, 3], 1),
        ([1, 2, 3], 0),
    ];

    let mut best: Option<(f64, Vector3<f64>, Vec<usize>)> = None;
    let mut outside_any = false;

    for ([i, j, k], l) in faces {
        let mut normal = (points[j] - points[i]).cross(&(points[k] - points[i]));
        if normal.dot(&(points[l] - points[i])) > 0.0 {
            normal = -normal;
        }
        // Origin on the outer side of this face?
        if normal.dot(&-points[i]) > 0.0 {
            outside_any = true;
            let (point, keep) = closest_on_triangle(points[i], points[j], points[k]);
            let d = point.norm_squared();
            let indices: Vec<usize> = keep.iter().map(|&m| [i, j, k][m]).collect();
            if best.as_ref().is_none_or(|(bd, _, _)| d < *bd) {
                best = Some((d, point, indices));
            }
        }
    }

    if !outside_any {
        // Origin enclosed: the bodies overlap.
        return Vector3::zeros();
    }

    let (_, point, keep) = best.expect("at least one face faced the origin");
    retain(simplex, &keep);
    point
}
