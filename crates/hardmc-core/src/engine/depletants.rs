//! Implicit depletant sampling.
//!
//! For every depletant type with nonzero fugacity, virtual depletants are
//! Poisson-sampled in the pairwise lens intersections between the
//! depletant-excluded circumsphere of the moved particle (old pose) and
//! those of its neighbors. A sampled depletant that was blocked by the old
//! pose, is no longer blocked by the new pose, and sits inside another
//! particle's exclusion zone witnesses pairwise excluded-volume overlap
//! destroyed by the move; such moves are vetoed, which is what realizes the
//! entropic depletion attraction (separations pay `exp(-fugacity * dV)`,
//! approaches are free).

use super::config::DepletantConfig;
use super::moves;
use crate::core::models::counters::DepletantCounters;
use crate::core::models::particle::ParticleStore;
use crate::core::models::simbox::SimBox;
use crate::core::neighbors::CellList;
use crate::core::shape::{Pose, ShapeParams, overlap};
use nalgebra::{Point3, Vector3};
use rand::Rng;
use rand_distr::{Distribution, Poisson};

pub(crate) struct DepletantContext<'a> {
    pub particles: &'a ParticleStore,
    pub shapes: &'a [ShapeParams],
    pub cell: &'a SimBox,
    pub cell_list: &'a CellList,
    pub config: &'a DepletantConfig,
}

struct Lens {
    neighbor: usize,
    /// Neighbor center anchored to the image nearest the old pose.
    center: Point3<f64>,
    radius: f64,
}

/// Returns `true` when the depletant test passes for the proposed move of
/// `particle` from `old_pose` to `new_pose`.
pub(crate) fn check_depletant_overlap(
    context: &DepletantContext,
    counters: &mut DepletantCounters,
    rng: &mut impl Rng,
    particle: usize,
    old_pose: &Pose,
    new_pose: &Pose,
) -> bool {
    let type_i = context.particles.get(particle).type_id;
    let shape_i = &context.shapes[type_i];

    for (depletant_type, &fugacity) in context.config.fugacities.iter().enumerate() {
        if fugacity <= 0.0 {
            continue;
        }
        let depletant_shape = &context.shapes[depletant_type];
        let d_dep = depletant_shape.circumsphere_diameter();
        let r_i = 0.5 * (shape_i.circumsphere_diameter() + d_dep);

        let lenses = collect_lenses(context, particle, old_pose, r_i, d_dep);

        for (lens_index, lens) in lenses.iter().enumerate() {
            let r_ij = lens.center - old_pose.position;
            let volume = lens_volume(r_i, lens.radius, r_ij.norm());
            if volume <= 0.0 {
                continue;
            }

            let poisson = match Poisson::new(fugacity * volume) {
                Ok(distribution) => distribution,
                Err(_) => continue,
            };
            let n_insertions = poisson.sample(rng) as u64;

            for _ in 0..n_insertions {
                counters.insert_count += 1;

                let position = match place_depletant(
                    context,
                    rng,
                    old_pose,
                    r_i,
                    lens,
                    &lenses[..lens_index],
                ) {
                    Some(position) => position,
                    None => {
                        counters.insert_failures += 1;
                        return false;
                    }
                };

                let orientation = if depletant_shape.has_orientation() {
                    moves::random_orientation(rng)
                } else {
                    nalgebra::UnitQuaternion::identity()
                };
                let depletant_pose = Pose::new(position, orientation);

                // Only depletants blocked by the old pose matter.
                if !overlap::overlap(depletant_shape, &depletant_pose, shape_i, old_pose, context.cell) {
                    continue;
                }
                // Still blocked after the move: no free volume change.
                if overlap::overlap(depletant_shape, &depletant_pose, shape_i, new_pose, context.cell) {
                    continue;
                }
                // The move frees this position for the depletant; if it
                // lies in another particle's exclusion zone, shared
                // excluded volume was destroyed and the move is vetoed.
                let in_pair_exclusion = lenses.iter().any(|other| {
                    let neighbor = context.particles.get(other.neighbor);
                    let neighbor_pose = Pose::new(neighbor.position, neighbor.orientation);
                    overlap::overlap(
                        depletant_shape,
                        &depletant_pose,
                        &context.shapes[neighbor.type_id],
                        &neighbor_pose,
                        context.cell,
                    )
                });
                if in_pair_exclusion {
                    return false;
                }
            }
        }
    }
    true
}

fn collect_lenses(
    context: &DepletantContext,
    particle: usize,
    old_pose: &Pose,
    r_i: f64,
    d_dep: f64,
) -> Vec<Lens> {
    let max_circumsphere = context
        .shapes
        .iter()
        .map(|s| s.circumsphere_diameter())
        .fold(0.0f64, f64::max);
    let search_radius = r_i + 0.5 * (max_circumsphere + d_dep);

    context
        .cell_list
        .neighbors(context.particles, &old_pose.position, search_radius, Some(particle))
        .into_iter()
        .filter_map(|j| {
            let neighbor = context.particles.get(j);
            let r_j = 0.5 * (context.shapes[neighbor.type_id].circumsphere_diameter() + d_dep);
            let separation = context
                .cell
                .min_image(&(neighbor.position - old_pose.position));
            if separation.norm() < r_i + r_j {
                Some(Lens {
                    neighbor: j,
                    center: old_pose.position + separation,
                    radius: r_j,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Volume of the intersection of two spheres with radii `r_i`, `r_j` at
/// center distance `d`.
fn lens_volume(r_i: f64, r_j: f64, d: f64) -> f64 {
    if d + r_i <= r_j || d + r_j <= r_i {
        // One excluded sphere swallows the other.
        let r = r_i.min(r_j);
        return std::f64::consts::FRAC_PI_3 * 4.0 * r * r * r;
    }
    let h_i = (r_j * r_j - (d - r_i) * (d - r_i)) / (2.0 * d);
    let h_j = (r_i * r_i - (d - r_j) * (d - r_j)) / (2.0 * d);
    let cap_i = std::f64::consts::FRAC_PI_3 * h_i * h_i * (3.0 * r_i - h_i);
    let cap_j = std::f64::consts::FRAC_PI_3 * h_j * h_j * (3.0 * r_j - h_j);
    cap_i + cap_j
}

/// Samples a depletant position in the lens, retrying when the sample falls
/// into an earlier lens (which already accounted for it). `None` after
/// `n_trial` failures.
fn place_depletant(
    context: &DepletantContext,
    rng: &mut impl Rng,
    old_pose: &Pose,
    r_i: f64,
    lens: &Lens,
    earlier: &[Lens],
) -> Option<Point3<f64>> {
    let r_ij: Vector3<f64> = lens.center - old_pose.position;
    let d = r_ij.norm();

    for _ in 0..context.config.n_trial {
        let position = if d + r_i <= lens.radius || d + lens.radius <= r_i {
            if r_i < lens.radius {
                moves::position_in_sphere(rng, &old_pose.position, r_i)
            } else {
                moves::position_in_sphere(rng, &lens.center, lens.radius)
            }
        } else {
            let h_i = (lens.radius * lens.radius - (d - r_i) * (d - r_i)) / (2.0 * d);
            let h_j = (r_i * r_i - (d - lens.radius) * (d - lens.radius)) / (2.0 * d);
            let cap_i = std::f64::consts::FRAC_PI_3 * h_i * h_i * (3.0 * r_i - h_i);
            let cap_j = std::f64::consts::FRAC_PI_3 * h_j * h_j * (3.0 * lens.radius - h_j);
            if rng.gen_range(0.0..1.0) < cap_i / (cap_i + cap_j) {
                moves::position_in_spherical_cap(rng, &old_pose.position, r_i, h_i, &r_ij)
            } else {
                moves::position_in_spherical_cap(rng, &lens.center, lens.radius, h_j, &-r_ij)
            }
        };

        let in_earlier_lens = earlier.iter().any(|other| {
            let to_other = context.cell.min_image(&(other.center - position));
            to_other.norm() < other.radius
        });
        if !in_earlier_lens {
            return Some(position);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::particle::Particle;
    use crate::engine::config::DepletantConfigBuilder;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn context_fixture(
        positions: &[[f64; 3]],
        fugacities: Vec<f64>,
    ) -> (ParticleStore, Vec<ShapeParams>, SimBox, DepletantConfig) {
        let particles = ParticleStore::new(
            positions
                .iter()
                .map(|&[x, y, z]| Particle::new(0, Point3::new(x, y, z)))
                .collect(),
        );
        let shapes = vec![ShapeParams::sphere(1.0), ShapeParams::sphere(0.5)];
        let cell = SimBox::cubic(20.0).unwrap();
        let config = DepletantConfigBuilder::new()
            .fugacities(fugacities)
            .n_trial(4)
            .build()
            .unwrap();
        (particles, shapes, cell, config)
    }

    #[test]
    fn lens_volume_of_coincident_spheres_is_the_smaller_sphere() {
        let v = lens_volume(1.0, 3.0, 0.5);
        let expected = std::f64::consts::FRAC_PI_3 * 4.0;
        assert!((v - expected).abs() < 1e-12);
    }

    #[test]
    fn lens_volume_vanishes_at_contact() {
        let v = lens_volume(1.0, 1.0, 2.0);
        assert!(v.abs() < 1e-12);
    }

    #[test]
    fn lens_volume_of_equal_spheres_matches_analytic_form() {
        // V = (pi/12) (4 r + d) (2 r - d)^2 for equal radii.
        let (r, d) = (1.0, 1.0);
        let expected = std::f64::consts::PI / 12.0 * (4.0 * r + d) * (2.0 * r - d) * (2.0 * r - d);
        assert!((lens_volume(r, r, d) - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_fugacity_always_passes() {
        let (particles, shapes, cell, config) = context_fixture(
            &[[5.0, 5.0, 5.0], [6.2, 5.0, 5.0]],
            vec![0.0, 0.0],
        );
        let cell_list = CellList::build(&cell, &particles, 2.0);
        let context = DepletantContext {
            particles: &particles,
            shapes: &shapes,
            cell: &cell,
            cell_list: &cell_list,
            config: &config,
        };
        let mut counters = DepletantCounters::default();
        let mut rng = StdRng::seed_from_u64(1);
        let old_pose = Pose::at(Point3::new(5.0, 5.0, 5.0));
        let new_pose = Pose::at(Point3::new(5.5, 5.0, 5.0));
        assert!(check_depletant_overlap(
            &context, &mut counters, &mut rng, 0, &old_pose, &new_pose
        ));
        assert_eq!(counters.insert_count, 0);
    }

    #[test]
    fn separating_moves_are_vetoed_at_high_fugacity() {
        // Two spheres close together; pulling one away frees lens volume
        // for depletants, which the sampler must detect at high fugacity.
        let (particles, shapes, cell, config) = context_fixture(
            &[[5.0, 5.0, 5.0], [6.1, 5.0, 5.0]],
            vec![0.0, 50.0],
        );
        let cell_list = CellList::build(&cell, &particles, 2.0);
        let context = DepletantContext {
            particles: &particles,
            shapes: &shapes,
            cell: &cell,
            cell_list: &cell_list,
            config: &config,
        };
        let mut counters = DepletantCounters::default();
        let old_pose = Pose::at(Point3::new(5.0, 5.0, 5.0));
        let new_pose = Pose::at(Point3::new(3.5, 5.0, 5.0));
        let mut vetoed = 0;
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            if !check_depletant_overlap(&context, &mut counters, &mut rng, 0, &old_pose, &new_pose) {
                vetoed += 1;
            }
        }
        assert!(vetoed > 0, "no separating move was ever vetoed");
        assert!(counters.insert_count > 0);
    }
}
