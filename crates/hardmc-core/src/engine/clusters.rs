//! Geometric cluster algorithm (GCA) moves: pivot point reflections, line
//! reflections, and type swaps.
//!
//! Clusters grow by breadth-first infection: whenever transforming one
//! particle alone would change its overlap status with a neighbor, the
//! neighbor is forced into the cluster so both transform together. Pivot
//! moves are rejection-free for achiral particles; line reflections under
//! periodic boundaries are only approximately balanced (the periodic wrap
//! can produce overlaps the infinite-space argument excludes), so flipped
//! clusters are re-checked and rejected symmetrically when an overlap
//! appears. This approximation is inherited from the reference algorithm
//! and intentionally not "corrected" here.

use super::config::ClusterConfig;
use super::error::EngineError;
use super::integrator::Integrator;
use super::moves;
use super::rng::Stream;
use crate::core::models::counters::ClusterCounters;
use crate::core::neighbors::CellList;
use crate::core::shape::{Pose, overlap};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use tracing::trace;

/// The rigid transform (or identity-preserving retype) applied to a
/// cluster.
#[derive(Debug, Clone, Copy)]
enum ClusterTransform {
    /// Point reflection through the pivot.
    Pivot(Point3<f64>),
    /// π rotation about the line through `point` along `axis`.
    LineReflection { point: Point3<f64>, axis: Vector3<f64> },
    /// Exchange the identities of the two swap types.
    TypeSwap { type_a: usize, type_b: usize },
}

/// Transient cluster membership; discarded once the move resolves.
#[derive(Debug, Default)]
struct Cluster {
    members: Vec<usize>,
    seen: HashSet<usize>,
}

impl Cluster {
    fn insert(&mut self, particle: usize) -> bool {
        if self.seen.insert(particle) {
            self.members.push(particle);
            true
        } else {
            false
        }
    }
}

pub struct ClusterEngine {
    config: ClusterConfig,
    counters: ClusterCounters,
}

impl ClusterEngine {
    /// Validates swap configuration against the integrator's type table.
    pub fn new(config: ClusterConfig, integrator: &Integrator) -> Result<Self, EngineError> {
        if let Some((a, b)) = config.swap_types {
            let n_types = integrator.shapes().len();
            if a == b || a >= n_types || b >= n_types {
                return Err(EngineError::InvalidSwapTypes(a, b));
            }
        }
        Ok(Self { config, counters: ClusterCounters::default() })
    }

    pub fn counters(&self) -> &ClusterCounters {
        &self.counters
    }

    pub fn reset_statistics(&mut self) {
        self.counters.reset();
    }

    /// Attempts one cluster move.
    pub fn update(&mut self, integrator: &mut Integrator, timestep: u64) {
        let n = integrator.particles().len();
        if n == 0 {
            return;
        }
        let mut rng = integrator.streams().updater(Stream::Cluster, timestep);

        let swap = self.config.swap_types.is_some()
            && rng.gen_range(0.0..1.0) < self.config.swap_move_ratio;

        let transform = if swap {
            let (type_a, type_b) = self.config.swap_types.expect("checked above");
            ClusterTransform::TypeSwap { type_a, type_b }
        } else if self.anisotropic(integrator) {
            // Pivot reflections mirror chirality; anisotropic systems only
            // use line reflections.
            self.random_line_reflection(integrator, &mut rng)
        } else if rng.gen_range(0.0..1.0) < self.config.move_ratio {
            let fraction = Vector3::new(
                rng.gen_range(0.0..1.0),
                rng.gen_range(0.0..1.0),
                rng.gen_range(0.0..1.0),
            );
            ClusterTransform::Pivot(integrator.cell().cartesian(&fraction))
        } else {
            self.random_line_reflection(integrator, &mut rng)
        };

        let seed = match transform {
            ClusterTransform::TypeSwap { type_a, type_b } => {
                match self.random_swap_seed(integrator, type_a, type_b, &mut rng) {
                    Some(seed) => seed,
                    None => return,
                }
            }
            _ => rng.gen_range(0..n),
        };

        let cluster = self.grow_cluster(integrator, &transform, seed);
        trace!(members = cluster.members.len(), "cluster built");

        if rng.gen_range(0.0..1.0) >= self.config.flip_probability {
            self.record(&transform, false);
            return;
        }

        let accepted = self.flip(integrator, &transform, &cluster, &mut rng);
        self.record(&transform, accepted);
    }

    fn anisotropic(&self, integrator: &Integrator) -> bool {
        integrator.shapes().iter().any(|s| s.has_orientation())
    }

    fn random_line_reflection(&self, integrator: &Integrator, rng: &mut impl Rng) -> ClusterTransform {
        let fraction = Vector3::new(
            rng.gen_range(0.0..1.0),
            rng.gen_range(0.0..1.0),
            rng.gen_range(0.0..1.0),
        );
        ClusterTransform::LineReflection {
            point: integrator.cell().cartesian(&fraction),
            axis: moves::random_unit_vector(rng),
        }
    }

    fn random_swap_seed(
        &self,
        integrator: &Integrator,
        type_a: usize,
        type_b: usize,
        rng: &mut impl Rng,
    ) -> Option<usize> {
        let candidates: Vec<usize> = integrator
            .particles()
            .iter()
            .enumerate()
            .filter(|(_, p)| p.type_id == type_a || p.type_id == type_b)
            .map(|(i, _)| i)
            .collect();
        candidates.choose(rng).copied()
    }

    /// Pose (and type) of a particle after the transform.
    fn transformed(
        &self,
        integrator: &Integrator,
        transform: &ClusterTransform,
        particle: usize,
    ) -> (Pose, usize) {
        let p = integrator.particles().get(particle);
        let pose = Pose::new(p.position, p.orientation);
        match *transform {
            ClusterTransform::Pivot(pivot) => {
                let reflected = Point3::from(2.0 * pivot.coords - pose.position.coords);
                (Pose::new(integrator.cell().wrap(&reflected), pose.orientation), p.type_id)
            }
            ClusterTransform::LineReflection { point, axis } => {
                let rotation = UnitQuaternion::from_axis_angle(
                    &nalgebra::Unit::new_normalize(axis),
                    std::f64::consts::PI,
                );
                let rotated = point + rotation.transform_vector(&(pose.position - point));
                (
                    Pose::new(integrator.cell().wrap(&rotated), rotation * pose.orientation),
                    p.type_id,
                )
            }
            ClusterTransform::TypeSwap { type_a, type_b } => {
                let new_type = if p.type_id == type_a {
                    type_b
                } else if p.type_id == type_b {
                    type_a
                } else {
                    p.type_id
                };
                (pose, new_type)
            }
        }
    }

    /// Breadth-first infection: a neighbor whose overlap status with the
    /// transformed particle differs from its status with the original joins
    /// the cluster.
    fn grow_cluster(
        &self,
        integrator: &Integrator,
        transform: &ClusterTransform,
        seed: usize,
    ) -> Cluster {
        let cell_list = integrator.build_cell_list();
        let mut cluster = Cluster::default();
        cluster.insert(seed);
        let mut queue = vec![seed];

        while let Some(current) = queue.pop() {
            let p = integrator.particles().get(current);
            let old_pose = Pose::new(p.position, p.orientation);
            let old_type = p.type_id;
            let (new_pose, new_type) = self.transformed(integrator, transform, current);

            let radius = self.bond_search_radius(integrator, new_type);
            // Candidates around both the old and the transformed position.
            let mut candidates =
                cell_list.neighbors(integrator.particles(), &new_pose.position, radius, Some(current));
            candidates.extend(cell_list.neighbors(
                integrator.particles(),
                &old_pose.position,
                radius,
                Some(current),
            ));
            candidates.sort_unstable();
            candidates.dedup();

            for j in candidates {
                if cluster.seen.contains(&j) {
                    continue;
                }
                let other = integrator.particles().get(j);
                let other_pose = Pose::new(other.position, other.orientation);
                let other_shape = &integrator.shapes()[other.type_id];

                let before = overlap::overlap(
                    &integrator.shapes()[old_type],
                    &old_pose,
                    other_shape,
                    &other_pose,
                    integrator.cell(),
                );
                let after = overlap::overlap(
                    &integrator.shapes()[new_type],
                    &new_pose,
                    other_shape,
                    &other_pose,
                    integrator.cell(),
                );
                if before != after && cluster.insert(j) {
                    queue.push(j);
                }
            }
        }
        cluster
    }

    fn bond_search_radius(&self, integrator: &Integrator, type_id: usize) -> f64 {
        let max_circumsphere = integrator.max_interaction_range();
        0.5 * (integrator.shapes()[type_id].circumsphere_diameter() + max_circumsphere)
    }

    /// Applies the transform to the whole cluster, then verifies the
    /// result; reverts on any overlap or on a failed swap-weight draw.
    fn flip(
        &mut self,
        integrator: &mut Integrator,
        transform: &ClusterTransform,
        cluster: &Cluster,
        rng: &mut impl Rng,
    ) -> bool {
        if let ClusterTransform::TypeSwap { type_a, type_b } = *transform {
            // Chemical potential weight: each a -> b conversion gains
            // delta_mu in the exponent, each b -> a pays it back.
            let n_a = cluster
                .members
                .iter()
                .filter(|&&i| integrator.particles().get(i).type_id == type_a)
                .count() as f64;
            let n_b = cluster
                .members
                .iter()
                .filter(|&&i| integrator.particles().get(i).type_id == type_b)
                .count() as f64;
            let log_weight = self.config.delta_mu * (n_a - n_b);
            if !(log_weight >= 0.0) && !(rng.gen_range(0.0..1.0) < log_weight.exp()) {
                return false;
            }
        }

        let saved: Vec<_> = cluster
            .members
            .iter()
            .map(|&i| integrator.particles().get(i).clone())
            .collect();

        let updates: Vec<_> = cluster
            .members
            .iter()
            .map(|&i| (i, self.transformed(integrator, transform, i)))
            .collect();
        for (i, (pose, type_id)) in &updates {
            let p = integrator.particles_mut().get_mut(*i);
            p.position = pose.position;
            p.orientation = pose.orientation;
            p.type_id = *type_id;
        }

        // Verification pass: the infinite-space GCA argument guarantees no
        // overlaps, but periodic wrapping (and resized swap shapes) can
        // break it; reject symmetrically when it does.
        let cell_list = integrator.build_cell_list();
        let violated = cluster.members.iter().any(|&i| {
            let p = integrator.particles().get(i);
            let pose = Pose::new(p.position, p.orientation);
            integrator.overlaps_at(&cell_list, i, &pose)
        });

        if violated {
            for (slot, &i) in cluster.members.iter().enumerate() {
                *integrator.particles_mut().get_mut(i) = saved[slot].clone();
            }
            return false;
        }
        true
    }

    fn record(&mut self, transform: &ClusterTransform, accepted: bool) {
        let stats = match transform {
            ClusterTransform::Pivot(_) => &mut self.counters.pivot,
            ClusterTransform::LineReflection { .. } => &mut self.counters.reflection,
            ClusterTransform::TypeSwap { .. } => &mut self.counters.swap,
        };
        if accepted {
            stats.accept();
        } else {
            stats.reject();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::particle::{Particle, ParticleStore};
    use crate::core::models::simbox::SimBox;
    use crate::core::shape::ShapeParams;
    use crate::engine::config::{ClusterConfigBuilder, MoveSizes, TrialMoveConfigBuilder};

    fn integrator_with_types(particles: Vec<Particle>, shapes: Vec<ShapeParams>) -> Integrator {
        let n_types = shapes.len();
        let config = TrialMoveConfigBuilder::new()
            .uniform_move_sizes(0.1, 0.1, n_types)
            .build()
            .unwrap();
        Integrator::new(ParticleStore::new(particles), SimBox::cubic(15.0).unwrap(), shapes, config, 4242).unwrap()
    }

    fn sphere_system(n_side: usize, spacing: f64) -> Integrator {
        let mut particles = Vec::new();
        for i in 0..n_side {
            for j in 0..n_side {
                for k in 0..n_side {
                    particles.push(Particle::new(
                        0,
                        Point3::new(
                            1.0 + i as f64 * spacing,
                            1.0 + j as f64 * spacing,
                            1.0 + k as f64 * spacing,
                        ),
                    ));
                }
            }
        }
        integrator_with_types(particles, vec![ShapeParams::sphere(1.0)])
    }

    #[test]
    fn rejects_identical_swap_types() {
        let integrator = sphere_system(2, 3.0);
        let config = ClusterConfigBuilder::new().swap_types(0, 0).build().unwrap();
        assert!(matches!(
            ClusterEngine::new(config, &integrator),
            Err(EngineError::InvalidSwapTypes(0, 0))
        ));
    }

    #[test]
    fn pivot_moves_preserve_population_and_hard_core() {
        let mut integrator = sphere_system(3, 2.0);
        let n = integrator.particles().len();
        let config = ClusterConfigBuilder::new()
            .move_ratio(1.0)
            .flip_probability(1.0)
            .build()
            .unwrap();
        let mut engine = ClusterEngine::new(config, &integrator).unwrap();
        for timestep in 0..30 {
            engine.update(&mut integrator, timestep);
        }
        assert_eq!(integrator.particles().len(), n);
        assert_eq!(integrator.particles().count_of_type(0), n);
        assert_eq!(integrator.count_overlaps(), 0);
        let counters = engine.counters();
        assert_eq!(counters.pivot.attempted(), 30);
        assert!(counters.pivot.accepted > 0, "pivot moves should mostly accept");
    }

    #[test]
    fn swap_moves_only_exchange_the_configured_pair() {
        let mut particles = Vec::new();
        for i in 0..4 {
            particles.push(Particle::new(i % 2, Point3::new(2.0 + 3.0 * i as f64, 2.0, 2.0)));
        }
        particles.push(Particle::new(2, Point3::new(7.5, 7.5, 7.5)));
        let mut integrator = integrator_with_types(
            particles,
            vec![
                ShapeParams::sphere(1.0),
                ShapeParams::sphere(1.2),
                ShapeParams::sphere(0.8),
            ],
        );
        let before_a = integrator.particles().count_of_type(0);
        let before_b = integrator.particles().count_of_type(1);
        let before_c = integrator.particles().count_of_type(2);

        let config = ClusterConfigBuilder::new()
            .swap_types(0, 1)
            .swap_move_ratio(1.0)
            .flip_probability(1.0)
            .build()
            .unwrap();
        let mut engine = ClusterEngine::new(config, &integrator).unwrap();
        for timestep in 0..50 {
            engine.update(&mut integrator, timestep);
        }

        // Spectator type is never touched.
        assert_eq!(integrator.particles().count_of_type(2), before_c);
        // Members of the pair can trade identities but the pool is closed.
        assert_eq!(
            integrator.particles().count_of_type(0) + integrator.particles().count_of_type(1),
            before_a + before_b
        );
        assert_eq!(integrator.count_overlaps(), 0);
        assert!(engine.counters().swap.attempted() > 0);
    }

    #[test]
    fn reflection_moves_keep_the_configuration_overlap_free() {
        let mut integrator = sphere_system(3, 2.0);
        let config = ClusterConfigBuilder::new()
            .move_ratio(0.0)
            .flip_probability(1.0)
            .build()
            .unwrap();
        let mut engine = ClusterEngine::new(config, &integrator).unwrap();
        for timestep in 0..30 {
            engine.update(&mut integrator, timestep);
        }
        assert_eq!(integrator.count_overlaps(), 0);
        assert_eq!(engine.counters().reflection.attempted(), 30);
    }

    #[test]
    fn reset_statistics_zeroes_cluster_counters() {
        let mut integrator = sphere_system(2, 3.0);
        let config = ClusterConfigBuilder::new().flip_probability(1.0).build().unwrap();
        let mut engine = ClusterEngine::new(config, &integrator).unwrap();
        engine.update(&mut integrator, 0);
        engine.reset_statistics();
        assert_eq!(*engine.counters(), ClusterCounters::default());
    }
}
