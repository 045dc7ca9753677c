//! Shape alchemy: Monte Carlo moves on the per-type shape parameters.
//!
//! A `ShapeUpdater` holds exactly one proposal policy, fixed at
//! construction, so registering a second policy on a running updater is
//! unrepresentable. Proposals follow a prepare/construct/retreat lifecycle:
//! `prepare` backs internal proposal state up, `construct` produces the new
//! parameters, and `retreat` restores the backup when the move is rejected.

use super::config::ShapeUpdaterConfig;
use super::error::EngineError;
use super::integrator::Integrator;
use super::moves;
use super::rng::Stream;
use crate::core::models::counters::MoveStats;
use crate::core::shape::{ShapeParams, mass};
use rand::Rng;
use tracing::debug;

/// Generator of shape proposals for a parametric policy.
pub type ShapeGenerator = Box<dyn Fn(usize, &[f64]) -> ShapeParams + Send + Sync>;

/// The proposal policy of a shape updater. Exactly one policy exists per
/// updater.
pub enum ShapeMovePolicy {
    /// Deterministic move to a fixed target shape per type.
    Constant { targets: Vec<ShapeParams> },
    /// Perturb polyhedron vertices, holding the hull volume fixed by
    /// rescaling about the centroid.
    Vertex {
        step_size: Vec<f64>,
        select_ratio: f64,
        volume: f64,
    },
    /// Caller-supplied parametric proposal: normalized parameters in
    /// `[0, 1]` are perturbed and mapped to shape parameters by the
    /// generator.
    Callback {
        params: Vec<Vec<f64>>,
        params_backup: Vec<Vec<f64>>,
        step_size: Vec<f64>,
        select_ratio: f64,
        generate: ShapeGenerator,
    },
}

impl ShapeMovePolicy {
    pub fn callback(
        params: Vec<Vec<f64>>,
        step_size: Vec<f64>,
        select_ratio: f64,
        generate: ShapeGenerator,
    ) -> Self {
        let params_backup = params.clone();
        Self::Callback { params, params_backup, step_size, select_ratio, generate }
    }

    fn prepare(&mut self) {
        if let Self::Callback { params, params_backup, .. } = self {
            params_backup.clone_from(params);
        }
    }

    fn construct(
        &mut self,
        type_id: usize,
        current: &ShapeParams,
        rng: &mut impl Rng,
    ) -> Option<ShapeParams> {
        match self {
            Self::Constant { targets } => Some(targets[type_id].clone()),
            Self::Vertex { step_size, select_ratio, volume } => {
                let mut params = match current {
                    ShapeParams::ConvexPolyhedron(p) => p.clone(),
                    _ => return None,
                };
                for vertex in &mut params.vertices {
                    if rng.gen_range(0.0..1.0) < *select_ratio {
                        *vertex += moves::random_in_ball(rng, step_size[type_id]);
                    }
                }
                // Recenter on the hull centroid, then rescale to the fixed
                // volume.
                let centroid = mass::polyhedron_centroid(&params.vertices, &params.faces);
                let current_volume = mass::polyhedron_volume(&params.vertices, &params.faces);
                if current_volume <= 0.0 {
                    return None;
                }
                let scale = (*volume / current_volume).cbrt();
                for vertex in &mut params.vertices {
                    *vertex = ((*vertex - centroid) * scale).into();
                }
                Some(ShapeParams::ConvexPolyhedron(params))
            }
            Self::Callback { params, step_size, select_ratio, generate, .. } => {
                let type_params = &mut params[type_id];
                for value in type_params.iter_mut() {
                    if rng.gen_range(0.0..1.0) < *select_ratio {
                        let low = (-step_size[type_id]).max(-*value);
                        let high = step_size[type_id].min(1.0 - *value);
                        if high > low {
                            *value += rng.gen_range(low..high);
                        }
                    }
                }
                Some(generate(type_id, &params[type_id]))
            }
        }
    }

    fn retreat(&mut self) {
        if let Self::Callback { params, params_backup, .. } = self {
            std::mem::swap(params, params_backup);
        }
    }
}

/// Pluggable log-Boltzmann weight of a shape move.
pub trait LogBoltzmann: Send + Sync {
    /// Log of the acceptance weight (`-beta * dH` plus measure terms).
    fn log_boltzmann(
        &self,
        n_particles: usize,
        type_id: usize,
        new: &ShapeParams,
        det_new: f64,
        old: &ShapeParams,
        det_old: f64,
    ) -> f64;

    /// Current alchemical energy of a type; zero for purely entropic
    /// weights.
    fn energy(&self, n_particles: usize, type_id: usize, shape: &ShapeParams, det: f64) -> f64 {
        let _ = (n_particles, type_id, shape, det);
        0.0
    }
}

/// Pure alchemical weight: the rotational partition measure
/// `(N/2) ln(det I_new / det I_old)`.
pub struct AlchemyWeight;

impl LogBoltzmann for AlchemyWeight {
    fn log_boltzmann(
        &self,
        n_particles: usize,
        _type_id: usize,
        _new: &ShapeParams,
        det_new: f64,
        _old: &ShapeParams,
        det_old: f64,
    ) -> f64 {
        (n_particles as f64 / 2.0) * (det_new / det_old).ln()
    }
}

/// Elastic spring to a reference shape, plus the alchemical measure term.
///
/// The spring energy is defined on the deviation from the reference
/// parameterization: summed squared vertex displacements for polyhedra,
/// squared log-semi-axis ratios for ellipsoids, scaled by the reference
/// volume.
pub struct ShapeSpring {
    stiffness: f64,
    reference: ShapeParams,
    reference_volume: f64,
}

impl ShapeSpring {
    pub fn new(stiffness: f64, reference: ShapeParams) -> Self {
        let reference_volume = reference.volume();
        Self { stiffness, reference, reference_volume }
    }

    fn spring_energy(&self, n_particles: usize, shape: &ShapeParams) -> f64 {
        let deviation = match (shape, &self.reference) {
            (ShapeParams::ConvexPolyhedron(p), ShapeParams::ConvexPolyhedron(r)) => p
                .vertices
                .iter()
                .zip(&r.vertices)
                .map(|(v, w)| (v - w).norm_squared())
                .sum(),
            (ShapeParams::Ellipsoid(p), ShapeParams::Ellipsoid(r)) => {
                (p.a / r.a).ln().powi(2) + (p.b / r.b).ln().powi(2) + (p.c / r.c).ln().powi(2)
            }
            _ => 0.0,
        };
        n_particles as f64 * self.stiffness * self.reference_volume * deviation
    }
}

impl LogBoltzmann for ShapeSpring {
    fn log_boltzmann(
        &self,
        n_particles: usize,
        type_id: usize,
        new: &ShapeParams,
        det_new: f64,
        old: &ShapeParams,
        det_old: f64,
    ) -> f64 {
        let spring = self.spring_energy(n_particles, old) - self.spring_energy(n_particles, new);
        spring + AlchemyWeight.log_boltzmann(n_particles, type_id, new, det_new, old, det_old)
    }

    fn energy(&self, n_particles: usize, _type_id: usize, shape: &ShapeParams, _det: f64) -> f64 {
        self.spring_energy(n_particles, shape)
    }
}

pub struct ShapeUpdater {
    config: ShapeUpdaterConfig,
    policy: ShapeMovePolicy,
    weight: Box<dyn LogBoltzmann>,
    counters: Vec<MoveStats>,
}

impl ShapeUpdater {
    /// Builds the updater, validating policy and shapes against the
    /// integrator's type table. All failures here are configuration
    /// errors; nothing is mutated.
    pub fn new(
        config: ShapeUpdaterConfig,
        policy: ShapeMovePolicy,
        weight: Box<dyn LogBoltzmann>,
        integrator: &Integrator,
    ) -> Result<Self, EngineError> {
        let n_types = integrator.shapes().len();
        for (type_id, shape) in integrator.shapes().iter().enumerate() {
            if shape.moment_of_inertia_determinant().is_none() {
                return Err(EngineError::UnsupportedShape {
                    operation: "alchemical moves",
                    type_id,
                    reason: "moment of inertia is undefined for this parameterization".into(),
                });
            }
        }
        match &policy {
            ShapeMovePolicy::Constant { targets } => {
                if targets.len() != n_types {
                    return Err(EngineError::PerTypeCount {
                        what: "constant shape targets",
                        expected: n_types,
                        got: targets.len(),
                    });
                }
                for (type_id, target) in targets.iter().enumerate() {
                    target
                        .validate()
                        .map_err(|source| EngineError::InvalidShape { type_id, source })?;
                }
            }
            ShapeMovePolicy::Vertex { step_size, .. } => {
                if step_size.len() != n_types {
                    return Err(EngineError::PerTypeCount {
                        what: "vertex move step sizes",
                        expected: n_types,
                        got: step_size.len(),
                    });
                }
                for (type_id, shape) in integrator.shapes().iter().enumerate() {
                    if !matches!(shape, ShapeParams::ConvexPolyhedron(_)) {
                        return Err(EngineError::UnsupportedShape {
                            operation: "vertex shape moves",
                            type_id,
                            reason: "only convex polyhedra have perturbable vertices".into(),
                        });
                    }
                }
            }
            ShapeMovePolicy::Callback { params, step_size, .. } => {
                if params.len() != n_types || step_size.len() != n_types {
                    return Err(EngineError::PerTypeCount {
                        what: "callback parameters",
                        expected: n_types,
                        got: params.len().min(step_size.len()),
                    });
                }
            }
        }
        Ok(Self {
            config,
            policy,
            weight,
            counters: vec![MoveStats::default(); n_types],
        })
    }

    pub fn counters(&self) -> &[MoveStats] {
        &self.counters
    }

    pub fn acceptance(&self) -> f64 {
        let (accepted, attempted) = self
            .counters
            .iter()
            .fold((0, 0), |(a, t), stats| (a + stats.accepted, t + stats.attempted()));
        if attempted == 0 { 0.0 } else { accepted as f64 / attempted as f64 }
    }

    pub fn reset_statistics(&mut self) {
        for stats in &mut self.counters {
            stats.reset();
        }
    }

    /// Total alchemical energy over all types in the current state.
    pub fn shape_move_energy(&self, integrator: &Integrator) -> f64 {
        integrator
            .shapes()
            .iter()
            .enumerate()
            .map(|(type_id, shape)| {
                let n = integrator.particles().count_of_type(type_id);
                let det = shape.moment_of_inertia_determinant().unwrap_or(1.0);
                self.weight.energy(n, type_id, shape, det)
            })
            .sum()
    }

    pub fn update(&mut self, integrator: &mut Integrator, timestep: u64) {
        let mut rng = integrator.streams().updater(Stream::ShapeMove, timestep);
        if rng.gen_range(0.0..1.0) >= self.config.move_ratio {
            return;
        }
        let n_types = integrator.shapes().len();
        for _ in 0..self.config.nsweeps {
            for _ in 0..self.config.nselect {
                let type_id = rng.gen_range(0..n_types);
                self.try_type_move(integrator, type_id, &mut rng);
            }
        }
    }

    fn try_type_move(&mut self, integrator: &mut Integrator, type_id: usize, rng: &mut impl Rng) {
        let old = integrator.shapes()[type_id].clone();
        let det_old = old
            .moment_of_inertia_determinant()
            .expect("validated at construction");

        self.policy.prepare();
        let proposal = match self.policy.construct(type_id, &old, rng) {
            Some(proposal) => proposal,
            None => {
                self.policy.retreat();
                self.counters[type_id].reject();
                return;
            }
        };

        // The oracle's notion of validity gates the proposal.
        let det_new = match (proposal.validate(), proposal.moment_of_inertia_determinant()) {
            (Ok(()), Some(det)) => det,
            _ => {
                debug!(type_id, "shape proposal rejected as invalid geometry");
                self.policy.retreat();
                self.counters[type_id].reject();
                return;
            }
        };

        let n = integrator.particles().count_of_type(type_id);
        let log_weight = self
            .weight
            .log_boltzmann(n, type_id, &proposal, det_new, &old, det_old);
        if !(log_weight >= 0.0) && !(rng.gen_range(0.0..1.0) < log_weight.exp()) {
            self.policy.retreat();
            self.counters[type_id].reject();
            return;
        }

        integrator.set_shape(type_id, proposal);
        if integrator.has_overlaps() {
            integrator.set_shape(type_id, old);
            self.policy.retreat();
            self.counters[type_id].reject();
            return;
        }

        if self.config.pretend {
            // Statistics advance, the shape table does not.
            integrator.set_shape(type_id, old);
            self.policy.retreat();
        }
        self.counters[type_id].accept();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::particle::{Particle, ParticleStore};
    use crate::core::models::simbox::SimBox;
    use crate::core::shape::test_shapes;
    use crate::engine::config::{ShapeUpdaterConfigBuilder, TrialMoveConfigBuilder};
    use nalgebra::Point3;

    fn cube_integrator() -> Integrator {
        let particles = ParticleStore::new(vec![
            Particle::new(0, Point3::new(3.0, 3.0, 3.0)),
            Particle::new(0, Point3::new(9.0, 9.0, 9.0)),
        ]);
        let config = TrialMoveConfigBuilder::new()
            .uniform_move_sizes(0.1, 0.1, 1)
            .build()
            .unwrap();
        Integrator::new(
            particles,
            SimBox::cubic(12.0).unwrap(),
            vec![test_shapes::cube(1.0)],
            config,
            77,
        )
        .unwrap()
    }

    fn updater_config() -> ShapeUpdaterConfig {
        ShapeUpdaterConfigBuilder::new().move_ratio(1.0).build().unwrap()
    }

    #[test]
    fn rejects_types_with_undefined_inertia() {
        let particles = ParticleStore::new(vec![Particle::new(0, Point3::new(3.0, 3.0, 3.0))]);
        let config = TrialMoveConfigBuilder::new()
            .uniform_move_sizes(0.1, 0.1, 1)
            .build()
            .unwrap();
        let mut shape = test_shapes::cube(1.0);
        if let ShapeParams::ConvexPolyhedron(ref mut p) = shape {
            p.sweep_radius = 0.2;
        }
        let integrator = Integrator::new(
            particles,
            SimBox::cubic(12.0).unwrap(),
            vec![shape],
            config,
            1,
        )
        .unwrap();
        let result = ShapeUpdater::new(
            updater_config(),
            ShapeMovePolicy::Vertex { step_size: vec![0.05], select_ratio: 0.5, volume: 1.0 },
            Box::new(AlchemyWeight),
            &integrator,
        );
        assert!(matches!(
            result,
            Err(EngineError::UnsupportedShape { operation: "alchemical moves", .. })
        ));
    }

    #[test]
    fn constant_policy_moves_to_the_target_shape() {
        let mut integrator = cube_integrator();
        let target = test_shapes::cube(0.9);
        let mut updater = ShapeUpdater::new(
            updater_config(),
            ShapeMovePolicy::Constant { targets: vec![target.clone()] },
            Box::new(AlchemyWeight),
            &integrator,
        )
        .unwrap();
        // Shrinking the cube lowers the inertia determinant, so the pure
        // alchemical weight may reject; sweep until accepted.
        for timestep in 0..50 {
            updater.update(&mut integrator, timestep);
        }
        let stats = updater.counters()[0];
        assert!(stats.attempted() >= 50);
        if stats.accepted > 0 {
            assert_eq!(integrator.shapes()[0], target);
        }
    }

    #[test]
    fn vertex_policy_holds_volume_fixed() {
        let mut integrator = cube_integrator();
        let volume = integrator.shapes()[0].volume();
        let mut updater = ShapeUpdater::new(
            updater_config(),
            ShapeMovePolicy::Vertex { step_size: vec![0.05], select_ratio: 0.5, volume },
            Box::new(AlchemyWeight),
            &integrator,
        )
        .unwrap();
        for timestep in 0..30 {
            updater.update(&mut integrator, timestep);
        }
        let stats = updater.counters()[0];
        assert!(stats.accepted > 0, "vertex moves on a dilute system should accept");
        assert!(
            (integrator.shapes()[0].volume() - volume).abs() < 1e-8,
            "volume drifted to {}",
            integrator.shapes()[0].volume()
        );
    }

    #[test]
    fn pretend_mode_tallies_without_mutating() {
        let mut integrator = cube_integrator();
        let original = integrator.shapes()[0].clone();
        let config = ShapeUpdaterConfigBuilder::new()
            .move_ratio(1.0)
            .pretend(true)
            .build()
            .unwrap();
        let mut updater = ShapeUpdater::new(
            config,
            ShapeMovePolicy::Vertex { step_size: vec![0.05], select_ratio: 0.5, volume: 1.0 },
            Box::new(AlchemyWeight),
            &integrator,
        )
        .unwrap();
        for timestep in 0..20 {
            updater.update(&mut integrator, timestep);
        }
        assert!(updater.counters()[0].attempted() >= 20);
        assert_eq!(integrator.shapes()[0], original);
    }

    #[test]
    fn callback_policy_drives_shapes_through_the_generator() {
        let particles = ParticleStore::new(vec![Particle::new(0, Point3::new(3.0, 3.0, 3.0))]);
        let config = TrialMoveConfigBuilder::new()
            .uniform_move_sizes(0.1, 0.1, 1)
            .build()
            .unwrap();
        let mut integrator = Integrator::new(
            particles,
            SimBox::cubic(12.0).unwrap(),
            vec![ShapeParams::sphere(1.0)],
            config,
            13,
        )
        .unwrap();

        // One normalized parameter mapping to the sphere diameter.
        let policy = ShapeMovePolicy::callback(
            vec![vec![0.5]],
            vec![0.1],
            1.0,
            Box::new(|_, params| ShapeParams::sphere(0.5 + params[0])),
        );
        let mut updater =
            ShapeUpdater::new(updater_config(), policy, Box::new(AlchemyWeight), &integrator)
                .unwrap();
        for timestep in 0..40 {
            updater.update(&mut integrator, timestep);
        }
        assert!(updater.counters()[0].attempted() >= 40);
        // Whatever was accepted, the shape always stays on the generator's
        // one-parameter family with diameter in [0.5, 1.5].
        match &integrator.shapes()[0] {
            ShapeParams::Sphere(p) => {
                assert!(p.diameter >= 0.5 && p.diameter <= 1.5, "diameter {}", p.diameter)
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn spring_weight_penalizes_deviation_from_reference() {
        let reference = test_shapes::cube(1.0);
        let spring = ShapeSpring::new(100.0, reference.clone());
        let stretched = test_shapes::cube(1.2);
        let det = stretched.moment_of_inertia_determinant().unwrap();
        let det_ref = reference.moment_of_inertia_determinant().unwrap();
        let away = spring.log_boltzmann(10, 0, &stretched, det, &reference, det_ref);
        let back = spring.log_boltzmann(10, 0, &reference, det_ref, &stretched, det);
        // Moving away pays the spring energy that moving back releases.
        assert!(away < back);
        assert!(spring.energy(10, 0, &stretched, det) > 0.0);
        assert_eq!(spring.energy(10, 0, &reference, det_ref), 0.0);
    }

    #[test]
    fn serialized_shape_round_trips_identically_after_acceptance() {
        let mut integrator = cube_integrator();
        let volume = integrator.shapes()[0].volume();
        let mut updater = ShapeUpdater::new(
            updater_config(),
            ShapeMovePolicy::Vertex { step_size: vec![0.05], select_ratio: 1.0, volume },
            Box::new(AlchemyWeight),
            &integrator,
        )
        .unwrap();
        for timestep in 0..10 {
            updater.update(&mut integrator, timestep);
        }
        let shape = integrator.shapes()[0].clone();
        let json = serde_json::to_string(&shape).unwrap();
        let restored: ShapeParams = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, shape);
        assert_eq!(
            restored.moment_of_inertia_determinant(),
            shape.moment_of_inertia_determinant()
        );
    }
}
