use super::config::{DepletantConfig, TrialMoveConfig};
use super::depletants;
use super::error::EngineError;
use super::fields::ExternalField;
use super::moves;
use super::rng::{RngStreams, Stream};
use crate::core::models::counters::{DepletantCounters, TrialMoveCounters};
use crate::core::models::particle::ParticleStore;
use crate::core::models::simbox::SimBox;
use crate::core::neighbors::CellList;
use crate::core::shape::{Pose, ShapeParams, overlap};
use rand::Rng;
use rayon::prelude::*;

/// Owner of the simulation state and the single-particle trial move engine.
///
/// All other engines (chains, clusters, shape alchemy, box moves) borrow
/// the integrator for one update at a time; the particle array, box, and
/// shape table have no other owner. Every mutation is transactional at the
/// move level: state is only written on acceptance.
pub struct Integrator {
    particles: ParticleStore,
    cell: SimBox,
    shapes: Vec<ShapeParams>,
    config: TrialMoveConfig,
    streams: RngStreams,
    counters: Vec<TrialMoveCounters>,
    fields: Vec<Box<dyn ExternalField>>,
    depletants: Option<DepletantConfig>,
    depletant_counters: DepletantCounters,
}

impl Integrator {
    pub fn new(
        particles: ParticleStore,
        cell: SimBox,
        shapes: Vec<ShapeParams>,
        config: TrialMoveConfig,
        seed: u64,
    ) -> Result<Self, EngineError> {
        for (type_id, shape) in shapes.iter().enumerate() {
            shape
                .validate()
                .map_err(|source| EngineError::InvalidShape { type_id, source })?;
        }
        for (index, particle) in particles.iter().enumerate() {
            if particle.type_id >= shapes.len() {
                return Err(EngineError::UnknownType {
                    particle: index,
                    type_id: particle.type_id,
                    n_types: shapes.len(),
                });
            }
        }
        if config.move_sizes.len() != shapes.len() {
            return Err(EngineError::PerTypeCount {
                what: "move_sizes",
                expected: shapes.len(),
                got: config.move_sizes.len(),
            });
        }
        let n_types = shapes.len();
        Ok(Self {
            particles,
            cell,
            shapes,
            config,
            streams: RngStreams::new(seed),
            counters: vec![TrialMoveCounters::default(); n_types],
            fields: Vec::new(),
            depletants: None,
            depletant_counters: DepletantCounters::default(),
        })
    }

    pub fn particles(&self) -> &ParticleStore {
        &self.particles
    }

    pub(crate) fn particles_mut(&mut self) -> &mut ParticleStore {
        &mut self.particles
    }

    pub fn cell(&self) -> &SimBox {
        &self.cell
    }

    pub(crate) fn set_cell(&mut self, cell: SimBox) {
        self.cell = cell;
    }

    pub fn shapes(&self) -> &[ShapeParams] {
        &self.shapes
    }

    pub(crate) fn set_shape(&mut self, type_id: usize, shape: ShapeParams) {
        self.shapes[type_id] = shape;
    }

    pub fn trial_move_config(&self) -> &TrialMoveConfig {
        &self.config
    }

    pub fn counters(&self) -> &[TrialMoveCounters] {
        &self.counters
    }

    pub fn depletant_counters(&self) -> &DepletantCounters {
        &self.depletant_counters
    }

    /// Records a rotation attempt made on behalf of another engine into the
    /// shared per-type statistics.
    pub(crate) fn record_rotation(&mut self, type_id: usize, accepted: bool) {
        if self.shapes[type_id].ignore_statistics() {
            return;
        }
        if accepted {
            self.counters[type_id].rotate.accept();
        } else {
            self.counters[type_id].rotate.reject();
        }
    }

    pub fn reset_counters(&mut self) {
        for counters in &mut self.counters {
            counters.reset();
        }
        self.depletant_counters.reset();
    }

    pub(crate) fn streams(&self) -> &RngStreams {
        &self.streams
    }

    /// Attaches an external field, validating it against every configured
    /// shape type. An unsupported combination is a configuration error
    /// surfaced here, once, not mid-run.
    pub fn attach_field(&mut self, field: Box<dyn ExternalField>) -> Result<(), EngineError> {
        for (type_id, shape) in self.shapes.iter().enumerate() {
            if !field.supports(shape) {
                return Err(EngineError::FieldUnsupported { field: field.name(), type_id });
            }
        }
        self.fields.push(field);
        Ok(())
    }

    /// Configures implicit depletants; the fugacity table must name every
    /// particle type.
    pub fn set_depletants(&mut self, config: DepletantConfig) -> Result<(), EngineError> {
        if config.fugacities.len() != self.shapes.len() {
            return Err(EngineError::PerTypeCount {
                what: "fugacities",
                expected: self.shapes.len(),
                got: config.fugacities.len(),
            });
        }
        self.depletants = Some(config);
        Ok(())
    }

    /// Total external-field energy of one posed body.
    pub fn field_energy(&self, type_id: usize, pose: &Pose) -> f64 {
        self.fields
            .iter()
            .map(|field| field.energy(&self.shapes[type_id], pose))
            .sum()
    }

    /// Largest center-to-center distance at which any pair can interact.
    pub fn max_interaction_range(&self) -> f64 {
        let max_circumsphere = self
            .shapes
            .iter()
            .map(|s| s.circumsphere_diameter())
            .fold(0.0f64, f64::max);
        let depletant_range = self
            .depletants
            .as_ref()
            .map(|config| {
                config
                    .fugacities
                    .iter()
                    .enumerate()
                    .filter(|&(_, &fugacity)| fugacity > 0.0)
                    .map(|(type_id, _)| self.shapes[type_id].circumsphere_diameter())
                    .fold(0.0f64, f64::max)
            })
            .unwrap_or(0.0);
        max_circumsphere + depletant_range
    }

    fn max_translate(&self) -> f64 {
        self.config
            .move_sizes
            .iter()
            .map(|sizes| sizes.translate)
            .fold(0.0f64, f64::max)
    }

    pub(crate) fn build_cell_list(&self) -> CellList {
        CellList::build(&self.cell, &self.particles, self.max_interaction_range().max(1e-3))
    }

    /// Query radius covering all possible contacts of `type_id`, inflated
    /// by the bin staleness accumulated over one sweep.
    fn neighbor_radius(&self, type_id: usize) -> f64 {
        let max_circumsphere = self.max_interaction_range();
        let own = self.shapes[type_id].circumsphere_diameter();
        0.5 * (own + max_circumsphere)
            + self.config.nselect as f64 * self.max_translate()
    }

    /// Whether the body of `particle` placed at `pose` overlaps anything.
    pub(crate) fn overlaps_at(&self, cell_list: &CellList, particle: usize, pose: &Pose) -> bool {
        let type_id = self.particles.get(particle).type_id;
        let shape = &self.shapes[type_id];
        let radius = self.neighbor_radius(type_id);
        cell_list
            .neighbors(&self.particles, &pose.position, radius, Some(particle))
            .into_iter()
            .any(|j| {
                let other = self.particles.get(j);
                let other_pose = Pose::new(other.position, other.orientation);
                overlap::overlap(shape, pose, &self.shapes[other.type_id], &other_pose, &self.cell)
            })
    }

    /// One Monte Carlo sweep: `nselect` independent trial moves for every
    /// particle.
    pub fn sweep(&mut self, timestep: u64) {
        let cell_list = self.build_cell_list();
        for particle in 0..self.particles.len() {
            for move_index in 0..self.config.nselect as u64 {
                self.trial_move(&cell_list, timestep, particle, move_index);
            }
        }
    }

    fn trial_move(&mut self, cell_list: &CellList, timestep: u64, particle: usize, move_index: u64) {
        let mut rng = self
            .streams
            .particle(Stream::TrialMove, timestep, particle, move_index);

        let (type_id, old_pose) = {
            let p = self.particles.get(particle);
            (p.type_id, Pose::new(p.position, p.orientation))
        };
        let shape = &self.shapes[type_id];
        let sizes = self.config.move_sizes[type_id];
        let ignore_statistics = shape.ignore_statistics();

        let translate = !shape.has_orientation()
            || rng.gen_range(0.0..1.0) < self.config.translation_move_probability;

        let new_pose = if translate {
            if sizes.translate == 0.0 {
                return;
            }
            let displaced = old_pose.position + moves::random_in_ball(&mut rng, sizes.translate);
            Pose::new(self.cell.wrap(&displaced), old_pose.orientation)
        } else {
            if sizes.rotate == 0.0 {
                return;
            }
            let rotation = moves::small_rotation(&mut rng, sizes.rotate);
            Pose::new(old_pose.position, rotation * old_pose.orientation)
        };

        let accepted = self.resolve_trial(cell_list, timestep, particle, move_index, &old_pose, &new_pose, &mut rng);

        if accepted {
            let p = self.particles.get_mut(particle);
            p.position = new_pose.position;
            p.orientation = new_pose.orientation;
        }
        if !ignore_statistics {
            let stats = if translate {
                &mut self.counters[type_id].translate
            } else {
                &mut self.counters[type_id].rotate
            };
            if accepted {
                stats.accept();
            } else {
                stats.reject();
            }
        }
    }

    fn resolve_trial(
        &mut self,
        cell_list: &CellList,
        timestep: u64,
        particle: usize,
        move_index: u64,
        old_pose: &Pose,
        new_pose: &Pose,
        rng: &mut impl Rng,
    ) -> bool {
        if self.overlaps_at(cell_list, particle, new_pose) {
            return false;
        }

        let type_id = self.particles.get(particle).type_id;
        let delta_energy = self.field_energy(type_id, new_pose) - self.field_energy(type_id, old_pose);
        if !(delta_energy <= 0.0) && !(rng.gen_range(0.0..1.0) < (-delta_energy).exp()) {
            return false;
        }

        if let Some(config) = &self.depletants {
            let mut depletant_rng =
                self.streams
                    .particle(Stream::Depletant, timestep, particle, move_index);
            let context = depletants::DepletantContext {
                particles: &self.particles,
                shapes: &self.shapes,
                cell: &self.cell,
                cell_list,
                config,
            };
            if !depletants::check_depletant_overlap(
                &context,
                &mut self.depletant_counters,
                &mut depletant_rng,
                particle,
                old_pose,
                new_pose,
            ) {
                return false;
            }
        }

        true
    }

    /// Exact count of overlapping pairs in the current configuration.
    pub fn count_overlaps(&self) -> usize {
        let cell_list = self.build_cell_list();
        (0..self.particles.len())
            .into_par_iter()
            .map(|i| {
                let p = self.particles.get(i);
                let pose = Pose::new(p.position, p.orientation);
                let radius = self.neighbor_radius(p.type_id);
                cell_list
                    .neighbors(&self.particles, &pose.position, radius, Some(i))
                    .into_iter()
                    .filter(|&j| j > i)
                    .filter(|&j| {
                        let other = self.particles.get(j);
                        let other_pose = Pose::new(other.position, other.orientation);
                        overlap::overlap(
                            &self.shapes[p.type_id],
                            &pose,
                            &self.shapes[other.type_id],
                            &other_pose,
                            &self.cell,
                        )
                    })
                    .count()
            })
            .sum()
    }

    /// Early-exit overlap test over the whole system.
    pub fn has_overlaps(&self) -> bool {
        let cell_list = self.build_cell_list();
        (0..self.particles.len())
            .into_par_iter()
            .any(|i| {
                let p = self.particles.get(i);
                let pose = Pose::new(p.position, p.orientation);
                self.overlaps_at(&cell_list, i, &pose)
            })
    }

    /// Draws Maxwell-distributed velocities for every particle; chain
    /// directions are seeded from these.
    pub fn thermalize_velocities(&mut self, timestep: u64) {
        for particle in 0..self.particles.len() {
            let mut rng = self
                .streams
                .particle(Stream::Thermalize, timestep, particle, 0);
            self.particles.get_mut(particle).velocity = moves::maxwell_velocity(&mut rng);
        }
    }
}
