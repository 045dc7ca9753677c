//! Metropolis box moves: volume, log-volume, edge length, shear, and
//! aspect updates of the periodic cell at fixed particle number.
//!
//! Every move rescales all particle positions affinely into the proposed
//! cell and is rejected wholesale if any pair overlaps afterwards;
//! rejection restores box and positions bit-identically from the saved
//! copies.

use super::config::BoxMoveConfig;
use super::integrator::Integrator;
use super::rng::Stream;
use crate::core::models::counters::BoxCounters;
use crate::core::models::simbox::SimBox;
use rand::Rng;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoxMoveKind {
    Volume,
    LnVolume,
    Length,
    Shear,
    Aspect,
}

pub struct BoxMoveEngine {
    config: BoxMoveConfig,
    counters: BoxCounters,
}

impl BoxMoveEngine {
    pub fn new(config: BoxMoveConfig) -> Self {
        Self { config, counters: BoxCounters::default() }
    }

    pub fn counters(&self) -> &BoxCounters {
        &self.counters
    }

    pub fn reset_statistics(&mut self) {
        self.counters.reset();
    }

    /// Attempts one box move, drawn from the configured category weights.
    pub fn update(&mut self, integrator: &mut Integrator, timestep: u64) {
        let mut rng = integrator.streams().updater(Stream::BoxMove, timestep);
        let kind = match self.choose_kind(&mut rng) {
            Some(kind) => kind,
            None => return,
        };

        let old_box = *integrator.cell();
        let n = integrator.particles().len() as f64;

        let (new_box, extra_log_weight) = match self.propose(&old_box, kind, n, &mut rng) {
            Some(proposal) => proposal,
            None => {
                self.record(kind, false);
                return;
            }
        };

        // Metropolis draw before the expensive overlap re-test.
        if !(extra_log_weight >= 0.0) && !(rng.gen_range(0.0..1.0) < extra_log_weight.exp()) {
            self.record(kind, false);
            return;
        }

        let saved_positions = integrator.particles().positions();
        self.rescale_positions(integrator, &old_box, &new_box);
        integrator.set_cell(new_box);

        if integrator.has_overlaps() {
            integrator.set_cell(old_box);
            integrator.particles_mut().restore_positions(&saved_positions);
            self.record(kind, false);
            return;
        }

        if kind == BoxMoveKind::Shear {
            self.maybe_lattice_reduce(integrator);
        }
        trace!(?kind, volume = integrator.cell().volume(), "box move accepted");
        self.record(kind, true);
    }

    fn choose_kind(&self, rng: &mut impl Rng) -> Option<BoxMoveKind> {
        let weights = [
            (BoxMoveKind::Volume, self.config.volume.weight),
            (BoxMoveKind::LnVolume, self.config.ln_volume.weight),
            (BoxMoveKind::Length, self.config.length_weight),
            (BoxMoveKind::Shear, self.config.shear_weight),
            (BoxMoveKind::Aspect, self.config.aspect.weight),
        ];
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return None;
        }
        let mut draw = rng.gen_range(0.0..total);
        for (kind, weight) in weights {
            if draw < weight {
                return Some(kind);
            }
            draw -= weight;
        }
        Some(BoxMoveKind::Aspect)
    }

    /// Proposes the new cell and the non-overlap part of the log acceptance
    /// weight (`-betaP dV + N ln(V'/V)` for volume-changing categories).
    fn propose(
        &self,
        old_box: &SimBox,
        kind: BoxMoveKind,
        n: f64,
        rng: &mut impl Rng,
    ) -> Option<(SimBox, f64)> {
        let (lx, ly, lz) = old_box.lengths();
        let (xy, xz, yz) = old_box.tilts();
        let volume = old_box.volume();

        match kind {
            BoxMoveKind::Volume => {
                if self.config.volume.delta == 0.0 {
                    return None;
                }
                let dv = rng.gen_range(-self.config.volume.delta..self.config.volume.delta);
                let new_volume = volume + dv;
                if new_volume <= 0.0 {
                    return None;
                }
                let scale = (new_volume / volume).cbrt();
                let mut cell = *old_box;
                cell.set_lengths(lx * scale, ly * scale, lz * scale);
                let log_weight = -self.config.beta_p * dv + n * (new_volume / volume).ln();
                Some((cell, log_weight))
            }
            BoxMoveKind::LnVolume => {
                if self.config.ln_volume.delta == 0.0 {
                    return None;
                }
                let dln = rng.gen_range(-self.config.ln_volume.delta..self.config.ln_volume.delta);
                let new_volume = volume * dln.exp();
                let scale = dln.exp().cbrt();
                let mut cell = *old_box;
                cell.set_lengths(lx * scale, ly * scale, lz * scale);
                // Sampling uniformly in ln V shifts the measure by one power
                // of V.
                let log_weight = -self.config.beta_p * (new_volume - volume) + (n + 1.0) * dln;
                Some((cell, log_weight))
            }
            BoxMoveKind::Length => {
                let axis = rng.gen_range(0..3);
                let delta = self.config.length_delta[axis];
                if delta == 0.0 {
                    return None;
                }
                let change = rng.gen_range(-delta..delta);
                let mut lengths = [lx, ly, lz];
                lengths[axis] += change;
                if lengths[axis] <= 0.0 {
                    return None;
                }
                let mut cell = *old_box;
                cell.set_lengths(lengths[0], lengths[1], lengths[2]);
                let new_volume = cell.volume();
                let log_weight =
                    -self.config.beta_p * (new_volume - volume) + n * (new_volume / volume).ln();
                Some((cell, log_weight))
            }
            BoxMoveKind::Shear => {
                let axis = rng.gen_range(0..3);
                let delta = self.config.shear_delta[axis];
                if delta == 0.0 {
                    return None;
                }
                let change = rng.gen_range(-delta..delta);
                let mut tilts = [xy, xz, yz];
                tilts[axis] += change;
                let mut cell = *old_box;
                cell.set_tilts(tilts[0], tilts[1], tilts[2]);
                Some((cell, 0.0))
            }
            BoxMoveKind::Aspect => {
                if self.config.aspect.delta == 0.0 {
                    return None;
                }
                let axis = rng.gen_range(0..3);
                let factor = 1.0 + rng.gen_range(0.0..self.config.aspect.delta);
                let factor = if rng.r#gen::<bool>() { factor } else { 1.0 / factor };
                // Volume-preserving: stretch one axis, shrink the others.
                let compensation = 1.0 / factor.sqrt();
                let mut lengths = [lx, ly, lz];
                for (i, length) in lengths.iter_mut().enumerate() {
                    *length *= if i == axis { factor } else { compensation };
                }
                let mut cell = *old_box;
                cell.set_lengths(lengths[0], lengths[1], lengths[2]);
                Some((cell, 0.0))
            }
        }
    }

    fn rescale_positions(&self, integrator: &mut Integrator, old_box: &SimBox, new_box: &SimBox) {
        let positions: Vec<_> = integrator
            .particles()
            .iter()
            .map(|p| old_box.transform_into(new_box, &p.position))
            .collect();
        for (particle, position) in integrator.particles_mut().iter_mut().zip(positions) {
            particle.position = position;
        }
    }

    /// Lattice reduction after accepted shear moves: tilt factors past the
    /// `reduce` threshold are remapped to the equivalent lower-shear cell.
    /// Reduction can introduce tiny overlaps at machine precision which
    /// later trial moves resolve; this temporarily breaks detailed balance
    /// and is accepted as such.
    fn maybe_lattice_reduce(&self, integrator: &mut Integrator) {
        let reduce = self.config.shear_reduce;
        if reduce <= 0.0 {
            return;
        }
        let (xy, xz, yz) = integrator.cell().tilts();
        if xy.abs().max(xz.abs()).max(yz.abs()) <= reduce {
            return;
        }
        let mut cell = *integrator.cell();
        if cell.lattice_reduce(0.5) {
            let rewrapped: Vec<_> = integrator
                .particles()
                .iter()
                .map(|p| cell.wrap(&p.position))
                .collect();
            integrator.set_cell(cell);
            for (particle, position) in integrator.particles_mut().iter_mut().zip(rewrapped) {
                particle.position = position;
            }
        }
    }

    fn record(&mut self, kind: BoxMoveKind, accepted: bool) {
        let stats = match kind {
            BoxMoveKind::Volume => &mut self.counters.volume,
            BoxMoveKind::LnVolume => &mut self.counters.ln_volume,
            BoxMoveKind::Length => &mut self.counters.length,
            BoxMoveKind::Shear => &mut self.counters.shear,
            BoxMoveKind::Aspect => &mut self.counters.aspect,
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
    use crate::core::shape::ShapeParams;
    use crate::engine::config::{BoxMoveConfigBuilder, TrialMoveConfigBuilder};
    use nalgebra::Point3;

    fn integrator(positions: &[[f64; 3]], box_l: f64) -> Integrator {
        let particles = ParticleStore::new(
            positions
                .iter()
                .map(|&[x, y, z]| Particle::new(0, Point3::new(x, y, z)))
                .collect(),
        );
        let config = TrialMoveConfigBuilder::new()
            .uniform_move_sizes(0.1, 0.1, 1)
            .build()
            .unwrap();
        Integrator::new(
            particles,
            SimBox::cubic(box_l).unwrap(),
            vec![ShapeParams::sphere(1.0)],
            config,
            555,
        )
        .unwrap()
    }

    #[test]
    fn no_enabled_categories_means_no_move() {
        let mut system = integrator(&[[2.0, 2.0, 2.0]], 8.0);
        let config = BoxMoveConfigBuilder::new().beta_p(1.0).build().unwrap();
        let mut engine = BoxMoveEngine::new(config);
        engine.update(&mut system, 0);
        assert_eq!(*engine.counters(), BoxCounters::default());
        assert_eq!(system.cell().lengths(), (8.0, 8.0, 8.0));
    }

    #[test]
    fn rejected_compression_rolls_back_bit_identically() {
        // Two spheres nearly at contact through the periodic boundary along
        // x: compressing below contact must be rejected wholesale.
        let mut system = integrator(&[[0.5, 2.0, 2.0], [3.54, 2.0, 2.0]], 4.05);
        let config = BoxMoveConfigBuilder::new()
            .beta_p(1000.0)
            .volume(0.5, 1.0)
            .build()
            .unwrap();
        let mut engine = BoxMoveEngine::new(config);

        let mut box_before = *system.cell();
        let mut positions_before = system.particles().positions();
        let mut saw_rejection = false;
        for timestep in 0..60 {
            let accepted_before = engine.counters().volume.accepted;
            engine.update(&mut system, timestep);
            let accepted = engine.counters().volume.accepted > accepted_before;
            if accepted {
                box_before = *system.cell();
                positions_before = system.particles().positions();
            } else {
                saw_rejection = true;
                // Rejection restores both the cell and every position
                // exactly.
                assert_eq!(system.cell(), &box_before);
                assert_eq!(system.particles().positions(), positions_before);
            }
        }
        assert!(saw_rejection, "compressions past contact must reject");
        assert_eq!(system.count_overlaps(), 0);
    }

    #[test]
    fn volume_moves_respect_pressure_balance() {
        let mut system = integrator(&[[2.0, 2.0, 2.0]], 8.0);
        let config = BoxMoveConfigBuilder::new()
            .beta_p(10.0)
            .volume(20.0, 1.0)
            .build()
            .unwrap();
        let mut engine = BoxMoveEngine::new(config);
        for timestep in 0..300 {
            engine.update(&mut system, timestep);
        }
        let counters = engine.counters().volume;
        assert_eq!(counters.attempted(), 300);
        assert!(counters.accepted > 0);
        // At betaP = 10 with one particle the equilibrium volume is tiny;
        // the box must have compressed substantially.
        assert!(system.cell().volume() < 512.0 * 0.8, "volume = {}", system.cell().volume());
    }

    #[test]
    fn shear_moves_trigger_lattice_reduction_beyond_threshold() {
        let mut system = integrator(&[[4.0, 4.0, 4.0]], 8.0);
        let config = BoxMoveConfigBuilder::new()
            .beta_p(0.0)
            .shear([0.3, 0.0, 0.0], 1.0, 0.55)
            .build()
            .unwrap();
        let mut engine = BoxMoveEngine::new(config);
        for timestep in 0..400 {
            engine.update(&mut system, timestep);
            let (xy, xz, yz) = system.cell().tilts();
            assert!(
                xy.abs() <= 0.55 + 0.3 && xz.abs() <= 0.55 + 0.3 && yz.abs() <= 0.55 + 0.3,
                "tilt escaped the reduced range: ({xy}, {xz}, {yz})"
            );
        }
        assert!(engine.counters().shear.accepted > 0);
        assert_eq!(system.count_overlaps(), 0);
    }

    #[test]
    fn aspect_moves_preserve_volume() {
        let mut system = integrator(&[[2.0, 2.0, 2.0]], 8.0);
        let volume = system.cell().volume();
        let config = BoxMoveConfigBuilder::new()
            .beta_p(1.0)
            .aspect(0.1, 1.0)
            .build()
            .unwrap();
        let mut engine = BoxMoveEngine::new(config);
        for timestep in 0..50 {
            engine.update(&mut system, timestep);
        }
        assert!(engine.counters().aspect.accepted > 0);
        assert!((system.cell().volume() - volume).abs() < 1e-9 * volume);
    }
}
