//! QuickCompress: a constrained ratchet that walks the box toward a target
//! while tolerating a bounded number of transient overlaps.
//!
//! Each trigger moves every box parameter one step toward the target (by
//! the configured scale factor, floored at `min_scale`) and accepts the
//! step only if the resulting overlap count stays within
//! `max_overlaps_per_particle * N`; otherwise the box is left untouched and
//! ordinary trial moves are given time to relax the existing overlaps.
//! Compression infeasibility is not an error: the updater simply never
//! reports completion.

use super::config::QuickCompressConfig;
use super::integrator::Integrator;
use crate::core::models::simbox::SimBox;
use tracing::{debug, info};

pub struct QuickCompress {
    config: QuickCompressConfig,
    complete: bool,
}

impl QuickCompress {
    pub fn new(config: QuickCompressConfig) -> Self {
        Self { config, complete: false }
    }

    /// `true` once the box equals the target within tolerance and the
    /// configuration is overlap-free.
    pub fn complete(&self) -> bool {
        self.complete
    }

    pub fn target_box(&self) -> &SimBox {
        &self.config.target_box
    }

    /// One compression trigger.
    pub fn update(&mut self, integrator: &mut Integrator, timestep: u64) {
        if self.complete {
            return;
        }

        let overlaps = integrator.count_overlaps();
        let at_target = integrator
            .cell()
            .approx_eq(&self.config.target_box, self.config.tolerance);
        if at_target && overlaps == 0 {
            info!(timestep, "compression complete");
            self.complete = true;
            return;
        }
        if overlaps > 0 {
            // Wait for the trial moves to work the overlaps out.
            debug!(timestep, overlaps, "compression waiting on overlap relaxation");
            return;
        }

        let old_box = *integrator.cell();
        let new_box = self.step_toward_target(&old_box);

        let saved_positions = integrator.particles().positions();
        let rescaled: Vec<_> = integrator
            .particles()
            .iter()
            .map(|p| old_box.transform_into(&new_box, &p.position))
            .collect();
        for (particle, position) in integrator.particles_mut().iter_mut().zip(rescaled) {
            particle.position = position;
        }
        integrator.set_cell(new_box);

        let n = integrator.particles().len() as f64;
        let allowed = (self.config.max_overlaps_per_particle * n).floor() as usize;
        let new_overlaps = integrator.count_overlaps();
        if new_overlaps > allowed {
            integrator.set_cell(old_box);
            integrator.particles_mut().restore_positions(&saved_positions);
            debug!(timestep, new_overlaps, allowed, "compression step rejected");
            return;
        }

        debug!(
            timestep,
            volume = integrator.cell().volume(),
            overlaps = new_overlaps,
            "compression step accepted"
        );
        if new_overlaps == 0
            && integrator
                .cell()
                .approx_eq(&self.config.target_box, self.config.tolerance)
        {
            info!(timestep, "compression complete");
            self.complete = true;
        }
    }

    /// Moves every box parameter one ratchet step toward the target.
    fn step_toward_target(&self, current: &SimBox) -> SimBox {
        let scale = self.config.min_scale.max(self.config.scale);
        let (lx, ly, lz) = current.lengths();
        let (txy, txz, tyz) = current.tilts();
        let (gx, gy, gz) = self.config.target_box.lengths();
        let (gxy, gxz, gyz) = self.config.target_box.tilts();

        let step_length = |length: f64, goal: f64| {
            if length > goal {
                (length * scale).max(goal)
            } else {
                (length / scale).min(goal)
            }
        };
        // Tilt factors relax linearly with the same rate.
        let step_tilt = |tilt: f64, goal: f64| goal + (tilt - goal) * scale;

        let mut cell = *current;
        cell.set_lengths(step_length(lx, gx), step_length(ly, gy), step_length(lz, gz));
        cell.set_tilts(step_tilt(txy, gxy), step_tilt(txz, gxz), step_tilt(tyz, gyz));
        cell
    }
}
