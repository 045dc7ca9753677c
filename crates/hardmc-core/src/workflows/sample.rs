use crate::core::models::counters::{
    BoxCounters, ClusterCounters, MoveStats, NecCounters, TrialMoveCounters,
};
use crate::engine::alchemy::ShapeUpdater;
use crate::engine::boxmc::BoxMoveEngine;
use crate::engine::clusters::ClusterEngine;
use crate::engine::integrator::Integrator;
use crate::engine::nec::NecEngine;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{info, instrument};

/// Updaters to interleave with the trial-move sweep, each with its trigger
/// period in timesteps.
#[derive(Default)]
pub struct UpdaterSchedule {
    nec: Option<(NecEngine, u64)>,
    clusters: Option<(ClusterEngine, u64)>,
    shape: Option<(ShapeUpdater, u64)>,
    box_moves: Option<(BoxMoveEngine, u64)>,
}

impl UpdaterSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nec(mut self, engine: NecEngine, period: u64) -> Self {
        self.nec = Some((engine, period.max(1)));
        self
    }

    pub fn with_clusters(mut self, engine: ClusterEngine, period: u64) -> Self {
        self.clusters = Some((engine, period.max(1)));
        self
    }

    pub fn with_shape_updater(mut self, updater: ShapeUpdater, period: u64) -> Self {
        self.shape = Some((updater, period.max(1)));
        self
    }

    pub fn with_box_moves(mut self, engine: BoxMoveEngine, period: u64) -> Self {
        self.box_moves = Some((engine, period.max(1)));
        self
    }
}

/// Counters gathered at the end of a sampling run.
#[derive(Debug, Clone)]
pub struct SampleReport {
    pub steps: u64,
    pub trial_moves: Vec<TrialMoveCounters>,
    pub nec: Option<NecCounters>,
    pub clusters: Option<ClusterCounters>,
    pub shape_moves: Option<Vec<MoveStats>>,
    pub box_moves: Option<BoxCounters>,
    pub final_overlaps: usize,
}

/// Runs `steps` timesteps of equilibration: every step performs one
/// trial-move sweep, then fires each scheduled updater whose period
/// divides the step index.
#[instrument(skip_all, name = "sample_workflow")]
pub fn run(
    integrator: &mut Integrator,
    mut schedule: UpdaterSchedule,
    steps: u64,
    reporter: &ProgressReporter,
) -> SampleReport {
    reporter.report(Progress::PhaseStart { name: "Thermalization" });
    info!(particles = integrator.particles().len(), "thermalizing velocities");
    integrator.reset_counters();
    integrator.thermalize_velocities(0);
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart { name: "Sampling" });
    reporter.report(Progress::TaskStart { total_steps: steps });
    for timestep in 0..steps {
        integrator.sweep(timestep);

        if let Some((engine, period)) = &mut schedule.nec {
            if timestep % *period == 0 {
                engine.update(integrator, timestep);
            }
        }
        if let Some((engine, period)) = &mut schedule.clusters {
            if timestep % *period == 0 {
                engine.update(integrator, timestep);
            }
        }
        if let Some((updater, period)) = &mut schedule.shape {
            if timestep % *period == 0 {
                updater.update(integrator, timestep);
            }
        }
        if let Some((engine, period)) = &mut schedule.box_moves {
            if timestep % *period == 0 {
                engine.update(integrator, timestep);
            }
        }
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let final_overlaps = integrator.count_overlaps();
    info!(final_overlaps, "sampling run finished");

    SampleReport {
        steps,
        trial_moves: integrator.counters().to_vec(),
        nec: schedule.nec.as_ref().map(|(engine, _)| *engine.counters()),
        clusters: schedule.clusters.as_ref().map(|(engine, _)| *engine.counters()),
        shape_moves: schedule
            .shape
            .as_ref()
            .map(|(updater, _)| updater.counters().to_vec()),
        box_moves: schedule.box_moves.as_ref().map(|(engine, _)| *engine.counters()),
        final_overlaps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::particle::{Particle, ParticleStore};
    use crate::core::models::simbox::SimBox;
    use crate::core::shape::ShapeParams;
    use crate::engine::config::{NecConfigBuilder, TrialMoveConfigBuilder};
    use nalgebra::Point3;

    fn lattice_integrator() -> Integrator {
        let mut particles = Vec::new();
        for i in 0..3 {
            for j in 0..3 {
                for k in 0..3 {
                    particles.push(Particle::new(
                        0,
                        Point3::new(
                            1.0 + 2.0 * i as f64,
                            1.0 + 2.0 * j as f64,
                            1.0 + 2.0 * k as f64,
                        ),
                    ));
                }
            }
        }
        let config = TrialMoveConfigBuilder::new()
            .uniform_move_sizes(0.2, 0.2, 1)
            .build()
            .unwrap();
        Integrator::new(
            ParticleStore::new(particles),
            SimBox::cubic(6.0).unwrap(),
            vec![ShapeParams::sphere(1.0)],
            config,
            2024,
        )
        .unwrap()
    }

    #[test]
    fn run_reports_counters_and_keeps_hard_core() {
        let mut integrator = lattice_integrator();
        let nec = NecEngine::new(
            NecConfigBuilder::new().chain_time(0.5).build().unwrap(),
        );
        let schedule = UpdaterSchedule::new().with_nec(nec, 5);
        let reporter = ProgressReporter::new();

        let report = run(&mut integrator, schedule, 20, &reporter);

        assert_eq!(report.steps, 20);
        assert_eq!(report.final_overlaps, 0);
        assert!(report.trial_moves[0].translate.attempted() > 0);
        let nec_counters = report.nec.unwrap();
        assert_eq!(
            nec_counters.chain_at_collision_count + nec_counters.chain_no_collision_count,
            nec_counters.chain_start_count
        );
        assert!(report.clusters.is_none());
    }

    #[test]
    fn progress_events_bracket_the_run() {
        use std::sync::Mutex;
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            events.lock().unwrap().push(format!("{event:?}"));
        }));
        let mut integrator = lattice_integrator();
        run(&mut integrator, UpdaterSchedule::new(), 3, &reporter);
        drop(reporter);
        let recorded = events.into_inner().unwrap();
        assert!(recorded.first().unwrap().contains("Thermalization"));
        assert!(recorded.iter().any(|e| e.contains("Sampling")));
        assert_eq!(recorded.iter().filter(|e| e.contains("TaskIncrement")).count(), 3);
    }
}
