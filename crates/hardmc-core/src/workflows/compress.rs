use crate::core::models::simbox::SimBox;
use crate::engine::integrator::Integrator;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::quick_compress::QuickCompress;
use tracing::{info, instrument, warn};

/// Outcome of a compression run.
///
/// An unfinished compression is a stalled run, not an error; the caller
/// decides whether to keep going with a fresh step budget.
#[derive(Debug, Clone)]
pub struct CompressReport {
    pub complete: bool,
    pub steps: u64,
    pub final_box: SimBox,
    pub final_overlaps: usize,
}

/// Drives QuickCompress to completion: every timestep runs one trial-move
/// sweep, and every `trigger_period` steps the compressor attempts a box
/// step, until the target box is reached overlap-free or `max_steps` is
/// exhausted.
#[instrument(skip_all, name = "compress_workflow")]
pub fn run(
    integrator: &mut Integrator,
    compress: &mut QuickCompress,
    trigger_period: u64,
    max_steps: u64,
    reporter: &ProgressReporter,
) -> CompressReport {
    let trigger_period = trigger_period.max(1);

    reporter.report(Progress::PhaseStart { name: "Compression" });
    info!(
        volume = integrator.cell().volume(),
        target_volume = compress.target_box().volume(),
        "starting compression"
    );

    let mut steps = 0;
    for timestep in 0..max_steps {
        integrator.sweep(timestep);
        if timestep % trigger_period == 0 {
            compress.update(integrator, timestep);
        }
        steps = timestep + 1;
        if compress.complete() {
            break;
        }
        if timestep % 100 == 0 {
            reporter.report(Progress::StatusUpdate {
                text: format!(
                    "step {timestep}, volume {:.4}",
                    integrator.cell().volume()
                ),
            });
        }
    }
    reporter.report(Progress::PhaseFinish);

    let report = CompressReport {
        complete: compress.complete(),
        steps,
        final_box: *integrator.cell(),
        final_overlaps: integrator.count_overlaps(),
    };
    if report.complete {
        info!(steps = report.steps, "compression reached the target box");
    } else {
        warn!(
            steps = report.steps,
            volume = report.final_box.volume(),
            "compression stalled before reaching the target"
        );
    }
    report
}
