use crate::cli::SampleArgs;
use crate::config;
use crate::error::{CliError, Result};
use hardmc::engine::progress::{Progress, ProgressReporter};
use hardmc::workflows::sample;
use tracing::info;

pub fn run(args: SampleArgs) -> Result<()> {
    let job = config::load(&args.config)?;
    let steps = job
        .sample
        .as_ref()
        .ok_or_else(|| CliError::InvalidJob("the sample command needs a [sample] section".into()))?
        .steps;

    let mut integrator = config::build_integrator(&job)?;
    let schedule = config::build_schedule(&job, &integrator)?;
    info!(
        particles = integrator.particles().len(),
        volume = integrator.cell().volume(),
        steps,
        "sampling job loaded"
    );

    let reporter = ProgressReporter::with_callback(Box::new(|event| {
        if let Progress::StatusUpdate { text } | Progress::Message(text) = event {
            eprintln!("{text}");
        }
    }));
    let report = sample::run(&mut integrator, schedule, steps, &reporter);

    println!("steps:            {}", report.steps);
    println!("final overlaps:   {}", report.final_overlaps);
    for (type_id, counters) in report.trial_moves.iter().enumerate() {
        println!(
            "type {type_id}: translate acceptance {:.4} ({} / {}), rotate acceptance {:.4} ({} / {})",
            counters.translate.acceptance(),
            counters.translate.accepted,
            counters.translate.attempted(),
            counters.rotate.acceptance(),
            counters.rotate.accepted,
            counters.rotate.attempted(),
        );
    }
    if let Some(nec) = report.nec {
        println!(
            "chains: {} started, {} collided, {} free, {} distance queries, {} errors",
            nec.chain_start_count,
            nec.chain_at_collision_count,
            nec.chain_no_collision_count,
            nec.distance_queries,
            nec.overlap_errors,
        );
    }
    if let Some(clusters) = report.clusters {
        println!(
            "clusters: pivot {}/{}, reflection {}/{}, swap {}/{}",
            clusters.pivot.accepted,
            clusters.pivot.attempted(),
            clusters.reflection.accepted,
            clusters.reflection.attempted(),
            clusters.swap.accepted,
            clusters.swap.attempted(),
        );
    }
    if let Some(box_moves) = report.box_moves {
        println!(
            "box moves: volume {}/{}, lnV {}/{}, shear {}/{}, aspect {}/{}",
            box_moves.volume.accepted,
            box_moves.volume.attempted(),
            box_moves.ln_volume.accepted,
            box_moves.ln_volume.attempted(),
            box_moves.shear.accepted,
            box_moves.shear.attempted(),
            box_moves.aspect.accepted,
            box_moves.aspect.attempted(),
        );
    }
    Ok(())
}
