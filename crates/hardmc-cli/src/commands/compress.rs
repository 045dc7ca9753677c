use crate::cli::CompressArgs;
use crate::config;
use crate::error::{CliError, Result};
use hardmc::engine::progress::{Progress, ProgressReporter};
use hardmc::workflows::compress;
use tracing::info;

pub fn run(args: CompressArgs) -> Result<()> {
    let job = config::load(&args.config)?;
    let section = job
        .compress
        .as_ref()
        .ok_or_else(|| CliError::InvalidJob("the compress command needs a [compress] section".into()))?;

    let mut integrator = config::build_integrator(&job)?;
    let mut compressor = config::build_compressor(section)?;
    info!(
        particles = integrator.particles().len(),
        volume = integrator.cell().volume(),
        target_volume = compressor.target_box().volume(),
        "compression job loaded"
    );

    let reporter = ProgressReporter::with_callback(Box::new(|event| {
        if let Progress::StatusUpdate { text } = event {
            eprintln!("{text}");
        }
    }));
    let report = compress::run(
        &mut integrator,
        &mut compressor,
        section.trigger_period,
        section.max_steps,
        &reporter,
    );

    let (lx, ly, lz) = report.final_box.lengths();
    println!("steps:          {}", report.steps);
    println!("final box:      {lx:.6} x {ly:.6} x {lz:.6}");
    println!("final overlaps: {}", report.final_overlaps);

    if report.complete {
        println!("compression complete");
        Ok(())
    } else {
        Err(CliError::Other(anyhow::anyhow!(
            "compression stalled after {} steps (volume {:.6})",
            report.steps,
            report.final_box.volume()
        )))
    }
}
