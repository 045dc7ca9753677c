use crate::error::{CliError, Result};
use hardmc::core::models::particle::{Particle, ParticleStore};
use hardmc::core::models::simbox::SimBox;
use hardmc::core::shape::ShapeParams;
use hardmc::engine::boxmc::BoxMoveEngine;
use hardmc::engine::clusters::ClusterEngine;
use hardmc::engine::config::{
    BoxMoveConfigBuilder, ClusterConfigBuilder, NecConfigBuilder, QuickCompressConfigBuilder,
    TrialMoveConfigBuilder,
};
use hardmc::engine::integrator::Integrator;
use hardmc::engine::nec::NecEngine;
use hardmc::engine::quick_compress::QuickCompress;
use hardmc::workflows::sample::UpdaterSchedule;
use nalgebra::Vector3;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobFile {
    pub system: SystemSection,
    pub moves: MovesSection,
    #[serde(default)]
    pub sample: Option<SampleSection>,
    #[serde(default)]
    pub nec: Option<NecSection>,
    #[serde(default)]
    pub clusters: Option<ClusterSection>,
    #[serde(default)]
    pub box_moves: Option<BoxSection>,
    #[serde(default)]
    pub compress: Option<CompressSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemSection {
    pub seed: u64,
    /// Box edge lengths.
    pub box_lengths: [f64; 3],
    /// Tilt factors xy, xz, yz.
    #[serde(default)]
    pub tilt: [f64; 3],
    /// Particles per axis on a simple cubic lattice filling the box.
    pub lattice: [usize; 3],
    /// Shape definition per particle type; lattice sites cycle through the
    /// types.
    pub shapes: Vec<ShapeSection>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeSection {
    Sphere { diameter: f64 },
    Ellipsoid { a: f64, b: f64, c: f64 },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MovesSection {
    pub translate: f64,
    pub rotate: f64,
    #[serde(default)]
    pub nselect: Option<u32>,
    #[serde(default)]
    pub translation_move_probability: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SampleSection {
    pub steps: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NecSection {
    pub chain_time: f64,
    #[serde(default)]
    pub chain_probability: Option<f64>,
    #[serde(default)]
    pub update_fraction: Option<f64>,
    #[serde(default = "default_period")]
    pub period: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterSection {
    #[serde(default)]
    pub move_ratio: Option<f64>,
    #[serde(default)]
    pub flip_probability: Option<f64>,
    #[serde(default)]
    pub swap_move_ratio: Option<f64>,
    #[serde(default)]
    pub swap_types: Option<(usize, usize)>,
    #[serde(default)]
    pub delta_mu: Option<f64>,
    #[serde(default = "default_period")]
    pub period: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoxSection {
    pub beta_p: f64,
    #[serde(default)]
    pub volume: Option<(f64, f64)>,
    #[serde(default)]
    pub ln_volume: Option<(f64, f64)>,
    #[serde(default)]
    pub shear: Option<([f64; 3], f64, f64)>,
    #[serde(default)]
    pub aspect: Option<(f64, f64)>,
    #[serde(default = "default_period")]
    pub period: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompressSection {
    pub target_box: [f64; 3],
    #[serde(default)]
    pub min_scale: Option<f64>,
    #[serde(default)]
    pub max_overlaps_per_particle: Option<f64>,
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,
    #[serde(default = "default_period")]
    pub trigger_period: u64,
}

fn default_period() -> u64 {
    1
}

fn default_max_steps() -> u64 {
    100_000
}

pub fn load(path: &Path) -> Result<JobFile> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| CliError::ParseConfig {
        path: path.to_path_buf(),
        source,
    })
}

impl ShapeSection {
    fn to_params(&self) -> ShapeParams {
        match *self {
            ShapeSection::Sphere { diameter } => ShapeParams::sphere(diameter),
            ShapeSection::Ellipsoid { a, b, c } => ShapeParams::ellipsoid(a, b, c),
        }
    }
}

/// Builds the integrator: lattice-placed particles cycling through the
/// configured types inside the configured cell.
pub fn build_integrator(job: &JobFile) -> Result<Integrator> {
    let system = &job.system;
    if system.shapes.is_empty() {
        return Err(CliError::InvalidJob("at least one shape is required".into()));
    }
    let [lx, ly, lz] = system.box_lengths;
    let [xy, xz, yz] = system.tilt;
    let cell = SimBox::with_tilt(lx, ly, lz, xy, xz, yz)
        .map_err(|e| CliError::InvalidJob(e.to_string()))?;

    let [nx, ny, nz] = system.lattice;
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(CliError::InvalidJob("lattice dimensions must be positive".into()));
    }
    let n_types = system.shapes.len();
    let mut particles = Vec::with_capacity(nx * ny * nz);
    let mut site = 0usize;
    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                let fraction = Vector3::new(
                    (i as f64 + 0.5) / nx as f64,
                    (j as f64 + 0.5) / ny as f64,
                    (k as f64 + 0.5) / nz as f64,
                );
                particles.push(Particle::new(site % n_types, cell.cartesian(&fraction)));
                site += 1;
            }
        }
    }

    let shapes: Vec<ShapeParams> = system.shapes.iter().map(ShapeSection::to_params).collect();
    let mut builder = TrialMoveConfigBuilder::new().uniform_move_sizes(
        job.moves.translate,
        job.moves.rotate,
        n_types,
    );
    if let Some(nselect) = job.moves.nselect {
        builder = builder.nselect(nselect);
    }
    if let Some(probability) = job.moves.translation_move_probability {
        builder = builder.translation_move_probability(probability);
    }
    let config = builder.build()?;

    Ok(Integrator::new(
        ParticleStore::new(particles),
        cell,
        shapes,
        config,
        system.seed,
    )?)
}

/// Builds the updater schedule from the optional job sections.
pub fn build_schedule(job: &JobFile, integrator: &Integrator) -> Result<UpdaterSchedule> {
    let mut schedule = UpdaterSchedule::new();

    if let Some(section) = &job.nec {
        let mut builder = NecConfigBuilder::new().chain_time(section.chain_time);
        if let Some(probability) = section.chain_probability {
            builder = builder.chain_probability(probability);
        }
        if let Some(fraction) = section.update_fraction {
            builder = builder.update_fraction(fraction);
        }
        schedule = schedule.with_nec(NecEngine::new(builder.build()?), section.period);
    }

    if let Some(section) = &job.clusters {
        let mut builder = ClusterConfigBuilder::new();
        if let Some(ratio) = section.move_ratio {
            builder = builder.move_ratio(ratio);
        }
        if let Some(probability) = section.flip_probability {
            builder = builder.flip_probability(probability);
        }
        if let Some(ratio) = section.swap_move_ratio {
            builder = builder.swap_move_ratio(ratio);
        }
        if let Some((a, b)) = section.swap_types {
            builder = builder.swap_types(a, b);
        }
        if let Some(delta_mu) = section.delta_mu {
            builder = builder.delta_mu(delta_mu);
        }
        let engine = ClusterEngine::new(builder.build()?, integrator)?;
        schedule = schedule.with_clusters(engine, section.period);
    }

    if let Some(section) = &job.box_moves {
        let mut builder = BoxMoveConfigBuilder::new().beta_p(section.beta_p);
        if let Some((delta, weight)) = section.volume {
            builder = builder.volume(delta, weight);
        }
        if let Some((delta, weight)) = section.ln_volume {
            builder = builder.ln_volume(delta, weight);
        }
        if let Some((delta, weight, reduce)) = section.shear {
            builder = builder.shear(delta, weight, reduce);
        }
        if let Some((delta, weight)) = section.aspect {
            builder = builder.aspect(delta, weight);
        }
        schedule = schedule.with_box_moves(BoxMoveEngine::new(builder.build()?), section.period);
    }

    Ok(schedule)
}

pub fn build_compressor(section: &CompressSection) -> Result<QuickCompress> {
    let [tx, ty, tz] = section.target_box;
    let target = SimBox::new(tx, ty, tz).map_err(|e| CliError::InvalidJob(e.to_string()))?;
    let mut builder = QuickCompressConfigBuilder::new().target_box(target);
    if let Some(min_scale) = section.min_scale {
        builder = builder.min_scale(min_scale);
    }
    if let Some(max_overlaps) = section.max_overlaps_per_particle {
        builder = builder.max_overlaps_per_particle(max_overlaps);
    }
    Ok(QuickCompress::new(builder.build()?))
}
