use crate::core::models::simbox::SimBox;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Parameter {parameter} = {value} is out of range ({expected})")]
    OutOfRange {
        parameter: &'static str,
        value: f64,
        expected: &'static str,
    },
}

fn check_range(
    parameter: &'static str,
    value: f64,
    ok: bool,
    expected: &'static str,
) -> Result<f64, ConfigError> {
    if ok {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange { parameter, value, expected })
    }
}

/// Maximum trial displacement and rotation angle for one particle type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveSizes {
    pub translate: f64,
    pub rotate: f64,
}

impl MoveSizes {
    pub fn new(translate: f64, rotate: f64) -> Self {
        Self { translate, rotate }
    }
}

/// Parameters of the single-particle trial move engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialMoveConfig {
    /// One entry per particle type.
    pub move_sizes: Vec<MoveSizes>,
    /// Probability that a trial move is a translation (the rest are
    /// rotations); irrelevant for types without orientation.
    pub translation_move_probability: f64,
    /// Independent Markov steps per particle per sweep.
    pub nselect: u32,
}

#[derive(Default)]
pub struct TrialMoveConfigBuilder {
    move_sizes: Option<Vec<MoveSizes>>,
    translation_move_probability: Option<f64>,
    nselect: Option<u32>,
}

impl TrialMoveConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_sizes(mut self, sizes: Vec<MoveSizes>) -> Self {
        self.move_sizes = Some(sizes);
        self
    }

    pub fn uniform_move_sizes(mut self, translate: f64, rotate: f64, n_types: usize) -> Self {
        self.move_sizes = Some(vec![MoveSizes::new(translate, rotate); n_types]);
        self
    }

    pub fn translation_move_probability(mut self, probability: f64) -> Self {
        self.translation_move_probability = Some(probability);
        self
    }

    pub fn nselect(mut self, nselect: u32) -> Self {
        self.nselect = Some(nselect);
        self
    }

    pub fn build(self) -> Result<TrialMoveConfig, ConfigError> {
        let move_sizes = self
            .move_sizes
            .ok_or(ConfigError::MissingParameter("move_sizes"))?;
        for sizes in &move_sizes {
            check_range("translate", sizes.translate, sizes.translate >= 0.0, ">= 0")?;
            check_range("rotate", sizes.rotate, sizes.rotate >= 0.0, ">= 0")?;
        }
        let probability = self.translation_move_probability.unwrap_or(0.5);
        check_range(
            "translation_move_probability",
            probability,
            (0.0..=1.0).contains(&probability),
            "in [0, 1]",
        )?;
        let nselect = self.nselect.unwrap_or(1);
        check_range("nselect", nselect as f64, nselect >= 1, ">= 1")?;
        Ok(TrialMoveConfig {
            move_sizes,
            translation_move_probability: probability,
            nselect,
        })
    }
}

/// Implicit depletant parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DepletantConfig {
    /// Average depletant number density in the free volume, one entry per
    /// particle type; zero disables that type.
    pub fugacities: Vec<f64>,
    /// Re-insertion attempts per depletant before the enclosing move is
    /// rejected outright.
    pub n_trial: u32,
}

#[derive(Default)]
pub struct DepletantConfigBuilder {
    fugacities: Option<Vec<f64>>,
    n_trial: Option<u32>,
}

impl DepletantConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fugacities(mut self, fugacities: Vec<f64>) -> Self {
        self.fugacities = Some(fugacities);
        self
    }

    pub fn n_trial(mut self, n_trial: u32) -> Self {
        self.n_trial = Some(n_trial);
        self
    }

    pub fn build(self) -> Result<DepletantConfig, ConfigError> {
        let fugacities = self
            .fugacities
            .ok_or(ConfigError::MissingParameter("fugacities"))?;
        for &fugacity in &fugacities {
            check_range("fugacity", fugacity, fugacity >= 0.0, ">= 0")?;
        }
        let n_trial = self.n_trial.unwrap_or(1);
        check_range("n_trial", n_trial as f64, n_trial >= 1, ">= 1")?;
        Ok(DepletantConfig { fugacities, n_trial })
    }
}

/// Parameters of the Newtonian event chain engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NecConfig {
    /// Probability of starting a chain instead of attempting a rotation.
    pub chain_probability: f64,
    /// Sweep distance budget of one chain.
    pub chain_time: f64,
    /// Number of chain/rotation attempts per update as a fraction of N.
    pub update_fraction: f64,
}

#[derive(Default)]
pub struct NecConfigBuilder {
    chain_probability: Option<f64>,
    chain_time: Option<f64>,
    update_fraction: Option<f64>,
}

impl NecConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain_probability(mut self, probability: f64) -> Self {
        self.chain_probability = Some(probability);
        self
    }

    pub fn chain_time(mut self, time: f64) -> Self {
        self.chain_time = Some(time);
        self
    }

    pub fn update_fraction(mut self, fraction: f64) -> Self {
        self.update_fraction = Some(fraction);
        self
    }

    pub fn build(self) -> Result<NecConfig, ConfigError> {
        let chain_probability = self.chain_probability.unwrap_or(0.5);
        check_range(
            "chain_probability",
            chain_probability,
            (0.0..=1.0).contains(&chain_probability),
            "in [0, 1]",
        )?;
        let chain_time = self
            .chain_time
            .ok_or(ConfigError::MissingParameter("chain_time"))?;
        check_range("chain_time", chain_time, chain_time > 0.0, "> 0")?;
        let update_fraction = self.update_fraction.unwrap_or(0.5);
        check_range(
            "update_fraction",
            update_fraction,
            update_fraction > 0.0 && update_fraction <= 1.0,
            "in (0, 1]",
        )?;
        Ok(NecConfig { chain_probability, chain_time, update_fraction })
    }
}

/// Parameters of the geometric cluster algorithm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterConfig {
    /// Ratio of pivot to line-reflection moves.
    pub move_ratio: f64,
    /// Probability of transforming a built cluster.
    pub flip_probability: f64,
    /// Ratio of type-swap to geometric moves.
    pub swap_move_ratio: f64,
    /// The pair of types whose identities may be swapped.
    pub swap_types: Option<(usize, usize)>,
    /// Log-fugacity bias per swapped identity (chemical potential
    /// difference between the swap types).
    pub delta_mu: f64,
}

#[derive(Default)]
pub struct ClusterConfigBuilder {
    move_ratio: Option<f64>,
    flip_probability: Option<f64>,
    swap_move_ratio: Option<f64>,
    swap_types: Option<(usize, usize)>,
    delta_mu: Option<f64>,
}

impl ClusterConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_ratio(mut self, ratio: f64) -> Self {
        self.move_ratio = Some(ratio);
        self
    }

    pub fn flip_probability(mut self, probability: f64) -> Self {
        self.flip_probability = Some(probability);
        self
    }

    pub fn swap_move_ratio(mut self, ratio: f64) -> Self {
        self.swap_move_ratio = Some(ratio);
        self
    }

    pub fn swap_types(mut self, a: usize, b: usize) -> Self {
        self.swap_types = Some((a, b));
        self
    }

    pub fn delta_mu(mut self, delta_mu: f64) -> Self {
        self.delta_mu = Some(delta_mu);
        self
    }

    pub fn build(self) -> Result<ClusterConfig, ConfigError> {
        let move_ratio = self.move_ratio.unwrap_or(0.5);
        check_range("move_ratio", move_ratio, (0.0..=1.0).contains(&move_ratio), "in [0, 1]")?;
        let flip_probability = self.flip_probability.unwrap_or(0.5);
        check_range(
            "flip_probability",
            flip_probability,
            (0.0..=1.0).contains(&flip_probability),
            "in [0, 1]",
        )?;
        let swap_move_ratio = self.swap_move_ratio.unwrap_or(0.0);
        check_range(
            "swap_move_ratio",
            swap_move_ratio,
            (0.0..=1.0).contains(&swap_move_ratio),
            "in [0, 1]",
        )?;
        Ok(ClusterConfig {
            move_ratio,
            flip_probability,
            swap_move_ratio,
            swap_types: self.swap_types,
            delta_mu: self.delta_mu.unwrap_or(0.0),
        })
    }
}

/// Parameters of the shape updater (alchemical moves).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeUpdaterConfig {
    /// Fraction of triggers on which the updater acts.
    pub move_ratio: f64,
    /// Number of types perturbed per sweep.
    pub nselect: u32,
    /// Number of proposal sweeps per trigger.
    pub nsweeps: u32,
    /// Propose and tally moves without ever mutating shapes.
    pub pretend: bool,
}

#[derive(Default)]
pub struct ShapeUpdaterConfigBuilder {
    move_ratio: Option<f64>,
    nselect: Option<u32>,
    nsweeps: Option<u32>,
    pretend: Option<bool>,
}

impl ShapeUpdaterConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_ratio(mut self, ratio: f64) -> Self {
        self.move_ratio = Some(ratio);
        self
    }

    pub fn nselect(mut self, nselect: u32) -> Self {
        self.nselect = Some(nselect);
        self
    }

    pub fn nsweeps(mut self, nsweeps: u32) -> Self {
        self.nsweeps = Some(nsweeps);
        self
    }

    pub fn pretend(mut self, pretend: bool) -> Self {
        self.pretend = Some(pretend);
        self
    }

    pub fn build(self) -> Result<ShapeUpdaterConfig, ConfigError> {
        let move_ratio = self.move_ratio.unwrap_or(1.0);
        check_range("move_ratio", move_ratio, (0.0..=1.0).contains(&move_ratio), "in [0, 1]")?;
        let nselect = self.nselect.unwrap_or(1);
        check_range("nselect", nselect as f64, nselect >= 1, ">= 1")?;
        let nsweeps = self.nsweeps.unwrap_or(1);
        check_range("nsweeps", nsweeps as f64, nsweeps >= 1, ">= 1")?;
        Ok(ShapeUpdaterConfig {
            move_ratio,
            nselect,
            nsweeps,
            pretend: self.pretend.unwrap_or(false),
        })
    }
}

/// Weighted box move categories.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxMoveWeight {
    pub delta: f64,
    pub weight: f64,
}

/// Parameters of the box move engine.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxMoveConfig {
    /// Reduced pressure `beta * P` entering volume-move acceptance.
    pub beta_p: f64,
    pub volume: BoxMoveWeight,
    pub ln_volume: BoxMoveWeight,
    pub length_delta: [f64; 3],
    pub length_weight: f64,
    pub shear_delta: [f64; 3],
    pub shear_weight: f64,
    /// Tilt magnitude beyond which lattice reduction is applied; values
    /// below 0.5 cannot be reduced, so 0 disables reduction.
    pub shear_reduce: f64,
    pub aspect: BoxMoveWeight,
}

#[derive(Default)]
pub struct BoxMoveConfigBuilder {
    beta_p: Option<f64>,
    volume: BoxMoveWeight,
    ln_volume: BoxMoveWeight,
    length_delta: [f64; 3],
    length_weight: f64,
    shear_delta: [f64; 3],
    shear_weight: f64,
    shear_reduce: f64,
    aspect: BoxMoveWeight,
}

impl BoxMoveConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn beta_p(mut self, beta_p: f64) -> Self {
        self.beta_p = Some(beta_p);
        self
    }

    pub fn volume(mut self, delta: f64, weight: f64) -> Self {
        self.volume = BoxMoveWeight { delta, weight };
        self
    }

    pub fn ln_volume(mut self, delta: f64, weight: f64) -> Self {
        self.ln_volume = BoxMoveWeight { delta, weight };
        self
    }

    pub fn length(mut self, delta: [f64; 3], weight: f64) -> Self {
        self.length_delta = delta;
        self.length_weight = weight;
        self
    }

    pub fn shear(mut self, delta: [f64; 3], weight: f64, reduce: f64) -> Self {
        self.shear_delta = delta;
        self.shear_weight = weight;
        self.shear_reduce = reduce;
        self
    }

    pub fn aspect(mut self, delta: f64, weight: f64) -> Self {
        self.aspect = BoxMoveWeight { delta, weight };
        self
    }

    pub fn build(self) -> Result<BoxMoveConfig, ConfigError> {
        let beta_p = self.beta_p.ok_or(ConfigError::MissingParameter("beta_p"))?;
        for weight in [
            self.volume.weight,
            self.ln_volume.weight,
            self.length_weight,
            self.shear_weight,
            self.aspect.weight,
        ] {
            check_range("weight", weight, weight >= 0.0, ">= 0")?;
        }
        check_range("shear_reduce", self.shear_reduce, self.shear_reduce >= 0.0, ">= 0")?;
        Ok(BoxMoveConfig {
            beta_p,
            volume: self.volume,
            ln_volume: self.ln_volume,
            length_delta: self.length_delta,
            length_weight: self.length_weight,
            shear_delta: self.shear_delta,
            shear_weight: self.shear_weight,
            shear_reduce: self.shear_reduce,
            aspect: self.aspect,
        })
    }
}

/// Parameters of the QuickCompress updater.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickCompressConfig {
    pub target_box: SimBox,
    /// Overlap budget per particle for an accepted compression step.
    pub max_overlaps_per_particle: f64,
    /// Floor for the per-step scale factor.
    pub min_scale: f64,
    /// Requested per-step scale factor; the effective factor is
    /// `max(min_scale, scale)`.
    pub scale: f64,
    /// Box comparison tolerance for the completion predicate.
    pub tolerance: f64,
}

#[derive(Default)]
pub struct QuickCompressConfigBuilder {
    target_box: Option<SimBox>,
    max_overlaps_per_particle: Option<f64>,
    min_scale: Option<f64>,
    scale: Option<f64>,
    tolerance: Option<f64>,
}

impl QuickCompressConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_box(mut self, target: SimBox) -> Self {
        self.target_box = Some(target);
        self
    }

    pub fn max_overlaps_per_particle(mut self, max: f64) -> Self {
        self.max_overlaps_per_particle = Some(max);
        self
    }

    pub fn min_scale(mut self, min_scale: f64) -> Self {
        self.min_scale = Some(min_scale);
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn build(self) -> Result<QuickCompressConfig, ConfigError> {
        let target_box = self
            .target_box
            .ok_or(ConfigError::MissingParameter("target_box"))?;
        let max_overlaps = self.max_overlaps_per_particle.unwrap_or(0.25);
        check_range(
            "max_overlaps_per_particle",
            max_overlaps,
            max_overlaps >= 0.0,
            ">= 0",
        )?;
        let min_scale = self.min_scale.unwrap_or(0.99);
        check_range("min_scale", min_scale, min_scale > 0.0 && min_scale < 1.0, "in (0, 1)")?;
        let scale = self.scale.unwrap_or(min_scale);
        check_range("scale", scale, scale > 0.0 && scale < 1.0, "in (0, 1)")?;
        let tolerance = self.tolerance.unwrap_or(1e-7);
        check_range("tolerance", tolerance, tolerance > 0.0, "> 0")?;
        Ok(QuickCompressConfig {
            target_box,
            max_overlaps_per_particle: max_overlaps,
            min_scale,
            scale,
            tolerance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trial_move_builder_requires_move_sizes() {
        let result = TrialMoveConfigBuilder::new().build();
        assert_eq!(result.unwrap_err(), ConfigError::MissingParameter("move_sizes"));
    }

    #[test]
    fn trial_move_builder_rejects_negative_sizes() {
        let result = TrialMoveConfigBuilder::new()
            .move_sizes(vec![MoveSizes::new(-0.1, 0.1)])
            .build();
        assert!(matches!(result, Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn nec_builder_rejects_zero_chain_time() {
        let result = NecConfigBuilder::new().chain_time(0.0).build();
        assert!(matches!(result, Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn depletant_builder_rejects_negative_fugacity() {
        let result = DepletantConfigBuilder::new().fugacities(vec![-1.0]).build();
        assert!(matches!(result, Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn cluster_builder_applies_defaults() {
        let config = ClusterConfigBuilder::new().build().unwrap();
        assert_eq!(config.move_ratio, 0.5);
        assert_eq!(config.flip_probability, 0.5);
        assert_eq!(config.swap_move_ratio, 0.0);
        assert_eq!(config.swap_types, None);
    }

    #[test]
    fn quick_compress_builder_requires_target_and_checks_scales() {
        assert_eq!(
            QuickCompressConfigBuilder::new().build().unwrap_err(),
            ConfigError::MissingParameter("target_box")
        );
        let result = QuickCompressConfigBuilder::new()
            .target_box(SimBox::cubic(5.0).unwrap())
            .min_scale(1.5)
            .build();
        assert!(matches!(result, Err(ConfigError::OutOfRange { .. })));
    }
}
