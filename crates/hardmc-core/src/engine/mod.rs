//! # Engine Module
//!
//! The stateful Monte Carlo move engines and their acceptance machinery.
//!
//! ## Overview
//!
//! The engine layer owns move proposal and accept/reject logic for every
//! move class: single-particle trial moves with optional implicit
//! depletants and external fields, Newtonian event chains, geometric
//! cluster flips, shape alchemy, and box sampling with QuickCompress. All
//! engines operate on the state owned by the [`integrator::Integrator`]
//! and leave it untouched on rejection.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - validated builders for every engine's
//!   parameters
//! - **Trial Moves** ([`integrator`]) - state ownership and the
//!   single-particle Metropolis sweep
//! - **Depletants** ([`depletants`]) - free-volume acceptance corrections
//! - **Event Chains** ([`nec`]) - rejection-free collision-chain sweeps
//! - **Cluster Moves** ([`clusters`]) - geometric cluster algorithm
//! - **Shape Alchemy** ([`alchemy`]) - Boltzmann-weighted shape parameter
//!   moves
//! - **Box Moves** ([`boxmc`], [`quick_compress`]) - cell resampling and
//!   constrained compression
//! - **External Fields** ([`fields`]) - walls and restraints folded into
//!   trial acceptance
//! - **Determinism** ([`rng`]) - per-(seed, timestep, particle, move) RNG
//!   streams
//! - **Error Handling** ([`error`]) - configuration and policy violations
//! - **Progress** ([`progress`]) - callback-based reporting

pub mod alchemy;
pub mod boxmc;
pub mod clusters;
pub mod config;
pub(crate) mod depletants;
pub mod error;
pub mod fields;
pub mod integrator;
pub(crate) mod moves;
pub mod nec;
pub mod progress;
pub mod quick_compress;
pub mod rng;
