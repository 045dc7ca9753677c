//! # hardmc Core Library
//!
//! A hard-particle Monte Carlo engine: it samples configurations of rigid
//! bodies (spheres, convex polyhedra, ellipsoids, sphere unions) under an
//! exact excluded-volume constraint, with optional depletant and
//! external-field energetics, using Metropolis trial moves, Newtonian
//! event chains, geometric cluster moves, shape-alchemical moves, and box
//! sampling with constrained compression.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to keep
//! the acceptance machinery separate from geometry and from orchestration:
//!
//! - **[`core`]: The Foundation.** Stateless data models (particles, the
//!   periodic triclinic cell, move counters), the closed set of shape
//!   variants with their capability surface, the overlap/sweep oracle, and
//!   the cell-list neighbor enumerator.
//!
//! - **[`engine`]: The Logic Core.** The stateful move engines and their
//!   accept/reject logic - trial moves with depletants and external
//!   fields, event chains, cluster flips, shape alchemy, box moves and
//!   QuickCompress - plus validated configuration builders and
//!   deterministic per-move RNG streams.
//!
//! - **[`workflows`]: The Public API.** Complete procedures (equilibration
//!   sampling, compression to a target box) that drive the engines through
//!   a step loop with progress reporting.

pub mod core;
pub mod engine;
pub mod workflows;
