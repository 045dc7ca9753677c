//! # Workflows Module
//!
//! The public, highest-level entry points: complete simulation procedures
//! that tie the [`crate::core`] data model and the [`crate::engine`] move
//! engines together.
//!
//! - [`sample`] - equilibration runs interleaving trial-move sweeps with
//!   scheduled updaters
//! - [`compress`] - QuickCompress runs that ratchet the box to a target
//!   density

pub mod compress;
pub mod sample;
