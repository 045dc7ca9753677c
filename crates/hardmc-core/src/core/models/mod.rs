//! Data models for the simulation state: particles, the periodic cell, and
//! the move counters every engine reports into.

pub mod counters;
pub mod particle;
pub mod simbox;
