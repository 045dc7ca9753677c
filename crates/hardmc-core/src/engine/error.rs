use crate::core::shape::ShapeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: super::config::ConfigError,
    },

    #[error("Shape parameters for type {type_id} are invalid: {source}")]
    InvalidShape { type_id: usize, source: ShapeError },

    #[error("Particle {particle} references unknown type {type_id} ({n_types} types defined)")]
    UnknownType { particle: usize, type_id: usize, n_types: usize },

    #[error("{operation} does not support shape type {type_id}: {reason}")]
    UnsupportedShape {
        operation: &'static str,
        type_id: usize,
        reason: String,
    },

    #[error("External field '{field}' does not support shape type {type_id}")]
    FieldUnsupported { field: &'static str, type_id: usize },

    #[error("Swap move types ({0}, {1}) must name two distinct defined types")]
    InvalidSwapTypes(usize, usize),

    #[error("Expected {expected} per-type entries for {what}, got {got}")]
    PerTypeCount {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
