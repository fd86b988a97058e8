//! Error types for the generation pipeline.
//!
//! Configuration problems and climate non-convergence are recoverable and
//! surface as `Result`s. Index and geometry invariant violations (bad
//! tile/corner ids, a cycle in the flow graph) are programming errors and
//! panic at the point of detection.

use thiserror::Error;

use crate::climate::ClimateCycle;

/// A malformed or unresolvable configuration value. Never defaulted silently.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown terrain algorithm `{name}` in category `{category}`")]
    UnknownAlgorithm { category: String, name: String },

    #[error("unknown algorithm category `{0}`")]
    UnknownCategory(String),

    #[error("malformed algorithm registry: {0}")]
    MalformedRegistry(#[from] serde_json::Error),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter { name, reason: reason.into() }
    }
}

/// Failure modes of the seasonal climate iteration. Recovery policy (accept
/// the partial state, retry with a looser tolerance, abort) belongs to the
/// caller; the simulator never retries on its own.
#[derive(Debug, Error)]
pub enum ClimateError {
    #[error("climate did not converge after {cycles} cycles (max delta {max_delta:.6})")]
    NonConvergence {
        cycles: u32,
        max_delta: f64,
        /// Best-so-far annual cycle, so the caller can still accept it.
        partial: Box<ClimateCycle>,
    },

    #[error("climate simulation aborted during cycle {cycle}")]
    Aborted { cycle: u32 },
}
