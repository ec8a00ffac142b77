//! Error types for the timing engine.
//!
//! The measurement path never fails: degenerate inputs are clamped or
//! discarded. Errors only surface from set-up calls (configuration and the
//! write-once BDP seed).

use thiserror::Error;

/// Errors raised when validating a [`TimingConfig`](crate::timing::TimingConfig).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field that must be positive was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Offending field.
        field: &'static str,
    },

    /// Two fields are ordered the wrong way round.
    #[error("{lower} ({lower_value}us) must not exceed {upper} ({upper_value}us)")]
    Inverted {
        /// Field expected to be the smaller one.
        lower: &'static str,
        /// Its value.
        lower_value: u64,
        /// Field expected to be the larger one.
        upper: &'static str,
        /// Its value.
        upper_value: u64,
    },
}

/// Errors raised when installing a BDP seed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeedError {
    /// A seed was already installed on this connection.
    #[error("BDP seed already installed")]
    AlreadySeeded,

    /// The primary path already produced an RTT sample.
    #[error("BDP seed must be installed before the first RTT sample")]
    SampleAlreadyRecorded,

    /// The seed carries a zero window or zero RTT.
    #[error("invalid BDP seed: {0}")]
    Invalid(&'static str),
}

/// Top-level timing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimingError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Seed error.
    #[error("seed error: {0}")]
    Seed(#[from] SeedError),
}

/// Result type for timing set-up operations.
pub type TimingResult<T> = Result<T, TimingError>;
