//! Error types shared across the simulator.
//!
//! Configuration problems fail fast at block construction or sequence setup and
//! propagate unchanged to the dictionary driver, which halts generation. A
//! near-zero field is not an error (the integrator skips the rotation) and sweep
//! exhaustion is reported as a normal return value, not through this type.

use thiserror::Error;

use crate::output::store::StoreError;

/// Errors raised while building or running a pulse sequence.
#[derive(Debug, Error)]
pub enum SimError {
    /// A sample time falls outside the block's `[0, T)` window.
    #[error("sample time {time} ms lies outside the block window [0, {duration}) ms")]
    SampleOutOfRange { time: f64, duration: f64 },

    /// A crusher time falls outside the block's `[0, T)` window.
    #[error("crusher time {time} ms lies outside the block window [0, {duration}) ms")]
    CrusherOutOfRange { time: f64, duration: f64 },

    /// Readout pulse wider than its echo spacing.
    #[error("pulse width {pulse_width} ms exceeds echo spacing {echo_spacing} ms")]
    PulseWidthExceedsEchoSpacing { pulse_width: f64, echo_spacing: f64 },

    /// Generated pulse train does not fit in the block grid.
    #[error("pulse train needs {required} samples but the block only holds {available}")]
    PulseTrainOverflow { required: usize, available: usize },

    /// Two traces that must share a grid have different lengths.
    #[error("{what}: expected {expected} samples, got {actual}")]
    TraceLengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Any other invalid configuration value.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Preparation code that is not in the catalog.
    #[error("unknown preparation pulse code {0}")]
    UnknownPrepPulse(i64),

    /// Preparation code that is catalogued but has no simulation model.
    #[error("preparation pulse {0} is catalogued but not supported")]
    UnsupportedPrepPulse(i64),

    /// Malformed schedule row.
    #[error("schedule line {line}: {message}")]
    Schedule { line: usize, message: String },

    /// NaN or Inf in the magnetization after a block.
    #[error("non-finite magnetization after block {block}: {state}")]
    NonFinite { block: usize, state: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        SimError::Configuration(message.into())
    }
}
