//! Physical constants passed explicitly into the integrator.
//!
//! Nothing here is process-wide state: every [`ExchangeIntegrator`](crate::solver::ExchangeIntegrator)
//! and every field generator receives a `PhysicalConstants` value, so two sequences
//! simulated side by side can use different conventions without interfering.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Proton gyromagnetic ratio over 2π, in kHz/T (cycles per ms per Tesla).
pub const PROTON_GAMMA_BAR: f64 = 42_570.0;

/// Field magnitudes below this (Tesla) are treated as exactly zero.
pub const DEFAULT_ZERO_FIELD_TOLERANCE: f64 = 1e-15;

/// Immutable constants shared by the integrator and the pulse generators.
///
/// # Example
///
/// ```rust
/// use mrf_rs::physics::PhysicalConstants;
///
/// let constants = PhysicalConstants::default();
/// // γ in rad/(ms·T)
/// assert!((constants.gamma() - 2.0 * std::f64::consts::PI * 42_570.0).abs() < 1e-9);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    gamma_bar: f64,
    zero_field_tolerance: f64,
}

impl PhysicalConstants {
    /// Build a constant set.
    ///
    /// # Errors
    ///
    /// `gamma_bar` not strictly positive and finite, or a negative or non-finite tolerance.
    pub fn new(gamma_bar: f64, zero_field_tolerance: f64) -> Result<Self, SimError> {
        if !(gamma_bar.is_finite() && gamma_bar > 0.0) {
            return Err(SimError::config(format!(
                "gyromagnetic ratio must be positive, got {gamma_bar}"
            )));
        }
        if !(zero_field_tolerance.is_finite() && zero_field_tolerance >= 0.0) {
            return Err(SimError::config(format!(
                "zero-field tolerance must be non-negative, got {zero_field_tolerance}"
            )));
        }
        Ok(Self { gamma_bar, zero_field_tolerance })
    }

    /// γ̄ in kHz/T.
    pub fn gamma_bar(&self) -> f64 {
        self.gamma_bar
    }

    /// γ = 2π·γ̄ in rad/(ms·T).
    pub fn gamma(&self) -> f64 {
        2.0 * PI * self.gamma_bar
    }

    pub fn zero_field_tolerance(&self) -> f64 {
        self.zero_field_tolerance
    }

    /// Field amplitude (T) of a rectangular pulse of `samples` steps of `dt` ms
    /// that nutates by `flip_degrees`.
    pub fn rect_pulse_amplitude(&self, flip_degrees: f64, samples: usize, dt: f64) -> f64 {
        flip_degrees * PI / (180.0 * self.gamma() * samples as f64 * dt)
    }
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            gamma_bar: PROTON_GAMMA_BAR,
            zero_field_tolerance: DEFAULT_ZERO_FIELD_TOLERANCE,
        }
    }
}
