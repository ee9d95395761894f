//! Numerical core
//!
//! The solver layer knows nothing about labeling, readouts or schedules. It
//! receives per-sample field and arterial traces plus a time grid and returns
//! the magnetization trace.
//!
//! # Module Organization
//!
//! - **`exchange`**: [`ExchangeIntegrator`], the closed-form per-step update of
//!   the two-pool model (rotation, semisolid saturation, relaxation-exchange)
//! - **`grid`**: [`TimeGrid`] (uniform or event-compressed) and
//!   [`CompressionConfig`]
//!
//! # Workflow
//!
//! ```text
//! ┌──────────────────────┐   ┌─────────────────────┐
//! │ PhysiologicalParams  │   │ field / arterial     │
//! │ PhysicalConstants    │   │ traces + TimeGrid    │
//! └──────────┬───────────┘   └──────────┬──────────┘
//!            │                          │
//!   ┌────────▼───────────┐              │
//!   │ ExchangeIntegrator │◄─────────────┘
//!   │ (ACE precomputed)  │
//!   └────────┬───────────┘
//!            │
//!   ┌────────▼───────────┐
//!   │ magnetization trace │ ← one state per grid point
//!   └────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use mrf_rs::physics::{MagnetizationState, PhysicalConstants, PhysiologicalParams};
//! use mrf_rs::solver::{ExchangeIntegrator, TimeGrid};
//! use nalgebra::Vector3;
//!
//! let params = PhysiologicalParams::default();
//! let integrator = ExchangeIntegrator::new(&params, &PhysicalConstants::default(), 0.1, 1.0, 0.0);
//!
//! let field = vec![Vector3::zeros(); 100];
//! let arterial = vec![0.0; 100];
//! let grid = TimeGrid::uniform(0.1, 100);
//!
//! let trace = integrator.integrate(MagnetizationState::equilibrium(), &field, &arterial, &grid, &[]);
//! assert_eq!(trace.len(), 100);
//! ```

// =================================================================================================
// Module Declarations
// =================================================================================================
mod exchange;
mod grid;

// =================================================================================================
// Public Re-exports
// =================================================================================================

pub use exchange::{rodrigues_rotation, ExchangeIntegrator};
pub use grid::{CompressionConfig, TimeGrid};

// =================================================================================================
// Helper Functions
// =================================================================================================

use crate::error::SimError;
use crate::physics::MagnetizationState;

/// Validate a magnetization state for numerical issues
///
/// NaN or Inf after a block means a caller supplied degenerate parameters
/// (a zero relaxation time, for instance). Reporting it here keeps a corrupt
/// entry out of the dictionary.
///
/// # Arguments
///
/// * `state` - Terminal state of the block
/// * `block` - Block position in the sequence (for error reporting)
pub(crate) fn validate_state(state: &MagnetizationState, block: usize) -> Result<(), SimError> {
    if state.is_finite() {
        Ok(())
    } else {
        Err(SimError::NonFinite {
            block,
            state: state.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_state() {
        assert!(validate_state(&MagnetizationState::equilibrium(), 0).is_ok());

        let broken = MagnetizationState::new(0.0, f64::INFINITY, 1.0, 1.0);
        match validate_state(&broken, 3) {
            Err(SimError::NonFinite { block, .. }) => assert_eq!(block, 3),
            other => panic!("expected NonFinite, got {other:?}"),
        }
    }
}
