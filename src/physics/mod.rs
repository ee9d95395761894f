//! Physics of the two-pool tissue model
//!
//! This module holds the quantities the simulation is *about*, independent of
//! how the sequence is assembled or integrated:
//!
//! - **[`PhysicalConstants`]**: gyromagnetic ratio and the zero-field tolerance,
//!   passed explicitly to everything that needs them
//! - **[`PhysiologicalParams`]**: relaxation times, exchange rates, perfusion
//!   and labeling parameters, plus the derived apparent rates
//! - **[`MagnetizationState`]**: `[Mx, My, Mz_free, Mz_semisolid]`
//!
//! # Example
//!
//! ```rust
//! use mrf_rs::physics::{MagnetizationState, PhysiologicalParams};
//!
//! let params = PhysiologicalParams::default().with_relaxation(1200.0, 70.0, 900.0);
//! params.validate().unwrap();
//!
//! let start = MagnetizationState::equilibrium();
//! assert_eq!(start.mz_free(), 1.0);
//! ```

mod constants;
mod params;
mod state;

pub use constants::{PhysicalConstants, DEFAULT_ZERO_FIELD_TOLERANCE, PROTON_GAMMA_BAR};
pub use params::{ParameterAxis, PhysiologicalParams};
pub use state::MagnetizationState;
