//! Sequence building blocks
//!
//! Everything a pulse sequence is assembled from. The solver only sees traces
//! and grids; this module decides what those traces contain.
//!
//! # Block kinds
//!
//! ## Labeling
//!
//! A pCASL train. It is not simulated pulse by pulse: the free pool sees no
//! field, the semisolid pool is force-saturated (`saturation = 1000`,
//! `absorption = 0.25`) and, in label mode, a bolus `(BAT, BAT + T)` joins the
//! [`BolusQueue`].
//!
//! ## Dead air
//!
//! Nothing played; relaxation, exchange and arterial inflow only.
//!
//! ## Readout
//!
//! [`GradientEcho`] or [`SpinEcho`] pulse trains, each declaring its own sample.
//!
//! ## Preparation
//!
//! Catalogued pulses applied in closed form ([`PrepPulse`]).
//!
//! ## Custom
//!
//! Arbitrary field and arterial traces supplied by the caller.

// =================================================================================================
// Module Declarations
// =================================================================================================

pub mod block;
pub mod bolus;
pub mod prep;
pub mod readout;

// =================================================================================================
// Public Re-exports
// =================================================================================================

pub use block::{BlockKind, Readout, SequenceBlock, SpinPosition};
pub use bolus::{BolusQueue, BolusWindow};
pub use prep::PrepPulse;
pub use readout::{GradientEcho, SpinEcho, DEFAULT_SPIN_ECHO_FLIPS};
