//! mrf-rs: MR Fingerprinting dictionary generation for arterial spin labeling
//!
//! Simulates a two-pool (free water / semisolid) Bloch–McConnell system with
//! inflowing labeled blood, driven by a sequence of labeling, delay,
//! preparation and readout blocks, and sweeps the tissue parameters over a
//! nine-axis grid to fill a signal dictionary.
//!
//! # Architecture
//!
//! ```text
//! physics   constants, tissue parameters, magnetization state
//!    │
//! solver    exchange integrator (rotation + relaxation/exchange), time grids
//!    │
//! models    sequence blocks, readout trains, prep pulses, bolus kinetics
//!    │
//! sequence  ordered blocks, staged setup, schedule files
//!    │
//! sweep     nine-axis odometer, recompute cascade, dictionary driver
//!    │
//! output    dictionary stores, CSV export
//! ```
//!
//! Units are milliseconds and Tesla throughout.
//!
//! # Quick Start
//!
//! ```rust
//! use mrf_rs::prelude::*;
//!
//! # fn main() -> Result<(), SimError> {
//! // 1. Assemble a sequence
//! let mut sequence = PulseSequence::new(PhysiologicalParams::default());
//! sequence.add_block(SequenceBlock::labeling(500.0, 10.0, false)?);
//! sequence.add_block(SequenceBlock::dead_air(200.0, 10.0)?);
//! sequence.add_block(SequenceBlock::gradient_echo(GradientEcho::default(), 2.5)?);
//!
//! // 2. Describe the sweep
//! let grid = SweepGrid::single(&PhysiologicalParams::default())
//!     .with_axis(ParameterAxis::ArrivalTime, vec![200.0, 600.0]);
//! let mut sweep = ParameterSweep::new(grid, PhysiologicalParams::default())?;
//!
//! // 3. Generate
//! let mut store = MemoryStore::new();
//! let report = DictionaryGenerator::default().generate(&mut sequence, &mut sweep, &mut store)?;
//! assert_eq!(report.simulated, 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`physics`]: tissue parameters and magnetization
//! - [`solver`]: the exchange integrator
//! - [`models`]: sequence building blocks
//! - [`sequence`]: pulse sequences and schedules
//! - [`sweep`]: parameter sweeps and dictionary generation
//! - [`output`]: dictionary storage and export

pub mod error;
pub mod physics;

pub mod models;
pub mod solver;

pub mod sequence;
pub mod sweep;

pub mod output;

pub use error::SimError;

pub mod prelude {
    //! Convenient imports for common usage
    //!
    //! ```rust
    //! use mrf_rs::prelude::*;
    //! ```
    pub use crate::error::SimError;
    pub use crate::models::{GradientEcho, PrepPulse, SequenceBlock, SpinEcho};
    pub use crate::output::{DictionaryStore, JsonStore, MemoryStore};
    pub use crate::physics::{
        MagnetizationState, ParameterAxis, PhysicalConstants, PhysiologicalParams,
    };
    pub use crate::sequence::{PulseSequence, Schedule, ScheduleConfig};
    pub use crate::solver::CompressionConfig;
    pub use crate::sweep::{
        DictionaryGenerator, GeneratorConfig, ParameterSweep, SweepGrid,
    };
}
