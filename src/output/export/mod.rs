//! Export of simulation traces for external analysis.
//!
//! | Format | Module  |
//! |--------|---------|
//! | CSV    | [`csv`] |
//!
//! Dictionaries themselves go through [`crate::output::store`]; this module is
//! for inspecting single sequence runs.

pub mod csv;

pub use csv::{export_samples_csv, export_sequence_csv, CsvConfig, CsvError, CsvMetadata};
