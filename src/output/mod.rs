//! Output of simulation results
//!
//! ```text
//! output/
//! ├── mod.rs
//! ├── store.rs        ← DictionaryStore trait, MemoryStore, JsonStore
//! └── export/         ← single-run traces
//!     ├── mod.rs
//!     └── csv.rs
//! ```
//!
//! Dictionary stores receive one sample vector per parameter combination from
//! [`crate::sweep::DictionaryGenerator`]. Export writes the trace of one
//! [`crate::sequence::PulseSequence`] run.

pub mod export;
pub mod store;

pub use export::{export_samples_csv, export_sequence_csv, CsvConfig, CsvMetadata};
pub use store::{DictionaryStore, JsonStore, MemoryStore, StoreError};
