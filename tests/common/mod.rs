//! Common utilities for integration tests

#![allow(dead_code)]

pub mod test_helpers;

pub use test_helpers::{assert_states_close, relative_error, small_sequence, sweep_grid};
