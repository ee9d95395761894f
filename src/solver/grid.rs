//! Uniform and event-compressed time grids.
//!
//! A block of duration `T` sampled every `dt` owns a uniform grid of
//! `ceil(T/dt)` points. When most of the block is a constant segment (dead time
//! between pulses, a flat arterial plateau) nothing new happens between two
//! consecutive changes, so the grid can be reduced to the indices where:
//!
//! - the effective field changes by more than `field_tolerance` in any component,
//! - the arterial input changes by more than `arterial_tolerance`,
//! - a sample or crusher event is scheduled,
//! - or the index is the first or the last one.
//!
//! The compressed grid keeps *base* indices into the uniform grid, so the block's
//! full-resolution traces stay the source of truth and the integrator can bridge
//! each gap exactly (see [`ExchangeIntegrator::hold`](super::ExchangeIntegrator::hold)).

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Settings for the event-driven grid compression.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Compress at all (default: false).
    pub enabled: bool,

    /// Largest per-component field change (T) still considered constant.
    pub field_tolerance: f64,

    /// Largest arterial-input change still considered constant.
    pub arterial_tolerance: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            field_tolerance: 1e-15,
            arterial_tolerance: 1e-12,
        }
    }
}

impl CompressionConfig {
    /// Compression on, default tolerances.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.field_tolerance >= 0.0 && self.arterial_tolerance >= 0.0) {
            return Err(SimError::config("compression tolerances must be non-negative"));
        }
        Ok(())
    }
}

/// The points at which a block's magnetization is actually computed.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeGrid {
    /// Every index `0..len`.
    Uniform { dt: f64, len: usize },

    /// A strictly increasing subset of `0..len` that starts at 0 and ends at `len - 1`.
    Compressed { dt: f64, len: usize, indices: Vec<usize> },
}

impl TimeGrid {
    pub fn uniform(dt: f64, len: usize) -> Self {
        TimeGrid::Uniform { dt, len }
    }

    /// Build the event grid for a block.
    ///
    /// `field` and `arterial` must both have `len` entries; `baseline` is an
    /// optional second arterial component checked the same way. `events` holds the
    /// sample and crusher indices, which are always kept.
    pub fn compress(
        dt: f64,
        field: &[Vector3<f64>],
        arterial: &[f64],
        baseline: Option<&[f64]>,
        events: &[usize],
        config: &CompressionConfig,
    ) -> Self {
        let len = field.len();
        if len <= 2 {
            return TimeGrid::uniform(dt, len);
        }

        let mut keep = vec![false; len];
        keep[0] = true;
        keep[len - 1] = true;

        for &event in events {
            if event < len {
                keep[event] = true;
            }
        }

        for k in 1..len {
            if keep[k] {
                continue;
            }
            let field_changed = (field[k] - field[k - 1])
                .iter()
                .any(|delta| delta.abs() > config.field_tolerance);
            let arterial_changed = (arterial[k] - arterial[k - 1]).abs() > config.arterial_tolerance;
            let baseline_changed = baseline
                .is_some_and(|b| (b[k] - b[k - 1]).abs() > config.arterial_tolerance);

            keep[k] = field_changed || arterial_changed || baseline_changed;
        }

        let indices: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(k, &kept)| kept.then_some(k))
            .collect();

        TimeGrid::Compressed { dt, len, indices }
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        match self {
            TimeGrid::Uniform { len, .. } => *len,
            TimeGrid::Compressed { indices, .. } => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the underlying uniform grid.
    pub fn uniform_len(&self) -> usize {
        match self {
            TimeGrid::Uniform { len, .. } | TimeGrid::Compressed { len, .. } => *len,
        }
    }

    pub fn dt(&self) -> f64 {
        match self {
            TimeGrid::Uniform { dt, .. } | TimeGrid::Compressed { dt, .. } => *dt,
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, TimeGrid::Compressed { .. })
    }

    /// Uniform-grid index of grid point `k`.
    pub fn base_index(&self, k: usize) -> usize {
        match self {
            TimeGrid::Uniform { .. } => k,
            TimeGrid::Compressed { indices, .. } => indices[k],
        }
    }

    /// Block-local time of grid point `k` (ms).
    pub fn time(&self, k: usize) -> f64 {
        self.base_index(k) as f64 * self.dt()
    }

    pub fn times(&self) -> Vec<f64> {
        (0..self.len()).map(|k| self.time(k)).collect()
    }

    /// Grid point sitting on a given uniform index, if any.
    pub fn position(&self, base: usize) -> Option<usize> {
        match self {
            TimeGrid::Uniform { len, .. } => (base < *len).then_some(base),
            TimeGrid::Compressed { indices, .. } => indices.binary_search(&base).ok(),
        }
    }

    /// Map uniform indices onto grid positions with a left-sided sorted search.
    pub fn remap(&self, bases: &[usize]) -> Vec<usize> {
        match self {
            TimeGrid::Uniform { .. } => bases.to_vec(),
            TimeGrid::Compressed { indices, .. } => bases
                .iter()
                .map(|&base| indices.partition_point(|&i| i < base))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_field(len: usize) -> Vec<Vector3<f64>> {
        vec![Vector3::zeros(); len]
    }

    #[test]
    fn test_uniform_grid_is_identity() {
        let grid = TimeGrid::uniform(0.5, 10);
        assert_eq!(grid.len(), 10);
        assert_eq!(grid.base_index(7), 7);
        assert_eq!(grid.time(4), 2.0);
        assert_eq!(grid.position(9), Some(9));
        assert_eq!(grid.position(10), None);
    }

    #[test]
    fn test_constant_traces_keep_only_endpoints() {
        let field = flat_field(100);
        let arterial = vec![0.0; 100];
        let grid = TimeGrid::compress(1.0, &field, &arterial, None, &[], &CompressionConfig::enabled());

        assert_eq!(grid.len(), 2);
        assert_eq!(grid.base_index(0), 0);
        assert_eq!(grid.base_index(1), 99);
    }

    #[test]
    fn test_changes_and_events_are_kept() {
        let mut field = flat_field(50);
        for b in field.iter_mut().take(20).skip(10) {
            b.x = 1e-6;
        }
        let mut arterial = vec![0.0; 50];
        for s in arterial.iter_mut().skip(30) {
            *s = -0.01;
        }

        let grid = TimeGrid::compress(
            1.0,
            &field,
            &arterial,
            None,
            &[42],
            &CompressionConfig::enabled(),
        );

        for expected in [0, 10, 20, 30, 42, 49] {
            assert!(grid.position(expected).is_some(), "index {expected} missing");
        }
        assert_eq!(grid.len(), 6);
    }

    #[test]
    fn test_remap_uses_left_search() {
        let grid = TimeGrid::Compressed {
            dt: 1.0,
            len: 100,
            indices: vec![0, 10, 20, 99],
        };
        assert_eq!(grid.remap(&[0, 10, 15, 20, 99]), vec![0, 1, 2, 2, 3]);
    }

    #[test]
    fn test_small_changes_within_tolerance_are_dropped() {
        let mut field = flat_field(10);
        field[5].z = 1e-18;
        let arterial = vec![0.0; 10];
        let grid = TimeGrid::compress(1.0, &field, &arterial, None, &[], &CompressionConfig::enabled());
        assert_eq!(grid.len(), 2);
    }
}
