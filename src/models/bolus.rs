//! Arterial bolus kinetics across block boundaries.
//!
//! A labeled bolus is tracked as an `(arrival, departure)` window expressed in
//! the local frame of the *next unprocessed block*. Each block consumes the
//! queue once:
//!
//! 1. A labeling block in label mode appends `(BAT, BAT + T)`.
//! 2. If the head entry arrives before the block ends, the block's activation is
//!    the indicator of `[arrival, departure)` over its grid.
//! 3. Every entry is shifted by `-T` into the next block's frame and entries
//!    whose departure is no longer positive are dropped.
//!
//! Only the head entry is realized per block; later entries keep draining in
//! order on subsequent blocks.

use std::collections::VecDeque;

use crate::error::SimError;

/// One bolus window, block-local times in ms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BolusWindow {
    pub arrival: f64,
    pub departure: f64,
}

impl BolusWindow {
    /// # Errors
    ///
    /// Non-finite bounds, or a departure that does not follow the arrival
    /// (including a duration lost to rounding at very large arrival times).
    pub fn new(arrival: f64, departure: f64) -> Result<Self, SimError> {
        if !(arrival.is_finite() && departure.is_finite() && departure > arrival) {
            return Err(SimError::config(format!(
                "bolus departure ({departure} ms) must follow arrival ({arrival} ms)"
            )));
        }
        Ok(Self { arrival, departure })
    }

    /// True for `arrival <= t < departure`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.arrival && t < self.departure
    }

    pub fn width(&self) -> f64 {
        self.departure - self.arrival
    }

    /// Indicator over a uniform grid of `len` points spaced `dt`.
    pub fn indicator(&self, len: usize, dt: f64) -> Vec<f64> {
        (0..len)
            .map(|i| if self.contains(i as f64 * dt) { 1.0 } else { 0.0 })
            .collect()
    }

    fn shifted(&self, offset: f64) -> Self {
        Self {
            arrival: self.arrival - offset,
            departure: self.departure - offset,
        }
    }
}

/// FIFO of pending boluses.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BolusQueue {
    entries: VecDeque<BolusWindow>,
}

impl BolusQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, window: BolusWindow) {
        self.entries.push_back(window);
    }

    /// Queue the bolus produced by a labeling tag of length `duration` that
    /// arrives `arrival_time` ms after the tag starts.
    pub fn label(&mut self, arrival_time: f64, duration: f64) -> Result<(), SimError> {
        self.push(BolusWindow::new(arrival_time, arrival_time + duration)?);
        Ok(())
    }

    /// Consume one block of length `duration`.
    ///
    /// Returns the head window if it becomes active within the block (in the
    /// block's frame), then moves every entry into the next block's frame.
    pub fn propagate(&mut self, duration: f64) -> Option<BolusWindow> {
        let active = self
            .entries
            .front()
            .copied()
            .filter(|head| head.arrival < duration);

        self.entries = self
            .entries
            .iter()
            .filter(|window| window.departure > duration)
            .map(|window| window.shifted(duration))
            .collect();

        active
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn head(&self) -> Option<&BolusWindow> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BolusWindow> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
