//! Pulse sequence composition
//!
//! A [`PulseSequence`] is an ordered list of [`SequenceBlock`]s run back to
//! back. The terminal magnetization of each block is the initial state of the
//! next, the bolus queue is threaded through the blocks in order during setup,
//! and the samples of every block are appended to one buffer in traversal order.
//!
//! # Sweep cycle
//!
//! ```text
//! set_params ─► apply(Recompute) ─► run ─► samples ─► soft_reset ─┐
//!     ▲                                                           │
//!     └───────────────────────────────────────────────────────────┘
//! ```
//!
//! [`setup`](PulseSequence::setup) performs every stage once;
//! [`apply`](PulseSequence::apply) repeats only the invalidated ones.
//!
//! # Example
//!
//! ```rust
//! use mrf_rs::models::{GradientEcho, SequenceBlock};
//! use mrf_rs::physics::PhysiologicalParams;
//! use mrf_rs::sequence::PulseSequence;
//!
//! # fn main() -> Result<(), mrf_rs::SimError> {
//! let mut sequence = PulseSequence::new(PhysiologicalParams::default());
//! sequence.add_block(SequenceBlock::labeling(1800.0, 10.0, false)?);
//! sequence.add_block(SequenceBlock::dead_air(1000.0, 10.0)?);
//! sequence.add_block(SequenceBlock::gradient_echo(GradientEcho::default(), 2.5)?);
//!
//! sequence.setup()?;
//! sequence.run()?;
//! assert_eq!(sequence.samples().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod schedule;

pub use schedule::{Schedule, ScheduleConfig, ScheduleRow, SCHEDULE_FILE_NAME};

use nalgebra::Vector3;

use crate::error::SimError;
use crate::models::{BolusQueue, SequenceBlock, SpinPosition};
use crate::physics::{MagnetizationState, PhysicalConstants, PhysiologicalParams};
use crate::solver::validate_state;
use crate::sweep::Recompute;

/// Ordered blocks plus the state of the current run.
#[derive(Clone, Debug)]
pub struct PulseSequence {
    blocks: Vec<SequenceBlock>,
    params: PhysiologicalParams,
    constants: PhysicalConstants,
    position: SpinPosition,
    initial_state: MagnetizationState,

    current_block: usize,
    elapsed: f64,
    state: MagnetizationState,
    samples: Vec<f64>,
}

impl PulseSequence {
    pub fn new(params: PhysiologicalParams) -> Self {
        Self {
            blocks: Vec::new(),
            params,
            constants: PhysicalConstants::default(),
            position: SpinPosition::default(),
            initial_state: MagnetizationState::equilibrium(),
            current_block: 0,
            elapsed: 0.0,
            state: MagnetizationState::equilibrium(),
            samples: Vec::new(),
        }
    }

    pub fn with_constants(mut self, constants: PhysicalConstants) -> Self {
        self.constants = constants;
        self
    }

    pub fn with_position(mut self, position: SpinPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_initial_state(mut self, state: MagnetizationState) -> Self {
        self.initial_state = state;
        self.state = state;
        self
    }

    pub fn add_block(&mut self, block: SequenceBlock) {
        self.blocks.push(block);
    }

    pub fn extend_blocks<I>(&mut self, blocks: I)
    where
        I: IntoIterator<Item = SequenceBlock>,
    {
        self.blocks.extend(blocks);
    }

    /// Replace the parameters used by the next stages and runs.
    ///
    /// Derived rates are taken as they are; nothing is recomputed here.
    pub fn set_params(&mut self, params: PhysiologicalParams) -> Result<(), SimError> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// Change the flip angle of the gradient-echo block at `index`; fields are
    /// rebuilt on the next [`apply`](Self::apply) with `fields` set or on [`setup`](Self::setup).
    pub fn set_flip_angle(&mut self, index: usize, flip_angle: f64, phase: f64) -> Result<(), SimError> {
        let count = self.blocks.len();
        self.blocks
            .get_mut(index)
            .ok_or_else(|| SimError::config(format!("block {index} out of range ({count} blocks)")))?
            .set_flip_angle(flip_angle, phase)
    }

    // ========================================= Setup stages =========================================

    /// Build every trace from scratch: fields, bolus propagation, arterial scale, grids.
    pub fn setup(&mut self) -> Result<(), SimError> {
        self.params.validate()?;
        for block in &mut self.blocks {
            block.regenerate_fields(&self.constants, &self.position)?;
        }
        self.compute_arterial()?;

        log::debug!(
            "sequence set up: {} blocks, {:.1} ms, {} samples",
            self.blocks.len(),
            self.total_duration(),
            self.sample_count()
        );
        Ok(())
    }

    /// Rebuild the field of every block (after a flip-angle change).
    pub fn regenerate_fields(&mut self) -> Result<(), SimError> {
        for block in &mut self.blocks {
            block.regenerate_fields(&self.constants, &self.position)?;
            block.rebuild_grid();
        }
        Ok(())
    }

    /// Re-run bolus propagation through every block and rescale.
    ///
    /// # Errors
    ///
    /// A labeled bolus whose window cannot be represented at the current arrival time.
    pub fn compute_arterial(&mut self) -> Result<(), SimError> {
        let amplitude = self.params.arterial_amplitude();
        let mut queue = BolusQueue::new();
        for block in &mut self.blocks {
            block.propagate_bolus(&mut queue, &self.params)?;
            block.scale_arterial(amplitude);
            block.rebuild_grid();
        }
        if !queue.is_empty() {
            log::debug!("{} bolus window(s) still pending after the last block", queue.len());
        }
        Ok(())
    }

    /// Rescale the existing activation shapes to the current amplitude.
    pub fn rescale_arterial(&mut self) {
        let amplitude = self.params.arterial_amplitude();
        for block in &mut self.blocks {
            block.scale_arterial(amplitude);
        }
    }

    /// Redo the stages a parameter change invalidated.
    pub fn apply(&mut self, recompute: &Recompute) -> Result<(), SimError> {
        if recompute.fields {
            self.regenerate_fields()?;
        }
        if recompute.arterial_shape {
            self.compute_arterial()?;
        } else if recompute.rescale_arterial {
            self.rescale_arterial();
        }
        Ok(())
    }

    // =========================================== Running ============================================

    /// Run every remaining block.
    pub fn run(&mut self) -> Result<(), SimError> {
        while self.run_one()? {}
        Ok(())
    }

    /// Run the next block. Returns `false` once every block has run.
    pub fn run_one(&mut self) -> Result<bool, SimError> {
        let index = self.current_block;
        let Some(block) = self.blocks.get_mut(index) else {
            return Ok(false);
        };

        let end = block.run(self.state, &self.params, &self.constants);
        validate_state(&end, index)?;

        self.samples.extend(block.samples(self.params.cbv()));
        self.elapsed += block.duration();
        self.state = end;
        self.current_block += 1;
        Ok(true)
    }

    /// Back to the first block with the initial state and an empty sample
    /// buffer; block definitions and traces are kept.
    pub fn soft_reset(&mut self) {
        self.current_block = 0;
        self.elapsed = 0.0;
        self.state = self.initial_state;
        self.samples.clear();
    }

    /// Remove every block and reset.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.soft_reset();
    }

    // ========================================= Observation ==========================================

    pub fn blocks(&self) -> &[SequenceBlock] {
        &self.blocks
    }

    pub fn params(&self) -> &PhysiologicalParams {
        &self.params
    }

    pub fn constants(&self) -> &PhysicalConstants {
        &self.constants
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Number of samples one full run produces.
    pub fn sample_count(&self) -> usize {
        self.blocks.iter().map(|b| b.sample_indices().len()).sum()
    }

    /// Absolute sample times (ms) in buffer order.
    pub fn sample_times(&self) -> Vec<f64> {
        self.with_offsets()
            .flat_map(|(offset, block)| block.sample_times().into_iter().map(move |t| t + offset))
            .collect()
    }

    pub fn total_duration(&self) -> f64 {
        self.blocks.iter().map(SequenceBlock::duration).sum()
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn current_block(&self) -> usize {
        self.current_block
    }

    pub fn is_finished(&self) -> bool {
        self.current_block >= self.blocks.len()
    }

    /// Carried-forward magnetization.
    pub fn state(&self) -> &MagnetizationState {
        &self.state
    }

    /// Absolute time of every grid point, all blocks concatenated.
    pub fn times(&self) -> Vec<f64> {
        self.with_offsets()
            .flat_map(|(offset, block)| block.grid().times().into_iter().map(move |t| t + offset))
            .collect()
    }

    /// Field at every grid point.
    pub fn field_trace(&self) -> Vec<Vector3<f64>> {
        self.blocks
            .iter()
            .flat_map(|block| {
                let grid = block.grid();
                (0..grid.len()).map(move |k| block.field()[grid.base_index(k)])
            })
            .collect()
    }

    /// Arterial input at every grid point.
    pub fn arterial_trace(&self) -> Vec<f64> {
        self.blocks
            .iter()
            .flat_map(|block| {
                let grid = block.grid();
                (0..grid.len()).map(move |k| block.arterial()[grid.base_index(k)])
            })
            .collect()
    }

    /// Magnetization at every grid point of the blocks run so far.
    pub fn magnetization_trace(&self) -> Vec<MagnetizationState> {
        self.blocks
            .iter()
            .flat_map(|block| block.magnetization().iter().copied())
            .collect()
    }

    fn with_offsets(&self) -> impl Iterator<Item = (f64, &SequenceBlock)> {
        self.blocks.iter().scan(0.0, |offset, block| {
            let start = *offset;
            *offset += block.duration();
            Some((start, block))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn short_sequence() -> PulseSequence {
        let mut sequence = PulseSequence::new(PhysiologicalParams::default());
        sequence.add_block(SequenceBlock::labeling(100.0, 1.0, false).unwrap());
        sequence.add_block(
            SequenceBlock::dead_air(50.0, 1.0)
                .unwrap()
                .with_samples(&[10.0, 20.0])
                .unwrap(),
        );
        sequence
    }

    #[test]
    fn test_elapsed_equals_total_duration() {
        let mut sequence = short_sequence();
        sequence.setup().unwrap();
        sequence.run().unwrap();

        assert!(sequence.is_finished());
        assert_relative_eq!(sequence.elapsed(), 150.0);
        assert_relative_eq!(sequence.total_duration(), 150.0);
        assert_eq!(sequence.samples().len(), 2);
        assert_eq!(sequence.sample_times(), vec![110.0, 120.0]);
    }

    #[test]
    fn test_soft_reset_reproduces_run() {
        let mut sequence = short_sequence();
        sequence.setup().unwrap();
        sequence.run().unwrap();
        let first = sequence.samples().to_vec();

        sequence.soft_reset();
        assert_eq!(sequence.current_block(), 0);
        assert!(sequence.samples().is_empty());
        assert_eq!(*sequence.state(), MagnetizationState::equilibrium());

        sequence.run().unwrap();
        assert_eq!(sequence.samples(), first.as_slice());
    }

    #[test]
    fn test_run_one_steps_through_blocks() {
        let mut sequence = short_sequence();
        sequence.setup().unwrap();
        assert!(sequence.run_one().unwrap());
        assert_eq!(sequence.current_block(), 1);
        assert_relative_eq!(sequence.elapsed(), 100.0);
        assert!(sequence.run_one().unwrap());
        assert!(!sequence.run_one().unwrap());
    }

    #[test]
    fn test_traces_are_concatenated() {
        let mut sequence = short_sequence();
        sequence.setup().unwrap();
        sequence.run().unwrap();

        let times = sequence.times();
        assert_eq!(times.len(), 150);
        assert_eq!(sequence.field_trace().len(), 150);
        assert_eq!(sequence.arterial_trace().len(), 150);
        assert_eq!(sequence.magnetization_trace().len(), 150);
        assert_relative_eq!(times[100], 100.0);
    }

    #[test]
    fn test_degenerate_params_are_rejected() {
        let mut sequence = short_sequence();
        let bad = PhysiologicalParams::default().with_relaxation(0.0, 80.0, 1000.0);
        assert!(sequence.set_params(bad).is_err());
    }

    #[test]
    fn test_set_flip_angle_checks_index() {
        let mut sequence = short_sequence();
        assert!(sequence.set_flip_angle(5, 10.0, 0.0).is_err());
        assert!(sequence.set_flip_angle(0, 10.0, 0.0).is_err());
    }
}
