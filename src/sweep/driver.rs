//! Dictionary generation driver
//!
//! Runs a [`PulseSequence`] once per parameter combination, in odometer order,
//! and hands every sample vector to a [`DictionaryStore`]. Between
//! combinations only the stages invalidated by the moved axis are redone.
//!
//! Generation resumes from the store's progress index: combinations up to and
//! including it are skipped. Any configuration error halts generation, since
//! skipping a combination would break the index-to-parameter mapping.

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::output::store::DictionaryStore;
use crate::sequence::PulseSequence;
use crate::sweep::ParameterSweep;

#[cfg(feature = "parallel")]
use crate::{
    output::store::StoreError,
    physics::{ParameterAxis, PhysiologicalParams},
    sweep::{IndexTuple, SweepGrid},
};

/// Driver settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Combinations between store flushes and progress messages.
    pub checkpoint_interval: usize,
    /// Continue from the store's progress index when it has one.
    pub resume: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 1000,
            resume: true,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.checkpoint_interval == 0 {
            return Err(SimError::config("checkpoint interval must be at least 1"));
        }
        Ok(())
    }
}

/// What a generation call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub total: usize,
    pub simulated: usize,
    /// Combinations already present from an earlier run.
    pub skipped: usize,
}

/// Fills a dictionary store from a sequence and a sweep.
#[derive(Clone, Debug, Default)]
pub struct DictionaryGenerator {
    config: GeneratorConfig,
}

impl DictionaryGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Simulate every remaining combination of `sweep` into `store`.
    ///
    /// # Errors
    ///
    /// Invalid configuration, a block setup failure, non-finite magnetization or
    /// a store failure. Entries written before the error stay in the store.
    pub fn generate<S>(
        &self,
        sequence: &mut PulseSequence,
        sweep: &mut ParameterSweep,
        store: &mut S,
    ) -> Result<GenerationReport, SimError>
    where
        S: DictionaryStore + ?Sized,
    {
        self.config.validate()?;
        let total = sweep.total();

        store.init(sweep.shape(), sequence.sample_count())?;
        store.record_axes(sweep.grid())?;

        let mut skipped = 0;
        if self.config.resume && let Some(last) = store.progress() {
            sweep.seek(last)?;
            skipped = sweep.linear_index() + 1;
            if sweep.advance().is_none() {
                log::warn!("dictionary already holds all {total} combinations, nothing to do");
                return Ok(GenerationReport { total, simulated: 0, skipped });
            }
            log::info!("resuming after combination {skipped}/{total}");
        }

        log::info!(
            "generating {} combinations of {} samples",
            total - skipped,
            sequence.sample_count()
        );

        sequence.set_params(sweep.params().clone())?;
        sequence.soft_reset();
        sequence.setup()?;

        let simulated = run_sweep(
            sequence,
            sweep,
            store,
            self.config.checkpoint_interval,
            Progress { total, offset: skipped },
        )?;
        store.flush()?;

        log::info!("dictionary complete: {simulated} simulated, {skipped} resumed");
        Ok(GenerationReport { total, simulated, skipped })
    }

    /// Parallel variant: the grid is partitioned by BAT index, each worker runs
    /// its own copy of the sequence, and entries are written into `store` from
    /// the calling thread. Always starts from scratch.
    #[cfg(feature = "parallel")]
    pub fn generate_parallel<S>(
        &self,
        sequence: &PulseSequence,
        grid: &SweepGrid,
        base: &PhysiologicalParams,
        store: &mut S,
    ) -> Result<GenerationReport, SimError>
    where
        S: DictionaryStore + ?Sized,
    {
        use rayon::prelude::*;

        self.config.validate()?;
        grid.validate()?;
        let total = grid.combinations();
        let bat_axis = ParameterAxis::ArrivalTime.position();

        store.init(grid.shape(), sequence.sample_count())?;
        store.record_axes(grid)?;

        let partitions = (0..grid.arrival_time.len())
            .into_par_iter()
            .map(|bat| -> Result<Vec<(IndexTuple, Vec<f64>)>, SimError> {
                let mut local = sequence.clone();
                let mut sweep = ParameterSweep::new(grid.restrict(ParameterAxis::ArrivalTime, bat)?, base.clone())?;
                let mut buffer = EntryBuffer::default();

                local.set_params(sweep.params().clone())?;
                local.soft_reset();
                local.setup()?;
                run_sweep(
                    &mut local,
                    &mut sweep,
                    &mut buffer,
                    usize::MAX,
                    Progress { total, offset: 0 },
                )?;

                log::debug!("BAT partition {bat} done ({} entries)", buffer.entries.len());
                Ok(buffer
                    .entries
                    .into_iter()
                    .map(|(mut index, samples)| {
                        index[bat_axis] = bat;
                        (index, samples)
                    })
                    .collect::<Vec<_>>())
            })
            .collect::<Result<Vec<_>, SimError>>()?;

        let mut simulated = 0;
        for (index, samples) in partitions.into_iter().flatten() {
            store.store_entry(index, &samples)?;
            simulated += 1;
            if simulated % self.config.checkpoint_interval == 0 {
                store.flush()?;
                Progress { total, offset: 0 }.report(simulated);
            }
        }
        store.flush()?;

        log::info!("dictionary complete: {simulated} simulated on {} partitions", grid.arrival_time.len());
        Ok(GenerationReport { total, simulated, skipped: 0 })
    }
}

#[derive(Clone, Copy)]
struct Progress {
    total: usize,
    offset: usize,
}

impl Progress {
    fn report(&self, simulated: usize) {
        let done = self.offset + simulated;
        log::info!(
            "{done}/{} combinations ({:.1}%)",
            self.total,
            100.0 * done as f64 / self.total as f64
        );
    }
}

/// Simulate from the sweep's current combination until it is exhausted.
fn run_sweep<S>(
    sequence: &mut PulseSequence,
    sweep: &mut ParameterSweep,
    store: &mut S,
    checkpoint_interval: usize,
    progress: Progress,
) -> Result<usize, SimError>
where
    S: DictionaryStore + ?Sized,
{
    let mut simulated = 0;
    loop {
        sequence.run()?;
        store.store_entry(sweep.indices(), sequence.samples())?;
        sequence.soft_reset();
        simulated += 1;

        if simulated % checkpoint_interval == 0 {
            store.flush()?;
            progress.report(simulated);
        }

        let Some(recompute) = sweep.advance() else {
            break;
        };
        sequence.set_params(sweep.params().clone())?;
        sequence.apply(&recompute)?;
    }
    Ok(simulated)
}

/// Per-worker collector used by the parallel driver.
#[cfg(feature = "parallel")]
#[derive(Default)]
struct EntryBuffer {
    entries: Vec<(IndexTuple, Vec<f64>)>,
}

#[cfg(feature = "parallel")]
impl DictionaryStore for EntryBuffer {
    fn init(&mut self, _shape: IndexTuple, _sample_length: usize) -> Result<(), StoreError> {
        Ok(())
    }

    fn store_entry(&mut self, index: IndexTuple, samples: &[f64]) -> Result<(), StoreError> {
        self.entries.push((index, samples.to_vec()));
        Ok(())
    }

    fn progress(&self) -> Option<IndexTuple> {
        self.entries.last().map(|(index, _)| *index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GradientEcho, SequenceBlock};
    use crate::output::store::MemoryStore;
    use crate::physics::{ParameterAxis, PhysiologicalParams};
    use crate::sweep::SweepGrid;

    fn small_sequence() -> PulseSequence {
        let mut sequence = PulseSequence::new(PhysiologicalParams::default());
        sequence.add_block(SequenceBlock::labeling(200.0, 10.0, false).unwrap());
        sequence.add_block(SequenceBlock::dead_air(100.0, 10.0).unwrap());
        sequence.add_block(
            SequenceBlock::gradient_echo(
                GradientEcho {
                    echo_train_length: 2,
                    ..Default::default()
                },
                2.5,
            )
            .unwrap(),
        );
        sequence
    }

    fn small_grid() -> SweepGrid {
        SweepGrid::single(&PhysiologicalParams::default())
            .with_axis(ParameterAxis::Cbv, vec![0.0, 0.05])
            .with_axis(ParameterAxis::ArrivalTime, vec![100.0, 250.0])
    }

    #[test]
    fn test_generate_fills_every_entry() {
        let mut sequence = small_sequence();
        let mut sweep = ParameterSweep::new(small_grid(), PhysiologicalParams::default()).unwrap();
        let mut store = MemoryStore::new();

        let report = DictionaryGenerator::default()
            .generate(&mut sequence, &mut sweep, &mut store)
            .unwrap();

        assert_eq!(report, GenerationReport { total: 4, simulated: 4, skipped: 0 });
        assert_eq!(store.written(), 4);
        let mut last = [0; 9];
        last[0] = 1;
        last[8] = 1;
        assert_eq!(store.progress(), Some(last));
    }

    #[test]
    fn test_completed_store_is_skipped() {
        let mut sequence = small_sequence();
        let mut store = MemoryStore::new();
        let generator = DictionaryGenerator::default();

        let mut sweep = ParameterSweep::new(small_grid(), PhysiologicalParams::default()).unwrap();
        generator.generate(&mut sequence, &mut sweep, &mut store).unwrap();

        let mut sweep = ParameterSweep::new(small_grid(), PhysiologicalParams::default()).unwrap();
        let report = generator.generate(&mut sequence, &mut sweep, &mut store).unwrap();
        assert_eq!(report.simulated, 0);
        assert_eq!(report.skipped, 4);
    }

    #[test]
    fn test_zero_checkpoint_interval_is_rejected() {
        let generator = DictionaryGenerator::new(GeneratorConfig {
            checkpoint_interval: 0,
            resume: false,
        });
        let mut sweep = ParameterSweep::new(small_grid(), PhysiologicalParams::default()).unwrap();
        let result = generator.generate(&mut small_sequence(), &mut sweep, &mut MemoryStore::new());
        assert!(result.is_err());
    }
}
