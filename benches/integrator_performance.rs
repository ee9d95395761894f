//! Performance benchmarks for the exchange integrator
//!
//! Compares uniform and event-compressed integration of the same sequence,
//! and the cost of one dictionary entry under the sweep cascade.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench --bench integrator_performance
//!
//! # Only the grid comparison
//! cargo bench --bench integrator_performance grid
//! ```
//!
//! # Expected Results
//!
//! Sequences dominated by delays should gain roughly the ratio of uniform to
//! compressed grid points; readout-heavy sequences gain little, since every
//! pulse sample is kept.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use mrf_rs::models::{GradientEcho, SequenceBlock};
use mrf_rs::physics::{MagnetizationState, ParameterAxis, PhysicalConstants, PhysiologicalParams};
use mrf_rs::sequence::PulseSequence;
use mrf_rs::solver::{CompressionConfig, ExchangeIntegrator};
use mrf_rs::sweep::{ParameterSweep, SweepGrid};

// =================================================================================================
// Sequences
// =================================================================================================

/// `repetitions` × (label, long delay, GRE readout).
fn build_sequence(repetitions: usize, compression: CompressionConfig) -> PulseSequence {
    let mut sequence = PulseSequence::new(PhysiologicalParams::default());
    for _ in 0..repetitions {
        sequence.extend_blocks([
            SequenceBlock::labeling(1500.0, 1.0, false).unwrap().with_compression(compression),
            SequenceBlock::dead_air(1000.0, 1.0).unwrap().with_compression(compression),
            SequenceBlock::gradient_echo(GradientEcho::default(), 0.5)
                .unwrap()
                .with_compression(compression),
        ]);
    }
    sequence.setup().unwrap();
    sequence
}

// =================================================================================================
// Benchmark Functions
// =================================================================================================

fn benchmark_single_step(c: &mut Criterion) {
    let params = PhysiologicalParams::default();
    let constants = PhysicalConstants::default();
    let integrator = ExchangeIntegrator::new(&params, &constants, 0.5, 1.0, 0.0);
    let field = nalgebra::Vector3::new(1e-6, 0.0, 0.0);

    c.bench_function("exchange step", |b| {
        b.iter(|| {
            integrator.step(
                black_box(MagnetizationState::equilibrium()),
                black_box(&field),
                black_box(-1e-5),
            )
        })
    });
}

/// Same sequence on the uniform and on the compressed grid.
fn benchmark_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid");
    group.sample_size(20);

    for repetitions in [1, 4] {
        for (name, compression) in [
            ("uniform", CompressionConfig::default()),
            ("compressed", CompressionConfig::enabled()),
        ] {
            let mut sequence = build_sequence(repetitions, compression);
            group.bench_with_input(BenchmarkId::new(name, repetitions), &repetitions, |b, _| {
                b.iter(|| {
                    sequence.soft_reset();
                    sequence.run().unwrap();
                    black_box(sequence.samples().len())
                })
            });
        }
    }

    group.finish();
}

/// One dictionary entry after a CBV step, which needs no recompute.
fn benchmark_cascade_entry(c: &mut Criterion) {
    let grid = SweepGrid::single(&PhysiologicalParams::default())
        .with_axis(ParameterAxis::Cbv, (0..1000).map(|i| i as f64 * 1e-4).collect());

    c.bench_function("cascade entry (cbv step)", |b| {
        let mut sequence = build_sequence(2, CompressionConfig::enabled());
        let mut sweep = ParameterSweep::new(grid.clone(), PhysiologicalParams::default()).unwrap();

        b.iter(|| {
            let recompute = match sweep.advance() {
                Some(recompute) => recompute,
                None => {
                    sweep = ParameterSweep::new(grid.clone(), PhysiologicalParams::default()).unwrap();
                    sweep.advance().unwrap()
                }
            };
            sequence.set_params(sweep.params().clone()).unwrap();
            sequence.apply(&recompute).unwrap();
            sequence.soft_reset();
            sequence.run().unwrap();
            black_box(sequence.samples()[0])
        })
    });
}

criterion_group!(benches, benchmark_single_step, benchmark_grid, benchmark_cascade_entry);
criterion_main!(benches);
