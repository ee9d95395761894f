//! Example: dictionary generation with checkpoint/resume
//!
//! Sweeps CBV, T1, flow and bolus arrival time over a short label/readout
//! sequence and stores the result as a JSON snapshot. Interrupt it and run it
//! again: generation continues after the last stored entry.
//!
//! ```bash
//! RUST_LOG=info cargo run --example dictionary -- /tmp/dictionary.json
//! ```

use std::time::Instant;

use mrf_rs::{
    models::{GradientEcho, SequenceBlock},
    output::JsonStore,
    physics::{ParameterAxis, PhysiologicalParams},
    sequence::PulseSequence,
    solver::CompressionConfig,
    sweep::{DictionaryGenerator, GeneratorConfig, ParameterSweep, SweepGrid},
};

fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| start + (stop - start) * i as f64 / (n - 1).max(1) as f64)
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("═══════════════════════════════════════════════════════");
    println!("  MRF-ASL dictionary generation");
    println!("═══════════════════════════════════════════════════════\n");

    let path = std::env::args()
        .nth(1)
        .map(Into::into)
        .unwrap_or_else(|| std::env::temp_dir().join("mrf_dictionary.json"));

    // ====== Sequence ======

    let compression = CompressionConfig::enabled();
    let readout = GradientEcho {
        echo_train_length: 10,
        ..Default::default()
    };
    let mut sequence = PulseSequence::new(PhysiologicalParams::default());
    for (label_ms, control) in [(1500.0, false), (1500.0, true), (1000.0, false), (1000.0, true)] {
        sequence.extend_blocks([
            SequenceBlock::labeling(label_ms, 10.0, control)?.with_compression(compression),
            SequenceBlock::dead_air(500.0, 10.0)?.with_compression(compression),
            SequenceBlock::gradient_echo(readout.clone(), 2.5)?.with_compression(compression),
        ]);
    }

    // ====== Grid ======

    let base = PhysiologicalParams::default();
    let grid = SweepGrid::single(&base)
        .with_axis(ParameterAxis::Cbv, linspace(0.0, 0.05, 6))
        .with_axis(ParameterAxis::T1Free, linspace(800.0, 2000.0, 5))
        .with_axis(ParameterAxis::Flow, linspace(0.5e-5, 2e-5, 4))
        .with_axis(ParameterAxis::ArrivalTime, linspace(500.0, 2500.0, 5));

    println!("Sequence: {} blocks, {:.0} ms, {} samples", sequence.blocks().len(), sequence.total_duration(), sequence.sample_count());
    println!("Grid    : {:?} = {} combinations", grid.shape(), grid.combinations());
    println!("Store   : {}\n", path.display());

    // ====== Generate ======

    let mut sweep = ParameterSweep::new(grid, base)?;
    let mut store = JsonStore::open(&path)?;
    let generator = DictionaryGenerator::new(GeneratorConfig {
        checkpoint_interval: 100,
        ..Default::default()
    });

    let start = Instant::now();
    let report = generator.generate(&mut sequence, &mut sweep, &mut store)?;
    let elapsed = start.elapsed();

    println!("Simulated : {}", report.simulated);
    println!("Resumed   : {}", report.skipped);
    println!("Total     : {}", report.total);
    println!("Time      : {:?}", elapsed);
    if report.simulated > 0 {
        println!("Per entry : {:?}", elapsed / report.simulated as u32);
    }

    Ok(())
}
