//! Helper functions for integration tests

use mrf_rs::models::{GradientEcho, SequenceBlock};
use mrf_rs::physics::{MagnetizationState, ParameterAxis, PhysiologicalParams};
use mrf_rs::sequence::PulseSequence;
use mrf_rs::solver::CompressionConfig;
use mrf_rs::sweep::SweepGrid;

/// Assert that two magnetization states agree component-wise.
pub fn assert_states_close(
    actual: &MagnetizationState,
    expected: &MagnetizationState,
    tolerance: f64,
    message: &str,
) {
    for i in 0..4 {
        let diff = (actual[i] - expected[i]).abs();
        assert!(
            diff < tolerance,
            "{}: component {} differs by {} (tolerance {}): {} vs {}",
            message, i, diff, tolerance, actual, expected
        );
    }
}

/// Compute relative error: |actual - expected| / |expected|
pub fn relative_error(actual: f64, expected: f64) -> f64 {
    if expected.abs() < 1e-10 {
        (actual - expected).abs()
    } else {
        (actual - expected).abs() / expected.abs()
    }
}

/// Label, delay, short gradient-echo readout.
pub fn small_sequence(compression: Option<CompressionConfig>) -> PulseSequence {
    let compression = compression.unwrap_or_default();
    let readout = GradientEcho {
        echo_train_length: 3,
        ..Default::default()
    };

    let mut sequence = PulseSequence::new(PhysiologicalParams::default());
    sequence.extend_blocks([
        SequenceBlock::labeling(300.0, 5.0, false).unwrap().with_compression(compression),
        SequenceBlock::dead_air(200.0, 5.0).unwrap().with_compression(compression),
        SequenceBlock::gradient_echo(readout.clone(), 2.5).unwrap().with_compression(compression),
        SequenceBlock::labeling(300.0, 5.0, true).unwrap().with_compression(compression),
        SequenceBlock::dead_air(200.0, 5.0).unwrap().with_compression(compression),
        SequenceBlock::gradient_echo(readout, 2.5).unwrap().with_compression(compression),
    ]);
    sequence
}

/// 2 CBV × 2 flow × 2 BAT values around the defaults.
pub fn sweep_grid() -> SweepGrid {
    SweepGrid::single(&PhysiologicalParams::default())
        .with_axis(ParameterAxis::Cbv, vec![0.0, 0.05])
        .with_axis(ParameterAxis::Flow, vec![1e-5, 2e-5])
        .with_axis(ParameterAxis::ArrivalTime, vec![150.0, 400.0])
}
