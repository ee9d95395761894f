//! Sequence blocks
//!
//! A [`SequenceBlock`] is one physically contiguous segment of the sequence:
//! a labeling train, dead time, a readout, a preparation pulse or an arbitrary
//! user waveform. The variant-specific behaviour lives in [`BlockKind`] and is
//! dispatched from a single field-generation function; everything else (the
//! uniform grid, sample/crusher bookkeeping, arterial input, compression and
//! integration) is shared.
//!
//! # Lifecycle
//!
//! ```text
//! construct (zero traces, samples/crushers validated)
//!     │
//!     ├── regenerate_fields   RF from the kind + optional gradient term
//!     ├── propagate_bolus     activation indicator from the bolus queue
//!     ├── scale_arterial      s(t) = amplitude · activation (+ custom baseline)
//!     ├── rebuild_grid        uniform or event-compressed
//!     │
//!     └── run                 magnetization trace, terminal state returned
//! ```
//!
//! Between sweep iterations only the stages invalidated by the changed
//! parameter are repeated.
//!
//! # Example
//!
//! ```rust
//! use mrf_rs::models::SequenceBlock;
//!
//! let block = SequenceBlock::dead_air(100.0, 0.5)
//!     .unwrap()
//!     .with_samples(&[25.0, 99.9])
//!     .unwrap();
//! assert_eq!(block.len(), 200);
//! assert_eq!(block.sample_indices(), &[50, 199]);
//! ```

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::models::bolus::BolusQueue;
use crate::models::prep::PrepPulse;
use crate::models::readout::{GradientEcho, SpinEcho};
use crate::physics::{MagnetizationState, PhysicalConstants, PhysiologicalParams};
use crate::solver::{CompressionConfig, ExchangeIntegrator, TimeGrid};

/// Semisolid absorption of pulses played on resonance inside the tissue.
pub const ON_RESONANCE_ABSORPTION: f64 = 1.0;

/// Semisolid absorption during the (off-resonance) labeling train.
pub const LABELING_ABSORPTION: f64 = 0.25;

/// Forced semisolid saturation constant of the labeling train.
pub const LABELING_SATURATION: f64 = 1000.0;

// Guards floor(t/dt) against t/dt landing just below an integer.
const INDEX_EPSILON: f64 = 1e-9;

// =================================================================================================
// Spin position
// =================================================================================================

/// Position of the simulated isochromat for the gradient term (cm, cm/ms).
///
/// The longitudinal field picks up `x·Gx + y·Gy + z(t)·Gz` with
/// `z(t) = z + velocity·t`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpinPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub velocity: f64,
}

// =================================================================================================
// Block kinds
// =================================================================================================

/// Readout families.
#[derive(Clone, Debug, PartialEq)]
pub enum Readout {
    GradientEcho(GradientEcho),
    SpinEcho(SpinEcho),
}

/// What a block plays.
#[derive(Clone, Debug, PartialEq)]
pub enum BlockKind {
    /// pCASL labeling train. Not simulated pulse by pulse: the free pool sees no
    /// field and the semisolid pool is force-saturated. Label mode queues a bolus.
    Labeling { control: bool },

    /// Nothing played.
    DeadAir,

    Readout(Readout),

    /// Closed-form preparation pulse.
    Prep(PrepPulse),

    /// User-supplied field and arterial traces.
    Custom {
        field: Vec<Vector3<f64>>,
        arterial: Vec<f64>,
    },
}

impl BlockKind {
    pub fn absorption(&self) -> f64 {
        match self {
            BlockKind::Labeling { .. } => LABELING_ABSORPTION,
            _ => ON_RESONANCE_ABSORPTION,
        }
    }

    pub fn saturation(&self) -> f64 {
        match self {
            BlockKind::Labeling { .. } => LABELING_SATURATION,
            _ => 0.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Labeling { control: false } => "label",
            BlockKind::Labeling { control: true } => "control",
            BlockKind::DeadAir => "dead air",
            BlockKind::Readout(Readout::GradientEcho(_)) => "gradient echo",
            BlockKind::Readout(Readout::SpinEcho(_)) => "spin echo",
            BlockKind::Prep(_) => "preparation",
            BlockKind::Custom { .. } => "custom",
        }
    }

    /// RF field trace for a grid of `len` samples.
    pub fn generate_rf(
        &self,
        len: usize,
        dt: f64,
        constants: &PhysicalConstants,
    ) -> Result<Vec<Vector3<f64>>, SimError> {
        match self {
            BlockKind::Labeling { .. } | BlockKind::DeadAir | BlockKind::Prep(_) => {
                Ok(vec![Vector3::zeros(); len])
            }
            BlockKind::Readout(Readout::GradientEcho(gre)) => gre.pulse_train(len, dt, constants),
            BlockKind::Readout(Readout::SpinEcho(fse)) => fse.pulse_train(len, dt, constants),
            BlockKind::Custom { field, .. } => Ok(field.clone()),
        }
    }
}

// =================================================================================================
// Sequence block
// =================================================================================================

/// One segment of a pulse sequence with its own timestep and traces.
#[derive(Clone, Debug)]
pub struct SequenceBlock {
    kind: BlockKind,
    duration: f64,
    dt: f64,
    len: usize,

    field: Vec<Vector3<f64>>,
    gradient: Option<Vec<Vector3<f64>>>,
    activation: Vec<f64>,
    arterial: Vec<f64>,

    sample_indices: Vec<usize>,
    crusher_indices: Vec<usize>,

    compression: CompressionConfig,
    grid: TimeGrid,
    magnetization: Vec<MagnetizationState>,
}

impl SequenceBlock {
    /// Block of a given kind with zero-filled traces.
    ///
    /// # Errors
    ///
    /// Non-positive or non-finite duration or timestep.
    pub fn new(kind: BlockKind, duration: f64, dt: f64) -> Result<Self, SimError> {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(SimError::config(format!(
                "{} block duration must be positive, got {duration} ms",
                kind.name()
            )));
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SimError::config(format!("timestep must be positive, got {dt} ms")));
        }

        let len = ((duration / dt).ceil() as usize).max(1);
        Ok(Self {
            kind,
            duration,
            dt,
            len,
            field: vec![Vector3::zeros(); len],
            gradient: None,
            activation: vec![0.0; len],
            arterial: vec![0.0; len],
            sample_indices: Vec::new(),
            crusher_indices: Vec::new(),
            compression: CompressionConfig::default(),
            grid: TimeGrid::uniform(dt, len),
            magnetization: Vec::new(),
        })
    }

    pub fn labeling(duration: f64, dt: f64, control: bool) -> Result<Self, SimError> {
        Self::new(BlockKind::Labeling { control }, duration, dt)
    }

    pub fn dead_air(duration: f64, dt: f64) -> Result<Self, SimError> {
        Self::new(BlockKind::DeadAir, duration, dt)
    }

    /// Gradient-echo train, sampled right after its first pulse.
    pub fn gradient_echo(readout: GradientEcho, dt: f64) -> Result<Self, SimError> {
        readout.validate()?;
        let duration = readout.duration();
        let sample = readout.sample_time(dt);
        Self::new(BlockKind::Readout(Readout::GradientEcho(readout)), duration, dt)?
            .with_samples(&[sample])
    }

    /// Spin-echo train, sampled at the first echo.
    pub fn spin_echo(readout: SpinEcho, dt: f64) -> Result<Self, SimError> {
        readout.validate()?;
        let duration = readout.duration;
        let sample = readout.sample_time();
        Self::new(BlockKind::Readout(Readout::SpinEcho(readout)), duration, dt)?
            .with_samples(&[sample])
    }

    /// Preparation pulse on its own raster.
    pub fn prep(pulse: PrepPulse) -> Result<Self, SimError> {
        Self::new(BlockKind::Prep(pulse), pulse.duration(), pulse.dt())
    }

    /// Arbitrary field and arterial traces; the block lasts `len·dt`.
    ///
    /// # Errors
    ///
    /// Empty traces or traces of different lengths.
    pub fn custom(field: Vec<Vector3<f64>>, arterial: Vec<f64>, dt: f64) -> Result<Self, SimError> {
        if field.len() != arterial.len() {
            return Err(SimError::TraceLengthMismatch {
                what: "custom arterial trace",
                expected: field.len(),
                actual: arterial.len(),
            });
        }
        if field.is_empty() {
            return Err(SimError::config("custom block needs at least one sample"));
        }

        let duration = field.len() as f64 * dt;
        Self::new(BlockKind::Custom { field, arterial }, duration, dt)
    }

    // =========================================== Builders ===========================================

    /// Declare sample times (block-local ms).
    ///
    /// # Errors
    ///
    /// A time outside `[0, T)`.
    pub fn with_samples(mut self, times: &[f64]) -> Result<Self, SimError> {
        for &time in times {
            if !(0.0..self.duration).contains(&time) {
                return Err(SimError::SampleOutOfRange { time, duration: self.duration });
            }
            self.sample_indices.push(self.index_at(time));
        }
        self.sample_indices.sort_unstable();
        Ok(self)
    }

    /// Declare crusher times (block-local ms).
    ///
    /// # Errors
    ///
    /// A time outside `[0, T)`.
    pub fn with_crushers(mut self, times: &[f64]) -> Result<Self, SimError> {
        for &time in times {
            if !(0.0..self.duration).contains(&time) {
                return Err(SimError::CrusherOutOfRange { time, duration: self.duration });
            }
            self.crusher_indices.push(self.index_at(time));
        }
        self.crusher_indices.sort_unstable();
        self.crusher_indices.dedup();
        Ok(self)
    }

    pub fn with_compression(mut self, config: CompressionConfig) -> Self {
        self.compression = config;
        self
    }

    /// Attach a gradient waveform (T/cm per sample).
    pub fn with_gradient(mut self, waveform: Vec<Vector3<f64>>) -> Result<Self, SimError> {
        if waveform.len() != self.len {
            return Err(SimError::TraceLengthMismatch {
                what: "gradient waveform",
                expected: self.len,
                actual: waveform.len(),
            });
        }
        self.gradient = Some(waveform);
        Ok(self)
    }

    /// Change the flip angle (and phase) of a gradient-echo block.
    ///
    /// The field is not rebuilt here; call [`regenerate_fields`](Self::regenerate_fields).
    pub fn set_flip_angle(&mut self, flip_angle: f64, phase: f64) -> Result<(), SimError> {
        match &mut self.kind {
            BlockKind::Readout(Readout::GradientEcho(gre)) => {
                gre.flip_angle = flip_angle;
                gre.phase = phase;
                Ok(())
            }
            other => Err(SimError::config(format!(
                "flip angle can only be changed on gradient-echo blocks, not {}",
                other.name()
            ))),
        }
    }

    // ========================================= Setup stages =========================================

    /// Rebuild the field from the kind's RF plus the gradient term.
    pub fn regenerate_fields(
        &mut self,
        constants: &PhysicalConstants,
        position: &SpinPosition,
    ) -> Result<(), SimError> {
        let mut field = self.kind.generate_rf(self.len, self.dt, constants)?;
        if field.len() != self.len {
            return Err(SimError::TraceLengthMismatch {
                what: "generated field",
                expected: self.len,
                actual: field.len(),
            });
        }

        if let Some(gradient) = &self.gradient {
            for (i, (b, g)) in field.iter_mut().zip(gradient).enumerate() {
                let z = position.z + position.velocity * i as f64 * self.dt;
                b.z += position.x * g.x + position.y * g.y + z * g.z;
            }
        }

        self.field = field;
        Ok(())
    }

    /// Consume the bolus queue for this block and store the activation indicator.
    ///
    /// # Errors
    ///
    /// A bolus window that cannot be represented (see [`BolusWindow::new`]).
    pub fn propagate_bolus(
        &mut self,
        queue: &mut BolusQueue,
        params: &PhysiologicalParams,
    ) -> Result<(), SimError> {
        if let BlockKind::Labeling { control: false } = self.kind {
            queue.label(params.arrival_time(), self.duration)?;
        }

        self.activation = match queue.propagate(self.duration) {
            Some(window) => window.indicator(self.len, self.dt),
            None => vec![0.0; self.len],
        };
        Ok(())
    }

    /// `s(t) = amplitude · activation(t)`, plus the baseline of a custom block.
    pub fn scale_arterial(&mut self, amplitude: f64) {
        self.arterial = match &self.kind {
            BlockKind::Custom { arterial, .. } => self
                .activation
                .iter()
                .zip(arterial)
                .map(|(a, base)| base + amplitude * a)
                .collect(),
            _ => self.activation.iter().map(|a| amplitude * a).collect(),
        };
    }

    /// Rebuild the integration grid from the current traces.
    pub fn rebuild_grid(&mut self) {
        self.grid = if self.compression.enabled && !matches!(self.kind, BlockKind::Prep(_)) {
            let mut events = self.sample_indices.clone();
            events.extend_from_slice(&self.crusher_indices);

            let baseline = match &self.kind {
                BlockKind::Custom { arterial, .. } => Some(arterial.as_slice()),
                _ => None,
            };
            TimeGrid::compress(
                self.dt,
                &self.field,
                &self.activation,
                baseline,
                &events,
                &self.compression,
            )
        } else {
            TimeGrid::uniform(self.dt, self.len)
        };
    }

    // =========================================== Running ============================================

    /// Integrate the block from `start` and return its terminal state.
    pub fn run(
        &mut self,
        start: MagnetizationState,
        params: &PhysiologicalParams,
        constants: &PhysicalConstants,
    ) -> MagnetizationState {
        self.magnetization = match &self.kind {
            BlockKind::Prep(pulse) => vec![pulse.terminal_state(&start, params); self.grid.len()],
            kind => ExchangeIntegrator::new(
                params,
                constants,
                self.dt,
                kind.absorption(),
                kind.saturation(),
            )
            .integrate(start, &self.field, &self.arterial, &self.grid, &self.crusher_indices),
        };

        self.magnetization.last().copied().unwrap_or(start)
    }

    /// Signal at each sample: `(1 − CBV)·‖M_transverse‖ + CBV·s`.
    ///
    /// Empty until the block has been run.
    pub fn samples(&self, cbv: f64) -> Vec<f64> {
        self.sample_indices
            .iter()
            .filter_map(|&index| {
                let position = self.grid.position(index)?;
                let m = self.magnetization.get(position)?;
                Some((1.0 - cbv) * m.transverse_magnitude() + cbv * self.arterial[index])
            })
            .collect()
    }

    /// Drop the magnetization trace, keeping every other trace.
    pub fn clear_trace(&mut self) {
        self.magnetization.clear();
    }

    fn index_at(&self, time: f64) -> usize {
        ((time / self.dt + INDEX_EPSILON).floor() as usize).min(self.len - 1)
    }

    // =========================================== Accessors ==========================================

    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    /// Block length T (ms).
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Points in the uniform grid, `ceil(T/dt)`.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn field(&self) -> &[Vector3<f64>] {
        &self.field
    }

    pub fn activation(&self) -> &[f64] {
        &self.activation
    }

    pub fn arterial(&self) -> &[f64] {
        &self.arterial
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    /// One state per grid point; empty before [`run`](Self::run).
    pub fn magnetization(&self) -> &[MagnetizationState] {
        &self.magnetization
    }

    pub fn sample_indices(&self) -> &[usize] {
        &self.sample_indices
    }

    /// Sample times snapped to the grid (block-local ms).
    pub fn sample_times(&self) -> Vec<f64> {
        self.sample_indices.iter().map(|&i| i as f64 * self.dt).collect()
    }

    pub fn crusher_indices(&self) -> &[usize] {
        &self.crusher_indices
    }

    pub fn compression(&self) -> &CompressionConfig {
        &self.compression
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bolus::BolusWindow;
    use approx::assert_relative_eq;

    #[test]
    fn test_grid_length_is_ceil() {
        let block = SequenceBlock::dead_air(10.0, 3.0).unwrap();
        assert_eq!(block.len(), 4);
    }

    #[test]
    fn test_rejects_non_positive_duration() {
        assert!(SequenceBlock::dead_air(0.0, 1.0).is_err());
        assert!(SequenceBlock::dead_air(-5.0, 1.0).is_err());
        assert!(SequenceBlock::dead_air(5.0, 0.0).is_err());
    }

    #[test]
    fn test_sample_and_crusher_range_checks() {
        let block = SequenceBlock::dead_air(10.0, 1.0).unwrap();
        assert!(matches!(
            block.clone().with_samples(&[10.0]),
            Err(SimError::SampleOutOfRange { .. })
        ));
        assert!(matches!(
            block.clone().with_samples(&[-0.1]),
            Err(SimError::SampleOutOfRange { .. })
        ));
        assert!(matches!(
            block.with_crushers(&[12.0]),
            Err(SimError::CrusherOutOfRange { .. })
        ));
    }

    #[test]
    fn test_times_snap_to_earlier_grid_point() {
        let block = SequenceBlock::dead_air(1.0, 0.1)
            .unwrap()
            .with_samples(&[0.3, 0.35, 0.999])
            .unwrap();
        assert_eq!(block.sample_indices(), &[3, 3, 9]);
    }

    #[test]
    fn test_custom_length_mismatch() {
        let result = SequenceBlock::custom(vec![Vector3::zeros(); 5], vec![0.0; 4], 1.0);
        assert!(matches!(result, Err(SimError::TraceLengthMismatch { .. })));

        let block = SequenceBlock::custom(vec![Vector3::zeros(); 5], vec![0.0; 5], 2.0).unwrap();
        assert_relative_eq!(block.duration(), 10.0);
        assert_eq!(block.len(), 5);
    }

    #[test]
    fn test_kind_constants() {
        let label = BlockKind::Labeling { control: false };
        assert_eq!(label.absorption(), 0.25);
        assert_eq!(label.saturation(), 1000.0);
        assert_eq!(BlockKind::DeadAir.absorption(), 1.0);
        assert_eq!(BlockKind::DeadAir.saturation(), 0.0);
    }

    #[test]
    fn test_gradient_term_adds_longitudinal_field() {
        let gradient = vec![Vector3::new(1e-6, 2e-6, 3e-6); 4];
        let mut block = SequenceBlock::dead_air(4.0, 1.0)
            .unwrap()
            .with_gradient(gradient)
            .unwrap();
        let position = SpinPosition { x: 1.0, y: 1.0, z: 0.0, velocity: 0.5 };
        block
            .regenerate_fields(&PhysicalConstants::default(), &position)
            .unwrap();

        // t = 2 ms → z = 1 cm
        assert_relative_eq!(block.field()[2].z, 1e-6 + 2e-6 + 3e-6, epsilon = 1e-18);
        assert_eq!(block.field()[2].x, 0.0);
    }

    #[test]
    fn test_label_block_queues_bolus_control_does_not() {
        let params = PhysiologicalParams::default().with_labeling(0.86, 1500.0);

        let mut queue = BolusQueue::new();
        let mut label = SequenceBlock::labeling(1000.0, 1.0, false).unwrap();
        label.propagate_bolus(&mut queue, &params).unwrap();
        assert_eq!(queue.head(), Some(&BolusWindow::new(500.0, 1500.0).unwrap()));

        let mut queue = BolusQueue::new();
        let mut control = SequenceBlock::labeling(1000.0, 1.0, true).unwrap();
        control.propagate_bolus(&mut queue, &params).unwrap();
        assert!(queue.is_empty());
        assert!(control.activation().iter().all(|&a| a == 0.0));
    }

    #[test]
    fn test_scale_arterial_keeps_custom_baseline() {
        let mut block =
            SequenceBlock::custom(vec![Vector3::zeros(); 3], vec![0.5, 0.5, 0.5], 1.0).unwrap();
        let mut queue = BolusQueue::new();
        queue.push(BolusWindow::new(1.0, 2.0).unwrap());
        block.propagate_bolus(&mut queue, &PhysiologicalParams::default()).unwrap();
        block.scale_arterial(-0.1);
        let expected = [0.5, 0.4, 0.5];
        for (value, expected) in block.arterial().iter().zip(expected) {
            assert_relative_eq!(*value, expected, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_set_flip_angle_only_on_gradient_echo() {
        let mut gre = SequenceBlock::gradient_echo(GradientEcho::default(), 2.5).unwrap();
        assert!(gre.set_flip_angle(10.0, 0.0).is_ok());
        let mut dead = SequenceBlock::dead_air(1.0, 0.1).unwrap();
        assert!(dead.set_flip_angle(10.0, 0.0).is_err());
    }

    #[test]
    fn test_gradient_echo_declares_sample() {
        let gre = SequenceBlock::gradient_echo(GradientEcho::default(), 2.5).unwrap();
        // delay + PW + dt = 13 ms → index 5
        assert_eq!(gre.sample_indices(), &[5]);
    }

    #[test]
    fn test_prep_block_holds_closed_form() {
        let params = PhysiologicalParams::default();
        let mut block = SequenceBlock::prep(PrepPulse::Bir8).unwrap();
        block.rebuild_grid();
        let end = block.run(MagnetizationState::equilibrium(), &params, &PhysicalConstants::default());
        assert_eq!(end.transverse_magnitude(), 0.0);
        assert_eq!(block.magnetization().len(), block.len());
    }
}
