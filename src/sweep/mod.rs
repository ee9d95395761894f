//! Nine-axis parameter sweep
//!
//! The dictionary is indexed by nine value grids, ordered from cheapest to
//! most expensive to invalidate:
//!
//! ```text
//! CBV, ks, kf, T1_free, T2_free, T1_semisolid, F, α, BAT
//! ```
//!
//! [`advance`] is a pure odometer step: CBV moves fastest, and each axis only
//! moves when everything before it wraps. The axis that moved decides which
//! simulation stages must be redone ([`Recompute`]), so full bolus-kinetics
//! recomputation only happens when BAT changes. When BAT itself wraps the
//! sweep is exhausted.
//!
//! # Example
//!
//! ```rust
//! use mrf_rs::physics::ParameterAxis;
//! use mrf_rs::sweep::{advance, Step};
//!
//! let shape = [2, 1, 1, 1, 1, 1, 1, 1, 1];
//! let start = [0; 9];
//!
//! let Step::Advanced { indices, axis } = advance(&start, &shape) else { unreachable!() };
//! assert_eq!(indices[0], 1);
//! assert_eq!(axis, ParameterAxis::Cbv);
//! assert_eq!(advance(&indices, &shape), Step::Exhausted);
//! ```

pub mod driver;

pub use driver::{DictionaryGenerator, GenerationReport, GeneratorConfig};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::physics::{ParameterAxis, PhysiologicalParams};

/// Number of sweep axes.
pub const AXES: usize = ParameterAxis::COUNT;

/// One index per axis, in odometer order.
pub type IndexTuple = [usize; AXES];

// =================================================================================================
// Odometer
// =================================================================================================

/// Outcome of one odometer step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// `axis` moved forward; every faster axis wrapped to 0.
    Advanced { indices: IndexTuple, axis: ParameterAxis },
    /// Every axis wrapped.
    Exhausted,
}

/// Increment `indices` within `shape`, fastest axis first.
pub fn advance(indices: &IndexTuple, shape: &IndexTuple) -> Step {
    let mut next = *indices;
    for axis in ParameterAxis::ALL {
        let i = axis.position();
        next[i] += 1;
        if next[i] < shape[i] {
            return Step::Advanced { indices: next, axis };
        }
        next[i] = 0;
    }
    Step::Exhausted
}

// =================================================================================================
// Recompute policy
// =================================================================================================

/// Simulation stages invalidated by a parameter change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Recompute {
    /// Apparent relaxation rates.
    pub rates: bool,
    /// Arterial amplitude only; the activation shapes stay valid.
    pub rescale_arterial: bool,
    /// Full bolus propagation.
    pub arterial_shape: bool,
    /// Field traces.
    pub fields: bool,
}

impl Recompute {
    pub const NONE: Recompute = Recompute {
        rates: false,
        rescale_arterial: false,
        arterial_shape: false,
        fields: false,
    };

    pub const ALL: Recompute = Recompute {
        rates: true,
        rescale_arterial: true,
        arterial_shape: true,
        fields: true,
    };

    /// Stages that depend on one axis.
    pub fn for_axis(axis: ParameterAxis) -> Self {
        match axis {
            ParameterAxis::Cbv | ParameterAxis::ExchangeSemisolid | ParameterAxis::ExchangeFree => {
                Recompute::NONE
            }
            ParameterAxis::T1Free | ParameterAxis::T2Free | ParameterAxis::T1Semisolid => Recompute {
                rates: true,
                ..Recompute::NONE
            },
            ParameterAxis::Flow => Recompute {
                rates: true,
                rescale_arterial: true,
                ..Recompute::NONE
            },
            ParameterAxis::LabelingEfficiency => Recompute {
                rescale_arterial: true,
                ..Recompute::NONE
            },
            ParameterAxis::ArrivalTime => Recompute {
                arterial_shape: true,
                ..Recompute::NONE
            },
        }
    }

    /// Stages to redo after `axis` moved: its own plus those of every faster
    /// axis, since those wrapped back to their first value.
    pub fn after_increment(axis: ParameterAxis) -> Self {
        ParameterAxis::ALL[..=axis.position()]
            .iter()
            .fold(Recompute::NONE, |acc, &a| acc.union(Recompute::for_axis(a)))
    }

    pub fn union(self, other: Recompute) -> Recompute {
        Recompute {
            rates: self.rates || other.rates,
            rescale_arterial: self.rescale_arterial || other.rescale_arterial,
            arterial_shape: self.arterial_shape || other.arterial_shape,
            fields: self.fields || other.fields,
        }
    }
}

// =================================================================================================
// Value grids
// =================================================================================================

/// Values swept along each axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid {
    pub cbv: Vec<f64>,
    pub ks: Vec<f64>,
    pub kf: Vec<f64>,
    pub t1_free: Vec<f64>,
    pub t2_free: Vec<f64>,
    pub t1_semisolid: Vec<f64>,
    pub flow: Vec<f64>,
    pub labeling_efficiency: Vec<f64>,
    pub arrival_time: Vec<f64>,
}

impl SweepGrid {
    /// One value per axis, taken from `params`.
    pub fn single(params: &PhysiologicalParams) -> Self {
        let value = |axis| vec![params.get(axis)];
        Self {
            cbv: value(ParameterAxis::Cbv),
            ks: value(ParameterAxis::ExchangeSemisolid),
            kf: value(ParameterAxis::ExchangeFree),
            t1_free: value(ParameterAxis::T1Free),
            t2_free: value(ParameterAxis::T2Free),
            t1_semisolid: value(ParameterAxis::T1Semisolid),
            flow: value(ParameterAxis::Flow),
            labeling_efficiency: value(ParameterAxis::LabelingEfficiency),
            arrival_time: value(ParameterAxis::ArrivalTime),
        }
    }

    /// Parse a JSON grid description.
    pub fn from_json(text: &str) -> Result<Self, SimError> {
        let grid: SweepGrid = serde_json::from_str(text)
            .map_err(|e| SimError::config(format!("sweep grid: {e}")))?;
        grid.validate()?;
        Ok(grid)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn with_axis(mut self, axis: ParameterAxis, values: Vec<f64>) -> Self {
        *self.values_mut(axis) = values;
        self
    }

    pub fn values(&self, axis: ParameterAxis) -> &[f64] {
        match axis {
            ParameterAxis::Cbv => &self.cbv,
            ParameterAxis::ExchangeSemisolid => &self.ks,
            ParameterAxis::ExchangeFree => &self.kf,
            ParameterAxis::T1Free => &self.t1_free,
            ParameterAxis::T2Free => &self.t2_free,
            ParameterAxis::T1Semisolid => &self.t1_semisolid,
            ParameterAxis::Flow => &self.flow,
            ParameterAxis::LabelingEfficiency => &self.labeling_efficiency,
            ParameterAxis::ArrivalTime => &self.arrival_time,
        }
    }

    fn values_mut(&mut self, axis: ParameterAxis) -> &mut Vec<f64> {
        match axis {
            ParameterAxis::Cbv => &mut self.cbv,
            ParameterAxis::ExchangeSemisolid => &mut self.ks,
            ParameterAxis::ExchangeFree => &mut self.kf,
            ParameterAxis::T1Free => &mut self.t1_free,
            ParameterAxis::T2Free => &mut self.t2_free,
            ParameterAxis::T1Semisolid => &mut self.t1_semisolid,
            ParameterAxis::Flow => &mut self.flow,
            ParameterAxis::LabelingEfficiency => &mut self.labeling_efficiency,
            ParameterAxis::ArrivalTime => &mut self.arrival_time,
        }
    }

    pub fn shape(&self) -> IndexTuple {
        ParameterAxis::ALL.map(|axis| self.values(axis).len())
    }

    /// Number of parameter combinations.
    pub fn combinations(&self) -> usize {
        self.shape().iter().product()
    }

    /// Same grid with `axis` pinned to the value at `index`.
    pub fn restrict(&self, axis: ParameterAxis, index: usize) -> Result<Self, SimError> {
        let value = *self.values(axis).get(index).ok_or_else(|| {
            SimError::config(format!("{axis} index {index} outside a grid of {}", self.values(axis).len()))
        })?;
        Ok(self.clone().with_axis(axis, vec![value]))
    }

    pub fn validate(&self) -> Result<(), SimError> {
        for axis in ParameterAxis::ALL {
            let values = self.values(axis);
            if values.is_empty() {
                return Err(SimError::config(format!("sweep axis {axis} has no values")));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(SimError::config(format!("sweep axis {axis} has a non-finite value")));
            }
        }
        Ok(())
    }
}

// =================================================================================================
// Sweep state
// =================================================================================================

/// Walks a [`SweepGrid`] and keeps the matching [`PhysiologicalParams`] current.
#[derive(Clone, Debug)]
pub struct ParameterSweep {
    grid: SweepGrid,
    shape: IndexTuple,
    indices: IndexTuple,
    params: PhysiologicalParams,
    exhausted: bool,
}

impl ParameterSweep {
    /// Start at the all-zero index. Axes not swept keep the values of `base`.
    pub fn new(grid: SweepGrid, base: PhysiologicalParams) -> Result<Self, SimError> {
        grid.validate()?;
        let shape = grid.shape();
        let mut sweep = Self {
            grid,
            shape,
            indices: [0; AXES],
            params: base,
            exhausted: false,
        };
        sweep.assign_all();
        Ok(sweep)
    }

    /// Move one step. Returns the stages to redo, or `None` once exhausted.
    pub fn advance(&mut self) -> Option<Recompute> {
        if self.exhausted {
            return None;
        }

        match advance(&self.indices, &self.shape) {
            Step::Advanced { indices, axis } => {
                self.indices = indices;
                for moved in &ParameterAxis::ALL[..=axis.position()] {
                    let value = self.grid.values(*moved)[indices[moved.position()]];
                    self.params.assign(*moved, value);
                }

                let recompute = Recompute::after_increment(axis);
                if recompute.rates {
                    self.params.refresh_rates();
                }
                Some(recompute)
            }
            Step::Exhausted => {
                self.exhausted = true;
                None
            }
        }
    }

    /// Jump to an index tuple (for resuming).
    pub fn seek(&mut self, indices: IndexTuple) -> Result<(), SimError> {
        if indices.iter().zip(&self.shape).any(|(i, n)| i >= n) {
            return Err(SimError::config(format!(
                "index {indices:?} outside sweep shape {:?}",
                self.shape
            )));
        }
        self.indices = indices;
        self.exhausted = false;
        self.assign_all();
        Ok(())
    }

    fn assign_all(&mut self) {
        for axis in ParameterAxis::ALL {
            let value = self.grid.values(axis)[self.indices[axis.position()]];
            self.params.assign(axis, value);
        }
        self.params.refresh_rates();
    }

    pub fn grid(&self) -> &SweepGrid {
        &self.grid
    }

    pub fn shape(&self) -> IndexTuple {
        self.shape
    }

    pub fn indices(&self) -> IndexTuple {
        self.indices
    }

    pub fn params(&self) -> &PhysiologicalParams {
        &self.params
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn total(&self) -> usize {
        self.shape.iter().product()
    }

    /// Position of the current combination in odometer order.
    pub fn linear_index(&self) -> usize {
        let mut stride = 1;
        let mut linear = 0;
        for (i, n) in self.indices.iter().zip(&self.shape) {
            linear += i * stride;
            stride *= n;
        }
        linear
    }
}
