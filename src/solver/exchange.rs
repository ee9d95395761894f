//! Closed-form two-pool exchange integrator
//!
//! # Model
//!
//! The state `M = [Mx, My, Mz_free, Mz_semisolid]` evolves in three stages per
//! timestep of length `dt`:
//!
//! 1. **Rotation** about the effective field `B` by `θ = γ·|B|·dt` (Rodrigues
//!    formula on the free-water components), while the semisolid component is
//!    attenuated by `exp(-π·(γ|B|)²·absorption)`. Skipped when `|B|` is within
//!    the zero-field tolerance.
//! 2. **Forced saturation** of the semisolid pool, `Ms ← Ms·exp(-π·saturation)`,
//!    active only for blocks that declare a nonzero saturation constant.
//! 3. **Relaxation and exchange**: `M ← ACE·(M − D) + D`, where
//!    `ACE = A·CE` combines the closed-form exchange between the longitudinal
//!    pools with per-component `exp(-dt·R)` relaxation, and `D` is the
//!    pseudo-steady state for the current arterial input.
//!
//! ```text
//! e   = exp(-(1 + f)·ks·dt)
//! A   = | 1  0        0              0          |
//!       | 0  1        0              0          |
//!       | 0  0  (1 + f·e)/(1 + f)  (1 − e)/(1 + f) |
//!       | 0  0  (f − f·e)/(1 + f)  (f + e)/(1 + f) |
//! CE  = diag(e^{−dt·R2f}, e^{−dt·R2f}, e^{−dt·R1f}, e^{−dt·R1s})
//!
//! den = 1 + T1f_app·kf + T1s·ks
//! D_f = ((1 + T1s·ks)(M0f + s·T1f_app) + T1f_app·ks·M0s) / den
//! D_s = ((T1s·ks)(M0f + s·T1f_app) + (1 + T1f_app·ks)·M0s) / den
//! ```
//!
//! `ACE` depends only on `dt` and the parameters, so it is computed once per
//! block; `D` depends on the time-varying arterial input and is formed per step.
//!
//! # Bridging compressed gaps
//!
//! One step is an affine map `M ↦ P·M + q` with `P = ACE·S·R` and
//! `q = (I − ACE)·D`. Over a run of identical steps the map is raised to a power
//! in homogeneous coordinates, which is what lets a compressed grid reproduce
//! the uniform result instead of approximating it.

use std::f64::consts::PI;

use nalgebra::{Matrix3, Matrix4, Matrix5, Unit, Vector3, Vector4, Vector5};

use crate::physics::{MagnetizationState, PhysicalConstants, PhysiologicalParams};
use crate::solver::TimeGrid;

/// Runs of identical steps shorter than this are stepped one by one.
const POWER_THRESHOLD: usize = 16;

/// Rotation by `angle` radians about `axis` (Rodrigues formula).
///
/// # Example
///
/// ```rust
/// use mrf_rs::solver::rodrigues_rotation;
/// use nalgebra::{Unit, Vector3};
///
/// let r = rodrigues_rotation(&Vector3::x_axis(), std::f64::consts::PI);
/// let flipped = r * Vector3::new(0.0, 0.0, 1.0);
/// assert!((flipped.z + 1.0).abs() < 1e-12);
/// ```
#[rustfmt::skip]
pub fn rodrigues_rotation(axis: &Unit<Vector3<f64>>, angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    let k = 1.0 - c;
    let (ux, uy, uz) = (axis.x, axis.y, axis.z);

    Matrix3::new(
        c + ux * ux * k,      ux * uy * k - uz * s, ux * uz * k + uy * s,
        uy * ux * k + uz * s, c + uy * uy * k,      uy * uz * k - ux * s,
        uz * ux * k - uy * s, uz * uy * k + ux * s, c + uz * uz * k,
    )
}

/// Per-block integrator for the two-pool exchange model.
#[derive(Clone, Debug)]
pub struct ExchangeIntegrator {
    dt: f64,
    gamma: f64,
    zero_field_tolerance: f64,
    absorption: f64,
    saturation: f64,
    ace: Matrix4<f64>,

    // Pseudo-steady-state coefficients
    t1f_app: f64,
    t1_semisolid: f64,
    ks: f64,
    kf: f64,
    m0_free: f64,
    m0_semisolid: f64,
}

impl ExchangeIntegrator {
    /// Precompute the relaxation-exchange matrix for one block.
    ///
    /// # Arguments
    ///
    /// * `params` - Tissue parameters (derived rates must be current)
    /// * `constants` - Gyromagnetic ratio and zero-field tolerance
    /// * `dt` - Timestep (ms)
    /// * `absorption` - Semisolid absorption coefficient of the block's pulses
    /// * `saturation` - Forced semisolid saturation constant (0 disables it)
    pub fn new(
        params: &PhysiologicalParams,
        constants: &PhysicalConstants,
        dt: f64,
        absorption: f64,
        saturation: f64,
    ) -> Self {
        let f = params.pool_ratio();
        let e = (-(1.0 + f) * params.ks() * dt).exp();

        let mut exchange = Matrix4::identity();
        exchange[(2, 2)] = (1.0 + f * e) / (1.0 + f);
        exchange[(3, 2)] = (f - f * e) / (1.0 + f);
        exchange[(2, 3)] = (1.0 - e) / (1.0 + f);
        exchange[(3, 3)] = (f + e) / (1.0 + f);

        let relaxation = Matrix4::from_diagonal(&Vector4::new(
            (-dt * params.r2f_app()).exp(),
            (-dt * params.r2f_app()).exp(),
            (-dt * params.r1f_app()).exp(),
            (-dt * params.r1s_app()).exp(),
        ));

        Self {
            dt,
            gamma: constants.gamma(),
            zero_field_tolerance: constants.zero_field_tolerance(),
            absorption,
            saturation,
            ace: exchange * relaxation,
            t1f_app: params.t1f_app(),
            t1_semisolid: params.t1_semisolid(),
            ks: params.ks(),
            kf: params.kf(),
            m0_free: params.m0_free(),
            m0_semisolid: params.m0_semisolid(),
        }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// The combined relaxation-exchange matrix `ACE`.
    pub fn relaxation_exchange(&self) -> &Matrix4<f64> {
        &self.ace
    }

    /// Rotation/absorption matrix for a field sample, `None` for a zero field.
    pub fn transition_matrix(&self, field: &Vector3<f64>) -> Option<Matrix4<f64>> {
        let magnitude = field.norm();
        if magnitude <= self.zero_field_tolerance {
            return None;
        }

        let axis = Unit::new_unchecked(field / magnitude);
        let omega = self.gamma * magnitude;
        let rotation = rodrigues_rotation(&axis, omega * self.dt);

        let mut transition = Matrix4::zeros();
        transition.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        transition[(3, 3)] = (-PI * omega * omega * self.absorption).exp();
        Some(transition)
    }

    /// Pseudo-steady state `D` for an arterial input `s`.
    pub fn steady_state(&self, arterial: f64) -> Vector4<f64> {
        let den = 1.0 + self.t1f_app * self.kf + self.t1_semisolid * self.ks;
        let source = self.m0_free + arterial * self.t1f_app;

        let free = ((1.0 + self.t1_semisolid * self.ks) * source
            + self.t1f_app * self.ks * self.m0_semisolid)
            / den;
        let semisolid = ((self.t1_semisolid * self.ks) * source
            + (1.0 + self.t1f_app * self.ks) * self.m0_semisolid)
            / den;

        Vector4::new(0.0, 0.0, free, semisolid)
    }

    /// Advance the state by one timestep.
    pub fn step(
        &self,
        state: MagnetizationState,
        field: &Vector3<f64>,
        arterial: f64,
    ) -> MagnetizationState {
        let mut m = state.into_vector();

        if let Some(transition) = self.transition_matrix(field) {
            m = transition * m;
        }

        if self.saturation != 0.0 {
            m[3] *= (-PI * self.saturation).exp();
        }

        let d = self.steady_state(arterial);
        MagnetizationState::from(self.ace * (m - d) + d)
    }

    /// Apply `steps` identical timesteps under a constant field and arterial input.
    ///
    /// Equivalent to calling [`step`](Self::step) `steps` times; long runs are
    /// folded into one power of the affine step map.
    pub fn hold(
        &self,
        state: MagnetizationState,
        field: &Vector3<f64>,
        arterial: f64,
        steps: usize,
    ) -> MagnetizationState {
        if steps < POWER_THRESHOLD {
            return (0..steps).fold(state, |m, _| self.step(m, field, arterial));
        }

        let map = matrix_power(self.affine_step(field, arterial), steps);
        let m = state.as_vector();
        let out = map * Vector5::new(m[0], m[1], m[2], m[3], 1.0);
        MagnetizationState::new(out[0], out[1], out[2], out[3])
    }

    /// Homogeneous 5×5 form of one step: `[[ACE·S·R, (I − ACE)·D], [0, 1]]`.
    fn affine_step(&self, field: &Vector3<f64>, arterial: f64) -> Matrix5<f64> {
        let mut pre = self.transition_matrix(field).unwrap_or_else(Matrix4::identity);
        if self.saturation != 0.0 {
            let factor = (-PI * self.saturation).exp();
            pre.row_mut(3).scale_mut(factor);
        }

        let linear = self.ace * pre;
        let offset = (Matrix4::identity() - self.ace) * self.steady_state(arterial);

        let mut map = Matrix5::identity();
        map.fixed_view_mut::<4, 4>(0, 0).copy_from(&linear);
        map.fixed_view_mut::<4, 1>(0, 4).copy_from(&offset);
        map
    }

    /// Integrate a block over its grid.
    ///
    /// `field` and `arterial` are the block's full-resolution traces; the grid
    /// selects which uniform indices are visited. Grid point 0 holds `start`,
    /// crushed if its index is listed. Every other visited uniform index listed
    /// in `crushers` (sorted) has its transverse magnetization zeroed after the
    /// update.
    pub fn integrate(
        &self,
        start: MagnetizationState,
        field: &[Vector3<f64>],
        arterial: &[f64],
        grid: &TimeGrid,
        crushers: &[usize],
    ) -> Vec<MagnetizationState> {
        let mut trace = Vec::with_capacity(grid.len());
        if grid.is_empty() {
            return trace;
        }

        let mut m = start;
        if crushers.binary_search(&grid.base_index(0)).is_ok() {
            m.crush();
        }
        trace.push(m);

        for k in 1..grid.len() {
            let previous = grid.base_index(k - 1);
            let current = grid.base_index(k);

            let gap = current - previous;
            if gap > 1 {
                m = self.hold(m, &field[previous], arterial[previous], gap - 1);
            }

            m = self.step(m, &field[current], arterial[current]);
            if crushers.binary_search(&current).is_ok() {
                m.crush();
            }
            trace.push(m);
        }

        trace
    }
}

/// `base^exponent` by repeated squaring.
fn matrix_power(base: Matrix5<f64>, mut exponent: usize) -> Matrix5<f64> {
    let mut result = Matrix5::identity();
    let mut square = base;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result *= square;
        }
        exponent >>= 1;
        if exponent > 0 {
            square = square * square;
        }
    }
    result
}
