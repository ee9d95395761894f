//! Physiological parameters of the two-pool tissue model.
//!
//! All times are in milliseconds and all rates in 1/ms. The derived apparent
//! rates fold flow-driven exchange into the free pool's relaxation:
//!
//! ```text
//! R1f_app = F/λ + 1/T1_free
//! R2f_app = F/λ + 1/T2_free
//! R1s_app = 1/T1_semisolid
//! f       = M0_semisolid / M0_free
//! ```
//!
//! The cached rates are refreshed by every `with_*` setter and by
//! [`PhysiologicalParams::refresh_rates`]. [`PhysiologicalParams::assign`] writes a
//! raw value without refreshing, which lets the sweep defer the work until the
//! recompute policy asks for it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// The nine swept quantities, ordered from cheapest to most expensive to
/// invalidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParameterAxis {
    /// Cerebral blood volume fraction.
    Cbv,
    /// Semisolid → free exchange rate k_s.
    ExchangeSemisolid,
    /// Free → semisolid exchange rate k_f.
    ExchangeFree,
    T1Free,
    T2Free,
    T1Semisolid,
    /// Perfusion F.
    Flow,
    /// Labeling efficiency α.
    LabelingEfficiency,
    /// Bolus arrival time.
    ArrivalTime,
}

impl ParameterAxis {
    pub const COUNT: usize = 9;

    /// All axes, fastest-varying first.
    pub const ALL: [ParameterAxis; ParameterAxis::COUNT] = [
        ParameterAxis::Cbv,
        ParameterAxis::ExchangeSemisolid,
        ParameterAxis::ExchangeFree,
        ParameterAxis::T1Free,
        ParameterAxis::T2Free,
        ParameterAxis::T1Semisolid,
        ParameterAxis::Flow,
        ParameterAxis::LabelingEfficiency,
        ParameterAxis::ArrivalTime,
    ];

    /// Position of the axis in odometer order.
    pub fn position(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ParameterAxis::Cbv => "CBV",
            ParameterAxis::ExchangeSemisolid => "ks",
            ParameterAxis::ExchangeFree => "kf",
            ParameterAxis::T1Free => "T1_f",
            ParameterAxis::T2Free => "T2_f",
            ParameterAxis::T1Semisolid => "T1_s",
            ParameterAxis::Flow => "F",
            ParameterAxis::LabelingEfficiency => "alpha",
            ParameterAxis::ArrivalTime => "BAT",
        }
    }
}

impl fmt::Display for ParameterAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of the tissue and blood parameters used for one simulation run.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysiologicalParams {
    t1_free: f64,
    t2_free: f64,
    t1_semisolid: f64,
    t1_blood: f64,
    ks: f64,
    kf: f64,
    flow: f64,
    partition: f64,
    labeling_efficiency: f64,
    arrival_time: f64,
    m0_free: f64,
    m0_semisolid: f64,
    cbv: f64,

    // Derived
    r1f_app: f64,
    r2f_app: f64,
    r1s_app: f64,
    pool_ratio: f64,
}

impl Default for PhysiologicalParams {
    /// Grey-matter-like values at 3 T.
    fn default() -> Self {
        let mut params = Self {
            t1_free: 1400.0,
            t2_free: 80.0,
            t1_semisolid: 1000.0,
            t1_blood: 1600.0,
            ks: 1e-4,
            kf: 1e-4,
            flow: 1e-5,
            partition: 0.9,
            labeling_efficiency: 0.86,
            arrival_time: 1000.0,
            m0_free: 1.0,
            m0_semisolid: 1.0,
            cbv: 0.005,
            r1f_app: 0.0,
            r2f_app: 0.0,
            r1s_app: 0.0,
            pool_ratio: 0.0,
        };
        params.refresh_rates();
        params
    }
}

impl PhysiologicalParams {
    /// Parameters with no relaxation, exchange or flow to speak of: the
    /// relaxation times are 1e9 ms and all rates are zero.
    pub fn relaxation_free() -> Self {
        Self::default()
            .with_relaxation(1e9, 1e9, 1e9)
            .with_exchange(0.0, 0.0)
            .with_flow(0.0)
    }

    // ====================================== Setters ======================================

    pub fn with_relaxation(mut self, t1_free: f64, t2_free: f64, t1_semisolid: f64) -> Self {
        self.t1_free = t1_free;
        self.t2_free = t2_free;
        self.t1_semisolid = t1_semisolid;
        self.refresh_rates();
        self
    }

    pub fn with_exchange(mut self, ks: f64, kf: f64) -> Self {
        self.ks = ks;
        self.kf = kf;
        self
    }

    pub fn with_flow(mut self, flow: f64) -> Self {
        self.flow = flow;
        self.refresh_rates();
        self
    }

    pub fn with_partition(mut self, partition: f64) -> Self {
        self.partition = partition;
        self.refresh_rates();
        self
    }

    pub fn with_blood_t1(mut self, t1_blood: f64) -> Self {
        self.t1_blood = t1_blood;
        self
    }

    pub fn with_labeling(mut self, labeling_efficiency: f64, arrival_time: f64) -> Self {
        self.labeling_efficiency = labeling_efficiency;
        self.arrival_time = arrival_time;
        self
    }

    pub fn with_pool_sizes(mut self, m0_free: f64, m0_semisolid: f64) -> Self {
        self.m0_free = m0_free;
        self.m0_semisolid = m0_semisolid;
        self.refresh_rates();
        self
    }

    pub fn with_cbv(mut self, cbv: f64) -> Self {
        self.cbv = cbv;
        self
    }

    /// Write a swept value without refreshing the derived rates.
    pub fn assign(&mut self, axis: ParameterAxis, value: f64) {
        match axis {
            ParameterAxis::Cbv => self.cbv = value,
            ParameterAxis::ExchangeSemisolid => self.ks = value,
            ParameterAxis::ExchangeFree => self.kf = value,
            ParameterAxis::T1Free => self.t1_free = value,
            ParameterAxis::T2Free => self.t2_free = value,
            ParameterAxis::T1Semisolid => self.t1_semisolid = value,
            ParameterAxis::Flow => self.flow = value,
            ParameterAxis::LabelingEfficiency => self.labeling_efficiency = value,
            ParameterAxis::ArrivalTime => self.arrival_time = value,
        }
    }

    /// Value currently held for a swept axis.
    pub fn get(&self, axis: ParameterAxis) -> f64 {
        match axis {
            ParameterAxis::Cbv => self.cbv,
            ParameterAxis::ExchangeSemisolid => self.ks,
            ParameterAxis::ExchangeFree => self.kf,
            ParameterAxis::T1Free => self.t1_free,
            ParameterAxis::T2Free => self.t2_free,
            ParameterAxis::T1Semisolid => self.t1_semisolid,
            ParameterAxis::Flow => self.flow,
            ParameterAxis::LabelingEfficiency => self.labeling_efficiency,
            ParameterAxis::ArrivalTime => self.arrival_time,
        }
    }

    /// Recompute the apparent rates and the pool-size ratio from the raw values.
    pub fn refresh_rates(&mut self) {
        let flow_rate = self.flow / self.partition;
        self.r1f_app = flow_rate + 1.0 / self.t1_free;
        self.r2f_app = flow_rate + 1.0 / self.t2_free;
        self.r1s_app = 1.0 / self.t1_semisolid;
        self.pool_ratio = self.m0_semisolid / self.m0_free;
    }

    /// Reject values the simulator cannot use.
    pub fn validate(&self) -> Result<(), SimError> {
        let positive = [
            ("T1_free", self.t1_free),
            ("T2_free", self.t2_free),
            ("T1_semisolid", self.t1_semisolid),
            ("T1_blood", self.t1_blood),
            ("partition coefficient", self.partition),
            ("M0_free", self.m0_free),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::config(format!("{name} must be positive, got {value}")));
            }
        }

        let non_negative = [
            ("ks", self.ks),
            ("kf", self.kf),
            ("flow", self.flow),
            ("M0_semisolid", self.m0_semisolid),
            ("arrival time", self.arrival_time),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SimError::config(format!("{name} must be non-negative, got {value}")));
            }
        }

        if !(0.0..=1.0).contains(&self.cbv) {
            return Err(SimError::config(format!("CBV must lie in [0, 1], got {}", self.cbv)));
        }
        if !self.labeling_efficiency.is_finite() {
            return Err(SimError::config("labeling efficiency must be finite"));
        }

        Ok(())
    }

    // ====================================== Getters ======================================

    pub fn t1_free(&self) -> f64 { self.t1_free }
    pub fn t2_free(&self) -> f64 { self.t2_free }
    pub fn t1_semisolid(&self) -> f64 { self.t1_semisolid }
    pub fn t1_blood(&self) -> f64 { self.t1_blood }
    pub fn ks(&self) -> f64 { self.ks }
    pub fn kf(&self) -> f64 { self.kf }
    pub fn flow(&self) -> f64 { self.flow }
    pub fn partition(&self) -> f64 { self.partition }
    pub fn labeling_efficiency(&self) -> f64 { self.labeling_efficiency }
    pub fn arrival_time(&self) -> f64 { self.arrival_time }
    pub fn m0_free(&self) -> f64 { self.m0_free }
    pub fn m0_semisolid(&self) -> f64 { self.m0_semisolid }
    pub fn cbv(&self) -> f64 { self.cbv }

    pub fn r1f_app(&self) -> f64 { self.r1f_app }
    pub fn r2f_app(&self) -> f64 { self.r2f_app }
    pub fn r1s_app(&self) -> f64 { self.r1s_app }

    /// Apparent longitudinal time of the free pool, 1/R1f_app.
    pub fn t1f_app(&self) -> f64 {
        1.0 / self.r1f_app
    }

    /// f = M0_semisolid / M0_free.
    pub fn pool_ratio(&self) -> f64 {
        self.pool_ratio
    }

    /// Peak arterial magnetization delivered by a labeled bolus:
    /// `-2·F·α·M0_free/λ · exp(-BAT/T1_blood)`.
    pub fn arterial_amplitude(&self) -> f64 {
        -2.0 * self.flow * self.labeling_efficiency * self.m0_free / self.partition
            * (-self.arrival_time / self.t1_blood).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_derived_rates() {
        let params = PhysiologicalParams::default()
            .with_relaxation(1000.0, 100.0, 500.0)
            .with_flow(0.009)
            .with_partition(0.9);

        assert_relative_eq!(params.r1f_app(), 0.01 + 0.001, epsilon = 1e-15);
        assert_relative_eq!(params.r2f_app(), 0.01 + 0.01, epsilon = 1e-15);
        assert_relative_eq!(params.r1s_app(), 0.002, epsilon = 1e-15);
        assert_relative_eq!(params.t1f_app(), 1.0 / 0.011, epsilon = 1e-9);
    }

    #[test]
    fn test_assign_defers_rate_refresh() {
        let mut params = PhysiologicalParams::default();
        let before = params.r1f_app();

        params.assign(ParameterAxis::T1Free, 500.0);
        assert_eq!(params.r1f_app(), before);
        assert_eq!(params.get(ParameterAxis::T1Free), 500.0);

        params.refresh_rates();
        assert_relative_eq!(params.r1f_app(), params.flow() / params.partition() + 1.0 / 500.0);
    }

    #[test]
    fn test_arterial_amplitude() {
        let params = PhysiologicalParams::default()
            .with_flow(0.01)
            .with_partition(0.9)
            .with_labeling(0.86, 1600.0)
            .with_blood_t1(1600.0);

        let expected = -2.0 * 0.01 * 0.86 / 0.9 * (-1.0f64).exp();
        assert_relative_eq!(params.arterial_amplitude(), expected, epsilon = 1e-15);
    }

    #[test]
    fn test_validate_rejects_zero_relaxation() {
        let params = PhysiologicalParams::default().with_relaxation(0.0, 80.0, 1000.0);
        assert!(params.validate().is_err());
        assert!(PhysiologicalParams::default().validate().is_ok());
    }

    #[test]
    fn test_axis_order() {
        for (i, axis) in ParameterAxis::ALL.iter().enumerate() {
            assert_eq!(axis.position(), i);
        }
        assert_eq!(ParameterAxis::ALL[8], ParameterAxis::ArrivalTime);
    }
}
