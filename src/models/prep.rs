//! Preparation pulse catalog.
//!
//! Schedules refer to preparation pulses by a numeric code equal to the pulse
//! length in 4 µs raster units. Code 0 means "no preparation". Only BIR-8 has a
//! simulation model; the remaining catalogued codes are rejected explicitly so
//! a schedule never silently runs without the preparation it asked for.

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::physics::{MagnetizationState, PhysiologicalParams};

/// RF raster of the catalogued pulses (ms).
pub const PREP_RASTER: f64 = 0.004;

/// Codes that name real pulses without a model here.
pub const UNSUPPORTED_PREP_CODES: [i64; 6] = [250, 3200, 6800, 17268, 17536, 17846];

// BIR-8 effective echo time and crusher length (ms)
const BIR8_EFFECTIVE_TE: f64 = 22.0;
const BIR8_CRUSH_LENGTH: f64 = 750.0;

/// A supported preparation pulse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrepPulse {
    /// BIR-8 T2 preparation followed by a long crusher.
    Bir8,
}

impl PrepPulse {
    /// Look a schedule code up in the catalog. `Ok(None)` for code 0.
    pub fn from_code(code: i64) -> Result<Option<Self>, SimError> {
        match code {
            0 => Ok(None),
            6850 => Ok(Some(PrepPulse::Bir8)),
            c if UNSUPPORTED_PREP_CODES.contains(&c) => Err(SimError::UnsupportedPrepPulse(c)),
            c => Err(SimError::UnknownPrepPulse(c)),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            PrepPulse::Bir8 => 6850,
        }
    }

    /// Pulse length (ms).
    pub fn duration(&self) -> f64 {
        self.code() as f64 * PREP_RASTER
    }

    pub fn dt(&self) -> f64 {
        PREP_RASTER
    }

    /// State held over the whole block, in closed form.
    ///
    /// The free pool keeps `Mz·exp(-TE/T2)` through the T2 preparation, is
    /// inverted by the crusher's recovery term and relaxes back towards `M0`;
    /// transverse and semisolid magnetization are destroyed.
    pub fn terminal_state(&self, start: &MagnetizationState, params: &PhysiologicalParams) -> MagnetizationState {
        match self {
            PrepPulse::Bir8 => {
                let prepared = start.mz_free() * (-BIR8_EFFECTIVE_TE / params.t2_free()).exp();
                let mz = params.m0_free() - prepared * (-BIR8_CRUSH_LENGTH / params.t1_free()).exp();
                MagnetizationState::new(0.0, 0.0, mz, 0.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_catalog_lookup() {
        assert_eq!(PrepPulse::from_code(0).unwrap(), None);
        assert_eq!(PrepPulse::from_code(6850).unwrap(), Some(PrepPulse::Bir8));
        assert!(matches!(PrepPulse::from_code(3200), Err(SimError::UnsupportedPrepPulse(3200))));
        assert!(matches!(PrepPulse::from_code(42), Err(SimError::UnknownPrepPulse(42))));
    }

    #[test]
    fn test_bir8_timing() {
        assert_relative_eq!(PrepPulse::Bir8.duration(), 27.4, epsilon = 1e-12);
    }

    #[test]
    fn test_bir8_closed_form() {
        let params = PhysiologicalParams::default().with_relaxation(1000.0, 100.0, 1000.0);
        let start = MagnetizationState::new(0.4, 0.1, 0.8, 0.7);
        let out = PrepPulse::Bir8.terminal_state(&start, &params);

        let expected = 1.0 - 0.8 * (-0.22f64).exp() * (-0.75f64).exp();
        assert_relative_eq!(out.mz_free(), expected, epsilon = 1e-12);
        assert_eq!(out.transverse_magnitude(), 0.0);
        assert_eq!(out.mz_semisolid(), 0.0);
    }
}
