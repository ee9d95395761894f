//! Readout pulse trains
//!
//! Field generators for the two readout families. Both produce a trace of
//! `len` effective-field samples (Tesla) using rectangular pulses whose
//! amplitude gives the requested nutation over the pulse width:
//!
//! ```text
//! amplitude = flip·π / (180·γ·p_len·dt)      p_len = ceil(PW/dt)
//! ```
//!
//! - **Gradient echo**: an optional zero-field delay, then `ETL` echoes of
//!   `ceil(ESP/dt)` samples, each starting with one pulse along `(cos φ, sin φ)`.
//! - **Fast spin echo**: an excitation on x centred on the first pulse width,
//!   then refocusing pulses on y at the start of every echo spacing, walking a
//!   flip table and repeating the last entry until the block is full.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::physics::PhysicalConstants;

/// Flip table (degrees) used by spin-echo readouts unless one is supplied.
pub const DEFAULT_SPIN_ECHO_FLIPS: [f64; 17] = [
    90.0, 120.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0, 110.0, 120.0, 130.0, 140.0, 150.0,
    160.0, 170.0, 180.0,
];

fn samples(duration: f64, dt: f64) -> usize {
    (duration / dt).ceil() as usize
}

// =================================================================================================
// Gradient echo
// =================================================================================================

/// Gradient-echo train parameters (ms, degrees, radians).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientEcho {
    pub pulse_width: f64,
    pub echo_train_length: usize,
    pub delay: f64,
    pub echo_spacing: f64,
    pub flip_angle: f64,
    #[serde(default)]
    pub phase: f64,
}

impl Default for GradientEcho {
    fn default() -> Self {
        Self {
            pulse_width: 2.5,
            echo_train_length: 20,
            delay: 8.0,
            echo_spacing: 40.0,
            flip_angle: 30.0,
            phase: 0.0,
        }
    }
}

impl GradientEcho {
    /// `delay + ETL·ESP`
    pub fn duration(&self) -> f64 {
        self.delay + self.echo_train_length as f64 * self.echo_spacing
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.pulse_width > self.echo_spacing {
            return Err(SimError::PulseWidthExceedsEchoSpacing {
                pulse_width: self.pulse_width,
                echo_spacing: self.echo_spacing,
            });
        }
        if self.pulse_width <= 0.0 || self.delay < 0.0 {
            return Err(SimError::config(
                "gradient echo needs a positive pulse width and a non-negative delay",
            ));
        }
        if self.duration() <= 0.0 {
            return Err(SimError::config(format!(
                "gradient echo timing gives a non-positive block length ({} ms)",
                self.duration()
            )));
        }
        Ok(())
    }

    /// The centre of k-space is sampled right after the first pulse.
    pub fn sample_time(&self, dt: f64) -> f64 {
        self.delay + self.pulse_width + dt
    }

    /// Build the field trace for a block grid of `len` samples.
    pub fn pulse_train(
        &self,
        len: usize,
        dt: f64,
        constants: &PhysicalConstants,
    ) -> Result<Vec<Vector3<f64>>, SimError> {
        let p_len = samples(self.pulse_width, dt);
        let d_len = samples(self.delay, dt);
        let esp_len = samples(self.echo_spacing, dt);

        let required = d_len + self.echo_train_length * esp_len;
        if required > len {
            return Err(SimError::PulseTrainOverflow { required, available: len });
        }

        let amplitude = constants.rect_pulse_amplitude(self.flip_angle, p_len, dt);
        let pulse = Vector3::new(amplitude * self.phase.cos(), amplitude * self.phase.sin(), 0.0);

        let mut field = vec![Vector3::zeros(); len];
        for echo in 0..self.echo_train_length {
            let start = d_len + echo * esp_len;
            for sample in field.iter_mut().skip(start).take(p_len) {
                *sample = pulse;
            }
        }
        Ok(field)
    }
}

// =================================================================================================
// Fast spin echo
// =================================================================================================

/// Spin-echo train parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpinEcho {
    pub duration: f64,
    pub pulse_width: f64,
    pub echo_spacing: f64,
    pub flips: Vec<f64>,
    /// Repeat the last flip until the block is full.
    pub fill: bool,
}

impl SpinEcho {
    pub fn new(duration: f64, pulse_width: f64, echo_spacing: f64) -> Self {
        Self {
            duration,
            pulse_width,
            echo_spacing,
            flips: DEFAULT_SPIN_ECHO_FLIPS.to_vec(),
            fill: true,
        }
    }

    pub fn with_flips(mut self, flips: Vec<f64>) -> Self {
        self.flips = flips;
        self
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.pulse_width > self.echo_spacing {
            return Err(SimError::PulseWidthExceedsEchoSpacing {
                pulse_width: self.pulse_width,
                echo_spacing: self.echo_spacing,
            });
        }
        if self.duration <= 0.0 || self.pulse_width <= 0.0 {
            return Err(SimError::config("spin echo needs a positive duration and pulse width"));
        }
        if self.flips.is_empty() {
            return Err(SimError::config("spin echo flip table is empty"));
        }
        Ok(())
    }

    /// Sampled once, at the first echo.
    pub fn sample_time(&self) -> f64 {
        self.echo_spacing
    }

    pub fn pulse_train(
        &self,
        len: usize,
        dt: f64,
        constants: &PhysicalConstants,
    ) -> Result<Vec<Vector3<f64>>, SimError> {
        let p_len = samples(self.pulse_width, dt);
        let block_len = samples(self.echo_spacing, dt).max(1);
        let unit = constants.rect_pulse_amplitude(1.0, p_len, dt);

        let mut field = vec![Vector3::zeros(); len];

        // Excitation, centred on the first pulse width
        let first = self.flips[0] * unit;
        for sample in field.iter_mut().take(3 * p_len / 2).skip(p_len / 2) {
            sample.x = first;
        }

        let mut refocusing = self.flips[1..].iter().copied();
        let mut last = self.flips.last().copied().unwrap_or(0.0);
        let mut start = block_len;
        while start < len {
            let flip = match refocusing.next() {
                Some(flip) => flip,
                None if self.fill => last,
                None => break,
            };
            last = flip;

            for sample in field.iter_mut().skip(start).take(p_len) {
                sample.y = flip * unit;
            }
            start += block_len;
        }

        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_gre_duration_and_validation() {
        let gre = GradientEcho::default();
        assert_relative_eq!(gre.duration(), 808.0);
        assert!(gre.validate().is_ok());

        let wide = GradientEcho {
            pulse_width: 50.0,
            ..Default::default()
        };
        assert!(matches!(
            wide.validate(),
            Err(SimError::PulseWidthExceedsEchoSpacing { .. })
        ));
    }

    #[test]
    fn test_gre_pulse_train_layout_and_area() {
        let constants = PhysicalConstants::default();
        let gre = GradientEcho {
            pulse_width: 1.0,
            echo_train_length: 3,
            delay: 2.0,
            echo_spacing: 5.0,
            flip_angle: 90.0,
            phase: 0.0,
        };
        let dt = 0.5;
        let len = (gre.duration() / dt).ceil() as usize;
        let field = gre.pulse_train(len, dt, &constants).unwrap();

        assert_eq!(field.len(), 34);
        let on: Vec<usize> = (0..len).filter(|&i| field[i].x != 0.0).collect();
        assert_eq!(on, vec![4, 5, 14, 15, 24, 25]);

        // Two samples per pulse give exactly a quarter turn
        let angle = constants.gamma() * (field[4].x + field[5].x) * dt;
        assert_relative_eq!(angle, PI / 2.0, epsilon = 1e-12);
        assert!(field.iter().all(|b| b.y.abs() < 1e-30 && b.z == 0.0));
    }

    #[test]
    fn test_gre_overflow_is_an_error() {
        let gre = GradientEcho::default();
        let result = gre.pulse_train(10, 2.5, &PhysicalConstants::default());
        assert!(matches!(result, Err(SimError::PulseTrainOverflow { .. })));
    }

    #[test]
    fn test_gre_phase_rotates_pulse_axis() {
        let gre = GradientEcho {
            phase: PI / 2.0,
            ..Default::default()
        };
        let field = gre.pulse_train(324, 2.5, &PhysicalConstants::default()).unwrap();
        let pulse = field[4];
        assert!(pulse.x.abs() < 1e-20);
        assert!(pulse.y > 0.0);
    }

    #[test]
    fn test_fse_pulse_train() {
        let constants = PhysicalConstants::default();
        let fse = SpinEcho::new(50.0, 2.0, 10.0).with_flips(vec![90.0, 180.0]);
        let dt = 1.0;
        let field = fse.pulse_train(50, dt, &constants).unwrap();

        // Excitation on x over samples 1..3
        assert!(field[0].x == 0.0 && field[1].x > 0.0 && field[2].x > 0.0 && field[3].x == 0.0);
        // Refocusing on y at every echo spacing, last flip repeated
        for start in [10, 20, 30, 40] {
            assert_relative_eq!(field[start].y, 2.0 * field[1].x, epsilon = 1e-18);
            assert_eq!(field[start + 2].y, 0.0);
        }
    }

    #[test]
    fn test_fse_without_fill_stops_after_table() {
        let mut fse = SpinEcho::new(50.0, 2.0, 10.0).with_flips(vec![90.0, 180.0]);
        fse.fill = false;
        let field = fse.pulse_train(50, 1.0, &PhysicalConstants::default()).unwrap();
        assert!(field[10].y > 0.0);
        assert_eq!(field[20].y, 0.0);
    }
}
