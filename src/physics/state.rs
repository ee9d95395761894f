//! Four-component magnetization state `[Mx, My, Mz_free, Mz_semisolid]`.

use std::fmt;
use std::ops::Index;

use nalgebra::Vector4;

/// Magnetization of a single isochromat.
///
/// Components 0 and 1 are the transverse free-water magnetization, component 2
/// the longitudinal free-water magnetization and component 3 the longitudinal
/// semisolid magnetization. The state is carried block to block by value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MagnetizationState(Vector4<f64>);

impl MagnetizationState {
    pub fn new(mx: f64, my: f64, mz_free: f64, mz_semisolid: f64) -> Self {
        Self(Vector4::new(mx, my, mz_free, mz_semisolid))
    }

    /// Fully relaxed state `[0, 0, 1, 1]`.
    pub fn equilibrium() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn mx(&self) -> f64 { self.0[0] }
    pub fn my(&self) -> f64 { self.0[1] }
    pub fn mz_free(&self) -> f64 { self.0[2] }
    pub fn mz_semisolid(&self) -> f64 { self.0[3] }

    /// ‖(Mx, My)‖₂
    pub fn transverse_magnitude(&self) -> f64 {
        self.0[0].hypot(self.0[1])
    }

    /// Ideal spoiling: both transverse components become exactly zero.
    pub fn crush(&mut self) {
        self.0[0] = 0.0;
        self.0[1] = 0.0;
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn as_vector(&self) -> &Vector4<f64> {
        &self.0
    }

    pub fn into_vector(self) -> Vector4<f64> {
        self.0
    }
}

impl Default for MagnetizationState {
    fn default() -> Self {
        Self::equilibrium()
    }
}

impl From<Vector4<f64>> for MagnetizationState {
    fn from(vector: Vector4<f64>) -> Self {
        Self(vector)
    }
}

impl From<MagnetizationState> for Vector4<f64> {
    fn from(state: MagnetizationState) -> Self {
        state.0
    }
}

impl Index<usize> for MagnetizationState {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl fmt::Display for MagnetizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.6}, {:.6}, {:.6}, {:.6}]",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equilibrium_is_default() {
        let state = MagnetizationState::default();
        assert_eq!(state, MagnetizationState::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(state.transverse_magnitude(), 0.0);
    }

    #[test]
    fn test_crush_zeroes_transverse_only() {
        let mut state = MagnetizationState::new(0.3, -0.7, 0.2, 0.9);
        state.crush();
        assert_eq!(state.mx(), 0.0);
        assert_eq!(state.my(), 0.0);
        assert_eq!(state.mz_free(), 0.2);
        assert_eq!(state.mz_semisolid(), 0.9);
    }

    #[test]
    fn test_transverse_magnitude() {
        let state = MagnetizationState::new(3.0, 4.0, 0.0, 0.0);
        assert!((state.transverse_magnitude() - 5.0).abs() < 1e-15);
    }

    #[test]
    fn test_non_finite_detection() {
        assert!(MagnetizationState::equilibrium().is_finite());
        assert!(!MagnetizationState::new(f64::NAN, 0.0, 1.0, 1.0).is_finite());
    }
}
