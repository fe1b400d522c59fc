//! Physical and numerical parameters of a run
use crate::error::{Error, Result};

/// Parameters of the stratified shear flow problem
///
/// The vertical domain is `[-l3, l3]`, horizontal directions are periodic
/// with lengths `l1` (streamwise) and `l2` (spanwise). `n2 == 1` selects
/// the two-dimensional (x, z) configuration.
#[derive(Clone, Debug)]
pub struct Params {
    /// Streamwise grid points
    pub n1: usize,
    /// Spanwise grid points
    pub n2: usize,
    /// Vertical (Chebyshev) grid points
    pub n3: usize,
    /// Streamwise period
    pub l1: f64,
    /// Spanwise period
    pub l2: f64,
    /// Vertical half-height
    pub l3: f64,
    /// Reynolds number
    pub re: f64,
    /// Peclet number
    pub pe: f64,
    /// Bulk Richardson number
    pub ri: f64,
    /// Initial timestep
    pub dt: f64,
    /// Upper bound for adaptive timesteps
    pub max_dt: f64,
    /// Courant number targeted by timestep adaption
    pub target_cfl: f64,
    /// Diffuse the background profiles along with the perturbation
    pub evolve_background: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            n1: 64,
            n2: 1,
            n3: 65,
            l1: 16.,
            l2: 4.,
            l3: 5.,
            re: 1000.,
            pe: 1000.,
            ri: 0.16,
            dt: 0.01,
            max_dt: 0.1,
            target_cfl: 0.4,
            evolve_background: false,
        }
    }
}

impl Params {
    /// Two-dimensional flows skip every spanwise term
    pub fn three_dimensional(&self) -> bool {
        self.n2 > 1
    }

    /// Check sizes and physical constants
    ///
    /// # Errors
    /// Non-positive lengths, numbers or timestep, or grids too small
    /// for a Chebyshev collocation.
    pub fn validate(&self) -> Result<()> {
        if self.n1 < 2 || self.n2 < 1 || self.n3 < 4 {
            return Err(Error::Config(format!(
                "grid too small: {} x {} x {}",
                self.n1, self.n2, self.n3
            )));
        }
        if self.n1 % 2 != 0 || (self.n2 > 1 && self.n2 % 2 != 0) {
            return Err(Error::Config(
                "periodic directions need an even number of points".to_string(),
            ));
        }
        for (name, value) in [
            ("l1", self.l1),
            ("l2", self.l2),
            ("l3", self.l3),
            ("re", self.re),
            ("pe", self.pe),
            ("dt", self.dt),
            ("max_dt", self.max_dt),
            ("target_cfl", self.target_cfl),
        ] {
            if !(value > 0.) {
                return Err(Error::Config(format!("{} must be positive, got {}", name, value)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Params::default().validate().is_ok());
    }

    #[test]
    fn test_reject_odd_periodic_grid() {
        let params = Params {
            n1: 15,
            ..Params::default()
        };
        assert!(matches!(params.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_reject_negative_reynolds() {
        let params = Params {
            re: -1.,
            ..Params::default()
        };
        assert!(params.validate().is_err());
    }
}
