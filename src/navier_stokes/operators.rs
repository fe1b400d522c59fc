//! Implicit operators of the three Runge-Kutta substeps
//!
//! Every substep k solves
//! (I - h_k / (2 Re) (D2 - k1^2 - k2^2)) u = R
//! per wavenumber pair, with wall rows replaced by the boundary condition
//! of the field. The factorizations depend on the timestep and are
//! rebuilt whenever it changes.
use crate::error::Result;
use crate::field::{Bc, Space3};
use crate::solver::{Hholtz, SolverField};

/// Substep lengths as fractions of the timestep
pub const SUBSTEPS: [f64; 3] = [8. / 15., 2. / 15., 5. / 15.];

/// Weights of the explicit terms of the current substep
pub const BETA: [f64; 3] = [1., 25. / 8., 9. / 4.];

/// Weights of the explicit terms of the previous substep
pub const ZETA: [f64; 3] = [0., -17. / 8., -5. / 4.];

/// Substep lengths for timestep `dt`
pub fn substeps(dt: f64) -> [f64; 3] {
    [dt * SUBSTEPS[0], dt * SUBSTEPS[1], dt * SUBSTEPS[2]]
}

/// Factorized Crank-Nicolson operators, one per substep
pub struct ImexOperators {
    /// Zero-derivative velocities (u1, u2)
    pub velocity_neumann: Vec<SolverField>,
    /// Zero-value velocity (u3)
    pub velocity_dirichlet: Vec<SolverField>,
    /// Buoyancy, diffusing with the Peclet number
    pub buoyancy: Vec<SolverField>,
}

impl ImexOperators {
    /// Build and factorize all operators for substeps `h`
    ///
    /// # Errors
    /// Singular operator
    pub fn new(space: &Space3, h: &[f64; 3], re: f64, pe: f64) -> Result<Self> {
        log::debug!("Factorizing implicit operators for h = {:?}", h);
        let mut velocity_neumann = Vec::with_capacity(3);
        let mut velocity_dirichlet = Vec::with_capacity(3);
        let mut buoyancy = Vec::with_capacity(3);
        for hk in h {
            let nu = 0.5 * hk / re;
            let ka = 0.5 * hk / pe;
            velocity_neumann.push(SolverField::Hholtz(Hholtz::new(space, nu, Bc::Neumann)?));
            velocity_dirichlet.push(SolverField::Hholtz(Hholtz::new(
                space,
                nu,
                Bc::Dirichlet,
            )?));
            buoyancy.push(SolverField::Hholtz(Hholtz::new(space, ka, Bc::Neumann)?));
        }
        Ok(Self {
            velocity_neumann,
            velocity_dirichlet,
            buoyancy,
        })
    }

    /// Operator of variable `var` (0: u1, 1: u2, 2: u3, 3: b) at substep `k`
    pub fn get(&self, var: usize, k: usize) -> &SolverField {
        match var {
            0 | 1 => &self.velocity_neumann[k],
            2 => &self.velocity_dirichlet[k],
            _ => &self.buoyancy[k],
        }
    }
}
