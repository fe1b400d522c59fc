//! Implicit diffusion operator of one Runge-Kutta stage
//!
//! (I - c (D2 - k1^2 - k2^2)) x = b
use super::utils::apply_bc_rows;
use super::{ColumnLu, Solve};
use crate::error::Result;
use crate::field::{Bc, Space3};
use ndarray::{Array1, Array3};
use num_complex::Complex;

/// Helmholtz solver with wall rows for `bc`
pub struct Hholtz {
    columns: ColumnLu,
    /// Diffusion coefficient
    pub c: f64,
    /// Boundary condition enforced by the wall rows
    pub bc: Bc,
}

impl Hholtz {
    /// Factorize operators for every wavenumber pair
    ///
    /// # Errors
    /// Singular operator
    pub fn new(space: &Space3, c: f64, bc: Bc) -> Result<Self> {
        let n3 = space.n[2];
        let columns = ColumnLu::new(space, |i, j| {
            let kk = space.k1sq[i] + space.k2sq[j];
            let mut mat = &space.d2 * (-c);
            for d in 0..n3 {
                mat[[d, d]] += 1. + c * kk;
            }
            apply_bc_rows(&mut mat, &space.d1, bc);
            mat
        })?;
        Ok(Self { columns, c, bc })
    }
}

impl Solve for Hholtz {
    fn solve(
        &self,
        input: &Array3<Complex<f64>>,
        output: &mut Array3<Complex<f64>>,
    ) -> Result<()> {
        self.columns.solve(input, output)
    }

    fn solve_profile(&self, input: &Array1<f64>) -> Result<Array1<f64>> {
        self.columns.solve_zero_mode(input)
    }
}
