//! # Linear solver for the vertical operators
//!
//! The horizontal directions are diagonal in Fourier space, so every
//! implicit operator splits into independent dense vertical systems, one
//! per wavenumber pair. They are LU factorized once and reused until the
//! timestep changes.
pub mod hholtz;
pub mod poisson;
pub mod utils;
use crate::error::{Error, Result};
use crate::field::Space3;
pub use hholtz::Hholtz;
use ndarray::{s, Array1, Array2, Array3, OwnedRepr};
use ndarray_linalg::{FactorizeInto, LUFactorized, Solve as LinalgSolve};
use num_complex::Complex;
pub use poisson::Poisson;
use rayon::prelude::*;

/// Solve linear algebraic systems of the form: M x = b.
#[enum_dispatch]
pub trait Solve {
    /// Solves M x = b for every wavenumber column of `input`.
    ///
    /// # Errors
    /// Backend failure
    fn solve(&self, input: &Array3<Complex<f64>>, output: &mut Array3<Complex<f64>>)
        -> Result<()>;

    /// Solves the zero-wavenumber system for a real vertical profile
    ///
    /// # Errors
    /// Backend failure
    fn solve_profile(&self, input: &Array1<f64>) -> Result<Array1<f64>>;
}

/// Solver for field equations
#[enum_dispatch(Solve)]
pub enum SolverField {
    /// Helmholtz type solver
    Hholtz,
    /// Poisson solver
    Poisson,
}

/// LU factorizations of the vertical operator of every wavenumber pair
pub struct ColumnLu {
    n2: usize,
    lu: Vec<LUFactorized<OwnedRepr<f64>>>,
}

impl ColumnLu {
    /// Factorize `build(i, j)` for all pairs in parallel
    ///
    /// # Errors
    /// Singular operator
    pub fn new<F>(space: &Space3, build: F) -> Result<Self>
    where
        F: Fn(usize, usize) -> Array2<f64> + Sync,
    {
        let [m1, n2, _] = space.nspec;
        let lu = (0..m1 * n2)
            .into_par_iter()
            .map(|idx| {
                build(idx / n2, idx % n2)
                    .factorize_into()
                    .map_err(Error::from)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { n2, lu })
    }

    /// Solve all columns, real and imaginary part separately
    ///
    /// # Errors
    /// Backend failure
    pub fn solve(
        &self,
        input: &Array3<Complex<f64>>,
        output: &mut Array3<Complex<f64>>,
    ) -> Result<()> {
        let n2 = self.n2;
        let columns = self
            .lu
            .par_iter()
            .enumerate()
            .map(|(idx, lu)| -> Result<Vec<Complex<f64>>> {
                let col = input.slice(s![idx / n2, idx % n2, ..]);
                let re = lu.solve(&col.mapv(|c| c.re))?;
                let im = lu.solve(&col.mapv(|c| c.im))?;
                Ok(re
                    .iter()
                    .zip(im.iter())
                    .map(|(&r, &i)| Complex::new(r, i))
                    .collect::<Vec<_>>())
            })
            .collect::<Result<Vec<_>>>()?;
        for (idx, col) in columns.into_iter().enumerate() {
            output
                .slice_mut(s![idx / n2, idx % n2, ..])
                .assign(&Array1::from(col));
        }
        Ok(())
    }

    /// Solve the system of pair `(0, 0)`
    ///
    /// # Errors
    /// Backend failure
    pub fn solve_zero_mode(&self, input: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(self.lu[0].solve(input)?)
    }
}
