//! Poisson solver of the pressure projection
//!
//! (D2 - k1^2 - k2^2) x = b, with zero-derivative walls. The constant
//! null space of the zero wavenumber pair is removed by pinning the
//! value at the top wall.
use super::utils::{neumannify, pin_first_row};
use super::{ColumnLu, Solve};
use crate::error::Result;
use crate::field::Space3;
use ndarray::{Array1, Array3};
use num_complex::Complex;

/// Poisson solver for the pseudo pressure
pub struct Poisson {
    columns: ColumnLu,
}

impl Poisson {
    /// Factorize the Laplacian of every wavenumber pair
    ///
    /// # Errors
    /// Singular operator
    pub fn new(space: &Space3) -> Result<Self> {
        let n3 = space.n[2];
        let columns = ColumnLu::new(space, |i, j| {
            let kk = space.k1sq[i] + space.k2sq[j];
            let mut mat = space.d2.to_owned();
            for d in 0..n3 {
                mat[[d, d]] -= kk;
            }
            neumannify(&mut mat, &space.d1);
            if i == 0 && j == 0 {
                pin_first_row(&mut mat);
            }
            mat
        })?;
        Ok(Self { columns })
    }
}

impl Solve for Poisson {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{zero_ends, Bc, Field3};
    use std::f64::consts::PI;
    use std::sync::Arc;

    #[test]
    fn test_poisson_manufactured() {
        let (l1, l3) = (14., 7.);
        let space = Arc::new(Space3::new([8, 4, 96], [l1, 3.5, l3]));
        let a = 2. * PI / l1;
        let mut rhs = Field3::new(&space, Bc::Neumann);
        rhs.set_nodal(|x, _, z| {
            let zz = (z + 2.) * (z + 2.);
            (4. * zz - 2. - a * a) * (-zz).exp() * (a * x).sin()
        });
        zero_ends(&mut rhs.vhat);

        let solver = Poisson::new(&space).unwrap();
        let mut result = Field3::new(&space, Bc::Neumann);
        solver.solve(&rhs.vhat, &mut result.vhat).unwrap();
        result.backward();
        for ((i, _, k), r) in result.v.indexed_iter() {
            let (x, z) = (space.x[0][i], space.x[2][k]);
            let e = (-(z + 2.) * (z + 2.)).exp() * (a * x).sin();
            assert!((r - e).abs() < 1e-7, "got {} expected {}", r, e);
        }
    }

    #[test]
    fn test_poisson_zero_mode_pinned() {
        let space = Space3::new([4, 1, 17], [1., 1., 1.]);
        let solver = Poisson::new(&space).unwrap();
        // q'' = 2, pinned q(1) = 0 and q'(-1) = 0: q = z^2 + 2z - 3
        let z = &space.x[2];
        let mut rhs = z.mapv(|_| 2.);
        let last = rhs.len() - 1;
        rhs[0] = 0.;
        rhs[last] = 0.;
        let q = solver.solve_profile(&rhs).unwrap();
        for (q, z) in q.iter().zip(z.iter()) {
            assert!((q - (z * z + 2. * z - 3.)).abs() < 1e-10);
        }
    }
}
