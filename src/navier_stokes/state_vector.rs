//! Perturbation state {u1, u2, u3, b} as a vector
//!
//! Used as the unknown of the Newton-Krylov solver and as the initial
//! condition of the direct-adjoint loop. The spectral coefficients are
//! the primary representation, nodal values are refreshed on demand.
use crate::error::Result;
use crate::field::io::{read_field, write_fields, ReadWrite};
use crate::field::{Bc, Field3, Space3};
use num_complex::Complex;
use std::sync::Arc;

/// Flow state vector
#[derive(Clone)]
pub struct StateVector {
    /// Streamwise velocity
    pub u1: Field3,
    /// Spanwise velocity
    pub u2: Field3,
    /// Vertical velocity
    pub u3: Field3,
    /// Buoyancy
    pub b: Field3,
}

impl StateVector {
    /// Zero state
    pub fn new(space: &Arc<Space3>) -> Self {
        Self {
            u1: Field3::new(space, Bc::Neumann),
            u2: Field3::new(space, Bc::Neumann),
            u3: Field3::new(space, Bc::Dirichlet),
            b: Field3::new(space, Bc::Neumann),
        }
    }

    fn fields(&self) -> [&Field3; 4] {
        [&self.u1, &self.u2, &self.u3, &self.b]
    }

    fn fields_mut(&mut self) -> [&mut Field3; 4] {
        [&mut self.u1, &mut self.u2, &mut self.u3, &mut self.b]
    }

    /// Volume inner product summed over all variables
    pub fn dot(&self, other: &StateVector) -> f64 {
        self.fields()
            .iter()
            .zip(other.fields().iter())
            .map(|(a, b)| a.inner_product(b, None))
            .sum()
    }

    /// Norm induced by [`StateVector::dot`]
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// self += a x
    pub fn axpy(&mut self, a: f64, x: &StateVector) {
        for (y, x) in self.fields_mut().iter_mut().zip(x.fields().iter()) {
            y.vhat.zip_mut_with(&x.vhat, |y, &x| *y += x * a);
        }
    }

    /// self *= a
    pub fn scale(&mut self, a: f64) {
        for field in self.fields_mut().iter_mut() {
            field.vhat.mapv_inplace(|c| c * a);
        }
    }

    /// Zero all variables
    pub fn zero(&mut self) {
        for field in self.fields_mut().iter_mut() {
            field.zero();
        }
    }

    /// Force every variable onto its boundary condition
    pub fn enforce_bcs(&mut self) {
        for field in self.fields_mut().iter_mut() {
            field.enforce_bc();
        }
    }

    /// Refresh nodal values
    pub fn backward(&mut self) {
        for field in self.fields_mut().iter_mut() {
            field.backward();
        }
    }

    /// Largest spectral coefficient, for diagnostics
    pub fn max_coefficient(&self) -> f64 {
        self.fields()
            .iter()
            .flat_map(|f| f.vhat.iter())
            .fold(0., |m: f64, c: &Complex<f64>| m.max(c.norm()))
    }
}

impl ReadWrite for StateVector {
    fn read(&mut self, filename: &str) -> Result<()> {
        for (index, field) in self.fields_mut().iter_mut().enumerate() {
            read_field(filename, index, &mut field.v)?;
            field.forward();
        }
        Ok(())
    }

    fn write(&self, filename: &str) -> Result<()> {
        let space = &self.u1.space;
        let nodal: Vec<_> = self
            .fields()
            .iter()
            .map(|f| space.backward_new(&f.vhat))
            .collect();
        write_fields(filename, &nodal.iter().collect::<Vec<_>>())
    }
}
