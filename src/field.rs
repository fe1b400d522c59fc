//! # Fields on the three dimensional spectral space
//! A field stores its values in physical space (v) and
//! spectral space (vhat), together with a boundary condition tag
//! for the vertical walls.
//!
//! Differentiating a field in the vertical direction swaps its tag:
//! the derivative of a zero-derivative field vanishes at the walls and
//! vice versa. Horizontal derivatives keep the tag.
pub mod average;
pub mod io;
mod space;
use crate::error::{Error, Result};
use ndarray::{s, Array1, Array3, Axis, Zip};
use num_complex::Complex;
use num_traits::Zero;
pub use space::Space3;
use std::sync::Arc;

/// Vertical boundary condition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bc {
    /// Zero derivative at the walls (bounded quantities)
    Neumann,
    /// Zero value at the walls (decaying quantities)
    Dirichlet,
}

impl Bc {
    /// Tag of the vertical derivative of a field with this tag
    pub fn derivative(self) -> Self {
        match self {
            Self::Neumann => Self::Dirichlet,
            Self::Dirichlet => Self::Neumann,
        }
    }

    /// Tag of the derivative along `axis`
    pub fn derivative_along(self, axis: usize) -> Self {
        if axis == 2 {
            self.derivative()
        } else {
            self
        }
    }

    /// Tag of the pointwise product of two fields
    pub fn product(self, other: Self) -> Self {
        if self == other {
            Self::Neumann
        } else {
            Self::Dirichlet
        }
    }
}

/// Scalar field in three dimensions
///
/// # Example
/// ```
/// use stratiform::field::{Bc, Field3, Space3};
/// use std::sync::Arc;
///
/// let space = Arc::new(Space3::new([8, 1, 9], [1., 1., 1.]));
/// let mut field = Field3::new(&space, Bc::Neumann);
/// field.set_nodal(|x, _, z| x.sin() * z);
/// field.backward();
/// ```
#[derive(Clone)]
pub struct Field3 {
    /// Shared space
    pub space: Arc<Space3>,
    /// Field in physical space
    pub v: Array3<f64>,
    /// Field in spectral space
    pub vhat: Array3<Complex<f64>>,
    bc: Bc,
}

impl Field3 {
    /// Zero field on `space`
    pub fn new(space: &Arc<Space3>, bc: Bc) -> Self {
        Self {
            space: Arc::clone(space),
            v: space.ndarray_physical(),
            vhat: space.ndarray_spectral(),
            bc,
        }
    }

    /// Boundary condition, fixed at construction
    pub fn bc(&self) -> Bc {
        self.bc
    }

    /// Forward transformation (to modal)
    pub fn forward(&mut self) {
        self.space.forward(&self.v, &mut self.vhat);
    }

    /// Backward transformation (to nodal)
    pub fn backward(&mut self) {
        self.space.backward(&self.vhat, &mut self.v);
    }

    /// Set physical values from `f(x, y, z)` and transform forward
    pub fn set_nodal<F: Fn(f64, f64, f64) -> f64>(&mut self, f: F) {
        let x = &self.space.x;
        for ((i, j, k), v) in self.v.indexed_iter_mut() {
            *v = f(x[0][i], x[1][j], x[2][k]);
        }
        self.forward();
    }

    /// Zero both representations
    pub fn zero(&mut self) {
        self.v.fill(0.);
        self.vhat.fill(Complex::zero());
    }

    /// Gradient along `axis` (0: x, 1: y, 2: z) in spectral space
    pub fn gradient(&self, axis: usize) -> Array3<Complex<f64>> {
        self.space.gradient(&self.vhat, axis)
    }

    /// Streamwise derivative
    pub fn ddx(&self) -> Array3<Complex<f64>> {
        self.gradient(0)
    }

    /// Spanwise derivative
    pub fn ddy(&self) -> Array3<Complex<f64>> {
        self.gradient(1)
    }

    /// Vertical derivative
    pub fn ddz(&self) -> Array3<Complex<f64>> {
        self.gradient(2)
    }

    /// Second derivative along `axis`
    pub fn second_derivative(&self, axis: usize) -> Array3<Complex<f64>> {
        self.space.second_derivative(&self.vhat, axis)
    }

    /// Laplacian in spectral space
    pub fn laplacian(&self) -> Array3<Complex<f64>> {
        self.space.laplacian(&self.vhat)
    }

    /// Differentiate into `out`, which must carry the derivative's tag
    ///
    /// # Errors
    /// `out` has the wrong boundary condition
    pub fn differentiate(&self, axis: usize, out: &mut Field3) -> Result<()> {
        let expected = self.bc.derivative_along(axis);
        if out.bc != expected {
            return Err(Error::BcMismatch {
                expected,
                found: out.bc,
            });
        }
        out.vhat.assign(&self.gradient(axis));
        out.backward();
        Ok(())
    }

    /// Zero first and last vertical entry of every column
    pub fn zero_ends(&mut self) {
        zero_ends(&mut self.vhat);
    }

    /// Force the spectral state onto the boundary conditions
    ///
    /// Dirichlet: wall values are set to zero. Neumann: wall values are
    /// replaced such that the discrete wall derivative vanishes.
    pub fn enforce_bc(&mut self) {
        match self.bc {
            Bc::Dirichlet => zero_ends(&mut self.vhat),
            Bc::Neumann => {
                let d = &self.space.d1;
                let last = d.nrows() - 1;
                let (a, b, c, e) = (d[[0, 0]], d[[0, last]], d[[last, 0]], d[[last, last]]);
                let det = a * e - b * c;
                Zip::from(self.vhat.lanes_mut(Axis(2))).par_for_each(|mut lane| {
                    let mut s0 = Complex::<f64>::zero();
                    let mut s1 = Complex::<f64>::zero();
                    for j in 1..last {
                        s0 += lane[j] * d[[0, j]];
                        s1 += lane[j] * d[[last, j]];
                    }
                    lane[0] = (-s0 * e + s1 * b) / det;
                    lane[last] = (-s1 * a + s0 * c) / det;
                });
            }
        }
    }

    /// Dealias and clean unused coefficients
    pub fn filter(&mut self) {
        self.space.filter(&mut self.vhat);
    }

    /// Maximum absolute value in physical space
    pub fn max_abs(&self) -> f64 {
        self.v.iter().fold(0., |m, x| f64::max(m, x.abs()))
    }
}

/// Zero first and last vertical entry of every wavenumber column
pub fn zero_ends(vhat: &mut Array3<Complex<f64>>) {
    let last = vhat.shape()[2] - 1;
    vhat.slice_mut(s![.., .., 0]).fill(Complex::zero());
    vhat.slice_mut(s![.., .., last]).fill(Complex::zero());
}

/// Vertical profile, used for background states
#[derive(Clone)]
pub struct Field1 {
    /// Shared space
    pub space: Arc<Space3>,
    /// Values on the vertical grid
    pub v: Array1<f64>,
    bc: Bc,
}

impl Field1 {
    /// Zero profile
    pub fn new(space: &Arc<Space3>, bc: Bc) -> Self {
        Self {
            space: Arc::clone(space),
            v: Array1::zeros(space.n[2]),
            bc,
        }
    }

    /// Boundary condition
    pub fn bc(&self) -> Bc {
        self.bc
    }

    /// Set values from `f(z)`
    pub fn set_nodal<F: Fn(f64) -> f64>(&mut self, f: F) {
        let z = &self.space.x[2];
        self.v = z.mapv(f);
    }

    /// Vertical derivative
    pub fn ddz(&self) -> Array1<f64> {
        self.space.d1.dot(&self.v)
    }

    /// Second vertical derivative
    pub fn d2z(&self) -> Array1<f64> {
        self.space.d2.dot(&self.v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn approx_eq(result: &Array3<f64>, expected: &Array3<f64>, tol: f64) {
        for (a, b) in result.iter().zip(expected.iter()) {
            assert!(
                (a - b).abs() < tol,
                "Large difference of values, got {} expected {}.",
                a,
                b
            );
        }
    }

    fn space(n: [usize; 3], l: [f64; 3]) -> Arc<Space3> {
        Arc::new(Space3::new(n, l))
    }

    #[test]
    fn test_round_trip() {
        use ndarray_rand::rand_distr::Uniform;
        use ndarray_rand::RandomExt;
        let space = space([10, 6, 11], [3., 2., 1.]);
        for bc in [Bc::Neumann, Bc::Dirichlet] {
            let mut field = Field3::new(&space, bc);
            field.v = Array3::random(space.n, Uniform::new(-1., 1.));
            let expected = field.v.to_owned();
            field.forward();
            field.v.fill(0.);
            field.backward();
            approx_eq(&field.v, &expected, 1e-12);
        }
    }

    #[test]
    fn test_round_trip_two_dimensional() {
        let space = space([16, 1, 9], [5., 1., 2.]);
        let mut field = Field3::new(&space, Bc::Dirichlet);
        field.set_nodal(|x, _, z| (2. * PI * x / 5.).sin() * (1. - z * z / 4.) + 0.3);
        let expected = field.v.to_owned();
        field.backward();
        approx_eq(&field.v, &expected, 1e-12);
    }

    #[test]
    fn test_tanh_derivatives() {
        let (n3, l3) = (64, 3.);
        let space = space([4, 1, n3], [1., 1., l3]);
        let mut field = Field3::new(&space, Bc::Neumann);
        field.set_nodal(|_, _, z| z.tanh());

        let mut dz = Field3::new(&space, Bc::Dirichlet);
        field.differentiate(2, &mut dz).unwrap();
        let mut expected = space.ndarray_physical();
        expected.indexed_iter_mut().for_each(|((_, _, k), e)| {
            *e = 1. / space.x[2][k].cosh().powi(2);
        });
        approx_eq(&dz.v, &expected, 1e-7);

        let mut d2 = field.second_derivative(2);
        let mut out = Field3::new(&space, Bc::Neumann);
        std::mem::swap(&mut out.vhat, &mut d2);
        out.backward();
        expected.indexed_iter_mut().for_each(|((_, _, k), e)| {
            let z = space.x[2][k];
            *e = -2. * z.tanh() / z.cosh().powi(2);
        });
        approx_eq(&out.v, &expected, 1e-5);
    }

    #[test]
    fn test_tag_transitions() {
        assert_eq!(Bc::Neumann.derivative(), Bc::Dirichlet);
        assert_eq!(Bc::Dirichlet.derivative_along(0), Bc::Dirichlet);
        assert_eq!(Bc::Dirichlet.product(Bc::Dirichlet), Bc::Neumann);
        assert_eq!(Bc::Neumann.product(Bc::Dirichlet), Bc::Dirichlet);
    }

    #[test]
    fn test_differentiate_checks_tag() {
        let space = space([4, 1, 8], [1., 1., 1.]);
        let field = Field3::new(&space, Bc::Neumann);
        let mut wrong = Field3::new(&space, Bc::Neumann);
        assert!(matches!(
            field.differentiate(2, &mut wrong),
            Err(Error::BcMismatch { .. })
        ));
        // horizontal derivatives keep the tag
        assert!(field.differentiate(0, &mut wrong).is_ok());
    }

    #[test]
    fn test_fourier_derivatives() {
        let (l1, l2) = (3., 2.5);
        let space = space([20, 12, 5], [l1, l2, 1.]);
        let mut field = Field3::new(&space, Bc::Neumann);
        let a = 2. * PI / l1;
        field.set_nodal(|x, _, _| (a * x).cos());
        let mut out = Field3::new(&space, Bc::Neumann);
        field.differentiate(0, &mut out).unwrap();
        let mut expected = space.ndarray_physical();
        expected
            .indexed_iter_mut()
            .for_each(|((i, _, _), e)| *e = -a * (a * space.x[0][i]).sin());
        approx_eq(&out.v, &expected, 1e-10);

        out.vhat.assign(&field.second_derivative(0));
        out.backward();
        expected
            .indexed_iter_mut()
            .for_each(|((i, _, _), e)| *e = -a * a * (a * space.x[0][i]).cos());
        approx_eq(&out.v, &expected, 1e-10);

        let b = 2. * PI / l2;
        field.set_nodal(|_, y, _| (b * y).sin());
        field.differentiate(1, &mut out).unwrap();
        expected
            .indexed_iter_mut()
            .for_each(|((_, j, _), e)| *e = b * (b * space.x[1][j]).cos());
        approx_eq(&out.v, &expected, 1e-10);
    }

    #[test]
    fn test_enforce_bc() {
        let space = space([4, 1, 12], [1., 1., 2.]);
        let mut field = Field3::new(&space, Bc::Neumann);
        field.set_nodal(|x, _, z| (1. + z + z * z) * (2. * PI * x).cos());
        field.enforce_bc();
        let dz = field.ddz();
        for c in dz.slice(s![.., .., 0]).iter().chain(dz.slice(s![.., .., 11])) {
            assert!(c.norm() < 1e-10);
        }
        let mut field = Field3::new(&space, Bc::Dirichlet);
        field.set_nodal(|_, _, z| 1. + z);
        field.enforce_bc();
        field.backward();
        assert!(field.v[[0, 0, 0]].abs() < 1e-14);
        assert!(field.v[[2, 0, 11]].abs() < 1e-14);
    }

    #[test]
    fn test_profile_derivative() {
        let space = space([4, 1, 16], [1., 1., 1.]);
        let mut profile = Field1::new(&space, Bc::Neumann);
        profile.set_nodal(|z| z.powi(3));
        let dz = profile.ddz();
        for (d, z) in dz.iter().zip(space.x[2].iter()) {
            assert!((d - 3. * z * z).abs() < 1e-10);
        }
    }
}
