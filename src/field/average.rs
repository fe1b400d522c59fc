//! Averages and integrals of fields
//!
//! Volume integrals are evaluated in spectral space: Parseval's identity in
//! the horizontal directions and Clenshaw-Curtis quadrature in the vertical.
use super::{Field3, Space3};
use crate::bases::fourier::is_nyquist;
use ndarray::{Array1, Array3, Axis, Zip};
use num_complex::Complex;

impl Space3 {
    /// Integral of a vertical profile over `[-l3, l3]`
    pub fn integrate_vertically(&self, profile: &Array1<f64>) -> f64 {
        self.quad.dot(profile)
    }

    /// Horizontal average of a spectral field at every height
    pub fn horizontal_average(&self, vhat: &Array3<Complex<f64>>) -> Array1<f64> {
        vhat.slice(ndarray::s![0, 0, ..]).mapv(|c| c.re)
    }

    /// Volume integral of `a * b * weight(z)`
    pub fn inner_product(
        &self,
        a: &Array3<Complex<f64>>,
        b: &Array3<Complex<f64>>,
        weight: Option<&Array1<f64>>,
    ) -> f64 {
        let n1 = self.n[0];
        let quad = match weight {
            Some(w) => &self.quad * w,
            None => self.quad.to_owned(),
        };
        let mut sum = 0.;
        Zip::indexed(a).and(b).for_each(|(i, _, k), &x, &y| {
            // modes with an unstored conjugate partner count twice
            let c = if i == 0 || is_nyquist(i, n1) { 1. } else { 2. };
            sum += c * quad[k] * (x.conj() * y).re;
        });
        sum * self.lengths[0] * self.lengths[1]
    }
}

/// Horizontal mean of a nodal array at every height
pub fn horizontal_mean(v: &Array3<f64>) -> Array1<f64> {
    let n = (v.shape()[0] * v.shape()[1]) as f64;
    v.sum_axis(Axis(0)).sum_axis(Axis(0)) / n
}

impl Field3 {
    /// Horizontal average at every height
    pub fn horizontal_average(&self) -> Array1<f64> {
        self.space.horizontal_average(&self.vhat)
    }

    /// Volume integral of the product with `other`, optionally weighted
    /// by a vertical profile
    pub fn inner_product(&self, other: &Field3, weight: Option<&Array1<f64>>) -> f64 {
        self.space.inner_product(&self.vhat, &other.vhat, weight)
    }
}
