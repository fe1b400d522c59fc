//! Three dimensional spectral space: Fourier x Fourier x Chebyshev
//!
//! Physical arrays have shape `(n1, n2, n3)`, spectral arrays
//! `(n1/2 + 1, n2, n3)`. The horizontal directions are transformed with
//! a real-to-complex and a complex-to-complex Fourier transform, normalized
//! such that coefficients are amplitudes. The vertical direction stays on
//! Chebyshev-Gauss-Lobatto points, where derivatives are collocation
//! matrix products.
use crate::bases::{chebyshev, fourier};
use crate::error::Result;
use crate::params::Params;
use ndarray::{s, Array1, Array2, Array3, Axis, Zip};
use num_complex::Complex;
use num_traits::Zero;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Grid, transforms and derivative operators shared by all fields
#[derive(Clone)]
pub struct Space3 {
    /// Number of physical grid points
    pub n: [usize; 3],
    /// Number of spectral coefficients
    pub nspec: [usize; 3],
    /// Period of horizontal directions, half-height of vertical direction
    pub lengths: [f64; 3],
    /// Grid coordinates
    pub x: [Array1<f64>; 3],
    /// Streamwise multipliers of the first derivative
    pub k1: Array1<f64>,
    /// Spanwise multipliers of the first derivative
    pub k2: Array1<f64>,
    /// Squared streamwise wavenumbers
    pub k1sq: Array1<f64>,
    /// Squared spanwise wavenumbers
    pub k2sq: Array1<f64>,
    /// Vertical first derivative
    pub d1: Array2<f64>,
    /// Vertical second derivative
    pub d2: Array2<f64>,
    /// Vertical quadrature weights
    pub quad: Array1<f64>,
    mask1: Array1<bool>,
    mask2: Array1<bool>,
    fft1: Arc<dyn Fft<f64>>,
    ifft1: Arc<dyn Fft<f64>>,
    fft2: Arc<dyn Fft<f64>>,
    ifft2: Arc<dyn Fft<f64>>,
}

impl Space3 {
    /// Build space for `n1 x n2 x n3` points on `[0,l1) x [0,l2) x [-l3,l3]`
    pub fn new(n: [usize; 3], lengths: [f64; 3]) -> Self {
        let [n1, n2, n3] = n;
        let [l1, l2, l3] = lengths;
        let mut planner = FftPlanner::new();
        let x1 = Array1::from_iter((0..n1).map(|i| l1 * i as f64 / n1 as f64));
        let x2 = Array1::from_iter((0..n2).map(|i| l2 * i as f64 / n2 as f64));
        let d1 = chebyshev::derivative_matrix(n3, l3);
        let d2 = chebyshev::second_derivative_matrix(&d1);
        Self {
            n,
            nspec: [fourier::n_spec(n1, true), n2, n3],
            lengths,
            x: [x1, x2, chebyshev::points(n3, l3)],
            k1: fourier::derivative_wavenumbers(n1, l1, true),
            k2: fourier::derivative_wavenumbers(n2, l2, false),
            k1sq: fourier::wavenumbers(n1, l1, true).mapv(|k| k * k),
            k2sq: fourier::wavenumbers(n2, l2, false).mapv(|k| k * k),
            d1,
            d2,
            quad: chebyshev::quadrature_weights(n3, l3),
            mask1: fourier::dealias_mask(n1, true),
            mask2: fourier::dealias_mask(n2, false),
            fft1: planner.plan_fft_forward(n1),
            ifft1: planner.plan_fft_inverse(n1),
            fft2: planner.plan_fft_forward(n2),
            ifft2: planner.plan_fft_inverse(n2),
        }
    }

    /// Build space from run parameters
    ///
    /// # Errors
    /// Invalid parameters
    pub fn from_params(params: &Params) -> Result<Arc<Self>> {
        params.validate()?;
        Ok(Arc::new(Self::new(
            [params.n1, params.n2, params.n3],
            [params.l1, params.l2, params.l3],
        )))
    }

    /// Shape of physical arrays
    pub fn shape_physical(&self) -> [usize; 3] {
        self.n
    }

    /// Shape of spectral arrays
    pub fn shape_spectral(&self) -> [usize; 3] {
        self.nspec
    }

    /// New zero array in physical space
    pub fn ndarray_physical(&self) -> Array3<f64> {
        Array3::zeros(self.n)
    }

    /// New zero array in spectral space
    pub fn ndarray_spectral(&self) -> Array3<Complex<f64>> {
        Array3::zeros(self.nspec)
    }

    /// Number of horizontal wavenumber pairs (independent vertical columns)
    pub fn n_pairs(&self) -> usize {
        self.nspec[0] * self.nspec[1]
    }

    /// Physical -> spectral
    pub fn forward(&self, v: &Array3<f64>, vhat: &mut Array3<Complex<f64>>) {
        let n1 = self.n[0];
        let n2 = self.n[1];
        let m1 = self.nspec[0];
        let norm1 = 1. / n1 as f64;
        Zip::from(vhat.lanes_mut(Axis(0)))
            .and(v.lanes(Axis(0)))
            .par_for_each(|mut out, inp| {
                let mut buf: Vec<Complex<f64>> =
                    inp.iter().map(|&x| Complex::new(x, 0.)).collect();
                self.fft1.process(&mut buf);
                for (o, b) in out.iter_mut().zip(buf.iter().take(m1)) {
                    *o = *b * norm1;
                }
            });
        if n2 > 1 {
            let norm2 = 1. / n2 as f64;
            Zip::from(vhat.lanes_mut(Axis(1))).par_for_each(|mut lane| {
                let mut buf = lane.to_vec();
                self.fft2.process(&mut buf);
                for (o, b) in lane.iter_mut().zip(buf.iter()) {
                    *o = *b * norm2;
                }
            });
        }
    }

    /// Spectral -> physical
    pub fn backward(&self, vhat: &Array3<Complex<f64>>, v: &mut Array3<f64>) {
        let n1 = self.n[0];
        let n2 = self.n[1];
        let m1 = self.nspec[0];
        let mut work = vhat.to_owned();
        if n2 > 1 {
            Zip::from(work.lanes_mut(Axis(1))).par_for_each(|mut lane| {
                let mut buf = lane.to_vec();
                self.ifft2.process(&mut buf);
                for (o, b) in lane.iter_mut().zip(buf.iter()) {
                    *o = *b;
                }
            });
        }
        Zip::from(v.lanes_mut(Axis(0)))
            .and(work.lanes(Axis(0)))
            .par_for_each(|mut out, inp| {
                let mut buf = vec![Complex::<f64>::zero(); n1];
                for (j, c) in inp.iter().enumerate() {
                    buf[j] = *c;
                }
                // hermitian symmetry of real data
                for j in 1..m1 {
                    if n1 - j >= m1 {
                        buf[n1 - j] = inp[j].conj();
                    }
                }
                self.ifft1.process(&mut buf);
                for (o, b) in out.iter_mut().zip(buf.iter()) {
                    *o = b.re;
                }
            });
    }

    /// Spectral -> physical, returning a new array
    pub fn backward_new(&self, vhat: &Array3<Complex<f64>>) -> Array3<f64> {
        let mut v = self.ndarray_physical();
        self.backward(vhat, &mut v);
        v
    }

    /// Physical -> spectral, returning a new array
    pub fn forward_new(&self, v: &Array3<f64>) -> Array3<Complex<f64>> {
        let mut vhat = self.ndarray_spectral();
        self.forward(v, &mut vhat);
        vhat
    }

    /// First derivative along `axis` in spectral space
    pub fn gradient(&self, vhat: &Array3<Complex<f64>>, axis: usize) -> Array3<Complex<f64>> {
        match axis {
            0 => self.fourier_multiply(vhat, &self.k1, 0, Complex::new(0., 1.)),
            1 => self.fourier_multiply(vhat, &self.k2, 1, Complex::new(0., 1.)),
            _ => self.vertical_matmul(&self.d1, vhat),
        }
    }

    /// Second derivative along `axis` in spectral space
    pub fn second_derivative(
        &self,
        vhat: &Array3<Complex<f64>>,
        axis: usize,
    ) -> Array3<Complex<f64>> {
        match axis {
            0 => self.fourier_multiply(vhat, &self.k1sq, 0, Complex::new(-1., 0.)),
            1 => self.fourier_multiply(vhat, &self.k2sq, 1, Complex::new(-1., 0.)),
            _ => self.vertical_matmul(&self.d2, vhat),
        }
    }

    /// Full Laplacian in spectral space
    pub fn laplacian(&self, vhat: &Array3<Complex<f64>>) -> Array3<Complex<f64>> {
        let mut lap = self.vertical_matmul(&self.d2, vhat);
        let (k1sq, k2sq) = (&self.k1sq, &self.k2sq);
        Zip::indexed(&mut lap)
            .and(vhat)
            .par_for_each(|(i, j, _), l, &v| *l -= v * (k1sq[i] + k2sq[j]));
        lap
    }

    fn fourier_multiply(
        &self,
        vhat: &Array3<Complex<f64>>,
        k: &Array1<f64>,
        axis: usize,
        factor: Complex<f64>,
    ) -> Array3<Complex<f64>> {
        let mut out = Array3::zeros(vhat.raw_dim());
        Zip::indexed(&mut out).and(vhat).par_for_each(|(i, j, _), o, &v| {
            let kk = if axis == 0 { k[i] } else { k[j] };
            *o = v * factor * kk;
        });
        out
    }

    /// Apply a vertical operator to every wavenumber column
    pub fn vertical_matmul(
        &self,
        mat: &Array2<f64>,
        vhat: &Array3<Complex<f64>>,
    ) -> Array3<Complex<f64>> {
        let mut out = Array3::zeros(vhat.raw_dim());
        Zip::from(out.lanes_mut(Axis(2)))
            .and(vhat.lanes(Axis(2)))
            .par_for_each(|mut o, inp| {
                for (oi, row) in o.iter_mut().zip(mat.outer_iter()) {
                    *oi = row
                        .iter()
                        .zip(inp.iter())
                        .fold(Complex::zero(), |acc, (&a, &b)| acc + b * a);
                }
            });
        out
    }

    /// Zero coefficients above the 2/3 limit and Nyquist modes, and restore
    /// hermitian symmetry of the `k1 = 0` plane
    pub fn filter(&self, vhat: &mut Array3<Complex<f64>>) {
        let (mask1, mask2) = (&self.mask1, &self.mask2);
        Zip::indexed(&mut *vhat).par_for_each(|(i, j, _), v| {
            if !(mask1[i] && mask2[j]) {
                *v = Complex::zero();
            }
        });
        let n2 = self.n[1];
        for j in 0..n2 {
            let partner = (n2 - j) % n2;
            if partner == j {
                vhat.slice_mut(s![0, j, ..]).mapv_inplace(|c| Complex::new(c.re, 0.));
            } else if j < partner {
                for k in 0..self.n[2] {
                    let a = vhat[[0, j, k]];
                    let b = vhat[[0, partner, k]];
                    let sym = (a + b.conj()) * 0.5;
                    vhat[[0, j, k]] = sym;
                    vhat[[0, partner, k]] = sym.conj();
                }
            }
        }
    }

    /// Smallest horizontal grid spacings and the vertical spacing at the
    /// mid-plane
    pub fn grid_spacing(&self) -> [f64; 3] {
        let [n1, n2, n3] = self.n;
        let z = &self.x[2];
        [
            self.lengths[0] / n1 as f64,
            self.lengths[1] / n2 as f64,
            (z[n3 / 2] - z[n3 / 2 + 1]).abs(),
        ]
    }
}
