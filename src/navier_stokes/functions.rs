//! Some useful functions: array kernels of the explicit terms, energies,
//! CFL control and initial conditions
use super::navier::Navier3D;
use crate::error::Result;
use crate::field::Field3;
use crate::navier_stokes_lnse::lnse_adj_eq::growth_functional;
use ndarray::{Array1, Array3, Zip};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use num_complex::Complex;

/// y += a x
pub fn axpy(y: &mut Array3<Complex<f64>>, a: f64, x: &Array3<Complex<f64>>) {
    Zip::from(y).and(x).par_for_each(|y, &x| *y += x * a);
}

/// out = v + profile(z)
pub fn add_profile(out: &mut Array3<f64>, v: &Array3<f64>, profile: &Array1<f64>) {
    Zip::indexed(out)
        .and(v)
        .par_for_each(|(_, _, k), o, &x| *o = x + profile[k]);
}

/// Pointwise product `a b` into `out`, transformed to spectral space
pub fn product_into(out: &mut Field3, a: &Array3<f64>, b: &Array3<f64>) {
    Zip::from(&mut out.v)
        .and(a)
        .and(b)
        .par_for_each(|o, &x, &y| *o = x * y);
    out.forward();
}

/// Symmetric product `a b + c d` into `out`, transformed to spectral space
pub fn product_sum_into(
    out: &mut Field3,
    a: &Array3<f64>,
    b: &Array3<f64>,
    c: &Array3<f64>,
    d: &Array3<f64>,
) {
    Zip::from(&mut out.v)
        .and(a)
        .and(b)
        .and(c)
        .and(d)
        .par_for_each(|o, &x, &y, &z, &w| *o = x * y + z * w);
    out.forward();
}

/// r\[var\] += sign * d(product)/d(axis) for every (var, axis)
pub fn accumulate_flux(
    r: &mut [Array3<Complex<f64>>; 4],
    product: &Field3,
    targets: &[(usize, usize)],
    sign: f64,
) {
    for &(var, axis) in targets {
        axpy(&mut r[var], sign, &product.gradient(axis));
    }
}

/// 1/x, or zero inside the band `|x| < band`
pub fn inverse_outside_band(profile: &Array1<f64>, band: f64) -> Array1<f64> {
    profile.mapv(|x| if x.abs() < band { 0. } else { 1. / x })
}

fn max_abs(v: &Array3<f64>) -> f64 {
    v.iter().fold(0., |m: f64, x| m.max(x.abs()))
}

impl Navier3D {
    fn courant(&self, u1: &Array3<f64>, u2: &Array3<f64>, u3: &Array3<f64>) -> f64 {
        let [d1, d2, d3] = self.space.grid_spacing();
        let mut cfl = max_abs(u1) / d1 + max_abs(u3) / d3;
        if self.params.three_dimensional() {
            cfl += max_abs(u2) / d2;
        }
        cfl * self.dt
    }

    /// Courant number of the total flow
    ///
    /// The vertical spacing is taken at the mid-plane, where the
    /// Chebyshev points are furthest apart.
    pub fn cfl(&self) -> f64 {
        let mut u1_total = self.space.ndarray_physical();
        add_profile(&mut u1_total, &self.u1.v, &self.background_u.v);
        self.courant(&u1_total, &self.u2.v, &self.u3.v)
    }

    /// Courant number of the direct flow the adjoint is evolved around
    pub fn cfl_adjoint(&self) -> f64 {
        let d = &self.direct;
        self.courant(&d.u1.v, &d.u2.v, &d.u3.v)
    }

    /// Rescale the timestep such that `cfl` becomes the target Courant
    /// number, capped by the maximum timestep
    ///
    /// # Errors
    /// Singular operators
    pub fn adapt_timestep(&mut self, cfl: f64) -> Result<()> {
        if !(cfl > 0.) || !cfl.is_finite() {
            log::warn!("Keep timestep {:e}, CFL number is {}", self.dt, cfl);
            return Ok(());
        }
        let dt = (self.dt * self.params.target_cfl / cfl).min(self.params.max_dt);
        log::debug!("Timestep {:e} -> {:e} (CFL {:4.2})", self.dt, dt, cfl);
        self.set_timestep(dt)
    }

    /// Kinetic energy of the perturbation
    /// $$
    /// KE = 1/2 \int u_i u_i dV
    /// $$
    pub fn kinetic_energy(&self) -> f64 {
        let mut energy = self.u1.inner_product(&self.u1, None) + self.u3.inner_product(&self.u3, None);
        if self.params.three_dimensional() {
            energy += self.u2.inner_product(&self.u2, None);
        }
        0.5 * energy
    }

    /// Available potential energy of the perturbation
    /// $$
    /// PE = 1/2 \int -Ri b^2 / (dB/dz) dV
    /// $$
    /// Heights with `|dB/dz| < 1e-3` do not contribute.
    pub fn potential_energy(&self) -> f64 {
        let weight = inverse_outside_band(&self.db_dz, 1e-3) * (-self.params.ri);
        0.5 * self.b.inner_product(&self.b, Some(&weight))
    }

    /// Scale the perturbation to total energy `energy`
    pub fn rescale_for_energy(&mut self, energy: f64) {
        let before = self.kinetic_energy() + self.potential_energy();
        let scale = if before == 0. {
            0.
        } else {
            (energy / before).sqrt()
        };
        for field in [&mut self.u1, &mut self.u2, &mut self.u3, &mut self.b] {
            field.vhat.mapv_inplace(|c| c * scale);
            field.backward();
        }
    }

    /// Growth functional of the current flow, normalized
    pub fn j_over_k(&self) -> f64 {
        let mut b_total = self.space.ndarray_physical();
        add_profile(&mut b_total, &self.b.v, &self.background_b.v);
        growth_functional(&self.space, &b_total, &self.u3.v)
    }

    /// Initialize all velocity components and the buoyancy with random
    /// disturbances in \[-amp, amp\], projected onto the boundary
    /// conditions and made divergence free
    ///
    /// # Errors
    /// Backend failure of the projection
    pub fn random_disturbance(&mut self, amp: f64) -> Result<()> {
        let shape = self.space.n;
        for field in [&mut self.u1, &mut self.u2, &mut self.u3, &mut self.b] {
            field.v = Array3::random(shape, Uniform::new(-amp, amp));
            field.forward();
            field.filter();
            field.enforce_bc();
        }
        if !self.params.three_dimensional() {
            self.u2.zero();
        }
        self.p.zero();
        self.reset_explicit();
        self.remove_divergence(0.)?;
        self.populate_nodal();
        Ok(())
    }

    /// Random velocity disturbance confined to `|z| < band`
    /// $$
    /// u_i = amp (band^2 - z^2) U(-1, 1)
    /// $$
    /// The buoyancy is left untouched.
    ///
    /// # Errors
    /// Backend failure of the projection
    pub fn band_disturbance(&mut self, amp: f64, band: f64) -> Result<()> {
        let shape = self.space.n;
        let z = self.space.x[2].to_owned();
        let three_d = self.params.three_dimensional();
        for (var, field) in [&mut self.u1, &mut self.u2, &mut self.u3].iter_mut().enumerate() {
            if var == 1 && !three_d {
                continue;
            }
            let noise = Array3::random(shape, Uniform::new(-1., 1.));
            Zip::indexed(&mut field.v)
                .and(&noise)
                .for_each(|(_, _, k), v, &n| {
                    if z[k].abs() < band {
                        *v += amp * (band * band - z[k] * z[k]) * n;
                    }
                });
            field.forward();
            field.filter();
        }
        self.remove_divergence(0.)?;
        self.populate_nodal();
        Ok(())
    }
}
