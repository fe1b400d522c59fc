//! Implement equations for the stratified shear flow
//!
//! One timestep consists of three substeps k, each
//! 1. explicit Crank-Nicolson half of diffusion, lagged explicit terms
//!    and pressure gradient
//! 2. explicit terms of the current substep
//! 3. implicit solve per wavenumber pair
//! 4. pressure projection
use super::functions::{accumulate_flux, add_profile, axpy, product_into};
use super::navier::Navier3D;
use super::operators::{BETA, ZETA};
use crate::error::Result;
use crate::field::{zero_ends, Bc};
use crate::solver::Solve;
use ndarray::{Array3, Zip};
use num_complex::Complex;
use std::time::Instant;

impl Navier3D {
    /// Divergence of the velocity in spectral space
    pub fn divergence(&self) -> Array3<Complex<f64>> {
        let mut div = self.u1.ddx();
        if self.params.three_dimensional() {
            div += &self.u2.ddy();
        }
        div += &self.u3.ddz();
        div
    }

    /// Right hand sides from the old fields:
    /// $$
    /// R = u + h \zeta r - h \nabla p + h / (2 Re) \Delta u
    /// $$
    /// Lagged explicit terms are cleared afterwards.
    pub(crate) fn explicit_cn(&mut self, k: usize, evolve_background: bool) {
        let hk = self.h[k];
        let lagged = hk * ZETA[k];
        let nu = 0.5 * hk / self.params.re;
        let ka = 0.5 * hk / self.params.pe;
        let vars = self.variables();
        let Self {
            u1,
            u2,
            u3,
            b,
            p,
            r,
            rhs,
            ..
        } = self;
        for (var, field) in [&*u1, &*u2, &*u3, &*b].iter().enumerate() {
            if !vars.contains(&var) {
                continue;
            }
            let out = &mut rhs[var];
            out.assign(&field.vhat);
            axpy(out, lagged, &r[var]);
            if var == 3 {
                axpy(out, ka, &field.laplacian());
            } else {
                axpy(out, nu, &field.laplacian());
                axpy(out, -hk, &p.gradient(var));
            }
        }

        if evolve_background {
            let [ru, rb] = &mut self.rhs_background;
            ru.assign(&(&self.background_u.v + &(self.background_u.d2z() * nu)));
            rb.assign(&(&self.background_b.v + &(self.background_b.d2z() * ka)));
        }

        self.reset_explicit();
    }

    /// Explicit terms of the nonlinear equations
    ///
    /// Advection in divergence form with the total streamwise velocity,
    /// buoyancy force and advection of the background stratification.
    pub(crate) fn build_rhs(&mut self) {
        let axes = self.axes();
        let ri = self.params.ri;
        let Self {
            u1,
            u2,
            u3,
            b,
            background_u,
            db_dz,
            u1_total,
            r,
            scratch,
            ..
        } = self;

        // buoyancy force
        axpy(&mut r[2], -ri, &b.vhat);

        // take into account background shear
        add_profile(u1_total, &u1.v, &background_u.v);
        let velocity = [&*u1_total, &u2.v, &u3.v];
        let tags = [u1.bc(), u2.bc(), u3.bc()];

        // momentum
        for (n, &i) in axes.iter().enumerate() {
            for &j in &axes[n..] {
                let product = scratch.field(tags[i].product(tags[j]));
                product_into(product, velocity[i], velocity[j]);
                if i == j {
                    accumulate_flux(r, product, &[(i, i)], -1.);
                } else {
                    accumulate_flux(r, product, &[(i, j), (j, i)], -1.);
                }
            }
        }

        // buoyancy
        for &j in axes {
            let product = scratch.field(tags[j].product(b.bc()));
            product_into(product, velocity[j], &b.v);
            accumulate_flux(r, product, &[(3, j)], -1.);
        }

        // advection of background buoyancy
        let db_dz = &*db_dz;
        let decaying = scratch.field(Bc::Dirichlet);
        Zip::indexed(&mut decaying.v)
            .and(&u3.v)
            .par_for_each(|(_, _, k), o, &w| *o = w * db_dz[k]);
        decaying.forward();
        axpy(&mut r[3], -1., &decaying.vhat);
    }

    /// Add explicit terms of the current substep
    /// $$
    /// R += h \beta r
    /// $$
    pub(crate) fn finish_rhs(&mut self, k: usize) {
        let c = self.h[k] * BETA[k];
        for &var in self.variables() {
            axpy(&mut self.rhs[var], c, &self.r[var]);
        }
    }

    /// Solve the Crank-Nicolson systems of substep `k`
    ///
    /// # Errors
    /// Backend failure of the linear solver
    pub(crate) fn implicit_update(&mut self, k: usize, evolve_background: bool) -> Result<()> {
        let vars = self.variables();
        let Self {
            u1,
            u2,
            u3,
            b,
            rhs,
            operators,
            ..
        } = self;
        let mut fields = [u1, u2, u3, b];
        for (var, field) in fields.iter_mut().enumerate() {
            if !vars.contains(&var) {
                continue;
            }
            zero_ends(&mut rhs[var]);
            operators.get(var, k).solve(&rhs[var], &mut field.vhat)?;
        }

        if evolve_background {
            // wall rows hold the wall gradients
            let last = self.space.n[2] - 1;
            for (profile, walls) in self.rhs_background.iter_mut().zip(self.background_walls.iter()) {
                profile[0] = walls[0];
                profile[last] = walls[1];
            }
            self.background_u.v = self.operators.velocity_neumann[k]
                .solve_profile(&self.rhs_background[0])?;
            self.background_b.v = self.operators.buoyancy[k].solve_profile(&self.rhs_background[1])?;
        }
        Ok(())
    }

    /// Project velocity onto its divergence free part
    ///
    /// Solves lap q = div u, subtracts grad q from the velocity and
    /// accumulates `p += pressure_multiplier * q`.
    ///
    /// # Errors
    /// Backend failure of the linear solver
    pub fn remove_divergence(&mut self, pressure_multiplier: f64) -> Result<()> {
        let mut div = self.divergence();
        // compatibility at the walls
        zero_ends(&mut div);
        self.laplacian.solve(&div, &mut self.q.vhat)?;

        axpy(&mut self.u1.vhat, -1., &self.q.ddx());
        if self.params.three_dimensional() {
            axpy(&mut self.u2.vhat, -1., &self.q.ddy());
        }
        axpy(&mut self.u3.vhat, -1., &self.q.ddz());
        axpy(&mut self.p.vhat, pressure_multiplier, &self.q.vhat);
        Ok(())
    }

    /// Dealias and clean unused coefficients of all fields
    pub fn filter_all(&mut self) {
        self.u1.filter();
        if self.params.three_dimensional() {
            self.u2.filter();
        }
        self.u3.filter();
        self.b.filter();
        self.p.filter();
    }

    /// Refresh nodal values and the background gradient
    pub fn populate_nodal(&mut self) {
        self.db_dz = self.background_b.ddz();
        self.u1.backward();
        if self.params.three_dimensional() {
            self.u2.backward();
        }
        self.u3.backward();
        self.b.backward();
    }

    /// Advance the nonlinear equations by one timestep
    ///
    /// # Errors
    /// Backend failure of the linear solvers
    pub fn time_step(&mut self) -> Result<()> {
        let evolve = self.params.evolve_background;
        for k in 0..3 {
            let t0 = Instant::now();
            self.explicit_cn(k, evolve);
            self.build_rhs();
            self.finish_rhs(k);
            let t1 = Instant::now();
            self.implicit_update(k, evolve)?;
            let t2 = Instant::now();
            self.remove_divergence(1. / self.h[k])?;
            let t3 = Instant::now();
            if k == 2 {
                self.filter_all();
            }
            self.populate_nodal();

            self.timings.explicit += t1 - t0;
            self.timings.implicit += t2 - t1;
            self.timings.divergence += t3 - t2;
        }
        self.time += self.dt;
        Ok(())
    }
}
