//! Tangent linear equations of the stratified shear flow
//!
//! The perturbation stored in `Navier3D` evolves linearized around the
//! direct flow V interpolated from a forward run:
//!
//! du/dt + div(u V + V u) = -grad p + 1/Re lap u - Ri b e3
//!
//! db/dt + div(V b + u (B_ + b_direct)) = 1/Pe lap b
//!
//! V already contains the background, so the stratification term is part
//! of the buoyancy flux.
use super::trajectory::Trajectory;
use crate::error::Result;
use crate::navier_stokes::functions::{accumulate_flux, axpy, product_into, product_sum_into};
use crate::navier_stokes::Navier3D;
use std::time::Instant;

impl Navier3D {
    /// Explicit terms of the equations linearized around `self.direct`
    pub(crate) fn build_rhs_linear(&mut self) {
        let axes = self.axes();
        let ri = self.params.ri;
        let Self {
            u1,
            u2,
            u3,
            b,
            direct,
            r,
            scratch,
            ..
        } = self;

        // buoyancy force
        axpy(&mut r[2], -ri, &b.vhat);

        let u = [&u1.v, &u2.v, &u3.v];
        let v = [&direct.u1.v, &direct.u2.v, &direct.u3.v];
        let tags = [u1.bc(), u2.bc(), u3.bc()];

        // momentum
        for (n, &i) in axes.iter().enumerate() {
            for &j in &axes[n..] {
                let product = scratch.field(tags[i].product(tags[j]));
                if i == j {
                    product_into(product, u[i], v[i]);
                    accumulate_flux(r, product, &[(i, i)], -2.);
                } else {
                    product_sum_into(product, u[i], v[j], v[i], u[j]);
                    accumulate_flux(r, product, &[(i, j), (j, i)], -1.);
                }
            }
        }

        // buoyancy
        for &j in axes {
            let product = scratch.field(tags[j].product(b.bc()));
            product_sum_into(product, v[j], &b.v, u[j], &direct.b.v);
            accumulate_flux(r, product, &[(3, j)], -1.);
        }
    }

    /// Advance the tangent linear equations by one timestep
    ///
    /// The direct flow is interpolated at every stage time, so
    /// `trajectory` must be opened in forward direction and cover
    /// `[time, time + dt]`.
    ///
    /// # Errors
    /// Stage time outside the trajectory, or backend failure of the
    /// linear solvers
    pub fn time_step_linear(&mut self, trajectory: &mut Trajectory) -> Result<()> {
        let mut stage_time = self.time;
        for k in 0..3 {
            let t0 = Instant::now();
            trajectory.interpolate(stage_time, &mut self.direct)?;
            let t1 = Instant::now();
            self.explicit_cn(k, false);
            self.build_rhs_linear();
            self.finish_rhs(k);
            let t2 = Instant::now();
            self.implicit_update(k, false)?;
            let t3 = Instant::now();
            self.remove_divergence(1. / self.h[k])?;
            let t4 = Instant::now();
            self.filter_all();
            self.populate_nodal();

            self.timings.forcing += t1 - t0;
            self.timings.explicit += t2 - t1;
            self.timings.implicit += t3 - t2;
            self.timings.divergence += t4 - t3;
            stage_time += self.h[k];
        }
        self.time += self.dt;
        Ok(())
    }
}
