//! Adjoint equations of the stratified shear flow
//!
//! The adjoint variables (stored in the perturbation fields of
//! `Navier3D`) evolve backward in time around the direct flow V, which
//! is interpolated from a forward run. The adjoint of the advection
//! operator gives
//!
//! -du*/dt - div(u* V) + grad(V)^T u* + b* grad(B) = -grad p* + 1/Re lap u* - Ri b* e3 + f
//!
//! -db*/dt - div(b* V) = 1/Pe lap b* + f_b
//!
//! where B is the total direct buoyancy and f the forcing of the growth
//! functional
//!
//! J = int <(B - <B>) V3> dz / K
//!
//! with `<.>` the horizontal mean.
use super::trajectory::Trajectory;
use crate::error::Result;
use crate::field::average::horizontal_mean;
use crate::field::Space3;
use crate::navier_stokes::functions::{accumulate_flux, axpy, product_into};
use crate::navier_stokes::Navier3D;
use ndarray::{Array3, Zip};
use std::time::Instant;

/// Normalization of the growth functional
pub const NORMALIZATION: f64 = 2.;

/// Growth functional J/K of a flow with total buoyancy `b_total` and
/// vertical velocity `u3`, both in physical space
pub fn growth_functional(space: &Space3, b_total: &Array3<f64>, u3: &Array3<f64>) -> f64 {
    let mean = horizontal_mean(b_total);
    let mut flux = space.ndarray_physical();
    Zip::indexed(&mut flux)
        .and(b_total)
        .and(u3)
        .par_for_each(|(_, _, k), f, &b, &w| *f = (b - mean[k]) * w);
    space.integrate_vertically(&horizontal_mean(&flux)) / NORMALIZATION
}

/// out = scale * (v - <v>)
fn deviation_into(out: &mut Array3<f64>, v: &Array3<f64>, scale: f64) {
    let mean = horizontal_mean(v);
    Zip::indexed(out)
        .and(v)
        .par_for_each(|(_, _, k), o, &x| *o = scale * (x - mean[k]));
}

impl Navier3D {
    /// Forcing of the adjoint equations by the growth functional,
    /// evaluated on the interpolated direct flow
    ///
    /// In steady mode all forcing vanishes.
    pub fn update_adjoint_forcing(&mut self, steady: bool) {
        for f in self.forcing.iter_mut() {
            f.fill(0.);
        }
        if steady {
            return;
        }
        let scale = -1. / NORMALIZATION;
        let [_, _, f3, fb] = &mut self.forcing;
        deviation_into(f3, &self.direct.b.v, scale);
        deviation_into(fb, &self.direct.u3.v, scale);
    }

    /// Explicit terms of the adjoint equations
    pub(crate) fn build_rhs_adjoint(&mut self) {
        let axes = self.axes();
        let vars = self.variables();
        let ri = self.params.ri;
        let Self {
            u1,
            u2,
            u3,
            b,
            direct,
            r,
            scratch,
            forcing,
            ..
        } = self;

        // buoyancy force
        axpy(&mut r[3], -ri, &u3.vhat);

        let adjoint = [&*u1, &*u2, &*u3, &*b];
        let total = [&direct.u1, &direct.u2, &direct.u3];

        // advection by the direct flow
        for &var in vars {
            for &j in axes {
                let field = adjoint[var];
                let product = scratch.field(field.bc().product(total[j].bc()));
                product_into(product, &field.v, &total[j].v);
                accumulate_flux(r, product, &[(var, j)], 1.);
            }
        }

        // transposed velocity and buoyancy gradients
        for &i in axes {
            for &j in axes {
                let gradient = scratch.field(total[j].bc().derivative_along(i));
                gradient.vhat.assign(&total[j].gradient(i));
                gradient.backward();
                Zip::from(&mut forcing[i])
                    .and(&gradient.v)
                    .and(&adjoint[j].v)
                    .par_for_each(|f, &dv, &u| *f -= dv * u);
            }
            let gradient = scratch.field(direct.b.bc().derivative_along(i));
            gradient.vhat.assign(&direct.b.gradient(i));
            gradient.backward();
            Zip::from(&mut forcing[i])
                .and(&gradient.v)
                .and(&b.v)
                .par_for_each(|f, &db, &bs| *f -= db * bs);
        }

        for &var in vars {
            let modal = scratch.field(adjoint[var].bc());
            modal.v.assign(&forcing[var]);
            modal.forward();
            axpy(&mut r[var], 1., &modal.vhat);
        }
    }

    /// Advance the adjoint equations by one timestep backward in time
    ///
    /// `trajectory` must be opened in backward direction and cover
    /// `[time - dt, time]`. With `steady` the growth functional does not
    /// force the adjoint.
    ///
    /// # Errors
    /// Stage time outside the trajectory, or backend failure of the
    /// linear solvers
    pub fn time_step_adjoint(&mut self, trajectory: &mut Trajectory, steady: bool) -> Result<()> {
        let mut stage_time = self.time;
        for k in 0..3 {
            let t0 = Instant::now();
            trajectory.interpolate(stage_time, &mut self.direct)?;
            self.update_adjoint_forcing(steady);
            let t1 = Instant::now();
            self.explicit_cn(k, false);
            self.build_rhs_adjoint();
            self.finish_rhs(k);
            let t2 = Instant::now();
            self.implicit_update(k, false)?;
            let t3 = Instant::now();
            self.remove_divergence(1. / self.h[k])?;
            let t4 = Instant::now();
            if k == 2 {
                self.filter_all();
            }
            self.populate_nodal();

            self.timings.forcing += t1 - t0;
            self.timings.explicit += t2 - t1;
            self.timings.implicit += t3 - t2;
            self.timings.divergence += t4 - t3;
            stage_time -= self.h[k];
        }
        self.time -= self.dt;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navier_stokes_lnse::trajectory::{Direction, SnapshotStore};
    use crate::params::Params;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;
    use std::sync::Arc;

    fn navier() -> Navier3D {
        let params = Params {
            n1: 8,
            n2: 1,
            n3: 17,
            l1: 2. * PI,
            l3: 2.,
            re: 100.,
            pe: 100.,
            ri: 0.1,
            ..Params::default()
        };
        let mut navier = Navier3D::new(params).unwrap();
        navier.set_background(|z| z.tanh(), |z| z.tanh());
        navier
    }

    fn record(navier: &mut Navier3D, steps: usize) -> SnapshotStore {
        let mut store = SnapshotStore::memory();
        navier.store_snapshot(&mut store).unwrap();
        for _ in 0..steps {
            navier.time_step().unwrap();
            navier.store_snapshot(&mut store).unwrap();
        }
        store
    }

    #[test]
    fn test_growth_functional() {
        let space = Arc::new(Space3::new([8, 1, 9], [2. * PI, 1., 1.]));
        let [x, _, z] = &space.x;
        let b = Array3::from_shape_fn(space.n, |(i, _, k)| x[i].cos() * z[k] + 3. * z[k]);
        let w = Array3::from_shape_fn(space.n, |(i, _, _)| x[i].cos());
        // <cos^2> = 1/2, int z dz = 0 ... int 1/2 z dz over [-1, 1] = 0
        assert_relative_eq!(growth_functional(&space, &b, &w), 0., epsilon = 1e-12);
        let w = Array3::from_shape_fn(space.n, |(i, _, k)| x[i].cos() * z[k]);
        // int 1/2 z^2 dz = 1/3
        assert_relative_eq!(growth_functional(&space, &b, &w), 1. / 3. / NORMALIZATION, epsilon = 1e-12);
    }

    #[test]
    fn test_forcing_removes_mean() {
        let mut navier = navier();
        navier.direct.b.set_nodal(|x, _, z| x.sin() + z);
        navier.direct.u3.set_nodal(|x, _, z| x.cos() * (1. - z * z / 4.));
        navier.update_adjoint_forcing(false);
        let fb = &navier.forcing[3];
        let f3 = &navier.forcing[2];
        let x = &navier.space.x[0];
        assert_relative_eq!(f3[[2, 0, 5]], -x[2].sin() / NORMALIZATION, epsilon = 1e-12);
        assert!(horizontal_mean(fb).iter().all(|m| m.abs() < 1e-12));
        assert!(navier.forcing[0].iter().all(|&f| f == 0.));
        navier.update_adjoint_forcing(true);
        assert!(navier.forcing.iter().all(|f| f.iter().all(|&x| x == 0.)));
    }

    #[test]
    fn test_steady_adjoint_stays_at_rest() {
        let mut base = navier();
        let store = record(&mut base, 3);
        let mut adjoint = navier();
        adjoint.time = base.time;
        let mut trajectory = Trajectory::open(&store, Direction::Backward).unwrap();
        for _ in 0..3 {
            adjoint.time_step_adjoint(&mut trajectory, true).unwrap();
        }
        assert!(adjoint.time.abs() < 1e-12);
        assert_eq!(adjoint.kinetic_energy(), 0.);
        assert_eq!(adjoint.b.max_abs(), 0.);
    }

    #[test]
    fn test_growth_functional_forces_adjoint() {
        let mut base = navier();
        base.random_disturbance(1e-2).unwrap();
        let store = record(&mut base, 2);
        let mut adjoint = navier();
        adjoint.time = base.time;
        let mut trajectory = Trajectory::open(&store, Direction::Backward).unwrap();
        for _ in 0..2 {
            adjoint.time_step_adjoint(&mut trajectory, false).unwrap();
        }
        assert!(adjoint.kinetic_energy() > 0.);
        assert!(adjoint.b.max_abs() > 0.);
        // queries moved backward to the start of the run
        assert!(adjoint.time_step_adjoint(&mut trajectory, false).is_err());
    }
}
