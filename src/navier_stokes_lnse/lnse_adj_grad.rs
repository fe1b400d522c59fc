//! Direct-adjoint looping: maximize the growth functional J/K at a
//! target time over initial conditions of fixed energy
//!
//! Every iteration
//! 1. integrates the nonlinear equations from the current initial
//!    condition to the target time, saving the total flow,
//! 2. integrates the adjoint equations backward to time zero around the
//!    saved trajectory,
//! 3. updates the initial condition along the adjoint gradient
//!    (see [`optimise`]).
use super::opt_routines::optimise;
use super::trajectory::{Direction, SnapshotStore, Trajectory};
use crate::error::{Error, Result};
use crate::field::Field1;
use crate::navier_stokes::{Navier3D, StateVector};

/// Steps between timestep adaptions
const CFL_EVERY: usize = 50;

/// Diagnostics of one direct-adjoint iteration
#[derive(Clone, Copy, Debug)]
pub struct DalReport {
    /// Energy of the initial condition
    pub initial_energy: f64,
    /// Energy at the target time
    pub final_energy: f64,
    /// Growth functional at the target time
    pub j_over_k: f64,
    /// Squared norm of the constrained update relative to the gradient
    pub residual: f64,
    /// Step size of the update
    pub epsilon: f64,
}

/// Direct-adjoint optimizer
pub struct DirectAdjointLoop {
    /// Solver for the direct and the adjoint equations
    pub navier: Navier3D,
    /// Direct flow of the latest forward run
    pub store: SnapshotStore,
    /// Current initial condition
    pub initial: StateVector,
    /// Final time of the forward run
    pub target_time: f64,
    /// Gradient step size, reduced whenever the energy constraint
    /// cannot be met
    pub epsilon: f64,
    /// Steps between timestep adaptions
    pub cfl_every: usize,
    /// Background profiles at time zero
    background: [Field1; 2],
}

impl DirectAdjointLoop {
    /// Start from the current perturbation of `navier`
    ///
    /// # Errors
    /// Vanishing Richardson number, the energy weight of the buoyancy
    /// is undefined
    pub fn new(navier: Navier3D, store: SnapshotStore, target_time: f64) -> Result<Self> {
        if navier.params.ri == 0. {
            return Err(Error::Config(
                "direct-adjoint looping needs a nonzero Richardson number".to_string(),
            ));
        }
        if !(target_time > 0.) {
            return Err(Error::Config(format!(
                "target time must be positive, got {}",
                target_time
            )));
        }
        let initial = navier.state();
        let background = navier.background();
        Ok(Self {
            navier,
            store,
            initial,
            target_time,
            epsilon: 0.1,
            cfl_every: CFL_EVERY,
            background,
        })
    }

    /// Integrate the initial condition to the target time, saving the
    /// total flow after every step
    ///
    /// # Return
    /// (initial energy, final energy, J/K at the target time)
    ///
    /// # Errors
    /// Failed to save snapshots, or solver failure
    pub fn forward(&mut self) -> Result<(f64, f64, f64)> {
        let Self {
            navier,
            store,
            initial,
            target_time,
            cfl_every,
            background,
            ..
        } = self;
        let target = *target_time;
        navier.restore_background(background);
        navier.set_state(initial);
        navier.reset_time();
        navier.timings.reset();
        let e0 = navier.kinetic_energy() + navier.potential_energy();

        store.clear()?;
        navier.store_snapshot(store)?;
        let mut steps = 0;
        while target - navier.time > 1e-9 * target {
            let remaining = target - navier.time;
            if navier.dt >= remaining {
                let dt = navier.dt;
                navier.set_timestep(remaining)?;
                navier.time_step()?;
                navier.set_timestep(dt)?;
                navier.time = target;
            } else {
                navier.time_step()?;
            }
            navier.store_snapshot(store)?;
            steps += 1;
            if steps % *cfl_every == 0 {
                let cfl = navier.cfl();
                navier.adapt_timestep(cfl)?;
                log_timings(navier, steps, "forward");
            }
        }
        let e_t = navier.kinetic_energy() + navier.potential_energy();
        let jk = navier.j_over_k();
        log::info!(
            "forward: {} steps, E(0) = {:5.3e}, E(T) = {:5.3e}, J/K = {:5.3e}",
            steps,
            e0,
            e_t,
            jk
        );
        Ok((e0, e_t, jk))
    }

    /// Integrate the adjoint from the target time back to zero around
    /// the saved forward run
    ///
    /// # Errors
    /// Incomplete forward run, or solver failure
    pub fn backward(&mut self) -> Result<()> {
        let Self {
            navier,
            store,
            target_time,
            cfl_every,
            background,
            ..
        } = self;
        // energy weights of the gradient step refer to time zero
        navier.restore_background(background);
        navier.zero_state();
        navier.populate_nodal();
        navier.time = *target_time;
        navier.timings.reset();
        let mut trajectory = Trajectory::open(store, Direction::Backward)?;
        let mut steps = 0;
        while navier.time > 1e-9 * *target_time {
            if navier.dt >= navier.time {
                let dt = navier.dt;
                navier.set_timestep(navier.time)?;
                navier.time_step_adjoint(&mut trajectory, false)?;
                navier.set_timestep(dt)?;
                navier.time = 0.;
            } else {
                navier.time_step_adjoint(&mut trajectory, false)?;
            }
            steps += 1;
            if steps % *cfl_every == 0 {
                let cfl = navier.cfl_adjoint();
                navier.adapt_timestep(cfl)?;
                log_timings(navier, steps, "adjoint");
            }
        }
        log::info!("adjoint: {} steps", steps);
        Ok(())
    }

    /// One forward run, one adjoint run and one gradient step
    ///
    /// # Errors
    /// Solver failure or stalled optimizer
    pub fn iterate(&mut self) -> Result<DalReport> {
        let (initial_energy, final_energy, j_over_k) = self.forward()?;
        self.backward()?;
        let step = optimise(&mut self.navier, &mut self.initial, self.epsilon)?;
        self.epsilon = step.epsilon;
        log::info!(
            "residual = {:5.3e}    epsilon = {:e}    lambda = {:5.3e}",
            step.residual,
            step.epsilon,
            step.lambda
        );
        Ok(DalReport {
            initial_energy,
            final_energy,
            j_over_k,
            residual: step.residual,
            epsilon: step.epsilon,
        })
    }
}

fn log_timings(navier: &Navier3D, steps: usize, label: &str) {
    let [forcing, explicit, implicit, divergence] = navier.timings.average_millis(steps);
    log::debug!(
        "{} step {}: dt = {:e}, forcing {:.2} ms, explicit {:.2} ms, implicit {:.2} ms, divergence {:.2} ms",
        label,
        steps,
        navier.dt,
        forcing,
        explicit,
        implicit,
        divergence
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use approx::assert_relative_eq;

    fn navier(ri: f64) -> Navier3D {
        let params = Params {
            n1: 8,
            n2: 1,
            n3: 17,
            l1: 6.,
            l3: 2.,
            re: 50.,
            pe: 50.,
            ri,
            dt: 0.02,
            ..Params::default()
        };
        let mut navier = Navier3D::new(params).unwrap();
        navier.set_background(|z| z.tanh(), |z| (2. * z).tanh());
        navier
    }

    #[test]
    fn test_zero_richardson_is_rejected() {
        let result = DirectAdjointLoop::new(navier(0.), SnapshotStore::memory(), 1.);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_forward_lands_on_target() {
        let mut navier = navier(0.1);
        navier.band_disturbance(1e-3, 2.).unwrap();
        let mut dal = DirectAdjointLoop::new(navier, SnapshotStore::memory(), 0.07).unwrap();
        dal.forward().unwrap();
        assert!((dal.navier.time - 0.07).abs() < 1e-14);
        // 0.02, 0.04, 0.06 and the shortened 0.01
        assert_eq!(dal.store.len().unwrap(), 5);
        assert!((dal.navier.dt - 0.02).abs() < 1e-14);

        dal.backward().unwrap();
        assert_eq!(dal.navier.time, 0.);
        assert!(dal.navier.kinetic_energy() > 0.);
    }

    #[test]
    fn test_iteration_keeps_energy() {
        let mut navier = navier(0.1);
        navier.band_disturbance(1e-3, 2.).unwrap();
        let mut dal = DirectAdjointLoop::new(navier, SnapshotStore::memory(), 0.1).unwrap();
        dal.epsilon = 1e-2;
        let first = dal.iterate().unwrap();
        let second = dal.iterate().unwrap();
        assert!(first.residual.is_finite() && first.residual > 0.);
        assert!(dal.epsilon <= 1e-2);
        assert!((second.initial_energy - first.initial_energy).abs() < 1e-6 * first.initial_energy.abs());
    }

    #[test]
    fn test_forward_restarts_from_initial_background() {
        let params = Params {
            n1: 8,
            n2: 1,
            n3: 17,
            l1: 6.,
            l3: 2.,
            re: 50.,
            pe: 50.,
            ri: 0.1,
            dt: 0.02,
            evolve_background: true,
            ..Params::default()
        };
        let mut navier = Navier3D::new(params).unwrap();
        navier.set_background(|z| z.tanh(), |z| (2. * z).tanh());
        navier.band_disturbance(1e-3, 2.).unwrap();
        let initial = navier.background_u.v.clone();
        let mut dal = DirectAdjointLoop::new(navier, SnapshotStore::memory(), 0.1).unwrap();

        let first = dal.forward().unwrap();
        assert!(dal.navier.background_u.v != initial);
        let second = dal.forward().unwrap();
        assert_relative_eq!(first.1, second.1, max_relative = 1e-12);
        assert_relative_eq!(first.2, second.2, epsilon = 1e-18, max_relative = 1e-12);

        dal.backward().unwrap();
        assert_eq!(dal.navier.background_u.v, initial);
    }

    #[test]
    fn test_reduced_step_is_kept() {
        let mut navier = navier(0.1);
        navier.band_disturbance(1e-3, 2.).unwrap();
        let mut dal = DirectAdjointLoop::new(navier, SnapshotStore::memory(), 0.06).unwrap();
        dal.epsilon = 1e-2;
        let report = dal.iterate().unwrap();
        assert_eq!(dal.epsilon, report.epsilon);
    }
}
