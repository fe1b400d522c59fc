//! Flow map of the stratified shear flow and its derivative
use crate::error::Result;
use crate::field::Field1;
use crate::navier_stokes::{Navier3D, StateVector};
use crate::navier_stokes_lnse::trajectory::{Direction, SnapshotStore, Trajectory};

/// Map from an initial state to the state after a time horizon
pub trait FlowMap {
    /// Nonlinear evolution of `x` over `horizon` into `out`
    ///
    /// # Errors
    /// Solver failure
    fn full_evolve(&mut self, x: &StateVector, horizon: f64, out: &mut StateVector) -> Result<()>;

    /// Tangent linear evolution of `dx` around the state of the latest
    /// [`FlowMap::full_evolve`]
    ///
    /// # Errors
    /// Solver failure, or no preceding nonlinear evolution over `horizon`
    fn linear_evolve(&mut self, dx: &StateVector, horizon: f64, out: &mut StateVector)
        -> Result<()>;
}

/// Flow map computed by integrating `Navier3D`
///
/// The horizon is split into steps of equal length no larger than the
/// timestep of the solver. Nonlinear evolutions save every step, so the
/// linearized evolutions that follow interpolate the direct flow exactly
/// at the snapshot times. Every nonlinear evolution starts from the
/// background profiles `navier` had at construction.
pub struct NavierFlowMap {
    /// Solver
    pub navier: Navier3D,
    /// Direct flow of the latest nonlinear evolution
    pub store: SnapshotStore,
    background: [Field1; 2],
}

impl NavierFlowMap {
    /// Flow map of `navier`, keeping snapshots in memory
    pub fn new(navier: Navier3D) -> Self {
        let background = navier.background();
        Self {
            navier,
            store: SnapshotStore::memory(),
            background,
        }
    }

    /// Number of steps and their length for `horizon`
    fn steps(&self, horizon: f64) -> (usize, f64) {
        let n = (horizon / self.navier.dt - 1e-9).ceil().max(1.) as usize;
        (n, horizon / n as f64)
    }
}

impl FlowMap for NavierFlowMap {
    fn full_evolve(&mut self, x: &StateVector, horizon: f64, out: &mut StateVector) -> Result<()> {
        if horizon <= 0. {
            *out = x.clone();
            return Ok(());
        }
        let (n, dt) = self.steps(horizon);
        let saved_dt = self.navier.dt;
        self.navier.set_timestep(dt)?;
        self.navier.restore_background(&self.background);
        self.navier.set_state(x);
        self.navier.reset_time();
        self.store.clear()?;
        self.navier.store_snapshot(&mut self.store)?;
        for _ in 0..n {
            self.navier.time_step()?;
            self.navier.store_snapshot(&mut self.store)?;
        }
        *out = self.navier.state();
        self.navier.set_timestep(saved_dt)
    }

    fn linear_evolve(
        &mut self,
        dx: &StateVector,
        horizon: f64,
        out: &mut StateVector,
    ) -> Result<()> {
        if horizon <= 0. {
            *out = dx.clone();
            return Ok(());
        }
        let (n, dt) = self.steps(horizon);
        let saved_dt = self.navier.dt;
        self.navier.set_timestep(dt)?;
        self.navier.set_state(dx);
        self.navier.reset_time();
        let mut trajectory = Trajectory::open(&self.store, Direction::Forward)?;
        for _ in 0..n {
            self.navier.time_step_linear(&mut trajectory)?;
        }
        *out = self.navier.state();
        self.navier.set_timestep(saved_dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;

    fn flow_map() -> NavierFlowMap {
        let params = Params {
            n1: 8,
            n2: 1,
            n3: 9,
            l1: 4.,
            l3: 1.,
            re: 1.,
            pe: 1.,
            ri: 0.,
            dt: 0.02,
            ..Params::default()
        };
        NavierFlowMap::new(Navier3D::new(params).unwrap())
    }

    #[test]
    fn test_zero_horizon_is_identity() {
        let mut map = flow_map();
        map.navier.random_disturbance(1e-2).unwrap();
        let x = map.navier.state();
        let mut out = StateVector::new(&map.navier.space);
        map.full_evolve(&x, 0., &mut out).unwrap();
        out.axpy(-1., &x);
        assert_eq!(out.norm(), 0.);
    }

    #[test]
    fn test_steps_cover_horizon() {
        let map = flow_map();
        let (n, dt) = map.steps(0.1);
        assert_eq!(n, 5);
        assert!((dt - 0.02).abs() < 1e-15);
        let (n, dt) = map.steps(0.05);
        assert_eq!(n, 3);
        assert!((dt * 3. - 0.05).abs() < 1e-15);
    }

    #[test]
    fn test_diffusion_decays() {
        let mut map = flow_map();
        map.navier.random_disturbance(1e-3).unwrap();
        let x = map.navier.state();
        let mut gx = StateVector::new(&map.navier.space);
        map.full_evolve(&x, 0.1, &mut gx).unwrap();
        assert!(gx.norm() < x.norm());
        assert_eq!(map.store.len().unwrap(), 6);
        assert!((map.navier.dt - 0.02).abs() < 1e-15);

        let mut dgx = StateVector::new(&map.navier.space);
        map.linear_evolve(&x, 0.1, &mut dgx).unwrap();
        let mut diff = dgx.clone();
        diff.axpy(-1., &gx);
        // amplitude 1e-3, nonlinear terms are second order
        assert!(diff.norm() < 1e-2 * gx.norm());
    }

    #[test]
    fn test_horizon_in_whole_steps_keeps_operators() {
        let mut map = flow_map();
        map.navier.random_disturbance(1e-3).unwrap();
        let x = map.navier.state();
        let mut out = StateVector::new(&map.navier.space);
        let builds = map.navier.operator_builds;
        map.full_evolve(&x, 0.08, &mut out).unwrap();
        map.linear_evolve(&x, 0.08, &mut out).unwrap();
        assert_eq!(map.navier.operator_builds, builds);
    }

    #[test]
    fn test_evolved_background_is_restored() {
        let params = Params {
            n1: 8,
            n2: 1,
            n3: 9,
            l1: 4.,
            l3: 1.,
            re: 1.,
            pe: 1.,
            ri: 0.1,
            dt: 0.02,
            evolve_background: true,
            ..Params::default()
        };
        let mut navier = Navier3D::new(params).unwrap();
        navier.set_background(|z| z.tanh(), |z| (2. * z).tanh());
        navier.random_disturbance(1e-3).unwrap();
        let x = navier.state();
        let initial = navier.background_b.v.clone();
        let mut map = NavierFlowMap::new(navier);

        let mut first = StateVector::new(&map.navier.space);
        map.full_evolve(&x, 0.1, &mut first).unwrap();
        let drift = (&map.navier.background_b.v - &initial)
            .iter()
            .fold(0., |m: f64, d| m.max(d.abs()));
        assert!(drift > 0.);

        let mut second = StateVector::new(&map.navier.space);
        map.full_evolve(&x, 0.1, &mut second).unwrap();
        second.axpy(-1., &first);
        assert!(second.norm() <= 1e-13 * first.norm());
    }
}
