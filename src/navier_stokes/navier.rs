//! # Stratified shear flow
//! Boussinesq equations for perturbations of a horizontally uniform
//! background shear `U_(z)` and stratification `B_(z)`:
//!
//! du/dt + div((U_ + u) (U_ + u)) = -grad p + 1/Re lap u - Ri b e3
//!
//! db/dt + div((U_ + u) b) + u3 dB_/dz = 1/Pe lap b
//!
//! div u = 0
//!
//! Horizontal directions are periodic, the vertical walls at `+-l3` hold
//! zero-derivative conditions for u1, u2, b and p and a zero-value
//! condition for u3.
//!
//! # Example
//! Advance a small two-dimensional flow for a few timesteps
//! ```ignore
//! use stratiform::navier_stokes::Navier3D;
//! use stratiform::{integrate, Params};
//!
//! let params = Params { n1: 16, n2: 1, n3: 17, ..Params::default() };
//! let mut navier = Navier3D::new(params).unwrap();
//! navier.set_background(|z| z.tanh(), |z| (2. * z).tanh());
//! navier.random_disturbance(1e-3).unwrap();
//! integrate(&mut navier, 0.1, None).unwrap();
//! ```
use super::operators::{substeps, ImexOperators};
use super::state_vector::StateVector;
use crate::error::Result;
use crate::field::io::ReadWrite;
use crate::field::{Bc, Field1, Field3, Space3};
use crate::navier_stokes_lnse::trajectory::FlowTotals;
use crate::params::Params;
use crate::solver::{Poisson, SolverField};
use crate::Integrate;
use ndarray::{Array1, Array3};
use num_complex::Complex;
use num_traits::Zero;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Variables of a three dimensional flow (u1, u2, u3, b)
pub(crate) const VARIABLES_3D: [usize; 4] = [0, 1, 2, 3];
/// Variables of a two dimensional flow (u1, u3, b)
pub(crate) const VARIABLES_2D: [usize; 3] = [0, 2, 3];

/// Cumulative wall clock time spent in the phases of a timestep
#[derive(Clone, Copy, Debug, Default)]
pub struct Timings {
    /// Interpolating the direct flow and building adjoint forcing
    pub forcing: Duration,
    /// Explicit terms
    pub explicit: Duration,
    /// Implicit solves
    pub implicit: Duration,
    /// Pressure projection
    pub divergence: Duration,
}

impl Timings {
    /// Reset all counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Average milliseconds per step of
    /// \[forcing, explicit, implicit, divergence\]
    pub fn average_millis(&self, steps: usize) -> [f64; 4] {
        let n = steps.max(1) as f64;
        let ms = |d: Duration| d.as_secs_f64() * 1e3 / n;
        [
            ms(self.forcing),
            ms(self.explicit),
            ms(self.implicit),
            ms(self.divergence),
        ]
    }
}

/// Scratch fields for pointwise products, one per boundary condition
pub(crate) struct Scratch {
    pub(crate) bounded: Field3,
    pub(crate) decaying: Field3,
}

impl Scratch {
    fn new(space: &Arc<Space3>) -> Self {
        Self {
            bounded: Field3::new(space, Bc::Neumann),
            decaying: Field3::new(space, Bc::Dirichlet),
        }
    }

    /// Scratch field carrying tag `bc`
    pub(crate) fn field(&mut self, bc: Bc) -> &mut Field3 {
        match bc {
            Bc::Neumann => &mut self.bounded,
            Bc::Dirichlet => &mut self.decaying,
        }
    }
}

/// Implicit-explicit Runge-Kutta solver for the stratified shear flow
pub struct Navier3D {
    /// Physical and numerical parameters
    pub params: Params,
    /// Shared space
    pub space: Arc<Space3>,
    /// Streamwise velocity
    pub u1: Field3,
    /// Spanwise velocity
    pub u2: Field3,
    /// Vertical velocity
    pub u3: Field3,
    /// Buoyancy
    pub b: Field3,
    /// Pressure
    pub p: Field3,
    /// Background velocity profile
    pub background_u: Field1,
    /// Background buoyancy profile
    pub background_b: Field1,
    /// Vertical gradient of the background buoyancy
    pub db_dz: Array1<f64>,
    /// Wall gradients of the background \[\[U_ top, U_ bottom\], \[B_ top, B_ bottom\]\]
    pub(crate) background_walls: [[f64; 2]; 2],
    /// Time
    pub time: f64,
    /// Timestep size
    pub dt: f64,
    /// Substep lengths
    pub(crate) h: [f64; 3],
    /// Crank-Nicolson operators of the current timestep
    pub(crate) operators: ImexOperators,
    /// Number of operator factorizations so far
    pub operator_builds: usize,
    /// Pressure projection
    pub(crate) laplacian: SolverField,
    /// Explicit terms of the latest substep \[u1, u2, u3, b\]
    pub(crate) r: [Array3<Complex<f64>>; 4],
    /// Right hand sides of the implicit solves \[u1, u2, u3, b\]
    pub(crate) rhs: [Array3<Complex<f64>>; 4],
    /// Right hand sides of the background solves \[U_, B_\]
    pub(crate) rhs_background: [Array1<f64>; 2],
    /// Pressure correction of the projection
    pub(crate) q: Field3,
    /// Streamwise velocity including the background
    pub(crate) u1_total: Array3<f64>,
    /// Product buffers
    pub(crate) scratch: Scratch,
    /// Direct flow the linearized and adjoint equations are built around
    pub direct: FlowTotals,
    /// Nodal forcing of the adjoint equations \[u1, u2, u3, b\]
    pub(crate) forcing: [Array3<f64>; 4],
    /// Time spent per phase
    pub timings: Timings,
    /// Diagnostics like energies, J/K
    pub diagnostics: HashMap<String, Vec<f64>>,
    /// Time intervall for writing fields
    /// If none, same intervall as diagnostics
    pub write_intervall: Option<f64>,
    /// Directory for flow fields written by the callback
    pub output_dir: Option<PathBuf>,
}

impl Navier3D {
    /// Build solver with zero perturbation and zero background
    ///
    /// # Errors
    /// Invalid parameters or singular operators
    pub fn new(params: Params) -> Result<Self> {
        let space = Space3::from_params(&params)?;
        let h = substeps(params.dt);
        let operators = ImexOperators::new(&space, &h, params.re, params.pe)?;
        let laplacian = SolverField::Poisson(Poisson::new(&space)?);
        let n3 = space.n[2];
        let spectral = || space.ndarray_spectral();
        let physical = || space.ndarray_physical();

        let mut diagnostics = HashMap::new();
        for key in ["time", "ke", "pe", "j_over_k"] {
            diagnostics.insert(key.to_string(), Vec::<f64>::new());
        }

        Ok(Self {
            u1: Field3::new(&space, Bc::Neumann),
            u2: Field3::new(&space, Bc::Neumann),
            u3: Field3::new(&space, Bc::Dirichlet),
            b: Field3::new(&space, Bc::Neumann),
            p: Field3::new(&space, Bc::Neumann),
            background_u: Field1::new(&space, Bc::Neumann),
            background_b: Field1::new(&space, Bc::Neumann),
            db_dz: Array1::zeros(n3),
            background_walls: [[0.; 2]; 2],
            time: 0.,
            dt: params.dt,
            h,
            operators,
            operator_builds: 1,
            laplacian,
            r: [spectral(), spectral(), spectral(), spectral()],
            rhs: [spectral(), spectral(), spectral(), spectral()],
            rhs_background: [Array1::zeros(n3), Array1::zeros(n3)],
            q: Field3::new(&space, Bc::Neumann),
            u1_total: physical(),
            scratch: Scratch::new(&space),
            direct: FlowTotals::new(&space),
            forcing: [physical(), physical(), physical(), physical()],
            timings: Timings::default(),
            diagnostics,
            write_intervall: None,
            output_dir: None,
            params,
            space,
        })
    }

    /// Indices of the evolved variables, u2 is skipped in two dimensions
    pub fn variables(&self) -> &'static [usize] {
        if self.params.three_dimensional() {
            &VARIABLES_3D
        } else {
            &VARIABLES_2D
        }
    }

    /// Indices of the evolved velocity components, equal to the axes
    /// they point along
    pub fn axes(&self) -> &'static [usize] {
        let vars = self.variables();
        &vars[..vars.len() - 1]
    }

    /// Perturbation variable by index (0: u1, 1: u2, 2: u3, 3: b)
    pub fn field(&self, var: usize) -> &Field3 {
        match var {
            0 => &self.u1,
            1 => &self.u2,
            2 => &self.u3,
            _ => &self.b,
        }
    }

    /// Change timestep and refactorize the implicit operators,
    /// nothing to do if `dt` is the current timestep
    ///
    /// # Errors
    /// Singular operators
    pub fn set_timestep(&mut self, dt: f64) -> Result<()> {
        if dt == self.dt {
            return Ok(());
        }
        self.dt = dt;
        self.update_for_timestep()
    }

    /// Rebuild substeps and operators for the current timestep
    ///
    /// # Errors
    /// Singular operators
    pub fn update_for_timestep(&mut self) -> Result<()> {
        self.h = substeps(self.dt);
        self.operators = ImexOperators::new(&self.space, &self.h, self.params.re, self.params.pe)?;
        self.operator_builds += 1;
        log::debug!("operators rebuilt for dt = {:e}", self.dt);
        Ok(())
    }

    /// Substep lengths of the current timestep
    pub fn substeps(&self) -> [f64; 3] {
        self.h
    }

    /// Set background profiles `U_(z)` and `B_(z)`
    pub fn set_background<F, G>(&mut self, velocity: F, buoyancy: G)
    where
        F: Fn(f64) -> f64,
        G: Fn(f64) -> f64,
    {
        self.background_u.set_nodal(velocity);
        self.background_b.set_nodal(buoyancy);
        let last = self.space.n[2] - 1;
        let du = self.background_u.ddz();
        let db = self.background_b.ddz();
        self.background_walls = [[du[0], du[last]], [db[0], db[last]]];
        self.populate_nodal();
    }

    /// Copy of the background profiles `[U_, B_]`
    pub fn background(&self) -> [Field1; 2] {
        [self.background_u.clone(), self.background_b.clone()]
    }

    /// Restore background profiles taken by [`Navier3D::background`]
    pub fn restore_background(&mut self, background: &[Field1; 2]) {
        self.background_u.v.assign(&background[0].v);
        self.background_b.v.assign(&background[1].v);
        self.populate_nodal();
    }

    /// Copy of the perturbation state
    pub fn state(&self) -> StateVector {
        StateVector {
            u1: self.u1.clone(),
            u2: self.u2.clone(),
            u3: self.u3.clone(),
            b: self.b.clone(),
        }
    }

    /// Replace the perturbation state, clearing pressure and lagged
    /// explicit terms
    pub fn set_state(&mut self, state: &StateVector) {
        self.u1.vhat.assign(&state.u1.vhat);
        self.u2.vhat.assign(&state.u2.vhat);
        self.u3.vhat.assign(&state.u3.vhat);
        self.b.vhat.assign(&state.b.vhat);
        self.p.zero();
        self.reset_explicit();
        self.populate_nodal();
    }

    /// Zero perturbation, pressure and lagged explicit terms
    pub fn zero_state(&mut self) {
        for field in [&mut self.u1, &mut self.u2, &mut self.u3, &mut self.b, &mut self.p] {
            field.zero();
        }
        self.reset_explicit();
    }

    pub(crate) fn reset_explicit(&mut self) {
        for r in self.r.iter_mut() {
            r.fill(Complex::zero());
        }
    }

    /// Reset time
    pub fn reset_time(&mut self) {
        self.time = 0.;
    }

    fn push_diagnostic(&mut self, key: &str, value: f64) {
        if let Some(d) = self.diagnostics.get_mut(key) {
            d.push(value);
        }
    }
}

impl Integrate for Navier3D {
    /// Update 1 timestep
    fn update(&mut self) -> Result<()> {
        self.time_step()
    }

    fn get_time(&self) -> f64 {
        self.time
    }

    fn get_dt(&self) -> f64 {
        self.dt
    }

    fn callback(&mut self) {
        let ke = self.kinetic_energy();
        let pe = self.potential_energy();
        let jk = self.j_over_k();
        let cfl = self.cfl();
        log::info!(
            "time = {:5.3}    KE = {:5.3e}    PE = {:5.3e}    J/K = {:5.3e}    CFL = {:4.2}",
            self.time,
            ke,
            pe,
            jk,
            cfl
        );
        self.push_diagnostic("time", self.time);
        self.push_diagnostic("ke", ke);
        self.push_diagnostic("pe", pe);
        self.push_diagnostic("j_over_k", jk);

        if let Some(dir) = &self.output_dir {
            let write = match self.write_intervall {
                Some(dt_save) => {
                    (self.time % dt_save) < self.dt / 2.
                        || (self.time % dt_save) > dt_save - self.dt / 2.
                }
                None => true,
            };
            if write {
                if let Err(e) = std::fs::create_dir_all(dir) {
                    log::error!("Cannot create {:?}: {}", dir, e);
                    return;
                }
                let fname = dir.join(format!("flow{:0>8.2}.fields", self.time));
                self.write_unwrap(&fname.to_string_lossy());
            }
        }
    }

    fn exit(&mut self) -> bool {
        // Break if energy is nan
        if self.kinetic_energy().is_nan() {
            log::error!("Kinetic energy is nan at time {}", self.time);
            return true;
        }
        false
    }
}
