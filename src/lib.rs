//! # `stratiform`: Spectral solver for stratified shear flows
//!
//! Direct numerical simulation of perturbations of a horizontally uniform
//! shear flow `U_(z)` with stratification `B_(z)` in the Boussinesq
//! approximation. Horizontal directions are periodic and expanded in
//! Fourier series, the vertical direction is bounded by walls and
//! discretized by Chebyshev collocation.
//!
//! # Dependencies
//! - cargo >= v1.62
//! - a LAPACK backend, `openblas` by default (see the crate features)
//!
//! # Threads
//!
//! Transforms and factorizations run on the rayon pool. Keep openblas
//! single threaded so both do not compete for cores:
//! ```ignore
//! export OPENBLAS_NUM_THREADS=1
//! ```
//!
//! # Details
//!
//! Time integration uses a three stage implicit-explicit Runge-Kutta
//! scheme with Crank-Nicolson diffusion and a pressure projection after
//! every stage, see [`navier_stokes`].
//!
//! Around a saved forward run the crate integrates
//! - the tangent linear equations forward in time,
//!   see [`navier_stokes_lnse::lnse_eq`]
//! - the adjoint equations backward in time,
//!   see [`navier_stokes_lnse::lnse_adj_eq`]
//!
//! ## Implemented solver
//!
//! - `Direct-adjoint looping`: initial condition of fixed energy that
//!   maximizes the buoyancy flux at a target time,
//!   see [`navier_stokes_lnse::lnse_adj_grad`]
//! - `Newton-Krylov`: fixed points of the flow map, see [`newton_krylov`]
//!
//! # Example
//! Kelvin-Helmholtz setup in two dimensions
//! ```ignore
//! use stratiform::navier_stokes::Navier3D;
//! use stratiform::{integrate, Params};
//!
//! fn main() {
//!     let params = Params {
//!         n1: 128,
//!         n2: 1,
//!         n3: 129,
//!         ri: 0.1,
//!         ..Params::default()
//!     };
//!     let mut navier = Navier3D::new(params).unwrap();
//!     navier.set_background(|z| z.tanh(), |z| (2. * z).tanh());
//!     navier.random_disturbance(1e-4).unwrap();
//!     navier.output_dir = Some("data".into());
//!     navier.write_intervall = Some(1.0);
//!     integrate(&mut navier, 10., Some(0.1)).unwrap();
//! }
//! ```
//!
//! ## Output
//!
//! Flow fields are stored as flat little-endian `f64` arrays without
//! header, see [`field::io`].
#![warn(missing_docs)]
#![allow(clippy::unnecessary_cast)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#[macro_use]
extern crate enum_dispatch;
pub mod bases;
pub mod error;
pub mod field;
pub mod navier_stokes;
pub mod navier_stokes_lnse;
pub mod newton_krylov;
pub mod params;
pub mod solver;
pub use error::{Error, Result};
pub use params::Params;

const MAX_TIMESTEP: usize = 10_000_000;

/// Time dependent problem driven by [`integrate`]
pub trait Integrate {
    /// Advance by one timestep
    ///
    /// # Errors
    /// Solver failure
    fn update(&mut self) -> Result<()>;
    /// Simulation time
    fn get_time(&self) -> f64;
    /// Current timestep
    fn get_dt(&self) -> f64;
    /// Called every `save_intervall` (diagnostics, output)
    fn callback(&mut self);
    /// Stop the run early, e.g. on a blown up state
    fn exit(&mut self) -> bool;
}

/// Step `pde` until `max_time`, calling [`Integrate::callback`] whenever
/// the time is a multiple of `save_intervall`.
///
/// The run also ends after `MAX_TIMESTEP` steps or once
/// [`Integrate::exit`] returns true.
///
/// # Errors
/// Failure of an update
pub fn integrate<T: Integrate>(pde: &mut T, max_time: f64, save_intervall: Option<f64>) -> Result<()> {
    let mut timestep: usize = 0;
    let eps_dt = pde.get_dt() * 1e-4;
    loop {
        // Update
        pde.update()?;
        timestep += 1;

        // Save
        if let Some(dt_save) = &save_intervall {
            if (pde.get_time() % dt_save) < pde.get_dt() / 2.
                || (pde.get_time() % dt_save) > dt_save - pde.get_dt() / 2.
            {
                pde.callback();
            }
        }

        // Break
        if pde.get_time() + eps_dt >= max_time {
            log::info!("time limit reached: {:?}", pde.get_time());
            break;
        }
        if timestep >= MAX_TIMESTEP {
            log::info!("timestep limit reached: {:?}", timestep);
            break;
        }
        if pde.exit() {
            log::warn!("break criteria triggered");
            break;
        }
    }
    Ok(())
}
