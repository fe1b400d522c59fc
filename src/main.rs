//! Direct-adjoint looping for the stratified shear flow
//!
//! Searches the initial perturbation of fixed energy that maximizes the
//! buoyancy flux J/K at the target time.
//!
//! cargo run --release --bin stratiform
//!
//! Important: Disable openblas multithreading:
//! ```ignore
//! export OPENBLAS_NUM_THREADS=1
//! ```
use std::fs::File;
use std::io::Write;
use stratiform::navier_stokes::Navier3D;
use stratiform::navier_stokes_lnse::{DirectAdjointLoop, SnapshotStore};
use stratiform::{Params, Result};

fn run() -> Result<()> {
    // Opt parameter
    let target_time = 10.;
    let max_iter = 50;

    // Navier parameter
    let params = Params {
        n1: 128,
        n2: 1,
        n3: 97,
        l1: 16.,
        l3: 5.,
        re: 1000.,
        pe: 1000.,
        ri: 0.16,
        dt: 0.01,
        ..Params::default()
    };
    let shape = [params.n1, params.n2, params.n3];
    let mut navier = Navier3D::new(params)?;
    navier.set_background(|z| z.tanh(), |z| (2. * z).tanh());
    navier.band_disturbance(0.01, 4.)?;

    let store = SnapshotStore::directory("snapshots", shape)?;
    let mut dal = DirectAdjointLoop::new(navier, store, target_time)?;

    let mut energy_file = File::create("energy.dat")?;
    for iter in 0..max_iter {
        log::info!("Iteration {}", iter);
        let report = dal.iterate()?;
        log::info!(
            "E0 = {:5.3e}    E(T) = {:5.3e}    J/K = {:5.3e}    residual = {:5.3e}",
            report.initial_energy,
            report.final_energy,
            report.j_over_k,
            report.residual
        );
        writeln!(
            energy_file,
            "{} {} {} {}",
            report.initial_energy, report.final_energy, report.j_over_k, report.residual
        )?;
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
