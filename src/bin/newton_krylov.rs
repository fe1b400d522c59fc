//! Newton-Krylov search for a fixed point of the flow map
//!
//! cargo run --release --bin newton_krylov [initial_guess.fields]
//!
//! Without argument the search starts from a random perturbation of
//! amplitude 1e-4.
use stratiform::field::io::ReadWrite;
use stratiform::navier_stokes::{Navier3D, StateVector};
use stratiform::newton_krylov::{NavierFlowMap, NewtonKrylov};
use stratiform::{Params, Result};

fn run() -> Result<()> {
    let params = Params {
        n1: 64,
        n2: 1,
        n3: 65,
        l1: 16.,
        l3: 5.,
        re: 1000.,
        pe: 1000.,
        ri: 0.16,
        dt: 0.01,
        ..Params::default()
    };
    let mut navier = Navier3D::new(params)?;
    navier.set_background(|z| z.tanh(), |z| (2. * z).tanh());

    let mut x = StateVector::new(&navier.space);
    match std::env::args().nth(1) {
        Some(path) => x.read(&path)?,
        None => {
            navier.random_disturbance(1e-4)?;
            x = navier.state();
        }
    }

    let mut solver = NewtonKrylov::new(NavierFlowMap::new(navier));
    solver.ic_dir = Some("ICs".into());
    let outcome = solver.solve(&mut x)?;
    log::info!(
        "Newton-Krylov: {} steps, residual {:e}, converged: {}",
        outcome.steps,
        outcome.residual,
        outcome.converged
    );
    x.write("fixed_point.fields")
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
