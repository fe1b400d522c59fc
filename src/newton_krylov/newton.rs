//! Newton iteration with trust region on the flow map residual
//! `F(x) = G(x) - x`
use super::flow_map::FlowMap;
use super::gmres::gmres;
use crate::error::Result;
use crate::field::io::ReadWrite;
use crate::navier_stokes::StateVector;
use std::path::PathBuf;

/// Result of a Newton-Krylov search
#[derive(Clone, Copy, Debug)]
pub struct NewtonOutcome {
    /// Newton steps taken
    pub steps: usize,
    /// Norm of `G(x) - x` at the returned state
    pub residual: f64,
    /// Residual fell below the tolerance
    pub converged: bool,
}

/// Newton-Krylov solver for fixed points of a flow map
pub struct NewtonKrylov<M: FlowMap> {
    /// Flow map
    pub map: M,
    /// Time horizon T of the flow map
    pub horizon: f64,
    /// Radius of the trust region, halved after every failed step
    pub delta: f64,
    /// Relative tolerance of the inner GMRES solves
    pub gmres_tol: f64,
    /// Absolute tolerance on `|G(x) - x|`
    pub newton_tol: f64,
    /// Maximum number of Newton steps
    pub max_newton_steps: usize,
    /// Directory for the iterates, `<step>.fields`
    pub ic_dir: Option<PathBuf>,
}

impl<M: FlowMap> NewtonKrylov<M> {
    /// Solver with horizon T = 5, trust region 1 and GMRES tolerance 0.01
    pub fn new(map: M) -> Self {
        Self {
            map,
            horizon: 5.,
            delta: 1.,
            gmres_tol: 0.01,
            newton_tol: 1e-10,
            max_newton_steps: 50,
            ic_dir: None,
        }
    }

    /// rhs = G(x) - x, returns its norm
    fn residual(&mut self, x: &StateVector, rhs: &mut StateVector) -> Result<f64> {
        self.map.full_evolve(x, self.horizon, rhs)?;
        rhs.axpy(-1., x);
        Ok(rhs.norm())
    }

    /// Search a fixed point starting from `x`, which holds the best
    /// iterate on return
    ///
    /// # Errors
    /// Failure of the flow map, or iterates cannot be saved
    pub fn solve(&mut self, x: &mut StateVector) -> Result<NewtonOutcome> {
        if let Some(dir) = &self.ic_dir {
            std::fs::create_dir_all(dir)?;
        }
        let mut rhs = x.clone();
        let mut dx = x.clone();
        let mut residual = self.residual(x, &mut rhs)?;
        let mut best = (residual, x.clone());

        for step in 1..=self.max_newton_steps {
            if let Some(dir) = &self.ic_dir {
                let fname = dir.join(format!("{}.fields", step));
                x.write(&fname.to_string_lossy())?;
            }
            log::info!("Newton step {}, residual: {:e}", step, residual);
            if residual < self.newton_tol {
                return Ok(NewtonOutcome {
                    steps: step - 1,
                    residual,
                    converged: true,
                });
            }

            let outcome = gmres(
                &mut self.map,
                &rhs,
                self.horizon,
                self.delta,
                self.gmres_tol,
                &mut dx,
            )?;
            log::debug!(
                "GMRES: {} iterations, residual {:e}",
                outcome.iterations,
                outcome.residual
            );
            x.axpy(1., &dx);
            x.backward();

            residual = self.residual(x, &mut rhs)?;
            if residual < best.0 {
                best = (residual, x.clone());
            } else {
                self.delta /= 2.;
                log::warn!("Residual {:e} not improved, Delta: {}", residual, self.delta);
                *x = best.1.clone();
                residual = self.residual(x, &mut rhs)?;
            }
        }

        *x = best.1;
        let converged = best.0 < self.newton_tol;
        if !converged {
            log::warn!(
                "Newton-Krylov stopped after {} steps, residual: {:e}",
                self.max_newton_steps,
                best.0
            );
        }
        Ok(NewtonOutcome {
            steps: self.max_newton_steps,
            residual: best.0,
            converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::field::Space3;
    use std::sync::Arc;

    /// Affine map `G(x) = a x + (1 - a) c` with fixed point `c`
    struct Affine {
        a: f64,
        c: StateVector,
    }

    impl FlowMap for Affine {
        fn full_evolve(&mut self, x: &StateVector, _: f64, out: &mut StateVector) -> Result<()> {
            *out = x.clone();
            out.scale(self.a);
            out.axpy(1. - self.a, &self.c);
            Ok(())
        }

        fn linear_evolve(&mut self, dx: &StateVector, _: f64, out: &mut StateVector) -> Result<()> {
            *out = dx.clone();
            out.scale(self.a);
            Ok(())
        }
    }

    #[test]
    fn test_affine_fixed_point() {
        let space = Arc::new(Space3::new([8, 1, 9], [6., 1., 1.]));
        let mut c = StateVector::new(&space);
        c.u1.set_nodal(|x, _, z| 0.1 * x.sin() * (1. + z * z));
        c.b.set_nodal(|_, _, z| 0.2 * z);
        c.enforce_bcs();

        let dir = tempfile::tempdir().unwrap();
        let mut solver = NewtonKrylov::new(Affine { a: 0.5, c: c.clone() });
        solver.newton_tol = 1e-12;
        solver.ic_dir = Some(dir.path().to_path_buf());
        let mut x = StateVector::new(&space);
        let outcome = solver.solve(&mut x).unwrap();
        assert!(outcome.converged);
        assert!(outcome.steps <= 2);
        x.axpy(-1., &c);
        assert!(x.norm() < 1e-10);
        assert!(dir.path().join("1.fields").exists());
    }
}
