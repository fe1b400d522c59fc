//! Matrix-free GMRES with a trust region
//!
//! Solves `(I - dG/dx) x = rhs` in the Krylov space spanned by the
//! Arnoldi basis of `rhs`. The projected least squares problem
//! `min |H y - beta e1|` is solved by singular value decomposition of
//! the Hessenberg matrix, so that the solution can be damped
//! (`z_i = p_i d_i / (d_i^2 + mu)`) until it fits into the trust region.
use super::flow_map::FlowMap;
use crate::error::{Error, Result};
use crate::navier_stokes::StateVector;
use ndarray::{s, Array1, Array2};
use ndarray_linalg::SVD;

/// Maximum number of Arnoldi vectors
pub const MAX_ITERATIONS: usize = 128;

/// Increment of the damping parameter
const MU_INCREMENT: f64 = 0.1;

/// Damping increments before the trust region is given up
const MAX_DAMPING: usize = 100_000;

/// Norm of a Krylov vector below which the Krylov space is exhausted
const BREAKDOWN: f64 = 1e-12;

/// Convergence information of [`gmres`]
#[derive(Clone, Copy, Debug)]
pub struct GmresOutcome {
    /// Number of operator applications
    pub iterations: usize,
    /// Relative residual of the projected problem
    pub residual: f64,
}

/// Solve `(I - dG/dx) x = rhs` with relative tolerance `tol`
///
/// `horizon` is the time horizon of the flow map and `delta` the radius
/// of the trust region (no constraint if not positive). Convergence
/// failure is not an error: the best solution is returned and the final
/// residual reported.
///
/// # Errors
/// Failure of the flow map or of the decomposition
pub fn gmres<M: FlowMap>(
    map: &mut M,
    rhs: &StateVector,
    horizon: f64,
    delta: f64,
    tol: f64,
    x: &mut StateVector,
) -> Result<GmresOutcome> {
    let mut q0 = rhs.clone();
    q0.enforce_bcs();
    let beta = q0.norm();
    x.zero();
    if beta == 0. {
        return Ok(GmresOutcome {
            iterations: 0,
            residual: 0.,
        });
    }
    q0.scale(1. / beta);

    let mut q = vec![q0];
    let mut h = Array2::<f64>::zeros((MAX_ITERATIONS + 1, MAX_ITERATIONS));
    let mut gq = StateVector::new(&rhs.u1.space);
    let mut y = Array1::<f64>::zeros(0);
    let mut residual = 1.;

    for k in 1..=MAX_ITERATIONS {
        // q_k = A q_{k-1}
        map.linear_evolve(&q[k - 1], horizon, &mut gq)?;
        let mut qk = q[k - 1].clone();
        qk.axpy(-1., &gq);

        for (j, qj) in q.iter().enumerate() {
            h[[j, k - 1]] = qj.dot(&qk);
            qk.axpy(-h[[j, k - 1]], qj);
        }
        let norm = qk.norm();
        h[[k, k - 1]] = norm;
        let breakdown = norm < BREAKDOWN;

        let (yk, rk) = least_squares(&h.slice(s![..k + 1, ..k]).to_owned(), beta, delta)?;
        y = yk;
        residual = rk;
        log::debug!("GMRES step {}, residual: {:e}", k, residual);

        if residual < tol || breakdown {
            return finish(x, &q, &y, k, residual);
        }

        qk.scale(1. / norm);
        qk.enforce_bcs();
        q.push(qk);
    }
    log::warn!(
        "GMRES did not converge in {} iterations, residual: {:e}",
        MAX_ITERATIONS,
        residual
    );
    finish(x, &q, &y, MAX_ITERATIONS, residual)
}

/// x = sum y_j q_j
fn finish(
    x: &mut StateVector,
    q: &[StateVector],
    y: &Array1<f64>,
    iterations: usize,
    residual: f64,
) -> Result<GmresOutcome> {
    for (yj, qj) in y.iter().zip(q.iter()) {
        x.axpy(*yj, qj);
    }
    Ok(GmresOutcome {
        iterations,
        residual,
    })
}

/// Minimize `|H y - beta e1|` subject to `|y| <= delta`
///
/// # Return
/// (y, relative residual)
fn least_squares(h: &Array2<f64>, beta: f64, delta: f64) -> Result<(Array1<f64>, f64)> {
    let (u, d, vt) = h.svd(true, true)?;
    let u = u.ok_or_else(|| Error::Linalg("SVD without left singular vectors".to_string()))?;
    let vt = vt.ok_or_else(|| Error::Linalg("SVD without right singular vectors".to_string()))?;
    let k = h.ncols();

    // p = U^T beta e1
    let p: Array1<f64> = (0..k).map(|i| beta * u[[0, i]]).collect();
    let mut z: Array1<f64> = p
        .iter()
        .zip(d.iter())
        .map(|(&p, &d)| if d > BREAKDOWN { p / d } else { 0. })
        .collect();

    if delta > 0. {
        let mut mu = 0.;
        let mut increments = 0;
        while z.dot(&z).sqrt() > delta {
            if increments == MAX_DAMPING {
                log::warn!("Trust region not reached with mu = {}", mu);
                break;
            }
            mu += MU_INCREMENT;
            increments += 1;
            for ((z, &p), &d) in z.iter_mut().zip(p.iter()).zip(d.iter()) {
                *z = p * d / (d * d + mu);
            }
        }
        if mu > 0. {
            log::debug!("For |z| < Delta, mu = {}", mu);
        }
    }

    // y = V z
    let y = vt.t().dot(&z);
    let mut misfit = h.dot(&y);
    misfit[0] -= beta;
    Ok((y, misfit.dot(&misfit).sqrt() / beta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Space3;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    /// Tangent map `a dx`
    struct Scaling {
        a: f64,
        calls: usize,
    }

    impl FlowMap for Scaling {
        fn full_evolve(&mut self, x: &StateVector, _: f64, out: &mut StateVector) -> Result<()> {
            *out = x.clone();
            out.scale(self.a);
            Ok(())
        }

        fn linear_evolve(&mut self, dx: &StateVector, _: f64, out: &mut StateVector) -> Result<()> {
            self.calls += 1;
            *out = dx.clone();
            out.scale(self.a);
            Ok(())
        }
    }

    fn rhs() -> StateVector {
        let space = Arc::new(Space3::new([8, 1, 9], [6., 1., 1.]));
        let mut x = StateVector::new(&space);
        x.u1.set_nodal(|x, _, z| x.cos() * (1. + z * z));
        x.u3.set_nodal(|x, _, z| (2. * x).sin() * (1. - z * z));
        x.b.set_nodal(|_, _, z| z);
        x.enforce_bcs();
        x
    }

    #[test]
    fn test_identity_converges_in_one_step() {
        let rhs = rhs();
        let mut map = Scaling { a: 0., calls: 0 };
        let mut x = StateVector::new(&rhs.u1.space);
        let outcome = gmres(&mut map, &rhs, 0., 0., 0.01, &mut x).unwrap();
        assert_eq!(outcome.iterations, 1);
        assert_eq!(map.calls, 1);
        assert!(outcome.residual < 1e-12);
        x.axpy(-1., &rhs);
        assert!(x.norm() < 1e-12 * rhs.norm());
    }

    #[test]
    fn test_scaled_operator() {
        let rhs = rhs();
        let mut map = Scaling { a: 0.75, calls: 0 };
        let mut x = StateVector::new(&rhs.u1.space);
        gmres(&mut map, &rhs, 1., 0., 0.01, &mut x).unwrap();
        // (1 - 0.75) x = rhs
        x.scale(0.25);
        x.axpy(-1., &rhs);
        assert!(x.norm() < 1e-10 * rhs.norm());
    }

    #[test]
    fn test_trust_region_limits_step() {
        let rhs = rhs();
        let mut map = Scaling { a: 0.75, calls: 0 };
        let mut x = StateVector::new(&rhs.u1.space);
        let delta = 0.5 * rhs.norm();
        gmres(&mut map, &rhs, 1., delta, 0.01, &mut x).unwrap();
        assert!(x.norm() <= delta * (1. + 1e-12));
    }

    #[test]
    fn test_zero_rhs() {
        let space = Arc::new(Space3::new([8, 1, 9], [6., 1., 1.]));
        let rhs = StateVector::new(&space);
        let mut map = Scaling { a: 0.5, calls: 0 };
        let mut x = rhs.clone();
        let outcome = gmres(&mut map, &rhs, 1., 1., 0.01, &mut x).unwrap();
        assert_eq!(outcome.iterations, 0);
        assert_eq!(map.calls, 0);
        assert_relative_eq!(x.norm(), 0.);
    }
}
