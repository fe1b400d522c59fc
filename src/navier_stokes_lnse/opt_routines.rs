//! Gradient based optimization routines
//!
//! The initial condition is updated along the adjoint gradient while its
//! total energy
//!
//! E = 1/2 <u, u> + 1/2 <b, -Ri b / (dB/dz)>
//!
//! is kept fixed to second order by a Lagrange multiplier.
use crate::error::{Error, Result};
use crate::field::Bc;
use crate::field::Field3;
use crate::navier_stokes::functions::inverse_outside_band;
use crate::navier_stokes::{Navier3D, StateVector};
use ndarray::Zip;

/// Number of step halvings before the optimizer gives up
pub const MAX_HALVINGS: usize = 40;

/// Band of `|dB/dz|` excluded from the energy weight of the buoyancy
pub const GRADIENT_BAND: f64 = 1e-5;

/// Root of `a x^2 + b x + c = 0` that stays bounded as `a -> 0`
///
/// Returns `None` for complex roots or the degenerate `a = b = 0`.
pub fn solve_quadratic(a: f64, b: f64, c: f64) -> Option<f64> {
    if a == 0. {
        if b == 0. {
            return None;
        }
        return Some(-c / b);
    }
    let disc = b * b - 4. * a * c;
    if disc < 0. {
        return None;
    }
    let q = -0.5 * (b + b.signum() * disc.sqrt());
    if q == 0. {
        return Some(0.);
    }
    Some(c / q)
}

/// Lagrange multiplier keeping the energy of
/// `x - epsilon (v + lambda x)` equal to the energy of `x`
///
/// `udotu`, `vdotv` and `udotv` are the energy inner products of the old
/// state `x` and the gradient `v`. When no real multiplier exists, the
/// step is halved.
///
/// # Return
/// (epsilon, lambda)
///
/// # Errors
/// No real root after [`MAX_HALVINGS`] halvings
pub fn lagrange_multiplier(udotu: f64, vdotv: f64, udotv: f64, epsilon: f64) -> Result<(f64, f64)> {
    let mut epsilon = epsilon;
    for _ in 0..MAX_HALVINGS {
        let a = epsilon * udotu;
        let b = 2. * epsilon * udotv - 2. * udotu;
        let c = epsilon * vdotv - 2. * udotv;
        if let Some(lambda) = solve_quadratic(a, b, c) {
            return Ok((epsilon, lambda));
        }
        log::warn!("No real Lagrange multiplier, halving epsilon = {:e}", epsilon);
        epsilon *= 0.5;
    }
    Err(Error::OptimizerStalled {
        epsilon,
        attempts: MAX_HALVINGS,
    })
}

/// Outcome of one gradient step
#[derive(Clone, Copy, Debug)]
pub struct GradientStep {
    /// Step size actually taken
    pub epsilon: f64,
    /// Lagrange multiplier of the energy constraint
    pub lambda: f64,
    /// Squared norm of the constrained update relative to the gradient,
    /// see [`update_residual`]
    pub residual: f64,
}

/// |grad + lambda old|^2 / |grad|^2 in the plain inner product
pub fn update_residual(grad: &StateVector, old: &StateVector, lambda: f64) -> f64 {
    let denominator = grad.dot(grad);
    if denominator == 0. {
        return 0.;
    }
    let mut combined = grad.clone();
    combined.axpy(lambda, old);
    combined.dot(&combined) / denominator
}

/// Update the initial condition `old` along the gradient held by the
/// adjoint fields of `navier` (evaluated at time zero)
///
/// The new state is committed to `navier` as well.
///
/// # Errors
/// No real Lagrange multiplier was found
pub fn optimise(navier: &mut Navier3D, old: &mut StateVector, epsilon: f64) -> Result<GradientStep> {
    let ri = navier.params.ri;
    let db_dz = navier.db_dz.to_owned();
    let b_grad_inv = inverse_outside_band(&db_dz, GRADIENT_BAND);
    let three_d = navier.params.three_dimensional();

    // gradient of the Lagrangian
    let mut grad = navier.state();
    let mut grad_b = Field3::new(&navier.space, Bc::Neumann);
    Zip::indexed(&mut grad_b.v)
        .and(&navier.b.v)
        .par_for_each(|(_, _, k), g, &b| *g = -b * db_dz[k] / ri);
    grad_b.forward();
    grad.b = grad_b;

    let velocity = |a: &StateVector, b: &StateVector| {
        let mut sum = a.u1.inner_product(&b.u1, None) + a.u3.inner_product(&b.u3, None);
        if three_d {
            sum += a.u2.inner_product(&b.u2, None);
        }
        sum
    };
    let udotu = velocity(old, old) + old.b.inner_product(&old.b, Some(&(&b_grad_inv * (-ri))));
    let vdotv = velocity(&grad, &grad) + navier.b.inner_product(&navier.b, Some(&(&db_dz * (-1. / ri))));
    let udotv = velocity(&grad, old) + navier.b.inner_product(&old.b, None);

    let (epsilon, lambda) = lagrange_multiplier(udotu, vdotv, udotv, epsilon)?;
    let residual = update_residual(&grad, old, lambda);

    // old <- old - epsilon grad - epsilon lambda old
    old.scale(1. - epsilon * lambda);
    old.axpy(-epsilon, &grad);
    if !three_d {
        old.u2.zero();
    }
    navier.set_state(old);

    Ok(GradientStep {
        epsilon,
        lambda,
        residual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use approx::assert_relative_eq;

    #[test]
    fn test_solve_quadratic() {
        assert_relative_eq!(solve_quadratic(1., -5., 6.).unwrap(), 2., epsilon = 1e-14);
        assert_relative_eq!(solve_quadratic(0., 2., -4.).unwrap(), 2., epsilon = 1e-14);
        assert!(solve_quadratic(1., 0., 1.).is_none());
        assert!(solve_quadratic(0., 0., 1.).is_none());
    }

    #[test]
    fn test_lagrange_multiplier_halves_step() {
        let (epsilon, lambda) = lagrange_multiplier(1., 1., 0., 4.).unwrap();
        assert_relative_eq!(epsilon, 1., epsilon = 1e-14);
        assert_relative_eq!(lambda, 1., epsilon = 1e-14);
    }

    #[test]
    fn test_lagrange_multiplier_stalls() {
        match lagrange_multiplier(1., 1e30, 0., 0.1) {
            Err(Error::OptimizerStalled { epsilon, attempts }) => {
                assert_eq!(attempts, MAX_HALVINGS);
                assert!(epsilon < 0.1);
            }
            _ => panic!("expected stall"),
        }
    }

    #[test]
    fn test_optimise_keeps_energy() {
        let params = Params {
            n1: 8,
            n2: 1,
            n3: 17,
            l1: 6.,
            l3: 2.,
            ri: 0.2,
            ..Params::default()
        };
        let mut navier = Navier3D::new(params).unwrap();
        navier.set_background(|z| z.tanh(), |z| -z);
        navier.random_disturbance(1e-2).unwrap();
        let mut old = navier.state();
        navier.random_disturbance(1e-2).unwrap();

        let energy = |navier: &mut Navier3D, x: &StateVector| {
            navier.set_state(x);
            navier.kinetic_energy() + navier.potential_energy()
        };
        let gradient = navier.state();
        let e0 = energy(&mut navier, &old);
        navier.set_state(&gradient);

        let step = optimise(&mut navier, &mut old, 1e-3).unwrap();
        assert!(step.residual > 0.);
        let e1 = energy(&mut navier, &old);
        assert_relative_eq!(e1, e0, max_relative = 1e-8);
    }

    #[test]
    fn test_residual_under_stable_stratification() {
        // dB/dz > 0 makes the energy weight of the buoyancy negative
        let params = Params {
            n1: 8,
            n2: 1,
            n3: 17,
            l1: 6.,
            l3: 2.,
            ri: 0.1,
            ..Params::default()
        };
        let mut navier = Navier3D::new(params).unwrap();
        navier.set_background(|z| z.tanh(), |z| (2. * z).tanh());
        navier.random_disturbance(1e-2).unwrap();
        let mut old = navier.state();
        let before = old.clone();
        navier.random_disturbance(1e-2).unwrap();
        navier.b.vhat.mapv_inplace(|b| b * 20.);
        navier.populate_nodal();

        // gradient of the Lagrangian as seen by the update
        let mut grad = navier.state();
        let db_dz = navier.db_dz.to_owned();
        let ri = navier.params.ri;
        grad.b.v.assign(&navier.b.v);
        Zip::indexed(&mut grad.b.v).for_each(|(_, _, k), b| *b *= -db_dz[k] / ri);
        grad.b.forward();

        let step = optimise(&mut navier, &mut old, 1e-3).unwrap();
        let mut combined = grad.clone();
        combined.axpy(step.lambda, &before);
        let expected = combined.dot(&combined) / grad.dot(&grad);
        assert!(step.residual.is_finite());
        assert!(step.residual > 0.);
        assert_relative_eq!(step.residual, expected, max_relative = 1e-10);
        assert_relative_eq!(update_residual(&grad, &before, 0.), 1., max_relative = 1e-12);
    }
}
