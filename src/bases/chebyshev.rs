//! Chebyshev collocation on Gauss-Lobatto points
//!
//! The vertical coordinate is `z = l * x` with `x` in `[-1, 1]`. Points are
//! ordered from the top wall (`j = 0`) to the bottom wall (`j = n - 1`).
use ndarray::{Array1, Array2};
use std::f64::consts::PI;

/// Gauss-Lobatto points on `[-l, l]`, descending
///
/// # Panics
/// `n < 2`
pub fn points(n: usize, l: f64) -> Array1<f64> {
    assert!(n > 1, "Chebyshev grid needs at least two points");
    let m = (n - 1) as f64;
    // sine form keeps the grid exactly symmetric
    Array1::from_iter((0..n).map(|j| l * (PI * (m - 2. * j as f64) / (2. * m)).sin()))
}

/// First derivative collocation matrix, scaled to `[-l, l]`
///
/// Diagonal entries are the negative sum of the off-diagonal
/// row entries, so constants are differentiated to zero exactly.
pub fn derivative_matrix(n: usize, l: f64) -> Array2<f64> {
    let x = points(n, 1.);
    let last = n - 1;
    let c = |j: usize| if j == 0 || j == last { 2. } else { 1. };
    let mut d = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        let mut sum = 0.;
        for j in 0..n {
            if i != j {
                let sign = if (i + j) % 2 == 0 { 1. } else { -1. };
                d[[i, j]] = c(i) / c(j) * sign / (x[i] - x[j]);
                sum += d[[i, j]];
            }
        }
        d[[i, i]] = -sum;
    }
    d / l
}

/// Second derivative collocation matrix (square of the first derivative)
pub fn second_derivative_matrix(d1: &Array2<f64>) -> Array2<f64> {
    d1.dot(d1)
}

/// Clenshaw-Curtis quadrature weights on `[-l, l]`
///
/// Weights sum up to `2 l`.
pub fn quadrature_weights(n: usize, l: f64) -> Array1<f64> {
    let nn = n - 1;
    let m = nn as f64;
    let theta: Vec<f64> = (0..n).map(|j| PI * j as f64 / m).collect();
    let mut w = Array1::<f64>::zeros(n);
    if nn % 2 == 0 {
        w[0] = 1. / (m * m - 1.);
        w[nn] = w[0];
        for i in 1..nn {
            let mut v = 1.;
            for k in 1..nn / 2 {
                let kf = k as f64;
                v -= 2. * (2. * kf * theta[i]).cos() / (4. * kf * kf - 1.);
            }
            v -= (m * theta[i]).cos() / (m * m - 1.);
            w[i] = 2. * v / m;
        }
    } else {
        w[0] = 1. / (m * m);
        w[nn] = w[0];
        for i in 1..nn {
            let mut v = 1.;
            for k in 1..=(nn - 1) / 2 {
                let kf = k as f64;
                v -= 2. * (2. * kf * theta[i]).cos() / (4. * kf * kf - 1.);
            }
            w[i] = 2. * v / m;
        }
    }
    w * l
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn approx_eq(result: &Array1<f64>, expected: &Array1<f64>, tol: f64) {
        for (a, b) in result.iter().zip(expected.iter()) {
            assert!(
                (a - b).abs() < tol,
                "Large difference of values, got {} expected {}.",
                a,
                b
            );
        }
    }

    #[test]
    fn test_points_symmetric() {
        let z = points(9, 2.);
        assert_relative_eq!(z[0], 2.);
        assert_relative_eq!(z[8], -2.);
        assert!(z[4].abs() < 1e-15);
        for j in 0..9 {
            assert_relative_eq!(z[j], -z[8 - j]);
        }
    }

    #[test]
    fn test_derivative_of_polynomial() {
        let (n, l) = (12, 3.);
        let z = points(n, l);
        let d1 = derivative_matrix(n, l);
        let f = z.mapv(|z| z.powi(5) - 2. * z * z);
        let expected = z.mapv(|z| 5. * z.powi(4) - 4. * z);
        approx_eq(&d1.dot(&f), &expected, 1e-9);
        let d2 = second_derivative_matrix(&d1);
        let expected = z.mapv(|z| 20. * z.powi(3) - 4.);
        approx_eq(&d2.dot(&f), &expected, 1e-7);
    }

    #[test]
    fn test_quadrature() {
        for n in [9, 10] {
            let l = 1.5;
            let z = points(n, l);
            let w = quadrature_weights(n, l);
            assert_relative_eq!(w.sum(), 2. * l, epsilon = 1e-13);
            // int z^4 over [-l, l]
            let integral: f64 = w.iter().zip(z.iter()).map(|(w, z)| w * z.powi(4)).sum();
            assert_relative_eq!(integral, 2. * l.powi(5) / 5., epsilon = 1e-12);
        }
    }
}
