//! Fourier wavenumbers of periodic directions
//!
//! Real-to-complex transforms keep `n/2 + 1` coefficients, complex-to-complex
//! transforms keep all `n` with negative frequencies in the upper half.
use ndarray::Array1;
use std::f64::consts::PI;

/// Signed integer frequency of coefficient `j`
pub fn frequency(j: usize, n: usize) -> i64 {
    if j <= n / 2 {
        j as i64
    } else {
        j as i64 - n as i64
    }
}

/// Coefficient `j` is the Nyquist mode of an even transform
pub fn is_nyquist(j: usize, n: usize) -> bool {
    n % 2 == 0 && n > 1 && j == n / 2
}

/// Number of stored coefficients
pub fn n_spec(n: usize, half: bool) -> usize {
    if half {
        n / 2 + 1
    } else {
        n
    }
}

/// Wavenumbers `2 pi k / l`
pub fn wavenumbers(n: usize, l: f64, half: bool) -> Array1<f64> {
    Array1::from_iter((0..n_spec(n, half)).map(|j| 2. * PI * frequency(j, n) as f64 / l))
}

/// Multipliers `k` of the first derivative (`i k`), Nyquist mode removed
pub fn derivative_wavenumbers(n: usize, l: f64, half: bool) -> Array1<f64> {
    let mut k = wavenumbers(n, l, half);
    for (j, kj) in k.iter_mut().enumerate() {
        if is_nyquist(j, n) {
            *kj = 0.;
        }
    }
    k
}

/// Coefficients kept by the 2/3 dealiasing rule
pub fn dealias_mask(n: usize, half: bool) -> Array1<bool> {
    Array1::from_iter(
        (0..n_spec(n, half)).map(|j| 3 * frequency(j, n).unsigned_abs() < n as u64 && !is_nyquist(j, n)),
    )
}
