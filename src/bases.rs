//! # Bases
//! One-dimensional building blocks of the mixed spectral discretization
//!
//! Implemented:
//! - `Chebyshev` collocation on Gauss-Lobatto points, see [`chebyshev`]
//! - `Fourier` wavenumbers for real-to-complex and complex-to-complex
//!   transforms, see [`fourier`]
pub mod chebyshev;
pub mod fourier;
