//! Navier--Stokes solver for stratified shear flows
pub mod functions;
pub mod navier;
pub mod navier_eq;
pub mod navier_io;
pub mod operators;
pub mod state_vector;
pub use navier::Navier3D;
pub use state_vector::StateVector;
