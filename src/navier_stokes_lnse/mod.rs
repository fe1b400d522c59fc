//! Linearized and adjoint Navier-Stokes equations
//!
//! Both are integrated around the direct flow of a saved forward run,
//! see [`trajectory`].
#![allow(clippy::similar_names)]
pub mod lnse_adj_eq;
pub mod lnse_adj_grad;
pub mod lnse_eq;
pub mod opt_routines;
pub mod trajectory;
pub use lnse_adj_grad::{DalReport, DirectAdjointLoop};
pub use trajectory::{Direction, SnapshotStore, Trajectory};
