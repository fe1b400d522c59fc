//! Newton-Krylov search for fixed points of the flow map
//!
//! A state x is a fixed point of the flow map G over the horizon T if
//! G(x) - x = 0. Newton steps solve (I - dG/dx) dx = G(x) - x with
//! matrix-free GMRES, where every application of the Jacobian is one
//! integration of the tangent linear equations.
pub mod flow_map;
pub mod gmres;
pub mod newton;
pub use flow_map::{FlowMap, NavierFlowMap};
pub use gmres::{gmres, GmresOutcome};
pub use newton::{NewtonKrylov, NewtonOutcome};
