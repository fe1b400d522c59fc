//! Error type shared by all solver components
use crate::field::Bc;
use crate::navier_stokes_lnse::trajectory::Direction;
use thiserror::Error;

/// Result alias with the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by transforms, solvers and drivers
#[derive(Debug, Error)]
pub enum Error {
    /// Reading or writing field files
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Factorization or decomposition failed
    #[error("linear algebra error: {0}")]
    Linalg(String),

    /// Field with an unexpected boundary condition tag
    #[error("boundary condition mismatch: expected {expected:?}, found {found:?}")]
    BcMismatch {
        /// Tag required by the operation
        expected: Bc,
        /// Tag of the supplied field
        found: Bc,
    },

    /// Array dimensions do not match the grid
    #[error("shape error: {0}")]
    Shape(String),

    /// Trajectory holds fewer than two snapshots
    #[error("trajectory needs at least two snapshots")]
    TrajectoryEmpty,

    /// Query time outside the stored trajectory
    #[error("time {time} outside of trajectory [{start}, {end}]")]
    TrajectoryRange {
        /// Requested time
        time: f64,
        /// First stored time
        start: f64,
        /// Last stored time
        end: f64,
    },

    /// Query reversed the direction the interpolator was opened with
    #[error("{direction:?} trajectory queried at {requested} after {previous}")]
    TrajectoryDirection {
        /// Declared playback direction
        direction: Direction,
        /// Last queried time
        previous: f64,
        /// Offending time
        requested: f64,
    },

    /// No real Lagrange multiplier found after repeated step halving
    #[error("optimizer stalled after {attempts} step halvings (epsilon = {epsilon:e})")]
    OptimizerStalled {
        /// Step size at the last attempt
        epsilon: f64,
        /// Number of halvings
        attempts: usize,
    },

    /// Invalid parameters
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<ndarray_linalg::error::LinalgError> for Error {
    fn from(e: ndarray_linalg::error::LinalgError) -> Self {
        Self::Linalg(e.to_string())
    }
}
