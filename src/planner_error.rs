//! Error handling for the waypoint planner

use std::io;

/// Unified error to report planner failures. Only configuration and ingestion errors
/// are ever returned to the caller; non-convergence and missing obstacle data are logged
/// and degraded inside the planner, the variants exist so that lower level solvers can
/// report them.
#[derive(Debug)]
pub enum PlannerError {
    IoError(io::Error),
    ParseError(String),
    InvalidConfiguration(String),
    OptimizerNonConvergence(String),
    MissingSpatialData(String),
    IngestionFailure(String),
}

/// Result type alias for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;

impl std::fmt::Display for PlannerError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            PlannerError::IoError(ref err) =>
                write!(f, "IO Error: {}", err),
            PlannerError::ParseError(ref msg) =>
                write!(f, "Parse Error: {}", msg),
            PlannerError::InvalidConfiguration(ref msg) =>
                write!(f, "Invalid Configuration: {}", msg),
            PlannerError::OptimizerNonConvergence(ref msg) =>
                write!(f, "Optimizer did not converge: {}", msg),
            PlannerError::MissingSpatialData(ref msg) =>
                write!(f, "Missing spatial data: {}", msg),
            PlannerError::IngestionFailure(ref msg) =>
                write!(f, "Collision model ingestion failed: {}", msg),
        }
    }
}

impl std::error::Error for PlannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlannerError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PlannerError {
    fn from(err: io::Error) -> Self {
        PlannerError::IoError(err)
    }
}
