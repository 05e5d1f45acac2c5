//! Error types for the convergence suite.

use std::path::PathBuf;
use thiserror::Error;

use crate::accessor::AccessError;
use crate::converge::ConvergenceError;
use crate::scenario::StepError;

/// Top-level error type for suite operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A call against the control plane failed.
    #[error("control plane access failed: {0}")]
    Access(#[from] AccessError),

    /// A wait did not converge.
    #[error(transparent)]
    Convergence(#[from] ConvergenceError),

    /// A scenario step failed.
    #[error("scenario step failed: {0}")]
    Step(#[from] StepError),

    /// Suite or fixture configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for suite operations.
pub type Result<T> = std::result::Result<T, Error>;
