//! Crate-wide error type.
//!
//! Every failure carries enough context to diagnose it (epoch index, array
//! shape, component name) and maps to a process exit code for the `rvs` binary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RvError {
    /// Missing or malformed inputs.
    #[error("validation error: {0}")]
    Validation(String),

    /// Inputs are well-formed but outside the numeric domain of an operation.
    #[error("domain error: {0}")]
    Domain(String),

    /// Nonlinear fit failed to converge (or had no usable starting point).
    #[error("fit did not converge: {0}")]
    FitConvergence(String),

    /// An external resource (file, mask repository) could not be used.
    #[error("resource error: {0}")]
    Resource(String),

    /// A per-epoch failure, tagged with the epoch index.
    #[error("epoch {epoch}: {source}")]
    Epoch {
        epoch: usize,
        #[source]
        source: Box<RvError>,
    },

    #[error("cancelled after {completed} of {total} epochs")]
    Cancelled { completed: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, RvError>;

/// Error category without the message, for records that outlive the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Domain,
    FitConvergence,
    Resource,
    Cancelled,
}

impl RvError {
    pub fn validation(message: impl Into<String>) -> Self {
        RvError::Validation(message.into())
    }

    pub fn domain(message: impl Into<String>) -> Self {
        RvError::Domain(message.into())
    }

    pub fn fit(message: impl Into<String>) -> Self {
        RvError::FitConvergence(message.into())
    }

    pub fn resource(message: impl Into<String>) -> Self {
        RvError::Resource(message.into())
    }

    /// Wrap an error with the index of the epoch that produced it.
    pub fn at_epoch(self, epoch: usize) -> Self {
        RvError::Epoch {
            epoch,
            source: Box::new(self),
        }
    }

    /// Category of the underlying failure; epoch wrappers are looked through.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RvError::Validation(_) => ErrorKind::Validation,
            RvError::Domain(_) => ErrorKind::Domain,
            RvError::FitConvergence(_) => ErrorKind::FitConvergence,
            RvError::Resource(_) => ErrorKind::Resource,
            RvError::Epoch { source, .. } => source.kind(),
            RvError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Process exit code for the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            RvError::Validation(_) | RvError::Resource(_) => 2,
            RvError::Domain(_) => 3,
            RvError::FitConvergence(_) => 4,
            RvError::Epoch { source, .. } => source.exit_code(),
            RvError::Cancelled { .. } => 130,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_error_forwards_exit_code_and_names_epoch() {
        let err = RvError::fit("no half-depth crossing").at_epoch(7);
        assert_eq!(err.exit_code(), 4);
        let msg = err.to_string();
        assert!(msg.contains("epoch 7"), "{msg}");
        assert!(msg.contains("no half-depth crossing"), "{msg}");
    }

    #[test]
    fn kind_looks_through_epoch_wrapper() {
        assert_eq!(RvError::fit("x").at_epoch(2).kind(), ErrorKind::FitConvergence);
        assert_eq!(RvError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(serde_json::to_string(&ErrorKind::FitConvergence).unwrap(), "\"fit_convergence\"");
    }
}
