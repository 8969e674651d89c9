//! The shared error taxonomy.
//!
//! Every failure a backend can produce is folded into this closed set of
//! kinds. Configuration and structural problems are detected eagerly, before
//! any backend-native state exists; numerical failures are typed outcomes a
//! caller can retry with different data.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SolverError>;

/// Closed error taxonomy shared by all backends.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Unknown backend name, unknown/invalid option, or malformed bounds.
    ///
    /// Always detected before any backend call, never retried automatically.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Problem structure that cannot be solved by construction, e.g. a
    /// dimension mismatch or a sparsity pattern the capability rejects.
    ///
    /// Fatal for the current structural configuration; the caller must fix
    /// the inputs and construct a new instance.
    #[error("structural error: {0}")]
    Structural(String),

    /// The specific numeric values are degenerate: singular matrix at
    /// factorization time, infeasible or unbounded QP, indefinite Hessian.
    ///
    /// Not fatal to the instance. A later solve with different values on the
    /// same structure may succeed.
    #[error("numerical failure in backend '{backend}': {message}")]
    Numerical {
        /// Registry key of the backend that reported the failure.
        backend: String,
        /// Backend-provided description of the degeneracy.
        message: String,
    },

    /// A backend status the mapper could not classify. The raw code is kept
    /// for diagnostics and never silently swallowed.
    #[error("backend '{backend}' returned unclassified status code {code}")]
    BackendFatal {
        /// Registry key of the offending backend.
        backend: String,
        /// The raw, backend-native status code.
        code: i32,
    },

    /// Workspace or backend-native allocation failure. Non-recoverable for
    /// the instance.
    #[error("resource error: {0}")]
    Resource(String),
}

impl SolverError {
    /// Shorthand for a [`SolverError::Configuration`].
    pub fn config(msg: impl Into<String>) -> Self {
        SolverError::Configuration(msg.into())
    }

    /// Shorthand for a [`SolverError::Structural`].
    pub fn structural(msg: impl Into<String>) -> Self {
        SolverError::Structural(msg.into())
    }
}
