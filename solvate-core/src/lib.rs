//! Solvate: pluggable numerical solver backends behind one contract.
//!
//! This library lets an optimization engine issue solve requests against a
//! uniform capability interface while swapping among interchangeable
//! numerical backends: dense direct solvers, Cholesky solvers, QP solvers.
//! Call sites never change when the backend does, and performance-critical
//! state (factorizations, interior-point iterates) is preserved across
//! repeated solves with slowly changing data.
//!
//! The pieces:
//!
//! - **Registry** ([`registry`]): process-wide catalog of backends, keyed
//!   by name, populated at startup or by an explicit dynamic load.
//! - **Option schema** ([`options`]): typed, defaulted, domain-checked
//!   tunables per backend, validated before anything is allocated.
//! - **Marshaling** ([`marshal`]): converts the engine's sparse matrices
//!   into the dense layouts backends want, into pre-sized workspace slots.
//! - **Capability traits** ([`backend`]): the contract every backend
//!   implements, linear-system or QP shaped.
//! - **Instances** ([`instance`]): exclusive owners of configuration,
//!   workspace and backend-native state, running the hot-start protocol.
//! - **Status mapping** ([`status`]): total translation of backend-native
//!   status codes into the shared error taxonomy.
//!
//! # Example
//!
//! ```ignore
//! use solvate_core::{sparse, LinearLayout, Sparsity, Options};
//!
//! let a = sparse::identity(2);
//! let layout = LinearLayout::new(Sparsity::of(&a))?;
//! let mut solver = solvate_core::create_linear("dense_lu", layout, &Options::new())?;
//!
//! solver.factorize(&a)?;
//! let mut xb = vec![3.0, 5.0];
//! solver.solve_in_place(&mut xb, 1, false)?;
//! // Re-solve with a new right-hand side; the factorization is reused.
//! ```

#![warn(clippy::all)]

pub mod backend;
pub mod backends;
pub mod error;
pub mod instance;
pub mod marshal;
pub mod options;
pub mod problem;
pub mod registry;
pub mod sparse;
pub mod status;
pub mod workspace;

// Re-export main types
pub use backend::{Budget, LinearBackend, QpBackend, QpOutputs, QpViews};
pub use error::{Result, SolverError};
pub use instance::{HotstartState, LinearSolver, QpInputs, QpSolver};
pub use options::{OptionSchema, OptionType, OptionValue, Options, ResolvedOptions};
pub use problem::{LinearLayout, QpLayout, Solution, SolveStatus, Sparsity};
pub use registry::{PluginDescriptor, PluginFactory, RegisterFn, Registry};
pub use status::{RawStatus, StatusClass, StatusEntry, StatusTable};

use std::path::Path;

fn with_global<R>(f: impl FnOnce(&Registry) -> R) -> R {
    let guard = registry::global()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&guard)
}

/// Whether a backend is registered under `name` in the global registry.
pub fn has_plugin(name: &str) -> bool {
    with_global(|reg| reg.has(name))
}

/// Documentation for a globally registered backend, including its option
/// table.
pub fn plugin_doc(name: &str) -> Result<String> {
    with_global(|reg| reg.doc(name))
}

/// Explicitly load a plugin library into the global registry.
///
/// This is the only call that loads code; lookups and creation never do.
pub fn load_plugin(path: &Path, name: &str) -> Result<()> {
    let mut guard = registry::global()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.load(path, name)
}

/// Instantiate a linear-system solver from the global registry.
pub fn create_linear(name: &str, layout: LinearLayout, opts: &Options) -> Result<LinearSolver> {
    with_global(|reg| reg.create_linear(name, layout, opts))
}

/// Instantiate a QP solver from the global registry.
pub fn create_qp(name: &str, layout: QpLayout, opts: &Options) -> Result<QpSolver> {
    with_global(|reg| reg.create_qp(name, layout, opts))
}
