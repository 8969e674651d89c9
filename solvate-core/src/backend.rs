//! Backend capability contracts.
//!
//! Every backend implements exactly one of two capability shapes: a
//! linear-system solver (factorize once, solve many right-hand sides) or a
//! QP solver (repeated solves with hot-start). The traits here are the
//! whole surface a backend sees: dense buffers marshaled by the instance
//! layer, a resolved configuration, and a per-call budget. Backends report
//! terminal conditions as raw status codes; translation into the shared
//! taxonomy happens in one place, against the backend's status table.

use std::time::Duration;

use crate::error::Result;
use crate::options::{OptionSchema, ResolvedOptions};
use crate::problem::{LinearLayout, QpLayout};
use crate::status::{RawStatus, StatusTable};

/// Per-call work budget. Cancellation is budget-based: there is no
/// asynchronous cancel signal for a solve in progress.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    /// Maximum backend iterations for this call.
    pub max_iter: usize,
    /// Wall-clock limit for this call, if any.
    pub max_time: Option<Duration>,
}

impl Budget {
    /// Iteration-only budget.
    pub fn iters(max_iter: usize) -> Self {
        Self {
            max_iter,
            max_time: None,
        }
    }

    /// Add a wall-clock limit.
    pub fn with_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }
}

/// Linear-system capability.
///
/// Call order is enforced by the owning [`crate::instance::LinearSolver`]:
/// `prepare` once, then `factorize` at least once before any `solve`.
/// Backends may therefore assume that ordering instead of re-checking it.
pub trait LinearBackend: Send {
    /// Option table this backend accepts.
    fn options(&self) -> OptionSchema;

    /// Status vocabulary of this backend.
    fn status_table(&self) -> &StatusTable;

    /// One-time setup from the problem shape and resolved options.
    ///
    /// Called lazily, immediately before the first factorization. This is
    /// where backend-native state is allocated.
    fn prepare(&mut self, layout: &LinearLayout, opts: &ResolvedOptions) -> Result<()>;

    /// Factorize the dense column-major n-by-n matrix.
    fn factorize(&mut self, a_dense: &[f64]) -> RawStatus;

    /// Solve in place for `nrhs` right-hand sides stored column-major in
    /// `xb`, reusing the cached factorization. With `transpose`, solves
    /// `A^T x = b` instead.
    fn solve(&mut self, xb: &mut [f64], nrhs: usize, transpose: bool) -> RawStatus;

    /// Whether the backend exposes its triangular (Cholesky) factor.
    fn provides_cholesky(&self) -> bool {
        false
    }

    /// Solve against the triangular factor alone: `L x = b`, or
    /// `L^T x = b` with `transpose`.
    ///
    /// Only reachable when [`LinearBackend::provides_cholesky`] is true;
    /// the instance layer rejects the call otherwise.
    fn solve_cholesky(&mut self, xb: &mut [f64], nrhs: usize, transpose: bool) -> RawStatus {
        let _ = (xb, nrhs, transpose);
        unreachable!("solve_cholesky called on a backend without a triangular factor")
    }
}

/// Marshaled, dense view of one QP solve's inputs.
///
/// All slices point into the instance's workspace; the backend must not
/// hold on to them past the call.
#[derive(Debug)]
pub struct QpViews<'a> {
    /// Number of variables.
    pub n: usize,
    /// Number of linear constraints.
    pub m: usize,
    /// Hessian, fully dense column-major n-by-n (symmetry expanded).
    pub h: &'a [f64],
    /// Gradient, length n.
    pub g: &'a [f64],
    /// Constraint matrix, dense row-major m-by-n.
    pub a: &'a [f64],
    /// Variable lower bounds, length n.
    pub lbx: &'a [f64],
    /// Variable upper bounds, length n.
    pub ubx: &'a [f64],
    /// Constraint lower bounds, length m.
    pub lba: &'a [f64],
    /// Constraint upper bounds, length m.
    pub uba: &'a [f64],
}

/// Output slots for one QP solve. A `None` slot means the caller does not
/// want that output and the backend skips computing it when that is cheap.
#[derive(Debug, Default)]
pub struct QpOutputs<'a> {
    /// Primal solution, length n.
    pub x: Option<&'a mut [f64]>,
    /// Multipliers in the backend's own sign convention, bounds first then
    /// constraints, length n + m.
    pub lam: Option<&'a mut [f64]>,
    /// Objective value.
    pub cost: Option<&'a mut f64>,
}

/// QP capability.
pub trait QpBackend: Send {
    /// Option table this backend accepts.
    fn options(&self) -> OptionSchema;

    /// Status vocabulary of this backend.
    fn status_table(&self) -> &StatusTable;

    /// One-time setup from the problem shape and resolved options.
    fn prepare(&mut self, layout: &QpLayout, opts: &ResolvedOptions) -> Result<()>;

    /// Whether warm restarts are implemented. When false, every solve on a
    /// primed instance falls back to a full cold initialization.
    fn supports_warm_start(&self) -> bool {
        false
    }

    /// Whether multipliers come back with the sign convention opposite the
    /// engine's. The instance layer negates during extraction.
    fn flips_dual_sign(&self) -> bool {
        false
    }

    /// Cold solve: build backend-native state from scratch and solve.
    fn init_solve(&mut self, data: &QpViews<'_>, budget: &Budget) -> RawStatus;

    /// Warm restart: reuse cached native state from the prior solve on
    /// this instance. Only numeric values may have changed; the sparsity
    /// is fixed for the lifetime of the instance.
    ///
    /// The conservative default re-initializes from scratch, which is
    /// always safe.
    fn warm_solve(&mut self, data: &QpViews<'_>, budget: &Budget) -> RawStatus {
        self.init_solve(data, budget)
    }

    /// Discard any cached native state.
    fn reset(&mut self);

    /// Iterations spent by the most recent solve.
    fn iterations(&self) -> usize {
        0
    }

    /// Write the requested outputs of the most recent solve. Only called
    /// after a status whose class carries an iterate.
    fn extract(&self, out: QpOutputs<'_>);
}
