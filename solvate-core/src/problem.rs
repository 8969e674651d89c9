//! Problem descriptors and solution types.
//!
//! A descriptor is an immutable description of problem shape: dimensions
//! plus the nonzero structure of each matrix role. It is created once at
//! instance construction, validated eagerly, and shared by reference with
//! every subsequent solve. Numeric values never live here.

use std::fmt;

use crate::error::{Result, SolverError};
use crate::sparse::SparseCsc;

/// Nonzero structure of a matrix, independent of its values.
///
/// Consumed as an opaque shape: rows, columns and the CSC index arrays.
/// Never mutated by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sparsity {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
}

impl Sparsity {
    /// Capture the structure of a CSC matrix.
    pub fn of(mat: &SparseCsc) -> Self {
        Self {
            nrows: mat.rows(),
            ncols: mat.cols(),
            indptr: mat.indptr().raw_storage().to_vec(),
            indices: mat.indices().to_vec(),
        }
    }

    /// Fully dense pattern of the given shape.
    pub fn dense(nrows: usize, ncols: usize) -> Self {
        let mut indptr = Vec::with_capacity(ncols + 1);
        let mut indices = Vec::with_capacity(nrows * ncols);
        indptr.push(0);
        for _ in 0..ncols {
            indices.extend(0..nrows);
            indptr.push(indices.len());
        }
        Self {
            nrows,
            ncols,
            indptr,
            indices,
        }
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of structural nonzeros.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Column pointer array (length `ncols + 1`).
    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    /// Row index array (length `nnz`).
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Whether a matrix carries exactly this structure.
    pub fn matches(&self, mat: &SparseCsc) -> bool {
        mat.rows() == self.nrows
            && mat.cols() == self.ncols
            && mat.indptr().raw_storage() == self.indptr.as_slice()
            && mat.indices() == self.indices.as_slice()
    }
}

impl fmt::Display for Sparsity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}, {} nnz", self.nrows, self.ncols, self.nnz())
    }
}

/// Shape description for a linear-system instance: one square matrix.
#[derive(Debug, Clone)]
pub struct LinearLayout {
    /// Structure of the system matrix A.
    pub a: Sparsity,
}

impl LinearLayout {
    /// Validate and build the layout. A non-square A is unsolvable by
    /// construction.
    pub fn new(a: Sparsity) -> Result<Self> {
        if a.nrows() != a.ncols() {
            return Err(SolverError::structural(format!(
                "linear system matrix must be square, got {}",
                a
            )));
        }
        if a.nrows() == 0 {
            return Err(SolverError::structural(
                "linear system matrix must have positive dimension",
            ));
        }
        Ok(Self { a })
    }

    /// System dimension n.
    pub fn n(&self) -> usize {
        self.a.nrows()
    }
}

/// Shape description for a QP instance.
///
/// The problem solved is
///
/// ```text
/// minimize    (1/2) x^T H x + g^T x
/// subject to  lbx <= x <= ubx
///             lba <= A x <= uba
/// ```
///
/// with `n` variables and `m` linear constraints. H is stored upper
/// triangle only; A is a general m-by-n matrix.
#[derive(Debug, Clone)]
pub struct QpLayout {
    /// Structure of the Hessian H (n x n, upper triangle).
    pub h: Sparsity,
    /// Structure of the constraint Jacobian A (m x n).
    pub a: Sparsity,
}

impl QpLayout {
    /// Validate and build the layout.
    pub fn new(h: Sparsity, a: Sparsity) -> Result<Self> {
        if h.nrows() != h.ncols() {
            return Err(SolverError::structural(format!(
                "Hessian must be square, got {}",
                h
            )));
        }
        if h.nrows() == 0 {
            return Err(SolverError::structural("QP must have at least one variable"));
        }
        if a.ncols() != h.nrows() {
            return Err(SolverError::structural(format!(
                "constraint Jacobian has {} columns, expected {} to match the Hessian",
                a.ncols(),
                h.nrows()
            )));
        }
        // Upper-triangle storage: no entry below the diagonal.
        for col in 0..h.ncols() {
            let lo = h.indptr()[col];
            let hi = h.indptr()[col + 1];
            if h.indices()[lo..hi].iter().any(|&row| row > col) {
                return Err(SolverError::structural(
                    "Hessian pattern must contain the upper triangle only",
                ));
            }
        }
        Ok(Self { h, a })
    }

    /// Number of variables n.
    pub fn n(&self) -> usize {
        self.h.nrows()
    }

    /// Number of linear constraints m.
    pub fn m(&self) -> usize {
        self.a.nrows()
    }
}

/// Terminal status of a successful-or-partially-successful solve.
///
/// Hard failures are errors, not statuses; a value of this type always
/// comes with a usable iterate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Converged to the requested tolerance.
    Optimal,
    /// Iteration budget exhausted; best iterate returned.
    MaxIters,
    /// Time budget exhausted; best iterate returned.
    TimeLimit,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "Optimal"),
            SolveStatus::MaxIters => write!(f, "MaxIters"),
            SolveStatus::TimeLimit => write!(f, "TimeLimit"),
        }
    }
}

/// QP solve result.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Terminal status. Never a hard failure.
    pub status: SolveStatus,
    /// Primal solution x (length n).
    pub x: Vec<f64>,
    /// Multipliers, bounds first then constraints (length n + m).
    pub lam: Vec<f64>,
    /// Objective value at x.
    pub cost: f64,
    /// Iterations spent by the backend.
    pub iters: usize,
}
