//! Dense marshaling of engine-side sparse data.
//!
//! Backends never see the CSC representation. These primitives expand
//! sparse inputs into pre-sized workspace slots in the exact layout a
//! backend wants, and move vectors with optional scaling for backends
//! whose dual sign convention is opposite the engine's.
//!
//! None of these functions allocate. A mismatch between the data and its
//! declared sparsity is a programming-contract violation and panics; it
//! means the caller passed a descriptor inconsistent with the values, not
//! a condition to recover from.

use crate::problem::Sparsity;
use crate::sparse::SparseCsc;

/// Expand a sparse matrix into a dense column-major buffer.
///
/// With `transpose` set, the destination receives A^T instead, which is
/// the same memory as row-major A.
pub fn densify(src: &SparseCsc, sp: &Sparsity, dst: &mut [f64], transpose: bool) {
    assert!(
        sp.matches(src),
        "matrix does not carry its declared sparsity ({} nnz declared, {} found)",
        sp.nnz(),
        src.nnz()
    );
    let (nrows, ncols) = (sp.nrows(), sp.ncols());
    assert_eq!(
        dst.len(),
        nrows * ncols,
        "dense destination has wrong size for {}x{}",
        nrows,
        ncols
    );

    dst.fill(0.0);
    for (col, column) in src.outer_iterator().enumerate() {
        for (row, &val) in column.iter() {
            if transpose {
                dst[row * ncols + col] = val;
            } else {
                dst[col * nrows + row] = val;
            }
        }
    }
}

/// Expand an upper-triangle-stored symmetric matrix into a full dense
/// column-major buffer, mirroring across the diagonal.
///
/// Backends that accept half-stored symmetric matrices skip this and take
/// [`densify`] output directly.
pub fn densify_symmetric(src: &SparseCsc, sp: &Sparsity, dst: &mut [f64]) {
    assert!(
        sp.matches(src),
        "matrix does not carry its declared sparsity"
    );
    let n = sp.nrows();
    assert_eq!(sp.ncols(), n, "symmetric expansion needs a square matrix");
    assert_eq!(dst.len(), n * n, "dense destination has wrong size");

    dst.fill(0.0);
    for (col, column) in src.outer_iterator().enumerate() {
        for (row, &val) in column.iter() {
            assert!(row <= col, "symmetric source must be upper triangle only");
            dst[col * n + row] = val;
            dst[row * n + col] = val;
        }
    }
}

/// Copy a dense vector into a workspace slot.
pub fn copy(src: &[f64], dst: &mut [f64]) {
    assert_eq!(src.len(), dst.len(), "vector copy length mismatch");
    dst.copy_from_slice(src);
}

/// Copy a dense vector with scaling, `dst = alpha * src`.
///
/// `alpha = -1` is the dual-sign flip some backends need.
pub fn copy_scaled(src: &[f64], alpha: f64, dst: &mut [f64]) {
    assert_eq!(src.len(), dst.len(), "vector copy length mismatch");
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = alpha * s;
    }
}

/// Scale a vector in place.
pub fn scale(alpha: f64, xs: &mut [f64]) {
    for x in xs.iter_mut() {
        *x *= alpha;
    }
}
