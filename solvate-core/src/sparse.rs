//! Sparse matrix aliases and constructors.
//!
//! The engine-side representation is CSC (Compressed Sparse Column), the
//! standard input format for sparse direct solvers. Backends never see
//! these types; marshaling converts them to whatever layout a backend
//! wants.

use sprs::{CsMat, TriMat};

/// Sparse matrix in CSC format (general, not necessarily symmetric).
pub type SparseCsc = CsMat<f64>;

/// Sparse symmetric matrix in CSC format (upper triangle only).
pub type SparseSymmetricCsc = CsMat<f64>;

/// Build a sparse CSC matrix from triplets (row, col, value).
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Build a symmetric sparse CSC matrix from upper triangle triplets.
///
/// Only stores the upper triangle. Assumes triplets satisfy j >= i.
pub fn from_triplets_symmetric<I>(n: usize, triplets: I) -> SparseSymmetricCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((n, n));
    for (i, j, v) in triplets {
        assert!(j >= i, "symmetric matrix must only contain upper triangle");
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Create a diagonal matrix in CSC format.
pub fn diagonal(diag: &[f64]) -> SparseCsc {
    let n = diag.len();
    let triplets = diag.iter().enumerate().map(|(i, &v)| (i, i, v));
    from_triplets(n, n, triplets)
}

/// Create an identity matrix in CSC format.
pub fn identity(n: usize) -> SparseCsc {
    diagonal(&vec![1.0; n])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_triplets() {
        let mat = from_triplets(2, 2, vec![(0, 0, 1.0), (1, 1, 2.0), (0, 1, 3.0)]);
        assert_eq!(mat.rows(), 2);
        assert_eq!(mat.cols(), 2);
        assert_eq!(mat.nnz(), 3);
    }

    #[test]
    fn test_diagonal_and_identity() {
        let mat = diagonal(&[1.0, 2.0, 3.0]);
        assert_eq!(mat.nnz(), 3);
        for i in 0..3 {
            let col = mat.outer_view(i).unwrap();
            let (_, &val) = col.iter().next().unwrap();
            assert_eq!(val, (i + 1) as f64);
        }

        let eye = identity(4);
        assert_eq!(eye.rows(), 4);
        assert_eq!(eye.nnz(), 4);
    }

    #[test]
    #[should_panic(expected = "upper triangle")]
    fn test_symmetric_rejects_lower_entries() {
        let _ = from_triplets_symmetric(2, vec![(1, 0, 1.0)]);
    }
}
