//! Dense LU linear-system backend.
//!
//! General square systems via LU with partial pivoting. Transpose solves
//! factorize A^T on first use and cache that factor alongside the primal
//! one; both are invalidated together by the next `factorize`.

use nalgebra::linalg::LU;
use nalgebra::{DMatrix, Dyn};

use crate::backend::LinearBackend;
use crate::error::Result;
use crate::options::{OptionSchema, OptionType, ResolvedOptions};
use crate::problem::LinearLayout;
use crate::registry::{PluginDescriptor, PluginFactory};
use crate::status::{RawStatus, StatusClass, StatusEntry, StatusTable};

/// Registry key.
pub const NAME: &str = "dense_lu";

mod codes {
    pub const OK: i32 = 0;
    pub const SINGULAR: i32 = 1;
    pub const SEQUENCE: i32 = 2;
}

static STATUS_TABLE: StatusTable = StatusTable {
    backend: NAME,
    entries: &[
        StatusEntry {
            code: codes::OK,
            class: StatusClass::Success,
            message: "completed",
        },
        StatusEntry {
            code: codes::SINGULAR,
            class: StatusClass::NumericalFailure,
            message: "matrix is numerically singular",
        },
        StatusEntry {
            code: codes::SEQUENCE,
            class: StatusClass::Fatal,
            message: "backend called out of sequence",
        },
    ],
};

/// Dense LU backend state.
pub struct DenseLuBackend {
    n: usize,
    pivot_check: bool,
    singularity_tol: f64,
    a: DMatrix<f64>,
    lu: Option<LU<f64, Dyn, Dyn>>,
    lu_t: Option<LU<f64, Dyn, Dyn>>,
}

impl DenseLuBackend {
    /// Fresh, unprepared backend.
    pub fn new() -> Self {
        Self {
            n: 0,
            pivot_check: true,
            singularity_tol: 1e-12,
            a: DMatrix::zeros(0, 0),
            lu: None,
            lu_t: None,
        }
    }

    fn is_singular(lu: &LU<f64, Dyn, Dyn>, tol: f64) -> bool {
        let u = lu.u();
        let n = u.nrows().min(u.ncols());
        let mut max_piv = 0.0f64;
        let mut min_piv = f64::INFINITY;
        for i in 0..n {
            let p = u[(i, i)].abs();
            max_piv = max_piv.max(p);
            min_piv = min_piv.min(p);
        }
        min_piv <= tol * max_piv.max(1.0)
    }
}

impl Default for DenseLuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearBackend for DenseLuBackend {
    fn options(&self) -> OptionSchema {
        OptionSchema::new()
            .add(
                "pivot_check",
                OptionType::Bool,
                true,
                "reject factorizations whose smallest pivot falls below singularity_tol",
            )
            .add(
                "singularity_tol",
                OptionType::Real,
                1e-12,
                "relative pivot magnitude below which the matrix counts as singular",
            )
    }

    fn status_table(&self) -> &StatusTable {
        &STATUS_TABLE
    }

    fn prepare(&mut self, layout: &LinearLayout, opts: &ResolvedOptions) -> Result<()> {
        self.n = layout.n();
        self.pivot_check = opts.bool("pivot_check");
        self.singularity_tol = opts.real("singularity_tol");
        self.a = DMatrix::zeros(self.n, self.n);
        Ok(())
    }

    fn factorize(&mut self, a_dense: &[f64]) -> RawStatus {
        if self.n == 0 || a_dense.len() != self.n * self.n {
            return codes::SEQUENCE;
        }
        self.a.copy_from_slice(a_dense);
        self.lu_t = None;

        let lu = self.a.clone().lu();
        if self.pivot_check && Self::is_singular(&lu, self.singularity_tol) {
            self.lu = None;
            return codes::SINGULAR;
        }
        self.lu = Some(lu);
        codes::OK
    }

    fn solve(&mut self, xb: &mut [f64], nrhs: usize, transpose: bool) -> RawStatus {
        if self.lu.is_none() {
            return codes::SEQUENCE;
        }
        if transpose && self.lu_t.is_none() {
            let lu_t = self.a.transpose().lu();
            if self.pivot_check && Self::is_singular(&lu_t, self.singularity_tol) {
                return codes::SINGULAR;
            }
            self.lu_t = Some(lu_t);
        }
        let lu = if transpose {
            self.lu_t.as_ref()
        } else {
            self.lu.as_ref()
        };
        let Some(lu) = lu else {
            return codes::SEQUENCE;
        };

        let mut b = DMatrix::from_column_slice(self.n, nrhs, xb);
        if !lu.solve_mut(&mut b) {
            return codes::SINGULAR;
        }
        xb.copy_from_slice(b.as_slice());
        codes::OK
    }
}

/// Registration entry point.
pub fn register(desc: &mut PluginDescriptor) -> i32 {
    desc.name = NAME.to_string();
    desc.version = 1;
    desc.doc = "Dense LU factorization with partial pivoting for general \
                square systems. Factorize once, then solve any number of \
                right-hand sides, plain or transposed."
        .to_string();
    desc.factory = Some(PluginFactory::Linear(Box::new(|| {
        Box::new(DenseLuBackend::new())
    })));
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::problem::Sparsity;

    fn prepared(n: usize) -> DenseLuBackend {
        let mut backend = DenseLuBackend::new();
        let layout = LinearLayout::new(Sparsity::dense(n, n)).unwrap();
        let opts = backend.options().resolve(&Options::new()).unwrap();
        backend.prepare(&layout, &opts).unwrap();
        backend
    }

    #[test]
    fn test_factorize_and_solve() {
        let mut backend = prepared(2);
        // Column-major [[2, 1], [1, 3]].
        let a = [2.0, 1.0, 1.0, 3.0];
        assert_eq!(backend.factorize(&a), codes::OK);

        let mut xb = [5.0, 6.0];
        assert_eq!(backend.solve(&mut xb, 1, false), codes::OK);
        assert!((xb[0] - 1.8).abs() < 1e-12);
        assert!((xb[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_transpose_solve() {
        let mut backend = prepared(2);
        // Column-major [[1, 0], [2, 1]]: A = [[1, 2], [0, 1]].
        let a = [1.0, 0.0, 2.0, 1.0];
        assert_eq!(backend.factorize(&a), codes::OK);

        // A^T = [[1, 0], [2, 1]], so A^T x = [1, 2] gives x = [1, 0].
        let mut xb = [1.0, 2.0];
        assert_eq!(backend.solve(&mut xb, 1, true), codes::OK);
        assert!((xb[0] - 1.0).abs() < 1e-12);
        assert!((xb[1] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_matrix_reported() {
        let mut backend = prepared(2);
        // Rank one.
        let a = [1.0, 2.0, 2.0, 4.0];
        assert_eq!(backend.factorize(&a), codes::SINGULAR);
    }

    #[test]
    fn test_multiple_rhs() {
        let mut backend = prepared(2);
        let a = [1.0, 0.0, 0.0, 2.0];
        assert_eq!(backend.factorize(&a), codes::OK);

        // Two right-hand sides, column-major.
        let mut xb = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(backend.solve(&mut xb, 2, false), codes::OK);
        assert!((xb[0] - 1.0).abs() < 1e-12);
        assert!((xb[1] - 1.0).abs() < 1e-12);
        assert!((xb[2] - 3.0).abs() < 1e-12);
        assert!((xb[3] - 2.0).abs() < 1e-12);
    }
}
