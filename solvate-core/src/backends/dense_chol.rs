//! Dense Cholesky linear-system backend.
//!
//! Symmetric positive definite systems. This is the one built-in that
//! exposes its triangular factor, so callers can run forward/backward
//! substitutions against L directly.

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, Dyn};

use crate::backend::LinearBackend;
use crate::error::Result;
use crate::options::{OptionSchema, OptionType, ResolvedOptions};
use crate::problem::LinearLayout;
use crate::registry::{PluginDescriptor, PluginFactory};
use crate::status::{RawStatus, StatusClass, StatusEntry, StatusTable};

/// Registry key.
pub const NAME: &str = "dense_chol";

mod codes {
    pub const OK: i32 = 0;
    pub const NOT_SPD: i32 = 1;
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
            code: codes::NOT_SPD,
            class: StatusClass::NumericalFailure,
            message: "matrix is not positive definite",
        },
        StatusEntry {
            code: codes::SEQUENCE,
            class: StatusClass::Fatal,
            message: "backend called out of sequence",
        },
    ],
};

/// Dense Cholesky backend state.
pub struct DenseCholBackend {
    n: usize,
    shift: f64,
    mat: DMatrix<f64>,
    chol: Option<Cholesky<f64, Dyn>>,
    // Cached L so triangular solves need no per-call extraction.
    l_factor: Option<DMatrix<f64>>,
}

impl DenseCholBackend {
    /// Fresh, unprepared backend.
    pub fn new() -> Self {
        Self {
            n: 0,
            shift: 0.0,
            mat: DMatrix::zeros(0, 0),
            chol: None,
            l_factor: None,
        }
    }
}

impl Default for DenseCholBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearBackend for DenseCholBackend {
    fn options(&self) -> OptionSchema {
        OptionSchema::new().add(
            "shift",
            OptionType::Real,
            0.0,
            "nonnegative diagonal shift added before factorizing, for nearly \
             semidefinite systems",
        )
    }

    fn status_table(&self) -> &StatusTable {
        &STATUS_TABLE
    }

    fn prepare(&mut self, layout: &LinearLayout, opts: &ResolvedOptions) -> Result<()> {
        self.n = layout.n();
        self.shift = opts.real("shift");
        self.mat = DMatrix::zeros(self.n, self.n);
        Ok(())
    }

    fn factorize(&mut self, a_dense: &[f64]) -> RawStatus {
        if self.n == 0 || a_dense.len() != self.n * self.n {
            return codes::SEQUENCE;
        }
        self.mat.copy_from_slice(a_dense);
        if self.shift != 0.0 {
            for i in 0..self.n {
                self.mat[(i, i)] += self.shift;
            }
        }

        match Cholesky::new(self.mat.clone()) {
            Some(chol) => {
                self.l_factor = Some(chol.l());
                self.chol = Some(chol);
                codes::OK
            }
            None => {
                self.chol = None;
                self.l_factor = None;
                codes::NOT_SPD
            }
        }
    }

    fn solve(&mut self, xb: &mut [f64], nrhs: usize, transpose: bool) -> RawStatus {
        // Symmetric system: the transpose solve is the same solve.
        let _ = transpose;
        let Some(chol) = self.chol.as_ref() else {
            return codes::SEQUENCE;
        };
        let mut b = DMatrix::from_column_slice(self.n, nrhs, xb);
        chol.solve_mut(&mut b);
        xb.copy_from_slice(b.as_slice());
        codes::OK
    }

    fn provides_cholesky(&self) -> bool {
        true
    }

    fn solve_cholesky(&mut self, xb: &mut [f64], nrhs: usize, transpose: bool) -> RawStatus {
        let Some(l) = self.l_factor.as_ref() else {
            return codes::SEQUENCE;
        };
        let mut b = DMatrix::from_column_slice(self.n, nrhs, xb);
        let ok = if transpose {
            // L^T x = b.
            l.tr_solve_lower_triangular_mut(&mut b)
        } else {
            // L x = b.
            l.solve_lower_triangular_mut(&mut b)
        };
        if !ok {
            return codes::NOT_SPD;
        }
        xb.copy_from_slice(b.as_slice());
        codes::OK
    }
}

/// Registration entry point.
pub fn register(desc: &mut PluginDescriptor) -> i32 {
    desc.name = NAME.to_string();
    desc.version = 1;
    desc.doc = "Dense Cholesky factorization for symmetric positive definite \
                systems. Exposes the triangular factor for forward/backward \
                substitution."
        .to_string();
    desc.factory = Some(PluginFactory::Linear(Box::new(|| {
        Box::new(DenseCholBackend::new())
    })));
    0
}
