//! Backend status classification.
//!
//! Each backend speaks its own status vocabulary: an integer code per
//! terminal condition, in whatever numbering its native API uses. This
//! module translates those codes into the shared taxonomy in exactly one
//! place. The mapping is total: a code missing from a backend's table is
//! classified as fatal with the raw code preserved, never dropped.

use crate::error::SolverError;

/// Raw status code as returned by a backend.
pub type RawStatus = i32;

/// Taxonomy bucket a raw status falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Solve finished with a usable solution.
    Success,

    /// Iteration budget exhausted before convergence. The best iterate
    /// found is still available.
    IterationLimit,

    /// Wall-clock budget exhausted before convergence. Best iterate
    /// available, same as [`StatusClass::IterationLimit`].
    TimeLimit,

    /// The numeric values are degenerate. Retrying with different data on
    /// the same structure may succeed.
    NumericalFailure,

    /// The problem structure itself is defective.
    Structural,

    /// Unrecoverable backend failure.
    Fatal,
}

impl StatusClass {
    /// Whether an iterate can be extracted after a status of this class.
    pub fn has_iterate(self) -> bool {
        matches!(
            self,
            StatusClass::Success | StatusClass::IterationLimit | StatusClass::TimeLimit
        )
    }
}

/// One row of a backend's status vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct StatusEntry {
    /// The backend-native code.
    pub code: RawStatus,
    /// Taxonomy bucket the code maps to.
    pub class: StatusClass,
    /// Human-readable description, used in error messages.
    pub message: &'static str,
}

/// A backend's complete status table.
///
/// Tables are declared next to the backend that produces the codes and are
/// the single place its vocabulary is translated.
#[derive(Debug, Clone, Copy)]
pub struct StatusTable {
    /// Registry key of the backend this table belongs to.
    pub backend: &'static str,
    /// All documented codes.
    pub entries: &'static [StatusEntry],
}

/// Outcome of classifying one raw code against one table.
#[derive(Debug, Clone, Copy)]
pub struct Classified {
    /// Taxonomy bucket.
    pub class: StatusClass,
    /// Message from the table, or `None` for an undocumented code.
    pub message: Option<&'static str>,
    /// The raw code, always preserved.
    pub code: RawStatus,
}

impl StatusTable {
    /// Classify a raw backend code.
    ///
    /// Total over all of `i32`: codes absent from the table come back as
    /// [`StatusClass::Fatal`] with `message: None`. Pure; logging the
    /// fallback is the caller's concern.
    pub fn classify(&self, code: RawStatus) -> Classified {
        for entry in self.entries {
            if entry.code == code {
                return Classified {
                    class: entry.class,
                    message: Some(entry.message),
                    code,
                };
            }
        }
        Classified {
            class: StatusClass::Fatal,
            message: None,
            code,
        }
    }
}

impl Classified {
    /// Fold a non-iterate-bearing classification into the taxonomy error.
    ///
    /// Must only be called when [`StatusClass::has_iterate`] is false;
    /// iterate-bearing statuses are terminal-but-successful and are not
    /// errors.
    pub fn into_error(self, backend: &str) -> SolverError {
        let message = self
            .message
            .map(str::to_string)
            .unwrap_or_else(|| format!("status code {}", self.code));
        match self.class {
            StatusClass::NumericalFailure => SolverError::Numerical {
                backend: backend.to_string(),
                message,
            },
            StatusClass::Structural => SolverError::Structural(format!("{}: {}", backend, message)),
            _ => SolverError::BackendFatal {
                backend: backend.to_string(),
                code: self.code,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: StatusTable = StatusTable {
        backend: "fixture",
        entries: &[
            StatusEntry {
                code: 0,
                class: StatusClass::Success,
                message: "ok",
            },
            StatusEntry {
                code: 1,
                class: StatusClass::IterationLimit,
                message: "budget exhausted",
            },
            StatusEntry {
                code: 7,
                class: StatusClass::NumericalFailure,
                message: "singular",
            },
        ],
    };

    #[test]
    fn test_documented_codes() {
        assert_eq!(TABLE.classify(0).class, StatusClass::Success);
        assert_eq!(TABLE.classify(1).class, StatusClass::IterationLimit);
        assert_eq!(TABLE.classify(7).class, StatusClass::NumericalFailure);
        assert_eq!(TABLE.classify(7).message, Some("singular"));
    }

    #[test]
    fn test_unknown_code_is_fatal_with_code_preserved() {
        let c = TABLE.classify(-9999);
        assert_eq!(c.class, StatusClass::Fatal);
        assert_eq!(c.code, -9999);
        assert!(c.message.is_none());

        match c.into_error("fixture") {
            SolverError::BackendFatal { backend, code } => {
                assert_eq!(backend, "fixture");
                assert_eq!(code, -9999);
            }
            other => panic!("expected BackendFatal, got {:?}", other),
        }
    }

    #[test]
    fn test_totality_over_sample_range() {
        // Every code classifies to something; no panics, no gaps.
        for code in -50..50 {
            let c = TABLE.classify(code);
            if ![0, 1, 7].contains(&code) {
                assert_eq!(c.class, StatusClass::Fatal);
            }
            let _ = c.class.has_iterate();
        }
    }

    #[test]
    fn test_numerical_failure_maps_to_typed_error() {
        match TABLE.classify(7).into_error("fixture") {
            SolverError::Numerical { backend, message } => {
                assert_eq!(backend, "fixture");
                assert!(message.contains("singular"));
            }
            other => panic!("expected Numerical, got {:?}", other),
        }
    }
}
