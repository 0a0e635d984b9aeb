//! Errors raised when constructing or querying a factored distribution.

use thiserror::Error;

use crate::linalg::LinalgError;

/// Errors from factored distribution construction and queries.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FactorError {
    /// Two inputs disagree on a dimension.
    #[error("shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// A decomposition of a derived matrix failed.
    #[error("numerical instability while computing {context}: {source}")]
    NumericalInstability {
        context: &'static str,
        #[source]
        source: LinalgError,
    },

    /// A parameter is outside its mathematical domain.
    #[error("domain violation: {0}")]
    DomainViolation(&'static str),
}

impl FactorError {
    pub(crate) fn shape(what: &'static str, expected: usize, got: usize) -> Self {
        FactorError::ShapeMismatch {
            what,
            expected,
            got,
        }
    }

    pub(crate) fn unstable(context: &'static str) -> impl FnOnce(LinalgError) -> Self {
        move |source| FactorError::NumericalInstability { context, source }
    }
}

/// Return a shape mismatch unless `expected == got`.
#[inline]
pub(crate) fn check_dim(what: &'static str, expected: usize, got: usize) -> Result<(), FactorError> {
    if expected == got {
        Ok(())
    } else {
        Err(FactorError::shape(what, expected, got))
    }
}
