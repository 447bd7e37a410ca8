//! Errors reported by the matrix algebra, the power cache and the acceleration engine.

use thiserror::Error;

/// Everything that can go wrong while computing a parametric closure.
///
/// An infeasible relation is *not* an error: it is a normal outcome of the acceleration engine
/// (see [`Termination::Infeasible`]).
///
/// [`Termination::Infeasible`]: ../acceleration/enum.Termination.html
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClosureError {
    /// A power of a relation was requested which is not strictly positive.
    #[error("invalid power {power}: powers of a relation start at 1")]
    InvalidPower {
        /// The offending power.
        power: usize,
    },
    /// Two matrices (or a matrix and a variable table) do not fit together.
    #[error("dimension mismatch in {operation}: {left} vs {right}")]
    DimensionMismatch {
        /// The operation which was attempted.
        operation: &'static str,
        /// The size of the left operand.
        left: usize,
        /// The size expected from, or carried by, the right operand.
        right: usize,
    },
    /// A checked integer operation left the range of the underlying integer type.
    #[error("arithmetic overflow in {operation} ({lhs}, {rhs})")]
    Overflow {
        /// The operation which overflowed.
        operation: &'static str,
        /// The left operand.
        lhs: i128,
        /// The right operand.
        rhs: i128,
    },
    /// The acceleration loop ran past the configured power ceiling without terminating.
    #[error("acceleration did not terminate below power {limit}")]
    AccelerationDivergent {
        /// The configured ceiling.
        limit: usize,
    },
    /// The textual relation could not be parsed.
    #[error("parse error at byte {position}: {message}")]
    Parse {
        /// Byte offset into the formula.
        position: usize,
        /// What went wrong.
        message: String,
    },
}

/// Shorthand for results carrying a [`ClosureError`].
pub type Result<T> = std::result::Result<T, ClosureError>;

pub(crate) fn overflow(
    operation: &'static str,
    lhs: impl Into<i128>,
    rhs: impl Into<i128>,
) -> ClosureError {
    ClosureError::Overflow {
        operation,
        lhs: lhs.into(),
        rhs: rhs.into(),
    }
}
