//! Min-plus algebra over affine functions of an iteration parameter.
//!
//! The basic value of this module is the [`AffineTerm`], a function `k -> alpha * k + beta` of a
//! non-negative integer parameter `k`. A [`Cell`] is the pointwise minimum of finitely many terms,
//! and a [`Matrix`] is a square array of cells describing a weighted constraint graph whose edge
//! weights depend on `k`. All arithmetic is checked: overflowing an `i64` is reported as an
//! [`Overflow`] error rather than wrapping.
//!
//! [`Cell`]: ./cell/struct.Cell.html
//! [`Matrix`]: ./matrix/struct.Matrix.html
//! [`Overflow`]: ../enum.ClosureError.html#variant.Overflow

use crate::error::{overflow, Result};
use std::fmt;

pub use crate::algebra::cell::Cell;
pub use crate::algebra::matrix::{complement_node, Matrix};
pub mod cell;
pub mod matrix;

/// An affine function `alpha * k + beta` of the iteration parameter `k`.
///
/// Terms are ordered lexicographically by `(alpha, beta)`, which is the canonical order of the
/// terms inside a [`Cell`].
///
/// [`Cell`]: ./cell/struct.Cell.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AffineTerm {
    alpha: i64,
    beta: i64,
}

impl AffineTerm {
    /// Create the term `alpha * k + beta`.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::AffineTerm;
    /// let t = AffineTerm::new(3, 1);
    /// assert_eq!(t.alpha(), 3);
    /// assert_eq!(t.beta(), 1);
    /// ```
    pub fn new(alpha: i64, beta: i64) -> AffineTerm {
        AffineTerm { alpha, beta }
    }

    /// Create a term which does not depend on `k`.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::AffineTerm;
    /// assert_eq!(AffineTerm::constant(-2), AffineTerm::new(0, -2));
    /// ```
    pub fn constant(beta: i64) -> AffineTerm {
        AffineTerm { alpha: 0, beta }
    }

    /// The coefficient of `k`.
    pub fn alpha(&self) -> i64 {
        self.alpha
    }

    /// The constant part.
    pub fn beta(&self) -> i64 {
        self.beta
    }

    /// Determine whether `other` is never larger than `self` for any `k >= 0`, in which case
    /// `self` is redundant next to `other`. Every term dominates itself.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::AffineTerm;
    /// let a = AffineTerm::new(1, 4);
    /// let b = AffineTerm::new(0, 4);
    /// assert!(a.is_dominated_by(&b));
    /// assert!(!b.is_dominated_by(&a));
    /// // Crossing lines do not dominate each other.
    /// assert!(!AffineTerm::new(-1, 5).is_dominated_by(&AffineTerm::new(0, 0)));
    /// ```
    pub fn is_dominated_by(&self, other: &AffineTerm) -> bool {
        self.beta >= other.beta && self.alpha >= other.alpha
    }

    /// Add two terms, i.e. concatenate two weighted edges along a path.
    ///
    /// # Errors
    /// Returns an `Overflow` error if either component leaves the `i64` range.
    pub fn checked_add(&self, other: &AffineTerm) -> Result<AffineTerm> {
        Ok(AffineTerm {
            alpha: self
                .alpha
                .checked_add(other.alpha)
                .ok_or_else(|| overflow("term addition", self.alpha, other.alpha))?,
            beta: self
                .beta
                .checked_add(other.beta)
                .ok_or_else(|| overflow("term addition", self.beta, other.beta))?,
        })
    }

    /// Halve both components, rounding towards negative infinity.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::AffineTerm;
    /// assert_eq!(AffineTerm::new(3, -3).halve(), AffineTerm::new(1, -2));
    /// ```
    pub fn halve(&self) -> AffineTerm {
        AffineTerm {
            alpha: half(self.alpha),
            beta: half(self.beta),
        }
    }

    /// Evaluate the term at a concrete parameter value.
    ///
    /// # Errors
    /// Returns an `Overflow` error if the result leaves the `i64` range.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::AffineTerm;
    /// assert_eq!(AffineTerm::new(-2, 7).eval(3).unwrap(), 1);
    /// ```
    pub fn eval(&self, k: i64) -> Result<i64> {
        self.alpha
            .checked_mul(k)
            .and_then(|ak| ak.checked_add(self.beta))
            .ok_or_else(|| overflow("term evaluation", self.alpha, k))
    }
}

impl fmt::Display for AffineTerm {
    /// Formats the term the way it is written in constraints, e.g. `3`, `2k`, `-k+1` or `2k-3`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.alpha, self.beta) {
            (0, b) => write!(f, "{}", b),
            (a, b) => {
                match a {
                    1 => write!(f, "k")?,
                    -1 => write!(f, "-k")?,
                    _ => write!(f, "{}k", a)?,
                }
                if b > 0 {
                    write!(f, "+{}", b)
                } else if b < 0 {
                    write!(f, "{}", b)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Integer halving which rounds towards negative infinity, so `half(-3) == -2`.
///
/// # Examples
/// ```
/// # use paraclosure::algebra::half;
/// assert_eq!(half(5), 2);
/// assert_eq!(half(-4), -2);
/// assert_eq!(half(-3), -2);
/// ```
pub fn half(v: i64) -> i64 {
    v.div_euclid(2)
}
