//! Parametric edge weights.
//!
//! A [`Cell`] represents the function `k -> min { alpha * k + beta }` over a finite set of
//! [`AffineTerm`]s. The empty cell is `+∞`, i.e. the edge is absent. Cells are kept in a canonical
//! form: no term dominates another, and the terms are sorted by strictly increasing `alpha` (and
//! hence strictly decreasing `beta`). Two cells describing the same set of terms therefore compare
//! equal structurally.
//!
//! [`Cell`]: ./struct.Cell.html
//! [`AffineTerm`]: ../struct.AffineTerm.html

use crate::algebra::AffineTerm;
use crate::error::{overflow, Result};

/// A parametric edge weight: the lower envelope of a set of affine terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Cell {
    // Invariant: strictly increasing alpha, strictly decreasing beta.
    terms: Vec<AffineTerm>,
}

impl Cell {
    /// The absent edge, `+∞`.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::Cell;
    /// assert!(Cell::infinite().is_infinite());
    /// ```
    pub fn infinite() -> Cell {
        Cell { terms: Vec::new() }
    }

    /// A plain, non-parametric weight.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{AffineTerm, Cell};
    /// assert_eq!(Cell::constant(4).terms(), &[AffineTerm::constant(4)]);
    /// ```
    pub fn constant(beta: i64) -> Cell {
        Cell {
            terms: vec![AffineTerm::constant(beta)],
        }
    }

    /// A cell holding exactly one term.
    pub fn from_term(term: AffineTerm) -> Cell {
        Cell { terms: vec![term] }
    }

    /// Build a cell from an arbitrary collection of terms, discarding every term which is
    /// dominated by another one. Equal terms collapse to one and the input order is irrelevant.
    ///
    /// # Arguments
    /// * `terms` - The candidate terms.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{AffineTerm, Cell};
    /// let c = Cell::reduce(vec![
    ///     AffineTerm::new(0, 3),
    ///     AffineTerm::new(1, 3),
    ///     AffineTerm::new(-1, 5),
    ///     AffineTerm::new(0, 3),
    /// ]);
    /// assert_eq!(c.terms(), &[AffineTerm::new(-1, 5), AffineTerm::new(0, 3)]);
    /// ```
    pub fn reduce<I>(terms: I) -> Cell
    where
        I: IntoIterator<Item = AffineTerm>,
    {
        let mut sorted: Vec<AffineTerm> = terms.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();
        // Every earlier term has a smaller or equal alpha, so a term survives exactly when its
        // beta beats all of them.
        let mut kept = Vec::with_capacity(sorted.len());
        let mut best: Option<i64> = None;
        for t in sorted {
            if best.map_or(true, |b| t.beta() < b) {
                best = Some(t.beta());
                kept.push(t);
            }
        }
        Cell { terms: kept }
    }

    /// Determine whether this cell is `+∞`.
    pub fn is_infinite(&self) -> bool {
        self.terms.is_empty()
    }

    /// The terms of this cell in canonical order.
    pub fn terms(&self) -> &[AffineTerm] {
        &self.terms
    }

    /// The term with the smallest `alpha`, if any.
    pub fn first(&self) -> Option<&AffineTerm> {
        self.terms.first()
    }

    /// The number of terms in this cell.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Same as [`is_infinite`](#method.is_infinite).
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Determine whether any term of this cell depends on `k`.
    pub fn is_parametric(&self) -> bool {
        self.terms.iter().any(|t| t.alpha() != 0)
    }

    /// Determine whether some term has a negative constant part.
    pub fn has_negative_constant(&self) -> bool {
        self.terms.iter().any(|t| t.beta() < 0)
    }

    /// Min-plus multiplication: the weights of all two-edge paths through this cell and then
    /// `other`. The result is infinite if either operand is.
    ///
    /// # Errors
    /// Returns an `Overflow` error if a sum leaves the `i64` range.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{AffineTerm, Cell};
    /// let a = Cell::reduce(vec![AffineTerm::new(0, 2), AffineTerm::new(-1, 4)]);
    /// let b = Cell::constant(1);
    /// assert_eq!(
    ///     a.cross_sum(&b).unwrap().terms(),
    ///     &[AffineTerm::new(-1, 5), AffineTerm::new(0, 3)]
    /// );
    /// assert!(a.cross_sum(&Cell::infinite()).unwrap().is_infinite());
    /// ```
    pub fn cross_sum(&self, other: &Cell) -> Result<Cell> {
        let mut sums = Vec::with_capacity(self.terms.len() * other.terms.len());
        for a in &self.terms {
            for b in &other.terms {
                sums.push(a.checked_add(b)?);
            }
        }
        Ok(Cell::reduce(sums))
    }

    /// Min-plus addition: the pointwise minimum of two cells.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::Cell;
    /// assert_eq!(Cell::constant(3).merge(&Cell::constant(1)), Cell::constant(1));
    /// assert_eq!(Cell::infinite().merge(&Cell::constant(1)), Cell::constant(1));
    /// ```
    pub fn merge(&self, other: &Cell) -> Cell {
        Cell::reduce(self.terms.iter().chain(other.terms.iter()).cloned())
    }

    /// Reduce this cell to the exact lower envelope of its terms over `k >= 0`. Terms which are
    /// not dominated by a single other term, but which never lie strictly below all the others,
    /// are dropped as well. The represented function is unchanged.
    ///
    /// # Errors
    /// Returns an `Overflow` error if the slope comparison leaves the `i128` range.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{AffineTerm, Cell};
    /// // -k + 3 is never strictly below min(0, 4 - 2k).
    /// let c = Cell::reduce(vec![
    ///     AffineTerm::new(-2, 4),
    ///     AffineTerm::new(-1, 3),
    ///     AffineTerm::new(0, 0),
    /// ]);
    /// assert_eq!(c.len(), 3);
    /// assert_eq!(
    ///     c.envelope().unwrap().terms(),
    ///     &[AffineTerm::new(-2, 4), AffineTerm::new(0, 0)]
    /// );
    /// ```
    pub fn envelope(&self) -> Result<Cell> {
        let mut hull: Vec<AffineTerm> = Vec::with_capacity(self.terms.len());
        for t in &self.terms {
            while hull.len() >= 2 {
                let a = &hull[hull.len() - 2];
                let b = &hull[hull.len() - 1];
                if middle_is_redundant(a, b, t)? {
                    hull.pop();
                } else {
                    break;
                }
            }
            hull.push(*t);
        }
        Ok(Cell { terms: hull })
    }

    /// Halve every term (rounding towards negative infinity) and reduce the result.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{AffineTerm, Cell};
    /// let c = Cell::from_term(AffineTerm::new(2, -3));
    /// assert_eq!(c.halve().terms(), &[AffineTerm::new(1, -2)]);
    /// ```
    pub fn halve(&self) -> Cell {
        Cell::reduce(self.terms.iter().map(|t| t.halve()))
    }

    /// Evaluate the cell at a concrete parameter value. `None` stands for `+∞`.
    ///
    /// # Errors
    /// Returns an `Overflow` error if some term cannot be evaluated.
    pub fn eval(&self, k: i64) -> Result<Option<i64>> {
        let mut best: Option<i64> = None;
        for t in &self.terms {
            let v = t.eval(k)?;
            best = Some(best.map_or(v, |b| b.min(v)));
        }
        Ok(best)
    }
}

// Three lines sorted by increasing slope: `b` is on the envelope only if the point where `a`
// overtakes `b` lies strictly beyond the point where `b` overtakes `c`.
fn middle_is_redundant(a: &AffineTerm, b: &AffineTerm, c: &AffineTerm) -> Result<bool> {
    let (aa, ab) = (i128::from(a.alpha()), i128::from(a.beta()));
    let (ba, bb) = (i128::from(b.alpha()), i128::from(b.beta()));
    let (ca, cb) = (i128::from(c.alpha()), i128::from(c.beta()));
    let lhs = (ab - bb)
        .checked_mul(ca - ba)
        .ok_or_else(|| overflow("envelope slope test", ab - bb, ca - ba))?;
    let rhs = (bb - cb)
        .checked_mul(ba - aa)
        .ok_or_else(|| overflow("envelope slope test", bb - cb, ba - aa))?;
    Ok(lhs <= rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn terms() -> impl Strategy<Value = Vec<AffineTerm>> {
        prop::collection::vec((-6i64..6, -20i64..20), 1..8)
            .prop_map(|v| v.into_iter().map(|(a, b)| AffineTerm::new(a, b)).collect())
    }

    fn min_at(ts: &[AffineTerm], k: i64) -> i64 {
        ts.iter().map(|t| t.eval(k).unwrap()).min().unwrap()
    }

    #[test]
    fn reduce_collapses_duplicates() {
        let c = Cell::reduce(vec![AffineTerm::constant(0), AffineTerm::constant(0)]);
        assert_eq!(c, Cell::constant(0));
    }

    #[test]
    fn reduce_of_nothing_is_infinite() {
        assert!(Cell::reduce(Vec::new()).is_infinite());
    }

    #[test]
    fn reduce_keeps_one_term_per_slope() {
        let c = Cell::reduce(vec![
            AffineTerm::new(1, 5),
            AffineTerm::new(1, 2),
            AffineTerm::new(-1, 9),
        ]);
        assert_eq!(c.terms(), &[AffineTerm::new(-1, 9), AffineTerm::new(1, 2)]);
    }

    #[test]
    fn envelope_keeps_crossing_lines() {
        let c = Cell::reduce(vec![
            AffineTerm::new(-2, 4),
            AffineTerm::new(-1, 1),
            AffineTerm::new(0, 0),
        ]);
        assert_eq!(c.envelope().unwrap(), c);
    }

    #[test]
    fn envelope_drops_concurrent_middle_line() {
        // All three lines meet at k = 2.
        let c = Cell::reduce(vec![
            AffineTerm::new(-2, 4),
            AffineTerm::new(-1, 2),
            AffineTerm::new(0, 0),
        ]);
        assert_eq!(
            c.envelope().unwrap().terms(),
            &[AffineTerm::new(-2, 4), AffineTerm::new(0, 0)]
        );
    }

    #[test]
    fn parametric_and_negative_flags() {
        let c = Cell::reduce(vec![AffineTerm::new(-1, 3), AffineTerm::new(0, -1)]);
        assert!(c.is_parametric());
        assert!(c.has_negative_constant());
        assert!(!Cell::constant(2).is_parametric());
        assert!(!Cell::constant(2).has_negative_constant());
    }

    #[test]
    fn eval_takes_minimum() {
        let c = Cell::reduce(vec![AffineTerm::new(-1, 3), AffineTerm::new(0, 1)]);
        assert_eq!(c.eval(0).unwrap(), Some(1));
        assert_eq!(c.eval(5).unwrap(), Some(-2));
        assert_eq!(Cell::infinite().eval(5).unwrap(), None);
    }

    proptest! {
        #[test]
        fn reduce_is_nonempty_and_irreducible(ts in terms()) {
            let c = Cell::reduce(ts);
            prop_assert!(!c.is_infinite());
            for (i, x) in c.terms().iter().enumerate() {
                for (j, y) in c.terms().iter().enumerate() {
                    if i != j {
                        prop_assert!(!x.is_dominated_by(y));
                    }
                }
            }
        }

        #[test]
        fn reduce_preserves_minimum(ts in terms(), k in 0i64..40) {
            let c = Cell::reduce(ts.clone());
            prop_assert_eq!(min_at(c.terms(), k), min_at(&ts, k));
        }

        #[test]
        fn envelope_preserves_minimum(ts in terms(), k in 0i64..40) {
            let c = Cell::reduce(ts.clone()).envelope().unwrap();
            prop_assert_eq!(min_at(c.terms(), k), min_at(&ts, k));
        }

        #[test]
        fn envelope_is_idempotent(ts in terms()) {
            let c = Cell::reduce(ts).envelope().unwrap();
            prop_assert_eq!(c.envelope().unwrap(), c);
        }

        #[test]
        fn reduce_is_order_independent(ts in terms()) {
            let mut rev = ts.clone();
            rev.reverse();
            prop_assert_eq!(Cell::reduce(ts), Cell::reduce(rev));
        }
    }
}
