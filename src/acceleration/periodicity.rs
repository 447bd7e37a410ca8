//! Bounds on how long a parametric summary stays valid.
//!
//! Once the engine has guessed a summary `ΛB(k)` for the powers `R^(b + k*c)`, two things can
//! still go wrong as `k` grows: the summary can become inconsistent ([`max_consistent`]), or the
//! actual powers can leave the progression the summary describes ([`max_periodic`]). Both are
//! expressed as a [`Bound`] on `k`.
//!
//! [`Bound`]: ./enum.Bound.html
//! [`max_consistent`]: ./fn.max_consistent.html
//! [`max_periodic`]: ./fn.max_periodic.html

use crate::algebra::{complement_node, half, AffineTerm, Cell, Matrix};
use crate::error::{overflow, ClosureError, Result};

/// A bound on the progression index, or the absence of one.
///
/// Bounds combine by taking the minimum, with `Unbounded` as the identity.
///
/// # Examples
/// ```
/// # use paraclosure::acceleration::periodicity::Bound;
/// assert_eq!(Bound::At(3).min(Bound::Unbounded), Bound::At(3));
/// assert_eq!(Bound::At(3).min(Bound::At(1)), Bound::At(1));
/// let b: Bound = vec![Bound::Unbounded, Bound::At(7), Bound::At(4)].into_iter().collect();
/// assert_eq!(b, Bound::At(4));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    /// Nothing ever goes wrong.
    Unbounded,
    /// Something goes wrong around this index.
    At(i64),
}

impl Bound {
    /// The smaller of two bounds.
    pub fn min(self, other: Bound) -> Bound {
        match (self, other) {
            (Bound::Unbounded, b) | (b, Bound::Unbounded) => b,
            (Bound::At(a), Bound::At(b)) => Bound::At(a.min(b)),
        }
    }

    /// The bound as an option.
    pub fn value(self) -> Option<i64> {
        match self {
            Bound::Unbounded => None,
            Bound::At(v) => Some(v),
        }
    }

    /// Transform a present bound, propagating errors.
    pub fn try_map<F>(self, f: F) -> Result<Bound>
    where
        F: FnOnce(i64) -> Result<i64>,
    {
        match self {
            Bound::Unbounded => Ok(Bound::Unbounded),
            Bound::At(v) => f(v).map(Bound::At),
        }
    }
}

impl Default for Bound {
    fn default() -> Bound {
        Bound::Unbounded
    }
}

impl FromIterator<Bound> for Bound {
    fn from_iter<I: IntoIterator<Item = Bound>>(iter: I) -> Bound {
        iter.into_iter().fold(Bound::Unbounded, Bound::min)
    }
}

/// The index from which a diagonal term `alpha * n + beta` of a summary stops being
/// non-negative. Decreasing terms become inconsistent at `max(2, beta / -alpha + 1)`; a
/// non-decreasing term with a negative constant is inconsistent from the start, and any other
/// term never is.
///
/// # Errors
/// Returns an `Overflow` error if the computation leaves the `i64` range.
///
/// # Examples
/// ```
/// # use paraclosure::acceleration::periodicity::{parametric_consistency, Bound};
/// # use paraclosure::algebra::AffineTerm;
/// assert_eq!(parametric_consistency(&AffineTerm::new(-1, 5)).unwrap(), Bound::At(6));
/// assert_eq!(parametric_consistency(&AffineTerm::new(-3, 1)).unwrap(), Bound::At(2));
/// assert_eq!(parametric_consistency(&AffineTerm::new(0, -1)).unwrap(), Bound::At(0));
/// assert_eq!(parametric_consistency(&AffineTerm::new(2, 0)).unwrap(), Bound::Unbounded);
/// ```
pub fn parametric_consistency(term: &AffineTerm) -> Result<Bound> {
    let (alpha, beta) = (term.alpha(), term.beta());
    if alpha < 0 {
        let slope = alpha
            .checked_neg()
            .ok_or_else(|| overflow("consistency bound", alpha, -1))?;
        let last = beta
            .div_euclid(slope)
            .checked_add(1)
            .ok_or_else(|| overflow("consistency bound", beta, slope))?;
        Ok(Bound::At(last.max(2)))
    } else if beta < 0 {
        Ok(Bound::At(0))
    } else {
        Ok(Bound::Unbounded)
    }
}

/// The last progression index for which the summary `lambda_b` stays consistent.
///
/// Every diagonal term is checked. In octagonal mode the unary self-distances
/// `lambda_b[i][i'] + lambda_b[i'][i]` are additionally split into a lower and an upper witness,
/// whose bounds count double since they index every other step. A bound of exactly two is the
/// smallest useful window and is returned as is.
///
/// # Errors
/// Returns an `Overflow` error if a synthesized term leaves the `i64` range.
pub fn max_consistent(lambda_b: &Matrix, octagonal: bool) -> Result<Bound> {
    let n = lambda_b.size();
    let mut diagonal = Bound::Unbounded;
    for i in 0..n {
        for t in lambda_b[(i, i)].terms() {
            let gamma = parametric_consistency(t)?;
            if gamma == Bound::At(2) {
                return Ok(gamma);
            }
            diagonal = diagonal.min(gamma);
        }
    }
    let mut lower = Bound::Unbounded;
    let mut upper = Bound::Unbounded;
    if octagonal {
        let mut lower_terms = Vec::new();
        let mut upper_terms = Vec::new();
        for i in 0..n {
            let out = &lambda_b[(i, complement_node(i))];
            let back = &lambda_b[(complement_node(i), i)];
            for ti in out.terms() {
                for tj in back.terms() {
                    let (l, u) = split_halves(ti, tj)?;
                    lower_terms.push(l);
                    upper_terms.push(u);
                }
            }
        }
        for t in &lower_terms {
            let gamma = parametric_consistency(t)?;
            if gamma == Bound::At(2) {
                return Ok(gamma);
            }
            lower = lower.min(gamma);
        }
        for t in &upper_terms {
            let gamma = parametric_consistency(t)?;
            if gamma == Bound::At(2) {
                return Ok(gamma);
            }
            upper = upper.min(gamma);
        }
    }
    let combined: Bound = vec![
        diagonal,
        lower.try_map(|v| v.checked_mul(2).ok_or_else(|| overflow("consistency bound", v, 2)))?,
        upper.try_map(|v| {
            v.checked_mul(2)
                .and_then(|w| w.checked_sub(1))
                .ok_or_else(|| overflow("consistency bound", v, 2))
        })?,
    ]
    .into_iter()
    .collect();
    Ok(match combined {
        Bound::At(v) => Bound::At((v - 1).max(0)),
        Bound::Unbounded => Bound::Unbounded,
    })
}

// The lower and upper witnesses of the path `ti` followed by `tj` through a complementary pair:
// (ai + aj, bi/2 + bj/2) and (ai + aj, (ai + bi)/2 + (aj + bj)/2).
fn split_halves(ti: &AffineTerm, tj: &AffineTerm) -> Result<(AffineTerm, AffineTerm)> {
    let alpha = ti
        .alpha()
        .checked_add(tj.alpha())
        .ok_or_else(|| overflow("octagon split", ti.alpha(), tj.alpha()))?;
    let lower = half(ti.beta())
        .checked_add(half(tj.beta()))
        .ok_or_else(|| overflow("octagon split", ti.beta(), tj.beta()))?;
    let shifted = |t: &AffineTerm| {
        t.alpha()
            .checked_add(t.beta())
            .map(half)
            .ok_or_else(|| overflow("octagon split", t.alpha(), t.beta()))
    };
    let (si, sj) = (shifted(ti)?, shifted(tj)?);
    let upper = si
        .checked_add(sj)
        .ok_or_else(|| overflow("octagon split", si, sj))?;
    Ok((AffineTerm::new(alpha, lower), AffineTerm::new(alpha, upper)))
}

// (2a, b) for the lower witness, (2a, a + b) for the upper one.
fn split_term(t: &AffineTerm) -> Result<(AffineTerm, AffineTerm)> {
    let alpha = t
        .alpha()
        .checked_mul(2)
        .ok_or_else(|| overflow("octagon split", t.alpha(), 2))?;
    let upper = t
        .alpha()
        .checked_add(t.beta())
        .ok_or_else(|| overflow("octagon split", t.alpha(), t.beta()))?;
    Ok((AffineTerm::new(alpha, t.beta()), AffineTerm::new(alpha, upper)))
}

/// The progression index at which the powers stop following the summary `lambda_b`, found by
/// comparing `lambda_b` against its composition with the residue power `R^c`.
///
/// In octagonal mode both matrices are split into lower and upper witnesses first and the two
/// results are recombined as `min(2 * P_L + 1, 2 * P_U)`.
///
/// # Arguments
/// * `lambda_b` - The closed summary.
/// * `residue` - The power `R^c`, where `c` is the period of the summary.
/// * `octagonal` - The node encoding of both matrices.
///
/// # Errors
/// Returns a `DimensionMismatch` error if the matrices differ in size and an `Overflow` error
/// if a weight leaves the `i64` range.
pub fn max_periodic(lambda_b: &Matrix, residue: &Matrix, octagonal: bool) -> Result<Bound> {
    let composed = lambda_b.compose(residue, false)?;
    if !octagonal {
        return check_period(lambda_b, &composed.extremal_paths()?, 0);
    }

    let size = composed.size();
    let mut lower = Matrix::infinite(size);
    let mut upper = Matrix::infinite(size);
    for i in 0..size {
        for j in 0..size {
            let mut lower_terms = Vec::new();
            let mut upper_terms = Vec::new();
            for t in composed[(i, j)].terms() {
                let (l, u) = split_term(t)?;
                lower_terms.push(l);
                upper_terms.push(u);
            }
            let out = &composed[(i, complement_node(i))];
            let into = &composed[(complement_node(j), j)];
            for ti in out.terms() {
                for tj in into.terms() {
                    let (l, u) = split_halves(ti, tj)?;
                    lower_terms.push(l);
                    upper_terms.push(u);
                }
            }
            lower.set(i, j, Cell::reduce(lower_terms));
            upper.set(i, j, Cell::reduce(upper_terms));
        }
    }
    let lower = lower.extremal_paths()?;
    let upper = upper.extremal_paths()?;

    let n = lambda_b.size();
    let mut base_lower = Matrix::infinite(n);
    let mut base_upper = Matrix::infinite(n);
    for i in 0..n {
        for j in 0..n {
            // (2a, a + b) and (2a, 2a + b): the summary is already tightly closed.
            if let Some(t) = lambda_b[(i, j)].first() {
                let (_, shifted) = split_term(t)?;
                let upper_beta = shifted
                    .alpha()
                    .checked_add(t.beta())
                    .ok_or_else(|| overflow("octagon split", shifted.alpha(), t.beta()))?;
                base_lower.set(i, j, Cell::from_term(shifted));
                base_upper.set(
                    i,
                    j,
                    Cell::from_term(AffineTerm::new(shifted.alpha(), upper_beta)),
                );
            }
        }
    }

    let p_lower = check_period(&base_lower, &lower, 0)?;
    let p_upper = check_period(&base_upper, &upper, 0)?;
    Ok(vec![
        p_lower.try_map(|v| {
            v.checked_mul(2)
                .and_then(|w| w.checked_add(1))
                .ok_or_else(|| overflow("period bound", v, 2))
        })?,
        p_upper.try_map(|v| v.checked_mul(2).ok_or_else(|| overflow("period bound", v, 2)))?,
    ]
    .into_iter()
    .collect())
}

/// The first index past `l + 1` at which some term of `m2` crosses the leading term of the
/// corresponding entry of `m1`. Entries which are infinite in `m1` are skipped, and so are terms
/// with the same slope as the leading term.
///
/// # Errors
/// Returns a `DimensionMismatch` error if the matrices differ in size and an `Overflow` error
/// if a crossing point leaves the `i64` range.
///
/// # Examples
/// ```
/// # use paraclosure::acceleration::periodicity::{check_period, Bound};
/// # use paraclosure::algebra::{AffineTerm, Cell, Matrix};
/// let mut m1 = Matrix::unconstrained(2);
/// m1.set(0, 1, Cell::from_term(AffineTerm::new(-1, 0)));
/// let mut m2 = Matrix::unconstrained(2);
/// // -3k + 10 meets -k at k = 5.
/// m2.set(0, 1, Cell::from_term(AffineTerm::new(-3, 10)));
/// assert_eq!(check_period(&m1, &m2, 0).unwrap(), Bound::At(5));
/// assert_eq!(check_period(&m1, &m2, 4).unwrap(), Bound::Unbounded);
/// ```
pub fn check_period(m1: &Matrix, m2: &Matrix, l: i64) -> Result<Bound> {
    let n = m1.size();
    if m2.size() != n {
        return Err(ClosureError::DimensionMismatch {
            operation: "period check",
            left: n,
            right: m2.size(),
        });
    }
    let mut kappa = Bound::Unbounded;
    for i in 0..n {
        for j in 0..n {
            let t0 = match m1[(i, j)].first() {
                Some(t) => *t,
                None => continue,
            };
            for t in m2[(i, j)].terms() {
                if t.alpha() == t0.alpha() {
                    continue;
                }
                let num = t
                    .beta()
                    .checked_sub(t0.beta())
                    .ok_or_else(|| overflow("period check", t.beta(), t0.beta()))?;
                let den = t0
                    .alpha()
                    .checked_sub(t.alpha())
                    .ok_or_else(|| overflow("period check", t0.alpha(), t.alpha()))?;
                let candidate = num
                    .checked_div(den)
                    .ok_or_else(|| overflow("period check", num, den))?;
                if candidate <= l.saturating_add(1) {
                    continue;
                }
                kappa = kappa.min(Bound::At(candidate));
            }
        }
    }
    Ok(kappa)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_diagonal(term: AffineTerm) -> Matrix {
        let mut m = Matrix::unconstrained(2);
        m.set(1, 1, Cell::from_term(term));
        m
    }

    #[test]
    fn bounds_combine_as_minimum() {
        assert_eq!(Bound::Unbounded.min(Bound::Unbounded), Bound::Unbounded);
        assert_eq!(Bound::At(2).min(Bound::At(5)), Bound::At(2));
        let none: Bound = Vec::new().into_iter().collect();
        assert_eq!(none, Bound::Unbounded);
        assert_eq!(Bound::At(4).value(), Some(4));
        assert_eq!(Bound::default().value(), None);
    }

    #[test]
    fn consistent_summaries_are_unbounded() {
        let m = with_diagonal(AffineTerm::new(1, 0));
        assert_eq!(max_consistent(&m, false).unwrap(), Bound::Unbounded);
    }

    #[test]
    fn decreasing_diagonal_limits_the_window() {
        let m = with_diagonal(AffineTerm::new(-1, 2));
        assert_eq!(max_consistent(&m, false).unwrap(), Bound::At(2));
        let m = with_diagonal(AffineTerm::new(-1, 9));
        assert_eq!(max_consistent(&m, false).unwrap(), Bound::At(9));
    }

    #[test]
    fn window_of_two_returns_early() {
        let mut m = with_diagonal(AffineTerm::new(-1, 1));
        m.set(0, 0, Cell::constant(-1));
        assert_eq!(max_consistent(&m, false).unwrap(), Bound::At(2));
    }

    #[test]
    fn immediate_inconsistency_saturates_at_zero() {
        let m = with_diagonal(AffineTerm::new(0, -1));
        assert_eq!(max_consistent(&m, false).unwrap(), Bound::At(0));
    }

    #[test]
    fn octagonal_unary_paths_are_checked() {
        let mut m = Matrix::unconstrained(4);
        m.set(0, 1, Cell::from_term(AffineTerm::new(-1, 4)));
        m.set(1, 0, Cell::constant(4));
        // Lower witness (-1, 4) fails at 5, upper witness (-1, 3) at 4: min(10, 7) - 1.
        assert_eq!(max_consistent(&m, true).unwrap(), Bound::At(6));
        assert_eq!(max_consistent(&m, false).unwrap(), Bound::Unbounded);
    }

    #[test]
    fn stable_progression_has_no_period_bound() {
        // Summary of x' >= x + 1: x - x' <= -k - 1.
        let mut summary = Matrix::unconstrained(2);
        summary.set(0, 1, Cell::from_term(AffineTerm::new(-1, -1)));
        let mut r = Matrix::unconstrained(2);
        r.set(0, 1, Cell::constant(-1));
        assert_eq!(max_periodic(&summary, &r, false).unwrap(), Bound::Unbounded);
    }

    #[test]
    fn faster_path_bounds_the_period() {
        // Nodes x, y, x', y'. x - x' <= -k, and x - y' <= -2k + 10 is faster but starts higher.
        let mut summary = Matrix::unconstrained(4);
        summary.set(0, 2, Cell::from_term(AffineTerm::new(-1, 0)));
        summary.set(0, 3, Cell::from_term(AffineTerm::new(-2, 10)));
        // y - x <= 0 and x - x' <= 0.
        let mut r = Matrix::unconstrained(4);
        r.set(1, 0, Cell::constant(0));
        r.set(0, 2, Cell::constant(0));
        // After one more step x - x' <= min(-k, -2k + 10), which leaves -k at k = 10.
        assert_eq!(max_periodic(&summary, &r, false).unwrap(), Bound::At(10));
    }

    #[test]
    fn octagonal_period_recombines_both_witnesses() {
        // Nodes +x, -x, +x', -x'. -2x <= 0 and x - x' <= -k, closed and tight.
        let mut summary = Matrix::unconstrained(4);
        summary.set(1, 0, Cell::constant(0));
        for &(i, j) in &[(0, 2), (3, 1), (3, 0), (1, 2)] {
            summary.set(i, j, Cell::from_term(AffineTerm::new(-1, 0)));
        }
        summary.set(3, 2, Cell::from_term(AffineTerm::new(-2, 0)));
        // A residue moving x by -2k + 12.
        let mut r = Matrix::unconstrained(4);
        r.set(0, 2, Cell::from_term(AffineTerm::new(-2, 12)));
        r.set(3, 1, Cell::from_term(AffineTerm::new(-2, 12)));
        // The lower witnesses (-6, 12) cross (-2, -1) at 3 and the upper witnesses (-6, 9) cross
        // (-2, -2) at 2, so the bound is min(2 * 3 + 1, 2 * 2).
        assert_eq!(max_periodic(&summary, &r, true).unwrap(), Bound::At(4));
        // Without the split every entry crosses at 6.
        assert_eq!(max_periodic(&summary, &r, false).unwrap(), Bound::At(6));
    }

    #[test]
    fn period_check_requires_equal_sizes() {
        let err = check_period(&Matrix::unconstrained(2), &Matrix::unconstrained(4), 0);
        assert!(matches!(err, Err(ClosureError::DimensionMismatch { .. })));
    }

    #[test]
    fn period_check_ignores_equal_slopes() {
        let mut m1 = Matrix::unconstrained(2);
        m1.set(0, 1, Cell::from_term(AffineTerm::new(-1, 0)));
        let mut m2 = Matrix::unconstrained(2);
        m2.set(0, 1, Cell::from_term(AffineTerm::new(-1, -50)));
        assert_eq!(check_period(&m1, &m2, 0).unwrap(), Bound::Unbounded);
    }
}
