//! Square matrices of parametric cells.
//!
//! Entry `(i, j)` of a [`Matrix`] bounds `node_i - node_j <= cell(i, j)`. In difference-bound mode
//! every variable owns two nodes (its value before and after one step); in octagonal mode it owns
//! four, a positive and a negative literal for each. Literal nodes come in adjacent pairs, so the
//! complement of node `2m` is `2m + 1` and vice versa (see [`complement_node`]).
//!
//! [`Matrix`]: ./struct.Matrix.html
//! [`complement_node`]: ./fn.complement_node.html

use std::fmt;
use std::ops::Index;

use nalgebra::DMatrix;
use replace_with::replace_with_or_abort;

use crate::algebra::{AffineTerm, Cell};
use crate::error::{overflow, ClosureError, Result};

/// The sign-flipped counterpart of a literal node.
///
/// # Examples
/// ```
/// # use paraclosure::algebra::complement_node;
/// assert_eq!(complement_node(0), 1);
/// assert_eq!(complement_node(1), 0);
/// assert_eq!(complement_node(6), 7);
/// ```
pub fn complement_node(node: usize) -> usize {
    node ^ 1
}

/// A weighted constraint graph whose edge weights are [`Cell`]s.
///
/// [`Cell`]: ../cell/struct.Cell.html
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    cells: DMatrix<Cell>,
}

impl Index<(usize, usize)> for Matrix {
    type Output = Cell;

    fn index(&self, idx: (usize, usize)) -> &Cell {
        &self.cells[idx]
    }
}

impl Matrix {
    /// A matrix in which every entry, including the diagonal, is `+∞`.
    pub fn infinite(size: usize) -> Matrix {
        Matrix {
            cells: DMatrix::from_element(size, size, Cell::infinite()),
        }
    }

    /// A matrix without constraints: zero on the diagonal and `+∞` everywhere else.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{Cell, Matrix};
    /// let m = Matrix::unconstrained(2);
    /// assert_eq!(m[(0, 0)], Cell::constant(0));
    /// assert!(m[(0, 1)].is_infinite());
    /// ```
    pub fn unconstrained(size: usize) -> Matrix {
        Matrix::from_fn(size, |i, j| {
            if i == j {
                Cell::constant(0)
            } else {
                Cell::infinite()
            }
        })
    }

    /// Build a matrix entry by entry.
    pub fn from_fn<F>(size: usize, mut f: F) -> Matrix
    where
        F: FnMut(usize, usize) -> Cell,
    {
        Matrix {
            cells: DMatrix::from_fn(size, size, |i, j| f(i, j)),
        }
    }

    /// Build a matrix from its rows.
    ///
    /// # Errors
    /// Returns a `DimensionMismatch` error if the rows do not form a square.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{Cell, Matrix};
    /// let m = Matrix::from_rows(vec![
    ///     vec![Cell::constant(0), Cell::constant(-1)],
    ///     vec![Cell::infinite(), Cell::constant(0)],
    /// ]).unwrap();
    /// assert_eq!(m.size(), 2);
    /// assert!(Matrix::from_rows(vec![vec![Cell::constant(0), Cell::infinite()]]).is_err());
    /// ```
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Result<Matrix> {
        let size = rows.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != size) {
            return Err(ClosureError::DimensionMismatch {
                operation: "matrix construction",
                left: size,
                right: bad.len(),
            });
        }
        Ok(Matrix {
            cells: DMatrix::from_fn(size, size, |i, j| rows[i][j].clone()),
        })
    }

    /// The number of nodes.
    pub fn size(&self) -> usize {
        debug_assert_eq!(self.cells.nrows(), self.cells.ncols());
        self.cells.nrows()
    }

    /// Overwrite one entry.
    pub fn set(&mut self, i: usize, j: usize, cell: Cell) {
        self.cells[(i, j)] = cell;
    }

    /// Strengthen one entry with an additional bound: the entry becomes the pointwise minimum of
    /// its current value and `cell`.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{Cell, Matrix};
    /// let mut m = Matrix::unconstrained(2);
    /// m.constrain(0, 1, &Cell::constant(5));
    /// m.constrain(0, 1, &Cell::constant(3));
    /// m.constrain(0, 1, &Cell::constant(4));
    /// assert_eq!(m[(0, 1)], Cell::constant(3));
    /// ```
    pub fn constrain(&mut self, i: usize, j: usize, cell: &Cell) {
        replace_with_or_abort(&mut self.cells[(i, j)], |old| old.merge(cell));
    }

    /// Determine whether any entry depends on the parameter `k`.
    pub fn is_parametric(&self) -> bool {
        self.cells.iter().any(|c| c.is_parametric())
    }

    /// A matrix is consistent unless some diagonal entry has a negative constant part, which
    /// witnesses a negative cycle and hence an empty relation.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{Cell, Matrix};
    /// let mut m = Matrix::unconstrained(2);
    /// assert!(m.is_consistent());
    /// m.set(1, 1, Cell::constant(-1));
    /// assert!(!m.is_consistent());
    /// ```
    pub fn is_consistent(&self) -> bool {
        (0..self.size()).all(|i| !self.cells[(i, i)].has_negative_constant())
    }

    /// Compute the min-plus transitive closure with the parametric Floyd–Warshall algorithm.
    /// Every updated entry is reduced to the exact lower envelope of its candidate paths. When
    /// `tighten` is set the result is additionally passed through [`tighten`].
    ///
    /// # Arguments
    /// * `tighten` - Apply octagon tightening to the closed matrix.
    ///
    /// # Errors
    /// Returns an `Overflow` error if a path weight leaves the `i64` range.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{AffineTerm, Cell, Matrix};
    /// let mut m = Matrix::unconstrained(3);
    /// m.set(0, 1, Cell::from_term(AffineTerm::new(-1, 2)));
    /// m.set(1, 2, Cell::constant(1));
    /// let c = m.closure(false).unwrap();
    /// assert_eq!(c[(0, 2)], Cell::from_term(AffineTerm::new(-1, 3)));
    /// assert_eq!(c.closure(false).unwrap(), c);
    /// ```
    ///
    /// [`tighten`]: #method.tighten
    pub fn closure(&self, tighten: bool) -> Result<Matrix> {
        let mut m = self.clone();
        let n = m.size();
        for k in 0..n {
            for i in 0..n {
                if i == k {
                    continue;
                }
                for j in 0..n {
                    if j == k {
                        continue;
                    }
                    let through = m.cells[(i, k)].cross_sum(&m.cells[(k, j)])?;
                    if through.is_infinite() {
                        continue;
                    }
                    let updated = m.cells[(i, j)].merge(&through).envelope()?;
                    m.cells[(i, j)] = updated;
                }
            }
        }
        if tighten {
            m.tighten()
        } else {
            Ok(m)
        }
    }

    /// Octagon tightening: every entry `(i, j)` is strengthened with half the bound of the
    /// unary constraint on node `i` plus half the bound of the unary constraint on node `j`,
    /// i.e. `m[i][i'] / 2 + m[j'][j] / 2`, rounding each half down.
    ///
    /// # Errors
    /// Returns a `DimensionMismatch` error if the matrix has an odd number of nodes, and an
    /// `Overflow` error if a sum leaves the `i64` range.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{Cell, Matrix};
    /// // Nodes: +x, -x, +y, -y. 2x <= 3 and -2y <= 1, i.e. x <= 1 and -y <= 0.
    /// let mut m = Matrix::unconstrained(4);
    /// m.set(0, 1, Cell::constant(3));
    /// m.set(3, 2, Cell::constant(1));
    /// let t = m.tighten().unwrap();
    /// assert_eq!(t[(0, 1)], Cell::constant(2));
    /// // x - y <= 1
    /// assert_eq!(t[(0, 2)], Cell::constant(1));
    /// ```
    pub fn tighten(&self) -> Result<Matrix> {
        let n = self.size();
        if n % 2 != 0 {
            return Err(ClosureError::DimensionMismatch {
                operation: "octagon tightening",
                left: n,
                right: n + 1,
            });
        }
        let out_of: Vec<Cell> = (0..n)
            .map(|i| self.cells[(i, complement_node(i))].halve())
            .collect();
        let into: Vec<Cell> = (0..n)
            .map(|j| self.cells[(complement_node(j), j)].halve())
            .collect();
        let mut tight = self.clone();
        for i in 0..n {
            for j in 0..n {
                let via_unary = out_of[i].cross_sum(&into[j])?;
                tight.cells[(i, j)] = self.cells[(i, j)].merge(&via_unary);
            }
        }
        Ok(tight)
    }

    /// Relational composition: `self` followed by `other`. Both matrices are embedded into one
    /// graph of `3n/2` nodes in which the post-state nodes of `self` coincide with the pre-state
    /// nodes of `other`, and the result is closed. Use [`extremal_paths`] to project it back to
    /// `n` nodes.
    ///
    /// # Arguments
    /// * `other` - The relation applied second.
    /// * `tighten` - Apply octagon tightening after the closure.
    ///
    /// # Errors
    /// Returns a `DimensionMismatch` error if the matrices differ in size or have an odd number
    /// of nodes, and an `Overflow` error if a path weight leaves the `i64` range.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{Cell, Matrix};
    /// // x - x' <= -1, i.e. x' >= x + 1.
    /// let mut r = Matrix::unconstrained(2);
    /// r.set(0, 1, Cell::constant(-1));
    /// let r2 = r.compose(&r, false).unwrap().extremal_paths().unwrap();
    /// assert_eq!(r2[(0, 1)], Cell::constant(-2));
    /// ```
    ///
    /// [`extremal_paths`]: #method.extremal_paths
    pub fn compose(&self, other: &Matrix, tighten: bool) -> Result<Matrix> {
        let n = self.size();
        if other.size() != n || n % 2 != 0 {
            return Err(ClosureError::DimensionMismatch {
                operation: "matrix composition",
                left: n,
                right: other.size(),
            });
        }
        let offset = n / 2;
        let mut combined = Matrix::infinite(n + offset);
        for i in 0..n {
            for j in 0..n {
                combined.cells[(i, j)] = self.cells[(i, j)].clone();
            }
        }
        for i in 0..n {
            for j in 0..n {
                combined.constrain(i + offset, j + offset, &other.cells[(i, j)]);
            }
        }
        combined.closure(tighten)
    }

    /// Project a composed `3n/2`-node matrix back onto its outer `n` nodes, dropping the shared
    /// middle layer. The remaining entries are the extremal path weights between the pre-state
    /// of the first relation and the post-state of the second.
    ///
    /// # Errors
    /// Returns a `DimensionMismatch` error if the size is not a multiple of three.
    pub fn extremal_paths(&self) -> Result<Matrix> {
        let size = self.size();
        if size % 3 != 0 {
            return Err(ClosureError::DimensionMismatch {
                operation: "extremal path extraction",
                left: size,
                right: size - size % 3,
            });
        }
        let base = size / 3 * 2;
        let offset = base / 2;
        let outer = |i: usize| if i >= offset { i + offset } else { i };
        Ok(Matrix::from_fn(base, |i, j| {
            self.cells[(outer(i), outer(j))].clone()
        }))
    }

    /// The entrywise difference `self - earlier` of two non-parametric powers, used to test
    /// whether a sequence of powers forms an arithmetic progression. Only the leading term of
    /// each entry takes part. An entry that is finite on one side only becomes a marker term:
    /// `(1, 0)` if `self` is infinite there, `(-1, 0)` if `earlier` is.
    ///
    /// # Errors
    /// Returns a `DimensionMismatch` error if the sizes differ and an `Overflow` error if a
    /// difference leaves the `i64` range.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{AffineTerm, Cell, Matrix};
    /// let mut a = Matrix::unconstrained(2);
    /// a.set(0, 1, Cell::constant(-3));
    /// let mut b = Matrix::unconstrained(2);
    /// b.set(0, 1, Cell::constant(-1));
    /// b.set(1, 0, Cell::constant(4));
    /// let d = a.progression_delta(&b).unwrap();
    /// assert_eq!(d[(0, 1)], Cell::constant(-2));
    /// assert_eq!(d[(1, 0)], Cell::from_term(AffineTerm::new(1, 0)));
    /// assert_eq!(d[(0, 0)], Cell::constant(0));
    /// ```
    pub fn progression_delta(&self, earlier: &Matrix) -> Result<Matrix> {
        let n = self.size();
        if earlier.size() != n {
            return Err(ClosureError::DimensionMismatch {
                operation: "matrix subtraction",
                left: n,
                right: earlier.size(),
            });
        }
        let mut delta = Matrix::infinite(n);
        for i in 0..n {
            for j in 0..n {
                let cell = match (self.cells[(i, j)].first(), earlier.cells[(i, j)].first()) {
                    (None, None) => Cell::infinite(),
                    (None, Some(_)) => Cell::from_term(AffineTerm::new(1, 0)),
                    (Some(_), None) => Cell::from_term(AffineTerm::new(-1, 0)),
                    (Some(l), Some(r)) => {
                        let beta = l
                            .beta()
                            .checked_sub(r.beta())
                            .ok_or_else(|| overflow("matrix subtraction", l.beta(), r.beta()))?;
                        Cell::from_term(AffineTerm::new(l.alpha(), beta))
                    }
                };
                delta.cells[(i, j)] = cell;
            }
        }
        Ok(delta)
    }

    /// Turn a power `R^b` and a per-period difference `delta` into the parametric matrix
    /// `R^b + k * delta`: wherever both entries are finite, the constant of `delta` becomes the
    /// slope of the leading term. Other entries are copied from `self`.
    ///
    /// # Errors
    /// Returns a `DimensionMismatch` error if the sizes differ.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{AffineTerm, Cell, Matrix};
    /// let mut r = Matrix::unconstrained(2);
    /// r.set(0, 1, Cell::constant(-1));
    /// let mut d = Matrix::unconstrained(2);
    /// d.set(0, 1, Cell::constant(-1));
    /// let p = r.advance_by(&d).unwrap();
    /// assert_eq!(p[(0, 1)], Cell::from_term(AffineTerm::new(-1, -1)));
    /// assert_eq!(p[(0, 0)], Cell::constant(0));
    /// ```
    pub fn advance_by(&self, delta: &Matrix) -> Result<Matrix> {
        let n = self.size();
        if delta.size() != n {
            return Err(ClosureError::DimensionMismatch {
                operation: "matrix addition",
                left: n,
                right: delta.size(),
            });
        }
        Ok(Matrix::from_fn(n, |i, j| {
            match (self.cells[(i, j)].first(), delta.cells[(i, j)].first()) {
                (Some(base), Some(step)) => {
                    Cell::from_term(AffineTerm::new(step.beta(), base.beta()))
                }
                _ => self.cells[(i, j)].clone(),
            }
        }))
    }

    /// Evaluate every entry at a concrete parameter value, producing a non-parametric matrix.
    ///
    /// # Errors
    /// Returns an `Overflow` error if some entry cannot be evaluated.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{AffineTerm, Cell, Matrix};
    /// let mut m = Matrix::unconstrained(2);
    /// m.set(0, 1, Cell::from_term(AffineTerm::new(-1, -1)));
    /// let m3 = m.instantiate(3).unwrap();
    /// assert_eq!(m3[(0, 1)], Cell::constant(-4));
    /// assert!(!m3.is_parametric());
    /// ```
    pub fn instantiate(&self, k: i64) -> Result<Matrix> {
        let n = self.size();
        let mut out = Matrix::infinite(n);
        for i in 0..n {
            for j in 0..n {
                if let Some(v) = self.cells[(i, j)].eval(k)? {
                    out.cells[(i, j)] = Cell::constant(v);
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.size() {
            for j in 0..self.size() {
                let cell = &self.cells[(i, j)];
                if cell.is_infinite() {
                    write!(f, "INF")?;
                } else {
                    let parts: Vec<String> = cell.terms().iter().map(|t| t.to_string()).collect();
                    write!(f, "{}", parts.join("|"))?;
                }
                if j + 1 < self.size() {
                    write!(f, "\t")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // x - x' <= -1: the pre-state value is strictly below the post-state value.
    fn increment() -> Matrix {
        let mut m = Matrix::unconstrained(2);
        m.set(0, 1, Cell::constant(-1));
        m
    }

    // Nodes x, y, x', y' for x' - x <= 2, y' - y <= 0, x - y <= 1.
    fn two_vars() -> Matrix {
        let mut m = Matrix::unconstrained(4);
        m.set(2, 0, Cell::constant(2));
        m.set(3, 1, Cell::constant(0));
        m.set(0, 1, Cell::constant(1));
        m
    }

    #[test]
    fn closure_finds_shortest_paths() {
        let c = two_vars().closure(false).unwrap();
        // x' - y <= (x' - x) + (x - y) = 3
        assert_eq!(c[(2, 1)], Cell::constant(3));
        assert!(c[(1, 0)].is_infinite());
        assert!(c.is_consistent());
    }

    #[test]
    fn closure_is_idempotent() {
        let c = two_vars().closure(false).unwrap();
        assert_eq!(c.closure(false).unwrap(), c);
    }

    #[test]
    fn parametric_closure_is_idempotent() {
        let mut m = Matrix::unconstrained(3);
        m.set(0, 1, Cell::from_term(AffineTerm::new(1, 0)));
        m.set(1, 2, Cell::from_term(AffineTerm::new(2, 1)));
        m.set(0, 2, Cell::constant(4));
        m.set(2, 0, Cell::from_term(AffineTerm::new(0, 1)));
        let c = m.closure(false).unwrap();
        // min(4, 3k + 1)
        assert_eq!(
            c[(0, 2)].terms(),
            &[AffineTerm::new(0, 4), AffineTerm::new(3, 1)]
        );
        assert_eq!(c.closure(false).unwrap(), c);
    }

    #[test]
    fn closure_exposes_negative_cycles() {
        let mut m = increment();
        m.set(1, 0, Cell::constant(0));
        assert!(m.is_consistent());
        assert!(!m.closure(false).unwrap().is_consistent());
    }

    #[test]
    fn tightening_is_stable() {
        let mut m = Matrix::unconstrained(4);
        m.set(0, 1, Cell::constant(5));
        m.set(3, 2, Cell::constant(-1));
        m.set(0, 2, Cell::constant(7));
        m.set(1, 3, Cell::constant(3));
        let once = m.closure(true).unwrap();
        assert_eq!(once.tighten().unwrap(), once);
        assert_eq!(once[(0, 1)], Cell::constant(4));
        assert_eq!(once[(3, 2)], Cell::constant(-2));
    }

    #[test]
    fn tightening_rejects_odd_sizes() {
        assert!(matches!(
            Matrix::unconstrained(3).tighten(),
            Err(ClosureError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn composition_adds_up_increments() {
        let r = increment();
        let mut p = r.clone();
        for n in 2..=5 {
            p = p.compose(&r, false).unwrap().extremal_paths().unwrap();
            assert_eq!(p[(0, 1)], Cell::constant(-n));
            assert!(p[(1, 0)].is_infinite());
            assert_eq!(p[(0, 0)], Cell::constant(0));
        }
    }

    #[test]
    fn composition_layout() {
        let composed = two_vars().compose(&two_vars(), false).unwrap();
        assert_eq!(composed.size(), 6);
        let projected = composed.extremal_paths().unwrap();
        assert_eq!(projected.size(), 4);
        // x'' - x <= 4
        assert_eq!(projected[(2, 0)], Cell::constant(4));
    }

    #[test]
    fn composition_checks_sizes() {
        let err = increment().compose(&two_vars(), false).unwrap_err();
        assert_eq!(
            err,
            ClosureError::DimensionMismatch {
                operation: "matrix composition",
                left: 2,
                right: 4,
            }
        );
        assert!(Matrix::unconstrained(4).extremal_paths().is_err());
    }

    #[test]
    fn delta_and_advance_agree_with_powers() {
        let r = increment();
        let r2 = r.compose(&r, false).unwrap().extremal_paths().unwrap();
        let d = r2.progression_delta(&r).unwrap();
        let summary = r.advance_by(&d).unwrap();
        assert_eq!(summary.instantiate(0).unwrap(), r);
        assert_eq!(summary.instantiate(1).unwrap(), r2);
    }

    #[test]
    fn delta_marks_lost_constraints() {
        let mut a = increment();
        let b = Matrix::unconstrained(2);
        a.set(1, 0, Cell::constant(3));
        let d = b.progression_delta(&a).unwrap();
        assert_eq!(d[(1, 0)], Cell::from_term(AffineTerm::new(1, 0)));
        let d = a.progression_delta(&b).unwrap();
        assert_eq!(d[(1, 0)], Cell::from_term(AffineTerm::new(-1, 0)));
        assert!(a.progression_delta(&two_vars()).is_err());
    }

    #[test]
    fn display_marks_infinity() {
        let s = increment().to_string();
        assert_eq!(s, "0\t-1\nINF\t0\n");
    }
}
