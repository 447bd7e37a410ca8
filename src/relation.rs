//! Transition relations over named integer variables.

use std::collections::BTreeMap;

use crate::acceleration::{accelerate, Closure};
use crate::algebra::Matrix;
use crate::config::AccelerationConfig;
use crate::error::{ClosureError, Result};
use crate::powers::PowerCache;

/// How variables are mapped to matrix nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Constraints `x - y <= c`. Node `i` is variable `i + 1`, and the primed copies follow the
    /// unprimed ones.
    DifferenceBound,
    /// Constraints `±x ± y <= c`. Nodes `2i` and `2i + 1` are the positive and negative literal
    /// of variable `i + 1`, and the primed copies follow the unprimed ones.
    Octagonal,
}

impl Encoding {
    /// The number of nodes each variable occupies.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::Encoding;
    /// assert_eq!(Encoding::DifferenceBound.nodes_per_variable(), 2);
    /// assert_eq!(Encoding::Octagonal.nodes_per_variable(), 4);
    /// ```
    pub fn nodes_per_variable(self) -> usize {
        match self {
            Encoding::DifferenceBound => 2,
            Encoding::Octagonal => 4,
        }
    }

    /// Whether matrices in this encoding are tightened as octagons.
    pub fn is_octagonal(self) -> bool {
        self == Encoding::Octagonal
    }
}

/// A transition relation: its variables, their encoding, the cache of its powers and, once
/// computed, its transitive closure.
#[derive(Debug, Clone)]
pub struct Relation {
    variables: BTreeMap<usize, String>,
    encoding: Encoding,
    powers: PowerCache,
    closure: Option<Closure>,
}

impl Relation {
    /// Create a relation from its base matrix `R^1`.
    ///
    /// # Arguments
    /// * `variables` - Variable names keyed by id. Ids must be `1..=n`.
    /// * `encoding` - The node encoding of `base`.
    /// * `base` - The matrix of the relation.
    ///
    /// # Errors
    /// Returns a `DimensionMismatch` error if the ids are not contiguous from 1 or if `base` does
    /// not have the number of nodes the variables require.
    ///
    /// # Examples
    /// ```
    /// # use std::collections::BTreeMap;
    /// # use paraclosure::algebra::Matrix;
    /// # use paraclosure::{Encoding, Relation};
    /// let mut vars = BTreeMap::new();
    /// vars.insert(1, "x".to_string());
    /// let r = Relation::new(vars.clone(), Encoding::DifferenceBound, Matrix::unconstrained(2));
    /// assert!(r.is_ok());
    /// let r = Relation::new(vars, Encoding::Octagonal, Matrix::unconstrained(2));
    /// assert!(r.is_err());
    /// ```
    pub fn new(
        variables: BTreeMap<usize, String>,
        encoding: Encoding,
        base: Matrix,
    ) -> Result<Relation> {
        let count = variables.len();
        if count == 0 || variables.keys().copied().ne(1..=count) {
            return Err(ClosureError::DimensionMismatch {
                operation: "variable table",
                left: count,
                right: variables.keys().next_back().copied().unwrap_or(0),
            });
        }
        let expected = count * encoding.nodes_per_variable();
        if base.size() != expected {
            return Err(ClosureError::DimensionMismatch {
                operation: "relation construction",
                left: base.size(),
                right: expected,
            });
        }
        Ok(Relation {
            variables,
            encoding,
            powers: PowerCache::new(base, encoding.is_octagonal()),
            closure: None,
        })
    }

    /// Variable names keyed by id.
    pub fn variables(&self) -> &BTreeMap<usize, String> {
        &self.variables
    }

    /// The number of variables.
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// The node encoding.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The base matrix `R^1`.
    pub fn base(&self) -> &Matrix {
        self.powers.base()
    }

    /// The cached powers of the relation.
    pub fn powers(&self) -> &PowerCache {
        &self.powers
    }

    /// `R^power`, computed on demand.
    ///
    /// # Errors
    /// Returns an `InvalidPower` error if `power` is zero.
    pub fn power(&mut self, power: usize) -> Result<&Matrix> {
        self.powers.get_or_compute(power)
    }

    /// The transitive closure, if it has been computed.
    pub fn closure(&self) -> Option<&Closure> {
        self.closure.as_ref()
    }

    /// Compute the transitive closure. Once computed the closure is kept, and later calls
    /// return it unchanged.
    ///
    /// # Errors
    /// See [`accelerate`].
    ///
    /// [`accelerate`]: ../acceleration/fn.accelerate.html
    pub fn accelerate(&mut self, config: &AccelerationConfig) -> Result<&Closure> {
        let closure = match self.closure.take() {
            Some(closure) => closure,
            None => accelerate(&mut self.powers, config)?,
        };
        Ok(&*self.closure.insert(closure))
    }

    /// The display name of the variable owning `node`, primed if the node belongs to the
    /// post-state half. `None` for nodes outside the matrix.
    ///
    /// # Examples
    /// ```
    /// # use std::collections::BTreeMap;
    /// # use paraclosure::algebra::Matrix;
    /// # use paraclosure::{Encoding, Relation};
    /// let mut vars = BTreeMap::new();
    /// vars.insert(1, "x".to_string());
    /// vars.insert(2, "y".to_string());
    /// let r = Relation::new(vars, Encoding::Octagonal, Matrix::unconstrained(8)).unwrap();
    /// assert_eq!(r.search_variable(3).as_deref(), Some("y"));
    /// assert_eq!(r.search_variable(5).as_deref(), Some("x'"));
    /// assert_eq!(r.search_variable(8), None);
    /// ```
    pub fn search_variable(&self, node: usize) -> Option<String> {
        let half = self.variables.len() * self.encoding.nodes_per_variable() / 2;
        if half == 0 || node >= 2 * half {
            return None;
        }
        let id = (node % half) / (self.encoding.nodes_per_variable() / 2) + 1;
        let name = self.variables.get(&id)?;
        if node >= half {
            Some(format!("{}'", name))
        } else {
            Some(name.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceleration::Termination;
    use crate::algebra::Cell;

    fn one_variable() -> BTreeMap<usize, String> {
        let mut vars = BTreeMap::new();
        vars.insert(1, "x".to_string());
        vars
    }

    #[test]
    fn search_variable_marks_primed_nodes() {
        let r = Relation::new(one_variable(), Encoding::DifferenceBound, Matrix::unconstrained(2))
            .unwrap();
        assert_eq!(r.search_variable(0).as_deref(), Some("x"));
        assert_eq!(r.search_variable(1).as_deref(), Some("x'"));
        assert_eq!(r.search_variable(2), None);
    }

    #[test]
    fn ids_must_be_contiguous() {
        let mut vars = one_variable();
        vars.insert(3, "z".to_string());
        let err = Relation::new(vars, Encoding::DifferenceBound, Matrix::unconstrained(4));
        assert!(matches!(err, Err(ClosureError::DimensionMismatch { .. })));
        let err = Relation::new(BTreeMap::new(), Encoding::DifferenceBound, Matrix::unconstrained(0));
        assert!(err.is_err());
    }

    #[test]
    fn closure_is_computed_once() {
        let mut base = Matrix::unconstrained(2);
        base.set(0, 1, Cell::constant(-1));
        let mut r = Relation::new(one_variable(), Encoding::DifferenceBound, base).unwrap();
        assert!(r.closure().is_none());
        let first = r.accelerate(&AccelerationConfig::default()).unwrap().clone();
        assert_eq!(
            first.termination(),
            Termination::Periodic { start: 1, period: 1 }
        );
        // A ceiling which would now fail is not consulted again.
        let config = AccelerationConfig::default().with_max_power(1);
        assert_eq!(r.accelerate(&config).unwrap(), &first);
        assert_eq!(r.closure(), Some(&first));
    }

    #[test]
    fn powers_are_shared_with_the_engine() {
        let mut base = Matrix::unconstrained(2);
        base.set(0, 1, Cell::constant(-2));
        let mut r = Relation::new(one_variable(), Encoding::DifferenceBound, base).unwrap();
        r.accelerate(&AccelerationConfig::default()).unwrap();
        assert!(r.powers().get(3).is_some());
        assert_eq!(r.power(4).unwrap()[(0, 1)], Cell::constant(-8));
    }
}
