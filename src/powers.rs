//! A memoized, forward-only store of the powers `R^i` of a base relation.

use std::collections::BTreeMap;

use tracing::trace;

use crate::algebra::Matrix;
use crate::error::{ClosureError, Result};

/// Sparse cache of relation powers. `R^1` is supplied on construction; every other power is
/// derived from the closest smaller cached power by repeated composition with `R^1`, and every
/// intermediate power is cached along the way. Entries are never evicted or recomputed.
#[derive(Debug, Clone)]
pub struct PowerCache {
    powers: BTreeMap<usize, Matrix>,
    octagonal: bool,
}

impl PowerCache {
    /// Create a cache holding only the base relation.
    ///
    /// # Arguments
    /// * `base` - The matrix of `R^1`.
    /// * `octagonal` - Whether compositions are tightened as octagons.
    pub fn new(base: Matrix, octagonal: bool) -> PowerCache {
        let mut powers = BTreeMap::new();
        powers.insert(1, base);
        PowerCache { powers, octagonal }
    }

    /// Whether compositions are tightened as octagons.
    pub fn is_octagonal(&self) -> bool {
        self.octagonal
    }

    /// The base relation `R^1`.
    pub fn base(&self) -> &Matrix {
        &self.powers[&1]
    }

    /// Look up a power without computing it.
    pub fn get(&self, power: usize) -> Option<&Matrix> {
        self.powers.get(&power)
    }

    /// The number of cached powers.
    pub fn len(&self) -> usize {
        self.powers.len()
    }

    /// A cache always holds at least `R^1`.
    pub fn is_empty(&self) -> bool {
        self.powers.is_empty()
    }

    /// Make sure `R^power` is cached, computing any missing powers between the closest cached
    /// one and `power`.
    ///
    /// # Errors
    /// Returns an `InvalidPower` error if `power` is zero, and propagates any error raised by
    /// composition.
    pub fn ensure(&mut self, power: usize) -> Result<()> {
        if power == 0 {
            return Err(ClosureError::InvalidPower { power });
        }
        let (mut current, mut matrix) = match self.powers.range(..=power).next_back() {
            Some((&p, _)) if p == power => return Ok(()),
            Some((&p, m)) => (p, m.clone()),
            None => return Err(ClosureError::InvalidPower { power }),
        };
        let base = self.base().clone();
        while current < power {
            matrix = matrix.compose(&base, self.octagonal)?.extremal_paths()?;
            current += 1;
            trace!(power = current, size = matrix.size(), "computed relation power");
            self.powers.insert(current, matrix.clone());
        }
        Ok(())
    }

    /// Return `R^power`, computing and caching it first if necessary.
    ///
    /// # Errors
    /// Returns an `InvalidPower` error if `power` is zero, and propagates any error raised by
    /// composition.
    ///
    /// # Examples
    /// ```
    /// # use paraclosure::algebra::{Cell, Matrix};
    /// # use paraclosure::PowerCache;
    /// let mut r = Matrix::unconstrained(2);
    /// r.set(0, 1, Cell::constant(-1));
    /// let mut cache = PowerCache::new(r, false);
    /// assert_eq!(cache.get_or_compute(4).unwrap()[(0, 1)], Cell::constant(-4));
    /// // Every intermediate power is kept.
    /// assert_eq!(cache.len(), 4);
    /// assert!(cache.get_or_compute(0).is_err());
    /// ```
    pub fn get_or_compute(&mut self, power: usize) -> Result<&Matrix> {
        self.ensure(power)?;
        self.powers
            .get(&power)
            .ok_or(ClosureError::InvalidPower { power })
    }
}
