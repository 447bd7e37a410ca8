//! The acceleration engine.
//!
//! [`accelerate`] enumerates the powers `R^1, R^2, ...` of a base relation until it can describe
//! all remaining powers by finitely many parametric matrices. It looks for a start `b` and a
//! period `c` such that `R^b`, `R^(b+c)` and `R^(b+2c)` form an arithmetic progression, guesses
//! the summary `R^b + k * (R^(b+c) - R^b)`, and validates that guess with the bounds of the
//! [`periodicity`] module. Powers passed over while searching are listed individually.
//!
//! The result is a [`Closure`]: the union of its matrices, with `k` ranging over the non-negative
//! integers in the parametric ones, is the transitive closure of the base relation.
//!
//! [`accelerate`]: ./fn.accelerate.html
//! [`periodicity`]: ./periodicity/index.html
//! [`Closure`]: ./struct.Closure.html

use tracing::{debug, info, warn};

use crate::algebra::Matrix;
use crate::config::AccelerationConfig;
use crate::error::{overflow, ClosureError, Result};
use crate::powers::PowerCache;

pub use crate::acceleration::periodicity::Bound;
pub mod periodicity;

/// How the engine finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    /// The powers `R^(start + k * period + j)` for `k >= 0` and `0 <= j < period` are covered by
    /// the parametric summaries.
    Periodic {
        /// The first power covered by the summaries.
        start: usize,
        /// The period of the progression.
        period: usize,
    },
    /// `R^power` is empty, and so is every higher power.
    Infeasible {
        /// The first infeasible power found. It is the last matrix of the closure.
        power: usize,
    },
}

/// A finite representation of the transitive closure of a relation.
///
/// The first [`prefix`] matrices are the exact powers `R^1, ..., R^prefix`. Any further
/// matrices are parametric summaries in the iteration parameter `k >= 0`.
///
/// [`prefix`]: #method.prefix
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    matrices: Vec<Matrix>,
    prefix: usize,
    termination: Termination,
}

impl Closure {
    /// All matrices in order: first the individual powers, then the summaries.
    pub fn matrices(&self) -> &[Matrix] {
        &self.matrices
    }

    /// The number of leading matrices which are individual powers.
    pub fn prefix(&self) -> usize {
        self.prefix
    }

    /// The individual powers `R^1, ..., R^prefix`.
    pub fn powers(&self) -> &[Matrix] {
        &self.matrices[..self.prefix]
    }

    /// The parametric summaries, one per residue of the period.
    pub fn summaries(&self) -> &[Matrix] {
        &self.matrices[self.prefix..]
    }

    /// How the engine finished.
    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// The number of matrices.
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    /// A closure always holds at least one matrix.
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

#[derive(Debug, Default)]
struct ClosureBuilder {
    matrices: Vec<Matrix>,
    prefix: usize,
}

impl ClosureBuilder {
    fn push_power(&mut self, m: Matrix) {
        debug_assert_eq!(self.prefix, self.matrices.len());
        self.matrices.push(m);
        self.prefix += 1;
    }

    fn push_summary(&mut self, m: Matrix) {
        self.matrices.push(m);
    }

    fn finish(self, termination: Termination) -> Closure {
        info!(
            ?termination,
            prefix = self.prefix,
            matrices = self.matrices.len(),
            "acceleration finished"
        );
        Closure {
            matrices: self.matrices,
            prefix: self.prefix,
            termination,
        }
    }
}

fn fetch<'a>(
    powers: &'a mut PowerCache,
    power: usize,
    config: &AccelerationConfig,
) -> Result<&'a Matrix> {
    if power > config.max_power {
        warn!(
            power,
            limit = config.max_power,
            "acceleration exceeded the power ceiling"
        );
        return Err(ClosureError::AccelerationDivergent {
            limit: config.max_power,
        });
    }
    powers.get_or_compute(power)
}

fn cached(powers: &PowerCache, power: usize) -> Result<&Matrix> {
    powers
        .get(power)
        .ok_or(ClosureError::InvalidPower { power })
}

// Combine the consistency and periodicity windows of one summary.
fn window(consistent: Bound, periodic: Bound) -> Bound {
    match (consistent, periodic) {
        (Bound::At(k), Bound::At(l)) => match k.min(l) {
            0 => Bound::At(2),
            w => Bound::At(w),
        },
        (Bound::At(k), Bound::Unbounded) => Bound::At(k),
        (Bound::Unbounded, l) => l,
    }
}

/// Compute a finite representation of the transitive closure of the base relation held by
/// `powers`. Powers are taken from, and added to, the cache.
///
/// # Arguments
/// * `powers` - A power cache holding at least `R^1`.
/// * `config` - Engine options.
///
/// # Errors
/// Returns an `AccelerationDivergent` error if a power above `config.max_power` would be
/// needed, and propagates errors from the matrix algebra. An empty relation is not an error;
/// it ends with [`Termination::Infeasible`].
///
/// # Examples
/// ```
/// # use paraclosure::acceleration::{accelerate, Termination};
/// # use paraclosure::algebra::{AffineTerm, Cell, Matrix};
/// # use paraclosure::{AccelerationConfig, PowerCache};
/// // x - x' <= -1
/// let mut r = Matrix::unconstrained(2);
/// r.set(0, 1, Cell::constant(-1));
/// let mut powers = PowerCache::new(r, false);
/// let closure = accelerate(&mut powers, &AccelerationConfig::default()).unwrap();
/// assert_eq!(closure.prefix(), 0);
/// assert_eq!(closure.termination(), Termination::Periodic { start: 1, period: 1 });
/// assert_eq!(
///     closure.summaries()[0][(0, 1)],
///     Cell::from_term(AffineTerm::new(-1, -1))
/// );
/// ```
///
/// [`Termination::Infeasible`]: ./enum.Termination.html#variant.Infeasible
pub fn accelerate(powers: &mut PowerCache, config: &AccelerationConfig) -> Result<Closure> {
    let octagonal = powers.is_octagonal();
    let mut closure = ClosureBuilder::default();
    let mut b: usize = 1;
    let mut b_jump: usize = 1;
    loop {
        for c in 1..=b {
            for l in 0..=2 {
                let p = c
                    .checked_mul(l)
                    .and_then(|lc| lc.checked_add(b))
                    .ok_or_else(|| overflow("power index", b as i128, c as i128))?;
                if !fetch(powers, p, config)?.is_consistent() {
                    // Powers are not checked in increasing order, so an earlier one may already
                    // be empty.
                    let mut first = p;
                    for i in b..p {
                        if !cached(powers, i)?.is_consistent() {
                            first = i;
                            break;
                        }
                    }
                    debug!(b, c, checked = p, power = first, "inconsistent power");
                    for i in b..=first {
                        closure.push_power(cached(powers, i)?.clone());
                    }
                    return Ok(closure.finish(Termination::Infeasible { power: first }));
                }
            }

            let r_b = cached(powers, b)?;
            let r_bc = cached(powers, b + c)?;
            let r_b2c = cached(powers, b + 2 * c)?;
            let delta = r_bc.progression_delta(r_b)?;
            if delta != r_b2c.progression_delta(r_bc)? {
                continue;
            }
            let summary = r_b.advance_by(&delta)?.closure(octagonal)?;
            let residue = cached(powers, c)?;
            let consistent = periodicity::max_consistent(&summary, octagonal)?;
            let periodic = periodicity::max_periodic(&summary, residue, octagonal)?;
            let w = window(consistent, periodic);
            debug!(b, c, ?consistent, ?periodic, window = ?w, "arithmetic progression");

            match w {
                Bound::Unbounded => {
                    let mut residues = Vec::with_capacity(c - 1);
                    for j in 1..c {
                        residues.push(
                            summary
                                .compose(cached(powers, j)?, octagonal)?
                                .extremal_paths()?,
                        );
                    }
                    closure.push_summary(summary);
                    for m in residues {
                        closure.push_summary(m);
                    }
                    return Ok(closure.finish(Termination::Periodic {
                        start: b,
                        period: c,
                    }));
                }
                Bound::At(w) => {
                    let w = usize::try_from(w).map_err(|_| overflow("window", w, 0))?;
                    let jump = w
                        .checked_add(1)
                        .and_then(|w| w.checked_mul(c))
                        .and_then(|cw| cw.checked_add(b))
                        .ok_or_else(|| overflow("window", w as i128, c as i128))?;
                    b_jump = b_jump.max(jump);
                }
            }
        }

        let b_next = (b + 1).max(b_jump);
        for i in b..b_next {
            let m = fetch(powers, i, config)?.clone();
            let consistent = m.is_consistent();
            closure.push_power(m);
            if !consistent {
                debug!(b, power = i, "inconsistent power inside a skipped window");
                return Ok(closure.finish(Termination::Infeasible { power: i }));
            }
        }
        debug!(b, b_next, prefix = closure.prefix, "no summary found");
        b = b_next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{AffineTerm, Cell};
    use tracing_test::traced_test;

    fn increment() -> Matrix {
        let mut m = Matrix::unconstrained(2);
        m.set(0, 1, Cell::constant(-1));
        m
    }

    #[test]
    fn strictly_increasing_variable_is_periodic_from_the_start() {
        let mut powers = PowerCache::new(increment(), false);
        let closure = accelerate(&mut powers, &AccelerationConfig::default()).unwrap();
        assert_eq!(closure.len(), 1);
        assert_eq!(closure.prefix(), 0);
        assert!(closure.powers().is_empty());
        let summary = &closure.summaries()[0];
        assert_eq!(summary[(0, 1)], Cell::from_term(AffineTerm::new(-1, -1)));
        assert!(summary[(1, 0)].is_infinite());
        assert_eq!(summary.instantiate(0).unwrap(), increment());
        for k in 1..6usize {
            assert_eq!(
                &summary.instantiate(k as i64).unwrap(),
                powers.get_or_compute(k + 1).unwrap()
            );
        }
    }

    #[test]
    fn empty_relation_stops_at_first_infeasible_power() {
        // x - x' <= -1 and x' - x <= 0.
        let mut r = increment();
        r.set(1, 0, Cell::constant(0));
        let mut powers = PowerCache::new(r.clone(), false);
        let closure = accelerate(&mut powers, &AccelerationConfig::default()).unwrap();
        assert_eq!(closure.termination(), Termination::Infeasible { power: 2 });
        assert_eq!(closure.prefix(), 2);
        assert_eq!(closure.matrices()[0], r);
        assert!(!closure.matrices()[1].is_consistent());
        assert!(closure.summaries().is_empty());
    }

    #[traced_test]
    #[test]
    fn ceiling_is_reported() {
        // x' = x + 1. The first progression check already needs R^3.
        let mut r = increment();
        r.set(1, 0, Cell::constant(1));
        let mut powers = PowerCache::new(r, false);
        let result = accelerate(&mut powers, &AccelerationConfig::default().with_max_power(2));
        assert_eq!(result, Err(ClosureError::AccelerationDivergent { limit: 2 }));
        assert!(logs_contain("acceleration exceeded the power ceiling"));
    }

    #[test]
    fn windows_combine() {
        assert_eq!(window(Bound::Unbounded, Bound::Unbounded), Bound::Unbounded);
        assert_eq!(window(Bound::At(4), Bound::Unbounded), Bound::At(4));
        assert_eq!(window(Bound::Unbounded, Bound::At(3)), Bound::At(3));
        assert_eq!(window(Bound::At(4), Bound::At(3)), Bound::At(3));
        assert_eq!(window(Bound::At(0), Bound::At(3)), Bound::At(2));
    }
}
