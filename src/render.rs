//! Printing closures as constraints over the variables of a relation.
//!
//! Every matrix of a [`Closure`] becomes one conjunction of inequalities, and the closure is the
//! disjunction of these. [`to_text`] produces a human readable form and [`to_smtlib`] an SMT-LIB 2
//! script in which the iteration parameter is the integer constant `|$k|`.
//!
//! [`Closure`]: ../acceleration/struct.Closure.html
//! [`to_text`]: ./fn.to_text.html
//! [`to_smtlib`]: ./fn.to_smtlib.html

use crate::acceleration::Closure;
use crate::algebra::{AffineTerm, Cell, Matrix};
use crate::relation::{Encoding, Relation};

/// `sum(coefficient * variable) <= bound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inequality {
    /// Signed coefficients and variable names.
    pub lhs: Vec<(i64, String)>,
    /// The right-hand side.
    pub bound: AffineTerm,
}

impl Inequality {
    /// Whether the bound depends on the iteration parameter.
    pub fn is_parametric(&self) -> bool {
        self.bound.alpha() != 0
    }
}

fn name(relation: &Relation, node: usize) -> String {
    relation
        .search_variable(node)
        .unwrap_or_else(|| format!("?{}", node))
}

fn push_cell(out: &mut Vec<Inequality>, lhs: Vec<(i64, String)>, cell: &Cell) {
    for t in cell.terms() {
        out.push(Inequality {
            lhs: lhs.clone(),
            bound: *t,
        });
    }
}

/// The inequalities described by one matrix of a relation. An entry holding several terms
/// yields one inequality per term.
///
/// In the octagonal encoding each constraint appears twice in the matrix. It is reported once,
/// with the smaller of the two bounds.
///
/// # Examples
/// ```
/// # use paraclosure::parser::parse_relation;
/// # use paraclosure::render::inequalities;
/// let r = parse_relation("x' = x + 1").unwrap();
/// let text: Vec<String> = inequalities(&r, r.base())
///     .iter()
///     .map(|i| format!("{:?} <= {}", i.lhs, i.bound))
///     .collect();
/// assert_eq!(
///     text,
///     vec![
///         "[(1, \"x\"), (-1, \"x'\")] <= -1",
///         "[(1, \"x'\"), (-1, \"x\")] <= 1",
///     ]
/// );
/// ```
pub fn inequalities(relation: &Relation, m: &Matrix) -> Vec<Inequality> {
    let mut out = Vec::new();
    match relation.encoding() {
        Encoding::DifferenceBound => {
            for i in 0..m.size() {
                for j in 0..m.size() {
                    if i != j {
                        let lhs = vec![(1, name(relation, i)), (-1, name(relation, j))];
                        push_cell(&mut out, lhs, &m[(i, j)]);
                    }
                }
            }
        }
        Encoding::Octagonal => {
            let pairs = m.size() / 2;
            for i in 0..pairs {
                let (pi, ni) = (2 * i, 2 * i + 1);
                let x = name(relation, pi);
                push_cell(&mut out, vec![(2, x.clone())], &m[(pi, ni)]);
                push_cell(&mut out, vec![(-2, x.clone())], &m[(ni, pi)]);
                for j in i + 1..pairs {
                    let (pj, nj) = (2 * j, 2 * j + 1);
                    let y = name(relation, pj);
                    let coherent = |a: (usize, usize), b: (usize, usize)| m[a].merge(&m[b]);
                    push_cell(
                        &mut out,
                        vec![(1, x.clone()), (-1, y.clone())],
                        &coherent((pi, pj), (nj, ni)),
                    );
                    push_cell(
                        &mut out,
                        vec![(-1, x.clone()), (1, y.clone())],
                        &coherent((pj, pi), (ni, nj)),
                    );
                    push_cell(
                        &mut out,
                        vec![(-1, x.clone()), (-1, y.clone())],
                        &coherent((ni, pj), (nj, pi)),
                    );
                    push_cell(
                        &mut out,
                        vec![(1, x.clone()), (1, y.clone())],
                        &coherent((pi, nj), (pj, ni)),
                    );
                }
            }
        }
    }
    out
}

fn text_lhs(lhs: &[(i64, String)]) -> String {
    let mut s = String::new();
    for (idx, (c, v)) in lhs.iter().enumerate() {
        match *c {
            1 if idx == 0 => {}
            1 => s.push('+'),
            -1 => s.push('-'),
            c if c > 0 && idx > 0 => s.push_str(&format!("+{}", c)),
            c => s.push_str(&c.to_string()),
        }
        s.push_str(v);
    }
    s
}

/// Render a closure as a disjunction of conjunctions, one per matrix. Parametric conjunctions
/// end with `k >= 0`.
///
/// # Examples
/// ```
/// # use paraclosure::parser::parse_relation;
/// # use paraclosure::render::to_text;
/// # use paraclosure::AccelerationConfig;
/// let mut r = parse_relation("x' >= x + 1").unwrap();
/// r.accelerate(&AccelerationConfig::default()).unwrap();
/// assert_eq!(to_text(&r, r.closure().unwrap()), "(x-x'<=-k-1, k >= 0)");
/// ```
pub fn to_text(relation: &Relation, closure: &Closure) -> String {
    let disjuncts: Vec<String> = closure
        .matrices()
        .iter()
        .map(|m| {
            let ineqs = inequalities(relation, m);
            let mut parts: Vec<String> = ineqs
                .iter()
                .map(|i| format!("{}<={}", text_lhs(&i.lhs), i.bound))
                .collect();
            if ineqs.iter().any(Inequality::is_parametric) {
                parts.push("k >= 0".to_string());
            }
            if parts.is_empty() {
                "(true)".to_string()
            } else {
                format!("({})", parts.join(", "))
            }
        })
        .collect();
    disjuncts.join(" ||\n")
}

fn smt_int(v: i64) -> String {
    if v < 0 {
        format!("(- {})", v.unsigned_abs())
    } else {
        v.to_string()
    }
}

fn smt_symbol(name: &str) -> String {
    format!("|{}|", name)
}

fn smt_literal(c: i64, v: &str) -> String {
    match c {
        1 => smt_symbol(v),
        -1 => format!("(- {})", smt_symbol(v)),
        c => format!("(* {} {})", smt_int(c), smt_symbol(v)),
    }
}

fn smt_lhs(lhs: &[(i64, String)]) -> String {
    match lhs {
        [(c, v)] => smt_literal(*c, v),
        [(c, v), (-1, w)] => format!("(- {} {})", smt_literal(*c, v), smt_symbol(w)),
        _ => {
            let parts: Vec<String> = lhs.iter().map(|(c, v)| smt_literal(*c, v)).collect();
            format!("(+ {})", parts.join(" "))
        }
    }
}

fn smt_term(t: &AffineTerm) -> String {
    let k = smt_symbol("$k");
    match (t.alpha(), t.beta()) {
        (0, b) => smt_int(b),
        (a, 0) => format!("(* {} {})", smt_int(a), k),
        (a, b) => format!("(+ (* {} {}) {})", smt_int(a), k, smt_int(b)),
    }
}

/// Render a closure as an SMT-LIB 2 script asserting that the pre- and post-state variables are
/// related by some power of the relation.
///
/// # Examples
/// ```
/// # use paraclosure::parser::parse_relation;
/// # use paraclosure::render::to_smtlib;
/// # use paraclosure::AccelerationConfig;
/// let mut r = parse_relation("x' >= x + 1").unwrap();
/// r.accelerate(&AccelerationConfig::default()).unwrap();
/// let script = to_smtlib(&r, r.closure().unwrap());
/// assert!(script.contains("(declare-fun |x'| () Int)"));
/// assert!(script.contains("(and (<= (- |x| |x'|) (+ (* (- 1) |$k|) (- 1))) (>= |$k| 0))"));
/// ```
pub fn to_smtlib(relation: &Relation, closure: &Closure) -> String {
    let mut s = String::new();
    for v in relation.variables().values() {
        s.push_str(&declare(&smt_symbol(v)));
        s.push_str(&declare(&smt_symbol(&format!("{}'", v))));
    }
    s.push_str(&declare(&smt_symbol("$k")));
    s.push_str("(assert (or\n");
    for m in closure.matrices() {
        let ineqs = inequalities(relation, m);
        let mut atoms: Vec<String> = ineqs
            .iter()
            .map(|i| format!("(<= {} {})", smt_lhs(&i.lhs), smt_term(&i.bound)))
            .collect();
        if ineqs.iter().any(Inequality::is_parametric) {
            atoms.push(format!("(>= {} 0)", smt_symbol("$k")));
        }
        if atoms.is_empty() {
            s.push_str("  true\n");
        } else {
            s.push_str(&format!("  (and {})\n", atoms.join(" ")));
        }
    }
    s.push_str("))\n");
    s
}

fn declare(symbol: &str) -> String {
    format!("(declare-fun {} () Int)\n", symbol)
}
