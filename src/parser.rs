//! Reading relations from text.
//!
//! A relation is written as a conjunction of linear integer (in)equalities over plain and
//! primed variables, for instance `x' = x + 1 && y' <= y && x <= y`. Primed variables denote the
//! state after one step. Every conjunct must mention one or two variables with coefficients of
//! equal magnitude; difference constraints `x - y <= c` yield a difference-bound relation, and
//! anything else which is still of the form `±x ± y <= c` or `±x <= c` yields an octagonal one.

use std::collections::BTreeMap;
use std::str::FromStr;

use tracing::debug;

use crate::algebra::{Cell, Matrix};
use crate::error::{overflow, ClosureError, Result};
use crate::relation::{Encoding, Relation};

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Ident { name: String, primed: bool },
    Int(i64),
    Plus,
    Minus,
    Star,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    And,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn parse_error<T>(position: usize, message: impl Into<String>) -> Result<T> {
    Err(ClosureError::Parse {
        position,
        message: message.into(),
    })
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Splits a formula into tokens.
struct Lexer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Lexer<'a> {
        Lexer { text, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, f: F) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !f(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.text[start..self.pos]
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.take_while(char::is_whitespace);
        let position = self.pos;
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };
        let kind = if c.is_ascii_digit() {
            let digits = self.take_while(|c| c.is_ascii_digit());
            match digits.parse::<i64>() {
                Ok(v) => TokenKind::Int(v),
                Err(_) => return parse_error(position, format!("integer {} is too large", digits)),
            }
        } else if is_ident_start(c) {
            let name = self.take_while(is_ident_continue).to_string();
            let primed = self.peek() == Some('\'');
            if primed {
                self.bump();
                if self.peek() == Some('\'') {
                    return parse_error(self.pos, "a variable can be primed only once");
                }
            }
            TokenKind::Ident { name, primed }
        } else {
            self.bump();
            match c {
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '=' => TokenKind::Eq,
                '<' | '>' => {
                    let or_equal = self.peek() == Some('=');
                    if or_equal {
                        self.bump();
                    }
                    match (c, or_equal) {
                        ('<', false) => TokenKind::Lt,
                        ('<', true) => TokenKind::Le,
                        ('>', false) => TokenKind::Gt,
                        _ => TokenKind::Ge,
                    }
                }
                '&' => {
                    if self.bump() != Some('&') {
                        return parse_error(position, "expected `&&`");
                    }
                    TokenKind::And
                }
                '/' => return parse_error(position, "division is not supported"),
                '\'' => return parse_error(position, "only variables can be primed"),
                other => return parse_error(position, format!("unexpected character `{}`", other)),
            }
        };
        Ok(Some(Token { kind, position }))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Result<Token>> {
        self.next_token().transpose()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct VarRef {
    id: usize,
    primed: bool,
}

// sum(coefficients[v] * v) + constant
#[derive(Debug, Clone, Default)]
struct Linear {
    coefficients: BTreeMap<VarRef, i64>,
    constant: i64,
}

impl Linear {
    fn add_var(&mut self, var: VarRef, coefficient: i64) -> Result<()> {
        let entry = self.coefficients.entry(var).or_insert(0);
        let current = *entry;
        *entry = current
            .checked_add(coefficient)
            .ok_or_else(|| overflow("coefficient", current, coefficient))?;
        Ok(())
    }

    fn add_constant(&mut self, c: i64) -> Result<()> {
        let current = self.constant;
        self.constant = current
            .checked_add(c)
            .ok_or_else(|| overflow("constant", current, c))?;
        Ok(())
    }

    fn subtract(mut self, other: Linear) -> Result<Linear> {
        for (var, c) in other.coefficients {
            let neg = c.checked_neg().ok_or_else(|| overflow("coefficient", c, -1))?;
            self.add_var(var, neg)?;
        }
        let neg = other
            .constant
            .checked_neg()
            .ok_or_else(|| overflow("constant", other.constant, -1))?;
        self.add_constant(neg)?;
        Ok(self)
    }

    fn negate(self) -> Result<Linear> {
        Linear::default().subtract(self)
    }
}

/// `sum(a_i * v_i) <= bound`.
#[derive(Debug)]
struct Inequality {
    terms: Vec<(VarRef, i64)>,
    bound: i64,
    position: usize,
}

impl Inequality {
    // `expr <= offset`
    fn from_linear(expr: Linear, offset: i64, position: usize) -> Result<Inequality> {
        let bound = offset
            .checked_sub(expr.constant)
            .ok_or_else(|| overflow("constant", offset, expr.constant))?;
        let terms = expr
            .coefficients
            .into_iter()
            .filter(|&(_, c)| c != 0)
            .collect();
        Ok(Inequality {
            terms,
            bound,
            position,
        })
    }
}

/// A normalized constraint `s1 * v1 + s2 * v2 <= bound` with unit signs. For unary constraints
/// `v1 == v2` and the bound is doubled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Constraint {
    first: (VarRef, i64),
    second: (VarRef, i64),
    bound: i64,
}

impl Constraint {
    fn is_difference(&self) -> bool {
        self.first.0 != self.second.0 && self.first.1 != self.second.1
    }
}

fn normalize(ineq: Inequality) -> Result<Constraint> {
    if ineq.terms.is_empty() || ineq.terms.len() > 2 {
        return parse_error(
            ineq.position,
            format!(
                "a constraint must mention one or two variables, found {}",
                ineq.terms.len()
            ),
        );
    }
    let mut highest: i64 = 1;
    for &(_, c) in &ineq.terms {
        let magnitude = c.checked_abs().ok_or_else(|| overflow("coefficient", c, -1))?;
        highest = highest.max(magnitude);
    }
    let mut signs = Vec::with_capacity(2);
    for &(var, c) in &ineq.terms {
        if c % highest != 0 {
            return parse_error(ineq.position, "coefficients cannot be normalized");
        }
        signs.push((var, c / highest));
    }
    let (first, second, bound) = if signs.len() == 1 {
        let doubled = ineq
            .bound
            .checked_mul(2)
            .ok_or_else(|| overflow("constant", ineq.bound, 2))?;
        (signs[0], signs[0], doubled.div_euclid(highest))
    } else {
        (signs[0], signs[1], ineq.bound.div_euclid(highest))
    };
    Ok(Constraint {
        first,
        second,
        bound,
    })
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    end: usize,
    variables: Vec<String>,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |t| t.position)
    }

    fn variable(&mut self, name: &str, primed: bool) -> VarRef {
        let id = match self.variables.iter().position(|v| v == name) {
            Some(i) => i + 1,
            None => {
                self.variables.push(name.to_string());
                self.variables.len()
            }
        };
        VarRef { id, primed }
    }

    // term := factor ('*' factor)*, with at most one variable among the factors.
    fn term(&mut self, sign: i64, expr: &mut Linear) -> Result<()> {
        let mut coefficient = sign;
        let mut var: Option<VarRef> = None;
        loop {
            let factor_position = self.position();
            match self.peek() {
                Some(TokenKind::Int(v)) => {
                    coefficient = coefficient
                        .checked_mul(*v)
                        .ok_or_else(|| overflow("coefficient", coefficient, *v))?;
                }
                Some(TokenKind::Ident { name, primed }) => {
                    if var.is_some() {
                        return parse_error(factor_position, "products of variables are not linear");
                    }
                    var = Some(self.variable(name, *primed));
                }
                _ => return parse_error(factor_position, "expected a variable or an integer"),
            }
            self.pos += 1;
            if self.peek() == Some(&TokenKind::Star) {
                self.pos += 1;
            } else {
                break;
            }
        }
        match var {
            Some(v) => expr.add_var(v, coefficient),
            None => expr.add_constant(coefficient),
        }
    }

    // expr := sign* term (sign+ term)*
    fn expression(&mut self) -> Result<Linear> {
        let mut expr = Linear::default();
        let mut first = true;
        loop {
            let mut sign = 1;
            let mut saw_sign = false;
            while let Some(kind) = self.peek() {
                match kind {
                    TokenKind::Plus => {}
                    TokenKind::Minus => sign = -sign,
                    _ => break,
                }
                saw_sign = true;
                self.pos += 1;
            }
            if !first && !saw_sign {
                return Ok(expr);
            }
            self.term(sign, &mut expr)?;
            first = false;
        }
    }

    fn conjunct(&mut self) -> Result<Vec<Inequality>> {
        let position = self.position();
        let lhs = self.expression()?;
        let comparator = match self.peek() {
            Some(k @ (TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge | TokenKind::Eq)) => {
                k.clone()
            }
            _ => return parse_error(self.position(), "expected a comparison"),
        };
        self.pos += 1;
        let rhs = self.expression()?;
        let diff = lhs.subtract(rhs)?;
        // diff <op> 0
        Ok(match comparator {
            TokenKind::Le => vec![Inequality::from_linear(diff, 0, position)?],
            TokenKind::Lt => vec![Inequality::from_linear(diff, -1, position)?],
            TokenKind::Ge => vec![Inequality::from_linear(diff.negate()?, 0, position)?],
            TokenKind::Gt => vec![Inequality::from_linear(diff.negate()?, -1, position)?],
            _ => vec![
                Inequality::from_linear(diff.clone(), 0, position)?,
                Inequality::from_linear(diff.negate()?, 0, position)?,
            ],
        })
    }

    fn formula(&mut self) -> Result<Vec<Inequality>> {
        if self.tokens.is_empty() {
            return parse_error(0, "empty formula");
        }
        let mut inequalities = Vec::new();
        loop {
            inequalities.extend(self.conjunct()?);
            match self.peek() {
                None => return Ok(inequalities),
                Some(TokenKind::And) => self.pos += 1,
                Some(TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge | TokenKind::Eq) => {
                    return parse_error(self.position(), "more than one comparison in a conjunct")
                }
                Some(_) => return parse_error(self.position(), "expected `&&`"),
            }
        }
    }
}

/// The relation part of a document: the text between the first `:` and the next `;`, or the
/// whole document if it contains no `:`.
///
/// # Examples
/// ```
/// # use paraclosure::parser::extract_formula;
/// assert_eq!(extract_formula("loop: x' = x + 1; rest"), " x' = x + 1");
/// assert_eq!(extract_formula("x' <= x"), "x' <= x");
/// assert_eq!(extract_formula("t: x' <= x"), " x' <= x");
/// ```
pub fn extract_formula(document: &str) -> &str {
    match document.find(':') {
        Some(colon) => {
            let rest = &document[colon + 1..];
            match rest.find(';') {
                Some(semi) => &rest[..semi],
                None => rest,
            }
        }
        None => document,
    }
}

// Octagonal node of a signed literal.
fn literal(var: VarRef, sign: i64, variables: usize) -> usize {
    let base = 2 * (var.id - 1) + if var.primed { 2 * variables } else { 0 };
    if sign > 0 {
        base
    } else {
        base + 1
    }
}

/// Parse a conjunction of linear constraints into a relation. The base matrix is closed
/// (and tightened, for octagonal relations) before it is stored.
///
/// # Errors
/// Returns a `Parse` error for malformed input or constraints which are neither
/// difference-bound nor octagonal.
///
/// # Examples
/// ```
/// # use paraclosure::algebra::Cell;
/// # use paraclosure::parser::parse_relation;
/// # use paraclosure::Encoding;
/// let r = parse_relation("x' = x + 1 && y' <= y").unwrap();
/// assert_eq!(r.encoding(), Encoding::DifferenceBound);
/// assert_eq!(r.variables()[&2], "y");
/// // x - x' <= -1 on nodes x, y, x', y'.
/// assert_eq!(r.base()[(0, 2)], Cell::constant(-1));
///
/// let r = parse_relation("x' <= x + 1 && x >= 0").unwrap();
/// assert_eq!(r.encoding(), Encoding::Octagonal);
/// ```
pub fn parse_relation(formula: &str) -> Result<Relation> {
    let tokens = Lexer::new(formula).collect::<Result<Vec<Token>>>()?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        end: formula.len(),
        variables: Vec::new(),
    };
    let inequalities = parser.formula()?;
    let constraints = inequalities
        .into_iter()
        .map(normalize)
        .collect::<Result<Vec<Constraint>>>()?;

    let n = parser.variables.len();
    let encoding = if constraints.iter().all(Constraint::is_difference) {
        Encoding::DifferenceBound
    } else {
        Encoding::Octagonal
    };
    let size = n * encoding.nodes_per_variable();
    let mut base = Matrix::unconstrained(size);
    for c in &constraints {
        let weight = Cell::constant(c.bound);
        match encoding {
            Encoding::DifferenceBound => {
                let (pos, neg) = if c.first.1 > 0 {
                    (c.first.0, c.second.0)
                } else {
                    (c.second.0, c.first.0)
                };
                let node = |v: VarRef| v.id - 1 + if v.primed { n } else { 0 };
                base.constrain(node(pos), node(neg), &weight);
            }
            Encoding::Octagonal => {
                let ((v1, s1), (v2, s2)) = (c.first, c.second);
                base.constrain(literal(v1, s1, n), literal(v2, -s2, n), &weight);
                base.constrain(literal(v2, s2, n), literal(v1, -s1, n), &weight);
            }
        }
    }
    let base = base.closure(encoding.is_octagonal())?;
    debug!(
        variables = n,
        constraints = constraints.len(),
        ?encoding,
        "parsed relation"
    );
    let variables = parser
        .variables
        .into_iter()
        .enumerate()
        .map(|(i, name)| (i + 1, name))
        .collect();
    Relation::new(variables, encoding, base)
}

/// Parse the relation embedded in a document, see [`extract_formula`].
///
/// [`extract_formula`]: ./fn.extract_formula.html
pub fn parse_document(document: &str) -> Result<Relation> {
    parse_relation(extract_formula(document))
}

impl FromStr for Relation {
    type Err = ClosureError;

    fn from_str(s: &str) -> Result<Relation> {
        parse_relation(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        Lexer::new(text)
            .map(|t| t.map(|t| t.kind))
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn lexes_operators_and_primes() {
        assert_eq!(
            kinds("x'<=2*y && z>=-1"),
            vec![
                TokenKind::Ident {
                    name: "x".to_string(),
                    primed: true
                },
                TokenKind::Le,
                TokenKind::Int(2),
                TokenKind::Star,
                TokenKind::Ident {
                    name: "y".to_string(),
                    primed: false
                },
                TokenKind::And,
                TokenKind::Ident {
                    name: "z".to_string(),
                    primed: false
                },
                TokenKind::Ge,
                TokenKind::Minus,
                TokenKind::Int(1),
            ]
        );
    }

    #[test]
    fn lexer_reports_positions() {
        let err = Lexer::new("x <= y / 2")
            .collect::<Result<Vec<_>>>()
            .unwrap_err();
        assert_eq!(
            err,
            ClosureError::Parse {
                position: 7,
                message: "division is not supported".to_string()
            }
        );
        assert!(Lexer::new("x & y").collect::<Result<Vec<_>>>().is_err());
        assert!(Lexer::new("x'' <= y").collect::<Result<Vec<_>>>().is_err());
    }

    #[test]
    fn variables_are_numbered_by_first_occurrence() {
        let r = parse_relation("b' <= a && a' <= c + 3 && b <= a").unwrap();
        let names: Vec<&str> = r.variables().values().map(String::as_str).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(r.search_variable(3).as_deref(), Some("b'"));
    }

    #[test]
    fn equalities_constrain_both_directions() {
        let r = parse_relation("x' = x + 1").unwrap();
        assert_eq!(r.encoding(), Encoding::DifferenceBound);
        assert_eq!(r.base()[(1, 0)], Cell::constant(1));
        assert_eq!(r.base()[(0, 1)], Cell::constant(-1));
    }

    #[test]
    fn strict_comparisons_tighten_by_one() {
        let r = parse_relation("x' < x && x' - x > -5").unwrap();
        // x' - x <= -1 and x - x' <= 4
        assert_eq!(r.base()[(1, 0)], Cell::constant(-1));
        assert_eq!(r.base()[(0, 1)], Cell::constant(4));
    }

    #[test]
    fn repeated_constraints_keep_the_minimum() {
        let r = parse_relation("x' - x <= 4 && x' <= x + 2 && x' - 7 <= x").unwrap();
        assert_eq!(r.base()[(1, 0)], Cell::constant(2));
    }

    #[test]
    fn scaled_constraints_are_normalized() {
        let r = parse_relation("2*x' - 2*x <= 5").unwrap();
        assert_eq!(r.base()[(1, 0)], Cell::constant(2));
        let r = parse_relation("-3*x + 3*x' >= -7").unwrap();
        // x - x' <= 7/3, rounded down
        assert_eq!(r.base()[(0, 1)], Cell::constant(2));
        assert!(parse_relation("2*x' - 3*x <= 1").is_err());
    }

    #[test]
    fn unary_constraints_make_octagons() {
        let r = parse_relation("x <= 3").unwrap();
        assert_eq!(r.encoding(), Encoding::Octagonal);
        assert_eq!(r.base().size(), 4);
        // +x - (-x) <= 6
        assert_eq!(r.base()[(0, 1)], Cell::constant(6));
        assert!(r.base()[(1, 0)].is_infinite());
    }

    #[test]
    fn sums_make_octagons() {
        let r = parse_relation("x + y <= 4").unwrap();
        assert_eq!(r.encoding(), Encoding::Octagonal);
        // +x - (-y) <= 4 and +y - (-x) <= 4
        assert_eq!(r.base()[(0, 3)], Cell::constant(4));
        assert_eq!(r.base()[(2, 1)], Cell::constant(4));
    }

    #[test]
    fn rejects_non_octagonal_constraints() {
        assert!(parse_relation("x + y + z <= 1").is_err());
        assert!(parse_relation("x - x <= 1").is_err());
        assert!(parse_relation("x * y <= 1").is_err());
        assert!(parse_relation("x <= 1 <= y").is_err());
        assert!(parse_relation("x + 1").is_err());
        assert!(parse_relation("").is_err());
        assert!(parse_relation("x <= y &&").is_err());
    }

    #[test]
    fn documents_are_unwrapped() {
        let r = parse_document("relation: x' = x + 1 ; ignored").unwrap();
        assert_eq!(r.variable_count(), 1);
        let r: Relation = "x' <= x".parse().unwrap();
        assert_eq!(r.variables()[&1], "x");
    }

    #[test]
    fn base_matrix_is_closed() {
        let r = parse_relation("x' <= y && y <= x").unwrap();
        // nodes x, y, x', y': x' - x <= 0 through y
        assert_eq!(r.base()[(2, 0)], Cell::constant(0));
        assert_eq!(r.base().closure(false).unwrap(), *r.base());
    }
}
