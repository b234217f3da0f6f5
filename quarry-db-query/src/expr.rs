//! Filter/bind expression evaluation
//!
//! Two-valued logic at the operator boundary: the recoverable error
//! class (type mismatch, unbound variable, division by zero) never
//! escapes Filter or Extend - Filter treats it as effective-false,
//! Extend leaves the target unbound. `EvalError::Fatal` is the one
//! exception and aborts the query.
//!
//! Numeric comparisons promote integers to doubles when the operand
//! datatypes differ; everything else compares within its own kind.

use crate::error::EvalError;
use crate::solution::{bound, Row};
use crate::var::VarId;
use quarry_db_core::{Term, XSD_STRING};
use std::cmp::Ordering;

/// Comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Arithmetic operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// An expression over one solution row.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Constant term
    Const(Term),
    /// Variable reference (unbound -> recoverable error)
    Var(VarId),
    /// Logical conjunction (SPARQL error tolerance: false && error = false)
    And(Box<Expr>, Box<Expr>),
    /// Logical disjunction (true || error = true)
    Or(Box<Expr>, Box<Expr>),
    /// Logical negation
    Not(Box<Expr>),
    /// Value comparison
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    /// Numeric arithmetic
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    /// True when the variable is bound (never errors)
    IsBound(VarId),
    /// Term kind tests
    IsIri(Box<Expr>),
    IsBlank(Box<Expr>),
    IsLiteral(Box<Expr>),
    IsNumeric(Box<Expr>),
    /// Identical-term test (no value coercion)
    SameTerm(Box<Expr>, Box<Expr>),
    /// Lexical form / IRI string as an xsd:string literal
    Str(Box<Expr>),
    /// Language tag of a literal ("" when absent)
    Lang(Box<Expr>),
    /// Datatype IRI of a literal
    Datatype(Box<Expr>),
    /// Conditional; the untaken branch is not evaluated
    If(Box<Expr>, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Variables referenced by this expression.
    pub fn vars(&self) -> Vec<VarId> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_vars(&self, out: &mut Vec<VarId>) {
        match self {
            Expr::Const(_) => {}
            Expr::Var(v) | Expr::IsBound(v) => out.push(*v),
            Expr::Not(a)
            | Expr::IsIri(a)
            | Expr::IsBlank(a)
            | Expr::IsLiteral(a)
            | Expr::IsNumeric(a)
            | Expr::Str(a)
            | Expr::Lang(a)
            | Expr::Datatype(a) => a.collect_vars(out),
            Expr::And(a, b)
            | Expr::Or(a, b)
            | Expr::Compare(_, a, b)
            | Expr::Arith(_, a, b)
            | Expr::SameTerm(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Expr::If(c, t, e) => {
                c.collect_vars(out);
                t.collect_vars(out);
                e.collect_vars(out);
            }
        }
    }

    /// Evaluate against a row, producing a term.
    pub fn eval(&self, row: &Row) -> Result<Term, EvalError> {
        match self {
            Expr::Const(t) => Ok(t.clone()),
            Expr::Var(v) => bound(row, *v).cloned().ok_or(EvalError::Unbound),
            Expr::And(a, b) => {
                // Error tolerance: a definite false on either side wins.
                match (a.eval_bool(row), b.eval_bool(row)) {
                    (Ok(false), _) | (_, Ok(false)) => Ok(Term::boolean(false)),
                    (Ok(true), Ok(true)) => Ok(Term::boolean(true)),
                    (Err(e), _) | (_, Err(e)) => Err(e),
                }
            }
            Expr::Or(a, b) => match (a.eval_bool(row), b.eval_bool(row)) {
                (Ok(true), _) | (_, Ok(true)) => Ok(Term::boolean(true)),
                (Ok(false), Ok(false)) => Ok(Term::boolean(false)),
                (Err(e), _) | (_, Err(e)) => Err(e),
            },
            Expr::Not(a) => Ok(Term::boolean(!a.eval_bool(row)?)),
            Expr::Compare(op, a, b) => {
                let left = a.eval(row)?;
                let right = b.eval(row)?;
                compare_terms(*op, &left, &right).map(Term::boolean)
            }
            Expr::Arith(op, a, b) => arith(*op, &a.eval(row)?, &b.eval(row)?),
            Expr::IsBound(v) => Ok(Term::boolean(bound(row, *v).is_some())),
            Expr::IsIri(a) => Ok(Term::boolean(a.eval(row)?.is_iri())),
            Expr::IsBlank(a) => Ok(Term::boolean(a.eval(row)?.is_bnode())),
            Expr::IsLiteral(a) => Ok(Term::boolean(a.eval(row)?.is_literal())),
            Expr::IsNumeric(a) => Ok(Term::boolean(a.eval(row)?.is_numeric())),
            Expr::SameTerm(a, b) => Ok(Term::boolean(a.eval(row)? == b.eval(row)?)),
            Expr::Str(a) => match a.eval(row)? {
                Term::Iri(iri) => Ok(Term::literal(iri.as_ref())),
                Term::Literal(lit) => Ok(Term::literal(lit.lexical())),
                other => Err(EvalError::type_error(format!("STR on {}", other))),
            },
            Expr::Lang(a) => match a.eval(row)? {
                Term::Literal(lit) => Ok(Term::literal(lit.lang().unwrap_or(""))),
                other => Err(EvalError::type_error(format!("LANG on {}", other))),
            },
            Expr::Datatype(a) => match a.eval(row)? {
                Term::Literal(lit) => Ok(Term::iri(lit.datatype())),
                other => Err(EvalError::type_error(format!("DATATYPE on {}", other))),
            },
            Expr::If(c, t, e) => {
                if c.eval_bool(row)? {
                    t.eval(row)
                } else {
                    e.eval(row)
                }
            }
        }
    }

    /// Evaluate to an effective boolean value.
    pub fn eval_bool(&self, row: &Row) -> Result<bool, EvalError> {
        effective_boolean(&self.eval(row)?)
    }
}

/// SPARQL effective boolean value.
pub fn effective_boolean(term: &Term) -> Result<bool, EvalError> {
    if let Some(b) = term.as_bool() {
        return Ok(b);
    }
    if let Some(n) = term.as_f64() {
        return Ok(n != 0.0 && !n.is_nan());
    }
    match term {
        Term::Literal(lit) if lit.datatype() == XSD_STRING || lit.lang().is_some() => {
            Ok(!lit.lexical().is_empty())
        }
        other => Err(EvalError::type_error(format!("no boolean value for {}", other))),
    }
}

/// Value comparison with numeric promotion.
fn compare_terms(op: CompareOp, left: &Term, right: &Term) -> Result<bool, EvalError> {
    // Identical terms are always equal, whatever their kind.
    if left == right {
        return Ok(matches!(op, CompareOp::Eq | CompareOp::Le | CompareOp::Ge));
    }
    let ordering = value_order(left, right)?;
    Ok(match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    })
}

/// Value ordering for two comparable terms; a recoverable error when
/// the kinds are not comparable.
pub fn value_order(left: &Term, right: &Term) -> Result<Ordering, EvalError> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return Ok(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return a
            .partial_cmp(&b)
            .ok_or_else(|| EvalError::type_error("NaN comparison"));
    }
    match (left, right) {
        (Term::Iri(a), Term::Iri(b)) => Ok(a.cmp(b)),
        (Term::Literal(a), Term::Literal(b))
            if a.datatype() == b.datatype() && a.lang() == b.lang() =>
        {
            Ok(a.lexical().cmp(b.lexical()))
        }
        _ => Err(EvalError::type_error(format!(
            "incomparable terms {} and {}",
            left, right
        ))),
    }
}

fn arith(op: ArithOp, left: &Term, right: &Term) -> Result<Term, EvalError> {
    // Integer arithmetic when both operands are integers (except Div,
    // which follows the teacher's decimal-division behavior).
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return match op {
            ArithOp::Add => Ok(Term::integer(a.wrapping_add(b))),
            ArithOp::Sub => Ok(Term::integer(a.wrapping_sub(b))),
            ArithOp::Mul => Ok(Term::integer(a.wrapping_mul(b))),
            ArithOp::Div => {
                if b == 0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(Term::double(a as f64 / b as f64))
                }
            }
        };
    }
    let (a, b) = match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(EvalError::type_error(format!(
                "arithmetic on non-numeric {} / {}",
                left, right
            )))
        }
    };
    Ok(Term::double(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
    }))
}
