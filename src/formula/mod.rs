//! Sandboxed arithmetic formula language for BP regeneration rules.
//!
//! Per-pattern regeneration formulas are strings in configuration, e.g.
//! `pinnedPieceValue + (isPinnedToKing ? 1 : 0)`. This module parses such
//! a string once, at config load, into an AST (never re-parsed per
//! move), then evaluates it deterministically against a fixed,
//! named-variable environment. There is no way to reference anything
//! but the supplied variables and arithmetic on numeric/boolean
//! literals — this is not an eval of arbitrary code.

use std::collections::HashMap;
use std::fmt;

use chumsky::{Parser, error::Rich, extra::Err, prelude::*};

pub trait Prs<'s, O> = Parser<'s, &'s str, O, Err<Rich<'s, char>>>;

/// A parsed, ready-to-evaluate formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula(pub Expr);

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    /// `cond ? then : else`, where `cond != 0.0` is truthy.
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaParseError(pub String);

impl fmt::Display for FormulaParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid formula: {}", self.0)
    }
}

impl std::error::Error for FormulaParseError {}

impl Formula {
    pub fn parse(src: &str) -> Result<Self, FormulaParseError> {
        expr_parser()
            .then_ignore(end())
            .parse(src.trim())
            .into_result()
            .map(Formula)
            .map_err(|errs| {
                FormulaParseError(
                    errs.into_iter()
                        .map(|e| e.to_string())
                        .collect::<Vec<_>>()
                        .join("; "),
                )
            })
    }

    /// Evaluate against a named variable environment. Unbound variables
    /// evaluate to `0.0` rather than erroring — config authors enumerate
    /// the variable set per pattern in the ruleset documentation, and a
    /// formula referencing an unlisted name is a config bug, not a
    /// runtime one the mover should see.
    pub fn eval(&self, vars: &HashMap<&str, f64>) -> f64 {
        eval_expr(&self.0, vars)
    }
}

fn eval_expr(expr: &Expr, vars: &HashMap<&str, f64>) -> f64 {
    match expr {
        Expr::Num(n) => *n,
        Expr::Var(name) => vars.get(name.as_str()).copied().unwrap_or(0.0),
        Expr::Neg(e) => -eval_expr(e, vars),
        Expr::Add(a, b) => eval_expr(a, vars) + eval_expr(b, vars),
        Expr::Sub(a, b) => eval_expr(a, vars) - eval_expr(b, vars),
        Expr::Mul(a, b) => eval_expr(a, vars) * eval_expr(b, vars),
        Expr::Div(a, b) => {
            let divisor = eval_expr(b, vars);
            if divisor == 0.0 {
                0.0
            } else {
                eval_expr(a, vars) / divisor
            }
        }
        Expr::Ternary(cond, then, or_else) => {
            if eval_expr(cond, vars) != 0.0 {
                eval_expr(then, vars)
            } else {
                eval_expr(or_else, vars)
            }
        }
    }
}

fn ident<'s>() -> impl Prs<'s, String> {
    text::ascii::ident().map(str::to_owned)
}

fn number<'s>() -> impl Prs<'s, f64> {
    text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .map(|s: &str| s.parse().expect("digits-only lexeme"))
}

fn expr_parser<'s>() -> impl Prs<'s, Expr> {
    recursive(|expr| {
        let atom = choice((
            number().map(Expr::Num),
            ident().map(Expr::Var),
            expr.clone().delimited_by(just('(').padded(), just(')').padded()),
        ))
        .padded();

        let unary = just('-')
            .padded()
            .repeated()
            .collect::<Vec<_>>()
            .then(atom)
            .map(|(minuses, atom)| {
                if minuses.len() % 2 == 1 {
                    Expr::Neg(Box::new(atom))
                } else {
                    atom
                }
            });

        let product = unary.clone().foldl(
            choice((just('*').to(Expr::Mul as fn(_, _) -> Expr), just('/').to(Expr::Div as fn(_, _) -> Expr)))
                .padded()
                .then(unary)
                .repeated(),
            |lhs, (op, rhs)| op(Box::new(lhs), Box::new(rhs)),
        );

        let sum = product.clone().foldl(
            choice((just('+').to(Expr::Add as fn(_, _) -> Expr), just('-').to(Expr::Sub as fn(_, _) -> Expr)))
                .padded()
                .then(product)
                .repeated(),
            |lhs, (op, rhs)| op(Box::new(lhs), Box::new(rhs)),
        );

        sum.clone()
            .then(
                just('?')
                    .padded()
                    .ignore_then(expr.clone())
                    .then_ignore(just(':').padded())
                    .then(expr)
                    .or_not(),
            )
            .map(|(cond, branches)| match branches {
                Some((then, or_else)) => Expr::Ternary(Box::new(cond), Box::new(then), Box::new(or_else)),
                None => cond,
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, f64)]) -> HashMap<&str, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn literal_addition() {
        let f = Formula::parse("1 + 2").unwrap();
        assert_eq!(f.eval(&vars(&[])), 3.0);
    }

    #[test]
    fn pin_regeneration_formula() {
        let f = Formula::parse("pinnedPieceValue + (isPinnedToKing ? 1 : 0)").unwrap();
        assert_eq!(f.eval(&vars(&[("pinnedPieceValue", 3.0), ("isPinnedToKing", 0.0)])), 3.0);
        assert_eq!(f.eval(&vars(&[("pinnedPieceValue", 3.0), ("isPinnedToKing", 1.0)])), 4.0);
    }

    #[test]
    fn operator_precedence() {
        let f = Formula::parse("2 + 3 * 4").unwrap();
        assert_eq!(f.eval(&vars(&[])), 14.0);
    }

    #[test]
    fn fork_sum_formula() {
        let f = Formula::parse("forkedPiecesValues").unwrap();
        assert_eq!(f.eval(&vars(&[("forkedPiecesValues", 8.0)])), 8.0);
    }

    #[test]
    fn unbound_variable_is_zero() {
        let f = Formula::parse("unknownName + 1").unwrap();
        assert_eq!(f.eval(&vars(&[])), 1.0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Formula::parse("1 + + 2").is_err());
    }
}
