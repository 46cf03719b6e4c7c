//! Built-in rewrite rules, one module per family:
//!
//! - **[arithmetic]**: constant folding, additive/multiplicative identities,
//!   like-operand collapses (`x + x`, `x - x`, `x / x`, `x * x`)
//! - **[powers]**: exponent identities and same-base combination
//! - **[logs]**: log laws and exp/ln inversion, guarded by assumptions
//! - **[trig]**: exact values, the Pythagorean identity, double- and
//!   half-angle expansions

use super::engine::Rule;
use crate::ast::{BinaryOp, Expr};
use std::rc::Rc;

pub mod arithmetic;
pub mod logs;
pub mod powers;
pub mod trig;

/// The complete built-in rule set.
pub fn all() -> Vec<Rule> {
    let mut rules = Vec::new();
    rules.extend(arithmetic::rules());
    rules.extend(powers::rules());
    rules.extend(logs::rules());
    rules.extend(trig::rules());
    rules
}

// Shared destructuring helpers for rule bodies.

pub(crate) fn as_binary(expr: &Expr, op: BinaryOp) -> Option<(&Rc<Expr>, &Rc<Expr>)> {
    match expr {
        Expr::Binary {
            op: found,
            left,
            right,
        } if *found == op => Some((left, right)),
        _ => None,
    }
}

/// A single-argument call to `name`.
pub(crate) fn as_unary_call<'a>(expr: &'a Expr, name: &str) -> Option<&'a Rc<Expr>> {
    match expr {
        Expr::Call {
            name: found, args, ..
        } if found == name && args.len() == 1 => Some(&args[0]),
        _ => None,
    }
}
