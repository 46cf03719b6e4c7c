//! Exponent identities and same-base power combination.

use super::as_binary;
use crate::ast::{BinaryOp, Expr};
use crate::symbolic::engine::{Assumption, Assumptions, Rule, RuleCategory};
use std::rc::Rc;

fn matches_pow(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Binary {
            op: BinaryOp::Pow,
            ..
        }
    )
}

fn matches_mul(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Binary {
            op: BinaryOp::Mul,
            ..
        }
    )
}

fn apply_pow_zero(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (_, exponent) = as_binary(expr, BinaryOp::Pow)?;
    if exponent.is_zero() {
        return Some(Expr::number(1.0));
    }
    None
}

fn apply_pow_one(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (base, exponent) = as_binary(expr, BinaryOp::Pow)?;
    if exponent.is_one() {
        return Some(base.clone());
    }
    None
}

fn apply_one_pow(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (base, _) = as_binary(expr, BinaryOp::Pow)?;
    if base.is_one() {
        return Some(Expr::number(1.0));
    }
    None
}

/// `0^x` is zero only for positive exponents.
fn apply_zero_pow(expr: &Rc<Expr>, assumptions: &Assumptions) -> Option<Rc<Expr>> {
    let (base, exponent) = as_binary(expr, BinaryOp::Pow)?;
    if base.is_zero() && assumptions.holds(exponent, Assumption::Positive) {
        return Some(Expr::number(0.0));
    }
    None
}

/// `(x^a)^b` combines to `x^(a b)` for numeric exponents.
fn apply_pow_pow(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (base, outer) = as_binary(expr, BinaryOp::Pow)?;
    let (inner_base, inner) = as_binary(base, BinaryOp::Pow)?;
    let a = inner.as_number()?;
    let b = outer.as_number()?;
    Some(Expr::pow(inner_base.clone(), Expr::number(a * b)))
}

/// Exponent of a factor, treating a bare expression as power one.
fn split_power(expr: &Rc<Expr>) -> (Rc<Expr>, Rc<Expr>) {
    match as_binary(expr, BinaryOp::Pow) {
        Some((base, exponent)) => (base.clone(), exponent.clone()),
        None => (expr.clone(), Expr::number(1.0)),
    }
}

fn combine_same_base(left: &Rc<Expr>, right: &Rc<Expr>) -> Option<Rc<Expr>> {
    let (base_l, exp_l) = split_power(left);
    let (base_r, exp_r) = split_power(right);
    if base_l != base_r {
        return None;
    }
    // Plain numbers are the constant folder's job
    if matches!(&*base_l, Expr::Number(_)) {
        return None;
    }
    let exponent = match (exp_l.as_number(), exp_r.as_number()) {
        (Some(a), Some(b)) => Expr::number(a + b),
        _ => Expr::add(exp_l, exp_r),
    };
    Some(Expr::pow(base_l, exponent))
}

/// `x^a * x^b` combines to `x^(a+b)`, also at the head of a longer
/// right-associative chain.
fn apply_mul_same_base(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Mul)?;
    if let Some(combined) = combine_same_base(left, right) {
        return Some(combined);
    }
    if let Some((head, rest)) = as_binary(right, BinaryOp::Mul) {
        if let Some(combined) = combine_same_base(left, head) {
            return Some(Expr::mul(combined, rest.clone()));
        }
    }
    None
}

pub fn rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "pow-zero",
            category: RuleCategory::Identity,
            priority: 90,
            description: "anything to the power zero is one",
            matches: matches_pow,
            apply: apply_pow_zero,
        },
        Rule {
            name: "pow-one",
            category: RuleCategory::Identity,
            priority: 90,
            description: "the first power is the base itself",
            matches: matches_pow,
            apply: apply_pow_one,
        },
        Rule {
            name: "one-pow",
            category: RuleCategory::Identity,
            priority: 90,
            description: "one to any power is one",
            matches: matches_pow,
            apply: apply_one_pow,
        },
        Rule {
            name: "zero-pow",
            category: RuleCategory::Identity,
            priority: 88,
            description: "zero to a positive power is zero",
            matches: matches_pow,
            apply: apply_zero_pow,
        },
        Rule {
            name: "pow-pow",
            category: RuleCategory::Simplification,
            priority: 70,
            description: "nested powers multiply their exponents",
            matches: matches_pow,
            apply: apply_pow_pow,
        },
        Rule {
            name: "mul-same-base",
            category: RuleCategory::Simplification,
            priority: 75,
            description: "same-base powers add their exponents",
            matches: matches_mul,
            apply: apply_mul_same_base,
        },
    ]
}
