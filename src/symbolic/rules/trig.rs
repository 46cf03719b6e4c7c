//! Trigonometric exact values, the Pythagorean identity, and double- and
//! half-angle expansions.
//!
//! The Pythagorean match normalizes both arguments first but still
//! requires structural equality between them. Half-angle rules produce
//! the positive branch only.

use super::{as_binary, as_unary_call};
use crate::ast::{BinaryOp, Expr};
use crate::symbolic::engine::{Assumptions, Rule, RuleCategory};
use crate::symbolic::normalizer::normalize;
use std::rc::Rc;

fn matches_trig_call(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Call { name, args, .. }
            if args.len() == 1 && matches!(name.as_str(), "sin" | "cos" | "tan")
    )
}

fn matches_add(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Binary {
            op: BinaryOp::Add,
            ..
        }
    )
}

fn apply_exact_values(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let Expr::Call { name, args, .. } = &**expr else {
        return None;
    };
    let arg = &args[0];
    let is_zero = arg.is_zero();
    let is_pi = matches!(&**arg, Expr::Variable(v) if v == "pi");
    let value = match (name.as_str(), is_zero, is_pi) {
        ("sin", true, _) => 0.0,
        ("cos", true, _) => 1.0,
        ("tan", true, _) => 0.0,
        ("sin", _, true) => 0.0,
        ("cos", _, true) => -1.0,
        ("tan", _, true) => 0.0,
        _ => return None,
    };
    Some(Expr::number(value))
}

/// `sin^2(e) + cos^2(e)` collapses to one when the arguments are
/// structurally equal after normalization.
fn apply_pythagorean(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Add)?;
    let sin_arg = squared_call_arg(left, "sin").or_else(|| squared_call_arg(right, "sin"))?;
    let cos_arg = squared_call_arg(left, "cos").or_else(|| squared_call_arg(right, "cos"))?;
    if normalize(&sin_arg) == normalize(&cos_arg) {
        return Some(Expr::number(1.0));
    }
    None
}

/// The argument of `name(...)^2`.
fn squared_call_arg(expr: &Rc<Expr>, name: &str) -> Option<Rc<Expr>> {
    let (base, exponent) = as_binary(expr, BinaryOp::Pow)?;
    if exponent.as_number() != Some(2.0) {
        return None;
    }
    as_unary_call(base, name).cloned()
}

/// The `x` in a `2x`-shaped argument.
fn double_angle_arg(arg: &Rc<Expr>) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(arg, BinaryOp::Mul)?;
    if left.as_number() == Some(2.0) {
        return Some(right.clone());
    }
    if right.as_number() == Some(2.0) {
        return Some(left.clone());
    }
    None
}

/// The `x` in an `x/2`-shaped argument.
fn half_angle_arg(arg: &Rc<Expr>) -> Option<Rc<Expr>> {
    if let Some((left, right)) = as_binary(arg, BinaryOp::Div) {
        if right.as_number() == Some(2.0) {
            return Some(left.clone());
        }
    }
    if let Some((left, right)) = as_binary(arg, BinaryOp::Mul) {
        if left.as_number() == Some(0.5) {
            return Some(right.clone());
        }
        if right.as_number() == Some(0.5) {
            return Some(left.clone());
        }
    }
    None
}

fn apply_sin_double(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let arg = as_unary_call(expr, "sin")?;
    let x = double_angle_arg(arg)?;
    Some(Expr::mul(
        Expr::number(2.0),
        Expr::mul(
            Expr::call1("sin", x.clone()),
            Expr::call1("cos", x),
        ),
    ))
}

fn apply_cos_double(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let arg = as_unary_call(expr, "cos")?;
    let x = double_angle_arg(arg)?;
    Some(Expr::sub(
        Expr::pow(Expr::call1("cos", x.clone()), Expr::number(2.0)),
        Expr::pow(Expr::call1("sin", x), Expr::number(2.0)),
    ))
}

fn apply_tan_double(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let arg = as_unary_call(expr, "tan")?;
    let x = double_angle_arg(arg)?;
    let tan = Expr::call1("tan", x);
    Some(Expr::div(
        Expr::mul(Expr::number(2.0), tan.clone()),
        Expr::sub(Expr::number(1.0), Expr::pow(tan, Expr::number(2.0))),
    ))
}

fn apply_sin_half(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let arg = as_unary_call(expr, "sin")?;
    let x = half_angle_arg(arg)?;
    Some(Expr::call1(
        "sqrt",
        Expr::div(
            Expr::sub(Expr::number(1.0), Expr::call1("cos", x)),
            Expr::number(2.0),
        ),
    ))
}

fn apply_cos_half(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let arg = as_unary_call(expr, "cos")?;
    let x = half_angle_arg(arg)?;
    Some(Expr::call1(
        "sqrt",
        Expr::div(
            Expr::add(Expr::number(1.0), Expr::call1("cos", x)),
            Expr::number(2.0),
        ),
    ))
}

pub fn rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "trig-exact-values",
            category: RuleCategory::Identity,
            priority: 90,
            description: "sin, cos, tan at 0 and pi",
            matches: matches_trig_call,
            apply: apply_exact_values,
        },
        Rule {
            name: "pythagorean",
            category: RuleCategory::Simplification,
            priority: 85,
            description: "sin^2 + cos^2 of the same argument is one",
            matches: matches_add,
            apply: apply_pythagorean,
        },
        Rule {
            name: "sin-double-angle",
            category: RuleCategory::Expansion,
            priority: 70,
            description: "sin(2x) expands to 2 sin(x) cos(x)",
            matches: matches_trig_call,
            apply: apply_sin_double,
        },
        Rule {
            name: "cos-double-angle",
            category: RuleCategory::Expansion,
            priority: 70,
            description: "cos(2x) expands to cos^2(x) - sin^2(x)",
            matches: matches_trig_call,
            apply: apply_cos_double,
        },
        Rule {
            name: "tan-double-angle",
            category: RuleCategory::Expansion,
            priority: 70,
            description: "tan(2x) expands to 2 tan(x) / (1 - tan^2(x))",
            matches: matches_trig_call,
            apply: apply_tan_double,
        },
        Rule {
            name: "sin-half-angle",
            category: RuleCategory::Expansion,
            priority: 60,
            description: "sin(x/2) expands to the positive half-angle branch",
            matches: matches_trig_call,
            apply: apply_sin_half,
        },
        Rule {
            name: "cos-half-angle",
            category: RuleCategory::Expansion,
            priority: 60,
            description: "cos(x/2) expands to the positive half-angle branch",
            matches: matches_trig_call,
            apply: apply_cos_half,
        },
    ]
}
