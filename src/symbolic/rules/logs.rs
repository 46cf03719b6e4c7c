//! Logarithm laws and exp/ln inversion.
//!
//! The product and quotient laws fire only when both operands are known
//! positive (literals or assumptions). The power law follows the guarded
//! form: positive base gives `b log a`, otherwise `b log |a|`.

use super::{as_binary, as_unary_call};
use crate::ast::{BinaryOp, Expr};
use crate::symbolic::engine::{Assumption, Assumptions, Rule, RuleCategory};
use std::rc::Rc;

fn matches_log(expr: &Expr) -> bool {
    matches!(expr, Expr::Call { name, args, .. } if (name == "ln" || name == "log") && args.len() == 1)
}

fn matches_pow(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Binary {
            op: BinaryOp::Pow,
            ..
        }
    )
}

/// Destructure `ln(x)` or `log_b(x)`, keeping the base.
fn log_parts(expr: &Expr) -> Option<(&str, &Rc<Expr>, Option<&Rc<Expr>>)> {
    match expr {
        Expr::Call {
            name, args, base, ..
        } if (name == "ln" || name == "log") && args.len() == 1 => {
            Some((name, &args[0], base.as_ref()))
        }
        _ => None,
    }
}

fn make_log(name: &str, arg: Rc<Expr>, base: Option<Rc<Expr>>) -> Rc<Expr> {
    Rc::new(Expr::Call {
        name: name.to_string(),
        args: vec![arg],
        base,
        param: None,
    })
}

fn apply_log_one(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (_, arg, _) = log_parts(expr)?;
    if arg.is_one() {
        return Some(Expr::number(0.0));
    }
    None
}

fn apply_ln_e(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let arg = as_unary_call(expr, "ln")?;
    if matches!(&**arg, Expr::Variable(name) if name == "e") {
        return Some(Expr::number(1.0));
    }
    None
}

/// `log_b(b)` is one.
fn apply_log_base_self(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (name, arg, base) = log_parts(expr)?;
    if name == "log" && base.is_some_and(|b| b == arg) {
        return Some(Expr::number(1.0));
    }
    None
}

/// `ln(e^x)` collapses to `x`; likewise `ln(exp(x))`.
fn apply_ln_exp(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let arg = as_unary_call(expr, "ln")?;
    if let Some((base, exponent)) = as_binary(arg, BinaryOp::Pow) {
        if matches!(&**base, Expr::Variable(name) if name == "e") {
            return Some(exponent.clone());
        }
    }
    if let Some(inner) = as_unary_call(arg, "exp") {
        return Some(inner.clone());
    }
    None
}

/// `e^(ln x)` collapses to `x`.
fn apply_exp_ln(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (base, exponent) = as_binary(expr, BinaryOp::Pow)?;
    if !matches!(&**base, Expr::Variable(name) if name == "e") {
        return None;
    }
    let inner = as_unary_call(exponent, "ln")?;
    Some(inner.clone())
}

fn apply_log_product(expr: &Rc<Expr>, assumptions: &Assumptions) -> Option<Rc<Expr>> {
    let (name, arg, base) = log_parts(expr)?;
    let (left, right) = as_binary(arg, BinaryOp::Mul)?;
    if !assumptions.holds(left, Assumption::Positive)
        || !assumptions.holds(right, Assumption::Positive)
    {
        return None;
    }
    Some(Expr::add(
        make_log(name, left.clone(), base.cloned()),
        make_log(name, right.clone(), base.cloned()),
    ))
}

fn apply_log_quotient(expr: &Rc<Expr>, assumptions: &Assumptions) -> Option<Rc<Expr>> {
    let (name, arg, base) = log_parts(expr)?;
    let (left, right) = as_binary(arg, BinaryOp::Div)?;
    if !assumptions.holds(left, Assumption::Positive)
        || !assumptions.holds(right, Assumption::Positive)
    {
        return None;
    }
    Some(Expr::sub(
        make_log(name, left.clone(), base.cloned()),
        make_log(name, right.clone(), base.cloned()),
    ))
}

/// `log(a^b)`: positive `a` (or an even integer exponent) allows pulling
/// the exponent out in front; otherwise the base is wrapped in `|...|`.
fn apply_log_power(expr: &Rc<Expr>, assumptions: &Assumptions) -> Option<Rc<Expr>> {
    let (name, arg, base) = log_parts(expr)?;
    let (pow_base, exponent) = as_binary(arg, BinaryOp::Pow)?;
    let positive = assumptions.holds(pow_base, Assumption::Positive);
    let even_power = exponent
        .as_integer()
        .is_some_and(|n| n % 2 == 0);
    if positive {
        return Some(Expr::mul(
            exponent.clone(),
            make_log(name, pow_base.clone(), base.cloned()),
        ));
    }
    if even_power || assumptions.holds(pow_base, Assumption::Negative) {
        return Some(Expr::mul(
            exponent.clone(),
            make_log(name, Rc::new(Expr::Abs(pow_base.clone())), base.cloned()),
        ));
    }
    None
}

pub fn rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "log-one",
            category: RuleCategory::Identity,
            priority: 90,
            description: "the log of one is zero",
            matches: matches_log,
            apply: apply_log_one,
        },
        Rule {
            name: "ln-e",
            category: RuleCategory::Identity,
            priority: 90,
            description: "the natural log of e is one",
            matches: matches_log,
            apply: apply_ln_e,
        },
        Rule {
            name: "log-base-self",
            category: RuleCategory::Identity,
            priority: 88,
            description: "a log of its own base is one",
            matches: matches_log,
            apply: apply_log_base_self,
        },
        Rule {
            name: "ln-exp",
            category: RuleCategory::Simplification,
            priority: 82,
            description: "ln undoes the exponential",
            matches: matches_log,
            apply: apply_ln_exp,
        },
        Rule {
            name: "exp-ln",
            category: RuleCategory::Simplification,
            priority: 82,
            description: "the exponential undoes ln",
            matches: matches_pow,
            apply: apply_exp_ln,
        },
        Rule {
            name: "log-product",
            category: RuleCategory::Expansion,
            priority: 70,
            description: "the log of a product splits into a sum",
            matches: matches_log,
            apply: apply_log_product,
        },
        Rule {
            name: "log-quotient",
            category: RuleCategory::Expansion,
            priority: 70,
            description: "the log of a quotient splits into a difference",
            matches: matches_log,
            apply: apply_log_quotient,
        },
        Rule {
            name: "log-power",
            category: RuleCategory::Expansion,
            priority: 72,
            description: "the log of a power pulls the exponent out front",
            matches: matches_log,
            apply: apply_log_power,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::engine::RewriteEngine;

    fn engine() -> RewriteEngine {
        RewriteEngine::new(rules())
    }

    #[test]
    fn test_log_one_and_ln_e() {
        let expr = Expr::call1("ln", Expr::number(1.0));
        assert_eq!(engine().run(&expr, &Assumptions::new(), None), Expr::number(0.0));

        let expr = Expr::call1("ln", Expr::variable("e"));
        assert_eq!(engine().run(&expr, &Assumptions::new(), None), Expr::number(1.0));
    }

    #[test]
    fn test_ln_exp_inversion() {
        let x = Expr::variable("x");
        let expr = Expr::call1("ln", Expr::pow(Expr::variable("e"), x.clone()));
        assert_eq!(engine().run(&expr, &Assumptions::new(), None), x);

        let expr = Expr::pow(Expr::variable("e"), Expr::call1("ln", x.clone()));
        assert_eq!(engine().run(&expr, &Assumptions::new(), None), x);
    }

    #[test]
    fn test_log_product_needs_positivity() {
        let a = Expr::variable("a");
        let b = Expr::variable("b");
        let expr = Expr::call1("ln", Expr::mul(a.clone(), b.clone()));

        // Without assumptions the law does not fire
        assert_eq!(engine().run(&expr, &Assumptions::new(), None), expr);

        let mut assumptions = Assumptions::new();
        assumptions.assume("a", Assumption::Positive);
        assumptions.assume("b", Assumption::Positive);
        let expected = Expr::add(Expr::call1("ln", a), Expr::call1("ln", b));
        assert_eq!(engine().run(&expr, &assumptions, None), expected);
    }

    #[test]
    fn test_log_power_positive_base() {
        let a = Expr::variable("a");
        let expr = Expr::call1("ln", Expr::pow(a.clone(), Expr::number(3.0)));

        let mut assumptions = Assumptions::new();
        assumptions.assume("a", Assumption::Positive);
        let expected = Expr::mul(Expr::number(3.0), Expr::call1("ln", a));
        assert_eq!(engine().run(&expr, &assumptions, None), expected);
    }

    #[test]
    fn test_log_even_power_uses_absolute_value() {
        let a = Expr::variable("a");
        let expr = Expr::call1("ln", Expr::pow(a.clone(), Expr::number(2.0)));
        let expected = Expr::mul(
            Expr::number(2.0),
            Expr::call1("ln", Rc::new(Expr::Abs(a))),
        );
        assert_eq!(engine().run(&expr, &Assumptions::new(), None), expected);
    }
}
