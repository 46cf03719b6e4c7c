//! Arithmetic identities and constant folding.

use super::as_binary;
use crate::ast::{BinaryOp, Expr};
use crate::symbolic::engine::{Assumption, Assumptions, Rule, RuleCategory};
use std::rc::Rc;

fn matches_binary(expr: &Expr) -> bool {
    matches!(expr, Expr::Binary { .. })
}

fn matches_negate(expr: &Expr) -> bool {
    matches!(expr, Expr::Negate(_))
}

fn apply_constant_fold(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let Expr::Binary { op, left, right } = &**expr else {
        return None;
    };
    let (Expr::Number(a), Expr::Number(b)) = (&**left, &**right) else {
        return None;
    };
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if *b == 0.0 {
                return None;
            }
            a / b
        }
        BinaryOp::Pow => {
            // Negative base with fractional exponent leaves the reals;
            // the evaluator owns that case
            if *a < 0.0 && b.fract() != 0.0 {
                return None;
            }
            a.powf(*b)
        }
    };
    if !value.is_finite() {
        return None;
    }
    Some(Expr::number(value))
}

fn apply_add_zero(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Add)?;
    if left.is_zero() {
        return Some(right.clone());
    }
    if right.is_zero() {
        return Some(left.clone());
    }
    None
}

fn apply_sub_zero(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Sub)?;
    if right.is_zero() {
        return Some(left.clone());
    }
    if left.is_zero() {
        return Some(Expr::neg(right.clone()));
    }
    None
}

fn apply_mul_one(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Mul)?;
    if left.is_one() {
        return Some(right.clone());
    }
    if right.is_one() {
        return Some(left.clone());
    }
    None
}

fn apply_mul_zero(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Mul)?;
    if left.is_zero() || right.is_zero() {
        return Some(Expr::number(0.0));
    }
    None
}

fn apply_div_one(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Div)?;
    if right.is_one() {
        return Some(left.clone());
    }
    None
}

fn apply_zero_div(expr: &Rc<Expr>, assumptions: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Div)?;
    if left.is_zero() && assumptions.holds(right, Assumption::Nonzero) {
        return Some(Expr::number(0.0));
    }
    None
}

/// Division by a numeric constant becomes multiplication by its
/// reciprocal, which lets the normalizer fold it into the constant run.
fn apply_div_constant(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Div)?;
    let Expr::Number(c) = &**right else {
        return None;
    };
    if *c == 0.0 || matches!(&**left, Expr::Number(_)) {
        return None;
    }
    Some(Expr::mul(Expr::number(1.0 / c), left.clone()))
}

// The normalizer rebuilds chains right-associatively with equal terms
// adjacent, so the like-operand rules match both the bare pair and the
// head of a longer chain.

fn apply_add_self(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Add)?;
    if left == right {
        return Some(Expr::mul(Expr::number(2.0), left.clone()));
    }
    if let Some((head, rest)) = as_binary(right, BinaryOp::Add) {
        if head == left {
            return Some(Expr::add(
                Expr::mul(Expr::number(2.0), left.clone()),
                rest.clone(),
            ));
        }
    }
    None
}

/// `x + (-x)` cancels, in both orders and inside a chain.
fn apply_add_opposite(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Add)?;
    let opposite = |a: &Rc<Expr>, b: &Rc<Expr>| -> bool {
        matches!(&**b, Expr::Negate(inner) if inner == a)
            || matches!(&**a, Expr::Negate(inner) if inner == b)
    };
    if opposite(left, right) {
        return Some(Expr::number(0.0));
    }
    if let Some((head, rest)) = as_binary(right, BinaryOp::Add) {
        if opposite(left, head) {
            return Some(rest.clone());
        }
    }
    None
}

fn apply_sub_self(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Sub)?;
    if left == right {
        return Some(Expr::number(0.0));
    }
    None
}

fn apply_div_self(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Div)?;
    if left == right && !left.is_zero() {
        return Some(Expr::number(1.0));
    }
    None
}

fn apply_mul_self(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Mul)?;
    if left == right {
        return Some(Expr::pow(left.clone(), Expr::number(2.0)));
    }
    if let Some((head, rest)) = as_binary(right, BinaryOp::Mul) {
        if head == left {
            return Some(Expr::mul(
                Expr::pow(left.clone(), Expr::number(2.0)),
                rest.clone(),
            ));
        }
    }
    None
}

fn apply_neg_one_mul(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let (left, right) = as_binary(expr, BinaryOp::Mul)?;
    if left.as_number() == Some(-1.0) {
        return Some(Expr::neg(right.clone()));
    }
    if right.as_number() == Some(-1.0) {
        return Some(Expr::neg(left.clone()));
    }
    None
}

fn apply_negate_fold(expr: &Rc<Expr>, _: &Assumptions) -> Option<Rc<Expr>> {
    let Expr::Negate(inner) = &**expr else {
        return None;
    };
    match &**inner {
        Expr::Number(n) => Some(Expr::number(-n)),
        Expr::Negate(original) => Some(original.clone()),
        _ => None,
    }
}

pub fn rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "constant-fold",
            category: RuleCategory::Simplification,
            priority: 100,
            description: "fold an operation on two numbers",
            matches: matches_binary,
            apply: apply_constant_fold,
        },
        Rule {
            name: "add-zero",
            category: RuleCategory::Identity,
            priority: 90,
            description: "adding zero changes nothing",
            matches: matches_binary,
            apply: apply_add_zero,
        },
        Rule {
            name: "sub-zero",
            category: RuleCategory::Identity,
            priority: 90,
            description: "subtracting zero changes nothing",
            matches: matches_binary,
            apply: apply_sub_zero,
        },
        Rule {
            name: "mul-one",
            category: RuleCategory::Identity,
            priority: 90,
            description: "multiplying by one changes nothing",
            matches: matches_binary,
            apply: apply_mul_one,
        },
        Rule {
            name: "mul-zero",
            category: RuleCategory::Identity,
            priority: 95,
            description: "multiplying by zero gives zero",
            matches: matches_binary,
            apply: apply_mul_zero,
        },
        Rule {
            name: "div-one",
            category: RuleCategory::Identity,
            priority: 90,
            description: "dividing by one changes nothing",
            matches: matches_binary,
            apply: apply_div_one,
        },
        Rule {
            name: "zero-div",
            category: RuleCategory::Identity,
            priority: 88,
            description: "zero divided by a non-zero value is zero",
            matches: matches_binary,
            apply: apply_zero_div,
        },
        Rule {
            name: "div-constant",
            category: RuleCategory::Normalization,
            priority: 84,
            description: "dividing by a constant multiplies by its reciprocal",
            matches: matches_binary,
            apply: apply_div_constant,
        },
        Rule {
            name: "add-self",
            category: RuleCategory::Simplification,
            priority: 80,
            description: "x + x becomes 2x",
            matches: matches_binary,
            apply: apply_add_self,
        },
        Rule {
            name: "add-opposite",
            category: RuleCategory::Simplification,
            priority: 81,
            description: "a term and its negation cancel",
            matches: matches_binary,
            apply: apply_add_opposite,
        },
        Rule {
            name: "sub-self",
            category: RuleCategory::Simplification,
            priority: 80,
            description: "x - x becomes 0",
            matches: matches_binary,
            apply: apply_sub_self,
        },
        Rule {
            name: "div-self",
            category: RuleCategory::Simplification,
            priority: 80,
            description: "x / x becomes 1",
            matches: matches_binary,
            apply: apply_div_self,
        },
        Rule {
            name: "mul-self",
            category: RuleCategory::Simplification,
            priority: 80,
            description: "x * x becomes x^2",
            matches: matches_binary,
            apply: apply_mul_self,
        },
        Rule {
            name: "neg-one-mul",
            category: RuleCategory::Normalization,
            priority: 85,
            description: "a factor of -1 becomes a negation",
            matches: matches_binary,
            apply: apply_neg_one_mul,
        },
        Rule {
            name: "negate-fold",
            category: RuleCategory::Normalization,
            priority: 85,
            description: "fold a negation into the operand",
            matches: matches_negate,
            apply: apply_negate_fold,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::engine::RewriteEngine;

    fn simplify(expr: &Rc<Expr>) -> Rc<Expr> {
        RewriteEngine::new(rules()).run(expr, &Assumptions::new(), None)
    }

    #[test]
    fn test_constant_folding() {
        let expr = Expr::add(Expr::number(2.0), Expr::number(3.0));
        assert_eq!(simplify(&expr), Expr::number(5.0));
    }

    #[test]
    fn test_like_operand_collapses() {
        let x = Expr::variable("x");
        assert_eq!(
            simplify(&Expr::add(x.clone(), x.clone())),
            Expr::mul(Expr::number(2.0), x.clone())
        );
        assert_eq!(simplify(&Expr::sub(x.clone(), x.clone())), Expr::number(0.0));
        assert_eq!(simplify(&Expr::div(x.clone(), x.clone())), Expr::number(1.0));
        assert_eq!(
            simplify(&Expr::mul(x.clone(), x.clone())),
            Expr::pow(x, Expr::number(2.0))
        );
    }

    #[test]
    fn test_identities() {
        let x = Expr::variable("x");
        assert_eq!(simplify(&Expr::add(x.clone(), Expr::number(0.0))), x);
        assert_eq!(simplify(&Expr::mul(Expr::number(1.0), x.clone())), x);
        assert_eq!(
            simplify(&Expr::mul(x.clone(), Expr::number(0.0))),
            Expr::number(0.0)
        );
        assert_eq!(simplify(&Expr::div(x.clone(), Expr::number(1.0))), x);
    }

    #[test]
    fn test_negative_one_factor() {
        let x = Expr::variable("x");
        assert_eq!(
            simplify(&Expr::mul(Expr::number(-1.0), x.clone())),
            Expr::neg(x)
        );
    }

    #[test]
    fn test_double_negation() {
        let x = Expr::variable("x");
        assert_eq!(simplify(&Expr::neg(Expr::neg(x.clone()))), x);
    }

    #[test]
    fn test_division_by_zero_left_alone() {
        let expr = Expr::div(Expr::number(1.0), Expr::number(0.0));
        assert_eq!(simplify(&expr), expr);
    }

    #[test]
    fn test_zero_div_requires_nonzero() {
        let expr = Expr::div(Expr::number(0.0), Expr::variable("x"));
        // No assumption: left alone
        assert_eq!(simplify(&expr), expr);

        let mut assumptions = Assumptions::new();
        assumptions.assume("x", Assumption::Nonzero);
        let result = RewriteEngine::new(rules()).run(&expr, &assumptions, None);
        assert_eq!(result, Expr::number(0.0));
    }
}
