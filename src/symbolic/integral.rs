// ABOUTME: Rule-based indefinite integration with an unresolved-node fallback

use crate::ast::{BinaryOp, Expr};
use std::rc::Rc;

/// Indefinite integral of `expr` with respect to `var`. Expressions the
/// rule table cannot handle come back as an unresolved `Integral` node.
pub fn integrate(expr: &Rc<Expr>, var: &str) -> Rc<Expr> {
    match antiderivative(expr, var) {
        Some(result) => super::simplify(&result),
        None => Rc::new(Expr::Integral {
            lower: None,
            upper: None,
            body: expr.clone(),
            var: var.to_string(),
            closed: false,
        }),
    }
}

fn is_constant_in(expr: &Expr, var: &str) -> bool {
    !expr.free_variable_set().contains(var)
}

fn antiderivative(expr: &Rc<Expr>, var: &str) -> Option<Rc<Expr>> {
    let x = || Expr::variable(var);

    // Constant rule: c dx = c x
    if is_constant_in(expr, var) {
        return Some(Expr::mul(expr.clone(), x()));
    }

    match &**expr {
        Expr::Variable(name) if name == var => Some(Expr::div(
            Expr::pow(x(), Expr::number(2.0)),
            Expr::number(2.0),
        )),
        Expr::Negate(inner) => Some(Expr::neg(antiderivative(inner, var)?)),
        Expr::Binary { op, left, right } => match op {
            BinaryOp::Add => Some(Expr::add(
                antiderivative(left, var)?,
                antiderivative(right, var)?,
            )),
            BinaryOp::Sub => Some(Expr::sub(
                antiderivative(left, var)?,
                antiderivative(right, var)?,
            )),
            BinaryOp::Mul => {
                // Constant-multiple rule
                if is_constant_in(left, var) {
                    return Some(Expr::mul(left.clone(), antiderivative(right, var)?));
                }
                if is_constant_in(right, var) {
                    return Some(Expr::mul(right.clone(), antiderivative(left, var)?));
                }
                None
            }
            BinaryOp::Div => {
                // c / x = c ln|x|
                if is_constant_in(left, var)
                    && matches!(&**right, Expr::Variable(name) if name == var)
                {
                    return Some(Expr::mul(
                        left.clone(),
                        Expr::call1("ln", Rc::new(Expr::Abs(x()))),
                    ));
                }
                // f / c = (1/c) f
                if is_constant_in(right, var) {
                    return Some(Expr::div(antiderivative(left, var)?, right.clone()));
                }
                None
            }
            BinaryOp::Pow => {
                // Power rule for x^n, n != -1
                let Expr::Variable(name) = &**left else {
                    return None;
                };
                if name != var || !is_constant_in(right, var) {
                    return None;
                }
                if right.as_number() == Some(-1.0) {
                    return Some(Expr::call1("ln", Rc::new(Expr::Abs(x()))));
                }
                let next = Expr::add(right.clone(), Expr::number(1.0));
                Some(Expr::div(Expr::pow(x(), next.clone()), next))
            }
        },
        Expr::Call { name, args, .. } if args.len() == 1 => {
            // Table entries for a bare variable argument
            if !matches!(&*args[0], Expr::Variable(n) if n == var) {
                return None;
            }
            match name.as_str() {
                "sin" => Some(Expr::neg(Expr::call1("cos", x()))),
                "cos" => Some(Expr::call1("sin", x())),
                "exp" => Some(Expr::call1("exp", x())),
                // x ln x - x
                "ln" => Some(Expr::sub(
                    Expr::mul(x(), Expr::call1("ln", x())),
                    x(),
                )),
                "sqrt" => Some(Expr::div(
                    Expr::mul(
                        Expr::number(2.0),
                        Expr::pow(x(), Expr::div(Expr::number(3.0), Expr::number(2.0))),
                    ),
                    Expr::number(3.0),
                )),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_rule() {
        // x^2 integrates to x^3 / 3
        let x = Expr::variable("x");
        let expr = Expr::pow(x.clone(), Expr::number(2.0));
        let result = integrate(&expr, "x");
        let expected = super::super::simplify(&Expr::div(
            Expr::pow(x, Expr::number(3.0)),
            Expr::number(3.0),
        ));
        assert_eq!(result, expected);
    }

    #[test]
    fn test_reciprocal_gives_log() {
        let x = Expr::variable("x");
        let expr = Expr::pow(x.clone(), Expr::number(-1.0));
        let result = integrate(&expr, "x");
        assert_eq!(result, Expr::call1("ln", Rc::new(Expr::Abs(x))));
    }

    #[test]
    fn test_linearity() {
        // 3x + 1 integrates to (3/2) x^2 + x
        let x = Expr::variable("x");
        let expr = Expr::add(
            Expr::mul(Expr::number(3.0), x.clone()),
            Expr::number(1.0),
        );
        let result = integrate(&expr, "x");

        // Validate by differentiating back
        let back = super::super::derivative::differentiate(&result, "x").unwrap();
        let original = super::super::simplify(&expr);
        assert_eq!(back, original);
    }

    #[test]
    fn test_trig_table() {
        let x = Expr::variable("x");
        let result = integrate(&Expr::call1("sin", x.clone()), "x");
        assert_eq!(result, Expr::neg(Expr::call1("cos", x)));
    }

    #[test]
    fn test_constant() {
        // 5 dx = 5x
        let result = integrate(&Expr::number(5.0), "x");
        let expected = super::super::simplify(&Expr::mul(
            Expr::number(5.0),
            Expr::variable("x"),
        ));
        assert_eq!(result, expected);
    }

    #[test]
    fn test_unresolved_fallback() {
        // sin(x^2) has no entry: stays an integral node
        let x = Expr::variable("x");
        let expr = Expr::call1("sin", Expr::pow(x, Expr::number(2.0)));
        let result = integrate(&expr, "x");
        match &*result {
            Expr::Integral {
                lower, upper, var, ..
            } => {
                assert!(lower.is_none());
                assert!(upper.is_none());
                assert_eq!(var, "x");
            }
            other => panic!("expected unresolved integral, got {other:?}"),
        }
    }
}
