// ABOUTME: Symbolic differentiation: a dedicated visitor with a
// per-function derivative table, simplified on the way out

use crate::ast::{BinaryOp, Case, Expr};
use crate::error::TexprError;
use std::rc::Rc;

/// Differentiate once and simplify the result.
pub fn differentiate(expr: &Rc<Expr>, var: &str) -> Result<Rc<Expr>, TexprError> {
    differentiate_with(expr, var, &super::Assumptions::default(), None)
}

/// Differentiation with assumptions and a step tracer threaded through
/// the closing simplify pass.
pub fn differentiate_with(
    expr: &Rc<Expr>,
    var: &str,
    assumptions: &super::Assumptions,
    tracer: Option<&mut super::StepTracer>,
) -> Result<Rc<Expr>, TexprError> {
    let raw = d(expr, var)?;
    Ok(super::simplify_with(&raw, assumptions, tracer))
}

/// Higher-order differentiation by repeated application.
pub fn differentiate_n(expr: &Rc<Expr>, var: &str, order: u32) -> Result<Rc<Expr>, TexprError> {
    let mut current = expr.clone();
    for _ in 0..order {
        current = differentiate(&current, var)?;
    }
    Ok(current)
}

fn contains_var(expr: &Expr, var: &str) -> bool {
    expr.free_variable_set().contains(var)
}

fn d(expr: &Rc<Expr>, var: &str) -> Result<Rc<Expr>, TexprError> {
    match &**expr {
        Expr::Number(_) => Ok(Expr::number(0.0)),
        // Unrelated symbols are treated as constants
        Expr::Variable(name) => Ok(Expr::number(if name == var { 1.0 } else { 0.0 })),
        Expr::Negate(inner) => Ok(Expr::neg(d(inner, var)?)),
        Expr::Binary { op, left, right } => match op {
            BinaryOp::Add => Ok(Expr::add(d(left, var)?, d(right, var)?)),
            BinaryOp::Sub => Ok(Expr::sub(d(left, var)?, d(right, var)?)),
            BinaryOp::Mul => {
                // Product rule: u'v + uv'
                let du = d(left, var)?;
                let dv = d(right, var)?;
                Ok(Expr::add(
                    Expr::mul(du, right.clone()),
                    Expr::mul(left.clone(), dv),
                ))
            }
            BinaryOp::Div => {
                // Quotient rule: (u'v - uv') / v^2
                let du = d(left, var)?;
                let dv = d(right, var)?;
                Ok(Expr::div(
                    Expr::sub(
                        Expr::mul(du, right.clone()),
                        Expr::mul(left.clone(), dv),
                    ),
                    Expr::pow(right.clone(), Expr::number(2.0)),
                ))
            }
            BinaryOp::Pow => d_power(left, right, var),
        },
        Expr::Call { .. } => d_call(expr, var),
        Expr::Abs(inner) => {
            // d|u| = sign(u) u'
            let du = d(inner, var)?;
            Ok(Expr::mul(Expr::call1("sign", inner.clone()), du))
        }
        Expr::Sum {
            var: index,
            start,
            end,
            body,
        } => {
            // Differentiation passes into the summand
            if index == var {
                return Ok(Expr::number(0.0));
            }
            Ok(Rc::new(Expr::Sum {
                var: index.clone(),
                start: start.clone(),
                end: end.clone(),
                body: d(body, var)?,
            }))
        }
        Expr::Piecewise { cases } => {
            let mut derived = Vec::with_capacity(cases.len());
            for case in cases {
                derived.push(Case {
                    value: d(&case.value, var)?,
                    condition: case.condition.clone(),
                });
            }
            Ok(Rc::new(Expr::Piecewise { cases: derived }))
        }
        Expr::Conditional { body, condition } => Ok(Rc::new(Expr::Conditional {
            body: d(body, var)?,
            condition: condition.clone(),
        })),
        Expr::Derivative {
            body,
            var: inner_var,
            order,
        } => {
            let inner = differentiate_n(body, inner_var, *order)?;
            d(&inner, var)
        }
        other => Err(TexprError::evaluator(format!(
            "cannot differentiate this expression: {}",
            other.to_latex()
        ))),
    }
}

/// Power rule with the general exponential fallback:
/// constant exponent n gives n u^(n-1) u', constant base gives
/// a^v ln(a) v', and u^v in general gives u^v (v' ln u + v u'/u).
fn d_power(base: &Rc<Expr>, exponent: &Rc<Expr>, var: &str) -> Result<Rc<Expr>, TexprError> {
    let base_varies = contains_var(base, var);
    let exp_varies = contains_var(exponent, var);

    if !base_varies && !exp_varies {
        return Ok(Expr::number(0.0));
    }

    if !exp_varies {
        let du = d(base, var)?;
        let reduced = Expr::pow(
            base.clone(),
            Expr::sub(exponent.clone(), Expr::number(1.0)),
        );
        return Ok(Expr::mul(Expr::mul(exponent.clone(), reduced), du));
    }

    if !base_varies {
        let dv = d(exponent, var)?;
        return Ok(Expr::mul(
            Expr::mul(
                Expr::pow(base.clone(), exponent.clone()),
                Expr::call1("ln", base.clone()),
            ),
            dv,
        ));
    }

    // u^v (v' ln u + v u'/u)
    let du = d(base, var)?;
    let dv = d(exponent, var)?;
    Ok(Expr::mul(
        Expr::pow(base.clone(), exponent.clone()),
        Expr::add(
            Expr::mul(dv, Expr::call1("ln", base.clone())),
            Expr::mul(exponent.clone(), Expr::div(du, base.clone())),
        ),
    ))
}

fn d_call(expr: &Rc<Expr>, var: &str) -> Result<Rc<Expr>, TexprError> {
    let Expr::Call {
        name,
        args,
        base,
        param,
    } = &**expr
    else {
        return Err(TexprError::evaluator("internal: not a call node"));
    };
    if args.len() != 1 {
        return Err(TexprError::evaluator(format!(
            "cannot differentiate {name} with {} arguments",
            args.len()
        )));
    }
    let u = &args[0];
    if !contains_var(u, var) {
        return Ok(Expr::number(0.0));
    }
    let du = d(u, var)?;

    let outer: Rc<Expr> = match name.as_str() {
        "sin" => Expr::call1("cos", u.clone()),
        "cos" => Expr::neg(Expr::call1("sin", u.clone())),
        // sec^2 u
        "tan" => Expr::pow(Expr::call1("sec", u.clone()), Expr::number(2.0)),
        "cot" => Expr::neg(Expr::pow(Expr::call1("csc", u.clone()), Expr::number(2.0))),
        "sec" => Expr::mul(
            Expr::call1("sec", u.clone()),
            Expr::call1("tan", u.clone()),
        ),
        "csc" => Expr::neg(Expr::mul(
            Expr::call1("csc", u.clone()),
            Expr::call1("cot", u.clone()),
        )),
        "arcsin" | "asin" => Expr::div(
            Expr::number(1.0),
            Expr::call1(
                "sqrt",
                Expr::sub(Expr::number(1.0), Expr::pow(u.clone(), Expr::number(2.0))),
            ),
        ),
        "arccos" | "acos" => Expr::neg(Expr::div(
            Expr::number(1.0),
            Expr::call1(
                "sqrt",
                Expr::sub(Expr::number(1.0), Expr::pow(u.clone(), Expr::number(2.0))),
            ),
        )),
        "arctan" | "atan" => Expr::div(
            Expr::number(1.0),
            Expr::add(Expr::number(1.0), Expr::pow(u.clone(), Expr::number(2.0))),
        ),
        "sinh" => Expr::call1("cosh", u.clone()),
        "cosh" => Expr::call1("sinh", u.clone()),
        "tanh" => Expr::div(
            Expr::number(1.0),
            Expr::pow(Expr::call1("cosh", u.clone()), Expr::number(2.0)),
        ),
        "exp" => Expr::call1("exp", u.clone()),
        "ln" => Expr::div(Expr::number(1.0), u.clone()),
        "log" => {
            let log_base = match base {
                Some(b) => b.clone(),
                None => Expr::number(10.0),
            };
            Expr::div(
                Expr::number(1.0),
                Expr::mul(u.clone(), Expr::call1("ln", log_base)),
            )
        }
        "sqrt" => match param {
            // nth root: u^(1/n) differentiates through the power rule
            Some(index) => {
                let exponent = Expr::div(Expr::number(1.0), index.clone());
                return d(&Expr::pow(u.clone(), exponent), var);
            }
            None => Expr::div(
                Expr::number(1.0),
                Expr::mul(Expr::number(2.0), Expr::call1("sqrt", u.clone())),
            ),
        },
        "abs" => Expr::call1("sign", u.clone()),
        // Decorations are transparent to differentiation
        "dot" | "ddot" | "bar" | "hat" | "vec" => {
            return Ok(du);
        }
        other => {
            return Err(TexprError::evaluator(format!(
                "no derivative rule for function {other}"
            )))
        }
    };

    Ok(Expr::mul(outer, du))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use crate::eval::evaluate;
    use crate::value::Value;

    fn deriv_at(expr: &Rc<Expr>, var: &str, x: f64) -> f64 {
        let derived = differentiate(expr, var).unwrap();
        let env = Environment::new();
        env.define(var, Value::Number(x));
        evaluate(&derived, &env).unwrap().as_number().unwrap()
    }

    #[test]
    fn test_power_rule() {
        let x = Expr::variable("x");
        let cube = Expr::pow(x.clone(), Expr::number(3.0));
        let derived = differentiate(&cube, "x").unwrap();
        // 3 x^2
        let expected = Expr::mul(Expr::number(3.0), Expr::pow(x, Expr::number(2.0)));
        assert_eq!(derived, expected);
        assert!((deriv_at(&cube, "x", 3.0) - 27.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_and_unrelated_symbol() {
        let derived = differentiate(&Expr::number(5.0), "x").unwrap();
        assert_eq!(derived, Expr::number(0.0));

        let derived = differentiate(&Expr::variable("y"), "x").unwrap();
        assert_eq!(derived, Expr::number(0.0));
    }

    #[test]
    fn test_product_rule() {
        // d(x sin x) = sin x + x cos x
        let x = Expr::variable("x");
        let expr = Expr::mul(x.clone(), Expr::call1("sin", x.clone()));
        let value = deriv_at(&expr, "x", 1.0);
        let expected = 1.0f64.sin() + 1.0 * 1.0f64.cos();
        assert!((value - expected).abs() < 1e-9);
    }

    #[test]
    fn test_quotient_rule() {
        // d(1/x) = -1/x^2
        let expr = Expr::div(Expr::number(1.0), Expr::variable("x"));
        let value = deriv_at(&expr, "x", 2.0);
        assert!((value + 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_chain_rule() {
        // d sin(x^2) = 2x cos(x^2)
        let x = Expr::variable("x");
        let expr = Expr::call1("sin", Expr::pow(x, Expr::number(2.0)));
        let value = deriv_at(&expr, "x", 1.5);
        let expected = 2.0 * 1.5 * (1.5f64 * 1.5).cos();
        assert!((value - expected).abs() < 1e-9);
    }

    #[test]
    fn test_exponential_and_log() {
        let x = Expr::variable("x");
        let expr = Expr::call1("exp", x.clone());
        let value = deriv_at(&expr, "x", 2.0);
        assert!((value - 2.0f64.exp()).abs() < 1e-9);

        let expr = Expr::call1("ln", x.clone());
        let value = deriv_at(&expr, "x", 4.0);
        assert!((value - 0.25).abs() < 1e-9);

        // a^x: d = a^x ln a
        let expr = Expr::pow(Expr::number(2.0), x);
        let value = deriv_at(&expr, "x", 3.0);
        let expected = 8.0 * 2.0f64.ln();
        assert!((value - expected).abs() < 1e-9);
    }

    #[test]
    fn test_higher_order() {
        // d^2(x^3) = 6x
        let x = Expr::variable("x");
        let cube = Expr::pow(x.clone(), Expr::number(3.0));
        let second = differentiate_n(&cube, "x", 2).unwrap();
        assert_eq!(second, Expr::mul(Expr::number(6.0), x));
    }

    #[test]
    fn test_piecewise_differentiates_per_case() {
        let x = Expr::variable("x");
        let piecewise = Rc::new(Expr::Piecewise {
            cases: vec![
                Case {
                    value: Expr::pow(x.clone(), Expr::number(2.0)),
                    condition: Some(Rc::new(Expr::Comparison {
                        op: crate::ast::ComparisonOp::Greater,
                        left: x.clone(),
                        right: Expr::number(0.0),
                    })),
                },
                Case {
                    value: Expr::neg(x.clone()),
                    condition: None,
                },
            ],
        });
        let derived = differentiate(&piecewise, "x").unwrap();
        match &*derived {
            Expr::Piecewise { cases } => {
                assert_eq!(cases.len(), 2);
                assert!(cases[0].condition.is_some());
            }
            other => panic!("expected piecewise, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_function_errors() {
        let expr = Expr::call1("factorial", Expr::variable("x"));
        assert!(differentiate(&expr, "x").is_err());
    }

    #[test]
    fn test_result_is_simplified() {
        // d(x^2) should come out as 2x, not 2 * x^1 * 1
        let x = Expr::variable("x");
        let expr = Expr::pow(x.clone(), Expr::number(2.0));
        let derived = differentiate(&expr, "x").unwrap();
        assert_eq!(derived, Expr::mul(Expr::number(2.0), x));
    }
}
