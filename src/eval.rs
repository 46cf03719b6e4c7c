// ABOUTME: Evaluator visitor turning expressions plus an environment into
// tagged values, with dispatch into the function registry and calculus

use crate::ast::{BinaryOp, BoolOp, ComparisonOp, Expr};
use crate::calculus;
use crate::commands;
use crate::complex::Complex;
use crate::env::Environment;
use crate::error::TexprError;
use crate::extensions::ExtensionRegistry;
use crate::functions::{self, Invocation};
use crate::matrix::{Matrix, Vector};
use crate::value::{Closure, Value};
use std::rc::Rc;

/// Equality tolerance for value comparisons.
const COMPARISON_EPSILON: f64 = 1e-9;

/// How far an expression can still be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluability {
    /// Fully evaluable to a tagged value.
    Numeric,
    /// Meaningful only as an AST, e.g. the gradient of a bare symbol.
    Symbolic,
    /// Free variables are missing from the environment.
    Unevaluable,
}

pub fn evaluate(expr: &Rc<Expr>, env: &Rc<Environment>) -> Result<Value, TexprError> {
    evaluate_in(expr, env, None)
}

pub fn evaluate_in(
    expr: &Rc<Expr>,
    env: &Rc<Environment>,
    extensions: Option<&ExtensionRegistry>,
) -> Result<Value, TexprError> {
    match &**expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Variable(name) => lookup_variable(name, env, extensions, expr),
        Expr::Binary { op, left, right } => {
            let lhs = evaluate_in(left, env, extensions)?;
            let rhs = evaluate_in(right, env, extensions)?;
            apply_binary(*op, lhs, rhs)
        }
        Expr::Negate(inner) => negate(evaluate_in(inner, env, extensions)?),
        Expr::Call { .. } => evaluate_call(expr, env, extensions),
        Expr::Abs(inner) => {
            let value = evaluate_in(inner, env, extensions)?;
            match value {
                Value::Number(n) => Ok(Value::Number(n.abs())),
                Value::Complex(z) => Ok(Value::Number(z.modulus())),
                Value::Vector(v) => Ok(Value::Number(v.magnitude())),
                // |A| is the determinant by convention
                Value::Matrix(m) => Ok(Value::Number(m.determinant()?)),
                other => Err(TexprError::evaluator(format!(
                    "absolute value is undefined for {}",
                    other.type_name()
                ))),
            }
        }
        Expr::Limit { var, target, body } => {
            let target = evaluate_in(target, env, extensions)?.as_number()?;
            let mut sample = make_sampler(var, body, env, extensions);
            calculus::limit(target, &mut sample).map(Value::Number)
        }
        Expr::Sum {
            var,
            start,
            end,
            body,
        } => {
            let start = evaluate_in(start, env, extensions)?.as_number()?;
            let end = evaluate_in(end, env, extensions)?.as_number()?;
            let mut sample = make_sampler(var, body, env, extensions);
            calculus::series_sum(start, end, &mut sample).map(Value::Number)
        }
        Expr::Product {
            var,
            start,
            end,
            body,
        } => {
            let start = evaluate_in(start, env, extensions)?.as_number()?;
            let end = evaluate_in(end, env, extensions)?.as_number()?;
            let mut sample = make_sampler(var, body, env, extensions);
            calculus::series_product(start, end, &mut sample).map(Value::Number)
        }
        Expr::Integral {
            lower,
            upper,
            body,
            var,
            ..
        } => {
            let (Some(lower), Some(upper)) = (lower, upper) else {
                return Err(TexprError::evaluator_with_suggestion(
                    "indefinite integrals cannot be evaluated numerically",
                    "provide bounds, or use integrate() for a symbolic antiderivative",
                ));
            };
            let lower = evaluate_in(lower, env, extensions)?.as_number()?;
            let upper = evaluate_in(upper, env, extensions)?.as_number()?;
            let mut sample = make_sampler(var, body, env, extensions);
            calculus::integrate(lower, upper, &mut sample).map(Value::Number)
        }
        Expr::MultiIntegral {
            order,
            lower,
            upper,
            body,
            vars,
        } => {
            let (Some(lower), Some(upper)) = (lower, upper) else {
                return Err(TexprError::evaluator_with_suggestion(
                    "indefinite integrals cannot be evaluated numerically",
                    "provide bounds for the multiple integral",
                ));
            };
            let lower = evaluate_in(lower, env, extensions)?.as_number()?;
            let upper = evaluate_in(upper, env, extensions)?.as_number()?;
            let scope = Environment::with_parent(env.clone());
            let mut sample = |point: &[f64]| -> Result<f64, TexprError> {
                for (var, value) in vars.iter().zip(point) {
                    scope.define(var.clone(), Value::Number(*value));
                }
                evaluate_in(body, &scope, extensions)?.as_number()
            };
            calculus::integrate_multi(*order, lower, upper, &mut sample).map(Value::Number)
        }
        Expr::Derivative { body, var, order } | Expr::PartialDerivative { body, var, order } => {
            let derived = crate::symbolic::derivative::differentiate_n(body, var, *order)?;
            evaluate_in(&derived, env, extensions)
        }
        Expr::Binom { upper, lower } => {
            let n = evaluate_in(upper, env, extensions)?.as_number()?;
            let k = evaluate_in(lower, env, extensions)?.as_number()?;
            if n.fract() != 0.0 || k.fract() != 0.0 {
                return Err(TexprError::evaluator(
                    "binom: arguments must be integers",
                ));
            }
            functions::rounding::binomial(n as i64, k as i64).map(Value::Number)
        }
        Expr::Gradient { body, vars } => {
            let vars: Vec<String> = match vars {
                Some(vars) => vars.clone(),
                None => body.free_variable_set().into_iter().collect(),
            };
            if vars.is_empty() {
                return Err(TexprError::evaluator(
                    "gradient of a constant expression has no variables",
                ));
            }
            let mut components = Vec::with_capacity(vars.len());
            for var in &vars {
                let partial = crate::symbolic::derivative::differentiate(body, var)?;
                components.push(evaluate_in(&partial, env, extensions)?.as_number()?);
            }
            Ok(Value::Vector(Vector::new(components)?))
        }
        Expr::Comparison { op, left, right } => {
            evaluate_comparison(*op, left, right, env, extensions).map(Value::Boolean)
        }
        Expr::ChainedComparison { exprs, ops } => {
            for (index, op) in ops.iter().enumerate() {
                if !evaluate_comparison(*op, &exprs[index], &exprs[index + 1], env, extensions)? {
                    return Ok(Value::Boolean(false));
                }
            }
            Ok(Value::Boolean(true))
        }
        Expr::BooleanBinary { op, left, right } => {
            let lhs = evaluate_in(left, env, extensions)?.truthy()?;
            match op {
                BoolOp::And => {
                    if !lhs {
                        return Ok(Value::Boolean(false));
                    }
                    let rhs = evaluate_in(right, env, extensions)?.truthy()?;
                    Ok(Value::Boolean(rhs))
                }
                BoolOp::Or => {
                    if lhs {
                        return Ok(Value::Boolean(true));
                    }
                    let rhs = evaluate_in(right, env, extensions)?.truthy()?;
                    Ok(Value::Boolean(rhs))
                }
                BoolOp::Xor => {
                    let rhs = evaluate_in(right, env, extensions)?.truthy()?;
                    Ok(Value::Boolean(lhs != rhs))
                }
            }
        }
        Expr::Not(inner) => {
            let value = evaluate_in(inner, env, extensions)?.truthy()?;
            Ok(Value::Boolean(!value))
        }
        Expr::Conditional { body, condition } => {
            if evaluate_in(condition, env, extensions)?.truthy()? {
                evaluate_in(body, env, extensions)
            } else {
                Ok(Value::Number(f64::NAN))
            }
        }
        Expr::Piecewise { cases } => {
            for case in cases {
                let matches = match &case.condition {
                    Some(condition) => evaluate_in(condition, env, extensions)?.truthy()?,
                    None => true,
                };
                if matches {
                    return evaluate_in(&case.value, env, extensions);
                }
            }
            Ok(Value::Number(f64::NAN))
        }
        Expr::Matrix { rows } => {
            let mut data = Vec::with_capacity(rows.len());
            for row in rows {
                let mut out = Vec::with_capacity(row.len());
                for cell in row {
                    out.push(evaluate_in(cell, env, extensions)?.as_number()?);
                }
                data.push(out);
            }
            Ok(Value::Matrix(Matrix::new(data)?))
        }
        Expr::Vector { components, unit } => {
            let mut out = Vec::with_capacity(components.len());
            for component in components {
                out.push(evaluate_in(component, env, extensions)?.as_number()?);
            }
            let vector = Vector::new(out)?;
            if *unit {
                Ok(Value::Vector(vector.normalized()?))
            } else {
                Ok(Value::Vector(vector))
            }
        }
        Expr::Interval { .. } => Err(TexprError::evaluator_with_suggestion(
            "an interval is not a value by itself",
            "use it as the right side of \\in",
        )),
        Expr::Assignment { name, value } => {
            let value = evaluate_in(value, env, extensions)?;
            env.define(name.clone(), value.clone());
            Ok(value)
        }
        Expr::FunctionDef { name, params, body } => {
            let closure = Closure {
                params: params.clone(),
                body: body.clone(),
            };
            let value = Value::Function(closure);
            env.define(name.clone(), value.clone());
            Ok(value)
        }
    }
}

// ============================================================================
// Variables and constants
// ============================================================================

fn constant_value(name: &str) -> Option<Value> {
    match name {
        "pi" => Some(Value::Number(std::f64::consts::PI)),
        "tau" => Some(Value::Number(std::f64::consts::TAU)),
        // Golden ratio
        "phi" => Some(Value::Number((1.0 + 5.0f64.sqrt()) / 2.0)),
        "e" => Some(Value::Number(std::f64::consts::E)),
        "i" => Some(Value::Complex(Complex::i())),
        _ => None,
    }
}

pub fn is_constant(name: &str) -> bool {
    constant_value(name).is_some()
}

fn lookup_variable(
    name: &str,
    env: &Rc<Environment>,
    extensions: Option<&ExtensionRegistry>,
    expr: &Rc<Expr>,
) -> Result<Value, TexprError> {
    if let Some(value) = env.get(name) {
        return Ok(value);
    }
    if let Some(value) = constant_value(name) {
        return Ok(value);
    }
    if let Some(registry) = extensions {
        if let Some(result) = registry.dispatch(expr, env) {
            return result;
        }
    }
    Err(TexprError::evaluator(format!("undefined variable: {name}")))
}

// ============================================================================
// Function calls
// ============================================================================

fn evaluate_call(
    expr: &Rc<Expr>,
    env: &Rc<Environment>,
    extensions: Option<&ExtensionRegistry>,
) -> Result<Value, TexprError> {
    let Expr::Call {
        name,
        args,
        base,
        param,
    } = &**expr
    else {
        return Err(TexprError::evaluator("internal: not a call node"));
    };

    // User definitions shadow nothing in the builtin table (their names
    // are plain letters), but they are looked up first regardless.
    if let Some(value) = env.get(name) {
        return match value {
            Value::Function(closure) => apply_closure(name, &closure, args, env, extensions),
            other => Err(TexprError::evaluator(format!(
                "{name} is a {} and cannot be called",
                other.type_name()
            ))),
        };
    }

    if let Some(handler) = functions::lookup(name) {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(evaluate_in(arg, env, extensions)?);
        }
        let base = match base {
            Some(b) => Some(evaluate_in(b, env, extensions)?),
            None => None,
        };
        let param = match param {
            Some(p) => Some(evaluate_in(p, env, extensions)?),
            None => None,
        };
        let invocation = Invocation {
            name,
            args: &values,
            base: base.as_ref(),
            param: param.as_ref(),
        };
        return handler(&invocation);
    }

    if let Some(registry) = extensions {
        if let Some(result) = registry.dispatch(expr, env) {
            return result;
        }
    }

    let message = format!("unknown function: {name}");
    match commands::suggest(name) {
        Some(suggestion) => Err(TexprError::evaluator_with_suggestion(
            message,
            format!("did you mean {suggestion}?"),
        )),
        None => Err(TexprError::evaluator(message)),
    }
}

fn apply_closure(
    name: &str,
    closure: &Closure,
    args: &[Rc<Expr>],
    env: &Rc<Environment>,
    extensions: Option<&ExtensionRegistry>,
) -> Result<Value, TexprError> {
    if closure.params.len() != args.len() {
        return Err(TexprError::evaluator(format!(
            "{name}: expected {} argument{}, got {}",
            closure.params.len(),
            if closure.params.len() == 1 { "" } else { "s" },
            args.len()
        )));
    }
    let scope = Environment::with_parent(env.clone());
    for (param, arg) in closure.params.iter().zip(args) {
        let value = evaluate_in(arg, env, extensions)?;
        scope.define(param.clone(), value);
    }
    evaluate_in(&closure.body, &scope, extensions)
}

fn make_sampler<'a>(
    var: &'a str,
    body: &'a Rc<Expr>,
    env: &Rc<Environment>,
    extensions: Option<&'a ExtensionRegistry>,
) -> impl FnMut(f64) -> Result<f64, TexprError> + 'a {
    let scope = Environment::with_parent(env.clone());
    move |x: f64| {
        scope.define(var.to_string(), Value::Number(x));
        evaluate_in(body, &scope, extensions)?.as_number()
    }
}

// ============================================================================
// Operators
// ============================================================================

fn negate(value: Value) -> Result<Value, TexprError> {
    match value {
        Value::Number(n) => Ok(Value::Number(-n)),
        Value::Complex(z) => Ok(Value::Complex(-z)),
        Value::Matrix(m) => Ok(Value::Matrix(m.scale(-1.0))),
        Value::Vector(v) => Ok(Value::Vector(v.scale(-1.0))),
        other => Err(TexprError::evaluator(format!(
            "cannot negate a {}",
            other.type_name()
        ))),
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, TexprError> {
    use Value::*;
    match op {
        BinaryOp::Add => match (left, right) {
            (Number(a), Number(b)) => Ok(Number(a + b)),
            (Matrix(a), Matrix(b)) => Ok(Matrix(a.add(&b)?)),
            (Vector(a), Vector(b)) => Ok(Vector(a.add(&b)?)),
            (a, b) => complex_pair(a, b, "+", |x, y| x + y),
        },
        BinaryOp::Sub => match (left, right) {
            (Number(a), Number(b)) => Ok(Number(a - b)),
            (Matrix(a), Matrix(b)) => Ok(Matrix(a.sub(&b)?)),
            (Vector(a), Vector(b)) => Ok(Vector(a.sub(&b)?)),
            (a, b) => complex_pair(a, b, "-", |x, y| x - y),
        },
        BinaryOp::Mul => match (left, right) {
            (Number(a), Number(b)) => Ok(Number(a * b)),
            (Number(a), Matrix(m)) | (Matrix(m), Number(a)) => Ok(Matrix(m.scale(a))),
            (Matrix(a), Matrix(b)) => Ok(Matrix(a.mul(&b)?)),
            (Number(a), Vector(v)) | (Vector(v), Number(a)) => Ok(Vector(v.scale(a))),
            // Juxtaposed vectors multiply as the cross product
            (Vector(a), Vector(b)) => Ok(Vector(a.cross(&b)?)),
            (Matrix(m), Vector(v)) => matrix_vector(&m, &v),
            (a, b) => complex_pair(a, b, "*", |x, y| x * y),
        },
        BinaryOp::Div => match (left, right) {
            (Number(a), Number(b)) => {
                if b == 0.0 {
                    if a == 0.0 {
                        Ok(Number(f64::NAN))
                    } else {
                        Err(TexprError::evaluator("division by zero"))
                    }
                } else {
                    Ok(Number(a / b))
                }
            }
            (Matrix(m), Number(a)) => {
                if a == 0.0 {
                    Err(TexprError::evaluator("division by zero"))
                } else {
                    Ok(Matrix(m.scale(1.0 / a)))
                }
            }
            (Vector(v), Number(a)) => {
                if a == 0.0 {
                    Err(TexprError::evaluator("division by zero"))
                } else {
                    Ok(Vector(v.scale(1.0 / a)))
                }
            }
            (a, b) => {
                let denominator = b.as_complex().map_err(|_| type_error("/", &a, &b))?;
                if denominator.modulus() == 0.0 {
                    return Err(TexprError::evaluator("division by zero"));
                }
                let numerator = a.as_complex().map_err(|_| type_error("/", &a, &b))?;
                Ok(Complex(numerator / denominator))
            }
        },
        BinaryOp::Pow => power(left, right),
    }
}

fn type_error(op: &str, left: &Value, right: &Value) -> TexprError {
    TexprError::evaluator(format!(
        "operator '{op}' is undefined for {} and {}",
        left.type_name(),
        right.type_name()
    ))
}

/// Promote a mixed real/complex pair and apply the complex operation.
fn complex_pair(
    left: Value,
    right: Value,
    op: &str,
    apply: fn(Complex, Complex) -> Complex,
) -> Result<Value, TexprError> {
    let (a, b) = match (&left, &right) {
        (Value::Number(_) | Value::Complex(_), Value::Number(_) | Value::Complex(_)) => {
            (left.as_complex()?, right.as_complex()?)
        }
        _ => return Err(type_error(op, &left, &right)),
    };
    Ok(Value::Complex(apply(a, b)))
}

fn matrix_vector(m: &Matrix, v: &Vector) -> Result<Value, TexprError> {
    if m.col_count() != v.len() {
        return Err(TexprError::evaluator(format!(
            "matrix-vector product requires {} components, got {}",
            m.col_count(),
            v.len()
        )));
    }
    let components = m
        .rows()
        .iter()
        .map(|row| row.iter().zip(v.components()).map(|(a, b)| a * b).sum())
        .collect();
    Ok(Value::Vector(Vector::new(components)?))
}

fn power(left: Value, right: Value) -> Result<Value, TexprError> {
    match (&left, &right) {
        (Value::Number(base), Value::Number(exp)) => {
            if *base == 0.0 && *exp == 0.0 {
                return Ok(Value::Number(1.0));
            }
            // Negative base with a fractional exponent leaves the reals
            if *base < 0.0 && exp.fract() != 0.0 {
                return Ok(Value::Complex(
                    Complex::from_real(*base).pow(Complex::from_real(*exp)),
                ));
            }
            Ok(Value::Number(base.powf(*exp)))
        }
        (Value::Matrix(m), Value::Number(exp)) => {
            if exp.fract() != 0.0 {
                return Err(TexprError::evaluator(
                    "matrix powers must be integers",
                ));
            }
            Ok(Value::Matrix(m.pow(*exp as i64)?))
        }
        (Value::Number(_) | Value::Complex(_), Value::Number(_) | Value::Complex(_)) => {
            let base = left.as_complex()?;
            let exp = right.as_complex()?;
            Ok(Value::Complex(base.pow(exp)))
        }
        _ => Err(type_error("^", &left, &right)),
    }
}

// ============================================================================
// Comparisons
// ============================================================================

fn evaluate_comparison(
    op: ComparisonOp,
    left: &Rc<Expr>,
    right: &Rc<Expr>,
    env: &Rc<Environment>,
    extensions: Option<&ExtensionRegistry>,
) -> Result<bool, TexprError> {
    // Membership inspects the interval node structurally; intervals are
    // not values on their own.
    if op == ComparisonOp::Member {
        let Expr::Interval { lower, upper } = &**right else {
            return Err(TexprError::evaluator(
                "the right side of \\in must be an interval",
            ));
        };
        let value = evaluate_in(left, env, extensions)?.as_number()?;
        let lower = evaluate_in(lower, env, extensions)?.as_number()?;
        let upper = evaluate_in(upper, env, extensions)?.as_number()?;
        return Ok(value >= lower && value <= upper);
    }

    let lhs = evaluate_in(left, env, extensions)?;
    let rhs = evaluate_in(right, env, extensions)?;

    match op {
        ComparisonOp::Equal => values_equal(&lhs, &rhs),
        ComparisonOp::NotEqual => values_equal(&lhs, &rhs).map(|eq| !eq),
        _ => {
            let a = lhs.as_number()?;
            let b = rhs.as_number()?;
            Ok(match op {
                ComparisonOp::Less => a < b,
                ComparisonOp::Greater => a > b,
                ComparisonOp::LessEq => a <= b,
                ComparisonOp::GreaterEq => a >= b,
                _ => false,
            })
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> Result<bool, TexprError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((a - b).abs() <= COMPARISON_EPSILON),
        (Value::Boolean(a), Value::Boolean(b)) => Ok(a == b),
        (Value::Matrix(a), Value::Matrix(b)) => Ok(a == b),
        (Value::Vector(a), Value::Vector(b)) => Ok(a == b),
        (Value::Number(_) | Value::Complex(_), Value::Number(_) | Value::Complex(_)) => {
            let a = left.as_complex()?;
            let b = right.as_complex()?;
            Ok((a.re - b.re).abs() <= COMPARISON_EPSILON
                && (a.im - b.im).abs() <= COMPARISON_EPSILON)
        }
        _ => Ok(false),
    }
}

// ============================================================================
// Evaluability classification
// ============================================================================

/// Classify an expression without fully evaluating it: the same visitor
/// shape as evaluation, restricted to variable resolution.
pub fn classify(expr: &Rc<Expr>, env: &Rc<Environment>) -> Evaluability {
    let free = expr.free_variable_set();
    let missing: Vec<&String> = free
        .iter()
        .filter(|name| env.get(name).is_none() && !is_constant(name))
        .collect();
    if missing.is_empty() {
        return Evaluability::Numeric;
    }
    if symbolic_shape(expr) {
        Evaluability::Symbolic
    } else {
        Evaluability::Unevaluable
    }
}

fn symbolic_shape(expr: &Expr) -> bool {
    match expr {
        Expr::Derivative { .. }
        | Expr::PartialDerivative { .. }
        | Expr::Gradient { .. } => true,
        Expr::Integral { lower, upper, .. } => lower.is_none() || upper.is_none(),
        _ => false,
    }
}
