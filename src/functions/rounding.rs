//! Rounding, sign, factorial, and integer combinatorics.

use super::{expect_arity, integer_arg, real_arg, Handler, Invocation};
use crate::error::TexprError;
use crate::value::Value;
use std::collections::HashMap;

/// Largest n with n! representable in f64.
const FACTORIAL_LIMIT: i64 = 170;

fn builtin_floor(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    Ok(Value::Number(real_arg(inv, 0)?.floor()))
}

fn builtin_ceil(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    Ok(Value::Number(real_arg(inv, 0)?.ceil()))
}

fn builtin_round(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    Ok(Value::Number(real_arg(inv, 0)?.round()))
}

fn builtin_sign(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    let x = real_arg(inv, 0)?;
    let sign = if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    };
    Ok(Value::Number(sign))
}

pub fn factorial(n: i64) -> Result<f64, TexprError> {
    if n < 0 {
        return Err(TexprError::evaluator(format!(
            "factorial: undefined for negative argument {n}"
        )));
    }
    if n > FACTORIAL_LIMIT {
        return Err(TexprError::evaluator(format!(
            "factorial: {n} overflows (limit {FACTORIAL_LIMIT})"
        )));
    }
    Ok((1..=n).map(|k| k as f64).product())
}

fn builtin_factorial(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    let n = integer_arg(inv, 0)?;
    Ok(Value::Number(factorial(n)?))
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn builtin_gcd(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 2)?;
    let a = integer_arg(inv, 0)?;
    let b = integer_arg(inv, 1)?;
    Ok(Value::Number(gcd(a, b) as f64))
}

fn builtin_lcm(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 2)?;
    let a = integer_arg(inv, 0)?;
    let b = integer_arg(inv, 1)?;
    if a == 0 || b == 0 {
        return Ok(Value::Number(0.0));
    }
    let g = gcd(a, b);
    Ok(Value::Number(((a / g) * b).abs() as f64))
}

fn builtin_min(inv: &Invocation) -> Result<Value, TexprError> {
    if inv.args.is_empty() {
        return Err(TexprError::evaluator("min: expected at least 1 argument"));
    }
    let mut best = real_arg(inv, 0)?;
    for index in 1..inv.args.len() {
        best = best.min(real_arg(inv, index)?);
    }
    Ok(Value::Number(best))
}

fn builtin_max(inv: &Invocation) -> Result<Value, TexprError> {
    if inv.args.is_empty() {
        return Err(TexprError::evaluator("max: expected at least 1 argument"));
    }
    let mut best = real_arg(inv, 0)?;
    for index in 1..inv.args.len() {
        best = best.max(real_arg(inv, index)?);
    }
    Ok(Value::Number(best))
}

/// Binomial coefficient over integers, computed multiplicatively to
/// postpone overflow.
pub fn binomial(n: i64, k: i64) -> Result<f64, TexprError> {
    if k < 0 || n < 0 {
        return Err(TexprError::evaluator(
            "binom: arguments must be non-negative integers",
        ));
    }
    if k > n {
        return Ok(0.0);
    }
    let k = k.min(n - k);
    let mut result = 1.0f64;
    for step in 0..k {
        result = result * (n - step) as f64 / (step + 1) as f64;
    }
    Ok(result.round())
}

fn builtin_binom(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 2)?;
    let n = integer_arg(inv, 0)?;
    let k = integer_arg(inv, 1)?;
    Ok(Value::Number(binomial(n, k)?))
}

pub fn register(table: &mut HashMap<&'static str, Handler>) {
    table.insert("floor", builtin_floor);
    table.insert("ceil", builtin_ceil);
    table.insert("round", builtin_round);
    table.insert("sign", builtin_sign);
    table.insert("factorial", builtin_factorial);
    table.insert("gcd", builtin_gcd);
    table.insert("lcm", builtin_lcm);
    table.insert("min", builtin_min);
    table.insert("max", builtin_max);
    table.insert("binom", builtin_binom);
}
