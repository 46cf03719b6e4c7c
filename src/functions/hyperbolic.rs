//! Hyperbolic functions and their inverses.

use super::{expect_arity, finish, numeric_arg, real_arg, Handler, Invocation, Numeric};
use crate::complex::Complex;
use crate::error::TexprError;
use crate::value::Value;
use std::collections::HashMap;

fn unary(
    inv: &Invocation,
    real: fn(f64) -> f64,
    complex: fn(&Complex) -> Complex,
) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    match numeric_arg(inv, 0)? {
        Numeric::Real(x) => Ok(Value::Number(real(x))),
        Numeric::Complex(z) => Ok(finish(complex(&z))),
    }
}

fn builtin_sinh(inv: &Invocation) -> Result<Value, TexprError> {
    unary(inv, f64::sinh, Complex::sinh)
}

fn builtin_cosh(inv: &Invocation) -> Result<Value, TexprError> {
    unary(inv, f64::cosh, Complex::cosh)
}

fn builtin_tanh(inv: &Invocation) -> Result<Value, TexprError> {
    unary(inv, f64::tanh, Complex::tanh)
}

fn builtin_coth(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    let x = real_arg(inv, 0)?;
    if x == 0.0 {
        return Err(TexprError::evaluator("coth: undefined at 0"));
    }
    Ok(Value::Number(1.0 / x.tanh()))
}

fn builtin_arcsinh(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    Ok(Value::Number(real_arg(inv, 0)?.asinh()))
}

fn builtin_arccosh(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    let x = real_arg(inv, 0)?;
    if x < 1.0 {
        return Err(TexprError::evaluator(format!(
            "arccosh: argument {x} is outside the domain [1, \u{221e})"
        )));
    }
    Ok(Value::Number(x.acosh()))
}

fn builtin_arctanh(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    let x = real_arg(inv, 0)?;
    if x.abs() >= 1.0 {
        return Err(TexprError::evaluator(format!(
            "arctanh: argument {x} is outside the domain (-1, 1)"
        )));
    }
    Ok(Value::Number(x.atanh()))
}

pub fn register(table: &mut HashMap<&'static str, Handler>) {
    table.insert("sinh", builtin_sinh);
    table.insert("cosh", builtin_cosh);
    table.insert("tanh", builtin_tanh);
    table.insert("coth", builtin_coth);
    table.insert("arcsinh", builtin_arcsinh);
    table.insert("arccosh", builtin_arccosh);
    table.insert("arctanh", builtin_arctanh);
    table.insert("asinh", builtin_arcsinh);
    table.insert("acosh", builtin_arccosh);
    table.insert("atanh", builtin_arctanh);
}
