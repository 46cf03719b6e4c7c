//! Exponential and logarithmic functions.
//!
//! `ln` and `log` of a negative real produce a complex result through the
//! principal branch; at zero they fail with a domain error. `\log_{b}{x}`
//! carries its base through the invocation.

use super::{expect_arity, finish, numeric_arg, Handler, Invocation, Numeric};
use crate::complex::Complex;
use crate::error::TexprError;
use crate::value::Value;
use std::collections::HashMap;

fn builtin_exp(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    match numeric_arg(inv, 0)? {
        Numeric::Real(x) => Ok(Value::Number(x.exp())),
        Numeric::Complex(z) => Ok(finish(z.exp())),
    }
}

/// Natural log with the complex fallout for negative reals.
fn natural_log(name: &str, value: Numeric) -> Result<Value, TexprError> {
    match value {
        Numeric::Real(x) => {
            if x == 0.0 {
                Err(TexprError::evaluator(format!("{name}: undefined at 0")))
            } else if x < 0.0 {
                Ok(finish(Complex::from_real(x).ln()))
            } else {
                Ok(Value::Number(x.ln()))
            }
        }
        Numeric::Complex(z) => {
            if z.modulus() == 0.0 {
                Err(TexprError::evaluator(format!("{name}: undefined at 0")))
            } else {
                Ok(finish(z.ln()))
            }
        }
    }
}

fn builtin_ln(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    natural_log("ln", numeric_arg(inv, 0)?)
}

fn builtin_log(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    let base = match inv.base {
        None => 10.0,
        Some(Value::Number(b)) => *b,
        Some(other) => {
            return Err(TexprError::evaluator(format!(
                "log: base must be a real number, got {}",
                other.type_name()
            )))
        }
    };
    if base <= 0.0 || base == 1.0 {
        return Err(TexprError::evaluator(format!(
            "log: invalid base {base}"
        )));
    }
    let numerator = natural_log("log", numeric_arg(inv, 0)?)?;
    match numerator {
        Value::Number(n) => Ok(Value::Number(n / base.ln())),
        Value::Complex(z) => Ok(finish(z / Complex::from_real(base.ln()))),
        other => Ok(other),
    }
}

pub fn register(table: &mut HashMap<&'static str, Handler>) {
    table.insert("exp", builtin_exp);
    table.insert("ln", builtin_ln);
    table.insert("log", builtin_log);
}
