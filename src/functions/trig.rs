//! Trigonometric functions and their inverses.
//!
//! Real arguments stay real; complex arguments dispatch to the complex
//! formulas. Inverse functions enforce their real domains (`\arcsin` and
//! `\asin` name the same handler).

use super::{expect_arity, finish, numeric_arg, Handler, Invocation, Numeric};
use crate::complex::Complex;
use crate::error::TexprError;
use crate::value::Value;
use std::collections::HashMap;

fn unary_trig(
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

fn builtin_sin(inv: &Invocation) -> Result<Value, TexprError> {
    unary_trig(inv, f64::sin, Complex::sin)
}

fn builtin_cos(inv: &Invocation) -> Result<Value, TexprError> {
    unary_trig(inv, f64::cos, Complex::cos)
}

fn builtin_tan(inv: &Invocation) -> Result<Value, TexprError> {
    unary_trig(inv, f64::tan, Complex::tan)
}

fn builtin_cot(inv: &Invocation) -> Result<Value, TexprError> {
    unary_trig(inv, |x| 1.0 / x.tan(), |z| {
        Complex::from_real(1.0) / z.tan()
    })
}

fn builtin_sec(inv: &Invocation) -> Result<Value, TexprError> {
    unary_trig(inv, |x| 1.0 / x.cos(), |z| {
        Complex::from_real(1.0) / z.cos()
    })
}

fn builtin_csc(inv: &Invocation) -> Result<Value, TexprError> {
    unary_trig(inv, |x| 1.0 / x.sin(), |z| {
        Complex::from_real(1.0) / z.sin()
    })
}

fn domain_checked(
    inv: &Invocation,
    check: fn(f64) -> bool,
    domain: &str,
    real: fn(f64) -> f64,
) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    let x = match numeric_arg(inv, 0)? {
        Numeric::Real(x) => x,
        Numeric::Complex(z) if z.is_real() => z.re,
        Numeric::Complex(_) => {
            return Err(TexprError::evaluator(format!(
                "{}: complex arguments are not supported",
                inv.name
            )))
        }
    };
    if !check(x) {
        return Err(TexprError::evaluator(format!(
            "{}: argument {x} is outside the domain {domain}",
            inv.name
        )));
    }
    Ok(Value::Number(real(x)))
}

fn builtin_arcsin(inv: &Invocation) -> Result<Value, TexprError> {
    domain_checked(inv, |x| (-1.0..=1.0).contains(&x), "[-1, 1]", f64::asin)
}

fn builtin_arccos(inv: &Invocation) -> Result<Value, TexprError> {
    domain_checked(inv, |x| (-1.0..=1.0).contains(&x), "[-1, 1]", f64::acos)
}

fn builtin_arctan(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    match numeric_arg(inv, 0)? {
        Numeric::Real(x) => Ok(Value::Number(x.atan())),
        Numeric::Complex(_) => Err(TexprError::evaluator(
            "arctan: complex arguments are not supported",
        )),
    }
}

fn builtin_arccot(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    match numeric_arg(inv, 0)? {
        Numeric::Real(x) => Ok(Value::Number(std::f64::consts::FRAC_PI_2 - x.atan())),
        Numeric::Complex(_) => Err(TexprError::evaluator(
            "arccot: complex arguments are not supported",
        )),
    }
}

fn builtin_arcsec(inv: &Invocation) -> Result<Value, TexprError> {
    domain_checked(inv, |x| x.abs() >= 1.0, "|x| >= 1", |x| (1.0 / x).acos())
}

fn builtin_arccsc(inv: &Invocation) -> Result<Value, TexprError> {
    domain_checked(inv, |x| x.abs() >= 1.0, "|x| >= 1", |x| (1.0 / x).asin())
}

/// Register all trig handlers, including the `a`-prefixed aliases.
pub fn register(table: &mut HashMap<&'static str, Handler>) {
    table.insert("sin", builtin_sin);
    table.insert("cos", builtin_cos);
    table.insert("tan", builtin_tan);
    table.insert("cot", builtin_cot);
    table.insert("sec", builtin_sec);
    table.insert("csc", builtin_csc);
    table.insert("arcsin", builtin_arcsin);
    table.insert("arccos", builtin_arccos);
    table.insert("arctan", builtin_arctan);
    table.insert("arccot", builtin_arccot);
    table.insert("arcsec", builtin_arcsec);
    table.insert("arccsc", builtin_arccsc);
    table.insert("asin", builtin_arcsin);
    table.insert("acos", builtin_arccos);
    table.insert("atan", builtin_arctan);
    table.insert("acot", builtin_arccot);
    table.insert("asec", builtin_arcsec);
    table.insert("acsc", builtin_arccsc);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &'static str, args: &[Value]) -> Result<Value, TexprError> {
        let mut table = HashMap::new();
        register(&mut table);
        let handler = table[name];
        handler(&Invocation {
            name,
            args,
            base: None,
            param: None,
        })
    }

    #[test]
    fn test_sin_of_real() {
        let result = call("sin", &[Value::Number(std::f64::consts::FRAC_PI_2)]).unwrap();
        match result {
            Value::Number(n) => assert!((n - 1.0).abs() < 1e-12),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn test_sin_of_complex_stays_complex() {
        let result = call("sin", &[Value::Complex(Complex::new(0.0, 1.0))]).unwrap();
        assert!(matches!(result, Value::Complex(_)));
    }

    #[test]
    fn test_arcsin_domain() {
        assert!(call("arcsin", &[Value::Number(0.5)]).is_ok());
        assert!(call("arcsin", &[Value::Number(2.0)]).is_err());
        assert!(call("asin", &[Value::Number(-1.0)]).is_ok());
    }

    #[test]
    fn test_arity_checked() {
        assert!(call("cos", &[]).is_err());
    }
}
