//! Square roots, nth roots, and absolute value.

use super::{expect_arity, finish, numeric_arg, Handler, Invocation, Numeric};
use crate::complex::Complex;
use crate::error::TexprError;
use crate::value::Value;
use std::collections::HashMap;

fn builtin_sqrt(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    let index = match inv.param {
        None => 2.0,
        Some(Value::Number(n)) => *n,
        Some(other) => {
            return Err(TexprError::evaluator(format!(
                "sqrt: root index must be a real number, got {}",
                other.type_name()
            )))
        }
    };
    if index == 0.0 {
        return Err(TexprError::evaluator("sqrt: root index must be non-zero"));
    }

    match numeric_arg(inv, 0)? {
        Numeric::Real(x) => {
            if x >= 0.0 {
                return Ok(Value::Number(x.powf(1.0 / index)));
            }
            // Negative radicand: odd integer roots stay real, everything
            // else moves to the principal complex branch
            if index.fract() == 0.0 && (index as i64) % 2 != 0 {
                return Ok(Value::Number(-((-x).powf(1.0 / index))));
            }
            if index == 2.0 {
                return Ok(finish(Complex::from_real(x).sqrt()));
            }
            Ok(finish(
                Complex::from_real(x).pow(Complex::from_real(1.0 / index)),
            ))
        }
        Numeric::Complex(z) => {
            if index == 2.0 {
                Ok(finish(z.sqrt()))
            } else {
                Ok(finish(z.pow(Complex::from_real(1.0 / index))))
            }
        }
    }
}

/// Absolute value doubles as complex modulus and vector magnitude.
fn builtin_abs(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    match &inv.args[0] {
        Value::Number(n) => Ok(Value::Number(n.abs())),
        Value::Complex(z) => Ok(Value::Number(z.modulus())),
        Value::Vector(v) => Ok(Value::Number(v.magnitude())),
        other => Err(TexprError::evaluator(format!(
            "abs: expected a number or vector, got {}",
            other.type_name()
        ))),
    }
}

pub fn register(table: &mut HashMap<&'static str, Handler>) {
    table.insert("sqrt", builtin_sqrt);
    table.insert("abs", builtin_abs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Vector;

    fn call(name: &'static str, args: &[Value], param: Option<&Value>) -> Result<Value, TexprError> {
        let mut table = HashMap::new();
        register(&mut table);
        table[name](&Invocation {
            name,
            args,
            base: None,
            param,
        })
    }

    #[test]
    fn test_sqrt_of_negative_is_imaginary() {
        let result = call("sqrt", &[Value::Number(-1.0)], None).unwrap();
        match result {
            Value::Complex(z) => {
                assert!(z.re.abs() < 1e-12);
                assert!((z.im - 1.0).abs() < 1e-12);
            }
            other => panic!("expected i, got {other:?}"),
        }
    }

    #[test]
    fn test_cube_root_of_negative_stays_real() {
        let result = call("sqrt", &[Value::Number(-8.0)], Some(&Value::Number(3.0))).unwrap();
        match result {
            Value::Number(n) => assert!((n + 2.0).abs() < 1e-12),
            other => panic!("expected -2, got {other:?}"),
        }
    }

    #[test]
    fn test_nth_root() {
        let result = call("sqrt", &[Value::Number(81.0)], Some(&Value::Number(4.0))).unwrap();
        match result {
            Value::Number(n) => assert!((n - 3.0).abs() < 1e-12),
            other => panic!("expected 3, got {other:?}"),
        }
    }

    #[test]
    fn test_abs_variants() {
        assert_eq!(
            call("abs", &[Value::Number(-3.0)], None).unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(
            call("abs", &[Value::Complex(Complex::new(3.0, 4.0))], None).unwrap(),
            Value::Number(5.0)
        );
        let v = Vector::new(vec![3.0, 4.0]).unwrap();
        assert_eq!(
            call("abs", &[Value::Vector(v)], None).unwrap(),
            Value::Number(5.0)
        );
    }
}
