// ABOUTME: Tagged evaluation result and total coercions between result kinds

use crate::ast::Expr;
use crate::complex::Complex;
use crate::error::TexprError;
use crate::matrix::{Matrix, Vector};
use std::fmt;
use std::rc::Rc;

/// A user-defined function: the defining AST shared by reference plus the
/// parameter list it was declared with.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub params: Vec<String>,
    pub body: Rc<Expr>,
}

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Complex(Complex),
    Matrix(Matrix),
    Vector(Vector),
    Boolean(bool),
    Function(Closure),
}

impl Value {
    /// Collapse a complex value with negligible imaginary part to a real.
    pub fn simplified(self) -> Value {
        match self {
            Value::Complex(z) if z.is_real() => Value::Number(z.re),
            other => other,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Complex(_) => "complex",
            Value::Matrix(_) => "matrix",
            Value::Vector(_) => "vector",
            Value::Boolean(_) => "boolean",
            Value::Function(_) => "function",
        }
    }

    /// Coerce to a real number. Succeeds for reals, real-valued complex
    /// numbers, and booleans (0/1); fails otherwise.
    pub fn as_number(&self) -> Result<f64, TexprError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Complex(z) if z.is_real() => Ok(z.re),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            other => Err(TexprError::coercion(format!(
                "expected a numeric result, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_complex(&self) -> Result<Complex, TexprError> {
        match self {
            Value::Number(n) => Ok(Complex::from_real(*n)),
            Value::Complex(z) => Ok(*z),
            other => Err(TexprError::coercion(format!(
                "expected a complex result, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_matrix(&self) -> Result<&Matrix, TexprError> {
        match self {
            Value::Matrix(m) => Ok(m),
            other => Err(TexprError::coercion(format!(
                "expected a matrix result, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_vector(&self) -> Result<&Vector, TexprError> {
        match self {
            Value::Vector(v) => Ok(v),
            other => Err(TexprError::coercion(format!(
                "expected a vector result, got {}",
                other.type_name()
            ))),
        }
    }

    /// Truthiness for piecewise guards and boolean operators: booleans are
    /// themselves, numbers are non-zero.
    pub fn truthy(&self) -> Result<bool, TexprError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0 && !n.is_nan()),
            other => Err(TexprError::coercion(format!(
                "expected a boolean condition, got {}",
                other.type_name()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                // Whole numbers display without a decimal point
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Complex(z) => write!(f, "{z}"),
            Value::Matrix(m) => write!(f, "{m}"),
            Value::Vector(v) => write!(f, "{v}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Function(c) => write!(f, "#<function/{}>", c.params.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_number_on_real_complex() {
        let value = Value::Complex(Complex::new(3.0, 0.0));
        assert_eq!(value.as_number().unwrap(), 3.0);

        let value = Value::Complex(Complex::new(0.0, 1.0));
        assert!(value.as_number().is_err());
    }

    #[test]
    fn test_as_number_rejects_containers() {
        let matrix = Value::Matrix(Matrix::new(vec![vec![1.0]]).unwrap());
        assert!(matches!(
            matrix.as_number(),
            Err(TexprError::Coercion { .. })
        ));
    }

    #[test]
    fn test_simplified_collapses_real_complex() {
        let value = Value::Complex(Complex::new(2.0, 0.0)).simplified();
        assert_eq!(value, Value::Number(2.0));

        let value = Value::Complex(Complex::new(2.0, 1.0)).simplified();
        assert!(matches!(value, Value::Complex(_)));
    }

    #[test]
    fn test_number_display() {
        assert_eq!(format!("{}", Value::Number(42.0)), "42");
        assert_eq!(format!("{}", Value::Number(-2.5)), "-2.5");
        assert_eq!(format!("{}", Value::Number(0.0)), "0");
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::Boolean(true).truthy().unwrap());
        assert!(Value::Number(3.0).truthy().unwrap());
        assert!(!Value::Number(0.0).truthy().unwrap());
        assert!(!Value::Number(f64::NAN).truthy().unwrap());
    }
}
