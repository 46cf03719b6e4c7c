//! # Function Registry
//!
//! Name-keyed dispatch table for every evaluable function, organized into
//! categories:
//!
//! - **[trig]**: sin, cos, tan, cot, sec, csc and the arc/a-prefixed inverses
//! - **[hyperbolic]**: sinh, cosh, tanh, coth and inverses
//! - **[explog]**: exp, ln, log (with optional base subscript)
//! - **[roots]**: sqrt (with optional index), abs
//! - **[rounding]**: floor, ceil, round, sign, factorial, gcd, lcm, min, max, binom
//! - **[linalg]**: det, trace, dot, cross, normalize, plus the decorations
//!   (dot, ddot, bar, hat, vec) which evaluate to their argument
//!
//! Handlers receive already-evaluated argument values plus the optional
//! base/index carried by the call node. Unknown names fall through to the
//! extension registry and finally fail with a suggestion.

use crate::complex::Complex;
use crate::error::TexprError;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

pub mod explog;
pub mod hyperbolic;
pub mod linalg;
pub mod rounding;
pub mod roots;
pub mod trig;

/// An evaluated function call: argument values plus the `\log_b` base and
/// `\sqrt[n]` index when present.
pub struct Invocation<'a> {
    pub name: &'a str,
    pub args: &'a [Value],
    pub base: Option<&'a Value>,
    pub param: Option<&'a Value>,
}

pub type Handler = fn(&Invocation) -> Result<Value, TexprError>;

static REGISTRY: LazyLock<HashMap<&'static str, Handler>> = LazyLock::new(|| {
    let mut table = HashMap::new();
    trig::register(&mut table);
    hyperbolic::register(&mut table);
    explog::register(&mut table);
    roots::register(&mut table);
    rounding::register(&mut table);
    linalg::register(&mut table);
    table
});

pub fn lookup(name: &str) -> Option<Handler> {
    REGISTRY.get(name).copied()
}

pub fn known_functions() -> impl Iterator<Item = &'static str> {
    REGISTRY.keys().copied()
}

// ============================================================================
// Shared argument helpers
// ============================================================================

/// A scalar argument that may have left the reals.
pub enum Numeric {
    Real(f64),
    Complex(Complex),
}

pub fn expect_arity(inv: &Invocation, expected: usize) -> Result<(), TexprError> {
    if inv.args.len() != expected {
        return Err(TexprError::evaluator(format!(
            "{}: expected {expected} argument{}, got {}",
            inv.name,
            if expected == 1 { "" } else { "s" },
            inv.args.len()
        )));
    }
    Ok(())
}

pub fn numeric_arg(inv: &Invocation, index: usize) -> Result<Numeric, TexprError> {
    match inv.args.get(index) {
        Some(Value::Number(n)) => Ok(Numeric::Real(*n)),
        Some(Value::Complex(z)) => Ok(Numeric::Complex(*z)),
        Some(other) => Err(TexprError::evaluator(format!(
            "{}: expected a number at argument {}, got {}",
            inv.name,
            index + 1,
            other.type_name()
        ))),
        None => Err(TexprError::evaluator(format!(
            "{}: missing argument {}",
            inv.name,
            index + 1
        ))),
    }
}

pub fn real_arg(inv: &Invocation, index: usize) -> Result<f64, TexprError> {
    match numeric_arg(inv, index)? {
        Numeric::Real(n) => Ok(n),
        Numeric::Complex(z) if z.is_real() => Ok(z.re),
        Numeric::Complex(_) => Err(TexprError::evaluator(format!(
            "{}: argument {} must be real",
            inv.name,
            index + 1
        ))),
    }
}

pub fn integer_arg(inv: &Invocation, index: usize) -> Result<i64, TexprError> {
    let n = real_arg(inv, index)?;
    if n.fract() != 0.0 || !n.is_finite() {
        return Err(TexprError::evaluator(format!(
            "{}: argument {} must be an integer, got {n}",
            inv.name,
            index + 1
        )));
    }
    Ok(n as i64)
}

/// Once any sub-result is complex, the enclosing operation stays complex;
/// real results collapse back to plain numbers.
pub fn finish(value: Complex) -> Value {
    Value::Complex(value).simplified()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_covers_categories() {
        for name in ["sin", "arctan", "sinh", "ln", "sqrt", "floor", "gcd", "det"] {
            assert!(lookup(name).is_some(), "missing handler for {name}");
        }
        assert!(lookup("nosuch").is_none());
    }

    #[test]
    fn test_arity_errors_name_the_function() {
        let inv = Invocation {
            name: "sin",
            args: &[],
            base: None,
            param: None,
        };
        let err = expect_arity(&inv, 1).unwrap_err();
        assert!(format!("{err}").contains("sin"));
    }
}
