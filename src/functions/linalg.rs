//! Matrix and vector operations, plus the decoration commands.
//!
//! `\dot` with one argument is the derivative decoration (identity on
//! evaluation); with two vector arguments it is the dot product.

use super::{expect_arity, Handler, Invocation};
use crate::error::TexprError;
use crate::value::Value;
use std::collections::HashMap;

fn builtin_det(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    let matrix = inv.args[0].as_matrix().map_err(|_| {
        TexprError::evaluator(format!(
            "det: expected a matrix, got {}",
            inv.args[0].type_name()
        ))
    })?;
    Ok(Value::Number(matrix.determinant()?))
}

fn builtin_trace(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    let matrix = inv.args[0].as_matrix().map_err(|_| {
        TexprError::evaluator(format!(
            "trace: expected a matrix, got {}",
            inv.args[0].type_name()
        ))
    })?;
    Ok(Value::Number(matrix.trace()?))
}

fn builtin_dot(inv: &Invocation) -> Result<Value, TexprError> {
    // Single argument: the \dot decoration, identity on evaluation
    if inv.args.len() == 1 {
        return Ok(inv.args[0].clone());
    }
    expect_arity(inv, 2)?;
    let a = inv.args[0].as_vector()?;
    let b = inv.args[1].as_vector()?;
    Ok(Value::Number(a.dot(b)?))
}

fn builtin_cross(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 2)?;
    let a = inv.args[0].as_vector()?;
    let b = inv.args[1].as_vector()?;
    Ok(Value::Vector(a.cross(b)?))
}

fn builtin_normalize(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    let v = inv.args[0].as_vector()?;
    Ok(Value::Vector(v.normalized()?))
}

/// Decorations evaluate to their argument unchanged.
fn builtin_decoration(inv: &Invocation) -> Result<Value, TexprError> {
    expect_arity(inv, 1)?;
    Ok(inv.args[0].clone())
}

pub fn register(table: &mut HashMap<&'static str, Handler>) {
    table.insert("det", builtin_det);
    table.insert("trace", builtin_trace);
    table.insert("dot", builtin_dot);
    table.insert("cross", builtin_cross);
    table.insert("normalize", builtin_normalize);
    table.insert("ddot", builtin_decoration);
    table.insert("bar", builtin_decoration);
    table.insert("hat", builtin_decoration);
    table.insert("vec", builtin_decoration);
}
