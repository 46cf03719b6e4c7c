// ABOUTME: Three-level equivalence checking: structural, algebraic, and
// deterministic numeric sampling

use super::normalizer::normalize;
use crate::ast::Expr;
use crate::config::{EQUIVALENCE_EPSILON, EQUIVALENCE_SAMPLES, EQUIVALENCE_SEED};
use crate::env::Environment;
use crate::eval::{evaluate, is_constant};
use crate::value::Value;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::rc::Rc;

/// The strongest level at which two expressions agree. The levels are
/// monotone: structural equality implies algebraic, which implies
/// numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquivalenceLevel {
    Structural,
    Algebraic,
    Numeric,
    NotEquivalent,
}

pub fn equivalence(a: &Rc<Expr>, b: &Rc<Expr>) -> EquivalenceLevel {
    if structurally_equal(a, b) {
        return EquivalenceLevel::Structural;
    }
    if algebraically_equal(a, b) {
        return EquivalenceLevel::Algebraic;
    }
    if numerically_equal(a, b) {
        return EquivalenceLevel::Numeric;
    }
    EquivalenceLevel::NotEquivalent
}

pub fn structurally_equal(a: &Rc<Expr>, b: &Rc<Expr>) -> bool {
    a == b
}

/// Equal after normalization and simplification.
pub fn algebraically_equal(a: &Rc<Expr>, b: &Rc<Expr>) -> bool {
    super::simplify(&normalize(a)) == super::simplify(&normalize(b))
}

/// Deterministically seeded sampling over the union of free variables.
/// Samples that fail to evaluate or land on NaN/infinity are skipped; a
/// single disagreement disproves equivalence.
pub fn numerically_equal(a: &Rc<Expr>, b: &Rc<Expr>) -> bool {
    let mut variables = BTreeSet::new();
    a.free_variables(&mut variables);
    b.free_variables(&mut variables);
    let variables: Vec<String> = variables
        .into_iter()
        .filter(|name| !is_constant(name))
        .collect();

    let mut rng = StdRng::seed_from_u64(EQUIVALENCE_SEED);
    let mut compared = 0usize;
    // Allow extra attempts so skipped samples still leave a budget
    for _ in 0..EQUIVALENCE_SAMPLES * 5 {
        if compared >= EQUIVALENCE_SAMPLES {
            break;
        }
        let env = Environment::new();
        for name in &variables {
            env.define(name.clone(), Value::Number(rng.gen_range(-10.0..10.0)));
        }

        let Some(va) = sample(a, &env) else { continue };
        let Some(vb) = sample(b, &env) else { continue };

        let tolerance = EQUIVALENCE_EPSILON * va.abs().max(vb.abs()).max(1.0);
        if (va - vb).abs() > tolerance {
            return false;
        }
        compared += 1;
    }
    compared > 0
}

fn sample(expr: &Rc<Expr>, env: &Rc<Environment>) -> Option<f64> {
    let value = evaluate(expr, env).ok()?.as_number().ok()?;
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_level() {
        let a = Expr::add(Expr::variable("x"), Expr::number(1.0));
        let b = Expr::add(Expr::variable("x"), Expr::number(1.0));
        assert_eq!(equivalence(&a, &b), EquivalenceLevel::Structural);
    }

    #[test]
    fn test_algebraic_level() {
        // x + x vs 2x: equal after simplification, not structurally
        let x = Expr::variable("x");
        let a = Expr::add(x.clone(), x.clone());
        let b = Expr::mul(Expr::number(2.0), x);
        assert_eq!(equivalence(&a, &b), EquivalenceLevel::Algebraic);
    }

    #[test]
    fn test_numeric_level() {
        // sin^2 x vs 1 - cos^2 x: no rewrite connects them here, but
        // they agree numerically everywhere
        let x = Expr::variable("x");
        let a = Expr::pow(Expr::call1("sin", x.clone()), Expr::number(2.0));
        let b = Expr::sub(
            Expr::number(1.0),
            Expr::pow(Expr::call1("cos", x), Expr::number(2.0)),
        );
        assert_eq!(equivalence(&a, &b), EquivalenceLevel::Numeric);
    }

    #[test]
    fn test_not_equivalent() {
        let x = Expr::variable("x");
        let a = Expr::pow(x.clone(), Expr::number(2.0));
        let b = Expr::mul(Expr::number(2.0), x);
        assert_eq!(equivalence(&a, &b), EquivalenceLevel::NotEquivalent);
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let x = Expr::variable("x");
        let a = Expr::call1("sin", x.clone());
        let b = Expr::call1("cos", x);
        for _ in 0..3 {
            assert_eq!(equivalence(&a, &b), EquivalenceLevel::NotEquivalent);
        }
    }

    #[test]
    fn test_domain_failures_are_skipped() {
        // sqrt(x) only evaluates on half the sample range; enough
        // samples remain to confirm
        let x = Expr::variable("x");
        let a = Expr::call1("sqrt", x.clone());
        let b = Expr::pow(x, Expr::div(Expr::number(1.0), Expr::number(2.0)));
        assert!(numerically_equal(&a, &b));
    }
}
