//! # Symbolic Engine
//!
//! Term rewriting over the AST: a bottom-up normalizer, a categorised
//! rule engine with optional step tracing, polynomial expansion and
//! factoring, differentiation, basic integration, and equivalence
//! checking.

use crate::ast::Expr;
use std::rc::Rc;

pub mod derivative;
pub mod engine;
pub mod equivalence;
pub mod integral;
pub mod normalizer;
pub mod polynomial;
pub mod rules;
pub mod steps;

pub use engine::{Assumption, Assumptions, RewriteEngine, Rule, RuleCategory};
pub use equivalence::EquivalenceLevel;
pub use steps::{Step, StepTracer};

/// Alternating normalize/rewrite passes stop after this many rounds even
/// without a fixed point.
const MAX_SIMPLIFY_ROUNDS: usize = 25;

const SIMPLIFY_CATEGORIES: &[RuleCategory] = &[
    RuleCategory::Identity,
    RuleCategory::Simplification,
    RuleCategory::Normalization,
];

const EXPANSION_CATEGORIES: &[RuleCategory] =
    &[RuleCategory::Identity, RuleCategory::Expansion];

pub fn simplify(expr: &Rc<Expr>) -> Rc<Expr> {
    simplify_with(expr, &Assumptions::default(), None)
}

/// Normalize, rewrite, and repeat until the tree stops changing: rule
/// output can expose fresh normalization opportunities (and vice versa),
/// so a single pass of each is not enough.
pub fn simplify_with(
    expr: &Rc<Expr>,
    assumptions: &Assumptions,
    mut tracer: Option<&mut StepTracer>,
) -> Rc<Expr> {
    let engine = RewriteEngine::with_categories(SIMPLIFY_CATEGORIES);
    let mut current = expr.clone();
    for _ in 0..MAX_SIMPLIFY_ROUNDS {
        let normalized = normalizer::normalize(&current);
        let next = engine.run(&normalized, assumptions, tracer.as_deref_mut());
        if next == current {
            return next;
        }
        current = next;
    }
    current
}

pub fn expand(expr: &Rc<Expr>) -> Rc<Expr> {
    expand_with(expr, &Assumptions::default(), None)
}

/// Expansion: category rules first (double angles, log laws), then the
/// polynomial distributor, then a simplify pass to collect like terms.
pub fn expand_with(
    expr: &Rc<Expr>,
    assumptions: &Assumptions,
    mut tracer: Option<&mut StepTracer>,
) -> Rc<Expr> {
    let engine = RewriteEngine::with_categories(EXPANSION_CATEGORIES);
    let rewritten = engine.run(expr, assumptions, tracer.as_deref_mut());
    let distributed = polynomial::expand_node(&rewritten, &mut tracer);
    simplify_with(&distributed, assumptions, tracer)
}

pub fn factor(expr: &Rc<Expr>) -> Rc<Expr> {
    factor_with(expr, &Assumptions::default(), None)
}

pub fn factor_with(
    expr: &Rc<Expr>,
    assumptions: &Assumptions,
    mut tracer: Option<&mut StepTracer>,
) -> Rc<Expr> {
    let simplified = simplify_with(expr, assumptions, tracer.as_deref_mut());
    polynomial::factor_node(&simplified, &mut tracer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simplify_collects_constants_through_nesting() {
        // 3 * (2 * x) simplifies to 6x even though the constants start
        // in different chain levels
        let x = Expr::variable("x");
        let expr = Expr::mul(
            Expr::number(3.0),
            Expr::mul(Expr::number(2.0), x.clone()),
        );
        assert_eq!(simplify(&expr), Expr::mul(Expr::number(6.0), x));
    }

    #[test]
    fn test_simplify_merges_terms_across_chains() {
        // x + x + y: ordering makes the duplicates adjacent, the rule
        // then collects them
        let x = Expr::variable("x");
        let y = Expr::variable("y");
        let expr = Expr::add(Expr::add(x.clone(), x.clone()), y.clone());
        let expected = Expr::add(y, Expr::mul(Expr::number(2.0), x));
        assert_eq!(simplify(&expr), expected);
    }

    #[test]
    fn test_simplify_cancels_opposites() {
        let x = Expr::variable("x");
        let expr = Expr::add(x.clone(), Expr::neg(x));
        assert_eq!(simplify(&expr), Expr::number(0.0));
    }

    #[test]
    fn test_simplify_is_idempotent() {
        let x = Expr::variable("x");
        let expr = Expr::add(
            Expr::mul(Expr::number(1.0), x.clone()),
            Expr::add(x.clone(), Expr::number(0.0)),
        );
        let once = simplify(&expr);
        let twice = simplify(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_expand_square_of_sum() {
        // (x + 1)^2 expands to x^2 + 2x + 1
        let x = Expr::variable("x");
        let expr = Expr::pow(
            Expr::add(x.clone(), Expr::number(1.0)),
            Expr::number(2.0),
        );
        let expanded = expand(&expr);
        let expected = simplify(&Expr::add(
            Expr::pow(x.clone(), Expr::number(2.0)),
            Expr::add(Expr::mul(Expr::number(2.0), x), Expr::number(1.0)),
        ));
        assert_eq!(expanded, expected);
    }

    #[test]
    fn test_factor_difference_of_squares() {
        // x^2 - 9 factors to (x - 3)(x + 3)
        let x = Expr::variable("x");
        let expr = Expr::sub(
            Expr::pow(x.clone(), Expr::number(2.0)),
            Expr::number(9.0),
        );
        let factored = factor(&expr);
        let expected = Expr::mul(
            Expr::sub(x.clone(), Expr::number(3.0)),
            Expr::add(x, Expr::number(3.0)),
        );
        assert_eq!(factored, expected);
    }

    #[test]
    fn test_simplify_with_steps() {
        let x = Expr::variable("x");
        let expr = Expr::add(x.clone(), x);
        let mut tracer = StepTracer::new();
        simplify_with(&expr, &Assumptions::default(), Some(&mut tracer));
        assert!(!tracer.is_empty());
    }
}
