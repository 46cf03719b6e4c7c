// ABOUTME: Polynomial operations: expansion (binomial theorem, FOIL),
// factoring (difference of squares, monic quadratics), and solvers

use super::steps::{Step, StepTracer};
use super::engine::RuleCategory;
use crate::ast::{BinaryOp, ComparisonOp, Expr};
use crate::error::TexprError;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Binomial expansion applies up to this exponent.
const MAX_EXPANSION_POWER: i64 = 10;

/// Integer search window for monic quadratic factoring.
const FACTOR_SEARCH_LIMIT: i64 = 100;

fn record(
    tracer: &mut Option<&mut StepTracer>,
    rule: &str,
    description: &str,
    before: &Expr,
    after: &Expr,
) {
    if let Some(tracer) = tracer.as_deref_mut() {
        tracer.record(Step {
            category: RuleCategory::Expansion,
            rule: rule.to_string(),
            description: description.to_string(),
            before: before.to_latex(),
            after: after.to_latex(),
        });
    }
}

// ============================================================================
// Expansion
// ============================================================================

fn is_sum(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Binary {
            op: BinaryOp::Add | BinaryOp::Sub,
            ..
        }
    )
}

/// Flatten an additive tree into terms, folding subtraction into
/// negations.
fn additive_terms(expr: &Rc<Expr>, out: &mut Vec<Rc<Expr>>) {
    match &**expr {
        Expr::Binary {
            op: BinaryOp::Add,
            left,
            right,
        } => {
            additive_terms(left, out);
            additive_terms(right, out);
        }
        Expr::Binary {
            op: BinaryOp::Sub,
            left,
            right,
        } => {
            additive_terms(left, out);
            let mut negated = Vec::new();
            additive_terms(right, &mut negated);
            out.extend(negated.into_iter().map(Expr::neg));
        }
        _ => out.push(expr.clone()),
    }
}

fn sum_of(terms: Vec<Rc<Expr>>) -> Rc<Expr> {
    let mut iter = terms.into_iter();
    let Some(first) = iter.next() else {
        return Expr::number(0.0);
    };
    iter.fold(first, Expr::add)
}

/// Distribute a product of sums: every left term against every right
/// term.
fn distribute(left: &Rc<Expr>, right: &Rc<Expr>) -> Rc<Expr> {
    let mut left_terms = Vec::new();
    let mut right_terms = Vec::new();
    additive_terms(left, &mut left_terms);
    additive_terms(right, &mut right_terms);
    let mut products = Vec::with_capacity(left_terms.len() * right_terms.len());
    for l in &left_terms {
        for r in &right_terms {
            products.push(Expr::mul(l.clone(), r.clone()));
        }
    }
    sum_of(products)
}

/// `(a+b)^n` by the binomial theorem; bases with more than two terms
/// expand by repeated distribution.
fn expand_power(base: &Rc<Expr>, n: i64) -> Rc<Expr> {
    let mut terms = Vec::new();
    additive_terms(base, &mut terms);
    if terms.len() == 2 {
        let a = &terms[0];
        let b = &terms[1];
        let mut expanded = Vec::with_capacity(n as usize + 1);
        let mut coefficient = 1.0f64;
        for k in 0..=n {
            let a_power = Expr::pow(a.clone(), Expr::number((n - k) as f64));
            let b_power = Expr::pow(b.clone(), Expr::number(k as f64));
            expanded.push(Expr::mul(
                Expr::number(coefficient),
                Expr::mul(a_power, b_power),
            ));
            coefficient = coefficient * (n - k) as f64 / (k + 1) as f64;
        }
        return sum_of(expanded);
    }
    let mut result = base.clone();
    for _ in 1..n {
        result = distribute(&result, base);
    }
    result
}

/// Bottom-up structural expansion: binomial powers and products of sums.
pub fn expand_node(expr: &Rc<Expr>, tracer: &mut Option<&mut StepTracer>) -> Rc<Expr> {
    let node = Rc::new(expr.map_children(&mut |child| expand_node(child, tracer)));
    match &*node {
        Expr::Binary {
            op: BinaryOp::Pow,
            left,
            right,
        } if is_sum(left) => {
            let Some(n) = right.as_integer() else {
                return node;
            };
            if !(0..=MAX_EXPANSION_POWER).contains(&n) {
                return node;
            }
            if n == 0 {
                return Expr::number(1.0);
            }
            if n == 1 {
                return left.clone();
            }
            let expanded = expand_power(left, n);
            record(
                tracer,
                "binomial-theorem",
                "expand a power of a sum term by term",
                &node,
                &expanded,
            );
            expanded
        }
        Expr::Binary {
            op: BinaryOp::Mul,
            left,
            right,
        } if is_sum(left) || is_sum(right) => {
            let expanded = distribute(left, right);
            record(
                tracer,
                "distribute",
                "multiply out a product of sums",
                &node,
                &expanded,
            );
            expanded
        }
        _ => node,
    }
}

// ============================================================================
// Factoring
// ============================================================================

/// The square root of a perfect-square node: `x^2` gives `x`, a
/// non-negative number with an integral root gives that root.
fn as_square(expr: &Rc<Expr>) -> Option<Rc<Expr>> {
    match &**expr {
        Expr::Binary {
            op: BinaryOp::Pow,
            left,
            right,
        } if right.as_number() == Some(2.0) => Some(left.clone()),
        Expr::Number(n) if *n >= 0.0 => {
            let root = n.sqrt();
            if root.fract() == 0.0 {
                Some(Expr::number(root))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn difference_of_squares(expr: &Rc<Expr>) -> Option<Rc<Expr>> {
    let Expr::Binary {
        op: BinaryOp::Sub,
        left,
        right,
    } = &**expr
    else {
        return None;
    };
    let a = as_square(left)?;
    let b = as_square(right)?;
    Some(Expr::mul(
        Expr::sub(a.clone(), b.clone()),
        Expr::add(a, b),
    ))
}

/// `x + k` with the sign folded into the operator.
fn linear_factor(var: &str, k: f64) -> Rc<Expr> {
    let x = Expr::variable(var);
    if k == 0.0 {
        x
    } else if k < 0.0 {
        Expr::sub(x, Expr::number(-k))
    } else {
        Expr::add(x, Expr::number(k))
    }
}

/// Monic quadratic `x^2 + bx + c` by integer root search over `|p| <=
/// 100`.
fn monic_quadratic(expr: &Rc<Expr>) -> Option<Rc<Expr>> {
    let vars = expr.free_variable_set();
    let vars: Vec<&String> = vars.iter().filter(|v| !crate::eval::is_constant(v)).collect();
    if vars.len() != 1 {
        return None;
    }
    let var = vars[0].clone();

    let coefficients = numeric_coefficients(expr, &var)?;
    if coefficients.len() != 3 || coefficients[2] != 1.0 {
        return None;
    }
    let b = coefficients[1];
    let c = coefficients[0];
    if b.fract() != 0.0 || c.fract() != 0.0 {
        return None;
    }
    let (b, c) = (b as i64, c as i64);

    for p in -FACTOR_SEARCH_LIMIT..=FACTOR_SEARCH_LIMIT {
        let q = b - p;
        if p * q == c {
            return Some(Expr::mul(
                linear_factor(&var, p as f64),
                linear_factor(&var, q as f64),
            ));
        }
    }
    None
}

/// Factor a (simplified) expression; anything unmatched is returned
/// unchanged.
pub fn factor_node(expr: &Rc<Expr>, tracer: &mut Option<&mut StepTracer>) -> Rc<Expr> {
    if let Some(factored) = difference_of_squares(expr) {
        record(
            tracer,
            "difference-of-squares",
            "a^2 - b^2 factors into (a - b)(a + b)",
            expr,
            &factored,
        );
        return factored;
    }
    if let Some(factored) = monic_quadratic(expr) {
        record(
            tracer,
            "monic-quadratic",
            "split a monic quadratic by integer root search",
            expr,
            &factored,
        );
        return factored;
    }
    expr.clone()
}

// ============================================================================
// Coefficient extraction and solvers
// ============================================================================

/// Symbolic coefficients by degree in `var`. `None` when the expression
/// is not polynomial in the variable.
pub fn collect_coefficients(
    expr: &Rc<Expr>,
    var: &str,
) -> Option<BTreeMap<u32, Rc<Expr>>> {
    match &**expr {
        Expr::Number(n) => Some(BTreeMap::from([(0, Expr::number(*n))])),
        Expr::Variable(name) if name == var => {
            Some(BTreeMap::from([(1, Expr::number(1.0))]))
        }
        Expr::Variable(_) => Some(BTreeMap::from([(0, expr.clone())])),
        Expr::Negate(inner) => {
            let mut coefficients = collect_coefficients(inner, var)?;
            for value in coefficients.values_mut() {
                *value = Expr::neg(value.clone());
            }
            Some(coefficients)
        }
        Expr::Binary { op, left, right } => match op {
            BinaryOp::Add | BinaryOp::Sub => {
                let mut combined = collect_coefficients(left, var)?;
                let other = collect_coefficients(right, var)?;
                for (degree, value) in other {
                    let value = if *op == BinaryOp::Sub {
                        Expr::neg(value)
                    } else {
                        value
                    };
                    combined
                        .entry(degree)
                        .and_modify(|existing| *existing = Expr::add(existing.clone(), value.clone()))
                        .or_insert(value);
                }
                Some(combined)
            }
            BinaryOp::Mul => {
                let a = collect_coefficients(left, var)?;
                let b = collect_coefficients(right, var)?;
                let mut combined: BTreeMap<u32, Rc<Expr>> = BTreeMap::new();
                for (da, ca) in &a {
                    for (db, cb) in &b {
                        let degree = da + db;
                        let product = Expr::mul(ca.clone(), cb.clone());
                        combined
                            .entry(degree)
                            .and_modify(|existing| {
                                *existing = Expr::add(existing.clone(), product.clone())
                            })
                            .or_insert(product);
                    }
                }
                Some(combined)
            }
            BinaryOp::Div => {
                // Division only by a var-free expression
                if right.free_variable_set().contains(var) {
                    return None;
                }
                let mut coefficients = collect_coefficients(left, var)?;
                for value in coefficients.values_mut() {
                    *value = Expr::div(value.clone(), right.clone());
                }
                Some(coefficients)
            }
            BinaryOp::Pow => {
                let n = right.as_integer()?;
                if !(0..=MAX_EXPANSION_POWER).contains(&n) {
                    return None;
                }
                let base = collect_coefficients(left, var)?;
                let mut result: BTreeMap<u32, Rc<Expr>> =
                    BTreeMap::from([(0, Expr::number(1.0))]);
                for _ in 0..n {
                    let mut next: BTreeMap<u32, Rc<Expr>> = BTreeMap::new();
                    for (da, ca) in &result {
                        for (db, cb) in &base {
                            let degree = da + db;
                            let product = Expr::mul(ca.clone(), cb.clone());
                            next.entry(degree)
                                .and_modify(|existing| {
                                    *existing = Expr::add(existing.clone(), product.clone())
                                })
                                .or_insert(product);
                        }
                    }
                    result = next;
                }
                Some(result)
            }
        },
        _ => {
            if expr.free_variable_set().contains(var) {
                None
            } else {
                Some(BTreeMap::from([(0, expr.clone())]))
            }
        }
    }
}

/// Dense numeric coefficient vector, lowest degree first.
fn numeric_coefficients(expr: &Rc<Expr>, var: &str) -> Option<Vec<f64>> {
    let symbolic = collect_coefficients(expr, var)?;
    let max_degree = symbolic.keys().max().copied().unwrap_or(0);
    let mut dense = vec![0.0; max_degree as usize + 1];
    for (degree, coefficient) in symbolic {
        let simplified = super::simplify(&coefficient);
        dense[degree as usize] = simplified.as_number()?;
    }
    Some(dense)
}

/// An equation solves its left-minus-right; anything else solves
/// `expr = 0`.
fn equation_body(expr: &Rc<Expr>) -> Rc<Expr> {
    match &**expr {
        Expr::Comparison {
            op: ComparisonOp::Equal,
            left,
            right,
        } => {
            if right.is_zero() {
                left.clone()
            } else {
                Expr::sub(left.clone(), right.clone())
            }
        }
        _ => expr.clone(),
    }
}

pub fn solve_linear(expr: &Rc<Expr>, var: &str) -> Result<Rc<Expr>, TexprError> {
    let body = equation_body(expr);
    let coefficients = collect_coefficients(&body, var).ok_or_else(|| {
        TexprError::evaluator(format!("expression is not polynomial in {var}"))
    })?;
    if coefficients.keys().any(|&degree| degree > 1) {
        return Err(TexprError::evaluator(format!(
            "expression is not linear in {var}"
        )));
    }
    let slope = coefficients
        .get(&1)
        .cloned()
        .ok_or_else(|| TexprError::evaluator(format!("{var} does not appear in the expression")))?;
    if super::simplify(&slope).is_zero() {
        return Err(TexprError::evaluator(format!(
            "the coefficient of {var} is zero"
        )));
    }
    let constant = coefficients.get(&0).cloned().unwrap_or_else(|| Expr::number(0.0));
    Ok(super::simplify(&Expr::div(Expr::neg(constant), slope)))
}

/// Roots of a quadratic: 0, 1, or 2 depending on the discriminant when
/// the coefficients are numeric; the symbolic quadratic formula
/// otherwise.
pub fn solve_quadratic(expr: &Rc<Expr>, var: &str) -> Result<Vec<Rc<Expr>>, TexprError> {
    let body = equation_body(expr);
    let coefficients = collect_coefficients(&body, var).ok_or_else(|| {
        TexprError::evaluator(format!("expression is not polynomial in {var}"))
    })?;
    if coefficients.keys().any(|&degree| degree > 2) {
        return Err(TexprError::evaluator(format!(
            "expression has degree above 2 in {var}"
        )));
    }
    let a = coefficients.get(&2).cloned();
    let Some(a) = a else {
        return Ok(vec![solve_linear(&body, var)?]);
    };
    let b = coefficients.get(&1).cloned().unwrap_or_else(|| Expr::number(0.0));
    let c = coefficients.get(&0).cloned().unwrap_or_else(|| Expr::number(0.0));

    let a_simplified = super::simplify(&a);
    let b_simplified = super::simplify(&b);
    let c_simplified = super::simplify(&c);

    if let (Some(a), Some(b), Some(c)) = (
        a_simplified.as_number(),
        b_simplified.as_number(),
        c_simplified.as_number(),
    ) {
        if a == 0.0 {
            return Ok(vec![solve_linear(&body, var)?]);
        }
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return Ok(Vec::new());
        }
        if discriminant == 0.0 {
            return Ok(vec![Expr::number(-b / (2.0 * a))]);
        }
        let root = discriminant.sqrt();
        return Ok(vec![
            Expr::number((-b + root) / (2.0 * a)),
            Expr::number((-b - root) / (2.0 * a)),
        ]);
    }

    // Symbolic coefficients: both quadratic-formula branches
    let discriminant = Expr::sub(
        Expr::pow(b_simplified.clone(), Expr::number(2.0)),
        Expr::mul(
            Expr::number(4.0),
            Expr::mul(a_simplified.clone(), c_simplified),
        ),
    );
    let root = Expr::call1("sqrt", discriminant);
    let denominator = Expr::mul(Expr::number(2.0), a_simplified);
    let negative_b = Expr::neg(b_simplified);
    Ok(vec![
        super::simplify(&Expr::div(
            Expr::add(negative_b.clone(), root.clone()),
            denominator.clone(),
        )),
        super::simplify(&Expr::div(Expr::sub(negative_b, root), denominator)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::simplify;

    #[test]
    fn test_expand_product_of_sums() {
        // (x + 1)(x - 1) distributes and simplifies to x^2 - 1 shape
        let x = Expr::variable("x");
        let expr = Expr::mul(
            Expr::add(x.clone(), Expr::number(1.0)),
            Expr::sub(x.clone(), Expr::number(1.0)),
        );
        let expanded = simplify(&expand_node(&expr, &mut None));
        // x*x + x*(-1) + 1*x + 1*(-1) collapses: the linear terms cancel
        let expected = simplify(&Expr::add(
            Expr::pow(x, Expr::number(2.0)),
            Expr::number(-1.0),
        ));
        assert_eq!(expanded, expected);
    }

    #[test]
    fn test_binomial_power_values() {
        // (x + 2)^3 at x = 1 is 27
        let x = Expr::variable("x");
        let expr = Expr::pow(
            Expr::add(x, Expr::number(2.0)),
            Expr::number(3.0),
        );
        let expanded = expand_node(&expr, &mut None);
        assert!(!matches!(
            &*expanded,
            Expr::Binary {
                op: BinaryOp::Pow,
                ..
            }
        ));

        let env = crate::env::Environment::new();
        env.define("x", crate::value::Value::Number(1.0));
        let value = crate::eval::evaluate(&expanded, &env)
            .unwrap()
            .as_number()
            .unwrap();
        assert!((value - 27.0).abs() < 1e-9);
    }

    #[test]
    fn test_large_powers_left_alone() {
        let x = Expr::variable("x");
        let expr = Expr::pow(
            Expr::add(x, Expr::number(1.0)),
            Expr::number(11.0),
        );
        let expanded = expand_node(&expr, &mut None);
        assert_eq!(expanded, expr);
    }

    #[test]
    fn test_factor_quadratic() {
        // x^2 + 5x + 6 factors to (x + 2)(x + 3)
        let x = Expr::variable("x");
        let expr = Expr::add(
            Expr::pow(x.clone(), Expr::number(2.0)),
            Expr::add(
                Expr::mul(Expr::number(5.0), x.clone()),
                Expr::number(6.0),
            ),
        );
        let factored = factor_node(&expr, &mut None);
        let expected = Expr::mul(
            Expr::add(x.clone(), Expr::number(2.0)),
            Expr::add(x, Expr::number(3.0)),
        );
        assert_eq!(factored, expected);
    }

    #[test]
    fn test_solve_linear() {
        // 2x + 6 = 0 gives x = -3
        let x = Expr::variable("x");
        let expr = Expr::add(
            Expr::mul(Expr::number(2.0), x),
            Expr::number(6.0),
        );
        let root = solve_linear(&expr, "x").unwrap();
        assert_eq!(root, Expr::number(-3.0));
    }

    #[test]
    fn test_solve_quadratic_two_roots() {
        // x^2 - 1 has roots 1 and -1
        let x = Expr::variable("x");
        let expr = Expr::sub(Expr::pow(x, Expr::number(2.0)), Expr::number(1.0));
        let roots = solve_quadratic(&expr, "x").unwrap();
        assert_eq!(roots, vec![Expr::number(1.0), Expr::number(-1.0)]);
    }

    #[test]
    fn test_solve_quadratic_discriminant_cases() {
        let x = Expr::variable("x");
        // x^2 + 1: no real roots
        let expr = Expr::add(
            Expr::pow(x.clone(), Expr::number(2.0)),
            Expr::number(1.0),
        );
        assert!(solve_quadratic(&expr, "x").unwrap().is_empty());

        // x^2 - 2x + 1: one double root
        let expr = Expr::add(
            Expr::sub(
                Expr::pow(x.clone(), Expr::number(2.0)),
                Expr::mul(Expr::number(2.0), x),
            ),
            Expr::number(1.0),
        );
        let roots = solve_quadratic(&expr, "x").unwrap();
        assert_eq!(roots, vec![Expr::number(1.0)]);
    }

    #[test]
    fn test_solve_equation_form() {
        // x^2 = 4 gives roots 2 and -2
        let x = Expr::variable("x");
        let equation = Rc::new(Expr::Comparison {
            op: ComparisonOp::Equal,
            left: Expr::pow(x, Expr::number(2.0)),
            right: Expr::number(4.0),
        });
        let roots = solve_quadratic(&equation, "x").unwrap();
        assert_eq!(roots, vec![Expr::number(2.0), Expr::number(-2.0)]);
    }

    #[test]
    fn test_non_polynomial_rejected() {
        let expr = Expr::call1("sin", Expr::variable("x"));
        assert!(solve_linear(&expr, "x").is_err());
    }
}
