// ABOUTME: Bottom-up normalizer: flattens +/* chains, orders terms,
// folds constant runs, and rebuilds right-associative trees

use crate::ast::{BinaryOp, Expr};
use std::cmp::Ordering;
use std::rc::Rc;

/// Normalize bottom-up. Associative-commutative `+` and `*` chains are
/// flattened into term lists, sorted (numbers first, variables
/// alphabetically, other nodes by rendered form), constant runs folded,
/// and the identities `0 + x`, `1 * x`, `0 * x` applied.
pub fn normalize(expr: &Rc<Expr>) -> Rc<Expr> {
    let node = Rc::new(expr.map_children(&mut |child| normalize(child)));
    match &*node {
        Expr::Binary {
            op: op @ (BinaryOp::Add | BinaryOp::Mul),
            ..
        } => normalize_chain(*op, &node),
        _ => node,
    }
}

fn flatten(op: BinaryOp, expr: &Rc<Expr>, terms: &mut Vec<Rc<Expr>>) {
    match &**expr {
        Expr::Binary {
            op: inner,
            left,
            right,
        } if *inner == op => {
            flatten(op, left, terms);
            flatten(op, right, terms);
        }
        _ => terms.push(expr.clone()),
    }
}

/// Total order over terms: numbers first (by value), then variables
/// (alphabetically), then everything else by its rendered form.
fn term_order(a: &Rc<Expr>, b: &Rc<Expr>) -> Ordering {
    match (&**a, &**b) {
        (Expr::Number(x), Expr::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Expr::Number(_), _) => Ordering::Less,
        (_, Expr::Number(_)) => Ordering::Greater,
        (Expr::Variable(x), Expr::Variable(y)) => x.cmp(y),
        (Expr::Variable(_), _) => Ordering::Less,
        (_, Expr::Variable(_)) => Ordering::Greater,
        _ => a.to_latex().cmp(&b.to_latex()),
    }
}

fn normalize_chain(op: BinaryOp, node: &Rc<Expr>) -> Rc<Expr> {
    let mut terms = Vec::new();
    flatten(op, node, &mut terms);
    terms.sort_by(term_order);

    // Fold the constant run
    let mut constant = if op == BinaryOp::Add { 0.0 } else { 1.0 };
    let mut rest = Vec::with_capacity(terms.len());
    for term in terms {
        match *term {
            Expr::Number(n) => {
                if op == BinaryOp::Add {
                    constant += n;
                } else {
                    constant *= n;
                }
            }
            _ => rest.push(term),
        }
    }

    // 0 * anything collapses the whole chain
    if op == BinaryOp::Mul && constant == 0.0 {
        return Expr::number(0.0);
    }

    let identity = if op == BinaryOp::Add { 0.0 } else { 1.0 };
    let mut ordered = Vec::with_capacity(rest.len() + 1);
    if constant != identity || rest.is_empty() {
        ordered.push(Expr::number(constant));
    }
    ordered.extend(rest);

    rebuild(op, ordered)
}

/// Right-associative rebuild: `[a, b, c]` becomes `a op (b op c)`.
fn rebuild(op: BinaryOp, terms: Vec<Rc<Expr>>) -> Rc<Expr> {
    let mut iter = terms.into_iter().rev();
    let Some(last) = iter.next() else {
        return Expr::number(if op == BinaryOp::Add { 0.0 } else { 1.0 });
    };
    iter.fold(last, |acc, term| Expr::binary(op, term, acc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_folding_in_sums() {
        // 1 + x + 2 normalizes to 3 + x
        let expr = Expr::add(
            Expr::add(Expr::number(1.0), Expr::variable("x")),
            Expr::number(2.0),
        );
        let normalized = normalize(&expr);
        assert_eq!(normalized, Expr::add(Expr::number(3.0), Expr::variable("x")));
    }

    #[test]
    fn test_zero_sum_identity() {
        // 0 + x normalizes to x
        let expr = Expr::add(Expr::number(0.0), Expr::variable("x"));
        assert_eq!(normalize(&expr), Expr::variable("x"));
    }

    #[test]
    fn test_unit_product_identity() {
        let expr = Expr::mul(Expr::number(1.0), Expr::variable("x"));
        assert_eq!(normalize(&expr), Expr::variable("x"));
    }

    #[test]
    fn test_zero_product_collapses() {
        let expr = Expr::mul(
            Expr::variable("x"),
            Expr::mul(Expr::number(0.0), Expr::variable("y")),
        );
        assert_eq!(normalize(&expr), Expr::number(0.0));
    }

    #[test]
    fn test_terms_are_ordered() {
        // y + 2 + x normalizes to 2 + x + y
        let expr = Expr::add(
            Expr::add(Expr::variable("y"), Expr::number(2.0)),
            Expr::variable("x"),
        );
        let normalized = normalize(&expr);
        let expected = Expr::add(
            Expr::number(2.0),
            Expr::add(Expr::variable("x"), Expr::variable("y")),
        );
        assert_eq!(normalized, expected);
    }

    #[test]
    fn test_constant_chain_folds_fully() {
        let expr = Expr::mul(
            Expr::number(2.0),
            Expr::mul(Expr::number(3.0), Expr::number(4.0)),
        );
        assert_eq!(normalize(&expr), Expr::number(24.0));
    }

    #[test]
    fn test_nested_in_other_nodes() {
        // sin(0 + x) normalizes the argument
        let expr = Expr::call1("sin", Expr::add(Expr::number(0.0), Expr::variable("x")));
        assert_eq!(normalize(&expr), Expr::call1("sin", Expr::variable("x")));
    }

    #[test]
    fn test_duplicate_terms_sort_adjacent() {
        let x = Expr::variable("x");
        let y = Expr::variable("y");

        // y + x + x reorders so the equal terms pair up for the rules
        let expr = Expr::add(Expr::add(y.clone(), x.clone()), x.clone());
        let expected = Expr::add(x.clone(), Expr::add(x, y));
        assert_eq!(normalize(&expr), expected);
    }

    #[test]
    fn test_idempotent() {
        let expr = Expr::add(
            Expr::add(Expr::variable("y"), Expr::number(2.0)),
            Expr::mul(Expr::number(1.0), Expr::variable("x")),
        );
        let once = normalize(&expr);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }
}
