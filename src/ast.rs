// ABOUTME: Expression tree for parsed LaTeX math, with structural
// equality/hashing and LaTeX round-trip rendering

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn is_commutative(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Mul)
    }

    pub fn latex(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "\\cdot",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Less,
    Greater,
    LessEq,
    GreaterEq,
    Equal,
    NotEqual,
    Member,
}

impl ComparisonOp {
    pub fn latex(self) -> &'static str {
        match self {
            ComparisonOp::Less => "<",
            ComparisonOp::Greater => ">",
            ComparisonOp::LessEq => "\\leq",
            ComparisonOp::GreaterEq => "\\geq",
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "\\neq",
            ComparisonOp::Member => "\\in",
        }
    }

    /// Chain direction: `<`/`≤` ascend, `>`/`≥` descend, the rest are
    /// neutral. Mixing ascending with descending in one chain is invalid.
    pub fn direction(self) -> i8 {
        match self {
            ComparisonOp::Less | ComparisonOp::LessEq => -1,
            ComparisonOp::Greater | ComparisonOp::GreaterEq => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    And,
    Or,
    Xor,
}

impl BoolOp {
    pub fn latex(self) -> &'static str {
        match self {
            BoolOp::And => "\\land",
            BoolOp::Or => "\\lor",
            BoolOp::Xor => "\\oplus",
        }
    }
}

/// One arm of a piecewise expression. A missing condition is the
/// "otherwise" arm and always matches.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub value: Rc<Expr>,
    pub condition: Option<Rc<Expr>>,
}

/// A parsed expression. Nodes are immutable once built; children are
/// shared behind `Rc` so sub-trees can be reused without copying.
#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary {
        op: BinaryOp,
        left: Rc<Expr>,
        right: Rc<Expr>,
    },
    Negate(Rc<Expr>),
    /// A named function application. `base` carries a `\log_b` subscript,
    /// `param` carries a `\sqrt[n]` index.
    Call {
        name: String,
        args: Vec<Rc<Expr>>,
        base: Option<Rc<Expr>>,
        param: Option<Rc<Expr>>,
    },
    Abs(Rc<Expr>),
    Limit {
        var: String,
        target: Rc<Expr>,
        body: Rc<Expr>,
    },
    Sum {
        var: String,
        start: Rc<Expr>,
        end: Rc<Expr>,
        body: Rc<Expr>,
    },
    Product {
        var: String,
        start: Rc<Expr>,
        end: Rc<Expr>,
        body: Rc<Expr>,
    },
    Integral {
        lower: Option<Rc<Expr>>,
        upper: Option<Rc<Expr>>,
        body: Rc<Expr>,
        var: String,
        closed: bool,
    },
    MultiIntegral {
        order: usize,
        lower: Option<Rc<Expr>>,
        upper: Option<Rc<Expr>>,
        body: Rc<Expr>,
        vars: Vec<String>,
    },
    Derivative {
        body: Rc<Expr>,
        var: String,
        order: u32,
    },
    PartialDerivative {
        body: Rc<Expr>,
        var: String,
        order: u32,
    },
    Binom {
        upper: Rc<Expr>,
        lower: Rc<Expr>,
    },
    Gradient {
        body: Rc<Expr>,
        vars: Option<Vec<String>>,
    },
    Comparison {
        op: ComparisonOp,
        left: Rc<Expr>,
        right: Rc<Expr>,
    },
    ChainedComparison {
        exprs: Vec<Rc<Expr>>,
        ops: Vec<ComparisonOp>,
    },
    BooleanBinary {
        op: BoolOp,
        left: Rc<Expr>,
        right: Rc<Expr>,
    },
    Not(Rc<Expr>),
    Conditional {
        body: Rc<Expr>,
        condition: Rc<Expr>,
    },
    Piecewise {
        cases: Vec<Case>,
    },
    Matrix {
        rows: Vec<Vec<Rc<Expr>>>,
    },
    Vector {
        components: Vec<Rc<Expr>>,
        unit: bool,
    },
    Interval {
        lower: Rc<Expr>,
        upper: Rc<Expr>,
    },
    Assignment {
        name: String,
        value: Rc<Expr>,
    },
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Rc<Expr>,
    },
}

// ============================================================================
// Constructors
// ============================================================================

impl Expr {
    pub fn number(n: f64) -> Rc<Expr> {
        Rc::new(Expr::Number(n))
    }

    pub fn variable(name: impl Into<String>) -> Rc<Expr> {
        Rc::new(Expr::Variable(name.into()))
    }

    pub fn binary(op: BinaryOp, left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        Rc::new(Expr::Binary { op, left, right })
    }

    pub fn add(left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        Expr::binary(BinaryOp::Add, left, right)
    }

    pub fn sub(left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        Expr::binary(BinaryOp::Sub, left, right)
    }

    pub fn mul(left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        Expr::binary(BinaryOp::Mul, left, right)
    }

    pub fn div(left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        Expr::binary(BinaryOp::Div, left, right)
    }

    pub fn pow(left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        Expr::binary(BinaryOp::Pow, left, right)
    }

    pub fn neg(operand: Rc<Expr>) -> Rc<Expr> {
        Rc::new(Expr::Negate(operand))
    }

    pub fn call(name: impl Into<String>, args: Vec<Rc<Expr>>) -> Rc<Expr> {
        Rc::new(Expr::Call {
            name: name.into(),
            args,
            base: None,
            param: None,
        })
    }

    pub fn call1(name: impl Into<String>, arg: Rc<Expr>) -> Rc<Expr> {
        Expr::call(name, vec![arg])
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Number(n) if *n == 0.0)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Number(n) if *n == 1.0)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Expr::Number(n) => Some(*n),
            Expr::Negate(inner) => inner.as_number().map(|n| -n),
            _ => None,
        }
    }

    /// Integer value, when the node is a whole number.
    pub fn as_integer(&self) -> Option<i64> {
        let n = self.as_number()?;
        if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
            Some(n as i64)
        } else {
            None
        }
    }

    pub fn is_definition(&self) -> bool {
        matches!(self, Expr::Assignment { .. } | Expr::FunctionDef { .. })
    }
}

// ============================================================================
// Traversal
// ============================================================================

impl Expr {
    /// Rebuild this node with every direct child passed through `f`.
    /// Leaves are cloned unchanged.
    pub fn map_children(&self, f: &mut dyn FnMut(&Rc<Expr>) -> Rc<Expr>) -> Expr {
        match self {
            Expr::Number(_) | Expr::Variable(_) => self.clone(),
            Expr::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: f(left),
                right: f(right),
            },
            Expr::Negate(inner) => Expr::Negate(f(inner)),
            Expr::Call {
                name,
                args,
                base,
                param,
            } => Expr::Call {
                name: name.clone(),
                args: args.iter().map(|a| f(a)).collect(),
                base: base.as_ref().map(|b| f(b)),
                param: param.as_ref().map(|p| f(p)),
            },
            Expr::Abs(inner) => Expr::Abs(f(inner)),
            Expr::Limit { var, target, body } => Expr::Limit {
                var: var.clone(),
                target: f(target),
                body: f(body),
            },
            Expr::Sum {
                var,
                start,
                end,
                body,
            } => Expr::Sum {
                var: var.clone(),
                start: f(start),
                end: f(end),
                body: f(body),
            },
            Expr::Product {
                var,
                start,
                end,
                body,
            } => Expr::Product {
                var: var.clone(),
                start: f(start),
                end: f(end),
                body: f(body),
            },
            Expr::Integral {
                lower,
                upper,
                body,
                var,
                closed,
            } => Expr::Integral {
                lower: lower.as_ref().map(|e| f(e)),
                upper: upper.as_ref().map(|e| f(e)),
                body: f(body),
                var: var.clone(),
                closed: *closed,
            },
            Expr::MultiIntegral {
                order,
                lower,
                upper,
                body,
                vars,
            } => Expr::MultiIntegral {
                order: *order,
                lower: lower.as_ref().map(|e| f(e)),
                upper: upper.as_ref().map(|e| f(e)),
                body: f(body),
                vars: vars.clone(),
            },
            Expr::Derivative { body, var, order } => Expr::Derivative {
                body: f(body),
                var: var.clone(),
                order: *order,
            },
            Expr::PartialDerivative { body, var, order } => Expr::PartialDerivative {
                body: f(body),
                var: var.clone(),
                order: *order,
            },
            Expr::Binom { upper, lower } => Expr::Binom {
                upper: f(upper),
                lower: f(lower),
            },
            Expr::Gradient { body, vars } => Expr::Gradient {
                body: f(body),
                vars: vars.clone(),
            },
            Expr::Comparison { op, left, right } => Expr::Comparison {
                op: *op,
                left: f(left),
                right: f(right),
            },
            Expr::ChainedComparison { exprs, ops } => Expr::ChainedComparison {
                exprs: exprs.iter().map(|e| f(e)).collect(),
                ops: ops.clone(),
            },
            Expr::BooleanBinary { op, left, right } => Expr::BooleanBinary {
                op: *op,
                left: f(left),
                right: f(right),
            },
            Expr::Not(inner) => Expr::Not(f(inner)),
            Expr::Conditional { body, condition } => Expr::Conditional {
                body: f(body),
                condition: f(condition),
            },
            Expr::Piecewise { cases } => Expr::Piecewise {
                cases: cases
                    .iter()
                    .map(|c| Case {
                        value: f(&c.value),
                        condition: c.condition.as_ref().map(|e| f(e)),
                    })
                    .collect(),
            },
            Expr::Matrix { rows } => Expr::Matrix {
                rows: rows
                    .iter()
                    .map(|row| row.iter().map(|e| f(e)).collect())
                    .collect(),
            },
            Expr::Vector { components, unit } => Expr::Vector {
                components: components.iter().map(|e| f(e)).collect(),
                unit: *unit,
            },
            Expr::Interval { lower, upper } => Expr::Interval {
                lower: f(lower),
                upper: f(upper),
            },
            Expr::Assignment { name, value } => Expr::Assignment {
                name: name.clone(),
                value: f(value),
            },
            Expr::FunctionDef { name, params, body } => Expr::FunctionDef {
                name: name.clone(),
                params: params.clone(),
                body: f(body),
            },
        }
    }

    /// Collect free variables, honouring the binders (sum/product index,
    /// limit variable, integration variable, function parameters).
    pub fn free_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Variable(name) => {
                out.insert(name.clone());
            }
            Expr::Sum {
                var,
                start,
                end,
                body,
            }
            | Expr::Product {
                var,
                start,
                end,
                body,
            } => {
                start.free_variables(out);
                end.free_variables(out);
                let mut inner = BTreeSet::new();
                body.free_variables(&mut inner);
                inner.remove(var);
                out.extend(inner);
            }
            Expr::Limit { var, target, body } => {
                target.free_variables(out);
                let mut inner = BTreeSet::new();
                body.free_variables(&mut inner);
                inner.remove(var);
                out.extend(inner);
            }
            Expr::Integral {
                lower,
                upper,
                body,
                var,
                ..
            } => {
                if let Some(e) = lower {
                    e.free_variables(out);
                }
                if let Some(e) = upper {
                    e.free_variables(out);
                }
                let mut inner = BTreeSet::new();
                body.free_variables(&mut inner);
                inner.remove(var);
                out.extend(inner);
            }
            Expr::MultiIntegral {
                lower,
                upper,
                body,
                vars,
                ..
            } => {
                if let Some(e) = lower {
                    e.free_variables(out);
                }
                if let Some(e) = upper {
                    e.free_variables(out);
                }
                let mut inner = BTreeSet::new();
                body.free_variables(&mut inner);
                for var in vars {
                    inner.remove(var);
                }
                out.extend(inner);
            }
            Expr::FunctionDef { params, body, .. } => {
                let mut inner = BTreeSet::new();
                body.free_variables(&mut inner);
                for param in params {
                    inner.remove(param);
                }
                out.extend(inner);
            }
            other => {
                other.map_children(&mut |child| {
                    child.free_variables(out);
                    child.clone()
                });
            }
        }
    }

    /// Convenience wrapper returning the free-variable set.
    pub fn free_variable_set(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.free_variables(&mut out);
        out
    }
}

// ============================================================================
// Structural equality and hashing
// ============================================================================

// Numbers compare and hash by bit pattern so the AST is a well-behaved
// map key. Field order in the hash keeps non-commutative operands
// distinguishable: hash(a - b) != hash(b - a) whenever a != b.

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        use Expr::*;
        match (self, other) {
            (Number(a), Number(b)) => a.to_bits() == b.to_bits(),
            (Variable(a), Variable(b)) => a == b,
            (
                Binary {
                    op: o1,
                    left: l1,
                    right: r1,
                },
                Binary {
                    op: o2,
                    left: l2,
                    right: r2,
                },
            ) => o1 == o2 && l1 == l2 && r1 == r2,
            (Negate(a), Negate(b)) => a == b,
            (
                Call {
                    name: n1,
                    args: a1,
                    base: b1,
                    param: p1,
                },
                Call {
                    name: n2,
                    args: a2,
                    base: b2,
                    param: p2,
                },
            ) => n1 == n2 && a1 == a2 && b1 == b2 && p1 == p2,
            (Abs(a), Abs(b)) => a == b,
            (
                Limit {
                    var: v1,
                    target: t1,
                    body: b1,
                },
                Limit {
                    var: v2,
                    target: t2,
                    body: b2,
                },
            ) => v1 == v2 && t1 == t2 && b1 == b2,
            (
                Sum {
                    var: v1,
                    start: s1,
                    end: e1,
                    body: b1,
                },
                Sum {
                    var: v2,
                    start: s2,
                    end: e2,
                    body: b2,
                },
            ) => v1 == v2 && s1 == s2 && e1 == e2 && b1 == b2,
            (
                Product {
                    var: v1,
                    start: s1,
                    end: e1,
                    body: b1,
                },
                Product {
                    var: v2,
                    start: s2,
                    end: e2,
                    body: b2,
                },
            ) => v1 == v2 && s1 == s2 && e1 == e2 && b1 == b2,
            (
                Integral {
                    lower: lo1,
                    upper: up1,
                    body: b1,
                    var: v1,
                    closed: c1,
                },
                Integral {
                    lower: lo2,
                    upper: up2,
                    body: b2,
                    var: v2,
                    closed: c2,
                },
            ) => lo1 == lo2 && up1 == up2 && b1 == b2 && v1 == v2 && c1 == c2,
            (
                MultiIntegral {
                    order: o1,
                    lower: lo1,
                    upper: up1,
                    body: b1,
                    vars: v1,
                },
                MultiIntegral {
                    order: o2,
                    lower: lo2,
                    upper: up2,
                    body: b2,
                    vars: v2,
                },
            ) => o1 == o2 && lo1 == lo2 && up1 == up2 && b1 == b2 && v1 == v2,
            (
                Derivative {
                    body: b1,
                    var: v1,
                    order: o1,
                },
                Derivative {
                    body: b2,
                    var: v2,
                    order: o2,
                },
            ) => b1 == b2 && v1 == v2 && o1 == o2,
            (
                PartialDerivative {
                    body: b1,
                    var: v1,
                    order: o1,
                },
                PartialDerivative {
                    body: b2,
                    var: v2,
                    order: o2,
                },
            ) => b1 == b2 && v1 == v2 && o1 == o2,
            (
                Binom {
                    upper: u1,
                    lower: l1,
                },
                Binom {
                    upper: u2,
                    lower: l2,
                },
            ) => u1 == u2 && l1 == l2,
            (
                Gradient { body: b1, vars: v1 },
                Gradient { body: b2, vars: v2 },
            ) => b1 == b2 && v1 == v2,
            (
                Comparison {
                    op: o1,
                    left: l1,
                    right: r1,
                },
                Comparison {
                    op: o2,
                    left: l2,
                    right: r2,
                },
            ) => o1 == o2 && l1 == l2 && r1 == r2,
            (
                ChainedComparison { exprs: e1, ops: o1 },
                ChainedComparison { exprs: e2, ops: o2 },
            ) => e1 == e2 && o1 == o2,
            (
                BooleanBinary {
                    op: o1,
                    left: l1,
                    right: r1,
                },
                BooleanBinary {
                    op: o2,
                    left: l2,
                    right: r2,
                },
            ) => o1 == o2 && l1 == l2 && r1 == r2,
            (Not(a), Not(b)) => a == b,
            (
                Conditional {
                    body: b1,
                    condition: c1,
                },
                Conditional {
                    body: b2,
                    condition: c2,
                },
            ) => b1 == b2 && c1 == c2,
            (Piecewise { cases: c1 }, Piecewise { cases: c2 }) => c1 == c2,
            (Matrix { rows: r1 }, Matrix { rows: r2 }) => r1 == r2,
            (
                Vector {
                    components: c1,
                    unit: u1,
                },
                Vector {
                    components: c2,
                    unit: u2,
                },
            ) => c1 == c2 && u1 == u2,
            (
                Interval {
                    lower: l1,
                    upper: u1,
                },
                Interval {
                    lower: l2,
                    upper: u2,
                },
            ) => l1 == l2 && u1 == u2,
            (
                Assignment {
                    name: n1,
                    value: v1,
                },
                Assignment {
                    name: n2,
                    value: v2,
                },
            ) => n1 == n2 && v1 == v2,
            (
                FunctionDef {
                    name: n1,
                    params: p1,
                    body: b1,
                },
                FunctionDef {
                    name: n2,
                    params: p2,
                    body: b2,
                },
            ) => n1 == n2 && p1 == p2 && b1 == b2,
            _ => false,
        }
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Expr::Number(n) => n.to_bits().hash(state),
            Expr::Variable(name) => name.hash(state),
            Expr::Binary { op, left, right } => {
                op.hash(state);
                left.hash(state);
                right.hash(state);
            }
            Expr::Negate(inner) => inner.hash(state),
            Expr::Call {
                name,
                args,
                base,
                param,
            } => {
                name.hash(state);
                args.hash(state);
                base.hash(state);
                param.hash(state);
            }
            Expr::Abs(inner) => inner.hash(state),
            Expr::Limit { var, target, body } => {
                var.hash(state);
                target.hash(state);
                body.hash(state);
            }
            Expr::Sum {
                var,
                start,
                end,
                body,
            }
            | Expr::Product {
                var,
                start,
                end,
                body,
            } => {
                var.hash(state);
                start.hash(state);
                end.hash(state);
                body.hash(state);
            }
            Expr::Integral {
                lower,
                upper,
                body,
                var,
                closed,
            } => {
                lower.hash(state);
                upper.hash(state);
                body.hash(state);
                var.hash(state);
                closed.hash(state);
            }
            Expr::MultiIntegral {
                order,
                lower,
                upper,
                body,
                vars,
            } => {
                order.hash(state);
                lower.hash(state);
                upper.hash(state);
                body.hash(state);
                vars.hash(state);
            }
            Expr::Derivative { body, var, order }
            | Expr::PartialDerivative { body, var, order } => {
                body.hash(state);
                var.hash(state);
                order.hash(state);
            }
            Expr::Binom { upper, lower } => {
                upper.hash(state);
                lower.hash(state);
            }
            Expr::Gradient { body, vars } => {
                body.hash(state);
                vars.hash(state);
            }
            Expr::Comparison { op, left, right } => {
                op.hash(state);
                left.hash(state);
                right.hash(state);
            }
            Expr::ChainedComparison { exprs, ops } => {
                exprs.hash(state);
                ops.hash(state);
            }
            Expr::BooleanBinary { op, left, right } => {
                op.hash(state);
                left.hash(state);
                right.hash(state);
            }
            Expr::Not(inner) => inner.hash(state),
            Expr::Conditional { body, condition } => {
                body.hash(state);
                condition.hash(state);
            }
            Expr::Piecewise { cases } => {
                for case in cases {
                    case.value.hash(state);
                    case.condition.hash(state);
                }
            }
            Expr::Matrix { rows } => {
                for row in rows {
                    row.hash(state);
                }
                rows.len().hash(state);
            }
            Expr::Vector { components, unit } => {
                components.hash(state);
                unit.hash(state);
            }
            Expr::Interval { lower, upper } => {
                lower.hash(state);
                upper.hash(state);
            }
            Expr::Assignment { name, value } => {
                name.hash(state);
                value.hash(state);
            }
            Expr::FunctionDef { name, params, body } => {
                name.hash(state);
                params.hash(state);
                body.hash(state);
            }
        }
    }
}

// ============================================================================
// LaTeX rendering
// ============================================================================

impl Expr {
    fn precedence(&self) -> u8 {
        match self {
            Expr::Comparison { .. }
            | Expr::ChainedComparison { .. }
            | Expr::BooleanBinary { .. }
            | Expr::Not(_)
            | Expr::Conditional { .. }
            | Expr::Assignment { .. }
            | Expr::FunctionDef { .. } => 1,
            Expr::Binary {
                op: BinaryOp::Add | BinaryOp::Sub,
                ..
            } => 3,
            Expr::Binary {
                op: BinaryOp::Mul, ..
            } => 4,
            Expr::Negate(_) => 5,
            Expr::Binary {
                op: BinaryOp::Pow, ..
            } => 6,
            // \frac{..}{..} and every other command form group on their own
            _ => 10,
        }
    }

    fn render_child(&self, child: &Expr, min_precedence: u8) -> String {
        let rendered = child.to_latex();
        let negative_number = matches!(child, Expr::Number(n) if *n < 0.0);
        if child.precedence() < min_precedence || negative_number {
            format!("({rendered})")
        } else {
            rendered
        }
    }

    /// Render to LaTeX source that parses back to a structurally equal
    /// tree.
    pub fn to_latex(&self) -> String {
        match self {
            Expr::Number(n) => {
                if n.is_infinite() {
                    if *n < 0.0 {
                        "-\\infty".to_string()
                    } else {
                        "\\infty".to_string()
                    }
                } else if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            Expr::Variable(name) => {
                // Subscripted names keep their braces; Greek letters and
                // other registry symbols render as commands; greedy-mode
                // identifiers stay bare.
                if let Some((base, subscript)) = name.split_once('_') {
                    format!("{base}_{{{subscript}}}")
                } else if name.chars().count() > 1 && crate::commands::lookup(name).is_some() {
                    format!("\\{name}")
                } else {
                    name.clone()
                }
            }
            Expr::Binary { op, left, right } => match op {
                BinaryOp::Add => format!(
                    "{} + {}",
                    self.render_child(left, 3),
                    self.render_child(right, 3)
                ),
                BinaryOp::Sub => format!(
                    "{} - {}",
                    self.render_child(left, 3),
                    self.render_child(right, 4)
                ),
                BinaryOp::Mul => format!(
                    "{} \\cdot {}",
                    self.render_child(left, 4),
                    self.render_child(right, 5)
                ),
                BinaryOp::Div => format!("\\frac{{{}}}{{{}}}", left.to_latex(), right.to_latex()),
                BinaryOp::Pow => format!(
                    "{}^{{{}}}",
                    self.render_child(left, 7),
                    right.to_latex()
                ),
            },
            Expr::Negate(inner) => format!("-{}", self.render_child(inner, 5)),
            Expr::Call {
                name,
                args,
                base,
                param,
            } => {
                if name == "sqrt" {
                    let radicand = args.first().map(|a| a.to_latex()).unwrap_or_default();
                    return match param {
                        Some(p) => format!("\\sqrt[{}]{{{}}}", p.to_latex(), radicand),
                        None => format!("\\sqrt{{{radicand}}}"),
                    };
                }
                if name == "factorial" {
                    let operand = args.first().map(|a| self.render_child(a, 10)).unwrap_or_default();
                    return format!("{operand}!");
                }
                let rendered: Vec<String> = args.iter().map(|a| a.to_latex()).collect();
                let base_part = match base {
                    Some(b) => format!("_{{{}}}", b.to_latex()),
                    None => String::new(),
                };
                format!("\\{name}{base_part}\\left({}\\right)", rendered.join(", "))
            }
            Expr::Abs(inner) => format!("|{}|", inner.to_latex()),
            Expr::Limit { var, target, body } => format!(
                "\\lim_{{{var} \\to {}}}{{{}}}",
                target.to_latex(),
                body.to_latex()
            ),
            Expr::Sum {
                var,
                start,
                end,
                body,
            } => format!(
                "\\sum_{{{var}={}}}^{{{}}}{{{}}}",
                start.to_latex(),
                end.to_latex(),
                body.to_latex()
            ),
            Expr::Product {
                var,
                start,
                end,
                body,
            } => format!(
                "\\prod_{{{var}={}}}^{{{}}}{{{}}}",
                start.to_latex(),
                end.to_latex(),
                body.to_latex()
            ),
            Expr::Integral {
                lower,
                upper,
                body,
                var,
                closed,
            } => {
                let command = if *closed { "\\oint" } else { "\\int" };
                let mut out = command.to_string();
                if let Some(lo) = lower {
                    out.push_str(&format!("_{{{}}}", lo.to_latex()));
                }
                if let Some(up) = upper {
                    out.push_str(&format!("^{{{}}}", up.to_latex()));
                }
                out.push_str(&format!("{{{}}} d{var}", body.to_latex()));
                out
            }
            Expr::MultiIntegral {
                order,
                lower,
                upper,
                body,
                vars,
            } => {
                let command = match order {
                    2 => "\\iint",
                    _ => "\\iiint",
                };
                let mut out = command.to_string();
                if let Some(lo) = lower {
                    out.push_str(&format!("_{{{}}}", lo.to_latex()));
                }
                if let Some(up) = upper {
                    out.push_str(&format!("^{{{}}}", up.to_latex()));
                }
                out.push_str(&format!("{{{}}}", body.to_latex()));
                for var in vars {
                    out.push_str(&format!(" d{var}"));
                }
                out
            }
            Expr::Derivative { body, var, order } => {
                if *order == 1 {
                    format!("\\frac{{d}}{{d{var}}}{{{}}}", body.to_latex())
                } else {
                    format!("\\frac{{d^{{{order}}}}}{{d{var}^{{{order}}}}}{{{}}}", body.to_latex())
                }
            }
            Expr::PartialDerivative { body, var, order } => {
                if *order == 1 {
                    format!("\\frac{{\\partial}}{{\\partial {var}}}{{{}}}", body.to_latex())
                } else {
                    format!(
                        "\\frac{{\\partial^{{{order}}}}}{{\\partial {var}^{{{order}}}}}{{{}}}",
                        body.to_latex()
                    )
                }
            }
            Expr::Binom { upper, lower } => {
                format!("\\binom{{{}}}{{{}}}", upper.to_latex(), lower.to_latex())
            }
            Expr::Gradient { body, vars } => match vars {
                Some(vars) => format!("\\nabla_{{{}}}{{{}}}", vars.join(", "), body.to_latex()),
                None => format!("\\nabla{{{}}}", body.to_latex()),
            },
            Expr::Comparison { op, left, right } => format!(
                "{} {} {}",
                left.to_latex(),
                op.latex(),
                right.to_latex()
            ),
            Expr::ChainedComparison { exprs, ops } => {
                let mut out = exprs
                    .first()
                    .map(|e| e.to_latex())
                    .unwrap_or_default();
                for (op, expr) in ops.iter().zip(exprs.iter().skip(1)) {
                    out.push_str(&format!(" {} {}", op.latex(), expr.to_latex()));
                }
                out
            }
            Expr::BooleanBinary { op, left, right } => format!(
                "{} {} {}",
                self.render_child(left, 2),
                op.latex(),
                self.render_child(right, 2)
            ),
            Expr::Not(inner) => format!("\\lnot({})", inner.to_latex()),
            Expr::Conditional { body, condition } => {
                format!("{}, {}", body.to_latex(), condition.to_latex())
            }
            Expr::Piecewise { cases } => {
                let rows: Vec<String> = cases
                    .iter()
                    .map(|case| match &case.condition {
                        Some(cond) => format!("{} & {}", case.value.to_latex(), cond.to_latex()),
                        None => format!("{} & \\text{{otherwise}}", case.value.to_latex()),
                    })
                    .collect();
                format!("\\begin{{cases}}{}\\end{{cases}}", rows.join(" \\\\ "))
            }
            Expr::Matrix { rows } => {
                let rendered: Vec<String> = rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|e| e.to_latex())
                            .collect::<Vec<_>>()
                            .join(" & ")
                    })
                    .collect();
                format!("\\begin{{bmatrix}}{}\\end{{bmatrix}}", rendered.join(" \\\\ "))
            }
            Expr::Vector { components, unit } => {
                let rendered: Vec<String> = components.iter().map(|e| e.to_latex()).collect();
                let inner = format!("\\langle {} \\rangle", rendered.join(", "));
                if *unit {
                    format!("\\hat{{{inner}}}")
                } else {
                    inner
                }
            }
            Expr::Interval { lower, upper } => {
                format!("[{}, {}]", lower.to_latex(), upper.to_latex())
            }
            Expr::Assignment { name, value } => format!("let {name} = {}", value.to_latex()),
            Expr::FunctionDef { name, params, body } => {
                format!("{name}({}) = {}", params.join(", "), body.to_latex())
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_latex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(expr: &Expr) -> u64 {
        let mut hasher = DefaultHasher::new();
        expr.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_structural_equality_is_deep() {
        let a = Expr::add(Expr::variable("x"), Expr::number(1.0));
        let b = Expr::add(Expr::variable("x"), Expr::number(1.0));
        assert_eq!(a, b);

        let c = Expr::add(Expr::variable("y"), Expr::number(1.0));
        assert_ne!(a, c);
    }

    #[test]
    fn test_hash_distinguishes_operand_order() {
        let a = Expr::variable("a");
        let b = Expr::variable("b");
        for op in [BinaryOp::Sub, BinaryOp::Div, BinaryOp::Pow] {
            let forward = Expr::binary(op, a.clone(), b.clone());
            let backward = Expr::binary(op, b.clone(), a.clone());
            assert_ne!(hash_of(&forward), hash_of(&backward), "{op:?}");
            assert_ne!(forward, backward);
        }
    }

    #[test]
    fn test_nan_number_is_reflexive() {
        let nan = Expr::number(f64::NAN);
        assert_eq!(*nan, *nan);
    }

    #[test]
    fn test_free_variables_respect_binders() {
        // sum_{i=1}^{n} i * x  has free variables {n, x}, not i
        let body = Expr::mul(Expr::variable("i"), Expr::variable("x"));
        let sum = Rc::new(Expr::Sum {
            var: "i".to_string(),
            start: Expr::number(1.0),
            end: Expr::variable("n"),
            body,
        });
        let free = sum.free_variable_set();
        assert!(free.contains("n"));
        assert!(free.contains("x"));
        assert!(!free.contains("i"));
    }

    #[test]
    fn test_latex_rendering_basics() {
        let expr = Expr::add(
            Expr::pow(Expr::variable("x"), Expr::number(2.0)),
            Expr::number(1.0),
        );
        assert_eq!(expr.to_latex(), "x^{2} + 1");

        let frac = Expr::div(Expr::number(1.0), Expr::variable("x"));
        assert_eq!(frac.to_latex(), "\\frac{1}{x}");
    }

    #[test]
    fn test_latex_parenthesizes_low_precedence_children() {
        // (x + 1)^2 must keep its parentheses
        let expr = Expr::pow(
            Expr::add(Expr::variable("x"), Expr::number(1.0)),
            Expr::number(2.0),
        );
        assert_eq!(expr.to_latex(), "(x + 1)^{2}");
    }

    #[test]
    fn test_as_integer() {
        assert_eq!(Expr::number(4.0).as_integer(), Some(4));
        assert_eq!(Expr::number(4.5).as_integer(), None);
        assert_eq!(Expr::neg(Expr::number(2.0)).as_integer(), Some(-2));
    }
}
