// ABOUTME: Rewrite rule engine: categorised rules applied bottom-up to a
// fixed point, with assumptions and optional step tracing

use super::steps::{Step, StepTracer};
use crate::ast::Expr;
use crate::config::{MAX_RECURSION_DEPTH, MAX_REWRITE_PASSES};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleCategory {
    Identity,
    Simplification,
    Expansion,
    Normalization,
}

/// A user-declared property of a free variable, consumed by rules that
/// need domain constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Assumption {
    Positive,
    Negative,
    Nonzero,
    Integer,
}

#[derive(Debug, Clone, Default)]
pub struct Assumptions {
    map: HashMap<String, HashSet<Assumption>>,
}

impl Assumptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assume(&mut self, var: impl Into<String>, assumption: Assumption) {
        self.map.entry(var.into()).or_default().insert(assumption);
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    fn declared(&self, name: &str, assumption: Assumption) -> bool {
        self.map
            .get(name)
            .is_some_and(|set| set.contains(&assumption))
    }

    /// Whether `assumption` is known to hold for `expr`: literals answer
    /// directly, variables consult the declarations.
    pub fn holds(&self, expr: &Expr, assumption: Assumption) -> bool {
        match expr {
            Expr::Number(n) => match assumption {
                Assumption::Positive => *n > 0.0,
                Assumption::Negative => *n < 0.0,
                Assumption::Nonzero => *n != 0.0,
                Assumption::Integer => n.fract() == 0.0 && n.is_finite(),
            },
            Expr::Variable(name) => {
                if self.declared(name, assumption) {
                    return true;
                }
                // Nonzero follows from a sign
                assumption == Assumption::Nonzero
                    && (self.declared(name, Assumption::Positive)
                        || self.declared(name, Assumption::Negative))
            }
            _ => false,
        }
    }
}

/// One rewrite rule. `matches` is a cheap shape check; `apply` returns the
/// replacement node, or `None` when the rule does not fire after all.
pub struct Rule {
    pub name: &'static str,
    pub category: RuleCategory,
    pub priority: i32,
    pub description: &'static str,
    pub matches: fn(&Expr) -> bool,
    pub apply: fn(&Rc<Expr>, &Assumptions) -> Option<Rc<Expr>>,
}

pub struct RewriteEngine {
    rules: Vec<Rule>,
}

impl RewriteEngine {
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.name.cmp(b.name)));
        RewriteEngine { rules }
    }

    /// Engine over the built-in rule set restricted to `categories`.
    pub fn with_categories(categories: &[RuleCategory]) -> Self {
        let rules = super::rules::all()
            .into_iter()
            .filter(|rule| categories.contains(&rule.category))
            .collect();
        RewriteEngine::new(rules)
    }

    /// Repeated bottom-up passes until a fixed point or the pass cap;
    /// the last value is returned either way.
    pub fn run(
        &self,
        expr: &Rc<Expr>,
        assumptions: &Assumptions,
        mut tracer: Option<&mut StepTracer>,
    ) -> Rc<Expr> {
        let mut current = expr.clone();
        for _ in 0..MAX_REWRITE_PASSES {
            let mut changed = false;
            current = self.pass(&current, assumptions, &mut tracer, &mut changed, 0);
            if !changed {
                break;
            }
        }
        current
    }

    /// One bottom-up pass: children first, then the highest-priority rule
    /// that changes this node wins and the pass restarts from the caller.
    fn pass(
        &self,
        expr: &Rc<Expr>,
        assumptions: &Assumptions,
        tracer: &mut Option<&mut StepTracer>,
        changed: &mut bool,
        depth: usize,
    ) -> Rc<Expr> {
        if depth > MAX_RECURSION_DEPTH {
            return expr.clone();
        }
        let node = Rc::new(expr.map_children(&mut |child| {
            self.pass(child, assumptions, tracer, changed, depth + 1)
        }));

        for rule in &self.rules {
            if !(rule.matches)(&node) {
                continue;
            }
            let Some(next) = (rule.apply)(&node, assumptions) else {
                continue;
            };
            if *next == *node {
                continue;
            }
            trace!(rule = rule.name, "rewrite applied");
            if let Some(tracer) = tracer.as_deref_mut() {
                tracer.record(Step {
                    category: rule.category,
                    rule: rule.name.to_string(),
                    description: rule.description.to_string(),
                    before: node.to_latex(),
                    after: next.to_latex(),
                });
            }
            *changed = true;
            return next;
        }
        node
    }
}
