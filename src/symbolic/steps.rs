// ABOUTME: Step tracer recording rewrites for "show your work" output

use super::engine::RuleCategory;
use serde::Serialize;

/// One recorded rewrite: which rule fired and what it did.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub category: RuleCategory,
    pub rule: String,
    pub description: String,
    pub before: String,
    pub after: String,
}

/// Mutable accumulator threaded by reference into rule application.
/// A non-tracing pass simply passes `None` instead.
#[derive(Debug, Default)]
pub struct StepTracer {
    steps: Vec<Step>,
}

impl StepTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
