// ABOUTME: The Texpr façade: one object aggregating lexer, parser,
// evaluator, symbolic engine, caches, extensions, and the global environment

use crate::ast::Expr;
use crate::cache::{self, CacheManager, CacheReport, DerivativeKey, EvalKey, EvictionPolicy};
use crate::config::{CacheConfig, EngineConfig};
use crate::env::Environment;
use crate::error::{TexprError, ValidationResult};
use crate::eval::{self, Evaluability};
use crate::extensions::ExtensionRegistry;
use crate::lexer;
use crate::matrix::{Matrix, Vector};
use crate::parser;
use crate::symbolic::{
    self, derivative, equivalence, integral, polynomial, Assumption, Assumptions,
    EquivalenceLevel, Step, StepTracer,
};
use crate::token::Token;
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// The engine façade. Each instance owns its caches, extension
/// registry, assumptions, and a global environment that survives across
/// calls; two instances share nothing.
pub struct Texpr {
    config: EngineConfig,
    env: Rc<Environment>,
    caches: CacheManager,
    extensions: ExtensionRegistry,
    assumptions: Assumptions,
}

impl Default for Texpr {
    fn default() -> Self {
        Self::new()
    }
}

impl Texpr {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default(), CacheConfig::default())
    }

    pub fn with_config(config: EngineConfig, cache_config: CacheConfig) -> Self {
        Texpr {
            config,
            env: Environment::new(),
            caches: CacheManager::new(&cache_config),
            extensions: ExtensionRegistry::new(),
            assumptions: Assumptions::new(),
        }
    }

    // ------------------------------------------------------------------
    // Parsing
    // ------------------------------------------------------------------

    fn tokenize(&self, source: &str) -> Result<Vec<Token>, TexprError> {
        lexer::tokenize_with(
            source,
            self.config.implicit_multiplication,
            Some(&self.extensions),
        )
    }

    /// Parse through the L1 cache.
    pub fn parse(&mut self, source: &str) -> Result<Rc<Expr>, TexprError> {
        if let Some(ast) = self.caches.lookup_parsed(source) {
            debug!(source, "parse cache hit");
            return Ok(ast);
        }
        let tokens = self.tokenize(source)?;
        let ast = parser::parse_with_depth(&tokens, self.config.max_recursion_depth)?;
        self.caches.store_parsed(source, ast.clone());
        Ok(ast)
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    pub fn evaluate(&mut self, source: &str) -> Result<Value, TexprError> {
        let ast = self.parse(source)?;
        self.evaluate_parsed(&ast)
    }

    pub fn evaluate_with(
        &mut self,
        source: &str,
        bindings: &HashMap<String, f64>,
    ) -> Result<Value, TexprError> {
        let ast = self.parse(source)?;
        self.evaluate_parsed_with(&ast, bindings)
    }

    pub fn evaluate_parsed(&mut self, ast: &Rc<Expr>) -> Result<Value, TexprError> {
        self.evaluate_parsed_with(ast, &HashMap::new())
    }

    /// Evaluate against the global environment, shadowed by `bindings`.
    ///
    /// Definitions persist into the global environment only when no
    /// scratch bindings were passed (the global scope *is* the
    /// evaluation scope then); with bindings present they stay
    /// call-local.
    pub fn evaluate_parsed_with(
        &mut self,
        ast: &Rc<Expr>,
        bindings: &HashMap<String, f64>,
    ) -> Result<Value, TexprError> {
        let key = self.eval_cache_key(ast, bindings);
        if let Some(key) = &key {
            if let Some(value) = self.caches.lookup_evaluation(key) {
                debug!("evaluation cache hit");
                return Ok(value);
            }
        }

        let scope = if bindings.is_empty() {
            self.env.clone()
        } else {
            let child = Environment::with_parent(self.env.clone());
            for (name, value) in bindings {
                child.define(name.clone(), Value::Number(*value));
            }
            child
        };

        let value = eval::evaluate_in(ast, &scope, Some(&self.extensions))?;
        if let Some(key) = key {
            self.caches.store_evaluation(key, value.clone());
        }
        Ok(value)
    }

    pub fn evaluate_numeric(&mut self, source: &str) -> Result<f64, TexprError> {
        self.evaluate(source)?.as_number()
    }

    pub fn evaluate_numeric_with(
        &mut self,
        source: &str,
        bindings: &HashMap<String, f64>,
    ) -> Result<f64, TexprError> {
        self.evaluate_with(source, bindings)?.as_number()
    }

    pub fn evaluate_matrix(&mut self, source: &str) -> Result<Matrix, TexprError> {
        Ok(self.evaluate(source)?.as_matrix()?.clone())
    }

    pub fn evaluate_vector(&mut self, source: &str) -> Result<Vector, TexprError> {
        Ok(self.evaluate(source)?.as_vector()?.clone())
    }

    pub fn classify(&mut self, source: &str) -> Result<Evaluability, TexprError> {
        let ast = self.parse(source)?;
        Ok(eval::classify(&ast, &self.env))
    }

    /// L2 key construction doubles as the cache admission policy: only
    /// costly expressions and fully-constant expressions qualify, and
    /// every free variable must resolve to a number so the key pins the
    /// exact environment the result was computed in.
    fn eval_cache_key(&self, ast: &Rc<Expr>, bindings: &HashMap<String, f64>) -> Option<EvalKey> {
        if ast.is_definition() || self.references_user_function(ast) {
            return None;
        }
        let free: Vec<String> = ast
            .free_variable_set()
            .into_iter()
            .filter(|name| !eval::is_constant(name))
            .collect();
        let costly = cache::is_costly(ast);
        if !costly && !(bindings.is_empty() && free.is_empty()) {
            return None;
        }
        let mut map = bindings.clone();
        for name in free {
            if map.contains_key(&name) {
                continue;
            }
            match self.env.get(&name) {
                Some(Value::Number(n)) => {
                    map.insert(name, n);
                }
                _ => return None,
            }
        }
        Some(EvalKey::new(ast.clone(), &map))
    }

    /// Calls to environment-defined functions make a result dependent on
    /// state the key cannot capture.
    fn references_user_function(&self, ast: &Rc<Expr>) -> bool {
        let mut found = false;
        fn walk(expr: &Rc<Expr>, env: &Rc<Environment>, found: &mut bool) {
            if *found {
                return;
            }
            if let Expr::Call { name, .. } = &**expr {
                if env.get(name).is_some() {
                    *found = true;
                    return;
                }
            }
            expr.map_children(&mut |child| {
                walk(child, env, found);
                child.clone()
            });
        }
        walk(ast, &self.env, &mut found);
        found
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    pub fn is_valid(&mut self, source: &str) -> bool {
        self.validate(source).valid
    }

    /// Syntax check. Non-strict mode reports the first error; strict
    /// mode resynchronises and collects every error it can find.
    pub fn validate(&mut self, source: &str) -> ValidationResult {
        let tokens = match self.tokenize(source) {
            Ok(tokens) => tokens,
            Err(error) => return ValidationResult::failed(vec![error]),
        };
        if self.config.strict_parsing {
            match parser::parse_strict(&tokens, self.config.max_recursion_depth) {
                Ok(_) => ValidationResult::ok(),
                Err(errors) => ValidationResult::failed(errors),
            }
        } else {
            match parser::parse_with_depth(&tokens, self.config.max_recursion_depth) {
                Ok(_) => ValidationResult::ok(),
                Err(error) => ValidationResult::failed(vec![error]),
            }
        }
    }

    // ------------------------------------------------------------------
    // Symbolic operations
    // ------------------------------------------------------------------

    pub fn differentiate(&mut self, source: &str, var: &str) -> Result<Rc<Expr>, TexprError> {
        self.differentiate_nth(source, var, 1)
    }

    /// Derivatives are cached by (expression, variable, order).
    pub fn differentiate_nth(
        &mut self,
        source: &str,
        var: &str,
        order: u32,
    ) -> Result<Rc<Expr>, TexprError> {
        let ast = self.parse(source)?;
        self.differentiate_parsed(&ast, var, order)
    }

    pub fn differentiate_parsed(
        &mut self,
        ast: &Rc<Expr>,
        var: &str,
        order: u32,
    ) -> Result<Rc<Expr>, TexprError> {
        let key = DerivativeKey {
            ast: ast.clone(),
            var: var.to_string(),
            order,
        };
        if let Some(result) = self.caches.lookup_derivative(&key) {
            debug!(var, order, "derivative cache hit");
            return Ok(result);
        }
        let mut current = ast.clone();
        for _ in 0..order {
            current = derivative::differentiate_with(&current, var, &self.assumptions, None)?;
        }
        self.caches.store_derivative(key, current.clone());
        Ok(current)
    }

    pub fn differentiate_with_steps(
        &mut self,
        source: &str,
        var: &str,
    ) -> Result<(Rc<Expr>, Vec<Step>), TexprError> {
        let ast = self.parse(source)?;
        let mut tracer = StepTracer::new();
        let result =
            derivative::differentiate_with(&ast, var, &self.assumptions, Some(&mut tracer))?;
        Ok((result, tracer.into_steps()))
    }

    /// Indefinite integration through the symbolic rule table; an
    /// already-definite integral is kept intact for numeric evaluation.
    pub fn integrate(&mut self, source: &str, var: &str) -> Result<Rc<Expr>, TexprError> {
        let ast = self.parse(source)?;
        Ok(self.integrate_parsed(&ast, var))
    }

    pub fn integrate_parsed(&mut self, ast: &Rc<Expr>, var: &str) -> Rc<Expr> {
        match &**ast {
            Expr::Integral {
                lower: Some(_),
                upper: Some(_),
                ..
            } => ast.clone(),
            Expr::Integral {
                lower: None,
                upper: None,
                body,
                var: integral_var,
                ..
            } => integral::integrate(body, integral_var),
            _ => integral::integrate(ast, var),
        }
    }

    /// Simplification results are kept in the sub-expression layer.
    pub fn simplify(&mut self, source: &str) -> Result<Rc<Expr>, TexprError> {
        let ast = self.parse(source)?;
        Ok(self.simplify_parsed(&ast))
    }

    pub fn simplify_parsed(&mut self, ast: &Rc<Expr>) -> Rc<Expr> {
        if let Some(result) = self.caches.lookup_simplified(ast) {
            debug!("simplification cache hit");
            return result;
        }
        let result = symbolic::simplify_with(ast, &self.assumptions, None);
        self.caches.store_simplified(ast.clone(), result.clone());
        result
    }

    pub fn simplify_with_steps(
        &mut self,
        source: &str,
    ) -> Result<(Rc<Expr>, Vec<Step>), TexprError> {
        let ast = self.parse(source)?;
        let mut tracer = StepTracer::new();
        let result = symbolic::simplify_with(&ast, &self.assumptions, Some(&mut tracer));
        Ok((result, tracer.into_steps()))
    }

    pub fn expand(&mut self, source: &str) -> Result<Rc<Expr>, TexprError> {
        let ast = self.parse(source)?;
        Ok(symbolic::expand_with(&ast, &self.assumptions, None))
    }

    pub fn expand_with_steps(
        &mut self,
        source: &str,
    ) -> Result<(Rc<Expr>, Vec<Step>), TexprError> {
        let ast = self.parse(source)?;
        let mut tracer = StepTracer::new();
        let result = symbolic::expand_with(&ast, &self.assumptions, Some(&mut tracer));
        Ok((result, tracer.into_steps()))
    }

    pub fn factor(&mut self, source: &str) -> Result<Rc<Expr>, TexprError> {
        let ast = self.parse(source)?;
        Ok(symbolic::factor_with(&ast, &self.assumptions, None))
    }

    pub fn factor_with_steps(
        &mut self,
        source: &str,
    ) -> Result<(Rc<Expr>, Vec<Step>), TexprError> {
        let ast = self.parse(source)?;
        let mut tracer = StepTracer::new();
        let result = symbolic::factor_with(&ast, &self.assumptions, Some(&mut tracer));
        Ok((result, tracer.into_steps()))
    }

    pub fn solve_linear(&mut self, source: &str, var: &str) -> Result<Rc<Expr>, TexprError> {
        let ast = self.parse(source)?;
        polynomial::solve_linear(&ast, var)
    }

    pub fn solve_quadratic(
        &mut self,
        source: &str,
        var: &str,
    ) -> Result<Vec<Rc<Expr>>, TexprError> {
        let ast = self.parse(source)?;
        polynomial::solve_quadratic(&ast, var)
    }

    /// Strongest equivalence level between two sources.
    pub fn equivalent(&mut self, a: &str, b: &str) -> Result<EquivalenceLevel, TexprError> {
        let left = self.parse(a)?;
        let right = self.parse(b)?;
        Ok(equivalence::equivalence(&left, &right))
    }

    // ------------------------------------------------------------------
    // Environment, assumptions, extensions
    // ------------------------------------------------------------------

    /// Bind a numeric value in the global environment.
    pub fn define(&mut self, name: impl Into<String>, value: f64) {
        self.env.define(name, Value::Number(value));
    }

    pub fn assume(&mut self, var: impl Into<String>, assumption: Assumption) {
        self.assumptions.assume(var, assumption);
    }

    pub fn clear_assumptions(&mut self) {
        self.assumptions.clear();
    }

    pub fn register_command(
        &mut self,
        name: impl Into<String>,
        handler: impl Fn(&str, usize) -> Option<Token> + 'static,
    ) {
        self.extensions.register_command(name, handler);
    }

    pub fn register_evaluator(
        &mut self,
        handler: impl Fn(&Expr, &Rc<Environment>) -> Option<Result<Value, TexprError>> + 'static,
    ) {
        self.extensions.register_evaluator(handler);
    }

    // ------------------------------------------------------------------
    // Cache control
    // ------------------------------------------------------------------

    /// Pre-populate the caches: parse every source and evaluate the
    /// non-defining ones, ignoring failures.
    pub fn warm_up(&mut self, sources: &[&str]) {
        for source in sources {
            let Ok(ast) = self.parse(source) else { continue };
            if !ast.is_definition() {
                let _ = self.evaluate_parsed(&ast);
            }
        }
    }

    pub fn clear_all_caches(&mut self) {
        self.caches.clear_all();
    }

    pub fn clear_environment(&mut self) {
        self.env.clear();
    }

    pub fn set_cache_policy(&mut self, policy: EvictionPolicy) {
        self.caches.set_policy(policy);
    }

    pub fn cache_statistics(&self) -> CacheReport {
        self.caches.report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Texpr {
        Texpr::new()
    }

    #[test]
    fn test_evaluate_end_to_end() {
        let mut texpr = engine();
        assert_eq!(texpr.evaluate_numeric("2 + 3 \\times 4").unwrap(), 14.0);
    }

    #[test]
    fn test_bindings() {
        let mut texpr = engine();
        let mut bindings = HashMap::new();
        bindings.insert("x".to_string(), 3.0);
        assert_eq!(
            texpr.evaluate_numeric_with("x^{2} + 1", &bindings).unwrap(),
            10.0
        );
    }

    #[test]
    fn test_definitions_persist_without_scratch_bindings() {
        let mut texpr = engine();
        texpr.evaluate("let a = 5").unwrap();
        assert_eq!(texpr.evaluate_numeric("a + 1").unwrap(), 6.0);

        texpr.evaluate("f(x) = 2x").unwrap();
        assert_eq!(texpr.evaluate_numeric("f(4)").unwrap(), 8.0);
    }

    #[test]
    fn test_definitions_stay_local_with_scratch_bindings() {
        let mut texpr = engine();
        let mut bindings = HashMap::new();
        bindings.insert("t".to_string(), 1.0);
        texpr.evaluate_with("let b = 9", &bindings).unwrap();
        assert!(texpr.evaluate("b").is_err());
    }

    #[test]
    fn test_clear_environment() {
        let mut texpr = engine();
        texpr.evaluate("let a = 5").unwrap();
        texpr.clear_environment();
        assert!(texpr.evaluate("a").is_err());
    }

    #[test]
    fn test_parse_caching() {
        let mut texpr = Texpr::with_config(
            EngineConfig::default(),
            CacheConfig {
                statistics: true,
                ..CacheConfig::default()
            },
        );
        texpr.parse("x + 1").unwrap();
        texpr.parse("x + 1").unwrap();
        let report = texpr.cache_statistics();
        assert_eq!(report.parsed.hits, 1);
        assert_eq!(report.parsed.misses, 1);
    }

    #[test]
    fn test_costly_evaluation_caching() {
        let mut texpr = Texpr::with_config(
            EngineConfig::default(),
            CacheConfig {
                statistics: true,
                ..CacheConfig::default()
            },
        );
        let first = texpr.evaluate_numeric("\\sum_{i=1}^{100} i").unwrap();
        let second = texpr.evaluate_numeric("\\sum_{i=1}^{100} i").unwrap();
        assert_eq!(first, 5050.0);
        assert_eq!(first, second);
        assert_eq!(texpr.cache_statistics().evaluation.hits, 1);
    }

    #[test]
    fn test_cached_results_respect_bindings() {
        let mut texpr = engine();
        let mut first = HashMap::new();
        first.insert("n".to_string(), 3.0);
        let mut second = HashMap::new();
        second.insert("n".to_string(), 5.0);

        let a = texpr
            .evaluate_numeric_with("\\sum_{i=1}^{n} i", &first)
            .unwrap();
        let b = texpr
            .evaluate_numeric_with("\\sum_{i=1}^{n} i", &second)
            .unwrap();
        assert_eq!(a, 6.0);
        assert_eq!(b, 15.0);
    }

    #[test]
    fn test_validation() {
        let mut texpr = engine();
        assert!(texpr.is_valid("1 + 2"));

        let result = texpr.validate("\\sin{");
        assert!(!result.valid);
        let suggestion = result.errors[0].suggestion().unwrap_or_default().to_string();
        assert!(suggestion.contains('}'), "suggestion was: {suggestion}");
    }

    #[test]
    fn test_strict_validation_collects_errors() {
        let mut texpr = Texpr::with_config(
            EngineConfig {
                strict_parsing: true,
                ..EngineConfig::default()
            },
            CacheConfig::default(),
        );
        let result = texpr.validate("(1 + ) + (2 + )");
        assert!(!result.valid);
        assert!(result.errors.len() >= 2);
    }

    #[test]
    fn test_differentiate_and_cache() {
        let mut texpr = engine();
        let derivative = texpr.differentiate("x^{3}", "x").unwrap();
        let mut bindings = HashMap::new();
        bindings.insert("x".to_string(), 3.0);
        let value = texpr
            .evaluate_parsed_with(&derivative, &bindings)
            .unwrap()
            .as_number()
            .unwrap();
        assert!((value - 27.0).abs() < 1e-9);

        // Second call comes from the L3 cache and matches
        let again = texpr.differentiate("x^{3}", "x").unwrap();
        assert_eq!(derivative, again);
    }

    #[test]
    fn test_integrate() {
        let mut texpr = engine();
        // Indefinite: symbolic antiderivative
        let anti = texpr.integrate("x^{2}", "x").unwrap();
        let mut bindings = HashMap::new();
        bindings.insert("x".to_string(), 3.0);
        let value = texpr
            .evaluate_parsed_with(&anti, &bindings)
            .unwrap()
            .as_number()
            .unwrap();
        assert!((value - 9.0).abs() < 1e-9);

        // Definite integrals stay numeric
        let definite = texpr.integrate("\\int_{0}^{1} x dx", "x").unwrap();
        let value = texpr
            .evaluate_parsed(&definite)
            .unwrap()
            .as_number()
            .unwrap();
        assert!((value - 0.5).abs() < 1e-2);
    }

    #[test]
    fn test_simplify_and_steps() {
        let mut texpr = engine();
        let simplified = texpr.simplify("x + x").unwrap();
        assert_eq!(
            simplified,
            Expr::mul(Expr::number(2.0), Expr::variable("x"))
        );

        let (result, steps) = texpr.simplify_with_steps("x + 0 + x").unwrap();
        assert_eq!(result, Expr::mul(Expr::number(2.0), Expr::variable("x")));
        assert!(!steps.is_empty());
    }

    #[test]
    fn test_expand_and_factor() {
        let mut texpr = engine();
        let expanded = texpr.expand("(x+1)^{2}").unwrap();
        let mut bindings = HashMap::new();
        bindings.insert("x".to_string(), 4.0);
        let value = texpr
            .evaluate_parsed_with(&expanded, &bindings)
            .unwrap()
            .as_number()
            .unwrap();
        assert!((value - 25.0).abs() < 1e-9);

        let factored = texpr.factor("x^{2} - 1").unwrap();
        match &*factored {
            Expr::Binary {
                op: crate::ast::BinaryOp::Mul,
                ..
            } => {}
            other => panic!("expected a product, got {other:?}"),
        }
    }

    #[test]
    fn test_solvers() {
        let mut texpr = engine();
        let roots = texpr.solve_quadratic("x^2 - 1", "x").unwrap();
        let values: Vec<f64> = roots.iter().filter_map(|r| r.as_number()).collect();
        assert_eq!(values, vec![1.0, -1.0]);

        let root = texpr.solve_linear("2x + 6", "x").unwrap();
        assert_eq!(root.as_number(), Some(-3.0));
    }

    #[test]
    fn test_equivalence_levels() {
        let mut texpr = engine();
        assert_eq!(
            texpr.equivalent("x + 1", "x + 1").unwrap(),
            EquivalenceLevel::Structural
        );
        assert_eq!(
            texpr.equivalent("x + x", "2x").unwrap(),
            EquivalenceLevel::Algebraic
        );
        assert_eq!(
            texpr.equivalent("x", "x + 1").unwrap(),
            EquivalenceLevel::NotEquivalent
        );
    }

    #[test]
    fn test_assumptions_feed_rules() {
        let mut texpr = engine();
        texpr.assume("a", Assumption::Positive);
        texpr.assume("b", Assumption::Positive);
        let (expanded, _) = texpr.expand_with_steps("\\ln(ab)").unwrap();
        match &*expanded {
            Expr::Binary {
                op: crate::ast::BinaryOp::Add,
                ..
            } => {}
            other => panic!("expected ln a + ln b, got {other:?}"),
        }
    }

    #[test]
    fn test_warm_up_and_clear() {
        let mut texpr = Texpr::with_config(
            EngineConfig::default(),
            CacheConfig {
                statistics: true,
                ..CacheConfig::default()
            },
        );
        texpr.warm_up(&["1 + 1", "\\sum_{i=1}^{10} i"]);
        assert!(texpr.cache_statistics().parsed.size >= 2);

        texpr.clear_all_caches();
        assert_eq!(texpr.cache_statistics().parsed.size, 0);
    }

    #[test]
    fn test_extension_command_and_evaluator() {
        let mut texpr = engine();
        texpr.register_command("answer", |_, offset| {
            Some(Token::number(42.0, "42", offset))
        });
        assert_eq!(texpr.evaluate_numeric("\\answer + 1").unwrap(), 43.0);

        texpr.register_evaluator(|expr, _| match expr {
            Expr::Variable(name) if name == "zero" => Some(Ok(Value::Number(0.0))),
            _ => None,
        });
        assert_eq!(texpr.evaluate_numeric("zero + 1").unwrap(), 1.0);
    }

    #[test]
    fn test_failed_evaluations_do_not_poison_caches() {
        let mut texpr = Texpr::with_config(
            EngineConfig::default(),
            CacheConfig {
                statistics: true,
                ..CacheConfig::default()
            },
        );
        // Divergent limit: costly, but the failure must not be cached
        assert!(texpr.evaluate("\\lim_{x \\to 0} \\frac{1}{x}").is_err());
        assert_eq!(texpr.cache_statistics().evaluation.size, 0);
    }

    #[test]
    fn test_classify() {
        let mut texpr = engine();
        assert_eq!(texpr.classify("1 + 2").unwrap(), Evaluability::Numeric);
        assert_eq!(texpr.classify("x + 1").unwrap(), Evaluability::Unevaluable);
        texpr.define("x", 2.0);
        assert_eq!(texpr.classify("x + 1").unwrap(), Evaluability::Numeric);
    }
}
