// ABOUTME: Extension registry for user-defined commands and evaluators

use crate::ast::Expr;
use crate::env::Environment;
use crate::error::TexprError;
use crate::token::Token;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Produces a token for an unrecognised backslashed command name, or
/// `None` to decline.
pub type TokenizerHandler = Box<dyn Fn(&str, usize) -> Option<Token>>;

/// Consulted in registration order when the core evaluator cannot
/// dispatch a node; the first `Some` wins.
pub type EvaluatorHandler = Box<dyn Fn(&Expr, &Rc<Environment>) -> Option<Result<Value, TexprError>>>;

#[derive(Default)]
pub struct ExtensionRegistry {
    tokenizers: HashMap<String, TokenizerHandler>,
    evaluators: Vec<EvaluatorHandler>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_command(
        &mut self,
        name: impl Into<String>,
        handler: impl Fn(&str, usize) -> Option<Token> + 'static,
    ) {
        self.tokenizers.insert(name.into(), Box::new(handler));
    }

    pub fn register_evaluator(
        &mut self,
        handler: impl Fn(&Expr, &Rc<Environment>) -> Option<Result<Value, TexprError>> + 'static,
    ) {
        self.evaluators.push(Box::new(handler));
    }

    /// Lexer fallback for unknown command names.
    pub fn resolve_command(&self, name: &str, offset: usize) -> Option<Token> {
        self.tokenizers.get(name).and_then(|handler| handler(name, offset))
    }

    /// Evaluator fallback for undispatchable nodes.
    pub fn dispatch(
        &self,
        expr: &Expr,
        env: &Rc<Environment>,
    ) -> Option<Result<Value, TexprError>> {
        self.evaluators
            .iter()
            .find_map(|handler| handler(expr, env))
    }

    pub fn is_empty(&self) -> bool {
        self.tokenizers.is_empty() && self.evaluators.is_empty()
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("tokenizers", &self.tokenizers.len())
            .field("evaluators", &self.evaluators.len())
            .finish()
    }
}
