// ABOUTME: Error taxonomy for tokenization, parsing, evaluation, and coercion

use thiserror::Error;

/// Classification of parser failures, used by strict-mode recovery and by
/// hosts that branch on the failure shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserErrorKind {
    UnexpectedToken,
    MissingDelimiter,
    MissingSubExpression,
    InvalidChainDirection,
    AmbiguousFraction,
    DepthExceeded,
    UnknownEnvironment,
    TrailingInput,
}

#[derive(Error, Debug, Clone)]
pub enum TexprError {
    /// Unknown character, unknown command, or oversize input.
    #[error("{message}")]
    Tokenizer {
        message: String,
        position: usize,
        expression: String,
        suggestion: Option<String>,
    },

    /// Syntax error with an optional source position.
    #[error("{message}")]
    Parser {
        kind: ParserErrorKind,
        message: String,
        position: Option<usize>,
        suggestion: Option<String>,
    },

    /// Runtime failure: undefined variable, domain error, iteration cap,
    /// non-convergent limit, wrong arity.
    #[error("{message}")]
    Evaluator {
        message: String,
        suggestion: Option<String>,
    },

    /// A numeric result was requested but the value is a matrix, vector,
    /// boolean, or non-real complex number.
    #[error("{message}")]
    Coercion { message: String },
}

impl TexprError {
    pub fn tokenizer(
        message: impl Into<String>,
        position: usize,
        expression: impl Into<String>,
    ) -> Self {
        TexprError::Tokenizer {
            message: message.into(),
            position,
            expression: expression.into(),
            suggestion: None,
        }
    }

    pub fn tokenizer_with_suggestion(
        message: impl Into<String>,
        position: usize,
        expression: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        TexprError::Tokenizer {
            message: message.into(),
            position,
            expression: expression.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    pub fn parser(kind: ParserErrorKind, message: impl Into<String>, position: usize) -> Self {
        TexprError::Parser {
            kind,
            message: message.into(),
            position: Some(position),
            suggestion: None,
        }
    }

    pub fn parser_with_suggestion(
        kind: ParserErrorKind,
        message: impl Into<String>,
        position: usize,
        suggestion: impl Into<String>,
    ) -> Self {
        TexprError::Parser {
            kind,
            message: message.into(),
            position: Some(position),
            suggestion: Some(suggestion.into()),
        }
    }

    pub fn evaluator(message: impl Into<String>) -> Self {
        TexprError::Evaluator {
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn evaluator_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        TexprError::Evaluator {
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    pub fn coercion(message: impl Into<String>) -> Self {
        TexprError::Coercion {
            message: message.into(),
        }
    }

    /// The source position this error points at, when known.
    pub fn position(&self) -> Option<usize> {
        match self {
            TexprError::Tokenizer { position, .. } => Some(*position),
            TexprError::Parser { position, .. } => *position,
            _ => None,
        }
    }

    pub fn suggestion(&self) -> Option<&str> {
        match self {
            TexprError::Tokenizer { suggestion, .. } => suggestion.as_deref(),
            TexprError::Parser { suggestion, .. } => suggestion.as_deref(),
            TexprError::Evaluator { suggestion, .. } => suggestion.as_deref(),
            TexprError::Coercion { .. } => None,
        }
    }
}

/// Outcome of `Texpr::validate`: validity plus every error found.
///
/// Non-strict validation stops at the first error; strict mode
/// resynchronises and collects the rest.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<TexprError>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        ValidationResult {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<TexprError>) -> Self {
        ValidationResult {
            valid: false,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions() {
        let err = TexprError::tokenizer("unknown character '@'", 7, "2 + 3 @");
        assert_eq!(err.position(), Some(7));
        assert!(err.suggestion().is_none());

        let err = TexprError::evaluator("undefined variable: y");
        assert_eq!(err.position(), None);
    }

    #[test]
    fn test_suggestion_surface() {
        let err = TexprError::parser_with_suggestion(
            ParserErrorKind::MissingDelimiter,
            "missing closing brace",
            4,
            "add '}' to close the argument",
        );
        assert_eq!(err.suggestion(), Some("add '}' to close the argument"));
        assert_eq!(format!("{err}"), "missing closing brace");
    }
}
