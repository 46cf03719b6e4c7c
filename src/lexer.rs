// ABOUTME: LaTeX-aware tokenizer turning a source string into a token stream

use crate::commands;
use crate::config::MAX_INPUT_LENGTH;
use crate::error::TexprError;
use crate::extensions::ExtensionRegistry;
use crate::token::{Token, TokenKind};
use nom::character::complete::{alpha1, char as chr, digit1};
use nom::combinator::{opt, recognize};
use nom::sequence::preceded;
use nom::{IResult, Parser};

/// Scan an integer or decimal literal. The decimal point requires a
/// following digit, so `3.` stops after the `3`.
fn scan_number(input: &str) -> IResult<&str, &str> {
    recognize((digit1, opt(preceded(chr('.'), digit1)))).parse(input)
}

fn scan_letters(input: &str) -> IResult<&str, &str> {
    alpha1(input)
}

/// Tokenize with default options: implicit multiplication on, no
/// extensions.
pub fn tokenize(input: &str) -> Result<Vec<Token>, TexprError> {
    tokenize_with(input, true, None)
}

/// Tokenize a source string into a token stream ending in EOF.
///
/// Spacing commands are elided; font commands are dropped with their
/// braced argument retained; `\begin{…}`, `\end{…}` and `\text{…}`
/// capture their braced word into the token lexeme.
pub fn tokenize_with(
    input: &str,
    implicit_multiplication: bool,
    extensions: Option<&ExtensionRegistry>,
) -> Result<Vec<Token>, TexprError> {
    if input.chars().count() > MAX_INPUT_LENGTH {
        let head: String = input.chars().take(40).collect();
        return Err(TexprError::tokenizer(
            format!("input exceeds {MAX_INPUT_LENGTH} characters"),
            0,
            head,
        ));
    }

    let mut tokens = Vec::new();
    let mut rest = input;

    while let Some(c) = rest.chars().next() {
        let offset = input.len() - rest.len();
        match c {
            c if c.is_whitespace() => rest = &rest[c.len_utf8()..],
            '0'..='9' => {
                let (next, digits) = scan_number(rest).map_err(|_| {
                    TexprError::tokenizer("invalid number literal", offset, input)
                })?;
                let value: f64 = digits.parse().map_err(|_| {
                    TexprError::tokenizer(
                        format!("number literal out of range: {digits}"),
                        offset,
                        input,
                    )
                })?;
                tokens.push(Token::number(value, digits, offset));
                rest = next;
            }
            '\\' => rest = lex_command(input, rest, &mut tokens, extensions)?,
            '+' => rest = push_simple(TokenKind::Plus, "+", offset, rest, &mut tokens),
            '-' => rest = push_simple(TokenKind::Minus, "-", offset, rest, &mut tokens),
            '−' => {
                tokens.push(Token::new(TokenKind::Minus, "-", offset));
                rest = &rest['−'.len_utf8()..];
            }
            '*' => rest = push_simple(TokenKind::Star, "*", offset, rest, &mut tokens),
            '/' => rest = push_simple(TokenKind::Slash, "/", offset, rest, &mut tokens),
            '^' => rest = push_simple(TokenKind::Caret, "^", offset, rest, &mut tokens),
            '_' => rest = push_simple(TokenKind::Underscore, "_", offset, rest, &mut tokens),
            '=' => rest = push_simple(TokenKind::Equals, "=", offset, rest, &mut tokens),
            ',' => rest = push_simple(TokenKind::Comma, ",", offset, rest, &mut tokens),
            '|' => rest = push_simple(TokenKind::Pipe, "|", offset, rest, &mut tokens),
            '&' => rest = push_simple(TokenKind::Ampersand, "&", offset, rest, &mut tokens),
            '(' => rest = push_simple(TokenKind::LParen, "(", offset, rest, &mut tokens),
            ')' => rest = push_simple(TokenKind::RParen, ")", offset, rest, &mut tokens),
            '{' => rest = push_simple(TokenKind::LBrace, "{", offset, rest, &mut tokens),
            '}' => rest = push_simple(TokenKind::RBrace, "}", offset, rest, &mut tokens),
            '[' => rest = push_simple(TokenKind::LBracket, "[", offset, rest, &mut tokens),
            ']' => rest = push_simple(TokenKind::RBracket, "]", offset, rest, &mut tokens),
            '!' => rest = push_simple(TokenKind::Bang, "!", offset, rest, &mut tokens),
            '<' => {
                if rest[1..].starts_with('=') {
                    tokens.push(Token::new(TokenKind::LessEq, "<=", offset));
                    rest = &rest[2..];
                } else {
                    rest = push_simple(TokenKind::Less, "<", offset, rest, &mut tokens);
                }
            }
            '>' => {
                if rest[1..].starts_with('=') {
                    tokens.push(Token::new(TokenKind::GreaterEq, ">=", offset));
                    rest = &rest[2..];
                } else {
                    rest = push_simple(TokenKind::Greater, ">", offset, rest, &mut tokens);
                }
            }
            c if c.is_ascii_alphabetic() => {
                if rest.starts_with("let")
                    && !rest[3..]
                        .chars()
                        .next()
                        .is_some_and(|n| n.is_ascii_alphanumeric())
                {
                    tokens.push(Token::new(TokenKind::Let, "let", offset));
                    rest = &rest[3..];
                } else if implicit_multiplication {
                    let kind = match c {
                        'e' | 'i' => TokenKind::Constant,
                        _ => TokenKind::Variable,
                    };
                    tokens.push(Token::new(kind, c.to_string(), offset));
                    rest = &rest[1..];
                } else {
                    let (next, name) = scan_letters(rest).map_err(|_| {
                        TexprError::tokenizer("invalid identifier", offset, input)
                    })?;
                    let kind = match name {
                        "e" | "i" => TokenKind::Constant,
                        _ => TokenKind::Variable,
                    };
                    tokens.push(Token::new(kind, name, offset));
                    rest = next;
                }
            }
            c => {
                if let Some(name) = commands::normalize_unicode(c) {
                    let after = &rest[c.len_utf8()..];
                    rest = dispatch_command(input, name, offset, after, &mut tokens, extensions)?;
                } else {
                    return Err(TexprError::tokenizer(
                        format!("unknown character: '{c}'"),
                        offset,
                        input,
                    ));
                }
            }
        }
    }

    tokens.push(Token::eof(input.len()));
    Ok(tokens)
}

fn push_simple<'a>(
    kind: TokenKind,
    lexeme: &str,
    offset: usize,
    rest: &'a str,
    tokens: &mut Vec<Token>,
) -> &'a str {
    tokens.push(Token::new(kind, lexeme, offset));
    &rest[lexeme.len()..]
}

/// Handle everything introduced by a backslash: row separators, escaped
/// braces, spacing, and named commands.
fn lex_command<'a>(
    input: &str,
    rest: &'a str,
    tokens: &mut Vec<Token>,
    extensions: Option<&ExtensionRegistry>,
) -> Result<&'a str, TexprError> {
    let offset = input.len() - rest.len();
    let after = &rest[1..];
    let Some(c) = after.chars().next() else {
        return Err(TexprError::tokenizer(
            "lone backslash at end of input",
            offset,
            input,
        ));
    };
    match c {
        '\\' => {
            tokens.push(Token::new(TokenKind::RowSep, "\\\\", offset));
            Ok(&after[1..])
        }
        '{' => {
            tokens.push(Token::new(TokenKind::LBrace, "{", offset));
            Ok(&after[1..])
        }
        '}' => {
            tokens.push(Token::new(TokenKind::RBrace, "}", offset));
            Ok(&after[1..])
        }
        // Spacing commands are discarded
        ',' | ';' | ':' | '!' | ' ' => Ok(&after[1..]),
        c if c.is_ascii_alphabetic() => {
            let (next, name) = scan_letters(after)
                .map_err(|_| TexprError::tokenizer("invalid command name", offset, input))?;
            dispatch_command(input, name, offset, next, tokens, extensions)
        }
        c => Err(TexprError::tokenizer(
            format!("unknown command: \\{c}"),
            offset,
            input,
        )),
    }
}

/// Route a (normalised) command name through the registry, then the
/// extension registry, then fail with a suggestion.
fn dispatch_command<'a>(
    input: &str,
    name: &str,
    offset: usize,
    rest: &'a str,
    tokens: &mut Vec<Token>,
    extensions: Option<&ExtensionRegistry>,
) -> Result<&'a str, TexprError> {
    match commands::lookup(name) {
        Some(TokenKind::Begin) => {
            let (next, word) = read_braced_word(rest, input, offset)?;
            tokens.push(Token::new(TokenKind::Begin, word, offset));
            Ok(next)
        }
        Some(TokenKind::End) => {
            let (next, word) = read_braced_word(rest, input, offset)?;
            tokens.push(Token::new(TokenKind::End, word, offset));
            Ok(next)
        }
        Some(TokenKind::Text) => {
            let (next, word) = read_braced_word(rest, input, offset)?;
            tokens.push(Token::new(TokenKind::Text, word, offset));
            Ok(next)
        }
        // Cosmetic kinds vanish; a font's braced argument lexes normally,
        // which leaves the inner expression in place.
        Some(TokenKind::Spacing) | Some(TokenKind::Ignored) | Some(TokenKind::Font) => Ok(rest),
        Some(kind) => {
            tokens.push(Token::new(kind, name, offset));
            Ok(rest)
        }
        None => {
            if let Some(registry) = extensions {
                if let Some(token) = registry.resolve_command(name, offset) {
                    tokens.push(token);
                    return Ok(rest);
                }
            }
            let message = format!("unknown command: \\{name}");
            match commands::suggest(name) {
                Some(s) => Err(TexprError::tokenizer_with_suggestion(
                    message,
                    offset,
                    input,
                    format!("did you mean {s}?"),
                )),
                None => Err(TexprError::tokenizer(message, offset, input)),
            }
        }
    }
}

/// Read `{word}` following `\begin`, `\end`, or `\text`.
fn read_braced_word<'a>(
    rest: &'a str,
    input: &str,
    offset: usize,
) -> Result<(&'a str, String), TexprError> {
    let trimmed = rest.trim_start();
    let Some(inner) = trimmed.strip_prefix('{') else {
        return Err(TexprError::tokenizer(
            "expected '{' after command",
            offset,
            input,
        ));
    };
    let Some(end) = inner.find('}') else {
        return Err(TexprError::tokenizer(
            "missing closing brace",
            offset,
            input,
        ));
    };
    Ok((&inner[end + 1..], inner[..end].trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_numbers_and_operators() {
        let tokens = tokenize("2 + 3.5").unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].number, Some(2.0));
        assert_eq!(tokens[1].kind, TokenKind::Plus);
        assert_eq!(tokens[2].number, Some(3.5));
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn test_offsets() {
        let tokens = tokenize("x + 12").unwrap();
        assert_eq!(tokens[0].offset, 0);
        assert_eq!(tokens[1].offset, 2);
        assert_eq!(tokens[2].offset, 4);
    }

    #[test]
    fn test_multi_digit_number_is_one_token() {
        let tokens = tokenize("123").unwrap();
        assert_eq!(tokens[0].number, Some(123.0));
        assert_eq!(tokens[0].lexeme, "123");
    }

    #[test]
    fn test_commands() {
        assert_eq!(
            kinds("\\sin x"),
            vec![TokenKind::Function, TokenKind::Variable, TokenKind::Eof]
        );
        assert_eq!(
            kinds("\\frac{1}{2}"),
            vec![
                TokenKind::Frac,
                TokenKind::LBrace,
                TokenKind::Number,
                TokenKind::RBrace,
                TokenKind::LBrace,
                TokenKind::Number,
                TokenKind::RBrace,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_compound_comparisons() {
        assert_eq!(
            kinds("x <= 3"),
            vec![
                TokenKind::Variable,
                TokenKind::LessEq,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
        assert_eq!(kinds("\\leq"), vec![TokenKind::LessEq, TokenKind::Eof]);
    }

    #[test]
    fn test_unicode_normalisation() {
        assert_eq!(
            kinds("π × ∞"),
            vec![
                TokenKind::Constant,
                TokenKind::Star,
                TokenKind::Infinity,
                TokenKind::Eof
            ]
        );
        let tokens = tokenize("α").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Variable);
        assert_eq!(tokens[0].lexeme, "alpha");
    }

    #[test]
    fn test_spacing_and_ignored_are_dropped() {
        assert_eq!(
            kinds("\\left( x \\right)"),
            vec![
                TokenKind::LParen,
                TokenKind::Variable,
                TokenKind::RParen,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("1 \\, + \\; 2"),
            vec![
                TokenKind::Number,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_font_commands_are_transparent() {
        assert_eq!(
            kinds("\\mathbf{x}"),
            vec![
                TokenKind::LBrace,
                TokenKind::Variable,
                TokenKind::RBrace,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_begin_end_capture_environment_name() {
        let tokens = tokenize("\\begin{bmatrix}1\\end{bmatrix}").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Begin);
        assert_eq!(tokens[0].lexeme, "bmatrix");
        assert_eq!(tokens[2].kind, TokenKind::End);
        assert_eq!(tokens[2].lexeme, "bmatrix");
    }

    #[test]
    fn test_text_captures_content() {
        let tokens = tokenize("\\text{otherwise}").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Text);
        assert_eq!(tokens[0].lexeme, "otherwise");
    }

    #[test]
    fn test_implicit_mode_splits_letters() {
        assert_eq!(
            kinds("xy"),
            vec![TokenKind::Variable, TokenKind::Variable, TokenKind::Eof]
        );
        let tokens = tokenize_with("mass", false, None).unwrap();
        assert_eq!(tokens[0].lexeme, "mass");
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_e_and_i_are_constants() {
        let tokens = tokenize("e + i").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Constant);
        assert_eq!(tokens[2].kind, TokenKind::Constant);
    }

    #[test]
    fn test_let_keyword() {
        assert_eq!(
            kinds("let x = 5"),
            vec![
                TokenKind::Let,
                TokenKind::Variable,
                TokenKind::Equals,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
        // "lettuce"-style runs are not the keyword
        let tokens = tokenize("leta").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Variable);
        assert_eq!(tokens[0].lexeme, "l");
    }

    #[test]
    fn test_row_separator_and_escaped_braces() {
        assert_eq!(
            kinds("1 \\\\ 2"),
            vec![
                TokenKind::Number,
                TokenKind::RowSep,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("\\{ x \\}"),
            vec![
                TokenKind::LBrace,
                TokenKind::Variable,
                TokenKind::RBrace,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_unknown_command_suggests() {
        let err = tokenize("\\sine{x}").unwrap_err();
        match err {
            TexprError::Tokenizer {
                suggestion: Some(s),
                position,
                ..
            } => {
                assert!(s.contains("\\sin"));
                assert_eq!(position, 0);
            }
            other => panic!("expected tokenizer error with suggestion, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_character_errors() {
        let err = tokenize("2 @ 3").unwrap_err();
        assert_eq!(err.position(), Some(2));
    }

    #[test]
    fn test_oversize_input_fails_fast() {
        let big = "1+".repeat(60_000);
        assert!(tokenize(&big).is_err());
    }
}
