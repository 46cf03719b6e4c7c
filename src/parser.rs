// ABOUTME: Recursive-descent parser with operator precedence, implicit
// multiplication, LaTeX structural commands, and strict-mode error recovery

use crate::ast::{BinaryOp, BoolOp, Case, ComparisonOp, Expr};
use crate::config::MAX_RECURSION_DEPTH;
use crate::error::{ParserErrorKind, TexprError};
use crate::token::{Token, TokenKind};
use std::rc::Rc;

const ENVIRONMENTS: &[&str] = &["matrix", "bmatrix", "pmatrix", "vmatrix", "cases", "align"];

/// Conventional function letters: `f(x)` applies, `x(x+1)` multiplies.
const FUNCTION_LETTERS: &[&str] = &["f", "g", "h"];

/// Parse a token stream into an expression, failing on the first error.
pub fn parse(tokens: &[Token]) -> Result<Rc<Expr>, TexprError> {
    parse_with_depth(tokens, MAX_RECURSION_DEPTH)
}

pub fn parse_with_depth(tokens: &[Token], max_depth: usize) -> Result<Rc<Expr>, TexprError> {
    let mut parser = Parser::new(tokens, max_depth);
    let expr = parser.parse_statement()?;
    if !parser.check(TokenKind::Eof) {
        return Err(parser.error_here(
            ParserErrorKind::TrailingInput,
            format!("unexpected {} after expression", parser.peek()),
        ));
    }
    Ok(expr)
}

/// Strict mode: on a syntax error, record it, resynchronise at the next
/// `, & \\ ) }` boundary, and keep going. Returns every error found.
pub fn parse_strict(tokens: &[Token], max_depth: usize) -> Result<Rc<Expr>, Vec<TexprError>> {
    let mut parser = Parser::new(tokens, max_depth);
    let mut errors = Vec::new();
    let mut first: Option<Rc<Expr>> = None;

    while !parser.check(TokenKind::Eof) {
        let before = parser.pos;
        match parser.parse_statement() {
            Ok(expr) => {
                if first.is_none() {
                    first = Some(expr);
                }
                if parser.check(TokenKind::Eof) {
                    break;
                }
                errors.push(parser.error_here(
                    ParserErrorKind::TrailingInput,
                    format!("unexpected {} after expression", parser.peek()),
                ));
                parser.synchronize();
            }
            Err(e) => {
                errors.push(e);
                parser.synchronize();
            }
        }
        if parser.pos == before {
            parser.pos += 1;
        }
    }

    match (first, errors.is_empty()) {
        (Some(expr), true) => Ok(expr),
        (_, _) if !errors.is_empty() => Err(errors),
        _ => Err(vec![TexprError::parser(
            ParserErrorKind::MissingSubExpression,
            "empty input",
            0,
        )]),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    max_depth: usize,
    /// Open `|...|` groups; a pipe closes when positive, opens otherwise.
    abs_depth: usize,
    /// Non-zero while reading an integral body, enabling the trailing
    /// `d<var>` stop in the implicit-multiplication loop.
    integral_depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], max_depth: usize) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
            max_depth,
            abs_depth: 0,
            integral_depth: 0,
        }
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_ahead(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, TexprError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(
                ParserErrorKind::UnexpectedToken,
                format!("expected {what}, found {}", self.peek()),
            ))
        }
    }

    fn error_here(&self, kind: ParserErrorKind, message: impl Into<String>) -> TexprError {
        TexprError::parser(kind, message, self.peek().offset)
    }

    /// Skip to just past the next recovery boundary.
    fn synchronize(&mut self) {
        while !self.check(TokenKind::Eof) {
            let kind = self.peek_kind();
            self.advance();
            if matches!(
                kind,
                TokenKind::Comma
                    | TokenKind::Ampersand
                    | TokenKind::RowSep
                    | TokenKind::RParen
                    | TokenKind::RBrace
            ) {
                return;
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Rc<Expr>, TexprError> {
        if self.check(TokenKind::Let) {
            return self.parse_assignment();
        }
        if self.function_def_ahead() {
            return self.parse_function_def();
        }
        let expr = self.parse_expression()?;
        // Top level `expr , condition`
        if self.eat(TokenKind::Comma) {
            let condition = self.parse_expression()?;
            return Ok(Rc::new(Expr::Conditional {
                body: expr,
                condition,
            }));
        }
        Ok(expr)
    }

    fn parse_assignment(&mut self) -> Result<Rc<Expr>, TexprError> {
        self.expect(TokenKind::Let, "'let'")?;
        let name = self
            .expect(TokenKind::Variable, "a variable name after 'let'")?
            .lexeme;
        self.expect(TokenKind::Equals, "'=' in assignment")?;
        let value = self.parse_expression()?;
        Ok(Rc::new(Expr::Assignment { name, value }))
    }

    /// `name ( params ) = body`, detected by lookahead.
    fn function_def_ahead(&self) -> bool {
        let kind_at = |i: usize| self.peek_ahead(i).map(|t| t.kind);
        if kind_at(0) != Some(TokenKind::Variable) || kind_at(1) != Some(TokenKind::LParen) {
            return false;
        }
        let mut i = 2;
        if kind_at(i) == Some(TokenKind::Variable) {
            i += 1;
            while kind_at(i) == Some(TokenKind::Comma) {
                if kind_at(i + 1) != Some(TokenKind::Variable) {
                    return false;
                }
                i += 2;
            }
        }
        kind_at(i) == Some(TokenKind::RParen) && kind_at(i + 1) == Some(TokenKind::Equals)
    }

    fn parse_function_def(&mut self) -> Result<Rc<Expr>, TexprError> {
        let name = self.expect(TokenKind::Variable, "function name")?.lexeme;
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if self.check(TokenKind::Variable) {
            params.push(self.advance().lexeme);
            while self.eat(TokenKind::Comma) {
                params.push(self.expect(TokenKind::Variable, "parameter name")?.lexeme);
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::Equals, "'='")?;
        let body = self.parse_expression()?;
        Ok(Rc::new(Expr::FunctionDef { name, params, body }))
    }

    // ------------------------------------------------------------------
    // Precedence levels
    // ------------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<Rc<Expr>, TexprError> {
        self.depth += 1;
        let result = if self.depth > self.max_depth {
            Err(TexprError::parser_with_suggestion(
                ParserErrorKind::DepthExceeded,
                format!("expression nesting exceeds {} levels", self.max_depth),
                self.peek().offset,
                "break the expression into smaller parts",
            ))
        } else {
            self.parse_comparison()
        };
        self.depth -= 1;
        result
    }

    fn parse_comparison(&mut self) -> Result<Rc<Expr>, TexprError> {
        let first = self.parse_or()?;
        if !self.peek_kind().is_comparison() {
            return Ok(first);
        }

        let mut exprs = vec![first];
        let mut ops = Vec::new();
        let mut op_offsets = Vec::new();
        while self.peek_kind().is_comparison() {
            op_offsets.push(self.peek().offset);
            let op = comparison_op(self.advance().kind);
            exprs.push(self.parse_or()?);
            ops.push(op);
        }

        if ops.len() == 1 {
            let right = exprs.pop().filter(|_| exprs.len() == 1);
            let left = exprs.pop();
            if let (Some(left), Some(right)) = (left, right) {
                return Ok(Rc::new(Expr::Comparison {
                    op: ops[0],
                    left,
                    right,
                }));
            }
        }

        // Chains must keep a single direction: a < b < c is fine,
        // a < b > c is rejected.
        let mut direction = 0i8;
        for (op, offset) in ops.iter().zip(&op_offsets) {
            let d = op.direction();
            if d == 0 {
                continue;
            }
            if direction == 0 {
                direction = d;
            } else if direction != d {
                return Err(TexprError::parser(
                    ParserErrorKind::InvalidChainDirection,
                    "chained comparison mixes '<' and '>' directions",
                    *offset,
                ));
            }
        }
        Ok(Rc::new(Expr::ChainedComparison { exprs, ops }))
    }

    fn parse_or(&mut self) -> Result<Rc<Expr>, TexprError> {
        let mut left = self.parse_and()?;
        while self.check(TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Rc::new(Expr::BooleanBinary {
                op: BoolOp::Or,
                left,
                right,
            });
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Rc<Expr>, TexprError> {
        let mut left = self.parse_not()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::And => BoolOp::And,
                TokenKind::Xor => BoolOp::Xor,
                _ => break,
            };
            self.advance();
            let right = self.parse_not()?;
            left = Rc::new(Expr::BooleanBinary { op, left, right });
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Rc<Expr>, TexprError> {
        if self.eat(TokenKind::Not) {
            let operand = self.parse_not()?;
            return Ok(Rc::new(Expr::Not(operand)));
        }
        self.parse_additive()
    }

    fn parse_additive(&mut self) -> Result<Rc<Expr>, TexprError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Rc<Expr>, TexprError> {
        let mut left = self.parse_unary()?;
        loop {
            if self.eat(TokenKind::Star) {
                let right = self.parse_unary()?;
                left = Expr::mul(left, right);
            } else if self.eat(TokenKind::Slash) {
                let right = self.parse_unary()?;
                left = Expr::div(left, right);
            } else if self.implicit_factor_ahead() {
                let right = self.parse_power()?;
                left = Expr::mul(left, right);
            } else {
                break;
            }
        }
        Ok(left)
    }

    /// Juxtaposition check: the next token starts an atom, a pipe opens a
    /// fresh absolute value, and integral differentials stop the run.
    fn implicit_factor_ahead(&self) -> bool {
        let kind = self.peek_kind();
        if kind == TokenKind::Pipe {
            return self.abs_depth == 0;
        }
        if !kind.starts_atom() {
            return false;
        }
        if self.integral_depth > 0 && self.differential_ahead() {
            return false;
        }
        true
    }

    fn differential_ahead(&self) -> bool {
        let token = self.peek();
        if token.kind != TokenKind::Variable {
            return false;
        }
        if token.lexeme == "d" {
            return matches!(
                self.peek_ahead(1).map(|t| t.kind),
                Some(TokenKind::Variable) | Some(TokenKind::Constant)
            );
        }
        token.lexeme.len() >= 2 && token.lexeme.starts_with('d')
    }

    fn parse_unary(&mut self) -> Result<Rc<Expr>, TexprError> {
        if self.eat(TokenKind::Minus) {
            let operand = self.parse_unary()?;
            // A negated literal folds into a negative number
            if let Expr::Number(n) = *operand {
                return Ok(Expr::number(-n));
            }
            return Ok(Expr::neg(operand));
        }
        if self.eat(TokenKind::Plus) {
            return self.parse_unary();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Rc<Expr>, TexprError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            self.depth -= 1;
            return Err(TexprError::parser_with_suggestion(
                ParserErrorKind::DepthExceeded,
                format!("expression nesting exceeds {} levels", self.max_depth),
                self.peek().offset,
                "break the expression into smaller parts",
            ));
        }
        let result = (|| {
            let base = self.parse_postfix()?;
            if self.eat(TokenKind::Caret) {
                let exponent = self.parse_exponent()?;
                return Ok(Expr::pow(base, exponent));
            }
            Ok(base)
        })();
        self.depth -= 1;
        result
    }

    /// Power exponents: braced exponents take a full expression, braceless
    /// exponents take exactly one atom, so `e^ix` is `(e^i) x` while
    /// `e^{ix}` is `e^(i x)`. Chained carets stay right-associative.
    fn parse_exponent(&mut self) -> Result<Rc<Expr>, TexprError> {
        if self.check(TokenKind::LBrace) {
            return self.parse_braced();
        }
        let negate = self.eat(TokenKind::Minus);
        let atom = self.parse_atom()?;
        let mut exponent = if negate {
            match *atom {
                Expr::Number(n) => Expr::number(-n),
                _ => Expr::neg(atom),
            }
        } else {
            atom
        };
        if self.eat(TokenKind::Caret) {
            exponent = Expr::pow(exponent, self.parse_exponent()?);
        }
        Ok(exponent)
    }

    fn parse_postfix(&mut self) -> Result<Rc<Expr>, TexprError> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.check(TokenKind::Bang) {
                self.advance();
                expr = Expr::call1("factorial", expr);
            } else if self.check(TokenKind::Underscore) {
                let Expr::Variable(name) = (*expr).clone() else {
                    return Err(self.error_here(
                        ParserErrorKind::UnexpectedToken,
                        "subscript is only valid on a variable",
                    ));
                };
                self.advance();
                let subscript = self.parse_subscript_text()?;
                expr = Expr::variable(format!("{name}_{subscript}"));
            } else if self.check(TokenKind::LParen) && self.callable_variable(&expr) {
                let Expr::Variable(name) = (*expr).clone() else {
                    unreachable!()
                };
                self.advance();
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    args.push(self.parse_expression()?);
                    while self.eat(TokenKind::Comma) {
                        args.push(self.parse_expression()?);
                    }
                }
                self.expect(TokenKind::RParen, "')' to close the argument list")?;
                expr = Expr::call(name, args);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn callable_variable(&self, expr: &Rc<Expr>) -> bool {
        matches!(&**expr, Expr::Variable(name) if FUNCTION_LETTERS.contains(&name.as_str())
            || name.starts_with("f_") || name.starts_with("g_") || name.starts_with("h_"))
    }

    /// Subscript content concatenated into the variable name:
    /// `x_1`, `x_{max}`, `x_{i}`.
    fn parse_subscript_text(&mut self) -> Result<String, TexprError> {
        if self.eat(TokenKind::LBrace) {
            let mut text = String::new();
            while !self.check(TokenKind::RBrace) {
                if self.check(TokenKind::Eof) {
                    return Err(TexprError::parser_with_suggestion(
                        ParserErrorKind::MissingDelimiter,
                        "missing closing brace in subscript",
                        self.peek().offset,
                        "add '}' to close the subscript",
                    ));
                }
                text.push_str(&self.advance().lexeme);
            }
            self.advance();
            if text.is_empty() {
                return Err(self.error_here(
                    ParserErrorKind::MissingSubExpression,
                    "empty subscript",
                ));
            }
            Ok(text)
        } else {
            let token = self.advance();
            match token.kind {
                TokenKind::Number | TokenKind::Variable | TokenKind::Constant => Ok(token.lexeme),
                _ => Err(TexprError::parser(
                    ParserErrorKind::UnexpectedToken,
                    format!("expected subscript, found {token}"),
                    token.offset,
                )),
            }
        }
    }

    // ------------------------------------------------------------------
    // Atoms
    // ------------------------------------------------------------------

    fn parse_atom(&mut self) -> Result<Rc<Expr>, TexprError> {
        match self.peek_kind() {
            TokenKind::Number => {
                let token = self.advance();
                let value = token.number.ok_or_else(|| {
                    TexprError::parser(
                        ParserErrorKind::UnexpectedToken,
                        "malformed number token",
                        token.offset,
                    )
                })?;
                Ok(Expr::number(value))
            }
            TokenKind::Variable | TokenKind::Constant => {
                let token = self.advance();
                Ok(Expr::variable(token.lexeme))
            }
            TokenKind::Infinity => {
                self.advance();
                Ok(Expr::number(f64::INFINITY))
            }
            TokenKind::Partial => {
                self.advance();
                Ok(Expr::variable("partial"))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBrace => self.parse_braced(),
            TokenKind::LBracket => {
                self.advance();
                let first = self.parse_expression()?;
                if self.eat(TokenKind::Comma) {
                    let upper = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "']' to close the interval")?;
                    return Ok(Rc::new(Expr::Interval {
                        lower: first,
                        upper,
                    }));
                }
                self.expect(TokenKind::RBracket, "']'")?;
                Ok(first)
            }
            TokenKind::Pipe => {
                self.advance();
                self.abs_depth += 1;
                let inner = self.parse_expression();
                self.abs_depth -= 1;
                let inner = inner?;
                self.expect(TokenKind::Pipe, "'|' to close the absolute value")?;
                Ok(Rc::new(Expr::Abs(inner)))
            }
            TokenKind::LAngle => {
                self.advance();
                let mut components = vec![self.parse_expression()?];
                while self.eat(TokenKind::Comma) {
                    components.push(self.parse_expression()?);
                }
                self.expect(TokenKind::RAngle, "'\\rangle' to close the vector")?;
                Ok(Rc::new(Expr::Vector {
                    components,
                    unit: false,
                }))
            }
            TokenKind::Function => {
                let token = self.advance();
                self.parse_function_command(token.lexeme)
            }
            TokenKind::Frac => {
                self.advance();
                self.parse_frac()
            }
            TokenKind::Binom => {
                self.advance();
                let upper = self.parse_braced()?;
                let lower = self.parse_braced()?;
                Ok(Rc::new(Expr::Binom { upper, lower }))
            }
            TokenKind::Sqrt => {
                self.advance();
                self.parse_sqrt()
            }
            TokenKind::Sum => {
                self.advance();
                self.parse_series(true)
            }
            TokenKind::Prod => {
                self.advance();
                self.parse_series(false)
            }
            TokenKind::Lim => {
                self.advance();
                self.parse_limit()
            }
            TokenKind::Int => {
                self.advance();
                self.parse_integral(false)
            }
            TokenKind::OInt => {
                self.advance();
                self.parse_integral(true)
            }
            TokenKind::IInt => {
                self.advance();
                self.parse_multi_integral(2)
            }
            TokenKind::IIInt => {
                self.advance();
                self.parse_multi_integral(3)
            }
            TokenKind::Nabla => {
                self.advance();
                self.parse_gradient()
            }
            TokenKind::Begin => self.parse_environment(),
            TokenKind::Eof => Err(TexprError::parser_with_suggestion(
                ParserErrorKind::MissingSubExpression,
                "unexpected end of input",
                self.peek().offset,
                "check for a missing operand or closing delimiter",
            )),
            _ => {
                let token = self.peek().clone();
                Err(TexprError::parser(
                    ParserErrorKind::UnexpectedToken,
                    format!("unexpected {token}"),
                    token.offset,
                ))
            }
        }
    }

    /// `{ expression }` with a closing-brace suggestion on truncation.
    fn parse_braced(&mut self) -> Result<Rc<Expr>, TexprError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        if self.check(TokenKind::Eof) {
            return Err(TexprError::parser_with_suggestion(
                ParserErrorKind::MissingDelimiter,
                "missing closing brace",
                self.peek().offset,
                "add '}' to close the argument",
            ));
        }
        let expr = self.parse_expression()?;
        if self.check(TokenKind::Eof) {
            return Err(TexprError::parser_with_suggestion(
                ParserErrorKind::MissingDelimiter,
                "missing closing brace",
                self.peek().offset,
                "add '}' to close the argument",
            ));
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(expr)
    }

    // ------------------------------------------------------------------
    // Function commands
    // ------------------------------------------------------------------

    fn parse_function_command(&mut self, name: String) -> Result<Rc<Expr>, TexprError> {
        // Optional exponent before the argument: \sin^2 x is (sin x)^2,
        // \sin^{-1} x is arcsin x.
        let mut exponent: Option<Rc<Expr>> = None;
        if self.eat(TokenKind::Caret) {
            exponent = Some(self.parse_exponent()?);
        }

        // Optional subscript, e.g. \log_2
        let mut base: Option<Rc<Expr>> = None;
        if self.eat(TokenKind::Underscore) {
            base = Some(if self.check(TokenKind::LBrace) {
                self.parse_braced()?
            } else {
                self.parse_atom()?
            });
        }

        let args = if self.check(TokenKind::LParen) {
            self.advance();
            let mut args = vec![self.parse_expression()?];
            while self.eat(TokenKind::Comma) {
                args.push(self.parse_expression()?);
            }
            self.expect(TokenKind::RParen, "')' to close the argument list")?;
            args
        } else if self.check(TokenKind::LBrace) {
            let mut args = vec![self.parse_braced()?];
            // Multi-argument braced form: \gcd{12}{18}
            while self.check(TokenKind::LBrace) {
                args.push(self.parse_braced()?);
            }
            args
        } else {
            vec![self.parse_power()?]
        };

        let mut name = name;
        // \sin^{-1} x denotes the inverse function
        if let Some(exp) = &exponent {
            if exp.as_integer() == Some(-1) {
                if let Some(inverse) = inverse_function_name(&name) {
                    name = inverse.to_string();
                    exponent = None;
                }
            }
        }

        // \hat over a literal vector marks it as a unit vector
        if name == "hat" && args.len() == 1 {
            if let Expr::Vector { components, .. } = &*args[0] {
                return Ok(Rc::new(Expr::Vector {
                    components: components.clone(),
                    unit: true,
                }));
            }
        }

        let mut expr = Rc::new(Expr::Call {
            name,
            args,
            base,
            param: None,
        });
        if let Some(exp) = exponent {
            expr = Expr::pow(expr, exp);
        }
        Ok(expr)
    }

    fn parse_sqrt(&mut self) -> Result<Rc<Expr>, TexprError> {
        let param = if self.eat(TokenKind::LBracket) {
            let index = self.parse_expression()?;
            self.expect(TokenKind::RBracket, "']' to close the root index")?;
            Some(index)
        } else {
            None
        };
        let radicand = if self.check(TokenKind::LBrace) {
            self.parse_braced()?
        } else {
            self.parse_atom()?
        };
        Ok(Rc::new(Expr::Call {
            name: "sqrt".to_string(),
            args: vec![radicand],
            base: None,
            param,
        }))
    }

    /// Two-argument fractions, with braceless single-character arguments:
    /// `\frac12` is one half, `\frac123` is ambiguous and rejected. The
    /// derivative forms `\frac{d}{dx}` and `\frac{\partial}{\partial x}`
    /// are detected here as well.
    fn parse_frac(&mut self) -> Result<Rc<Expr>, TexprError> {
        if let Some(expr) = self.try_parse_derivative()? {
            return Ok(expr);
        }
        // A digit run directly after \frac is the braceless form: one
        // digit per argument. `\frac12` splits into 1 over 2; `\frac123`
        // is ambiguous.
        if self.check(TokenKind::Number) {
            let token = self.advance();
            let digits = token.lexeme.clone();
            return match digits.len() {
                1 => {
                    let numerator = Expr::number(token.number.unwrap_or(0.0));
                    let denominator = self.parse_frac_argument()?;
                    Ok(Expr::div(numerator, denominator))
                }
                2 => {
                    let mut chars = digits.chars();
                    let n = chars.next().and_then(|c| c.to_digit(10)).unwrap_or(0);
                    let d = chars.next().and_then(|c| c.to_digit(10)).unwrap_or(0);
                    Ok(Expr::div(Expr::number(n as f64), Expr::number(d as f64)))
                }
                _ => Err(TexprError::parser_with_suggestion(
                    ParserErrorKind::AmbiguousFraction,
                    format!("ambiguous braceless fraction digits '{digits}'"),
                    token.offset,
                    "wrap the numerator and denominator in braces",
                )),
            };
        }
        let numerator = self.parse_frac_argument()?;
        let denominator = self.parse_frac_argument()?;
        Ok(Expr::div(numerator, denominator))
    }

    fn parse_frac_argument(&mut self) -> Result<Rc<Expr>, TexprError> {
        match self.peek_kind() {
            TokenKind::LBrace => self.parse_braced(),
            TokenKind::Number => {
                let token = self.advance();
                if token.lexeme.len() == 1 {
                    Ok(Expr::number(token.number.unwrap_or(0.0)))
                } else {
                    Err(TexprError::parser_with_suggestion(
                        ParserErrorKind::AmbiguousFraction,
                        format!("ambiguous braceless fraction digits '{}'", token.lexeme),
                        token.offset,
                        "wrap the numerator and denominator in braces",
                    ))
                }
            }
            TokenKind::Variable | TokenKind::Constant => {
                let token = self.advance();
                Ok(Expr::variable(token.lexeme))
            }
            _ => Err(self.error_here(
                ParserErrorKind::MissingSubExpression,
                "expected a fraction argument",
            )),
        }
    }

    fn try_parse_derivative(&mut self) -> Result<Option<Rc<Expr>>, TexprError> {
        let start = self.pos;
        let Some(header) = self.match_derivative_header() else {
            self.pos = start;
            return Ok(None);
        };
        let (partial, order, var) = header;
        let body = self.parse_power()?;
        let node = if partial {
            Expr::PartialDerivative { body, var, order }
        } else {
            Expr::Derivative { body, var, order }
        };
        Ok(Some(Rc::new(node)))
    }

    /// Match `{d}` `{dx}` / `{d^n}` `{dx^n}` / `{\partial}` headers,
    /// returning (partial, order, variable).
    fn match_derivative_header(&mut self) -> Option<(bool, u32, String)> {
        // Numerator: { d } or { \partial }, optionally ^ order
        if !self.eat(TokenKind::LBrace) {
            return None;
        }
        let partial = match self.peek_kind() {
            TokenKind::Partial => {
                self.advance();
                true
            }
            TokenKind::Variable if self.peek().lexeme == "d" => {
                self.advance();
                false
            }
            _ => return None,
        };
        let mut order = 1u32;
        if self.eat(TokenKind::Caret) {
            order = self.match_order_exponent().filter(|&n| n >= 1)?;
        }
        if !self.eat(TokenKind::RBrace) {
            return None;
        }

        // Denominator: { d<var> } or { \partial <var> }, optional ^ order
        if !self.eat(TokenKind::LBrace) {
            return None;
        }
        let var = match self.peek_kind() {
            TokenKind::Partial if partial => {
                self.advance();
                match self.peek_kind() {
                    TokenKind::Variable | TokenKind::Constant => self.advance().lexeme,
                    _ => return None,
                }
            }
            TokenKind::Variable if !partial => {
                let token = self.advance();
                if token.lexeme == "d" {
                    match self.peek_kind() {
                        TokenKind::Variable | TokenKind::Constant => self.advance().lexeme,
                        _ => return None,
                    }
                } else if token.lexeme.len() >= 2 && token.lexeme.starts_with('d') {
                    token.lexeme[1..].to_string()
                } else {
                    return None;
                }
            }
            _ => return None,
        };
        if self.eat(TokenKind::Caret) {
            let denominator_order = self.match_order_exponent()?;
            if denominator_order != order {
                return None;
            }
        }
        if !self.eat(TokenKind::RBrace) {
            return None;
        }
        Some((partial, order, var))
    }

    /// A derivative order exponent: `^2` or `^{2}`.
    fn match_order_exponent(&mut self) -> Option<u32> {
        if self.eat(TokenKind::LBrace) {
            let token = self.advance();
            let order = token.number.map(|n| n as u32)?;
            if !self.eat(TokenKind::RBrace) {
                return None;
            }
            Some(order)
        } else {
            let token = self.advance();
            token.number.map(|n| n as u32)
        }
    }

    // ------------------------------------------------------------------
    // Calculus constructs
    // ------------------------------------------------------------------

    fn parse_series(&mut self, is_sum: bool) -> Result<Rc<Expr>, TexprError> {
        self.expect(TokenKind::Underscore, "'_' after the series command")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let var = self
            .expect(TokenKind::Variable, "the series index variable")?
            .lexeme;
        self.expect(TokenKind::Equals, "'=' in the series bounds")?;
        let start = self.parse_expression()?;
        self.expect(TokenKind::RBrace, "'}'")?;
        self.expect(TokenKind::Caret, "'^' before the series upper bound")?;
        let end = if self.check(TokenKind::LBrace) {
            self.parse_braced()?
        } else {
            self.parse_atom()?
        };
        let body = self.parse_multiplicative()?;
        let node = if is_sum {
            Expr::Sum {
                var,
                start,
                end,
                body,
            }
        } else {
            Expr::Product {
                var,
                start,
                end,
                body,
            }
        };
        Ok(Rc::new(node))
    }

    fn parse_limit(&mut self) -> Result<Rc<Expr>, TexprError> {
        self.expect(TokenKind::Underscore, "'_' after \\lim")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let var = self
            .expect(TokenKind::Variable, "the limit variable")?
            .lexeme;
        self.expect(TokenKind::To, "'\\to' in the limit")?;
        let target = self.parse_expression()?;
        self.expect(TokenKind::RBrace, "'}'")?;
        let body = self.parse_multiplicative()?;
        Ok(Rc::new(Expr::Limit { var, target, body }))
    }

    fn parse_bound(&mut self) -> Result<Rc<Expr>, TexprError> {
        if self.check(TokenKind::LBrace) {
            self.parse_braced()
        } else if self.eat(TokenKind::Minus) {
            let atom = self.parse_atom()?;
            match *atom {
                Expr::Number(n) => Ok(Expr::number(-n)),
                _ => Ok(Expr::neg(atom)),
            }
        } else {
            self.parse_atom()
        }
    }

    fn parse_integral(&mut self, closed: bool) -> Result<Rc<Expr>, TexprError> {
        let mut lower = None;
        let mut upper = None;
        if self.eat(TokenKind::Underscore) {
            lower = Some(self.parse_bound()?);
        }
        if self.eat(TokenKind::Caret) {
            upper = Some(self.parse_bound()?);
        }
        self.integral_depth += 1;
        let body = self.parse_additive();
        self.integral_depth -= 1;
        let body = body?;
        let var = self.parse_differential()?;
        Ok(Rc::new(Expr::Integral {
            lower,
            upper,
            body,
            var,
            closed,
        }))
    }

    fn parse_multi_integral(&mut self, order: usize) -> Result<Rc<Expr>, TexprError> {
        let mut lower = None;
        let mut upper = None;
        if self.eat(TokenKind::Underscore) {
            lower = Some(self.parse_bound()?);
        }
        if self.eat(TokenKind::Caret) {
            upper = Some(self.parse_bound()?);
        }
        self.integral_depth += 1;
        let body = self.parse_additive();
        self.integral_depth -= 1;
        let body = body?;
        let mut vars = Vec::with_capacity(order);
        for _ in 0..order {
            vars.push(self.parse_differential()?);
        }
        Ok(Rc::new(Expr::MultiIntegral {
            order,
            lower,
            upper,
            body,
            vars,
        }))
    }

    /// The trailing `d<var>` of an integral.
    fn parse_differential(&mut self) -> Result<String, TexprError> {
        let token = self.expect(TokenKind::Variable, "the differential d<var>")?;
        if token.lexeme == "d" {
            let var = match self.peek_kind() {
                TokenKind::Variable | TokenKind::Constant => self.advance().lexeme,
                _ => {
                    return Err(self.error_here(
                        ParserErrorKind::MissingSubExpression,
                        "expected a variable after 'd' in the differential",
                    ))
                }
            };
            return Ok(var);
        }
        if token.lexeme.len() >= 2 && token.lexeme.starts_with('d') {
            return Ok(token.lexeme[1..].to_string());
        }
        Err(TexprError::parser(
            ParserErrorKind::MissingSubExpression,
            format!("expected the differential d<var>, found '{}'", token.lexeme),
            token.offset,
        ))
    }

    fn parse_gradient(&mut self) -> Result<Rc<Expr>, TexprError> {
        let vars = if self.eat(TokenKind::Underscore) {
            self.expect(TokenKind::LBrace, "'{'")?;
            let mut vars = vec![self
                .expect(TokenKind::Variable, "a gradient variable")?
                .lexeme];
            while self.eat(TokenKind::Comma) {
                vars.push(
                    self.expect(TokenKind::Variable, "a gradient variable")?
                        .lexeme,
                );
            }
            self.expect(TokenKind::RBrace, "'}'")?;
            Some(vars)
        } else {
            None
        };
        let body = self.parse_power()?;
        Ok(Rc::new(Expr::Gradient { body, vars }))
    }

    // ------------------------------------------------------------------
    // Environments
    // ------------------------------------------------------------------

    fn parse_environment(&mut self) -> Result<Rc<Expr>, TexprError> {
        let begin = self.expect(TokenKind::Begin, "'\\begin'")?;
        let name = begin.lexeme.clone();
        if !ENVIRONMENTS.contains(&name.as_str()) {
            let suggestion = closest_environment(&name);
            return Err(TexprError::parser_with_suggestion(
                ParserErrorKind::UnknownEnvironment,
                format!("unknown environment: {name}"),
                begin.offset,
                format!("did you mean \\begin{{{suggestion}}}?"),
            ));
        }

        if name == "cases" {
            return self.parse_cases(&name);
        }

        let mut rows: Vec<Vec<Rc<Expr>>> = Vec::new();
        let mut row: Vec<Rc<Expr>> = Vec::new();
        loop {
            row.push(self.parse_expression()?);
            if self.eat(TokenKind::Ampersand) {
                continue;
            }
            if self.eat(TokenKind::RowSep) {
                rows.push(std::mem::take(&mut row));
                continue;
            }
            if self.check(TokenKind::End) {
                rows.push(std::mem::take(&mut row));
                break;
            }
            return Err(self.error_here(
                ParserErrorKind::UnexpectedToken,
                format!("unexpected {} inside \\begin{{{name}}}", self.peek()),
            ));
        }
        self.expect_environment_end(&name)?;

        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != width) {
            return Err(self.error_here(
                ParserErrorKind::UnexpectedToken,
                format!("rows of \\begin{{{name}}} have differing lengths"),
            ));
        }

        let matrix = Rc::new(Expr::Matrix { rows });
        // A vmatrix denotes the determinant of its contents
        if name == "vmatrix" {
            return Ok(Expr::call1("det", matrix));
        }
        Ok(matrix)
    }

    fn parse_cases(&mut self, name: &str) -> Result<Rc<Expr>, TexprError> {
        let mut cases = Vec::new();
        loop {
            let value = self.parse_expression()?;
            let condition = if self.eat(TokenKind::Ampersand) {
                if self.check(TokenKind::Text) && self.peek().lexeme == "otherwise" {
                    self.advance();
                    None
                } else {
                    Some(self.parse_expression()?)
                }
            } else {
                None
            };
            cases.push(Case { value, condition });
            if self.eat(TokenKind::RowSep) {
                continue;
            }
            break;
        }
        self.expect_environment_end(name)?;
        Ok(Rc::new(Expr::Piecewise { cases }))
    }

    fn expect_environment_end(&mut self, name: &str) -> Result<(), TexprError> {
        let end = self.expect(TokenKind::End, &format!("'\\end{{{name}}}'"))?;
        if end.lexeme != name {
            return Err(TexprError::parser_with_suggestion(
                ParserErrorKind::MissingDelimiter,
                format!(
                    "environment \\begin{{{name}}} closed by \\end{{{}}}",
                    end.lexeme
                ),
                end.offset,
                format!("close with \\end{{{name}}}"),
            ));
        }
        Ok(())
    }
}

fn comparison_op(kind: TokenKind) -> ComparisonOp {
    match kind {
        TokenKind::Less => ComparisonOp::Less,
        TokenKind::Greater => ComparisonOp::Greater,
        TokenKind::LessEq => ComparisonOp::LessEq,
        TokenKind::GreaterEq => ComparisonOp::GreaterEq,
        TokenKind::NotEq => ComparisonOp::NotEqual,
        TokenKind::Member => ComparisonOp::Member,
        _ => ComparisonOp::Equal,
    }
}

fn inverse_function_name(name: &str) -> Option<&'static str> {
    Some(match name {
        "sin" => "arcsin",
        "cos" => "arccos",
        "tan" => "arctan",
        "cot" => "arccot",
        "sec" => "arcsec",
        "csc" => "arccsc",
        "sinh" => "arcsinh",
        "cosh" => "arccosh",
        "tanh" => "arctanh",
        _ => return None,
    })
}

fn closest_environment(name: &str) -> &'static str {
    ENVIRONMENTS
        .iter()
        .min_by_key(|candidate| strsim::levenshtein(name, candidate))
        .copied()
        .unwrap_or("matrix")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_str(input: &str) -> Rc<Expr> {
        parse(&tokenize(input).unwrap()).unwrap()
    }

    fn parse_err(input: &str) -> TexprError {
        parse(&tokenize(input).unwrap()).unwrap_err()
    }

    #[test]
    fn test_operator_precedence() {
        // 2 + 3 * 4 groups the product first
        let expr = parse_str("2 + 3 * 4");
        let expected = Expr::add(
            Expr::number(2.0),
            Expr::mul(Expr::number(3.0), Expr::number(4.0)),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_times_command() {
        let expr = parse_str("2 + 3 \\times 4");
        let expected = Expr::add(
            Expr::number(2.0),
            Expr::mul(Expr::number(3.0), Expr::number(4.0)),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_implicit_multiplication() {
        let expr = parse_str("2x");
        assert_eq!(expr, Expr::mul(Expr::number(2.0), Expr::variable("x")));

        let expr = parse_str("(x+1)(x-1)");
        let expected = Expr::mul(
            Expr::add(Expr::variable("x"), Expr::number(1.0)),
            Expr::sub(Expr::variable("x"), Expr::number(1.0)),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_power_is_right_associative() {
        let expr = parse_str("2^3^2");
        let expected = Expr::pow(
            Expr::number(2.0),
            Expr::pow(Expr::number(3.0), Expr::number(2.0)),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_braceless_exponent_takes_one_atom() {
        // e^ix = (e^i) * x
        let expr = parse_str("e^ix");
        let expected = Expr::mul(
            Expr::pow(Expr::variable("e"), Expr::variable("i")),
            Expr::variable("x"),
        );
        assert_eq!(expr, expected);

        // e^{ix} = e^(i*x)
        let expr = parse_str("e^{ix}");
        let expected = Expr::pow(
            Expr::variable("e"),
            Expr::mul(Expr::variable("i"), Expr::variable("x")),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(parse_str("-3"), Expr::number(-3.0));
        let expr = parse_str("-x^2");
        // Unary minus binds looser than the power
        assert_eq!(
            expr,
            Expr::neg(Expr::pow(Expr::variable("x"), Expr::number(2.0)))
        );
    }

    #[test]
    fn test_fractions() {
        let half = Expr::div(Expr::number(1.0), Expr::number(2.0));
        assert_eq!(parse_str("\\frac{1}{2}"), half);
        assert_eq!(parse_str("\\frac12"), half);
        assert_eq!(parse_str("\\frac1{2}"), half);

        let err = parse_err("\\frac123");
        assert!(matches!(
            err,
            TexprError::Parser {
                kind: ParserErrorKind::AmbiguousFraction,
                ..
            }
        ));
    }

    #[test]
    fn test_sqrt_with_index() {
        let expr = parse_str("\\sqrt[3]{8}");
        match &*expr {
            Expr::Call {
                name, args, param, ..
            } => {
                assert_eq!(name, "sqrt");
                assert_eq!(args[0], Expr::number(8.0));
                assert_eq!(param.as_deref(), Some(&*Expr::number(3.0)));
            }
            other => panic!("expected sqrt call, got {other:?}"),
        }
    }

    #[test]
    fn test_sum_structure() {
        let expr = parse_str("\\sum_{i=1}^{5} i");
        match &*expr {
            Expr::Sum {
                var, start, end, ..
            } => {
                assert_eq!(var, "i");
                assert_eq!(**start, *Expr::number(1.0));
                assert_eq!(**end, *Expr::number(5.0));
            }
            other => panic!("expected sum, got {other:?}"),
        }
    }

    #[test]
    fn test_limit_structure() {
        let expr = parse_str("\\lim_{x \\to 0} x");
        match &*expr {
            Expr::Limit { var, target, .. } => {
                assert_eq!(var, "x");
                assert_eq!(**target, *Expr::number(0.0));
            }
            other => panic!("expected limit, got {other:?}"),
        }
    }

    #[test]
    fn test_integral_with_bounds() {
        let expr = parse_str("\\int_{0}^{1} x dx");
        match &*expr {
            Expr::Integral {
                lower,
                upper,
                var,
                closed,
                ..
            } => {
                assert_eq!(lower.as_deref(), Some(&*Expr::number(0.0)));
                assert_eq!(upper.as_deref(), Some(&*Expr::number(1.0)));
                assert_eq!(var, "x");
                assert!(!closed);
            }
            other => panic!("expected integral, got {other:?}"),
        }
    }

    #[test]
    fn test_indefinite_integral() {
        let expr = parse_str("\\int x^2 dx");
        match &*expr {
            Expr::Integral { lower, upper, .. } => {
                assert!(lower.is_none());
                assert!(upper.is_none());
            }
            other => panic!("expected integral, got {other:?}"),
        }
    }

    #[test]
    fn test_double_integral() {
        let expr = parse_str("\\iint_{0}^{1} xy dx dy");
        match &*expr {
            Expr::MultiIntegral { order, vars, .. } => {
                assert_eq!(*order, 2);
                assert_eq!(vars, &["x".to_string(), "y".to_string()]);
            }
            other => panic!("expected multi integral, got {other:?}"),
        }
    }

    #[test]
    fn test_derivative_notation() {
        let expr = parse_str("\\frac{d}{dx} x^3");
        match &*expr {
            Expr::Derivative { var, order, .. } => {
                assert_eq!(var, "x");
                assert_eq!(*order, 1);
            }
            other => panic!("expected derivative, got {other:?}"),
        }

        let expr = parse_str("\\frac{d^2}{dx^2} x^3");
        match &*expr {
            Expr::Derivative { order, .. } => assert_eq!(*order, 2),
            other => panic!("expected derivative, got {other:?}"),
        }

        let expr = parse_str("\\frac{\\partial}{\\partial x} xy");
        assert!(matches!(&*expr, Expr::PartialDerivative { .. }));
    }

    #[test]
    fn test_matrix_environment() {
        let expr = parse_str("\\begin{bmatrix}1 & 2 \\\\ 3 & 4\\end{bmatrix}");
        match &*expr {
            Expr::Matrix { rows } => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].len(), 2);
                assert_eq!(*rows[1][0], *Expr::number(3.0));
            }
            other => panic!("expected matrix, got {other:?}"),
        }
    }

    #[test]
    fn test_vmatrix_is_determinant() {
        let expr = parse_str("\\begin{vmatrix}1 & 2 \\\\ 3 & 4\\end{vmatrix}");
        match &*expr {
            Expr::Call { name, args, .. } => {
                assert_eq!(name, "det");
                assert!(matches!(&*args[0], Expr::Matrix { .. }));
            }
            other => panic!("expected det call, got {other:?}"),
        }
    }

    #[test]
    fn test_cases_environment() {
        let expr =
            parse_str("\\begin{cases} x & x > 0 \\\\ -x & \\text{otherwise} \\end{cases}");
        match &*expr {
            Expr::Piecewise { cases } => {
                assert_eq!(cases.len(), 2);
                assert!(cases[0].condition.is_some());
                assert!(cases[1].condition.is_none());
            }
            other => panic!("expected piecewise, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_environment_suggests() {
        let err = parse_err("\\begin{bmatrx}1\\end{bmatrx}");
        assert!(matches!(
            err,
            TexprError::Parser {
                kind: ParserErrorKind::UnknownEnvironment,
                ..
            }
        ));
        assert!(err.suggestion().unwrap().contains("bmatrix"));
    }

    #[test]
    fn test_chained_comparison() {
        let expr = parse_str("1 < x < 3");
        match &*expr {
            Expr::ChainedComparison { exprs, ops } => {
                assert_eq!(exprs.len(), 3);
                assert_eq!(ops, &[ComparisonOp::Less, ComparisonOp::Less]);
            }
            other => panic!("expected chained comparison, got {other:?}"),
        }
    }

    #[test]
    fn test_mixed_chain_direction_rejected() {
        let err = parse_err("1 < x > 3");
        assert!(matches!(
            err,
            TexprError::Parser {
                kind: ParserErrorKind::InvalidChainDirection,
                ..
            }
        ));
    }

    #[test]
    fn test_single_comparison() {
        let expr = parse_str("x \\leq 3");
        assert!(matches!(
            &*expr,
            Expr::Comparison {
                op: ComparisonOp::LessEq,
                ..
            }
        ));
    }

    #[test]
    fn test_absolute_value() {
        let expr = parse_str("|x|");
        assert!(matches!(&*expr, Expr::Abs(_)));

        // |a|b|c| reads as |a| * b * |c|
        let expr = parse_str("|a|b|c|");
        match &*expr {
            Expr::Binary {
                op: BinaryOp::Mul, ..
            } => {}
            other => panic!("expected product of abs groups, got {other:?}"),
        }

        // nested: |x + |y||
        let expr = parse_str("|x + |y||");
        match &*expr {
            Expr::Abs(inner) => assert!(matches!(
                &**inner,
                Expr::Binary {
                    op: BinaryOp::Add,
                    ..
                }
            )),
            other => panic!("expected abs, got {other:?}"),
        }
    }

    #[test]
    fn test_factorial_and_subscript() {
        let expr = parse_str("5!");
        match &*expr {
            Expr::Call { name, .. } => assert_eq!(name, "factorial"),
            other => panic!("expected factorial call, got {other:?}"),
        }

        let expr = parse_str("x_1 + x_{max}");
        let expected = Expr::add(Expr::variable("x_1"), Expr::variable("x_max"));
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_assignment_and_function_definition() {
        let expr = parse_str("let y = 2x");
        match &*expr {
            Expr::Assignment { name, .. } => assert_eq!(name, "y"),
            other => panic!("expected assignment, got {other:?}"),
        }

        let expr = parse_str("f(x, y) = x + y");
        match &*expr {
            Expr::FunctionDef { name, params, .. } => {
                assert_eq!(name, "f");
                assert_eq!(params, &["x".to_string(), "y".to_string()]);
            }
            other => panic!("expected function definition, got {other:?}"),
        }
    }

    #[test]
    fn test_function_application() {
        let expr = parse_str("f(3)");
        match &*expr {
            Expr::Call { name, args, .. } => {
                assert_eq!(name, "f");
                assert_eq!(*args[0], *Expr::number(3.0));
            }
            other => panic!("expected call, got {other:?}"),
        }

        // non-function letters multiply
        let expr = parse_str("x(3)");
        assert!(matches!(
            &*expr,
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_top_level_conditional() {
        let expr = parse_str("x^2, x > 0");
        assert!(matches!(&*expr, Expr::Conditional { .. }));
    }

    #[test]
    fn test_vector_and_interval() {
        let expr = parse_str("\\langle 1, 2, 3 \\rangle");
        match &*expr {
            Expr::Vector { components, unit } => {
                assert_eq!(components.len(), 3);
                assert!(!unit);
            }
            other => panic!("expected vector, got {other:?}"),
        }

        let expr = parse_str("[0, 1]");
        assert!(matches!(&*expr, Expr::Interval { .. }));
    }

    #[test]
    fn test_log_with_base() {
        let expr = parse_str("\\log_{2}{8}");
        match &*expr {
            Expr::Call { name, base, .. } => {
                assert_eq!(name, "log");
                assert_eq!(base.as_deref(), Some(&*Expr::number(2.0)));
            }
            other => panic!("expected log call, got {other:?}"),
        }
    }

    #[test]
    fn test_inverse_trig_exponent() {
        let expr = parse_str("\\sin^{-1} x");
        match &*expr {
            Expr::Call { name, .. } => assert_eq!(name, "arcsin"),
            other => panic!("expected arcsin call, got {other:?}"),
        }

        // \sin^2 x stays a square of the call
        let expr = parse_str("\\sin^2 x");
        assert!(matches!(
            &*expr,
            Expr::Binary {
                op: BinaryOp::Pow,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_closing_brace_suggestion() {
        let err = parse_err("\\sin{");
        assert!(matches!(
            err,
            TexprError::Parser {
                kind: ParserErrorKind::MissingDelimiter,
                ..
            }
        ));
        assert!(err.suggestion().unwrap().contains('}'));
    }

    #[test]
    fn test_depth_cap() {
        let deep = format!("{}x{}", "(".repeat(600), ")".repeat(600));
        let err = parse_err(&deep);
        assert!(matches!(
            err,
            TexprError::Parser {
                kind: ParserErrorKind::DepthExceeded,
                ..
            }
        ));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_strict_mode_collects_errors() {
        let tokens = tokenize("(1 + ) + (2 + )").unwrap();
        let errors = parse_strict(&tokens, MAX_RECURSION_DEPTH).unwrap_err();
        assert!(errors.len() >= 2, "expected at least 2 errors, got {errors:?}");
    }

    #[test]
    fn test_trailing_input_rejected() {
        let err = parse_err("1 2 +");
        // `1 2` multiplies implicitly, so the dangling + is the error
        assert!(matches!(err, TexprError::Parser { .. }));
    }

    #[test]
    fn test_gradient() {
        let expr = parse_str("\\nabla f(x)");
        assert!(matches!(&*expr, Expr::Gradient { .. }));
    }
}
