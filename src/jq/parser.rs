//! Parser for jq-like query expressions.
//!
//! Hand-written recursive descent. Operator precedence, lowest first:
//! - `|` (and `TERM as $x | body`)
//! - `,`
//! - `//`
//! - `=`, `|=`
//! - `or`
//! - `and`
//! - `==`, `!=`, `<`, `<=`, `>`, `>=`
//! - `+`, `-`
//! - `*`, `/`, `%`
//! - unary `-`
//! - postfix terms: `.foo`, `[e]`, `[]`, `[a:b]`, `?`

use thiserror::Error;

use super::expr::{ArithOp, CompareOp, Expr, Literal, ObjectEntry, ObjectKey};

/// Error that occurs during parsing.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

/// Words that end an expression rather than start one.
const RESERVED: &[&str] = &[
    "then", "elif", "else", "end", "as", "and", "or", "catch", "if", "try", "reduce",
];

/// Parser state.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Parser { input, pos: 0 }
    }

    /// Unconsumed input.
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consume `c` if it is the current character.
    fn eat(&mut self, c: char) -> bool {
        let found = self.rest().starts_with(c);
        if found {
            self.pos += c.len_utf8();
        }
        found
    }

    /// Consume the longest prefix whose characters satisfy `pred`.
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    /// Skip whitespace and `#` comments.
    fn skip_ws(&mut self) {
        loop {
            self.take_while(char::is_whitespace);
            if !self.eat('#') {
                return;
            }
            self.take_while(|c| c != '\n');
        }
    }

    fn unexpected(&self, wanted: &str) -> ParseError {
        let found = self
            .peek()
            .map_or_else(|| "end of input".to_string(), |c| format!("'{}'", c));
        ParseError::new(format!("expected {}, found {}", wanted, found), self.pos)
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_ws();
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", expected)))
        }
    }

    /// True if `keyword` comes next as a whole word.
    fn matches_keyword(&self, keyword: &str) -> bool {
        self.rest()
            .strip_prefix(keyword)
            .is_some_and(|after| !after.starts_with(is_ident_continue))
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        self.skip_ws();
        if !self.matches_keyword(keyword) {
            return Err(ParseError::new(format!("expected '{}'", keyword), self.pos));
        }
        self.pos += keyword.len();
        Ok(())
    }

    /// Field, function or keyword name.
    fn parse_ident(&mut self) -> Result<String, ParseError> {
        if !self.peek().is_some_and(is_ident_start) {
            return Err(self.unexpected("identifier"));
        }
        Ok(self.take_while(is_ident_continue).to_string())
    }

    /// Parse `$name`, returning the name without the sigil.
    fn parse_variable(&mut self) -> Result<String, ParseError> {
        self.skip_ws();
        self.expect('$')?;
        self.parse_ident()
    }

    /// Number literal: digits, an optional fraction and an optional exponent. Values too
    /// large for a double are clamped to the largest finite one.
    fn parse_number_literal(&mut self) -> Result<Literal, ParseError> {
        let start = self.pos;
        if self.take_while(|c| c.is_ascii_digit()).is_empty() {
            return Err(ParseError::new("expected digit", self.pos));
        }

        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.next();
            self.take_while(|c| c.is_ascii_digit());
            is_float = true;
        }
        if self.eat('e') || self.eat('E') {
            if !self.eat('+') {
                self.eat('-');
            }
            self.take_while(|c| c.is_ascii_digit());
            is_float = true;
        }

        let text = &self.input[start..self.pos];
        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Literal::Int(n));
            }
        }
        // Integers past i64 fall back to doubles, like every jq number.
        let f: f64 = text
            .parse()
            .map_err(|_| ParseError::new("invalid number", start))?;
        Ok(Literal::Float(f.min(f64::MAX)))
    }

    /// Double-quoted string with JSON escapes. Interpolation is rejected.
    fn parse_string_literal(&mut self) -> Result<String, ParseError> {
        self.expect('"')?;
        let mut result = String::new();
        loop {
            result.push_str(self.take_while(|c| c != '"' && c != '\\'));
            match self.next() {
                Some('"') => return Ok(result),
                Some(_) => {}
                None => return Err(ParseError::new("unterminated string", self.pos)),
            }
            let escaped = match self.next() {
                Some('u') => self.parse_unicode_escape()?,
                Some('n') => '\n',
                Some('r') => '\r',
                Some('t') => '\t',
                Some('b') => '\x08',
                Some('f') => '\x0C',
                Some(c @ ('"' | '\\' | '/')) => c,
                Some('(') => {
                    return Err(ParseError::new("string interpolation is not supported", self.pos))
                }
                Some(c) => {
                    return Err(ParseError::new(format!("invalid escape sequence '\\{}'", c), self.pos))
                }
                None => return Err(ParseError::new("unterminated string", self.pos)),
            };
            result.push(escaped);
        }
    }

    /// Parse the 4 hex digits of a `\u` escape (and a trailing low surrogate if needed).
    fn parse_unicode_escape(&mut self) -> Result<char, ParseError> {
        let high = self.parse_hex4()?;
        if (0xD800..0xDC00).contains(&high) {
            if self.rest().starts_with("\\u") {
                self.pos += 2;
                let low = self.parse_hex4()?;
                if (0xDC00..0xE000).contains(&low) {
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    return char::from_u32(code)
                        .ok_or_else(|| ParseError::new("invalid unicode code point", self.pos));
                }
            }
            return Err(ParseError::new("unpaired surrogate in unicode escape", self.pos));
        }
        char::from_u32(high).ok_or_else(|| ParseError::new("invalid unicode code point", self.pos))
    }

    fn parse_hex4(&mut self) -> Result<u32, ParseError> {
        let mut code = 0u32;
        for _ in 0..4 {
            match self.peek().and_then(|c| c.to_digit(16)) {
                Some(d) => {
                    self.next();
                    code = code * 16 + d;
                }
                None => return Err(ParseError::new("invalid unicode escape", self.pos)),
            }
        }
        Ok(code)
    }

    /// Parse a bracket suffix applied to `target`: `[]`, `[e]`, `[a:b]`, `[:b]`, `[a:]`.
    /// This is for indexing, NOT array construction.
    fn parse_bracket_suffix(&mut self, target: Expr) -> Result<Expr, ParseError> {
        self.expect('[')?;
        self.skip_ws();

        // Empty brackets = iterate
        if self.eat(']') {
            return Ok(chain(target, Expr::Iterate));
        }

        // Slice starting with ':'
        if self.eat(':') {
            let end = self.parse_pipe()?;
            self.expect(']')?;
            return Ok(Expr::Slice {
                target: Box::new(target),
                start: None,
                end: Some(Box::new(end)),
            });
        }

        let first = self.parse_pipe()?;
        self.skip_ws();

        if self.eat(']') {
            return Ok(Expr::Index {
                target: Box::new(target),
                index: Box::new(first),
            });
        }
        if !self.eat(':') {
            return Err(self.unexpected("']' or ':'"));
        }
        self.skip_ws();
        let end = match self.peek() {
            Some(']') => None,
            _ => Some(Box::new(self.parse_pipe()?)),
        };
        self.expect(']')?;
        Ok(Expr::Slice {
            target: Box::new(target),
            start: Some(Box::new(first)),
            end,
        })
    }

    /// Parse array construction: `[]` or `[expr]`
    fn parse_array_construction(&mut self) -> Result<Expr, ParseError> {
        self.expect('[')?;
        self.skip_ws();

        if self.eat(']') {
            return Ok(Expr::Array(None));
        }

        let inner = self.parse_pipe()?;
        self.expect(']')?;

        Ok(Expr::Array(Some(Box::new(inner))))
    }

    /// Object construction: `{key: value, ...}`, with the `{foo}` and `{$foo}` shorthands.
    fn parse_object_construction(&mut self) -> Result<Expr, ParseError> {
        self.expect('{')?;
        let mut entries = Vec::new();
        self.skip_ws();
        if self.eat('}') {
            return Ok(Expr::Object(entries));
        }
        loop {
            entries.push(self.parse_object_entry()?);
            self.skip_ws();
            if self.eat('}') {
                return Ok(Expr::Object(entries));
            }
            if !self.eat(',') {
                return Err(self.unexpected("',' or '}'"));
            }
        }
    }

    fn parse_object_entry(&mut self) -> Result<ObjectEntry, ParseError> {
        self.skip_ws();
        if self.peek() == Some('$') {
            let name = self.parse_variable()?;
            return Ok(ObjectEntry::new(name.clone(), Expr::Var(name)));
        }

        let key = if self.eat('(') {
            let key = self.parse_pipe()?;
            self.expect(')')?;
            ObjectKey::Expr(Box::new(key))
        } else if self.peek() == Some('"') {
            ObjectKey::Literal(self.parse_string_literal()?)
        } else {
            ObjectKey::Literal(self.parse_ident()?)
        };

        self.skip_ws();
        let value = match (&key, self.eat(':')) {
            (_, true) => self.parse_object_value()?,
            // `{foo}` is `{foo: .foo}`
            (ObjectKey::Literal(name), false) => Expr::Field(name.clone()),
            (ObjectKey::Expr(_), false) => {
                return Err(ParseError::new("dynamic key requires explicit value", self.pos))
            }
        };
        Ok(ObjectEntry { key, value })
    }

    /// Object values may be pipelines but may not contain a top-level comma.
    fn parse_object_value(&mut self) -> Result<Expr, ParseError> {
        let mut exprs = vec![self.parse_alternative()?];
        loop {
            self.skip_ws();
            if self.peek() == Some('|') && !self.rest().starts_with("|=") {
                self.next();
                exprs.push(self.parse_alternative()?);
            } else {
                break;
            }
        }
        Ok(Expr::pipe(exprs))
    }

    /// Parse a primary expression (atoms and parenthesized expressions).
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        self.skip_ws();

        match self.peek() {
            Some('(') => {
                self.next();
                let expr = self.parse_pipe()?;
                self.expect(')')?;
                Ok(expr)
            }

            Some('[') => self.parse_array_construction(),

            Some('{') => self.parse_object_construction(),

            Some('"') => {
                let s = self.parse_string_literal()?;
                Ok(Expr::Literal(Literal::String(s)))
            }

            Some(c) if c.is_ascii_digit() => Ok(Expr::Literal(self.parse_number_literal()?)),

            Some('$') => Ok(Expr::Var(self.parse_variable()?)),

            Some('.') => {
                self.next();

                // `..` (recursive descent)
                if self.eat('.') {
                    return Ok(Expr::RecursiveDescent);
                }

                match self.peek() {
                    Some('[') => self.parse_bracket_suffix(Expr::Identity),
                    Some('"') => Ok(Expr::Field(self.parse_string_literal()?)),
                    Some(c) if is_ident_start(c) => Ok(Expr::Field(self.parse_ident()?)),
                    _ => Ok(Expr::Identity),
                }
            }

            Some(c) if is_ident_start(c) => {
                if self.matches_keyword("null") {
                    self.pos += 4;
                    Ok(Expr::Literal(Literal::Null))
                } else if self.matches_keyword("true") {
                    self.pos += 4;
                    Ok(Expr::Literal(Literal::Bool(true)))
                } else if self.matches_keyword("false") {
                    self.pos += 5;
                    Ok(Expr::Literal(Literal::Bool(false)))
                } else if self.matches_keyword("if") {
                    self.parse_if_expr()
                } else if self.matches_keyword("try") {
                    self.parse_try_expr()
                } else if self.matches_keyword("reduce") {
                    self.parse_reduce_expr()
                } else {
                    self.parse_call()
                }
            }

            Some(c) => Err(ParseError::new(
                format!("unexpected character '{}', expected expression", c),
                self.pos,
            )),
            None => Err(ParseError::new("unexpected end of input", self.pos)),
        }
    }

    /// Parse a function call: `name` or `name(arg; arg; ...)`.
    fn parse_call(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        let name = self.parse_ident()?;
        if RESERVED.contains(&name.as_str()) {
            return Err(ParseError::new(
                format!("unexpected keyword '{}', expected expression", name),
                start,
            ));
        }

        let mut args = Vec::new();
        self.skip_ws();
        if self.eat('(') {
            loop {
                args.push(self.parse_pipe()?);
                self.skip_ws();
                if self.eat(')') {
                    break;
                }
                if !self.eat(';') {
                    return Err(self.unexpected("';' or ')'"));
                }
            }
        }

        Ok(Expr::Call { name, args })
    }

    /// Parse an if-then-else expression.
    /// Syntax: if COND then THEN elif COND then THEN else ELSE end
    fn parse_if_expr(&mut self) -> Result<Expr, ParseError> {
        self.expect_keyword("if")?;
        let cond = self.parse_pipe()?;
        self.expect_keyword("then")?;
        let then_branch = self.parse_pipe()?;
        let else_branch = self.parse_else_branch()?;

        Ok(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    /// Parse the else branch of an if expression (handles elif chaining).
    fn parse_else_branch(&mut self) -> Result<Expr, ParseError> {
        self.skip_ws();
        if self.matches_keyword("elif") {
            // elif is desugared to nested if
            self.pos += 4;
            let cond = self.parse_pipe()?;
            self.expect_keyword("then")?;
            let then_branch = self.parse_pipe()?;
            let else_branch = self.parse_else_branch()?;

            Ok(Expr::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            })
        } else if self.matches_keyword("else") {
            self.pos += 4;
            let else_branch = self.parse_pipe()?;
            self.expect_keyword("end")?;
            Ok(else_branch)
        } else if self.matches_keyword("end") {
            // No else branch: pass the input through
            self.pos += 3;
            Ok(Expr::Identity)
        } else {
            Err(ParseError::new(
                "expected 'elif', 'else', or 'end'",
                self.pos,
            ))
        }
    }

    /// Parse a try-catch expression.
    /// Syntax: try EXPR catch HANDLER
    ///         try EXPR                 (catch is implicit, suppresses errors)
    fn parse_try_expr(&mut self) -> Result<Expr, ParseError> {
        self.expect_keyword("try")?;
        let expr = self.parse_postfix_term(false)?;
        self.skip_ws();

        let catch = if self.matches_keyword("catch") {
            self.pos += 5;
            Some(Box::new(self.parse_postfix_term(false)?))
        } else {
            None
        };

        Ok(Expr::Try {
            expr: Box::new(expr),
            catch,
        })
    }

    /// Parse a reduction.
    /// Syntax: reduce SOURCE as $name (INIT; UPDATE)
    fn parse_reduce_expr(&mut self) -> Result<Expr, ParseError> {
        self.expect_keyword("reduce")?;
        let source = self.parse_postfix_term(false)?;
        self.expect_keyword("as")?;
        let var = self.parse_variable()?;
        self.expect('(')?;
        let init = self.parse_pipe()?;
        self.expect(';')?;
        let update = self.parse_pipe()?;
        self.expect(')')?;

        Ok(Expr::Reduce {
            source: Box::new(source),
            var,
            init: Box::new(init),
            update: Box::new(update),
        })
    }

    /// Parse a primary followed by any postfix operations (field access, indexing,
    /// `?`) and, when `allow_binding` is set, an `as $name | body` binding.
    fn parse_postfix_term(&mut self, allow_binding: bool) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            self.skip_ws();

            match self.peek() {
                Some('.') if self.peek_second() == Some('[') => {
                    self.next();
                    expr = self.parse_bracket_suffix(expr)?;
                }
                Some('.') if self.peek_second() == Some('"') => {
                    self.next();
                    let name = self.parse_string_literal()?;
                    expr = chain(expr, Expr::Field(name));
                }
                Some('.') if self.peek_second().is_some_and(is_ident_start) => {
                    self.next();
                    let name = self.parse_ident()?;
                    expr = chain(expr, Expr::Field(name));
                }
                Some('[') => {
                    expr = self.parse_bracket_suffix(expr)?;
                }
                Some('?') => {
                    self.next();
                    expr = Expr::Optional(Box::new(expr));
                }
                _ => break,
            }
        }

        self.skip_ws();
        if allow_binding && self.matches_keyword("as") {
            self.pos += 2;
            let var = self.parse_variable()?;
            self.expect('|')?;
            let body = self.parse_pipe()?;
            return Ok(Expr::As {
                source: Box::new(expr),
                var,
                body: Box::new(body),
            });
        }

        Ok(expr)
    }

    /// Parse unary minus.
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.skip_ws();
        if self.eat('-') {
            let operand = self.parse_unary()?;
            return Ok(match operand {
                Expr::Literal(Literal::Int(n)) => Expr::Literal(Literal::Int(-n)),
                Expr::Literal(Literal::Float(f)) => Expr::Literal(Literal::Float(-f)),
                other => Expr::Neg(Box::new(other)),
            });
        }
        self.parse_postfix_term(true)
    }

    /// One left-associative arithmetic level: `operand (op operand)*`.
    fn parse_arith_level(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
        operator: fn(&Self) -> Option<ArithOp>,
    ) -> Result<Expr, ParseError> {
        let mut left = operand(self)?;
        loop {
            self.skip_ws();
            let Some(op) = operator(self) else {
                return Ok(left);
            };
            self.next();
            left = Expr::Arithmetic {
                op,
                left: Box::new(left),
                right: Box::new(operand(self)?),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.parse_arith_level(Self::parse_unary, |p| match p.peek()? {
            '*' => Some(ArithOp::Mul),
            '/' if !p.rest().starts_with("//") => Some(ArithOp::Div),
            '%' => Some(ArithOp::Mod),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        self.parse_arith_level(Self::parse_multiplicative, |p| match p.peek()? {
            '+' => Some(ArithOp::Add),
            '-' => Some(ArithOp::Sub),
            _ => None,
        })
    }

    /// Parse comparison expressions: `==`, `!=`, `<`, `<=`, `>`, `>=`
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;
        self.skip_ws();

        const OPERATORS: [(&str, CompareOp); 6] = [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Ne),
            ("<=", CompareOp::Le),
            (">=", CompareOp::Ge),
            ("<", CompareOp::Lt),
            (">", CompareOp::Gt),
        ];
        let Some((token, op)) = OPERATORS.iter().find(|(t, _)| self.rest().starts_with(t)) else {
            return Ok(left);
        };
        self.pos += token.len();
        let op = *op;

        let right = self.parse_additive()?;

        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// `and` and `or` chains: `operand (keyword operand)*`.
    fn parse_keyword_level(
        &mut self,
        keyword: &str,
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
        combine: fn(Box<Expr>, Box<Expr>) -> Expr,
    ) -> Result<Expr, ParseError> {
        let mut left = operand(self)?;
        loop {
            self.skip_ws();
            if !self.matches_keyword(keyword) {
                return Ok(left);
            }
            self.pos += keyword.len();
            left = combine(Box::new(left), Box::new(operand(self)?));
        }
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        self.parse_keyword_level("and", Self::parse_comparison, Expr::And)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        self.parse_keyword_level("or", Self::parse_and, Expr::Or)
    }

    /// Parse assignments: `path = value`, `path |= f`
    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_or()?;
        self.skip_ws();

        if self.rest().starts_with("|=") {
            self.pos += 2;
            let f = self.parse_or()?;
            return Ok(Expr::Update {
                path: Box::new(left),
                f: Box::new(f),
            });
        }
        if self.peek() == Some('=') && !self.rest().starts_with("==") {
            self.next();
            let value = self.parse_or()?;
            return Ok(Expr::Assign {
                path: Box::new(left),
                value: Box::new(value),
            });
        }

        Ok(left)
    }

    /// Parse alternative expressions: `expr // expr`
    fn parse_alternative(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_assignment()?;
        self.skip_ws();

        if !self.rest().starts_with("//") {
            return Ok(left);
        }
        self.pos += 2;
        // Right-associative, like jq.
        let right = self.parse_alternative()?;
        Ok(Expr::Alternative(Box::new(left), Box::new(right)))
    }

    /// Parse a comma expression: `expr, expr, ...`
    fn parse_comma(&mut self) -> Result<Expr, ParseError> {
        let mut exprs = vec![self.parse_alternative()?];

        loop {
            self.skip_ws();
            if !self.eat(',') {
                break;
            }
            exprs.push(self.parse_alternative()?);
        }

        Ok(Expr::comma(exprs))
    }

    /// Parse a pipe expression: `expr | expr | ...`
    /// This is the lowest precedence operator.
    fn parse_pipe(&mut self) -> Result<Expr, ParseError> {
        let mut exprs = vec![self.parse_comma()?];

        loop {
            self.skip_ws();
            if self.rest().starts_with("|=") || !self.eat('|') {
                break;
            }
            exprs.push(self.parse_comma()?);
        }

        Ok(Expr::pipe(exprs))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Append a step to a postfix chain, flattening nested pipes.
fn chain(target: Expr, step: Expr) -> Expr {
    match target {
        Expr::Identity => step,
        Expr::Pipe(mut steps) => {
            steps.push(step);
            Expr::Pipe(steps)
        }
        other => Expr::Pipe(vec![other, step]),
    }
}

/// Parse a jq expression string into an AST.
///
/// # Examples
///
/// ```
/// use jqfunc::jq::parse;
///
/// // Field access and iteration
/// let expr = parse(".items[].name").unwrap();
///
/// // Variables, as declared by a function's parameter list
/// let expr = parse("$x + $y").unwrap();
///
/// // Object construction with a dynamic key
/// let expr = parse(". + {($key): $value}").unwrap();
/// ```
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    if parser.rest().is_empty() {
        return Err(ParseError::new("empty query", 0));
    }
    let expr = parser.parse_pipe()?;

    // Ensure we consumed all input
    parser.skip_ws();
    if let Some(c) = parser.peek() {
        return Err(ParseError::new(
            format!("unexpected character '{}'", c),
            parser.pos,
        ));
    }

    Ok(expr)
}
