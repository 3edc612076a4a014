//! Lexer: cell source text to a flat token sequence
//!
//! Indentation is significant outside brackets. A new line at the same depth
//! produces a separator, a deeper line opens a block and a shallower line
//! closes blocks, in the manner of an off-side rule.

use crate::ast::{Literal, Span};
use crate::operators::OperatorTable;
use arevel_core::{Number, SyntaxError};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Literal,
    Delimiter,
    Identifier,
    Operator,
    WhitespaceStart,
    WhitespaceEnd,
    WhitespaceSeparator,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub lexeme: String,
    pub kind: TokenKind,
    pub span: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literal: Option<Literal>,
}

impl Token {
    fn new(lexeme: impl Into<String>, kind: TokenKind, span: Span) -> Self {
        Self {
            lexeme: lexeme.into(),
            kind,
            span,
            literal: None,
        }
    }

    fn literal(lexeme: impl Into<String>, literal: Literal, span: Span) -> Self {
        Self {
            literal: Some(literal),
            ..Self::new(lexeme, TokenKind::Literal, span)
        }
    }

    /// Whether a following `-` is binary subtraction
    fn ends_operand(&self) -> bool {
        match self.kind {
            TokenKind::Literal | TokenKind::Identifier => true,
            TokenKind::Delimiter => matches!(self.lexeme.as_str(), ")" | "]" | "}"),
            _ => false,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::WhitespaceStart => f.write_str("<indent>"),
            TokenKind::WhitespaceEnd => f.write_str("<dedent>"),
            TokenKind::WhitespaceSeparator => f.write_str("<newline>"),
            _ => f.write_str(&self.lexeme),
        }
    }
}

/// Characters that combine into multi-character operator spellings
const OPERATOR_CHARS: &[char] = &['+', '<', '>', '=', '!', '&', '|', '^', '~', '?', '@', '#', '$'];

/// Single-character punctuation
const DELIMITER_CHARS: &[char] = &['(', ')', '[', ']', '{', '}', ',', ':', ';', '.', '*', '/', '%', '-'];

const TAB_WIDTH: usize = 4;

/// Tokenize one cell's source
pub fn lex(source: &str, table: &OperatorTable) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source, table).run()
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    table: &'a OperatorTable,
    tokens: Vec<Token>,
    indents: Vec<usize>,
    depth: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &str, table: &'a OperatorTable) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            table,
            tokens: Vec::new(),
            indents: Vec::new(),
            depth: 0,
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        self.line_start()?;

        while let Some(c) = self.peek(0) {
            match c {
                '\n' | '\r' => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.line_start()?;
                    }
                }
                c if c.is_whitespace() => self.pos += 1,
                '"' | '\'' => self.string(c)?,
                c if c.is_ascii_digit() => self.number(self.pos)?,
                '.' => self.dot()?,
                '-' => self.minus()?,
                '*' => {
                    let spelling = if self.peek(1) == Some('*') { "**" } else { "*" };
                    self.punctuation(spelling);
                }
                c if c.is_alphabetic() || c == '_' => self.word(),
                c if OPERATOR_CHARS.contains(&c) => self.operator_run()?,
                c if DELIMITER_CHARS.contains(&c) => {
                    match c {
                        '(' | '[' | '{' => self.depth += 1,
                        ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
                        _ => {}
                    }
                    self.punctuation(&c.to_string());
                }
                other => return Err(SyntaxError::unknown_token(&other.to_string(), self.pos)),
            }
        }

        let end = self.chars.len();
        while self.indents.len() > 1 {
            self.indents.pop();
            self.tokens.push(Token::new("", TokenKind::WhitespaceEnd, Span::new(end, end)));
        }
        Ok(self.tokens)
    }

    /// Emit a fixed spelling as an Operator or Delimiter token
    fn punctuation(&mut self, spelling: &str) {
        let start = self.pos;
        self.pos += spelling.chars().count();
        let kind = if self.table.is_operator(spelling) {
            TokenKind::Operator
        } else {
            TokenKind::Delimiter
        };
        self.tokens.push(Token::new(spelling, kind, Span::new(start, self.pos)));
    }

    /// Measure indentation at the start of a line and emit layout tokens
    fn line_start(&mut self) -> Result<(), SyntaxError> {
        loop {
            let mut width = 0;
            while let Some(c) = self.peek(0) {
                match c {
                    ' ' => width += 1,
                    '\t' => width += TAB_WIDTH - width % TAB_WIDTH,
                    _ => break,
                }
                self.pos += 1;
            }

            match self.peek(0) {
                // blank line
                Some('\n') | Some('\r') => {
                    self.pos += 1;
                    continue;
                }
                None => return Ok(()),
                Some(_) => {}
            }

            let at = Span::new(self.pos, self.pos);
            let Some(&top) = self.indents.last() else {
                self.indents.push(width);
                return Ok(());
            };

            if width > top {
                self.indents.push(width);
                self.tokens.push(Token::new("", TokenKind::WhitespaceStart, at));
                return Ok(());
            }

            while self.indents.last().map_or(false, |&level| level > width) {
                self.indents.pop();
                self.tokens.push(Token::new("", TokenKind::WhitespaceEnd, at));
            }
            if self.indents.last() != Some(&width) {
                return Err(SyntaxError::invalid_indentation(self.pos));
            }
            self.tokens.push(Token::new("\n", TokenKind::WhitespaceSeparator, at));
            return Ok(());
        }
    }

    fn dot(&mut self) -> Result<(), SyntaxError> {
        match self.peek(1) {
            Some('.') => {
                self.punctuation("..");
                Ok(())
            }
            Some(c) if c.is_ascii_digit() => self.number(self.pos),
            _ => {
                self.punctuation(".");
                Ok(())
            }
        }
    }

    fn minus(&mut self) -> Result<(), SyntaxError> {
        let binary = self.tokens.last().map_or(false, Token::ends_operand);
        let starts_number = match (self.peek(1), self.peek(2)) {
            (Some(c), _) if c.is_ascii_digit() => true,
            (Some('.'), Some(c)) => c.is_ascii_digit(),
            _ => false,
        };

        if !binary && starts_number {
            let start = self.pos;
            self.pos += 1;
            self.number(start)
        } else {
            self.punctuation("-");
            Ok(())
        }
    }

    /// Number literal. `start` is the index of the sign when there is one.
    fn number(&mut self, start: usize) -> Result<(), SyntaxError> {
        let mut digits = 0;
        while self.peek(0).map_or(false, |c| c.is_ascii_digit()) {
            self.pos += 1;
            digits += 1;
        }

        if self.peek(0) == Some('.') && self.peek(1) != Some('.') {
            self.pos += 1;
            let mut fraction = 0;
            while self.peek(0).map_or(false, |c| c.is_ascii_digit()) {
                self.pos += 1;
                fraction += 1;
            }
            if fraction == 0 {
                return Err(SyntaxError::invalid_float(self.pos));
            }
            digits += fraction;
        }

        if digits == 0 {
            return Err(SyntaxError::invalid_number(start));
        }

        if matches!(self.peek(0), Some('e') | Some('E')) {
            self.pos += 1;
            if matches!(self.peek(0), Some('+') | Some('-')) {
                self.pos += 1;
            }
            let mut exponent = 0;
            while self.peek(0).map_or(false, |c| c.is_ascii_digit()) {
                self.pos += 1;
                exponent += 1;
            }
            if exponent == 0 {
                return Err(SyntaxError::invalid_float(self.pos));
            }
        }

        if self.peek(0).map_or(false, |c| c.is_alphanumeric() || c == '_') {
            return Err(SyntaxError::invalid_number(start));
        }

        let lexeme: String = self.chars[start..self.pos].iter().collect();
        let number = Number::from_str(&lexeme).map_err(|_| SyntaxError::invalid_number(start))?;
        self.tokens.push(Token::literal(
            lexeme,
            Literal::Number(number),
            Span::new(start, self.pos),
        ));
        Ok(())
    }

    fn string(&mut self, quote: char) -> Result<(), SyntaxError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();

        loop {
            let c = self
                .peek(0)
                .ok_or_else(|| SyntaxError::unterminated_string(start))?;
            if c == quote {
                self.pos += 1;
                break;
            }
            if c == '\\' {
                let escaped = self
                    .peek(1)
                    .ok_or_else(|| SyntaxError::unterminated_string(start))?;
                match escaped {
                    '\\' => value.push('\\'),
                    '\'' => value.push('\''),
                    '"' => value.push('"'),
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    't' => value.push('\t'),
                    '0' => value.push('\0'),
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
                self.pos += 2;
            } else {
                value.push(c);
                self.pos += 1;
            }
        }

        let lexeme: String = self.chars[start..self.pos].iter().collect();
        self.tokens.push(Token::literal(
            lexeme,
            Literal::Text(value),
            Span::new(start, self.pos),
        ));
        Ok(())
    }

    fn word(&mut self) {
        let start = self.pos;
        while self.peek(0).map_or(false, |c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let span = Span::new(start, self.pos);
        let lower = text.to_lowercase();

        let token = match lower.as_str() {
            "true" => Token::literal(text, Literal::Boolean(true), span),
            "false" => Token::literal(text, Literal::Boolean(false), span),
            "none" => Token::literal(text, Literal::None, span),
            keyword if self.table.is_operator(keyword) => {
                Token::new(lower.clone(), TokenKind::Operator, span)
            }
            _ => Token::new(text, TokenKind::Identifier, span),
        };
        self.tokens.push(token);
    }

    fn operator_run(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        while self.peek(0).map_or(false, |c| OPERATOR_CHARS.contains(&c)) {
            self.pos += 1;
        }
        let spelling: String = self.chars[start..self.pos].iter().collect();
        if !self.table.is_operator(&spelling) {
            return Err(SyntaxError::unknown_token(&spelling, start));
        }
        self.tokens.push(Token::new(spelling, TokenKind::Operator, Span::new(start, self.pos)));
        Ok(())
    }
}
