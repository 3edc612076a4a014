//! Keyword descriptors for the Pratt parser
//!
//! Every keyword the parser understands has exactly one descriptor: a left
//! binding power plus optional null-denotation (prefix position) and
//! left-denotation (infix position) behaviours. Descriptors live in an
//! `OperatorTable` built once and shared read-only.

use std::collections::HashMap;

/// Pseudo-keywords for token classes that have no fixed spelling
pub mod pseudo {
    pub const LITERAL: &str = "(literal)";
    pub const IDENTIFIER: &str = "(identifier)";
    pub const NEWLINE: &str = "(newline)";
    pub const INDENT: &str = "(indent)";
    pub const DEDENT: &str = "(dedent)";
    pub const END: &str = "(end)";
}

/// Binding power of the operand of a prefix operator
pub const PREFIX_BP: u8 = 100;

/// Behaviour of a keyword in prefix position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nud {
    Literal,
    Identifier,
    /// Unary operator node (`-`, `not`)
    Prefix,
    /// Unary `+`, yields its operand
    Plus,
    /// `(a, b)` grouping
    Group,
    /// `[a, b]` array
    Array,
    /// `{ ... }` explicit block
    Brace,
    /// `if cond` conditional header
    If,
    /// `else` / `else if cond` header
    Else,
    /// `..end` range without start
    Range,
    /// Indented block
    Block,
}

/// Behaviour of a keyword in infix position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    /// Left-associative binary operator
    Infix,
    /// Right-associative binary operator
    InfixRight,
    /// `not in`
    NotIn,
    /// `f(args)`
    Call,
    /// `xs[filter]`
    Index,
    /// `obj.attr`
    Member,
    /// `key: value`
    MapEntry,
    /// `,` or newline joining map entries
    Continuation,
    /// `(params) if cond`
    Guard,
    /// `start..end`
    Range,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub keyword: &'static str,
    pub lbp: u8,
    pub nud: Option<Nud>,
    pub led: Option<Led>,
    /// Lexed as an Operator token rather than a Delimiter
    pub operator: bool,
}

impl Keyword {
    fn new(keyword: &'static str) -> Self {
        Self {
            keyword,
            lbp: 0,
            nud: None,
            led: None,
            operator: false,
        }
    }
}

/// Immutable registry of keyword descriptors
#[derive(Debug, Clone, Default)]
pub struct OperatorTable {
    keywords: HashMap<&'static str, Keyword>,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The language's keywords and binding powers
    pub fn standard() -> Self {
        use pseudo::*;

        let mut table = Self::new()
            .with_nud(LITERAL, Nud::Literal, false)
            .with_nud(IDENTIFIER, Nud::Identifier, false)
            .with_led(NEWLINE, 10, Led::Continuation, false)
            .with_led(",", 10, Led::Continuation, false)
            .with_nud(INDENT, Nud::Block, false)
            .with_closer(DEDENT)
            .with_closer(END)
            .with_led(":", 20, Led::MapEntry, false)
            .with_led("..", 25, Led::Range, true)
            .with_nud("..", Nud::Range, true)
            .with_led("if", 25, Led::Guard, true)
            .with_nud("if", Nud::If, true)
            .with_nud("else", Nud::Else, true)
            .with_led("or", 30, Led::InfixRight, true)
            .with_led("and", 40, Led::InfixRight, true);

        for comparison in ["==", "!=", "<", "<=", ">", ">="] {
            table = table.with_led(comparison, 45, Led::Infix, true);
        }

        table = table
            .with_led("in", 47, Led::Infix, true)
            .with_led("is", 47, Led::Infix, true)
            .with_led("not", 47, Led::NotIn, true)
            .with_nud("not", Nud::Prefix, true)
            .with_led("+", 50, Led::Infix, true)
            .with_nud("+", Nud::Plus, true)
            .with_led("-", 50, Led::Infix, true)
            .with_nud("-", Nud::Prefix, true)
            .with_led("*", 60, Led::Infix, true)
            .with_led("/", 60, Led::Infix, true)
            .with_led("%", 60, Led::Infix, true)
            .with_led("**", 70, Led::InfixRight, true)
            .with_led("(", 150, Led::Call, false)
            .with_nud("(", Nud::Group, false)
            .with_closer(")")
            .with_led("[", 150, Led::Index, false)
            .with_nud("[", Nud::Array, false)
            .with_closer("]")
            .with_nud("{", Nud::Brace, false)
            .with_closer("}")
            .with_led(".", 150, Led::Member, false);

        table
    }

    fn entry(&mut self, keyword: &'static str) -> &mut Keyword {
        self.keywords
            .entry(keyword)
            .or_insert_with(|| Keyword::new(keyword))
    }

    /// Builder: register a left denotation with its binding power
    pub fn with_led(mut self, keyword: &'static str, lbp: u8, led: Led, operator: bool) -> Self {
        let entry = self.entry(keyword);
        entry.lbp = lbp;
        entry.led = Some(led);
        entry.operator |= operator;
        self
    }

    /// Builder: register a null denotation
    pub fn with_nud(mut self, keyword: &'static str, nud: Nud, operator: bool) -> Self {
        let entry = self.entry(keyword);
        entry.nud = Some(nud);
        entry.operator |= operator;
        self
    }

    /// Builder: register a keyword that only terminates expressions
    pub fn with_closer(mut self, keyword: &'static str) -> Self {
        self.entry(keyword);
        self
    }

    pub fn get(&self, keyword: &str) -> Option<&Keyword> {
        self.keywords.get(keyword)
    }

    /// Whether a spelling is lexed as an Operator token
    pub fn is_operator(&self, spelling: &str) -> bool {
        self.get(spelling).map_or(false, |k| k.operator)
    }
}
