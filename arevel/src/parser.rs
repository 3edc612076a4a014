//! Pratt parser
//!
//! Each token maps to one keyword descriptor in the [`OperatorTable`].
//! `expression(rbp)` applies the null denotation of the first token, then
//! keeps applying left denotations while the next token binds tighter than
//! `rbp`.

use crate::ast::{AstNode, NodeType, NodeValue, Span};
use crate::lexer::{Token, TokenKind};
use crate::operators::{pseudo, Keyword, Led, Nud, OperatorTable, PREFIX_BP};
use arevel_core::SyntaxError;

/// Binding power of items in comma separated lists
const ITEM_BP: u8 = 10;
/// Condition of an `if` header stops before `:`
const CONDITION_BP: u8 = 20;
/// Value of a map entry, so `:` nests to the right
const MAP_VALUE_BP: u8 = 19;

/// Parse a full token sequence into one tree
pub fn parse(tokens: Vec<Token>, table: &OperatorTable) -> Result<AstNode, SyntaxError> {
    let mut parser = Parser::new(tokens, table);
    let node = parser.expression(0)?;
    match parser.peek() {
        None => Ok(node),
        Some(token) => Err(SyntaxError::unexpected_token(&token.to_string(), token.span.start)),
    }
}

pub struct Parser<'a> {
    table: &'a OperatorTable,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, table: &'a OperatorTable) -> Self {
        Self { table, tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Index just past the last token, used for errors at end of input
    fn end_index(&self) -> usize {
        self.tokens.last().map_or(0, |t| t.span.end)
    }

    fn keyword_of(token: Option<&Token>) -> &str {
        match token {
            None => pseudo::END,
            Some(token) => match token.kind {
                TokenKind::Literal => pseudo::LITERAL,
                TokenKind::Identifier => pseudo::IDENTIFIER,
                TokenKind::WhitespaceSeparator => pseudo::NEWLINE,
                TokenKind::WhitespaceStart => pseudo::INDENT,
                TokenKind::WhitespaceEnd => pseudo::DEDENT,
                TokenKind::Operator | TokenKind::Delimiter => &token.lexeme,
            },
        }
    }

    fn descriptor(&self, token: Option<&Token>) -> Option<&'a Keyword> {
        self.table.get(Self::keyword_of(token))
    }

    fn next_is(&self, keyword: &str) -> bool {
        Self::keyword_of(self.peek()) == keyword
    }

    fn next_lbp(&self) -> u8 {
        self.descriptor(self.peek()).map_or(0, |k| k.lbp)
    }

    fn unexpected(&self, token: Option<&Token>) -> SyntaxError {
        match token {
            Some(token) => SyntaxError::unexpected_token(&token.to_string(), token.span.start),
            None => SyntaxError::unexpected_end(self.end_index()),
        }
    }

    /// Consume the expected keyword or fail
    fn expect(&mut self, keyword: &str) -> Result<Token, SyntaxError> {
        if self.next_is(keyword) {
            if let Some(token) = self.advance() {
                return Ok(token);
            }
        }
        match self.peek() {
            Some(token) => Err(SyntaxError::expected_token(
                keyword,
                &token.to_string(),
                token.span.start,
            )),
            None => Err(SyntaxError::expected_token(keyword, "end of input", self.end_index())),
        }
    }

    pub fn expression(&mut self, rbp: u8) -> Result<AstNode, SyntaxError> {
        let token = self.advance();
        let nud = self
            .descriptor(token.as_ref())
            .and_then(|k| k.nud)
            .ok_or_else(|| self.unexpected(token.as_ref()))?;
        let mut left = match token {
            Some(token) => self.nud(nud, token)?,
            None => return Err(SyntaxError::unexpected_end(self.end_index())),
        };

        while rbp < self.next_lbp() {
            let Some(token) = self.advance() else { break };
            let keyword = self.descriptor(Some(&token));
            let (lbp, led) = match keyword.and_then(|k| k.led.map(|led| (k.lbp, led))) {
                Some(found) => found,
                None => return Err(self.unexpected(Some(&token))),
            };
            left = self.led(led, lbp, token, left)?;
        }
        Ok(left)
    }

    fn nud(&mut self, nud: Nud, token: Token) -> Result<AstNode, SyntaxError> {
        let span = token.span;
        match nud {
            Nud::Literal => {
                let literal = token.literal.ok_or_else(|| {
                    SyntaxError::invalid_expression("literal token without value", span.start)
                })?;
                Ok(AstNode::new(pseudo::LITERAL, NodeType::Literal, span)
                    .with_value(NodeValue::Literal(literal)))
            }
            Nud::Identifier => Ok(AstNode::new(pseudo::IDENTIFIER, NodeType::Identifier, span)
                .with_value(NodeValue::Name(token.lexeme))),
            Nud::Prefix => {
                let operand = self.expression(PREFIX_BP)?;
                Ok(AstNode::new(token.lexeme, NodeType::Unary, span).with_right(operand))
            }
            Nud::Plus => self.expression(PREFIX_BP),
            Nud::Group => {
                let (items, close) = self.items(")")?;
                Ok(AstNode::new("(", NodeType::Grouping, span.to(close))
                    .with_value(NodeValue::List(items)))
            }
            Nud::Array => {
                let (items, close) = self.items("]")?;
                Ok(AstNode::new("[", NodeType::Array, span.to(close))
                    .with_value(NodeValue::List(items)))
            }
            Nud::Brace => {
                if self.next_is("}") {
                    let close = self.expect("}")?;
                    return Ok(AstNode::new("{", NodeType::MapList, span.to(close.span))
                        .with_value(NodeValue::List(Vec::new())));
                }
                let inner = self.expression(0)?;
                self.expect("}")?;
                Ok(inner)
            }
            Nud::Block => {
                let inner = self.expression(0)?;
                self.expect(pseudo::DEDENT)?;
                Ok(inner)
            }
            Nud::If => {
                let condition = self.expression(CONDITION_BP)?;
                Ok(AstNode::new("if", NodeType::If, span).with_left(condition))
            }
            Nud::Else => {
                if self.next_is("if") {
                    self.advance();
                    let condition = self.expression(CONDITION_BP)?;
                    return Ok(AstNode::new("else if", NodeType::ElseIf, span).with_left(condition));
                }
                Ok(AstNode::new("else", NodeType::Else, span))
            }
            Nud::Range => {
                let node = AstNode::new("..", NodeType::Range, span);
                if self.range_ends_here() {
                    return Ok(node);
                }
                let lbp = self.table.get("..").map_or(0, |k| k.lbp);
                Ok(node.with_right(self.expression(lbp)?))
            }
        }
    }

    fn led(&mut self, led: Led, lbp: u8, token: Token, left: AstNode) -> Result<AstNode, SyntaxError> {
        let span = token.span;
        match led {
            Led::Infix => {
                let right = self.expression(lbp)?;
                Ok(AstNode::new(token.lexeme, NodeType::Binary, span)
                    .with_left(left)
                    .with_right(right))
            }
            Led::InfixRight => {
                let right = self.expression(lbp.saturating_sub(1))?;
                Ok(AstNode::new(token.lexeme, NodeType::Binary, span)
                    .with_left(left)
                    .with_right(right))
            }
            Led::NotIn => {
                self.expect("in")?;
                let right = self.expression(lbp)?;
                Ok(AstNode::new("not in", NodeType::Binary, span)
                    .with_left(left)
                    .with_right(right))
            }
            Led::Call => {
                let (args, close) = self.items(")")?;
                Ok(AstNode::new("(", NodeType::Apply, span.to(close))
                    .with_left(left)
                    .with_value(NodeValue::List(args)))
            }
            Led::Index => {
                let filter = self.expression(ITEM_BP)?;
                let close = self.expect("]")?;
                Ok(AstNode::new("[", NodeType::Where, span.to(close.span))
                    .with_left(left)
                    .with_value(NodeValue::List(vec![filter])))
            }
            Led::Member => {
                let attr = self.advance();
                match attr {
                    Some(attr) if attr.kind == TokenKind::Identifier => {
                        let name = AstNode::new(pseudo::IDENTIFIER, NodeType::Identifier, attr.span)
                            .with_value(NodeValue::Name(attr.lexeme));
                        Ok(AstNode::new(".", NodeType::Member, span)
                            .with_left(left)
                            .with_right(name))
                    }
                    other => Err(self.unexpected(other.as_ref())),
                }
            }
            Led::MapEntry => {
                let value = self.expression(MAP_VALUE_BP)?;
                let span = span.to(left.span).to(value.span);
                Ok(AstNode::new(":", NodeType::Map, span).with_value(NodeValue::List(vec![left, value])))
            }
            Led::Continuation => {
                let right = self.expression(lbp)?;
                let joined = span.to(left.span).to(right.span);
                match (left.node_type, right.node_type) {
                    (NodeType::Map, NodeType::Map) => Ok(AstNode::new(",", NodeType::MapList, joined)
                        .with_value(NodeValue::List(vec![left, right]))),
                    (NodeType::MapList, NodeType::Map) => {
                        let mut list = left;
                        list.span = joined;
                        if let NodeValue::List(items) = &mut list.value {
                            items.push(right);
                        }
                        Ok(list)
                    }
                    _ => Err(SyntaxError::unexpected_token(&token.to_string(), span.start)),
                }
            }
            Led::Guard => {
                if !left.is(NodeType::Grouping) {
                    return Err(SyntaxError::invalid_expression(
                        "guard must follow a parameter list",
                        span.start,
                    ));
                }
                let condition = self.expression(lbp)?;
                Ok(AstNode::new("if", NodeType::Guard, span)
                    .with_left(left)
                    .with_right(condition))
            }
            Led::Range => {
                let node = AstNode::new("..", NodeType::Range, span).with_left(left);
                if self.range_ends_here() {
                    return Ok(node);
                }
                Ok(node.with_right(self.expression(lbp)?))
            }
        }
    }

    /// An open range `start..` is allowed before a list closer or separator
    fn range_ends_here(&self) -> bool {
        match self.peek() {
            None => true,
            Some(_) => ["]", ",", ")", pseudo::NEWLINE, pseudo::DEDENT]
                .iter()
                .any(|closer| self.next_is(closer)),
        }
    }

    /// Comma separated items up to `close`; returns the items and the
    /// closing token's span
    fn items(&mut self, close: &str) -> Result<(Vec<AstNode>, Span), SyntaxError> {
        let mut items = Vec::new();
        if self.next_is(close) {
            let token = self.expect(close)?;
            return Ok((items, token.span));
        }
        loop {
            items.push(self.expression(ITEM_BP)?);
            if self.next_is(",") {
                self.advance();
                continue;
            }
            let token = self.expect(close)?;
            return Ok((items, token.span));
        }
    }
}
