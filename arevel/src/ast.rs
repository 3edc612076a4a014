//! Syntax tree produced by the parser

use arevel_core::{Number, Value};
use serde::Serialize;
use std::fmt;

/// Half-open range of character indices into a cell's source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Literal value carried by a Literal token
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Literal {
    None,
    Boolean(bool),
    Number(Number),
    Text(String),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::None => Value::None,
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Number(n) => Value::Number(n.clone()),
            Literal::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::None => f.write_str("none"),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Text(s) => write!(f, "{:?}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Literal,
    Identifier,
    Binary,
    Unary,
    /// Parenthesised, comma separated items
    Grouping,
    Array,
    /// Call: `left(value...)`
    Apply,
    /// Index or filter: `left[value]`
    Where,
    /// Member access: `left.right`
    Member,
    /// Single `key: value` entry, value holds both
    Map,
    /// Sequence of entries joined by separators
    MapList,
    /// `(params) if condition`
    Guard,
    /// `if condition` header
    If,
    /// `else if condition` header
    ElseIf,
    /// `else` header
    Else,
    Range,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeValue {
    Empty,
    Literal(Literal),
    Name(String),
    List(Vec<AstNode>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AstNode {
    /// Keyword that produced this node
    pub operator: String,
    pub node_type: NodeType,
    pub value: NodeValue,
    pub span: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<Box<AstNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Box<AstNode>>,
}

impl AstNode {
    pub fn new(operator: impl Into<String>, node_type: NodeType, span: Span) -> Self {
        Self {
            operator: operator.into(),
            node_type,
            value: NodeValue::Empty,
            span,
            left: None,
            right: None,
        }
    }

    pub fn with_value(mut self, value: NodeValue) -> Self {
        self.value = value;
        self
    }

    pub fn with_left(mut self, left: AstNode) -> Self {
        self.span = self.span.to(left.span);
        self.left = Some(Box::new(left));
        self
    }

    pub fn with_right(mut self, right: AstNode) -> Self {
        self.span = self.span.to(right.span);
        self.right = Some(Box::new(right));
        self
    }

    /// Child list for grouping, array, apply, map and maplist nodes
    pub fn items(&self) -> &[AstNode] {
        match &self.value {
            NodeValue::List(items) => items,
            _ => &[],
        }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.value {
            NodeValue::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn is(&self, node_type: NodeType) -> bool {
        self.node_type == node_type
    }

    /// Source text covered by this node
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        let mut indices = source.char_indices().map(|(i, _)| i).chain([source.len()]);
        let start = indices.clone().nth(self.span.start).unwrap_or(source.len());
        let end = indices.nth(self.span.end).unwrap_or(source.len());
        &source[start..end.max(start)]
    }
}

/// S-expression rendering, used to inspect precedence
impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, head: &str, items: &[AstNode]) -> fmt::Result {
            write!(f, "({}", head)?;
            for item in items {
                write!(f, " {}", item)?;
            }
            f.write_str(")")
        }

        match (&self.node_type, &self.value) {
            (NodeType::Literal, NodeValue::Literal(lit)) => write!(f, "{}", lit),
            (NodeType::Identifier, NodeValue::Name(name)) => f.write_str(name),
            (NodeType::Grouping, _) => list(f, "group", self.items()),
            (NodeType::Array, _) => list(f, "array", self.items()),
            (NodeType::Map, _) => list(f, ":", self.items()),
            (NodeType::MapList, _) => list(f, "maplist", self.items()),
            (NodeType::Apply, _) => {
                write!(f, "(call")?;
                if let Some(left) = &self.left {
                    write!(f, " {}", left)?;
                }
                for item in self.items() {
                    write!(f, " {}", item)?;
                }
                f.write_str(")")
            }
            (NodeType::Where, _) => {
                write!(f, "(where")?;
                if let Some(left) = &self.left {
                    write!(f, " {}", left)?;
                }
                for item in self.items() {
                    write!(f, " {}", item)?;
                }
                f.write_str(")")
            }
            _ => {
                write!(f, "({}", self.operator)?;
                if let Some(left) = &self.left {
                    write!(f, " {}", left)?;
                }
                if let Some(right) = &self.right {
                    write!(f, " {}", right)?;
                }
                f.write_str(")")
            }
        }
    }
}
