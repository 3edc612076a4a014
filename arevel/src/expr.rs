//! Typed expression tree lowered from the AST
//!
//! Lowering validates shapes the parser accepts but the language does not:
//! multi-item groupings outside calls, guards outside map keys, ranges
//! outside arrays and so on. Sequences of map entries are segmented into
//! sub-blocks by [`BlockBuilder`]: plain entries collect into maps and
//! `if` / `else if` / `else` entries collect into conditionals.

use crate::ast::{AstNode, Literal, NodeType, NodeValue, Span};
use arevel_core::{BinaryOp, CellId, SyntaxError, UnaryOp};

/// Where an expression came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub cell: CellId,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Object built from flat and signature entries
    Map(Vec<MapEntry>),
    /// Consecutive sub-blocks; evaluates to the last one
    Block(Vec<Expr>),
    /// `range` is the index of the single Range element, if any
    Array {
        elements: Vec<Expr>,
        range: Option<usize>,
    },
    Range {
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
        inclusive: bool,
    },
    /// `target[filter]`
    Filtering {
        target: Box<Expr>,
        filter: Box<Expr>,
    },
    Invoke {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Conditional(Vec<ConditionalClause>),
    Member {
        object: Box<Expr>,
        attr: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: MapKey,
    pub value: Expr,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapKey {
    /// `name: value`
    Name(String),
    /// Literal or computed key
    Value(Expr),
    /// Callable entry
    Signature(KeySignature),
}

/// `(a, b)`, `(a) if cond` or `name(a, b)` in key position
#[derive(Debug, Clone, PartialEq)]
pub struct KeySignature {
    pub name: Option<String>,
    pub params: Params,
    pub guard: Option<Guard>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub names: Vec<String>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub condition: Box<Expr>,
}

/// One arm of a conditional; `condition` is `None` for `else`
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalClause {
    pub condition: Option<Expr>,
    pub body: Expr,
}

impl Expr {
    fn new(kind: ExprKind, cell: CellId, span: Span) -> Self {
        Self {
            kind,
            origin: Origin { cell, span },
        }
    }

    /// Visit every identifier that refers to something outside this
    /// expression. Map key names and member names are not references;
    /// signature parameters shadow outer names within their entry.
    pub fn visit_references<F>(&self, bound: &[String], f: &mut F)
    where
        F: FnMut(&str, &Origin),
    {
        let mut scope = bound.to_vec();
        self.walk(&mut scope, f);
    }

    fn walk<F>(&self, scope: &mut Vec<String>, f: &mut F)
    where
        F: FnMut(&str, &Origin),
    {
        match &self.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Identifier(name) => {
                if !scope.iter().any(|bound| bound == name) {
                    f(name, &self.origin);
                }
            }
            ExprKind::Binary { left, right, .. } => {
                left.walk(scope, f);
                right.walk(scope, f);
            }
            ExprKind::Unary { operand, .. } => operand.walk(scope, f),
            ExprKind::Map(entries) => {
                for entry in entries {
                    match &entry.key {
                        MapKey::Name(_) => entry.value.walk(scope, f),
                        MapKey::Value(key) => {
                            key.walk(scope, f);
                            entry.value.walk(scope, f);
                        }
                        MapKey::Signature(signature) => {
                            let depth = scope.len();
                            scope.extend(signature.params.names.iter().cloned());
                            if let Some(guard) = &signature.guard {
                                guard.condition.walk(scope, f);
                            }
                            entry.value.walk(scope, f);
                            scope.truncate(depth);
                        }
                    }
                }
            }
            ExprKind::Block(blocks) => blocks.iter().for_each(|b| b.walk(scope, f)),
            ExprKind::Array { elements, .. } => elements.iter().for_each(|e| e.walk(scope, f)),
            ExprKind::Range { start, end, .. } => {
                if let Some(start) = start {
                    start.walk(scope, f);
                }
                if let Some(end) = end {
                    end.walk(scope, f);
                }
            }
            ExprKind::Filtering { target, filter } => {
                target.walk(scope, f);
                filter.walk(scope, f);
            }
            ExprKind::Invoke { callee, args } => {
                callee.walk(scope, f);
                args.iter().for_each(|a| a.walk(scope, f));
            }
            ExprKind::Conditional(clauses) => {
                for clause in clauses {
                    if let Some(condition) = &clause.condition {
                        condition.walk(scope, f);
                    }
                    clause.body.walk(scope, f);
                }
            }
            ExprKind::Member { object, .. } => object.walk(scope, f),
        }
    }
}

/// Lower a cell's tree into an expression
pub fn lower(cell: CellId, node: &AstNode) -> Result<Expr, SyntaxError> {
    Lowering { cell }.expr(node)
}

struct Lowering {
    cell: CellId,
}

/// One lowered map-list item, before grouping into sub-blocks
enum Entry {
    Plain(MapEntry),
    If(ConditionalClause, Span),
    ElseIf(ConditionalClause, Span),
    Else(ConditionalClause, Span),
}

enum OpenBlock {
    Map { entries: Vec<MapEntry>, span: Span },
    Conditional { clauses: Vec<ConditionalClause>, span: Span, closed: bool },
}

impl OpenBlock {
    fn start(entry: Entry) -> Result<Self, SyntaxError> {
        match entry {
            Entry::Plain(entry) => Ok(OpenBlock::Map {
                span: entry.origin.span,
                entries: vec![entry],
            }),
            Entry::If(clause, span) => Ok(OpenBlock::Conditional {
                clauses: vec![clause],
                span,
                closed: false,
            }),
            Entry::ElseIf(_, span) | Entry::Else(_, span) => Err(SyntaxError::invalid_expression(
                "else without a preceding if",
                span.start,
            )),
        }
    }

    /// Offer the next entry; a rejected entry is handed back
    fn append(&mut self, entry: Entry) -> Result<(), Entry> {
        match (self, entry) {
            (OpenBlock::Map { entries, span }, Entry::Plain(entry)) => {
                *span = span.to(entry.origin.span);
                entries.push(entry);
                Ok(())
            }
            (OpenBlock::Conditional { clauses, span, closed }, Entry::ElseIf(clause, at))
                if !*closed =>
            {
                *span = span.to(at);
                clauses.push(clause);
                Ok(())
            }
            (OpenBlock::Conditional { clauses, span, closed }, Entry::Else(clause, at))
                if !*closed =>
            {
                *span = span.to(at);
                clauses.push(clause);
                *closed = true;
                Ok(())
            }
            (_, entry) => Err(entry),
        }
    }

    fn close(self, cell: CellId) -> Expr {
        match self {
            OpenBlock::Map { entries, span } => Expr::new(ExprKind::Map(entries), cell, span),
            OpenBlock::Conditional { clauses, span, .. } => {
                Expr::new(ExprKind::Conditional(clauses), cell, span)
            }
        }
    }
}

/// Accumulates closed sub-blocks from a sequence of entries
struct BlockBuilder {
    cell: CellId,
    span: Span,
    closed: Vec<Expr>,
    open: Option<OpenBlock>,
}

impl BlockBuilder {
    fn new(cell: CellId, span: Span) -> Self {
        Self {
            cell,
            span,
            closed: Vec::new(),
            open: None,
        }
    }

    fn push(&mut self, entry: Entry) -> Result<(), SyntaxError> {
        let rejected = match self.open.as_mut() {
            Some(open) => match open.append(entry) {
                Ok(()) => return Ok(()),
                Err(rejected) => rejected,
            },
            None => entry,
        };
        if let Some(open) = self.open.take() {
            self.closed.push(open.close(self.cell));
        }
        self.open = Some(OpenBlock::start(rejected)?);
        Ok(())
    }

    fn finish(mut self) -> Expr {
        if let Some(open) = self.open.take() {
            self.closed.push(open.close(self.cell));
        }
        match self.closed.len() {
            0 => Expr::new(ExprKind::Map(Vec::new()), self.cell, self.span),
            1 => self.closed.remove(0),
            _ => Expr::new(ExprKind::Block(self.closed), self.cell, self.span),
        }
    }
}

impl Lowering {
    fn make(&self, kind: ExprKind, span: Span) -> Expr {
        Expr::new(kind, self.cell, span)
    }

    fn invalid(node: &AstNode, details: &str) -> SyntaxError {
        SyntaxError::invalid_expression(format!("{} ({})", details, node), node.span.start)
    }

    fn child<'n>(node: &'n AstNode, side: Option<&'n AstNode>) -> Result<&'n AstNode, SyntaxError> {
        side.ok_or_else(|| Self::invalid(node, "incomplete expression"))
    }

    fn boxed(&self, node: &AstNode) -> Result<Box<Expr>, SyntaxError> {
        Ok(Box::new(self.expr(node)?))
    }

    fn expr(&self, node: &AstNode) -> Result<Expr, SyntaxError> {
        let span = node.span;
        match node.node_type {
            NodeType::Literal => match &node.value {
                NodeValue::Literal(lit) => {
                    Ok(self.make(ExprKind::Literal(lit.clone()), span))
                }
                _ => Err(Self::invalid(node, "literal without value")),
            },
            NodeType::Identifier => {
                let name = node.name().ok_or_else(|| Self::invalid(node, "identifier without name"))?;
                Ok(self.make(ExprKind::Identifier(name.to_string()), span))
            }
            NodeType::Binary => {
                let op = BinaryOp::from_symbol(&node.operator)
                    .ok_or_else(|| Self::invalid(node, "unknown binary operator"))?;
                let left = self.boxed(Self::child(node, node.left.as_deref())?)?;
                let right = self.boxed(Self::child(node, node.right.as_deref())?)?;
                Ok(self.make(ExprKind::Binary { op, left, right }, span))
            }
            NodeType::Unary => {
                let op = UnaryOp::from_symbol(&node.operator)
                    .ok_or_else(|| Self::invalid(node, "unknown unary operator"))?;
                let operand = self.boxed(Self::child(node, node.right.as_deref())?)?;
                Ok(self.make(ExprKind::Unary { op, operand }, span))
            }
            NodeType::Grouping => match node.items() {
                [single] => self.expr(single),
                [] => Err(Self::invalid(node, "empty parentheses outside a call or key")),
                _ => Err(Self::invalid(node, "multiple values in parentheses")),
            },
            NodeType::Array => self.array(node),
            NodeType::Apply => {
                let callee = self.boxed(Self::child(node, node.left.as_deref())?)?;
                let args = node
                    .items()
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.make(ExprKind::Invoke { callee, args }, span))
            }
            NodeType::Where => {
                let target = self.boxed(Self::child(node, node.left.as_deref())?)?;
                let filter = match node.items() {
                    [filter] => self.boxed(filter)?,
                    _ => return Err(Self::invalid(node, "index needs exactly one value")),
                };
                Ok(self.make(ExprKind::Filtering { target, filter }, span))
            }
            NodeType::Member => {
                let object = self.boxed(Self::child(node, node.left.as_deref())?)?;
                let attr = Self::child(node, node.right.as_deref())?
                    .name()
                    .ok_or_else(|| Self::invalid(node, "member name must be an identifier"))?;
                Ok(self.make(
                    ExprKind::Member {
                        object,
                        attr: attr.to_string(),
                    },
                    span,
                ))
            }
            NodeType::Map => self.block(node, std::slice::from_ref(node)),
            NodeType::MapList => self.block(node, node.items()),
            NodeType::Guard => Err(Self::invalid(node, "guard outside a map key")),
            NodeType::If | NodeType::ElseIf | NodeType::Else => {
                Err(Self::invalid(node, "conditional without a body"))
            }
            NodeType::Range => Err(Self::invalid(node, "range outside an array")),
        }
    }

    fn array(&self, node: &AstNode) -> Result<Expr, SyntaxError> {
        let mut elements = Vec::with_capacity(node.items().len());
        let mut range = None;
        for item in node.items() {
            if item.is(NodeType::Range) {
                if range.is_some() {
                    return Err(Self::invalid(item, "more than one range in an array"));
                }
                range = Some(elements.len());
                elements.push(self.range(item)?);
            } else {
                elements.push(self.expr(item)?);
            }
        }
        Ok(self.make(ExprKind::Array { elements, range }, node.span))
    }

    fn range(&self, node: &AstNode) -> Result<Expr, SyntaxError> {
        let start = node.left.as_deref().map(|n| self.boxed(n)).transpose()?;
        let end = node.right.as_deref().map(|n| self.boxed(n)).transpose()?;
        Ok(self.make(
            ExprKind::Range {
                start,
                end,
                inclusive: true,
            },
            node.span,
        ))
    }

    fn block(&self, node: &AstNode, items: &[AstNode]) -> Result<Expr, SyntaxError> {
        let mut builder = BlockBuilder::new(self.cell, node.span);
        for item in items {
            builder.push(self.entry(item)?)?;
        }
        Ok(builder.finish())
    }

    fn entry(&self, node: &AstNode) -> Result<Entry, SyntaxError> {
        let (key, value) = match node.items() {
            [key, value] if node.is(NodeType::Map) => (key, value),
            _ => return Err(Self::invalid(node, "expected a key: value entry")),
        };
        let body = self.expr(value)?;
        let origin = Origin {
            cell: self.cell,
            span: node.span,
        };

        let key = match key.node_type {
            NodeType::If | NodeType::ElseIf => {
                let condition = self.expr(Self::child(key, key.left.as_deref())?)?;
                let clause = ConditionalClause {
                    condition: Some(condition),
                    body,
                };
                return Ok(if key.is(NodeType::If) {
                    Entry::If(clause, node.span)
                } else {
                    Entry::ElseIf(clause, node.span)
                });
            }
            NodeType::Else => {
                return Ok(Entry::Else(
                    ConditionalClause {
                        condition: None,
                        body,
                    },
                    node.span,
                ))
            }
            NodeType::Identifier => MapKey::Name(key.name().unwrap_or_default().to_string()),
            NodeType::Grouping => MapKey::Signature(KeySignature {
                name: None,
                params: self.params(key, key.items())?,
                guard: None,
            }),
            NodeType::Guard => {
                let group = Self::child(key, key.left.as_deref())?;
                let condition = self.boxed(Self::child(key, key.right.as_deref())?)?;
                MapKey::Signature(KeySignature {
                    name: None,
                    params: self.params(group, group.items())?,
                    guard: Some(Guard { condition }),
                })
            }
            NodeType::Apply => {
                let callee = Self::child(key, key.left.as_deref())?;
                let name = callee
                    .name()
                    .ok_or_else(|| Self::invalid(key, "signature name must be an identifier"))?;
                MapKey::Signature(KeySignature {
                    name: Some(name.to_string()),
                    params: self.params(key, key.items())?,
                    guard: None,
                })
            }
            NodeType::Array => match key.items() {
                [computed] if !computed.is(NodeType::Range) => MapKey::Value(self.expr(computed)?),
                _ => return Err(Self::invalid(key, "computed key needs exactly one value")),
            },
            _ => MapKey::Value(self.expr(key)?),
        };

        Ok(Entry::Plain(MapEntry {
            key,
            value: body,
            origin,
        }))
    }

    fn params(&self, node: &AstNode, items: &[AstNode]) -> Result<Params, SyntaxError> {
        let names = items
            .iter()
            .map(|item| match (item.node_type, item.name()) {
                (NodeType::Identifier, Some(name)) => Ok(name.to_string()),
                _ => Err(Self::invalid(item, "parameter must be an identifier")),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Params {
            names,
            origin: Origin {
                cell: self.cell,
                span: node.span,
            },
        })
    }
}
