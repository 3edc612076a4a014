//! In-memory backend executed by the machine

use super::Backend;
use crate::ast::Literal;
use crate::environment::Cell;
use arevel_core::{ArevelError, CellId, Value};
use arevel_runtime::Builtin;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Code {
    Var(usize),
    Param(String),
    Cell(CellId),
    Literal(Value),
    Array(Vec<Code>),
    Call(Builtin, Vec<Code>),
    Member(Box<Code>, String),
    Lambda(Arc<Lambda>),
}

/// `var = value`
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub var: usize,
    pub value: Code,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub result: Code,
    /// Variables of enclosing scopes read by the body
    pub captures: BTreeSet<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellCode {
    pub id: CellId,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    /// `None` when the cell cannot run
    pub result: Option<Code>,
    pub error: Option<ArevelError>,
    /// Cells read anywhere in this cell
    pub reads: BTreeSet<CellId>,
}

impl CellCode {
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{}", self.id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub cells: Vec<CellCode>,
}

impl Code {
    /// Variables read by this code, including through nested lambdas
    fn collect_vars(&self, out: &mut BTreeSet<usize>) {
        match self {
            Code::Var(v) => {
                out.insert(*v);
            }
            Code::Param(_) | Code::Cell(_) | Code::Literal(_) => {}
            Code::Array(items) | Code::Call(_, items) => {
                items.iter().for_each(|item| item.collect_vars(out));
            }
            Code::Member(object, _) => object.collect_vars(out),
            Code::Lambda(lambda) => out.extend(lambda.captures.iter().copied()),
        }
    }
}

#[derive(Debug, Default)]
pub struct TreeBackend {
    cells: Vec<CellCode>,
    frames: Vec<Vec<Stmt>>,
    reads: BTreeSet<CellId>,
    next_var: usize,
}

impl TreeBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for TreeBackend {
    type Code = Code;
    type Output = Program;

    fn declare(&mut self, value: Code) -> Code {
        let var = self.next_var;
        self.next_var += 1;
        if let Some(frame) = self.frames.last_mut() {
            frame.push(Stmt { var, value });
        }
        Code::Var(var)
    }

    fn parameter(&mut self, name: &str) -> Code {
        Code::Param(name.to_string())
    }

    fn literal(&mut self, literal: &Literal) -> Code {
        Code::Literal(literal.to_value())
    }

    fn array(&mut self, items: Vec<Code>) -> Code {
        Code::Array(items)
    }

    fn call(&mut self, builtin: Builtin, args: Vec<Code>) -> Code {
        Code::Call(builtin, args)
    }

    fn member(&mut self, object: Code, attr: &str) -> Code {
        Code::Member(Box::new(object), attr.to_string())
    }

    fn cell(&mut self, id: CellId) -> Code {
        self.reads.insert(id);
        Code::Cell(id)
    }

    fn begin_lambda(&mut self) {
        self.frames.push(Vec::new());
    }

    fn end_lambda(&mut self, params: &[String], result: Code) -> Code {
        let body = self.frames.pop().unwrap_or_default();
        let mut used = BTreeSet::new();
        for stmt in &body {
            stmt.value.collect_vars(&mut used);
        }
        result.collect_vars(&mut used);
        for stmt in &body {
            used.remove(&stmt.var);
        }
        Code::Lambda(Arc::new(Lambda {
            params: params.to_vec(),
            body,
            result,
            captures: used,
        }))
    }

    fn begin_cell(&mut self, _cell: &Cell) {
        self.frames.clear();
        self.frames.push(Vec::new());
        self.reads.clear();
    }

    fn end_cell(&mut self, cell: &Cell, result: Code) {
        let body = self.frames.pop().unwrap_or_default();
        self.cells.push(CellCode {
            id: cell.id,
            name: cell.name.clone(),
            body,
            result: Some(result),
            error: None,
            reads: std::mem::take(&mut self.reads),
        });
    }

    fn cell_error(&mut self, cell: &Cell, error: &ArevelError) {
        self.cells.push(CellCode {
            id: cell.id,
            name: cell.name.clone(),
            body: Vec::new(),
            result: None,
            error: Some(error.clone()),
            reads: BTreeSet::new(),
        });
    }

    fn finish(self) -> Program {
        Program { cells: self.cells }
    }
}

// ========== Printing ==========

fn write_body(f: &mut fmt::Formatter<'_>, body: &[Stmt], depth: usize) -> fmt::Result {
    for stmt in body {
        write!(f, "{:indent$}v{} = ", "", stmt.var, indent = depth * 2)?;
        write_code(f, &stmt.value, depth)?;
        writeln!(f)?;
    }
    Ok(())
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Code], depth: usize) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_code(f, item, depth)?;
    }
    Ok(())
}

fn write_code(f: &mut fmt::Formatter<'_>, code: &Code, depth: usize) -> fmt::Result {
    match code {
        Code::Var(v) => write!(f, "v{}", v),
        Code::Param(name) => write!(f, "${}", name),
        Code::Cell(id) => write!(f, "@{}", id),
        Code::Literal(Value::Text(s)) => write!(f, "{:?}", s),
        Code::Literal(value) => write!(f, "{}", value),
        Code::Array(items) => {
            f.write_str("[")?;
            write_list(f, items, depth)?;
            f.write_str("]")
        }
        Code::Call(builtin, args) => {
            write!(f, "{}(", builtin.name())?;
            write_list(f, args, depth)?;
            f.write_str(")")
        }
        Code::Member(object, attr) => {
            write_code(f, object, depth)?;
            write!(f, ".{}", attr)
        }
        Code::Lambda(lambda) => {
            let params: Vec<String> = lambda.params.iter().map(|p| format!("${}", p)).collect();
            writeln!(f, "fn({}) {{", params.join(", "))?;
            write_body(f, &lambda.body, depth + 1)?;
            write!(f, "{:indent$}return ", "", indent = (depth + 1) * 2)?;
            write_code(f, &lambda.result, depth + 1)?;
            write!(f, "\n{:indent$}}}", "", indent = depth * 2)
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cell in &self.cells {
            match (&cell.result, &cell.error) {
                (_, Some(err)) => writeln!(f, "cell @{} {}: error {}", cell.id, cell.label(), err)?,
                (Some(result), None) => {
                    writeln!(f, "cell @{} {}:", cell.id, cell.label())?;
                    write_body(f, &cell.body, 1)?;
                    f.write_str("  => ")?;
                    write_code(f, result, 1)?;
                    writeln!(f)?;
                }
                (None, None) => writeln!(f, "cell @{} {}: empty", cell.id, cell.label())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::generate;
    use super::*;
    use crate::environment::{CellSource, Environment};
    use crate::operators::OperatorTable;
    use arevel_core::{BinaryOp, Number};
    use pretty_assertions::assert_eq;

    fn program(sources: Vec<CellSource>) -> Program {
        let env = Environment::build(&sources, &OperatorTable::standard());
        generate(&env, TreeBackend::new())
    }

    #[test]
    fn test_binary_statement() {
        let p = program(vec![CellSource::new(1, "a", "2 * 21")]);
        let cell = &p.cells[0];
        assert_eq!(
            cell.body,
            vec![Stmt {
                var: 0,
                value: Code::Call(
                    Builtin::Binary(BinaryOp::Mul),
                    vec![
                        Code::Literal(Value::Number(Number::from_i64(2))),
                        Code::Literal(Value::Number(Number::from_i64(21))),
                    ],
                ),
            }]
        );
        assert_eq!(cell.result, Some(Code::Var(0)));
    }

    #[test]
    fn test_reads_track_cell_references() {
        let p = program(vec![
            CellSource::new(1, "x", "1"),
            CellSource::new(2, "y", "x + x"),
        ]);
        assert_eq!(p.cells[1].reads, BTreeSet::from([1]));
        assert!(p.cells[0].reads.is_empty());
    }

    #[test]
    fn test_lambda_captures_outer_variables() {
        let p = program(vec![CellSource::new(1, "f", "k: 1 + 1, (x): [x, 3][0]")]);
        let lambda = p.cells[0]
            .body
            .iter()
            .find_map(|stmt| match &stmt.value {
                Code::Lambda(lambda) => Some(lambda.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(lambda.params, vec!["x"]);
        assert!(lambda.captures.is_empty());
        assert_eq!(lambda.body.len(), 2);
    }

    #[test]
    fn test_printing() {
        let p = program(vec![
            CellSource::new(1, "a", "1 + 2"),
            CellSource::new(2, "bad", "1 +"),
        ]);
        let text = p.to_string();
        assert!(text.contains("cell @1 a:\n  v0 = __add__(1, 2)\n  => v0\n"));
        assert!(text.contains("cell @2 bad: error [UNEXPECTED_END]"));
    }
}
