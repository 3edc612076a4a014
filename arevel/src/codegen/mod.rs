//! Code generation
//!
//! The emitter walks each cell's expression in evaluation order and
//! drives a [`Backend`]. All operators and structural forms become calls
//! to runtime builtins, so backends only need to know how to spell values,
//! variables, calls and lambdas.

mod js;
mod tree;

pub use js::JsBackend;
pub use tree::{CellCode, Code, Lambda, Program, Stmt, TreeBackend};

use crate::ast::Literal;
use crate::environment::{Cell, Environment};
use crate::expr::{ConditionalClause, Expr, ExprKind, KeySignature, MapEntry, MapKey};
use arevel_core::{ArevelError, CellId};
use arevel_runtime::Builtin;
use tracing::debug;

/// Target of code generation
pub trait Backend {
    type Code;
    type Output;

    /// Bind a value to a fresh variable and return a reference to it
    fn declare(&mut self, value: Self::Code) -> Self::Code;

    /// Reference to a bound parameter
    fn parameter(&mut self, name: &str) -> Self::Code;

    fn literal(&mut self, literal: &Literal) -> Self::Code;

    fn array(&mut self, items: Vec<Self::Code>) -> Self::Code;

    fn call(&mut self, builtin: Builtin, args: Vec<Self::Code>) -> Self::Code;

    fn member(&mut self, object: Self::Code, attr: &str) -> Self::Code;

    /// Result of another cell
    fn cell(&mut self, id: CellId) -> Self::Code;

    /// Open a statement scope for a lambda body
    fn begin_lambda(&mut self);

    /// Close the innermost lambda scope
    fn end_lambda(&mut self, params: &[String], result: Self::Code) -> Self::Code;

    fn begin_cell(&mut self, cell: &Cell);

    fn end_cell(&mut self, cell: &Cell, result: Self::Code);

    /// Cell that cannot run at all
    fn cell_error(&mut self, cell: &Cell, error: &ArevelError);

    fn finish(self) -> Self::Output;
}

/// Generate code for every cell of an environment
pub fn generate<B: Backend>(env: &Environment, backend: B) -> B::Output {
    let mut emitter = Emitter {
        env,
        backend,
        scope: Vec::new(),
        current: None,
    };

    for id in env.eval_order() {
        if let Some(cell) = env.cell(*id) {
            emitter.emit_cell(cell);
        }
    }
    for id in env.cyclic_cells() {
        if let (Some(cell), Some(err)) = (env.cell(*id), env.cycle_error(*id)) {
            emitter.backend.cell_error(cell, &ArevelError::from(err.clone()));
        }
    }
    emitter.backend.finish()
}

struct Emitter<'e, B: Backend> {
    env: &'e Environment,
    backend: B,
    /// Parameters bound at the current point
    scope: Vec<String>,
    current: Option<&'e Cell>,
}

impl<'e, B: Backend> Emitter<'e, B> {
    fn emit_cell(&mut self, cell: &'e Cell) {
        if let Some(err) = &cell.error {
            self.backend.cell_error(cell, &ArevelError::from(err.clone()));
            return;
        }

        debug!(cell = cell.id, "emitting cell");
        self.current = Some(cell);
        self.scope = cell.params.clone();
        self.backend.begin_cell(cell);

        let result = if cell.is_container() {
            self.container(cell)
        } else {
            match &cell.expr {
                None => self.backend.literal(&Literal::None),
                Some(expr) if cell.params.is_empty() => self.expr(expr),
                Some(expr) => {
                    self.backend.begin_lambda();
                    let body = self.expr(expr);
                    self.backend.end_lambda(&cell.params, body)
                }
            }
        };

        self.backend.end_cell(cell, result);
        self.scope.clear();
        self.current = None;
    }

    /// Object of the named children
    fn container(&mut self, cell: &Cell) -> B::Code {
        let env = self.env;
        let mut object = self.call(Builtin::Map, Vec::new());
        for child in cell.body.iter().filter_map(|id| env.cell(*id)) {
            let Some(name) = &child.name else { continue };
            let key = self.text(name);
            let value = self.backend.cell(child.id);
            object = self.call(Builtin::Insert, vec![object, key, value]);
        }
        object
    }

    fn text(&mut self, text: &str) -> B::Code {
        self.backend.literal(&Literal::Text(text.to_string()))
    }

    fn call(&mut self, builtin: Builtin, args: Vec<B::Code>) -> B::Code {
        let call = self.backend.call(builtin, args);
        self.backend.declare(call)
    }

    fn identifier(&mut self, name: &str) -> B::Code {
        if self.scope.iter().any(|bound| bound == name) {
            return self.backend.parameter(name);
        }
        match self.current.and_then(|cell| cell.references.get(name)) {
            Some(id) => self.backend.cell(*id),
            None => {
                let name = self.text(name);
                self.call(Builtin::Unresolved, vec![name])
            }
        }
    }

    fn expr(&mut self, expr: &Expr) -> B::Code {
        match &expr.kind {
            ExprKind::Literal(literal) => self.backend.literal(literal),
            ExprKind::Identifier(name) => self.identifier(name),
            ExprKind::Binary { op, left, right } => {
                let left = self.expr(left);
                let right = self.expr(right);
                self.call(Builtin::Binary(*op), vec![left, right])
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.expr(operand);
                self.call(Builtin::Unary(*op), vec![operand])
            }
            ExprKind::Map(entries) => self.map(entries),
            ExprKind::Block(blocks) => {
                let mut last = None;
                for block in blocks {
                    last = Some(self.expr(block));
                }
                match last {
                    Some(code) => code,
                    None => self.backend.literal(&Literal::None),
                }
            }
            ExprKind::Array { elements, range } => self.array(elements, *range),
            ExprKind::Range { .. } => self.array(std::slice::from_ref(expr), Some(0)),
            ExprKind::Filtering { target, filter } => {
                let target = self.expr(target);
                let filter = self.expr(filter);
                self.call(Builtin::Get, vec![target, filter])
            }
            ExprKind::Invoke { callee, args } => {
                let mut codes = vec![self.expr(callee)];
                for arg in args {
                    codes.push(self.expr(arg));
                }
                self.call(Builtin::Call, codes)
            }
            ExprKind::Conditional(clauses) => self.conditional(clauses),
            ExprKind::Member { object, attr } => {
                let object = self.expr(object);
                let member = self.backend.member(object, attr);
                self.backend.declare(member)
            }
        }
    }

    fn map(&mut self, entries: &[MapEntry]) -> B::Code {
        let mut object = self.call(Builtin::Map, Vec::new());
        for entry in entries {
            object = match &entry.key {
                MapKey::Name(name) => {
                    let key = self.text(name);
                    let value = self.expr(&entry.value);
                    self.call(Builtin::Insert, vec![object, key, value])
                }
                MapKey::Value(key) => {
                    let key = self.expr(key);
                    let value = self.expr(&entry.value);
                    self.call(Builtin::Insert, vec![object, key, value])
                }
                MapKey::Signature(signature) => {
                    let function = self.signature(signature, &entry.value);
                    match &signature.name {
                        Some(name) => {
                            let key = self.text(name);
                            self.call(Builtin::Insert, vec![object, key, function])
                        }
                        None => self.call(Builtin::Define, vec![object, function]),
                    }
                }
            };
        }
        object
    }

    /// Function for a callable entry, guarded when the signature has a guard
    fn signature(&mut self, signature: &KeySignature, body: &Expr) -> B::Code {
        let params = &signature.params.names;
        let depth = self.scope.len();
        self.scope.extend(params.iter().cloned());

        self.backend.begin_lambda();
        let result = self.expr(body);
        let lambda = self.backend.end_lambda(params, result);
        let mut function = self.backend.declare(lambda);

        if let Some(guard) = &signature.guard {
            self.backend.begin_lambda();
            let condition = self.expr(&guard.condition);
            let guard = self.backend.end_lambda(params, condition);
            let guard = self.backend.declare(guard);
            function = self.call(Builtin::Guard, vec![function, guard]);
        }

        self.scope.truncate(depth);
        function
    }

    fn array(&mut self, elements: &[Expr], range: Option<usize>) -> B::Code {
        let Some(index) = range else {
            let items = elements.iter().map(|e| self.expr(e)).collect();
            let array = self.backend.array(items);
            return self.call(Builtin::Stream, vec![array]);
        };

        let (start, end, inclusive) = match elements.get(index).map(|e| &e.kind) {
            Some(ExprKind::Range { start, end, inclusive }) => (start, end, *inclusive),
            _ => (&None, &None, true),
        };

        let mut before: Vec<B::Code> = elements[..index].iter().map(|e| self.expr(e)).collect();
        if let Some(start) = start {
            before.push(self.expr(start));
        }
        let mut after = Vec::new();
        if let Some(end) = end {
            after.push(self.expr(end));
        }
        for element in elements.iter().skip(index + 1) {
            after.push(self.expr(element));
        }

        let before = self.backend.array(before);
        let after = self.backend.array(after);
        let inclusive = self.backend.literal(&Literal::Boolean(inclusive));
        self.call(Builtin::Generate, vec![before, after, inclusive])
    }

    /// `__cond__(condition, then, else)`; later clauses are evaluated
    /// inside the else branch
    fn conditional(&mut self, clauses: &[ConditionalClause]) -> B::Code {
        let Some((first, rest)) = clauses.split_first() else {
            return self.backend.literal(&Literal::None);
        };
        let Some(condition) = &first.condition else {
            return self.expr(&first.body);
        };

        let condition = self.expr(condition);
        let then = self.branch(|emitter| emitter.expr(&first.body));
        let otherwise = match rest.first() {
            None => self.backend.literal(&Literal::None),
            Some(clause) if clause.condition.is_none() => {
                self.branch(|emitter| emitter.expr(&clause.body))
            }
            Some(_) => self.branch(|emitter| emitter.conditional(rest)),
        };
        self.call(Builtin::Cond, vec![condition, then, otherwise])
    }

    /// Zero-argument lambda around `body`
    fn branch<F>(&mut self, body: F) -> B::Code
    where
        F: FnOnce(&mut Self) -> B::Code,
    {
        self.backend.begin_lambda();
        let result = body(self);
        let lambda = self.backend.end_lambda(&[], result);
        self.backend.declare(lambda)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::CellSource;
    use crate::operators::OperatorTable;

    fn js(sources: Vec<CellSource>) -> String {
        let env = Environment::build(&sources, &OperatorTable::standard());
        generate(&env, JsBackend::new())
    }

    #[test]
    fn test_literals_and_references_survive() {
        let code = js(vec![
            CellSource::new(1, "x", "41"),
            CellSource::new(2, "y", r#"x + 2 * 'hi' - missing"#),
        ]);
        assert!(code.contains("41"));
        assert!(code.contains("ctx.get(1)"));
        assert!(code.contains("2"));
        assert!(code.contains(r#""hi""#));
        assert!(code.contains(r#"__unresolved__("missing")"#));
        assert!(code.contains("__add__("));
        assert!(code.contains("__mul__("));
        assert!(code.contains("__sub__("));
    }

    #[test]
    fn test_every_literal_and_reference_emitted_once() {
        const LONG: &str = "123456789012345678901234567890123456789012345678901234567890";
        let sources = vec![
            CellSource::new(1, "base", "6100"),
            CellSource::new(2, "m", "[7001, 7003..7009, 7020]"),
            CellSource::new(3, "c", "if base > 7100: 'hi'\nelse if base < 7200: 7300\nelse: missing"),
            CellSource::new(4, "f", "(x) if x > 7400: x * 7500, twice(y): y + base"),
            CellSource::new(5, "long", LONG),
            CellSource::new(6, "tiny", "1e300"),
        ];
        let text: String = sources.iter().map(|s| s.input.as_str()).collect::<Vec<_>>().join("\n");
        let code = js(sources);
        let count = |haystack: &str, needle: &str| haystack.matches(needle).count();

        for literal in ["6100", "7001", "7003", "7009", "7020", "7100", "7200", "7300", "7400", "7500", LONG, "1e300"] {
            assert_eq!(count(&text, literal), 1, "{} in source", literal);
            assert_eq!(count(&code, literal), 1, "{} in:\n{}", literal, code);
        }
        assert_eq!(count(&code, r#""hi""#), 1);
        assert_eq!(count(&text, "base"), 3);
        assert_eq!(count(&code, "ctx.get(1)"), 3);
        assert_eq!(count(&code, r#"__unresolved__("missing")"#), 1);
        assert_eq!(count(&code, "__generate__("), 1);
        assert_eq!(count(&code, "__cond__("), 2);
        assert_eq!(count(&code, "__guard__("), 1);
    }

    #[test]
    fn test_cells_follow_eval_order() {
        let code = js(vec![
            CellSource::new(1, "a", "b + 1"),
            CellSource::new(2, "b", "1"),
        ]);
        let b = code.find("ctx.set(2").unwrap();
        let a = code.find("ctx.set(1").unwrap();
        assert!(b < a);
    }

    #[test]
    fn test_error_stubs() {
        let code = js(vec![
            CellSource::new(1, "x", "y"),
            CellSource::new(2, "y", "x"),
            CellSource::new(3, "bad", "1 +"),
        ]);
        assert!(code.contains("ctx.setError(1"));
        assert!(code.contains("ctx.setError(2"));
        assert!(code.contains("ctx.setError(3"));
        assert!(!code.contains("ctx.set(1"));
    }

    #[test]
    fn test_map_and_signatures() {
        let code = js(vec![CellSource::new(
            1,
            "m",
            "a: 1, (x) if x > 0: x, twice(y): y * 2",
        )]);
        assert!(code.contains(r#"__insert__(u_0, "a", 1)"#));
        assert!(code.contains("(p_x) =>"));
        assert!(code.contains("__guard__("));
        assert!(code.contains("__define__("));
        assert!(code.contains(r#""twice""#));
    }

    #[test]
    fn test_range_generation() {
        let code = js(vec![CellSource::new(1, "r", "[1, 3..9, 20]")]);
        assert!(code.contains("__generate__([1, 3], [9, 20], true)"));
    }

    #[test]
    fn test_parameterised_cell_is_a_lambda() {
        let code = js(vec![CellSource::new(1, "f", "n * 2").with_params(&["n"])]);
        assert!(code.contains("(p_n) =>"));
        assert!(code.contains("__mul__(p_n, 2)"));
    }
}
