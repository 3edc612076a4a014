//! JavaScript backend
//!
//! Output expects the runtime builtins as globals and a `ctx` object with
//! `get(id)`, `set(id, value)` and `setError(id, message)`.

use super::Backend;
use crate::ast::Literal;
use crate::environment::Cell;
use arevel_core::{ArevelError, CellId};
use arevel_runtime::Builtin;

const INDENT: &str = "    ";

#[derive(Debug, Default)]
pub struct JsBackend {
    out: Vec<String>,
    /// Statement buffers of open cells and lambdas
    frames: Vec<Vec<String>>,
    next_var: usize,
}

impl JsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn quote(text: &str) -> String {
        serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text.escape_default()))
    }

    fn emit(&mut self, line: String) {
        match self.frames.last_mut() {
            Some(frame) => frame.push(line),
            None => self.out.push(line),
        }
    }

    fn indented(lines: Vec<String>) -> impl Iterator<Item = String> {
        lines
            .into_iter()
            .flat_map(|block| block.lines().map(|l| format!("{}{}", INDENT, l)).collect::<Vec<_>>())
    }
}

impl Backend for JsBackend {
    type Code = String;
    type Output = String;

    fn declare(&mut self, value: String) -> String {
        let var = format!("u_{}", self.next_var);
        self.next_var += 1;
        self.emit(format!("var {} = {};", var, value));
        var
    }

    fn parameter(&mut self, name: &str) -> String {
        format!("p_{}", name)
    }

    fn literal(&mut self, literal: &Literal) -> String {
        match literal {
            Literal::None => "null".to_string(),
            Literal::Boolean(b) => b.to_string(),
            Literal::Number(n) => n.to_string(),
            Literal::Text(s) => Self::quote(s),
        }
    }

    fn array(&mut self, items: Vec<String>) -> String {
        format!("[{}]", items.join(", "))
    }

    fn call(&mut self, builtin: Builtin, args: Vec<String>) -> String {
        format!("{}({})", builtin.name(), args.join(", "))
    }

    fn member(&mut self, object: String, attr: &str) -> String {
        format!("{}({}, {})", Builtin::Attr.name(), object, Self::quote(attr))
    }

    fn cell(&mut self, id: CellId) -> String {
        format!("ctx.get({})", id)
    }

    fn begin_lambda(&mut self) {
        self.frames.push(Vec::new());
    }

    fn end_lambda(&mut self, params: &[String], result: String) -> String {
        let body = self.frames.pop().unwrap_or_default();
        let params: Vec<String> = params.iter().map(|p| format!("p_{}", p)).collect();
        let mut text = format!("(({}) => {{\n", params.join(", "));
        for line in Self::indented(body) {
            text.push_str(&line);
            text.push('\n');
        }
        text.push_str(&format!("{}return {};\n}})", INDENT, result));
        text
    }

    fn begin_cell(&mut self, cell: &Cell) {
        self.out.push(format!("// {}", cell.label()));
        self.frames.push(Vec::new());
    }

    fn end_cell(&mut self, cell: &Cell, result: String) {
        let body = self.frames.pop().unwrap_or_default();
        let mut text = String::from("try {\n");
        for line in Self::indented(body) {
            text.push_str(&line);
            text.push('\n');
        }
        text.push_str(&format!("{}ctx.set({}, {});\n", INDENT, cell.id, result));
        text.push_str(&format!(
            "}} catch (err) {{\n{}ctx.setError({}, err.message);\n}}",
            INDENT, cell.id
        ));
        self.out.push(text);
    }

    fn cell_error(&mut self, cell: &Cell, error: &ArevelError) {
        self.out.push(format!("// {}", cell.label()));
        self.out.push(format!(
            "ctx.setError({}, {});",
            cell.id,
            Self::quote(&error.to_string())
        ));
    }

    fn finish(self) -> String {
        let mut text = self.out.join("\n");
        text.push('\n');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::super::generate;
    use super::*;
    use crate::environment::{CellSource, Environment};
    use crate::operators::OperatorTable;
    use pretty_assertions::assert_eq;

    fn js(sources: Vec<CellSource>) -> String {
        let env = Environment::build(&sources, &OperatorTable::standard());
        generate(&env, JsBackend::new())
    }

    #[test]
    fn test_cell_layout() {
        let code = js(vec![CellSource::new(1, "a", "1 + 2")]);
        let expected = "\
// a
try {
    var u_0 = __add__(1, 2);
    ctx.set(1, u_0);
} catch (err) {
    ctx.setError(1, err.message);
}
";
        assert_eq!(code, expected);
    }

    #[test]
    fn test_conditional_branches_are_lambdas() {
        let code = js(vec![CellSource::new(1, "s", "if x: 'yes'\nelse: 'no'")]);
        let expected = "\
// s
try {
    var u_0 = __unresolved__(\"x\");
    var u_1 = (() => {
        return \"yes\";
    });
    var u_2 = (() => {
        return \"no\";
    });
    var u_3 = __cond__(u_0, u_1, u_2);
    ctx.set(1, u_3);
} catch (err) {
    ctx.setError(1, err.message);
}
";
        assert_eq!(code, expected);
    }

    #[test]
    fn test_member_access() {
        let code = js(vec![
            CellSource::new(1, "o", "a: 1"),
            CellSource::new(2, "v", "o.a"),
        ]);
        assert!(code.contains(r#"__attr__(ctx.get(1), "a")"#));
    }

    #[test]
    fn test_text_is_escaped() {
        let code = js(vec![CellSource::new(1, "t", r#""say \"hi\"\n""#)]);
        assert!(code.contains(r#"ctx.set(1, "say \"hi\"\n");"#));
    }

    #[test]
    fn test_syntax_error_stub() {
        let code = js(vec![CellSource::new(1, "bad", "(1")]);
        assert!(code.contains("ctx.setError(1, \"[EXPECTED_TOKEN]"));
    }
}
