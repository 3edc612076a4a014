//! Execution machine for tree programs
//!
//! Runs each cell behind its own error boundary. Lambdas become
//! [`Function`] values whose bodies are closures over the variables they
//! capture and the cell results visible to their cell.

use crate::codegen::{CellCode, Code, Lambda, Program, Stmt};
use arevel_core::{ArevelError, Callable, CellId, Function, RuntimeError, Value};
use arevel_runtime::{attr, Runtime};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Value or error of one executed cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellOutcome {
    pub id: CellId,
    pub name: Option<String>,
    pub value: Result<Value, ArevelError>,
}

#[derive(Debug, Clone)]
struct Slot {
    label: String,
    value: Result<Value, ArevelError>,
}

type Slots = HashMap<CellId, Slot>;

#[derive(Debug, Clone, Copy, Default)]
pub struct Machine {
    runtime: Runtime,
}

impl Machine {
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }

    /// Execute every cell in program order
    pub fn run(&self, program: &Program) -> Vec<CellOutcome> {
        let mut slots: Slots = HashMap::with_capacity(program.cells.len());
        let mut outcomes = Vec::with_capacity(program.cells.len());

        for cell in &program.cells {
            let value = match (&cell.error, &cell.result) {
                (Some(err), _) => Err(err.clone()),
                (None, Some(result)) => self.run_cell(cell, result, &slots).map_err(ArevelError::from),
                (None, None) => Ok(Value::None),
            };
            match &value {
                Ok(v) => debug!(cell = cell.id, value = %v, "cell evaluated"),
                Err(err) => debug!(cell = cell.id, error = %err, "cell failed"),
            }

            slots.insert(
                cell.id,
                Slot {
                    label: cell.label(),
                    value: value.clone(),
                },
            );
            outcomes.push(CellOutcome {
                id: cell.id,
                name: cell.name.clone(),
                value,
            });
        }
        outcomes
    }

    fn run_cell(&self, cell: &CellCode, result: &Code, slots: &Slots) -> Result<Value, RuntimeError> {
        let visible: Slots = cell
            .reads
            .iter()
            .filter_map(|id| slots.get(id).map(|slot| (*id, slot.clone())))
            .collect();
        let mut frame = Frame {
            vars: HashMap::new(),
            params: HashMap::new(),
            cells: Arc::new(visible),
            runtime: self.runtime,
        };
        frame.exec(&cell.body)?;
        frame.eval(result)
    }
}

struct Frame {
    vars: HashMap<usize, Value>,
    params: HashMap<String, Value>,
    cells: Arc<Slots>,
    runtime: Runtime,
}

impl Frame {
    fn exec(&mut self, body: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in body {
            let value = self.eval(&stmt.value)?;
            self.vars.insert(stmt.var, value);
        }
        Ok(())
    }

    fn eval(&self, code: &Code) -> Result<Value, RuntimeError> {
        match code {
            Code::Var(var) => self
                .vars
                .get(var)
                .cloned()
                .ok_or_else(|| RuntimeError::internal(format!("unbound variable v{}", var))),
            Code::Param(name) => self
                .params
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::unresolved_reference(name)),
            Code::Cell(id) => self.read_cell(*id),
            Code::Literal(value) => Ok(value.clone()),
            Code::Array(items) => Ok(Value::Stream(self.eval_all(items)?)),
            Code::Call(builtin, args) => builtin.call(self.eval_all(args)?, &self.runtime),
            Code::Member(object, name) => attr(&self.eval(object)?, name),
            Code::Lambda(lambda) => Ok(Value::Function(self.closure(lambda))),
        }
    }

    fn eval_all(&self, codes: &[Code]) -> Result<Vec<Value>, RuntimeError> {
        codes.iter().map(|code| self.eval(code)).collect()
    }

    fn read_cell(&self, id: CellId) -> Result<Value, RuntimeError> {
        match self.cells.get(&id) {
            Some(Slot { value: Ok(value), .. }) => Ok(value.clone()),
            Some(Slot { label, value: Err(err) }) => Err(RuntimeError::unresolved_reference(label)
                .with_note(format!("{} failed: {}", label, err))),
            None => Err(RuntimeError::unresolved_reference(&format!("#{}", id))),
        }
    }

    fn closure(&self, lambda: &Arc<Lambda>) -> Function {
        let captured = lambda
            .captures
            .iter()
            .filter_map(|var| self.vars.get(var).map(|value| (*var, value.clone())))
            .collect();
        Function::new(
            lambda.params.clone(),
            Closure {
                lambda: Arc::clone(lambda),
                captured,
                params: self.params.clone(),
                cells: Arc::clone(&self.cells),
                runtime: self.runtime,
            },
        )
    }
}

struct Closure {
    lambda: Arc<Lambda>,
    captured: HashMap<usize, Value>,
    params: HashMap<String, Value>,
    cells: Arc<Slots>,
    runtime: Runtime,
}

impl Callable for Closure {
    fn call(&self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if args.len() != self.lambda.params.len() {
            return Err(RuntimeError::arg_count(
                "function",
                self.lambda.params.len(),
                args.len(),
            ));
        }
        let mut params = self.params.clone();
        params.extend(self.lambda.params.iter().cloned().zip(args));

        let mut frame = Frame {
            vars: self.captured.clone(),
            params,
            cells: Arc::clone(&self.cells),
            runtime: self.runtime,
        };
        frame.exec(&self.lambda.body)?;
        frame.eval(&self.lambda.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{generate, TreeBackend};
    use crate::environment::{CellSource, Environment};
    use crate::operators::OperatorTable;
    use arevel_core::codes;
    use pretty_assertions::assert_eq;

    fn run(sources: Vec<CellSource>) -> Vec<CellOutcome> {
        let env = Environment::build(&sources, &OperatorTable::standard());
        let program = generate(&env, TreeBackend::new());
        Machine::new(Runtime::new()).run(&program)
    }

    fn value(outcomes: &[CellOutcome], id: CellId) -> String {
        let outcome = outcomes.iter().find(|o| o.id == id).unwrap();
        match &outcome.value {
            Ok(v) => v.to_string(),
            Err(e) => panic!("cell {} failed: {}", id, e),
        }
    }

    fn error(outcomes: &[CellOutcome], id: CellId) -> ArevelError {
        let outcome = outcomes.iter().find(|o| o.id == id).unwrap();
        outcome.value.clone().unwrap_err()
    }

    #[test]
    fn test_arithmetic_and_references() {
        let out = run(vec![
            CellSource::new(1, "a", "b * 2"),
            CellSource::new(2, "b", "0.1 + 0.2"),
        ]);
        assert_eq!(value(&out, 2), "0.3");
        assert_eq!(value(&out, 1), "0.6");
    }

    #[test]
    fn test_closure_captures_cell_values() {
        let out = run(vec![
            CellSource::new(1, "k", "10"),
            CellSource::new(2, "f", "(x): x + k"),
            CellSource::new(3, "r", "f(5)"),
        ]);
        assert_eq!(value(&out, 3), "15");
    }

    #[test]
    fn test_guarded_signatures() {
        let out = run(vec![
            CellSource::new(1, "sign", "(x) if x < 0: 'neg', (x) if x > 0: 'pos', (x): 'zero'"),
            CellSource::new(2, "a", "sign(-3)"),
            CellSource::new(3, "b", "sign(4)"),
            CellSource::new(4, "c", "sign(0)"),
        ]);
        assert_eq!(value(&out, 2), "neg");
        assert_eq!(value(&out, 3), "pos");
        assert_eq!(value(&out, 4), "zero");
    }

    #[test]
    fn test_parameterised_cell() {
        let out = run(vec![
            CellSource::new(1, "double", "n * 2").with_params(&["n"]),
            CellSource::new(2, "x", "double(21)"),
        ]);
        assert_eq!(value(&out, 2), "42");
    }

    #[test]
    fn test_conditional_is_lazy() {
        let out = run(vec![CellSource::new(1, "c", "if 1 < 2: 'ok'\nelse: 1 / 0")]);
        assert_eq!(value(&out, 1), "ok");
    }

    #[test]
    fn test_error_boundary_per_cell() {
        let out = run(vec![
            CellSource::new(1, "bad", "1 / 0"),
            CellSource::new(2, "reader", "bad + 1"),
            CellSource::new(3, "fine", "3"),
        ]);
        assert_eq!(error(&out, 1).code(), codes::DIV_ZERO);

        let reader = error(&out, 2);
        assert_eq!(reader.code(), codes::UNRESOLVED_REFERENCE);
        match reader {
            ArevelError::RuntimeError(e) => assert!(e.notes[0].contains("bad failed")),
            other => panic!("expected runtime error, got {:?}", other),
        }
        assert_eq!(value(&out, 3), "3");
    }

    #[test]
    fn test_nested_signature_sees_outer_params() {
        let out = run(vec![
            CellSource::new(1, "adder", "(a): (b): a + b"),
            CellSource::new(2, "r", "adder(2)(3)"),
        ]);
        assert_eq!(value(&out, 2), "5");
    }

    #[test]
    fn test_ranges_filters_and_members() {
        let out = run(vec![
            CellSource::new(1, "xs", "[1..5]"),
            CellSource::new(2, "evens", "xs[(x): x % 2 == 0]"),
            CellSource::new(3, "o", "name: 'arevel', size: 3"),
            CellSource::new(4, "n", "o.name"),
            CellSource::new(5, "last", "xs[-1]"),
        ]);
        assert_eq!(value(&out, 1), "[1, 2, 3, 4, 5]");
        assert_eq!(value(&out, 2), "[2, 4]");
        assert_eq!(value(&out, 4), "arevel");
        assert_eq!(value(&out, 5), "5");
    }
}
