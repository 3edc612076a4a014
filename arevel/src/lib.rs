//! Arevel - a cell expression language
//!
//! Each cell holds a formula. The pipeline lexes, parses and lowers every
//! formula, orders cells by their references, then generates code through a
//! [`Backend`](codegen::Backend). JavaScript output is meant for an external
//! host. Tree output runs in-process on the [`Machine`](machine::Machine).

pub mod ast;
pub mod codegen;
pub mod environment;
pub mod expr;
pub mod graph;
pub mod lexer;
pub mod machine;
pub mod operators;
pub mod parser;

pub use codegen::{generate, Backend, JsBackend, Program, TreeBackend};
pub use environment::{Cell, CellSource, Environment};
pub use machine::{CellOutcome, Machine};
pub use operators::OperatorTable;

use arevel_core::{ArevelError, CellId, Value};
use arevel_runtime::Runtime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A view snapshot: the top-level cells
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalRequest {
    #[serde(default)]
    pub body: Vec<CellSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellResult {
    pub id: CellId,
    pub output: Option<Value>,
    pub error: Option<ArevelError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalResponse {
    pub results: Vec<CellResult>,
    pub eval_order: Vec<CellId>,
    pub cyclic_cells: Vec<CellId>,
}

impl EvalResponse {
    pub fn result(&self, id: CellId) -> Option<&CellResult> {
        self.results.iter().find(|r| r.id == id)
    }
}

/// Main Arevel engine
#[derive(Debug, Clone)]
pub struct Arevel {
    table: Arc<OperatorTable>,
    runtime: Runtime,
}

impl Arevel {
    pub fn new() -> Self {
        Self {
            table: Arc::new(OperatorTable::standard()),
            runtime: Runtime::new(),
        }
    }

    /// Significant digits for fractional powers
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.runtime = self.runtime.with_precision(precision);
        self
    }

    /// Longest stream a range may generate
    pub fn with_max_stream_len(mut self, max_stream_len: usize) -> Self {
        self.runtime = self.runtime.with_max_stream_len(max_stream_len);
        self
    }

    pub fn operators(&self) -> &OperatorTable {
        &self.table
    }

    pub fn environment(&self, cells: &[CellSource]) -> Environment {
        Environment::build(cells, &self.table)
    }

    /// JavaScript for an external host
    pub fn compile_js(&self, request: &EvalRequest) -> String {
        generate(&self.environment(&request.body), JsBackend::new())
    }

    pub fn compile_tree(&self, request: &EvalRequest) -> Program {
        generate(&self.environment(&request.body), TreeBackend::new())
    }

    /// Evaluate every cell, one result per cell that has a value or error
    pub fn eval(&self, request: &EvalRequest) -> EvalResponse {
        let env = self.environment(&request.body);
        let program = generate(&env, TreeBackend::new());
        let outcomes = Machine::new(self.runtime).run(&program);
        debug!(
            cells = outcomes.len(),
            cyclic = env.cyclic_cells().len(),
            "evaluation finished"
        );

        EvalResponse {
            results: outcomes
                .into_iter()
                .map(|outcome| {
                    let (output, error) = match outcome.value {
                        Ok(value) => (Some(value), None),
                        Err(err) => (None, Some(err)),
                    };
                    CellResult {
                        id: outcome.id,
                        output,
                        error,
                    }
                })
                .collect(),
            eval_order: env.eval_order().to_vec(),
            cyclic_cells: env.cyclic_cells().to_vec(),
        }
    }
}

impl Default for Arevel {
    fn default() -> Self {
        Self::new()
    }
}
