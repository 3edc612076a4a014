//! Environment: compiled cells, name resolution and evaluation order
//!
//! Built once per snapshot. Every cell is lexed, parsed and lowered on its
//! own so a syntax error stays local to its cell. References are resolved
//! lexically: siblings first, then the siblings of each ancestor.

use crate::ast::AstNode;
use crate::expr::{lower, Expr};
use crate::graph::DependencyGraph;
use crate::lexer::lex;
use crate::operators::OperatorTable;
use crate::parser::parse;
use arevel_core::{CellId, RuntimeError, SyntaxError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Cell as supplied at the boundary
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CellSource {
    pub id: CellId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input: String,
    /// Nested sub-cells
    #[serde(default)]
    pub body: Vec<CellSource>,
    /// Parameters bound inside the cell
    #[serde(default)]
    pub params: Vec<String>,
}

impl CellSource {
    pub fn new(id: CellId, name: &str, input: &str) -> Self {
        Self {
            id,
            name: (!name.is_empty()).then(|| name.to_string()),
            input: input.to_string(),
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: Vec<CellSource>) -> Self {
        self.body = body;
        self
    }

    pub fn with_params(mut self, params: &[&str]) -> Self {
        self.params = params.iter().map(|p| p.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub id: CellId,
    pub name: Option<String>,
    pub source: String,
    pub parsed: Option<AstNode>,
    pub expr: Option<Expr>,
    pub error: Option<SyntaxError>,
    /// Cells this one reads, in first-reference order
    pub depends_on: Vec<CellId>,
    /// Sub-cell ids
    pub body: Vec<CellId>,
    pub params: Vec<String>,
    pub parent: Option<CellId>,
    /// Names this cell resolved to other cells
    pub references: BTreeMap<String, CellId>,
}

impl Cell {
    fn new(source: &CellSource, parent: Option<CellId>) -> Self {
        Self {
            id: source.id,
            name: source.name.clone().filter(|n| !n.is_empty()),
            source: source.input.clone(),
            parsed: None,
            expr: None,
            error: None,
            depends_on: Vec::new(),
            body: source.body.iter().map(|c| c.id).collect(),
            params: source.params.clone(),
            parent,
            references: BTreeMap::new(),
        }
    }

    pub fn is_container(&self) -> bool {
        !self.body.is_empty()
    }

    /// Unnamed containers only group their children
    pub fn is_scope_only(&self) -> bool {
        self.is_container() && self.name.is_none()
    }

    /// Name for messages
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{}", self.id),
        }
    }

    fn compile(&mut self, table: &OperatorTable) {
        if self.is_container() || self.source.trim().is_empty() {
            return;
        }
        let result = lex(&self.source, table)
            .and_then(|tokens| parse(tokens, table))
            .and_then(|ast| {
                let expr = lower(self.id, &ast)?;
                Ok((ast, expr))
            });
        match result {
            Ok((ast, expr)) => {
                self.parsed = Some(ast);
                self.expr = Some(expr);
            }
            Err(err) => {
                debug!(cell = self.id, error = %err, "cell failed to compile");
                self.error = Some(err);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
    cells: Vec<Cell>,
    index: HashMap<CellId, usize>,
    top_level: Vec<CellId>,
    graph: DependencyGraph,
    eval_order: Vec<CellId>,
    cyclic_cells: Vec<CellId>,
    cycle_errors: HashMap<CellId, RuntimeError>,
}

impl Environment {
    /// Compile and order a snapshot of cells
    pub fn build(sources: &[CellSource], table: &OperatorTable) -> Self {
        let mut env = Self::default();
        env.top_level = sources.iter().map(|c| c.id).collect();
        env.flatten(sources, None, table);
        env.mark_dependencies();
        env.order();
        env
    }

    fn flatten(&mut self, sources: &[CellSource], parent: Option<CellId>, table: &OperatorTable) {
        for source in sources {
            if self.index.contains_key(&source.id) {
                warn!(cell = source.id, "duplicate cell id ignored");
                continue;
            }
            let mut cell = Cell::new(source, parent);
            cell.compile(table);
            self.index.insert(cell.id, self.cells.len());
            self.cells.push(cell);
            self.flatten(&source.body, Some(source.id), table);
        }
    }

    fn siblings(&self, parent: Option<CellId>) -> &[CellId] {
        match parent.and_then(|p| self.cell(p)) {
            Some(cell) => &cell.body,
            None => &self.top_level,
        }
    }

    /// Resolve `name` as seen from cell `from`
    pub fn resolve(&self, from: CellId, name: &str) -> Option<CellId> {
        let mut level = self.cell(from).map(|c| c.parent);
        while let Some(parent) = level {
            let found = self
                .siblings(parent)
                .iter()
                .filter_map(|id| self.cell(*id))
                .find(|c| c.name.as_deref() == Some(name));
            if let Some(cell) = found {
                return Some(cell.id);
            }
            level = parent.map(|p| self.cell(p).and_then(|c| c.parent));
        }
        None
    }

    fn mark_dependencies(&mut self) {
        let mut resolved: Vec<(usize, BTreeMap<String, CellId>, Vec<CellId>)> = Vec::new();

        for (pos, cell) in self.cells.iter().enumerate() {
            if cell.is_scope_only() {
                continue;
            }
            let mut references = BTreeMap::new();
            let mut depends_on = Vec::new();

            if let Some(expr) = &cell.expr {
                expr.visit_references(&cell.params, &mut |name, _| {
                    match self.resolve(cell.id, name) {
                        Some(target) => {
                            references.insert(name.to_string(), target);
                            if !depends_on.contains(&target) {
                                depends_on.push(target);
                            }
                        }
                        None => debug!(cell = cell.id, name, "unresolved reference"),
                    }
                });
            }

            if cell.is_container() {
                for child in cell.body.iter().filter_map(|id| self.cell(*id)) {
                    if child.name.is_some() && !depends_on.contains(&child.id) {
                        depends_on.push(child.id);
                    }
                }
            }
            resolved.push((pos, references, depends_on));
        }

        for cell in &self.cells {
            let Some(name) = &cell.name else { continue };
            let first = self
                .siblings(cell.parent)
                .iter()
                .find(|id| self.cell(**id).map_or(false, |c| c.name.as_ref() == Some(name)));
            if first != Some(&cell.id) {
                warn!(cell = cell.id, name = %name, "duplicate name shadowed by an earlier cell");
            }
        }

        for (pos, _, _) in &resolved {
            self.graph.add_node(self.cells[*pos].id);
        }
        for (pos, references, depends_on) in resolved {
            let id = self.cells[pos].id;
            for dep in &depends_on {
                self.graph.add_edge(*dep, id);
            }
            let cell = &mut self.cells[pos];
            cell.references = references;
            cell.depends_on = depends_on;
        }
    }

    fn order(&mut self) {
        let ordering = self.graph.total_order_by_deps();
        let mut cycle_of: HashMap<CellId, Vec<String>> = HashMap::new();
        for members in self.graph.cycles(&ordering.cyclic) {
            let labels: Vec<String> = members.iter().map(|m| self.label(*m)).collect();
            for member in members {
                cycle_of.insert(member, labels.clone());
            }
        }

        for id in &ordering.cyclic {
            let err = match cycle_of.get(id) {
                Some(labels) => RuntimeError::cyclic_dependency(labels),
                None => {
                    let blocker = self
                        .graph
                        .dependencies(*id)
                        .iter()
                        .find(|dep| ordering.cyclic.contains(dep))
                        .map_or_else(|| self.label(*id), |dep| self.label(*dep));
                    RuntimeError::unresolved_reference(&blocker)
                        .with_note(format!("{} depends on a cyclic cell", self.label(*id)))
                }
            };
            warn!(cell = *id, error = %err, "cell excluded from evaluation");
            self.cycle_errors.insert(*id, err);
        }
        self.eval_order = ordering.order;
        self.cyclic_cells = ordering.cyclic;
    }

    fn label(&self, id: CellId) -> String {
        self.cell(id).map_or_else(|| format!("#{}", id), Cell::label)
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.index.get(&id).map(|pos| &self.cells[*pos])
    }

    /// All cells in declaration order, containers before their children
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn eval_order(&self) -> &[CellId] {
        &self.eval_order
    }

    pub fn cyclic_cells(&self) -> &[CellId] {
        &self.cyclic_cells
    }

    pub fn used_by(&self, id: CellId) -> BTreeSet<CellId> {
        self.graph.used_by(id)
    }

    /// Error reported for a cell excluded from evaluation
    pub fn cycle_error(&self, id: CellId) -> Option<&RuntimeError> {
        self.cycle_errors.get(&id)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arevel_core::codes;
    use pretty_assertions::assert_eq;

    fn build(sources: Vec<CellSource>) -> Environment {
        Environment::build(&sources, &OperatorTable::standard())
    }

    fn names(env: &Environment, ids: &[CellId]) -> Vec<String> {
        ids.iter().map(|id| env.label(*id)).collect()
    }

    fn tree_basic() -> Vec<CellSource> {
        vec![CellSource::new(0, "", "").with_body(vec![
            CellSource::new(1, "a", "b + c"),
            CellSource::new(2, "b", "1"),
            CellSource::new(3, "c", "d * 2"),
            CellSource::new(4, "d", "e + f"),
            CellSource::new(5, "e", "2"),
            CellSource::new(6, "f", "3"),
        ])]
    }

    #[test]
    fn test_independent_order_maintained() {
        let env = build(vec![CellSource::new(0, "", "").with_body(vec![
            CellSource::new(1, "a", "1"),
            CellSource::new(2, "b", "2"),
            CellSource::new(3, "c", "3"),
        ])]);
        assert!(env.cyclic_cells().is_empty());
        assert_eq!(names(&env, env.eval_order()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_tree_basic_order() {
        let env = build(tree_basic());
        assert_eq!(names(&env, env.eval_order()), vec!["b", "e", "f", "d", "c", "a"]);
        assert_eq!(env.cell(1).unwrap().depends_on, vec![2, 3]);
        assert_eq!(env.cell(4).unwrap().depends_on, vec![5, 6]);
    }

    #[test]
    fn test_ties_follow_declaration_not_first_reference() {
        let env = build(vec![
            CellSource::new(1, "a", "d"),
            CellSource::new(2, "b", "1"),
            CellSource::new(3, "c", "2"),
            CellSource::new(4, "d", "3"),
        ]);
        assert_eq!(names(&env, env.eval_order()), vec!["b", "c", "d", "a"]);
    }

    #[test]
    fn test_mark_dependency_usage() {
        let env = build(tree_basic());
        assert_eq!(env.used_by(2), BTreeSet::from([1]));
        assert!(env.used_by(1).is_empty());
    }

    #[test]
    fn test_cycle_detection() {
        let env = build(vec![
            CellSource::new(1, "x", "y + 1"),
            CellSource::new(2, "y", "x + 1"),
            CellSource::new(3, "z", "x"),
            CellSource::new(4, "w", "5"),
        ]);
        assert_eq!(env.cyclic_cells(), &[1, 2, 3]);
        assert_eq!(env.eval_order(), &[4]);

        let x = env.cycle_error(1).unwrap();
        assert_eq!(x.code, codes::CYCLIC_DEPENDENCY);
        assert!(x.message.contains("x") && x.message.contains("y"));

        let z = env.cycle_error(3).unwrap();
        assert_eq!(z.code, codes::UNRESOLVED_REFERENCE);
        assert!(z.message.contains("x"));
        assert_eq!(z.notes.len(), 1);
    }

    #[test]
    fn test_each_cycle_names_only_its_members() {
        let env = build(vec![
            CellSource::new(1, "a", "b"),
            CellSource::new(2, "b", "a"),
            CellSource::new(3, "p", "r"),
            CellSource::new(4, "q", "p"),
            CellSource::new(5, "r", "q + a"),
            CellSource::new(6, "s", "s"),
            CellSource::new(7, "t", "r * 2"),
        ]);
        assert_eq!(env.cyclic_cells(), &[1, 2, 3, 4, 5, 6, 7]);
        assert!(env.eval_order().is_empty());

        assert_eq!(env.cycle_error(1).unwrap().message, "Cyclic dependency: a → b");
        assert_eq!(env.cycle_error(4).unwrap().message, "Cyclic dependency: p → q → r");
        assert_eq!(env.cycle_error(6).unwrap().message, "Cyclic dependency: s");

        let t = env.cycle_error(7).unwrap();
        assert_eq!(t.code, codes::UNRESOLVED_REFERENCE);
        assert!(t.message.contains("r"));
        assert_eq!(t.notes, vec!["t depends on a cyclic cell"]);
    }

    #[test]
    fn test_dag_has_no_cyclic_cells() {
        let env = build(vec![
            CellSource::new(1, "x", "1"),
            CellSource::new(2, "y", "x + 1"),
        ]);
        assert!(env.cyclic_cells().is_empty());
        assert!(env.cycle_error(2).is_none());
    }

    #[test]
    fn test_keys_and_params_are_not_references() {
        let env = build(vec![
            CellSource::new(1, "k", "1"),
            CellSource::new(2, "obj", "k: 2, (k): k + 1"),
            CellSource::new(3, "fn", "n * k").with_params(&["n"]),
        ]);
        assert!(env.cell(2).unwrap().depends_on.is_empty());
        assert_eq!(env.cell(3).unwrap().depends_on, vec![1]);
    }

    #[test]
    fn test_lexical_scope() {
        let env = build(vec![
            CellSource::new(1, "rate", "2"),
            CellSource::new(2, "group", "").with_body(vec![
                CellSource::new(3, "rate", "10"),
                CellSource::new(4, "total", "rate * 3"),
            ]),
            CellSource::new(5, "outer", "rate"),
            CellSource::new(6, "inner", "total"),
        ]);
        assert_eq!(env.resolve(4, "rate"), Some(3));
        assert_eq!(env.resolve(5, "rate"), Some(1));
        assert_eq!(env.resolve(6, "total"), None);
        assert_eq!(env.resolve(4, "outer"), Some(5));
        assert_eq!(env.cell(2).unwrap().depends_on, vec![3, 4]);
    }

    #[test]
    fn test_unnamed_container_is_not_evaluated() {
        let env = build(tree_basic());
        assert!(!env.eval_order().contains(&0));
        assert!(env.cell(0).unwrap().is_scope_only());
    }

    #[test]
    fn test_syntax_errors_stay_local() {
        let env = build(vec![
            CellSource::new(1, "bad", "1 +"),
            CellSource::new(2, "good", "bad"),
        ]);
        let bad = env.cell(1).unwrap();
        assert_eq!(bad.error.as_ref().unwrap().code, codes::UNEXPECTED_END);
        assert!(bad.depends_on.is_empty());
        assert_eq!(env.eval_order(), &[1, 2]);
    }

    #[test]
    fn test_blank_cell_compiles_to_nothing() {
        let env = build(vec![CellSource::new(1, "blank", "   ")]);
        let cell = env.cell(1).unwrap();
        assert!(cell.expr.is_none());
        assert!(cell.error.is_none());
    }

    #[test]
    fn test_first_declared_name_wins() {
        let env = build(vec![
            CellSource::new(1, "v", "1"),
            CellSource::new(2, "v", "2"),
            CellSource::new(3, "w", "v"),
        ]);
        assert_eq!(env.cell(3).unwrap().depends_on, vec![1]);
    }

    #[test]
    fn test_cell_source_from_json() {
        let json = r#"{"id": 4, "name": "a", "input": "1", "body": [{"id": 5, "input": "2"}]}"#;
        let source: CellSource = serde_json::from_str(json).unwrap();
        assert_eq!(source.body.len(), 1);
        assert_eq!(source.body[0].name, None);
        assert!(source.params.is_empty());
    }
}
