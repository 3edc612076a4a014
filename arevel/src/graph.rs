//! Cell dependency graph and stable ordering

use arevel_core::CellId;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Result of ordering a graph
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ordering {
    /// Cells whose dependencies all come first, ties in declaration order
    pub order: Vec<CellId>,
    /// Cells that can never be ordered, in declaration order
    pub cyclic: Vec<CellId>,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<CellId>,
    deps: HashMap<CellId, Vec<CellId>>,
    used_by: HashMap<CellId, BTreeSet<CellId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cell; declaration order is the order of calls
    pub fn add_node(&mut self, id: CellId) {
        if !self.deps.contains_key(&id) {
            self.nodes.push(id);
            self.deps.insert(id, Vec::new());
        }
    }

    /// Record that `dependent` reads `dependency`
    pub fn add_edge(&mut self, dependency: CellId, dependent: CellId) {
        self.add_node(dependency);
        self.add_node(dependent);
        let deps = self.deps.entry(dependent).or_default();
        if !deps.contains(&dependency) {
            deps.push(dependency);
        }
        self.used_by.entry(dependency).or_default().insert(dependent);
    }

    pub fn nodes(&self) -> &[CellId] {
        &self.nodes
    }

    pub fn dependencies(&self, id: CellId) -> &[CellId] {
        self.deps.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct dependents of a cell
    pub fn used_by(&self, id: CellId) -> BTreeSet<CellId> {
        self.used_by.get(&id).cloned().unwrap_or_default()
    }

    /// Stable topological order.
    ///
    /// Repeatedly scans the remaining cells in declaration order, emitting
    /// each cell whose dependencies are already emitted, including those
    /// emitted earlier in the same scan. Stops when a scan emits nothing.
    pub fn total_order_by_deps(&self) -> Ordering {
        let mut emitted: HashSet<CellId> = HashSet::with_capacity(self.nodes.len());
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut remaining: Vec<CellId> = self.nodes.clone();

        loop {
            let before = remaining.len();
            remaining.retain(|id| {
                let ready = self.dependencies(*id).iter().all(|dep| emitted.contains(dep));
                if ready {
                    emitted.insert(*id);
                    order.push(*id);
                }
                !ready
            });
            if remaining.is_empty() || remaining.len() == before {
                break;
            }
        }

        Ordering {
            order,
            cyclic: remaining,
        }
    }

    /// Cycles among `within`: the strongly connected components that
    /// contain a cycle, members in the order of `within`.
    ///
    /// Tarjan's algorithm with an explicit work stack, so deep chains do not
    /// exhaust the call stack.
    pub fn cycles(&self, within: &[CellId]) -> Vec<Vec<CellId>> {
        const UNVISITED: usize = usize::MAX;

        let position: HashMap<CellId, usize> =
            within.iter().enumerate().map(|(pos, id)| (*id, pos)).collect();
        let successors = |node: usize| -> Vec<usize> {
            self.dependencies(within[node])
                .iter()
                .filter_map(|dep| position.get(dep).copied())
                .collect()
        };

        let mut index = vec![UNVISITED; within.len()];
        let mut lowlink = vec![0; within.len()];
        let mut on_stack = vec![false; within.len()];
        let mut stack = Vec::new();
        let mut next_index = 0;
        let mut components = Vec::new();

        for root in 0..within.len() {
            if index[root] != UNVISITED {
                continue;
            }
            index[root] = next_index;
            lowlink[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;
            // (node, its successors, next successor to visit)
            let mut work = vec![(root, successors(root), 0usize)];

            while let Some((node, succ, next)) = work.last_mut() {
                if let Some(&w) = succ.get(*next) {
                    *next += 1;
                    if index[w] == UNVISITED {
                        index[w] = next_index;
                        lowlink[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        work.push((w, successors(w), 0));
                    } else if on_stack[w] {
                        lowlink[*node] = lowlink[*node].min(index[w]);
                    }
                    continue;
                }

                let node = *node;
                work.pop();
                if let Some((parent, _, _)) = work.last() {
                    lowlink[*parent] = lowlink[*parent].min(lowlink[node]);
                }
                if lowlink[node] != index[node] {
                    continue;
                }

                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                let id = within[node];
                if component.len() > 1 || self.dependencies(id).contains(&id) {
                    component.sort_unstable();
                    components.push(component.into_iter().map(|pos| within[pos]).collect());
                }
            }
        }
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn graph(nodes: &[CellId], edges: &[(CellId, CellId)]) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for id in nodes {
            g.add_node(*id);
        }
        for (dependency, dependent) in edges {
            g.add_edge(*dependency, *dependent);
        }
        g
    }

    #[test]
    fn test_independent_cells_keep_declaration_order() {
        let g = graph(&[3, 1, 2], &[]);
        let ordering = g.total_order_by_deps();
        assert_eq!(ordering.order, vec![3, 1, 2]);
        assert!(ordering.cyclic.is_empty());
    }

    #[test]
    fn test_tree_ordering() {
        // a=1 -> {b=2, c=3}, c -> {d=4}, d -> {e=5, f=6}
        let g = graph(
            &[1, 2, 3, 4, 5, 6],
            &[(2, 1), (3, 1), (4, 3), (5, 4), (6, 4)],
        );
        let ordering = g.total_order_by_deps();
        assert_eq!(ordering.order, vec![2, 5, 6, 4, 3, 1]);
        assert_eq!(g.used_by(2), BTreeSet::from([1]));
        assert_eq!(g.used_by(4), BTreeSet::from([3]));
        assert!(g.used_by(1).is_empty());
    }

    #[test]
    fn test_cycle_is_excluded() {
        // x=1 <-> y=2, z=3 reads x, w=4 independent
        let g = graph(&[1, 2, 3, 4], &[(2, 1), (1, 2), (1, 3)]);
        let ordering = g.total_order_by_deps();
        assert_eq!(ordering.order, vec![4]);
        assert_eq!(ordering.cyclic, vec![1, 2, 3]);
        assert_eq!(g.cycles(&ordering.cyclic), vec![vec![1, 2]]);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let g = graph(&[1], &[(1, 1)]);
        let ordering = g.total_order_by_deps();
        assert_eq!(ordering.cyclic, vec![1]);
        assert_eq!(g.cycles(&ordering.cyclic), vec![vec![1]]);
    }

    #[test]
    fn test_separate_cycles_and_their_dependents() {
        // 1 <-> 2, 3 -> 4 -> 5 -> 3, 6 reads 5, 7 reads 6
        let g = graph(
            &[1, 2, 3, 4, 5, 6, 7],
            &[(2, 1), (1, 2), (4, 3), (5, 4), (3, 5), (5, 6), (6, 7)],
        );
        let ordering = g.total_order_by_deps();
        assert_eq!(ordering.cyclic, vec![1, 2, 3, 4, 5, 6, 7]);
        let mut cycles = g.cycles(&ordering.cyclic);
        cycles.sort();
        assert_eq!(cycles, vec![vec![1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn test_long_cycle_does_not_recurse() {
        let n: CellId = 20_000;
        let nodes: Vec<CellId> = (1..=n).collect();
        let mut edges: Vec<(CellId, CellId)> = (1..n).map(|i| (i, i + 1)).collect();
        edges.push((n, 1));
        let g = graph(&nodes, &edges);
        let ordering = g.total_order_by_deps();
        let cycles = g.cycles(&ordering.cyclic);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), n as usize);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let g = graph(&[1, 2], &[(1, 2), (1, 2)]);
        assert_eq!(g.dependencies(2), &[1]);
    }
}
