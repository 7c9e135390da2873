use std::collections::{HashMap, HashSet};

/// The directed graph spanned by sibling-to-sibling feature assignments
/// within one production: one edge per change, source nonterminal to
/// target nonterminal.
///
/// Cannot detect whether the graph is cyclic; on cyclic input the sort
/// still returns some order.
#[derive(Debug, Default)]
pub struct ChangeGraph {
    /// Nodes in first-seen order, so equal grammars schedule equally.
    nodes: Vec<String>,
    edges: HashMap<String, Vec<String>>,
}

impl ChangeGraph {
    pub fn new() -> Self {
        ChangeGraph::default()
    }

    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.register(from);
        self.register(to);
        if let Some(out) = self.edges.get_mut(from) {
            out.push(to.to_string());
        }
    }

    fn register(&mut self, node: &str) {
        if !self.edges.contains_key(node) {
            self.nodes.push(node.to_string());
            self.edges.insert(node.to_string(), Vec::new());
        }
    }

    /// DFS post-order, reversed: every node sorts before the nodes it
    /// points at.
    pub fn topological_sort(&self) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        for node in &self.nodes {
            if !visited.contains(node.as_str()) {
                self.visit(node, &mut visited, &mut stack);
            }
        }
        stack.reverse();
        stack
    }

    fn visit(&self, node: &str, visited: &mut HashSet<String>, stack: &mut Vec<String>) {
        visited.insert(node.to_string());
        if let Some(out) = self.edges.get(node) {
            for next in out {
                if !visited.contains(next.as_str()) {
                    self.visit(next, visited, stack);
                }
            }
        }
        stack.push(node.to_string());
    }
}
