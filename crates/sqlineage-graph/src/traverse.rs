//! Directed lineage traversal
//!
//! Depth-first walk from a root in one direction. Each node is expanded at
//! most once, so cycles terminate. Expanding a node records an edge for
//! every neighbor, including neighbors already visited, and then descends
//! into the unvisited ones. Edges are always oriented as data flow
//! (source -> target) whichever way the walk goes.

use crate::graph::LineageGraph;
use sqlineage_core::{Direction, RelationshipEdge};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraversalError {
    #[error("Object '{0}' not found in the lineage data")]
    RootNotFound(String),
}

/// Edges reached from a root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traversal {
    pub root: String,
    pub direction: Direction,

    /// Discovery order
    pub edges: Vec<RelationshipEdge>,
}

impl Traversal {
    /// Root exists but has no dependencies in this direction
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Root followed by every other node, in order of first appearance
    pub fn nodes(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut nodes = vec![self.root.as_str()];
        seen.insert(self.root.as_str());

        for edge in &self.edges {
            for name in [edge.source.as_str(), edge.target.as_str()] {
                if seen.insert(name) {
                    nodes.push(name);
                }
            }
        }
        nodes
    }
}

/// Walk the graph from `root` in `direction`
///
/// The explicit stack holds `(node, next neighbor index)` frames, which
/// gives the same edge order as a recursive pre-order walk without
/// recursion depth limits.
pub fn trace(graph: &LineageGraph, root: &str, direction: Direction) -> Result<Traversal, TraversalError> {
    if !graph.contains(root) {
        return Err(TraversalError::RootNotFound(root.to_string()));
    }

    let neighbors = |node: &str| match direction {
        Direction::Downstream => graph.children(node),
        Direction::Upstream => graph.parents(node),
    };

    let mut edges = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<(&str, usize)> = Vec::new();

    visited.insert(root);
    stack.push((root, 0));

    while let Some(frame) = stack.last_mut() {
        let (node, index) = *frame;
        let Some(next) = neighbors(node).get(index) else {
            stack.pop();
            continue;
        };
        frame.1 += 1;

        edges.push(match direction {
            Direction::Downstream => RelationshipEdge::new(node, next.as_str()),
            Direction::Upstream => RelationshipEdge::new(next.as_str(), node),
        });

        if visited.insert(next.as_str()) {
            stack.push((next.as_str(), 0));
        }
    }

    tracing::debug!("Traced {} {} edges from {}", edges.len(), direction, root);

    Ok(Traversal {
        root: root.to_string(),
        direction,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn edge(source: &str, target: &str) -> RelationshipEdge {
        RelationshipEdge::new(source, target)
    }

    fn graph(edges: &[(&str, &str)]) -> LineageGraph {
        let edges: Vec<RelationshipEdge> = edges.iter().map(|(s, t)| edge(s, t)).collect();
        LineageGraph::from_edges(&edges)
    }

    #[test]
    fn cycle_terminates_with_three_edges() {
        let g = graph(&[("A", "B"), ("B", "C"), ("C", "A")]);

        let down = trace(&g, "A", Direction::Downstream).unwrap();
        assert_eq!(down.edges, vec![edge("A", "B"), edge("B", "C"), edge("C", "A")]);

        let up = trace(&g, "A", Direction::Upstream).unwrap();
        assert_eq!(up.edges, vec![edge("C", "A"), edge("B", "C"), edge("A", "B")]);
    }

    #[test]
    fn direction_symmetry() {
        let g = graph(&[("A", "B")]);

        let down = trace(&g, "A", Direction::Downstream).unwrap();
        let up = trace(&g, "B", Direction::Upstream).unwrap();
        assert_eq!(down.edges, vec![edge("A", "B")]);
        assert_eq!(up.edges, down.edges);
    }

    #[test]
    fn missing_root_differs_from_empty_result() {
        let g = graph(&[("A", "B")]);

        assert_eq!(
            trace(&g, "Z", Direction::Downstream),
            Err(TraversalError::RootNotFound("Z".to_string()))
        );

        let leaf = trace(&g, "B", Direction::Downstream).unwrap();
        assert!(leaf.is_empty());
        assert_eq!(leaf.nodes(), vec!["B"]);
    }

    #[test]
    fn pre_order_matches_recursive_walk() {
        // A feeds B and C; B feeds D; C feeds D
        let g = graph(&[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")]);

        let down = trace(&g, "A", Direction::Downstream).unwrap();
        assert_eq!(
            down.edges,
            vec![edge("A", "B"), edge("B", "D"), edge("A", "C"), edge("C", "D")]
        );
        assert_eq!(down.nodes(), vec!["A", "B", "D", "C"]);
    }

    #[test]
    fn self_loop() {
        let g = graph(&[("A", "A")]);
        let down = trace(&g, "A", Direction::Downstream).unwrap();
        assert_eq!(down.edges, vec![edge("A", "A")]);
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let names: Vec<String> = (0..50_000).map(|i| format!("dbo.t{}", i)).collect();
        let edges: Vec<RelationshipEdge> = names.windows(2).map(|w| edge(&w[0], &w[1])).collect();
        let g = LineageGraph::from_edges(&edges);

        let down = trace(&g, "dbo.t0", Direction::Downstream).unwrap();
        assert_eq!(down.edges.len(), 49_999);
    }
}
