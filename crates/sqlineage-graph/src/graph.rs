//! Lineage graph construction
//!
//! Builds forward (source -> targets) and reverse (target -> sources)
//! adjacency maps from the artifact directory. Neighbor lists keep first
//! insertion order and never hold duplicates.

use sqlineage_core::{canonical_name, ArtifactError, Extraction, LineageArtifact, RelationshipEdge, ARTIFACT_EXTENSION};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Errors that prevent the graph from being built at all
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Failed to read artifact directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What happened while folding the artifacts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Artifacts that contributed a lineage list (possibly empty)
    pub artifacts_read: usize,

    /// Error-marker artifacts, which contribute no edges
    pub error_artifacts: usize,

    /// Lineage items dropped for lacking `source` or `target`
    pub dropped_items: usize,

    /// Files that could not be used, with the reason
    pub skipped: Vec<(PathBuf, String)>,
}

/// Directed lineage graph
#[derive(Debug, Clone, Default)]
pub struct LineageGraph {
    /// source -> objects it feeds
    forward: HashMap<String, Vec<String>>,

    /// target -> objects it is fed by
    reverse: HashMap<String, Vec<String>>,

    /// Every object appearing on either end of an edge
    nodes: HashSet<String>,
}

impl LineageGraph {
    /// Empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from edges, in order
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a RelationshipEdge>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.add_edge(edge);
        }
        graph
    }

    /// Fold every `*.json` artifact in `dir` into a graph
    ///
    /// Files are read in filename order. Unreadable or malformed files are
    /// recorded in the report and skipped; the fold always continues.
    pub fn from_artifacts_dir(dir: &Path) -> Result<(Self, BuildReport), GraphError> {
        let io_error = |source| GraphError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        tracing::info!("Loading {} lineage files from {}", paths.len(), dir.display());

        let mut graph = Self::new();
        let mut report = BuildReport::default();

        for path in paths {
            match LineageArtifact::read(&path) {
                Ok(artifact) => {
                    report.dropped_items += artifact.dropped_items;
                    match &artifact.extraction {
                        Extraction::Lineage(edges) => {
                            report.artifacts_read += 1;
                            for edge in edges {
                                graph.add_edge(edge);
                            }
                        }
                        Extraction::Unparsed { .. } => report.error_artifacts += 1,
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    let reason = match e {
                        ArtifactError::Io { source, .. } => source.to_string(),
                        other => other.to_string(),
                    };
                    report.skipped.push((path, reason));
                }
            }
        }

        tracing::info!(
            "Graph built: {} sources, {} targets, {} nodes",
            graph.forward.len(),
            graph.reverse.len(),
            graph.nodes.len()
        );

        Ok((graph, report))
    }

    /// Add one edge, canonicalizing both names
    ///
    /// Returns false if the edge was already present.
    pub fn add_edge(&mut self, edge: &RelationshipEdge) -> bool {
        let edge = edge.canonicalize();
        if edge.source.is_empty() || edge.target.is_empty() {
            return false;
        }

        let targets = self.forward.entry(edge.source.clone()).or_default();
        if targets.contains(&edge.target) {
            return false;
        }
        targets.push(edge.target.clone());

        let sources = self.reverse.entry(edge.target.clone()).or_default();
        if !sources.contains(&edge.source) {
            sources.push(edge.source.clone());
        }

        self.nodes.insert(edge.source);
        self.nodes.insert(edge.target);
        true
    }

    /// Whether `node` appears in the graph
    pub fn contains(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }

    /// Objects fed by `node`, in insertion order
    pub fn children(&self, node: &str) -> &[String] {
        self.forward.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    /// Objects feeding `node`, in insertion order
    pub fn parents(&self, node: &str) -> &[String] {
        self.reverse.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    /// All nodes, sorted
    pub fn all_nodes(&self) -> Vec<&str> {
        let mut nodes: Vec<&str> = self.nodes.iter().map(String::as_str).collect();
        nodes.sort_unstable();
        nodes
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct edges
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(Vec::len).sum()
    }

    /// Find the node a user meant by `name`
    ///
    /// Tries, in order: the canonical name as given, a case-insensitive
    /// match, and for names without a schema a unique case-insensitive match
    /// on the object part.
    pub fn resolve_node(&self, name: &str) -> Option<&str> {
        let wanted = canonical_name(name);

        if let Some(node) = self.nodes.get(&wanted) {
            return Some(node.as_str());
        }

        let nodes = self.all_nodes();
        if let Some(node) = nodes.iter().find(|n| n.eq_ignore_ascii_case(&wanted)) {
            return Some(*node);
        }

        if wanted.contains('.') {
            return None;
        }

        let mut short_matches = nodes.into_iter().filter(|n| {
            n.rsplit('.')
                .next()
                .is_some_and(|object| object.eq_ignore_ascii_case(&wanted))
        });
        match (short_matches.next(), short_matches.next()) {
            (Some(node), None) => Some(node),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn fold_suppresses_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0--dbo--p1.json", r#"{"lineage": [{"source": "A", "target": "B"}, {"source": "A", "target": "B"}]}"#);
        write(dir.path(), "1--dbo--p2.json", r#"{"lineage": [{"source": "[A]", "target": "B"}, {"source": "A", "target": "C"}]}"#);

        let (graph, report) = LineageGraph::from_artifacts_dir(dir.path()).unwrap();
        assert_eq!(report.artifacts_read, 2);
        assert_eq!(graph.children("A"), &["B".to_string(), "C".to_string()]);
        assert_eq!(graph.parents("B"), &["A".to_string()]);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.all_nodes(), vec!["A", "B", "C"]);
    }

    #[test]
    fn fold_skips_bad_files_and_counts_error_markers() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0--dbo--good.json", r#"{"lineage": [{"source": "A", "target": "B"}, {"source": "X"}]}"#);
        write(dir.path(), "1--dbo--marker.json", r#"{"error": "Invalid JSON from model", "raw_response": "oops"}"#);
        write(dir.path(), "2--dbo--broken.json", "not json");
        write(dir.path(), "3--dbo--shape.json", r#"{"lineage": "A -> B"}"#);
        write(dir.path(), "readme.txt", "ignored");

        let (graph, report) = LineageGraph::from_artifacts_dir(dir.path()).unwrap();
        assert_eq!(report.artifacts_read, 1);
        assert_eq!(report.error_artifacts, 1);
        assert_eq!(report.dropped_items, 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LineageGraph::from_artifacts_dir(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn resolve_node_variants() {
        let graph = LineageGraph::from_edges(&[
            RelationshipEdge::new("stg.Orders", "dbo.Orders"),
            RelationshipEdge::new("dbo.Orders", "rpt.Sales"),
        ]);

        assert_eq!(graph.resolve_node("dbo.Orders"), Some("dbo.Orders"));
        assert_eq!(graph.resolve_node("[dbo].[orders]"), Some("dbo.Orders"));
        assert_eq!(graph.resolve_node("sales"), Some("rpt.Sales"));
        // ambiguous short name
        assert_eq!(graph.resolve_node("orders"), None);
        assert_eq!(graph.resolve_node("dbo.missing"), None);
    }

    #[test]
    fn empty_names_are_ignored() {
        let mut graph = LineageGraph::new();
        assert!(!graph.add_edge(&RelationshipEdge::new("[]", "dbo.a")));
        assert_eq!(graph.node_count(), 0);
    }
}
