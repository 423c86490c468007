//! Lineage graph construction and traversal
//!
//! This crate handles:
//! - Folding extraction artifacts into forward and reverse adjacency maps
//! - Cycle-safe upstream/downstream traversal from a root object
//! - Rendering a traversal as a Mermaid diagram or standalone HTML page

pub mod graph;
pub mod traverse;
pub mod render;

pub use graph::{BuildReport, GraphError, LineageGraph};
pub use traverse::{trace, Traversal, TraversalError};
pub use render::{render_html, render_mermaid, write_html};
