//! Object definition sources
//!
//! This crate handles:
//! - Loading SQL object definitions from catalog CSV exports
//! - Filtering by object type and schema, deduplicating across environments
//! - Normalizing SQL text before it is put into a prompt
//! - Exporting catalog view dependencies directly as lineage artifacts

pub mod catalog;
pub mod normalize;
pub mod views;

pub use catalog::{CatalogError, CatalogFilter, ObjectCatalog};
pub use normalize::normalize_sql;
pub use views::{ViewLineage, load_view_dependencies, view_dependencies_from_reader, write_view_artifacts};
