//! sqlineage Core
//!
//! Shared domain model: object identity, lineage edges, the on-disk artifact
//! format and its naming convention, configuration and run summaries.
//! The artifact filename convention is part of the public contract - the
//! completed-work index is rebuilt from it on every run.

pub mod key;
pub mod record;
pub mod edge;
pub mod artifact;
pub mod config;
pub mod report;

pub use key::{ObjectKey, compute_key};
pub use record::{ObjectKind, ObjectRecord};
pub use edge::{RelationshipEdge, canonical_name};
pub use artifact::{decode_component, encode_component, ArtifactName, ArtifactError, Extraction, LineageArtifact, temp_path, write_atomic, ARTIFACT_EXTENSION, ARTIFACT_SEPARATOR};
pub use config::{Config, ConfigError, Direction, GenerationConfig, GraphConfig, OutputConfig, SourceConfig};
pub use report::{RunSummary, ReportVersion};
