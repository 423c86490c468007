//! Resumable lineage extraction
//!
//! Drives one generation call per SQL object that does not have an artifact
//! yet, with a bounded number of calls in flight, and writes exactly one
//! artifact per object. A crashed or interrupted run is resumed by running
//! it again: the completed-work index is rebuilt from the artifact
//! filenames and finished objects are skipped.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sqlineage_extract::{Extractor, ExtractorConfig};
//!
//! let config = ExtractorConfig::new(client, "lineage_outputs").with_concurrency_limit(2);
//! let summary = Extractor::new(config)?.run(records).await?;
//! println!("{}", summary);
//! ```

pub mod index;
pub mod orchestrator;
pub mod maintenance;

pub use index::{CompletedIndex, scan_completed};
pub use orchestrator::{Extractor, ExtractorConfig, ExtractError, ObjectOutcome};
pub use maintenance::{CleanReport, MaintenanceError, clean_artifacts, sync_dir};
