//! Extraction run summary (stable v1)
//!
//! Written next to the artifacts when requested. The counts are
//! informational: a run that reaches the end is successful regardless of
//! how many objects ended up with error markers.

use serde::{Deserialize, Serialize};

/// Summary schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current summary schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Counts for one extraction run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Records offered to the extractor
    pub total: usize,

    /// Records skipped because an artifact already existed
    pub skipped: usize,

    /// Artifacts written with a lineage list
    pub completed: usize,

    /// Artifacts written with an error marker
    pub error_artifacts: usize,

    /// Calls that failed; these objects stay pending
    pub failed: usize,

    /// Objects that failed, as `schema.object`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_objects: Vec<String>,
}

impl RunSummary {
    /// Create an empty summary
    pub fn new(total: usize) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            total,
            skipped: 0,
            completed: 0,
            error_artifacts: 0,
            failed: 0,
            failed_objects: Vec::new(),
        }
    }

    /// Artifacts produced in this run
    pub fn produced(&self) -> usize {
        self.completed + self.error_artifacts
    }

    /// Objects that will be attempted again on the next run
    pub fn pending(&self) -> usize {
        self.failed
    }

    /// Record a transient failure
    pub fn record_failure(&mut self, qualified_name: impl Into<String>) {
        self.failed += 1;
        self.failed_objects.push(qualified_name.into());
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} objects: {} produced ({} lineage, {} error markers), {} skipped, {} failed",
            self.total,
            self.produced(),
            self.completed,
            self.error_artifacts,
            self.skipped,
            self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary() {
        let summary = RunSummary::new(0);
        assert_eq!(summary.version, ReportVersion::CURRENT);
        assert_eq!(summary.produced(), 0);
        assert_eq!(summary.pending(), 0);
    }

    #[test]
    fn summary_counts() {
        let mut summary = RunSummary::new(5);
        summary.completed = 2;
        summary.error_artifacts = 1;
        summary.skipped = 1;
        summary.record_failure("dbo.usp_x");

        assert_eq!(summary.produced(), 3);
        assert_eq!(summary.failed_objects, vec!["dbo.usp_x"]);
        assert_eq!(
            summary.to_string(),
            "5 objects: 3 produced (2 lineage, 1 error markers), 1 skipped, 1 failed"
        );
    }

    #[test]
    fn summary_serialization() {
        let summary = RunSummary::new(1);
        let json = summary.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(!json.contains("failed_objects"));
    }
}
