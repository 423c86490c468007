//! Completed-work index
//!
//! Derived from the artifact directory on every start; there is no separate
//! index file to drift out of sync with the artifacts themselves.

use sqlineage_core::{ArtifactName, ObjectKey};
use std::collections::HashSet;
use std::path::Path;

/// Keys of objects that already have an artifact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedIndex {
    keys: HashSet<ObjectKey>,
    ignored: usize,
}

impl CompletedIndex {
    /// Whether an artifact exists for this key
    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.keys.contains(key)
    }

    /// Number of completed objects
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether nothing has been completed yet
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Files in the directory that did not follow the naming convention
    pub fn ignored(&self) -> usize {
        self.ignored
    }

    /// Mark a key completed
    pub fn insert(&mut self, key: ObjectKey) -> bool {
        self.keys.insert(key)
    }
}

/// Build the completed-work index from the artifacts in `dir`
///
/// Every file whose name parses as `{ordinal}--{schema}--{object}.json`
/// contributes its key; anything else is ignored. A missing directory is an
/// empty index. Error-marker artifacts count as completed.
pub fn scan_completed(dir: &Path) -> std::io::Result<CompletedIndex> {
    let mut index = CompletedIndex::default();

    if !dir.exists() {
        return Ok(index);
    }

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let parsed = entry.file_name().to_str().and_then(ArtifactName::parse);
        match parsed {
            Some(name) => {
                index.insert(name.key());
            }
            None => index.ignored += 1,
        }
    }

    tracing::debug!(
        "Scanned {}: {} completed, {} ignored",
        dir.display(),
        index.len(),
        index.ignored
    );

    Ok(index)
}
