//! Artifact maintenance
//!
//! - [`clean_artifacts`] rewrites lineage names in canonical form
//! - [`sync_dir`] mirrors the artifact directory to a second location

use serde_json::Value;
use sqlineage_core::{canonical_name, write_atomic, ARTIFACT_EXTENSION};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Errors from maintenance operations
#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Refusing to sync {src} into {dest}: directories overlap")]
    Overlap { src: PathBuf, dest: PathBuf },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> MaintenanceError + '_ {
    move |source| MaintenanceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What a clean pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Artifact files examined
    pub examined: usize,

    /// Files rewritten because a name or the layout changed
    pub rewritten: usize,

    /// Error-marker artifacts, left as they are
    pub error_artifacts: usize,

    /// Files that could not be read as JSON, with the reason
    pub skipped: Vec<(PathBuf, String)>,
}

/// Canonicalize the edge names of every lineage artifact in `dir`
///
/// Lineage artifacts are rewritten pretty-printed. Only `source`/`target`
/// strings inside the `lineage` list change; other fields and malformed
/// items are preserved. Error-marker artifacts and
/// files that are not JSON are left untouched. Running it twice rewrites
/// nothing the second time.
pub fn clean_artifacts(dir: &Path) -> Result<CleanReport, MaintenanceError> {
    let mut report = CleanReport::default();

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();

    for path in paths {
        report.examined += 1;

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                report.skipped.push((path, e.to_string()));
                continue;
            }
        };
        let mut document: Value = match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                report.skipped.push((path, e.to_string()));
                continue;
            }
        };

        let Some(items) = document.get_mut("lineage").and_then(Value::as_array_mut) else {
            if document.get("error").is_some() {
                report.error_artifacts += 1;
            } else {
                report.skipped.push((path, "No lineage list".to_string()));
            }
            continue;
        };

        canonicalize_items(items);

        let rewritten = serde_json::to_string_pretty(&document)
            .map_err(|e| MaintenanceError::Io {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            })?;
        if rewritten == contents {
            continue;
        }
        write_atomic(&path, &rewritten).map_err(io_error(&path))?;
        tracing::debug!("Cleaned {}", path.display());
        report.rewritten += 1;
    }

    tracing::info!(
        "Cleaned {} of {} artifacts in {}",
        report.rewritten,
        report.examined,
        dir.display()
    );

    Ok(report)
}

/// Canonicalize `source`/`target` strings in place
fn canonicalize_items(items: &mut [Value]) {
    for item in items.iter_mut() {
        let Some(fields) = item.as_object_mut() else {
            continue;
        };
        for field in ["source", "target"] {
            if let Some(Value::String(name)) = fields.get_mut(field) {
                *name = canonical_name(name);
            }
        }
    }
}

/// Replace the contents of `dest` with a copy of `src`
///
/// Everything in `dest` is removed first, so files deleted from `src` do not
/// linger. Returns the number of files copied.
pub fn sync_dir(src: &Path, dest: &Path) -> Result<usize, MaintenanceError> {
    let src_abs = std::fs::canonicalize(src).map_err(io_error(src))?;
    let dest_abs = absolute(dest).map_err(io_error(dest))?;

    if src_abs.starts_with(&dest_abs) || dest_abs.starts_with(&src_abs) {
        return Err(MaintenanceError::Overlap {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
        });
    }

    std::fs::create_dir_all(&dest_abs).map_err(io_error(dest))?;

    for entry in std::fs::read_dir(&dest_abs).map_err(io_error(dest))? {
        let path = entry.map_err(io_error(dest))?.path();
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        removed.map_err(io_error(&path))?;
    }

    let mut copied = 0;
    for entry in WalkDir::new(&src_abs).min_depth(1) {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(&src_abs) else {
            continue;
        };
        let target = dest_abs.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(io_error(&target))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map_err(io_error(&target))?;
            copied += 1;
        }
    }

    tracing::info!("Synced {} files from {} to {}", copied, src.display(), dest.display());

    Ok(copied)
}

/// Canonical form of a path that may not exist yet
fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.exists() {
        return std::fs::canonicalize(path);
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => Ok(absolute(parent)?.join(name)),
        (_, Some(name)) => Ok(std::env::current_dir()?.join(name)),
        _ => std::fs::canonicalize(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clean_canonicalizes_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0--dbo--usp_a.json");
        std::fs::write(
            &path,
            r#"{"lineage": [{"source": "[stg].[orders]", "target": " \"dbo\".orders "}, {"source": "x"}]}"#,
        )
        .unwrap();

        let report = clean_artifacts(dir.path()).unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.rewritten, 1);

        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "lineage": [
                    {"source": "stg.orders", "target": "dbo.orders"},
                    {"source": "x"}
                ]
            })
        );

        let again = clean_artifacts(dir.path()).unwrap();
        assert_eq!(again.rewritten, 0);
    }

    #[test]
    fn clean_leaves_error_markers_and_junk_alone() {
        let dir = tempfile::tempdir().unwrap();
        let marker = r#"{"error": "Invalid JSON from model", "raw_response": "[dbo].[x]"}"#;
        std::fs::write(dir.path().join("0--dbo--a.json"), marker).unwrap();
        std::fs::write(dir.path().join("1--dbo--b.json"), "not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "[dbo].[x]").unwrap();

        let report = clean_artifacts(dir.path()).unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.error_artifacts, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(std::fs::read_to_string(dir.path().join("0--dbo--a.json")).unwrap(), marker);
    }

    #[test]
    fn unreadable_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0--dbo--a.json"), [0xff, 0xfe, 0x00]).unwrap();
        std::fs::write(
            dir.path().join("1--dbo--b.json"),
            r#"{"lineage": [{"source": "[dbo].[x]", "target": "dbo.y"}]}"#,
        )
        .unwrap();

        let report = clean_artifacts(dir.path()).unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.rewritten, 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].0.ends_with("0--dbo--a.json"));
    }

    #[test]
    fn sync_replaces_destination() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("0--dbo--a.json"), "{}").unwrap();
        std::fs::create_dir(src.path().join("nested")).unwrap();
        std::fs::write(src.path().join("nested").join("b.json"), "{}").unwrap();
        std::fs::write(dest.path().join("stale.json"), "{}").unwrap();

        let copied = sync_dir(src.path(), dest.path()).unwrap();
        assert_eq!(copied, 2);
        assert!(dest.path().join("0--dbo--a.json").exists());
        assert!(dest.path().join("nested").join("b.json").exists());
        assert!(!dest.path().join("stale.json").exists());
    }

    #[test]
    fn sync_refuses_overlapping_directories() {
        let src = tempfile::tempdir().unwrap();
        let inner = src.path().join("mirror");

        assert!(matches!(sync_dir(src.path(), &inner), Err(MaintenanceError::Overlap { .. })));
        assert!(!inner.exists());
        assert!(matches!(sync_dir(src.path(), src.path()), Err(MaintenanceError::Overlap { .. })));
    }
}
