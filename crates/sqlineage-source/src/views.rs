//! View lineage from catalog dependency exports
//!
//! View dependencies are known exactly from the catalog, so they bypass the
//! model: each dependent view becomes a lineage artifact whose edges read
//! `depends_on -> view`. The artifacts use the standard naming convention
//! and are picked up by the graph builder like any other.

use serde::Deserialize;
use sqlineage_core::{write_atomic, ArtifactName, Extraction, RelationshipEdge};
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use crate::catalog::CatalogError;

/// One row of a dependency export
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
struct DependencyRow {
    #[serde(rename = "Dependent_Schema")]
    dependent_schema: String,

    #[serde(rename = "Dependent_Object_Name")]
    dependent_object: String,

    #[serde(rename = "Dependent_Object_Type")]
    dependent_type: String,

    #[serde(rename = "Depends_On_Schema")]
    depends_on_schema: String,

    #[serde(rename = "Depends_On_Object_Name")]
    depends_on_object: String,

    #[serde(rename = "Depends_On_Object_Type", default)]
    depends_on_type: String,
}

/// All dependencies of one view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewLineage {
    /// View schema
    pub schema: String,

    /// View name
    pub object: String,

    /// `depends_on -> view` edges in export order
    pub edges: Vec<RelationshipEdge>,
}

impl ViewLineage {
    /// `schema.view`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.object)
    }
}

/// Read dependency exports and group them per view
///
/// Only `VIEW` dependents are kept. Duplicate rows across exports collapse
/// to one edge. Views come back sorted by qualified name.
pub fn load_view_dependencies(files: &[PathBuf]) -> Result<Vec<ViewLineage>, CatalogError> {
    let mut rows = Vec::new();

    for path in files {
        let reader = csv::Reader::from_path(path).map_err(|source| CatalogError::Open {
            path: path.clone(),
            source,
        })?;
        read_rows(reader, &path.display().to_string(), &mut rows)?;
    }

    Ok(group_rows(rows))
}

/// Same as [`load_view_dependencies`] for in-memory CSV data
pub fn view_dependencies_from_reader<R: Read>(reader: R) -> Result<Vec<ViewLineage>, CatalogError> {
    let mut rows = Vec::new();
    read_rows(csv::Reader::from_reader(reader), "<reader>", &mut rows)?;
    Ok(group_rows(rows))
}

fn read_rows<R: Read>(
    mut reader: csv::Reader<R>,
    origin: &str,
    rows: &mut Vec<DependencyRow>,
) -> Result<(), CatalogError> {
    for row in reader.deserialize::<DependencyRow>() {
        let row = row.map_err(|source| CatalogError::Row {
            origin: origin.to_string(),
            source,
        })?;
        if row.dependent_type.trim().eq_ignore_ascii_case("VIEW") {
            rows.push(row);
        }
    }
    Ok(())
}

fn group_rows(rows: Vec<DependencyRow>) -> Vec<ViewLineage> {
    let mut seen = HashSet::new();
    let mut views: BTreeMap<String, ViewLineage> = BTreeMap::new();

    for row in rows {
        if !seen.insert(row.clone()) {
            continue;
        }

        let target = format!("{}.{}", row.dependent_schema, row.dependent_object);
        let source = format!("{}.{}", row.depends_on_schema, row.depends_on_object);

        let view = views.entry(target.clone()).or_insert_with(|| ViewLineage {
            schema: row.dependent_schema.clone(),
            object: row.dependent_object.clone(),
            edges: Vec::new(),
        });

        let edge = RelationshipEdge::new(source, target);
        if !view.edges.contains(&edge) {
            view.edges.push(edge);
        }
    }

    views.into_values().collect()
}

/// Write one artifact per view, numbered from 1
///
/// Returns the number of artifacts written. Existing artifacts with the same
/// name are replaced.
pub fn write_view_artifacts(views: &[ViewLineage], dir: &Path) -> Result<usize, CatalogError> {
    std::fs::create_dir_all(dir).map_err(|source| CatalogError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    for (idx, view) in views.iter().enumerate() {
        let name = ArtifactName::new(idx + 1, &view.schema, &view.object);
        let path = name.path_in(dir);

        let json = Extraction::Lineage(view.edges.clone())
            .to_json()
            .map_err(|e| CatalogError::Write {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?;

        write_atomic(&path, &json).map_err(|source| CatalogError::Write {
            path: path.clone(),
            source,
        })?;
    }

    tracing::info!("Wrote {} view lineage artifacts to {}", views.len(), dir.display());
    Ok(views.len())
}
