//! Object catalog loading
//!
//! Reads catalog exports (one CSV per environment) with the columns
//! `Schema, Object, DatabaseName, ObjectType, definition` and reduces them to
//! exactly one [`ObjectRecord`] per `(schema, object)`.

use serde::Deserialize;
use sqlineage_core::{ObjectKind, ObjectRecord, SourceConfig};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Which catalog rows become records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
    /// Object kinds to keep
    pub kinds: Vec<ObjectKind>,

    /// Schemas to keep, compared case-insensitively (empty keeps all)
    pub schemas: Vec<String>,

    /// Databases in order of preference, most preferred first
    pub preferred_databases: Vec<String>,
}

impl CatalogFilter {
    /// Build a filter from the `[source]` config section
    pub fn from_config(source: &SourceConfig) -> Self {
        Self {
            kinds: source.object_types.iter().map(|t| ObjectKind::from_catalog(t)).collect(),
            schemas: source.schemas.clone(),
            preferred_databases: source.preferred_databases.clone(),
        }
    }

    /// Restrict to the given schemas
    pub fn with_schemas(mut self, schemas: Vec<String>) -> Self {
        self.schemas = schemas;
        self
    }

    fn keeps_kind(&self, kind: &ObjectKind) -> bool {
        if self.kinds.is_empty() {
            kind.is_extractable()
        } else {
            self.kinds.contains(kind)
        }
    }

    fn keeps_schema(&self, schema: &str) -> bool {
        self.schemas.is_empty() || self.schemas.iter().any(|s| s.eq_ignore_ascii_case(schema))
    }

    /// Rank of a database: most preferred gets the highest rank, unlisted gets 0
    pub fn origin_rank(&self, database: &str) -> u32 {
        self.preferred_databases
            .iter()
            .position(|d| d.eq_ignore_ascii_case(database))
            .map(|pos| (self.preferred_databases.len() - pos) as u32)
            .unwrap_or(0)
    }
}

/// One row of a catalog export
#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(rename = "Schema")]
    schema: String,

    #[serde(rename = "Object")]
    object: String,

    #[serde(rename = "DatabaseName", default)]
    database_name: String,

    #[serde(rename = "ObjectType")]
    object_type: String,

    #[serde(rename = "definition", alias = "Definition", default)]
    definition: String,
}

/// Errors loading a catalog export
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to open catalog {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid catalog row in {origin}: {source}")]
    Row {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Deduplicated set of object definitions, in first-appearance order
#[derive(Debug, Clone, Default)]
pub struct ObjectCatalog {
    filter: CatalogFilter,
    records: Vec<ObjectRecord>,
    index: HashMap<(String, String), usize>,
    rows_read: usize,
}

impl ObjectCatalog {
    /// Create an empty catalog
    pub fn new(filter: CatalogFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Load and merge several catalog files in order
    pub fn load(files: &[PathBuf], filter: CatalogFilter) -> Result<Self, CatalogError> {
        let mut catalog = Self::new(filter);
        for file in files {
            catalog.add_file(file)?;
        }
        Ok(catalog)
    }

    /// Merge one catalog CSV file
    pub fn add_file(&mut self, path: &Path) -> Result<usize, CatalogError> {
        let reader = csv::Reader::from_path(path).map_err(|source| CatalogError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let kept = self.add_csv(reader, &path.display().to_string())?;
        tracing::info!("Loaded {} matching objects from {}", kept, path.display());
        Ok(kept)
    }

    /// Merge CSV data from any reader
    pub fn add_reader<R: Read>(&mut self, reader: R, origin: &str) -> Result<usize, CatalogError> {
        self.add_csv(csv::Reader::from_reader(reader), origin)
    }

    fn add_csv<R: Read>(&mut self, mut reader: csv::Reader<R>, origin: &str) -> Result<usize, CatalogError> {
        let mut kept = 0;

        for row in reader.deserialize::<CatalogRow>() {
            let row = row.map_err(|source| CatalogError::Row {
                origin: origin.to_string(),
                source,
            })?;
            self.rows_read += 1;

            let kind = ObjectKind::from_catalog(&row.object_type);
            if !self.filter.keeps_kind(&kind) || !self.filter.keeps_schema(&row.schema) {
                continue;
            }

            let rank = self.filter.origin_rank(&row.database_name);
            let record = ObjectRecord::new(row.schema, row.object, row.definition, kind)
                .with_origin(row.database_name, rank);
            self.insert(record);
            kept += 1;
        }

        Ok(kept)
    }

    /// Insert a record, keeping the better-ranked definition on conflict
    ///
    /// The position of the first occurrence is kept either way, so ordinals
    /// do not depend on which environment won.
    pub fn insert(&mut self, record: ObjectRecord) {
        let identity = (record.schema.clone(), record.object_name.clone());

        match self.index.get(&identity) {
            Some(&pos) => {
                if record.outranks(&self.records[pos]) {
                    self.records[pos] = record;
                }
            }
            None => {
                self.index.insert(identity, self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Deduplicated records
    pub fn records(&self) -> &[ObjectRecord] {
        &self.records
    }

    /// Consume the catalog into its records
    pub fn into_records(self) -> Vec<ObjectRecord> {
        self.records
    }

    /// Number of unique objects
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no object matched
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows read across all inputs, before filtering
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }
}
