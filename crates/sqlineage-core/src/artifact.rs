//! Per-object lineage artifacts
//!
//! One JSON file per extracted object:
//!
//! ```text
//! {ordinal}--{schema}--{object}.json
//! ```
//!
//! containing either `{"lineage": [{"source": ..., "target": ...}]}` or
//! `{"error": ..., "raw_response": ...}` when the model output could not be
//! used. [`ArtifactName`] is the only place that knows the filename layout;
//! both the writer and the completed-work scan go through it. Schema and
//! object are percent-encoded in the filename, so parsing a name gives back
//! the exact catalog names and their key.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use crate::edge::RelationshipEdge;
use crate::key::{compute_key, ObjectKey};

/// Separator between filename components
pub const ARTIFACT_SEPARATOR: &str = "--";

/// Artifact file extension
pub const ARTIFACT_EXTENSION: &str = "json";

/// Bytes escaped in a filename component
///
/// Path-unsafe characters, whitespace, `%` itself and every `-` (so the
/// separator can never occur inside a component). Non-ASCII bytes are always
/// escaped by `percent_encoding`.
const ESCAPED: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'<')
    .add(b'>')
    .add(b':')
    .add(b'"')
    .add(b'/')
    .add(b'\\')
    .add(b'|')
    .add(b'?')
    .add(b'*')
    .add(b'%')
    .add(b'-');

/// Encode a schema or object name as a filename component
///
/// The encoding is reversible: [`decode_component`] returns the exact input,
/// so distinct names never share a filename component.
pub fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, ESCAPED).to_string()
}

/// Recover the name encoded by [`encode_component`]
pub fn decode_component(encoded: &str) -> Option<String> {
    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|name| name.into_owned())
}

/// Filename identity of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName {
    /// Position of the object in the extraction input
    pub ordinal: usize,

    /// Schema, as given by the catalog
    pub schema: String,

    /// Object name, as given by the catalog
    pub object: String,
}

impl ArtifactName {
    pub fn new(ordinal: usize, schema: &str, object: &str) -> Self {
        Self {
            ordinal,
            schema: schema.to_string(),
            object: object.to_string(),
        }
    }

    /// Parse a filename written by [`ArtifactName::file_name`]
    ///
    /// Returns `None` for anything that does not follow the convention.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{}", ARTIFACT_EXTENSION))?;
        let parts: Vec<&str> = stem.split(ARTIFACT_SEPARATOR).collect();

        let [ordinal, schema, object] = parts.as_slice() else {
            return None;
        };

        if ordinal.is_empty() || !ordinal.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let ordinal = ordinal.parse::<usize>().ok()?;
        if object.is_empty() {
            return None;
        }

        Some(Self {
            ordinal,
            schema: decode_component(schema)?,
            object: decode_component(object)?,
        })
    }

    /// Filename for this artifact
    pub fn file_name(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}.{}",
            self.ordinal,
            encode_component(&self.schema),
            encode_component(&self.object),
            ARTIFACT_EXTENSION,
            sep = ARTIFACT_SEPARATOR
        )
    }

    /// Full path inside an output directory
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    /// Dedup key of the object this artifact belongs to
    pub fn key(&self) -> ObjectKey {
        compute_key(&self.schema, &self.object)
    }

    /// `schema.object`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.object)
    }
}

impl std::fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// Outcome of interpreting a model response or an artifact file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Usable lineage list (possibly empty)
    Lineage(Vec<RelationshipEdge>),

    /// Output that could not be interpreted; raw text kept verbatim
    Unparsed {
        /// Error marker written to the artifact
        reason: String,

        /// Text exactly as the model returned it
        raw: String,
    },
}

impl Extraction {
    /// Error marker for output that is not JSON at all
    pub const INVALID_JSON: &'static str = "Invalid JSON from model";

    /// Error marker for JSON without a `lineage` list
    pub const MISSING_LINEAGE: &'static str = "Response missing lineage list";

    /// Interpret the text returned by the generation service
    ///
    /// Never fails: anything unusable becomes [`Extraction::Unparsed`].
    /// List items without string `source`/`target` fields are dropped.
    pub fn from_model_response(text: &str) -> Self {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(_) => {
                return Self::Unparsed {
                    reason: Self::INVALID_JSON.to_string(),
                    raw: text.to_string(),
                }
            }
        };

        match value.get("lineage").and_then(parse_lineage_items) {
            Some((edges, _dropped)) => Self::Lineage(edges),
            None => Self::Unparsed {
                reason: Self::MISSING_LINEAGE.to_string(),
                raw: text.to_string(),
            },
        }
    }

    /// Edges carried by this outcome (empty for unparsed output)
    pub fn edges(&self) -> &[RelationshipEdge] {
        match self {
            Self::Lineage(edges) => edges,
            Self::Unparsed { .. } => &[],
        }
    }

    /// Whether this is an error-marker outcome
    pub fn is_unparsed(&self) -> bool {
        matches!(self, Self::Unparsed { .. })
    }

    /// Serialize as an artifact document
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct LineageDocument<'a> {
            lineage: &'a [RelationshipEdge],
        }

        #[derive(Serialize)]
        struct ErrorDocument<'a> {
            error: &'a str,
            raw_response: &'a str,
        }

        match self {
            Self::Lineage(edges) => serde_json::to_string_pretty(&LineageDocument { lineage: edges }),
            Self::Unparsed { reason, raw } => serde_json::to_string_pretty(&ErrorDocument {
                error: reason,
                raw_response: raw,
            }),
        }
    }
}

/// Parse a `lineage` array, keeping well-formed items
///
/// Returns the edges and the number of items dropped, or `None` when the
/// value is not an array.
fn parse_lineage_items(value: &Value) -> Option<(Vec<RelationshipEdge>, usize)> {
    let items = value.as_array()?;
    let mut edges = Vec::with_capacity(items.len());
    let mut dropped = 0;

    for item in items {
        let source = item.get("source").and_then(Value::as_str);
        let target = item.get("target").and_then(Value::as_str);

        match (source, target) {
            (Some(source), Some(target)) => edges.push(RelationshipEdge::new(source, target)),
            _ => dropped += 1,
        }
    }

    Some((edges, dropped))
}

/// Errors reading an artifact file
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{0} has neither a lineage list nor an error marker")]
    MissingLineage(PathBuf),

    #[error("{0} has a lineage entry that is not a list")]
    InvalidLineage(PathBuf),
}

/// An artifact file read back from disk
#[derive(Debug, Clone, PartialEq)]
pub struct LineageArtifact {
    /// Where the artifact was read from
    pub path: PathBuf,

    /// Filename identity, when the name follows the convention
    pub name: Option<ArtifactName>,

    /// Content
    pub extraction: Extraction,

    /// Lineage items skipped because they lacked `source` or `target`
    pub dropped_items: usize,
}

impl LineageArtifact {
    /// Read and interpret an artifact file
    pub fn read(path: &Path) -> Result<Self, ArtifactError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(path, &contents)
    }

    /// Interpret artifact content attributed to `path`
    pub fn from_json(path: &Path, contents: &str) -> Result<Self, ArtifactError> {
        let value: Value = serde_json::from_str(contents).map_err(|e| ArtifactError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(ArtifactName::parse);

        if let Some(lineage) = value.get("lineage") {
            let (edges, dropped_items) = parse_lineage_items(lineage)
                .ok_or_else(|| ArtifactError::InvalidLineage(path.to_path_buf()))?;

            return Ok(Self {
                path: path.to_path_buf(),
                name,
                extraction: Extraction::Lineage(edges),
                dropped_items,
            });
        }

        if let Some(error) = value.get("error") {
            let reason = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            let raw = value
                .get("raw_response")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            return Ok(Self {
                path: path.to_path_buf(),
                name,
                extraction: Extraction::Unparsed { reason, raw },
                dropped_items: 0,
            });
        }

        Err(ArtifactError::MissingLineage(path.to_path_buf()))
    }
}

/// Temporary sibling used while an artifact is being written
///
/// Hidden and without the artifact extension, so a scan never mistakes it
/// for a finished artifact.
pub fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", file_name))
}

/// Replace `path` with `contents` in one step
///
/// The document is written to a temporary sibling and renamed into place.
pub fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let tmp = temp_path(path);
    std::fs::write(&tmp, contents)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_name_convention() {
        let name = ArtifactName::new(12, "dbo", "usp_load_orders");
        assert_eq!(name.file_name(), "12--dbo--usp_load_orders.json");
        assert_eq!(ArtifactName::parse(&name.file_name()), Some(name));
    }

    #[test]
    fn unsafe_characters_are_escaped() {
        let name = ArtifactName::new(3, "sales/eu", "order lines?");
        assert_eq!(name.file_name(), "3--sales%2Feu--order%20lines%3F.json");

        let parsed = ArtifactName::parse("3--sales%2Feu--order%20lines%3F.json").unwrap();
        assert_eq!(parsed.schema, "sales/eu");
        assert_eq!(parsed.object, "order lines?");
        assert_eq!(parsed.key(), compute_key("sales/eu", "order lines?"));
    }

    #[test]
    fn similar_names_get_distinct_files_and_keys() {
        let pairs = [("Order Lines", "Order_Lines"), ("a%20b", "a b"), ("Orders-", "Orders_")];
        for (left, right) in pairs {
            let a = ArtifactName::new(0, "dbo", left);
            let b = ArtifactName::new(0, "dbo", right);
            assert_ne!(a.file_name(), b.file_name());
            assert_ne!(a.key(), b.key());
            assert_eq!(ArtifactName::parse(&a.file_name()), Some(a));
            assert_eq!(ArtifactName::parse(&b.file_name()), Some(b));
        }
    }

    #[test]
    fn separator_never_survives_inside_components() {
        let name = ArtifactName::new(0, "a--b", "-obj-");
        assert_eq!(name.file_name(), "0--a%2D%2Db--%2Dobj%2D.json");
        assert_eq!(ArtifactName::parse(&name.file_name()), Some(name));

        let dashed = ArtifactName::new(1, "dbo-", "x");
        assert_eq!(ArtifactName::parse(&dashed.file_name()), Some(dashed));
    }

    #[test]
    fn non_ascii_names_round_trip() {
        let name = ArtifactName::new(5, "ventes", "Überweisung ñ");
        assert!(name.file_name().is_ascii());
        assert_eq!(ArtifactName::parse(&name.file_name()), Some(name));
    }

    #[test]
    fn parsed_key_matches_record_key() {
        use crate::record::{ObjectKind, ObjectRecord};

        let record = ObjectRecord::new("dbo", "Order Lines", "SELECT 1", ObjectKind::View);
        let name = ArtifactName::new(9, &record.schema, &record.object_name);
        assert_eq!(ArtifactName::parse(&name.file_name()).unwrap().key(), record.key());
    }

    #[test]
    fn foreign_file_names_are_rejected() {
        assert_eq!(ArtifactName::parse("notes.txt"), None);
        assert_eq!(ArtifactName::parse("summary.json"), None);
        assert_eq!(ArtifactName::parse("x--dbo--obj.json"), None);
        assert_eq!(ArtifactName::parse("1--dbo.json"), None);
        assert_eq!(ArtifactName::parse("1--dbo--obj--extra.json"), None);
        assert_eq!(ArtifactName::parse("+1--dbo--obj.json"), None);
        assert_eq!(ArtifactName::parse("1--dbo--.json"), None);
        assert_eq!(ArtifactName::parse("1--dbo--%FF.json"), None);
        assert_eq!(ArtifactName::parse(".1--dbo--obj.json.tmp"), None);
    }

    #[test]
    fn model_response_with_lineage() {
        let text = r#"{"lineage": [{"source": "dbo.a", "target": "dbo.b"}, {"source": "dbo.c"}]}"#;
        let extraction = Extraction::from_model_response(text);
        assert_eq!(extraction, Extraction::Lineage(vec![RelationshipEdge::new("dbo.a", "dbo.b")]));
    }

    #[test]
    fn model_response_not_json() {
        let extraction = Extraction::from_model_response("not json");
        assert_eq!(
            extraction,
            Extraction::Unparsed {
                reason: Extraction::INVALID_JSON.to_string(),
                raw: "not json".to_string(),
            }
        );
        assert!(extraction.edges().is_empty());
    }

    #[test]
    fn model_response_without_lineage_list() {
        let extraction = Extraction::from_model_response(r#"{"tables": ["dbo.a"]}"#);
        assert!(extraction.is_unparsed());

        let extraction = Extraction::from_model_response(r#"{"lineage": "dbo.a -> dbo.b"}"#);
        assert!(extraction.is_unparsed());
    }

    #[test]
    fn error_document_round_trips_raw_text() {
        let raw = "Sure! Here is the lineage:\n{\"lineage\": [";
        let extraction = Extraction::from_model_response(raw);
        let json = extraction.to_json().unwrap();

        let artifact = LineageArtifact::from_json(Path::new("4--dbo--p.json"), &json).unwrap();
        assert_eq!(artifact.extraction, extraction);
        assert_eq!(artifact.name, Some(ArtifactName::new(4, "dbo", "p")));
    }

    #[test]
    fn artifact_without_lineage_or_error_is_rejected() {
        let err = LineageArtifact::from_json(Path::new("1--a--b.json"), r#"{"foo": 1}"#).unwrap_err();
        assert!(matches!(err, ArtifactError::MissingLineage(_)));

        let err = LineageArtifact::from_json(Path::new("1--a--b.json"), r#"{"lineage": {}}"#).unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidLineage(_)));

        let err = LineageArtifact::from_json(Path::new("1--a--b.json"), "[").unwrap_err();
        assert!(matches!(err, ArtifactError::Parse { .. }));
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = ArtifactName::new(0, "dbo", "v").path_in(dir.path());

        write_atomic(&path, "{\"lineage\": []}").unwrap();
        write_atomic(&path, "{\"lineage\": [], \"v\": 2}").unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"v\": 2"));
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory cannot be replaced by a file
        let path = dir.path().join("0--dbo--v.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        assert!(write_atomic(&path, "{\"lineage\": []}").is_err());
        assert!(!temp_path(&path).exists());
        assert!(path.is_dir());
    }
}
