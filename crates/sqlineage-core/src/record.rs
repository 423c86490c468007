//! SQL object records fed to the extractor

use serde::{Deserialize, Serialize};
use crate::key::{compute_key, ObjectKey};

/// Kind of SQL object a definition belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Stored procedure
    Procedure,

    /// View
    View,

    /// Anything else the catalog exports (functions, triggers, ...)
    Other(String),
}

impl ObjectKind {
    /// Map a catalog `ObjectType` value to a kind
    ///
    /// Accepts both the `sys.objects.type_desc` spelling (`SQL_STORED_PROCEDURE`)
    /// and the short type codes (`P`, `V`).
    pub fn from_catalog(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "SQL_STORED_PROCEDURE" | "PROCEDURE" | "P" => Self::Procedure,
            "VIEW" | "V" => Self::View,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether lineage is extracted for this kind
    pub fn is_extractable(&self) -> bool {
        matches!(self, Self::Procedure | Self::View)
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Procedure => write!(f, "procedure"),
            Self::View => write!(f, "view"),
            Self::Other(kind) => write!(f, "{}", kind.to_lowercase()),
        }
    }
}

/// One SQL object definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Schema the object lives in
    pub schema: String,

    /// Object name within the schema
    pub object_name: String,

    /// Definition as exported by the catalog (not normalized)
    pub raw_definition: String,

    /// Source environment the definition came from (database name)
    pub origin: String,

    /// Preference of the origin; higher wins when the same object
    /// appears in several environments
    pub origin_rank: u32,

    /// Object kind
    pub kind: ObjectKind,
}

impl ObjectRecord {
    /// Create a record with an unranked origin
    pub fn new(
        schema: impl Into<String>,
        object_name: impl Into<String>,
        raw_definition: impl Into<String>,
        kind: ObjectKind,
    ) -> Self {
        Self {
            schema: schema.into(),
            object_name: object_name.into(),
            raw_definition: raw_definition.into(),
            origin: String::new(),
            origin_rank: 0,
            kind,
        }
    }

    /// Set the origin and its rank
    pub fn with_origin(mut self, origin: impl Into<String>, rank: u32) -> Self {
        self.origin = origin.into();
        self.origin_rank = rank;
        self
    }

    /// `schema.object`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.object_name)
    }

    /// Identity of the raw `(schema, object)` pair
    pub fn key(&self) -> ObjectKey {
        compute_key(&self.schema, &self.object_name)
    }

    /// Whether `self` should replace `other` during dedup
    ///
    /// Higher rank wins; on equal rank the greater origin name wins.
    pub fn outranks(&self, other: &ObjectRecord) -> bool {
        (self.origin_rank, self.origin.as_str()) > (other.origin_rank, other.origin.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_catalog_values() {
        assert_eq!(ObjectKind::from_catalog("SQL_STORED_PROCEDURE"), ObjectKind::Procedure);
        assert_eq!(ObjectKind::from_catalog("v"), ObjectKind::View);
        assert_eq!(
            ObjectKind::from_catalog("SQL_SCALAR_FUNCTION"),
            ObjectKind::Other("SQL_SCALAR_FUNCTION".to_string())
        );
        assert!(!ObjectKind::from_catalog("TRIGGER").is_extractable());
    }

    #[test]
    fn key_ignores_definition() {
        let a = ObjectRecord::new("dbo", "usp_a", "SELECT 1", ObjectKind::Procedure);
        let b = ObjectRecord::new("dbo", "usp_a", "SELECT 2 -- edited", ObjectKind::Procedure);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.qualified_name(), "dbo.usp_a");
    }

    #[test]
    fn origin_ranking() {
        let dev = ObjectRecord::new("dbo", "v", "", ObjectKind::View).with_origin("DEV", 0);
        let uat = ObjectRecord::new("dbo", "v", "", ObjectKind::View).with_origin("UAT", 0);
        let prod = ObjectRecord::new("dbo", "v", "", ObjectKind::View).with_origin("A_PROD", 5);

        assert!(uat.outranks(&dev));
        assert!(prod.outranks(&uat));
        assert!(!dev.outranks(&dev));
    }
}
