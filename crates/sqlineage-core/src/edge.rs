//! Lineage relationship edges

use serde::{Deserialize, Serialize};

/// Characters stripped from object names before they are compared
const DECORATION: &[char] = &['[', ']', '"', '`'];

/// Canonical form of a (possibly decorated) object name
///
/// `[dbo].[Orders]` becomes `dbo.Orders`. Case is preserved.
pub fn canonical_name(name: &str) -> String {
    name.chars()
        .filter(|c| !DECORATION.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Directed relationship: data in `source` flows into `target`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipEdge {
    /// Object read from (`schema.object`)
    pub source: String,

    /// Object written to (`schema.object`)
    pub target: String,
}

impl RelationshipEdge {
    /// Create an edge without normalizing the names
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Copy of the edge with decoration stripped from both ends
    pub fn canonicalize(&self) -> Self {
        Self {
            source: canonical_name(&self.source),
            target: canonical_name(&self.target),
        }
    }
}

impl std::fmt::Display for RelationshipEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_brackets_and_quotes() {
        assert_eq!(canonical_name("[dbo].[Orders]"), "dbo.Orders");
        assert_eq!(canonical_name("\"sales\".\"fact\""), "sales.fact");
        assert_eq!(canonical_name("  stage.`raw` "), "stage.raw");
        assert_eq!(canonical_name("dbo.Orders"), "dbo.Orders");
    }

    #[test]
    fn canonicalize_edge() {
        let edge = RelationshipEdge::new("[dbo].[a]", "dbo.b");

        let canon = edge.canonicalize();
        assert_eq!(canon, RelationshipEdge::new("dbo.a", "dbo.b"));
        assert_eq!(canon.canonicalize(), canon);
        assert_eq!(canon.to_string(), "dbo.a -> dbo.b");
    }
}
