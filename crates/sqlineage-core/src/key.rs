//! Stable object identity
//!
//! An [`ObjectKey`] is derived from the `(schema, object)` pair only. The SQL
//! text never participates, so cosmetic edits to a definition do not make an
//! already-extracted object look new.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Delimiter placed between schema and object before hashing
const KEY_DELIMITER: &str = "::";

/// Deterministic fingerprint of a `(schema, object)` pair
///
/// Hex-encoded SHA-256, stable across runs, processes and platforms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Compute the key for a schema/object pair
    pub fn new(schema: &str, object: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(schema.as_bytes());
        hasher.update(KEY_DELIMITER.as_bytes());
        hasher.update(object.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the dedup key for a schema/object pair
pub fn compute_key(schema: &str, object: &str) -> ObjectKey {
    ObjectKey::new(schema, object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic() {
        let a = compute_key("dbo", "usp_load_orders");
        let b = compute_key("dbo", "usp_load_orders");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn key_is_stable_across_processes() {
        // sha256("dbo::orders")
        let key = compute_key("dbo", "orders");
        assert_eq!(
            key.as_str(),
            "bf1e262b668c78da0bc66823f62af00193f8f8c90f44b93fc72db34411927da5"
        );
    }

    #[test]
    fn pair_order_matters() {
        assert_ne!(compute_key("a", "b"), compute_key("b", "a"));
        assert_ne!(compute_key("ab", "c"), compute_key("a", "bc"));
    }
}
