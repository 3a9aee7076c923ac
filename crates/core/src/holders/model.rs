//! Canonical holder identity.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::resolver::normalize_name;

/// Stable holder identifier derived from a normalized canonical name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(String);

impl HolderId {
    /// Wrap an identifier loaded from storage.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the identifier for an already-normalized name key.
    pub fn from_normalized(key: &str) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        Self(format!("h_{}", &hex::encode(digest)[..16]))
    }

    /// Derive the identifier a canonical display name maps to.
    pub fn for_canonical_name(name: &str) -> Self {
        Self::from_normalized(&normalize_name(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The single resolved identity for every known spelling of one institution.
///
/// Only `known_aliases` may change after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalHolder {
    pub holder_id: HolderId,
    pub canonical_name: String,
    pub known_aliases: BTreeSet<String>,
}

impl CanonicalHolder {
    /// A new holder whose only alias is its own name.
    pub fn new(canonical_name: impl Into<String>) -> Self {
        let canonical_name = canonical_name.into();
        let mut known_aliases = BTreeSet::new();
        known_aliases.insert(canonical_name.clone());
        Self {
            holder_id: HolderId::for_canonical_name(&canonical_name),
            canonical_name,
            known_aliases,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holder_id_is_stable_across_spellings() {
        assert_eq!(
            HolderId::for_canonical_name("Vanguard Group"),
            HolderId::for_canonical_name("The Vanguard Group, Inc.")
        );
    }

    #[test]
    fn test_holder_id_format() {
        let id = HolderId::for_canonical_name("BlackRock");
        assert!(id.as_str().starts_with("h_"));
        assert_eq!(id.as_str().len(), 18);
    }

    #[test]
    fn test_new_holder_lists_itself_as_alias() {
        let holder = CanonicalHolder::new("State Street");
        assert!(holder.known_aliases.contains("State Street"));
        assert_eq!(holder.holder_id, HolderId::for_canonical_name("State Street"));
    }
}
