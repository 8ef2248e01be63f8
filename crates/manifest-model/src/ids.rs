//! Canonical entity identifiers
//!
//! Manifests refer to entities either by their short name (`product`) or by
//! the fully qualified form (`entity.product`). [`EntityId`] is the single
//! place where those spellings are normalized; everything past the manifest
//! boundary compares canonical ids only.

use crate::error::ModelError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Prefix carried by fully qualified entity ids
pub const ENTITY_PREFIX: &str = "entity.";

/// Field names that manifests use to point at an entity
pub const ENTITY_REF_ALIASES: &[&str] = &["entity", "entity_id", "entityId", "entity_ref"];

/// Canonical entity identifier (`entity.<name>`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(String);

impl EntityId {
    /// Normalize a short or fully qualified entity id
    ///
    /// # Errors
    /// Returns [`ModelError::EmptyEntityId`] for blank input or a bare prefix.
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        let trimmed = raw.trim();
        let short = trimmed.strip_prefix(ENTITY_PREFIX).unwrap_or(trimmed).trim();
        if short.is_empty() {
            return Err(ModelError::EmptyEntityId);
        }
        Ok(Self(format!("{ENTITY_PREFIX}{short}")))
    }

    /// Canonical string form (`entity.product`)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short name without the prefix (`product`)
    #[inline]
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[ENTITY_PREFIX.len()..]
    }

    /// Check whether a raw spelling refers to this entity
    #[must_use]
    pub fn matches(&self, raw: &str) -> bool {
        Self::parse(raw).map(|other| other == *self).unwrap_or(false)
    }

    /// Extract an entity reference from a JSON object using any known alias
    #[must_use]
    pub fn from_object(object: &Map<String, Value>) -> Option<Self> {
        ENTITY_REF_ALIASES
            .iter()
            .filter_map(|alias| object.get(*alias).and_then(Value::as_str))
            .find_map(|raw| Self::parse(raw).ok())
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_and_qualified_are_equal() {
        let short = EntityId::parse("product").unwrap();
        let qualified = EntityId::parse("entity.product").unwrap();
        assert_eq!(short, qualified);
        assert_eq!(short.as_str(), "entity.product");
        assert_eq!(short.short(), "product");
    }

    #[test]
    fn whitespace_is_trimmed() {
        let id = EntityId::parse("  entity. order ").unwrap();
        assert_eq!(id.as_str(), "entity.order");
    }

    #[test]
    fn empty_ids_rejected() {
        assert!(matches!(EntityId::parse(""), Err(ModelError::EmptyEntityId)));
        assert!(matches!(EntityId::parse("entity."), Err(ModelError::EmptyEntityId)));
        assert!(matches!(EntityId::parse("   "), Err(ModelError::EmptyEntityId)));
    }

    #[test]
    fn matches_any_spelling() {
        let id = EntityId::parse("product").unwrap();
        assert!(id.matches("entity.product"));
        assert!(id.matches("product"));
        assert!(!id.matches("entity.order"));
        assert!(!id.matches(""));
    }

    #[test]
    fn every_alias_is_recognized() {
        for alias in ENTITY_REF_ALIASES {
            let mut object = Map::new();
            object.insert((*alias).to_string(), json!("product"));
            assert_eq!(
                EntityId::from_object(&object).map(|e| e.to_string()),
                Some("entity.product".to_string()),
                "alias {alias}"
            );
        }
    }

    #[test]
    fn object_without_alias_has_no_entity() {
        let value = json!({ "view": "product.list" });
        assert!(EntityId::from_object(value.as_object().unwrap()).is_none());
    }

    #[test]
    fn serde_normalizes() {
        let id: EntityId = serde_json::from_value(json!("order")).unwrap();
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("entity.order"));
    }
}
