//! Compiled manifest index
//!
//! [`CompiledManifest`] owns a manifest together with the lookup index derived
//! from it. The index is only ever built from its own manifest; there is no
//! way to mutate one without the other.

use crate::error::HashError;
use crate::hash::ManifestHash;
use crate::ids::EntityId;
use crate::manifest::{Field, Manifest, View, ViewKind};
use std::collections::HashMap;
use std::sync::Arc;

/// Entity → field lookup map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledIndex {
    fields: HashMap<EntityId, HashMap<String, Field>>,
    display_fields: HashMap<EntityId, String>,
}

impl CompiledIndex {
    /// Build the index for a manifest
    #[must_use]
    pub fn build(manifest: &Manifest) -> Self {
        let mut index = Self::default();
        for entity in &manifest.entities {
            let fields = entity
                .fields
                .iter()
                .map(|f| (f.id.clone(), f.clone()))
                .collect();
            index.fields.insert(entity.id.clone(), fields);
            if let Some(display) = &entity.display_field {
                index.display_fields.insert(entity.id.clone(), display.clone());
            }
        }
        index
    }

    /// Field declaration
    #[inline]
    #[must_use]
    pub fn field(&self, entity: &EntityId, field: &str) -> Option<&Field> {
        self.fields.get(entity)?.get(field)
    }

    /// All fields of an entity
    #[inline]
    #[must_use]
    pub fn fields(&self, entity: &EntityId) -> Option<&HashMap<String, Field>> {
        self.fields.get(entity)
    }

    /// Whether the entity is declared
    #[inline]
    #[must_use]
    pub fn has_entity(&self, entity: &EntityId) -> bool {
        self.fields.contains_key(entity)
    }

    /// Entity display field
    #[inline]
    #[must_use]
    pub fn display_field(&self, entity: &EntityId) -> Option<&str> {
        self.display_fields.get(entity).map(String::as_str)
    }

    /// Number of indexed entities
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.fields.len()
    }
}

/// Manifest plus its derived index and fingerprint
#[derive(Debug, Clone)]
pub struct CompiledManifest {
    manifest: Arc<Manifest>,
    index: CompiledIndex,
    hash: ManifestHash,
}

impl CompiledManifest {
    /// Compile a manifest, computing its hash locally
    ///
    /// # Errors
    /// Returns error if the manifest cannot be serialized for hashing.
    pub fn compile(manifest: Manifest) -> Result<Self, HashError> {
        let hash = ManifestHash::compute_serializable(&manifest)?;
        Ok(Self::with_hash(manifest, hash))
    }

    /// Compile a manifest whose hash is already known
    #[must_use]
    pub fn with_hash(manifest: Manifest, hash: ManifestHash) -> Self {
        let index = CompiledIndex::build(&manifest);
        Self {
            manifest: Arc::new(manifest),
            index,
            hash,
        }
    }

    /// The manifest
    #[inline]
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Shared handle to the manifest
    #[inline]
    #[must_use]
    pub fn manifest_arc(&self) -> Arc<Manifest> {
        Arc::clone(&self.manifest)
    }

    /// Lookup index
    #[inline]
    #[must_use]
    pub fn index(&self) -> &CompiledIndex {
        &self.index
    }

    /// Manifest fingerprint
    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ManifestHash {
        &self.hash
    }

    /// Fields a list view fetches: its columns plus the entity display field
    #[must_use]
    pub fn list_projection(&self, view: &View) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        let columns = view.columns.iter().map(|c| c.field().to_string());
        let display = view
            .entity
            .as_ref()
            .and_then(|e| self.index.display_field(e))
            .map(str::to_string);
        for field in columns.chain(display) {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }

    /// Whether a view is a form with automatic saving
    #[inline]
    #[must_use]
    pub fn is_auto_save_form(view: &View) -> bool {
        view.kind == ViewKind::Form && view.auto_save
    }
}
