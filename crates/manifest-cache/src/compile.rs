//! Manifest compilation
//!
//! Turns manifest JSON into a [`CompiledManifest`] and reports structural
//! problems that do not prevent interpretation (dangling entity references,
//! duplicate ids, a home target pointing nowhere) as warnings.

use crate::error::CompileError;
use manifest_model::{CompiledManifest, Manifest, ManifestHash, Target};
use serde_json::Value;
use std::collections::HashSet;

/// Non-fatal manifest problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileWarning {
    /// Dotted location (`views.product.list`)
    pub location: String,
    /// Human-readable description
    pub message: String,
}

impl CompileWarning {
    fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Manifest compiler
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestCompiler;

impl ManifestCompiler {
    /// Create new compiler
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compile manifest JSON text
    ///
    /// # Errors
    /// Returns [`CompileError::Syntax`] on malformed JSON and the errors of
    /// [`ManifestCompiler::compile`] otherwise.
    pub fn compile_str(&self, content: &str) -> Result<CompiledManifest, CompileError> {
        let value: Value = serde_json::from_str(content)?;
        self.compile(value, None)
    }

    /// Compile a manifest value
    ///
    /// `hash` is the server-provided fingerprint; when absent the hash is
    /// computed from the manifest itself.
    ///
    /// # Errors
    /// - [`CompileError::NotAnObject`] if the root is not an object
    /// - [`CompileError::Invalid`] if the manifest does not match the schema
    pub fn compile(
        &self,
        value: Value,
        hash: Option<ManifestHash>,
    ) -> Result<CompiledManifest, CompileError> {
        if !value.is_object() {
            return Err(CompileError::NotAnObject(json_kind(&value)));
        }
        let manifest = Manifest::from_value(value)?;

        for warning in self.lint(&manifest) {
            tracing::warn!(location = %warning.location, "{}", warning.message);
        }

        let compiled = match hash {
            Some(hash) => CompiledManifest::with_hash(manifest, hash),
            None => CompiledManifest::compile(manifest)?,
        };
        tracing::debug!(
            hash = compiled.hash().short(),
            entities = compiled.index().entity_count(),
            "compiled manifest"
        );
        Ok(compiled)
    }

    /// Collect non-fatal problems
    #[must_use]
    pub fn lint(&self, manifest: &Manifest) -> Vec<CompileWarning> {
        let mut warnings = Vec::new();

        duplicates(manifest.entities.iter().map(|e| e.id.as_str()), "entities", &mut warnings);
        duplicates(manifest.views.iter().map(|v| v.id.as_str()), "views", &mut warnings);
        duplicates(manifest.pages.iter().map(|p| p.id.as_str()), "pages", &mut warnings);
        duplicates(
            manifest.actions.iter().filter_map(|a| a.id.as_deref()),
            "actions",
            &mut warnings,
        );

        for view in &manifest.views {
            let location = format!("views.{}", view.id);
            match &view.entity {
                None => warnings.push(CompileWarning::new(location, "view has no entity")),
                Some(entity) if manifest.entity(entity).is_none() => warnings.push(
                    CompileWarning::new(location, format!("unknown entity '{entity}'")),
                ),
                Some(_) => {}
            }
        }

        for workflow in &manifest.workflows {
            if manifest.entity(&workflow.entity).is_none() {
                warnings.push(CompileWarning::new(
                    format!("workflows.{}", workflow.entity),
                    "workflow for undeclared entity",
                ));
            }
        }

        if let Some(home) = &manifest.app.home {
            match home.parse::<Target>() {
                Ok(target) if !manifest.contains_target(&target) => warnings.push(
                    CompileWarning::new("app.home", format!("home '{home}' does not exist")),
                ),
                Ok(_) => {}
                Err(err) => warnings.push(CompileWarning::new("app.home", err.to_string())),
            }
        }

        warnings
    }
}

fn duplicates<'a>(
    ids: impl Iterator<Item = &'a str>,
    section: &str,
    warnings: &mut Vec<CompileWarning>,
) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            warnings.push(CompileWarning::new(
                format!("{section}.{id}"),
                "duplicate id, first declaration wins",
            ));
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
