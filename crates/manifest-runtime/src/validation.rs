//! Validation and workflow gate
//!
//! A field of a form is required when it is statically `required`, when the
//! workflow's current status lists it, or when its `required_when` condition
//! holds for `{record: draft}`. Required fields with a static default or
//! marked system-managed are never reported missing.
//!
//! Transition legality is enforced by the action pipeline; this module only
//! reports which transitions leave the current status.

use manifest_model::{
    is_missing, CompiledManifest, EntityId, Field, Record, Transition, View, ViewKind, Workflow,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Message attached to missing required fields
pub const REQUIRED_MESSAGE: &str = "Required";

/// Field id → message
pub type ValidationErrors = BTreeMap<String, String>;

/// Validator for one form view
///
/// Owns copies of the entity fields and workflow so it can move into the
/// autosave task.
#[derive(Debug, Clone, Default)]
pub struct FormValidator {
    is_form: bool,
    fields: Vec<Field>,
    workflow: Option<Workflow>,
}

impl FormValidator {
    /// Build for a view of a compiled manifest
    #[must_use]
    pub fn for_view(compiled: &CompiledManifest, view: &View) -> Self {
        let Some(entity) = view.entity.as_ref() else {
            return Self {
                is_form: view.kind == ViewKind::Form,
                ..Self::default()
            };
        };
        Self::for_entity(compiled, entity, view.kind == ViewKind::Form)
    }

    /// Build for an entity
    #[must_use]
    pub fn for_entity(compiled: &CompiledManifest, entity: &EntityId, is_form: bool) -> Self {
        let manifest = compiled.manifest();
        Self {
            is_form,
            fields: manifest
                .entity(entity)
                .map(|e| e.fields.clone())
                .unwrap_or_default(),
            workflow: manifest.workflow_for(entity).cloned(),
        }
    }

    /// Fields currently required for `draft`
    #[must_use]
    pub fn required_fields(&self, draft: &Record) -> BTreeSet<String> {
        let mut required: BTreeSet<String> = self
            .fields
            .iter()
            .filter(|f| {
                f.required
                    || f
                        .required_when
                        .as_ref()
                        .is_some_and(|c| c.evaluate_record(draft))
            })
            .map(|f| f.id.clone())
            .collect();

        if let Some(workflow) = &self.workflow {
            if let Some(status) = current_status(workflow, draft) {
                required.extend(
                    workflow
                        .required_fields(&status)
                        .into_iter()
                        .map(str::to_string),
                );
            }
        }
        required
    }

    /// Missing required fields; empty for non-form views
    #[must_use]
    pub fn validate(&self, draft: &Record) -> ValidationErrors {
        if !self.is_form {
            return ValidationErrors::new();
        }
        self.required_fields(draft)
            .into_iter()
            .filter(|id| !self.is_exempt(id))
            .filter(|id| is_missing(draft.get(id)))
            .map(|id| (id, REQUIRED_MESSAGE.to_string()))
            .collect()
    }

    /// Transitions leaving the draft's current status
    #[must_use]
    pub fn available_transitions(&self, draft: &Record) -> Vec<Transition> {
        let Some(workflow) = &self.workflow else {
            return Vec::new();
        };
        let Some(status) = current_status(workflow, draft) else {
            return Vec::new();
        };
        workflow.transitions_from(&status).cloned().collect()
    }

    fn is_exempt(&self, field_id: &str) -> bool {
        self.fields
            .iter()
            .find(|f| f.id == field_id)
            .is_some_and(|f| f.default.is_some() || f.system)
    }
}

/// Missing required fields of `draft` in a form view
#[must_use]
pub fn compute_validation_errors(
    compiled: &CompiledManifest,
    view: &View,
    draft: &Record,
) -> ValidationErrors {
    FormValidator::for_view(compiled, view).validate(draft)
}

/// Transitions available from the draft's status
#[must_use]
pub fn available_transitions(
    compiled: &CompiledManifest,
    entity: &EntityId,
    draft: &Record,
) -> Vec<Transition> {
    FormValidator::for_entity(compiled, entity, true).available_transitions(draft)
}

fn current_status(workflow: &Workflow, draft: &Record) -> Option<String> {
    match draft.get(&workflow.status_field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifest_model::Manifest;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn compiled() -> CompiledManifest {
        let manifest = Manifest::from_value(json!({
            "entities": [{
                "id": "order",
                "fields": [
                    {"id": "customer", "required": true},
                    {"id": "currency", "required": true, "default": "EUR"},
                    {"id": "number", "required": true, "system": true},
                    {"id": "carrier"},
                    {"id": "tracking"},
                    {"id": "reason", "required_when": {"op": "eq", "field": "status", "value": "cancelled"}}
                ]
            }],
            "views": [
                {"id": "order.form", "kind": "form", "entity": "entity.order"},
                {"id": "order.list", "kind": "list", "entity": "order"}
            ],
            "workflows": [{
                "entity": "order",
                "states": [{"id": "shipped", "required_fields": ["carrier"]}],
                "required_fields_by_state": {"shipped": ["tracking"]},
                "transitions": [
                    {"from": "draft", "to": "confirmed"},
                    {"from": "draft", "to": "cancelled"},
                    {"from": "confirmed", "to": "shipped"}
                ]
            }]
        }))
        .unwrap();
        CompiledManifest::compile(manifest).unwrap()
    }

    fn draft(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn errors(draft_value: Value) -> Vec<String> {
        let c = compiled();
        let view = c.manifest().view("order.form").unwrap();
        compute_validation_errors(&c, view, &draft(draft_value))
            .into_keys()
            .collect()
    }

    #[test]
    fn static_required_without_default() {
        assert_eq!(errors(json!({})), vec!["customer"]);
        assert_eq!(errors(json!({"customer": ""})), vec!["customer"]);
        assert_eq!(errors(json!({"customer": null})), vec!["customer"]);
        assert!(errors(json!({"customer": "ACME"})).is_empty());
    }

    #[test]
    fn message_is_required() {
        let c = compiled();
        let view = c.manifest().view("order.form").unwrap();
        let map = compute_validation_errors(&c, view, &Record::new());
        assert_eq!(map.get("customer").map(String::as_str), Some(REQUIRED_MESSAGE));
    }

    #[test]
    fn workflow_state_adds_required_fields() {
        assert_eq!(
            errors(json!({"customer": "ACME", "status": "shipped"})),
            vec!["carrier", "tracking"]
        );
    }

    #[test]
    fn required_when_condition() {
        assert_eq!(
            errors(json!({"customer": "ACME", "status": "cancelled"})),
            vec!["reason"]
        );
        assert!(errors(json!({"customer": "ACME", "status": "cancelled", "reason": "dup"})).is_empty());
    }

    #[test]
    fn list_views_are_not_validated() {
        let c = compiled();
        let view = c.manifest().view("order.list").unwrap();
        assert!(compute_validation_errors(&c, view, &Record::new()).is_empty());
    }

    #[test]
    fn transitions_from_current_status() {
        let c = compiled();
        let order = EntityId::parse("order").unwrap();
        let targets: Vec<_> = available_transitions(&c, &order, &draft(json!({"status": "draft"})))
            .into_iter()
            .map(|t| t.to)
            .collect();
        assert_eq!(targets, vec!["confirmed", "cancelled"]);
        assert!(available_transitions(&c, &order, &Record::new()).is_empty());
    }
}
