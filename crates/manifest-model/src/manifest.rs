//! Application manifest
//!
//! The immutable description of an application module: entities and their
//! fields, list/form views, pages, the action table and workflows. All
//! lookups that cross entity boundaries go through [`EntityId`].

use crate::condition::Condition;
use crate::error::ModelError;
use crate::ids::EntityId;
use crate::record::Record;
use crate::target::{Target, TargetKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Application manifest snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// App-level settings
    pub app: AppConfig,
    /// Declared entities
    pub entities: Vec<Entity>,
    /// List and form views
    pub views: Vec<View>,
    /// Pages
    pub pages: Vec<Page>,
    /// Action table
    pub actions: Vec<Action>,
    /// Per-entity workflows
    pub workflows: Vec<Workflow>,
}

/// App-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Display title
    pub title: Option<String>,
    /// Home target (`page:<id>` / `view:<id>`)
    pub home: Option<String>,
}

/// Entity declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Canonical id
    pub id: EntityId,
    /// Display label
    #[serde(default)]
    pub label: Option<String>,
    /// Field used as the record's title
    #[serde(default)]
    pub display_field: Option<String>,
    /// Field declarations
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Page opened to edit a record of this entity
    #[serde(default)]
    pub default_form_page: Option<String>,
}

/// Field declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Field {
    /// Field id
    pub id: String,
    /// Display label
    pub label: Option<String>,
    /// Field type (`string`, `number`, `enum`, ...)
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Statically required
    pub required: bool,
    /// Conditionally required
    pub required_when: Option<Condition>,
    /// Static default applied by the record store
    pub default: Option<Value>,
    /// Value maintained by the system, never entered by users
    #[serde(alias = "system_managed")]
    pub system: bool,
}

/// Kind of view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    /// Record list
    #[default]
    List,
    /// Single-record form
    Form,
}

/// View declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct View {
    /// View id
    pub id: String,
    /// List or form
    pub kind: ViewKind,
    /// Entity shown by the view
    #[serde(alias = "entity_id", alias = "entityId", alias = "entity_ref")]
    pub entity: Option<EntityId>,
    /// Display label
    pub label: Option<String>,
    /// List columns
    pub columns: Vec<FieldRef>,
    /// Form sections
    pub sections: Vec<Section>,
    /// Header configuration
    pub header: Header,
    /// Form saves automatically after edits
    pub auto_save: bool,
    /// Debounce for automatic saves
    pub auto_save_debounce_ms: Option<u64>,
    /// Form opened from a list row (target or view id)
    pub open_form: Option<String>,
}

/// Reference to a field in columns and sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldRef {
    /// Bare field id
    Id(String),
    /// Field id with presentation options
    Detailed {
        /// Field id
        #[serde(alias = "id")]
        field: String,
        /// Label override
        #[serde(default)]
        label: Option<String>,
    },
}

impl FieldRef {
    /// Referenced field id
    #[inline]
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Detailed { field, .. } => field,
        }
    }
}

/// Form section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Section {
    /// Section id
    pub id: Option<String>,
    /// Section title
    pub title: Option<String>,
    /// Fields shown in the section
    pub fields: Vec<FieldRef>,
}

/// Header of a view or page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    /// Title override
    pub title: Option<String>,
    /// Header actions
    pub actions: Vec<ActionRef>,
}

/// Page declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Page {
    /// Page id
    pub id: String,
    /// Page title
    pub title: Option<String>,
    /// Content blocks, top to bottom
    pub content: Vec<ContentBlock>,
    /// Header configuration
    pub header: Header,
}

/// Content block on a page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentBlock {
    /// Block type (`view`, `text`, `stack`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Embedded view id
    pub view: Option<String>,
    /// Remaining block properties
    #[serde(flatten)]
    pub props: Map<String, Value>,
}

/// Kind of action
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    /// Navigate to a target
    Navigate,
    /// Open a form view
    OpenForm,
    /// Create a record
    CreateRecord,
    /// Update the current record
    UpdateRecord,
    /// Update all selected records
    BulkUpdate,
    /// Re-fetch the current surfaces
    Refresh,
    /// Server-defined action
    Other(String),
    /// No kind declared
    #[default]
    Unspecified,
}

impl ActionKind {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Navigate => "navigate",
            Self::OpenForm => "open_form",
            Self::CreateRecord => "create_record",
            Self::UpdateRecord => "update_record",
            Self::BulkUpdate => "bulk_update",
            Self::Refresh => "refresh",
            Self::Other(name) => name,
            Self::Unspecified => "",
        }
    }

    /// Whether the action writes records
    #[inline]
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::CreateRecord | Self::UpdateRecord | Self::BulkUpdate)
    }
}

impl From<String> for ActionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "navigate" => Self::Navigate,
            "open_form" => Self::OpenForm,
            "create_record" => Self::CreateRecord,
            "update_record" => Self::UpdateRecord,
            "bulk_update" => Self::BulkUpdate,
            "refresh" => Self::Refresh,
            "" => Self::Unspecified,
            _ => Self::Other(value),
        }
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl Display for ActionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Action {
    /// Canonical action id
    pub id: Option<String>,
    /// What the action does
    pub kind: ActionKind,
    /// Button label
    pub label: Option<String>,
    /// Navigation target or form view
    pub target: Option<String>,
    /// Entity the action writes to
    #[serde(alias = "entity_id", alias = "entityId", alias = "entity_ref")]
    pub entity: Option<EntityId>,
    /// Field values written by update actions
    pub patch: Option<Record>,
    /// Confirmation prompt shown before running
    pub confirm: Option<Confirm>,
    /// Shown only when the condition holds
    pub visible_when: Option<Condition>,
    /// Clickable only when the condition holds
    pub enabled_when: Option<Condition>,
}

/// Confirmation declaration (`true`, a message, or a full prompt)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Confirm {
    /// `true` asks with a generic message, `false` disables the prompt
    Flag(bool),
    /// Message only
    Message(String),
    /// Full prompt
    Prompt(ConfirmPrompt),
}

/// Confirmation prompt content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmPrompt {
    /// Dialog title
    pub title: Option<String>,
    /// Dialog body
    pub message: Option<String>,
    /// Label of the accepting button
    pub confirm_label: Option<String>,
}

impl Confirm {
    /// Normalized prompt, if confirmation is required
    #[must_use]
    pub fn prompt(&self) -> Option<ConfirmPrompt> {
        match self {
            Self::Flag(false) => None,
            Self::Flag(true) => Some(ConfirmPrompt::default()),
            Self::Message(message) => Some(ConfirmPrompt {
                message: Some(message.clone()),
                ..ConfirmPrompt::default()
            }),
            Self::Prompt(prompt) => Some(prompt.clone()),
        }
    }
}

/// Inline action or reference into the action table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionRef {
    /// `{"action_id": "...", ...overrides}`
    Reference {
        /// Referenced action id
        action_id: String,
        /// Fields overriding the referenced action
        #[serde(flatten)]
        overrides: Map<String, Value>,
    },
    /// Full inline action
    Inline(Action),
}

impl ActionRef {
    /// Reference without overrides
    #[inline]
    #[must_use]
    pub fn to_id(action_id: impl Into<String>) -> Self {
        Self::Reference {
            action_id: action_id.into(),
            overrides: Map::new(),
        }
    }
}

/// Workflow attached to an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Entity governed by the workflow
    #[serde(alias = "entity_id", alias = "entityId", alias = "entity_ref")]
    pub entity: EntityId,
    /// Field holding the current status
    #[serde(default = "default_status_field")]
    pub status_field: String,
    /// Declared states
    #[serde(default)]
    pub states: Vec<WorkflowState>,
    /// Declared transitions
    #[serde(default)]
    pub transitions: Vec<Transition>,
    /// Required fields per status
    #[serde(default)]
    pub required_fields_by_state: BTreeMap<String, Vec<String>>,
}

fn default_status_field() -> String {
    "status".to_string()
}

/// Workflow state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowState {
    /// Status value
    pub id: String,
    /// Display label
    pub label: Option<String>,
    /// Fields required while in this state
    pub required_fields: Vec<String>,
}

/// Workflow transition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transition {
    /// Transition id
    pub id: Option<String>,
    /// Source status
    pub from: String,
    /// Destination status
    pub to: String,
    /// Button label
    pub label: Option<String>,
    /// Action executed for the transition
    pub action: Option<String>,
}

impl Workflow {
    /// Fields required while the record is in `status`
    ///
    /// Union of the state's own `required_fields` and the workflow-level
    /// `required_fields_by_state` entry.
    #[must_use]
    pub fn required_fields(&self, status: &str) -> Vec<&str> {
        let from_state = self
            .states
            .iter()
            .filter(|s| s.id == status)
            .flat_map(|s| s.required_fields.iter());
        let from_map = self
            .required_fields_by_state
            .get(status)
            .into_iter()
            .flatten();
        let mut fields: Vec<&str> = from_state.chain(from_map).map(String::as_str).collect();
        fields.sort_unstable();
        fields.dedup();
        fields
    }

    /// Transitions leaving `status`
    #[must_use]
    pub fn transitions_from<'a>(&'a self, status: &'a str) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions.iter().filter(move |t| t.from == status)
    }
}

impl Manifest {
    /// Parse manifest JSON
    ///
    /// # Errors
    /// Returns [`ModelError::Malformed`] if the value does not match the schema.
    pub fn from_value(value: Value) -> Result<Self, ModelError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Look up a page
    #[must_use]
    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    /// Look up a view
    #[must_use]
    pub fn view(&self, id: &str) -> Option<&View> {
        self.views.iter().find(|v| v.id == id)
    }

    /// Look up an entity by canonical id
    #[must_use]
    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == *id)
    }

    /// Look up an entity by any spelling of its id
    #[must_use]
    pub fn entity_by_name(&self, raw: &str) -> Option<&Entity> {
        let id = EntityId::parse(raw).ok()?;
        self.entity(&id)
    }

    /// Look up an action in the action table
    #[must_use]
    pub fn action(&self, id: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.id.as_deref() == Some(id))
    }

    /// Workflow governing an entity
    #[must_use]
    pub fn workflow_for(&self, entity: &EntityId) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.entity == *entity)
    }

    /// Entity shown by a view
    #[must_use]
    pub fn view_entity(&self, view_id: &str) -> Option<&EntityId> {
        self.view(view_id)?.entity.as_ref()
    }

    /// Whether a target resolves to a declared page or view
    #[must_use]
    pub fn contains_target(&self, target: &Target) -> bool {
        match target.kind {
            TargetKind::Page => self.page(&target.id).is_some(),
            TargetKind::View => self.view(&target.id).is_some(),
        }
    }

    /// First declared page
    #[must_use]
    pub fn first_page_target(&self) -> Option<Target> {
        self.pages.first().map(|p| Target::page(p.id.clone()))
    }

    /// First declared view
    #[must_use]
    pub fn first_view_target(&self) -> Option<Target> {
        self.views.first().map(|v| Target::view(v.id.clone()))
    }

    /// Form views showing an entity, in declaration order
    pub fn form_views_for<'a>(&'a self, entity: &'a EntityId) -> impl Iterator<Item = &'a View> + 'a {
        self.views
            .iter()
            .filter(move |v| v.kind == ViewKind::Form && v.entity.as_ref() == Some(entity))
    }

    /// Where a record of `entity` is edited
    ///
    /// The entity's `default_form_page` wins when it names an existing page;
    /// otherwise the first form view of the entity is used.
    #[must_use]
    pub fn default_form_target(&self, entity: &EntityId) -> Option<Target> {
        let page = self
            .entity(entity)
            .and_then(|e| e.default_form_page.as_deref())
            .map(|raw| {
                raw.parse::<Target>()
                    .unwrap_or_else(|_| Target::page(raw.to_string()))
            })
            .filter(|target| self.contains_target(target));
        page.or_else(|| {
            self.form_views_for(entity)
                .next()
                .map(|v| Target::view(v.id.clone()))
        })
    }

    /// Resolve an action reference against the action table
    ///
    /// Reference overrides take precedence over the referenced action's
    /// fields, except the canonical id which always comes from the table.
    ///
    /// # Errors
    /// - [`ModelError::UnknownAction`] if the referenced id is not declared
    /// - [`ModelError::Malformed`] if the merged action does not parse
    pub fn resolve_action(&self, action: &ActionRef) -> Result<Action, ModelError> {
        match action {
            ActionRef::Inline(action) => Ok(action.clone()),
            ActionRef::Reference {
                action_id,
                overrides,
            } => {
                let base = self
                    .action(action_id)
                    .ok_or_else(|| ModelError::UnknownAction(action_id.clone()))?;
                if overrides.is_empty() {
                    return Ok(base.clone());
                }
                let mut merged = match serde_json::to_value(base)? {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                for (key, value) in overrides {
                    if key != "id" && key != "action_id" {
                        merged.insert(key.clone(), value.clone());
                    }
                }
                merged.insert("id".to_string(), Value::String(action_id.clone()));
                Ok(serde_json::from_value(Value::Object(merged))?)
            }
        }
    }
}
