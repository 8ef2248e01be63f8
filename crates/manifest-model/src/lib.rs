//! Manifest Model
//!
//! Typed representation of a declarative application manifest.
//!
//! # Core Concepts
//!
//! - [`Manifest`]: entities, views, pages, actions and workflows of a module
//! - [`CompiledManifest`]: a manifest owned together with its lookup index
//! - [`EntityId`]: canonical entity identifier (`entity.<name>`)
//! - [`Target`] / [`Route`]: `page:<id>` / `view:<id>` references and the
//!   `/apps/{module}/...` routes built from them
//! - [`Condition`]: `required_when` / `visible_when` / `enabled_when` rules
//!
//! # Example
//!
//! ```rust
//! use manifest_model::{build_route, Target, DEFAULT_RECORD_PARAM};
//!
//! let route = build_route("shop", "view:product.form").unwrap().with_record("p1");
//! assert_eq!(route.target, Target::view("product.form"));
//! assert_eq!(
//!     route.to_path(DEFAULT_RECORD_PARAM),
//!     "/apps/shop/view/product.form?record=p1"
//! );
//! ```

#![warn(unreachable_pub)]

mod compiled;
mod condition;
mod error;
mod hash;
mod ids;
mod manifest;
mod record;
mod target;

pub use compiled::{CompiledIndex, CompiledManifest};
pub use condition::{lookup, Condition, Expr};
pub use error::{HashError, ModelError, TargetError};
pub use hash::ManifestHash;
pub use ids::{EntityId, ENTITY_PREFIX, ENTITY_REF_ALIASES};
pub use manifest::{
    Action, ActionKind, ActionRef, AppConfig, Confirm, ConfirmPrompt, ContentBlock, Entity, Field,
    FieldRef, Header, Manifest, Page, Section, Transition, View, ViewKind, Workflow, WorkflowState,
};
pub use record::{is_missing, merge_patch, record_id, PatchUndo, Record, ID_FIELD};
pub use target::{build_route, Route, Target, TargetKind, DEFAULT_RECORD_PARAM};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
