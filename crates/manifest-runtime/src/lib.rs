//! Manifest Runtime - interpreter for declarative application manifests
//!
//! Turns a compiled manifest into live surfaces:
//! - Resolves `page:` / `view:` targets with fallback recovery
//! - Drives list and form surfaces through `idle → loading → ok | error`
//! - Runs actions against the remote pipeline or the preview sandbox
//! - Computes required-field errors and workflow transitions
//! - Debounces autosave with at most one save in flight
//!
//! # Example
//!
//! ```rust,ignore
//! use manifest_runtime::{Dialogs, Interpreter, RuntimeConfig, Services};
//!
//! # async fn example(services: Services, presenter: std::sync::Arc<dyn manifest_runtime::Presenter>) -> manifest_runtime::RuntimeResult<()> {
//! let (dialogs, _requests) = Dialogs::channel(8);
//! let interpreter = Interpreter::new(RuntimeConfig::default(), services, presenter, dialogs);
//!
//! let session = interpreter.enter("shop", None, None).await?;
//! let mut list = interpreter.list_surface(&session.resolution.target.id)?;
//! interpreter.load_list(&mut list).await;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod actions;
pub mod autosave;
pub mod config;
pub mod dialog;
pub mod error;
pub mod flash;
pub mod interpreter;
pub mod invalidation;
pub mod resolver;
pub mod sandbox;
pub mod transport;
pub mod validation;
pub mod view;

pub use actions::{decorate_actions, ActionExecutor, ActionScope, DecoratedAction};
pub use autosave::{
    autosave_applies, AutosaveCoordinator, AutosaveEvent, AutosaveHandle, DraftSaver, RecordSaver,
};
pub use config::{PreviewMode, RuntimeConfig};
pub use dialog::{DialogRequest, DialogResponder, Dialogs};
pub use error::{ApiError, ErrorCode, RuntimeError, RuntimeResult};
pub use flash::ErrorFlash;
pub use interpreter::{Interpreter, Session};
pub use invalidation::{ChangeEvent, Invalidation, InvalidationCoalescer, RefreshSignal};
pub use resolver::{resolve_app_target, resolve_in_manifest, Resolution};
pub use sandbox::{PreviewSandbox, PREVIEW_ID_PREFIX};
pub use transport::{
    ActionApi, ActionContext, ActionRequest, ActionResult, ModuleSummary, Notice, NoticeLevel,
    Presenter, RecordApi, RegistryApi, Services,
};
pub use validation::{
    available_transitions, compute_validation_errors, FormValidator, ValidationErrors,
    REQUIRED_MESSAGE,
};
pub use view::{FormSources, FormSurface, ListSources, ListSurface, LoadSeq, LoadState, RecordContext};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
