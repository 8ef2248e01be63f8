//! Action executor
//!
//! Runs manifest actions: resolves references, asks for confirmation, then
//! either serves the action from the preview sandbox or submits it to the
//! remote action pipeline and applies the structured result (navigation,
//! reload, draft patch).
//!
//! `run` returns `None` for "no-op": unresolvable, id-less or disabled
//! actions, declined confirmations, read-only preview and failures. Failures are
//! reported to the presenter and never leave an optimistic patch applied.

use crate::config::PreviewMode;
use crate::dialog::Dialogs;
use crate::invalidation::RefreshSignal;
use crate::sandbox::PreviewSandbox;
use crate::transport::{ActionApi, ActionContext, ActionRequest, ActionResult, Notice, Presenter};
use manifest_model::{
    build_route, merge_patch, record_id, Action, ActionKind, ActionRef, CompiledManifest, Confirm,
    EntityId, Manifest, Record, Route, Target, ID_FIELD,
};
use std::sync::Arc;

/// Ambient context of an action invocation
#[derive(Debug)]
pub struct ActionScope<'a> {
    /// Module the action runs in
    pub module_id: &'a str,
    /// Entity of the surface the action was triggered from
    pub entity: Option<&'a EntityId>,
    /// Active record
    pub record_id: Option<&'a str>,
    /// Live draft of the active record
    pub draft: Option<&'a mut Record>,
    /// Ids checked in the list
    pub selection: &'a [String],
}

impl<'a> ActionScope<'a> {
    /// Scope with no record, draft or selection
    #[must_use]
    pub fn new(module_id: &'a str) -> Self {
        Self {
            module_id,
            entity: None,
            record_id: None,
            draft: None,
            selection: &[],
        }
    }

    /// With surface entity
    #[must_use]
    pub fn with_entity(mut self, entity: &'a EntityId) -> Self {
        self.entity = Some(entity);
        self
    }

    /// With active record and its draft
    #[must_use]
    pub fn with_record(mut self, record_id: Option<&'a str>, draft: &'a mut Record) -> Self {
        self.record_id = record_id;
        self.draft = Some(draft);
        self
    }

    /// With list selection
    #[must_use]
    pub fn with_selection(mut self, selection: &'a [String]) -> Self {
        self.selection = selection;
        self
    }
}

/// Action as exposed to the rendering layer
#[derive(Debug, Clone, PartialEq)]
pub struct DecoratedAction {
    /// Resolved action
    pub action: Action,
    /// Button label (falls back to the id)
    pub label: String,
    /// Whether the action is shown
    pub visible: bool,
    /// Whether the action is clickable
    pub enabled: bool,
}

/// Resolve header actions and compute label/visible/enabled for `draft`
///
/// Unresolvable references are skipped.
#[must_use]
pub fn decorate_actions(manifest: &Manifest, refs: &[ActionRef], draft: &Record) -> Vec<DecoratedAction> {
    refs.iter()
        .filter_map(|r| match manifest.resolve_action(r) {
            Ok(action) => Some(action),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unresolvable action");
                None
            }
        })
        .map(|action| {
            let label = action
                .label
                .clone()
                .or_else(|| action.id.clone())
                .unwrap_or_else(|| action.kind.to_string());
            let visible = action
                .visible_when
                .as_ref()
                .map_or(true, |c| c.evaluate_record(draft));
            let enabled = action
                .enabled_when
                .as_ref()
                .map_or(true, |c| c.evaluate_record(draft));
            DecoratedAction {
                action,
                label,
                visible,
                enabled,
            }
        })
        .collect()
}

/// Executes actions for one module
pub struct ActionExecutor {
    compiled: Arc<CompiledManifest>,
    preview: PreviewMode,
    sandbox: Arc<PreviewSandbox>,
    actions: Arc<dyn ActionApi>,
    dialogs: Dialogs,
    presenter: Arc<dyn Presenter>,
    refresh: RefreshSignal,
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("manifest", &self.compiled.hash())
            .field("preview", &self.preview)
            .finish_non_exhaustive()
    }
}

impl ActionExecutor {
    /// Create executor
    #[must_use]
    pub fn new(
        compiled: Arc<CompiledManifest>,
        actions: Arc<dyn ActionApi>,
        dialogs: Dialogs,
        presenter: Arc<dyn Presenter>,
        refresh: RefreshSignal,
    ) -> Self {
        Self {
            compiled,
            preview: PreviewMode::Off,
            sandbox: Arc::new(PreviewSandbox::new()),
            actions,
            dialogs,
            presenter,
            refresh,
        }
    }

    /// With preview mode and the sandbox serving it
    #[must_use]
    pub fn with_preview(mut self, preview: PreviewMode, sandbox: Arc<PreviewSandbox>) -> Self {
        self.preview = preview;
        self.sandbox = sandbox;
        self
    }

    /// Run an action
    pub async fn run(&self, action: &ActionRef, scope: ActionScope<'_>) -> Option<ActionResult> {
        let action = match self.compiled.manifest().resolve_action(action) {
            Ok(action) => action,
            Err(err) => {
                self.fail(format!("Action unavailable: {err}"));
                return None;
            }
        };
        let Some(action_id) = action.id.clone().filter(|id| !id.trim().is_empty()) else {
            self.fail("Action is missing an id");
            return None;
        };

        if let Some(condition) = &action.enabled_when {
            let empty = Record::new();
            let draft = scope.draft.as_deref().unwrap_or(&empty);
            if !condition.evaluate_record(draft) {
                tracing::debug!(action_id = %action_id, "action disabled");
                return None;
            }
        }

        if self.preview == PreviewMode::ReadOnly {
            self.presenter
                .notify(Notice::info("Actions are disabled in read-only preview"));
            return None;
        }

        if let Some(prompt) = action.confirm.as_ref().and_then(Confirm::prompt) {
            if !self.dialogs.confirm(prompt).await {
                tracing::debug!(action_id = %action_id, "confirmation declined");
                return None;
            }
        }

        match action.kind {
            ActionKind::Refresh => {
                self.refresh.bump();
                Some(ActionResult::of_kind(ActionKind::Refresh.as_str()))
            }
            ActionKind::Navigate | ActionKind::OpenForm if action.target.is_some() => {
                self.run_client_navigation(&action, &scope)
            }
            _ if self.preview == PreviewMode::Interactive => self.run_preview(&action, scope),
            _ => self.run_remote(&action, action_id, scope).await,
        }
    }

    fn run_client_navigation(&self, action: &Action, scope: &ActionScope<'_>) -> Option<ActionResult> {
        let raw = action.target.as_deref()?;
        let route = if action.kind == ActionKind::OpenForm {
            self.open_form_route(scope.module_id, raw, scope.record_id)
        } else {
            self.navigate_route(scope.module_id, raw, scope.record_id)
        }?;
        let result = ActionResult {
            kind: Some(action.kind.to_string()),
            target: Some(route.target.to_string()),
            record_id: route.record_id.clone(),
            ..ActionResult::default()
        };
        self.presenter.navigate(route);
        Some(result)
    }

    fn run_preview(&self, action: &Action, scope: ActionScope<'_>) -> Option<ActionResult> {
        let ActionScope {
            module_id,
            entity,
            record_id: active_id,
            draft,
            selection,
        } = scope;
        let Some(entity) = action.entity.clone().or_else(|| entity.cloned()) else {
            self.fail(format!("Action '{}' has no entity", action.kind));
            return None;
        };
        let empty = Record::new();
        let patch = action.patch.as_ref().unwrap_or(&empty);

        match action.kind {
            ActionKind::CreateRecord => {
                let mut record = draft.as_deref().cloned().unwrap_or_default();
                let _ = merge_patch(&mut record, patch);
                record.remove(ID_FIELD);
                let stored = self.sandbox.upsert(&entity, None, record);
                let new_id = record_id(&stored);
                tracing::info!(entity = %entity, record_id = new_id.as_deref(), "preview create");
                self.presenter.notify(Notice::success("Record created"));
                self.refresh.bump();
                if let Some(route) = new_id
                    .as_deref()
                    .and_then(|id| self.form_route(module_id, &entity, id))
                {
                    self.presenter.navigate(route);
                }
                Some(ActionResult {
                    kind: Some(action.kind.to_string()),
                    record_id: new_id,
                    updated: true,
                    ..ActionResult::default()
                })
            }
            ActionKind::UpdateRecord => {
                let Some(id) = active_id else {
                    self.fail("No record to update");
                    return None;
                };
                let record = match draft {
                    Some(draft) => {
                        let _ = merge_patch(draft, patch);
                        draft.clone()
                    }
                    None => {
                        let mut stored = self.sandbox.get(&entity, id).unwrap_or_default();
                        let _ = merge_patch(&mut stored, patch);
                        stored
                    }
                };
                self.sandbox.upsert(&entity, Some(id), record);
                self.presenter.notify(Notice::success("Record updated"));
                self.refresh.bump();
                Some(ActionResult {
                    kind: Some(action.kind.to_string()),
                    record_id: Some(id.to_string()),
                    patch: action.patch.clone(),
                    updated: true,
                    ..ActionResult::default()
                })
            }
            ActionKind::BulkUpdate => {
                let mut updated = 0usize;
                for id in selection {
                    if let Some(mut record) = self.sandbox.get(&entity, id) {
                        let _ = merge_patch(&mut record, patch);
                        self.sandbox.upsert(&entity, Some(id), record);
                        updated += 1;
                    }
                }
                self.presenter
                    .notify(Notice::success(format!("{updated} records updated")));
                self.refresh.bump();
                Some(ActionResult {
                    kind: Some(action.kind.to_string()),
                    updated: true,
                    ..ActionResult::default()
                })
            }
            _ => {
                self.presenter.notify(Notice::info(format!(
                    "'{}' is not available in preview",
                    action.kind
                )));
                None
            }
        }
    }

    async fn run_remote(
        &self,
        action: &Action,
        action_id: String,
        scope: ActionScope<'_>,
    ) -> Option<ActionResult> {
        let ActionScope {
            module_id,
            entity,
            record_id: active_id,
            mut draft,
            selection,
        } = scope;

        let undo = match (&action.kind, action.patch.as_ref(), draft.as_deref_mut()) {
            (ActionKind::UpdateRecord, Some(patch), Some(draft)) => Some(merge_patch(draft, patch)),
            _ => None,
        };

        let request = ActionRequest {
            module_id: module_id.to_string(),
            action_id,
            context: ActionContext {
                record_id: active_id.map(str::to_string),
                record_draft: draft.as_deref().cloned(),
                selected_ids: selection.to_vec(),
            },
        };
        tracing::info!(
            module_id,
            action_id = %request.action_id,
            kind = %action.kind,
            "running action"
        );

        match self.actions.run(&request).await {
            Ok(result) => {
                self.apply_result(action, &result, module_id, entity, draft);
                Some(result)
            }
            Err(err) => {
                if let (Some(undo), Some(draft)) = (undo, draft) {
                    undo.rollback(draft);
                }
                self.fail(format!("Action failed: {err}"));
                None
            }
        }
    }

    fn apply_result(
        &self,
        action: &Action,
        result: &ActionResult,
        module_id: &str,
        entity: Option<&EntityId>,
        draft: Option<&mut Record>,
    ) {
        if result.is_kind("navigate") {
            if let Some(raw) = result.target.as_deref() {
                if let Some(route) = self.navigate_route(module_id, raw, result.record_id.as_deref()) {
                    self.presenter.navigate(route);
                }
                return;
            }
        }
        if result.is_kind("open_form") {
            if let Some(raw) = result.target.as_deref().or(action.target.as_deref()) {
                if let Some(route) = self.open_form_route(module_id, raw, result.record_id.as_deref()) {
                    self.presenter.navigate(route);
                }
                return;
            }
        }

        let mut refresh = result.updated;
        if let Some(new_id) = result.record_id.as_deref() {
            if matches!(action.kind, ActionKind::UpdateRecord | ActionKind::BulkUpdate) {
                refresh = true;
            } else if is_create_like(&action.kind) {
                let entity = action.entity.as_ref().or(entity);
                match entity.and_then(|e| self.form_route(module_id, e, new_id)) {
                    Some(route) => {
                        self.presenter.navigate(route);
                        return;
                    }
                    None => refresh = true,
                }
            }
        }

        if action.kind == ActionKind::UpdateRecord {
            if let (Some(patch), Some(draft)) = (result.patch.as_ref(), draft) {
                let _ = merge_patch(draft, patch);
            }
        }
        if refresh {
            let generation = self.refresh.bump();
            tracing::debug!(generation, "refresh requested by action result");
        }
    }

    fn navigate_route(&self, module_id: &str, raw: &str, record: Option<&str>) -> Option<Route> {
        match build_route(module_id, raw) {
            Some(route) => Some(with_record(route, record)),
            None => {
                self.fail(format!("Invalid navigation target '{raw}'"));
                None
            }
        }
    }

    /// Route for opening a form view, preferring the entity's default form page
    fn open_form_route(&self, module_id: &str, raw: &str, record: Option<&str>) -> Option<Route> {
        if let Ok(target) = raw.parse::<Target>() {
            if target.is_page() {
                return Some(with_record(Route::new(module_id, target), record));
            }
        }
        let view_id = raw.strip_prefix("view:").unwrap_or(raw);
        let manifest = self.compiled.manifest();
        let target = manifest
            .view_entity(view_id)
            .and_then(|entity| manifest.default_form_target(entity))
            .filter(Target::is_page)
            .unwrap_or_else(|| Target::view(view_id));
        if !manifest.contains_target(&target) {
            self.fail(format!("Form '{view_id}' does not exist"));
            return None;
        }
        Some(with_record(Route::new(module_id, target), record))
    }

    fn form_route(&self, module_id: &str, entity: &EntityId, record: &str) -> Option<Route> {
        let target = self.compiled.manifest().default_form_target(entity)?;
        Some(Route::new(module_id, target).with_record(record))
    }

    fn fail(&self, message: impl Into<String>) {
        let notice = Notice::error(message);
        tracing::warn!(message = %notice.message, "action error");
        self.presenter.notify(notice);
    }
}

fn with_record(route: Route, record: Option<&str>) -> Route {
    match record {
        Some(id) => route.with_record(id),
        None => route,
    }
}

fn is_create_like(kind: &ActionKind) -> bool {
    match kind {
        ActionKind::CreateRecord => true,
        ActionKind::Other(name) => name.starts_with("create"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::DialogRequest;
    use crate::error::ApiError;
    use crate::transport::{MockActionApi, NoticeLevel};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        notices: Mutex<Vec<Notice>>,
        routes: Mutex<Vec<Route>>,
    }

    impl Presenter for Recorder {
        fn notify(&self, notice: Notice) {
            self.notices.lock().push(notice);
        }

        fn navigate(&self, route: Route) {
            self.routes.lock().push(route);
        }
    }

    impl Recorder {
        fn errors(&self) -> usize {
            self.notices
                .lock()
                .iter()
                .filter(|n| n.level == NoticeLevel::Error)
                .count()
        }
    }

    fn compiled() -> Arc<CompiledManifest> {
        let manifest = Manifest::from_value(json!({
            "entities": [
                {"id": "product", "fields": [{"id": "name", "required": true}]},
                {"id": "order", "default_form_page": "order_edit"}
            ],
            "views": [
                {"id": "product.list", "kind": "list", "entity": "product"},
                {"id": "product.form", "kind": "form", "entity": "product"},
                {"id": "order.form", "kind": "form", "entity": "order"}
            ],
            "pages": [{"id": "order_edit", "content": [{"type": "view", "view": "order.form"}]}],
            "actions": [
                {"id": "new_product", "kind": "create_record", "entity": "product"},
                {"id": "archive", "kind": "update_record", "entity": "product",
                 "patch": {"archived": true}, "confirm": "Archive?"},
                {"id": "publish", "kind": "update_record", "entity": "product", "patch": {"status": "published"}},
                {"id": "go_list", "kind": "navigate", "target": "view:product.list"},
                {"id": "edit_order", "kind": "open_form", "target": "order.form"},
                {"id": "reload", "kind": "refresh"},
                {"id": "send", "kind": "send_invoice"}
            ]
        }))
        .unwrap();
        Arc::new(CompiledManifest::compile(manifest).unwrap())
    }

    fn product() -> EntityId {
        EntityId::parse("product").unwrap()
    }

    struct Harness {
        executor: ActionExecutor,
        presenter: Arc<Recorder>,
        refresh: RefreshSignal,
    }

    fn harness(api: MockActionApi, answer: bool) -> Harness {
        let (dialogs, mut requests) = Dialogs::channel(4);
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                if let DialogRequest::Confirm { mut responder, .. } = request {
                    responder.resolve(answer);
                }
            }
        });
        let presenter = Arc::new(Recorder::default());
        let refresh = RefreshSignal::new();
        let executor = ActionExecutor::new(
            compiled(),
            Arc::new(api),
            dialogs,
            presenter.clone(),
            refresh.clone(),
        );
        Harness {
            executor,
            presenter,
            refresh,
        }
    }

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn unknown_action_reports_error() {
        let h = harness(MockActionApi::new(), true);
        let result = h
            .executor
            .run(&ActionRef::to_id("missing"), ActionScope::new("shop"))
            .await;
        assert!(result.is_none());
        assert_eq!(h.presenter.errors(), 1);
    }

    #[tokio::test]
    async fn action_without_id_is_rejected_for_every_kind() {
        let kinds = [
            (ActionKind::Refresh, None),
            (ActionKind::Navigate, Some("view:product.list")),
            (ActionKind::OpenForm, Some("order.form")),
            (ActionKind::CreateRecord, None),
            (ActionKind::Other("ping".into()), None),
        ];
        for preview in [PreviewMode::Off, PreviewMode::Interactive] {
            for (kind, target) in kinds.clone() {
                let mut api = MockActionApi::new();
                api.expect_run().never();
                let h = harness(api, true);
                let sandbox = Arc::new(PreviewSandbox::new());
                let executor = h.executor.with_preview(preview, Arc::clone(&sandbox));
                let inline = ActionRef::Inline(Action {
                    kind: kind.clone(),
                    entity: Some(product()),
                    target: target.map(str::to_string),
                    ..Action::default()
                });
                let mut draft = record(json!({"name": "Lamp"}));
                let scope = ActionScope::new("shop").with_record(None, &mut draft);

                assert!(executor.run(&inline, scope).await.is_none(), "{kind} ran without id");
                assert_eq!(h.presenter.errors(), 1);
                assert!(h.presenter.routes.lock().is_empty());
                assert_eq!(h.refresh.current(), 0);
                assert!(sandbox.list(&product()).is_empty());
            }
        }
    }

    #[tokio::test]
    async fn declined_confirmation_skips_the_call() {
        let mut api = MockActionApi::new();
        api.expect_run().never();
        let h = harness(api, false);
        let mut draft = record(json!({"name": "Desk"}));
        let entity = product();
        let scope = ActionScope::new("shop")
            .with_entity(&entity)
            .with_record(Some("p1"), &mut draft);
        assert!(h.executor.run(&ActionRef::to_id("archive"), scope).await.is_none());
        assert!(!draft.contains_key("archived"));
    }

    #[tokio::test]
    async fn disabled_action_does_not_run() {
        let mut api = MockActionApi::new();
        api.expect_run().never();
        let h = harness(api, true);
        let inline = ActionRef::Inline(Action {
            id: Some("send".into()),
            kind: ActionKind::Other("send_invoice".into()),
            enabled_when: Some(serde_json::from_value(json!({"op": "eq", "field": "status", "value": "ready"})).unwrap()),
            ..Action::default()
        });
        let mut draft = record(json!({"status": "draft"}));
        let scope = ActionScope::new("shop").with_record(Some("i1"), &mut draft);
        assert!(h.executor.run(&inline, scope).await.is_none());
    }

    #[tokio::test]
    async fn read_only_preview_is_a_no_op() {
        let mut api = MockActionApi::new();
        api.expect_run().never();
        let h = harness(api, true);
        let executor = h
            .executor
            .with_preview(PreviewMode::ReadOnly, Arc::new(PreviewSandbox::new()));
        let result = executor
            .run(&ActionRef::to_id("new_product"), ActionScope::new("shop"))
            .await;
        assert!(result.is_none());
        assert_eq!(h.presenter.notices.lock()[0].level, NoticeLevel::Info);
        assert!(h.presenter.routes.lock().is_empty());
    }

    #[tokio::test]
    async fn read_only_preview_skips_confirmation() {
        let (dialogs, mut requests) = Dialogs::channel(4);
        let presenter = Arc::new(Recorder::default());
        let executor = ActionExecutor::new(
            compiled(),
            Arc::new(MockActionApi::new()),
            dialogs,
            presenter.clone(),
            RefreshSignal::new(),
        )
        .with_preview(PreviewMode::ReadOnly, Arc::new(PreviewSandbox::new()));
        let mut draft = record(json!({"id": "p1"}));
        let scope = ActionScope::new("shop").with_record(Some("p1"), &mut draft);

        assert!(executor.run(&ActionRef::to_id("archive"), scope).await.is_none());
        assert!(requests.try_recv().is_err());
        assert_eq!(presenter.notices.lock()[0].level, NoticeLevel::Info);
    }

    #[tokio::test]
    async fn interactive_preview_creates_in_sandbox_and_opens_form() {
        let mut api = MockActionApi::new();
        api.expect_run().never();
        let h = harness(api, true);
        let sandbox = Arc::new(PreviewSandbox::new());
        let executor = h
            .executor
            .with_preview(PreviewMode::Interactive, Arc::clone(&sandbox));
        let mut draft = record(json!({"id": "ignored", "name": "Lamp"}));
        let entity = product();
        let scope = ActionScope::new("shop")
            .with_entity(&entity)
            .with_record(None, &mut draft);

        let result = executor
            .run(&ActionRef::to_id("new_product"), scope)
            .await
            .unwrap();

        let new_id = result.record_id.unwrap();
        assert!(new_id.starts_with(crate::sandbox::PREVIEW_ID_PREFIX));
        assert_eq!(sandbox.list(&entity).len(), 1);
        assert_eq!(sandbox.get(&entity, &new_id).unwrap()["name"], json!("Lamp"));
        let routes = h.presenter.routes.lock();
        assert_eq!(routes[0].target, Target::view("product.form"));
        assert_eq!(routes[0].record_id.as_deref(), Some(new_id.as_str()));
        assert_eq!(h.refresh.current(), 1);
    }

    #[tokio::test]
    async fn interactive_preview_updates_sandbox_record() {
        let h = harness(MockActionApi::new(), true);
        let sandbox = Arc::new(PreviewSandbox::new());
        let entity = product();
        sandbox.seed(&entity, vec![record(json!({"id": "p1", "name": "Desk"}))]);
        let executor = h
            .executor
            .with_preview(PreviewMode::Interactive, Arc::clone(&sandbox));
        let mut draft = record(json!({"id": "p1", "name": "Desk"}));
        let scope = ActionScope::new("shop")
            .with_entity(&entity)
            .with_record(Some("p1"), &mut draft);

        executor.run(&ActionRef::to_id("publish"), scope).await.unwrap();

        assert_eq!(draft["status"], json!("published"));
        assert_eq!(sandbox.get(&entity, "p1").unwrap()["status"], json!("published"));
    }

    #[tokio::test]
    async fn navigate_is_handled_locally() {
        let mut api = MockActionApi::new();
        api.expect_run().never();
        let h = harness(api, true);
        let result = h
            .executor
            .run(&ActionRef::to_id("go_list"), ActionScope::new("shop"))
            .await
            .unwrap();
        assert_eq!(result.target.as_deref(), Some("view:product.list"));
        assert_eq!(
            h.presenter.routes.lock()[0].to_path("record"),
            "/apps/shop/view/product.list"
        );
    }

    #[tokio::test]
    async fn open_form_prefers_entity_page() {
        let h = harness(MockActionApi::new(), true);
        let mut draft = Record::new();
        let scope = ActionScope::new("shop").with_record(Some("o7"), &mut draft);
        h.executor.run(&ActionRef::to_id("edit_order"), scope).await.unwrap();
        let routes = h.presenter.routes.lock();
        assert_eq!(routes[0].target, Target::page("order_edit"));
        assert_eq!(routes[0].record_id.as_deref(), Some("o7"));
    }

    #[tokio::test]
    async fn refresh_bumps_signal() {
        let h = harness(MockActionApi::new(), true);
        h.executor
            .run(&ActionRef::to_id("reload"), ActionScope::new("shop"))
            .await
            .unwrap();
        assert_eq!(h.refresh.current(), 1);
    }

    #[tokio::test]
    async fn remote_navigate_result_routes() {
        let mut api = MockActionApi::new();
        api.expect_run()
            .withf(|req| req.action_id == "send" && req.module_id == "shop")
            .returning(|_| {
                Ok(ActionResult {
                    kind: Some("navigate".into()),
                    target: Some("view:product.list".into()),
                    ..ActionResult::default()
                })
            });
        let h = harness(api, true);
        h.executor
            .run(&ActionRef::to_id("send"), ActionScope::new("shop"))
            .await
            .unwrap();
        assert_eq!(h.presenter.routes.lock()[0].target, Target::view("product.list"));
        assert_eq!(h.refresh.current(), 0);
    }

    #[tokio::test]
    async fn created_record_opens_default_form() {
        let mut api = MockActionApi::new();
        api.expect_run().returning(|_| {
            Ok(ActionResult {
                kind: Some("create_record".into()),
                record_id: Some("p9".into()),
                updated: true,
                ..ActionResult::default()
            })
        });
        let h = harness(api, true);
        h.executor
            .run(&ActionRef::to_id("new_product"), ActionScope::new("shop"))
            .await
            .unwrap();
        assert_eq!(
            h.presenter.routes.lock()[0].to_path("record"),
            "/apps/shop/view/product.form?record=p9"
        );
        assert_eq!(h.refresh.current(), 0);
    }

    #[tokio::test]
    async fn update_result_reloads_and_merges_patch() {
        let mut api = MockActionApi::new();
        api.expect_run()
            .withf(|req| {
                req.context.record_id.as_deref() == Some("p1")
                    && req
                        .context
                        .record_draft
                        .as_ref()
                        .is_some_and(|d| d["status"] == json!("published"))
            })
            .returning(|_| {
                Ok(ActionResult {
                    record_id: Some("p1".into()),
                    patch: Some(json!({"published_at": "2026-01-01"}).as_object().cloned().unwrap()),
                    ..ActionResult::default()
                })
            });
        let h = harness(api, true);
        let mut draft = record(json!({"id": "p1", "name": "Desk"}));
        let entity = product();
        let scope = ActionScope::new("shop")
            .with_entity(&entity)
            .with_record(Some("p1"), &mut draft);

        h.executor.run(&ActionRef::to_id("publish"), scope).await.unwrap();

        assert_eq!(draft["status"], json!("published"));
        assert_eq!(draft["published_at"], json!("2026-01-01"));
        assert_eq!(h.refresh.current(), 1);
        assert!(h.presenter.routes.lock().is_empty());
    }

    #[tokio::test]
    async fn failed_update_rolls_back_optimistic_patch() {
        let mut api = MockActionApi::new();
        api.expect_run()
            .returning(|_| Err(ApiError::Network("connection reset".into())));
        let h = harness(api, true);
        let mut draft = record(json!({"id": "p1", "status": "draft"}));
        let scope = ActionScope::new("shop").with_record(Some("p1"), &mut draft);

        assert!(h.executor.run(&ActionRef::to_id("publish"), scope).await.is_none());

        assert_eq!(draft, record(json!({"id": "p1", "status": "draft"})));
        assert_eq!(h.presenter.errors(), 1);
        assert_eq!(h.refresh.current(), 0);
    }

    #[test]
    fn decorate_evaluates_conditions() {
        let c = compiled();
        let refs = vec![
            ActionRef::to_id("archive"),
            ActionRef::to_id("missing"),
            ActionRef::Inline(Action {
                id: Some("ship".into()),
                visible_when: Some(serde_json::from_value(json!({"op": "eq", "field": "status", "value": "paid"})).unwrap()),
                ..Action::default()
            }),
        ];
        let decorated = decorate_actions(c.manifest(), &refs, &record(json!({"status": "draft"})));
        assert_eq!(decorated.len(), 2);
        assert_eq!(decorated[0].label, "archive");
        assert!(decorated[0].visible && decorated[0].enabled);
        assert!(!decorated[1].visible);
    }
}
