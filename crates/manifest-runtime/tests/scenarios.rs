//! End-to-end scenarios over the `shop` fixture

use manifest_model::{ActionRef, Target};
use manifest_runtime::{
    ActionScope, AutosaveEvent, ChangeEvent, ErrorCode, NoticeLevel, PreviewMode, RuntimeConfig,
    PREVIEW_ID_PREFIX,
};
use manifest_test_utils::{
    product, record, shop_manifest, FakeActionApi, FakeManifestSource, FakeRecordApi, Fixture,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn products() -> FakeRecordApi {
    FakeRecordApi::new().with_records(
        &product(),
        vec![
            record(json!({"id": "p1", "name": "Desk", "price": 120, "sku": "D-1"})),
            record(json!({"id": "p2", "name": "Chair", "price": 45, "sku": "C-7"})),
        ],
    )
}

#[tokio::test]
async fn missing_home_page_falls_back_to_first_view() {
    let fx = Fixture::shop(RuntimeConfig::default(), products(), FakeActionApi::new());

    let session = fx.interpreter.enter("shop", None, None).await.unwrap();
    assert_eq!(session.resolution.requested, Target::page("home"));
    assert_eq!(session.resolution.target, Target::view("product.list"));
    assert!(session.resolution.fell_back);

    let mut list = fx.interpreter.list_surface("product.list").unwrap();
    assert!(fx.interpreter.load_list(&mut list).await.is_ok());
    assert_eq!(list.rows().len(), 2);
    assert!(list.rows().iter().all(|row| !row.contains_key("sku")));
}

#[tokio::test]
async fn create_action_opens_entity_form_view() {
    let actions = FakeActionApi::new().respond(Ok(manifest_runtime::ActionResult {
        kind: Some("create_record".into()),
        record_id: Some("p9".into()),
        updated: true,
        ..Default::default()
    }));
    let fx = Fixture::shop(RuntimeConfig::default(), products(), actions);
    let session = fx.interpreter.enter("shop", None, None).await.unwrap();

    let view = session
        .compiled
        .manifest()
        .view("product.list")
        .unwrap()
        .clone();
    let decorated = fx
        .interpreter
        .decorated_actions(&view.header.actions, &Default::default())
        .unwrap();
    assert_eq!(decorated[0].label, "New product");

    let executor = fx.interpreter.executor().unwrap();
    let entity = product();
    let result = executor
        .run(
            &ActionRef::to_id("new_product"),
            ActionScope::new("shop").with_entity(&entity),
        )
        .await
        .unwrap();

    assert_eq!(result.record_id.as_deref(), Some("p9"));
    assert_eq!(fx.actions.requests()[0].action_id, "new_product");
    assert_eq!(
        fx.presenter.last_route().unwrap().to_path("record"),
        "/apps/shop/view/product.form?record=p9"
    );
}

#[tokio::test(start_paused = true)]
async fn autosave_fires_once_after_last_edit() {
    let fx = Fixture::shop(RuntimeConfig::default(), products(), FakeActionApi::new());
    fx.interpreter
        .enter("shop", Some("view:product.form"), Some("p1".into()))
        .await
        .unwrap();

    let mut form = fx
        .interpreter
        .form_surface("product.form", Some("p1".into()))
        .unwrap();
    assert!(fx.interpreter.load_form(&mut form, None).await.is_ok());
    let (autosave, mut events) = fx.interpreter.autosave_for(&form).unwrap();

    form.set_field("name", json!("Desk v2"));
    autosave.draft_changed(form.draft().clone());
    tokio::time::sleep(Duration::from_millis(50)).await;

    form.set_field("name", json!("Desk v3"));
    let second_edit = Instant::now();
    autosave.draft_changed(form.draft().clone());

    tokio::time::sleep(Duration::from_millis(99)).await;
    assert!(fx.records.saves().is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let saves = fx.records.saves();
    assert_eq!(saves.len(), 1);
    let delay = saves[0].0 - second_edit;
    assert!(delay >= Duration::from_millis(100) && delay < Duration::from_millis(105), "{delay:?}");
    assert_eq!(saves[0].1["name"], json!("Desk v3"));

    assert_eq!(events.recv().await, Some(AutosaveEvent::Saving));
    assert!(matches!(events.recv().await, Some(AutosaveEvent::Saved(_))));
}

#[tokio::test(start_paused = true)]
async fn autosave_ignores_edit_back_to_loaded_value() {
    let fx = Fixture::shop(RuntimeConfig::default(), products(), FakeActionApi::new());
    fx.interpreter
        .enter("shop", Some("view:product.form"), Some("p1".into()))
        .await
        .unwrap();
    let mut form = fx
        .interpreter
        .form_surface("product.form", Some("p1".into()))
        .unwrap();
    fx.interpreter.load_form(&mut form, None).await;
    let (autosave, _events) = fx.interpreter.autosave_for(&form).unwrap();

    form.set_field("name", json!("Desk!"));
    autosave.draft_changed(form.draft().clone());
    tokio::time::sleep(Duration::from_millis(30)).await;
    form.set_field("name", json!("Desk"));
    autosave.draft_changed(form.draft().clone());
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(!form.is_dirty());
    assert!(fx.records.saves().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_autosave_reverts_draft_and_notifies() {
    let records = products().rejecting_saves();
    let fx = Fixture::shop(RuntimeConfig::default(), records, FakeActionApi::new());
    fx.interpreter
        .enter("shop", Some("view:product.form"), Some("p1".into()))
        .await
        .unwrap();
    let mut form = fx
        .interpreter
        .form_surface("product.form", Some("p1".into()))
        .unwrap();
    fx.interpreter.load_form(&mut form, None).await;
    let (autosave, mut events) = fx.interpreter.autosave_for(&form).unwrap();

    form.set_field("name", json!("Desk v2"));
    autosave.draft_changed(form.draft().clone());
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(fx.records.saves().len(), 1);
    while let Ok(event) = events.try_recv() {
        form.apply_autosave(&event);
    }
    assert_eq!(form.draft()["name"], json!("Desk"));
    assert!(!form.is_dirty());
    assert!(fx
        .presenter
        .notices()
        .iter()
        .any(|n| n.level == NoticeLevel::Error));
}

#[tokio::test(start_paused = true)]
async fn later_navigation_wins_over_earlier_response() {
    let source = Arc::new(
        FakeManifestSource::new()
            .with_module("shop", shop_manifest())
            .with_module(
                "crm",
                json!({
                    "entities": [{"id": "contact"}],
                    "views": [{"id": "contact.list", "kind": "list", "entity": "contact"}]
                }),
            )
            .with_delay(Duration::from_millis(200)),
    );
    let config = RuntimeConfig::default().with_bootstrap(false);
    let fx = Fixture::with_source(config, source, products(), FakeActionApi::new());

    let (shop, crm) = tokio::join!(
        fx.interpreter.enter("shop", None, None),
        fx.interpreter.enter("crm", None, None)
    );

    assert_eq!(shop.unwrap_err().code(), ErrorCode::Cancelled);
    assert_eq!(crm.unwrap().module_id, "crm");
    assert_eq!(fx.interpreter.session().unwrap().module_id, "crm");
}

#[tokio::test]
async fn interactive_preview_creates_without_backend() {
    let config = RuntimeConfig::default().with_preview(PreviewMode::Interactive);
    let fx = Fixture::shop(config, FakeRecordApi::new(), FakeActionApi::new());
    fx.interpreter.preview("shop", shop_manifest(), None).unwrap();

    let executor = fx.interpreter.executor().unwrap();
    let entity = product();
    for name in ["Lamp", "Rug"] {
        let mut draft = record(json!({"name": name}));
        let scope = ActionScope::new("shop")
            .with_entity(&entity)
            .with_record(None, &mut draft);
        executor.run(&ActionRef::to_id("new_product"), scope).await.unwrap();
    }

    let route = fx.presenter.last_route().unwrap();
    assert_eq!(route.target, Target::view("product.form"));
    assert!(route.record_id.unwrap().starts_with(PREVIEW_ID_PREFIX));
    assert!(fx.actions.requests().is_empty());

    let mut list = fx.interpreter.list_surface("product.list").unwrap();
    fx.interpreter.load_list(&mut list).await;
    let names: Vec<_> = list.rows().iter().map(|r| r["name"].clone()).collect();
    assert_eq!(names, vec![json!("Rug"), json!("Lamp")]);
    assert_eq!(fx.records.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn read_only_preview_blocks_actions() {
    let config = RuntimeConfig::default().with_preview(PreviewMode::ReadOnly);
    let fx = Fixture::shop(config, FakeRecordApi::new(), FakeActionApi::new());
    fx.interpreter.preview("shop", shop_manifest(), None).unwrap();

    let executor = fx.interpreter.executor().unwrap();
    let result = executor
        .run(&ActionRef::to_id("new_product"), ActionScope::new("shop"))
        .await;

    assert!(result.is_none());
    assert!(fx.presenter.routes().is_empty());
    assert_eq!(fx.presenter.notices().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn change_events_coalesce_into_one_refresh() {
    let fx = Fixture::shop(RuntimeConfig::default(), products(), FakeActionApi::new());
    let coalescer = fx.interpreter.coalescer();
    let mut invalidations = coalescer.subscribe();

    for id in ["p1", "p2", "p1"] {
        coalescer.notify(ChangeEvent {
            entity: product(),
            record_id: Some(id.into()),
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(fx.interpreter.refresh().current(), 1);
    let invalidation = invalidations.recv().await.unwrap();
    assert!(invalidation.entities.contains(&product()));
    assert_eq!(invalidation.generation, 1);
}
