//! Integration tests for the optimistic store against the in-memory repository.
//!
//! Tests run on Tokio's current-thread runtime, so confirmation tasks only make
//! progress when the test awaits. That lets overlapping commands be published
//! before any of them is confirmed.

use std::sync::{Arc, Mutex};

use pagekit_core::{
    DropTarget, Element, ElementId, ElementPatch, ElementRecord, ElementType, Forest,
    InsertionPolicy,
};
use pagekit_sync::{ElementStore, MemoryRepository, Notice, SyncError};

const PROJECT: &str = "project-1";

fn frame(id: &str) -> Element {
    Element::new(ElementType::Frame, PROJECT).with_id(id)
}

fn text(id: &str, content: &str) -> Element {
    Element::new(ElementType::Text, PROJECT)
        .with_id(id)
        .with_content(content)
}

fn record(id: &str, ty: &str, parent: Option<&str>, order: i64) -> ElementRecord {
    ElementRecord {
        id: id.to_string(),
        element_type: ty.to_string(),
        parent_id: parent.map(str::to_string),
        project_id: PROJECT.to_string(),
        order,
        ..ElementRecord::default()
    }
}

fn store(repo: &MemoryRepository, forest: Forest) -> ElementStore {
    ElementStore::with_forest(Arc::new(repo.clone()), forest)
}

fn local_order(store: &ElementStore, id: &str) -> Option<i64> {
    store.current_forest().find_by_id(id).map(|e| e.order)
}

fn remote_order(repo: &MemoryRepository, id: &str) -> Option<i64> {
    repo.record(id).map(|r| r.order)
}

// ===========================================================================
// Rollback
// ===========================================================================

#[tokio::test]
async fn test_rejected_create_restores_previous_forest() {
    let repo = MemoryRepository::new();
    let initial = Forest::from_roots(vec![frame("F1")]).expect("valid");
    let store = store(&repo, initial.clone());
    let mut notices = store.notices();
    repo.reject("T1", "quota exceeded");

    let confirmation = store
        .create(text("T1", "hi"), Some(&ElementId::from("F1")))
        .expect("applied locally");
    assert!(store.current_forest().contains("T1"));

    let err = confirmation.await.unwrap_err();
    assert!(matches!(err, SyncError::RemoteRejected { command: "create", .. }));
    assert_eq!(*store.current_forest(), initial);

    let Notice::RolledBack {
        command,
        target,
        reason,
    } = notices.recv().await.expect("notice");
    assert_eq!(command, "create");
    assert_eq!(target, "T1");
    assert!(reason.contains("quota exceeded"));
}

#[tokio::test]
async fn test_rejected_delete_brings_element_and_children_back() {
    let repo = MemoryRepository::new();
    let initial = Forest::from_roots(vec![frame("F1")
        .with_child(text("T1", "a"))
        .with_child(text("T2", "b"))])
    .expect("valid");
    let store = store(&repo, initial.clone());
    repo.reject("F1", "locked");

    let confirmation = store.delete("F1").expect("applied locally");
    let roots: Vec<String> = store
        .current_forest()
        .roots()
        .iter()
        .map(|e| e.id.to_string())
        .collect();
    assert_eq!(roots, ["T1", "T2"]);

    assert!(confirmation.await.is_err());
    assert_eq!(*store.current_forest(), initial);
}

#[tokio::test]
async fn test_overlapping_failure_keeps_later_success() {
    let repo = MemoryRepository::with_records(vec![record("T1", "Text", None, 0)]);
    let initial = Forest::from_roots(vec![text("T1", "before")]).expect("valid");
    let store = store(&repo, initial);
    repo.reject("T1", "read-only");

    let first = store
        .update("T1", ElementPatch::new().content("after"))
        .expect("applied locally");
    let second = store.create(text("T2", "new"), None).expect("applied locally");

    let (first, second) = futures::join!(first, second);
    assert!(first.is_err());
    second.expect("create confirmed");

    let forest = store.current_forest();
    assert_eq!(
        forest.find_by_id("T1").map(|e| e.content.as_str()),
        Some("before")
    );
    assert!(forest.contains("T2"));
    assert!(repo.record("T2").is_some());
    forest.validate().expect("consistent");
}

#[tokio::test]
async fn test_failed_update_of_later_deleted_element() {
    let repo = MemoryRepository::with_records(vec![record("T1", "Text", None, 0)]);
    let store = store(
        &repo,
        Forest::from_roots(vec![text("T1", "before")]).expect("valid"),
    );
    repo.reject_next("conflict");

    let update = store
        .update("T1", ElementPatch::new().content("after"))
        .expect("applied locally");
    let delete = store.delete("T1").expect("applied locally");

    assert!(update.await.is_err());
    delete.await.expect("delete confirmed");

    assert!(store.current_forest().is_empty());
    assert!(repo.record("T1").is_none());
}

#[tokio::test]
async fn test_failed_update_keeps_later_write_to_same_field() {
    let repo = MemoryRepository::with_records(vec![record("T1", "Text", None, 0)]);
    let store = store(
        &repo,
        Forest::from_roots(vec![text("T1", "before")]).expect("valid"),
    );
    repo.reject_next("conflict");

    let first = store
        .update("T1", ElementPatch::new().content("A"))
        .expect("applied locally");
    let second = store
        .update("T1", ElementPatch::new().content("B"))
        .expect("applied locally");

    let (first, second) = futures::join!(first, second);
    assert!(first.is_err());
    second.expect("second update confirmed");

    let local = store
        .current_forest()
        .find_by_id("T1")
        .map(|e| e.content.clone());
    assert_eq!(local.as_deref(), Some("B"));
    assert_eq!(repo.record("T1").map(|r| r.content).as_deref(), Some("B"));
}

#[tokio::test]
async fn test_failed_updates_fall_back_to_last_confirmed_value() {
    let repo = MemoryRepository::with_records(vec![record("T1", "Text", None, 0)]);
    let store = store(
        &repo,
        Forest::from_roots(vec![text("T1", "before")]).expect("valid"),
    );
    repo.reject_call(1, "conflict");
    repo.reject_call(2, "conflict");

    let confirmations: Vec<_> = ["s1", "s2", "s3"]
        .into_iter()
        .map(|content| {
            store
                .update("T1", ElementPatch::new().content(content))
                .expect("applied locally")
        })
        .collect();
    let outcomes = futures::future::join_all(confirmations).await;
    let confirmed: Vec<bool> = outcomes.iter().map(Result::is_ok).collect();
    assert_eq!(confirmed, [true, false, false]);

    let local = store
        .current_forest()
        .find_by_id("T1")
        .map(|e| e.content.clone());
    assert_eq!(local.as_deref(), Some("s1"));
    assert_eq!(repo.record("T1").map(|r| r.content).as_deref(), Some("s1"));
}

#[tokio::test]
async fn test_failed_swap_keeps_later_swap_of_same_element() {
    let repo = MemoryRepository::with_records(vec![
        record("A", "Text", None, 0),
        record("B", "Text", None, 1),
        record("C", "Text", None, 2),
    ]);
    let store = store(
        &repo,
        Forest::from_roots(vec![
            text("A", "a").with_order(0),
            text("B", "b").with_order(1),
            text("C", "c").with_order(2),
        ])
        .expect("valid"),
    );
    repo.reject_next("conflict");

    let first = store.swap("A", "B").expect("applied locally");
    let second = store.swap("A", "C").expect("applied locally");
    let (first, second) = futures::join!(first, second);
    assert!(first.is_err());
    second.expect("second swap confirmed");

    for (id, expected) in [("A", 2), ("B", 1), ("C", 0)] {
        assert_eq!(local_order(&store, id), Some(expected), "local order of {id}");
        assert_eq!(remote_order(&repo, id), Some(expected), "remote order of {id}");
    }
}

#[tokio::test]
async fn test_child_of_failed_create_is_lifted_to_root() {
    let repo = MemoryRepository::new();
    let store = store(&repo, Forest::from_roots(vec![frame("F1")]).expect("valid"));
    repo.reject("N", "quota exceeded");

    let parent = store.create(frame("N"), None).expect("applied locally");
    let child = store
        .create(text("T", "t"), Some(&ElementId::from("N")))
        .expect("applied locally");
    let (parent, child) = futures::join!(parent, child);
    assert!(parent.is_err());
    child.expect("child confirmed");

    let forest = store.current_forest();
    forest.validate().expect("consistent");
    assert!(!forest.contains("N"));
    let roots: Vec<String> = forest.roots().iter().map(|e| e.id.to_string()).collect();
    assert_eq!(roots, ["F1", "T"]);
    assert!(forest.find_by_id("T").is_some_and(|e| e.parent_id.is_none()));
    assert!(repo.record("T").is_some());
}

// ===========================================================================
// Remote call mapping
// ===========================================================================

#[tokio::test]
async fn test_commands_map_to_repository_calls() {
    let repo = MemoryRepository::new();
    let store = store(&repo, Forest::new());

    store
        .create(frame("F1"), None)
        .expect("create")
        .await
        .expect("confirmed");
    store
        .create(text("A", "a").with_order(0), Some(&ElementId::from("F1")))
        .expect("create")
        .await
        .expect("confirmed");
    store
        .create(text("B", "b").with_order(1), Some(&ElementId::from("F1")))
        .expect("create")
        .await
        .expect("confirmed");
    store
        .update("A", ElementPatch::new().style("color", "red"))
        .expect("update")
        .await
        .expect("confirmed");
    store.swap("A", "B").expect("swap").await.expect("confirmed");
    store.delete("F1").expect("delete").await.expect("confirmed");

    assert_eq!(
        repo.calls(),
        [
            "create:F1",
            "create:A",
            "create:B",
            "update:A",
            "swap_order:A,B",
            "delete:F1",
        ]
    );
    let a = repo.record("A").expect("A stored");
    assert_eq!(a.order, 1);
    assert_eq!(a.parent_id, None);
    assert!(a.styles.contains("red"));
    assert_eq!(repo.record("B").map(|r| r.order), Some(0));
}

#[tokio::test]
async fn test_dropped_subtree_is_created_in_one_batch() {
    let repo = MemoryRepository::new();
    let store = store(&repo, Forest::from_roots(vec![frame("F1")]).expect("valid"));
    let policy = InsertionPolicy::new(PROJECT);

    let insertion = policy
        .drop_on(
            &store.current_forest(),
            ElementType::Form,
            &DropTarget::Element {
                id: ElementId::from("F1"),
                x: 10.0,
                y: 10.0,
            },
        )
        .expect("F1 accepts drops");
    let created = insertion.element.subtree_len();
    store
        .insert(insertion)
        .expect("applied")
        .await
        .expect("confirmed");

    let calls = repo.calls();
    assert_eq!(calls.len(), 1);
    if created > 1 {
        assert!(calls[0].starts_with("batch_create:"));
    }
    assert_eq!(repo.records().len(), created);
}

#[tokio::test]
async fn test_selection_never_reaches_repository() {
    let repo = MemoryRepository::new();
    let store = store(
        &repo,
        Forest::from_roots(vec![text("A", "a"), text("B", "b")]).expect("valid"),
    );

    store.select("A").expect("select A");
    store.select("B").expect("select B");
    let selected: Vec<String> = store
        .current_forest()
        .iter()
        .filter(|e| e.is_selected)
        .map(|e| e.id.to_string())
        .collect();
    assert_eq!(selected, ["B"]);

    store.clear_selection();
    assert!(repo.calls().is_empty());
}

// ===========================================================================
// Subscriptions and loading
// ===========================================================================

#[tokio::test]
async fn test_subscribers_receive_every_publish() {
    let repo = MemoryRepository::new();
    let store = store(&repo, Forest::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = store.subscribe(move |forest| {
        sink.lock().expect("lock").push(forest.len());
    });
    let mut watch = store.watch();

    store
        .create(frame("F1"), None)
        .expect("create")
        .await
        .expect("confirmed");
    store
        .create(text("T1", "x"), Some(&ElementId::from("F1")))
        .expect("create")
        .await
        .expect("confirmed");
    assert!(watch.has_changed().expect("sender alive"));
    assert_eq!(watch.borrow_and_update().len(), 2);

    subscription.unsubscribe();
    store.delete("T1").expect("delete").await.expect("confirmed");

    assert_eq!(*seen.lock().expect("lock"), [1, 2]);
    assert_eq!(store.version(), 3);
}

#[tokio::test]
async fn test_load_assembles_flat_listing() {
    let repo = MemoryRepository::with_records(vec![
        record("T2", "Text", Some("F1"), 1),
        record("F1", "Frame", None, 0),
        record("T1", "Text", Some("F1"), 0),
        record("orphan", "Text", Some("gone"), 5),
        record("", "Text", None, 0),
    ]);

    let store = ElementStore::load(Arc::new(repo.clone()), PROJECT)
        .await
        .expect("loaded");
    let forest = store.current_forest();

    let roots: Vec<String> = forest.roots().iter().map(|e| e.id.to_string()).collect();
    assert_eq!(roots, ["F1", "orphan"]);
    let children: Vec<String> = forest
        .find_by_id("F1")
        .expect("F1")
        .children()
        .iter()
        .map(|e| e.id.to_string())
        .collect();
    assert_eq!(children, ["T1", "T2"]);
    assert!(forest.find_by_id("orphan").is_some_and(|e| e.parent_id.is_none()));
    forest.validate().expect("consistent");
}

#[tokio::test]
async fn test_load_public_requires_published_scope() {
    let repo = MemoryRepository::with_records(vec![record("F1", "Frame", None, 0)]);

    let err = ElementStore::load_public(Arc::new(repo.clone()), "landing")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Load(_)));

    repo.publish("landing", PROJECT);
    let store = ElementStore::load_public(Arc::new(repo), "landing")
        .await
        .expect("loaded");
    assert_eq!(store.current_forest().len(), 1);
}
