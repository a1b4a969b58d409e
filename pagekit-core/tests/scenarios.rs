//! End-to-end editing scenarios against the pure mutation engine.

use pagekit_core::{
    create, delete, reorder_swap, update, BuilderError, Element, ElementId, ElementPatch,
    ElementType, Forest,
};

fn frame(id: &str) -> Element {
    Element::new(ElementType::Frame, "project-1").with_id(id)
}

fn text(id: &str) -> Element {
    Element::new(ElementType::Text, "project-1").with_id(id)
}

#[test]
fn test_root_frame_create_on_empty_project() {
    let forest = create(&Forest::new(), frame("F1"), None).expect("create F1");

    assert_eq!(forest.roots().len(), 1);
    let root = &forest.roots()[0];
    assert_eq!(root.element_type(), Some(ElementType::Frame));
    assert!(root.children().is_empty());
    assert!(root.parent_id.is_none());
}

#[test]
fn test_child_text_create_links_parent() {
    let forest = create(&Forest::new(), frame("F1"), None).expect("create F1");
    let forest = create(&forest, text("T1"), Some(&ElementId::from("F1"))).expect("create T1");

    let children = forest.find_by_id("F1").expect("F1").children();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, "T1");
    assert_eq!(children[0].parent_id, Some(ElementId::from("F1")));
}

#[test]
fn test_deleting_container_keeps_children_unparented() {
    let forest = Forest::from_roots(vec![frame("F1").with_child(text("T1"))]).expect("valid");
    let after = delete(&forest, "F1").expect("delete F1");

    assert!(after.find_by_id("F1").is_none());
    let t1 = after.find_by_id("T1").expect("T1 survives");
    assert!(t1.parent_id.is_none());
    assert!(after.roots().iter().any(|r| r.id == "T1"));
    after.validate().expect("consistent");

    // The input forest is untouched.
    assert!(forest.find_by_id("F1").is_some());
}

#[test]
fn test_swapping_siblings_exchanges_orders() {
    let forest = Forest::from_roots(vec![frame("F1")
        .with_child(text("T1").with_order(0))
        .with_child(text("T2").with_order(1))])
    .expect("valid");
    let after = reorder_swap(&forest, "T1", "T2").expect("swap");

    assert_eq!(after.find_by_id("T1").map(|e| e.order), Some(1));
    assert_eq!(after.find_by_id("T2").map(|e| e.order), Some(0));
}

#[test]
fn test_updating_missing_id_fails_without_change() {
    let forest = Forest::from_roots(vec![frame("F1").with_child(text("T1"))]).expect("valid");
    let before = forest.clone();

    let err = update(&forest, "missing-id", &ElementPatch::new().content("x")).unwrap_err();
    assert!(matches!(err, BuilderError::ElementNotFound(ref id) if id == "missing-id"));
    assert!(err.is_structural());
    assert_eq!(forest, before);
}

#[test]
fn test_patch_deserializes_from_camel_case() {
    let patch: ElementPatch = serde_json::from_str(
        r#"{"content":"Hello","styles":{"color":"red"},"tailwindStyles":"p-4","isSelected":true}"#,
    )
    .expect("valid patch");
    assert_eq!(patch.content.as_deref(), Some("Hello"));
    assert_eq!(patch.tailwind_styles.as_deref(), Some("p-4"));
    assert_eq!(patch.is_selected, Some(true));

    let unknown = serde_json::from_str::<ElementPatch>(r#"{"colour":"red"}"#);
    assert!(unknown.is_err());
}
