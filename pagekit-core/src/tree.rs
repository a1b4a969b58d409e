//! Forest of page elements and the lookups that walk it.
//!
//! All lookups are depth-first and pre-order: a container is visited before
//! its children, so a match on the container exits early. Nothing is cached;
//! every call is O(n) in the number of elements.

use std::collections::HashSet;

use crate::{BuilderError, BuilderResult, Element, ElementId};

/// All root-level elements of a project and their descendants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    roots: Vec<Element>,
}

impl Forest {
    /// Create an empty forest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a forest from root elements, rewriting every `parent_id` to match
    /// the structure.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::MalformedElement`] if an id is empty or repeated.
    pub fn from_roots(mut roots: Vec<Element>) -> BuilderResult<Self> {
        let mut seen = HashSet::new();
        for element in pre_order(&roots) {
            if element.id.is_empty() {
                return Err(BuilderError::MalformedElement(format!(
                    "{} element without id",
                    element.type_name()
                )));
            }
            if !seen.insert(element.id.clone()) {
                return Err(BuilderError::MalformedElement(format!(
                    "duplicate id {}",
                    element.id
                )));
            }
        }
        for root in &mut roots {
            root.parent_id = None;
            root.relink_children();
        }
        Ok(Self { roots })
    }

    /// Wrap roots whose structure the caller already guarantees.
    pub(crate) fn from_roots_unchecked(roots: Vec<Element>) -> Self {
        Self { roots }
    }

    /// Root-level elements in storage order.
    #[must_use]
    pub fn roots(&self) -> &[Element] {
        &self.roots
    }

    /// Take ownership of the root list.
    #[must_use]
    pub fn into_roots(self) -> Vec<Element> {
        self.roots
    }

    /// Find an element anywhere in the forest.
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        find_by_id(&self.roots, id)
    }

    /// Find the container directly holding `id`; `None` for roots and misses.
    #[must_use]
    pub fn find_parent_of(&self, id: &str) -> Option<&Element> {
        find_parent_of(&self.roots, id)
    }

    /// All elements, pre-order.
    #[must_use]
    pub fn flatten(&self) -> Vec<&Element> {
        flatten(&self.roots)
    }

    /// Pre-order iterator over all elements.
    pub fn iter(&self) -> PreOrder<'_> {
        pre_order(&self.roots)
    }

    /// Whether any element carries this id.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.find_by_id(id).is_some()
    }

    /// Total number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether the forest has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Check the structural invariants: unique non-empty ids, roots without a
    /// parent, and every child pointing at the container that holds it.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::MalformedElement`] describing the first violation.
    pub fn validate(&self) -> BuilderResult<()> {
        let mut seen = HashSet::new();
        for element in self.iter() {
            if !seen.insert(element.id.as_str()) {
                return Err(BuilderError::MalformedElement(format!(
                    "duplicate id {}",
                    element.id
                )));
            }
            if !element.is_container() && !element.children().is_empty() {
                return Err(BuilderError::MalformedElement(format!(
                    "leaf {} owns children",
                    element.id
                )));
            }
            for child in element.children() {
                if child.parent_id.as_ref() != Some(&element.id) {
                    return Err(BuilderError::MalformedElement(format!(
                        "{} is held by {} but points at {:?}",
                        child.id, element.id, child.parent_id
                    )));
                }
            }
        }
        if let Some(root) = self.roots.iter().find(|r| r.parent_id.is_some()) {
            return Err(BuilderError::MalformedElement(format!(
                "root {} has a parent reference",
                root.id
            )));
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Forest {
    type Item = &'a Element;
    type IntoIter = PreOrder<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Depth-first, pre-order iterator over a slice of elements.
#[derive(Debug, Clone)]
pub struct PreOrder<'a> {
    stack: Vec<std::slice::Iter<'a, Element>>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            if let Some(element) = top.next() {
                let children = element.children();
                if !children.is_empty() {
                    self.stack.push(children.iter());
                }
                return Some(element);
            }
            self.stack.pop();
        }
    }
}

/// Walk `roots` and their descendants in pre-order.
#[must_use]
pub fn pre_order(roots: &[Element]) -> PreOrder<'_> {
    PreOrder {
        stack: vec![roots.iter()],
    }
}

/// Find an element by id, descending into every container.
#[must_use]
pub fn find_by_id<'a>(roots: &'a [Element], id: &str) -> Option<&'a Element> {
    for element in roots {
        if element.id == id {
            return Some(element);
        }
        if let Some(found) = find_by_id(element.children(), id) {
            return Some(found);
        }
    }
    None
}

/// Find the container whose `elements` directly contain `id`.
#[must_use]
pub fn find_parent_of<'a>(roots: &'a [Element], id: &str) -> Option<&'a Element> {
    for element in roots {
        if element.children().iter().any(|child| child.id == id) {
            return Some(element);
        }
        if let Some(found) = find_parent_of(element.children(), id) {
            return Some(found);
        }
    }
    None
}

/// All elements in pre-order.
#[must_use]
pub fn flatten(roots: &[Element]) -> Vec<&Element> {
    pre_order(roots).collect()
}

pub(crate) fn find_by_id_mut<'a>(roots: &'a mut [Element], id: &str) -> Option<&'a mut Element> {
    for element in roots.iter_mut() {
        if element.id == id {
            return Some(element);
        }
        if let Some(children) = element.kind.children_mut() {
            if let Some(found) = find_by_id_mut(children, id) {
                return Some(found);
            }
        }
    }
    None
}

/// The sibling list holding children of `parent` (the root list for `None`).
pub(crate) fn siblings_mut<'a>(
    roots: &'a mut Vec<Element>,
    parent: Option<&ElementId>,
) -> Option<&'a mut Vec<Element>> {
    match parent {
        None => Some(roots),
        Some(parent) => find_by_id_mut(roots, parent.as_str())?.kind.children_mut(),
    }
}

/// An element removed from its sibling list, with where it used to live.
#[derive(Debug)]
pub(crate) struct Detached {
    pub element: Element,
    pub parent_id: Option<ElementId>,
    pub index: usize,
}

/// Remove an element (with its subtree) from wherever it resides.
pub(crate) fn detach(roots: &mut Vec<Element>, id: &str) -> Option<Detached> {
    if let Some(index) = roots.iter().position(|e| e.id == id) {
        return Some(Detached {
            element: roots.remove(index),
            parent_id: None,
            index,
        });
    }
    detach_nested(roots, id)
}

fn detach_nested(elements: &mut [Element], id: &str) -> Option<Detached> {
    for element in elements.iter_mut() {
        let Some(children) = element.kind.children_mut() else {
            continue;
        };
        if let Some(index) = children.iter().position(|c| c.id == id) {
            return Some(Detached {
                element: children.remove(index),
                parent_id: Some(element.id.clone()),
                index,
            });
        }
        if let Some(found) = detach_nested(children, id) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ElementType;

    fn text(id: &str) -> Element {
        Element::new(ElementType::Text, "p").with_id(id)
    }

    fn frame(id: &str) -> Element {
        Element::new(ElementType::Frame, "p").with_id(id)
    }

    fn sample() -> Forest {
        Forest::from_roots(vec![
            frame("F1")
                .with_child(text("T1"))
                .with_child(frame("F2").with_child(text("T2"))),
            text("T3"),
        ])
        .expect("valid forest")
    }

    #[test]
    fn test_find_by_id_at_every_depth() {
        let forest = sample();
        for id in ["F1", "T1", "F2", "T2", "T3"] {
            assert_eq!(forest.find_by_id(id).map(|e| e.id.as_str()), Some(id));
        }
        assert!(forest.find_by_id("missing").is_none());
    }

    #[test]
    fn test_find_parent_of() {
        let forest = sample();
        assert_eq!(forest.find_parent_of("T2").map(|e| e.id.as_str()), Some("F2"));
        assert_eq!(forest.find_parent_of("F2").map(|e| e.id.as_str()), Some("F1"));
        assert!(forest.find_parent_of("F1").is_none());
        assert!(forest.find_parent_of("missing").is_none());
    }

    #[test]
    fn test_flatten_is_pre_order() {
        let forest = sample();
        let ids: Vec<_> = forest.flatten().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["F1", "T1", "F2", "T2", "T3"]);
        assert_eq!(forest.len(), 5);
    }

    #[test]
    fn test_from_roots_relinks_parents() {
        let mut stray = text("T9");
        stray.parent_id = Some(ElementId::from("nowhere"));
        let forest = Forest::from_roots(vec![frame("F9").with_child(stray)]).expect("valid");
        assert_eq!(
            forest.find_by_id("T9").and_then(|e| e.parent_id.clone()),
            Some(ElementId::from("F9"))
        );
        forest.validate().expect("consistent");
    }

    #[test]
    fn test_from_roots_rejects_duplicates() {
        let result = Forest::from_roots(vec![text("A"), frame("B").with_child(text("A"))]);
        assert!(matches!(result, Err(BuilderError::MalformedElement(_))));
    }

    #[test]
    fn test_detach_reports_origin() {
        let mut roots = sample().into_roots();
        let detached = detach(&mut roots, "T2").expect("found");
        assert_eq!(detached.element.id, "T2");
        assert_eq!(detached.parent_id, Some(ElementId::from("F2")));
        assert_eq!(detached.index, 0);
        assert!(find_by_id(&roots, "T2").is_none());

        let detached = detach(&mut roots, "T3").expect("found");
        assert_eq!(detached.parent_id, None);
        assert_eq!(detached.index, 1);
    }

    #[test]
    fn test_lookups_do_not_mutate() {
        let forest = sample();
        let before = forest.clone();
        let _ = forest.find_by_id("T2");
        let _ = forest.find_parent_of("T2");
        let _ = forest.flatten();
        assert_eq!(forest, before);
    }
}
