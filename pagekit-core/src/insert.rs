//! Drag/drop, double-click and paste placement.
//!
//! The policy never mutates anything itself: it decides the target parent and
//! the element to create, and hands back an [`Insertion`] that becomes a
//! [`Command::Create`].

use crate::defaults::defaults_for;
use crate::mutation::Command;
use crate::order::next_order;
use crate::{BuilderError, BuilderResult, Element, ElementId, ElementType, Forest};

/// Canvas grid spacing used when snapping root drops.
pub const GRID_SIZE: f64 = 20.0;

/// Snap a canvas coordinate to the nearest grid line.
#[must_use]
pub fn snap_to_grid(value: f64) -> f64 {
    (value / GRID_SIZE).round() * GRID_SIZE
}

/// Where a palette item was released.
#[derive(Debug, Clone, PartialEq)]
pub enum DropTarget {
    /// Empty canvas at the pointer position.
    Canvas {
        /// Pointer X.
        x: f64,
        /// Pointer Y.
        y: f64,
    },
    /// On top of an existing element.
    Element {
        /// The element under the pointer.
        id: ElementId,
        /// Pointer X on the canvas.
        x: f64,
        /// Pointer Y on the canvas.
        y: f64,
    },
}

/// A placement decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Insertion {
    /// The element to create, subtree included.
    pub element: Element,
    /// Container to append to, or `None` for the root list.
    pub parent_id: Option<ElementId>,
}

impl Insertion {
    /// The create command carrying out this placement.
    #[must_use]
    pub fn into_command(self) -> Command {
        Command::Create {
            element: self.element,
            parent_id: self.parent_id,
        }
    }
}

/// Places new elements for one project.
#[derive(Debug, Clone)]
pub struct InsertionPolicy {
    project_id: String,
}

impl InsertionPolicy {
    /// Create a policy for `project_id`.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
        }
    }

    /// Project new elements are created in.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// A fresh element of `ty` populated from the defaults table.
    #[must_use]
    pub fn instantiate(&self, ty: ElementType) -> Element {
        defaults_for(ty).instantiate(ty, self.project_id.as_str())
    }

    /// Decide where a dropped palette item goes.
    ///
    /// Containers adopt the new element at their local origin. Anything else
    /// (including a leaf under the pointer) yields a root element at the
    /// snapped pointer position.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::ElementNotFound`] if the target element is gone.
    pub fn drop_on(
        &self,
        forest: &Forest,
        ty: ElementType,
        target: &DropTarget,
    ) -> BuilderResult<Insertion> {
        let (x, y) = match target {
            DropTarget::Canvas { x, y } => (*x, *y),
            DropTarget::Element { id, x, y } => {
                let over = forest
                    .find_by_id(id.as_str())
                    .ok_or_else(|| BuilderError::ElementNotFound(id.to_string()))?;
                if over.is_container() {
                    let element = self
                        .instantiate(ty)
                        .with_position(0.0, 0.0)
                        .with_order(next_order(over.children()));
                    return Ok(Insertion {
                        element,
                        parent_id: Some(over.id.clone()),
                    });
                }
                (*x, *y)
            }
        };
        Ok(self.at_root(forest, self.instantiate(ty), x, y))
    }

    /// A palette double-click: a root element at the canvas origin.
    #[must_use]
    pub fn double_click(&self, forest: &Forest, ty: ElementType) -> Insertion {
        self.at_root(forest, self.instantiate(ty), 0.0, 0.0)
    }

    /// Paste `clipboard` with fresh ids throughout its subtree.
    ///
    /// With a Frame selected (other than the copied element itself) the copy
    /// becomes its child at the local origin; otherwise it is a root element at
    /// the clipboard's snapped coordinates.
    #[must_use]
    pub fn paste(
        &self,
        forest: &Forest,
        clipboard: &Element,
        selected: Option<&ElementId>,
    ) -> Insertion {
        let copy = self.fresh_copy(clipboard);
        let frame = selected
            .filter(|id| **id != clipboard.id)
            .and_then(|id| forest.find_by_id(id.as_str()))
            .filter(|e| e.element_type() == Some(ElementType::Frame));

        match frame {
            Some(frame) => Insertion {
                element: copy
                    .with_position(0.0, 0.0)
                    .with_order(next_order(frame.children())),
                parent_id: Some(frame.id.clone()),
            },
            None => {
                let (x, y) = (clipboard.x, clipboard.y);
                self.at_root(forest, copy, x, y)
            }
        }
    }

    fn at_root(&self, forest: &Forest, element: Element, x: f64, y: f64) -> Insertion {
        Insertion {
            element: element
                .with_position(snap_to_grid(x), snap_to_grid(y))
                .with_order(next_order(forest.roots())),
            parent_id: None,
        }
    }

    fn fresh_copy(&self, source: &Element) -> Element {
        let mut copy = source.clone();
        reassign_ids(&mut copy, &self.project_id);
        copy.parent_id = None;
        copy.is_selected = false;
        copy.relink_children();
        copy
    }
}

fn reassign_ids(element: &mut Element, project_id: &str) {
    element.id = ElementId::new();
    element.project_id = project_id.to_string();
    element.is_selected = false;
    if let Some(children) = element.kind.children_mut() {
        for child in children {
            reassign_ids(child, project_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forest() -> Forest {
        Forest::from_roots(vec![
            Element::new(ElementType::Frame, "p")
                .with_id("F")
                .with_order(0)
                .with_child(Element::new(ElementType::Text, "p").with_id("T").with_order(4)),
            Element::new(ElementType::Button, "p").with_id("B").with_order(7),
        ])
        .expect("valid")
    }

    #[test]
    fn test_snap_to_grid() {
        assert!((snap_to_grid(0.0) - 0.0).abs() < f64::EPSILON);
        assert!((snap_to_grid(29.0) - 20.0).abs() < f64::EPSILON);
        assert!((snap_to_grid(31.0) - 40.0).abs() < f64::EPSILON);
        assert!((snap_to_grid(-11.0) + 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_canvas_drop_is_snapped_root() {
        let policy = InsertionPolicy::new("p");
        let insertion = policy
            .drop_on(&forest(), ElementType::Image, &DropTarget::Canvas { x: 47.0, y: 113.0 })
            .expect("drop");
        assert!(insertion.parent_id.is_none());
        assert!((insertion.element.x - 40.0).abs() < f64::EPSILON);
        assert!((insertion.element.y - 120.0).abs() < f64::EPSILON);
        assert_eq!(insertion.element.order, 8);
    }

    #[test]
    fn test_container_drop_is_child_at_origin() {
        let policy = InsertionPolicy::new("p");
        let target = DropTarget::Element {
            id: ElementId::from("F"),
            x: 300.0,
            y: 300.0,
        };
        let insertion = policy
            .drop_on(&forest(), ElementType::Text, &target)
            .expect("drop");
        assert_eq!(insertion.parent_id, Some(ElementId::from("F")));
        assert!(insertion.element.x.abs() < f64::EPSILON);
        assert_eq!(insertion.element.order, 5);
    }

    #[test]
    fn test_leaf_drop_falls_back_to_canvas() {
        let policy = InsertionPolicy::new("p");
        let target = DropTarget::Element {
            id: ElementId::from("B"),
            x: 61.0,
            y: 9.0,
        };
        let insertion = policy
            .drop_on(&forest(), ElementType::Text, &target)
            .expect("drop");
        assert!(insertion.parent_id.is_none());
        assert!((insertion.element.x - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_drop_on_missing_element() {
        let policy = InsertionPolicy::new("p");
        let target = DropTarget::Element {
            id: ElementId::from("gone"),
            x: 0.0,
            y: 0.0,
        };
        assert!(matches!(
            policy.drop_on(&forest(), ElementType::Text, &target),
            Err(BuilderError::ElementNotFound(_))
        ));
    }

    #[test]
    fn test_paste_into_selected_frame_with_fresh_ids() {
        let policy = InsertionPolicy::new("p");
        let forest = forest();
        let clipboard = forest.find_by_id("F").expect("frame").clone();
        let other_frame = Element::new(ElementType::Frame, "p").with_id("G");
        let forest = crate::mutation::create(&forest, other_frame, None).expect("create");

        let insertion = policy.paste(&forest, &clipboard, Some(&ElementId::from("G")));
        assert_eq!(insertion.parent_id, Some(ElementId::from("G")));
        let copy = &insertion.element;
        assert_ne!(copy.id, clipboard.id);
        assert_ne!(copy.children()[0].id, ElementId::from("T"));
        assert_eq!(copy.children()[0].parent_id.as_ref(), Some(&copy.id));

        let parent = insertion.parent_id.as_ref();
        let forest =
            crate::mutation::create(&forest, insertion.element, parent).expect("paste applies");
        forest.validate().expect("consistent");
    }

    #[test]
    fn test_paste_onto_itself_goes_to_root() {
        let policy = InsertionPolicy::new("p");
        let forest = forest();
        let mut clipboard = forest.find_by_id("F").expect("frame").clone();
        clipboard.x = 33.0;
        let insertion = policy.paste(&forest, &clipboard, Some(&ElementId::from("F")));
        assert!(insertion.parent_id.is_none());
        assert!((insertion.element.x - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_double_click_at_origin() {
        let policy = InsertionPolicy::new("p");
        let insertion = policy.double_click(&Forest::new(), ElementType::Form);
        assert!(insertion.parent_id.is_none());
        assert_eq!(insertion.element.order, 0);
        assert!(insertion.element.kind.settings().is_some());
    }
}
