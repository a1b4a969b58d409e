//! # Mutation Engine
//!
//! The single authority for moving a [`Forest`] from one valid state to the
//! next. Every operation takes the current forest by reference and returns a
//! brand-new one; the input stays valid, so callers can keep it as a snapshot.
//!
//! ## Semantics
//!
//! - **Create** appends to the root list or to a container's `elements`, and
//!   links `parent_id` to match.
//! - **Update** merges a partial [`ElementPatch`]; `styles` merge key by key.
//! - **Delete** removes the element. Its direct children are detached rather
//!   than destroyed: they move to the root list with `parent_id` cleared.
//! - **Swap** exchanges the `order` of two siblings.
//!
//! Each applied [`Command`] also yields a [`Compensation`], its structural
//! inverse, which can be applied to a *later* forest to undo just that command.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::order::{exchange_order_values, swap_orders};
use crate::tree::{detach, find_by_id, find_by_id_mut, siblings_mut, Detached};
use crate::{
    BuilderError, BuilderResult, Element, ElementId, ElementKind, Forest, SelectOption, Settings,
    StyleMap,
};

/// Partial update of an element. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ElementPatch {
    /// New display text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New X position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// New Y position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Style properties to set; other properties are kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<StyleMap>,
    /// New utility-class tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tailwind_styles: Option<String>,
    /// New selection flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_selected: Option<bool>,
    /// New sibling sort key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// New navigation target (Button, Link).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// New image source (Image).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// New HTML button type (Button).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_type: Option<String>,
    /// Replacement option list (Select).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SelectOption>>,
    /// Replacement settings (Carousel, Form, Chart, DataTable).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

impl ElementPatch {
    /// An empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display text.
    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set the position.
    #[must_use]
    pub fn position(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    /// Set one style property.
    #[must_use]
    pub fn style(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles
            .get_or_insert_with(StyleMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Set the sibling sort key.
    #[must_use]
    pub fn order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    /// Set the selection flag.
    #[must_use]
    pub fn selected(mut self, selected: bool) -> Self {
        self.is_selected = Some(selected);
        self
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the patch only touches transient UI state that is never
    /// persisted.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.is_selected.is_some()
            && Self {
                is_selected: None,
                ..self.clone()
            }
            .is_empty()
    }

    fn check_applies(&self, element: &Element) -> BuilderResult<()> {
        let kind = &element.kind;
        let misplaced = [
            (
                "href",
                self.href.is_some(),
                matches!(kind, ElementKind::Button { .. } | ElementKind::Link { .. }),
            ),
            ("src", self.src.is_some(), matches!(kind, ElementKind::Image { .. })),
            (
                "buttonType",
                self.button_type.is_some(),
                matches!(kind, ElementKind::Button { .. }),
            ),
            (
                "options",
                self.options.is_some(),
                matches!(kind, ElementKind::Select { .. }),
            ),
            ("settings", self.settings.is_some(), kind.settings().is_some()),
        ]
        .into_iter()
        .find(|(_, present, applies)| *present && !applies);

        match misplaced {
            Some((field, ..)) => Err(BuilderError::MalformedElement(format!(
                "{field} does not apply to {} {}",
                element.type_name(),
                element.id
            ))),
            None => Ok(()),
        }
    }

    /// Merge into `element`, recording each touched field before and after.
    fn apply_to(&self, element: &mut Element) -> Revert {
        let mut revert = Revert::default();

        if let Some(content) = &self.content {
            revert.content = Some(Change::write(&mut element.content, content.clone()));
        }
        if let Some(x) = self.x {
            revert.x = Some(Change::write(&mut element.x, x));
        }
        if let Some(y) = self.y {
            revert.y = Some(Change::write(&mut element.y, y));
        }
        if let Some(styles) = &self.styles {
            for (name, value) in styles {
                let mut slot = element.styles.get(name).cloned();
                let change = Change::write(&mut slot, Some(value.clone()));
                element.styles.insert(name.clone(), value.clone());
                revert.styles.insert(name.clone(), change);
            }
        }
        if let Some(tailwind) = &self.tailwind_styles {
            revert.tailwind_styles = Some(Change::write(
                &mut element.tailwind_styles,
                tailwind.clone(),
            ));
        }
        if let Some(selected) = self.is_selected {
            revert.is_selected = Some(Change::write(&mut element.is_selected, selected));
        }
        if let Some(order) = self.order {
            revert.order = Some(Change::write(&mut element.order, order));
        }

        match &mut element.kind {
            ElementKind::Button { href, button_type } => {
                if let Some(new) = &self.href {
                    revert.href = Some(Change::write(href, Some(new.clone())));
                }
                if let Some(new) = &self.button_type {
                    revert.button_type = Some(Change::write(button_type, Some(new.clone())));
                }
            }
            ElementKind::Link { href } => {
                if let Some(new) = &self.href {
                    revert.href = Some(Change::write(href, Some(new.clone())));
                }
            }
            ElementKind::Image { src } => {
                if let Some(new) = &self.src {
                    revert.src = Some(Change::write(src, Some(new.clone())));
                }
            }
            ElementKind::Select { options } => {
                if let Some(new) = &self.options {
                    revert.options = Some(Change::write(options, new.clone()));
                }
            }
            _ => {}
        }
        if let (Some(new), Some(settings)) = (&self.settings, element.kind.settings_mut()) {
            revert.settings = Some(Change::write(settings, new.clone()));
        }

        revert
    }
}

/// One field's value before and after an update.
#[derive(Debug, Clone, PartialEq)]
struct Change<T> {
    before: T,
    after: T,
}

impl<T: Clone + PartialEq> Change<T> {
    fn write(slot: &mut T, after: T) -> Self {
        let before = std::mem::replace(slot, after.clone());
        Self { before, after }
    }

    /// Restore `before` unless the slot was written again since. Returns
    /// `false` when a later value was kept.
    fn undo(&self, slot: &mut T) -> bool {
        if *slot != self.after {
            return false;
        }
        slot.clone_from(&self.before);
        true
    }
}

fn undo_field<T: Clone + PartialEq>(change: Option<&Change<T>>, slot: &mut T, kept: &mut usize) {
    if let Some(change) = change {
        if !change.undo(slot) {
            *kept += 1;
        }
    }
}

/// Before and after values of exactly the fields one update touched.
///
/// Undoing restores a field only while it still holds what the update wrote,
/// so a later write to the same field survives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Revert {
    content: Option<Change<String>>,
    x: Option<Change<f64>>,
    y: Option<Change<f64>>,
    styles: BTreeMap<String, Change<Option<String>>>,
    tailwind_styles: Option<Change<String>>,
    is_selected: Option<Change<bool>>,
    order: Option<Change<i64>>,
    href: Option<Change<Option<String>>>,
    src: Option<Change<Option<String>>>,
    button_type: Option<Change<Option<String>>>,
    options: Option<Change<Vec<SelectOption>>>,
    settings: Option<Change<Settings>>,
}

impl Revert {
    /// Undo onto `element`, returning how many fields kept a later value.
    fn apply_to(&self, element: &mut Element) -> usize {
        let mut kept = 0;
        undo_field(self.content.as_ref(), &mut element.content, &mut kept);
        undo_field(self.x.as_ref(), &mut element.x, &mut kept);
        undo_field(self.y.as_ref(), &mut element.y, &mut kept);
        for (name, change) in &self.styles {
            let mut slot = element.styles.get(name).cloned();
            if !change.undo(&mut slot) {
                kept += 1;
                continue;
            }
            match slot {
                Some(value) => element.styles.insert(name.clone(), value),
                None => element.styles.remove(name),
            };
        }
        undo_field(
            self.tailwind_styles.as_ref(),
            &mut element.tailwind_styles,
            &mut kept,
        );
        undo_field(self.is_selected.as_ref(), &mut element.is_selected, &mut kept);
        undo_field(self.order.as_ref(), &mut element.order, &mut kept);

        match &mut element.kind {
            ElementKind::Button { href, button_type } => {
                undo_field(self.href.as_ref(), href, &mut kept);
                undo_field(self.button_type.as_ref(), button_type, &mut kept);
            }
            ElementKind::Link { href } => undo_field(self.href.as_ref(), href, &mut kept),
            ElementKind::Image { src } => undo_field(self.src.as_ref(), src, &mut kept),
            ElementKind::Select { options } => {
                undo_field(self.options.as_ref(), options, &mut kept);
            }
            _ => {}
        }
        if let Some(settings) = element.kind.settings_mut() {
            undo_field(self.settings.as_ref(), settings, &mut kept);
        }
        kept
    }
}

/// A mutation request against a forest.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Insert a new element (with any children it already owns).
    Create {
        /// The element to insert.
        element: Element,
        /// Container to append to; `None` appends to the root list.
        parent_id: Option<ElementId>,
    },
    /// Merge a partial update into an existing element.
    Update {
        /// Target element.
        id: ElementId,
        /// Fields to change.
        patch: ElementPatch,
    },
    /// Remove an element, detaching its children.
    Delete {
        /// Target element.
        id: ElementId,
    },
    /// Exchange the `order` of two siblings.
    Swap {
        /// First sibling.
        first: ElementId,
        /// Second sibling.
        second: ElementId,
    },
}

impl Command {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Swap { .. } => "swap",
        }
    }

    /// The element the command is about (the first one for swaps).
    #[must_use]
    pub fn target(&self) -> &ElementId {
        match self {
            Self::Create { element, .. } => &element.id,
            Self::Update { id, .. } | Self::Delete { id } => id,
            Self::Swap { first, .. } => first,
        }
    }

    /// Apply to `forest`, producing the next forest and the inverse.
    ///
    /// # Errors
    ///
    /// Returns the structural or validation error; `forest` is never touched.
    pub fn apply(&self, forest: &Forest) -> BuilderResult<Applied> {
        let applied = match self {
            Self::Create { element, parent_id } => {
                apply_create(forest, element.clone(), parent_id.as_ref())
            }
            Self::Update { id, patch } => apply_update(forest, id.as_str(), patch),
            Self::Delete { id } => apply_delete(forest, id.as_str()),
            Self::Swap { first, second } => apply_swap(forest, first.as_str(), second.as_str()),
        }?;
        tracing::debug!(
            command = self.name(),
            target = %self.target(),
            elements = applied.forest.len(),
            "applied command"
        );
        Ok(applied)
    }
}

/// Result of applying a [`Command`].
#[derive(Debug, Clone)]
pub struct Applied {
    /// The forest after the command.
    pub forest: Forest,
    /// How to undo just this command on a later forest.
    pub compensation: Compensation,
}

/// Structural inverse of one applied command.
#[derive(Debug, Clone, PartialEq)]
pub enum Compensation {
    /// Undo a create: remove the created subtree. Elements added under it
    /// later are lifted to the root instead of removed.
    Remove {
        /// The created element.
        id: ElementId,
        /// Every id the create brought in, in pre-order.
        created: Vec<ElementId>,
    },
    /// Undo an update: restore the touched fields that still hold the
    /// updated value.
    Revert {
        /// The updated element.
        id: ElementId,
        /// Field values before and after.
        revert: Revert,
    },
    /// Undo a delete: put the element back and re-adopt its detached children.
    Reinsert {
        /// The deleted element without its children.
        shell: Element,
        /// Where it lived.
        parent_id: Option<ElementId>,
        /// Its index among its siblings.
        index: usize,
        /// Children that were detached, in their original order.
        children: Vec<ElementId>,
    },
    /// Undo a swap by exchanging the two order values back, wherever later
    /// swaps have moved them.
    Swap {
        /// First sibling.
        first: ElementId,
        /// Second sibling.
        second: ElementId,
        /// `first`'s order before the swap.
        first_order: i64,
        /// `second`'s order before the swap.
        second_order: i64,
    },
}

impl Compensation {
    /// Apply to `forest`, which may contain later changes.
    ///
    /// Later writes win: a reverted field that was written again keeps the
    /// newer value.
    ///
    /// # Errors
    ///
    /// Fails when the state the inverse depends on is gone (for example the
    /// element was deleted in the meantime).
    pub fn apply(&self, forest: &Forest) -> BuilderResult<Forest> {
        let mut roots = forest.roots().to_vec();
        match self {
            Self::Remove { id, created } => {
                let Detached { element, .. } = detach(&mut roots, id.as_str())
                    .ok_or_else(|| BuilderError::ElementNotFound(id.to_string()))?;
                let mut adopted = Vec::new();
                collect_foreign(element, created, &mut adopted);
                for mut orphan in adopted {
                    tracing::warn!(
                        element = %orphan.id,
                        removed = %id,
                        "element added under a removed create lifted to the root"
                    );
                    orphan.parent_id = None;
                    roots.push(orphan);
                }
            }
            Self::Revert { id, revert } => {
                let element = find_by_id_mut(&mut roots, id.as_str())
                    .ok_or_else(|| BuilderError::ElementNotFound(id.to_string()))?;
                let kept = revert.apply_to(element);
                if kept > 0 {
                    tracing::debug!(element = %id, kept, "later writes kept over the revert");
                }
            }
            Self::Reinsert {
                shell,
                parent_id,
                index,
                children,
            } => reinsert(&mut roots, shell, parent_id.as_ref(), *index, children)?,
            Self::Swap {
                first,
                second,
                first_order,
                second_order,
            } => exchange_order_values(
                &mut roots,
                first.as_str(),
                second.as_str(),
                *first_order,
                *second_order,
            )?,
        }
        Ok(Forest::from_roots_unchecked(roots))
    }
}

/// Drop the created part of `element`, collecting children that were not.
fn collect_foreign(mut element: Element, created: &[ElementId], out: &mut Vec<Element>) {
    let children = element
        .kind
        .children_mut()
        .map(std::mem::take)
        .unwrap_or_default();
    for child in children {
        if created.contains(&child.id) {
            collect_foreign(child, created, out);
        } else {
            out.push(child);
        }
    }
}

/// Insert `element` under `parent_id` (or at the root).
///
/// # Errors
///
/// [`BuilderError::ParentNotFound`] if the parent is missing or not a
/// container; [`BuilderError::MalformedElement`] if any id in the new subtree
/// is empty, repeated, or already present.
pub fn create(
    forest: &Forest,
    element: Element,
    parent_id: Option<&ElementId>,
) -> BuilderResult<Forest> {
    apply_create(forest, element, parent_id).map(|applied| applied.forest)
}

/// Merge `patch` into the element `id`.
///
/// # Errors
///
/// [`BuilderError::ElementNotFound`] if `id` does not resolve;
/// [`BuilderError::MalformedElement`] if the patch carries fields the kind
/// does not have.
pub fn update(forest: &Forest, id: &str, patch: &ElementPatch) -> BuilderResult<Forest> {
    apply_update(forest, id, patch).map(|applied| applied.forest)
}

/// Remove the element `id`; its direct children move to the root list with
/// `parent_id` cleared.
///
/// # Errors
///
/// [`BuilderError::ElementNotFound`] if `id` does not resolve.
pub fn delete(forest: &Forest, id: &str) -> BuilderResult<Forest> {
    apply_delete(forest, id).map(|applied| applied.forest)
}

/// Exchange the `order` of two siblings.
///
/// # Errors
///
/// [`BuilderError::ElementNotFound`] for an unknown id,
/// [`BuilderError::SiblingMismatch`] if the parents differ.
pub fn reorder_swap(forest: &Forest, first: &str, second: &str) -> BuilderResult<Forest> {
    apply_swap(forest, first, second).map(|applied| applied.forest)
}

/// Mark exactly one element as selected (or none), clearing the flag
/// everywhere else.
///
/// # Errors
///
/// [`BuilderError::ElementNotFound`] if `id` is given and does not resolve.
pub fn select(forest: &Forest, id: Option<&str>) -> BuilderResult<Forest> {
    if let Some(id) = id {
        if !forest.contains(id) {
            return Err(BuilderError::ElementNotFound(id.to_string()));
        }
    }
    let mut roots = forest.roots().to_vec();
    set_selection(&mut roots, id);
    Ok(Forest::from_roots_unchecked(roots))
}

fn set_selection(elements: &mut [Element], id: Option<&str>) {
    for element in elements {
        element.is_selected = id.is_some_and(|id| element.id == id);
        if let Some(children) = element.kind.children_mut() {
            set_selection(children, id);
        }
    }
}

fn apply_create(
    forest: &Forest,
    mut element: Element,
    parent_id: Option<&ElementId>,
) -> BuilderResult<Applied> {
    element.check_ids()?;
    if let Some(existing) = crate::tree::pre_order(std::slice::from_ref(&element))
        .find(|e| forest.contains(e.id.as_str()))
    {
        return Err(BuilderError::MalformedElement(format!(
            "id {} already exists",
            existing.id
        )));
    }

    element.parent_id = parent_id.cloned();
    element.relink_children();
    let id = element.id.clone();
    let created = crate::tree::pre_order(std::slice::from_ref(&element))
        .map(|e| e.id.clone())
        .collect();

    let mut roots = forest.roots().to_vec();
    match parent_id {
        None => roots.push(element),
        Some(parent_id) => {
            let parent = find_by_id_mut(&mut roots, parent_id.as_str())
                .ok_or_else(|| BuilderError::ParentNotFound(parent_id.to_string()))?;
            let children = parent.kind.children_mut().ok_or_else(|| {
                BuilderError::ParentNotFound(format!("{parent_id} is not a container"))
            })?;
            children.push(element);
        }
    }

    Ok(Applied {
        forest: Forest::from_roots_unchecked(roots),
        compensation: Compensation::Remove { id, created },
    })
}

fn apply_update(forest: &Forest, id: &str, patch: &ElementPatch) -> BuilderResult<Applied> {
    let mut roots = forest.roots().to_vec();
    let element = find_by_id_mut(&mut roots, id)
        .ok_or_else(|| BuilderError::ElementNotFound(id.to_string()))?;
    patch.check_applies(element)?;
    let revert = patch.apply_to(element);
    Ok(Applied {
        forest: Forest::from_roots_unchecked(roots),
        compensation: Compensation::Revert {
            id: ElementId::from(id),
            revert,
        },
    })
}

fn apply_delete(forest: &Forest, id: &str) -> BuilderResult<Applied> {
    let mut roots = forest.roots().to_vec();
    let Detached {
        element: mut shell,
        parent_id,
        index,
    } = detach(&mut roots, id).ok_or_else(|| BuilderError::ElementNotFound(id.to_string()))?;

    let orphans = shell
        .kind
        .children_mut()
        .map(std::mem::take)
        .unwrap_or_default();
    let children: Vec<_> = orphans.iter().map(|o| o.id.clone()).collect();
    let lifted = orphans.into_iter().map(|mut orphan| {
        orphan.parent_id = None;
        orphan
    });
    if parent_id.is_none() {
        roots.splice(index..index, lifted);
    } else {
        roots.extend(lifted);
    }

    if !children.is_empty() {
        tracing::debug!(
            deleted = %id,
            detached = children.len(),
            "children detached to the root list"
        );
    }

    Ok(Applied {
        forest: Forest::from_roots_unchecked(roots),
        compensation: Compensation::Reinsert {
            shell,
            parent_id,
            index,
            children,
        },
    })
}

fn apply_swap(forest: &Forest, first: &str, second: &str) -> BuilderResult<Applied> {
    let mut roots = forest.roots().to_vec();
    swap_orders(&mut roots, first, second)?;
    // Both resolved above; after the swap each holds the other's old value.
    let order_of = |id: &str| find_by_id(&roots, id).map_or(0, |e| e.order);
    let (first_order, second_order) = (order_of(second), order_of(first));
    Ok(Applied {
        forest: Forest::from_roots_unchecked(roots),
        compensation: Compensation::Swap {
            first: ElementId::from(first),
            second: ElementId::from(second),
            first_order,
            second_order,
        },
    })
}

fn reinsert(
    roots: &mut Vec<Element>,
    shell: &Element,
    parent_id: Option<&ElementId>,
    index: usize,
    children: &[ElementId],
) -> BuilderResult<()> {
    if find_by_id(roots, shell.id.as_str()).is_some() {
        return Err(BuilderError::MalformedElement(format!(
            "id {} already exists",
            shell.id
        )));
    }

    let mut shell = shell.clone();
    if let Some(slot) = shell.kind.children_mut() {
        for child_id in children {
            match detach(roots, child_id.as_str()) {
                Some(Detached { mut element, .. }) => {
                    element.parent_id = Some(shell.id.clone());
                    slot.push(element);
                }
                None => tracing::debug!(child = %child_id, "detached child no longer present"),
            }
        }
    }

    let parent = parent_id
        .filter(|p| find_by_id(roots, p.as_str()).is_some_and(Element::is_container))
        .cloned();
    if parent.is_none() && parent_id.is_some() {
        tracing::warn!(
            element = %shell.id,
            "original parent is gone, restoring at the root"
        );
    }
    shell.parent_id = parent.clone();

    let siblings = siblings_mut(roots, parent.as_ref())
        .ok_or_else(|| BuilderError::ParentNotFound(format!("{parent:?}")))?;
    let at = index.min(siblings.len());
    siblings.insert(at, shell);
    Ok(())
}
