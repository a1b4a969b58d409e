//! Persisted record layout shared with the element repository.
//!
//! Records are flat: kind-specific structures travel as text blobs and the tree
//! is expressed through `parentId`. [`assemble`] rebuilds a [`Forest`] from a
//! flat list; [`Forest::to_records`] goes the other way.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::codec::{
    decode_options, decode_settings, decode_styles, encode_options, encode_settings,
    encode_styles,
};
use crate::{
    BuilderError, BuilderResult, Element, ElementId, ElementKind, ElementType, Forest, Settings,
};

/// Repository representation of one element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRecord {
    /// Element identifier.
    #[serde(default)]
    pub id: String,
    /// Wire type name.
    #[serde(rename = "type", default)]
    pub element_type: String,
    /// Display text.
    #[serde(default)]
    pub content: String,
    /// X position.
    #[serde(default)]
    pub x: f64,
    /// Y position.
    #[serde(default)]
    pub y: f64,
    /// Serialised style map.
    #[serde(default)]
    pub styles: String,
    /// Utility-class tokens.
    #[serde(default)]
    pub tailwind_styles: String,
    /// Holding container, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Owning project.
    #[serde(default)]
    pub project_id: String,
    /// Sibling sort key.
    #[serde(default)]
    pub order: i64,
    /// Navigation target (Button, Link).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// Image source (Image).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// HTML button type (Button).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_type: Option<String>,
    /// Serialised option list (Select).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    /// Serialised carousel settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carousel_settings: Option<String>,
    /// Serialised form settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_settings: Option<String>,
    /// Serialised chart settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_settings: Option<String>,
    /// Serialised data-table settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_settings: Option<String>,
    /// Nested children, used by clipboard payloads. Repository lists are flat.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<ElementRecord>,
    /// Fields this build does not model, kept for unknown kinds.
    #[serde(flatten)]
    pub extra: Settings,
}

impl ElementRecord {
    /// A flat record for `element` (children are not included).
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::Serialization`] if a blob cannot be encoded.
    pub fn flat(element: &Element) -> BuilderResult<Self> {
        let mut record = Self {
            id: element.id.to_string(),
            element_type: element.type_name().to_string(),
            content: element.content.clone(),
            x: element.x,
            y: element.y,
            styles: encode_styles(&element.styles)?,
            tailwind_styles: element.tailwind_styles.clone(),
            parent_id: element.parent_id.as_ref().map(ToString::to_string),
            project_id: element.project_id.clone(),
            order: element.order,
            ..Self::default()
        };

        match &element.kind {
            ElementKind::Button { href, button_type } => {
                record.href.clone_from(href);
                record.button_type.clone_from(button_type);
            }
            ElementKind::Link { href } => record.href.clone_from(href),
            ElementKind::Image { src } => record.src.clone_from(src),
            ElementKind::Select { options } => record.options = Some(encode_options(options)?),
            ElementKind::Chart { settings } => {
                record.chart_settings = Some(encode_settings(settings)?);
            }
            ElementKind::DataTable { settings } => {
                record.table_settings = Some(encode_settings(settings)?);
            }
            ElementKind::Carousel { settings, .. } => {
                record.carousel_settings = Some(encode_settings(settings)?);
            }
            ElementKind::Form { settings, .. } => {
                record.form_settings = Some(encode_settings(settings)?);
            }
            ElementKind::Unknown { fields, .. } => record.extra.clone_from(fields),
            ElementKind::Text | ElementKind::Frame { .. } | ElementKind::ListItem { .. } => {}
        }
        Ok(record)
    }

    /// A record for `element` with its whole subtree nested in `elements`.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::Serialization`] if a blob cannot be encoded.
    pub fn nested(element: &Element) -> BuilderResult<Self> {
        let mut record = Self::flat(element)?;
        record.elements = element
            .children()
            .iter()
            .map(Self::nested)
            .collect::<BuilderResult<_>>()?;
        Ok(record)
    }

    /// Classify into a typed element. Nested `elements` become children.
    ///
    /// Unknown types become opaque leaves; their nested children are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::MalformedElement`] when `id` or `type` is empty
    /// or a known leaf carries children, and [`BuilderError::Serialization`]
    /// when a blob does not decode.
    pub fn into_element(self) -> BuilderResult<Element> {
        if self.id.is_empty() {
            return Err(BuilderError::MalformedElement(format!(
                "{} record without id",
                self.element_type
            )));
        }
        if self.element_type.is_empty() {
            return Err(BuilderError::MalformedElement(format!(
                "record {} without type",
                self.id
            )));
        }

        let styles = decode_styles(&self.styles)?;
        let kind = match ElementType::parse(&self.element_type) {
            None => {
                if !self.elements.is_empty() {
                    tracing::warn!(
                        id = %self.id,
                        type_name = %self.element_type,
                        dropped = self.elements.len(),
                        "unknown element kind cannot own children"
                    );
                }
                ElementKind::Unknown {
                    type_name: self.element_type,
                    fields: self.extra,
                }
            }
            Some(ty) if !ty.is_container() && !self.elements.is_empty() => {
                return Err(BuilderError::MalformedElement(format!(
                    "{ty} {} carries children",
                    self.id
                )));
            }
            Some(ty) => {
                let elements = self
                    .elements
                    .into_iter()
                    .map(Self::into_element)
                    .collect::<BuilderResult<Vec<_>>>()?;
                match ty {
                    ElementType::Text => ElementKind::Text,
                    ElementType::Button => ElementKind::Button {
                        href: self.href,
                        button_type: self.button_type,
                    },
                    ElementType::Link => ElementKind::Link { href: self.href },
                    ElementType::Image => ElementKind::Image { src: self.src },
                    ElementType::Select => ElementKind::Select {
                        options: decode_options(self.options.as_deref())?,
                    },
                    ElementType::Chart => ElementKind::Chart {
                        settings: decode_settings(self.chart_settings.as_deref())?,
                    },
                    ElementType::DataTable => ElementKind::DataTable {
                        settings: decode_settings(self.table_settings.as_deref())?,
                    },
                    ElementType::Frame => ElementKind::Frame { elements },
                    ElementType::Carousel => ElementKind::Carousel {
                        elements,
                        settings: decode_settings(self.carousel_settings.as_deref())?,
                    },
                    ElementType::ListItem => ElementKind::ListItem { elements },
                    ElementType::Form => ElementKind::Form {
                        elements,
                        settings: decode_settings(self.form_settings.as_deref())?,
                    },
                }
            }
        };

        let mut element = Element {
            id: ElementId::from(self.id),
            kind,
            content: self.content,
            x: self.x,
            y: self.y,
            styles,
            tailwind_styles: self.tailwind_styles,
            is_selected: false,
            parent_id: self
                .parent_id
                .filter(|p| !p.is_empty())
                .map(ElementId::from),
            project_id: self.project_id,
            order: self.order,
        };
        element.relink_children();
        Ok(element)
    }
}

impl TryFrom<&Element> for ElementRecord {
    type Error = BuilderError;

    fn try_from(element: &Element) -> BuilderResult<Self> {
        Self::flat(element)
    }
}

impl Element {
    /// Classify an arbitrary JSON value (camelCase record layout).
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::MalformedElement`] if the value is not a record
    /// or lacks its `id` or `type`.
    pub fn from_value(value: serde_json::Value) -> BuilderResult<Self> {
        serde_json::from_value::<ElementRecord>(value)
            .map_err(|e| BuilderError::MalformedElement(e.to_string()))?
            .into_element()
    }
}

impl Forest {
    /// Flat records for every element, pre-order.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::Serialization`] if a blob cannot be encoded.
    pub fn to_records(&self) -> BuilderResult<Vec<ElementRecord>> {
        self.iter().map(ElementRecord::flat).collect()
    }
}

/// A record [`assemble`] could not place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// The record id (may be empty).
    pub id: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Output of [`assemble`].
#[derive(Debug, Clone, Default)]
pub struct Assembled {
    /// The rebuilt forest.
    pub forest: Forest,
    /// Records that were malformed or repeated an id.
    pub skipped: Vec<SkippedRecord>,
}

/// Rebuild a forest from a repository listing.
///
/// Siblings are stored by `(order, listing index)`. A record whose parent is
/// missing, is not a container, or closes a cycle is lifted to the root list
/// with its parent cleared. Malformed records and repeated ids are skipped.
#[must_use]
pub fn assemble(records: Vec<ElementRecord>) -> Assembled {
    let mut skipped = Vec::new();
    let mut seen = HashSet::new();
    let mut slots: Vec<Option<Element>> = Vec::new();

    for record in flatten_records(records) {
        let id = record.id.clone();
        match record.into_element() {
            Ok(element) if seen.insert(element.id.clone()) => slots.push(Some(element)),
            Ok(_) => skipped.push(SkippedRecord {
                id,
                reason: "duplicate id".to_string(),
            }),
            Err(err) => skipped.push(SkippedRecord {
                id,
                reason: err.to_string(),
            }),
        }
    }

    let index: HashMap<ElementId, usize> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.as_ref().map(|e| (e.id.clone(), i)))
        .collect();

    let mut parents: Vec<Option<usize>> = slots
        .iter()
        .map(|slot| {
            let element = slot.as_ref()?;
            let parent = element.parent_id.as_ref()?;
            match index.get(parent) {
                Some(&p) if slots[p].as_ref().is_some_and(Element::is_container) => Some(p),
                _ => {
                    tracing::warn!(
                        id = %element.id,
                        parent = %parent,
                        "parent missing or not a container, lifting to root"
                    );
                    None
                }
            }
        })
        .collect();
    break_cycles(&mut parents);

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); slots.len()];
    let mut roots = Vec::new();
    for (i, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) => children[*p].push(i),
            None => roots.push(i),
        }
    }
    let order_of = |slots: &[Option<Element>], i: usize| {
        (slots[i].as_ref().map_or(0, |e| e.order), i)
    };
    for list in &mut children {
        list.sort_by_key(|&i| order_of(slots.as_slice(), i));
    }
    roots.sort_by_key(|&i| order_of(slots.as_slice(), i));

    let roots = roots
        .into_iter()
        .filter_map(|i| build(i, None, &mut slots, &children))
        .collect();

    for record in &skipped {
        tracing::warn!(id = %record.id, reason = %record.reason, "skipped record");
    }

    Assembled {
        forest: Forest::from_roots_unchecked(roots),
        skipped,
    }
}

/// Expand nested `elements` into a flat, pre-order list with `parentId` set.
fn flatten_records(records: Vec<ElementRecord>) -> Vec<ElementRecord> {
    let mut flat = Vec::with_capacity(records.len());
    let mut stack: Vec<ElementRecord> = records.into_iter().rev().collect();
    while let Some(mut record) = stack.pop() {
        let nested = std::mem::take(&mut record.elements);
        for mut child in nested.into_iter().rev() {
            child.parent_id = Some(record.id.clone());
            stack.push(child);
        }
        flat.push(record);
    }
    flat
}

/// Clear one parent link in every cycle of the parent graph.
fn break_cycles(parents: &mut [Option<usize>]) {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; parents.len()];
    for start in 0..parents.len() {
        let mut path = Vec::new();
        let mut node = start;
        loop {
            match marks[node] {
                Mark::Done => break,
                Mark::InProgress => {
                    tracing::warn!(index = node, "parent cycle, lifting to root");
                    parents[node] = None;
                    break;
                }
                Mark::Unvisited => {
                    marks[node] = Mark::InProgress;
                    path.push(node);
                    match parents[node] {
                        Some(parent) => node = parent,
                        None => break,
                    }
                }
            }
        }
        for visited in path {
            marks[visited] = Mark::Done;
        }
    }
}

fn build(
    i: usize,
    parent: Option<&ElementId>,
    slots: &mut [Option<Element>],
    children: &[Vec<usize>],
) -> Option<Element> {
    let mut element = slots[i].take()?;
    element.parent_id = parent.cloned();
    let id = element.id.clone();
    let built: Vec<Element> = children[i]
        .iter()
        .filter_map(|&c| build(c, Some(&id), slots, children))
        .collect();
    if let Some(elements) = element.kind.children_mut() {
        elements.extend(built);
    }
    Some(element)
}
