//! Page elements - the typed building blocks of a page.
//!
//! Every element shares a base record (position, styles, ordering, parent
//! back-reference) and carries a closed [`ElementKind`] payload. Containers own
//! their children directly; `parent_id` is a relation only.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{BuilderError, BuilderResult};

/// Style property name to value.
pub type StyleMap = BTreeMap<String, String>;

/// Opaque kind-specific settings (carousel slides, form validation, ...).
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// Unique identifier for an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Create a new unique element ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is empty (never valid for a stored element).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ElementId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ElementId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ElementId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ElementId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// The discriminant of every known element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Plain text block.
    Text,
    /// Clickable button.
    Button,
    /// Hyperlink.
    Link,
    /// Image.
    Image,
    /// Generic container.
    Frame,
    /// Sliding container.
    Carousel,
    /// Repeating list container.
    ListItem,
    /// Dropdown select.
    Select,
    /// Form container.
    Form,
    /// Chart.
    Chart,
    /// Data table.
    DataTable,
}

impl ElementType {
    /// Every known type, in palette order.
    pub const ALL: [Self; 11] = [
        Self::Text,
        Self::Button,
        Self::Link,
        Self::Image,
        Self::Frame,
        Self::Carousel,
        Self::ListItem,
        Self::Select,
        Self::Form,
        Self::Chart,
        Self::DataTable,
    ];

    /// The wire name of this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Button => "Button",
            Self::Link => "Link",
            Self::Image => "Image",
            Self::Frame => "Frame",
            Self::Carousel => "Carousel",
            Self::ListItem => "ListItem",
            Self::Select => "Select",
            Self::Form => "Form",
            Self::Chart => "Chart",
            Self::DataTable => "DataTable",
        }
    }

    /// Whether elements of this type own children.
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(
            self,
            Self::Frame | Self::Carousel | Self::ListItem | Self::Form
        )
    }

    /// Look up a wire name; `None` for types this build does not know.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.as_str() == name)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = BuilderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| BuilderError::MalformedElement(format!("unknown type {s}")))
    }
}

/// One entry of a select dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Option value (also used as its label).
    pub value: String,
}

impl SelectOption {
    /// Create an option.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Kind-specific payload of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    /// Plain text; the base `content` is the text.
    Text,
    /// A button, optionally navigating somewhere.
    Button {
        /// Navigation target.
        href: Option<String>,
        /// HTML button type (`submit`, `button`, ...).
        button_type: Option<String>,
    },
    /// A hyperlink.
    Link {
        /// Navigation target.
        href: Option<String>,
    },
    /// An image.
    Image {
        /// Image source URL.
        src: Option<String>,
    },
    /// A dropdown select.
    Select {
        /// Options in display order.
        options: Vec<SelectOption>,
    },
    /// A chart; its configuration is opaque to the core.
    Chart {
        /// Chart configuration.
        settings: Settings,
    },
    /// A data table; its configuration is opaque to the core.
    DataTable {
        /// Table configuration.
        settings: Settings,
    },
    /// A generic container.
    Frame {
        /// Owned children.
        elements: Vec<Element>,
    },
    /// A sliding container.
    Carousel {
        /// Owned children (one per slide).
        elements: Vec<Element>,
        /// Slide configuration.
        settings: Settings,
    },
    /// A repeating list container.
    ListItem {
        /// Owned children.
        elements: Vec<Element>,
    },
    /// A form container.
    Form {
        /// Owned children.
        elements: Vec<Element>,
        /// Method and validation flags.
        settings: Settings,
    },
    /// A type this build does not know. Treated as an opaque leaf.
    Unknown {
        /// The unrecognised wire name.
        type_name: String,
        /// Payload fields, carried through untouched.
        fields: Settings,
    },
}

impl ElementKind {
    /// An empty payload of the given type.
    #[must_use]
    pub fn empty(ty: ElementType) -> Self {
        match ty {
            ElementType::Text => Self::Text,
            ElementType::Button => Self::Button {
                href: None,
                button_type: None,
            },
            ElementType::Link => Self::Link { href: None },
            ElementType::Image => Self::Image { src: None },
            ElementType::Select => Self::Select {
                options: Vec::new(),
            },
            ElementType::Chart => Self::Chart {
                settings: Settings::new(),
            },
            ElementType::DataTable => Self::DataTable {
                settings: Settings::new(),
            },
            ElementType::Frame => Self::Frame {
                elements: Vec::new(),
            },
            ElementType::Carousel => Self::Carousel {
                elements: Vec::new(),
                settings: Settings::new(),
            },
            ElementType::ListItem => Self::ListItem {
                elements: Vec::new(),
            },
            ElementType::Form => Self::Form {
                elements: Vec::new(),
                settings: Settings::new(),
            },
        }
    }

    /// The known type, or `None` for passthrough elements.
    #[must_use]
    pub fn element_type(&self) -> Option<ElementType> {
        Some(match self {
            Self::Text => ElementType::Text,
            Self::Button { .. } => ElementType::Button,
            Self::Link { .. } => ElementType::Link,
            Self::Image { .. } => ElementType::Image,
            Self::Select { .. } => ElementType::Select,
            Self::Chart { .. } => ElementType::Chart,
            Self::DataTable { .. } => ElementType::DataTable,
            Self::Frame { .. } => ElementType::Frame,
            Self::Carousel { .. } => ElementType::Carousel,
            Self::ListItem { .. } => ElementType::ListItem,
            Self::Form { .. } => ElementType::Form,
            Self::Unknown { .. } => return None,
        })
    }

    /// The wire name, including unrecognised ones.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Unknown { type_name, .. } => type_name,
            known => known.element_type().map_or("", ElementType::as_str),
        }
    }

    /// Children of a container; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Element] {
        match self {
            Self::Frame { elements }
            | Self::Carousel { elements, .. }
            | Self::ListItem { elements }
            | Self::Form { elements, .. } => elements,
            _ => &[],
        }
    }

    /// Mutable children of a container; `None` for leaves.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Element>> {
        match self {
            Self::Frame { elements }
            | Self::Carousel { elements, .. }
            | Self::ListItem { elements }
            | Self::Form { elements, .. } => Some(elements),
            _ => None,
        }
    }

    /// Opaque settings, for kinds that carry them.
    #[must_use]
    pub fn settings(&self) -> Option<&Settings> {
        match self {
            Self::Chart { settings }
            | Self::DataTable { settings }
            | Self::Carousel { settings, .. }
            | Self::Form { settings, .. } => Some(settings),
            _ => None,
        }
    }

    /// Mutable opaque settings, for kinds that carry them.
    pub fn settings_mut(&mut self) -> Option<&mut Settings> {
        match self {
            Self::Chart { settings }
            | Self::DataTable { settings }
            | Self::Carousel { settings, .. }
            | Self::Form { settings, .. } => Some(settings),
            _ => None,
        }
    }
}

/// A page element with its shared base fields and kind payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Unique identifier, immutable after creation.
    pub id: ElementId,
    /// Kind-specific payload.
    pub kind: ElementKind,
    /// Display text; meaning depends on the kind.
    pub content: String,
    /// X position on the canvas (or in the parent's local space).
    pub x: f64,
    /// Y position on the canvas (or in the parent's local space).
    pub y: f64,
    /// Inline style properties. Override `tailwind_styles` where both apply.
    pub styles: StyleMap,
    /// Utility-class tokens.
    pub tailwind_styles: String,
    /// Transient selection flag, never persisted.
    pub is_selected: bool,
    /// Id of the container holding this element, if any.
    pub parent_id: Option<ElementId>,
    /// Owning project.
    pub project_id: String,
    /// Sibling sort key.
    pub order: i64,
}

impl Element {
    /// Create a bare element of the given type with a fresh id.
    #[must_use]
    pub fn new(ty: ElementType, project_id: impl Into<String>) -> Self {
        Self::with_kind(ElementKind::empty(ty), project_id)
    }

    /// Create a bare element around an existing payload.
    #[must_use]
    pub fn with_kind(kind: ElementKind, project_id: impl Into<String>) -> Self {
        Self {
            id: ElementId::new(),
            kind,
            content: String::new(),
            x: 0.0,
            y: 0.0,
            styles: StyleMap::new(),
            tailwind_styles: String::new(),
            is_selected: false,
            parent_id: None,
            project_id: project_id.into(),
            order: 0,
        }
    }

    /// Replace the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ElementId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the display text.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the position.
    #[must_use]
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the sibling sort key.
    #[must_use]
    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    /// Set one style property.
    #[must_use]
    pub fn with_style(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.insert(name.into(), value.into());
        self
    }

    /// Append a child. Leaves ignore children.
    #[must_use]
    pub fn with_child(mut self, mut child: Element) -> Self {
        child.parent_id = Some(self.id.clone());
        match self.kind.children_mut() {
            Some(elements) => elements.push(child),
            None => tracing::warn!(
                parent = %self.id,
                kind = self.kind.type_name(),
                "with_child: leaf element cannot own children"
            ),
        }
        self
    }

    /// The known type, or `None` for passthrough elements.
    #[must_use]
    pub fn element_type(&self) -> Option<ElementType> {
        self.kind.element_type()
    }

    /// The wire type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    /// Whether this element may own children.
    #[must_use]
    pub fn is_container(&self) -> bool {
        self.element_type().is_some_and(ElementType::is_container)
    }

    /// Children in storage order; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Element] {
        self.kind.children()
    }

    /// Number of elements in this subtree, including itself.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        1 + self.children().iter().map(Element::subtree_len).sum::<usize>()
    }

    /// Rewrite `parent_id` on every descendant to match the actual structure.
    pub(crate) fn relink_children(&mut self) {
        let id = self.id.clone();
        if let Some(children) = self.kind.children_mut() {
            for child in children {
                child.parent_id = Some(id.clone());
                child.relink_children();
            }
        }
    }

    /// Ensure every id in this subtree is non-empty and distinct.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::MalformedElement`] on an empty or repeated id.
    pub fn check_ids(&self) -> BuilderResult<()> {
        let mut seen = std::collections::HashSet::new();
        for element in crate::tree::pre_order(std::slice::from_ref(self)) {
            if element.id.is_empty() {
                return Err(BuilderError::MalformedElement(format!(
                    "{} element without id",
                    element.type_name()
                )));
            }
            if !seen.insert(element.id.as_str()) {
                return Err(BuilderError::MalformedElement(format!(
                    "duplicate id {}",
                    element.id
                )));
            }
        }
        Ok(())
    }
}
