//! Per-kind defaults applied when a new element is placed.

use crate::{Element, ElementKind, ElementType, SelectOption, Settings};

/// A literal settings value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// String.
    Str(&'static str),
}

impl From<DefaultValue> for serde_json::Value {
    fn from(value: DefaultValue) -> Self {
        match value {
            DefaultValue::Bool(b) => Self::Bool(b),
            DefaultValue::Int(i) => Self::from(i),
            DefaultValue::Str(s) => Self::from(s),
        }
    }
}

/// Starting values for one element kind.
#[derive(Debug, Clone, Copy)]
pub struct Defaults {
    /// Display text.
    pub content: &'static str,
    /// Inline styles.
    pub styles: &'static [(&'static str, &'static str)],
    /// Utility classes.
    pub tailwind: &'static str,
    /// Navigation target for buttons and links.
    pub href: Option<&'static str>,
    /// Image source.
    pub src: Option<&'static str>,
    /// Button type.
    pub button_type: Option<&'static str>,
    /// Select options.
    pub options: &'static [&'static str],
    /// Kind settings.
    pub settings: &'static [(&'static str, DefaultValue)],
}

const EMPTY: Defaults = Defaults {
    content: "",
    styles: &[],
    tailwind: "",
    href: None,
    src: None,
    button_type: None,
    options: &[],
    settings: &[],
};

static TEXT: Defaults = Defaults {
    content: "Text Element",
    styles: &[("color", "#000000"), ("fontSize", "16px")],
    tailwind: "p-2",
    ..EMPTY
};

static BUTTON: Defaults = Defaults {
    content: "Button",
    styles: &[
        ("backgroundColor", "#3b82f6"),
        ("color", "#ffffff"),
        ("borderRadius", "6px"),
    ],
    tailwind: "px-4 py-2 font-medium",
    button_type: Some("button"),
    ..EMPTY
};

static LINK: Defaults = Defaults {
    content: "Link",
    styles: &[("color", "#2563eb"), ("textDecoration", "underline")],
    href: Some("#"),
    ..EMPTY
};

static IMAGE: Defaults = Defaults {
    styles: &[("width", "200px"), ("height", "150px")],
    tailwind: "object-cover",
    src: Some("https://placehold.co/200x150"),
    ..EMPTY
};

static FRAME: Defaults = Defaults {
    styles: &[
        ("width", "320px"),
        ("height", "200px"),
        ("backgroundColor", "#f3f4f6"),
    ],
    tailwind: "relative p-4",
    ..EMPTY
};

static CAROUSEL: Defaults = Defaults {
    styles: &[("width", "480px"), ("height", "270px")],
    tailwind: "relative overflow-hidden",
    settings: &[
        ("autoplay", DefaultValue::Bool(false)),
        ("interval", DefaultValue::Int(3000)),
        ("loop", DefaultValue::Bool(true)),
        ("showArrows", DefaultValue::Bool(true)),
        ("showDots", DefaultValue::Bool(true)),
        ("slidesToShow", DefaultValue::Int(1)),
    ],
    ..EMPTY
};

static LIST_ITEM: Defaults = Defaults {
    styles: &[("width", "320px")],
    tailwind: "flex flex-col gap-2",
    ..EMPTY
};

static SELECT: Defaults = Defaults {
    styles: &[("width", "200px")],
    tailwind: "border rounded px-2 py-1",
    options: &["Option 1", "Option 2", "Option 3"],
    ..EMPTY
};

static FORM: Defaults = Defaults {
    styles: &[("width", "360px"), ("backgroundColor", "#ffffff")],
    tailwind: "flex flex-col gap-3 p-4",
    settings: &[
        ("method", DefaultValue::Str("POST")),
        ("action", DefaultValue::Str("")),
        ("validateOnSubmit", DefaultValue::Bool(true)),
        ("validateOnChange", DefaultValue::Bool(false)),
        ("resetOnSubmit", DefaultValue::Bool(false)),
    ],
    ..EMPTY
};

static CHART: Defaults = Defaults {
    styles: &[("width", "400px"), ("height", "300px")],
    settings: &[
        ("chartType", DefaultValue::Str("bar")),
        ("showLegend", DefaultValue::Bool(true)),
    ],
    ..EMPTY
};

static DATA_TABLE: Defaults = Defaults {
    styles: &[("width", "480px")],
    tailwind: "table-auto",
    settings: &[
        ("pageSize", DefaultValue::Int(10)),
        ("sortable", DefaultValue::Bool(true)),
    ],
    ..EMPTY
};

/// The defaults table entry for `ty`.
#[must_use]
pub fn defaults_for(ty: ElementType) -> &'static Defaults {
    match ty {
        ElementType::Text => &TEXT,
        ElementType::Button => &BUTTON,
        ElementType::Link => &LINK,
        ElementType::Image => &IMAGE,
        ElementType::Frame => &FRAME,
        ElementType::Carousel => &CAROUSEL,
        ElementType::ListItem => &LIST_ITEM,
        ElementType::Select => &SELECT,
        ElementType::Form => &FORM,
        ElementType::Chart => &CHART,
        ElementType::DataTable => &DATA_TABLE,
    }
}

impl Defaults {
    /// Kind settings as an opaque map.
    #[must_use]
    pub fn settings_map(&self) -> Settings {
        self.settings
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).into()))
            .collect()
    }

    /// A fresh element of `ty` populated from this entry.
    #[must_use]
    pub fn instantiate(&self, ty: ElementType, project_id: impl Into<String>) -> Element {
        let mut element = Element::new(ty, project_id).with_content(self.content);
        element.tailwind_styles = self.tailwind.to_string();
        for (name, value) in self.styles {
            element.styles.insert((*name).to_string(), (*value).to_string());
        }

        let owned = |value: Option<&'static str>| value.map(str::to_string);
        match &mut element.kind {
            ElementKind::Button { href, button_type } => {
                *href = owned(self.href);
                *button_type = owned(self.button_type);
            }
            ElementKind::Link { href } => *href = owned(self.href),
            ElementKind::Image { src } => *src = owned(self.src),
            ElementKind::Select { options } => {
                *options = self.options.iter().copied().map(SelectOption::new).collect();
            }
            _ => {}
        }
        if let Some(settings) = element.kind.settings_mut() {
            *settings = self.settings_map();
        }
        element
    }
}
