//! Project metadata: the container every forest belongs to.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::StyleMap;

/// A page-builder project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Default canvas styles, stored as a serialised blob.
    #[serde(default, with = "style_blob")]
    pub styles: StyleMap,
}

impl Project {
    /// Create a project with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            styles: StyleMap::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set one default canvas style.
    #[must_use]
    pub fn with_style(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.insert(name.into(), value.into());
        self
    }
}

mod style_blob {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::codec::{decode_styles, encode_styles};
    use crate::StyleMap;

    pub fn serialize<S: Serializer>(styles: &StyleMap, serializer: S) -> Result<S::Ok, S::Error> {
        let blob = encode_styles(styles).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&blob)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StyleMap, D::Error> {
        let blob = Option::<String>::deserialize(deserializer)?;
        blob.as_deref()
            .map_or_else(|| Ok(StyleMap::new()), decode_styles)
            .map_err(de::Error::custom)
    }
}
