//! Text blobs for the persisted record layout.
//!
//! The repository stores `styles`, `options` and the per-kind settings as
//! serialised JSON text. A missing or blank blob decodes to an empty value.

use serde_json::Value;

use crate::{BuilderError, BuilderResult, SelectOption, Settings, StyleMap};

/// Serialise a style map.
///
/// # Errors
///
/// Returns [`BuilderError::Serialization`] if encoding fails.
pub fn encode_styles(styles: &StyleMap) -> BuilderResult<String> {
    Ok(serde_json::to_string(styles)?)
}

/// Parse a style blob. Non-string values are kept in their JSON text form.
///
/// # Errors
///
/// Returns [`BuilderError::Serialization`] for invalid JSON and
/// [`BuilderError::MalformedElement`] when the blob is not an object.
pub fn decode_styles(blob: &str) -> BuilderResult<StyleMap> {
    Ok(decode_object(blob, "styles")?
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (name, value)
        })
        .collect())
}

/// Serialise opaque settings.
///
/// # Errors
///
/// Returns [`BuilderError::Serialization`] if encoding fails.
pub fn encode_settings(settings: &Settings) -> BuilderResult<String> {
    Ok(serde_json::to_string(settings)?)
}

/// Parse an optional settings blob.
///
/// # Errors
///
/// Returns [`BuilderError::Serialization`] for invalid JSON and
/// [`BuilderError::MalformedElement`] when the blob is not an object.
pub fn decode_settings(blob: Option<&str>) -> BuilderResult<Settings> {
    blob.map_or_else(|| Ok(Settings::new()), |b| decode_object(b, "settings"))
}

/// Serialise a select option list.
///
/// # Errors
///
/// Returns [`BuilderError::Serialization`] if encoding fails.
pub fn encode_options(options: &[SelectOption]) -> BuilderResult<String> {
    Ok(serde_json::to_string(options)?)
}

/// Parse an optional option-list blob.
///
/// # Errors
///
/// Returns [`BuilderError::Serialization`] if the blob is not a list of
/// `{"value": ...}` objects.
pub fn decode_options(blob: Option<&str>) -> BuilderResult<Vec<SelectOption>> {
    match blob.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(text) => Ok(serde_json::from_str(text)?),
    }
}

fn decode_object(blob: &str, what: &str) -> BuilderResult<Settings> {
    let text = blob.trim();
    if text.is_empty() {
        return Ok(Settings::new());
    }
    match serde_json::from_str(text)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Settings::new()),
        other => Err(BuilderError::MalformedElement(format!(
            "{what} blob is not an object: {other}"
        ))),
    }
}
