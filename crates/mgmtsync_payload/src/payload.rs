//! Resource payloads.

use crate::error::{PayloadError, PayloadResult};
use crate::{json, xml};
use serde_json::Value;
use std::fmt;

/// Encoding of a payload, detected from its first non-whitespace character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadFormat {
    /// JSON document.
    Json,
    /// XML document.
    Xml,
}

impl PayloadFormat {
    /// Detects the format of `text`.
    pub fn detect(text: &str) -> Self {
        if text.trim_start().starts_with('<') {
            Self::Xml
        } else {
            Self::Json
        }
    }

    /// MIME type for this format.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml => "application/xml",
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Xml => f.write_str("xml"),
        }
    }
}

/// An immutable configuration payload.
///
/// Transformations return new payloads; the original text is never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    text: String,
    format: PayloadFormat,
}

impl Payload {
    /// Wraps `text`, detecting its format.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let format = PayloadFormat::detect(&text);
        Self { text, format }
    }

    /// Builds a JSON payload from a value.
    pub fn from_json(value: &Value) -> Self {
        Self {
            text: value.to_string(),
            format: PayloadFormat::Json,
        }
    }

    /// Returns the payload text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns the payload format.
    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    /// Returns true for JSON payloads.
    pub fn is_json(&self) -> bool {
        self.format == PayloadFormat::Json
    }

    /// Returns the value of a top-level field, or `None` if it is absent.
    ///
    /// JSON `null` counts as absent. Non-string JSON values are rendered
    /// (`false`, `42`, compact arrays and objects). For XML the field is the
    /// first direct child of the root element with that local name; an
    /// element with child elements has no text value.
    pub fn field(&self, name: &str) -> PayloadResult<Option<String>> {
        match self.format {
            PayloadFormat::Json => {
                let map = json::parse_object(&self.text)?;
                Ok(map.get(name).and_then(json::render_value))
            }
            PayloadFormat::Xml => xml::root_child_text(&self.text, name),
        }
    }

    /// Returns the value of a top-level field that must be present.
    pub fn required_field(&self, name: &str) -> PayloadResult<String> {
        self.field(name)?
            .ok_or_else(|| PayloadError::missing_field(name, &self.text))
    }

    /// Returns true if the top-level field is present.
    pub fn has_field(&self, name: &str) -> PayloadResult<bool> {
        Ok(self.field(name)?.is_some())
    }

    /// Returns a copy of the payload without the named top-level fields.
    ///
    /// Remaining fields keep their order. Names that do not occur are ignored.
    pub fn exclude_fields(&self, names: &[&str]) -> PayloadResult<Payload> {
        match self.format {
            PayloadFormat::Json => {
                let mut map = json::parse_object(&self.text)?;
                map.retain(|key, _| !names.contains(&key.as_str()));
                Ok(Self::from_json(&Value::Object(map)))
            }
            PayloadFormat::Xml => Ok(Self {
                text: xml::exclude_root_children(&self.text, names)?,
                format: PayloadFormat::Xml,
            }),
        }
    }

    /// Returns the payload with JSON comments removed and re-serialized as
    /// compact standard JSON. XML payloads are returned unchanged.
    pub fn sanitize_json_comments(&self) -> PayloadResult<Payload> {
        match self.format {
            PayloadFormat::Json => Ok(Self {
                text: json::sanitize(&self.text)?,
                format: PayloadFormat::Json,
            }),
            PayloadFormat::Xml => Ok(self.clone()),
        }
    }

    /// Returns the top-level fields that carry a scalar value, in order.
    pub fn top_level_fields(&self) -> PayloadResult<Vec<(String, String)>> {
        match self.format {
            PayloadFormat::Json => {
                let map = json::parse_object(&self.text)?;
                Ok(map
                    .iter()
                    .filter(|(_, value)| !matches!(value, Value::Array(_) | Value::Object(_)))
                    .filter_map(|(key, value)| json::render_value(value).map(|v| (key.clone(), v)))
                    .collect())
            }
            PayloadFormat::Xml => Ok(xml::root_children(&self.text)?
                .into_iter()
                .filter_map(|child| child.text.map(|text| (child.name, text)))
                .collect()),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}
