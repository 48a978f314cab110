//! Request payloads and the serializer that turns them into request bodies.
//!
//! A DTO is a plain serde struct whose unset fields are `None` and skipped.
//! Fields that must be sent as an explicit clear are `Option<Option<T>>`,
//! where `Some(None)` serializes as JSON `null` or an empty multipart value.
//!
//! Multipart names are built from the DTO's root key: `submission[body]`,
//! `submission[file_ids][]`, or just `title` when the root key is empty.

pub mod brand_config;
pub mod discussion_topic;
pub mod submission;

pub use brand_config::{CreateSharedBrandConfigDto, UpdateSharedBrandConfigDto};
pub use discussion_topic::{
    announcement_overlay, CreateAnnouncementDto, CreateDiscussionTopicDto, UpdateAnnouncementDto,
    UpdateDiscussionTopicDto,
};
pub use submission::CreateSubmissionDto;

use crate::error::{CanvasError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Caller-supplied key/value parameters used to build a DTO
pub type Param = Map<String, Value>;

/// One multipart form entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub contents: String,
}

impl FormField {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        FormField {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Request body in one of the two encodings Canvas accepts
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Multipart(Vec<FormField>),
}

/// A request payload for one Canvas operation
pub trait ApiDto: Serialize + Clone {
    /// Root key for multipart field names; empty for top-level parameters
    fn api_property_name(&self) -> &'static str;

    /// Presence checks run before serialization
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Forced values applied on top of the caller's fields before serialization
    fn overlay(&mut self) {}

    /// Multipart form fields, in declaration order
    fn to_api_array(&self) -> Result<Vec<FormField>> {
        to_api_array(self)
    }

    /// JSON object body without a root key
    fn to_json(&self) -> Result<Value> {
        to_json_body(self)
    }
}

/// Build a DTO from caller parameters. Keys may be camelCase or snake_case.
pub fn from_params<T>(params: Param) -> Result<T>
where
    T: DeserializeOwned,
{
    let normalized: Map<String, Value> = params
        .into_iter()
        .map(|(k, v)| (snake_case(&k), v))
        .collect();
    serde_json::from_value(Value::Object(normalized))
        .map_err(|e| CanvasError::InvalidArgument(e.to_string()))
}

fn prepared<D: ApiDto>(dto: &D) -> Result<Map<String, Value>> {
    let mut dto = dto.clone();
    dto.overlay();
    dto.validate()?;

    match serde_json::to_value(&dto)? {
        Value::Object(map) => Ok(map),
        other => Err(CanvasError::InvalidArgument(format!(
            "request payload must serialize to an object, got {}",
            other
        ))),
    }
}

/// Serialize a DTO as multipart form fields
pub fn to_api_array<D: ApiDto>(dto: &D) -> Result<Vec<FormField>> {
    let root = dto.api_property_name();
    let mut fields = Vec::new();

    for (key, value) in prepared(dto)? {
        let key = snake_case(&key);
        let name = if root.is_empty() {
            key
        } else {
            format!("{}[{}]", root, key)
        };
        push_form_value(&mut fields, name, &value);
    }

    Ok(fields)
}

/// Serialize a DTO as a JSON object
pub fn to_json_body<D: ApiDto>(dto: &D) -> Result<Value> {
    let map = prepared(dto)?
        .into_iter()
        .map(|(k, v)| (snake_case(&k), v))
        .collect();
    Ok(Value::Object(map))
}

fn push_form_value(fields: &mut Vec<FormField>, name: String, value: &Value) {
    match value {
        Value::Null => fields.push(FormField::new(name, "")),
        Value::Bool(b) => fields.push(FormField::new(name, b.to_string())),
        Value::Number(n) => fields.push(FormField::new(name, n.to_string())),
        Value::String(s) => fields.push(FormField::new(name, s.clone())),
        Value::Array(items) => {
            for item in items {
                push_form_value(fields, format!("{}[]", name), item);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                push_form_value(fields, format!("{}[{}]", name, key), item);
            }
        }
    }
}

/// Convert a camelCase name to snake_case; snake_case input is unchanged
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_uppercase() {
            out.push(c);
            continue;
        }

        let prev = i.checked_sub(1).map(|j| chars[j]);
        let next = chars.get(i + 1).copied();
        let boundary = match prev {
            Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
            Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
            _ => false,
        };
        if boundary && !out.ends_with('_') {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }

    out
}

/// Deserialize a present-but-null field as `Some(None)`.
/// Use with `#[serde(default)]` so an absent field stays `None`.
pub fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
