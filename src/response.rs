use crate::error::{strip_json_prefix, CanvasError, Result};
use crate::pagination::PageLinks;
use reqwest::header::{HeaderMap, LINK};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Response is a raw Canvas API response: status, headers and body.
/// It is consumed by the executor right after dispatch.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    /// Response headers (case-insensitive lookup)
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Response { status, headers, body }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the JSON body into the target type. An empty body decodes as `null`.
    pub fn json<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let body = strip_json_prefix(&self.body);
        let decoded = if body.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_slice(body)
        };
        decoded.map_err(|source| CanvasError::Decode {
            status: self.status.as_u16(),
            source,
        })
    }

    /// The body as a JSON value
    pub fn value(&self) -> Result<Value> {
        self.json()
    }

    /// Relation links from the `Link` header(s)
    pub fn links(&self) -> PageLinks {
        let joined = self
            .headers
            .get_all(LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");
        PageLinks::parse(&joined)
    }

    /// Get a value from the body by a slash-separated path.
    /// For example, "user/name" would access the "name" field inside the "user" object.
    pub fn get(&self, path: &str) -> Option<Value> {
        let value = self.value().ok()?;
        let mut current = &value;

        for part in path.split('/').filter(|s| !s.is_empty()) {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(arr) => {
                    let index: usize = part.parse().ok()?;
                    arr.get(index)?
                }
                _ => return None,
            };
        }

        Some(current.clone())
    }

    /// Get a string value from the body by a slash-separated path
    pub fn get_string(&self, path: &str) -> Option<String> {
        self.get(path).and_then(|v| v.as_str().map(|s| s.to_string()))
    }
}
