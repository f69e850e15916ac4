//! Request payloads.
//!
//! A `Payload` is the flat mapping the dispatcher sends, as query parameters
//! for get/delete or as a JSON body for post/put. Endpoint methods build it
//! from the typed structures below so every optional field has one explicit
//! default (`""` or `0`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, Result};

pub type Payload = serde_json::Map<String, Value>;

/// Optional note fields shared by create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteOptions {
    pub author: String,
    pub source_url: String,
    /// Comma-separated tag titles, e.g. `"tag1, tag2"`.
    pub tags: String,
    pub is_todo: u8,
}

impl NoteOptions {
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    pub fn todo(mut self, is_todo: bool) -> Self {
        self.is_todo = u8::from(is_todo);
        self
    }

    /// Tag titles split on commas, trimmed, empties dropped.
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct NoteFields<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub parent_id: &'a str,
    #[serde(flatten)]
    pub options: &'a NoteOptions,
}

/// Optional folder fields. An empty `parent_id` places the folder at the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderOptions {
    pub parent_id: String,
}

impl FolderOptions {
    pub fn parent(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FolderFields<'a> {
    pub title: &'a str,
    #[serde(flatten)]
    pub options: &'a FolderOptions,
}

/// Resource properties sent as `props` on upload and as the body on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOptions {
    pub title: String,
}

impl ResourceOptions {
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }
}

/// Serialize any struct into a flat payload. Non-object values are rejected.
pub fn to_payload<T: Serialize + ?Sized>(value: &T) -> Result<Payload> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Payload::new()),
        other => Err(ApiError::invalid(format!(
            "payload must be a mapping, got {other}"
        ))),
    }
}

/// Flatten a payload into query-string pairs. Strings go verbatim, other
/// scalars use their JSON text, nulls are skipped.
pub fn query_pairs(payload: &Payload) -> Vec<(String, String)> {
    payload
        .iter()
        .filter_map(|(k, v)| {
            let value = match v {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((k.clone(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn note_fields_default_optional_values() {
        let options = NoteOptions::default();
        let payload = to_payload(&NoteFields {
            title: "T",
            body: "B",
            parent_id: "P",
            options: &options,
        })
        .unwrap();
        assert_eq!(
            Value::Object(payload),
            json!({
                "title": "T",
                "body": "B",
                "parent_id": "P",
                "author": "",
                "source_url": "",
                "tags": "",
                "is_todo": 0
            })
        );
    }

    #[test]
    fn note_options_builders() {
        let options = NoteOptions::default()
            .author("me")
            .source_url("https://example.org")
            .tags("a, b")
            .todo(true);
        assert_eq!(options.author, "me");
        assert_eq!(options.source_url, "https://example.org");
        assert_eq!(options.is_todo, 1);
        assert_eq!(options.tag_list(), vec!["a", "b"]);
    }

    #[test]
    fn tag_list_drops_blanks() {
        let options = NoteOptions::default().tags(" one ,, two , ");
        assert_eq!(options.tag_list(), vec!["one", "two"]);
        assert!(NoteOptions::default().tag_list().is_empty());
    }

    #[test]
    fn folder_fields_default_to_root() {
        let payload = to_payload(&FolderFields {
            title: "Inbox",
            options: &FolderOptions::default(),
        })
        .unwrap();
        assert_eq!(Value::Object(payload), json!({"title": "Inbox", "parent_id": ""}));
    }

    #[test]
    fn to_payload_rejects_non_objects() {
        let err = to_payload(&"just a string").unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
        assert!(to_payload(&()).unwrap().is_empty());
    }

    #[test]
    fn query_pairs_stringify_scalars() {
        let payload = to_payload(&json!({
            "title": "x y",
            "is_todo": 1,
            "flag": true,
            "missing": null
        }))
        .unwrap();
        let mut pairs = query_pairs(&payload);
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("flag".to_string(), "true".to_string()),
                ("is_todo".to_string(), "1".to_string()),
                ("title".to_string(), "x y".to_string()),
            ]
        );
    }
}
