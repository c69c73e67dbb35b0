//! Document cleanup before indexing.
//!
//! Applied in order: sweep null sentinels, flatten singleton lists, coerce
//! numeric strings, then wrap as `{"_id": id, "<payload_key>": document}`.

use crate::fusion::FusedDocument;
use crate::FusionError;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// String values treated as "no value".
pub const NULL_SENTINELS: &[&str] = &[
    ".",
    "-",
    "",
    "NA",
    "none",
    " ",
    "Not Available",
    "unknown",
    "null",
    "None",
    "NaN",
];

/// Keys whose values stay strings even when they look numeric.
///
/// Entity ids are strings wherever they appear.
pub const NUMERIC_SKIPPED_KEYS: &[&str] = &[
    "id",
    "secondary_ids",
    "parents",
    "children",
    "ancestors",
    "descendants",
    "relationship",
    "cid",
    "sid",
    "beilstein",
    "pubmed",
    "sabio_rk",
    "gmelin",
    "molbase",
    "synonyms",
    "wikipedia",
    "url_stub",
];

fn is_sentinel(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => NULL_SENTINELS.contains(&s.as_str()),
        _ => false,
    }
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

fn keep(value: &mut Value) -> bool {
    sweep_value(value);
    !is_sentinel(value) && !is_empty_container(value)
}

fn sweep_value(value: &mut Value) {
    match value {
        Value::Object(fields) => sweep(fields),
        Value::Array(items) => items.retain_mut(keep),
        _ => {}
    }
}

/// Recursively drop sentinel values and the containers they leave empty.
pub fn sweep(fields: &mut Map<String, Value>) {
    fields.retain(|_, value| keep(value));
}

/// Recursively replace one-element lists with their element.
pub fn unlist(value: Value) -> Value {
    match value {
        Value::Array(mut items) if items.len() == 1 => unlist(items.remove(0)),
        Value::Array(items) => Value::Array(items.into_iter().map(unlist).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key, unlist(value)))
                .collect(),
        ),
        other => other,
    }
}

fn to_number(s: &str) -> Option<Number> {
    if let Ok(int) = s.parse::<i64>() {
        return Some(Number::from(int));
    }
    s.parse::<f64>()
        .ok()
        .filter(|float| float.is_finite())
        .and_then(Number::from_f64)
}

/// Recursively turn numeric-looking strings into numbers, leaving values
/// under `skipped` keys untouched.
pub fn coerce_numbers(value: Value, skipped: &[&str]) -> Value {
    match value {
        Value::String(s) => match to_number(&s) {
            Some(number) => Value::Number(number),
            None => Value::String(s),
        },
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| coerce_numbers(item, skipped))
                .collect(),
        ),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| {
                    if skipped.contains(&key.as_str()) {
                        (key, value)
                    } else {
                        let value = coerce_numbers(value, skipped);
                        (key, value)
                    }
                })
                .collect(),
        ),
        other => other,
    }
}

/// A finalized document ready for bulk indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub id: String,
    pub payload_key: String,
    pub payload: Map<String, Value>,
}

impl Serialize for IndexDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("_id", &self.id)?;
        map.serialize_entry(&self.payload_key, &self.payload)?;
        map.end()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentFinalizer {
    payload_key: String,
}

impl DocumentFinalizer {
    pub fn new(payload_key: impl Into<String>) -> Self {
        Self {
            payload_key: payload_key.into(),
        }
    }

    /// Clean `document` and wrap it under the payload key.
    ///
    /// `_id` is the fused id; the payload must still carry a string `id`
    /// after sweeping.
    pub fn finalize(&self, document: FusedDocument) -> Result<IndexDocument, FusionError> {
        let FusedDocument { id, mut fields, .. } = document;
        sweep(&mut fields);
        let payload = match coerce_numbers(unlist(Value::Object(fields)), NUMERIC_SKIPPED_KEYS) {
            Value::Object(payload) => payload,
            _ => return Err(FusionError::MissingId),
        };
        if !payload.get("id").is_some_and(Value::is_string) {
            return Err(FusionError::MissingId);
        }

        Ok(IndexDocument {
            id,
            payload_key: self.payload_key.clone(),
            payload,
        })
    }
}
