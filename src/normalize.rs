//! Cleaning of fetched records before they are written to the store

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// Fields that change on every save without any change in content
pub const VOLATILE_FIELDS: [&str; 4] =
    ["create_time", "lock_version", "system_mtime", "user_mtime"];

/// Editor fields, kept only for volunteer edits
pub const ACTOR_FIELDS: [&str; 2] = ["created_by", "last_modified_by"];

/// Who made the latest edit to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributionClass {
    Archivist,
    Volunteer,
}

impl AttributionClass {
    /// A record without `last_modified_by` is attributed to archivists
    pub fn classify(record: &Value, volunteers: &HashSet<String>) -> Self {
        match record.get("last_modified_by").and_then(Value::as_str) {
            Some(actor) if volunteers.contains(actor) => Self::Volunteer,
            _ => Self::Archivist,
        }
    }
}

impl fmt::Display for AttributionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archivist => write!(f, "archivist"),
            Self::Volunteer => write!(f, "volunteer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub json: Value,
    pub label: String,
    pub class: AttributionClass,
}

/// Human-readable label: `title`, falling back to `display_string`
pub fn record_label(record: &Value) -> Option<&str> {
    record
        .get("title")
        .and_then(Value::as_str)
        .or_else(|| record.get("display_string").and_then(Value::as_str))
}

/// Remove forbidden keys from every object and forbidden values from every
/// array, at any depth
pub fn strip_fields(value: &Value, forbidden_keys: &[&str], forbidden_values: &[Value]) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter(|item| !forbidden_values.contains(item))
                .map(|item| strip_fields(item, forbidden_keys, forbidden_values))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !forbidden_keys.contains(&key.as_str()))
                .map(|(key, item)| {
                    (key.clone(), strip_fields(item, forbidden_keys, forbidden_values))
                })
                .collect::<Map<String, Value>>(),
        ),
        scalar => scalar.clone(),
    }
}

pub struct Normalizer {
    volunteers: HashSet<String>,
}

impl Normalizer {
    pub fn new(volunteers: HashSet<String>) -> Self {
        Self { volunteers }
    }

    /// Clean a record. Returns `None` when the record has no usable label.
    pub fn normalize(&self, record: &Value) -> Option<NormalizedRecord> {
        let label = record_label(record)?.to_string();
        let class = AttributionClass::classify(record, &self.volunteers);

        let mut forbidden: Vec<&str> = VOLATILE_FIELDS.to_vec();
        if class == AttributionClass::Archivist {
            forbidden.extend(ACTOR_FIELDS);
        }

        let forbidden_values: Vec<Value> =
            forbidden.iter().map(|&name| Value::from(name)).collect();

        Some(NormalizedRecord {
            json: strip_fields(record, &forbidden, &forbidden_values),
            label,
            class,
        })
    }
}
