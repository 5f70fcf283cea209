//! Documents carrying tag lists.
//!
//! A document is an id plus a JSON object of fields. Tag lists live under the
//! context's `db_field` as JSON arrays of strings (or null when unset); the
//! grouping value is read from the context's `group_by_field`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::TagContext;
use crate::normalize::{normalize_value, TagList};

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Document {
    /// New unsaved document with a random id.
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: id.into(),
            fields: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Current tag list for a context. Malformed stored values read as unset.
    pub fn tag_list(&self, context: &TagContext) -> Option<TagList> {
        self.fields
            .get(&context.db_field)
            .and_then(|v| normalize_value(v, &context.separator).ok().flatten())
    }

    pub(crate) fn store_tag_list(&mut self, context: &TagContext, tags: Option<TagList>) {
        let value = tags.map(|t| t.to_value()).unwrap_or(Value::Null);
        self.fields.insert(context.db_field.clone(), value);
    }

    /// Grouping value for a context, if it is grouped and the field is set.
    pub fn group_value(&self, context: &TagContext) -> Option<String> {
        let field = context.group_by_field.as_deref()?;
        group_key(self.fields.get(field)?)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a field value as a group key. Null is no group; strings are used
/// verbatim and other values by their JSON text.
pub fn group_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
