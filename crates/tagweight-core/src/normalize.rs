//! Tag input normalization.
//!
//! Raw tag input arrives either as a delimited string (`"food ant bee"`) or as
//! a list that may contain nulls, padding, blanks, and duplicates. Both forms
//! normalize to a [`TagList`]: trimmed, non-empty, unique, in first-occurrence
//! order.
//!
//! ```text
//! "  food ant  bee food "  ──split──▶ ["", "", "food", "ant", "", "bee", "food", ""]
//!                          ──trim/drop blanks/dedup──▶ ["food", "ant", "bee"]
//! ```

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TagError, TagResult};

/// Ordered, duplicate-free list of normalized tags.
///
/// Order only matters for round-tripping the delimited string form.
/// Aggregation treats the list as a set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagList(Vec<String>);

impl TagList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Membership view used by delta computation.
    pub fn to_set(&self) -> BTreeSet<String> {
        self.0.iter().cloned().collect()
    }

    /// Join back into the delimited string form.
    pub fn join(&self, separator: &str) -> String {
        self.0.join(separator)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.0.iter().cloned().map(Value::String).collect())
    }
}

impl From<TagList> for Vec<String> {
    fn from(list: TagList) -> Self {
        list.0
    }
}

/// Raw tag input before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTags {
    /// Explicitly unset; normalizes to no tag list at all.
    Null,
    /// Delimited string, split on the context separator.
    Text(String),
    /// List of possibly-null entries.
    List(Vec<Option<String>>),
}

impl From<&str> for RawTags {
    fn from(s: &str) -> Self {
        RawTags::Text(s.to_string())
    }
}

impl From<String> for RawTags {
    fn from(s: String) -> Self {
        RawTags::Text(s)
    }
}

impl From<Vec<&str>> for RawTags {
    fn from(items: Vec<&str>) -> Self {
        RawTags::List(items.into_iter().map(|s| Some(s.to_string())).collect())
    }
}

impl From<Vec<String>> for RawTags {
    fn from(items: Vec<String>) -> Self {
        RawTags::List(items.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<&str>>> for RawTags {
    fn from(items: Vec<Option<&str>>) -> Self {
        RawTags::List(items.into_iter().map(|s| s.map(str::to_string)).collect())
    }
}

impl TryFrom<&Value> for RawTags {
    type Error = TagError;

    /// Accepts null, a string, or an array whose elements are strings or
    /// nulls. Anything else is [`TagError::InvalidFormat`].
    fn try_from(value: &Value) -> TagResult<Self> {
        match value {
            Value::Null => Ok(RawTags::Null),
            Value::String(s) => Ok(RawTags::Text(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Null => Ok(None),
                    Value::String(s) => Ok(Some(s.clone())),
                    other => Err(TagError::InvalidFormat(json_type_name(other).to_string())),
                })
                .collect::<TagResult<Vec<_>>>()
                .map(RawTags::List),
            other => Err(TagError::InvalidFormat(json_type_name(other).to_string())),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Normalize raw input into a tag list.
///
/// Returns `None` for [`RawTags::Null`] so an unset field stays unset.
pub fn normalize(raw: &RawTags, separator: &str) -> Option<TagList> {
    match raw {
        RawTags::Null => None,
        RawTags::Text(s) => Some(collect_unique(s.split(separator).map(Some))),
        RawTags::List(items) => Some(collect_unique(items.iter().map(|i| i.as_deref()))),
    }
}

/// Normalize an untyped JSON value, rejecting anything that is not a string
/// or list.
pub fn normalize_value(value: &Value, separator: &str) -> TagResult<Option<TagList>> {
    let raw = RawTags::try_from(value)?;
    Ok(normalize(&raw, separator))
}

fn collect_unique<'a>(items: impl Iterator<Item = Option<&'a str>>) -> TagList {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items.flatten() {
        let tag = item.trim();
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.to_string()) {
            out.push(tag.to_string());
        }
    }
    TagList(out)
}
