//! Tag contexts and their registration options.
//!
//! A context is one independently taggable field on a document type
//! (e.g. `tags`, `artists`). Its query name may differ from the field the
//! list is stored under: registering `artists` with `db_field = "a"` stores
//! the list in field `a` while aggregates and accessors use `artists`.

use serde::{Deserialize, Serialize};

use crate::error::{TagError, TagResult};
use crate::strategy::StrategyKind;

/// Context name used when none is given.
pub const DEFAULT_CONTEXT: &str = "tags";

/// Separator used when none is given.
pub const DEFAULT_SEPARATOR: &str = " ";

/// Options accepted when registering a context.
///
/// `field` and `string_method` are recognized only so that they can be
/// rejected with a pointer to their replacement.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContextOptions {
    /// Storage field name. Defaults to the context name.
    #[serde(default)]
    pub db_field: Option<String>,
    #[serde(default)]
    pub separator: Option<String>,
    #[serde(default)]
    pub group_by_field: Option<String>,
    /// Tag list assigned to new documents.
    #[serde(default)]
    pub default: Option<Vec<String>>,
    #[serde(default)]
    pub strategy: Option<StrategyKind>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub string_method: Option<String>,
}

impl ContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn db_field(mut self, field: impl Into<String>) -> Self {
        self.db_field = Some(field.into());
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    pub fn group_by_field(mut self, field: impl Into<String>) -> Self {
        self.group_by_field = Some(field.into());
        self
    }

    pub fn default_tags(mut self, tags: Vec<String>) -> Self {
        self.default = Some(tags);
        self
    }

    pub fn strategy(mut self, kind: StrategyKind) -> Self {
        self.strategy = Some(kind);
        self
    }

    /// Reject options that were removed from the registration surface.
    pub fn validate(&self) -> TagResult<()> {
        if self.field.is_some() {
            return Err(TagError::RemovedOption {
                option: "field".to_string(),
                hint: "Register the context under its tag name and set db_field to the storage field."
                    .to_string(),
            });
        }
        if self.string_method.is_some() {
            return Err(TagError::RemovedOption {
                option: "string_method".to_string(),
                hint: "Use tag_string / set_tag_string with the context name.".to_string(),
            });
        }
        if self.separator.as_deref() == Some("") {
            return Err(TagError::InvalidFormat("empty separator".to_string()));
        }
        Ok(())
    }
}

/// One registered taggable field on one document type. Immutable once
/// registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagContext {
    pub name: String,
    pub db_field: String,
    pub separator: String,
    pub group_by_field: Option<String>,
    pub default: Option<Vec<String>>,
}

impl TagContext {
    /// Build a context from validated options.
    pub fn from_options(name: &str, options: &ContextOptions) -> TagResult<Self> {
        options.validate()?;
        Ok(Self {
            name: name.to_string(),
            db_field: options.db_field.clone().unwrap_or_else(|| name.to_string()),
            separator: options
                .separator
                .clone()
                .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
            group_by_field: options.group_by_field.clone(),
            default: options.default.clone(),
        })
    }

    pub fn is_grouped(&self) -> bool {
        self.group_by_field.is_some()
    }
}

/// Name of the aggregation table for a context:
/// `"{collection}_{context}_aggregation"`.
pub fn aggregation_name(collection: &str, context: &str) -> String {
    format!("{}_{}_aggregation", collection, context)
}

/// Derive a storage collection name from a document type name:
/// lowercase, then pluralize (`M1` → `m1s`, `Category` → `categories`).
pub fn collection_name_for(type_name: &str) -> String {
    let lower = type_name.to_lowercase();
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        format!("{}es", lower)
    } else if let Some(stem) = lower.strip_suffix('y') {
        match stem.chars().last() {
            Some(c) if !"aeiou".contains(c) => format!("{}ies", stem),
            _ => format!("{}s", lower),
        }
    } else {
        format!("{}s", lower)
    }
}
