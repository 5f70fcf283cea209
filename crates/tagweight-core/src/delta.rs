//! Tag-set deltas between a document's persisted state and its next state.
//!
//! A delta is computed once per save per context from the previous and next
//! tag sets. When the grouping value changes, the change is expressed against
//! two buckets: everything previously counted leaves the old group and
//! everything now held enters the new one.

use std::collections::BTreeSet;

use crate::context::TagContext;
use crate::document::Document;

/// The part of a document that aggregation depends on, for one context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSnapshot {
    pub tags: BTreeSet<String>,
    pub group: Option<String>,
}

impl TagSnapshot {
    pub fn of(document: &Document, context: &TagContext) -> Self {
        Self {
            tags: document
                .tag_list(context)
                .map(|t| t.to_set())
                .unwrap_or_default(),
            group: document.group_value(context),
        }
    }
}

/// Tags entering and leaving one `(context, group)` bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub context: String,
    pub group: Option<String>,
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl Delta {
    /// Every tag in `tags` leaves the bucket.
    pub fn removal(context: &str, tags: &BTreeSet<String>, group: Option<&str>) -> Self {
        Self {
            context: context.to_string(),
            group: group.map(str::to_string),
            added: BTreeSet::new(),
            removed: tags.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compute the deltas for one context.
///
/// `previous` is `None` on creation and `next` is `None` on destruction.
/// Returns no deltas when nothing changed, one delta when the group is
/// stable, and two when the group moved.
pub fn compute(
    context: &str,
    previous: Option<&TagSnapshot>,
    next: Option<&TagSnapshot>,
) -> Vec<Delta> {
    let group_moved = match (previous, next) {
        (Some(p), Some(n)) => p.group != n.group,
        _ => false,
    };

    let empty = TagSnapshot::default();
    let prev = previous.unwrap_or(&empty);
    let next_state = next.unwrap_or(&empty);

    let deltas = if group_moved {
        vec![
            Delta {
                context: context.to_string(),
                group: prev.group.clone(),
                added: BTreeSet::new(),
                removed: prev.tags.clone(),
            },
            Delta {
                context: context.to_string(),
                group: next_state.group.clone(),
                added: next_state.tags.clone(),
                removed: BTreeSet::new(),
            },
        ]
    } else {
        // On destroy the group comes from the last persisted state.
        let group = match previous {
            Some(p) => p.group.clone(),
            None => next_state.group.clone(),
        };
        vec![Delta {
            context: context.to_string(),
            group,
            added: next_state.tags.difference(&prev.tags).cloned().collect(),
            removed: prev.tags.difference(&next_state.tags).cloned().collect(),
        }]
    };

    deltas.into_iter().filter(|d| !d.is_empty()).collect()
}
