//! # Tagweight Core
//!
//! Tag contexts for document collections and the aggregation engine that
//! keeps per-tag weights current: normalization of raw tag input, context
//! registration, lifecycle deltas, the three aggregation strategies, and
//! the store traits they run against.
//!
//! This crate contains no sqlx, filesystem I/O, or CLI code. The SQLite
//! stores and the `tagw` binary live in the `tagweight` crate.
//!
//! ```text
//! TaggedCollection::save
//!   └─ DocumentStore::get (previous) → DocumentStore::put
//!        └─ LifecycleDispatcher::on_save
//!             └─ delta::compute → AggregationStrategy::on_save
//!                  └─ AggregationStore::increment / decrement
//! ```

pub mod collection;
pub mod context;
pub mod delta;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod normalize;
pub mod schema;
pub mod store;
pub mod strategy;

pub use collection::TaggedCollection;
pub use context::{ContextOptions, TagContext, DEFAULT_CONTEXT, DEFAULT_SEPARATOR};
pub use delta::{Delta, TagSnapshot};
pub use dispatch::LifecycleDispatcher;
pub use document::Document;
pub use error::{TagError, TagResult};
pub use normalize::{normalize, RawTags, TagList};
pub use schema::{ContextInfo, TaggableSchema};
pub use store::{AggregationRecord, AggregationStore, DocumentStore, GroupScope, TableSummary};
pub use strategy::{
    AggregationStrategy, AggregationTarget, BatchRecompute, IncrementalCounter,
    IncrementalGroupedCounter, StrategyKind, TagWeight,
};
