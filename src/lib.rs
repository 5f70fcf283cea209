//! # Tagweight
//!
//! Tag contexts for document collections, with per-tag weights kept current
//! by a choice of aggregation strategy.
//!
//! The engine itself lives in [`tagweight_core`]. This crate adds TOML
//! configuration, the SQLite stores, and the `tagw` command-line tool.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌─────────────────────┐
//! │ config (TOML)│──▶│ Catalog            │──▶│ SQLite              │
//! │ [[types]]    │   │ TaggedCollection×N │   │ documents           │
//! └──────────────┘   └─────────┬──────────┘   │ tag_aggregations    │
//!                              │              └─────────────────────┘
//!                              ▼
//!                        ┌──────────┐
//!                        │   CLI    │
//!                        │  (tagw)  │
//!                        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tagw init
//! tagw put Track --id t1 --tags tags="rock live" --field user=alice
//! tagw tags Track tags --weights
//! tagw reconcile Track
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite aggregation and document stores |
//! | [`catalog`] | Configured document types |
//! | [`documents`] | `put`, `delete`, `tagged` commands |
//! | [`tags`] | Aggregate queries |
//! | [`reconcile`] | Drift recovery |
//! | [`stats`] | Database statistics |
//! | [`types`] | Type and context listing |

pub mod catalog;
pub mod config;
pub mod db;
pub mod documents;
pub mod migrate;
pub mod reconcile;
pub mod sqlite_store;
pub mod stats;
pub mod tags;
pub mod types;
