//! # codx
//!
//! **A local-first code snippet library with tags and full-text search.**
//!
//! Snippets (content, optional description and language) live in SQLite
//! together with a many-to-many tag vocabulary. An FTS5 table holds one
//! denormalized document per snippet (description, content, language and the
//! space-joined tag names) and is kept consistent with the relational tables
//! inside the same transaction as every mutation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌──────────────────────┐
//! │   CLI    │──▶│    Library    │──▶│ store / tags (rows)  │
//! │ (codx)   │   │   (facade)    │   └──────────┬───────────┘
//! └──────────┘   └───────┬───────┘              │ same tx
//!                        │ SyncEvent            ▼
//!                        └────────────▶ sync ──▶ index (FTS5)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! codx init
//! codx add --content "print('hi')" --language python --tag demo
//! codx search hi
//! codx index check
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL and foreign keys |
//! | `migrate` | Idempotent schema creation, run by [`Library::open`] |
//! | [`error`] | `LibraryError` taxonomy |
//! | [`models`] | Snippets, tags, search documents and hits |
//! | [`store`] | Relational store for snippet rows |
//! | [`tags`] | Tag catalog and snippet/tag links |
//! | [`index`] | FTS5 search index and query preparation |
//! | [`sync`] | Sync engine, rebuild and consistency check |
//! | [`library`] | Query facade used by every caller |
//! | [`get`] | `get` / `list` / `tags` rendering |
//! | [`search`] | `search` rendering |
//! | [`stats`] | Library statistics |

pub mod config;
pub mod db;
pub mod error;
pub mod get;
pub mod index;
pub mod library;
mod migrate;
pub mod models;
pub mod search;
pub mod stats;
pub mod store;
pub mod sync;
pub mod tags;

pub use error::{LibraryError, Result};
pub use library::Library;
pub use models::{NewSnippet, SearchHit, SearchOptions, Snippet, SnippetFilter, SnippetUpdate};
