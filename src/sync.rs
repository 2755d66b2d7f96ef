//! Sync engine: keeps the search index in step with the relational store.
//!
//! The facade reports every mutation as a [`SyncEvent`] on the same
//! transaction that performed it, and `SyncEngine::react` writes exactly one
//! index change for it before the transaction commits. The `tags` column is
//! always recomputed from the current links by [`join_tag_names`]; nothing is
//! maintained incrementally.
//!
//! | Event | Reaction |
//! |-------|----------|
//! | `SnippetCreated` | write the full document |
//! | `SnippetUpdated` | rewrite the full document from the store |
//! | `SnippetDeleted` | remove the document |
//! | `LinksChanged` | rewrite only the `tags` column |
//!
//! `rebuild` and [`check_consistency`] are the repair and verification
//! paths. The index is derived data and can always be recomputed.

use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::{LibraryError, Result};
use crate::index;
use crate::models::SearchDocument;
use crate::store;

/// A mutation the search index must react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    SnippetCreated(i64),
    SnippetUpdated(i64),
    SnippetDeleted(i64),
    LinksChanged(i64),
}

impl SyncEvent {
    pub fn snippet_id(&self) -> i64 {
        match *self {
            SyncEvent::SnippetCreated(id)
            | SyncEvent::SnippetUpdated(id)
            | SyncEvent::SnippetDeleted(id)
            | SyncEvent::LinksChanged(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncEngine;

impl SyncEngine {
    pub fn new() -> Self {
        Self
    }

    /// Apply the index side of `event` on the caller's transaction.
    pub(crate) async fn react(&self, conn: &mut SqliteConnection, event: SyncEvent) -> Result<()> {
        debug!(snippet_id = event.snippet_id(), ?event, "sync");
        match event {
            SyncEvent::SnippetCreated(id) | SyncEvent::SnippetUpdated(id) => {
                let doc = build_document(conn, id).await?;
                index::upsert(conn, &doc).await
            }
            SyncEvent::SnippetDeleted(id) => index::remove(conn, id).await,
            SyncEvent::LinksChanged(id) => {
                if !store::snippet_exists(conn, id).await? {
                    return Err(LibraryError::snippet_not_found(id));
                }
                let tags = join_tag_names(conn, id).await?;
                if !index::update_tags(conn, id, &tags).await? {
                    warn!(snippet_id = id, "no search document for live snippet, rewriting");
                    let doc = build_document(conn, id).await?;
                    index::upsert(conn, &doc).await?;
                }
                Ok(())
            }
        }
    }
}

/// Space-joined names of the tags currently linked to a snippet, by name.
pub async fn join_tag_names(conn: &mut SqliteConnection, snippet_id: i64) -> Result<String> {
    let tags: Option<String> = sqlx::query_scalar(
        r#"
        SELECT group_concat(name, ' ')
        FROM (
            SELECT t.name
            FROM snippet_tags st
            JOIN tags t ON t.id = st.tag_id
            WHERE st.snippet_id = ?
            ORDER BY t.name
        )
        "#,
    )
    .bind(snippet_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(tags.unwrap_or_default())
}

/// The document the index should hold for a snippet, derived from the store.
pub async fn build_document(conn: &mut SqliteConnection, snippet_id: i64) -> Result<SearchDocument> {
    let snippet = store::fetch_snippet(conn, snippet_id)
        .await?
        .ok_or_else(|| LibraryError::snippet_not_found(snippet_id))?;
    let tags = join_tag_names(conn, snippet_id).await?;

    Ok(SearchDocument {
        content_id: snippet.id,
        description: snippet.description,
        content: snippet.content,
        language: snippet.language,
        tags,
    })
}

/// Drop every document and recompute the index from the store.
///
/// Returns the number of documents written.
pub(crate) async fn rebuild(conn: &mut SqliteConnection) -> Result<usize> {
    index::clear(conn).await?;

    let ids = store::snippet_ids(conn).await?;
    for &id in &ids {
        let doc = build_document(conn, id).await?;
        index::upsert(conn, &doc).await?;
    }

    info!(documents = ids.len(), "search index rebuilt");
    Ok(ids.len())
}

/// Differences between the index and what the store says it should hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    /// Live snippets without a document.
    pub missing: Vec<i64>,
    /// Documents whose snippet no longer exists.
    pub orphaned: Vec<i64>,
    /// Documents whose fields differ from the store.
    pub stale: Vec<i64>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.orphaned.is_empty() && self.stale.is_empty()
    }

    pub fn into_result(self) -> Result<Self> {
        if self.is_consistent() {
            Ok(self)
        } else {
            Err(LibraryError::Inconsistency {
                missing: self.missing.len(),
                orphaned: self.orphaned.len(),
                stale: self.stale.len(),
            })
        }
    }
}

/// Compare every document against the store.
pub async fn check_consistency(conn: &mut SqliteConnection) -> Result<ConsistencyReport> {
    let mut indexed: BTreeMap<i64, SearchDocument> = index::fetch_all(conn)
        .await?
        .into_iter()
        .map(|doc| (doc.content_id, doc))
        .collect();

    let mut report = ConsistencyReport::default();

    for id in store::snippet_ids(conn).await? {
        let expected = build_document(conn, id).await?;
        match indexed.remove(&id) {
            None => report.missing.push(id),
            Some(actual) if actual != expected => report.stale.push(id),
            Some(_) => {}
        }
    }
    report.orphaned = indexed.into_keys().collect();

    if !report.is_consistent() {
        warn!(
            missing = report.missing.len(),
            orphaned = report.orphaned.len(),
            stale = report.stale.len(),
            "search index out of sync"
        );
    }

    Ok(report)
}
