//! Query facade: the only API external callers use.
//!
//! Each mutating operation opens one transaction, performs the relational
//! change through [`store`] / [`tags`], hands the matching [`SyncEvent`] to the
//! [`SyncEngine`] on that same transaction, and commits. An error at any step
//! drops the transaction, rolling back the row change and the index write
//! together.
//!
//! Reads run inside a transaction too, so a snippet and its tag list come
//! from the same snapshot.
//!
//! ```no_run
//! # async fn demo() -> codx::error::Result<()> {
//! use codx::config::Config;
//! use codx::library::Library;
//! use codx::models::{NewSnippet, SearchOptions};
//!
//! let library = Library::open(&Config::with_db_path("snips.sqlite")).await?;
//! let id = library
//!     .create_snippet(NewSnippet::new("print('hi')").language("python"))
//!     .await?;
//! library.tag_snippet(id, "demo").await?;
//! let hits = library.search("demo", &SearchOptions::default()).await?;
//! assert_eq!(hits[0].id, id);
//! library.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! The facade does not expose its pool, and the write halves of [`store`],
//! [`tags`] and [`index`] are crate-private:
//!
//! ```compile_fail
//! # async fn demo(conn: &mut sqlx::SqliteConnection) {
//! codx::tags::attach_tag(conn, 1, 1).await.ok();
//! # }
//! ```
//!
//! ```compile_fail
//! # async fn demo(library: &codx::Library) {
//! let _ = library.pool();
//! # }
//! ```

use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::config::{Config, SearchConfig};
use crate::db;
use crate::error::{LibraryError, Result};
use crate::index;
use crate::migrate;
use crate::models::{
    NewSnippet, SearchHit, SearchOptions, Snippet, SnippetFilter, SnippetUpdate, TagUsage,
};
use crate::stats::{self, LibraryStats};
use crate::store;
use crate::sync::{self, ConsistencyReport, SyncEngine, SyncEvent};
use crate::tags;

const EXCERPT_CHARS: usize = 120;

pub struct Library {
    pool: SqlitePool,
    sync: SyncEngine,
    search: SearchConfig,
}

impl Library {
    /// Connect to the configured database and bring its schema up to date.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        info!(path = %config.db.path.display(), "library opened");

        Ok(Self {
            pool,
            sync: SyncEngine::new(),
            search: config.search.clone(),
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    // ============ Snippets ============

    pub async fn create_snippet(&self, new: NewSnippet) -> Result<i64> {
        let mut tx = self.begin().await?;

        let id = store::insert_snippet(
            &mut *tx,
            new.description.as_deref(),
            &new.content,
            new.language.as_deref(),
        )
        .await?;

        for name in &new.tags {
            let tag_id = tags::get_or_create_tag(&mut *tx, name).await?;
            tags::attach_tag(&mut *tx, id, tag_id).await?;
        }

        self.sync.react(&mut *tx, SyncEvent::SnippetCreated(id)).await?;
        tx.commit().await?;

        info!(snippet_id = id, "snippet created");
        Ok(id)
    }

    pub async fn get_snippet(&self, id: i64) -> Result<Snippet> {
        let mut tx = self.begin().await?;
        let mut snippet = store::fetch_snippet(&mut *tx, id)
            .await?
            .ok_or_else(|| LibraryError::snippet_not_found(id))?;
        snippet.tags = tags::tags_of(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(snippet)
    }

    pub async fn list_snippets(&self, filter: &SnippetFilter) -> Result<Vec<Snippet>> {
        let mut tx = self.begin().await?;
        let mut snippets = store::list_snippets(&mut *tx, filter).await?;
        for snippet in &mut snippets {
            snippet.tags = tags::tags_of(&mut *tx, snippet.id).await?;
        }
        tx.commit().await?;
        Ok(snippets)
    }

    /// Apply a partial update and return the snippet as stored afterwards.
    pub async fn update_snippet(&self, id: i64, update: SnippetUpdate) -> Result<Snippet> {
        let mut tx = self.begin().await?;

        store::update_snippet(&mut *tx, id, &update).await?;
        if let Some(names) = &update.tags {
            tags::replace_tags(&mut *tx, id, names).await?;
        }

        self.sync.react(&mut *tx, SyncEvent::SnippetUpdated(id)).await?;

        let mut snippet = store::fetch_snippet(&mut *tx, id)
            .await?
            .ok_or_else(|| LibraryError::snippet_not_found(id))?;
        snippet.tags = tags::tags_of(&mut *tx, id).await?;

        tx.commit().await?;

        debug!(snippet_id = id, "snippet updated");
        Ok(snippet)
    }

    pub async fn delete_snippet(&self, id: i64) -> Result<()> {
        let mut tx = self.begin().await?;
        store::delete_snippet(&mut *tx, id).await?;
        self.sync.react(&mut *tx, SyncEvent::SnippetDeleted(id)).await?;
        tx.commit().await?;

        info!(snippet_id = id, "snippet deleted");
        Ok(())
    }

    // ============ Tags ============

    /// Attach `name` to a snippet, creating the tag if needed.
    ///
    /// Returns `false` when the link already existed; nothing is written then.
    pub async fn tag_snippet(&self, id: i64, name: &str) -> Result<bool> {
        let mut tx = self.begin().await?;

        if !store::snippet_exists(&mut *tx, id).await? {
            return Err(LibraryError::snippet_not_found(id));
        }
        let tag_id = tags::get_or_create_tag(&mut *tx, name).await?;
        let attached = tags::attach_tag(&mut *tx, id, tag_id).await?;
        if attached {
            self.sync.react(&mut *tx, SyncEvent::LinksChanged(id)).await?;
        }
        tx.commit().await?;

        debug!(snippet_id = id, tag = name, attached, "tag attach");
        Ok(attached)
    }

    /// Detach `name` from a snippet. The tag itself is kept.
    ///
    /// Returns `false` when the snippet did not carry the tag.
    pub async fn untag_snippet(&self, id: i64, name: &str) -> Result<bool> {
        let mut tx = self.begin().await?;

        if !store::snippet_exists(&mut *tx, id).await? {
            return Err(LibraryError::snippet_not_found(id));
        }
        let tag_id = tags::find_tag(&mut *tx, name)
            .await?
            .ok_or_else(|| LibraryError::tag_not_found(name.trim()))?;
        let detached = tags::detach_tag(&mut *tx, id, tag_id).await?;
        if detached {
            self.sync.react(&mut *tx, SyncEvent::LinksChanged(id)).await?;
        }
        tx.commit().await?;

        debug!(snippet_id = id, tag = name, detached, "tag detach");
        Ok(detached)
    }

    pub async fn tags_of(&self, id: i64) -> Result<Vec<String>> {
        let mut tx = self.begin().await?;
        if !store::snippet_exists(&mut *tx, id).await? {
            return Err(LibraryError::snippet_not_found(id));
        }
        let names = tags::tags_of(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(names)
    }

    pub async fn list_tags(&self) -> Result<Vec<TagUsage>> {
        let mut tx = self.begin().await?;
        let usage = tags::list_tags(&mut *tx).await?;
        tx.commit().await?;
        Ok(usage)
    }

    // ============ Search ============

    /// Full-text search over description, content, language and tags.
    ///
    /// A blank query lists the snippets that pass the filters instead, newest
    /// first, with a score of zero. A query made only of punctuation has no
    /// searchable terms and matches nothing.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let limit = options.limit.unwrap_or(self.search.limit);
        if limit < 1 {
            return Err(LibraryError::Validation(
                "search limit must be >= 1".to_string(),
            ));
        }

        let mut tx = self.begin().await?;

        let hits = if query.trim().is_empty() {
            let filter = SnippetFilter {
                language: options.language.clone(),
                tags: options.tags.clone(),
                limit: Some(limit),
            };
            store::list_snippets(&mut *tx, &filter)
                .await?
                .into_iter()
                .map(|s| SearchHit {
                    id: s.id,
                    score: 0.0,
                    excerpt: excerpt(&s.content),
                    description: s.description,
                    language: s.language,
                })
                .collect()
        } else {
            match index::prepare_match_query(query, self.search.prefix_match) {
                Some(match_expr) => {
                    debug!(query, %match_expr, "search");
                    index::search(&mut *tx, &match_expr, options, limit).await?
                }
                None => {
                    debug!(query, "no searchable terms");
                    Vec::new()
                }
            }
        };

        tx.commit().await?;
        Ok(hits)
    }

    // ============ Maintenance ============

    /// Recompute every search document from the store in one transaction.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let mut tx = self.begin().await?;
        let written = sync::rebuild(&mut *tx).await?;
        tx.commit().await?;
        Ok(written)
    }

    /// Compare the index with the store without changing anything.
    pub async fn check_index(&self) -> Result<ConsistencyReport> {
        let mut tx = self.begin().await?;
        let report = sync::check_consistency(&mut *tx).await?;
        tx.commit().await?;
        Ok(report)
    }

    /// Like [`check_index`](Self::check_index), but an inconsistent index is
    /// an [`LibraryError::Inconsistency`].
    pub async fn ensure_consistent(&self) -> Result<ConsistencyReport> {
        self.check_index().await?.into_result()
    }

    pub async fn stats(&self) -> Result<LibraryStats> {
        let mut tx = self.begin().await?;
        let stats = stats::collect(&mut *tx).await?;
        tx.commit().await?;
        Ok(stats)
    }
}

fn excerpt(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_library(tmp: &TempDir) -> Library {
        let config = Config::with_db_path(tmp.path().join("codx.sqlite"));
        Library::open(&config).await.unwrap()
    }

    async fn indexed(library: &Library, id: i64) -> Option<crate::models::SearchDocument> {
        let mut conn = library.pool.acquire().await.unwrap();
        index::fetch(&mut *conn, id).await.unwrap()
    }

    async fn count(library: &Library, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(&library.pool).await.unwrap()
    }

    async fn search_ids(library: &Library, query: &str) -> Vec<i64> {
        library
            .search(query, &SearchOptions::default())
            .await
            .unwrap()
            .iter()
            .map(|h| h.id)
            .collect()
    }

    #[test]
    fn test_excerpt_flattens_whitespace() {
        assert_eq!(excerpt("fn main() {\n    run();\n}"), "fn main() { run(); }");
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(EXCERPT_CHARS + 10);
        let e = excerpt(&long);
        assert!(e.ends_with("..."));
        assert_eq!(e.chars().count(), EXCERPT_CHARS + 3);
    }

    #[tokio::test]
    async fn test_update_rewrites_document() {
        let tmp = TempDir::new().unwrap();
        let library = open_library(&tmp).await;

        let id = library
            .create_snippet(NewSnippet::new("let x = 1;").language("rust"))
            .await
            .unwrap();
        library
            .update_snippet(id, SnippetUpdate::default().content("let y = 2;"))
            .await
            .unwrap();

        let doc = indexed(&library, id).await.unwrap();
        assert_eq!(doc.content, "let y = 2;");
        assert_eq!(doc.language.as_deref(), Some("rust"));
    }

    #[tokio::test]
    async fn test_get_or_create_tag_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let library = open_library(&tmp).await;
        let mut conn = library.pool.acquire().await.unwrap();

        let first = tags::get_or_create_tag(&mut *conn, "rust").await.unwrap();
        let second = tags::get_or_create_tag(&mut *conn, "  rust ").await.unwrap();
        assert_eq!(first, second);

        let other_case = tags::get_or_create_tag(&mut *conn, "Rust").await.unwrap();
        assert_ne!(first, other_case);

        drop(conn);
        assert_eq!(count(&library, "SELECT COUNT(*) FROM tags").await, 2);
    }

    #[tokio::test]
    async fn test_index_tags_follow_attach_and_detach() {
        let tmp = TempDir::new().unwrap();
        let library = open_library(&tmp).await;

        let id = library
            .create_snippet(NewSnippet::new("docker ps").description("containers"))
            .await
            .unwrap();
        assert_eq!(indexed(&library, id).await.unwrap().tags, "");

        library.tag_snippet(id, "ops").await.unwrap();
        library.tag_snippet(id, "docker").await.unwrap();
        library.tag_snippet(id, "cli").await.unwrap();
        assert_eq!(indexed(&library, id).await.unwrap().tags, "cli docker ops");

        // Re-attaching leaves the document untouched.
        assert!(!library.tag_snippet(id, "ops").await.unwrap());
        assert_eq!(indexed(&library, id).await.unwrap().tags, "cli docker ops");

        library.untag_snippet(id, "docker").await.unwrap();
        assert_eq!(indexed(&library, id).await.unwrap().tags, "cli ops");
        assert!(!library.untag_snippet(id, "docker").await.unwrap());

        library.untag_snippet(id, "cli").await.unwrap();
        library.untag_snippet(id, "ops").await.unwrap();

        let doc = indexed(&library, id).await.unwrap();
        assert_eq!(doc.tags, "");
        assert_eq!(doc.description.as_deref(), Some("containers"));
        assert_eq!(doc.content, "docker ps");

        let mut conn = library.pool.acquire().await.unwrap();
        let joined = sync::join_tag_names(&mut *conn, id).await.unwrap();
        assert_eq!(joined, doc.tags);
        drop(conn);

        library.ensure_consistent().await.unwrap();
    }

    #[tokio::test]
    async fn test_link_written_around_sync_is_detected() {
        let tmp = TempDir::new().unwrap();
        let library = open_library(&tmp).await;

        let id = library
            .create_snippet(NewSnippet::new("hidden body"))
            .await
            .unwrap();

        let mut conn = library.pool.acquire().await.unwrap();
        let tag_id = tags::get_or_create_tag(&mut *conn, "secret").await.unwrap();
        assert!(tags::attach_tag(&mut *conn, id, tag_id).await.unwrap());
        drop(conn);

        assert!(search_ids(&library, "secret").await.is_empty());
        let report = library.check_index().await.unwrap();
        assert_eq!(report.stale, vec![id]);

        library.rebuild_index().await.unwrap();
        assert_eq!(search_ids(&library, "secret").await, vec![id]);
        library.ensure_consistent().await.unwrap();
    }

    #[tokio::test]
    async fn test_check_and_rebuild_after_tampering() {
        let tmp = TempDir::new().unwrap();
        let library = open_library(&tmp).await;

        let a = library
            .create_snippet(NewSnippet::new("alpha").tag("x"))
            .await
            .unwrap();
        let b = library.create_snippet(NewSnippet::new("beta")).await.unwrap();
        let c = library.create_snippet(NewSnippet::new("gamma")).await.unwrap();

        assert!(library.check_index().await.unwrap().is_consistent());

        sqlx::query("DELETE FROM search_index WHERE rowid = ?")
            .bind(a)
            .execute(&library.pool)
            .await
            .unwrap();
        sqlx::query("UPDATE search_index SET content = 'tampered' WHERE rowid = ?")
            .bind(b)
            .execute(&library.pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO search_index (rowid, content_id, description, content, language, tags) \
             VALUES (999, 999, NULL, 'ghost', NULL, '')",
        )
        .execute(&library.pool)
        .await
        .unwrap();

        let report = library.check_index().await.unwrap();
        assert_eq!(report.missing, vec![a]);
        assert_eq!(report.stale, vec![b]);
        assert_eq!(report.orphaned, vec![999]);

        let err = library.ensure_consistent().await.unwrap_err();
        assert!(matches!(
            err,
            LibraryError::Inconsistency {
                missing: 1,
                orphaned: 1,
                stale: 1
            }
        ));

        assert_eq!(library.rebuild_index().await.unwrap(), 3);
        assert!(library.check_index().await.unwrap().is_consistent());
        assert_eq!(search_ids(&library, "alpha").await, vec![a]);
        assert_eq!(search_ids(&library, "gamma").await, vec![c]);
        assert!(search_ids(&library, "ghost").await.is_empty());
    }

    #[tokio::test]
    async fn test_tag_change_repairs_missing_document() {
        let tmp = TempDir::new().unwrap();
        let library = open_library(&tmp).await;

        let id = library.create_snippet(NewSnippet::new("lost doc")).await.unwrap();
        sqlx::query("DELETE FROM search_index")
            .execute(&library.pool)
            .await
            .unwrap();

        library.tag_snippet(id, "found").await.unwrap();
        assert_eq!(search_ids(&library, "lost").await, vec![id]);
        library.ensure_consistent().await.unwrap();
    }

    #[tokio::test]
    async fn test_reopen_populates_dropped_index() {
        let tmp = TempDir::new().unwrap();
        let library = open_library(&tmp).await;

        let id = library
            .create_snippet(NewSnippet::new("persisted").tag("durable"))
            .await
            .unwrap();
        sqlx::query("DROP TABLE search_index")
            .execute(&library.pool)
            .await
            .unwrap();
        library.close().await;

        let reopened = open_library(&tmp).await;
        assert_eq!(search_ids(&reopened, "durable").await, vec![id]);
        reopened.ensure_consistent().await.unwrap();

        let stats = reopened.stats().await.unwrap();
        assert_eq!(stats.snippets, 1);
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.links, 1);
    }
}
