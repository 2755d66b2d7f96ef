//! Database schema migrations.
//!
//! Every statement is idempotent, so [`run_migrations`] runs on each
//! [`Library::open`](crate::library::Library::open) as well as on `codx init`.
//!
//! # Tables
//!
//! | Table | Purpose |
//! |-------|---------|
//! | `snippets` | System of record for snippet rows |
//! | `tags` | Tag vocabulary, unique by name |
//! | `snippet_tags` | Snippet/tag links, cascading from both parents |
//! | `search_index` | FTS5 projection, `rowid` = snippet id |

use sqlx::SqlitePool;
use tracing::info;

use crate::error::{LibraryError, Result};
use crate::sync;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snippets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            description TEXT,
            content TEXT NOT NULL CHECK (length(trim(content)) > 0),
            language TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snippet_tags (
            snippet_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY (snippet_id, tag_id),
            FOREIGN KEY (snippet_id) REFERENCES snippets(id) ON DELETE CASCADE,
            FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_snippets_language ON snippets(language)")
        .execute(&mut *tx)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_snippets_created_at ON snippets(created_at DESC)")
        .execute(&mut *tx)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tags_name ON tags(name)")
        .execute(&mut *tx)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_snippet_tags_tag_id ON snippet_tags(tag_id)")
        .execute(&mut *tx)
        .await?;

    // FTS5 CREATE is checked explicitly so a freshly added index can be
    // populated from rows that predate it.
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='search_index'",
    )
    .fetch_one(&mut *tx)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE search_index USING fts5(
                content_id UNINDEXED,
                description,
                content,
                language,
                tags
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LibraryError::Migration(format!("cannot create FTS5 search index: {}", e)))?;

        let populated = sync::rebuild(&mut *tx).await?;
        if populated > 0 {
            info!(documents = populated, "populated new search index");
        }
    }

    tx.commit().await?;
    Ok(())
}
