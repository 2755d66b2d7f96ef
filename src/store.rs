//! Relational store: the system of record for snippet rows.
//!
//! Functions take an open connection, normally the transaction owned by
//! [`Library`](crate::library::Library), so that a row change and the index
//! write that follows it commit together.

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use crate::error::{LibraryError, Result};
use crate::models::{Snippet, SnippetFilter, SnippetUpdate};

/// Current time in Unix epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn require_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(LibraryError::Validation(
            "snippet content must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub(crate) async fn insert_snippet(
    conn: &mut SqliteConnection,
    description: Option<&str>,
    content: &str,
    language: Option<&str>,
) -> Result<i64> {
    require_content(content)?;
    let now = now_millis();

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO snippets (description, content, language, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(description)
    .bind(content)
    .bind(language)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Apply a partial update. `updated_at` is bumped even when no column
/// changes, and always moves strictly forward.
pub(crate) async fn update_snippet(
    conn: &mut SqliteConnection,
    id: i64,
    fields: &SnippetUpdate,
) -> Result<()> {
    if let Some(content) = &fields.content {
        require_content(content)?;
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE snippets SET updated_at = MAX(");
    qb.push_bind(now_millis());
    qb.push(", updated_at + 1)");

    if let Some(description) = &fields.description {
        qb.push(", description = ");
        qb.push_bind(description.clone());
    }
    if let Some(content) = &fields.content {
        qb.push(", content = ");
        qb.push_bind(content.clone());
    }
    if let Some(language) = &fields.language {
        qb.push(", language = ");
        qb.push_bind(language.clone());
    }
    qb.push(" WHERE id = ");
    qb.push_bind(id);

    let result = qb.build().execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(LibraryError::snippet_not_found(id));
    }
    Ok(())
}

/// Delete a snippet row. Links go with it through `ON DELETE CASCADE`.
pub(crate) async fn delete_snippet(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM snippets WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(LibraryError::snippet_not_found(id));
    }
    Ok(())
}

pub async fn fetch_snippet(conn: &mut SqliteConnection, id: i64) -> Result<Option<Snippet>> {
    let row = sqlx::query(
        "SELECT id, description, content, language, created_at, updated_at FROM snippets WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(snippet_from_row))
}

pub async fn snippet_exists(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM snippets WHERE id = ?)")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

/// Newest first, optionally filtered by language and required tags.
pub async fn list_snippets(
    conn: &mut SqliteConnection,
    filter: &SnippetFilter,
) -> Result<Vec<Snippet>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT s.id, s.description, s.content, s.language, s.created_at, s.updated_at \
         FROM snippets s WHERE 1 = 1",
    );
    push_snippet_filters(&mut qb, filter.language.as_deref(), &filter.tags);
    qb.push(" ORDER BY s.created_at DESC, s.id DESC");
    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ");
        qb.push_bind(limit);
    }

    let rows = qb.build().fetch_all(&mut *conn).await?;
    Ok(rows.iter().map(snippet_from_row).collect())
}

pub async fn snippet_ids(conn: &mut SqliteConnection) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar("SELECT id FROM snippets ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;
    Ok(ids)
}

/// Append `AND` clauses restricting alias `s` to a language and a tag set.
///
/// Both match case-insensitively; tag names themselves stay case-sensitive.
pub(crate) fn push_snippet_filters(
    qb: &mut QueryBuilder<'_, Sqlite>,
    language: Option<&str>,
    tags: &[String],
) {
    if let Some(language) = language {
        qb.push(" AND lower(s.language) = lower(");
        qb.push_bind(language.to_string());
        qb.push(")");
    }
    for tag in tags {
        qb.push(
            " AND EXISTS (SELECT 1 FROM snippet_tags st JOIN tags t ON t.id = st.tag_id \
             WHERE st.snippet_id = s.id AND lower(t.name) = lower(",
        );
        qb.push_bind(tag.trim().to_string());
        qb.push("))");
    }
}

fn snippet_from_row(row: &SqliteRow) -> Snippet {
    Snippet {
        id: row.get("id"),
        description: row.get("description"),
        content: row.get("content"),
        language: row.get("language"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        tags: Vec::new(),
    }
}
