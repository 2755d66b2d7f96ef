//! Tag catalog: the tag vocabulary and snippet/tag membership.
//!
//! Tags are never deleted when their last link goes away; the vocabulary is
//! durable and reusable.

use sqlx::{Row, SqliteConnection};

use crate::error::{LibraryError, Result};
use crate::models::TagUsage;

/// Trim a tag name and reject names the index cannot represent.
///
/// Tag names are joined with spaces in the search index, so a name with
/// inner whitespace would read back as several tags.
pub fn normalize_tag_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::Validation(
            "tag name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(LibraryError::Validation(format!(
            "tag name must not contain whitespace: {:?}",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

/// Return the id of `name`, creating the tag if it does not exist yet.
pub(crate) async fn get_or_create_tag(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    let name = normalize_tag_name(name)?;

    sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
        .bind(&name)
        .execute(&mut *conn)
        .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
        .bind(&name)
        .fetch_one(&mut *conn)
        .await?;

    Ok(id)
}

pub async fn find_tag(conn: &mut SqliteConnection, name: &str) -> Result<Option<i64>> {
    let id = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
        .bind(name.trim())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(id)
}

/// Link a tag to a snippet. Returns `false` when the link already existed.
pub(crate) async fn attach_tag(conn: &mut SqliteConnection, snippet_id: i64, tag_id: i64) -> Result<bool> {
    let snippet_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM snippets WHERE id = ?)")
            .bind(snippet_id)
            .fetch_one(&mut *conn)
            .await?;
    if !snippet_exists {
        return Err(LibraryError::snippet_not_found(snippet_id));
    }

    let tag_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?)")
        .bind(tag_id)
        .fetch_one(&mut *conn)
        .await?;
    if !tag_exists {
        return Err(LibraryError::NotFound {
            entity: "tag",
            id: tag_id.to_string(),
        });
    }

    let result = sqlx::query("INSERT OR IGNORE INTO snippet_tags (snippet_id, tag_id) VALUES (?, ?)")
        .bind(snippet_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove a link. Returns `false` when there was nothing to remove.
pub(crate) async fn detach_tag(conn: &mut SqliteConnection, snippet_id: i64, tag_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM snippet_tags WHERE snippet_id = ? AND tag_id = ?")
        .bind(snippet_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Drop every link of a snippet and attach `names` instead.
pub(crate) async fn replace_tags(
    conn: &mut SqliteConnection,
    snippet_id: i64,
    names: &[String],
) -> Result<()> {
    sqlx::query("DELETE FROM snippet_tags WHERE snippet_id = ?")
        .bind(snippet_id)
        .execute(&mut *conn)
        .await?;

    for name in names {
        let tag_id = get_or_create_tag(conn, name).await?;
        attach_tag(conn, snippet_id, tag_id).await?;
    }
    Ok(())
}

/// Names of the tags linked to a snippet, sorted.
pub async fn tags_of(conn: &mut SqliteConnection, snippet_id: i64) -> Result<Vec<String>> {
    let names = sqlx::query_scalar(
        r#"
        SELECT t.name
        FROM snippet_tags st
        JOIN tags t ON t.id = st.tag_id
        WHERE st.snippet_id = ?
        ORDER BY t.name
        "#,
    )
    .bind(snippet_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(names)
}

/// The whole vocabulary, including tags with no remaining links.
pub async fn list_tags(conn: &mut SqliteConnection) -> Result<Vec<TagUsage>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, COUNT(st.snippet_id) AS snippet_count
        FROM tags t
        LEFT JOIN snippet_tags st ON st.tag_id = t.id
        GROUP BY t.id, t.name
        ORDER BY t.name
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|row| TagUsage {
            id: row.get("id"),
            name: row.get("name"),
            snippet_count: row.get("snippet_count"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims() {
        assert_eq!(normalize_tag_name("  demo\t").unwrap(), "demo");
    }

    #[test]
    fn test_normalize_keeps_case() {
        assert_eq!(normalize_tag_name("Rust").unwrap(), "Rust");
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(matches!(
            normalize_tag_name("   "),
            Err(LibraryError::Validation(_))
        ));
    }

    #[test]
    fn test_normalize_rejects_inner_whitespace() {
        assert!(matches!(
            normalize_tag_name("two words"),
            Err(LibraryError::Validation(_))
        ));
    }
}
