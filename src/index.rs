//! Search index: the FTS5 projection of every snippet.
//!
//! One document per snippet, keyed by `rowid = content_id`, so a snippet can
//! never own two documents. Writes are crate-private and only issued by
//! [`crate::sync`]; outside the crate the index is read-only.
//!
//! The table uses FTS5's default `unicode61` tokenizer, which splits on
//! non-alphanumeric characters and folds case. [`prepare_match_query`]
//! tokenizes user input the same way before building a MATCH expression.

use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use crate::error::Result;
use crate::models::{SearchDocument, SearchHit, SearchOptions};
use crate::store::push_snippet_filters;

/// Replace the whole document for `content_id`.
pub(crate) async fn upsert(conn: &mut SqliteConnection, doc: &SearchDocument) -> Result<()> {
    remove(conn, doc.content_id).await?;

    sqlx::query(
        r#"
        INSERT INTO search_index (rowid, content_id, description, content, language, tags)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(doc.content_id)
    .bind(doc.content_id)
    .bind(&doc.description)
    .bind(&doc.content)
    .bind(&doc.language)
    .bind(&doc.tags)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Replace only the `tags` column. Returns `false` when no document exists.
pub(crate) async fn update_tags(conn: &mut SqliteConnection, content_id: i64, tags: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE search_index SET tags = ? WHERE rowid = ?")
        .bind(tags)
        .bind(content_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn remove(conn: &mut SqliteConnection, content_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM search_index WHERE rowid = ?")
        .bind(content_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn clear(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query("DELETE FROM search_index")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn fetch(conn: &mut SqliteConnection, content_id: i64) -> Result<Option<SearchDocument>> {
    let row = sqlx::query(
        "SELECT rowid AS content_id, description, content, language, tags \
         FROM search_index WHERE rowid = ?",
    )
    .bind(content_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(document_from_row))
}

pub async fn fetch_all(conn: &mut SqliteConnection) -> Result<Vec<SearchDocument>> {
    let rows = sqlx::query(
        "SELECT rowid AS content_id, description, content, language, tags \
         FROM search_index ORDER BY rowid",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.iter().map(document_from_row).collect())
}

pub async fn count(conn: &mut SqliteConnection) -> Result<i64> {
    let n = sqlx::query_scalar("SELECT COUNT(*) FROM search_index")
        .fetch_one(&mut *conn)
        .await?;
    Ok(n)
}

/// Run a full-text query. `match_expr` comes from [`prepare_match_query`].
///
/// Results are ordered by bm25 rank, newest snippet first on ties.
pub async fn search(
    conn: &mut SqliteConnection,
    match_expr: &str,
    options: &SearchOptions,
    limit: i64,
) -> Result<Vec<SearchHit>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT search_index.rowid AS id,
               search_index.rank AS rank,
               s.description,
               s.language,
               COALESCE(snippet(search_index, 2, '[', ']', '...', 16), '') AS excerpt
        FROM search_index
        JOIN snippets s ON s.id = search_index.rowid
        WHERE search_index MATCH "#,
    );
    qb.push_bind(match_expr.to_string());
    push_snippet_filters(&mut qb, options.language.as_deref(), &options.tags);
    qb.push(" ORDER BY search_index.rank, s.id DESC LIMIT ");
    qb.push_bind(limit);

    let rows = qb.build().fetch_all(&mut *conn).await?;

    Ok(rows
        .iter()
        .map(|row| {
            let rank: f64 = row.get("rank");
            SearchHit {
                id: row.get("id"),
                score: -rank, // bm25 is lower-is-better
                description: row.get("description"),
                language: row.get("language"),
                excerpt: row.get("excerpt"),
            }
        })
        .collect())
}

/// Build an FTS5 MATCH expression from free text.
///
/// Input is split on non-alphanumeric characters. Double-quoted segments
/// become phrases; bare terms of two or more characters get a `*` prefix
/// operator when `prefix_match` is set. Terms are AND-ed. Returns `None`
/// when the input contains no searchable terms.
pub fn prepare_match_query(query: &str, prefix_match: bool) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    for (i, segment) in query.split('"').enumerate() {
        let words = tokenize(segment);
        if words.is_empty() {
            continue;
        }
        // Odd segments sit between a pair of quotes.
        if i % 2 == 1 {
            parts.push(format!("\"{}\"", words.join(" ")));
        } else {
            for word in words {
                if prefix_match && word.chars().count() >= 2 {
                    parts.push(format!("\"{}\"*", word));
                } else {
                    parts.push(format!("\"{}\"", word));
                }
            }
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> SearchDocument {
    SearchDocument {
        content_id: row.get("content_id"),
        description: row.get("description"),
        content: row.get("content"),
        language: row.get("language"),
        tags: row.get::<Option<String>, _>("tags").unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_terms() {
        assert_eq!(
            prepare_match_query("hello world", true).as_deref(),
            Some("\"hello\"* \"world\"*")
        );
    }

    #[test]
    fn test_single_char_terms_are_exact() {
        assert_eq!(
            prepare_match_query("a bc", true).as_deref(),
            Some("\"a\" \"bc\"*")
        );
    }

    #[test]
    fn test_prefix_disabled() {
        assert_eq!(
            prepare_match_query("hello world", false).as_deref(),
            Some("\"hello\" \"world\"")
        );
    }

    #[test]
    fn test_punctuation_is_a_separator() {
        assert_eq!(
            prepare_match_query("print('hi')", true).as_deref(),
            Some("\"print\"* \"hi\"*")
        );
    }

    #[test]
    fn test_fts_operators_are_neutralised() {
        assert_eq!(
            prepare_match_query("foo* OR (bar:baz) ^qux", false).as_deref(),
            Some("\"foo\" \"OR\" \"bar\" \"baz\" \"qux\"")
        );
    }

    #[test]
    fn test_quoted_phrase() {
        assert_eq!(
            prepare_match_query("\"hello world\" rust", true).as_deref(),
            Some("\"hello world\" \"rust\"*")
        );
    }

    #[test]
    fn test_unterminated_quote_is_a_phrase() {
        assert_eq!(
            prepare_match_query("x \"open ended", false).as_deref(),
            Some("\"x\" \"open ended\"")
        );
    }

    #[test]
    fn test_empty_and_symbol_only_queries() {
        assert_eq!(prepare_match_query("", true), None);
        assert_eq!(prepare_match_query("   ", true), None);
        assert_eq!(prepare_match_query("()*:^\"\"", true), None);
    }

    #[test]
    fn test_unicode_terms() {
        assert_eq!(
            prepare_match_query("größe café", false).as_deref(),
            Some("\"größe\" \"café\"")
        );
    }
}
