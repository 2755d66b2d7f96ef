//! Library statistics and health overview.
//!
//! Gives a quick summary of what is stored: snippet, tag and link counts,
//! how many search documents exist, and a per-language breakdown. Used by
//! `codx stats`.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqliteConnection};

use crate::config::Config;
use crate::index;
use crate::library::Library;

#[derive(Debug, Clone, Serialize)]
pub struct LibraryStats {
    pub snippets: i64,
    pub tags: i64,
    /// Tags with no remaining links.
    pub unused_tags: i64,
    pub links: i64,
    pub documents: i64,
    pub languages: Vec<LanguageCount>,
    pub newest_snippet_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageCount {
    /// `None` for snippets without a language.
    pub language: Option<String>,
    pub count: i64,
}

pub async fn collect(conn: &mut SqliteConnection) -> crate::error::Result<LibraryStats> {
    let snippets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM snippets")
        .fetch_one(&mut *conn)
        .await?;

    let tags: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags")
        .fetch_one(&mut *conn)
        .await?;

    let unused_tags: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tags t WHERE NOT EXISTS (SELECT 1 FROM snippet_tags st WHERE st.tag_id = t.id)",
    )
    .fetch_one(&mut *conn)
    .await?;

    let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM snippet_tags")
        .fetch_one(&mut *conn)
        .await?;

    let documents = index::count(conn).await?;

    let newest_snippet_at: Option<i64> = sqlx::query_scalar("SELECT MAX(created_at) FROM snippets")
        .fetch_one(&mut *conn)
        .await?;

    let rows = sqlx::query(
        r#"
        SELECT language, COUNT(*) AS n
        FROM snippets
        GROUP BY language
        ORDER BY n DESC, language
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let languages = rows
        .iter()
        .map(|row| LanguageCount {
            language: row.get("language"),
            count: row.get("n"),
        })
        .collect();

    Ok(LibraryStats {
        snippets,
        tags,
        unused_tags,
        links,
        documents,
        languages,
        newest_snippet_at,
    })
}

/// Run the stats command: query the library and print a summary.
pub async fn run_stats(library: &Library, config: &Config) -> Result<()> {
    let stats = library.stats().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("codx — Library Stats");
    println!("====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Snippets:    {}", stats.snippets);
    println!(
        "  Tags:        {} ({} unused)",
        stats.tags, stats.unused_tags
    );
    println!("  Links:       {}", stats.links);
    println!("  Indexed:     {} / {}", stats.documents, stats.snippets);
    if let Some(ts) = stats.newest_snippet_at {
        println!("  Newest:      {}", crate::get::format_ts_iso(ts));
    }

    if !stats.languages.is_empty() {
        println!();
        println!("  By language:");
        println!("  {:<24} {:>8}", "LANGUAGE", "SNIPPETS");
        println!("  {}", "-".repeat(33));
        for l in &stats.languages {
            println!(
                "  {:<24} {:>8}",
                l.language.as_deref().unwrap_or("(none)"),
                l.count
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
