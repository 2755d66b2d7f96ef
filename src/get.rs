//! Snippet retrieval and listing for the CLI.
//!
//! `codx get`, `codx list` and `codx tags` render what the
//! [`Library`] returns, either as text or as JSON (`--json`).

use anyhow::Result;

use crate::library::Library;
use crate::models::{Snippet, SnippetFilter};

/// CLI entry point. Fetches one snippet and prints it to stdout.
pub async fn run_get(library: &Library, id: i64, json: bool) -> Result<()> {
    let snippet = library.get_snippet(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snippet)?);
        return Ok(());
    }

    println!("--- Snippet ---");
    println!("id:           {}", snippet.id);
    println!(
        "description:  {}",
        snippet.description.as_deref().unwrap_or("(none)")
    );
    println!(
        "language:     {}",
        snippet.language.as_deref().unwrap_or("(none)")
    );
    println!("tags:         {}", format_tags(&snippet.tags));
    println!("created_at:   {}", format_ts_iso(snippet.created_at));
    println!("updated_at:   {}", format_ts_iso(snippet.updated_at));
    println!();
    println!("--- Content ---");
    println!("{}", snippet.content);

    Ok(())
}

pub async fn run_list(library: &Library, filter: &SnippetFilter, json: bool) -> Result<()> {
    let snippets = library.list_snippets(filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snippets)?);
        return Ok(());
    }

    if snippets.is_empty() {
        println!("No snippets.");
        return Ok(());
    }

    for snippet in &snippets {
        print_summary(snippet);
    }
    Ok(())
}

pub async fn run_tags(library: &Library) -> Result<()> {
    let tags = library.list_tags().await?;
    if tags.is_empty() {
        println!("No tags.");
        return Ok(());
    }

    println!("{:<32} {:>8}", "TAG", "SNIPPETS");
    for tag in &tags {
        println!("{:<32} {:>8}", tag.name, tag.snippet_count);
    }
    Ok(())
}

fn print_summary(snippet: &Snippet) {
    println!(
        "{}. {} [{}]",
        snippet.id,
        snippet.description.as_deref().unwrap_or("(untitled)"),
        snippet.language.as_deref().unwrap_or("-")
    );
    println!("    tags: {}", format_tags(&snippet.tags));
    println!("    updated: {}", format_ts_iso(snippet.updated_at));
}

fn format_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        "(none)".to_string()
    } else {
        tags.join(", ")
    }
}

/// Format a millisecond timestamp as ISO 8601 (UTC).
pub fn format_ts_iso(ts_millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_millis)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts_millis.to_string())
}
