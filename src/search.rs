//! `codx search`: run a query through the [`Library`] and print the hits.

use anyhow::Result;

use crate::library::Library;
use crate::models::SearchOptions;

pub async fn run_search(
    library: &Library,
    query: &str,
    options: &SearchOptions,
    json: bool,
) -> Result<()> {
    let hits = library.search(query, options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} [{}]",
            i + 1,
            hit.score,
            hit.description.as_deref().unwrap_or("(untitled)"),
            hit.language.as_deref().unwrap_or("-")
        );
        println!("    excerpt: \"{}\"", hit.excerpt.replace('\n', " ").trim());
        println!("    id: {}", hit.id);
        println!();
    }

    Ok(())
}
