//! Core data models shared by the store, the tag catalog, the search index
//! and the CLI renderers.
//!
//! Timestamps are Unix epoch milliseconds.

use serde::Serialize;

/// A stored snippet together with its current tag names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    pub id: i64,
    pub description: Option<String>,
    pub content: String,
    pub language: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Sorted by name. Empty when read straight from the store.
    pub tags: Vec<String>,
}

/// Input for creating a snippet.
#[derive(Debug, Clone, Default)]
pub struct NewSnippet {
    pub description: Option<String>,
    pub content: String,
    pub language: Option<String>,
    pub tags: Vec<String>,
}

impl NewSnippet {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn tag(mut self, name: impl Into<String>) -> Self {
        self.tags.push(name.into());
        self
    }
}

/// Partial update of a snippet.
///
/// `None` leaves a field untouched. For the optional columns,
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct SnippetUpdate {
    pub description: Option<Option<String>>,
    pub content: Option<String>,
    pub language: Option<Option<String>>,
    /// Replacement tag set; `None` keeps the current links.
    pub tags: Option<Vec<String>>,
}

impl SnippetUpdate {
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn language(mut self, language: Option<String>) -> Self {
        self.language = Some(language);
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }
}

/// Filters for listing snippets.
#[derive(Debug, Clone, Default)]
pub struct SnippetFilter {
    /// Case-insensitive language match.
    pub language: Option<String>,
    /// Every tag listed here must be linked to the snippet.
    pub tags: Vec<String>,
    pub limit: Option<i64>,
}

/// A tag name with the number of snippets currently linked to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagUsage {
    pub id: i64,
    pub name: String,
    pub snippet_count: i64,
}

/// The denormalized, per-snippet projection stored in the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchDocument {
    pub content_id: i64,
    pub description: Option<String>,
    pub content: String,
    pub language: Option<String>,
    /// Space-joined tag names, ordered by name.
    pub tags: String,
}

/// Options for a full-text query.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<i64>,
    pub language: Option<String>,
    pub tags: Vec<String>,
}

/// One search match.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: i64,
    /// Negated bm25 rank; higher is better. Zero for unranked listings.
    pub score: f64,
    pub description: Option<String>,
    pub language: Option<String>,
    pub excerpt: String,
}
