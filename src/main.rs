//! # codx CLI
//!
//! The `codx` binary is a thin front end over [`codx::Library`]: every
//! command opens the library, performs one facade call, and renders the
//! result on stdout. Logs go to stderr.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `codx init` | Create the database and schema |
//! | `codx add` | Store a new snippet |
//! | `codx get <id>` | Show one snippet |
//! | `codx list` | List snippets, newest first |
//! | `codx edit <id>` | Update fields and/or the tag set |
//! | `codx delete <id>` | Remove a snippet |
//! | `codx tag <id> <name>...` | Attach tags |
//! | `codx untag <id> <name>...` | Detach tags |
//! | `codx tags` | Show the tag vocabulary |
//! | `codx search "<query>"` | Full-text search |
//! | `codx index rebuild` | Recompute the search index |
//! | `codx index check` | Verify the search index |
//! | `codx stats` | Library statistics |

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use codx::config;
use codx::library::Library;
use codx::models::{NewSnippet, SearchOptions, SnippetFilter, SnippetUpdate};
use codx::{get, search, stats};

/// codx: a local-first code snippet library with tags and full-text search.
#[derive(Parser)]
#[command(name = "codx", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/codx.toml`. When the file does not exist the
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/codx.toml")]
    config: PathBuf,

    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Store a new snippet.
    ///
    /// Content comes from `--content`, from `--file`, or from stdin.
    Add {
        #[arg(long, short = 'c', conflicts_with = "file")]
        content: Option<String>,

        /// Read the content from a file.
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long, short = 'd')]
        description: Option<String>,

        #[arg(long, short = 'l')]
        language: Option<String>,

        /// Tag to attach; repeatable.
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
    },

    /// Show one snippet.
    Get {
        id: i64,

        #[arg(long)]
        json: bool,
    },

    /// List snippets, newest first.
    List {
        #[arg(long, short = 'l')]
        language: Option<String>,

        /// Only snippets carrying this tag; repeatable (all must match).
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,

        #[arg(long)]
        limit: Option<i64>,

        #[arg(long)]
        json: bool,
    },

    /// Update a snippet. Fields that are not given stay as they are.
    Edit {
        id: i64,

        #[arg(long, short = 'c', conflicts_with = "file")]
        content: Option<String>,

        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long, short = 'd', conflicts_with = "clear_description")]
        description: Option<String>,

        #[arg(long)]
        clear_description: bool,

        #[arg(long, short = 'l', conflicts_with = "clear_language")]
        language: Option<String>,

        #[arg(long)]
        clear_language: bool,

        /// Replace the tag set with this comma-separated list (`""` clears it).
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
    },

    /// Delete a snippet and its search document.
    Delete { id: i64 },

    /// Attach tags to a snippet.
    Tag {
        id: i64,
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Detach tags from a snippet. The tags stay in the vocabulary.
    Untag {
        id: i64,
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Show every tag with its usage count.
    Tags,

    /// Full-text search over description, content, language and tags.
    Search {
        query: String,

        #[arg(long, short = 'l')]
        language: Option<String>,

        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,

        #[arg(long)]
        limit: Option<i64>,

        #[arg(long)]
        json: bool,
    },

    /// Maintain the search index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Show library statistics.
    Stats,
}

#[derive(Subcommand)]
enum IndexAction {
    /// Drop and recompute every search document from the store.
    Rebuild,
    /// Compare the search index with the store; exits non-zero on mismatch.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let cfg = config::load_or_default(&cli.config)?;
    let library = Library::open(&cfg)
        .await
        .with_context(|| format!("Failed to open library at {}", cfg.db.path.display()))?;

    let result = run(&library, &cfg, cli.command).await;
    library.close().await;
    result
}

async fn run(library: &Library, cfg: &config::Config, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Add {
            content,
            file,
            description,
            language,
            tags,
        } => {
            let content = match read_content(content, file)? {
                Some(c) => c,
                None => std::io::read_to_string(std::io::stdin())
                    .context("Failed to read snippet content from stdin")?,
            };
            let id = library
                .create_snippet(NewSnippet {
                    description,
                    content,
                    language,
                    tags,
                })
                .await?;
            println!("created snippet {}", id);
        }
        Commands::Get { id, json } => {
            get::run_get(library, id, json).await?;
        }
        Commands::List {
            language,
            tags,
            limit,
            json,
        } => {
            let filter = SnippetFilter {
                language,
                tags,
                limit: Some(limit.unwrap_or(cfg.search.limit)),
            };
            get::run_list(library, &filter, json).await?;
        }
        Commands::Edit {
            id,
            content,
            file,
            description,
            clear_description,
            language,
            clear_language,
            tags,
        } => {
            let update = SnippetUpdate {
                content: read_content(content, file)?,
                description: optional_field(description, clear_description),
                language: optional_field(language, clear_language),
                tags: tags.map(|t| t.into_iter().filter(|n| !n.trim().is_empty()).collect()),
            };
            let snippet = library.update_snippet(id, update).await?;
            println!("updated snippet {}", snippet.id);
        }
        Commands::Delete { id } => {
            library.delete_snippet(id).await?;
            println!("deleted snippet {}", id);
        }
        Commands::Tag { id, names } => {
            for name in &names {
                if library.tag_snippet(id, name).await? {
                    println!("tagged {} with {}", id, name.trim());
                } else {
                    println!("{} already tagged with {}", id, name.trim());
                }
            }
        }
        Commands::Untag { id, names } => {
            for name in &names {
                if library.untag_snippet(id, name).await? {
                    println!("untagged {} from {}", name.trim(), id);
                } else {
                    println!("{} was not tagged with {}", id, name.trim());
                }
            }
        }
        Commands::Tags => {
            get::run_tags(library).await?;
        }
        Commands::Search {
            query,
            language,
            tags,
            limit,
            json,
        } => {
            let options = SearchOptions {
                limit,
                language,
                tags,
            };
            search::run_search(library, &query, &options, json).await?;
        }
        Commands::Index { action } => match action {
            IndexAction::Rebuild => {
                let written = library.rebuild_index().await?;
                println!("rebuilt search index: {} documents", written);
            }
            IndexAction::Check => {
                let report = library.check_index().await?;
                if report.is_consistent() {
                    println!("search index ok");
                } else {
                    println!("missing:  {:?}", report.missing);
                    println!("orphaned: {:?}", report.orphaned);
                    println!("stale:    {:?}", report.stale);
                    report.into_result()?;
                }
            }
        },
        Commands::Stats => {
            stats::run_stats(library, cfg).await?;
        }
    }

    Ok(())
}

/// Content from `--content` or `--file`, if either was given.
fn read_content(content: Option<String>, file: Option<PathBuf>) -> Result<Option<String>> {
    match (content, file) {
        (Some(c), _) => Ok(Some(c)),
        (None, Some(path)) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(Some(text))
        }
        (None, None) => Ok(None),
    }
}

fn optional_field(value: Option<String>, clear: bool) -> Option<Option<String>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

