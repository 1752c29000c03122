//! # Recall Harness CLI (`recall`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall chunk <corpus>` | Show chunk count and sizes |
//! | `recall embed <corpus>` | Embed chunks missing from the cache |
//! | `recall status <corpus>` | Show cache coverage for the corpus |
//! | `recall search <corpus>` | Run a hybrid query and print one page |
//!
//! ## Examples
//!
//! ```bash
//! recall embed ./book.md --config ./config/recall.toml
//! recall search ./book.md --keywords cat --keywords mat --query "feline pets"
//! recall search ./book.md --keywords deployment --page 2 --json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use recall_harness::search::SearchArgs;
use recall_harness::{chunk, config, embed_cmd, search};

/// Recall Harness CLI: hybrid keyword and semantic retrieval over a text
/// corpus.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Recall Harness: hybrid BM25 + embedding retrieval with rank fusion and reranking",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/recall.toml`. A missing file is an error;
    /// an empty file uses built-in defaults.
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk a corpus and print size statistics.
    Chunk {
        /// Corpus text file.
        corpus: PathBuf,

        /// Number of chunks to preview.
        #[arg(long, default_value = "3")]
        sample: usize,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Embed every chunk the cache does not yet hold.
    ///
    /// Batches run one at a time. A failed batch is reported and skipped;
    /// running the command again embeds only what is still missing.
    Embed {
        corpus: PathBuf,

        /// Chunks per provider request (1-99). Overrides config.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Show how many chunks need embedding without calling the provider.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show how much of the corpus the embedding cache covers.
    Status { corpus: PathBuf },

    /// Run a hybrid query.
    ///
    /// With neither --keywords nor --query, lists every chunk in corpus
    /// order.
    Search {
        corpus: PathBuf,

        /// BM25 keyword; repeat for several.
        #[arg(long, short = 'k')]
        keywords: Vec<String>,

        /// Semantic query (requires an embedding provider and a filled cache).
        #[arg(long, short = 'q')]
        query: Option<String>,

        /// Rerank depth. Overrides config.
        #[arg(long)]
        cutoff: Option<usize>,

        /// Page number, starting at 1.
        #[arg(long, default_value = "1")]
        page: usize,

        /// Results per page. Overrides config.
        #[arg(long)]
        page_size: Option<usize>,

        /// Print the page as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Chunk {
            corpus,
            sample,
            json,
        } => {
            chunk::run_chunk(&cfg, &corpus, sample, json)?;
        }
        Commands::Embed {
            corpus,
            batch_size,
            dry_run,
        } => {
            embed_cmd::run_embed(&cfg, &corpus, batch_size, dry_run).await?;
        }
        Commands::Status { corpus } => {
            embed_cmd::run_status(&cfg, &corpus).await?;
        }
        Commands::Search {
            corpus,
            keywords,
            query,
            cutoff,
            page,
            page_size,
            json,
        } => {
            let args = SearchArgs {
                keywords,
                query,
                cutoff,
                page,
                page_size,
                json,
            };
            search::run_search(&cfg, &corpus, args).await?;
        }
    }

    Ok(())
}
