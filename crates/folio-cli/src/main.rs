//! folio command-line editor.
//!
//! Works directly against the SQLite record store named in the config file.
//!
//! ```bash
//! folio page-new home "Home" --published
//! folio add home columns
//! folio add home image --parent <columns-id> --slot right
//! folio show home
//! folio move home <block-id> zone:root
//! folio rm home <block-id>
//! folio upload ./hero.png images/hero.png
//! ```
//!
//! Block ids are printed by `show` and `add`; any unique hex prefix works.
//! UUIDv7 ids start with a timestamp, so a unique prefix is usually long.
//!
//! Config is read from `$FOLIO_CONFIG` or `<config_dir>/folio/folio.toml`.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use folio_store::{FolioConfig, LocalBlobStore, SqliteRecordStore};

use commands::Ctx;

/// Edit folio pages from the terminal.
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Block editor for folio pages")]
struct Args {
    /// Config file (defaults to $FOLIO_CONFIG or the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the SQLite database path
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a page
    PageNew {
        slug: String,
        title: String,
        /// content, resume, or link
        #[arg(long, default_value = "content")]
        kind: String,
        #[arg(long)]
        published: bool,
        /// Navigation order (defaults to after the last page)
        #[arg(long)]
        nav_order: Option<f64>,
    },
    /// List pages in navigation order
    Pages,
    /// Print a page's block outline
    Show { slug: String },
    /// Add a block at the end of the root or of a column slot
    Add {
        slug: String,
        kind: String,
        /// Columns block to add into (id or unique prefix)
        #[arg(long)]
        parent: Option<String>,
        /// left or right (default left)
        #[arg(long)]
        slot: Option<String>,
    },
    /// Replace a block's payload with JSON
    Edit { slug: String, block: String, json: String },
    /// Move a block onto another block, `root`, or a `zone:` marker
    Move { slug: String, block: String, target: String },
    /// Delete a block
    Rm { slug: String, block: String },
    /// Upload a file to the blob store
    Upload { file: PathBuf, dest: String },
    /// List uploaded media
    Media {
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Print the effective configuration
    Config,
}

fn load_config(args: &Args) -> Result<FolioConfig> {
    let config = match &args.config {
        Some(path) => FolioConfig::load_from(path)?,
        None => FolioConfig::load()?,
    };
    Ok(match &args.database {
        Some(db) => config.with_database(db),
        None => config,
    })
}

fn open_ctx(config: &FolioConfig) -> Result<Ctx> {
    if let Some(parent) = config.database.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let records = SqliteRecordStore::open(&config.database)
        .with_context(|| format!("opening {}", config.database.display()))?;
    tracing::debug!(db = %config.database.display(), "record store opened");

    Ok(Ctx {
        records: Arc::new(records),
        blobs: Box::new(LocalBlobStore::new(&config.blob_root, &config.public_base_url)),
        settings: config.editor.settings(),
    })
}

async fn run(args: Args) -> Result<String> {
    let config = load_config(&args)?;
    let ctx = match args.command {
        Command::Config => return Ok(config.to_toml()?),
        _ => open_ctx(&config)?,
    };
    match &args.command {
        Command::PageNew {
            slug,
            title,
            kind,
            published,
            nav_order,
        } => commands::page_new(&ctx, slug, title, kind, *published, *nav_order).await,
        Command::Pages => commands::pages(&ctx).await,
        Command::Show { slug } => commands::show(&ctx, slug).await,
        Command::Add {
            slug,
            kind,
            parent,
            slot,
        } => commands::add(&ctx, slug, kind, parent.as_deref(), slot.as_deref()).await,
        Command::Edit { slug, block, json } => commands::edit(&ctx, slug, block, json).await,
        Command::Move { slug, block, target } => {
            commands::move_block(&ctx, slug, block, target).await
        }
        Command::Rm { slug, block } => commands::remove(&ctx, slug, block).await,
        Command::Upload { file, dest } => commands::upload(&ctx, file, dest).await,
        Command::Media { prefix } => commands::media(&ctx, prefix).await,
        Command::Config => Ok(config.to_toml()?),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _telemetry = match folio_telemetry::init("folio") {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("tracing setup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let args = Args::parse();
    match run(args).await {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
