//! # Trackflow
//!
//! Command-line front end for the track collection algebra. A catalog
//! snapshot stands in for the remote catalog and a SQLite database serves as
//! the cache.
//!
//! ## Usage
//!
//! ```bash
//! # Print a playlist without duplicates
//! trackflow --catalog catalog.json list playlist "Road Trip" --dedupe
//!
//! # Export the most energetic tracks of an album
//! trackflow export album Kind_of_Blue --sort energy --descending --first 5
//!
//! # Keep a random sample of an artist in the cache under a new id
//! trackflow persist artist "Miles Davis" --sample 20 --as miles-sample
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use std::fs;
use std::rc::Rc;
use trackflow::catalog::CatalogSnapshot;
use trackflow::cli::{self, Target};
use trackflow::completion;
use trackflow::config::RuntimeConfig;
use trackflow::{CacheStore, CatalogClient, Session, SqliteCache, StaticCatalog, TrackCollection};

/// Main entry point for Trackflow.
///
/// Initializes logging, parses command-line arguments, and routes commands
/// to the library. Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug trackflow list album x` - Enable debug logging
/// - `RUST_LOG=trackflow::source=info trackflow ...` - Show remote fetches
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let config = || runtime_config(&args);

    match &args.command {
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(*shell), &mut cmd);
        }
        cli::Command::List { target, pipeline } => {
            let config = config()?;
            let session = open_session(&config)?;
            let collection = pipeline.apply(open_target(&session, target)?);
            for item in collection.items() {
                println!("{}", item?);
            }
        }
        cli::Command::Export {
            target,
            pipeline,
            output,
        } => {
            let config = config()?;
            let session = open_session(&config)?;
            let collection = pipeline.apply(open_target(&session, target)?);
            let export = collection
                .to_table_export()
                .context("Failed to build table export")?;
            let json = export.to_json_pretty()?;
            match output {
                Some(path) => {
                    fs::write(path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Exported {} tracks to {}", export.tracks.len(), path.display());
                }
                None => println!("{json}"),
            }
        }
        cli::Command::Persist {
            target,
            pipeline,
            store_as,
        } => {
            let config = config()?;
            let session = open_session(&config)?;
            let mut collection = pipeline.apply(open_target(&session, target)?);
            if let Some(id) = store_as {
                collection = collection.with_id(id.clone());
            }
            let id = collection.id().to_owned();
            collection
                .persist(None)
                .with_context(|| format!("Failed to persist collection '{id}'"))?;
            println!("Stored collection '{id}'");
        }
        cli::Command::Names { kind, shell } => {
            let config = config()?;
            let path = config
                .catalog_path
                .as_deref()
                .context("No catalog snapshot given (use --catalog or TRACKFLOW_CATALOG)")?;
            let snapshot = CatalogSnapshot::load(path)
                .with_context(|| format!("Failed to load catalog {}", path.display()))?;
            let names = completion::name_completions(&snapshot, (*kind).into());
            completion::write_name_completions(&mut std::io::stdout().lock(), &names, shell.as_deref())?;
        }
    }

    Ok(())
}

/// Merge the configuration file with the global flags. Flags win.
fn runtime_config(args: &cli::Args) -> Result<RuntimeConfig> {
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    if let Some(path) = &args.catalog {
        config = config.with_catalog_path(path.clone());
    }
    if let Some(path) = &args.cache {
        config = config.with_cache_path(path.clone());
    }
    if args.no_cache {
        config = config.without_cache();
    }
    debug!("Runtime config: {config:?}");
    Ok(config)
}

fn open_session(config: &RuntimeConfig) -> Result<Session> {
    let path = config
        .catalog_path
        .as_deref()
        .context("No catalog snapshot given (use --catalog or TRACKFLOW_CATALOG)")?;
    let catalog: Rc<dyn CatalogClient> = Rc::new(
        StaticCatalog::load(path).with_context(|| format!("Failed to load catalog {}", path.display()))?,
    );

    let cache: Option<Rc<dyn CacheStore>> = match config.resolved_cache_path()? {
        Some(cache_path) => {
            info!("Using cache at {}", cache_path.display());
            let store: Rc<dyn CacheStore> = Rc::new(
                SqliteCache::open(&cache_path)
                    .with_context(|| format!("Failed to open cache {}", cache_path.display()))?,
            );
            Some(store)
        }
        None => {
            debug!("Cache disabled");
            None
        }
    };
    Ok(Session::from_parts(catalog, cache))
}

fn open_target(session: &Session, target: &Target) -> Result<TrackCollection> {
    target
        .open(session)
        .with_context(|| format!("Failed to open {:?} '{}'", target.kind, target.query))
}
