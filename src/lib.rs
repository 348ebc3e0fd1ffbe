//! Lazy, composable track collections over a remote music catalog.
//!
//! A [`TrackCollection`] is a possibly unbounded, lazily produced sequence of
//! tracks or episodes. Collections combine with set-like operators (`+`, `-`,
//! `/`, `%`), can be filtered, sorted, shuffled and enriched with audio
//! features, and end up as a table export, a cache entry or a published
//! playlist.
//!
//! Core modules:
//! - [`collection`] - The collection type and its binary operators
//! - [`filters`] - Unary operators: filters, sorts, sampling, enrichment
//! - [`algorithm`] - Target optimisation and artist clustering
//! - [`source`] - Cache-or-remote resolution of named collections
//! - [`variants`] - Playlists, albums, artists, shows, genres, saved tracks
//! - [`db`] - Cache stores (SQLite and in-memory)
//!
//! ### Supporting Modules
//!
//! - [`catalog`] - The catalog client seam and a snapshot-backed client
//! - [`session`] - Catalog and cache handles passed to every collection
//! - [`item`] - Tracks, episodes and audio features
//! - [`stream`] - Fallible item sequences and the memoising tee
//! - [`export`] - Five-table export
//! - [`config`] - Runtime configuration and data directory management
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use trackflow::{Artist, Playlist, Session, SqliteCache, StaticCatalog, TrackCollection};
//!
//! let session = Session::new(StaticCatalog::load("catalog.json".as_ref())?)
//!     .with_cache(SqliteCache::open(&trackflow::config::get_cache_path()?)?);
//!
//! let focus = TrackCollection::from_name(&session, Playlist, "Deep Focus")?;
//! let jazz = Artist::all_songs(&session, "miles-davis");
//!
//! // Jazz interleaved with the playlist, remixes dropped, 20 at random.
//! let mix = (focus % jazz).remove_remixes().sample(20);
//! for item in mix.to_vec()? {
//!     println!("{item}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Laziness
//!
//! Nothing is fetched until a collection is consumed. Operators that need
//! the whole sequence (sort, shuffle, sample, clustering) buffer it when the
//! first item is pulled. A collection is consumed by its operators; use
//! [`TrackCollection::materialize`] or [`TrackCollection::memoize`] to read
//! it more than once.
//!
//! ## Error Handling
//!
//! Library functions return [`Result`] with a [`FlowError`]. Errors surface
//! while items are pulled, and a sequence ends after its first error.

pub mod algorithm;
pub mod catalog;
pub mod cli;
pub mod collection;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod filters;
pub mod item;
pub mod session;
pub mod source;
pub mod stream;
pub mod variants;

pub use algorithm::{ArtistGraph, DistanceGraph};
pub use catalog::{CatalogClient, EntityKind, StaticCatalog};
pub use collection::TrackCollection;
pub use db::{CacheStore, MemoryCache, SqliteCache};
pub use error::{FlowError, Result};
pub use export::TableExport;
pub use filters::Predicate;
pub use item::{AudioFeature, AudioFeatures, Episode, Field, Item, Track};
pub use session::Session;
pub use source::CollectionSource;
pub use stream::ItemStream;
pub use variants::{
    Album, Artist, ArtistCollection, CollectionOfCollections, Genre, Playlist, SavedTracks, Show, SingleTrack,
};
