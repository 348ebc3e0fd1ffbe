//! # Command-Line Interface Module
//!
//! Defines the `trackflow` command line with Clap derive macros.
//!
//! ## Commands
//!
//! - `list`: Print the items of a collection, one per line
//! - `export`: Write the table export of a collection as JSON
//! - `persist`: Store a collection in the cache database
//! - `names`: Print catalog names for completion scripts
//! - `completion`: Generate shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! trackflow --catalog catalog.json list playlist "Morning Coffee" --dedupe --shuffle
//! trackflow export artist "Miles Davis" --no-remixes --sort popularity --descending -o miles.json
//! trackflow persist album Kind_of_Blue --as kob
//! ```

use crate::catalog::EntityKind;
use crate::collection::TrackCollection;
use crate::error::Result;
use crate::item::{AudioFeature, Field};
use crate::session::Session;
use crate::source::CollectionSource;
use crate::variants::{Album, Artist, Genre, Playlist, SavedTracks, Show, SingleTrack};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use log::debug;
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
///
/// Global options choose the catalog snapshot and the cache; everything else
/// is reached through a subcommand.
#[derive(Parser, Debug)]
#[command(name = "trackflow")]
#[command(about = "Trackflow: lazy, composable track collections over a music catalog")]
#[command(version)]
pub struct Args {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Catalog snapshot (JSON) used as the remote catalog
    #[arg(long, global = true, env = "TRACKFLOW_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Cache database (defaults to the platform data directory)
    #[arg(long, global = true, env = "TRACKFLOW_CACHE")]
    pub cache: Option<PathBuf>,

    /// Neither read from nor write to the cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the items of a collection
    ///
    /// Items are printed as "name - artist", one per line, after the
    /// pipeline flags have been applied.
    List {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Export a collection as JSON tables
    ///
    /// Writes tracks, artists, albums, audio features and album-artist
    /// links. Items are enriched with audio features first, so every track
    /// must have them in the catalog.
    Export {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Store a collection in the cache database
    ///
    /// The collection is stored under its own id, or under the id given
    /// with --as. Stored collections are read back instead of being fetched
    /// again.
    Persist {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Store under this id instead of the collection's own
        #[arg(long = "as", value_name = "ID")]
        store_as: Option<String>,
    },

    /// Print catalog names of one kind
    ///
    /// Meant for shell completion scripts: one name per line, quoted when it
    /// contains whitespace unless --shell fish is given.
    Names {
        /// Kind of entity to list
        #[arg(value_enum)]
        kind: KindArg,

        /// Shell the names are for
        #[arg(long)]
        shell: Option<String>,
    },

    /// Generate shell completions
    ///
    /// Outputs completion script for the specified shell.
    /// Save the output to the appropriate completion directory for your shell.
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// What collection a command works on.
#[derive(ClapArgs, Debug, Clone)]
pub struct Target {
    /// Kind of collection
    #[arg(value_enum)]
    pub kind: KindArg,

    /// Name to look up (underscores count as spaces), or an id with --by-id.
    /// Ignored for saved tracks.
    #[arg(default_value = "")]
    pub query: String,

    /// Treat the query as an id instead of a name
    #[arg(long)]
    pub by_id: bool,
}

impl Target {
    /// The collection this target names. Nothing is fetched until the
    /// collection is consumed, apart from the name lookup.
    pub fn open(&self, session: &Session) -> Result<TrackCollection> {
        match self.kind {
            KindArg::Playlist => self.open_with(session, Playlist),
            KindArg::Album => self.open_with(session, Album),
            KindArg::Artist => self.open_with(session, Artist),
            KindArg::Show => self.open_with(session, Show),
            KindArg::Track => self.open_with(session, SingleTrack),
            KindArg::Genre => self.open_with(session, Genre),
            KindArg::Saved => Ok(SavedTracks::collection(session)),
        }
    }

    fn open_with<S: CollectionSource + 'static>(&self, session: &Session, source: S) -> Result<TrackCollection> {
        if self.by_id {
            Ok(TrackCollection::from_id(session, source, self.query.clone()))
        } else {
            TrackCollection::from_name(session, source, &self.query)
        }
    }
}

/// Collection kinds selectable from the command line
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum KindArg {
    Playlist,
    Album,
    Artist,
    Show,
    Track,
    Genre,
    Saved,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Playlist => Self::Playlist,
            KindArg::Album => Self::Album,
            KindArg::Artist => Self::Artist,
            KindArg::Show => Self::Show,
            KindArg::Track => Self::Track,
            KindArg::Genre => Self::Genre,
            KindArg::Saved => Self::Saved,
        }
    }
}

/// Operators applied to the collection, in the order listed here.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Drop remixes
    #[arg(long)]
    pub no_remixes: bool,

    /// Drop items whose name was already seen
    #[arg(long)]
    pub dedupe: bool,

    /// Sort on a field
    #[arg(long, value_enum)]
    pub sort: Option<SortArg>,

    /// Sort in descending order
    #[arg(long, requires = "sort")]
    pub descending: bool,

    /// Shuffle the items
    #[arg(long)]
    pub shuffle: bool,

    /// Keep N random items
    #[arg(long, value_name = "N")]
    pub sample: Option<usize>,

    /// Keep the first N items
    #[arg(long, value_name = "N")]
    pub first: Option<usize>,
}

impl PipelineArgs {
    /// Chain the selected operators onto `collection`.
    #[must_use]
    pub fn apply(&self, mut collection: TrackCollection) -> TrackCollection {
        if self.no_remixes {
            collection = collection.remove_remixes();
        }
        if self.dedupe {
            collection = collection.remove_duplicates();
        }
        if let Some(sort) = self.sort {
            debug!("Sorting on {sort:?}, descending: {}", self.descending);
            collection = collection.sort(sort.into(), !self.descending);
        }
        if self.shuffle {
            collection = collection.shuffle();
        }
        if let Some(n) = self.sample {
            collection = collection.sample(n);
        }
        if let Some(n) = self.first {
            collection = collection.first(n);
        }
        collection
    }
}

/// Sortable fields
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum SortArg {
    Name,
    Duration,
    Popularity,
    Album,
    ReleaseDate,
    Artist,
    Danceability,
    Energy,
    Tempo,
    Valence,
    Acousticness,
    Loudness,
}

impl From<SortArg> for Field {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => Self::Name,
            SortArg::Duration => Self::DurationMs,
            SortArg::Popularity => Self::Popularity,
            SortArg::Album => Self::AlbumName,
            SortArg::ReleaseDate => Self::ReleaseDate,
            SortArg::Artist => Self::PrimaryArtist,
            SortArg::Danceability => Self::Audio(AudioFeature::Danceability),
            SortArg::Energy => Self::Audio(AudioFeature::Energy),
            SortArg::Tempo => Self::Audio(AudioFeature::Tempo),
            SortArg::Valence => Self::Audio(AudioFeature::Valence),
            SortArg::Acousticness => Self::Audio(AudioFeature::Acousticness),
            SortArg::Loudness => Self::Audio(AudioFeature::Loudness),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_list_with_pipeline() {
        let args = Args::try_parse_from([
            "trackflow",
            "--no-cache",
            "list",
            "playlist",
            "Road_Trip",
            "--dedupe",
            "--sort",
            "energy",
            "--descending",
            "--first",
            "10",
        ])
        .unwrap();
        assert!(args.no_cache);
        let Command::List { target, pipeline } = args.command else {
            panic!("expected list");
        };
        assert_eq!(target.kind, KindArg::Playlist);
        assert_eq!(target.query, "Road_Trip");
        assert!(pipeline.dedupe && pipeline.descending);
        assert_eq!(pipeline.first, Some(10));
        assert!(Field::from(pipeline.sort.unwrap()).touches_audio_features());
    }

    #[test]
    fn test_descending_requires_sort() {
        let result = Args::try_parse_from(["trackflow", "list", "album", "x", "--descending"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_pipeline_applies_in_order() {
        use crate::catalog::StaticCatalog;
        use crate::item::{Item, Track};

        let track = |id: &str, name: &str, duration_ms| {
            Item::Track(Track {
                id: id.to_owned(),
                name: name.to_owned(),
                duration_ms,
                ..Track::default()
            })
        };
        let session = Session::new(StaticCatalog::default());
        let collection = TrackCollection::from_items(
            &session,
            vec![
                track("1", "Intro", 3000),
                track("2", "Intro", 1000),
                track("3", "Song (Club Remix)", 500),
                track("4", "Outro", 2000),
            ],
        );
        let pipeline = PipelineArgs {
            no_remixes: true,
            dedupe: true,
            sort: Some(SortArg::Duration),
            first: Some(1),
            ..PipelineArgs::default()
        };
        let items = pipeline.apply(collection).to_vec().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id(), "4");
    }

    #[test]
    fn test_target_by_id_skips_lookup() {
        use crate::catalog::StaticCatalog;

        let catalog = std::rc::Rc::new(StaticCatalog::default());
        let session = Session::from_parts(catalog.clone(), None);
        let target = Target {
            kind: KindArg::Album,
            query: "abc".into(),
            by_id: true,
        };
        let collection = target.open(&session).unwrap();
        assert_eq!(collection.id(), "abc");
        assert_eq!(catalog.request_count(), 0);
    }

    #[test]
    fn test_persist_as() {
        let args = Args::try_parse_from(["trackflow", "persist", "saved", "--as", "mine"]).unwrap();
        let Command::Persist { target, store_as, .. } = args.command else {
            panic!("expected persist");
        };
        assert_eq!(target.kind, KindArg::Saved);
        assert!(target.query.is_empty());
        assert_eq!(store_as.as_deref(), Some("mine"));
    }
}
