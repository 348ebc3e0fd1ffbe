//! Named collection kinds and collections of collections.
//!
//! Each kind only says how a name becomes an id and how the records behind
//! the id are fetched; everything else comes from [`TrackCollection`].
//!
//! ```no_run
//! use trackflow::{Album, Playlist, Session, StaticCatalog, TrackCollection};
//!
//! # fn main() -> trackflow::Result<()> {
//! let session = Session::new(StaticCatalog::load("catalog.json".as_ref())?);
//! let mix = TrackCollection::from_name(&session, Playlist, "Morning_Coffee")?
//!     + TrackCollection::from_name(&session, Album, "Kind of Blue")?;
//! for item in mix.remove_duplicates().shuffle().to_vec()? {
//!     println!("{item}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::catalog::EntityKind;
use crate::collection::{interleave, TrackCollection};
use crate::error::Result;
use crate::item::Item;
use crate::session::Session;
use crate::source::CollectionSource;
use crate::stream::ItemStream;
use log::debug;

/// Id under which the saved tracks are fetched and cached.
pub const SAVED_TRACKS_ID: &str = "Saved tracks";

#[derive(Debug, Clone, Copy, Default)]
pub struct Playlist;

impl CollectionSource for Playlist {
    fn kind(&self) -> EntityKind {
        EntityKind::Playlist
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Album;

impl CollectionSource for Album {
    fn kind(&self) -> EntityKind {
        EntityKind::Album
    }
}

/// Episodes of a show. Always fetched remotely.
#[derive(Debug, Clone, Copy, Default)]
pub struct Show;

impl CollectionSource for Show {
    fn kind(&self) -> EntityKind {
        EntityKind::Show
    }

    fn uses_cache(&self) -> bool {
        false
    }
}

/// A single track.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleTrack;

impl SingleTrack {
    /// Collection holding an already fetched item, keyed by its id.
    #[must_use]
    pub fn collection(session: &Session, item: Item) -> TrackCollection {
        let id = item.id().to_owned();
        TrackCollection::from_items(session, vec![item]).with_id(id)
    }
}

impl CollectionSource for SingleTrack {
    fn kind(&self) -> EntityKind {
        EntityKind::Track
    }

    fn uses_cache(&self) -> bool {
        false
    }
}

/// Recommendations for a genre. The genre name is the id.
#[derive(Debug, Clone, Copy, Default)]
pub struct Genre;

impl CollectionSource for Genre {
    fn kind(&self) -> EntityKind {
        EntityKind::Genre
    }

    fn resolve_id(&self, _session: &Session, name: &str) -> Result<String> {
        Ok(name.to_owned())
    }

    fn uses_cache(&self) -> bool {
        false
    }
}

/// The user's saved tracks. There is nothing to resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct SavedTracks;

impl SavedTracks {
    #[must_use]
    pub fn collection(session: &Session) -> TrackCollection {
        TrackCollection::from_id(session, SavedTracks, SAVED_TRACKS_ID)
    }
}

impl CollectionSource for SavedTracks {
    fn kind(&self) -> EntityKind {
        EntityKind::Saved
    }

    fn resolve_id(&self, _session: &Session, _name: &str) -> Result<String> {
        Ok(SAVED_TRACKS_ID.to_owned())
    }
}

/// Everything an artist released, album by album.
#[derive(Debug, Clone, Copy, Default)]
pub struct Artist;

impl CollectionSource for Artist {
    fn kind(&self) -> EntityKind {
        EntityKind::Artist
    }

    /// Sum of the artist's albums, each read through the cache on its own.
    fn fetch_items(&self, session: &Session, id: &str) -> Result<ItemStream> {
        let albums: Vec<TrackCollection> = session
            .catalog()
            .fetch_related(EntityKind::Album, id)?
            .iter()
            .filter_map(|album| album.get("id").and_then(serde_json::Value::as_str))
            .map(|album_id| TrackCollection::from_id(session, Album, album_id))
            .collect();
        debug!("Artist {id} has {} albums", albums.len());
        Ok(TrackCollection::concat(session, albums).items())
    }
}

impl Artist {
    /// All songs of the artist, assembled from the album collections without
    /// going through the artist's own cache entry.
    #[must_use]
    pub fn all_songs(session: &Session, artist_id: &str) -> TrackCollection {
        let (lookup, id) = (session.clone(), artist_id.to_owned());
        let items = ItemStream::deferred(move || Artist.fetch_items(&lookup, &id));
        TrackCollection::new(session, items).with_id(artist_id)
    }

    /// The artist's most popular tracks.
    #[must_use]
    pub fn popular(session: &Session, artist_id: &str) -> TrackCollection {
        let (lookup, id) = (session.clone(), artist_id.to_owned());
        let items = ItemStream::deferred(move || {
            let records = lookup.catalog().fetch_related(EntityKind::Track, &id)?;
            Ok(ItemStream::new(
                records
                    .into_iter()
                    .map(|record| Item::from_raw(EntityKind::Track, record)),
            ))
        });
        TrackCollection::new(session, items).with_id(artist_id)
    }

    /// The first `n` related artists, followed by the artist itself when
    /// `include_self` is set.
    pub fn related_artists(
        session: &Session,
        artist_id: &str,
        n: usize,
        include_self: bool,
    ) -> Result<ArtistCollection> {
        let mut ids: Vec<String> = session
            .catalog()
            .fetch_related(EntityKind::Artist, artist_id)?
            .iter()
            .filter_map(|artist| artist.get("id").and_then(serde_json::Value::as_str))
            .take(n)
            .map(str::to_owned)
            .collect();
        if include_self {
            ids.push(artist_id.to_owned());
        }
        Ok(ArtistCollection::new(session, ids))
    }
}

/// A list of collections treated as one.
///
/// Not a [`TrackCollection`] itself: convert with
/// [`into_collection`](Self::into_collection) or `TrackCollection::from` to use
/// the operators.
#[derive(Debug)]
pub struct CollectionOfCollections {
    session: Session,
    collections: Vec<TrackCollection>,
}

impl CollectionOfCollections {
    #[must_use]
    pub fn new(session: &Session, collections: Vec<TrackCollection>) -> Self {
        Self {
            session: session.clone(),
            collections,
        }
    }

    pub fn push(&mut self, collection: TrackCollection) {
        self.collections.push(collection);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Union of every member, in order.
    #[must_use]
    pub fn into_collection(self) -> TrackCollection {
        TrackCollection::concat(&self.session, self.collections)
    }

    /// One item from each member in turn, until any member runs out.
    #[must_use]
    pub fn alternate(self) -> TrackCollection {
        let enriched = !self.collections.is_empty() && self.collections.iter().all(TrackCollection::is_enriched);
        let streams = self.collections.into_iter().map(TrackCollection::items).collect();
        TrackCollection::derived(self.session, interleave(streams), enriched)
    }
}

impl From<CollectionOfCollections> for TrackCollection {
    fn from(collections: CollectionOfCollections) -> Self {
        collections.into_collection()
    }
}

/// Collections of several artists.
///
/// Like [`CollectionOfCollections`], it converts into a [`TrackCollection`]
/// (all members' songs, in order) before any operator applies.
#[derive(Debug)]
pub struct ArtistCollection {
    artist_ids: Vec<String>,
    inner: CollectionOfCollections,
}

impl ArtistCollection {
    #[must_use]
    pub fn new(session: &Session, artist_ids: Vec<String>) -> Self {
        let members = artist_ids
            .iter()
            .map(|id| TrackCollection::from_id(session, Artist, id.as_str()))
            .collect();
        Self {
            artist_ids,
            inner: CollectionOfCollections::new(session, members),
        }
    }

    #[must_use]
    pub fn artist_ids(&self) -> &[String] {
        &self.artist_ids
    }

    /// Popular tracks of every member artist, in member order.
    #[must_use]
    pub fn popular(&self) -> TrackCollection {
        let session = &self.inner.session;
        TrackCollection::concat(
            session,
            self.artist_ids.iter().map(|id| Artist::popular(session, id)),
        )
    }

    #[must_use]
    pub fn into_collection(self) -> TrackCollection {
        self.inner.into_collection()
    }

    #[must_use]
    pub fn alternate(self) -> TrackCollection {
        self.inner.alternate()
    }
}

impl From<ArtistCollection> for TrackCollection {
    fn from(artists: ArtistCollection) -> Self {
        artists.into_collection()
    }
}
