//! Track collections and their binary algebra.
//!
//! A [`TrackCollection`] is a lazy sequence of items plus an enrichment flag.
//! Operators consume their operands and return a new collection; nothing is
//! fetched until the result is enumerated by a terminal operation such as
//! [`to_vec`](TrackCollection::to_vec),
//! [`to_table_export`](TrackCollection::to_table_export) or
//! [`persist`](TrackCollection::persist).
//!
//! Sequences are single-pass. To use one collection in two places, turn it
//! into a replayable one first with [`materialize`](TrackCollection::materialize)
//! or [`memoize`](TrackCollection::memoize) and then
//! [`try_clone`](TrackCollection::try_clone) it.

use crate::db::CacheStore;
use crate::error::{FlowError, Result};
use crate::export::TableExport;
use crate::item::Item;
use crate::session::Session;
use crate::source::{resolve_items, CollectionSource};
use crate::stream::{ItemResult, ItemStream, SharedStream};
use log::{debug, info};
use std::collections::HashSet;
use std::fmt;
use std::ops::{Add, Div, Rem, Sub};
use std::rc::Rc;

/// Insertions made by [`TrackCollection::insert_at_time_intervals`] at most.
pub const MAX_INTERVAL_REPLAYS: usize = 20;

enum Origin {
    Empty,
    Stream(ItemStream),
    Buffer(Rc<Vec<Item>>),
    Shared(SharedStream),
    Bound(Rc<dyn CollectionSource>),
}

/// A lazy, composable sequence of tracks and episodes.
pub struct TrackCollection {
    id: String,
    origin: Origin,
    enriched: bool,
    session: Session,
}

impl TrackCollection {
    /// Anonymous collection over an existing stream.
    #[must_use]
    pub fn new(session: &Session, items: ItemStream) -> Self {
        Self::derived(session.clone(), items, false)
    }

    #[must_use]
    pub fn empty(session: &Session) -> Self {
        Self {
            id: String::new(),
            origin: Origin::Empty,
            enriched: false,
            session: session.clone(),
        }
    }

    /// Anonymous, replayable collection over literal items.
    #[must_use]
    pub fn from_items(session: &Session, items: Vec<Item>) -> Self {
        Self {
            id: String::new(),
            origin: Origin::Buffer(Rc::new(items)),
            enriched: false,
            session: session.clone(),
        }
    }

    /// Like [`from_items`](Self::from_items) for items that already carry
    /// audio features. Fails naming the first item without them.
    pub fn from_enriched_items(session: &Session, items: Vec<Item>) -> Result<Self> {
        if let Some(bare) = items.iter().find(|i| i.audio_features().is_none()) {
            return Err(FlowError::InvalidArgument(format!(
                "item '{}' carries no audio features",
                bare.id()
            )));
        }
        let mut collection = Self::from_items(session, items);
        collection.enriched = true;
        Ok(collection)
    }

    /// Collection bound to the entity `id` of `source`. Items are resolved on
    /// first pull, from the cache when it holds a complete copy.
    pub fn from_id(session: &Session, source: impl CollectionSource + 'static, id: impl Into<String>) -> Self {
        Self::bound(session, Rc::new(source), id.into())
    }

    /// Resolve `name` to an id and bind to it. Underscores count as spaces.
    pub fn from_name(session: &Session, source: impl CollectionSource + 'static, name: &str) -> Result<Self> {
        let name = name.replace('_', " ");
        let id = source.resolve_id(session, &name)?;
        debug!("Resolved {} '{name}' to {id}", source.kind());
        Ok(Self::bound(session, Rc::new(source), id))
    }

    pub(crate) fn bound(session: &Session, source: Rc<dyn CollectionSource>, id: String) -> Self {
        Self {
            id,
            origin: Origin::Bound(source),
            enriched: false,
            session: session.clone(),
        }
    }

    /// Read a stored collection back from the session cache.
    pub fn from_cache(session: &Session, id: impl Into<String>) -> Result<Self> {
        let store = session.shared_cache().ok_or(FlowError::CacheUnavailable)?;
        Ok(Self::from_store(session, store, id))
    }

    /// Read a stored collection back from an explicit store.
    pub fn from_store(session: &Session, store: Rc<dyn CacheStore>, id: impl Into<String>) -> Self {
        let id = id.into();
        let key = id.clone();
        let items = ItemStream::deferred(move || {
            debug!("Reading stored collection {key}");
            Ok(ItemStream::from_items(store.read_items(&key)?))
        });
        Self {
            id,
            origin: Origin::Stream(items),
            enriched: false,
            session: session.clone(),
        }
    }

    /// Union of all `collections`, in order.
    pub fn concat<I>(session: &Session, collections: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        collections
            .into_iter()
            .reduce(Self::union)
            .unwrap_or_else(|| Self::empty(session))
    }

    pub(crate) fn derived(session: Session, items: ItemStream, enriched: bool) -> Self {
        Self {
            id: String::new(),
            origin: Origin::Stream(items),
            enriched,
            session,
        }
    }

    /// Consume into `(items, enriched, session)`.
    pub(crate) fn into_parts(self) -> (ItemStream, bool, Session) {
        let enriched = self.enriched;
        let session = self.session.clone();
        (self.items(), enriched, session)
    }

    /// Id of the named resource, empty for derived collections.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.id.is_empty()
    }

    /// Every item is guaranteed to carry audio features.
    #[must_use]
    pub const fn is_enriched(&self) -> bool {
        self.enriched
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Same items and flag under a new id, e.g. to persist a derived collection.
    #[must_use]
    pub fn with_id(self, id: impl Into<String>) -> Self {
        let id = id.into();
        if matches!(self.origin, Origin::Bound(_)) {
            let (items, enriched, session) = self.into_parts();
            return Self {
                id,
                origin: Origin::Stream(items),
                enriched,
                session,
            };
        }
        Self { id, ..self }
    }

    /// The item sequence. A bound collection without an id is empty.
    #[must_use]
    pub fn items(self) -> ItemStream {
        match self.origin {
            Origin::Empty => ItemStream::empty(),
            Origin::Stream(items) => items,
            Origin::Buffer(buffer) => {
                ItemStream::new((0..buffer.len()).map(move |i| Ok(buffer[i].clone())))
            }
            Origin::Shared(shared) => shared.cursor(),
            Origin::Bound(_) if self.id.is_empty() => ItemStream::empty(),
            Origin::Bound(source) => resolve_items(self.session, source, self.id),
        }
    }

    /// Enumerate everything into a buffer.
    pub fn to_vec(self) -> Result<Vec<Item>> {
        self.items().collect_items()
    }

    /// Enumerate now and keep the items in a replayable buffer.
    pub fn materialize(self) -> Result<Self> {
        if matches!(self.origin, Origin::Buffer(_) | Origin::Empty) {
            return Ok(self);
        }
        let id = self.id.clone();
        let (items, enriched, session) = self.into_parts();
        Ok(Self {
            id,
            origin: Origin::Buffer(Rc::new(items.collect_items()?)),
            enriched,
            session,
        })
    }

    /// Make the collection replayable without enumerating it now. The first
    /// consumer pulls from the source, later ones replay what it pulled.
    #[must_use]
    pub fn memoize(self) -> Self {
        if self.is_replayable() {
            return self;
        }
        let id = self.id.clone();
        let (items, enriched, session) = self.into_parts();
        Self {
            id,
            origin: Origin::Shared(SharedStream::new(items)),
            enriched,
            session,
        }
    }

    /// Whether [`try_clone`](Self::try_clone) will succeed.
    #[must_use]
    pub const fn is_replayable(&self) -> bool {
        !matches!(self.origin, Origin::Stream(_))
    }

    /// Independent copy of a replayable collection. A one-shot stream cannot
    /// be copied and gives `None`.
    #[must_use]
    pub fn try_clone(&self) -> Option<Self> {
        let origin = match &self.origin {
            Origin::Empty => Origin::Empty,
            Origin::Stream(_) => return None,
            Origin::Buffer(buffer) => Origin::Buffer(Rc::clone(buffer)),
            Origin::Shared(shared) => Origin::Shared(shared.clone()),
            Origin::Bound(source) => Origin::Bound(Rc::clone(source)),
        };
        Some(Self {
            id: self.id.clone(),
            origin,
            enriched: self.enriched,
            session: self.session.clone(),
        })
    }

    /// Items of `self` followed by items of `other`. Duplicates are kept.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        let enriched = self.enriched && other.enriched;
        let (left, _, session) = self.into_parts();
        let right = other.items();
        Self::derived(session, ItemStream::new(left.chain(right)), enriched)
    }

    /// Items of `self` whose id does not occur in `other`.
    #[must_use]
    pub fn difference(self, other: Self) -> Self {
        let (left, enriched, session) = self.into_parts();
        let right = other.items();
        Self::derived(session, keep_by_membership(left, right, false), enriched)
    }

    /// Items of `self` whose id occurs in `other`.
    #[must_use]
    pub fn intersection(self, other: Self) -> Self {
        let enriched = self.enriched && other.enriched;
        let (left, _, session) = self.into_parts();
        let right = other.items();
        Self::derived(session, keep_by_membership(left, right, true), enriched)
    }

    /// `a1, b1, a2, b2, ...` until either side runs out.
    #[must_use]
    pub fn alternate(self, other: Self) -> Self {
        let enriched = self.enriched && other.enriched;
        let (left, _, session) = self.into_parts();
        let right = other.items();
        Self::derived(session, interleave(vec![left, right]), enriched)
    }

    /// Splice all of `other` in after every `minutes` of playing time.
    pub fn insert_at_time(self, other: Self, minutes: f64) -> Result<Self> {
        check_interval(minutes)?;
        let enriched = self.enriched && other.enriched;
        let (left, _, session) = self.into_parts();
        let inserted = SharedStream::new(other.items());

        let mut elapsed = 0.0_f64;
        let items = left.flat_map(move |next| {
            let crossed = next.as_ref().is_ok_and(|item| {
                let before = elapsed;
                elapsed += item.duration_minutes();
                elapsed % minutes < before % minutes
            });
            let splice = if crossed { inserted.cursor() } else { ItemStream::empty() };
            std::iter::once(next).chain(splice)
        });
        Ok(Self::derived(session, ItemStream::new(items), enriched))
    }

    /// Like [`insert_at_time`](Self::insert_at_time), but the clock restarts
    /// after every insertion.
    ///
    /// Each crossing splices in a full replay of `other`, at most
    /// [`MAX_INTERVAL_REPLAYS`] times; later crossings insert nothing.
    pub fn insert_at_time_intervals(self, other: Self, minutes: f64) -> Result<Self> {
        check_interval(minutes)?;
        let enriched = self.enriched && other.enriched;
        let (left, _, session) = self.into_parts();
        let inserted = SharedStream::new(other.items());

        let mut elapsed = 0.0_f64;
        let mut remaining = MAX_INTERVAL_REPLAYS;
        let items = left.flat_map(move |next| {
            let mut splice = ItemStream::empty();
            if let Ok(item) = &next {
                let before = elapsed;
                elapsed += item.duration_minutes();
                if elapsed % minutes < before % minutes {
                    if remaining > 0 {
                        remaining -= 1;
                        splice = inserted.cursor();
                    } else {
                        debug!("Interval replays exhausted, skipping insertion");
                    }
                    elapsed = 0.0;
                }
            }
            std::iter::once(next).chain(splice)
        });
        Ok(Self::derived(session, ItemStream::new(items), enriched))
    }

    /// The first `position` items of `self`, all of `other`, then the rest.
    #[must_use]
    pub fn insert_at_position(self, other: Self, position: usize) -> Self {
        let enriched = self.enriched && other.enriched;
        let (mut left, _, session) = self.into_parts();
        let right = other.items();

        let items = ItemStream::deferred(move || {
            let head: Vec<ItemResult> = left.by_ref().take(position).collect();
            Ok(ItemStream::new(head.into_iter().chain(right).chain(left)))
        });
        Self::derived(session, items, enriched)
    }

    fn into_enriched(self) -> Self {
        if self.enriched {
            self
        } else {
            self.add_audio_features()
        }
    }

    /// Tabular form of the collection, enriching it first when needed.
    pub fn to_table_export(self) -> Result<TableExport> {
        Ok(TableExport::from_items(&self.into_enriched().to_vec()?))
    }

    /// Store items and table rows under this collection's id in `store`, or
    /// in the session cache when no store is given.
    ///
    /// Items are enriched first, like [`to_table_export`](Self::to_table_export),
    /// so an item without audio features fails the whole write.
    pub fn persist(self, store: Option<&dyn CacheStore>) -> Result<()> {
        let session = self.session.clone();
        let store = match store {
            Some(store) => store,
            None => session.cache().ok_or(FlowError::CacheUnavailable)?,
        };
        if self.is_anonymous() {
            return Err(FlowError::InvalidArgument(
                "an anonymous collection cannot be persisted, give it an id first".into(),
            ));
        }

        let id = self.id.clone();
        info!("Storing collection to cache. id = {id}");
        let items = self.into_enriched().to_vec()?;
        store.write_table(&id, &items)
    }

    /// Create a remote playlist with these items. The name defaults to the
    /// collection id. Returns the new playlist id.
    pub fn publish(self, name: Option<&str>) -> Result<String> {
        let name = match name {
            Some(name) => name.to_owned(),
            None if !self.id.is_empty() => self.id.clone(),
            None => {
                return Err(FlowError::InvalidArgument(
                    "a playlist name is required for an anonymous collection".into(),
                ))
            }
        };
        let session = self.session.clone();
        let ids: Vec<String> = self
            .to_vec()?
            .iter()
            .map(|item| item.id().to_owned())
            .collect();
        info!("Publishing {} items as playlist '{name}'", ids.len());
        session.catalog().create_playlist(&name, &ids)
    }
}

fn check_interval(minutes: f64) -> Result<()> {
    if minutes > 0.0 && minutes.is_finite() {
        Ok(())
    } else {
        Err(FlowError::InvalidArgument(format!(
            "insertion interval must be a positive number of minutes, got {minutes}"
        )))
    }
}

/// Filter `left` by id membership in `right`, which is read in full on the
/// first pull.
fn keep_by_membership(left: ItemStream, right: ItemStream, keep_members: bool) -> ItemStream {
    ItemStream::deferred(move || {
        let ids = right
            .map(|item| item.map(|i| i.id().to_owned()))
            .collect::<Result<HashSet<String>>>()?;
        Ok(ItemStream::new(left.filter(move |next| match next {
            Ok(item) => ids.contains(item.id()) == keep_members,
            Err(_) => true,
        })))
    })
}

/// One item from each stream per round; stops at the first round in which
/// any stream is exhausted.
pub(crate) fn interleave(mut streams: Vec<ItemStream>) -> ItemStream {
    if streams.is_empty() {
        return ItemStream::empty();
    }
    let rounds = std::iter::from_fn(move || {
        let mut round = Vec::with_capacity(streams.len());
        for stream in &mut streams {
            match stream.next() {
                Some(next) => round.push(next),
                None => {
                    // An error pulled in an unfinished round still surfaces.
                    round.retain(Result::is_err);
                    return (!round.is_empty()).then_some(round);
                }
            }
        }
        Some(round)
    });
    ItemStream::new(rounds.flatten())
}

impl Add for TrackCollection {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl Sub for TrackCollection {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.difference(rhs)
    }
}

impl Div for TrackCollection {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl Rem for TrackCollection {
    type Output = Self;

    fn rem(self, rhs: Self) -> Self {
        self.alternate(rhs)
    }
}

impl fmt::Debug for TrackCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match &self.origin {
            Origin::Empty => "empty",
            Origin::Stream(_) => "stream",
            Origin::Buffer(_) => "buffer",
            Origin::Shared(_) => "shared",
            Origin::Bound(_) => "bound",
        };
        f.debug_struct("TrackCollection")
            .field("id", &self.id)
            .field("origin", &origin)
            .field("enriched", &self.enriched)
            .finish_non_exhaustive()
    }
}
