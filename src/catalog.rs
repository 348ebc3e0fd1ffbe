//! Remote catalog capability.
//!
//! The network client itself lives outside this crate. Collections only need
//! the [`CatalogClient`] surface: id search, raw record streams, audio
//! features, related records and playlist creation.
//!
//! [`StaticCatalog`] implements the surface over a JSON snapshot. The binary
//! uses it for offline work and the tests use it as a fake.

use crate::error::{FlowError, Result};
use crate::item::AudioFeatures;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Unprocessed record as delivered by the catalog.
pub type RawRecord = serde_json::Value;

/// Lazily delivered raw records. Errors may appear mid-stream.
pub type RawStream = Box<dyn Iterator<Item = Result<RawRecord>>>;

/// Kinds of named catalog entities a collection can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Playlist,
    Album,
    Artist,
    Show,
    Track,
    Genre,
    Saved,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Playlist => "playlist",
            Self::Album => "album",
            Self::Artist => "artist",
            Self::Show => "show",
            Self::Track => "track",
            Self::Genre => "genre",
            Self::Saved => "saved items",
        };
        f.write_str(name)
    }
}

/// What collections need from the remote catalog.
pub trait CatalogClient {
    /// Map a display name to an id; `Ok(None)` when nothing matches.
    fn search_id(&self, kind: EntityKind, name: &str) -> Result<Option<String>>;

    /// Raw records making up the entity `id` of `kind`.
    fn fetch_raw_items(&self, kind: EntityKind, id: &str) -> Result<RawStream>;

    /// Audio features for each requested track id. Ids the catalog does not
    /// know are simply absent from the map.
    fn fetch_audio_features(&self, ids: &[String]) -> Result<HashMap<String, AudioFeatures>>;

    /// Records of `kind` related to the entity `id`: an artist's albums
    /// (`Album`), related artists (`Artist`) or popular tracks (`Track`).
    fn fetch_related(&self, kind: EntityKind, id: &str) -> Result<Vec<RawRecord>>;

    /// Create a playlist holding `item_ids`, returning its id.
    fn create_playlist(&self, name: &str, item_ids: &[String]) -> Result<String>;
}

/// One entity of a [`CatalogSnapshot`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityRecord {
    pub kind: Option<EntityKind>,
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub items: Vec<RawRecord>,
    /// Artist only.
    #[serde(default)]
    pub albums: Vec<RawRecord>,
    /// Artist only.
    #[serde(default)]
    pub related_artists: Vec<RawRecord>,
    /// Artist only.
    #[serde(default)]
    pub top_tracks: Vec<RawRecord>,
}

/// Serialisable content of a [`StaticCatalog`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
    #[serde(default)]
    pub audio_features: HashMap<String, AudioFeatures>,
}

impl CatalogSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&raw)?;
        debug!(
            "Loaded catalog snapshot with {} entities from {}",
            snapshot.entities.len(),
            path.display()
        );
        Ok(snapshot)
    }
}

/// Catalog client answering from an in-memory snapshot.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    snapshot: RefCell<CatalogSnapshot>,
    requests: Cell<usize>,
}

impl StaticCatalog {
    #[must_use]
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            snapshot: RefCell::new(snapshot),
            requests: Cell::new(0),
        }
    }

    /// Load a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        CatalogSnapshot::load(path).map(Self::new)
    }

    /// Add or replace an entity.
    pub fn insert(&self, record: EntityRecord) {
        let mut snapshot = self.snapshot.borrow_mut();
        snapshot
            .entities
            .retain(|e| !(e.kind == record.kind && e.id == record.id));
        snapshot.entities.push(record);
    }

    pub fn insert_audio_features(&self, track_id: impl Into<String>, features: AudioFeatures) {
        self.snapshot
            .borrow_mut()
            .audio_features
            .insert(track_id.into(), features);
    }

    /// Number of remote calls served so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.get()
    }

    fn count(&self) {
        self.requests.set(self.requests.get() + 1);
    }

    fn entity(&self, kind: EntityKind, id: &str) -> Option<EntityRecord> {
        self.snapshot
            .borrow()
            .entities
            .iter()
            .find(|e| e.kind == Some(kind) && e.id == id)
            .cloned()
    }

    fn record_by_id(&self, id: &str) -> Option<RawRecord> {
        self.snapshot
            .borrow()
            .entities
            .iter()
            .flat_map(|e| e.items.iter().chain(&e.top_tracks))
            .map(entry_body)
            .find(|r| r.get("id").and_then(serde_json::Value::as_str) == Some(id))
            .cloned()
    }
}

/// Playlist entries wrap the record under `track`.
fn entry_body(record: &RawRecord) -> &RawRecord {
    record.get("track").filter(|t| t.is_object()).unwrap_or(record)
}

impl CatalogClient for StaticCatalog {
    fn search_id(&self, kind: EntityKind, name: &str) -> Result<Option<String>> {
        self.count();
        let needle = name.to_lowercase();
        let snapshot = self.snapshot.borrow();

        if kind == EntityKind::Track {
            let found = snapshot
                .entities
                .iter()
                .flat_map(|e| e.items.iter())
                .map(entry_body)
                .find(|r| {
                    r.get("name")
                        .and_then(serde_json::Value::as_str)
                        .is_some_and(|n| n.to_lowercase() == needle)
                })
                .and_then(|r| r.get("id").and_then(serde_json::Value::as_str))
                .map(str::to_owned);
            return Ok(found);
        }

        Ok(snapshot
            .entities
            .iter()
            .find(|e| e.kind == Some(kind) && e.name.to_lowercase() == needle)
            .map(|e| e.id.clone()))
    }

    fn fetch_raw_items(&self, kind: EntityKind, id: &str) -> Result<RawStream> {
        self.count();
        if kind == EntityKind::Track {
            let record = self
                .record_by_id(id)
                .ok_or_else(|| FlowError::remote(id, "unknown track"))?;
            return Ok(Box::new(std::iter::once(Ok(record))));
        }

        let entity = self
            .entity(kind, id)
            .ok_or_else(|| FlowError::remote(id, format!("unknown {kind}")))?;
        Ok(Box::new(entity.items.into_iter().map(Ok)))
    }

    fn fetch_audio_features(&self, ids: &[String]) -> Result<HashMap<String, AudioFeatures>> {
        self.count();
        let snapshot = self.snapshot.borrow();
        Ok(ids
            .iter()
            .filter_map(|id| {
                snapshot
                    .audio_features
                    .get(id)
                    .map(|f| (id.clone(), f.clone()))
            })
            .collect())
    }

    fn fetch_related(&self, kind: EntityKind, id: &str) -> Result<Vec<RawRecord>> {
        self.count();
        let artist = self
            .entity(EntityKind::Artist, id)
            .ok_or_else(|| FlowError::remote(id, "unknown artist"))?;
        match kind {
            EntityKind::Album => Ok(artist.albums),
            EntityKind::Artist => Ok(artist.related_artists),
            EntityKind::Track => Ok(artist.top_tracks),
            other => Err(FlowError::remote(id, format!("no related {other} records"))),
        }
    }

    fn create_playlist(&self, name: &str, item_ids: &[String]) -> Result<String> {
        self.count();
        let items = item_ids
            .iter()
            .map(|id| {
                self.record_by_id(id)
                    .ok_or_else(|| FlowError::remote(id.as_str(), "unknown item"))
            })
            .collect::<Result<Vec<_>>>()?;

        let id = format!(
            "playlist-{}",
            self.snapshot.borrow().entities.len() + 1
        );
        self.insert(EntityRecord {
            kind: Some(EntityKind::Playlist),
            id: id.clone(),
            name: name.to_owned(),
            items,
            ..EntityRecord::default()
        });
        Ok(id)
    }
}
