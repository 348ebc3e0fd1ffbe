//! Cache store capability and its SQLite implementation.
//!
//! A store keeps, per collection id, the ordered items of that collection
//! and a completion mark. Write-through population appends item by item and
//! marks the collection complete only once the source is exhausted, so a
//! half-read collection is never served as if it were whole.

use crate::error::Result;
use crate::export::TableExport;
use crate::item::Item;
use log::{debug, trace};
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

/// Persistent, id-keyed store used in front of the remote catalog.
pub trait CacheStore {
    /// Whether a complete copy of the collection is stored.
    fn contains(&self, collection_id: &str) -> Result<bool>;

    /// Stored items of the collection, in their original order.
    fn read_items(&self, collection_id: &str) -> Result<Vec<Item>>;

    /// Drop any partial rows and start populating the collection again.
    fn begin_collection(&self, collection_id: &str) -> Result<()>;

    /// Append one item to the collection.
    fn write_item(&self, collection_id: &str, item: &Item) -> Result<()>;

    /// Mark the collection complete.
    fn finish_collection(&self, collection_id: &str) -> Result<()>;

    /// Replace the collection with `items` and store their tabular export.
    fn write_table(&self, collection_id: &str, items: &[Item]) -> Result<()>;
}

/// SQLite backed [`CacheStore`].
#[derive(Debug)]
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        debug!("Opened cache database at {}", path.display());
        Self::init(conn)
    }

    /// Cache that lives only as long as the value.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS collections (
                id       TEXT    PRIMARY KEY,
                complete INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS collection_items (
                collection_id TEXT    NOT NULL,
                position      INTEGER NOT NULL,
                item_id       TEXT    NOT NULL,
                payload       TEXT    NOT NULL,
                PRIMARY KEY (collection_id, position)
            );
            CREATE TABLE IF NOT EXISTS tracks (
                id          TEXT    PRIMARY KEY,
                name        TEXT    NOT NULL,
                duration_ms INTEGER NOT NULL,
                popularity  INTEGER,
                explicit    INTEGER NOT NULL,
                album_id    TEXT
            );
            CREATE TABLE IF NOT EXISTS artists (
                id   TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS albums (
                id           TEXT PRIMARY KEY,
                name         TEXT NOT NULL,
                release_date TEXT,
                album_type   TEXT
            );
            CREATE TABLE IF NOT EXISTS audio_features (
                track_id         TEXT PRIMARY KEY,
                danceability     REAL NOT NULL,
                energy           REAL NOT NULL,
                musical_key      INTEGER NOT NULL,
                loudness         REAL NOT NULL,
                mode             INTEGER NOT NULL,
                speechiness      REAL NOT NULL,
                acousticness     REAL NOT NULL,
                instrumentalness REAL NOT NULL,
                liveness         REAL NOT NULL,
                valence          REAL NOT NULL,
                tempo            REAL NOT NULL,
                time_signature   INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS album_artists (
                album_id  TEXT NOT NULL,
                artist_id TEXT NOT NULL,
                PRIMARY KEY (album_id, artist_id)
            );",
        )?;
        Ok(Self { conn })
    }

    /// Ids of all complete collections.
    pub fn collection_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM collections WHERE complete = 1 ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Number of rows in one of the export tables. Good for testing.
    pub fn table_len(&self, table: ExportTable) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn append(conn: &Connection, collection_id: &str, item: &Item) -> Result<()> {
        let payload = serde_json::to_string(item)?;
        conn.execute(
            "INSERT OR IGNORE INTO collections (id, complete) VALUES (?1, 0)",
            [collection_id],
        )?;
        conn.execute(
            "INSERT INTO collection_items (collection_id, position, item_id, payload)
             VALUES (?1,
                     (SELECT COALESCE(MAX(position) + 1, 0) FROM collection_items WHERE collection_id = ?1),
                     ?2, ?3)",
            params![collection_id, item.id(), payload],
        )?;
        Ok(())
    }

    fn reset(conn: &Connection, collection_id: &str) -> Result<()> {
        conn.execute(
            "DELETE FROM collection_items WHERE collection_id = ?1",
            [collection_id],
        )?;
        conn.execute(
            "INSERT INTO collections (id, complete) VALUES (?1, 0)
             ON CONFLICT(id) DO UPDATE SET complete = 0",
            [collection_id],
        )?;
        Ok(())
    }

    fn store_export(conn: &Connection, export: &TableExport) -> Result<()> {
        let mut tracks = conn.prepare(
            "INSERT OR REPLACE INTO tracks (id, name, duration_ms, popularity, explicit, album_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for row in &export.tracks {
            tracks.execute(params![
                row.id,
                row.name,
                i64::try_from(row.duration_ms).unwrap_or(i64::MAX),
                row.popularity,
                row.explicit,
                row.album_id
            ])?;
        }

        let mut artists = conn.prepare("INSERT OR REPLACE INTO artists (id, name) VALUES (?1, ?2)")?;
        for row in &export.artists {
            artists.execute(params![row.id, row.name])?;
        }

        let mut albums = conn.prepare(
            "INSERT OR REPLACE INTO albums (id, name, release_date, album_type) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for row in &export.albums {
            albums.execute(params![row.id, row.name, row.release_date, row.album_type])?;
        }

        let mut features = conn.prepare(
            "INSERT OR REPLACE INTO audio_features (track_id, danceability, energy, musical_key, loudness, mode,
                 speechiness, acousticness, instrumentalness, liveness, valence, tempo, time_signature)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )?;
        for row in &export.audio_features {
            let f = &row.features;
            features.execute(params![
                row.track_id,
                f.danceability,
                f.energy,
                f.key,
                f.loudness,
                f.mode,
                f.speechiness,
                f.acousticness,
                f.instrumentalness,
                f.liveness,
                f.valence,
                f.tempo,
                f.time_signature
            ])?;
        }

        let mut links = conn.prepare(
            "INSERT OR IGNORE INTO album_artists (album_id, artist_id) VALUES (?1, ?2)",
        )?;
        for row in &export.album_artists {
            links.execute(params![row.album_id, row.artist_id])?;
        }

        Ok(())
    }
}

/// Export tables written by [`CacheStore::write_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTable {
    Tracks,
    Artists,
    Albums,
    AudioFeatures,
    AlbumArtists,
}

impl ExportTable {
    const fn name(self) -> &'static str {
        match self {
            Self::Tracks => "tracks",
            Self::Artists => "artists",
            Self::Albums => "albums",
            Self::AudioFeatures => "audio_features",
            Self::AlbumArtists => "album_artists",
        }
    }
}

impl CacheStore for SqliteCache {
    fn contains(&self, collection_id: &str) -> Result<bool> {
        let complete: Option<bool> = self
            .conn
            .query_row(
                "SELECT complete FROM collections WHERE id = ?1",
                [collection_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(complete.unwrap_or(false))
    }

    fn read_items(&self, collection_id: &str) -> Result<Vec<Item>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM collection_items WHERE collection_id = ?1 ORDER BY position",
        )?;
        let payloads = stmt
            .query_map([collection_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut items = Vec::with_capacity(payloads.len());
        for payload in payloads {
            items.push(serde_json::from_str(&payload)?);
        }
        debug!("Read {} cached items for {collection_id}", items.len());
        Ok(items)
    }

    fn begin_collection(&self, collection_id: &str) -> Result<()> {
        Self::reset(&self.conn, collection_id)
    }

    fn write_item(&self, collection_id: &str, item: &Item) -> Result<()> {
        trace!("Caching item {} under {collection_id}", item.id());
        Self::append(&self.conn, collection_id, item)
    }

    fn finish_collection(&self, collection_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE collections SET complete = 1 WHERE id = ?1",
            [collection_id],
        )?;
        Ok(())
    }

    fn write_table(&self, collection_id: &str, items: &[Item]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        Self::reset(&tx, collection_id)?;
        for item in items {
            Self::append(&tx, collection_id, item)?;
        }
        Self::store_export(&tx, &TableExport::from_items(items))?;
        tx.execute(
            "UPDATE collections SET complete = 1 WHERE id = ?1",
            [collection_id],
        )?;

        tx.commit()?;
        debug!("Stored {} items as table rows for {collection_id}", items.len());
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
struct StoredCollection {
    items: Vec<Item>,
    complete: bool,
}

/// Process-local [`CacheStore`], handy for tests and short-lived sessions.
#[derive(Debug, Default)]
pub struct MemoryCache {
    collections: RefCell<HashMap<String, StoredCollection>>,
    tables: RefCell<HashMap<String, TableExport>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Export stored by the last [`CacheStore::write_table`] for this id.
    #[must_use]
    pub fn table(&self, collection_id: &str) -> Option<TableExport> {
        self.tables.borrow().get(collection_id).cloned()
    }

    /// Items stored so far, complete or not.
    #[must_use]
    pub fn stored_len(&self, collection_id: &str) -> usize {
        self.collections
            .borrow()
            .get(collection_id)
            .map_or(0, |c| c.items.len())
    }
}

impl CacheStore for MemoryCache {
    fn contains(&self, collection_id: &str) -> Result<bool> {
        Ok(self
            .collections
            .borrow()
            .get(collection_id)
            .is_some_and(|c| c.complete))
    }

    fn read_items(&self, collection_id: &str) -> Result<Vec<Item>> {
        Ok(self
            .collections
            .borrow()
            .get(collection_id)
            .map(|c| c.items.clone())
            .unwrap_or_default())
    }

    fn begin_collection(&self, collection_id: &str) -> Result<()> {
        self.collections
            .borrow_mut()
            .insert(collection_id.to_owned(), StoredCollection::default());
        Ok(())
    }

    fn write_item(&self, collection_id: &str, item: &Item) -> Result<()> {
        self.collections
            .borrow_mut()
            .entry(collection_id.to_owned())
            .or_default()
            .items
            .push(item.clone());
        Ok(())
    }

    fn finish_collection(&self, collection_id: &str) -> Result<()> {
        if let Some(stored) = self.collections.borrow_mut().get_mut(collection_id) {
            stored.complete = true;
        }
        Ok(())
    }

    fn write_table(&self, collection_id: &str, items: &[Item]) -> Result<()> {
        self.collections.borrow_mut().insert(
            collection_id.to_owned(),
            StoredCollection {
                items: items.to_vec(),
                complete: true,
            },
        );
        self.tables
            .borrow_mut()
            .insert(collection_id.to_owned(), TableExport::from_items(items));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntityKind;
    use crate::item::AudioFeatures;
    use serde_json::json;

    fn track(id: &str) -> Item {
        Item::from_raw(
            EntityKind::Album,
            json!({
                "id": id,
                "name": format!("Song {id}"),
                "duration_ms": 180_000,
                "album": {"id": "al1", "name": "Album", "artists": [{"id": "ar1", "name": "Artist"}]},
                "artists": [{"id": "ar1", "name": "Artist"}]
            }),
        )
        .unwrap()
    }

    fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(Item::id).collect()
    }

    fn stores() -> Vec<Box<dyn CacheStore>> {
        vec![
            Box::new(SqliteCache::in_memory().unwrap()),
            Box::new(MemoryCache::new()),
        ]
    }

    #[test]
    fn test_partial_population_is_not_contained() {
        for store in stores() {
            store.begin_collection("p1").unwrap();
            store.write_item("p1", &track("a")).unwrap();
            assert!(!store.contains("p1").unwrap());

            store.write_item("p1", &track("b")).unwrap();
            store.finish_collection("p1").unwrap();
            assert!(store.contains("p1").unwrap());
            assert_eq!(ids(&store.read_items("p1").unwrap()), vec!["a", "b"]);
        }
    }

    #[test]
    fn test_begin_discards_previous_rows() {
        for store in stores() {
            store.begin_collection("p1").unwrap();
            store.write_item("p1", &track("stale")).unwrap();
            store.begin_collection("p1").unwrap();
            store.write_item("p1", &track("fresh")).unwrap();
            store.finish_collection("p1").unwrap();
            assert_eq!(ids(&store.read_items("p1").unwrap()), vec!["fresh"]);
        }
    }

    #[test]
    fn test_unknown_collection_reads_empty() {
        for store in stores() {
            assert!(!store.contains("missing").unwrap());
            assert!(store.read_items("missing").unwrap().is_empty());
        }
    }

    #[test]
    fn test_sqlite_write_table_fills_export_tables() {
        let cache = SqliteCache::in_memory().unwrap();
        let mut enriched = track("a");
        if let Item::Track(t) = &mut enriched {
            t.audio_features = Some(AudioFeatures { tempo: 99.0, ..AudioFeatures::default() });
        }
        cache
            .write_table("mix", &[enriched, track("b"), track("a")])
            .unwrap();

        assert!(cache.contains("mix").unwrap());
        assert_eq!(ids(&cache.read_items("mix").unwrap()), vec!["a", "b", "a"]);
        assert_eq!(cache.table_len(ExportTable::Tracks).unwrap(), 2);
        assert_eq!(cache.table_len(ExportTable::Albums).unwrap(), 1);
        assert_eq!(cache.table_len(ExportTable::Artists).unwrap(), 1);
        assert_eq!(cache.table_len(ExportTable::AudioFeatures).unwrap(), 1);
        assert_eq!(cache.table_len(ExportTable::AlbumArtists).unwrap(), 1);
        assert_eq!(cache.collection_ids().unwrap(), vec!["mix".to_string()]);
    }

    #[test]
    fn test_sqlite_cache_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache.db");
        {
            let cache = SqliteCache::open(&path).unwrap();
            cache.write_table("p1", &[track("x"), track("y")]).unwrap();
        }
        let cache = SqliteCache::open(&path).unwrap();
        assert_eq!(ids(&cache.read_items("p1").unwrap()), vec!["x", "y"]);
    }
}
