//! The item model: tracks, episodes and their audio features.
//!
//! Items are plain values. Identity is the catalog id, except for
//! [`remove_duplicates`](crate::TrackCollection::remove_duplicates) which keys
//! on the display name.

use crate::catalog::{EntityKind, RawRecord};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Reference to an artist as embedded in track and album records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Reference to the album a track belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub album_type: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

/// Reference to the show an episode belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub publisher: Option<String>,
}

/// Numeric descriptors the catalog computes per track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioFeatures {
    pub danceability: f64,
    pub energy: f64,
    pub key: i32,
    pub loudness: f64,
    pub mode: i32,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
    pub time_signature: i32,
}

/// One named descriptor of [`AudioFeatures`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFeature {
    Danceability,
    Energy,
    Key,
    Loudness,
    Mode,
    Speechiness,
    Acousticness,
    Instrumentalness,
    Liveness,
    Valence,
    Tempo,
    TimeSignature,
}

impl AudioFeatures {
    #[must_use]
    pub fn get(&self, feature: AudioFeature) -> f64 {
        match feature {
            AudioFeature::Danceability => self.danceability,
            AudioFeature::Energy => self.energy,
            AudioFeature::Key => f64::from(self.key),
            AudioFeature::Loudness => self.loudness,
            AudioFeature::Mode => f64::from(self.mode),
            AudioFeature::Speechiness => self.speechiness,
            AudioFeature::Acousticness => self.acousticness,
            AudioFeature::Instrumentalness => self.instrumentalness,
            AudioFeature::Liveness => self.liveness,
            AudioFeature::Valence => self.valence,
            AudioFeature::Tempo => self.tempo,
            AudioFeature::TimeSignature => f64::from(self.time_signature),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub album: Option<AlbumRef>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    /// Absent until the collection holding this track is enriched.
    #[serde(default)]
    pub audio_features: Option<AudioFeatures>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub show: Option<ShowRef>,
}

/// A playable entry of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Item {
    Track(Track),
    Episode(Episode),
}

impl Item {
    /// Decode a raw catalog record fetched for an entity of `kind`.
    ///
    /// Playlist entries wrap the actual track under a `track` key; that
    /// wrapper is removed first. An explicit `"type"` field wins over `kind`,
    /// so playlists mixing tracks and episodes decode correctly.
    pub fn from_raw(kind: EntityKind, record: RawRecord) -> Result<Self> {
        let record = unwrap_entry(record);
        let declared = record
            .get("type")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned);

        let is_episode = match declared.as_deref() {
            Some("episode") => true,
            Some(_) => false,
            None => kind == EntityKind::Show,
        };

        if is_episode {
            Ok(Self::Episode(serde_json::from_value(record)?))
        } else {
            Ok(Self::Track(serde_json::from_value(record)?))
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Track(t) => &t.id,
            Self::Episode(e) => &e.id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Track(t) => &t.name,
            Self::Episode(e) => &e.name,
        }
    }

    #[must_use]
    pub const fn duration_ms(&self) -> u64 {
        match self {
            Self::Track(t) => t.duration_ms,
            Self::Episode(e) => e.duration_ms,
        }
    }

    /// Duration in (fractional) minutes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_minutes(&self) -> f64 {
        self.duration_ms() as f64 / 1000.0 / 60.0
    }

    #[must_use]
    pub fn album(&self) -> Option<&AlbumRef> {
        match self {
            Self::Track(t) => t.album.as_ref(),
            Self::Episode(_) => None,
        }
    }

    #[must_use]
    pub fn artists(&self) -> &[ArtistRef] {
        match self {
            Self::Track(t) => &t.artists,
            Self::Episode(_) => &[],
        }
    }

    /// First album artist, falling back to the first track artist.
    #[must_use]
    pub fn primary_artist(&self) -> Option<&ArtistRef> {
        self.album()
            .and_then(|album| album.artists.first())
            .or_else(|| self.artists().first())
    }

    #[must_use]
    pub fn audio_features(&self) -> Option<&AudioFeatures> {
        match self {
            Self::Track(t) => t.audio_features.as_ref(),
            Self::Episode(_) => None,
        }
    }

    #[must_use]
    pub const fn as_track(&self) -> Option<&Track> {
        match self {
            Self::Track(t) => Some(t),
            Self::Episode(_) => None,
        }
    }

    /// Read one attribute for sorting.
    #[must_use]
    pub fn field(&self, field: Field) -> FieldValue {
        match field {
            Field::Name => FieldValue::Text(self.name().to_owned()),
            #[allow(clippy::cast_precision_loss)]
            Field::DurationMs => FieldValue::Number(self.duration_ms() as f64),
            Field::Popularity => self
                .as_track()
                .and_then(|t| t.popularity)
                .map_or(FieldValue::Missing, |p| FieldValue::Number(f64::from(p))),
            Field::AlbumName => self
                .album()
                .map_or(FieldValue::Missing, |a| FieldValue::Text(a.name.clone())),
            Field::ReleaseDate => {
                let date = match self {
                    Self::Track(t) => t.album.as_ref().and_then(|a| a.release_date.clone()),
                    Self::Episode(e) => e.release_date.clone(),
                };
                date.map_or(FieldValue::Missing, FieldValue::Text)
            }
            Field::PrimaryArtist => self
                .primary_artist()
                .map_or(FieldValue::Missing, |a| FieldValue::Text(a.name.clone())),
            Field::Audio(feature) => self
                .audio_features()
                .map_or(FieldValue::Missing, |f| FieldValue::Number(f.get(feature))),
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let by = match self {
            Self::Track(_) => self.primary_artist().map(|a| a.name.as_str()),
            Self::Episode(e) => e.show.as_ref().map(|s| s.name.as_str()),
        };
        match by {
            Some(by) if !by.is_empty() => write!(f, "{} - {}", self.name(), by),
            _ => write!(f, "{}", self.name()),
        }
    }
}

fn unwrap_entry(record: RawRecord) -> RawRecord {
    match record {
        serde_json::Value::Object(mut map) if map.get("track").is_some_and(|t| t.is_object()) => {
            map.remove("track").unwrap_or_default()
        }
        other => other,
    }
}

/// Attribute path usable as a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    DurationMs,
    Popularity,
    AlbumName,
    ReleaseDate,
    PrimaryArtist,
    Audio(AudioFeature),
}

impl Field {
    /// Sorting by this field requires enriched items.
    #[must_use]
    pub const fn touches_audio_features(self) -> bool {
        matches!(self, Self::Audio(_))
    }
}

/// Totally ordered value of a [`Field`]: missing < numbers < text.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Missing,
    Number(f64),
    Text(String),
}

impl Ord for FieldValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Missing, Self::Missing) => Ordering::Equal,
            (Self::Missing, _) => Ordering::Less,
            (_, Self::Missing) => Ordering::Greater,
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FieldValue {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_playlist_entry_unwraps_track() {
        let record = json!({
            "added_at": "2021-01-01T00:00:00Z",
            "track": {
                "id": "t1",
                "name": "Blue in Green",
                "duration_ms": 337_000,
                "album": {"id": "al1", "name": "Kind of Blue", "artists": [{"id": "ar1", "name": "Miles Davis"}]},
                "artists": [{"id": "ar1", "name": "Miles Davis"}]
            }
        });

        let item = Item::from_raw(EntityKind::Playlist, record).unwrap();
        assert_eq!(item.id(), "t1");
        assert_eq!(item.primary_artist().unwrap().id, "ar1");
        assert!(item.audio_features().is_none());
        assert_eq!(item.to_string(), "Blue in Green - Miles Davis");
    }

    #[test]
    fn test_show_records_decode_to_episodes() {
        let record = json!({"id": "e1", "name": "Pilot", "duration_ms": 60_000});
        let item = Item::from_raw(EntityKind::Show, record).unwrap();
        assert!(matches!(item, Item::Episode(_)));
        assert!((item.duration_minutes() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_declared_type_wins_over_kind() {
        let record = json!({"type": "episode", "id": "e2", "name": "Interview"});
        let item = Item::from_raw(EntityKind::Playlist, record).unwrap();
        assert!(matches!(item, Item::Episode(_)));
    }

    #[test]
    fn test_malformed_record_is_decode_error() {
        let record = json!({"name": "no id"});
        let err = Item::from_raw(EntityKind::Album, record).unwrap_err();
        assert!(matches!(err, crate::FlowError::Decode(_)));
    }

    #[test]
    fn test_cached_payload_keeps_type_tag() {
        let item = Item::from_raw(EntityKind::Album, json!({"id": "t9", "name": "x"})).unwrap();
        let payload = serde_json::to_string(&item).unwrap();
        assert!(payload.contains("\"type\":\"track\""));
        let back: Item = serde_json::from_str(&payload).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_field_value_ordering() {
        assert!(FieldValue::Missing < FieldValue::Number(-1.0));
        assert!(FieldValue::Number(1.0) < FieldValue::Number(2.0));
        assert!(FieldValue::Number(1e9) < FieldValue::Text(String::new()));
        assert!(FieldValue::Text("a".into()) < FieldValue::Text("b".into()));
    }

    #[test]
    fn test_audio_field_is_missing_until_enriched() {
        let mut track: Track = serde_json::from_value(json!({"id": "t1", "name": "x"})).unwrap();
        let field = Field::Audio(AudioFeature::Tempo);
        assert!(field.touches_audio_features());
        assert_eq!(Item::Track(track.clone()).field(field), FieldValue::Missing);

        track.audio_features = Some(AudioFeatures { tempo: 120.0, ..AudioFeatures::default() });
        assert_eq!(Item::Track(track).field(field), FieldValue::Number(120.0));
    }
}
