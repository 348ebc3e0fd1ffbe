//! Relational shaping of a materialised collection.

use crate::item::{AudioFeatures, Item};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRow {
    pub id: String,
    pub name: String,
    pub duration_ms: u64,
    pub popularity: Option<u32>,
    pub explicit: bool,
    pub album_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRow {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRow {
    pub id: String,
    pub name: String,
    pub release_date: Option<String>,
    pub album_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatureRow {
    pub track_id: String,
    #[serde(flatten)]
    pub features: AudioFeatures,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlbumArtistRow {
    pub album_id: String,
    pub artist_id: String,
}

/// Five tables describing the tracks of a collection.
///
/// Tracks keep collection order and may repeat. Artists, albums and links
/// are unique by key, in first-seen order. Episodes have no tabular form
/// and are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableExport {
    pub tracks: Vec<TrackRow>,
    pub artists: Vec<ArtistRow>,
    pub albums: Vec<AlbumRow>,
    pub audio_features: Vec<AudioFeatureRow>,
    pub album_artists: Vec<AlbumArtistRow>,
}

impl TableExport {
    #[must_use]
    pub fn from_items(items: &[Item]) -> Self {
        let mut export = Self::default();
        let mut seen_artists = HashSet::new();
        let mut seen_albums = HashSet::new();
        let mut seen_links = HashSet::new();

        for item in items {
            let Item::Track(track) = item else {
                warn!("Skipping episode '{}' in table export", item.id());
                continue;
            };

            export.tracks.push(TrackRow {
                id: track.id.clone(),
                name: track.name.clone(),
                duration_ms: track.duration_ms,
                popularity: track.popularity,
                explicit: track.explicit,
                album_id: track.album.as_ref().map(|a| a.id.clone()),
            });

            if let Some(features) = &track.audio_features {
                export.audio_features.push(AudioFeatureRow {
                    track_id: track.id.clone(),
                    features: features.clone(),
                });
            }

            let album_artists = track.album.iter().flat_map(|a| a.artists.iter());
            for artist in track.artists.iter().chain(album_artists) {
                if seen_artists.insert(artist.id.clone()) {
                    export.artists.push(ArtistRow {
                        id: artist.id.clone(),
                        name: artist.name.clone(),
                    });
                }
            }

            if let Some(album) = &track.album {
                if seen_albums.insert(album.id.clone()) {
                    export.albums.push(AlbumRow {
                        id: album.id.clone(),
                        name: album.name.clone(),
                        release_date: album.release_date.clone(),
                        album_type: album.album_type.clone(),
                    });
                }
                for artist in &album.artists {
                    let link = AlbumArtistRow {
                        album_id: album.id.clone(),
                        artist_id: artist.id.clone(),
                    };
                    if seen_links.insert(link.clone()) {
                        export.album_artists.push(link);
                    }
                }
            }
        }

        export
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
