//! Single-input operators: sampling, filtering, sorting and enrichment.

use crate::collection::TrackCollection;
use crate::error::FlowError;
use crate::item::{AudioFeatures, Field, Item};
use crate::stream::ItemStream;
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt;

/// Substrings marking an item as a remix, matched case-insensitively.
pub const REMIX_MARKERS: [&str; 2] = ["remix", "mixed"];

/// Condition for [`TrackCollection::filter`].
///
/// The variant says whether the condition reads audio features, so the
/// collection can enrich itself before filtering.
pub enum Predicate {
    Basic(Box<dyn Fn(&Item) -> bool>),
    AudioFeatures(Box<dyn Fn(&Item, &AudioFeatures) -> bool>),
}

impl Predicate {
    pub fn basic(f: impl Fn(&Item) -> bool + 'static) -> Self {
        Self::Basic(Box::new(f))
    }

    pub fn audio(f: impl Fn(&Item, &AudioFeatures) -> bool + 'static) -> Self {
        Self::AudioFeatures(Box::new(f))
    }

    #[must_use]
    pub const fn touches_audio_features(&self) -> bool {
        matches!(self, Self::AudioFeatures(_))
    }

    /// Items without audio features never satisfy an audio predicate.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        match self {
            Self::Basic(f) => f(item),
            Self::AudioFeatures(f) => item.audio_features().is_some_and(|features| f(item, features)),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic(_) => f.write_str("Predicate::Basic"),
            Self::AudioFeatures(_) => f.write_str("Predicate::AudioFeatures"),
        }
    }
}

impl TrackCollection {
    /// Random permutation of all items.
    #[must_use]
    pub fn shuffle(self) -> Self {
        self.shuffle_with(rand::thread_rng())
    }

    #[must_use]
    pub fn shuffle_with<R: Rng + 'static>(self, mut rng: R) -> Self {
        self.reorder(move |items| items.shuffle(&mut rng))
    }

    /// `n` items drawn without replacement; all of them, in random order,
    /// when `n` is at least the length.
    #[must_use]
    pub fn sample(self, n: usize) -> Self {
        self.sample_with(rand::thread_rng(), n)
    }

    #[must_use]
    pub fn sample_with<R: Rng + 'static>(self, mut rng: R, n: usize) -> Self {
        self.reorder(move |items| {
            let k = n.min(items.len());
            let picked = items.partial_shuffle(&mut rng, k).0.to_vec();
            *items = picked;
        })
    }

    /// Drop items whose name marks them as a remix.
    #[must_use]
    pub fn remove_remixes(self) -> Self {
        self.retain(|item| {
            let name = item.name().to_lowercase();
            !REMIX_MARKERS.iter().any(|marker| name.contains(marker))
        })
    }

    /// Stable sort on `field`. Sorting on an audio feature enriches first.
    #[must_use]
    pub fn sort(self, field: Field, ascending: bool) -> Self {
        let source = if field.touches_audio_features() && !self.is_enriched() {
            debug!("Sorting on {field:?} requires audio features, enriching");
            self.add_audio_features()
        } else {
            self
        };
        if ascending {
            source.reorder(move |items| items.sort_by_cached_key(|item| item.field(field)))
        } else {
            source.reorder(move |items| items.sort_by_cached_key(|item| Reverse(item.field(field))))
        }
    }

    /// Stable sort on a caller supplied key. Never enriches.
    #[must_use]
    pub fn sort_by_key<K, F>(self, mut key: F, ascending: bool) -> Self
    where
        K: Ord,
        F: FnMut(&Item) -> K + 'static,
    {
        self.reorder(move |items| {
            if ascending {
                items.sort_by_key(|item| key(item));
            } else {
                items.sort_by_key(|item| Reverse(key(item)));
            }
        })
    }

    /// Keep items satisfying `predicate`, enriching first for audio predicates.
    #[must_use]
    pub fn filter(self, predicate: Predicate) -> Self {
        let source = if predicate.touches_audio_features() && !self.is_enriched() {
            self.add_audio_features()
        } else {
            self
        };
        source.retain(move |item| predicate.matches(item))
    }

    /// Drop every item whose display name was already seen.
    #[must_use]
    pub fn remove_duplicates(self) -> Self {
        let mut seen = HashSet::new();
        self.retain(move |item| seen.insert(item.name().to_owned()))
    }

    #[must_use]
    pub fn first(self, n: usize) -> Self {
        let (items, enriched, session) = self.into_parts();
        Self::derived(session, ItemStream::new(items.take(n)), enriched)
    }

    /// Attach audio features to every item, one lookup per item.
    ///
    /// An item the catalog has no features for (including every episode)
    /// fails the stream with a remote lookup error naming it.
    #[must_use]
    pub fn add_audio_features(self) -> Self {
        let (items, _, session) = self.into_parts();
        let lookup = session.clone();
        let enriched = items.map(move |next| {
            let mut item = next?;
            match &mut item {
                Item::Track(track) => {
                    let features = lookup
                        .catalog()
                        .fetch_audio_features(std::slice::from_ref(&track.id))?
                        .remove(&track.id)
                        .ok_or_else(|| FlowError::remote(track.id.as_str(), "no audio features"))?;
                    track.audio_features = Some(features);
                }
                Item::Episode(episode) => {
                    return Err(FlowError::remote(episode.id.as_str(), "episodes carry no audio features"));
                }
            }
            Ok(item)
        });
        Self::derived(session, ItemStream::new(enriched), true)
    }

    /// Lazily keep items for which `keep` holds. Flag preserved.
    fn retain<F>(self, mut keep: F) -> Self
    where
        F: FnMut(&Item) -> bool + 'static,
    {
        let (items, enriched, session) = self.into_parts();
        let kept = items.filter(move |next| next.as_ref().map_or(true, |item| keep(item)));
        Self::derived(session, ItemStream::new(kept), enriched)
    }

    /// Materialise on first pull and rearrange the buffer. Flag preserved.
    pub(crate) fn reorder<F>(self, arrange: F) -> Self
    where
        F: FnOnce(&mut Vec<Item>) + 'static,
    {
        let (items, enriched, session) = self.into_parts();
        let arranged = ItemStream::deferred(move || {
            let mut buffer = items.collect_items()?;
            arrange(&mut buffer);
            Ok(ItemStream::from_items(buffer))
        });
        Self::derived(session, arranged, enriched)
    }
}
