//! Property-based tests for the collection algebra
//!
//! Uses proptest to check the algebraic invariants across random inputs.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::rc::Rc;
use trackflow::catalog::EntityRecord;
use trackflow::item::{AlbumRef, ArtistRef};
use trackflow::{
    ArtistGraph, AudioFeatures, CacheStore, EntityKind, Item, MemoryCache, Playlist, Predicate, Session, SqliteCache,
    StaticCatalog, Track, TrackCollection,
};

// ===== Helpers =====

fn arbitrary_track() -> impl Strategy<Value = Item> {
    (
        "[a-h]{1,2}",     // id, small alphabet so collisions happen
        "[A-Da-d ]{1,4}", // name, collides independently of id
        1u64..600_000,    // duration
        "[xyz]",          // artist
    )
        .prop_map(|(id, name, duration_ms, artist)| {
            Item::Track(Track {
                id,
                name,
                duration_ms,
                album: Some(AlbumRef {
                    id: format!("album-{artist}"),
                    artists: vec![ArtistRef {
                        id: artist.clone(),
                        name: artist,
                    }],
                    ..AlbumRef::default()
                }),
                ..Track::default()
            })
        })
}

fn arbitrary_tracks() -> impl Strategy<Value = Vec<Item>> {
    prop::collection::vec(arbitrary_track(), 0..30)
}

fn enriched(items: &[Item]) -> Vec<Item> {
    items
        .iter()
        .cloned()
        .map(|item| match item {
            Item::Track(mut track) => {
                track.audio_features = Some(AudioFeatures::default());
                Item::Track(track)
            }
            other => other,
        })
        .collect()
}

fn collection(session: &Session, items: &[Item], is_enriched: bool) -> TrackCollection {
    if is_enriched {
        TrackCollection::from_enriched_items(session, enriched(items)).unwrap()
    } else {
        TrackCollection::from_items(session, items.to_vec())
    }
}

fn ids(items: &[Item]) -> Vec<String> {
    items.iter().map(|item| item.id().to_owned()).collect()
}

fn session() -> Session {
    Session::new(StaticCatalog::default())
}

// ===== Property Tests =====

proptest! {
    /// Property: binary combinations are enriched only when both sides are
    #[test]
    fn combined_enrichment_is_conjunction(
        a in arbitrary_tracks(),
        b in arbitrary_tracks(),
        a_enriched in any::<bool>(),
        b_enriched in any::<bool>(),
    ) {
        let s = session();
        let both = a_enriched && b_enriched;

        prop_assert_eq!((collection(&s, &a, a_enriched) + collection(&s, &b, b_enriched)).is_enriched(), both);
        prop_assert_eq!((collection(&s, &a, a_enriched) / collection(&s, &b, b_enriched)).is_enriched(), both);
        prop_assert_eq!((collection(&s, &a, a_enriched) % collection(&s, &b, b_enriched)).is_enriched(), both);
        prop_assert_eq!((collection(&s, &a, a_enriched) - collection(&s, &b, b_enriched)).is_enriched(), a_enriched);
    }

    /// Property: union keeps every item of both sides
    #[test]
    fn union_does_not_deduplicate(a in arbitrary_tracks(), b in arbitrary_tracks()) {
        let s = session();
        let joined = (collection(&s, &a, false) + collection(&s, &b, false)).to_vec().unwrap();
        prop_assert_eq!(joined.len(), a.len() + b.len());
        prop_assert_eq!(ids(&joined), ids(&[a, b].concat()));
    }

    /// Property: removing duplicates twice equals removing them once
    #[test]
    fn remove_duplicates_is_idempotent(a in arbitrary_tracks()) {
        let s = session();
        let once = collection(&s, &a, false).remove_duplicates().to_vec().unwrap();
        let twice = collection(&s, &a, false).remove_duplicates().remove_duplicates().to_vec().unwrap();
        prop_assert_eq!(ids(&once), ids(&twice));

        let names: HashSet<&str> = once.iter().map(Item::name).collect();
        prop_assert_eq!(names.len(), once.len());
    }

    /// Property: difference keeps no id that occurs on the right
    #[test]
    fn difference_excludes_right_ids(a in arbitrary_tracks(), b in arbitrary_tracks()) {
        let s = session();
        let right: HashSet<String> = ids(&b).into_iter().collect();
        let rest = (collection(&s, &a, false) - collection(&s, &b, false)).to_vec().unwrap();
        prop_assert!(rest.iter().all(|item| !right.contains(item.id())));

        let expected: Vec<String> = ids(&a).into_iter().filter(|id| !right.contains(id)).collect();
        prop_assert_eq!(ids(&rest), expected);
    }

    /// Property: intersection keeps exactly the left items whose id is on the right
    #[test]
    fn intersection_keeps_shared_ids(a in arbitrary_tracks(), b in arbitrary_tracks()) {
        let s = session();
        let right: HashSet<String> = ids(&b).into_iter().collect();
        let shared = (collection(&s, &a, false) / collection(&s, &b, false)).to_vec().unwrap();
        let expected: Vec<String> = ids(&a).into_iter().filter(|id| right.contains(id)).collect();
        prop_assert_eq!(ids(&shared), expected);
    }

    /// Property: sampling at least the whole collection returns a permutation of it
    #[test]
    fn oversized_sample_is_permutation(a in arbitrary_tracks(), extra in 0usize..10, seed in any::<u64>()) {
        let s = session();
        let sampled = collection(&s, &a, false)
            .sample_with(StdRng::seed_from_u64(seed), a.len() + extra)
            .to_vec()
            .unwrap();
        prop_assert_eq!(sampled.len(), a.len());

        let mut got = ids(&sampled);
        let mut want = ids(&a);
        got.sort();
        want.sort();
        prop_assert_eq!(got, want);
    }

    /// Property: alternating stops at the shorter side
    #[test]
    fn alternate_interleaves_up_to_shorter(a in arbitrary_tracks(), b in arbitrary_tracks()) {
        let s = session();
        let mixed = (collection(&s, &a, false) % collection(&s, &b, false)).to_vec().unwrap();
        let rounds = a.len().min(b.len());
        prop_assert_eq!(mixed.len(), 2 * rounds);
        for i in 0..rounds {
            prop_assert_eq!(mixed[2 * i].id(), a[i].id());
            prop_assert_eq!(mixed[2 * i + 1].id(), b[i].id());
        }
    }

    /// Property: inserting at a position splices the whole right side there
    #[test]
    fn insert_at_position_splices(a in arbitrary_tracks(), b in arbitrary_tracks(), position in 0usize..40) {
        let s = session();
        let spliced = collection(&s, &a, false)
            .insert_at_position(collection(&s, &b, false), position)
            .to_vec()
            .unwrap();
        let cut = position.min(a.len());
        let expected = [&a[..cut], &b[..], &a[cut..]].concat();
        prop_assert_eq!(ids(&spliced), ids(&expected));
    }

    /// Property: clustering keeps every item and makes each artist contiguous
    #[test]
    fn complex_sort_groups_artists(a in arbitrary_tracks()) {
        let s = session();
        let mut graph = ArtistGraph::new();
        graph.add_edge("x", "y", 1.0);
        graph.add_edge("y", "z", 1.0);
        graph.add_edge("x", "z", 5.0);

        let sorted = collection(&s, &a, false).complex_sort(graph).to_vec().unwrap();
        prop_assert_eq!(sorted.len(), a.len());

        let artists: Vec<String> = sorted
            .iter()
            .map(|item| item.primary_artist().map(|ar| ar.id.clone()).unwrap_or_default())
            .collect();
        let mut runs = artists.clone();
        runs.dedup();
        let distinct: HashSet<&String> = artists.iter().collect();
        prop_assert_eq!(runs.len(), distinct.len());
    }

    /// Property: an audio-feature filter on plain items enriches every survivor
    #[test]
    fn audio_filter_forces_enrichment(a in arbitrary_tracks(), threshold in 0.0f64..1.0) {
        let catalog = StaticCatalog::default();
        for (i, item) in a.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let energy = (i % 10) as f64 / 10.0;
            catalog.insert_audio_features(item.id(), AudioFeatures { energy, ..AudioFeatures::default() });
        }
        let s = Session::new(catalog);

        let loud = TrackCollection::from_items(&s, a)
            .filter(Predicate::audio(move |_, features| features.energy >= threshold));
        prop_assert!(loud.is_enriched());
        let items = loud.to_vec().unwrap();
        prop_assert!(items.iter().all(|item| item.audio_features().is_some_and(|f| f.energy >= threshold)));
    }

    /// Property: a collection read back from the cache has the same ids in the same order
    #[test]
    fn cache_round_trip_preserves_order(a in arbitrary_tracks(), use_sqlite in any::<bool>()) {
        let records = a.iter().map(|item| serde_json::to_value(item).unwrap()).collect();
        let catalog = StaticCatalog::default();
        catalog.insert(EntityRecord {
            kind: Some(EntityKind::Playlist),
            id: "generated".into(),
            name: "Generated".into(),
            items: records,
            ..EntityRecord::default()
        });

        let cache: Rc<dyn CacheStore> = if use_sqlite {
            Rc::new(SqliteCache::in_memory().unwrap())
        } else {
            Rc::new(MemoryCache::new())
        };
        let first = Session::new(catalog).with_shared_cache(cache.clone());
        let fetched = TrackCollection::from_id(&first, Playlist, "generated").to_vec().unwrap();
        prop_assert!(cache.contains("generated").unwrap());

        let fresh = Session::new(StaticCatalog::default()).with_shared_cache(cache);
        let cached = TrackCollection::from_id(&fresh, Playlist, "generated").to_vec().unwrap();
        prop_assert_eq!(ids(&cached), ids(&fetched));
        prop_assert_eq!(ids(&cached), ids(&a));
    }
}
