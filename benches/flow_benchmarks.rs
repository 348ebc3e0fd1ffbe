//! # Trackflow Performance Benchmarks
//!
//! Benchmarks for the parts of a pipeline that touch every item.
//!
//! ## Benchmark Categories
//!
//! - **Algebra**: union, difference and alternation over in-memory collections
//! - **Reordering**: sort, dedupe and artist clustering
//! - **Cache**: write-through population and cached reads against SQLite
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark group
//! cargo bench algebra
//! cargo bench cache
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use std::hint::black_box;
use std::rc::Rc;
use tempfile::TempDir;
use trackflow::catalog::EntityRecord;
use trackflow::item::{AlbumRef, ArtistRef};
use trackflow::{
    ArtistGraph, CacheStore, EntityKind, Field, Item, Playlist, Session, SqliteCache, StaticCatalog, Track,
    TrackCollection,
};

/// Helper function to create test tracks spread over twenty artists
fn create_test_tracks(count: usize) -> Vec<Item> {
    (1..=count)
        .map(|i| {
            let artist = format!("artist-{}", (i - 1) % 20);
            Item::Track(Track {
                id: format!("track-{i:05}"),
                name: format!("Song {}", i % (count / 2 + 1)),
                duration_ms: 120_000 + (i as u64 * 7_919) % 240_000,
                popularity: Some((i % 100) as u32),
                album: Some(AlbumRef {
                    id: format!("album-{}", (i - 1) / 10),
                    artists: vec![ArtistRef {
                        id: artist.clone(),
                        name: artist,
                    }],
                    ..AlbumRef::default()
                }),
                ..Track::default()
            })
        })
        .collect()
}

/// Ring of artists with a few shortcuts
fn create_artist_graph() -> ArtistGraph {
    let mut graph = ArtistGraph::new();
    for i in 0..20 {
        graph.add_edge(&format!("artist-{i}"), &format!("artist-{}", (i + 1) % 20), 1.0);
        if i % 5 == 0 {
            graph.add_edge(&format!("artist-{i}"), &format!("artist-{}", (i * 7) % 20), 3.0);
        }
    }
    graph
}

/// Benchmark binary operators
fn benchmark_algebra(c: &mut Criterion) {
    let mut group = c.benchmark_group("algebra");
    let session = Session::new(StaticCatalog::default());

    for size in [100, 1000, 10_000].iter() {
        let tracks = create_test_tracks(*size);
        let half = tracks[..*size / 2].to_vec();

        group.bench_with_input(BenchmarkId::new("union", size), &tracks, |b, tracks| {
            b.iter_batched(
                || (tracks.clone(), half.clone()),
                |(a, h)| {
                    (TrackCollection::from_items(&session, a) + TrackCollection::from_items(&session, h))
                        .to_vec()
                        .map(|items| black_box(items.len()))
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_with_input(BenchmarkId::new("difference", size), &tracks, |b, tracks| {
            b.iter_batched(
                || (tracks.clone(), half.clone()),
                |(a, h)| {
                    (TrackCollection::from_items(&session, a) - TrackCollection::from_items(&session, h))
                        .to_vec()
                        .map(|items| black_box(items.len()))
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_with_input(BenchmarkId::new("alternate", size), &tracks, |b, tracks| {
            b.iter_batched(
                || (tracks.clone(), half.clone()),
                |(a, h)| {
                    (TrackCollection::from_items(&session, a) % TrackCollection::from_items(&session, h))
                        .to_vec()
                        .map(|items| black_box(items.len()))
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Benchmark whole-collection reordering
fn benchmark_reordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("reordering");
    let session = Session::new(StaticCatalog::default());
    let tracks = create_test_tracks(5000);

    group.bench_function("sort_popularity_5000", |b| {
        b.iter_batched(
            || tracks.clone(),
            |items| {
                TrackCollection::from_items(&session, items)
                    .sort(Field::Popularity, false)
                    .to_vec()
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("remove_duplicates_5000", |b| {
        b.iter_batched(
            || tracks.clone(),
            |items| TrackCollection::from_items(&session, items).remove_duplicates().to_vec(),
            BatchSize::SmallInput,
        )
    });

    group.bench_function("complex_sort_5000", |b| {
        b.iter_batched(
            || (tracks.clone(), create_artist_graph()),
            |(items, graph)| TrackCollection::from_items(&session, items).complex_sort(graph).to_vec(),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

/// Benchmark cache population and cached reads
fn benchmark_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");
    let tracks = create_test_tracks(1000);
    let records: Vec<serde_json::Value> = tracks
        .iter()
        .map(|item| serde_json::to_value(item).expect("Failed to encode track"))
        .collect();

    let catalog = || {
        let catalog = StaticCatalog::default();
        catalog.insert(EntityRecord {
            kind: Some(EntityKind::Playlist),
            id: "bench".into(),
            name: "Bench".into(),
            items: records.clone(),
            ..EntityRecord::default()
        });
        catalog
    };

    group.bench_function("write_through_1000", |b| {
        b.iter_batched(
            || {
                let dir = TempDir::new().expect("Failed to create temp directory");
                let cache = SqliteCache::open(&dir.path().join("bench.db")).expect("Failed to open cache");
                (dir, Session::new(catalog()).with_cache(cache))
            },
            |(_dir, session)| TrackCollection::from_id(&session, Playlist, "bench").to_vec(),
            BatchSize::PerIteration,
        )
    });

    let dir = TempDir::new().expect("Failed to create temp directory");
    let cache: Rc<dyn CacheStore> =
        Rc::new(SqliteCache::open(&dir.path().join("bench.db")).expect("Failed to open cache"));
    let warm = Session::new(catalog()).with_shared_cache(cache.clone());
    TrackCollection::from_id(&warm, Playlist, "bench")
        .to_vec()
        .expect("Failed to warm cache");

    group.bench_function("cached_read_1000", |b| {
        let session = Session::new(StaticCatalog::default()).with_shared_cache(cache.clone());
        b.iter(|| TrackCollection::from_id(&session, Playlist, "bench").to_vec())
    });

    group.finish();
}

criterion_group!(benches, benchmark_algebra, benchmark_reordering, benchmark_cache);
criterion_main!(benches);
