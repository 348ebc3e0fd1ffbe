//! Reordering algorithms: target optimisation and artist clustering.
//!
//! [`TrackCollection::complex_sort`] groups items by artist and walks the
//! groups greedily, always continuing with the nearest group in a
//! [`DistanceGraph`]. [`ArtistGraph`] is the stock graph: weighted, undirected,
//! with shortest-path distances.

use crate::catalog::EntityKind;
use crate::collection::TrackCollection;
use crate::error::Result;
use crate::item::Item;
use crate::session::Session;
use log::{debug, trace};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Distance used when two groups are not connected.
pub const UNREACHABLE: f64 = 9_999_999.0;

/// Something that can tell how far apart two group keys are.
pub trait DistanceGraph {
    /// Shortest distance from `from` to `to`, `None` when unreachable.
    fn distance(&self, from: &str, to: &str) -> Option<f64>;
}

/// Weighted undirected graph over artist ids.
#[derive(Debug, Clone, Default)]
pub struct ArtistGraph {
    edges: HashMap<String, Vec<(String, f64)>>,
}

impl ArtistGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect `a` and `b`. Adding an existing edge again keeps the lighter weight.
    pub fn add_edge(&mut self, a: &str, b: &str, weight: f64) {
        self.link(a, b, weight);
        self.link(b, a, weight);
    }

    fn link(&mut self, from: &str, to: &str, weight: f64) {
        let neighbours = self.edges.entry(from.to_owned()).or_default();
        match neighbours.iter_mut().find(|(n, _)| n == to) {
            Some(edge) => edge.1 = edge.1.min(weight),
            None => neighbours.push((to.to_owned(), weight)),
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    /// Graph with a unit edge between each of `artist_ids` and every artist
    /// the catalog lists as related to it.
    pub fn from_related(session: &Session, artist_ids: &[String]) -> Result<Self> {
        let mut graph = Self::new();
        for id in artist_ids {
            for related in session.catalog().fetch_related(EntityKind::Artist, id)? {
                if let Some(other) = related.get("id").and_then(serde_json::Value::as_str) {
                    graph.add_edge(id, other, 1.0);
                }
            }
        }
        debug!("Built artist graph with {} nodes", graph.node_count());
        Ok(graph)
    }
}

#[derive(PartialEq)]
struct Frontier {
    cost: f64,
    node: String,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on cost.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl DistanceGraph for ArtistGraph {
    fn distance(&self, from: &str, to: &str) -> Option<f64> {
        if from == to {
            return Some(0.0);
        }
        let mut best: HashMap<&str, f64> = HashMap::new();
        let mut heap = BinaryHeap::new();
        best.insert(from, 0.0);
        heap.push(Frontier {
            cost: 0.0,
            node: from.to_owned(),
        });

        while let Some(Frontier { cost, node }) = heap.pop() {
            if node == to {
                return Some(cost);
            }
            if best.get(node.as_str()).is_some_and(|&known| cost > known) {
                continue;
            }
            for (next, weight) in self.edges.get(&node).into_iter().flatten() {
                let candidate = cost + weight;
                if best.get(next.as_str()).map_or(true, |&known| candidate < known) {
                    best.insert(next, candidate);
                    heap.push(Frontier {
                        cost: candidate,
                        node: next.clone(),
                    });
                }
            }
        }
        None
    }
}

/// Greedy nearest-neighbour order of groups.
///
/// Groups keep the order in which their keys first appear and items keep
/// their relative order inside a group. The walk starts at the first group
/// and always moves to the closest remaining one; ties go to the group seen
/// first.
pub fn cluster_order<G, K>(items: Vec<Item>, graph: &G, mut key: K) -> Vec<Item>
where
    G: DistanceGraph + ?Sized,
    K: FnMut(&Item) -> Option<String>,
{
    let mut groups: Vec<(String, Vec<Item>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for item in items {
        let group = key(&item).unwrap_or_default();
        let slot = *index.entry(group.clone()).or_insert_with(|| {
            groups.push((group, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(item);
    }

    let mut remaining = groups.into_iter();
    let Some((mut current, first)) = remaining.next() else {
        return Vec::new();
    };
    let mut remaining: Vec<_> = remaining.collect();
    let mut ordered = first;

    while !remaining.is_empty() {
        let mut nearest = 0;
        let mut nearest_distance = f64::INFINITY;
        for (i, (candidate, _)) in remaining.iter().enumerate() {
            let d = graph.distance(&current, candidate).unwrap_or(UNREACHABLE);
            if d < nearest_distance {
                nearest = i;
                nearest_distance = d;
            }
        }
        let (next, members) = remaining.remove(nearest);
        trace!("Next group {next} at distance {nearest_distance}");
        ordered.extend(members);
        current = next;
    }
    ordered
}

/// Key used by [`TrackCollection::complex_sort`]: the primary artist id.
#[must_use]
pub fn primary_artist_key(item: &Item) -> Option<String> {
    item.primary_artist().map(|artist| artist.id.clone())
}

impl TrackCollection {
    /// Keep the `n` items (all when `None`) whose target value is closest to
    /// zero, closest first. Ties keep their original order.
    #[must_use]
    pub fn optimize<F>(self, target: F, n: Option<usize>) -> Self
    where
        F: Fn(&Item) -> f64 + 'static,
    {
        self.reorder(move |items| {
            items.sort_by(|a, b| target(a).abs().total_cmp(&target(b).abs()));
            if let Some(n) = n {
                items.truncate(n);
            }
        })
    }

    /// Cluster items by primary artist and order the clusters by proximity
    /// in `graph`.
    #[must_use]
    pub fn complex_sort<G>(self, graph: G) -> Self
    where
        G: DistanceGraph + 'static,
    {
        self.complex_sort_by(graph, primary_artist_key)
    }

    /// Like [`complex_sort`](Self::complex_sort) with a custom group key.
    /// Items without a key share one group.
    #[must_use]
    pub fn complex_sort_by<G, K>(self, graph: G, key: K) -> Self
    where
        G: DistanceGraph + 'static,
        K: FnMut(&Item) -> Option<String> + 'static,
    {
        self.reorder(move |items| {
            let taken = std::mem::take(items);
            *items = cluster_order(taken, &graph, key);
        })
    }
}
