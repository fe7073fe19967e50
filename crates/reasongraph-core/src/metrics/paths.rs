//! Shortest-path kernels.
//!
//! Edge cost is `1 / confidence`, so strong links are short. Zero-confidence
//! links are not traversable. Hop distances (unweighted BFS over undirected
//! links) feed the small-world estimate.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::engine::adjacency::AdjacencyView;

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapEntry {
    cost: f64,
    node: usize,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on cost, ties on lower index
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-source Dijkstra returning distance and predecessor per node.
pub fn dijkstra(view: &AdjacencyView, source: usize) -> (Vec<Option<f64>>, Vec<Option<usize>>) {
    let n = view.len();
    let mut dist: Vec<Option<f64>> = vec![None; n];
    let mut prev: Vec<Option<usize>> = vec![None; n];
    let mut heap = BinaryHeap::new();

    dist[source] = Some(0.0);
    heap.push(HeapEntry {
        cost: 0.0,
        node: source,
    });

    while let Some(HeapEntry { cost, node }) = heap.pop() {
        if dist[node].is_some_and(|d| cost > d) {
            continue;
        }
        for &(next, weight) in view.outgoing(node) {
            if weight <= 0.0 {
                continue;
            }
            let candidate = cost + 1.0 / weight;
            if dist[next].map_or(true, |d| candidate < d) {
                dist[next] = Some(candidate);
                prev[next] = Some(node);
                heap.push(HeapEntry {
                    cost: candidate,
                    node: next,
                });
            }
        }
    }
    (dist, prev)
}

/// Unweighted hop distances over undirected links.
pub fn hop_distances(view: &AdjacencyView, source: usize) -> Vec<Option<u32>> {
    let mut hops = vec![None; view.len()];
    let mut queue = VecDeque::new();
    hops[source] = Some(0u32);
    queue.push_back(source);
    while let Some(node) = queue.pop_front() {
        let next_hop = hops[node].map_or(0, |h| h + 1);
        for &(next, _) in view.neighbors(node) {
            if hops[next].is_none() {
                hops[next] = Some(next_hop);
                queue.push_back(next);
            }
        }
    }
    hops
}

/// Aggregates over all ordered pairs `(i, j)`, `i != j`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PathSummary {
    pub reachable_pairs: usize,
    pub distance_sum: f64,
    pub inverse_distance_sum: f64,
    pub hop_pairs: usize,
    pub hop_sum: u64,
}

impl PathSummary {
    fn merge(mut self, other: PathSummary) -> PathSummary {
        self.reachable_pairs += other.reachable_pairs;
        self.distance_sum += other.distance_sum;
        self.inverse_distance_sum += other.inverse_distance_sum;
        self.hop_pairs += other.hop_pairs;
        self.hop_sum += other.hop_sum;
        self
    }

    /// Mean weighted distance over reachable pairs, `None` if no pair is reachable.
    pub fn average_distance(&self) -> Option<f64> {
        (self.reachable_pairs > 0).then(|| self.distance_sum / self.reachable_pairs as f64)
    }

    pub fn average_hops(&self) -> Option<f64> {
        (self.hop_pairs > 0).then(|| self.hop_sum as f64 / self.hop_pairs as f64)
    }
}

fn summarize_source(view: &AdjacencyView, source: usize) -> PathSummary {
    let (dist, _) = dijkstra(view, source);
    let hops = hop_distances(view, source);
    let mut out = PathSummary::default();
    for target in 0..view.len() {
        if target == source {
            continue;
        }
        if let Some(d) = dist[target] {
            if d > 0.0 {
                out.reachable_pairs += 1;
                out.distance_sum += d;
                out.inverse_distance_sum += 1.0 / d;
            }
        }
        if let Some(h) = hops[target] {
            out.hop_pairs += 1;
            out.hop_sum += u64::from(h);
        }
    }
    out
}

/// All-pairs summary. With the `parallel` feature sources fan out across threads;
/// float sums are reduced in source order either way.
pub fn all_pairs(view: &AdjacencyView) -> PathSummary {
    #[cfg(feature = "parallel")]
    {
        let per_source: Vec<PathSummary> = (0..view.len())
            .into_par_iter()
            .map(|s| summarize_source(view, s))
            .collect();
        per_source
            .into_iter()
            .fold(PathSummary::default(), PathSummary::merge)
    }

    #[cfg(not(feature = "parallel"))]
    {
        (0..view.len())
            .map(|s| summarize_source(view, s))
            .fold(PathSummary::default(), PathSummary::merge)
    }
}

/// Reconstructs the cheapest path from `source` to `target` as dense indices.
pub fn path_between(view: &AdjacencyView, source: usize, target: usize) -> Option<(Vec<usize>, f64)> {
    let (dist, prev) = dijkstra(view, source);
    let cost = dist[target]?;
    let mut path = vec![target];
    let mut cursor = target;
    while cursor != source {
        cursor = prev[cursor]?;
        path.push(cursor);
    }
    path.reverse();
    Some((path, cost))
}

/// Connected components over undirected links.
pub fn component_count(view: &AdjacencyView) -> usize {
    let mut seen = vec![false; view.len()];
    let mut components = 0;
    for start in 0..view.len() {
        if seen[start] {
            continue;
        }
        components += 1;
        let hops = hop_distances(view, start);
        for (i, h) in hops.iter().enumerate() {
            if h.is_some() {
                seen[i] = true;
            }
        }
    }
    components
}
