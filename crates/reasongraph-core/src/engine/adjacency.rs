//! Dense-index adjacency view over a [`GraphModel`] snapshot.
//!
//! Nodes are indexed in ascending `NodeId` order so every metric computed over
//! the view is independent of insertion order. Parallel edges collapse into a
//! single link carrying the highest confidence; hyperedges are expanded into
//! cliques. Self-loops count towards the raw edge total but never appear as
//! neighbors.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::graph::{GraphModel, NodeId};

/// Maximum size for inline storage in SmallVec
const INLINE_VEC_SIZE: usize = 8;

type Row = SmallVec<[(usize, f64); INLINE_VEC_SIZE]>;

#[derive(Debug, Clone, Default)]
pub struct AdjacencyView {
    ids: Vec<NodeId>,
    index: FxHashMap<NodeId, usize>,
    /// Directed out-links honoring `Edge::bidirectional`, sorted by target index
    outgoing: Vec<Row>,
    /// Undirected links, sorted by neighbor index
    undirected: Vec<Row>,
    /// Graph edges plus clique-expanded hyperedge pairs
    link_count: usize,
}

impl AdjacencyView {
    pub fn build(graph: &GraphModel) -> Self {
        let mut ids: Vec<NodeId> = graph.nodes().iter().map(|n| n.id).collect();
        ids.sort_unstable();
        let index: FxHashMap<NodeId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let n = ids.len();
        let mut outgoing: Vec<Row> = vec![SmallVec::new(); n];
        let mut undirected: Vec<Row> = vec![SmallVec::new(); n];
        let mut link_count = 0usize;

        for edge in graph.edges() {
            link_count += 1;
            let (Some(&s), Some(&t)) = (index.get(&edge.source), index.get(&edge.target)) else {
                continue;
            };
            if s == t {
                continue;
            }
            upsert(&mut outgoing[s], t, edge.confidence);
            if edge.bidirectional {
                upsert(&mut outgoing[t], s, edge.confidence);
            }
            upsert(&mut undirected[s], t, edge.confidence);
            upsert(&mut undirected[t], s, edge.confidence);
        }

        for hyperedge in graph.hyperedges() {
            let members: SmallVec<[usize; INLINE_VEC_SIZE]> = hyperedge
                .members
                .iter()
                .filter_map(|m| index.get(m).copied())
                .collect();
            for (i, &a) in members.iter().enumerate() {
                for &b in &members[i + 1..] {
                    link_count += 1;
                    for (x, y) in [(a, b), (b, a)] {
                        upsert(&mut outgoing[x], y, hyperedge.confidence);
                        upsert(&mut undirected[x], y, hyperedge.confidence);
                    }
                }
            }
        }

        for row in outgoing.iter_mut().chain(undirected.iter_mut()) {
            row.sort_unstable_by_key(|(j, _)| *j);
        }

        Self {
            ids,
            index,
            outgoing,
            undirected,
            link_count,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, idx: usize) -> NodeId {
        self.ids[idx]
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn link_count(&self) -> usize {
        self.link_count
    }

    pub fn outgoing(&self, idx: usize) -> &[(usize, f64)] {
        &self.outgoing[idx]
    }

    pub fn neighbors(&self, idx: usize) -> &[(usize, f64)] {
        &self.undirected[idx]
    }

    pub fn degree(&self, idx: usize) -> usize {
        self.undirected[idx].len()
    }

    pub fn weighted_degree(&self, idx: usize) -> f64 {
        self.undirected[idx].iter().map(|(_, w)| w).sum()
    }

    pub fn linked(&self, a: usize, b: usize) -> bool {
        self.undirected[a]
            .binary_search_by_key(&b, |(j, _)| *j)
            .is_ok()
    }

    /// Number of links among the neighbors of `idx`.
    pub fn neighbor_links(&self, idx: usize) -> usize {
        let row = &self.undirected[idx];
        let mut links = 0;
        for (i, &(a, _)) in row.iter().enumerate() {
            for &(b, _) in &row[i + 1..] {
                if self.linked(a, b) {
                    links += 1;
                }
            }
        }
        links
    }

    /// Neighbors shared by `a` and `b`.
    pub fn common_neighbors(&self, a: usize, b: usize) -> usize {
        let (ra, rb) = (&self.undirected[a], &self.undirected[b]);
        let (mut i, mut j, mut count) = (0, 0, 0);
        while i < ra.len() && j < rb.len() {
            match ra[i].0.cmp(&rb[j].0) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    count += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        count
    }
}

fn upsert(row: &mut Row, target: usize, weight: f64) {
    match row.iter_mut().find(|(j, _)| *j == target) {
        Some(slot) => slot.1 = slot.1.max(weight),
        None => row.push((target, weight)),
    }
}
