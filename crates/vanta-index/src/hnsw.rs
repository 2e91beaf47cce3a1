//! HNSW (Hierarchical Navigable Small World) graph index.
//!
//! Implements the layered-graph ANN structure from Malkov & Yashunin (2018):
//! upper layers hold sparse long-range shortcuts, layer 0 holds every node.
//! Insertion wires bidirectional edges selected by a diversity heuristic;
//! search runs a greedy descent followed by a beam search over layer 0.
//!
//! Nodes live in an arena addressed by dense `u32` slots with a side map
//! from external string ids, which keeps the hot search loop on integer
//! comparisons instead of string hashing. Deletion unlinks the node without
//! re-linking survivors; graph quality degrades gradually under heavy
//! deletion churn and rebuilding is the caller's call.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use vanta_core::{metric, DistanceMetric, EngineError, EngineResult};

use crate::types::SearchHit;

/// HNSW construction and search parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswParams {
    /// Maximum connections per node at layers >= 1.
    pub m: usize,
    /// Maximum connections at layer 0 (2·M).
    pub m0: usize,
    /// Beam width while inserting.
    pub ef_construction: usize,
    /// Default beam width while searching.
    pub ef_search: usize,
    /// Level-assignment scale (1/ln(M)).
    pub ml: f64,
}

impl HnswParams {
    /// Creates parameters with `m0` and `ml` derived from `m`.
    #[must_use]
    pub fn new(m: usize, ef_construction: usize, ef_search: usize) -> Self {
        let m = m.max(2);
        Self {
            m,
            m0: m * 2,
            ef_construction: ef_construction.max(1),
            ef_search: ef_search.max(1),
            ml: 1.0 / (m as f64).ln(),
        }
    }
}

impl Default for HnswParams {
    fn default() -> Self {
        Self::new(16, 200, 50)
    }
}

/// A node in the graph arena.
#[derive(Debug, Clone)]
struct HnswNode {
    id: String,
    vector: Vec<f64>,
    metadata: Map<String, Value>,
    level: usize,
    /// Neighbor slots per layer; indices `0..=level` are always populated.
    neighbors: Vec<Vec<u32>>,
}

/// Runtime statistics for a graph.
#[derive(Debug, Clone, Serialize)]
pub struct HnswStats {
    /// Live node count.
    pub nodes: usize,
    /// Undirected edge count (directed / 2).
    pub total_edges: usize,
    /// Level of the entry point.
    pub max_level: usize,
    /// Largest per-node edge total across all layers.
    pub max_edges_per_node: usize,
    /// Node count per assigned level.
    pub level_distribution: BTreeMap<usize, usize>,
    /// Score evaluations performed by the most recent search.
    pub last_query_comparisons: u64,
    /// The parameters the graph was built with.
    pub params: HnswParams,
}

/// Serializable snapshot of a graph, keyed by external string ids.
///
/// A round-trip through [`HnswGraph::snapshot`] and
/// [`HnswGraph::from_snapshot`] reproduces search results exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswSnapshot {
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub m: usize,
    pub m0: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub entry_point: Option<String>,
    pub max_level: usize,
    pub nodes: Vec<NodeSnapshot>,
}

/// One node in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub vector: Vec<f64>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub level: usize,
    pub neighbors: BTreeMap<usize, Vec<String>>,
}

/// Score/slot pair ordered by score, then slot for determinism.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Scored(f64, u32);

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then_with(|| self.1.cmp(&other.1))
    }
}

/// Hierarchical navigable small-world graph over string-keyed documents.
pub struct HnswGraph {
    dimension: usize,
    metric: DistanceMetric,
    params: HnswParams,
    nodes: Vec<Option<HnswNode>>,
    free: Vec<u32>,
    slots: HashMap<String, u32>,
    entry_point: Option<u32>,
    max_level: usize,
    /// Score evaluations since the last search started.
    comparisons: AtomicU64,
}

impl HnswGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new(dimension: usize, metric: DistanceMetric, params: HnswParams) -> Self {
        Self {
            dimension,
            metric,
            params,
            nodes: Vec::new(),
            free: Vec::new(),
            slots: HashMap::new(),
            entry_point: None,
            max_level: 0,
            comparisons: AtomicU64::new(0),
        }
    }

    /// Returns the vector dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the distance metric.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Returns the construction parameters.
    #[must_use]
    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    /// Returns the live node count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when the graph holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns `true` when `id` is indexed.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    /// Score evaluations performed since the last search started.
    #[must_use]
    pub fn last_comparisons(&self) -> u64 {
        self.comparisons.load(AtomicOrdering::Relaxed)
    }

    /// Inserts a document, replacing any existing node with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DimensionMismatch`] when the vector length
    /// differs from the graph dimension.
    pub fn insert(
        &mut self,
        id: impl Into<String>,
        vector: Vec<f64>,
        metadata: Map<String, Value>,
    ) -> EngineResult<()> {
        let id = id.into();
        if vector.len() != self.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if self.slots.contains_key(&id) {
            self.remove(&id);
        }

        let level = self.draw_level();
        let query = vector.clone();
        let slot = self.allocate(id, vector, metadata, level);

        let Some(mut ep) = self.entry_point else {
            self.entry_point = Some(slot);
            self.max_level = level;
            return Ok(());
        };

        // Greedy 1-width descent through the layers above the new node.
        for layer in (level + 1..=self.max_level).rev() {
            if let Some(&(_, best)) = self.search_layer(&query, ep, 1, layer).first() {
                ep = best;
            }
        }

        for layer in (0..=level.min(self.max_level)).rev() {
            let candidates = self.search_layer(&query, ep, self.params.ef_construction, layer);
            let max_conn = if layer == 0 { self.params.m0 } else { self.params.m };
            let selected = self.select_neighbors(&query, &candidates, max_conn);

            for &neighbor in &selected {
                self.add_edge(slot, neighbor, layer);
                self.add_edge(neighbor, slot, layer);
            }
            for &neighbor in &selected {
                if self.neighbors_at(neighbor, layer).len() > max_conn {
                    self.prune(neighbor, layer, max_conn);
                }
            }

            if let Some(&(_, best)) = candidates.first() {
                ep = best;
            }
        }

        if level > self.max_level {
            self.entry_point = Some(slot);
            self.max_level = level;
        }
        Ok(())
    }

    /// Searches for the `k` nearest neighbors of `query`.
    ///
    /// `ef` overrides the configured search beam width; the effective width
    /// is never below `k`. Results are sorted by descending score.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DimensionMismatch`] when the query length
    /// differs from the graph dimension.
    pub fn search(
        &self,
        query: &[f64],
        k: usize,
        ef: Option<usize>,
    ) -> EngineResult<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        self.comparisons.store(0, AtomicOrdering::Relaxed);

        let Some(mut ep) = self.entry_point else {
            return Ok(Vec::new());
        };

        for layer in (1..=self.max_level).rev() {
            if let Some(&(_, best)) = self.search_layer(query, ep, 1, layer).first() {
                ep = best;
            }
        }

        let ef = ef.unwrap_or(self.params.ef_search).max(k);
        let pool = self.search_layer(query, ep, ef, 0);

        Ok(pool
            .into_iter()
            .take(k)
            .map(|(score, slot)| {
                let node = self.node(slot);
                SearchHit {
                    id: node.id.clone(),
                    vector: node.vector.clone(),
                    metadata: node.metadata.clone(),
                    score,
                }
            })
            .collect())
    }

    /// Removes a node, returning `false` when the id is not indexed.
    ///
    /// Surviving neighbors are not re-linked.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(slot) = self.slots.remove(id) else {
            return false;
        };
        let node = self.nodes[slot as usize]
            .take()
            .expect("slot map points at a live node");
        self.free.push(slot);

        for (layer, neighbors) in node.neighbors.iter().enumerate() {
            for &neighbor in neighbors {
                self.remove_edge(neighbor, slot, layer);
            }
        }

        if self.entry_point == Some(slot) {
            self.entry_point = None;
            self.max_level = 0;
            for (index, survivor) in self.nodes.iter().enumerate() {
                if let Some(survivor) = survivor {
                    if self.entry_point.is_none() || survivor.level > self.max_level {
                        self.entry_point = Some(index as u32);
                        self.max_level = survivor.level;
                    }
                }
            }
        }
        true
    }

    /// Returns runtime statistics for the graph.
    #[must_use]
    pub fn stats(&self) -> HnswStats {
        let mut total_directed = 0;
        let mut max_edges_per_node = 0;
        let mut level_distribution = BTreeMap::new();
        for node in self.nodes.iter().flatten() {
            let edges: usize = node.neighbors.iter().map(Vec::len).sum();
            total_directed += edges;
            max_edges_per_node = max_edges_per_node.max(edges);
            *level_distribution.entry(node.level).or_insert(0) += 1;
        }
        HnswStats {
            nodes: self.slots.len(),
            total_edges: total_directed / 2,
            max_level: self.max_level,
            max_edges_per_node,
            level_distribution,
            last_query_comparisons: self.last_comparisons(),
            params: self.params.clone(),
        }
    }

    /// Produces a serializable snapshot of the graph.
    #[must_use]
    pub fn snapshot(&self) -> HnswSnapshot {
        let nodes = self
            .nodes
            .iter()
            .flatten()
            .map(|node| NodeSnapshot {
                id: node.id.clone(),
                vector: node.vector.clone(),
                metadata: node.metadata.clone(),
                level: node.level,
                neighbors: node
                    .neighbors
                    .iter()
                    .enumerate()
                    .map(|(layer, slots)| {
                        (
                            layer,
                            slots.iter().map(|&s| self.node(s).id.clone()).collect(),
                        )
                    })
                    .collect(),
            })
            .collect();
        HnswSnapshot {
            dimension: self.dimension,
            metric: self.metric,
            m: self.params.m,
            m0: self.params.m0,
            ef_construction: self.params.ef_construction,
            ef_search: self.params.ef_search,
            entry_point: self
                .entry_point
                .map(|slot| self.node(slot).id.clone()),
            max_level: self.max_level,
            nodes,
        }
    }

    /// Reconstructs a graph from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns a serialization error when the snapshot references unknown
    /// ids or carries vectors of the wrong dimension.
    pub fn from_snapshot(snapshot: HnswSnapshot) -> EngineResult<Self> {
        let params = HnswParams {
            m: snapshot.m,
            m0: snapshot.m0,
            ef_construction: snapshot.ef_construction,
            ef_search: snapshot.ef_search,
            ml: 1.0 / (snapshot.m.max(2) as f64).ln(),
        };
        let mut graph = Self::new(snapshot.dimension, snapshot.metric, params);

        for node in &snapshot.nodes {
            if node.vector.len() != snapshot.dimension {
                return Err(EngineError::Serialization(format!(
                    "snapshot node `{}` has dimension {}, expected {}",
                    node.id,
                    node.vector.len(),
                    snapshot.dimension
                )));
            }
            graph.allocate(
                node.id.clone(),
                node.vector.clone(),
                node.metadata.clone(),
                node.level,
            );
        }

        let slot_of = graph.slots.clone();
        let resolve = |id: &str| -> EngineResult<u32> {
            slot_of.get(id).copied().ok_or_else(|| {
                EngineError::Serialization(format!("snapshot references unknown id `{id}`"))
            })
        };

        for node in &snapshot.nodes {
            let slot = resolve(&node.id)?;
            for (&layer, neighbor_ids) in &node.neighbors {
                let mut neighbor_slots = Vec::with_capacity(neighbor_ids.len());
                for id in neighbor_ids {
                    neighbor_slots.push(resolve(id)?);
                }
                if let Some(live) = graph.nodes[slot as usize].as_mut() {
                    if layer < live.neighbors.len() {
                        live.neighbors[layer] = neighbor_slots;
                    }
                }
            }
        }

        graph.max_level = snapshot.max_level;
        graph.entry_point = match &snapshot.entry_point {
            Some(id) => Some(resolve(id)?),
            None => None,
        };
        Ok(graph)
    }

    fn draw_level(&self) -> usize {
        let mut rng = rand::thread_rng();
        // 1 - gen() keeps the draw inside (0, 1], so ln never sees zero.
        let uniform: f64 = 1.0 - rng.gen::<f64>();
        (-uniform.ln() * self.params.ml).floor() as usize
    }

    fn allocate(
        &mut self,
        id: String,
        vector: Vec<f64>,
        metadata: Map<String, Value>,
        level: usize,
    ) -> u32 {
        let node = HnswNode {
            id: id.clone(),
            vector,
            metadata,
            level,
            neighbors: vec![Vec::new(); level + 1],
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot as usize] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                (self.nodes.len() - 1) as u32
            }
        };
        self.slots.insert(id, slot);
        slot
    }

    fn node(&self, slot: u32) -> &HnswNode {
        self.nodes[slot as usize]
            .as_ref()
            .expect("slot map points at a live node")
    }

    fn neighbors_at(&self, slot: u32, layer: usize) -> &[u32] {
        self.node(slot).neighbors.get(layer).map_or(&[], Vec::as_slice)
    }

    fn score_to(&self, query: &[f64], slot: u32) -> f64 {
        self.comparisons.fetch_add(1, AtomicOrdering::Relaxed);
        metric::score(query, &self.node(slot).vector, self.metric)
    }

    fn score_between(&self, a: u32, b: u32) -> f64 {
        self.comparisons.fetch_add(1, AtomicOrdering::Relaxed);
        metric::score(&self.node(a).vector, &self.node(b).vector, self.metric)
    }

    /// Beam search within one layer.
    ///
    /// Maintains a best-first candidate heap and a result heap bounded by
    /// `ef` with the worst entry on top; terminates once the best remaining
    /// candidate cannot improve a full result pool. Returns the pool sorted
    /// by descending score.
    fn search_layer(&self, query: &[f64], entry: u32, ef: usize, layer: usize) -> Vec<(f64, u32)> {
        let mut visited = vec![false; self.nodes.len()];
        visited[entry as usize] = true;

        let entry_score = self.score_to(query, entry);
        let mut candidates = BinaryHeap::new();
        let mut results: BinaryHeap<Reverse<Scored>> = BinaryHeap::new();
        candidates.push(Scored(entry_score, entry));
        results.push(Reverse(Scored(entry_score, entry)));

        while let Some(Scored(score, slot)) = candidates.pop() {
            if results.len() >= ef {
                let Reverse(Scored(worst, _)) = results.peek().copied().unwrap_or(Reverse(Scored(
                    f64::NEG_INFINITY,
                    u32::MAX,
                )));
                if score < worst {
                    break;
                }
            }

            for &neighbor in self.neighbors_at(slot, layer) {
                if std::mem::replace(&mut visited[neighbor as usize], true) {
                    continue;
                }
                let neighbor_score = self.score_to(query, neighbor);
                let admit = match results.peek() {
                    Some(Reverse(Scored(worst, _))) if results.len() >= ef => {
                        neighbor_score > *worst
                    }
                    _ => true,
                };
                if admit {
                    candidates.push(Scored(neighbor_score, neighbor));
                    results.push(Reverse(Scored(neighbor_score, neighbor)));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut pool: Vec<(f64, u32)> = results
            .into_iter()
            .map(|Reverse(Scored(score, slot))| (score, slot))
            .collect();
        pool.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        pool
    }

    /// Diversity-aware neighbor selection.
    ///
    /// Walks candidates in descending score order and rejects any candidate
    /// that sits closer to an already-accepted neighbor than to the query.
    /// The first half of the budget is filled unconditionally.
    fn select_neighbors(
        &self,
        _query: &[f64],
        candidates: &[(f64, u32)],
        max_conn: usize,
    ) -> Vec<u32> {
        let mut selected: Vec<u32> = Vec::with_capacity(max_conn.min(candidates.len()));
        for &(candidate_score, candidate) in candidates {
            if selected.len() >= max_conn {
                break;
            }
            let shadowed = selected.len() >= max_conn / 2
                && selected
                    .iter()
                    .any(|&s| self.score_between(candidate, s) > candidate_score);
            if !shadowed {
                selected.push(candidate);
            }
        }
        selected
    }

    fn add_edge(&mut self, from: u32, to: u32, layer: usize) {
        if from == to {
            return;
        }
        if let Some(node) = self.nodes[from as usize].as_mut() {
            if let Some(neighbors) = node.neighbors.get_mut(layer) {
                if !neighbors.contains(&to) {
                    neighbors.push(to);
                }
            }
        }
    }

    fn remove_edge(&mut self, from: u32, to: u32, layer: usize) {
        if let Some(node) = self.nodes[from as usize].as_mut() {
            if let Some(neighbors) = node.neighbors.get_mut(layer) {
                neighbors.retain(|&n| n != to);
            }
        }
    }

    /// Re-selects a node's neighbor set when it exceeds `max_conn`.
    ///
    /// Reverse edges of dropped neighbors are removed as well; edges stay
    /// bidirectional at every layer.
    fn prune(&mut self, slot: u32, layer: usize, max_conn: usize) {
        let node_vector = self.node(slot).vector.clone();
        let current = self.node(slot).neighbors[layer].clone();

        let mut scored: Vec<(f64, u32)> = current
            .iter()
            .map(|&n| (self.score_to(&node_vector, n), n))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let keep = self.select_neighbors(&node_vector, &scored, max_conn);
        for &neighbor in &current {
            if !keep.contains(&neighbor) {
                self.remove_edge(neighbor, slot, layer);
            }
        }
        if let Some(node) = self.nodes[slot as usize].as_mut() {
            node.neighbors[layer] = keep;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn small_graph() -> HnswGraph {
        HnswGraph::new(4, DistanceMetric::Cosine, HnswParams::default())
    }

    #[test]
    fn insert_and_search_small() {
        let mut graph = small_graph();
        graph.insert("a", vec![1.0, 0.0, 0.0, 0.0], Map::new()).unwrap();
        graph.insert("b", vec![0.0, 1.0, 0.0, 0.0], Map::new()).unwrap();
        graph.insert("c", vec![0.9, 0.1, 0.0, 0.0], Map::new()).unwrap();

        let hits = graph.search(&[1.0, 0.0, 0.0, 0.0], 2, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "c");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn empty_graph_returns_nothing() {
        let graph = small_graph();
        assert!(graph.search(&[1.0, 0.0, 0.0, 0.0], 5, None).unwrap().is_empty());
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut graph = small_graph();
        assert!(matches!(
            graph.insert("a", vec![1.0, 0.0], Map::new()),
            Err(EngineError::DimensionMismatch { expected: 4, actual: 2 })
        ));
        assert!(graph.search(&[1.0], 1, None).is_err());
    }

    #[test]
    fn remove_unlinks_and_reelects_entry() {
        let mut graph = small_graph();
        for (id, v) in [
            ("a", vec![1.0, 0.0, 0.0, 0.0]),
            ("b", vec![0.0, 1.0, 0.0, 0.0]),
            ("c", vec![0.0, 0.0, 1.0, 0.0]),
        ] {
            graph.insert(id, v, Map::new()).unwrap();
        }
        assert!(graph.remove("a"));
        assert!(!graph.remove("a"));
        assert_eq!(graph.len(), 2);

        let hits = graph.search(&[1.0, 0.0, 0.0, 0.0], 3, None).unwrap();
        assert!(hits.iter().all(|h| h.id != "a"));
    }

    #[test]
    fn reinsert_replaces_node() {
        let mut graph = small_graph();
        graph
            .insert("a", vec![1.0, 0.0, 0.0, 0.0], meta(json!({"v": 1})))
            .unwrap();
        graph
            .insert("a", vec![0.0, 1.0, 0.0, 0.0], meta(json!({"v": 2})))
            .unwrap();
        assert_eq!(graph.len(), 1);

        let hits = graph.search(&[0.0, 1.0, 0.0, 0.0], 1, None).unwrap();
        assert_eq!(hits[0].metadata["v"], json!(2));
        assert!(hits[0].score > 0.99);
    }

    #[test]
    fn search_resets_comparison_counter() {
        let mut graph = small_graph();
        for i in 0..20 {
            let angle = f64::from(i) * 0.1;
            graph
                .insert(
                    format!("n{i}"),
                    vec![angle.cos(), angle.sin(), 0.0, 0.0],
                    Map::new(),
                )
                .unwrap();
        }
        graph.search(&[1.0, 0.0, 0.0, 0.0], 5, None).unwrap();
        let first = graph.last_comparisons();
        assert!(first > 0);
        graph.search(&[0.0, 1.0, 0.0, 0.0], 1, Some(1)).unwrap();
        assert!(graph.last_comparisons() > 0);
    }

    #[test]
    fn stats_reflect_graph_shape() {
        let mut graph = small_graph();
        for i in 0..50 {
            let angle = f64::from(i) * 0.07;
            graph
                .insert(
                    format!("n{i}"),
                    vec![angle.cos(), angle.sin(), 0.0, 0.0],
                    Map::new(),
                )
                .unwrap();
        }
        let stats = graph.stats();
        assert_eq!(stats.nodes, 50);
        assert!(stats.total_edges > 0);
        assert_eq!(stats.level_distribution.values().sum::<usize>(), 50);
        assert!(stats.level_distribution.contains_key(&0) || stats.max_level > 0);
        assert!(stats.max_edges_per_node > 0);
    }
}
