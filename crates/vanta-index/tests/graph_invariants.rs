// Structural invariants of the HNSW graph under insert/delete churn, plus
// snapshot round-trip fidelity.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Map;

use vanta_core::{metric, DistanceMetric};
use vanta_index::{HnswGraph, HnswParams, HnswSnapshot};

fn unit_vector(rng: &mut StdRng, dimension: usize) -> Vec<f64> {
    let v: Vec<f64> = (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect();
    metric::normalize(&v)
}

/// Checks every structural invariant the graph promises.
fn assert_invariants(snapshot: &HnswSnapshot) {
    use std::collections::HashMap;
    let by_id: HashMap<&str, &vanta_index::NodeSnapshot> =
        snapshot.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    for node in &snapshot.nodes {
        // Neighbor sets exist for exactly layers 0..=level.
        let layers: Vec<usize> = node.neighbors.keys().copied().collect();
        assert_eq!(
            layers,
            (0..=node.level).collect::<Vec<_>>(),
            "node {} has neighbor sets {:?} for level {}",
            node.id,
            layers,
            node.level
        );

        for (&layer, neighbors) in &node.neighbors {
            let cap = if layer == 0 { snapshot.m0 } else { snapshot.m };
            assert!(
                neighbors.len() <= cap,
                "node {} exceeds fan-out at layer {layer}: {} > {cap}",
                node.id,
                neighbors.len()
            );
            for neighbor in neighbors {
                assert_ne!(neighbor, &node.id, "self-edge on {}", node.id);
                let other = by_id
                    .get(neighbor.as_str())
                    .unwrap_or_else(|| panic!("{} links to missing {neighbor}", node.id));
                assert!(
                    other.neighbors[&layer].contains(&node.id),
                    "edge {}->{neighbor} at layer {layer} is not bidirectional",
                    node.id
                );
            }
        }
    }

    match &snapshot.entry_point {
        Some(entry) => {
            let node = by_id
                .get(entry.as_str())
                .unwrap_or_else(|| panic!("entry point {entry} is not a live node"));
            assert_eq!(node.level, snapshot.max_level, "entry point is not at max level");
        }
        None => assert!(snapshot.nodes.is_empty(), "non-empty graph without entry point"),
    }
}

#[test]
fn identity_ranking_on_axis_vectors() {
    let mut graph = HnswGraph::new(4, DistanceMetric::Cosine, HnswParams::default());
    graph.insert("a", vec![1.0, 0.0, 0.0, 0.0], Map::new()).unwrap();
    graph.insert("b", vec![0.0, 1.0, 0.0, 0.0], Map::new()).unwrap();
    graph
        .insert("c", metric::normalize(&[0.9, 0.1, 0.0, 0.0]), Map::new())
        .unwrap();

    let hits = graph.search(&[1.0, 0.0, 0.0, 0.0], 2, None).unwrap();
    assert_eq!(
        hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(),
        vec!["a", "c"]
    );
    for hit in &hits {
        assert!(hit.score > 0.98 && hit.score <= 1.0, "score {} out of band", hit.score);
    }
}

#[test]
fn large_graph_scores_never_increase() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut graph = HnswGraph::new(32, DistanceMetric::Cosine, HnswParams::new(16, 100, 30));
    for i in 0..1000 {
        graph
            .insert(format!("v{i}"), unit_vector(&mut rng, 32), Map::new())
            .unwrap();
    }

    for _ in 0..10 {
        let query = unit_vector(&mut rng, 32);
        let hits = graph.search(&query, 10, None).unwrap();
        assert_eq!(hits.len(), 10);
        for pair in hits.windows(2) {
            assert!(
                pair[0].score >= pair[1].score,
                "scores out of order: {} then {}",
                pair[0].score,
                pair[1].score
            );
        }
    }

    assert_invariants(&graph.snapshot());
    assert!(graph.stats().last_query_comparisons > 0);
}

#[test]
fn delete_removes_from_results_and_count() {
    let mut graph = HnswGraph::new(4, DistanceMetric::Cosine, HnswParams::default());
    graph.insert("a", vec![1.0, 0.0, 0.0, 0.0], Map::new()).unwrap();
    graph.insert("b", vec![0.0, 1.0, 0.0, 0.0], Map::new()).unwrap();

    assert!(graph.remove("a"));
    assert_eq!(graph.len(), 1);
    let hits = graph.search(&[1.0, 0.0, 0.0, 0.0], 2, None).unwrap();
    assert!(hits.iter().all(|h| h.id != "a"));
    assert_invariants(&graph.snapshot());
}

#[test]
fn invariants_survive_heavy_churn() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut graph = HnswGraph::new(8, DistanceMetric::Euclidean, HnswParams::new(8, 60, 20));

    for i in 0..300 {
        graph
            .insert(format!("v{i}"), unit_vector(&mut rng, 8), Map::new())
            .unwrap();
    }
    // Delete every third node, including whichever holds the entry point.
    for i in (0..300).step_by(3) {
        assert!(graph.remove(&format!("v{i}")));
    }
    assert_eq!(graph.len(), 200);
    assert_invariants(&graph.snapshot());

    // The graph keeps answering after churn.
    let hits = graph.search(&unit_vector(&mut rng, 8), 5, Some(40)).unwrap();
    assert_eq!(hits.len(), 5);
}

#[test]
fn snapshot_round_trip_preserves_search() {
    let mut rng = StdRng::seed_from_u64(23);
    let mut graph = HnswGraph::new(16, DistanceMetric::Cosine, HnswParams::new(12, 80, 40));
    for i in 0..250 {
        graph
            .insert(format!("v{i}"), unit_vector(&mut rng, 16), Map::new())
            .unwrap();
    }

    let encoded = serde_json::to_string(&graph.snapshot()).unwrap();
    let decoded: HnswSnapshot = serde_json::from_str(&encoded).unwrap();
    let restored = HnswGraph::from_snapshot(decoded).unwrap();

    assert_eq!(restored.len(), graph.len());
    for _ in 0..20 {
        let query = unit_vector(&mut rng, 16);
        let original = graph.search(&query, 10, None).unwrap();
        let replayed = restored.search(&query, 10, None).unwrap();
        assert_eq!(original.len(), replayed.len());
        for (a, b) in original.iter().zip(replayed.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.score.to_bits(), b.score.to_bits(), "scores drifted for {}", a.id);
        }
    }
    assert_invariants(&restored.snapshot());
}

#[test]
fn empty_snapshot_round_trips() {
    let graph = HnswGraph::new(4, DistanceMetric::Dot, HnswParams::default());
    let restored = HnswGraph::from_snapshot(graph.snapshot()).unwrap();
    assert!(restored.is_empty());
    assert!(restored.search(&[0.0; 4], 3, None).unwrap().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Arbitrary insert/delete interleavings leave the structure sound.
    #[test]
    fn prop_churn_preserves_invariants(ops in prop::collection::vec((0u8..3, 0u16..40), 1..80)) {
        let mut rng = StdRng::seed_from_u64(99);
        let mut graph = HnswGraph::new(4, DistanceMetric::Cosine, HnswParams::new(4, 20, 10));

        for (op, key) in ops {
            let id = format!("k{key}");
            match op {
                // Insert (also exercises replacement on duplicate keys).
                0 | 1 => graph.insert(id, unit_vector(&mut rng, 4), Map::new()).unwrap(),
                _ => {
                    graph.remove(&id);
                }
            }
        }
        assert_invariants(&graph.snapshot());
    }
}
