// End-to-end coverage of the engine surface: collection lifecycle, batch
// inserts, the filter-aware query path, and snapshot import/export.

use serde_json::json;

use vanta_core::{DistanceMetric, EngineError, Filter};
use vanta_engine::{
    CollectionOptions, IndexType, InsertRequest, QueryMethod, QueryOptions, VectorEngine,
};

fn meta(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap()
}

#[test]
fn collection_lifecycle() {
    let engine = VectorEngine::with_defaults();

    let info = engine
        .create_collection("docs", CollectionOptions::new(4))
        .unwrap();
    assert_eq!(info.name, "docs");
    assert_eq!(info.dimension, 4);
    assert_eq!(info.metric, DistanceMetric::Cosine);
    assert_eq!(info.index_type, IndexType::Hnsw);
    assert_eq!(info.count, 0);

    assert!(matches!(
        engine.create_collection("docs", CollectionOptions::new(4)),
        Err(EngineError::CollectionExists { .. })
    ));
    assert!(matches!(
        engine.create_collection("", CollectionOptions::new(4)),
        Err(EngineError::InvalidArgument { .. })
    ));
    assert!(matches!(
        engine.create_collection("zero", CollectionOptions::new(0)),
        Err(EngineError::InvalidArgument { .. })
    ));

    engine
        .create_collection(
            "flat",
            CollectionOptions::new(2).with_index_type(IndexType::Flat),
        )
        .unwrap();
    let names: Vec<String> = engine
        .list_collections()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(names, vec!["docs", "flat"]);

    assert!(engine.get_collection("docs").is_some());
    assert!(engine.get_collection("nope").is_none());

    assert!(engine.drop_collection("flat"));
    assert!(!engine.drop_collection("flat"));
    assert!(engine.get_collection("flat").is_none());
}

#[test]
fn insert_mints_ordered_ids_and_replaces_duplicates() {
    let engine = VectorEngine::with_defaults();
    engine
        .create_collection("docs", CollectionOptions::new(2))
        .unwrap();

    let ids = engine
        .insert(
            "docs",
            vec![
                InsertRequest::new(vec![1.0, 0.0]).with_id("a"),
                InsertRequest::new(vec![0.0, 1.0]),
                InsertRequest::new(vec![0.5, 0.5]),
            ],
        )
        .unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[0], "a");
    assert_ne!(ids[1], ids[2]);

    // Re-inserting an existing id is delete + insert, not a second document.
    engine
        .insert(
            "docs",
            vec![InsertRequest::new(vec![0.6, 0.8])
                .with_id("a")
                .with_metadata(meta(json!({"rev": 2})))],
        )
        .unwrap();
    assert_eq!(engine.get_collection("docs").unwrap().count, 3);

    let response = engine
        .query("docs", &[0.6, 0.8], &QueryOptions::new(1))
        .unwrap();
    assert_eq!(response.results[0].id, "a");
    assert_eq!(response.results[0].metadata["rev"], json!(2));
}

#[test]
fn insert_validation_errors() {
    let engine = VectorEngine::with_defaults();
    engine
        .create_collection("docs", CollectionOptions::new(2))
        .unwrap();

    assert!(matches!(
        engine.insert("missing", vec![InsertRequest::new(vec![1.0, 0.0])]),
        Err(EngineError::CollectionNotFound { .. })
    ));
    assert!(matches!(
        engine.insert("docs", vec![InsertRequest::new(vec![1.0])]),
        Err(EngineError::DimensionMismatch { expected: 2, actual: 1 })
    ));
    assert!(matches!(
        engine.insert("docs", vec![InsertRequest::new(vec![])]),
        Err(EngineError::InvalidVector { .. })
    ));
    assert!(matches!(
        engine.insert("docs", vec![InsertRequest::new(vec![f64::NAN, 0.0])]),
        Err(EngineError::InvalidVector { .. })
    ));
    assert!(matches!(
        engine.insert("docs", vec![InsertRequest::new(vec![1.0, 0.0]).with_id("")]),
        Err(EngineError::InvalidArgument { .. })
    ));
    assert!(matches!(
        engine.insert(
            "docs",
            vec![InsertRequest::new(vec![1.0, 0.0]).with_ttl(json!("soon"))]
        ),
        Err(EngineError::InvalidTtl { .. })
    ));

    // A rejected batch inserts nothing, even when earlier entries were valid.
    let result = engine.insert(
        "docs",
        vec![
            InsertRequest::new(vec![1.0, 0.0]).with_id("good"),
            InsertRequest::new(vec![1.0]).with_id("bad"),
        ],
    );
    assert!(result.is_err());
    assert_eq!(engine.get_collection("docs").unwrap().count, 0);
}

#[test]
fn filter_operators_on_flat_collection() {
    let engine = VectorEngine::with_defaults();
    engine
        .create_collection(
            "events",
            CollectionOptions::new(2).with_index_type(IndexType::Flat),
        )
        .unwrap();
    engine
        .insert(
            "events",
            vec![
                InsertRequest::new(vec![1.0, 0.0])
                    .with_metadata(meta(json!({"score": 10, "tag": "fire"}))),
                InsertRequest::new(vec![0.0, 1.0])
                    .with_metadata(meta(json!({"score": 20, "tag": "flood"}))),
                InsertRequest::new(vec![0.5, 0.5])
                    .with_metadata(meta(json!({"score": 30, "tag": "fire"}))),
            ],
        )
        .unwrap();

    let gte = Filter::parse(&json!({"score": {"$gte": 20}})).unwrap();
    let response = engine
        .query(
            "events",
            &[1.0, 0.0],
            &QueryOptions::new(10).with_filter(gte),
        )
        .unwrap();
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.method, QueryMethod::Flat);

    let tags = Filter::parse(&json!({"tag": {"$in": ["fire", "flood"]}})).unwrap();
    let response = engine
        .query(
            "events",
            &[1.0, 0.0],
            &QueryOptions::new(10).with_filter(tags),
        )
        .unwrap();
    assert_eq!(response.results.len(), 3);
}

#[test]
fn hnsw_query_overfetches_and_post_filters() {
    let engine = VectorEngine::with_defaults();
    engine
        .create_collection("docs", CollectionOptions::new(4))
        .unwrap();

    // 40 documents in two categories; only half match the filter.
    let requests: Vec<InsertRequest> = (0..40)
        .map(|i| {
            let angle = f64::from(i) * 0.15;
            let category = if i % 2 == 0 { "even" } else { "odd" };
            InsertRequest::new(vec![angle.cos(), angle.sin(), 0.0, 0.0])
                .with_id(format!("d{i}"))
                .with_metadata(meta(json!({"category": category})))
        })
        .collect();
    engine.insert("docs", requests).unwrap();

    let filter = Filter::parse(&json!({"category": "even"})).unwrap();
    let response = engine
        .query(
            "docs",
            &[1.0, 0.0, 0.0, 0.0],
            &QueryOptions::new(5).with_filter(filter),
        )
        .unwrap();

    assert_eq!(response.method, QueryMethod::Hnsw);
    assert_eq!(response.results.len(), 5);
    assert_eq!(response.total, 40);
    assert!(response.comparisons > 0);
    assert!(response.elapsed_ms >= 0.0);
    for hit in &response.results {
        assert_eq!(hit.metadata["category"], json!("even"));
    }
    for pair in response.results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn force_flat_bypasses_the_graph() {
    let engine = VectorEngine::with_defaults();
    engine
        .create_collection("docs", CollectionOptions::new(2))
        .unwrap();
    engine
        .insert(
            "docs",
            vec![
                InsertRequest::new(vec![1.0, 0.0]).with_id("a"),
                InsertRequest::new(vec![0.0, 1.0]).with_id("b"),
            ],
        )
        .unwrap();

    let response = engine
        .query(
            "docs",
            &[1.0, 0.0],
            &QueryOptions::new(2).with_force_flat(true),
        )
        .unwrap();
    assert_eq!(response.method, QueryMethod::Flat);
    assert_eq!(response.comparisons, 2);
    assert_eq!(response.results[0].id, "a");
}

#[test]
fn delete_removes_documents_from_results() {
    let engine = VectorEngine::with_defaults();
    engine
        .create_collection("docs", CollectionOptions::new(4))
        .unwrap();
    engine
        .insert(
            "docs",
            vec![
                InsertRequest::new(vec![1.0, 0.0, 0.0, 0.0]).with_id("a"),
                InsertRequest::new(vec![0.0, 1.0, 0.0, 0.0]).with_id("b"),
            ],
        )
        .unwrap();

    let removed = engine
        .delete("docs", &["a".to_string(), "ghost".to_string()])
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(engine.get_collection("docs").unwrap().count, 1);

    let response = engine
        .query("docs", &[1.0, 0.0, 0.0, 0.0], &QueryOptions::new(5))
        .unwrap();
    assert!(response.results.iter().all(|h| h.id != "a"));

    // Document store and graph stay in lockstep.
    let stats = engine.index_stats("docs").unwrap().unwrap();
    assert_eq!(stats.nodes, 1);
}

#[test]
fn include_vectors_toggle() {
    let engine = VectorEngine::with_defaults();
    engine
        .create_collection("docs", CollectionOptions::new(2))
        .unwrap();
    engine
        .insert("docs", vec![InsertRequest::new(vec![1.0, 0.0]).with_id("a")])
        .unwrap();

    let with = engine
        .query("docs", &[1.0, 0.0], &QueryOptions::new(1))
        .unwrap();
    assert_eq!(with.results[0].vector.as_deref(), Some(&[1.0, 0.0][..]));

    let without = engine
        .query(
            "docs",
            &[1.0, 0.0],
            &QueryOptions::new(1).with_include_vectors(false),
        )
        .unwrap();
    assert!(without.results[0].vector.is_none());
}

#[test]
fn query_errors() {
    let engine = VectorEngine::with_defaults();
    engine
        .create_collection("docs", CollectionOptions::new(2))
        .unwrap();

    assert!(matches!(
        engine.query("missing", &[1.0, 0.0], &QueryOptions::default()),
        Err(EngineError::CollectionNotFound { .. })
    ));
    assert!(matches!(
        engine.query("docs", &[1.0], &QueryOptions::default()),
        Err(EngineError::DimensionMismatch { .. })
    ));
}

#[test]
fn export_and_import_round_trip() {
    let engine = VectorEngine::with_defaults();
    engine
        .create_collection("docs", CollectionOptions::new(4))
        .unwrap();
    let requests: Vec<InsertRequest> = (0..30)
        .map(|i| {
            let angle = f64::from(i) * 0.2;
            InsertRequest::new(vec![angle.cos(), angle.sin(), 0.1, 0.0]).with_id(format!("d{i}"))
        })
        .collect();
    engine.insert("docs", requests).unwrap();

    let snapshot = engine.export_collection("docs").unwrap();
    let info = engine.import_collection("restored", snapshot).unwrap();
    assert_eq!(info.count, 30);

    let query = [1.0, 0.0, 0.0, 0.0];
    let original = engine.query("docs", &query, &QueryOptions::new(5)).unwrap();
    let restored = engine
        .query("restored", &query, &QueryOptions::new(5))
        .unwrap();
    let ids = |r: &vanta_engine::QueryResponse| {
        r.results.iter().map(|h| h.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&original), ids(&restored));

    // Flat collections have nothing to export.
    engine
        .create_collection(
            "flat",
            CollectionOptions::new(2).with_index_type(IndexType::Flat),
        )
        .unwrap();
    assert!(matches!(
        engine.export_collection("flat"),
        Err(EngineError::InvalidArgument { .. })
    ));
}

#[test]
fn audit_trail_records_engine_actions() {
    let engine = VectorEngine::with_defaults();
    engine
        .create_collection("docs", CollectionOptions::new(2))
        .unwrap();
    engine
        .insert("docs", vec![InsertRequest::new(vec![1.0, 0.0]).with_id("a")])
        .unwrap();
    engine
        .query("docs", &[1.0, 0.0], &QueryOptions::new(1))
        .unwrap();
    engine.delete("docs", &["a".to_string()]).unwrap();
    engine.drop_collection("docs");

    let stats = engine.audit().stats();
    for action in [
        "create_collection",
        "insert",
        "query",
        "delete",
        "drop_collection",
    ] {
        assert_eq!(stats.by_action[action], 1, "missing audit action {action}");
    }
    assert!(stats.by_actor.contains_key("engine"));
}
