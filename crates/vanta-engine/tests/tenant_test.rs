// Tenancy laws: a scope can never read, mutate, or remove another tenant's
// documents, even against crafted filters and foreign ids.

use serde_json::json;

use vanta_core::{EngineError, Filter, TENANT_ID_KEY};
use vanta_engine::{CollectionOptions, IndexType, InsertRequest, QueryOptions, VectorEngine};

fn meta(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap()
}

#[test]
fn tenants_are_isolated_on_a_shared_collection() {
    let engine = VectorEngine::with_defaults();
    engine
        .create_collection(
            "shared",
            CollectionOptions::new(2).with_index_type(IndexType::Flat),
        )
        .unwrap();

    let alpha = engine.tenant("shared", "alpha").unwrap();
    let beta = engine.tenant("shared", "beta").unwrap();

    alpha
        .insert(vec![InsertRequest::new(vec![1.0, 0.0]).with_id("a1")])
        .unwrap();
    beta.insert(vec![InsertRequest::new(vec![0.0, 1.0]).with_id("b1")])
        .unwrap();
    assert_eq!(engine.get_collection("shared").unwrap().count, 2);

    let alpha_hits = alpha.query(&[1.0, 0.0], QueryOptions::new(10)).unwrap();
    assert_eq!(alpha_hits.results.len(), 1);
    assert_eq!(alpha_hits.results[0].id, "a1");

    let beta_hits = beta.query(&[1.0, 0.0], QueryOptions::new(10)).unwrap();
    assert_eq!(beta_hits.results.len(), 1);
    assert_eq!(beta_hits.results[0].id, "b1");

    // Foreign delete is silently skipped and counted as not-deleted.
    assert_eq!(alpha.delete(&["b1".to_string()]).unwrap(), 0);
    assert_eq!(alpha.delete(&["ghost".to_string()]).unwrap(), 0);
    assert_eq!(engine.get_collection("shared").unwrap().count, 2);

    // Owned delete works.
    assert_eq!(alpha.delete(&["a1".to_string()]).unwrap(), 1);
    assert_eq!(engine.get_collection("shared").unwrap().count, 1);
}

#[test]
fn crafted_filters_cannot_escape_the_scope() {
    let engine = VectorEngine::with_defaults();
    engine
        .create_collection(
            "shared",
            CollectionOptions::new(2).with_index_type(IndexType::Flat),
        )
        .unwrap();

    let alpha = engine.tenant("shared", "alpha").unwrap();
    let beta = engine.tenant("shared", "beta").unwrap();
    alpha
        .insert(vec![InsertRequest::new(vec![1.0, 0.0]).with_id("a1")])
        .unwrap();
    beta.insert(vec![InsertRequest::new(vec![1.0, 0.0]).with_id("b1")])
        .unwrap();

    // A filter that names the other tenant is overridden by the scope.
    let crafted = Filter::parse(&json!({ TENANT_ID_KEY: "beta" })).unwrap();
    let hits = alpha
        .query(&[1.0, 0.0], QueryOptions::new(10).with_filter(crafted))
        .unwrap();
    assert_eq!(hits.results.len(), 1);
    assert_eq!(hits.results[0].id, "a1");

    // Same through an operator object.
    let crafted = Filter::parse(&json!({ TENANT_ID_KEY: {"$in": ["beta", "alpha"]} })).unwrap();
    let hits = alpha
        .query(&[1.0, 0.0], QueryOptions::new(10).with_filter(crafted))
        .unwrap();
    assert!(hits.results.iter().all(|h| h.id == "a1"));
}

#[test]
fn forged_tenant_metadata_is_overwritten_on_insert() {
    let engine = VectorEngine::with_defaults();
    engine
        .create_collection(
            "shared",
            CollectionOptions::new(2).with_index_type(IndexType::Flat),
        )
        .unwrap();

    let alpha = engine.tenant("shared", "alpha").unwrap();
    alpha
        .insert(vec![InsertRequest::new(vec![1.0, 0.0])
            .with_id("a1")
            .with_metadata(meta(json!({ TENANT_ID_KEY: "beta", "kind": "note" })))])
        .unwrap();

    // The raw engine sees the forced tag, and the caller metadata survives.
    let raw = Filter::parse(&json!({ TENANT_ID_KEY: "alpha" })).unwrap();
    let hits = engine
        .query(
            "shared",
            &[1.0, 0.0],
            &QueryOptions::new(10).with_filter(raw),
        )
        .unwrap();
    assert_eq!(hits.results.len(), 1);
    assert_eq!(hits.results[0].id, "a1");
    assert_eq!(hits.results[0].metadata["kind"], json!("note"));

    let none = Filter::parse(&json!({ TENANT_ID_KEY: "beta" })).unwrap();
    let hits = engine
        .query(
            "shared",
            &[1.0, 0.0],
            &QueryOptions::new(10).with_filter(none),
        )
        .unwrap();
    assert!(hits.results.is_empty());
}

#[test]
fn raw_engine_reads_back_exactly_the_tenants_documents() {
    let engine = VectorEngine::with_defaults();
    engine
        .create_collection("shared", CollectionOptions::new(2))
        .unwrap();

    let alpha = engine.tenant("shared", "alpha").unwrap();
    let ids = alpha
        .insert(vec![
            InsertRequest::new(vec![1.0, 0.0]),
            InsertRequest::new(vec![0.0, 1.0]),
        ])
        .unwrap();
    engine
        .insert(
            "shared",
            vec![InsertRequest::new(vec![0.5, 0.5]).with_id("untagged")],
        )
        .unwrap();

    let filter = Filter::parse(&json!({ TENANT_ID_KEY: "alpha" })).unwrap();
    let hits = engine
        .query(
            "shared",
            &[1.0, 0.0],
            &QueryOptions::new(10).with_filter(filter),
        )
        .unwrap();
    let mut seen: Vec<String> = hits.results.iter().map(|h| h.id.clone()).collect();
    let mut expected = ids.clone();
    seen.sort();
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn tenant_scope_requires_an_existing_collection() {
    let engine = VectorEngine::with_defaults();
    assert!(matches!(
        engine.tenant("missing", "alpha"),
        Err(EngineError::CollectionNotFound { .. })
    ));

    engine
        .create_collection("shared", CollectionOptions::new(2))
        .unwrap();
    assert!(matches!(
        engine.tenant("shared", ""),
        Err(EngineError::InvalidArgument { .. })
    ));
    let scope = engine.tenant("shared", "alpha").unwrap();
    assert_eq!(scope.tenant_id(), "alpha");
    assert_eq!(scope.collection(), "shared");
}
