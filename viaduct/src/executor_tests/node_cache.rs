use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use pretty_assertions::assert_eq;
use serde_json::json;

use crate::{
    resolver::{EngineObjectData, ResolvedValue},
    tests::harness::FeatureTest,
};

const NODE_SDL: &str = "type Query { baz(id: ID!): Baz later(id: ID!): Baz }
     interface Node { id: ID! }
     type Baz implements Node { id: ID! x: Int y: Int }";

fn full_baz(id: &str) -> EngineObjectData {
    EngineObjectData::from_values(
        "Baz",
        [
            ("id".into(), ResolvedValue::from(id)),
            ("x".into(), ResolvedValue::from(1)),
            ("y".into(), ResolvedValue::from(2)),
        ],
    )
}

/// A fixture with two node-returning fields; `later` resolves a tick after
/// `baz`, so its node lookup observes the cache rather than the batch.
fn fixture(selective: bool, calls: Arc<AtomicUsize>) -> FeatureTest {
    FeatureTest::builder()
        .sdl(NODE_SDL)
        .module(move |m| {
            for (field, delayed) in [("baz", false), ("later", true)] {
                m.resolver("Query", field, move |r| {
                    r.resolve(move |selector, _ctx| async move {
                        if delayed {
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                        let id = selector.arguments.get_str("id").unwrap_or("?").to_owned();
                        Ok(ResolvedValue::node_reference("Baz", id))
                    });
                });
            }

            let calls = Arc::clone(&calls);
            m.node_batched("Baz", selective, move |selectors, _ctx| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Ok(selectors.iter().map(|s| Ok(full_baz(&s.id))).collect())
                }
            });
        })
        .build()
}

#[tokio::test]
async fn non_selective_resolver_runs_once_per_id() {
    let calls = Arc::new(AtomicUsize::new(0));
    let fixture = fixture(false, Arc::clone(&calls));

    // Different sub-selections of the same id, in different ticks.
    let output = fixture
        .run("{ baz(id: \"1\") { x } later(id: \"1\") { y } }")
        .await;

    assert_eq!(
        output,
        json!({"data": {"baz": {"x": 1}, "later": {"y": 2}}}),
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn selective_resolver_runs_per_distinct_selection_set() {
    let calls = Arc::new(AtomicUsize::new(0));
    let fixture = fixture(true, Arc::clone(&calls));

    let output = fixture
        .run("{ baz(id: \"1\") { x } later(id: \"1\") { y } }")
        .await;

    assert_eq!(
        output,
        json!({"data": {"baz": {"x": 1}, "later": {"y": 2}}}),
    );
    // `{ y }` is not covered by the stored `{ x }` entry.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn selective_resolver_reuses_covering_entries() {
    let calls = Arc::new(AtomicUsize::new(0));
    let fixture = fixture(true, Arc::clone(&calls));

    let output = fixture
        .run("{ baz(id: \"1\") { x } later(id: \"1\") { x } }")
        .await;

    assert_eq!(
        output,
        json!({"data": {"baz": {"x": 1}, "later": {"x": 1}}}),
    );
    // Identical selection sets: the second lookup is a cache hit.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failures_are_cached_for_the_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&calls);

    let fixture = FeatureTest::builder()
        .sdl(NODE_SDL)
        .module(move |m| {
            for (field, delayed) in [("baz", false), ("later", true)] {
                m.resolver("Query", field, move |r| {
                    r.resolve(move |selector, _ctx| async move {
                        if delayed {
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                        let id = selector.arguments.get_str("id").unwrap_or("?").to_owned();
                        Ok(ResolvedValue::node_reference("Baz", id))
                    });
                });
            }
            let calls = Arc::clone(&observed);
            m.node_batched("Baz", false, move |selectors, _ctx| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Ok(selectors
                        .iter()
                        .map(|_| Err(crate::executor::FieldError::new("always broken")))
                        .collect())
                }
            });
        })
        .build();

    let output = fixture
        .run("{ baz(id: \"1\") { x } later(id: \"1\") { x } }")
        .await;

    assert_eq!(output["data"], json!({"baz": null, "later": null}));
    assert_eq!(output["errors"].as_array().unwrap().len(), 2);
    // The second lookup was served the cached failure, not a retry.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn node_field_resolves_through_the_loader() {
    let fixture = FeatureTest::builder()
        .sdl(
            "type Query { node(id: ID!): Node }
             interface Node { id: ID! }
             type Baz implements Node { id: ID! x: Int }",
        )
        .module(|m| {
            m.node_batched("Baz", false, |selectors, _ctx| async move {
                Ok(selectors.iter().map(|s| Ok(full_baz(&s.id))).collect())
            });
        })
        .build();

    assert_eq!(
        fixture
            .run("{ node(id: \"Baz:1\") { id ... on Baz { x } } }")
            .await,
        json!({"data": {"node": {"id": "Baz:1", "x": 1}}}),
    );

    let output = fixture.run("{ node(id: \"Ghost:1\") { id } }").await;
    assert_eq!(output["data"], json!({"node": null}));
}

#[tokio::test]
async fn missing_node_resolver_fails_resolution() {
    let fixture = FeatureTest::builder()
        .sdl(
            "type Query { baz: Baz }
             interface Node { id: ID! }
             type Baz implements Node { id: ID! x: Int }",
        )
        .module(|m| {
            m.resolver("Query", "baz", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::node_reference("Baz", "1"))
                });
            });
        })
        .build();

    let output = fixture.run("{ baz { id } }").await;
    assert_eq!(output["data"], json!({"baz": null}));
    assert!(
        output["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("No node resolver registered for type \"Baz\""),
    );
}

#[tokio::test]
async fn callers_field_scope_never_leaks_into_node_resolution() {
    let scopes: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&scopes);

    let fixture = FeatureTest::builder()
        .sdl(NODE_SDL)
        .module(move |m| {
            m.resolver("Query", "baz", |r| {
                r.resolve(|selector, _ctx| async move {
                    let id = selector.arguments.get_str("id").unwrap_or("?").to_owned();
                    Ok(ResolvedValue::node_reference("Baz", id))
                });
            });
            let scopes = Arc::clone(&observed);
            m.node_batched("Baz", true, move |selectors, ctx| {
                // The operation used fragments and variables; none of that
                // may be visible here.
                scopes.lock().unwrap().push(ctx.field_scope.is_empty());
                async move {
                    for s in &selectors {
                        // The selections still resolve: they carry their own
                        // fragment registry and variables.
                        assert!(s.selections.contains_field("x"));
                        assert!(!s.selections.contains_field("y"));
                    }
                    Ok(selectors.iter().map(|s| Ok(full_baz(&s.id))).collect())
                }
            });
        })
        .build();

    let output = fixture
        .run_with_variables(
            "query Q($withX: Boolean!) {
                 baz(id: \"1\") { ...parts }
             }
             fragment parts on Baz { x @include(if: $withX) }",
            json!({"withX": true}),
        )
        .await;

    assert_eq!(output["data"], json!({"baz": {"x": 1}}));
    assert_eq!(*scopes.lock().unwrap(), vec![true]);
}
