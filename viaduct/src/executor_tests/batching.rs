use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use futures::FutureExt as _;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::{
    resolver::{EngineObjectData, ResolvedValue},
    tests::harness::FeatureTest,
};

const NODE_SDL: &str = "type Query { bazList: [Baz!]! }
     interface Node { id: ID! }
     type Baz implements Node { id: ID! x: Int }";

fn baz(id: &str, x: i64) -> EngineObjectData {
    EngineObjectData::from_values(
        "Baz",
        [
            ("id".into(), ResolvedValue::from(id)),
            ("x".into(), ResolvedValue::from(x)),
        ],
    )
}

#[tokio::test]
async fn sibling_node_lookups_land_in_one_batch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&calls);

    let fixture = FeatureTest::builder()
        .sdl(NODE_SDL)
        .module(move |m| {
            m.resolver("Query", "bazList", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::List(vec![
                        ResolvedValue::node_reference("Baz", "1"),
                        ResolvedValue::node_reference("Baz", "2"),
                        ResolvedValue::node_reference("Baz", "3"),
                    ]))
                });
            });
            let calls = Arc::clone(&observed);
            m.node_batched("Baz", false, move |selectors, _ctx| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    // Every sibling lookup arrives in this one call; prove it
                    // by deriving each x from the batch size.
                    let size = selectors.len() as i64;
                    Ok(selectors
                        .iter()
                        .map(|s| Ok(baz(&s.id, size)))
                        .collect())
                }
            });
        })
        .build();

    assert_eq!(
        fixture.run("{ bazList { id x } }").await,
        json!({"data": {"bazList": [
            {"id": "1", "x": 3},
            {"id": "2", "x": 3},
            {"id": "3", "x": 3},
        ]}}),
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn batching_field_resolver_called_once_per_tick() {
    let calls = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&calls);

    let fixture = FeatureTest::builder()
        .sdl("type Query { double(n: Int): Int }")
        .module(move |m| {
            let calls = Arc::clone(&observed);
            m.resolver("Query", "double", move |r| {
                let calls = Arc::clone(&calls);
                r.batch_resolve(move |selectors, _ctx| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        Ok(selectors
                            .iter()
                            .map(|s| {
                                Ok(ResolvedValue::from(
                                    s.arguments.get_i64("n").unwrap_or(0) * 2,
                                ))
                            })
                            .collect())
                    }
                });
            });
        })
        .build();

    assert_eq!(
        fixture
            .run("{ a: double(n: 1) b: double(n: 2) c: double(n: 3) }")
            .await,
        json!({"data": {"a": 2, "b": 4, "c": 6}}),
    );
    // One tick, one dispatch, three selectors.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn batch_results_correlate_by_selector_position() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { echo(n: Int): Int }")
        .module(|m| {
            m.resolver("Query", "echo", |r| {
                r.batch_resolve(|selectors, _ctx| async move {
                    Ok(selectors
                        .iter()
                        .map(|s| Ok(ResolvedValue::from(s.arguments.get_i64("n").unwrap_or(-1))))
                        .collect())
                });
            });
        })
        .build();

    assert_eq!(
        fixture.run("{ z: echo(n: 26) a: echo(n: 1) }").await,
        json!({"data": {"z": 26, "a": 1}}),
    );
}

#[tokio::test]
async fn required_selections_settle_before_batch_resolve() {
    let fixture = FeatureTest::builder()
        .sdl(
            "type Query { listing: Listing }
             type Listing { base: Int derived: Int }",
        )
        .module(|m| {
            m.resolver("Query", "listing", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::Object(EngineObjectData::from_values(
                        "Listing",
                        [("base".into(), ResolvedValue::from(20))],
                    )))
                });
            });
            m.resolver("Listing", "derived", |r| {
                r.object_selections("base");
                r.batch_resolve(|selectors, _ctx| async move {
                    let mut out = Vec::with_capacity(selectors.len());
                    for s in &selectors {
                        // The object view settled before this call, so the
                        // read must already be available.
                        let base = s
                            .object_value
                            .fetch("base")
                            .now_or_never()
                            .expect("required selections settle before batch_resolve")?;
                        let base = match base {
                            ResolvedValue::Scalar(crate::value::Value::Int(i)) => i,
                            other => panic!("unexpected base value {other:?}"),
                        };
                        out.push(Ok(ResolvedValue::from(base + 1)));
                    }
                    Ok(out)
                });
            });
        })
        .build();

    assert_eq!(
        fixture.run("{ listing { derived } }").await,
        json!({"data": {"listing": {"derived": 21}}}),
    );
}

#[tokio::test]
async fn mismatched_batch_result_count_is_an_engine_error() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { broken: Int other: String }")
        .module(|m| {
            m.resolver("Query", "broken", |r| {
                r.batch_resolve(|_selectors, _ctx| async move {
                    Ok(Vec::new())
                });
            });
            m.value("Query", "other", ResolvedValue::from("fine"));
        })
        .build();

    let output = fixture.run("{ broken other }").await;
    assert_eq!(output["data"]["broken"], json!(null));
    assert_eq!(output["data"]["other"], json!("fine"));
    assert_eq!(output["errors"][0]["errorType"], json!("InternalEngineError"));
}
