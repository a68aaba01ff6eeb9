use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use crate::{
    CancelReason, EngineConfig, OperationError, OperationRequest,
    resolver::ResolvedValue,
    tests::harness::FeatureTest,
};

fn slow_fast_fixture(config: EngineConfig) -> FeatureTest {
    FeatureTest::builder()
        .sdl("type Query { slow: String fast: String }")
        .module(|m| {
            m.resolver("Query", "slow", |r| {
                r.resolve(|_s, _c| async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(ResolvedValue::from("too late"))
                });
            });
            m.value("Query", "fast", ResolvedValue::from("done"));
        })
        .config(config)
        .build()
}

#[tokio::test]
async fn timeout_degrades_unfinished_fields() {
    let fixture =
        slow_fast_fixture(EngineConfig::new().with_timeout(Duration::from_millis(50)));

    let output = fixture
        .try_run(OperationRequest::new("{ slow fast }"))
        .await
        .unwrap();

    // The fast field finished before the deadline; the slow one degrades
    // into a field error with a deterministic message.
    assert_eq!(
        output.to_json(),
        json!({
            "data": {"slow": null, "fast": "done"},
            "errors": [{
                "message": "request timed out",
                "path": ["slow"],
                "errorType": "DataFetchingException",
            }],
        }),
    );
}

#[tokio::test]
async fn external_cancellation_aborts_the_request() {
    let fixture = slow_fast_fixture(EngineConfig::default());

    let (execution, handle) = fixture
        .engine()
        .execute_with_handle(OperationRequest::new("{ slow }"));

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel(CancelReason::RequestCancelled);
    });

    let result = execution.await;
    canceller.await.unwrap();

    assert!(matches!(
        result,
        Err(OperationError::Cancelled(CancelReason::RequestCancelled)),
    ));
}

#[tokio::test]
async fn untimed_requests_never_touch_the_clock() {
    let fixture = slow_fast_fixture(EngineConfig::default());

    let output = fixture
        .try_run(OperationRequest::new("{ fast }"))
        .await
        .unwrap();
    assert_eq!(output.to_json(), json!({"data": {"fast": "done"}}));
}
