use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use pretty_assertions::assert_eq;
use serde_json::json;

use crate::{
    instrument::{
        FieldObserver, FieldRef, Instrumentation, InstrumentationError, InstrumentationState,
    },
    resolver::{EngineObjectData, ResolvedValue},
    tests::harness::FeatureTest,
};

/// Explodes in `begin_field_execution` for one specific field.
struct ExplodingInstrumentation {
    target: &'static str,
}

impl Instrumentation for ExplodingInstrumentation {
    fn begin_field_execution(
        &self,
        _state: &InstrumentationState,
        field: &FieldRef<'_>,
    ) -> Result<FieldObserver, InstrumentationError> {
        if field.field_name == self.target {
            Err(InstrumentationError::new(format!(
                "Explosion in beginFieldExecution for {}",
                field.field_name,
            )))
        } else {
            Ok(FieldObserver::default())
        }
    }
}

fn nested_fixture(instrumentation: Arc<dyn Instrumentation>) -> FeatureTest {
    FeatureTest::builder()
        .sdl(
            "type Query { outer: Outer }
             type Outer { leaf: String }",
        )
        .module(|m| {
            m.resolver("Query", "outer", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::Object(EngineObjectData::from_values(
                        "Outer",
                        [("leaf".into(), ResolvedValue::from("ok"))],
                    )))
                });
            });
        })
        .instrumentation(instrumentation)
        .build()
}

#[tokio::test]
async fn begin_field_execution_failure_is_fatal() {
    let fixture = nested_fixture(Arc::new(ExplodingInstrumentation { target: "leaf" }));

    let result = fixture
        .try_run(crate::OperationRequest::new("{ outer { leaf } }"))
        .await;

    // The hook runs outside the fetch error scope: the whole request fails
    // with its error and no partial data is returned.
    match result {
        Err(crate::OperationError::Instrumentation(e)) => {
            assert!(
                e.message.contains("Explosion in beginFieldExecution for leaf"),
                "unexpected message: {}",
                e.message,
            );
        }
        other => panic!("expected a fatal instrumentation error, got {other:?}"),
    }
}

/// Fails the completion callback of one field.
struct ExplodingCompletion {
    target: &'static str,
}

impl Instrumentation for ExplodingCompletion {
    fn begin_field_execution(
        &self,
        _state: &InstrumentationState,
        field: &FieldRef<'_>,
    ) -> Result<FieldObserver, InstrumentationError> {
        if field.field_name != self.target {
            return Ok(FieldObserver::default());
        }

        let field_name = self.target;
        Ok(FieldObserver {
            on_dispatched: None,
            on_completed: Some(Box::new(move |_ok| {
                Err(InstrumentationError::new(format!(
                    "Explosion in onCompleted for {field_name}",
                )))
            })),
        })
    }
}

#[tokio::test]
async fn completion_callback_failure_is_fatal() {
    let fixture = nested_fixture(Arc::new(ExplodingCompletion { target: "leaf" }));

    let result = fixture
        .try_run(crate::OperationRequest::new("{ outer { leaf } }"))
        .await;

    assert!(matches!(
        result,
        Err(crate::OperationError::Instrumentation(ref e))
            if e.message.contains("Explosion in onCompleted for leaf"),
    ));
}

/// Counts hook invocations into shared state.
#[derive(Default)]
struct CountingInstrumentation {
    fields: Mutex<Vec<String>>,
    dispatched: AtomicUsize,
    completed_ok: AtomicUsize,
}

impl Instrumentation for Arc<CountingInstrumentation> {
    fn begin_field_execution(
        &self,
        _state: &InstrumentationState,
        field: &FieldRef<'_>,
    ) -> Result<FieldObserver, InstrumentationError> {
        self.fields
            .lock()
            .unwrap()
            .push(format!("{}.{}", field.type_name, field.field_name));

        let this = Arc::clone(self);
        let this_completed = Arc::clone(self);
        Ok(FieldObserver {
            on_dispatched: Some(Box::new(move || {
                this.dispatched.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })),
            on_completed: Some(Box::new(move |ok| {
                if ok {
                    this_completed.completed_ok.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            })),
        })
    }
}

#[tokio::test]
async fn observers_fire_for_every_executed_field() {
    let counting = Arc::new(CountingInstrumentation::default());

    let fixture = nested_fixture(Arc::new(Arc::clone(&counting)));
    let output = fixture.run("{ outer { leaf } }").await;
    assert_eq!(output, json!({"data": {"outer": {"leaf": "ok"}}}));

    let mut fields = counting.fields.lock().unwrap().clone();
    fields.sort();
    assert_eq!(fields, vec!["Outer.leaf", "Query.outer"]);
    assert_eq!(counting.dispatched.load(Ordering::SeqCst), 2);
    assert_eq!(counting.completed_ok.load(Ordering::SeqCst), 2);
}
