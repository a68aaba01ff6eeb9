use pretty_assertions::assert_eq;
use serde_json::json;

use crate::{
    ast::InputValue,
    resolver::{EngineObjectData, ResolvedValue},
    tests::harness::FeatureTest,
};

fn listing_data() -> EngineObjectData {
    EngineObjectData::from_values(
        "Listing",
        [
            ("id".into(), ResolvedValue::from("listing-1")),
            (
                "host".into(),
                ResolvedValue::Object(EngineObjectData::from_values(
                    "Host",
                    [("name".into(), ResolvedValue::from("ana"))],
                )),
            ),
        ],
    )
}

#[tokio::test]
async fn resolves_a_constant_field() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { foo: String }")
        .module(|m| {
            m.value("Query", "foo", ResolvedValue::from("hello world"));
        })
        .build();

    assert_eq!(
        fixture.run("{ foo }").await,
        json!({"data": {"foo": "hello world"}}),
    );
}

#[tokio::test]
async fn echoes_a_coerced_argument() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { bar(answer: Int): Int }")
        .module(|m| {
            m.resolver("Query", "bar", |r| {
                r.resolve(|selector, _ctx| async move {
                    Ok(selector
                        .arguments
                        .get("answer")
                        .map(ResolvedValue::from_input)
                        .unwrap_or(ResolvedValue::Null))
                });
            });
        })
        .build();

    assert_eq!(
        fixture.run("{ bar(answer: 42) }").await,
        json!({"data": {"bar": 42}}),
    );
}

#[tokio::test]
async fn defaulted_arguments_reach_the_resolver() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { bar(answer: Int = 7): Int }")
        .module(|m| {
            m.resolver("Query", "bar", |r| {
                r.resolve(|selector, _ctx| async move {
                    Ok(ResolvedValue::from(
                        selector.arguments.get_i64("answer").unwrap_or(-1),
                    ))
                });
            });
        })
        .build();

    assert_eq!(fixture.run("{ bar }").await, json!({"data": {"bar": 7}}));
}

#[tokio::test]
async fn nested_objects_resolve_as_properties() {
    let fixture = FeatureTest::builder()
        .sdl(
            "type Query { listing: Listing }
             type Listing { id: ID! host: Host }
             type Host { name: String }",
        )
        .module(|m| {
            m.resolver("Query", "listing", |r| {
                r.resolve(|_selector, _ctx| async move {
                    Ok(ResolvedValue::Object(listing_data()))
                });
            });
        })
        .build();

    assert_eq!(
        fixture
            .run("{ listing { id host { name } __typename } }")
            .await,
        json!({"data": {"listing": {
            "id": "listing-1",
            "host": {"name": "ana"},
            "__typename": "Listing",
        }}}),
    );
}

#[tokio::test]
async fn aliases_flow_through_response_keys() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { foo: String }")
        .module(|m| {
            m.value("Query", "foo", ResolvedValue::from("hello world"));
        })
        .build();

    assert_eq!(
        fixture.run("{ renamed: foo also: foo }").await,
        json!({"data": {"renamed": "hello world", "also": "hello world"}}),
    );
}

#[tokio::test]
async fn operation_variables_substitute_with_defaults() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { bar(answer: Int): Int }")
        .module(|m| {
            m.resolver("Query", "bar", |r| {
                r.resolve(|selector, _ctx| async move {
                    Ok(ResolvedValue::from(
                        selector.arguments.get_i64("answer").unwrap_or(-1),
                    ))
                });
            });
        })
        .build();

    assert_eq!(
        fixture
            .run_with_variables(
                "query Q($a: Int = 5) { bar(answer: $a) }",
                json!({}),
            )
            .await,
        json!({"data": {"bar": 5}}),
    );
    assert_eq!(
        fixture
            .run_with_variables(
                "query Q($a: Int = 5) { bar(answer: $a) }",
                json!({"a": 11}),
            )
            .await,
        json!({"data": {"bar": 11}}),
    );
}

#[tokio::test]
async fn fragments_and_skip_include_apply() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { foo: String bar(answer: Int): Int }")
        .module(|m| {
            m.value("Query", "foo", ResolvedValue::from("hello world"));
            m.resolver("Query", "bar", |r| {
                r.resolve(|_s, _c| async move { Ok(ResolvedValue::from(1)) });
            });
        })
        .build();

    assert_eq!(
        fixture
            .run_with_variables(
                "query Q($skipped: Boolean!) {
                     ...common
                     bar @skip(if: $skipped)
                 }
                 fragment common on Query { foo }",
                json!({"skipped": true}),
            )
            .await,
        json!({"data": {"foo": "hello world"}}),
    );
}

#[tokio::test]
async fn selects_operation_by_name() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { foo: String }")
        .module(|m| {
            m.value("Query", "foo", ResolvedValue::from("hello world"));
        })
        .build();

    let request = crate::OperationRequest::new(
        "query A { foo } query B { renamed: foo }",
    )
    .operation_name("B");
    let output = fixture.try_run(request).await.unwrap();
    assert_eq!(
        output.to_json(),
        json!({"data": {"renamed": "hello world"}}),
    );

    let ambiguous = fixture
        .try_run(crate::OperationRequest::new("query A { foo } query B { foo }"))
        .await;
    assert!(matches!(
        ambiguous,
        Err(crate::OperationError::MultipleOperationsProvided),
    ));

    let unknown = fixture
        .try_run(crate::OperationRequest::new("query A { foo }").operation_name("Nope"))
        .await;
    assert!(matches!(unknown, Err(crate::OperationError::UnknownOperationName)));
}

#[tokio::test]
async fn mutations_execute_serially() {
    use std::sync::{Arc, Mutex};

    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let fixture = FeatureTest::builder()
        .sdl(
            "type Query { ok: Boolean }
             type Mutation { first: Int second: Int }",
        )
        .module(|m| {
            let order_first = Arc::clone(&order);
            m.resolver("Mutation", "first", move |r| {
                let order = Arc::clone(&order_first);
                r.resolve(move |_s, _c| {
                    let order = Arc::clone(&order);
                    async move {
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        order.lock().unwrap().push("first");
                        Ok(ResolvedValue::from(1))
                    }
                });
            });
            let order_second = Arc::clone(&order);
            m.resolver("Mutation", "second", move |r| {
                let order = Arc::clone(&order_second);
                r.resolve(move |_s, _c| {
                    let order = Arc::clone(&order);
                    async move {
                        order.lock().unwrap().push("second");
                        Ok(ResolvedValue::from(2))
                    }
                });
            });
        })
        .build();

    let output = fixture
        .run("mutation { first second }")
        .await;
    assert_eq!(output, json!({"data": {"first": 1, "second": 2}}));
    // The second root field only starts after the first finished, despite
    // the sleep.
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
}

#[tokio::test]
async fn unknown_fields_fail_validation() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { foo: String }")
        .module(|m| {
            m.value("Query", "foo", ResolvedValue::from("x"));
        })
        .build();

    let result = fixture
        .try_run(crate::OperationRequest::new("{ ghost }"))
        .await;
    assert!(matches!(
        result,
        Err(crate::OperationError::Validation(
            crate::executor::PlanError::UnknownField { .. },
        )),
    ));
}

#[tokio::test]
async fn value_from_context_reads_the_request_context() {
    use std::sync::Arc;

    struct Viewer {
        name: &'static str,
    }

    let fixture = FeatureTest::builder()
        .sdl("type Query { viewer: String }")
        .module(|m| {
            m.value_from_context("Query", "viewer", |ctx| {
                let name = ctx
                    .request_as::<Viewer>()
                    .map(|v| v.name)
                    .unwrap_or("anonymous");
                ResolvedValue::from(name)
            });
        })
        .build();

    let request = crate::OperationRequest::new("{ viewer }")
        .context(Arc::new(Viewer { name: "ada" }));
    let output = fixture.try_run(request).await.unwrap();
    assert_eq!(output.to_json(), json!({"data": {"viewer": "ada"}}));
}

#[tokio::test]
async fn list_of_scalars_completes_in_order() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { numbers: [Int!]! }")
        .module(|m| {
            m.resolver("Query", "numbers", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::List(
                        (1..=3).map(ResolvedValue::from).collect(),
                    ))
                });
            });
        })
        .build();

    assert_eq!(
        fixture.run("{ numbers }").await,
        json!({"data": {"numbers": [1, 2, 3]}}),
    );
}

#[tokio::test]
async fn interface_selections_narrow_at_runtime() {
    let fixture = FeatureTest::builder()
        .sdl(
            "type Query { pets: [Pet!]! }
             interface Pet { name: String! }
             type Dog implements Pet { name: String! barks: Boolean }
             type Cat implements Pet { name: String! meows: Boolean }",
        )
        .module(|m| {
            m.resolver("Query", "pets", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::List(vec![
                        ResolvedValue::Object(EngineObjectData::from_values(
                            "Dog",
                            [
                                ("name".into(), ResolvedValue::from("rex")),
                                ("barks".into(), ResolvedValue::from(true)),
                            ],
                        )),
                        ResolvedValue::Object(EngineObjectData::from_values(
                            "Cat",
                            [
                                ("name".into(), ResolvedValue::from("whiskers")),
                                ("meows".into(), ResolvedValue::from(false)),
                            ],
                        )),
                    ]))
                });
            });
        })
        .build();

    assert_eq!(
        fixture
            .run(
                "{ pets { __typename name ... on Dog { barks } ... on Cat { meows } } }",
            )
            .await,
        json!({"data": {"pets": [
            {"__typename": "Dog", "name": "rex", "barks": true},
            {"__typename": "Cat", "name": "whiskers", "meows": false},
        ]}}),
    );
}

#[tokio::test]
async fn enum_arguments_arrive_as_enum_values() {
    let fixture = FeatureTest::builder()
        .sdl(
            "type Query { hero(episode: Episode): String }
             enum Episode { EMPIRE JEDI }",
        )
        .module(|m| {
            m.resolver("Query", "hero", |r| {
                r.resolve(|selector, _ctx| async move {
                    let episode = match selector.arguments.get("episode") {
                        Some(InputValue::Enum(name)) => name.to_string(),
                        _ => "NONE".to_owned(),
                    };
                    Ok(ResolvedValue::from(format!("hero of {episode}")))
                });
            });
        })
        .build();

    assert_eq!(
        fixture.run("{ hero(episode: EMPIRE) }").await,
        json!({"data": {"hero": "hero of EMPIRE"}}),
    );
}
