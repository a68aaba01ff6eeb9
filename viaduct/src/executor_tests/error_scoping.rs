use pretty_assertions::assert_eq;
use serde_json::json;

use crate::{
    executor::FieldError,
    resolver::{EngineObjectData, ResolvedValue},
    tests::harness::FeatureTest,
};

const NODE_SDL: &str = "type Query { bazList: [Baz!]! }
     interface Node { id: ID! }
     type Baz implements Node { id: ID! x: Int }";

fn baz_list_fixture() -> FeatureTest {
    FeatureTest::builder()
        .sdl(NODE_SDL)
        .module(|m| {
            m.resolver("Query", "bazList", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::List(vec![
                        ResolvedValue::node_reference("Baz", "1"),
                        ResolvedValue::node_reference("Baz", "2"),
                        ResolvedValue::node_reference("Baz", "3"),
                    ]))
                });
            });
            m.node_batched("Baz", false, |selectors, _ctx| async move {
                Ok(selectors
                    .iter()
                    .map(|s| {
                        if s.id == "2" {
                            Err(FieldError::new("baz 2 is broken"))
                        } else {
                            Ok(EngineObjectData::from_values(
                                "Baz",
                                [("id".into(), ResolvedValue::from(s.id.as_str()))],
                            ))
                        }
                    })
                    .collect())
            });
        })
        .build()
}

#[tokio::test]
async fn failed_element_null_propagates_through_required_list() {
    let output = baz_list_fixture().run("{ bazList { id } }").await;

    // The failing element is non-null, so the null climbs through the
    // required list all the way to the response data.
    assert_eq!(
        output,
        json!({
            "data": null,
            "errors": [{
                "message": "baz 2 is broken",
                "path": ["bazList", 1],
                "errorType": "DataFetchingException",
            }],
        }),
    );
}

#[tokio::test]
async fn nullable_positions_absorb_failures() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { broken: Int fine: String }")
        .module(|m| {
            m.resolver("Query", "broken", |r| {
                r.resolve(|_s, _c| async move {
                    Err(FieldError::new("resolver blew up"))
                });
            });
            m.value("Query", "fine", ResolvedValue::from("still here"));
        })
        .build();

    // Only the failed field degrades; its sibling is untouched.
    assert_eq!(
        fixture.run("{ broken fine }").await,
        json!({
            "data": {"broken": null, "fine": "still here"},
            "errors": [{
                "message": "resolver blew up",
                "path": ["broken"],
                "errorType": "DataFetchingException",
            }],
        }),
    );
}

#[tokio::test]
async fn non_null_resolver_null_is_an_error() {
    let fixture = FeatureTest::builder()
        .sdl(
            "type Query { listing: Listing }
             type Listing { id: ID! nick: String }",
        )
        .module(|m| {
            m.resolver("Query", "listing", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::Object(EngineObjectData::from_values(
                        "Listing",
                        [
                            ("id".into(), ResolvedValue::Null),
                            ("nick".into(), ResolvedValue::from("spot")),
                        ],
                    )))
                });
            });
        })
        .build();

    let output = fixture.run("{ listing { id nick } }").await;
    // `id` is non-null: its null propagates to the nullable `listing`.
    assert_eq!(output["data"], json!({"listing": null}));
    assert_eq!(output["errors"][0]["path"], json!(["listing", "id"]));
}

#[tokio::test]
async fn unset_selection_is_a_field_error() {
    let fixture = FeatureTest::builder()
        .sdl(
            "type Query { listing: Listing }
             type Listing { nick: String }",
        )
        .module(|m| {
            m.resolver("Query", "listing", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::Object(EngineObjectData::from_values(
                        "Listing",
                        [],
                    )))
                });
            });
        })
        .build();

    let output = fixture.run("{ listing { nick } }").await;
    assert_eq!(output["data"], json!({"listing": {"nick": null}}));
    assert_eq!(output["errors"][0]["errorType"], json!("UnsetSelection"));
}

#[tokio::test]
async fn resolver_global_node_failure_poisons_every_selector() {
    let fixture = FeatureTest::builder()
        .sdl(NODE_SDL)
        .module(|m| {
            m.resolver("Query", "bazList", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::List(vec![
                        ResolvedValue::node_reference("Baz", "1"),
                        ResolvedValue::node_reference("Baz", "2"),
                    ]))
                });
            });
            m.node_batched("Baz", false, |_selectors, _ctx| async move {
                Err(FieldError::new("the whole batch exploded"))
            });
        })
        .build();

    let output = fixture.run("{ bazList { id } }").await;
    assert_eq!(output["data"], json!(null));

    let errors = output["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    for error in errors {
        assert_eq!(error["message"], json!("the whole batch exploded"));
    }
}

#[tokio::test]
async fn rss_failure_degrades_the_dependent_field() {
    let fixture = FeatureTest::builder()
        .sdl(
            "type Query { listing: Listing }
             type Listing { broken: Int dependent: Int independent: Int }",
        )
        .module(|m| {
            m.resolver("Query", "listing", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::Object(EngineObjectData::from_values(
                        "Listing",
                        [("independent".into(), ResolvedValue::from(5))],
                    )))
                });
            });
            m.resolver("Listing", "broken", |r| {
                r.resolve(|_s, _c| async move {
                    Err(FieldError::new("broken dependency"))
                });
            });
            m.resolver("Listing", "dependent", |r| {
                r.object_selections("broken");
                r.resolve(|selector, _ctx| async move {
                    selector.object_value.fetch("broken").await?;
                    Ok(ResolvedValue::from(0))
                });
            });
        })
        .build();

    let output = fixture.run("{ listing { dependent independent } }").await;
    // The dependency failure scopes to the dependent field only.
    assert_eq!(
        output["data"],
        json!({"listing": {"dependent": null, "independent": 5}}),
    );
    assert_eq!(output["errors"][0]["path"], json!(["listing", "dependent"]));
    assert_eq!(output["errors"][0]["message"], json!("broken dependency"));
}
