use pretty_assertions::assert_eq;
use serde_json::json;

use crate::{
    ast::InputValue,
    executor::FieldError,
    resolver::{EngineObjectData, FieldSelector, ResolvedValue},
    rss::VariableSpec,
    tests::harness::FeatureTest,
};

const SDL: &str = "type Query {
         listing: Listing
         viewerId: ID
         secretFor(id: ID): String
     }
     type Listing {
         id: ID!
         defaultFirst: Int
         reviews(first: Int): [String!]
         summary(count: Int): String
         autoSummary: String
         viewerSecret: String
         provided: String
     }";

/// Counts the reviews selected through the resolver's object view.
async fn summarize(selector: FieldSelector) -> Result<ResolvedValue, FieldError> {
    let reviews = match selector.object_value.fetch("reviews").await? {
        ResolvedValue::List(items) => items.len(),
        ResolvedValue::Null => 0,
        other => {
            return Err(FieldError::new(format!("unexpected reviews value {other:?}")));
        }
    };
    Ok(ResolvedValue::from(format!("{reviews} reviews")))
}

fn fixture() -> FeatureTest {
    FeatureTest::builder()
        .sdl(SDL)
        .module(|m| {
            m.resolver("Query", "listing", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::Object(EngineObjectData::from_values(
                        "Listing",
                        [
                            ("id".into(), ResolvedValue::from("l-1")),
                            ("defaultFirst".into(), ResolvedValue::from(3)),
                        ],
                    )))
                });
            });
            m.value("Query", "viewerId", ResolvedValue::from("me"));
            m.resolver("Query", "secretFor", |r| {
                r.resolve(|selector, _ctx| async move {
                    Ok(ResolvedValue::from(format!(
                        "secret-{}",
                        selector.arguments.get_str("id").unwrap_or("?"),
                    )))
                });
            });

            // Five stored reviews; `first` trims.
            m.resolver("Listing", "reviews", |r| {
                r.resolve(|selector, _ctx| async move {
                    let first = selector.arguments.get_i64("first").unwrap_or(5).min(5);
                    Ok(ResolvedValue::List(
                        (0..first)
                            .map(|i| ResolvedValue::from(format!("review-{i}")))
                            .collect(),
                    ))
                });
            });

            // $n copied from this resolver's own `count` argument.
            m.resolver("Listing", "summary", |r| {
                r.object_selections("reviews(first: $n)");
                r.variable(VariableSpec::from_argument("n", "count"));
                r.resolve(|selector, _ctx| summarize(selector));
            });

            // $n read from a parent-object field.
            m.resolver("Listing", "autoSummary", |r| {
                r.object_selections("defaultFirst reviews(first: $n)");
                r.variable(VariableSpec::from_object_field("n", "defaultFirst"));
                r.resolve(|selector, _ctx| summarize(selector));
            });

            // $who read from a query-root field.
            m.resolver("Listing", "viewerSecret", |r| {
                r.query_selections("viewerId secretFor(id: $who)");
                r.variable(VariableSpec::from_query_field("who", "viewerId"));
                r.resolve(|selector, _ctx| async move {
                    selector.query_value.fetch("secretFor").await
                });
            });

            // $n produced by a provider with a mismatched key set.
            m.resolver("Listing", "provided", |r| {
                r.object_selections("reviews(first: $n)");
                r.variables_provider("n:Int", || async {
                    Ok([(crate::ast::Name::from("rogue"), InputValue::Int(1))]
                        .into_iter()
                        .collect())
                });
                r.resolve(|selector, _ctx| summarize(selector));
            });
        })
        .build()
}

#[tokio::test]
async fn argument_bound_variables_flow_into_required_selections() {
    assert_eq!(
        fixture().run("{ listing { summary(count: 2) } }").await,
        json!({"data": {"listing": {"summary": "2 reviews"}}}),
    );
}

#[tokio::test]
async fn object_field_bound_variables_read_the_parent() {
    assert_eq!(
        fixture().run("{ listing { autoSummary } }").await,
        json!({"data": {"listing": {"autoSummary": "3 reviews"}}}),
    );
}

#[tokio::test]
async fn query_field_bound_variables_read_the_root() {
    assert_eq!(
        fixture().run("{ listing { viewerSecret } }").await,
        json!({"data": {"listing": {"viewerSecret": "secret-me"}}}),
    );
}

#[tokio::test]
async fn provider_key_mismatch_fails_the_dependent_field_at_runtime() {
    let output = fixture().run("{ listing { id provided } }").await;

    // Bootstrap accepted the declaration; the mismatch surfaces on first
    // evaluation and scopes to the dependent field.
    assert_eq!(
        output["data"],
        json!({"listing": {"id": "l-1", "provided": null}}),
    );
    let message = output["errors"][0]["message"].as_str().unwrap();
    assert!(message.contains('n'), "unexpected message: {message}");
    assert_eq!(output["errors"][0]["path"], json!(["listing", "provided"]));
}

#[tokio::test]
async fn rss_variables_in_fragments_resolve() {
    let fixture = FeatureTest::builder()
        .sdl(SDL)
        .module(|m| {
            m.resolver("Query", "listing", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::Object(EngineObjectData::from_values(
                        "Listing",
                        [("id".into(), ResolvedValue::from("l-1"))],
                    )))
                });
            });
            m.resolver("Listing", "reviews", |r| {
                r.resolve(|selector, _ctx| async move {
                    let first = selector.arguments.get_i64("first").unwrap_or(0);
                    Ok(ResolvedValue::List(
                        (0..first)
                            .map(|i| ResolvedValue::from(format!("review-{i}")))
                            .collect(),
                    ))
                });
            });
            m.resolver("Listing", "summary", |r| {
                r.object_selections(
                    "...wanted fragment wanted on Listing { reviews(first: $n) }",
                );
                r.variable(VariableSpec::from_argument("n", "count"));
                r.resolve(|selector, _ctx| summarize(selector));
            });
        })
        .build();

    assert_eq!(
        fixture.run("{ listing { summary(count: 4) } }").await,
        json!({"data": {"listing": {"summary": "4 reviews"}}}),
    );
}
