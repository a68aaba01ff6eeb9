use pretty_assertions::assert_eq;
use serde_json::json;

use crate::{
    executor::FieldError,
    resolver::{EngineObjectData, ResolvedValue},
    tests::harness::FeatureTest,
};

#[tokio::test]
async fn field_checker_degrades_only_the_guarded_field() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { secret: String public: String }")
        .module(|m| {
            m.value("Query", "secret", ResolvedValue::from("classified"));
            m.value("Query", "public", ResolvedValue::from("open"));
            m.field_checker("Query", "secret", |c| {
                c.execute(|_args, _data| async {
                    Err(FieldError::new("viewer may not read secret"))
                });
            });
        })
        .build();

    assert_eq!(
        fixture.run("{ secret public }").await,
        json!({
            "data": {"secret": null, "public": "open"},
            "errors": [{
                "message": "viewer may not read secret",
                "path": ["secret"],
                "errorType": "DataFetchingException",
            }],
        }),
    );
}

#[tokio::test]
async fn field_checker_reads_its_declared_selections() {
    let fixture = FeatureTest::builder()
        .sdl(
            "type Query { listing: Listing }
             type Listing { ownerId: ID! secret: String }",
        )
        .module(|m| {
            m.resolver("Query", "listing", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::Object(EngineObjectData::from_values(
                        "Listing",
                        [
                            ("ownerId".into(), ResolvedValue::from("someone-else")),
                            ("secret".into(), ResolvedValue::from("the secret")),
                        ],
                    )))
                });
            });
            m.field_checker("Listing", "secret", |c| {
                c.object_selections("owner", "ownerId");
                c.execute(|_args, data| async move {
                    let owner = data
                        .get("owner")
                        .ok_or_else(|| FieldError::new("owner data missing"))?;
                    match owner.fetch("ownerId").await? {
                        ResolvedValue::Scalar(crate::value::Value::String(id))
                            if id == "me" =>
                        {
                            Ok(())
                        }
                        _ => Err(FieldError::new("not the owner")),
                    }
                });
            });
        })
        .build();

    let output = fixture.run("{ listing { ownerId secret } }").await;
    assert_eq!(
        output["data"],
        json!({"listing": {"ownerId": "someone-else", "secret": null}}),
    );
    assert_eq!(output["errors"][0]["message"], json!("not the owner"));
    assert_eq!(output["errors"][0]["path"], json!(["listing", "secret"]));
}

#[tokio::test]
async fn type_checker_poisons_every_read_from_the_node() {
    let fixture = FeatureTest::builder()
        .sdl(
            "type Query { bazList: [Baz] }
             interface Node { id: ID! }
             type Baz implements Node { id: ID! x: Int }",
        )
        .module(|m| {
            m.resolver("Query", "bazList", |r| {
                r.resolve(|_s, _c| async move {
                    Ok(ResolvedValue::List(vec![
                        ResolvedValue::node_reference("Baz", "1"),
                        ResolvedValue::node_reference("Baz", "2"),
                    ]))
                });
            });
            m.node_batched("Baz", false, |selectors, _ctx| async move {
                Ok(selectors
                    .iter()
                    .map(|s| {
                        Ok(EngineObjectData::from_values(
                            "Baz",
                            [("id".into(), ResolvedValue::from(s.id.as_str()))],
                        ))
                    })
                    .collect())
            });
            m.type_checker("Baz", |c| {
                c.execute(|_args, _data| async {
                    Err(FieldError::new("nodes of this type are restricted"))
                });
            });
        })
        .build();

    let output = fixture.run("{ bazList { id } }").await;
    // Elements are nullable, so each degraded node becomes a null element;
    // siblings and the operation survive.
    assert_eq!(output["data"], json!({"bazList": [null, null]}));

    let errors = output["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["path"], json!(["bazList", 0]));
    assert_eq!(
        errors[0]["message"],
        json!("nodes of this type are restricted"),
    );
}

#[tokio::test]
async fn checker_success_leaves_the_field_alone() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { guarded: String }")
        .module(|m| {
            m.value("Query", "guarded", ResolvedValue::from("fine"));
            m.field_checker("Query", "guarded", |c| {
                c.execute(|_args, _data| async { Ok(()) });
            });
        })
        .build();

    assert_eq!(
        fixture.run("{ guarded }").await,
        json!({"data": {"guarded": "fine"}}),
    );
}

#[tokio::test]
async fn checker_arguments_match_the_field_arguments() {
    let fixture = FeatureTest::builder()
        .sdl("type Query { item(key: String): String }")
        .module(|m| {
            m.resolver("Query", "item", |r| {
                r.resolve(|selector, _ctx| async move {
                    Ok(ResolvedValue::from(
                        selector.arguments.get_str("key").unwrap_or("?").to_owned(),
                    ))
                });
            });
            m.field_checker("Query", "item", |c| {
                c.execute(|args, _data| async move {
                    if args.get_str("key") == Some("forbidden") {
                        Err(FieldError::new("that key is off limits"))
                    } else {
                        Ok(())
                    }
                });
            });
        })
        .build();

    assert_eq!(
        fixture.run("{ item(key: \"ok\") }").await,
        json!({"data": {"item": "ok"}}),
    );

    let output = fixture.run("{ item(key: \"forbidden\") }").await;
    assert_eq!(output["data"], json!({"item": null}));
    assert_eq!(output["errors"][0]["message"], json!("that key is off limits"));
}
