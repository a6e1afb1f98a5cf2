//! Component pruning over whole documents.

use oas_ir::{
    compile, filter_operations, prune, CompileError, CompileOptions, FilterConfig, PruneOptions,
    PruneStrategy,
};
use serde_json::{json, Value};

fn response(schema: Value) -> Value {
    json!({ "200": { "content": { "application/json": { "schema": schema } } } })
}

fn chain() -> Value {
    json!({
        "openapi": "3.0.3",
        "paths": {
            "/a": { "get": {
                "operationId": "getA",
                "tags": ["public"],
                "responses": response(json!({ "$ref": "#/components/schemas/A" }))
            }}
        },
        "components": {
            "schemas": {
                "A": { "type": "object", "properties": { "b": { "$ref": "#/components/schemas/B" } } },
                "B": { "type": "array", "items": { "$ref": "#/components/schemas/C" } },
                "C": { "allOf": [{ "$ref": "#/components/schemas/D" }] },
                "D": { "oneOf": [{ "$ref": "#/components/schemas/E" }, { "type": "string" }] },
                "E": { "additionalProperties": { "$ref": "#/components/schemas/F" } },
                "F": { "type": "string" }
            },
            "responses": {
                "NotFound": { "description": "missing" }
            }
        }
    })
}

fn schema_names(document: &Value) -> Vec<String> {
    document["components"]["schemas"]
        .as_object()
        .map(|s| s.keys().cloned().collect())
        .unwrap_or_default()
}

mod fixed_point {
    use super::*;

    #[test]
    fn transitive_references_survive() {
        let mut document = chain();
        let report = prune(&mut document, &PruneOptions::new()).unwrap();
        assert_eq!(schema_names(&document), vec!["A", "B", "C", "D", "E", "F"]);
        assert_eq!(report.removed, vec!["#/components/responses/NotFound".to_string()]);
    }

    #[test]
    fn chain_unravels_without_its_operation() {
        let mut document = chain();
        let mut filter = FilterConfig::default();
        filter.exclude.tags.push("public".to_string());
        assert_eq!(filter_operations(&mut document, &filter), 1);

        let report = prune(&mut document, &PruneOptions::new()).unwrap();
        assert!(schema_names(&document).is_empty());
        // One component falls away per pass, plus the settling pass.
        assert_eq!(report.iterations, 7);
    }

    #[test]
    fn pruning_is_idempotent() {
        let mut once = chain();
        prune(&mut once, &PruneOptions::new()).unwrap();
        let mut twice = once.clone();
        let report = prune(&mut twice, &PruneOptions::new()).unwrap();
        assert_eq!(once, twice);
        assert!(report.removed.is_empty());
        assert_eq!(report.iterations, 1);
    }

    #[test]
    fn iteration_cap() {
        let mut document = chain();
        document["paths"] = json!({});
        let result = prune(&mut document, &PruneOptions::new().max_iterations(3));
        assert!(matches!(
            result,
            Err(CompileError::PruneIterationLimitExceeded { limit: 3 })
        ));
    }
}

mod reachability {
    use super::*;

    #[test]
    fn agrees_with_fixed_point_on_acyclic_documents() {
        let mut fixed = chain();
        prune(&mut fixed, &PruneOptions::new()).unwrap();

        let mut swept = chain();
        let report = prune(
            &mut swept,
            &PruneOptions::new().strategy(PruneStrategy::Reachability),
        )
        .unwrap();
        assert_eq!(fixed, swept);
        assert_eq!(report.iterations, 1);
    }

    #[test]
    fn unreachable_cycle_is_removed() {
        let mut document = chain();
        document["components"]["schemas"]["Left"] =
            json!({ "properties": { "right": { "$ref": "#/components/schemas/Right" } } });
        document["components"]["schemas"]["Right"] =
            json!({ "properties": { "left": { "$ref": "#/components/schemas/Left" } } });

        let mut fixed = document.clone();
        prune(&mut fixed, &PruneOptions::new()).unwrap();
        assert!(schema_names(&fixed).contains(&"Left".to_string()));

        prune(
            &mut document,
            &PruneOptions::new().strategy(PruneStrategy::Reachability),
        )
        .unwrap();
        assert_eq!(schema_names(&document), vec!["A", "B", "C", "D", "E", "F"]);
    }

    #[test]
    fn parameters_and_bodies_are_followed() {
        let mut document = json!({
            "paths": { "/a": { "post": {
                "parameters": [{ "$ref": "#/components/parameters/Limit" }],
                "requestBody": { "$ref": "#/components/requestBodies/NewPet" },
                "responses": {}
            }}},
            "components": {
                "parameters": {
                    "Limit": { "name": "limit", "in": "query", "schema": { "$ref": "#/components/schemas/Count" } }
                },
                "requestBodies": {
                    "NewPet": { "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } } } }
                },
                "schemas": {
                    "Count": { "type": "integer" },
                    "Pet": { "type": "object" },
                    "Stray": { "type": "object" }
                }
            }
        });
        prune(
            &mut document,
            &PruneOptions::new().strategy(PruneStrategy::Reachability),
        )
        .unwrap();
        assert_eq!(schema_names(&document), vec!["Count", "Pet"]);
        assert!(document["components"]["parameters"].get("Limit").is_some());
    }
}

mod property_names {
    use super::*;

    fn settings() -> Value {
        json!({
            "openapi": "3.0.3",
            "paths": {
                "/settings": { "get": {
                    "operationId": "getSettings",
                    "responses": response(json!({ "$ref": "#/components/schemas/Settings" }))
                }}
            },
            "components": { "schemas": {
                "Settings": {
                    "type": "object",
                    "properties": {
                        "default": { "$ref": "#/components/schemas/Profile" },
                        "enum": { "$ref": "#/components/schemas/Choice" },
                        "example": {
                            "type": "object",
                            "properties": { "const": { "$ref": "#/components/schemas/Pinned" } }
                        }
                    }
                },
                "Profile": { "type": "object", "properties": { "name": { "type": "string" } } },
                "Choice": { "type": "string", "enum": ["a", "b"] },
                "Pinned": { "type": "integer" }
            }}
        })
    }

    #[test]
    fn references_under_keyword_named_properties_survive() {
        for strategy in [PruneStrategy::FixedPoint, PruneStrategy::Reachability] {
            let mut document = settings();
            let report = prune(&mut document, &PruneOptions::new().strategy(strategy)).unwrap();
            assert!(report.removed.is_empty(), "{:?}: {:?}", strategy, report.removed);
            assert_eq!(
                schema_names(&document),
                vec!["Settings", "Profile", "Choice", "Pinned"]
            );
        }
    }

    #[test]
    fn compiles_after_pruning() {
        let compilation = compile(&settings(), &CompileOptions::new()).unwrap();
        assert_eq!(
            compilation.get("Settings").unwrap().schema.type_decl,
            "record { default?: Profile, enum?: Choice, example?: Settings_Example }"
        );
        assert!(compilation.get("Profile").is_some());
        assert!(compilation.get("Pinned").is_some());
    }
}
