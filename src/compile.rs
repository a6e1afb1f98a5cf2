//! Compilation pipeline: filter, prune, then resolve every schema site.

use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::builder::generate_ir;
use crate::context::{Context, Site};
use crate::document::Document;
use crate::error::CompileError;
use crate::ir::{SpecLocation, TypeDefinition};
use crate::naming::component_reference;
use crate::operations::{compile_operation, operations};
use crate::prune::{prune, PruneReport};
use crate::types::CompileOptions;

/// The type model of one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compilation {
    /// Registered definitions in registration order.
    pub types: Vec<TypeDefinition>,
    /// What pruning removed, when it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prune: Option<PruneReport>,
    /// The filtered and pruned working copy the types were built from.
    #[serde(skip)]
    pub document: Value,
}

impl Compilation {
    /// Definition registered under `name`.
    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }
}

/// Result of a collecting compilation.
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub compilation: Compilation,
    /// One error per failed site, in document order.
    pub errors: Vec<CompileError>,
}

impl CompileReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Compile `document`, stopping at the first error.
///
/// The input is not modified; filtering and pruning work on a copy.
///
/// # Errors
///
/// Returns the first `CompileError` raised by pruning or by any site.
pub fn compile(document: &Value, options: &CompileOptions) -> Result<Compilation, CompileError> {
    let (doc, report) = prepare(document, options)?;
    let types = run(&doc, options, None)?;
    Ok(Compilation {
        types,
        prune: report,
        document: doc.into_inner(),
    })
}

/// Compile `document`, resolving each component schema and each operation
/// independently.
///
/// A failing site contributes its error to the report and leaves no
/// definitions behind.
///
/// # Errors
///
/// Only errors that affect the whole document are returned: a root that is
/// not an object, or pruning that does not settle.
pub fn compile_all(
    document: &Value,
    options: &CompileOptions,
) -> Result<CompileReport, CompileError> {
    let (doc, report) = prepare(document, options)?;
    let mut errors = Vec::new();
    let types = run(&doc, options, Some(&mut errors))?;
    Ok(CompileReport {
        compilation: Compilation {
            types,
            prune: report,
            document: doc.into_inner(),
        },
        errors,
    })
}

/// Compile independent documents in parallel. Results are in input order.
pub fn compile_batch(
    documents: &[Value],
    options: &CompileOptions,
) -> Vec<Result<Compilation, CompileError>> {
    documents
        .par_iter()
        .map(|document| compile(document, options))
        .collect()
}

fn prepare(
    document: &Value,
    options: &CompileOptions,
) -> Result<(Document, Option<PruneReport>), CompileError> {
    let mut working = document.clone();

    let filtered = crate::filter::filter_operations(&mut working, &options.filter);
    if filtered > 0 {
        debug!(removed = filtered, "filtered operations");
    }

    let report = if options.prune && working.is_object() {
        let report = prune(&mut working, &options.prune_options())?;
        debug!(
            iterations = report.iterations,
            removed = report.removed.len(),
            "pruned components"
        );
        Some(report)
    } else {
        None
    };

    Ok((Document::new(working)?, report))
}

/// Resolve every site. With `collect` set, site errors are recorded there
/// and the registry is rolled back past the failed site; otherwise the
/// first error is returned.
fn run(
    doc: &Document,
    options: &CompileOptions,
    mut collect: Option<&mut Vec<CompileError>>,
) -> Result<Vec<TypeDefinition>, CompileError> {
    let mut ctx = Context::new(doc, options);

    for (key, node) in doc.components("schemas") {
        let checkpoint = ctx.registry.checkpoint();
        let result = compile_component(&mut ctx, key, node);
        settle(&mut ctx, result, checkpoint, collect.as_deref_mut(), key)?;
    }

    for operation in operations(doc) {
        let checkpoint = ctx.registry.checkpoint();
        let result = compile_operation(&mut ctx, &operation);
        settle(&mut ctx, result, checkpoint, collect.as_deref_mut(), &operation.name)?;
    }

    Ok(ctx.into_registry().into_definitions())
}

fn compile_component(ctx: &mut Context<'_>, key: &str, node: &Value) -> Result<(), CompileError> {
    let reference = component_reference("schemas", key);
    let probe = Site::new(vec![key.to_string()]);
    let name = ctx.component_type_name(&reference, &probe)?;
    let site = Site::component(key, &name);

    let ir = generate_ir(ctx, Some(node), &site)?;
    ctx.registry
        .register(TypeDefinition::new(name, ir, SpecLocation::Schema).json_name(key))?;
    Ok(())
}

fn settle(
    ctx: &mut Context<'_>,
    result: Result<(), CompileError>,
    checkpoint: usize,
    collect: Option<&mut Vec<CompileError>>,
    site: &str,
) -> Result<(), CompileError> {
    match (result, collect) {
        (Ok(()), _) => Ok(()),
        (Err(e), None) => Err(e),
        (Err(e), Some(errors)) => {
            warn!(site, error = %e, "site failed");
            ctx.registry.rollback(checkpoint);
            errors.push(e);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn petstore() -> Value {
        json!({
            "openapi": "3.0.3",
            "paths": {
                "/pets": {
                    "get": {
                        "operationId": "listPets",
                        "tags": ["pets"],
                        "responses": { "200": { "content": { "application/json": {
                            "schema": { "type": "array", "items": { "$ref": "#/components/schemas/Pet" } }
                        }}}}
                    }
                },
                "/stores": {
                    "get": {
                        "operationId": "listStores",
                        "tags": ["stores"],
                        "responses": { "200": { "content": { "application/json": {
                            "schema": { "$ref": "#/components/schemas/Store" }
                        }}}}
                    }
                }
            },
            "components": { "schemas": {
                "Pet": {
                    "type": "object",
                    "required": ["id"],
                    "properties": { "id": { "type": "string", "format": "uuid" } }
                },
                "Store": { "type": "object", "properties": { "name": { "type": "string" } } },
                "Orphan": { "type": "string" }
            }}
        })
    }

    #[test]
    fn compiles_components_then_operations() {
        let compilation = compile(&petstore(), &CompileOptions::new()).unwrap();
        let names: Vec<&str> = compilation.types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Pet", "Store", "ListPets200Response", "ListStores200Response"]
        );
        assert_eq!(
            compilation.get("Pet").unwrap().schema.type_decl,
            "record { id: uuid }"
        );
        assert_eq!(
            compilation.get("ListPets200Response").unwrap().schema.type_decl,
            "array<Pet>"
        );

        let report = compilation.prune.as_ref().unwrap();
        assert_eq!(report.removed, vec!["#/components/schemas/Orphan".to_string()]);
    }

    #[test]
    fn input_is_not_modified() {
        let document = petstore();
        let before = document.clone();
        compile(&document, &CompileOptions::new()).unwrap();
        assert_eq!(document, before);
    }

    #[test]
    fn pruning_can_be_disabled() {
        let compilation = compile(&petstore(), &CompileOptions::new().prune(false)).unwrap();
        assert!(compilation.get("Orphan").is_some());
        assert!(compilation.prune.is_none());
    }

    #[test]
    fn filter_runs_before_pruning() {
        let mut filter = crate::filter::FilterConfig::default();
        filter.exclude.tags.push("stores".to_string());
        let compilation = compile(&petstore(), &CompileOptions::new().filter(filter)).unwrap();
        assert!(compilation.get("Pet").is_some());
        assert!(compilation.get("Store").is_none());
        assert!(compilation.get("ListStores200Response").is_none());
    }

    #[test]
    fn non_object_root() {
        let result = compile(&json!([1, 2]), &CompileOptions::new());
        assert!(matches!(result, Err(CompileError::InvalidDocument { .. })));
    }

    #[test]
    fn component_type_name_extension() {
        let document = json!({
            "components": { "schemas": {
                "pet_v2": { "x-type-name": "Pet", "type": "object" },
                "Owner": {
                    "type": "object",
                    "properties": { "pet": { "$ref": "#/components/schemas/pet_v2" } }
                }
            }}
        });
        let compilation = compile(&document, &CompileOptions::new().prune(false)).unwrap();
        let pet = compilation.get("Pet").unwrap();
        assert_eq!(pet.json_name.as_deref(), Some("pet_v2"));
        assert_eq!(
            compilation.get("Owner").unwrap().schema.type_decl,
            "record { pet?: Pet }"
        );
    }

    #[test]
    fn duplicate_component_names() {
        let document = json!({
            "components": { "schemas": {
                "a": { "x-type-name": "Same", "type": "string" },
                "b": { "x-type-name": "Same", "type": "integer" }
            }}
        });
        let result = compile(&document, &CompileOptions::new().prune(false));
        assert!(matches!(
            result,
            Err(CompileError::DuplicateTypeName { name }) if name == "Same"
        ));
    }

    #[test]
    fn collecting_mode_rolls_back_failed_sites() {
        let document = json!({
            "components": { "schemas": {
                "Good": { "type": "object", "properties": { "a": { "type": "string" } } },
                "Bad": {
                    "type": "object",
                    "properties": {
                        "nested": { "type": "object", "properties": { "x": { "type": "string" } } },
                        "broken": { "$ref": "#/components/schemas/Missing" }
                    }
                },
                "Also": { "type": "integer" }
            }}
        });
        let options = CompileOptions::new().prune(false);

        let result = compile(&document, &options);
        assert!(matches!(result, Err(CompileError::UnresolvableReference { .. })));

        let report = compile_all(&document, &options).unwrap();
        assert!(!report.is_ok());
        assert_eq!(report.errors.len(), 1);
        let names: Vec<&str> = report
            .compilation
            .types
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["Good", "Also"]);
    }

    #[test]
    fn batch_keeps_input_order() {
        let documents = vec![
            petstore(),
            json!("not a document"),
            json!({ "components": { "schemas": { "A": { "type": "string" } } } }),
        ];
        let results = compile_batch(&documents, &CompileOptions::new().prune(false));
        assert_eq!(results.len(), 3);
        assert!(results[0].as_ref().unwrap().get("Pet").is_some());
        assert!(matches!(results[1], Err(CompileError::InvalidDocument { .. })));
        assert_eq!(results[2].as_ref().unwrap().types.len(), 1);
    }

    #[test]
    fn serializes_without_working_copy() {
        let compilation = compile(&petstore(), &CompileOptions::new()).unwrap();
        let value = serde_json::to_value(&compilation).unwrap();
        assert!(value.get("document").is_none());
        assert_eq!(value["types"][0]["name"], "Pet");
        assert_eq!(value["types"][0]["location"], "schema");
        assert_eq!(value["prune"]["iterations"], 2);
    }
}
