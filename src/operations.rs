//! Definitions for operation parameters, request bodies and responses.

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::builder::generate_ir;
use crate::context::{Context, Site};
use crate::document::Document;
use crate::error::CompileError;
use crate::ir::SpecLocation;
use crate::naming::to_type_name;
use crate::schema::{flag, members, string_field};
use crate::types::HTTP_METHODS;

/// Parameter locations that get a record, with the record's name suffix.
const PARAMETER_GROUPS: &[(&str, &str, SpecLocation)] = &[
    ("path", "PathParams", SpecLocation::PathParameter),
    ("query", "QueryParams", SpecLocation::QueryParameter),
    ("header", "HeaderParams", SpecLocation::HeaderParameter),
];

/// One operation of the document.
pub(crate) struct Operation<'a> {
    /// Type name prefix: the operationId, or method and path.
    pub name: String,
    pub path: &'a str,
    pub method: &'static str,
    pub item: &'a Value,
    pub node: &'a Value,
}

/// Operations in document order.
pub(crate) fn operations(doc: &Document) -> Vec<Operation<'_>> {
    let Some(paths) = doc.root().get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (path, item) in paths {
        for &method in HTTP_METHODS {
            let Some(node) = item.get(method) else {
                continue;
            };
            let name = match string_field(node, "operationId") {
                Some(id) => to_type_name(id),
                None => to_type_name(&format!("{} {}", method, path)),
            };
            out.push(Operation {
                name,
                path,
                method,
                item,
                node,
            });
        }
    }
    out
}

/// Register the parameter, body and response types of one operation.
pub(crate) fn compile_operation(
    ctx: &mut Context<'_>,
    operation: &Operation<'_>,
) -> Result<(), CompileError> {
    debug!(method = operation.method, path = operation.path, name = %operation.name, "compiling operation");
    compile_parameters(ctx, operation)?;

    if let Some(body) = operation.node.get("requestBody") {
        let site = Site::new(vec![format!("{}Body", operation.name)]);
        let body = ctx.deref(body, &site)?;
        if let Some(schema) = content_schema(body) {
            define_root(ctx, schema, &site, SpecLocation::RequestBody)?;
        }
    }

    if let Some(responses) = operation.node.get("responses").and_then(Value::as_object) {
        for (code, response) in responses {
            if code.starts_with("x-") {
                continue;
            }
            let site = Site::new(vec![format!(
                "{}{}Response",
                operation.name,
                status_segment(code)
            )]);
            let response = ctx.deref(response, &site)?;
            if let Some(schema) = content_schema(response) {
                define_root(ctx, schema, &site, SpecLocation::Response)?;
            }
        }
    }
    Ok(())
}

fn compile_parameters(ctx: &mut Context<'_>, operation: &Operation<'_>) -> Result<(), CompileError> {
    let site = Site::new(vec![operation.name.clone()]);

    // Operation parameters override path-level ones with the same name and location.
    let mut parameters: Vec<&Value> = Vec::new();
    for parameter in members(operation.item, "parameters")
        .iter()
        .chain(members(operation.node, "parameters"))
    {
        let parameter = ctx.deref(parameter, &site)?;
        let key = parameter_key(parameter);
        match parameters.iter_mut().find(|p| parameter_key(p) == key) {
            Some(existing) => *existing = parameter,
            None => parameters.push(parameter),
        }
    }

    for parameter in &parameters {
        match string_field(parameter, "in") {
            Some("path" | "query" | "header") => {}
            Some("cookie") => {
                debug!(operation = %operation.name, parameter = ?string_field(parameter, "name"), "skipping cookie parameter");
            }
            location => {
                warn!(operation = %operation.name, location = ?location, "unknown parameter location");
            }
        }
    }

    for (location, suffix, spec_location) in PARAMETER_GROUPS {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for parameter in parameters
            .iter()
            .filter(|p| string_field(p, "in") == Some(*location))
        {
            let Some(name) = string_field(parameter, "name") else {
                warn!(operation = %operation.name, "parameter without a name");
                continue;
            };
            let mut schema = match parameter_schema(parameter) {
                Some(schema) => schema.clone(),
                None => {
                    warn!(operation = %operation.name, parameter = name, "parameter has neither schema nor content");
                    json!({})
                }
            };
            if let (Some(description), Some(obj)) =
                (string_field(parameter, "description"), schema.as_object_mut())
            {
                obj.entry("description")
                    .or_insert_with(|| Value::String(description.to_string()));
            }
            if *location == "path" || flag(parameter, "required") {
                required.push(Value::String(name.to_string()));
            }
            properties.insert(name.to_string(), schema);
        }
        if properties.is_empty() {
            continue;
        }

        let node = json!({ "type": "object", "required": required, "properties": properties });
        let site = Site::new(vec![format!("{}{}", operation.name, suffix)]);
        define_root(ctx, &node, &site, *spec_location)?;
    }
    Ok(())
}

fn define_root(
    ctx: &mut Context<'_>,
    schema: &Value,
    site: &Site,
    location: SpecLocation,
) -> Result<(), CompileError> {
    let ir = generate_ir(ctx, Some(schema), site)?;
    ctx.define(ir, site, location)?;
    Ok(())
}

fn parameter_key(parameter: &Value) -> (Option<&str>, Option<&str>) {
    (string_field(parameter, "name"), string_field(parameter, "in"))
}

/// `schema`, or the schema of the first media type in `content`.
fn parameter_schema(parameter: &Value) -> Option<&Value> {
    parameter.get("schema").or_else(|| {
        parameter
            .get("content")
            .and_then(Value::as_object)
            .and_then(|content| content.values().next())
            .and_then(|media| media.get("schema"))
    })
}

/// Schema of the JSON media type, or of the first one.
fn content_schema(node: &Value) -> Option<&Value> {
    let content = node.get("content").and_then(Value::as_object)?;
    let media = content
        .iter()
        .find(|(media_type, _)| is_json(media_type))
        .map(|(_, media)| media)
        .or_else(|| content.values().next())?;
    media.get("schema")
}

fn is_json(media_type: &str) -> bool {
    let essence = media_type.split(';').next().unwrap_or(media_type).trim();
    essence == "application/json" || essence.ends_with("+json")
}

fn status_segment(code: &str) -> String {
    if code == "default" {
        return "Default".to_string();
    }
    code.chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::TypeDefinition;
    use crate::types::CompileOptions;

    fn compile_ops(doc: Value) -> Result<Vec<TypeDefinition>, CompileError> {
        let doc = Document::new(doc).unwrap();
        let options = CompileOptions::new();
        let mut ctx = Context::new(&doc, &options);
        for operation in operations(&doc) {
            compile_operation(&mut ctx, &operation)?;
        }
        Ok(ctx.into_registry().into_definitions())
    }

    fn find<'a>(defs: &'a [TypeDefinition], name: &str) -> &'a TypeDefinition {
        defs.iter()
            .find(|d| d.name == name)
            .unwrap_or_else(|| panic!("no definition {}", name))
    }

    #[test]
    fn operation_names() {
        let doc = Document::new(json!({
            "paths": {
                "/pets/{id}": {
                    "get": { "operationId": "getPet" },
                    "delete": {}
                }
            }
        }))
        .unwrap();
        let names: Vec<String> = operations(&doc).into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["GetPet", "DeletePetsId"]);
    }

    #[test]
    fn parameters_are_grouped_by_location() {
        let defs = compile_ops(json!({
            "components": { "parameters": {
                "limit": { "name": "limit", "in": "query", "schema": { "type": "integer" } }
            }},
            "paths": { "/pets/{id}": {
                "parameters": [
                    { "name": "id", "in": "path", "schema": { "type": "string" } }
                ],
                "get": {
                    "operationId": "getPet",
                    "parameters": [
                        { "$ref": "#/components/parameters/limit" },
                        { "name": "X-Trace", "in": "header", "required": true, "schema": { "type": "string" } },
                        { "name": "session", "in": "cookie", "schema": { "type": "string" } }
                    ]
                }
            }}
        }))
        .unwrap();

        let path = find(&defs, "GetPetPathParams");
        assert_eq!(path.location, SpecLocation::PathParameter);
        assert_eq!(path.schema.type_decl, "record { id: string }");

        let query = find(&defs, "GetPetQueryParams");
        assert_eq!(query.schema.type_decl, "record { limit?: integer }");

        let header = find(&defs, "GetPetHeaderParams");
        assert_eq!(header.schema.type_decl, "record { X-Trace: string }");
        assert_eq!(header.schema.properties[0].field_name, "XTrace");

        assert_eq!(defs.len(), 3);
    }

    #[test]
    fn operation_parameter_overrides_path_parameter() {
        let defs = compile_ops(json!({
            "paths": { "/pets/{id}": {
                "parameters": [{ "name": "id", "in": "path", "schema": { "type": "string" } }],
                "get": {
                    "operationId": "getPet",
                    "parameters": [{ "name": "id", "in": "path", "schema": { "type": "integer" } }]
                }
            }}
        }))
        .unwrap();
        assert_eq!(
            find(&defs, "GetPetPathParams").schema.type_decl,
            "record { id: integer }"
        );
    }

    #[test]
    fn bodies_and_responses() {
        let defs = compile_ops(json!({
            "components": { "schemas": { "Pet": { "type": "object" } } },
            "paths": { "/pets": { "post": {
                "operationId": "createPet",
                "requestBody": { "content": {
                    "text/plain": { "schema": { "type": "string" } },
                    "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } }
                }},
                "responses": {
                    "201": { "content": { "application/json": {
                        "schema": { "type": "object", "properties": { "id": { "type": "string" } } }
                    }}},
                    "default": { "content": { "application/problem+json": {
                        "schema": { "type": "object", "properties": { "title": { "type": "string" } } }
                    }}},
                    "204": { "description": "no content" }
                }
            }}}
        }))
        .unwrap();

        let body = find(&defs, "CreatePetBody");
        assert_eq!(body.location, SpecLocation::RequestBody);
        assert_eq!(body.schema.type_decl, "Pet");
        assert!(body.schema.define_via_alias);

        let created = find(&defs, "CreatePet201Response");
        assert_eq!(created.location, SpecLocation::Response);
        assert_eq!(created.schema.type_decl, "record { id?: string }");

        assert!(defs.iter().any(|d| d.name == "CreatePetDefaultResponse"));
        assert_eq!(defs.len(), 3);
    }

    #[test]
    fn unresolvable_parameter_reference() {
        let result = compile_ops(json!({
            "paths": { "/a": { "get": {
                "parameters": [{ "$ref": "#/components/parameters/missing" }]
            }}}
        }));
        assert!(matches!(result, Err(CompileError::UnresolvableReference { .. })));
    }
}
