//! Read-only accessors over raw schema nodes.

use serde_json::{Map, Value};

/// Keys that describe a schema without constraining its shape.
pub const METADATA_KEYS: &[&str] = &[
    "description",
    "title",
    "summary",
    "example",
    "examples",
    "deprecated",
    "externalDocs",
    "$comment",
];

/// Keys that give a schema its own structure next to any combinator.
const STRUCTURAL_KEYS: &[&str] = &[
    "type",
    "properties",
    "items",
    "additionalProperties",
    "enum",
    "const",
];

/// Declared types, excluding `null`. Accepts both `type: "x"` and the
/// OpenAPI 3.1 list form.
pub fn declared_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(t)) if t != "null" => vec![t.as_str()],
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .filter(|t| *t != "null")
            .collect(),
        _ => Vec::new(),
    }
}

/// Declared types, falling back to `object` when properties are present and
/// `array` when items are.
pub fn schema_type(schema: &Value) -> Vec<&str> {
    let types = declared_types(schema);
    if !types.is_empty() {
        return types;
    }
    if schema.get("properties").is_some() {
        return vec!["object"];
    }
    if schema.get("items").is_some() {
        return vec!["array"];
    }
    Vec::new()
}

/// True when `null` appears among the declared types.
pub fn has_null_type(schema: &Value) -> bool {
    match schema.get("type") {
        Some(Value::String(t)) => t == "null",
        Some(Value::Array(types)) => types.iter().any(|t| t == "null"),
        _ => false,
    }
}

/// True when the only declared type is `null`.
pub fn is_null_only(schema: &Value) -> bool {
    has_null_type(schema) && declared_types(schema).is_empty()
}

pub fn is_nullable(schema: &Value) -> bool {
    has_null_type(schema) || flag(schema, "nullable")
}

/// Boolean keyword, absent meaning false.
pub fn flag(schema: &Value, key: &str) -> bool {
    schema.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub fn string_field<'a>(schema: &'a Value, key: &str) -> Option<&'a str> {
    schema.get(key).and_then(Value::as_str)
}

pub fn reference(schema: &Value) -> Option<&str> {
    string_field(schema, "$ref")
}

pub fn required_names(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

pub fn properties(schema: &Value) -> Option<&Map<String, Value>> {
    schema.get("properties").and_then(Value::as_object)
}

pub fn members<'a>(schema: &'a Value, combinator: &str) -> &'a [Value] {
    schema
        .get(combinator)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// True when the node declares nothing besides metadata.
pub fn is_metadata_only(schema: &Value) -> bool {
    match schema.as_object() {
        Some(obj) => obj
            .keys()
            .all(|k| METADATA_KEYS.contains(&k.as_str()) || k.starts_with("x-")),
        None => false,
    }
}

/// True when a `$ref` node has no siblings that change the referenced type.
/// `nullable` is allowed because it only widens the reference.
pub fn is_bare_reference(schema: &Value) -> bool {
    match schema.as_object() {
        Some(obj) => obj.keys().all(|k| {
            k == "$ref" || k == "nullable" || METADATA_KEYS.contains(&k.as_str()) || k.starts_with("x-")
        }),
        None => false,
    }
}

/// True when the node has its own type, properties, items or enum next to
/// any combinator.
pub fn has_own_structure(schema: &Value) -> bool {
    STRUCTURAL_KEYS.iter().any(|k| schema.get(*k).is_some())
}

/// The node as an object, or an empty map for `true`/`{}`-like nodes.
pub fn object(schema: &Value) -> Map<String, Value> {
    schema.as_object().cloned().unwrap_or_default()
}
