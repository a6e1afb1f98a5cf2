//! Structural merge of two allOf members.

use serde_json::{Map, Value};

use crate::error::MergeConflict;
use crate::schema::{is_nullable, schema_type, string_field};

/// Keys whose boolean value must agree between members. Absent means false.
const AGREEING_FLAGS: &[(&str, MergeConflict)] = &[
    ("uniqueItems", MergeConflict::UniqueItems),
    ("readOnly", MergeConflict::ReadOnly),
    ("writeOnly", MergeConflict::WriteOnly),
];

/// Merge `right` into the accumulated `left`.
///
/// Types must agree unless one side declares none. Formats must agree,
/// only one side may carry a default, and the flag keywords must match.
/// `nullable` is or-ed, `required` and `enum` are concatenated, properties
/// are united with the right side winning on key conflicts, and an explicit
/// `additionalProperties: false` on either side wins. Any other keyword is
/// taken from the right side when both carry it.
pub fn merge_schemas(
    left: Option<Map<String, Value>>,
    right: &Value,
) -> Result<Map<String, Value>, MergeConflict> {
    let right_map = right.as_object().cloned().unwrap_or_default();
    let Some(left_map) = left else {
        return Ok(right_map);
    };
    let left = Value::Object(left_map);

    let left_types = schema_type(&left);
    let right_types = schema_type(right);
    if !left_types.is_empty() && !right_types.is_empty() && left_types != right_types {
        return Err(MergeConflict::Types {
            left: left_types.join(","),
            right: right_types.join(","),
        });
    }

    if let (Some(l), Some(r)) = (string_field(&left, "format"), string_field(right, "format")) {
        if l != r {
            return Err(MergeConflict::Formats {
                left: l.to_string(),
                right: r.to_string(),
            });
        }
    }

    if left.get("default").is_some() && right.get("default").is_some() {
        return Err(MergeConflict::Defaults);
    }

    for (key, conflict) in AGREEING_FLAGS {
        if flag_value(&left, key) != flag_value(right, key) {
            return Err(conflict.clone());
        }
    }
    if exclusive_value(&left, "exclusiveMinimum") != exclusive_value(right, "exclusiveMinimum") {
        return Err(MergeConflict::ExclusiveMinimum);
    }
    if exclusive_value(&left, "exclusiveMaximum") != exclusive_value(right, "exclusiveMaximum") {
        return Err(MergeConflict::ExclusiveMaximum);
    }

    let additional = merge_additional_properties(
        left.get("additionalProperties"),
        right.get("additionalProperties"),
    )?;
    let nullable = is_nullable(&left) || is_nullable(right);
    let left_has_type = left.get("type").is_some();

    let mut out = match left {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    for (key, value) in right_map {
        match key.as_str() {
            "type" if left_has_type => {}
            "required" | "enum" => concat_array(&mut out, &key, value),
            "properties" => {
                let merged = out
                    .entry("properties")
                    .or_insert_with(|| Value::Object(Map::new()));
                match (merged, value) {
                    (Value::Object(into), Value::Object(from)) => {
                        for (name, schema) in from {
                            into.insert(name, schema);
                        }
                    }
                    (slot, value) => *slot = value,
                }
            }
            "additionalProperties" | "nullable" | "allOf" => {}
            _ => {
                out.insert(key, value);
            }
        }
    }

    out.shift_remove("allOf");
    match additional {
        Some(value) => {
            out.insert("additionalProperties".to_string(), value);
        }
        None => {
            out.shift_remove("additionalProperties");
        }
    }
    if nullable {
        out.insert("nullable".to_string(), Value::Bool(true));
    } else {
        out.shift_remove("nullable");
    }

    Ok(out)
}

fn flag_value(schema: &Value, key: &str) -> bool {
    schema.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Exclusive bounds compare by value: a 3.0 boolean flag, a 3.1 number, or
/// absent (false).
fn exclusive_value(schema: &Value, key: &str) -> Value {
    match schema.get(key) {
        None | Some(Value::Null) => Value::Bool(false),
        Some(v) => v.clone(),
    }
}

fn concat_array(out: &mut Map<String, Value>, key: &str, value: Value) {
    let Value::Array(extra) = value else {
        return;
    };
    match out.get_mut(key) {
        Some(Value::Array(existing)) => existing.extend(extra),
        _ => {
            out.insert(key.to_string(), Value::Array(extra));
        }
    }
}

fn merge_additional_properties(
    left: Option<&Value>,
    right: Option<&Value>,
) -> Result<Option<Value>, MergeConflict> {
    let is_false = |v: Option<&Value>| matches!(v, Some(Value::Bool(false)));
    let as_schema = |v: Option<&Value>| match v {
        Some(Value::Object(obj)) if !obj.is_empty() => v.cloned(),
        _ => None,
    };
    let is_open = |v: Option<&Value>| match v {
        Some(Value::Bool(true)) => true,
        Some(Value::Object(obj)) => obj.is_empty(),
        _ => false,
    };

    if is_false(left) || is_false(right) {
        return Ok(Some(Value::Bool(false)));
    }
    match (as_schema(left), as_schema(right)) {
        (Some(l), Some(r)) if l == r => Ok(Some(l)),
        (Some(_), Some(_)) => Err(MergeConflict::AdditionalProperties),
        (Some(s), None) | (None, Some(s)) => Ok(Some(s)),
        (None, None) if is_open(left) || is_open(right) => Ok(Some(Value::Bool(true))),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn merge(left: Value, right: Value) -> Result<Value, MergeConflict> {
        let left = left.as_object().cloned();
        merge_schemas(left, &right).map(Value::Object)
    }

    #[test]
    fn first_member_is_taken_as_is() {
        let merged = merge_schemas(None, &json!({ "type": "object" })).unwrap();
        assert_eq!(Value::Object(merged), json!({ "type": "object" }));
    }

    #[test]
    fn incompatible_types() {
        let result = merge(json!({ "type": "object" }), json!({ "type": "array" }));
        assert!(matches!(result, Err(MergeConflict::Types { .. })));

        let result = merge(json!({ "type": "array" }), json!({ "type": "object" }));
        assert!(matches!(result, Err(MergeConflict::Types { .. })));
    }

    #[test]
    fn untyped_member_has_no_type_opinion() {
        let merged = merge(
            json!({ "type": "object", "properties": { "id": { "type": "string" } } }),
            json!({ "required": ["id"] }),
        )
        .unwrap();
        assert_eq!(merged["type"], "object");
        assert_eq!(merged["required"], json!(["id"]));
    }

    #[test]
    fn properties_inferred_as_object() {
        let result = merge(json!({ "type": "array" }), json!({ "properties": {} }));
        assert!(matches!(result, Err(MergeConflict::Types { .. })));
    }

    #[test]
    fn format_must_agree() {
        let result = merge(
            json!({ "type": "string", "format": "date" }),
            json!({ "type": "string", "format": "date-time" }),
        );
        assert!(matches!(result, Err(MergeConflict::Formats { .. })));

        let merged = merge(
            json!({ "type": "string", "format": "uuid" }),
            json!({ "type": "string", "maxLength": 36 }),
        )
        .unwrap();
        assert_eq!(merged["format"], "uuid");
        assert_eq!(merged["maxLength"], 36);
    }

    #[test]
    fn only_one_default() {
        let merged = merge(json!({ "default": 1 }), json!({ "minimum": 0 })).unwrap();
        assert_eq!(merged["default"], 1);

        let result = merge(json!({ "default": 1 }), json!({ "default": 2 }));
        assert_eq!(result.unwrap_err(), MergeConflict::Defaults);
    }

    #[test]
    fn flags_must_agree() {
        let result = merge(
            json!({ "type": "array", "uniqueItems": true }),
            json!({ "type": "array" }),
        );
        assert_eq!(result.unwrap_err(), MergeConflict::UniqueItems);

        let result = merge(json!({ "readOnly": true }), json!({ "readOnly": false }));
        assert_eq!(result.unwrap_err(), MergeConflict::ReadOnly);

        let result = merge(
            json!({ "exclusiveMinimum": true }),
            json!({ "exclusiveMinimum": false }),
        );
        assert_eq!(result.unwrap_err(), MergeConflict::ExclusiveMinimum);

        let result = merge(json!({ "exclusiveMaximum": 5 }), json!({}));
        assert_eq!(result.unwrap_err(), MergeConflict::ExclusiveMaximum);
    }

    #[test]
    fn nullable_is_permissive() {
        let merged = merge(
            json!({ "type": "string" }),
            json!({ "type": "string", "nullable": true }),
        )
        .unwrap();
        assert_eq!(merged["nullable"], true);

        let merged = merge(json!({ "type": "string" }), json!({ "type": "string" })).unwrap();
        assert!(merged.get("nullable").is_none());
    }

    #[test]
    fn required_and_enum_concatenate() {
        let merged = merge(
            json!({ "required": ["a"], "enum": ["x"] }),
            json!({ "required": ["b", "a"], "enum": ["y"] }),
        )
        .unwrap();
        assert_eq!(merged["required"], json!(["a", "b", "a"]));
        assert_eq!(merged["enum"], json!(["x", "y"]));
    }

    #[test]
    fn properties_last_writer_wins() {
        let merged = merge(
            json!({ "properties": { "id": { "type": "string" }, "a": { "type": "string" } } }),
            json!({ "properties": { "id": { "type": "integer" }, "b": { "type": "string" } } }),
        )
        .unwrap();
        assert_eq!(merged["properties"]["id"], json!({ "type": "integer" }));
        assert_eq!(merged["properties"].as_object().unwrap().len(), 3);
    }

    #[test]
    fn additional_properties_false_wins() {
        let merged = merge(
            json!({ "additionalProperties": { "type": "string" } }),
            json!({ "additionalProperties": false }),
        )
        .unwrap();
        assert_eq!(merged["additionalProperties"], false);
    }

    #[test]
    fn additional_properties_schema_kept() {
        let merged = merge(
            json!({ "additionalProperties": true }),
            json!({ "additionalProperties": { "type": "integer" } }),
        )
        .unwrap();
        assert_eq!(merged["additionalProperties"], json!({ "type": "integer" }));

        let result = merge(
            json!({ "additionalProperties": { "type": "string" } }),
            json!({ "additionalProperties": { "type": "integer" } }),
        );
        assert_eq!(result.unwrap_err(), MergeConflict::AdditionalProperties);
    }
}
