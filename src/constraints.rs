//! Validation facts extracted from a schema node.

use serde::Serialize;
use serde_json::Value;

use crate::schema::{declared_types, flag, is_nullable, string_field};

/// A numeric bound and whether it is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bound {
    pub value: f64,
    pub exclusive: bool,
}

/// Required/nullable state plus bounds, with a compact tag list for the
/// emitter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Constraints {
    pub required: bool,
    pub nullable: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub read_only: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub write_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_tags: Vec<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Numeric {
    Integer,
    Number,
    Other,
}

impl Constraints {
    /// Constraints of an object property.
    ///
    /// Optional properties are always nullable. Required ones are nullable
    /// when the schema says so or admits the null type.
    pub fn for_property(schema: &Value, required: bool, has_nil_type: bool) -> Self {
        let nullable = if !required || has_nil_type {
            true
        } else {
            is_nullable(schema)
        };
        Self::extract(schema, required, nullable)
    }

    /// Constraints of a schema outside any property context.
    pub fn for_schema(schema: &Value) -> Self {
        Self::extract(schema, false, is_nullable(schema))
    }

    fn extract(schema: &Value, required: bool, nullable: bool) -> Self {
        let numeric = numeric_kind(schema);
        let mut c = Constraints {
            required,
            nullable,
            read_only: flag(schema, "readOnly"),
            write_only: flag(schema, "writeOnly"),
            min_length: schema.get("minLength").and_then(Value::as_u64),
            max_length: schema.get("maxLength").and_then(Value::as_u64),
            minimum: bound(schema, "minimum", "exclusiveMinimum"),
            maximum: bound(schema, "maximum", "exclusiveMaximum"),
            min_items: schema.get("minItems").and_then(Value::as_u64),
            max_items: schema.get("maxItems").and_then(Value::as_u64),
            pattern: string_field(schema, "pattern").map(String::from),
            validation_tags: Vec::new(),
        };
        c.validation_tags = c.render_tags(numeric);
        c
    }

    /// Number of active bound fields; used to keep the stricter of two
    /// otherwise identical union members.
    pub fn strictness(&self) -> usize {
        [
            self.min_length.is_some(),
            self.max_length.is_some(),
            self.minimum.is_some(),
            self.maximum.is_some(),
            self.min_items.is_some(),
            self.max_items.is_some(),
            self.pattern.is_some(),
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }

    /// Fill bounds missing here from `other`, e.g. when a property wraps a
    /// collapsed union whose element carries the bounds.
    pub fn absorb(&mut self, other: &Constraints) {
        self.nullable |= other.nullable;
        self.read_only |= other.read_only;
        self.write_only |= other.write_only;
        self.min_length = self.min_length.or(other.min_length);
        self.max_length = self.max_length.or(other.max_length);
        self.minimum = self.minimum.or(other.minimum);
        self.maximum = self.maximum.or(other.maximum);
        self.min_items = self.min_items.or(other.min_items);
        self.max_items = self.max_items.or(other.max_items);
        if self.pattern.is_none() {
            self.pattern = other.pattern.clone();
        }

        let mut tags: Vec<String> = self
            .validation_tags
            .iter()
            .filter(|t| !is_presence_tag(t))
            .cloned()
            .collect();
        for tag in other.validation_tags.iter().filter(|t| !is_presence_tag(t)) {
            if !tags.iter().any(|t| tag_family(t) == tag_family(tag)) {
                tags.push(tag.clone());
            }
        }
        self.validation_tags = order_tags(self.required, tags);
    }

    fn render_tags(&self, numeric: Numeric) -> Vec<String> {
        let mut tags = Vec::new();
        if let Some(b) = self.minimum {
            if let Some(v) = format_bound(b.value, numeric) {
                tags.push(format!("{}={}", if b.exclusive { "gt" } else { "gte" }, v));
            }
        }
        if let Some(b) = self.maximum {
            if let Some(v) = format_bound(b.value, numeric) {
                tags.push(format!("{}={}", if b.exclusive { "lt" } else { "lte" }, v));
            }
        }
        if let Some(n) = self.min_length.or(self.min_items) {
            tags.push(format!("min={}", n));
        }
        if let Some(n) = self.max_length.or(self.max_items) {
            tags.push(format!("max={}", n));
        }
        order_tags(self.required, tags)
    }
}

fn numeric_kind(schema: &Value) -> Numeric {
    let types = declared_types(schema);
    if types.contains(&"integer") {
        Numeric::Integer
    } else if types.contains(&"number") {
        Numeric::Number
    } else {
        Numeric::Other
    }
}

/// Reads both the 3.0 form (`minimum` + boolean `exclusiveMinimum`) and the
/// 3.1 form (numeric `exclusiveMinimum`).
fn bound(schema: &Value, key: &str, exclusive_key: &str) -> Option<Bound> {
    let inclusive = schema.get(key).and_then(Value::as_f64);
    match schema.get(exclusive_key) {
        Some(Value::Number(n)) => n.as_f64().map(|value| Bound {
            value,
            exclusive: true,
        }),
        Some(Value::Bool(exclusive)) => inclusive.map(|value| Bound {
            value,
            exclusive: *exclusive,
        }),
        _ => inclusive.map(|value| Bound {
            value,
            exclusive: false,
        }),
    }
}

fn format_bound(value: f64, numeric: Numeric) -> Option<String> {
    match numeric {
        Numeric::Integer => Some(format!("{}", value.trunc() as i64)),
        Numeric::Number => Some(format!("{}", value)),
        Numeric::Other => None,
    }
}

fn is_presence_tag(tag: &str) -> bool {
    tag == "required" || tag == "omitempty"
}

fn tag_family(tag: &str) -> &str {
    match tag.split('=').next().unwrap_or(tag) {
        "gt" | "gte" => "lower",
        "lt" | "lte" => "upper",
        other => other,
    }
}

/// `required` first, else `omitempty` when anything else is present, then
/// the remaining tags sorted.
fn order_tags(required: bool, mut tags: Vec<String>) -> Vec<String> {
    tags.sort();
    tags.dedup();
    if required {
        tags.insert(0, "required".to_string());
    } else if !tags.is_empty() {
        tags.insert(0, "omitempty".to_string());
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_string_with_lengths() {
        let schema = json!({ "type": "string", "minLength": 1, "maxLength": 64 });
        let c = Constraints::for_property(&schema, true, false);
        assert!(c.required);
        assert!(!c.nullable);
        assert_eq!(c.validation_tags, vec!["required", "max=64", "min=1"]);
    }

    #[test]
    fn optional_property_is_nullable() {
        let schema = json!({ "type": "string" });
        let c = Constraints::for_property(&schema, false, false);
        assert!(c.nullable);
        assert!(c.validation_tags.is_empty());
    }

    #[test]
    fn required_nullable_flag() {
        let schema = json!({ "type": "string", "nullable": true });
        assert!(Constraints::for_property(&schema, true, false).nullable);

        let schema = json!({ "type": ["string", "null"] });
        assert!(Constraints::for_property(&schema, true, false).nullable);

        let schema = json!({ "type": "string" });
        assert!(Constraints::for_property(&schema, true, true).nullable);
    }

    #[test]
    fn integer_bounds_render_as_integers() {
        let schema = json!({ "type": "integer", "minimum": 1, "maximum": 100 });
        let c = Constraints::for_property(&schema, true, false);
        assert_eq!(c.validation_tags, vec!["required", "gte=1", "lte=100"]);
    }

    #[test]
    fn number_bounds_and_omitempty() {
        let schema = json!({ "type": "number", "minimum": 0.5, "maximum": 10 });
        let c = Constraints::for_property(&schema, false, false);
        assert_eq!(c.validation_tags, vec!["omitempty", "gte=0.5", "lte=10"]);
    }

    #[test]
    fn exclusive_bounds_both_forms() {
        let schema = json!({
            "type": "integer",
            "minimum": 0,
            "exclusiveMinimum": true,
            "exclusiveMaximum": 10
        });
        let c = Constraints::for_property(&schema, true, false);
        assert_eq!(c.validation_tags, vec!["required", "gt=0", "lt=10"]);
        assert_eq!(
            c.maximum,
            Some(Bound {
                value: 10.0,
                exclusive: true
            })
        );
    }

    #[test]
    fn bounds_on_untyped_schema_are_kept_but_not_tagged() {
        let schema = json!({ "minimum": 3 });
        let c = Constraints::for_schema(&schema);
        assert!(c.minimum.is_some());
        assert!(c.validation_tags.is_empty());
    }

    #[test]
    fn array_item_counts() {
        let schema = json!({ "type": "array", "minItems": 1, "maxItems": 5 });
        let c = Constraints::for_property(&schema, true, false);
        assert_eq!(c.validation_tags, vec!["required", "max=5", "min=1"]);
    }

    #[test]
    fn read_write_only() {
        let schema = json!({ "type": "string", "readOnly": true });
        let c = Constraints::for_schema(&schema);
        assert!(c.read_only);
        assert!(!c.write_only);
    }

    #[test]
    fn strictness_counts_active_fields() {
        let loose = Constraints::for_schema(&json!({ "type": "string" }));
        let strict = Constraints::for_schema(&json!({
            "type": "string", "minLength": 1, "pattern": "^[a-z]+$"
        }));
        assert_eq!(loose.strictness(), 0);
        assert_eq!(strict.strictness(), 2);
    }

    #[test]
    fn absorb_fills_missing_bounds() {
        let mut outer = Constraints::for_property(&json!({}), true, true);
        let inner = Constraints::for_schema(&json!({ "type": "integer", "minimum": 1 }));
        outer.absorb(&inner);
        assert_eq!(outer.minimum.map(|b| b.value), Some(1.0));
        assert!(outer.nullable);
        assert_eq!(outer.validation_tags, vec!["required", "gte=1"]);
    }
}
