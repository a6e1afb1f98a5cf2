//! Schema IR builder.
//!
//! Resolution order for one node: a bare `$ref` becomes an alias, combinators
//! go to the combinator resolver, `x-type-override` replaces the type, and
//! everything else is classified as record, enum or primitive. Inline records
//! and unions met below the top level are hoisted into named definitions.

use serde_json::{json, Map, Value};

use crate::combinator::{create_from_combinator, Combined};
use crate::constraints::Constraints;
use crate::context::{Context, Site};
use crate::error::CompileError;
use crate::extensions::SchemaExtensions;
use crate::ir::{render_array, render_map, EnumValue, Property, SchemaIr, SpecLocation, ANY, EMPTY_RECORD};
use crate::naming::{component_schema_name, generate_type_name, ref_to_type_name, to_type_name};
use crate::schema::{
    self, declared_types, flag, has_null_type, is_bare_reference, is_nullable, properties,
    required_names, schema_type, string_field, METADATA_KEYS,
};

/// Resolve `node` at `site`. A missing node accepts anything.
pub(crate) fn generate_ir(
    ctx: &mut Context<'_>,
    node: Option<&Value>,
    site: &Site,
) -> Result<SchemaIr, CompileError> {
    let Some(node) = node else {
        return Ok(SchemaIr::any());
    };
    ctx.enter(site)?;
    let result = build(ctx, node, site);
    ctx.leave();
    result
}

fn build(ctx: &mut Context<'_>, node: &Value, site: &Site) -> Result<SchemaIr, CompileError> {
    // `true`, `false` and other non-object schemas carry no structure.
    if !node.is_object() {
        return Ok(SchemaIr::any());
    }

    if let Some(reference) = &site.reference {
        return reference_ir(ctx, node, reference, site);
    }
    if let Some(reference) = schema::reference(node) {
        if is_bare_reference(node) {
            return reference_ir(ctx, node, reference, site);
        }
        let expanded = expand_ref_overrides(node);
        return build(ctx, &expanded, site);
    }

    let extensions = SchemaExtensions::from_node(node, &site.display())?;

    let overridden = extensions.type_override.is_some();

    // An override still replaces a resolved union or merge; only an alias
    // result is final.
    let partial = match create_from_combinator(ctx, node, site)? {
        Some(Combined::Complete(mut ir))
            if (!ir.is_zero() && ir.define_via_alias) || !overridden =>
        {
            ir.constraints.nullable |= is_nullable(node);
            if ir.description.is_none() {
                ir.description = description(node);
            }
            ir.source = Some(node.clone());
            return Ok(ir);
        }
        Some(Combined::Complete(ir)) | Some(Combined::Partial(ir)) => Some(ir),
        None => None,
    };

    let mut ir = match &extensions.type_override {
        Some(decl) => SchemaIr {
            type_decl: decl.clone(),
            define_via_alias: true,
            ..SchemaIr::default()
        },
        None => classify(ctx, node, site, &extensions)?,
    };

    if let Some(partial) = partial {
        enhance(&mut ir, partial, overridden);
    }
    finish(&mut ir, node);
    Ok(ir)
}

fn classify(
    ctx: &mut Context<'_>,
    node: &Value,
    site: &Site,
    extensions: &SchemaExtensions,
) -> Result<SchemaIr, CompileError> {
    let types = schema_type(node);
    let has_enum = node.get("enum").is_some();
    match types.as_slice() {
        [] if has_enum => Ok(enum_ir(node, None, extensions)),
        [] | ["object"] => object_ir(ctx, node, site),
        [ty] if has_enum => Ok(enum_ir(node, Some(*ty), extensions)),
        [ty] => primitive_ir(ctx, node, ty, site),
        // Several non-null types in an OpenAPI 3.1 type list.
        _ => Ok(SchemaIr::any()),
    }
}

/// Merge combinator results into the node's own IR.
fn enhance(ir: &mut SchemaIr, partial: SchemaIr, keep_decl: bool) {
    ir.properties.extend(partial.properties);
    if partial.discriminator.is_some() {
        ir.discriminator = partial.discriminator;
    }
    if !partial.union_elements.is_empty() {
        ir.union_elements = partial.union_elements;
    }
    ir.additional_types.extend(partial.additional_types);
    if !ir.properties.is_empty() {
        ir.define_via_alias = false;
    }
    if !keep_decl {
        ir.refresh_type_decl();
    }
}

fn finish(ir: &mut SchemaIr, node: &Value) {
    if ir.description.is_none() {
        ir.description = description(node);
    }
    let mut constraints = Constraints::for_schema(node);
    constraints.absorb(&ir.constraints);
    ir.constraints = constraints;
    ir.source = Some(node.clone());
}

fn description(node: &Value) -> Option<String> {
    string_field(node, "description").map(String::from)
}

/// `{$ref, required: [..]}` is read as `allOf: [{$ref}, {required: [..]}]`.
/// Metadata stays on the outer node.
fn expand_ref_overrides(node: &Value) -> Value {
    let mut outer = Map::new();
    let mut target = Map::new();
    let mut siblings = Map::new();
    if let Some(obj) = node.as_object() {
        for (key, value) in obj {
            if key == "$ref" {
                target.insert(key.clone(), value.clone());
            } else if key == "nullable" || key.starts_with("x-") || METADATA_KEYS.contains(&key.as_str()) {
                outer.insert(key.clone(), value.clone());
            } else {
                siblings.insert(key.clone(), value.clone());
            }
        }
    }
    outer.insert("allOf".to_string(), json!([target, siblings]));
    Value::Object(outer)
}

fn reference_ir(
    ctx: &mut Context<'_>,
    node: &Value,
    reference: &str,
    site: &Site,
) -> Result<SchemaIr, CompileError> {
    let mut ir = if component_schema_name(reference).is_some() {
        SchemaIr::alias(ctx.component_type_name(reference, site)?)
    } else if reference.starts_with("#/") {
        path_reference(ctx, reference, site)?
    } else {
        return Err(CompileError::UnresolvableReference {
            reference: reference.to_string(),
            path: site.display(),
        });
    };

    ir.constraints.nullable |= is_nullable(node);
    if ir.description.is_none() {
        ir.description = description(node);
    }
    if ir.source.is_none() {
        ir.source = Some(node.clone());
    }
    Ok(ir)
}

/// A reference into an arbitrary document path. The target is defined once
/// under a name derived from the pointer and shared by every reference to it.
fn path_reference(
    ctx: &mut Context<'_>,
    reference: &str,
    site: &Site,
) -> Result<SchemaIr, CompileError> {
    let target = ctx.resolve_ref(reference, site)?;
    let name = ref_to_type_name(reference);

    let known = ctx
        .registry
        .get(&name)
        .is_some_and(|d| d.schema.source.as_ref() == Some(target));
    if known || !ctx.begin_expansion(reference) {
        return Ok(SchemaIr::reference(name));
    }

    let target_site = Site::new(vec![name.clone()]).with_base_name(name);
    let built = generate_ir(ctx, Some(target), &target_site);
    ctx.end_expansion(reference);
    ctx.define(built?, &target_site, SpecLocation::Schema)
}

fn object_ir(ctx: &mut Context<'_>, node: &Value, site: &Site) -> Result<SchemaIr, CompileError> {
    let mut ir = SchemaIr::default();
    let required = required_names(node);

    if let Some(props) = properties(node) {
        for (name, prop) in props {
            let is_required = required.contains(&name.as_str());
            ir.properties
                .push(build_property(ctx, name, prop, is_required, site)?);
        }
    }

    let additional = match node.get("additionalProperties") {
        Some(Value::Bool(true)) => Some(SchemaIr::any()),
        Some(Value::Object(obj)) if obj.is_empty() => Some(SchemaIr::any()),
        Some(value @ Value::Object(_)) => {
            let child = site.child("AdditionalProperties");
            let value_ir = generate_ir(ctx, Some(value), &child)?;
            Some(ctx.hoist(value_ir, &child, SpecLocation::Property)?)
        }
        _ => None,
    };
    let closed = matches!(node.get("additionalProperties"), Some(Value::Bool(false)));

    if !ir.properties.is_empty() {
        if let Some(value) = additional {
            ir.has_additional_properties = true;
            ir.additional_properties = Some(Box::new(value));
        }
        ir.refresh_type_decl();
        return Ok(ir);
    }

    match additional {
        Some(value) => {
            ir.type_decl = render_map(&value);
            ir.has_additional_properties = true;
            ir.additional_properties = Some(Box::new(value));
        }
        None if closed || node.get("properties").is_some() => {
            ir.type_decl = EMPTY_RECORD.to_string();
        }
        None if declared_types(node) == ["object"] => {
            let value = SchemaIr::any();
            ir.type_decl = render_map(&value);
            ir.has_additional_properties = true;
            ir.additional_properties = Some(Box::new(value));
        }
        None => ir.type_decl = ANY.to_string(),
    }
    Ok(ir)
}

fn build_property(
    ctx: &mut Context<'_>,
    name: &str,
    node: &Value,
    required: bool,
    site: &Site,
) -> Result<Property, CompileError> {
    let child = site.child(name);
    let ir = generate_ir(ctx, Some(node), &child)?;
    let ir = ctx.hoist(ir, &child, SpecLocation::Property)?;
    let resolved = ctx.deref(node, &child)?;
    let extensions = SchemaExtensions::from_node(node, &child.display())?;

    let nil = ir.constraints.nullable || is_nullable(node) || has_null_type(resolved);
    let mut constraints = Constraints::for_property(resolved, required, nil);
    constraints.absorb(&ir.constraints);

    Ok(Property {
        field_name: extensions
            .type_name
            .clone()
            .unwrap_or_else(|| to_type_name(name)),
        wire_name: Some(name.to_string()),
        description: description(node).or_else(|| description(resolved)),
        deprecated: flag(node, "deprecated") || flag(resolved, "deprecated"),
        schema: ir,
        constraints,
        extensions,
    })
}

fn enum_ir(node: &Value, declared: Option<&str>, extensions: &SchemaExtensions) -> SchemaIr {
    let values = node
        .get("enum")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let base = declared.or_else(|| infer_scalar_type(values));
    let decl = base
        .and_then(|ty| scalar_decl(ty, string_field(node, "format")))
        .unwrap_or(ANY);
    let mut ir = SchemaIr::new(decl);

    let mut names: Vec<String> = Vec::new();
    for (i, value) in values.iter().enumerate() {
        if value.is_null() {
            ir.constraints.nullable = true;
            continue;
        }
        let base_name = match (extensions.enum_names.get(i), value) {
            (Some(explicit), _) => explicit.clone(),
            (None, Value::String(s)) => to_type_name(s),
            (None, other) => to_type_name(&format!("value {}", other)),
        };
        let name = generate_type_name(|n| names.iter().any(|t| t == n), &base_name, &[]);
        names.push(name.clone());
        ir.enum_values.push(EnumValue {
            name,
            value: value.clone(),
        });
    }
    ir
}

fn infer_scalar_type(values: &[Value]) -> Option<&'static str> {
    match values.iter().find(|v| !v.is_null())? {
        Value::String(_) => Some("string"),
        Value::Bool(_) => Some("boolean"),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some("integer"),
        Value::Number(_) => Some("number"),
        _ => None,
    }
}

fn primitive_ir(
    ctx: &mut Context<'_>,
    node: &Value,
    ty: &str,
    site: &Site,
) -> Result<SchemaIr, CompileError> {
    if ty == "array" {
        let child = site.child("Item");
        let item = generate_ir(ctx, node.get("items"), &child)?;
        let item = ctx.hoist(item, &child, SpecLocation::Property)?;
        let mut ir = SchemaIr::new(render_array(&item));
        ir.array_type = Some(Box::new(item));
        return Ok(ir);
    }

    match scalar_decl(ty, string_field(node, "format")) {
        Some(decl) => Ok(SchemaIr::new(decl)),
        None => Err(CompileError::UnsupportedType {
            path: site.display(),
            type_name: ty.to_string(),
        }),
    }
}

/// Type-decl of a scalar type, refined by its format.
fn scalar_decl(ty: &str, format: Option<&str>) -> Option<&'static str> {
    let decl = match (ty, format) {
        ("string", Some("date")) => "date",
        ("string", Some("date-time")) => "date-time",
        ("string", Some("time")) => "time",
        ("string", Some("uuid")) => "uuid",
        ("string", Some("email")) => "email",
        ("string", Some("uri" | "url")) => "uri",
        ("string", Some("binary")) => "binary",
        ("string", Some("byte")) => "bytes",
        ("string", _) => "string",
        ("integer", Some("int32")) => "int32",
        ("integer", Some("int64")) => "int64",
        ("integer", _) => "integer",
        ("number", Some("float")) => "float",
        ("number", Some("double")) => "double",
        ("number", _) => "number",
        ("boolean", _) => "boolean",
        _ => return None,
    };
    Some(decl)
}
