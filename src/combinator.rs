//! allOf / anyOf / oneOf resolution.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::builder::generate_ir;
use crate::constraints::Constraints;
use crate::context::{Context, Site, MAX_DEPTH};
use crate::error::CompileError;
use crate::ir::{is_primitive, Discriminator, Property, SchemaIr, SpecLocation, UnionElement, EMPTY_RECORD};
use crate::merge::merge_schemas;
use crate::naming::{component_reference, component_schema_name, ref_object_name};
use crate::schema::{
    self, is_bare_reference, is_metadata_only, is_null_only, members, properties, string_field,
};

/// Keys that give a node fields of its own next to anyOf/oneOf. A bare
/// `type: object` next to a oneOf does not count.
const FIELD_KEYS: &[&str] = &["properties", "items", "additionalProperties", "enum", "const"];

/// Outcome of combinator resolution.
pub(crate) enum Combined {
    /// The combinators describe the whole node.
    Complete(SchemaIr),
    /// Mixin fields (and union elements) to add to the node's own IR.
    Partial(SchemaIr),
}

/// Resolve the combinators of `node`, if it has any.
pub(crate) fn create_from_combinator(
    ctx: &mut Context<'_>,
    node: &Value,
    site: &Site,
) -> Result<Option<Combined>, CompileError> {
    let all_of = members(node, "allOf");
    let any_of = members(node, "anyOf");
    let one_of = members(node, "oneOf");
    if all_of.is_empty() && any_of.is_empty() && one_of.is_empty() {
        return Ok(None);
    }

    let has_fields = FIELD_KEYS.iter().any(|k| node.get(*k).is_some());
    match (all_of.is_empty(), any_of.is_empty(), one_of.is_empty()) {
        (false, true, true) => merge_all_of(ctx, node, all_of, true, site).map(Some),
        (true, false, true) if !has_fields => {
            generate_union(ctx, node, any_of, site).map(|ir| Some(Combined::Complete(ir)))
        }
        (true, true, false) if !has_fields => {
            generate_union(ctx, node, one_of, site).map(|ir| Some(Combined::Complete(ir)))
        }
        _ => mixed(ctx, node, all_of, any_of, one_of, site).map(|ir| Some(Combined::Partial(ir))),
    }
}

/// A node that combines several combinator kinds, or a union with fields of
/// its own. Every part becomes a mixin field of the node's record.
fn mixed(
    ctx: &mut Context<'_>,
    node: &Value,
    all_of: &[Value],
    any_of: &[Value],
    one_of: &[Value],
    site: &Site,
) -> Result<SchemaIr, CompileError> {
    let mut ir = SchemaIr::default();

    if !all_of.is_empty() {
        match merge_all_of(ctx, node, all_of, false, site)? {
            Combined::Complete(merged) => match &merged.ref_type {
                Some(name) => ir.properties.push(Property::mixin(name.clone(), false)),
                None => {
                    ir.properties.extend(merged.properties);
                    ir.additional_types.extend(merged.additional_types);
                }
            },
            Combined::Partial(partial) => ir.properties.extend(partial.properties),
        }
    }

    for (kind, elements) in [("AnyOf", any_of), ("OneOf", one_of)] {
        if elements.is_empty() {
            continue;
        }
        let union_site = site.extend(kind);
        let union = generate_union(ctx, node, elements, &union_site)?;
        let union = ctx.hoist(union, &union_site, SpecLocation::Union)?;
        if let Some(name) = &union.ref_type {
            ir.properties.push(Property::mixin(name.clone(), true));
        }
        ir.additional_types.extend(union.additional_types);
    }

    ir.refresh_type_decl();
    Ok(ir)
}

/// Merge allOf members into one schema.
///
/// Members that carry a union are kept apart as mixin fields. A single
/// `$ref` next to metadata-only members resolves to the reference itself.
/// Otherwise members are dereferenced, flattened and merged left to right,
/// starting from the node's own fields when `with_own` is set.
fn merge_all_of(
    ctx: &mut Context<'_>,
    node: &Value,
    all_of: &[Value],
    with_own: bool,
    site: &Site,
) -> Result<Combined, CompileError> {
    let mut seen = Vec::new();
    let mut has_union = false;
    for member in all_of {
        if contains_union(ctx, member, site, &mut seen)? {
            has_union = true;
            break;
        }
    }
    if has_union {
        return mixin_members(ctx, all_of, site).map(Combined::Partial);
    }

    let own = if with_own { own_fields(node) } else { None };
    let refs: Vec<&Value> = all_of
        .iter()
        .filter(|m| schema::reference(m).is_some())
        .collect();
    let rest_is_metadata = all_of
        .iter()
        .all(|m| schema::reference(m).is_some() || is_metadata_only(m));
    if own.is_none() && refs.len() == 1 && rest_is_metadata {
        let member = refs[0];
        if let Some(reference) = schema::reference(member) {
            let ir = generate_ir(ctx, Some(member), &site.with_reference(reference))?;
            return Ok(Combined::Complete(ir));
        }
    }

    let mut flat = Vec::new();
    let mut last_ref = None;
    flatten(ctx, all_of, site, &mut flat, &mut last_ref, 0)?;

    let mut merged = own;
    for member in &flat {
        let next = merge_schemas(merged, member).map_err(|conflict| {
            CompileError::IncompatibleMerge {
                path: site.display(),
                conflict,
            }
        })?;
        merged = Some(next);
    }
    let merged = Value::Object(merged.unwrap_or_default());

    // A component narrowed by bounds alone stays that component.
    if let Some(reference) = last_ref.filter(|r| component_schema_name(r).is_some()) {
        if schema::properties(&merged).is_none() && !has_union_keys(&merged) {
            let mut ir = SchemaIr::alias(ctx.component_type_name(&reference, site)?);
            ir.constraints = Constraints::for_schema(&merged);
            return Ok(Combined::Complete(ir));
        }
    }

    generate_ir(ctx, Some(&merged), site).map(Combined::Complete)
}

/// The node without its allOf, when it has fields of its own.
fn own_fields(node: &Value) -> Option<Map<String, Value>> {
    let mut own = node.as_object()?.clone();
    own.shift_remove("allOf");
    let structural = own.keys().any(|k| {
        !k.starts_with("x-")
            && k != "nullable"
            && k != "discriminator"
            && !schema::METADATA_KEYS.contains(&k.as_str())
    });
    structural.then_some(own)
}

fn has_union_keys(node: &Value) -> bool {
    !members(node, "anyOf").is_empty() || !members(node, "oneOf").is_empty()
}

/// Whether `node`, after following references and nested allOf members,
/// declares an anyOf or oneOf.
fn contains_union(
    ctx: &Context<'_>,
    node: &Value,
    site: &Site,
    seen: &mut Vec<String>,
) -> Result<bool, CompileError> {
    if let Some(reference) = schema::reference(node) {
        if seen.iter().any(|r| r == reference) {
            return Ok(false);
        }
        seen.push(reference.to_string());
    }
    let node = ctx.deref(node, site)?;
    if has_union_keys(node) {
        return Ok(true);
    }
    for member in members(node, "allOf") {
        if contains_union(ctx, member, site, seen)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Dereference members and inline nested allOf lists. The node's own fields
/// come before its nested members.
fn flatten(
    ctx: &Context<'_>,
    all_of: &[Value],
    site: &Site,
    out: &mut Vec<Value>,
    last_ref: &mut Option<String>,
    depth: usize,
) -> Result<(), CompileError> {
    if depth > MAX_DEPTH {
        return Err(CompileError::RecursionLimitExceeded {
            path: site.display(),
            limit: MAX_DEPTH,
        });
    }
    for member in all_of {
        if depth == 0 {
            if let Some(reference) = schema::reference(member) {
                *last_ref = Some(reference.to_string());
            }
        }
        let resolved = ctx.deref(member, site)?;
        let nested = members(resolved, "allOf");
        if nested.is_empty() {
            out.push(resolved.clone());
            continue;
        }
        if let Some(mut own) = resolved.as_object().cloned() {
            own.shift_remove("allOf");
            if !own.is_empty() {
                out.push(Value::Object(own));
            }
        }
        flatten(ctx, nested, site, out, last_ref, depth + 1)?;
    }
    Ok(())
}

/// One mixin field per allOf member. References are embedded as they are;
/// inline members get their own definition.
fn mixin_members(
    ctx: &mut Context<'_>,
    all_of: &[Value],
    site: &Site,
) -> Result<SchemaIr, CompileError> {
    let mut ir = SchemaIr::default();
    for (i, member) in all_of.iter().enumerate() {
        if is_metadata_only(member) {
            continue;
        }
        let member_site = site.child("AllOf").child(i.to_string());
        let member_ir = generate_ir(ctx, Some(member), &member_site)?;

        if is_bare_reference(member) {
            if let Some(name) = &member_ir.ref_type {
                ir.properties.push(Property::mixin(name.clone(), false));
            }
            continue;
        }

        let member_ir = if member_ir.is_ref() {
            member_ir
        } else if member_ir.needs_hoisting() {
            ctx.define(member_ir, &member_site, SpecLocation::Merge)?
        } else {
            continue;
        };
        if let Some(name) = &member_ir.ref_type {
            ir.properties.push(Property::mixin(name.clone(), true));
        }
        ir.additional_types.extend(member_ir.additional_types);
    }
    ir.refresh_type_decl();
    Ok(ir)
}

/// Build a union from anyOf/oneOf `elements` of `node`.
pub(crate) fn generate_union(
    ctx: &mut Context<'_>,
    node: &Value,
    elements: &[Value],
    site: &Site,
) -> Result<SchemaIr, CompileError> {
    let discriminator = node.get("discriminator");
    let property = discriminator.and_then(|d| string_field(d, "propertyName"));
    let explicit = explicit_mapping(discriminator);
    let is_self_ref = |element: &Value| match (schema::reference(element), &site.defining) {
        (Some(r), Some(defining)) => r == defining,
        _ => false,
    };

    if elements.len() == 1 && property.is_none() && !is_self_ref(&elements[0]) {
        return generate_ir(ctx, Some(&elements[0]), site);
    }

    let mut non_null = Vec::with_capacity(elements.len());
    for element in elements {
        if !is_null_only(ctx.deref(element, site)?) {
            non_null.push(element);
        }
    }
    let has_null = non_null.len() < elements.len();

    if non_null.is_empty() {
        let mut ir = SchemaIr::any();
        ir.constraints.nullable = true;
        return Ok(ir);
    }
    if non_null.len() == 1 && property.is_none() && !is_self_ref(non_null[0]) {
        let mut ir = generate_ir(ctx, Some(non_null[0]), site)?;
        if has_null {
            ir.constraints.nullable = true;
        }
        return Ok(ir);
    }

    let mut resolved: Vec<UnionElement> = Vec::with_capacity(non_null.len());
    let mut mapping = BTreeMap::new();
    for (i, &element) in non_null.iter().enumerate() {
        let element_site = site.child(i.to_string());
        let ir = generate_ir(ctx, Some(element), &element_site)?;
        if ir.type_decl == EMPTY_RECORD {
            continue;
        }
        let ir = if !ir.is_ref() && (!is_primitive(&ir.type_decl) || !ir.enum_values.is_empty()) {
            ctx.define(ir, &element_site, SpecLocation::Union)?
        } else {
            ir
        };
        let type_name = ir.ref_type.clone().unwrap_or_else(|| ir.type_decl.clone());

        if let Some(property) = property {
            map_element(
                ctx,
                element,
                &type_name,
                property,
                &explicit,
                &element_site,
                &mut mapping,
            )?;
        }
        resolved.push(UnionElement {
            type_name,
            schema: ir,
        });
    }

    let elements = dedup_elements(resolved);

    if property.is_some() {
        let mapped: BTreeSet<&String> = mapping.values().collect();
        let unmapped: Vec<String> = elements
            .iter()
            .filter(|e| !mapped.contains(&e.type_name))
            .map(|e| e.type_name.clone())
            .collect();
        if !unmapped.is_empty() {
            return Err(CompileError::DiscriminatorNotAllMapped {
                path: site.display(),
                unmapped,
            });
        }
    }

    if elements.is_empty() {
        let mut ir = SchemaIr::new(EMPTY_RECORD);
        ir.constraints.nullable = has_null;
        return Ok(ir);
    }

    let mut ir = SchemaIr::default();
    ir.union_elements = elements;
    ir.discriminator = property.map(|p| Discriminator {
        property: p.to_string(),
        mapping,
    });
    ir.constraints.nullable = has_null;
    ir.refresh_type_decl();
    Ok(ir)
}

/// Declared mapping with every target normalized to a component reference.
fn explicit_mapping(discriminator: Option<&Value>) -> BTreeMap<String, String> {
    let Some(mapping) = discriminator
        .and_then(|d| d.get("mapping"))
        .and_then(Value::as_object)
    else {
        return BTreeMap::new();
    };
    mapping
        .iter()
        .filter_map(|(value, target)| {
            let target = target.as_str()?;
            let target = if target.starts_with('#') {
                target.to_string()
            } else {
                component_reference("schemas", target)
            };
            Some((value.clone(), target))
        })
        .collect()
}

/// Record the discriminator values that select `element`.
///
/// Every explicit mapping entry pointing at the element's reference counts.
/// Without one, an inline element contributes the single enum (or const)
/// value of its discriminator property, and a referenced element contributes
/// its component name when no mapping is declared at all.
fn map_element(
    ctx: &Context<'_>,
    element: &Value,
    type_name: &str,
    property: &str,
    explicit: &BTreeMap<String, String>,
    site: &Site,
    mapping: &mut BTreeMap<String, String>,
) -> Result<(), CompileError> {
    let reference = schema::reference(element);
    let mut mapped = false;
    if let Some(reference) = reference {
        for (value, target) in explicit {
            if target == reference {
                mapping.insert(value.clone(), type_name.to_string());
                mapped = true;
            }
        }
    }
    if mapped {
        return Ok(());
    }

    match reference {
        None => match discriminator_value(ctx, element, property, site, 0)? {
            Some(value) => {
                mapping.insert(value, type_name.to_string());
            }
            None if !explicit.is_empty() => {
                return Err(CompileError::AmbiguousDiscriminatorMapping {
                    path: site.display(),
                    property: property.to_string(),
                });
            }
            None => {}
        },
        Some(reference) if explicit.is_empty() => {
            mapping.insert(ref_object_name(reference), type_name.to_string());
        }
        Some(_) => {}
    }
    Ok(())
}

/// The single value the element's discriminator property can take, looking
/// through its allOf members.
fn discriminator_value(
    ctx: &Context<'_>,
    element: &Value,
    property: &str,
    site: &Site,
    depth: usize,
) -> Result<Option<String>, CompileError> {
    if depth > MAX_DEPTH {
        return Ok(None);
    }
    let node = ctx.deref(element, site)?;
    if let Some(prop) = properties(node).and_then(|p| p.get(property)) {
        let prop = ctx.deref(prop, site)?;
        if let Some(value) = prop.get("const") {
            return Ok(Some(scalar_string(value)));
        }
        if let Some(Value::Array(values)) = prop.get("enum") {
            return Ok(match values.as_slice() {
                [value] => Some(scalar_string(value)),
                _ => None,
            });
        }
    }
    for member in members(node, "allOf") {
        if let Some(value) = discriminator_value(ctx, member, property, site, depth + 1)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Collapse elements with the same type name, keeping the one with more
/// active constraints. Ties keep the first.
fn dedup_elements(elements: Vec<UnionElement>) -> Vec<UnionElement> {
    let mut out: Vec<UnionElement> = Vec::with_capacity(elements.len());
    for element in elements {
        match out.iter_mut().find(|e| e.type_name == element.type_name) {
            Some(existing) => {
                if element.schema.constraints.strictness() > existing.schema.constraints.strictness() {
                    *existing = element;
                }
            }
            None => out.push(element),
        }
    }
    out
}
