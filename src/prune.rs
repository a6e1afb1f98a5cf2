//! Removal of components no retained operation can reach.
//!
//! The first pass strips what the compiler never reads: webhooks, security
//! schemes, example values and extensions outside the allow-list. After that
//! the reference set is recomputed and unreferenced components are deleted
//! until a pass deletes nothing.

use std::collections::{BTreeSet, VecDeque};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::CompileError;
use crate::naming::{component_reference, parent_component_reference};
use crate::types::{PruneOptions, PruneStrategy, HTTP_METHODS, PRUNABLE_COMPONENTS};

/// Component kinds whose bodies count as referrers.
const REFERRING_COMPONENTS: &[&str] = &["schemas", "parameters", "requestBodies", "responses", "headers"];

/// Keys holding instance data rather than schema structure.
const DATA_KEYS: &[&str] = &["example", "examples", "default", "const", "enum"];

/// Keywords whose value maps user-chosen names (property names, status
/// codes, media types) to nested objects. Their keys are never keywords.
const NAMED_MAPS: &[&str] = &[
    "properties",
    "patternProperties",
    "definitions",
    "$defs",
    "dependentSchemas",
    "responses",
    "content",
    "headers",
    "encoding",
    "links",
    "callbacks",
];

/// What a pruning run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Reference passes run, including the final one that deleted nothing.
    pub iterations: usize,
    /// References of the deleted components, in deletion order.
    pub removed: Vec<String>,
}

/// Prune `document` in place.
///
/// # Errors
///
/// Returns `CompileError::PruneIterationLimitExceeded` if the fixed-point
/// strategy has not settled after `options.max_iterations` passes.
pub fn prune(document: &mut Value, options: &PruneOptions) -> Result<PruneReport, CompileError> {
    if !document.is_object() {
        return Ok(PruneReport::default());
    }

    Cleanup {
        allowed: &options.allowed_extensions,
    }
    .document(document);

    match options.strategy {
        PruneStrategy::FixedPoint => fixed_point(document, options.max_iterations),
        PruneStrategy::Reachability => sweep_unreachable(document),
    }
}

fn fixed_point(document: &mut Value, max_iterations: usize) -> Result<PruneReport, CompileError> {
    let mut report = PruneReport::default();
    loop {
        if report.iterations >= max_iterations {
            return Err(CompileError::PruneIterationLimitExceeded {
                limit: max_iterations,
            });
        }
        report.iterations += 1;

        let refs = referenced(document);
        let removed = remove_components(document, |reference| refs.contains(reference));
        debug!(iteration = report.iterations, removed = removed.len(), "prune pass");
        if removed.is_empty() {
            return Ok(report);
        }
        report.removed.extend(removed);
    }
}

/// Mark everything reachable from the paths, then sweep once.
fn sweep_unreachable(document: &mut Value) -> Result<PruneReport, CompileError> {
    let mut roots = RefSet::default();
    if let Some(paths) = document.get("paths") {
        roots.walk(paths);
    }

    let mut reachable = BTreeSet::new();
    let mut queue: VecDeque<String> = roots.refs.into_iter().collect();
    while let Some(reference) = queue.pop_front() {
        if !reachable.insert(reference.clone()) {
            continue;
        }
        let Some(target) = reference
            .strip_prefix('#')
            .and_then(|pointer| document.pointer(pointer))
        else {
            continue;
        };
        let mut found = RefSet::default();
        found.walk(target);
        queue.extend(found.refs.into_iter().filter(|r| !reachable.contains(r)));
    }

    let removed = remove_components(document, |reference| reachable.contains(reference));
    debug!(removed = removed.len(), reachable = reachable.len(), "reachability sweep");
    Ok(PruneReport {
        iterations: 1,
        removed,
    })
}

/// References made by operations and by the bodies of referring components.
fn referenced(document: &Value) -> BTreeSet<String> {
    let mut set = RefSet::default();
    if let Some(paths) = document.get("paths") {
        set.walk(paths);
    }
    if let Some(components) = document.get("components") {
        for kind in REFERRING_COMPONENTS {
            if let Some(entries) = components.get(*kind).and_then(Value::as_object) {
                for body in entries.values() {
                    set.walk(body);
                }
            }
        }
    }
    set.refs
}

/// Delete components for which `keep` is false. Returns their references.
fn remove_components<F>(document: &mut Value, keep: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let mut removed = Vec::new();
    let Some(components) = document.get_mut("components").and_then(Value::as_object_mut) else {
        return removed;
    };
    for kind in PRUNABLE_COMPONENTS {
        let Some(entries) = components.get_mut(*kind).and_then(Value::as_object_mut) else {
            continue;
        };
        let doomed: Vec<String> = entries
            .keys()
            .filter(|name| !keep(&component_reference(kind, name)))
            .cloned()
            .collect();
        for name in doomed {
            entries.shift_remove(&name);
            removed.push(component_reference(kind, &name));
        }
    }
    removed
}

/// References collected from a subtree.
#[derive(Default)]
struct RefSet {
    refs: BTreeSet<String>,
}

impl RefSet {
    fn add(&mut self, reference: &str) {
        if let Some(parent) = parent_component_reference(reference) {
            self.refs.insert(parent);
        }
        self.refs.insert(reference.to_string());
    }

    /// Collect every `$ref` below `node`, including those embedded in
    /// extension values and discriminator mappings. Instance data is skipped.
    fn walk(&mut self, node: &Value) {
        self.visit(node, false);
    }

    /// `named` is set when the keys of `node` are names rather than keywords,
    /// so a property called `default` is still followed.
    fn visit(&mut self, node: &Value, named: bool) {
        match node {
            Value::Object(map) if named => {
                for value in map.values() {
                    self.visit(value, false);
                }
            }
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    self.add(reference);
                }
                if let (Some(Value::String(_)), Some(Value::Object(mapping))) =
                    (map.get("propertyName"), map.get("mapping"))
                {
                    for target in mapping.values().filter_map(Value::as_str) {
                        if target.starts_with('#') {
                            self.add(target);
                        } else {
                            self.add(&component_reference("schemas", target));
                        }
                    }
                }
                for (key, value) in map {
                    if !DATA_KEYS.contains(&key.as_str()) {
                        self.visit(value, NAMED_MAPS.contains(&key.as_str()));
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.visit(item, false);
                }
            }
            _ => {}
        }
    }
}

/// First-pass cleanup. Walks the document by structure so that property
/// names are never mistaken for keywords.
struct Cleanup<'a> {
    allowed: &'a BTreeSet<String>,
}

impl Cleanup<'_> {
    fn document(&self, root: &mut Value) {
        let Some(map) = root.as_object_mut() else {
            return;
        };
        for key in ["webhooks", "security", "callbacks"] {
            map.shift_remove(key);
        }
        self.strip(map);

        if let Some(paths) = map.get_mut("paths").and_then(Value::as_object_mut) {
            self.strip(paths);
            for item in paths.values_mut() {
                self.path_item(item);
            }
        }

        if let Some(components) = map.get_mut("components").and_then(Value::as_object_mut) {
            components.shift_remove("securitySchemes");
            components.shift_remove("examples");
            self.strip(components);
            for_each(components, "schemas", |v| self.schema(v));
            for_each(components, "parameters", |v| self.parameter(v));
            for_each(components, "headers", |v| self.parameter(v));
            for_each(components, "requestBodies", |v| self.request_body(v));
            for_each(components, "responses", |v| self.response(v));
            for_each(components, "links", |v| self.plain(v));
            for_each(components, "callbacks", |v| self.callback(v));
        }
    }

    fn strip(&self, map: &mut Map<String, Value>) {
        map.retain(|key, _| !key.starts_with("x-") || self.allowed.contains(key));
    }

    fn plain(&self, node: &mut Value) {
        if let Some(map) = node.as_object_mut() {
            self.strip(map);
        }
    }

    fn path_item(&self, node: &mut Value) {
        let Some(map) = node.as_object_mut() else {
            return;
        };
        self.strip(map);
        each_item(map, "parameters", |v| self.parameter(v));
        for method in HTTP_METHODS {
            if let Some(operation) = map.get_mut(*method) {
                self.operation(operation);
            }
        }
    }

    fn operation(&self, node: &mut Value) {
        let Some(map) = node.as_object_mut() else {
            return;
        };
        self.strip(map);
        each_item(map, "parameters", |v| self.parameter(v));
        if let Some(body) = map.get_mut("requestBody") {
            self.request_body(body);
        }
        if let Some(responses) = map.get_mut("responses").and_then(Value::as_object_mut) {
            self.strip(responses);
            for response in responses.values_mut() {
                self.response(response);
            }
        }
        for_each(map, "callbacks", |v| self.callback(v));
    }

    fn callback(&self, node: &mut Value) {
        let Some(map) = node.as_object_mut() else {
            return;
        };
        self.strip(map);
        for item in map.values_mut() {
            self.path_item(item);
        }
    }

    fn request_body(&self, node: &mut Value) {
        let Some(map) = node.as_object_mut() else {
            return;
        };
        self.strip(map);
        self.content(map);
    }

    fn response(&self, node: &mut Value) {
        let Some(map) = node.as_object_mut() else {
            return;
        };
        self.strip(map);
        for_each(map, "headers", |v| self.parameter(v));
        for_each(map, "links", |v| self.plain(v));
        self.content(map);
    }

    /// Parameters and headers share a shape.
    fn parameter(&self, node: &mut Value) {
        let Some(map) = node.as_object_mut() else {
            return;
        };
        self.strip(map);
        map.shift_remove("example");
        map.shift_remove("examples");
        if let Some(schema) = map.get_mut("schema") {
            self.schema(schema);
        }
        self.content(map);
    }

    fn content(&self, map: &mut Map<String, Value>) {
        for_each(map, "content", |media| {
            let Some(media) = media.as_object_mut() else {
                return;
            };
            self.strip(media);
            media.shift_remove("example");
            media.shift_remove("examples");
            if let Some(schema) = media.get_mut("schema") {
                self.schema(schema);
            }
            for_each(media, "encoding", |encoding| {
                if let Some(encoding) = encoding.as_object_mut() {
                    self.strip(encoding);
                    for_each(encoding, "headers", |v| self.parameter(v));
                }
            });
        });
    }

    fn schema(&self, node: &mut Value) {
        let Some(map) = node.as_object_mut() else {
            return;
        };
        self.strip(map);
        map.shift_remove("example");
        map.shift_remove("examples");
        for_each(map, "properties", |v| self.schema(v));
        for key in ["items", "additionalProperties", "not"] {
            if let Some(child) = map.get_mut(key) {
                self.schema(child);
            }
        }
        for key in ["allOf", "anyOf", "oneOf"] {
            each_item(map, key, |v| self.schema(v));
        }
    }
}

/// Apply `f` to every value of the object at `map[key]`.
fn for_each<F>(map: &mut Map<String, Value>, key: &str, mut f: F)
where
    F: FnMut(&mut Value),
{
    if let Some(entries) = map.get_mut(key).and_then(Value::as_object_mut) {
        for value in entries.values_mut() {
            f(value);
        }
    }
}

/// Apply `f` to every element of the array at `map[key]`.
fn each_item<F>(map: &mut Map<String, Value>, key: &str, mut f: F)
where
    F: FnMut(&mut Value),
{
    if let Some(items) = map.get_mut(key).and_then(Value::as_array_mut) {
        for item in items {
            f(item);
        }
    }
}
