//! Per-compilation registry of named type definitions.

use std::collections::HashMap;

use tracing::debug;

use crate::error::CompileError;
use crate::ir::{SchemaIr, TypeDefinition};
use crate::naming::generate_type_name;

/// Named type definitions in registration order.
///
/// Registering a name twice is allowed only for equivalent definitions, in
/// which case the first one is kept.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    definitions: Vec<TypeDefinition>,
    index: HashMap<String, usize>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition and return the name it is known by.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::DuplicateTypeName` if the name is already taken
    /// by a definition built from a different schema.
    pub fn register(&mut self, definition: TypeDefinition) -> Result<String, CompileError> {
        if let Some(&i) = self.index.get(&definition.name) {
            let existing = &self.definitions[i];
            if equivalent(&existing.schema, &definition.schema) {
                debug!(name = %definition.name, "merged equivalent type definition");
                return Ok(existing.name.clone());
            }
            return Err(CompileError::DuplicateTypeName {
                name: definition.name,
            });
        }

        debug!(name = %definition.name, location = ?definition.location, "registered type definition");
        let name = definition.name.clone();
        self.index.insert(name.clone(), self.definitions.len());
        self.definitions.push(definition);
        Ok(name)
    }

    /// Name for a hoisted type: `base` when it is free or already holds an
    /// equivalent schema, otherwise the first free suffixed name.
    pub fn resolve_collision(&self, base: &str, candidate: &SchemaIr, suffixes: &[String]) -> String {
        match self.get(base) {
            None => base.to_string(),
            Some(existing) if equivalent(&existing.schema, candidate) => base.to_string(),
            Some(_) => generate_type_name(|name| self.contains(name), base, suffixes),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.index.get(name).map(|&i| &self.definitions[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn definitions(&self) -> &[TypeDefinition] {
        &self.definitions
    }

    pub fn into_definitions(self) -> Vec<TypeDefinition> {
        self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Marker for [`rollback`](Self::rollback).
    pub(crate) fn checkpoint(&self) -> usize {
        self.definitions.len()
    }

    /// Forget everything registered since `checkpoint`.
    pub(crate) fn rollback(&mut self, checkpoint: usize) {
        for definition in self.definitions.drain(checkpoint..) {
            self.index.remove(&definition.name);
        }
    }
}

/// Definitions are equivalent when built from deeply equal schema nodes.
/// IR equality decides when either side has no source node.
fn equivalent(a: &SchemaIr, b: &SchemaIr) -> bool {
    match (&a.source, &b.source) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
