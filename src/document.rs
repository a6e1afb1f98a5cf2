//! Read-only view of an OpenAPI document with local reference resolution.

use serde_json::Value;

use crate::error::CompileError;
use crate::types::json_type_name;

/// A parsed document. References are resolved as JSON pointers against
/// the root; only local (`#/...`) references are supported.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Value,
}

impl Document {
    /// Wrap a parsed document.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::InvalidDocument` if the root is not an object.
    pub fn new(root: Value) -> Result<Self, CompileError> {
        if !root.is_object() {
            return Err(CompileError::InvalidDocument {
                message: format!("expected an object at the root, got {}", json_type_name(&root)),
            });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn into_inner(self) -> Value {
        self.root
    }

    /// Target of a local reference, or `None` when it points nowhere or
    /// outside the document.
    pub fn resolve(&self, reference: &str) -> Option<&Value> {
        let pointer = reference.strip_prefix('#')?;
        if pointer.is_empty() {
            return Some(&self.root);
        }
        self.root.pointer(pointer)
    }

    /// Entries of `components.<kind>` in document order.
    pub fn components(&self, kind: &str) -> impl Iterator<Item = (&String, &Value)> + '_ {
        self.root
            .get("components")
            .and_then(|c| c.get(kind))
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|entries| entries.iter())
    }
}
