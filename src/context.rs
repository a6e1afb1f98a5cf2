//! State shared by the builder and the combinator resolver while one
//! document is compiled.

use serde_json::Value;

use crate::document::Document;
use crate::error::CompileError;
use crate::extensions::SchemaExtensions;
use crate::ir::{SchemaIr, SpecLocation, TypeDefinition};
use crate::naming::{component_reference, path_to_type_name, ref_to_type_name};
use crate::registry::TypeRegistry;
use crate::schema::reference;
use crate::types::CompileOptions;

/// Maximum nesting of schema resolution before giving up.
pub(crate) const MAX_DEPTH: usize = 256;

/// Maximum length of a `$ref` chain (alias of alias of ...).
const MAX_REF_HOPS: usize = 64;

/// Where in the document a schema is being resolved.
#[derive(Debug, Clone, Default)]
pub(crate) struct Site {
    /// Declaration path; hoisted names are derived from it.
    pub path: Vec<String>,
    /// The node is known to be this reference.
    pub reference: Option<String>,
    /// Explicit name for a hoisted definition at this site.
    pub base_name: Option<String>,
    /// Component currently being defined, for the union self-reference guard.
    pub defining: Option<String>,
}

impl Site {
    pub fn new(path: Vec<String>) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    /// Top-level site of `components.schemas.<key>`, named `type_name`.
    pub fn component(key: &str, type_name: &str) -> Self {
        Self {
            path: vec![type_name.to_string()],
            defining: Some(component_reference("schemas", key)),
            ..Self::default()
        }
    }

    /// A nested declaration (property, item, union member).
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(segment.into());
        Self::new(path)
    }

    /// Same declaration seen through a combinator; keeps `defining`.
    pub fn extend(&self, segment: impl Into<String>) -> Self {
        let mut site = self.child(segment);
        site.defining = self.defining.clone();
        site
    }

    pub fn with_reference(&self, reference: impl Into<String>) -> Self {
        let mut site = self.clone();
        site.reference = Some(reference.into());
        site
    }

    pub fn with_base_name(mut self, name: impl Into<String>) -> Self {
        self.base_name = Some(name.into());
        self
    }

    /// Name a definition hoisted at this site would get.
    pub fn type_name(&self) -> String {
        match &self.base_name {
            Some(name) => name.clone(),
            None => path_to_type_name(&self.path),
        }
    }

    /// Path for error messages.
    pub fn display(&self) -> String {
        if self.path.is_empty() {
            "/".to_string()
        } else {
            self.path.join("/")
        }
    }
}

/// One compilation's document, options and registry.
pub(crate) struct Context<'a> {
    pub doc: &'a Document,
    pub options: &'a CompileOptions,
    pub registry: TypeRegistry,
    expanding: Vec<String>,
    depth: usize,
}

impl<'a> Context<'a> {
    pub fn new(doc: &'a Document, options: &'a CompileOptions) -> Self {
        Self {
            doc,
            options,
            registry: TypeRegistry::new(),
            expanding: Vec::new(),
            depth: 0,
        }
    }

    pub fn into_registry(self) -> TypeRegistry {
        self.registry
    }

    /// Target of a local reference.
    pub fn resolve_ref(&self, reference: &str, site: &Site) -> Result<&'a Value, CompileError> {
        let doc: &'a Document = self.doc;
        doc.resolve(reference)
            .ok_or_else(|| CompileError::UnresolvableReference {
                reference: reference.to_string(),
                path: site.display(),
            })
    }

    /// Follow `$ref` chains until a schema body is reached.
    pub fn deref<'v>(&self, node: &'v Value, site: &Site) -> Result<&'v Value, CompileError>
    where
        'a: 'v,
    {
        let mut current = node;
        let mut hops = 0;
        while let Some(r) = reference(current) {
            hops += 1;
            if hops > MAX_REF_HOPS {
                return Err(CompileError::UnresolvableReference {
                    reference: r.to_string(),
                    path: format!("{} (reference cycle)", site.display()),
                });
            }
            current = self.resolve_ref(r, site)?;
        }
        Ok(current)
    }

    /// Name of the type generated for a component schema reference.
    /// `x-type-name` on the component wins over the component key.
    pub fn component_type_name(&self, reference: &str, site: &Site) -> Result<String, CompileError> {
        let target = self.resolve_ref(reference, site)?;
        let extensions = SchemaExtensions::from_node(target, reference)?;
        Ok(extensions
            .type_name
            .unwrap_or_else(|| ref_to_type_name(reference)))
    }

    pub fn enter(&mut self, site: &Site) -> Result<(), CompileError> {
        if self.depth >= MAX_DEPTH {
            return Err(CompileError::RecursionLimitExceeded {
                path: site.display(),
                limit: MAX_DEPTH,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Mark a path reference as being expanded. Returns false if it already
    /// is, which means the reference is cyclic.
    pub fn begin_expansion(&mut self, reference: &str) -> bool {
        if self.expanding.iter().any(|r| r == reference) {
            return false;
        }
        self.expanding.push(reference.to_string());
        true
    }

    pub fn end_expansion(&mut self, reference: &str) {
        if let Some(i) = self.expanding.iter().rposition(|r| r == reference) {
            self.expanding.remove(i);
        }
    }

    /// Move an inline composite into its own definition and return a
    /// reference to it. Anything else is returned unchanged.
    pub fn hoist(
        &mut self,
        ir: SchemaIr,
        site: &Site,
        location: SpecLocation,
    ) -> Result<SchemaIr, CompileError> {
        if !ir.needs_hoisting() {
            return Ok(ir);
        }
        self.define(ir, site, location)
    }

    /// Register `ir` under a name derived from `site` and return a reference
    /// to the definition.
    pub fn define(
        &mut self,
        ir: SchemaIr,
        site: &Site,
        location: SpecLocation,
    ) -> Result<SchemaIr, CompileError> {
        let base = site.type_name();
        let name = self
            .registry
            .resolve_collision(&base, &ir, &self.options.name_suffixes);
        let constraints = ir.constraints.clone();
        let definition = TypeDefinition::new(name, ir, location);
        let name = self.registry.register(definition.clone())?;

        let mut out = SchemaIr::reference(name);
        out.constraints = constraints;
        out.additional_types.push(definition);
        Ok(out)
    }
}
