//! The intermediate representation handed to emitters.
//!
//! IR nodes are plain data. Every named type ends up as a [`TypeDefinition`]
//! in the compilation's registry; IR nodes refer to other types by name.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::constraints::Constraints;
use crate::extensions::SchemaExtensions;

/// Type-decl of a schema that accepts anything.
pub const ANY: &str = "any";

/// Type-decl of a record with no fields and no additional properties.
pub const EMPTY_RECORD: &str = "record {}";

/// Type-decls that name a primitive rather than a type definition.
pub const PRIMITIVES: &[&str] = &[
    "any",
    "string",
    "date",
    "date-time",
    "time",
    "uuid",
    "email",
    "uri",
    "binary",
    "bytes",
    "integer",
    "int32",
    "int64",
    "number",
    "float",
    "double",
    "boolean",
];

pub fn is_primitive(type_decl: &str) -> bool {
    PRIMITIVES.contains(&type_decl)
}

/// One resolved schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaIr {
    /// Primitive name, reference name, or inline composite declaration.
    pub type_decl: String,
    /// Name of the type definition this node stands for, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_type: Option<Box<SchemaIr>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<EnumValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
    #[serde(skip_serializing_if = "is_false")]
    pub has_additional_properties: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<SchemaIr>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub union_elements: Vec<UnionElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,
    /// This node is another name for an existing type.
    #[serde(skip_serializing_if = "is_false")]
    pub define_via_alias: bool,
    /// Definitions hoisted while building this node. Not serialized: every
    /// one of them is also listed in the compilation's definitions.
    #[serde(skip)]
    pub additional_types: Vec<TypeDefinition>,
    pub constraints: Constraints,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The schema node this IR was built from; used for equivalence checks.
    #[serde(skip)]
    pub source: Option<Value>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl SchemaIr {
    pub fn new(type_decl: impl Into<String>) -> Self {
        Self {
            type_decl: type_decl.into(),
            ..Self::default()
        }
    }

    pub fn any() -> Self {
        Self::new(ANY)
    }

    /// Another name for the type `name`.
    pub fn alias(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            type_decl: name.clone(),
            ref_type: Some(name),
            define_via_alias: true,
            ..Self::default()
        }
    }

    /// A use-site pointing at a hoisted definition.
    pub fn reference(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            type_decl: name.clone(),
            ref_type: Some(name),
            ..Self::default()
        }
    }

    /// Nothing was resolved.
    pub fn is_zero(&self) -> bool {
        self.type_decl.is_empty()
            && self.ref_type.is_none()
            && self.properties.is_empty()
            && self.union_elements.is_empty()
    }

    pub fn is_ref(&self) -> bool {
        self.ref_type.is_some()
    }

    pub fn is_any(&self) -> bool {
        self.type_decl == ANY
    }

    /// Inline composites that must become their own definition.
    pub fn needs_hoisting(&self) -> bool {
        self.ref_type.is_none() && (!self.properties.is_empty() || !self.union_elements.is_empty())
    }

    pub fn has_sensitive_data(&self) -> bool {
        self.properties.iter().any(Property::is_sensitive)
    }

    /// Whether an emitter needs a hand-written (de)serializer: sensitive
    /// fields always do, mixin fields do unless the type is a union.
    pub fn needs_custom_serializer(&self) -> bool {
        if self.array_type.is_some() {
            return false;
        }
        if self.has_sensitive_data() {
            return true;
        }
        let has_mixin = self.properties.iter().any(|p| p.wire_name.is_none());
        has_mixin && self.union_elements.is_empty()
    }

    /// Recompute the inline declaration from the current fields.
    pub fn refresh_type_decl(&mut self) {
        if !self.union_elements.is_empty() && self.properties.is_empty() {
            self.type_decl = render_union(&self.union_elements);
        } else if !self.properties.is_empty() {
            self.type_decl = render_record(&self.properties, self.additional_properties.as_deref());
        }
    }
}

/// `record { id: string, tag?: string, ..Mixin }`.
pub fn render_record(properties: &[Property], additional: Option<&SchemaIr>) -> String {
    let mut fields: Vec<String> = properties
        .iter()
        .map(|p| match &p.wire_name {
            Some(wire) if p.constraints.required => format!("{}: {}", wire, p.schema.type_decl),
            Some(wire) => format!("{}?: {}", wire, p.schema.type_decl),
            None => format!("..{}", p.schema.type_decl),
        })
        .collect();
    if let Some(additional) = additional {
        fields.push(format!("[key: string]: {}", additional.type_decl));
    }
    if fields.is_empty() {
        EMPTY_RECORD.to_string()
    } else {
        format!("record {{ {} }}", fields.join(", "))
    }
}

/// `union { A | B }`.
pub fn render_union(elements: &[UnionElement]) -> String {
    let names: Vec<&str> = elements.iter().map(|e| e.type_name.as_str()).collect();
    format!("union {{ {} }}", names.join(" | "))
}

pub fn render_array(item: &SchemaIr) -> String {
    format!("array<{}>", item.type_decl)
}

pub fn render_map(value: &SchemaIr) -> String {
    format!("map<string, {}>", value.type_decl)
}

/// A record field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub field_name: String,
    /// Key on the wire; `None` for mixin fields whose members are inlined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wire_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub deprecated: bool,
    pub schema: SchemaIr,
    pub constraints: Constraints,
    #[serde(skip_serializing_if = "SchemaExtensions::is_empty")]
    pub extensions: SchemaExtensions,
}

impl Property {
    /// A field that embeds the named type's members.
    pub fn mixin(type_name: impl Into<String>, nullable: bool) -> Self {
        let type_name = type_name.into();
        Self {
            field_name: type_name.clone(),
            wire_name: None,
            description: None,
            deprecated: false,
            schema: SchemaIr::reference(type_name),
            constraints: Constraints {
                nullable,
                ..Constraints::default()
            },
            extensions: SchemaExtensions::default(),
        }
    }

    pub fn is_sensitive(&self) -> bool {
        self.extensions.is_sensitive()
    }
}

/// One member of a union.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionElement {
    pub type_name: String,
    pub schema: SchemaIr,
}

/// Discriminator property and its value to type-name mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Discriminator {
    pub property: String,
    pub mapping: BTreeMap<String, String>,
}

/// An enum member and the name an emitter should give it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumValue {
    pub name: String,
    pub value: Value,
}

/// Where a type definition was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpecLocation {
    Schema,
    Property,
    PathParameter,
    QueryParameter,
    HeaderParameter,
    RequestBody,
    Response,
    Union,
    Merge,
}

/// A named, registered IR.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDefinition {
    pub name: String,
    /// Original name in the document, when it differs from `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_name: Option<String>,
    pub schema: SchemaIr,
    pub location: SpecLocation,
    pub needs_custom_serializer: bool,
    pub has_sensitive_data: bool,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>, schema: SchemaIr, location: SpecLocation) -> Self {
        Self {
            name: name.into(),
            json_name: None,
            needs_custom_serializer: schema.needs_custom_serializer(),
            has_sensitive_data: schema.has_sensitive_data(),
            schema,
            location,
        }
    }

    pub fn json_name(mut self, json_name: impl Into<String>) -> Self {
        let json_name = json_name.into();
        if json_name != self.name {
            self.json_name = Some(json_name);
        }
        self
    }
}
