//! OpenAPI Schema Compiler
//!
//! Compiles the schemas of an OpenAPI 3.x document into a canonical,
//! de-duplicated type model that code emitters can render for any target
//! language.
//!
//! Compilation runs in three stages over a working copy of the document:
//! operations are filtered, unreachable components are pruned, and every
//! component schema and operation payload is resolved into a named
//! [`TypeDefinition`]. Inline objects, unions and enums are hoisted into
//! their own definitions with path-derived names.
//!
//! # Example
//!
//! ```
//! use oas_ir::{compile, CompileOptions};
//! use serde_json::json;
//!
//! let document = json!({
//!     "openapi": "3.0.3",
//!     "paths": {
//!         "/users": {
//!             "get": {
//!                 "operationId": "listUsers",
//!                 "responses": { "200": { "content": { "application/json": {
//!                     "schema": { "type": "array", "items": { "$ref": "#/components/schemas/User" } }
//!                 }}}}
//!             }
//!         }
//!     },
//!     "components": { "schemas": {
//!         "User": {
//!             "type": "object",
//!             "required": ["id"],
//!             "properties": {
//!                 "id": { "type": "string", "format": "uuid" },
//!                 "address": { "type": "object", "properties": { "city": { "type": "string" } } }
//!             }
//!         },
//!         "Unused": { "type": "string" }
//!     }}
//! });
//!
//! let compilation = compile(&document, &CompileOptions::new()).unwrap();
//!
//! let user = compilation.get("User").unwrap();
//! assert_eq!(user.schema.type_decl, "record { id: uuid, address?: User_Address }");
//! assert_eq!(
//!     compilation.get("ListUsers200Response").unwrap().schema.type_decl,
//!     "array<User>"
//! );
//! // Nothing references it, so pruning removed it.
//! assert!(compilation.get("Unused").is_none());
//! ```
//!
//! # Type declarations
//!
//! | Schema | Type declaration |
//! |--------|------------------|
//! | `{type: string, format: date-time}` | `date-time` |
//! | `{type: array, items: X}` | `array<X>` |
//! | `{type: object, additionalProperties: X}` | `map<string, X>` |
//! | `{type: object}` with properties | `record { a: T, b?: U }` |
//! | `oneOf` / `anyOf` | `union { A \| B }` |
//! | `$ref: '#/components/schemas/X'` | `X` |

mod builder;
mod check;
mod combinator;
mod compile;
mod constraints;
mod context;
mod document;
mod error;
mod extensions;
mod filter;
mod ir;
mod loader;
mod merge;
mod naming;
mod operations;
mod prune;
mod registry;
mod schema;
mod types;

pub use check::{check, check_file, CheckResult, Diagnostic, FileResult, FileStatus, Severity};
pub use compile::{compile, compile_all, compile_batch, Compilation, CompileReport};
pub use constraints::{Bound, Constraints};
pub use document::Document;
pub use error::{CompileError, LoadError, MergeConflict};
pub use extensions::{MaskKind, SchemaExtensions, SensitiveData};
pub use filter::{filter_operations, FilterConfig, FilterParams};
pub use ir::{
    Discriminator, EnumValue, Property, SchemaIr, SpecLocation, TypeDefinition, UnionElement,
};
pub use loader::{is_url, load_document, load_document_auto, load_document_str, load_options};
pub use merge::merge_schemas;
pub use naming::{
    generate_type_name, is_standard_component_reference, path_to_type_name, ref_object_name,
    ref_to_type_name, to_type_name,
};
pub use prune::{prune, PruneReport};
pub use registry::TypeRegistry;
pub use types::{CompileOptions, PruneOptions, PruneStrategy, RECOGNIZED_EXTENSIONS};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
