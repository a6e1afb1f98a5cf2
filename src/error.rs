//! Error types for document loading and schema compilation.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading a document or options file.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid options in {path}: {source}")]
    InvalidOptions {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Why two allOf members could not be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeConflict {
    Types { left: String, right: String },
    Formats { left: String, right: String },
    Defaults,
    UniqueItems,
    ExclusiveMinimum,
    ExclusiveMaximum,
    ReadOnly,
    WriteOnly,
    AdditionalProperties,
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeConflict::Types { left, right } => {
                write!(f, "can not merge incompatible types: {} vs {}", left, right)
            }
            MergeConflict::Formats { left, right } => {
                write!(f, "can not merge incompatible formats: {} vs {}", left, right)
            }
            MergeConflict::Defaults => write!(f, "can not merge two schemas that both set default"),
            MergeConflict::UniqueItems => {
                write!(f, "can not merge schemas with different uniqueItems")
            }
            MergeConflict::ExclusiveMinimum => {
                write!(f, "can not merge schemas with different exclusiveMinimum")
            }
            MergeConflict::ExclusiveMaximum => {
                write!(f, "can not merge schemas with different exclusiveMaximum")
            }
            MergeConflict::ReadOnly => write!(f, "can not merge schemas with different readOnly"),
            MergeConflict::WriteOnly => write!(f, "can not merge schemas with different writeOnly"),
            MergeConflict::AdditionalProperties => write!(
                f,
                "can not merge two different schema-valued additionalProperties"
            ),
        }
    }
}

/// Errors during pruning and schema compilation.
///
/// Every variant carries the offending path or reference. None of them are
/// transient: they describe a malformed document or an unsatisfiable model.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("unresolvable reference \"{reference}\" at {path}")]
    UnresolvableReference { reference: String, path: String },

    #[error("incompatible allOf members at {path}: {conflict}")]
    IncompatibleMerge { path: String, conflict: MergeConflict },

    #[error("ambiguous discriminator \"{property}\" at {path}: inline member has no single enum value and a mapping is declared")]
    AmbiguousDiscriminatorMapping { path: String, property: String },

    #[error("discriminator at {path} does not map {}", unmapped.join(", "))]
    DiscriminatorNotAllMapped { path: String, unmapped: Vec<String> },

    #[error("type name \"{name}\" is declared by two different schemas; set x-type-name on one of them")]
    DuplicateTypeName { name: String },

    #[error("pruning did not settle after {limit} passes")]
    PruneIterationLimitExceeded { limit: usize },

    #[error("unsupported type \"{type_name}\" at {path}")]
    UnsupportedType { path: String, type_name: String },

    #[error("invalid {key} at {path}: {message}")]
    InvalidExtension {
        path: String,
        key: String,
        message: String,
    },

    #[error("schema nesting at {path} exceeds {limit} levels")]
    RecursionLimitExceeded { path: String, limit: usize },

    #[error("invalid document: {message}")]
    InvalidDocument { message: String },
}

impl CompileError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }

    /// Short stable identifier used in diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnresolvableReference { .. } => "E001",
            CompileError::IncompatibleMerge { .. } => "E002",
            CompileError::AmbiguousDiscriminatorMapping { .. } => "E003",
            CompileError::DiscriminatorNotAllMapped { .. } => "E004",
            CompileError::DuplicateTypeName { .. } => "E005",
            CompileError::PruneIterationLimitExceeded { .. } => "E006",
            CompileError::UnsupportedType { .. } => "E007",
            CompileError::InvalidExtension { .. } => "E008",
            CompileError::RecursionLimitExceeded { .. } => "E009",
            CompileError::InvalidDocument { .. } => "E010",
        }
    }

    /// Location the error was raised at, if it has one.
    pub fn path(&self) -> Option<&str> {
        match self {
            CompileError::UnresolvableReference { path, .. }
            | CompileError::IncompatibleMerge { path, .. }
            | CompileError::AmbiguousDiscriminatorMapping { path, .. }
            | CompileError::DiscriminatorNotAllMapped { path, .. }
            | CompileError::UnsupportedType { path, .. }
            | CompileError::InvalidExtension { path, .. }
            | CompileError::RecursionLimitExceeded { path, .. } => Some(path),
            _ => None,
        }
    }
}
