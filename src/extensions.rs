//! Typed view of the `x-` extensions the compiler understands.
//!
//! Unknown extension keys are ignored so documents written for newer tools
//! still compile. A recognized key with a malformed value is an error.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CompileError;
use crate::types::{json_type_name, RECOGNIZED_EXTENSIONS};

/// How a sensitive value is masked when serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskKind {
    #[default]
    Full,
    Regex,
    Hash,
    Partial,
}

/// `x-sensitive-data` settings for one property.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SensitiveData {
    #[serde(alias = "type")]
    pub mask: MaskKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "keepStart")]
    pub keep_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "keepEnd")]
    pub keep_end: Option<u32>,
}

/// Recognized extensions of a schema or property node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaExtensions {
    #[serde(
        rename = "x-type-override",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub type_override: Option<String>,

    #[serde(rename = "x-type-name", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,

    #[serde(
        rename = "x-skip-optional-wrapper",
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub skip_optional_wrapper: Option<bool>,

    #[serde(
        rename = "x-omitempty",
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub omit_empty: Option<bool>,

    #[serde(
        rename = "x-json-ignore",
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub json_ignore: Option<bool>,

    #[serde(
        rename = "x-deprecated-reason",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub deprecated_reason: Option<String>,

    #[serde(
        rename = "x-extra-tags",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub extra_tags: BTreeMap<String, String>,

    #[serde(
        rename = "x-sensitive-data",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sensitive_data: Option<SensitiveData>,

    #[serde(rename = "x-enum-names", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_names: Vec<String>,
}

impl SchemaExtensions {
    /// Parse the recognized extensions of `node`.
    ///
    /// `path` is only used for error context.
    pub fn from_node(node: &Value, path: &str) -> Result<Self, CompileError> {
        let Some(obj) = node.as_object() else {
            return Ok(Self::default());
        };

        let mut recognized = Map::new();
        for (key, value) in obj {
            if RECOGNIZED_EXTENSIONS.contains(&key.as_str()) {
                recognized.insert(key.clone(), value.clone());
            }
        }
        if recognized.is_empty() {
            return Ok(Self::default());
        }

        // Parse key by key so the error names the offending extension.
        for (key, value) in &recognized {
            let mut single = Map::new();
            single.insert(key.clone(), value.clone());
            if let Err(e) = serde_json::from_value::<SchemaExtensions>(Value::Object(single)) {
                return Err(CompileError::InvalidExtension {
                    path: path.to_string(),
                    key: key.clone(),
                    message: format!("{} (got {})", e, json_type_name(value)),
                });
            }
        }

        serde_json::from_value(Value::Object(recognized)).map_err(|e| {
            CompileError::InvalidExtension {
                path: path.to_string(),
                key: "x-".to_string(),
                message: e.to_string(),
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive_data.is_some()
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(Some(b)),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(de::Error::custom(format!(
                "expected boolean or \"true\"/\"false\", got \"{}\"",
                s
            ))),
        },
        Value::Null => Ok(None),
        other => Err(de::Error::custom(format!(
            "expected boolean, got {}",
            json_type_name(&other)
        ))),
    }
}
