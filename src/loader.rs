//! Document loading from files, strings, and HTTP URLs.
//!
//! OpenAPI documents come as JSON or YAML. The format is taken from the file
//! extension when there is one, otherwise sniffed from the first character.

use std::path::Path;

use serde_json::Value;

use crate::error::LoadError;
use crate::types::CompileOptions;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }

    fn sniff(content: &str) -> Self {
        match content.trim_start().chars().next() {
            Some('{') | Some('[') => Format::Json,
            _ => Format::Yaml,
        }
    }
}

fn parse(content: &str, format: Format) -> Result<Value, LoadError> {
    match format {
        Format::Json => {
            serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
        }
        Format::Yaml => {
            serde_yaml::from_str(content).map_err(|source| LoadError::InvalidYaml { source })
        }
    }
}

fn read(path: &Path) -> Result<String, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist, or
/// `LoadError::InvalidJson` / `LoadError::InvalidYaml` if it doesn't parse.
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    let content = read(path)?;
    let format = Format::from_path(path).unwrap_or_else(|| Format::sniff(&content));
    parse(&content, format)
}

/// Load a document from a JSON or YAML string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` or `LoadError::InvalidYaml` depending on
/// the sniffed format.
pub fn load_document_str(content: &str) -> Result<Value, LoadError> {
    parse(content, Format::sniff(content))
}

/// Load a document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the server
/// answers with an error status, or a parse error for the body.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str) -> Result<Value, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    let body = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text())
        .map_err(network)?;

    let format = Format::from_path(Path::new(url)).unwrap_or_else(|| Format::sniff(&body));
    parse(&body, format)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a document from a file path or URL.
///
/// URL loading requires the `remote` feature.
///
/// # Errors
///
/// Returns appropriate errors based on the source type.
pub fn load_document_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_document_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_document(Path::new(source))
    }
}

/// Load compile options from a JSON or YAML file. Missing keys take their
/// defaults.
///
/// # Errors
///
/// Returns a load error for unreadable files, or `LoadError::InvalidOptions`
/// for unknown keys and mistyped values.
pub fn load_options(path: &Path) -> Result<CompileOptions, LoadError> {
    let value = load_document(path)?;
    serde_json::from_value(value).map_err(|source| LoadError::InvalidOptions {
        path: path.to_path_buf(),
        source,
    })
}
