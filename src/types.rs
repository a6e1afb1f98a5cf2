//! Core types and options for schema compilation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::FilterConfig;

/// Extension keys understood by the compiler.
pub const RECOGNIZED_EXTENSIONS: &[&str] = &[
    "x-type-override",
    "x-type-name",
    "x-skip-optional-wrapper",
    "x-omitempty",
    "x-json-ignore",
    "x-deprecated-reason",
    "x-extra-tags",
    "x-sensitive-data",
    "x-enum-names",
];

/// Operation keys of a path item.
pub const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Component collections that can be pruned.
pub const PRUNABLE_COMPONENTS: &[&str] = &[
    "schemas",
    "parameters",
    "requestBodies",
    "responses",
    "headers",
    "links",
    "callbacks",
];

/// Default pass cap for the fixed-point pruner.
pub const DEFAULT_MAX_PRUNE_ITERATIONS: usize = 1000;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// How unreachable components are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PruneStrategy {
    /// Delete unreferenced components and repeat until nothing changes.
    #[default]
    FixedPoint,
    /// Mark everything reachable from operations, sweep once.
    Reachability,
}

impl PruneStrategy {
    /// Parse a strategy name as used on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fixed-point" => Some(PruneStrategy::FixedPoint),
            "reachability" => Some(PruneStrategy::Reachability),
            _ => None,
        }
    }
}

/// Options for pruning a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneOptions {
    pub strategy: PruneStrategy,
    /// Safety cap on fixed-point passes.
    pub max_iterations: usize,
    /// Extensions kept by the first-pass cleanup.
    pub allowed_extensions: BTreeSet<String>,
}

impl PruneOptions {
    pub fn new() -> Self {
        Self {
            strategy: PruneStrategy::FixedPoint,
            max_iterations: DEFAULT_MAX_PRUNE_ITERATIONS,
            allowed_extensions: recognized_extensions(),
        }
    }

    pub fn strategy(mut self, strategy: PruneStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn allow_extension(mut self, key: impl Into<String>) -> Self {
        self.allowed_extensions.insert(key.into());
        self
    }
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for one compilation.
///
/// Deserializable from a JSON or YAML options file; every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CompileOptions {
    /// Suffixes tried, in order, when a hoisted type name is taken.
    pub name_suffixes: Vec<String>,
    pub allowed_extensions: BTreeSet<String>,
    /// Run the component pruner before compiling.
    pub prune: bool,
    pub prune_strategy: PruneStrategy,
    pub max_prune_iterations: usize,
    pub filter: FilterConfig,
}

impl CompileOptions {
    /// Options with pruning on and no operation filter.
    pub fn new() -> Self {
        Self {
            name_suffixes: Vec::new(),
            allowed_extensions: recognized_extensions(),
            prune: true,
            prune_strategy: PruneStrategy::FixedPoint,
            max_prune_iterations: DEFAULT_MAX_PRUNE_ITERATIONS,
            filter: FilterConfig::default(),
        }
    }

    pub fn name_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.name_suffixes = suffixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn prune_strategy(mut self, strategy: PruneStrategy) -> Self {
        self.prune_strategy = strategy;
        self
    }

    pub fn max_prune_iterations(mut self, max: usize) -> Self {
        self.max_prune_iterations = max;
        self
    }

    pub fn filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn allow_extension(mut self, key: impl Into<String>) -> Self {
        self.allowed_extensions.insert(key.into());
        self
    }

    /// Pruner options derived from these compile options.
    pub fn prune_options(&self) -> PruneOptions {
        PruneOptions {
            strategy: self.prune_strategy,
            max_iterations: self.max_prune_iterations,
            allowed_extensions: self.allowed_extensions.clone(),
        }
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::new()
    }
}

fn recognized_extensions() -> BTreeSet<String> {
    RECOGNIZED_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_type_names() {
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!([1])), "array");
        assert_eq!(json_type_name(&json!({})), "object");
    }

    #[test]
    fn strategy_parse() {
        assert_eq!(
            PruneStrategy::parse("fixed-point"),
            Some(PruneStrategy::FixedPoint)
        );
        assert_eq!(
            PruneStrategy::parse("reachability"),
            Some(PruneStrategy::Reachability)
        );
        assert_eq!(PruneStrategy::parse("mark-sweep"), None);
    }

    #[test]
    fn default_options() {
        let options = CompileOptions::new();
        assert!(options.prune);
        assert_eq!(options.max_prune_iterations, 1000);
        assert!(options.allowed_extensions.contains("x-sensitive-data"));
        assert!(options.filter.is_empty());
    }

    #[test]
    fn options_from_partial_json() {
        let options: CompileOptions = serde_json::from_value(json!({
            "name-suffixes": ["Model"],
            "prune-strategy": "reachability"
        }))
        .unwrap();
        assert_eq!(options.name_suffixes, vec!["Model"]);
        assert_eq!(options.prune_strategy, PruneStrategy::Reachability);
        assert!(options.prune);
    }

    #[test]
    fn options_reject_unknown_keys() {
        let result = serde_json::from_value::<CompileOptions>(json!({ "prune-depth": 3 }));
        assert!(result.is_err());
    }

    #[test]
    fn builder_setters() {
        let options = CompileOptions::new()
            .prune(false)
            .name_suffixes(["Type", "Model"])
            .allow_extension("x-internal");
        assert!(!options.prune);
        assert_eq!(options.name_suffixes, vec!["Type", "Model"]);
        assert!(options.prune_options().allowed_extensions.contains("x-internal"));
    }
}
