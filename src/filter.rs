//! Operation inclusion/exclusion by path, tag and operationId.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::types::HTTP_METHODS;

/// One side of an operation filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FilterParams {
    pub paths: Vec<String>,
    pub tags: Vec<String>,
    pub operation_ids: Vec<String>,
}

impl FilterParams {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.tags.is_empty() && self.operation_ids.is_empty()
    }
}

/// Which operations survive before pruning runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FilterConfig {
    pub include: FilterParams,
    pub exclude: FilterParams,
}

impl FilterConfig {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Remove operations that do not pass the filter.
///
/// Path items dropped by a path rule are removed whole. Path items that lose
/// all their operations through tag or id rules stay in place; only
/// components are ever pruned for reachability.
///
/// Returns the number of operations removed.
pub fn filter_operations(document: &mut Value, config: &FilterConfig) -> usize {
    if config.is_empty() {
        return 0;
    }

    let Some(paths) = document.get_mut("paths").and_then(Value::as_object_mut) else {
        return 0;
    };

    let mut removed = 0;
    let dropped: Vec<String> = paths
        .keys()
        .filter(|path| {
            (!config.include.paths.is_empty() && !config.include.paths.contains(*path))
                || config.exclude.paths.contains(*path)
        })
        .cloned()
        .collect();

    for path in dropped {
        if let Some(item) = paths.shift_remove(&path) {
            removed += operation_count(&item);
            debug!(path = %path, "path filtered out");
        }
    }

    for (path, item) in paths.iter_mut() {
        let Some(item) = item.as_object_mut() else {
            continue;
        };
        for method in HTTP_METHODS {
            let remove = item
                .get(*method)
                .map(|op| !keeps_operation(op, config))
                .unwrap_or(false);
            if remove {
                item.shift_remove(*method);
                removed += 1;
                debug!(path = %path, method, "operation filtered out");
            }
        }
    }

    removed
}

fn keeps_operation(operation: &Value, config: &FilterConfig) -> bool {
    let tags: Vec<&str> = operation
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let operation_id = operation.get("operationId").and_then(Value::as_str);

    if tags
        .iter()
        .any(|tag| config.exclude.tags.iter().any(|t| t == tag))
    {
        return false;
    }
    if !config.include.tags.is_empty()
        && !tags
            .iter()
            .any(|tag| config.include.tags.iter().any(|t| t == tag))
    {
        return false;
    }

    let id_in = |ids: &[String]| operation_id.map_or(false, |id| ids.iter().any(|i| i == id));
    if id_in(&config.exclude.operation_ids) {
        return false;
    }
    if !config.include.operation_ids.is_empty() && !id_in(&config.include.operation_ids) {
        return false;
    }
    true
}

fn operation_count(item: &Value) -> usize {
    HTTP_METHODS
        .iter()
        .filter(|method| item.get(**method).is_some())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "paths": {
                "/pets": {
                    "get": { "operationId": "listPets", "tags": ["pets"] },
                    "post": { "operationId": "createPet", "tags": ["pets", "admin"] }
                },
                "/stores": {
                    "get": { "operationId": "listStores", "tags": ["stores"] }
                }
            }
        })
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let mut doc = document();
        assert_eq!(filter_operations(&mut doc, &FilterConfig::default()), 0);
        assert_eq!(doc, document());
    }

    #[test]
    fn include_paths_drops_other_path_items() {
        let mut doc = document();
        let config = FilterConfig {
            include: FilterParams {
                paths: vec!["/pets".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(filter_operations(&mut doc, &config), 1);
        assert!(doc["paths"].get("/stores").is_none());
        assert!(doc["paths"]["/pets"].get("get").is_some());
    }

    #[test]
    fn exclude_tag_removes_operation_only() {
        let mut doc = document();
        let config = FilterConfig {
            exclude: FilterParams {
                tags: vec!["admin".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(filter_operations(&mut doc, &config), 1);
        assert!(doc["paths"]["/pets"].get("post").is_none());
        assert!(doc["paths"]["/pets"].get("get").is_some());
    }

    #[test]
    fn include_tags_requires_a_match() {
        let mut doc = document();
        let config = FilterConfig {
            include: FilterParams {
                tags: vec!["stores".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        filter_operations(&mut doc, &config);
        assert!(doc["paths"]["/pets"].as_object().unwrap().is_empty());
        assert!(doc["paths"]["/stores"].get("get").is_some());
    }

    #[test]
    fn operation_id_rules() {
        let mut doc = document();
        let config = FilterConfig {
            include: FilterParams {
                operation_ids: vec!["listPets".into(), "listStores".into()],
                ..Default::default()
            },
            exclude: FilterParams {
                operation_ids: vec!["listStores".into()],
                ..Default::default()
            },
        };
        assert_eq!(filter_operations(&mut doc, &config), 2);
        assert!(doc["paths"]["/pets"].get("get").is_some());
        assert!(doc["paths"]["/stores"].get("get").is_none());
    }
}
