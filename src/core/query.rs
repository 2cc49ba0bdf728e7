//! Named queries and list parameters

use crate::core::entity::Name;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw declaration of a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub name: Name,
}

/// A named query of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    name: Name,
    entity: Name,
}

impl Query {
    pub fn new(definition: QueryDefinition, entity: Name) -> Self {
        Self {
            name: definition.name,
            entity,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Principal entity of the query
    pub fn entity(&self) -> &Name {
        &self.entity
    }
}

/// Query string parameters of list and query calls
///
/// Pagination and sorting are optional; any other backend-specific
/// parameter goes in `extra`.
///
/// # Example
/// ```rust,ignore
/// let params = QueryParams::default().with_page(2, 50).with("status", "open");
/// gateway.query("balise", "balise", Some(params)).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    /// Index of the first result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<usize>,

    /// Maximum number of results
    #[serde(rename = "maxResults", skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,

    /// Sort field, prefixed by `-` for descending order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueryParams {
    /// Select a 1-based page of `limit` results
    pub fn with_page(mut self, page: usize, limit: usize) -> Self {
        let limit = limit.max(1);
        self.first = Some((page.max(1) - 1) * limit);
        self.max_results = Some(limit);
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Flatten into `(key, value)` pairs for a query string
    ///
    /// Array values are repeated once per element.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(first) = self.first {
            pairs.push(("first".to_string(), first.to_string()));
        }
        if let Some(max) = self.max_results {
            pairs.push(("maxResults".to_string(), max.to_string()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort".to_string(), sort.clone()));
        }
        for (key, value) in &self.extra {
            match value {
                Value::Array(items) => {
                    pairs.extend(items.iter().map(|item| (key.clone(), scalar(item))))
                }
                Value::Null => {}
                other => pairs.push((key.clone(), scalar(other))),
            }
        }
        pairs
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_page() {
        let params = QueryParams::default().with_page(3, 20);
        assert_eq!(params.first, Some(40));
        assert_eq!(params.max_results, Some(20));

        let params = QueryParams::default().with_page(0, 0);
        assert_eq!(params.first, Some(0));
        assert_eq!(params.max_results, Some(1));
    }

    #[test]
    fn test_to_pairs() {
        let params = QueryParams::default()
            .with_page(1, 10)
            .with("status", "open")
            .with("id", json!(["a", "b"]));
        let pairs = params.to_pairs();
        assert!(pairs.contains(&("first".to_string(), "0".to_string())));
        assert!(pairs.contains(&("maxResults".to_string(), "10".to_string())));
        assert!(pairs.contains(&("status".to_string(), "open".to_string())));
        assert_eq!(pairs.iter().filter(|(k, _)| k == "id").count(), 2);
    }

    #[test]
    fn test_serialization_flattens_extra() {
        let params = QueryParams::default().with("status", "open");
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value, json!({"status": "open"}));
    }
}
