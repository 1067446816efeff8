//! Variable placeholders discovered in a template

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// One step of a variable path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key, e.g. `client` in `client.name`
    Key(String),
    /// Any element of a list, written `[]`
    Index,
}

/// A structured variable path such as `client.name` or `items[].price`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct VariablePath(String);

impl VariablePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the path into segments.
    ///
    /// Empty keys (as in `a..b`) are skipped; the backend is expected to
    /// produce well-formed paths.
    pub fn segments(&self) -> Vec<PathSegment> {
        let mut segments = Vec::new();
        for part in self.0.split('.') {
            let mut key = part.trim();
            let mut indices = 0;
            while let Some(stripped) = key.strip_suffix("[]") {
                key = stripped;
                indices += 1;
            }
            if !key.is_empty() {
                segments.push(PathSegment::Key(key.to_string()));
            }
            segments.extend(std::iter::repeat_n(PathSegment::Index, indices));
        }
        segments
    }

    /// Whether `data` provides a value for this path.
    ///
    /// For list segments every element has to provide the rest of the path;
    /// an empty list satisfies it trivially.
    pub fn is_present_in(&self, data: &Value) -> bool {
        is_present(&self.segments(), data)
    }
}

fn is_present(segments: &[PathSegment], data: &Value) -> bool {
    let Some((head, rest)) = segments.split_first() else {
        return true;
    };
    match head {
        PathSegment::Key(key) => data
            .as_object()
            .and_then(|obj| obj.get(key))
            .is_some_and(|value| is_present(rest, value)),
        PathSegment::Index => data
            .as_array()
            .is_some_and(|items| items.iter().all(|item| is_present(rest, item))),
    }
}

impl fmt::Display for VariablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for VariablePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VariablePath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for VariablePath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

/// Immutable set of variable paths found in a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TemplateVariables {
    paths: BTreeSet<VariablePath>,
}

impl TemplateVariables {
    /// The empty set, used when a parse result lists no variables
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<VariablePath>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Paths in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &VariablePath> {
        self.paths.iter()
    }

    /// Paths that `data` does not provide, in sorted order.
    pub fn missing_in(&self, data: &Value) -> Vec<&VariablePath> {
        self.paths
            .iter()
            .filter(|path| !path.is_present_in(data))
            .collect()
    }
}

impl<'a> IntoIterator for &'a TemplateVariables {
    type Item = &'a VariablePath;
    type IntoIter = std::collections::btree_set::Iter<'a, VariablePath>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(name: &str) -> PathSegment {
        PathSegment::Key(name.to_string())
    }

    #[test]
    fn test_segments_simple() {
        assert_eq!(
            VariablePath::new("client.name").segments(),
            vec![key("client"), key("name")]
        );
    }

    #[test]
    fn test_segments_with_lists() {
        assert_eq!(
            VariablePath::new("items[].price").segments(),
            vec![key("items"), PathSegment::Index, key("price")]
        );
        assert_eq!(
            VariablePath::new("matrix[][]").segments(),
            vec![key("matrix"), PathSegment::Index, PathSegment::Index]
        );
    }

    #[test]
    fn test_segments_skip_empty_keys() {
        assert_eq!(VariablePath::new("a..b").segments(), vec![key("a"), key("b")]);
    }

    #[test]
    fn test_from_paths_deduplicates() {
        let vars = TemplateVariables::from_paths(["amount", "client.name", "amount"]);
        assert_eq!(vars.len(), 2);
        assert!(vars.contains("amount"));
        assert!(vars.contains("client.name"));
        assert!(!vars.contains("client"));
    }

    #[test]
    fn test_contains_exact_paths_only() {
        let vars = TemplateVariables::from_paths((0..10_000).map(|i| format!("rows[].col{}", i)));
        assert!(vars.contains("rows[].col0"));
        assert!(vars.contains("rows[].col9999"));
        assert!(!vars.contains("rows[].col10000"));
        assert!(!vars.contains("rows[]"));
        assert!(!vars.contains("rows"));
    }

    #[test]
    fn test_empty() {
        let vars = TemplateVariables::empty();
        assert!(vars.is_empty());
        assert_eq!(vars.iter().count(), 0);
    }

    #[test]
    fn test_iteration_is_sorted() {
        let vars = TemplateVariables::from_paths(["b", "a.c", "a"]);
        let paths: Vec<&str> = vars.iter().map(|p| p.as_str()).collect();
        assert_eq!(paths, vec!["a", "a.c", "b"]);
    }

    #[test]
    fn test_missing_keys() {
        let vars = TemplateVariables::from_paths(["client.name", "client.address", "amount"]);
        let data = json!({ "client": { "name": "ACME" }, "amount": 12 });
        let missing: Vec<&str> = vars.missing_in(&data).iter().map(|p| p.as_str()).collect();
        assert_eq!(missing, vec!["client.address"]);
    }

    #[test]
    fn test_missing_in_list_elements() {
        let vars = TemplateVariables::from_paths(["items[].price"]);
        let complete = json!({ "items": [{ "price": 1 }, { "price": 2 }] });
        let partial = json!({ "items": [{ "price": 1 }, { "name": "x" }] });
        let not_a_list = json!({ "items": { "price": 1 } });
        let empty = json!({ "items": [] });

        assert!(vars.missing_in(&complete).is_empty());
        assert_eq!(vars.missing_in(&partial).len(), 1);
        assert_eq!(vars.missing_in(&not_a_list).len(), 1);
        assert!(vars.missing_in(&empty).is_empty());
    }

    #[test]
    fn test_null_counts_as_present() {
        let vars = TemplateVariables::from_paths(["note"]);
        assert!(vars.missing_in(&json!({ "note": null })).is_empty());
    }

    #[test]
    fn test_serialize_as_list() {
        let vars = TemplateVariables::from_paths(["x", "y.z"]);
        assert_eq!(serde_json::to_value(&vars).unwrap(), json!(["x", "y.z"]));
    }
}
