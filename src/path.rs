//! Module paths and the path resolver.
//!
//! A module is identified by the ordered keys leading from the root module to
//! it. The same keys locate the module's slice inside the state tree.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Ordered sequence of module keys, from the root module down.
///
/// The root module has the empty path.
///
/// ```
/// use corral::ModulePath;
///
/// let path = ModulePath::from(["cart", "items"]);
/// assert_eq!(path.to_string(), "cart.items");
/// assert_eq!(ModulePath::from("cart").len(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    /// The root module's path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Path of the child module `key` under this one.
    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.to_owned());
        Self(segments)
    }

    /// Split into the parent's keys and this module's own key.
    ///
    /// Returns `None` for the root path.
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        self.0
            .split_last()
            .map(|(key, parent)| (parent, key.as_str()))
    }

    /// Whether `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &ModulePath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Resolve this module's local state inside `root`.
    pub fn resolve<'a>(&self, root: &'a Value) -> Result<&'a Value, StoreError> {
        resolve_local_state(root, &self.0)
    }

    /// Mutable counterpart of [`ModulePath::resolve`].
    pub fn resolve_mut<'a>(&self, root: &'a mut Value) -> Result<&'a mut Value, StoreError> {
        resolve_local_state_mut(root, &self.0)
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for ModulePath {
    fn from(key: &str) -> Self {
        Self(vec![key.to_owned()])
    }
}

impl From<String> for ModulePath {
    fn from(key: String) -> Self {
        Self(vec![key])
    }
}

impl From<Vec<String>> for ModulePath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<Vec<&str>> for ModulePath {
    fn from(segments: Vec<&str>) -> Self {
        Self(segments.into_iter().map(str::to_owned).collect())
    }
}

impl From<&[&str]> for ModulePath {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| (*s).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ModulePath {
    fn from(segments: [&str; N]) -> Self {
        Self(segments.iter().map(|s| (*s).to_owned()).collect())
    }
}

/// Fold `path` over `root`, indexing each step by key.
///
/// An empty path yields `root` itself. A missing intermediate key is an
/// error: it means a handler is bound to a module whose state is gone.
pub fn resolve_local_state<'a>(root: &'a Value, path: &[String]) -> Result<&'a Value, StoreError> {
    path.iter().enumerate().try_fold(root, |state, (depth, key)| {
        state
            .as_object()
            .and_then(|object| object.get(key))
            .ok_or_else(|| not_found(&path[..=depth]))
    })
}

/// Mutable counterpart of [`resolve_local_state`].
pub fn resolve_local_state_mut<'a>(
    root: &'a mut Value,
    path: &[String],
) -> Result<&'a mut Value, StoreError> {
    path.iter()
        .enumerate()
        .try_fold(root, |state, (depth, key)| {
            state
                .as_object_mut()
                .and_then(|object| object.get_mut(key))
                .ok_or_else(|| not_found(&path[..=depth]))
        })
}

fn not_found(path: &[String]) -> StoreError {
    StoreError::ModuleStateNotFound {
        path: path.join("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_path_is_root() {
        let state = json!({ "count": 1 });
        assert_eq!(resolve_local_state(&state, &[]).unwrap(), &state);
    }

    #[test]
    fn nested_path_resolves() {
        let state = json!({ "a": { "b": { "count": 3 } } });
        let path = ModulePath::from(["a", "b"]);
        assert_eq!(path.resolve(&state).unwrap(), &json!({ "count": 3 }));
    }

    #[test]
    fn missing_intermediate_key_fails() {
        let state = json!({ "a": {} });
        let err = ModulePath::from(["a", "b", "c"]).resolve(&state).unwrap_err();
        assert_eq!(
            err,
            StoreError::ModuleStateNotFound {
                path: "a.b".to_string()
            }
        );
    }

    #[test]
    fn resolve_mut_writes_through() {
        let mut state = json!({ "a": { "count": 0 } });
        *ModulePath::from("a")
            .resolve_mut(&mut state)
            .unwrap()
            .get_mut("count")
            .unwrap() = json!(7);
        assert_eq!(state["a"]["count"], 7);
    }

    #[test]
    fn path_helpers() {
        let path = ModulePath::from(vec!["a", "b"]);
        assert_eq!(path.child("c").to_string(), "a.b.c");
        assert!(path.child("c").starts_with(&path));
        assert!(!ModulePath::from("x").starts_with(&path));

        let (parent, key) = path.split_last().unwrap();
        assert_eq!(parent, ["a".to_string()]);
        assert_eq!(key, "b");
        assert!(ModulePath::root().split_last().is_none());
    }
}
