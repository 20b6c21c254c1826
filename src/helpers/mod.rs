//! Binding helpers.
//!
//! Thin adapters that turn a list of names, or a mapping from local names to
//! store names, into accessors forwarding to `state`, `getters`, `commit` and
//! `dispatch`. UI layers use them to expose store members under component
//! local names.
//!
//! ```
//! use corral::helpers::{map_getters, map_mutations};
//! use corral::{Module, Store};
//! use serde_json::json;
//!
//! let store = Store::new(
//!     Module::new()
//!         .state(json!({ "count": 1 }))
//!         .mutation("increment", |state, _| {
//!             state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
//!         })
//!         .getter("double", |state, _, _| json!(state["count"].as_i64().unwrap_or(0) * 2)),
//! )
//! .unwrap();
//!
//! let mutations = map_mutations([("add", "increment")]);
//! let getters = map_getters(["double"]);
//!
//! mutations["add"].commit(&store, json!(null)).unwrap();
//! assert_eq!(getters["double"].get(&store), Some(json!(4)));
//! ```

use crate::error::StoreError;
use crate::module::DispatchFuture;
use crate::store::{Getters, Store};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// Either an ordered list of names (local name = store name) or an ordered
/// mapping from local names to targets.
pub enum NameMap<V = String> {
    List(Vec<String>),
    Map(IndexMap<String, V>),
}

impl<V: From<String>> NameMap<V> {
    /// Flatten into `(local name, target)` pairs.
    pub fn normalize(self) -> Vec<(String, V)> {
        match self {
            NameMap::List(names) => names
                .into_iter()
                .map(|name| (name.clone(), V::from(name)))
                .collect(),
            NameMap::Map(map) => map.into_iter().collect(),
        }
    }
}

impl<V> From<Vec<String>> for NameMap<V> {
    fn from(names: Vec<String>) -> Self {
        NameMap::List(names)
    }
}

impl<V> From<Vec<&str>> for NameMap<V> {
    fn from(names: Vec<&str>) -> Self {
        NameMap::List(names.into_iter().map(str::to_owned).collect())
    }
}

impl<V, const N: usize> From<[&str; N]> for NameMap<V> {
    fn from(names: [&str; N]) -> Self {
        NameMap::List(names.iter().map(|name| (*name).to_owned()).collect())
    }
}

impl<V> From<IndexMap<String, V>> for NameMap<V> {
    fn from(map: IndexMap<String, V>) -> Self {
        NameMap::Map(map)
    }
}

impl<V: From<String>, const N: usize> From<[(&str, &str); N]> for NameMap<V> {
    fn from(pairs: [(&str, &str); N]) -> Self {
        NameMap::Map(
            pairs
                .iter()
                .map(|(local, target)| ((*local).to_owned(), V::from((*target).to_owned())))
                .collect(),
        )
    }
}

/// Derives a value from `(state, getters)`.
pub type StateFn = Arc<dyn Fn(&Value, &Getters) -> Value + Send + Sync>;

/// What a mapped state accessor reads.
#[derive(Clone)]
pub enum StateMapping {
    /// A top-level key of the root state.
    Key(String),
    /// A function of the root state and the getters.
    Compute(StateFn),
}

impl StateMapping {
    pub fn compute<F>(f: F) -> Self
    where
        F: Fn(&Value, &Getters) -> Value + Send + Sync + 'static,
    {
        StateMapping::Compute(Arc::new(f))
    }
}

impl From<String> for StateMapping {
    fn from(key: String) -> Self {
        StateMapping::Key(key)
    }
}

#[derive(Clone)]
pub struct MappedState {
    mapping: StateMapping,
}

impl MappedState {
    pub fn get(&self, store: &Store) -> Value {
        match &self.mapping {
            StateMapping::Key(key) => store.with_state(|state| state.get(key).cloned().unwrap_or(Value::Null)),
            StateMapping::Compute(f) => {
                let getters = store.getters();
                store.with_state(|state| f(state, &getters))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MappedGetter {
    key: String,
}

impl MappedGetter {
    /// Read the getter, reporting unknown keys.
    pub fn get(&self, store: &Store) -> Option<Value> {
        let getters = store.getters();
        if !getters.contains(&self.key) {
            tracing::error!(getter = %self.key, "unknown getter");
            return None;
        }
        getters.get(&self.key)
    }
}

#[derive(Debug, Clone)]
pub struct MappedMutation {
    mutation_type: String,
}

impl MappedMutation {
    pub fn commit(&self, store: &Store, payload: Value) -> Result<(), StoreError> {
        store.commit(&self.mutation_type, payload)
    }
}

#[derive(Debug, Clone)]
pub struct MappedAction {
    action_type: String,
}

impl MappedAction {
    pub fn dispatch(&self, store: &Store, payload: Value) -> Option<DispatchFuture> {
        store.dispatch(&self.action_type, payload)
    }
}

pub fn map_state(states: impl Into<NameMap<StateMapping>>) -> IndexMap<String, MappedState> {
    states
        .into()
        .normalize()
        .into_iter()
        .map(|(local, mapping)| (local, MappedState { mapping }))
        .collect()
}

pub fn map_getters(getters: impl Into<NameMap>) -> IndexMap<String, MappedGetter> {
    getters
        .into()
        .normalize()
        .into_iter()
        .map(|(local, key)| (local, MappedGetter { key }))
        .collect()
}

pub fn map_mutations(mutations: impl Into<NameMap>) -> IndexMap<String, MappedMutation> {
    mutations
        .into()
        .normalize()
        .into_iter()
        .map(|(local, mutation_type)| (local, MappedMutation { mutation_type }))
        .collect()
}

pub fn map_actions(actions: impl Into<NameMap>) -> IndexMap<String, MappedAction> {
    actions
        .into()
        .normalize()
        .into_iter()
        .map(|(local, action_type)| (local, MappedAction { action_type }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Module;
    use serde_json::json;

    fn store() -> Store {
        Store::new(
            Module::new()
                .state(json!({ "count": 2, "name": "corral" }))
                .mutation("increment", |state, _| {
                    state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
                })
                .action("bump", |ctx, _| {
                    ctx.commit("increment", Value::Null)?;
                    Ok(Value::Null)
                })
                .getter("double", |state, _, _| json!(state["count"].as_i64().unwrap_or(0) * 2)),
        )
        .unwrap()
    }

    #[test]
    fn list_and_map_forms_normalize() {
        let list: NameMap = NameMap::from(["a", "b"]);
        assert_eq!(
            list.normalize(),
            vec![
                ("a".to_string(), "a".to_string()),
                ("b".to_string(), "b".to_string())
            ]
        );

        let map: NameMap = NameMap::from([("local", "remote")]);
        assert_eq!(
            map.normalize(),
            vec![("local".to_string(), "remote".to_string())]
        );
    }

    #[test]
    fn mapped_state_reads_keys_and_functions() {
        let store = store();
        let mut mapping = IndexMap::new();
        mapping.insert("count".to_string(), StateMapping::from("count".to_string()));
        mapping.insert(
            "summary".to_string(),
            StateMapping::compute(|state, getters| {
                json!(format!(
                    "{}:{}",
                    state["name"].as_str().unwrap_or_default(),
                    getters.get("double").unwrap_or_default()
                ))
            }),
        );
        let states = map_state(mapping);

        assert_eq!(states["count"].get(&store), json!(2));
        assert_eq!(states["summary"].get(&store), json!("corral:4"));

        let by_name = map_state(["name", "missing"]);
        assert_eq!(by_name["name"].get(&store), json!("corral"));
        assert_eq!(by_name["missing"].get(&store), Value::Null);
    }

    #[test]
    fn unknown_getter_yields_none() {
        let store = store();
        let getters = map_getters(["double", "nope"]);
        assert_eq!(getters["double"].get(&store), Some(json!(4)));
        assert_eq!(getters["nope"].get(&store), None);
    }

    #[test]
    fn mapped_mutations_and_actions_forward() {
        let store = store();
        map_mutations(["increment"])["increment"]
            .commit(&store, Value::Null)
            .unwrap();
        assert_eq!(store.state()["count"], 3);

        let bump = map_actions([("go", "bump")]);
        futures::executor::block_on(bump["go"].dispatch(&store, Value::Null).unwrap()).unwrap();
        assert_eq!(store.state()["count"], 4);
        assert!(map_actions(["missing"])["missing"]
            .dispatch(&store, Value::Null)
            .is_none());
    }
}
