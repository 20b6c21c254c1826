use super::store::StoreInner;
use super::{CommitOptions, Mutation, Store};
use crate::error::StoreError;
use crate::module::DispatchFuture;
use crate::path::ModulePath;
use serde_json::Value;
use std::sync::{Arc, Weak};

/// Capabilities handed to an action handler.
///
/// `state` is the action's module-local slice, resolved when called, so it
/// reflects mutations committed earlier in the same action.
#[derive(Clone)]
pub struct ActionContext {
    store: Store,
    path: ModulePath,
}

impl ActionContext {
    pub(crate) fn new(store: Store, path: ModulePath) -> Self {
        Self { store, path }
    }

    pub fn commit(&self, mutation_type: &str, payload: Value) -> Result<(), StoreError> {
        self.store.commit(mutation_type, payload)
    }

    pub fn commit_with(&self, mutation: Mutation, options: CommitOptions) -> Result<(), StoreError> {
        self.store.commit_with(mutation, options)
    }

    pub fn dispatch(&self, action_type: &str, payload: Value) -> Option<DispatchFuture> {
        self.store.dispatch(action_type, payload)
    }

    pub fn getters(&self) -> Getters {
        self.store.getters()
    }

    /// The module-local state.
    pub fn state(&self) -> Result<Value, StoreError> {
        self.store
            .read_state(|root| self.path.resolve(root).cloned())
    }

    pub fn root_state(&self) -> Value {
        self.store.state()
    }

    /// Path of the module that registered the action.
    pub fn path(&self) -> &ModulePath {
        &self.path
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

/// Read-only view of the store's getters.
///
/// Every key forwards to the current reactive record's cached value, so a
/// getter is only re-evaluated after state it read has changed.
#[derive(Clone)]
pub struct Getters {
    pub(super) store: Weak<StoreInner>,
}

impl Getters {
    /// Read a getter. `None` if no getter is registered under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.upgrade()?.current_record()?.computed(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store
            .upgrade()
            .and_then(|inner| inner.current_record())
            .is_some_and(|record| record.has_computed(key))
    }

    pub fn keys(&self) -> Vec<String> {
        self.store
            .upgrade()
            .and_then(|inner| inner.current_record())
            .map(|record| record.computed_keys().map(str::to_owned).collect())
            .unwrap_or_default()
    }
}

impl From<&Store> for Getters {
    fn from(store: &Store) -> Self {
        Self {
            store: Arc::downgrade(&store.inner),
        }
    }
}
