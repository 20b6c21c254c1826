use super::{start, DispatchFuture, GetterFn, MutationFn};
use crate::error::StoreError;
use crate::module::ActionFn;
use crate::path::ModulePath;
use crate::store::{ActionContext, Store, ACTION_ERROR_EVENT};
use futures::TryFutureExt;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// Mutation handler bound to its module path; receives the root tree.
pub(crate) type WrappedMutation =
    Arc<dyn Fn(&mut Value, &Value) -> Result<(), StoreError> + Send + Sync>;

/// Action handler bound to its module path.
pub(crate) type WrappedAction = Arc<dyn Fn(&Store, Value) -> DispatchFuture + Send + Sync>;

/// Getter bound to its module path, evaluated against the live store.
pub(crate) type WrappedGetter = Arc<dyn Fn(&Store) -> Value + Send + Sync>;

/// Flat handler tables. Entries only grow; resets start from an empty registry.
#[derive(Clone, Default)]
pub(crate) struct Registry {
    mutations: IndexMap<String, Vec<WrappedMutation>>,
    actions: IndexMap<String, Vec<WrappedAction>>,
    getters: IndexMap<String, WrappedGetter>,
}

impl Registry {
    pub(crate) fn register_mutation(&mut self, type_: &str, handler: &MutationFn, path: &ModulePath) {
        let handler = Arc::clone(handler);
        let path = path.clone();
        let wrapped: WrappedMutation = Arc::new(move |root: &mut Value, payload: &Value| {
            let local = path.resolve_mut(root)?;
            handler(local, payload);
            Ok(())
        });
        self.mutations
            .entry(type_.to_owned())
            .or_default()
            .push(wrapped);
    }

    pub(crate) fn register_action(&mut self, type_: &str, handler: &ActionFn, path: &ModulePath) {
        let handler = Arc::clone(handler);
        let path = path.clone();
        let wrapped: WrappedAction = Arc::new(move |store: &Store, payload: Value| -> DispatchFuture {
            let context = ActionContext::new(store.clone(), path.clone());
            let future = handler(context, payload).into_future();
            let future: DispatchFuture = match store.devtool_hook() {
                Some(hook) => Box::pin(future.map_err(move |err| {
                    hook.emit(ACTION_ERROR_EVENT, &err);
                    err
                })),
                None => future,
            };
            start(future)
        });
        self.actions
            .entry(type_.to_owned())
            .or_default()
            .push(wrapped);
    }

    /// Register a getter unless the key is taken. Returns `false` on conflict.
    pub(crate) fn register_getter(&mut self, key: &str, raw: &GetterFn, path: &ModulePath) -> bool {
        if self.getters.contains_key(key) {
            return false;
        }
        let raw = Arc::clone(raw);
        let path = path.clone();
        let name = key.to_owned();
        let wrapped: WrappedGetter = Arc::new(move |store: &Store| {
            let getters = store.getters();
            store.read_state(|root| match path.resolve(root) {
                Ok(local) => raw(local, &getters, root),
                Err(err) => {
                    tracing::error!(getter = %name, error = %err, "getter bound to missing module state");
                    Value::Null
                }
            })
        });
        self.getters.insert(key.to_owned(), wrapped);
        true
    }

    pub(crate) fn mutations(&self, type_: &str) -> Option<Vec<WrappedMutation>> {
        self.mutations.get(type_).cloned()
    }

    pub(crate) fn actions(&self, type_: &str) -> Option<Vec<WrappedAction>> {
        self.actions.get(type_).cloned()
    }

    pub(crate) fn getters(&self) -> &IndexMap<String, WrappedGetter> {
        &self.getters
    }

    pub(crate) fn mutation_types(&self) -> Vec<String> {
        self.mutations.keys().cloned().collect()
    }

    pub(crate) fn action_types(&self) -> Vec<String> {
        self.actions.keys().cloned().collect()
    }

    pub(crate) fn getter_keys(&self) -> Vec<String> {
        self.getters.keys().cloned().collect()
    }

    /// Number of handlers bound to a mutation type.
    #[cfg(test)]
    pub(crate) fn mutation_count(&self, type_: &str) -> usize {
        self.mutations.get(type_).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mutations_run_against_their_module_slice() {
        let mut registry = Registry::default();
        let handler: MutationFn = Arc::new(|state: &mut Value, payload: &Value| {
            state["n"] = payload.clone();
        });
        registry.register_mutation("set", &handler, &ModulePath::from("a"));
        registry.register_mutation("set", &handler, &ModulePath::root());
        assert_eq!(registry.mutation_count("set"), 2);

        let mut state = json!({ "a": {} });
        for wrapped in registry.mutations("set").unwrap() {
            wrapped(&mut state, &json!(4)).unwrap();
        }
        assert_eq!(state, json!({ "a": { "n": 4 }, "n": 4 }));
    }

    #[test]
    fn mutation_on_missing_module_state_fails() {
        let mut registry = Registry::default();
        let handler: MutationFn = Arc::new(|_: &mut Value, _: &Value| {});
        registry.register_mutation("noop", &handler, &ModulePath::from("gone"));

        let mut state = json!({});
        let wrapped = &registry.mutations("noop").unwrap()[0];
        assert!(matches!(
            wrapped(&mut state, &Value::Null),
            Err(StoreError::ModuleStateNotFound { .. })
        ));
    }

    #[test]
    fn duplicate_getter_keys_keep_the_first() {
        let mut registry = Registry::default();
        let getter: GetterFn = Arc::new(|_: &Value, _: &crate::Getters, _: &Value| Value::Null);
        assert!(registry.register_getter("total", &getter, &ModulePath::root()));
        assert!(!registry.register_getter("total", &getter, &ModulePath::from("a")));
        assert_eq!(registry.getter_keys(), ["total"]);
    }
}
