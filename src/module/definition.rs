use crate::store::{ActionContext, Getters};
use futures::future::{self, BoxFuture};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Mutation handler: `(local_state, payload)`.
pub type MutationFn = Arc<dyn Fn(&mut Value, &Value) + Send + Sync>;

/// Action handler: `(context, payload)`.
pub type ActionFn = Arc<dyn Fn(ActionContext, Value) -> ActionReturn + Send + Sync>;

/// Getter: `(local_state, getters, root_state)`. Must be pure; its result is cached.
pub type GetterFn = Arc<dyn Fn(&Value, &Getters, &Value) -> Value + Send + Sync>;

/// Future returned by `dispatch`.
pub type DispatchFuture = BoxFuture<'static, anyhow::Result<Value>>;

/// What an action handler produced: a value right away, or a future of one.
pub enum ActionReturn {
    Ready(anyhow::Result<Value>),
    Pending(DispatchFuture),
}

impl ActionReturn {
    /// Normalize into a future; ready values become already-resolved futures.
    pub fn into_future(self) -> DispatchFuture {
        match self {
            ActionReturn::Ready(result) => Box::pin(future::ready(result)),
            ActionReturn::Pending(future) => future,
        }
    }
}

impl From<anyhow::Result<Value>> for ActionReturn {
    fn from(result: anyhow::Result<Value>) -> Self {
        ActionReturn::Ready(result)
    }
}

impl From<Value> for ActionReturn {
    fn from(value: Value) -> Self {
        ActionReturn::Ready(Ok(value))
    }
}

/// Start an action future now instead of when the caller first polls it.
///
/// The future is polled once, so everything up to its first suspension runs
/// inside `dispatch`. If it is still pending and a tokio runtime is current,
/// the remainder is spawned there and keeps running even if the returned
/// future is dropped. Otherwise the caller drives the rest.
pub(crate) fn start(mut future: DispatchFuture) -> DispatchFuture {
    let waker = futures::task::noop_waker();
    let mut cx = Context::from_waker(&waker);
    match future.as_mut().poll(&mut cx) {
        Poll::Ready(result) => Box::pin(future::ready(result)),
        Poll::Pending => match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(future);
                Box::pin(async move { Ok::<_, anyhow::Error>(task.await??) })
            }
            Err(_) => future,
        },
    }
}

pub(crate) fn sync_action<F>(handler: F) -> ActionFn
where
    F: Fn(ActionContext, Value) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(move |context: ActionContext, payload: Value| {
        ActionReturn::Ready(handler(context, payload))
    })
}

pub(crate) fn async_action<F, Fut>(handler: F) -> ActionFn
where
    F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(move |context: ActionContext, payload: Value| {
        ActionReturn::Pending(Box::pin(handler(context, payload)))
    })
}

/// A module definition.
///
/// Tables keep declaration order, which is also installation order: handlers
/// for the same type run in the order their modules were installed, and the
/// first module to declare a getter key owns it.
///
/// ```
/// use corral::Module;
/// use serde_json::json;
///
/// let counter = Module::new()
///     .state(json!({ "count": 0 }))
///     .mutation("increment", |state, n| {
///         state["count"] = json!(state["count"].as_i64().unwrap_or(0) + n.as_i64().unwrap_or(1));
///     })
///     .getter("double", |state, _, _| json!(state["count"].as_i64().unwrap_or(0) * 2));
///
/// assert!(counter.mutations.contains_key("increment"));
/// ```
#[derive(Clone, Default)]
pub struct Module {
    /// Initial local state. Defaults to an empty object when installed.
    pub state: Option<Value>,
    pub mutations: IndexMap<String, MutationFn>,
    pub actions: IndexMap<String, ActionFn>,
    pub getters: IndexMap<String, GetterFn>,
    pub modules: IndexMap<String, Module>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    pub fn mutation<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Value, &Value) + Send + Sync + 'static,
    {
        self.mutations.insert(name.into(), Arc::new(handler));
        self
    }

    /// Add an action whose result is available when the handler returns.
    pub fn action<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), sync_action(handler));
        self
    }

    /// Add an action returning a future.
    pub fn async_action<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.actions.insert(name.into(), async_action(handler));
        self
    }

    pub fn getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Value, &Getters, &Value) -> Value + Send + Sync + 'static,
    {
        self.getters.insert(name.into(), Arc::new(getter));
        self
    }

    /// Nest `module` under `name`.
    pub fn module(mut self, name: impl Into<String>, module: Module) -> Self {
        self.modules.insert(name.into(), module);
        self
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("state", &self.state)
            .field("mutations", &self.mutations.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("modules", &self.modules)
            .finish()
    }
}

/// Replacement handler tables for `Store::hot_update`.
///
/// A present table replaces the root module's table wholesale. Modules are
/// merged key by key.
#[derive(Clone, Default)]
pub struct HotUpdate {
    pub mutations: Option<IndexMap<String, MutationFn>>,
    pub actions: Option<IndexMap<String, ActionFn>>,
    pub getters: Option<IndexMap<String, GetterFn>>,
    pub modules: Option<IndexMap<String, Module>>,
}

impl HotUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mutation<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Value, &Value) + Send + Sync + 'static,
    {
        self.mutations
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), Arc::new(handler));
        self
    }

    pub fn action<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.actions
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), sync_action(handler));
        self
    }

    pub fn async_action<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.actions
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), async_action(handler));
        self
    }

    pub fn getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Value, &Getters, &Value) -> Value + Send + Sync + 'static,
    {
        self.getters
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), Arc::new(getter));
        self
    }

    pub fn module(mut self, name: impl Into<String>, module: Module) -> Self {
        self.modules
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), module);
        self
    }

    /// Apply onto the stored root module definition.
    pub(crate) fn apply(self, root: &mut Module) {
        if let Some(actions) = self.actions {
            root.actions = actions;
        }
        if let Some(mutations) = self.mutations {
            root.mutations = mutations;
        }
        if let Some(getters) = self.getters {
            root.getters = getters;
        }
        if let Some(modules) = self.modules {
            for (key, module) in modules {
                root.modules.insert(key, module);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hot_update_replaces_tables_and_merges_modules() {
        let mut root = Module::new()
            .mutation("a", |_, _| {})
            .mutation("b", |_, _| {})
            .action("act", |_, _| Ok(Value::Null))
            .module("one", Module::new().state(json!({ "v": 1 })))
            .module("two", Module::new());

        HotUpdate::new()
            .mutation("c", |_, _| {})
            .module("two", Module::new().state(json!({ "v": 2 })))
            .module("three", Module::new())
            .apply(&mut root);

        assert_eq!(root.mutations.keys().collect::<Vec<_>>(), ["c"]);
        assert!(root.actions.contains_key("act"));
        assert_eq!(
            root.modules.keys().collect::<Vec<_>>(),
            ["one", "two", "three"]
        );
        assert_eq!(root.modules["two"].state, Some(json!({ "v": 2 })));
    }

    #[test]
    fn ready_returns_become_resolved_futures() {
        let value = futures::executor::block_on(ActionReturn::from(json!(3)).into_future());
        assert_eq!(value.unwrap(), json!(3));
    }
}
