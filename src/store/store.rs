use super::config::{DevtoolHook, StoreConfig};
use super::context::Getters;
use super::install::{install_module, reset_record, reset_store};
use super::mutation::{same_subscriber, CommitOptions, Mutation, Subscriber, Unsubscribe};
use crate::error::StoreError;
use crate::module::{DispatchFuture, HotUpdate, Module, Registry};
use crate::path::ModulePath;
use crate::reactive::{watch, Record, StateCell, WatchGuard, WatchOptions, WatchSource};
use crate::runtime::ReactiveAdapter;
use crate::scheduler::Scheduler;
use futures::future::try_join_all;
use indexmap::IndexMap;
use parking_lot::{ReentrantMutex, RwLock};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Panic message of the strict-mode monitor.
pub const STRICT_MODE_VIOLATION: &str =
    "[corral] Do not mutate store state outside mutation handlers.";

pub(crate) struct StoreInner {
    pub(super) strict: bool,
    pub(super) adapter: Arc<dyn ReactiveAdapter>,
    pub(super) scheduler: Arc<dyn Scheduler>,
    pub(super) devtool_hook: RwLock<Option<Arc<dyn DevtoolHook>>>,
    /// Root module definition, as last hot-updated.
    pub(super) options: RwLock<Module>,
    pub(super) committing: Arc<AtomicBool>,
    /// Serializes committing scopes across threads. Re-entrant so that sync
    /// watchers may commit from inside a scope.
    commit_lock: ReentrantMutex<()>,
    pub(super) registry: RwLock<Registry>,
    /// Modules added after construction, replayed on every reset.
    pub(super) runtime_modules: RwLock<IndexMap<ModulePath, Module>>,
    pub(super) subscribers: RwLock<Vec<Subscriber>>,
    pub(super) cell: Arc<StateCell>,
    pub(super) record: RwLock<Option<Arc<Record>>>,
}

impl StoreInner {
    pub(super) fn current_record(&self) -> Option<Arc<Record>> {
        self.record.read().clone()
    }

    /// Run `f` with the committing flag set, restoring the previous value
    /// afterwards even if `f` unwinds.
    ///
    /// The whole scope, including the notifications it triggers, runs under
    /// the store-wide commit lock, so no other thread can clear the flag
    /// while `f` is writing.
    pub(super) fn with_commit<R>(&self, f: impl FnOnce() -> R) -> R {
        let _lock = self.commit_lock.lock();
        let _scope = CommitScope::enter(&self.committing);
        f()
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if let Some(record) = self.record.get_mut().take() {
            record.dispose();
        }
    }
}

struct CommitScope<'a> {
    flag: &'a AtomicBool,
    previous: bool,
}

impl<'a> CommitScope<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        let previous = flag.swap(true, Ordering::SeqCst);
        Self { flag, previous }
    }
}

impl Drop for CommitScope<'_> {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::SeqCst);
    }
}

/// A centralized state container.
///
/// State changes only through registered mutations, asynchronous work goes
/// through actions, and derived values are memoized getters. `Store` is a
/// cheap handle; clones share the same state.
///
/// # Examples
///
/// ```
/// use corral::{Module, Store};
/// use serde_json::json;
///
/// let store = Store::new(
///     Module::new()
///         .state(json!({ "count": 0 }))
///         .mutation("increment", |state, n| {
///             let count = state["count"].as_i64().unwrap_or(0);
///             state["count"] = json!(count + n.as_i64().unwrap_or(1));
///         }),
/// )
/// .unwrap();
///
/// store.commit("increment", json!(5)).unwrap();
/// assert_eq!(store.state()["count"], 5);
/// ```
#[derive(Clone)]
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

impl Store {
    /// Create a store from a root module with default settings.
    pub fn new(module: Module) -> Result<Self, StoreError> {
        Self::with_config(module, StoreConfig::default())
    }

    /// Create a store from a root module.
    ///
    /// Installs the whole module tree, then builds the reactive record that
    /// caches getters (and, in strict mode, watches for stray writes).
    pub fn with_config(module: Module, config: StoreConfig) -> Result<Self, StoreError> {
        let state = module
            .state
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let cell = StateCell::new(Arc::clone(&config.adapter), state);

        let store = Self {
            inner: Arc::new(StoreInner {
                strict: config.strict,
                adapter: config.adapter,
                scheduler: config.scheduler,
                devtool_hook: RwLock::new(config.devtool_hook),
                options: RwLock::new(module.clone()),
                committing: Arc::new(AtomicBool::new(false)),
                commit_lock: ReentrantMutex::new(()),
                registry: RwLock::new(Registry::default()),
                runtime_modules: RwLock::new(IndexMap::new()),
                subscribers: RwLock::new(Vec::new()),
                cell,
                record: RwLock::new(None),
            }),
        };

        install_module(&store, &ModulePath::root(), &module, false)?;
        reset_record(&store);
        tracing::debug!(strict = config.strict, "store created");
        Ok(store)
    }

    /// Get a clone of the current root state.
    pub fn state(&self) -> Value {
        self.read_state(Value::clone)
    }

    /// Read the root state with a function without cloning.
    pub fn with_state<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        self.read_state(f)
    }

    /// Always fails: the root state is replaced with [`Store::replace_state`].
    pub fn set_state(&self, _state: Value) -> Result<(), StoreError> {
        tracing::error!("attempted to assign store state directly");
        Err(StoreError::DirectStateAssignment)
    }

    /// Raw write access to the state tree.
    ///
    /// Writes through the handle bypass mutations; in strict mode any write
    /// made outside a committing scope panics.
    pub fn state_handle(&self) -> StateHandle {
        StateHandle {
            cell: Arc::clone(&self.inner.cell),
            adapter: Arc::clone(&self.inner.adapter),
        }
    }

    /// Swap the whole root state.
    pub fn replace_state(&self, state: Value) {
        self.inner.scheduler.tick();
        self.inner.with_commit(|| {
            self.inner.cell.replace(state);
        });
        self.inner.adapter.flush();
    }

    pub fn getters(&self) -> Getters {
        Getters::from(self)
    }

    /// Commit the mutation `mutation_type` with `payload`.
    pub fn commit(&self, mutation_type: &str, payload: Value) -> Result<(), StoreError> {
        self.commit_with(Mutation::new(mutation_type, payload), CommitOptions::default())
    }

    /// Object-style commit: the descriptor carries its own `type`.
    pub fn commit_descriptor(&self, descriptor: Value, options: CommitOptions) -> Result<(), StoreError> {
        self.commit_with(Mutation::from_descriptor(descriptor)?, options)
    }

    /// Run every handler registered for the mutation's type, in registration
    /// order, then notify subscribers unless the commit is silent.
    ///
    /// An unknown type is reported and ignored.
    pub fn commit_with(&self, mutation: Mutation, options: CommitOptions) -> Result<(), StoreError> {
        self.inner.scheduler.tick();
        let handlers = self.inner.registry.read().mutations(&mutation.mutation_type);
        let Some(handlers) = handlers else {
            tracing::error!(mutation = %mutation.mutation_type, "unknown mutation type");
            return Ok(());
        };
        tracing::trace!(mutation = %mutation.mutation_type, handlers = handlers.len(), "commit");

        let result = self.inner.with_commit(|| {
            self.inner.cell.update(|root| {
                handlers
                    .iter()
                    .try_for_each(|handler| handler(root, &mutation.payload))
            })
        });
        if let Err(err) = result {
            self.inner.adapter.flush();
            return Err(err);
        }

        if !options.silent {
            self.notify_subscribers(&mutation);
        }
        self.inner.adapter.flush();
        Ok(())
    }

    fn notify_subscribers(&self, mutation: &Mutation) {
        let subscribers = self.inner.subscribers.read().clone();
        if subscribers.is_empty() {
            return;
        }
        let state = self.state();
        for subscriber in subscribers {
            subscriber(mutation, &state);
        }
    }

    /// Dispatch the action `action_type` with `payload`.
    ///
    /// Returns `None` (after reporting) when no action is registered under
    /// that type. With a single handler the future resolves to its result;
    /// with several, it resolves to the array of their results, or to the
    /// first failure.
    ///
    /// Every handler is started before `dispatch` returns: asynchronous
    /// handlers run up to their first suspension point, and on a tokio
    /// runtime the rest continues in a spawned task even if the returned
    /// future is dropped.
    pub fn dispatch(&self, action_type: &str, payload: Value) -> Option<DispatchFuture> {
        self.inner.scheduler.tick();
        let handlers = self.inner.registry.read().actions(action_type);
        let handlers = match handlers {
            Some(handlers) if !handlers.is_empty() => handlers,
            _ => {
                tracing::error!(action = %action_type, "unknown action type");
                return None;
            }
        };
        tracing::trace!(action = %action_type, handlers = handlers.len(), "dispatch");

        if let [handler] = handlers.as_slice() {
            return Some(handler(self, payload));
        }

        let pending: Vec<DispatchFuture> = handlers
            .iter()
            .map(|handler| handler(self, payload.clone()))
            .collect();
        Some(Box::pin(async move {
            let results = try_join_all(pending).await?;
            Ok(Value::Array(results))
        }))
    }

    /// Observe every non-silent commit. Subscribing the same callback twice
    /// is a no-op.
    pub fn subscribe(&self, subscriber: Subscriber) -> Unsubscribe {
        {
            let mut subscribers = self.inner.subscribers.write();
            if !subscribers
                .iter()
                .any(|existing| same_subscriber(existing, &subscriber))
            {
                subscribers.push(Arc::clone(&subscriber));
            }
        }
        Unsubscribe {
            store: Arc::downgrade(&self.inner),
            subscriber,
        }
    }

    /// Watch `getter(state)` and call `callback(new, old)` when it changes.
    pub fn watch<G, C>(&self, getter: G, callback: C, options: WatchOptions) -> WatchGuard
    where
        G: Fn(&Value) -> Value + Send + Sync + 'static,
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let store = Arc::downgrade(&self.inner);
        let source: WatchSource = Arc::new(move || match store.upgrade() {
            Some(inner) => Store { inner }.read_state(&getter),
            None => Value::Null,
        });
        watch(&self.inner.adapter, source, Arc::new(callback), options)
    }

    /// Add a module after construction.
    ///
    /// The module is remembered so that hot updates and unregistrations
    /// re-install it. Registering an already registered path replaces that
    /// module.
    pub fn register_module(&self, path: impl Into<ModulePath>, module: Module) -> Result<(), StoreError> {
        self.inner.scheduler.tick();
        let path = path.into();
        if path.is_root() {
            return Err(StoreError::InvalidModulePath);
        }
        tracing::debug!(module = %path, "registering runtime module");

        let previous = self
            .inner
            .runtime_modules
            .write()
            .insert(path.clone(), module.clone());

        if let Err(err) = install_module(self, &path, &module, false) {
            {
                let mut runtime_modules = self.inner.runtime_modules.write();
                match previous {
                    Some(previous) => {
                        runtime_modules.insert(path.clone(), previous);
                    }
                    None => {
                        runtime_modules.shift_remove(&path);
                    }
                }
            }
            if let Err(reset_err) = reset_store(self) {
                tracing::warn!(error = %reset_err, "failed to rebuild store after a failed registration");
            }
            return Err(err);
        }

        if previous.is_some() {
            // The replaced definition's handlers are still registered.
            reset_store(self)?;
        } else {
            reset_record(self);
        }
        self.inner.adapter.flush();
        Ok(())
    }

    /// Remove a module added with [`Store::register_module`], along with its
    /// state and any runtime modules nested under it.
    pub fn unregister_module(&self, path: impl Into<ModulePath>) -> Result<(), StoreError> {
        self.inner.scheduler.tick();
        let path = path.into();
        let Some((parent, key)) = path.split_last() else {
            return Err(StoreError::InvalidModulePath);
        };

        {
            let mut runtime_modules = self.inner.runtime_modules.write();
            if runtime_modules.shift_remove(&path).is_none() {
                return Err(StoreError::UnknownRuntimeModule {
                    path: path.to_string(),
                });
            }
            runtime_modules.retain(|registered, _| !registered.starts_with(&path));
        }
        tracing::debug!(module = %path, "unregistering runtime module");

        self.inner
            .with_commit(|| self.inner.cell.delete(parent, key))?;
        reset_store(self)?;
        self.inner.adapter.flush();
        Ok(())
    }

    /// Swap in new handler definitions while keeping the live state tree and
    /// every runtime module.
    pub fn hot_update(&self, update: HotUpdate) -> Result<(), StoreError> {
        self.inner.scheduler.tick();
        tracing::debug!("hot updating store");
        update.apply(&mut self.inner.options.write());
        reset_store(self)?;
        self.inner.adapter.flush();
        Ok(())
    }

    pub fn attach_devtool_hook(&self, hook: Arc<dyn DevtoolHook>) {
        *self.inner.devtool_hook.write() = Some(hook);
    }

    /// Whether a committing scope is currently open.
    pub fn is_committing(&self) -> bool {
        self.inner.committing.load(Ordering::SeqCst)
    }

    pub fn is_strict(&self) -> bool {
        self.inner.strict
    }

    /// Registered mutation types, in registration order.
    pub fn mutation_types(&self) -> Vec<String> {
        self.inner.registry.read().mutation_types()
    }

    /// Registered action types, in registration order.
    pub fn action_types(&self) -> Vec<String> {
        self.inner.registry.read().action_types()
    }

    /// Registered getter keys, in registration order.
    pub fn getter_keys(&self) -> Vec<String> {
        self.inner.registry.read().getter_keys()
    }

    /// Paths of the modules registered at runtime.
    pub fn runtime_modules(&self) -> Vec<ModulePath> {
        self.inner.runtime_modules.read().keys().cloned().collect()
    }

    pub(crate) fn devtool_hook(&self) -> Option<Arc<dyn DevtoolHook>> {
        self.inner.devtool_hook.read().clone()
    }

    /// Read the state through the current record, so that observers are
    /// woken when the record is swapped out.
    pub(crate) fn read_state<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        if let Some(record) = self.inner.current_record() {
            self.inner.adapter.track_read(record.id());
        }
        self.inner.cell.with(f)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("strict", &self.inner.strict)
            .field("mutations", &self.mutation_types())
            .field("actions", &self.action_types())
            .field("getters", &self.getter_keys())
            .finish_non_exhaustive()
    }
}

/// Direct handle on the state tree, bypassing mutations.
#[derive(Clone)]
pub struct StateHandle {
    cell: Arc<StateCell>,
    adapter: Arc<dyn ReactiveAdapter>,
}

impl StateHandle {
    pub fn get(&self) -> Value {
        self.cell.get()
    }

    /// Write the tree in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let result = self.cell.update(f);
        self.adapter.flush();
        result
    }
}
