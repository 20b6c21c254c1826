//! Module installation and registry/record rebuilding.

use super::store::{StoreInner, STRICT_MODE_VIOLATION};
use super::Store;
use crate::error::StoreError;
use crate::module::{Module, Registry};
use crate::path::{resolve_local_state, ModulePath};
use crate::reactive::{watch, ComputedFn, Record, WatchCallback, WatchOptions, WatchSource};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Install `module` at `path`, then its nested modules.
///
/// Attaches the module's state under its parent (skipped on hot reinstall
/// unless the key is missing) and appends its handlers to the registries.
pub(super) fn install_module(
    store: &Store,
    path: &ModulePath,
    module: &Module,
    hot: bool,
) -> Result<(), StoreError> {
    let inner = &store.inner;

    if let Some((parent, key)) = path.split_last() {
        let present = inner.cell.with(|root| {
            resolve_local_state(root, parent).map(|parent_state| parent_state.get(key).is_some())
        })?;
        if !hot || !present {
            let state = module
                .state
                .clone()
                .unwrap_or_else(|| Value::Object(Map::new()));
            inner.with_commit(|| inner.cell.set(parent, key, state))?;
        }
    }
    tracing::debug!(module = %path, hot, "installing module");

    {
        let mut registry = inner.registry.write();
        for (mutation_type, handler) in &module.mutations {
            registry.register_mutation(mutation_type, handler, path);
        }
        for (action_type, handler) in &module.actions {
            registry.register_action(action_type, handler, path);
        }
        for (key, getter) in &module.getters {
            if !registry.register_getter(key, getter, path) {
                tracing::error!(getter = %key, module = %path, "duplicate getter key");
            }
        }
    }

    for (key, child) in &module.modules {
        install_module(store, &path.child(key), child, hot)?;
    }
    Ok(())
}

/// Rebuild every registry from the root module and the runtime modules,
/// then rebuild the reactive record.
pub(super) fn reset_store(store: &Store) -> Result<(), StoreError> {
    let inner = &store.inner;
    *inner.registry.write() = Registry::default();

    let root = inner.options.read().clone();
    install_module(store, &ModulePath::root(), &root, true)?;

    let runtime_modules = inner.runtime_modules.read().clone();
    for (path, module) in &runtime_modules {
        install_module(store, path, module, true)?;
    }

    reset_record(store);
    Ok(())
}

/// Build a fresh reactive record exposing the registered getters as cached
/// computeds, and retire the previous one.
///
/// The old record's state reference is cleared right away so that anything
/// that read through it re-evaluates against the new record. Its disposal is
/// deferred to the next turn.
pub(super) fn reset_record(store: &Store) {
    let inner = &store.inner;

    let computed: IndexMap<String, ComputedFn> = inner
        .registry
        .read()
        .getters()
        .iter()
        .map(|(key, getter)| {
            let getter = Arc::clone(getter);
            let weak = Arc::downgrade(inner);
            let compute: ComputedFn = Arc::new(move || match weak.upgrade() {
                Some(inner) => getter(&Store { inner }),
                None => Value::Null,
            });
            (key.clone(), compute)
        })
        .collect();

    let record = Record::new(Arc::clone(&inner.adapter), Arc::clone(&inner.cell), computed);
    if inner.strict {
        enable_strict_mode(inner, &record);
    }

    let previous = inner.record.write().replace(record);
    if let Some(previous) = previous {
        inner.with_commit(|| previous.clear_state());
        inner.scheduler.defer(Box::new(move || previous.dispose()));
    }
}

/// Deep, synchronous watch over the whole tree asserting that every write
/// happens inside a committing scope.
fn enable_strict_mode(inner: &StoreInner, record: &Arc<Record>) {
    let weak = Arc::downgrade(record);
    let source: WatchSource = Arc::new(move || {
        if let Some(record) = weak.upgrade() {
            record.touch();
        }
        Value::Null
    });

    let committing = Arc::clone(&inner.committing);
    let callback: WatchCallback = Arc::new(move |_: &Value, _: &Value| {
        if !committing.load(Ordering::SeqCst) {
            tracing::error!("store state mutated outside a mutation handler");
            panic!("{}", STRICT_MODE_VIOLATION);
        }
    });

    let guard = watch(
        &inner.adapter,
        source,
        callback,
        WatchOptions::default().deep().sync(),
    );
    record.retain(guard);
}
