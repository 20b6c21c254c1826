use super::{ComputedFn, Memo, StateCell, WatchGuard};
use crate::runtime::ReactiveAdapter;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A reactive record: a binding to a state cell plus named computeds.
///
/// The binding itself is a source. Everything that reads state through a
/// record also depends on the binding, so [`Record::clear_state`] forces
/// those readers to re-evaluate (and re-track against whatever record
/// replaced this one).
pub struct Record {
    id: usize,
    adapter: Arc<dyn ReactiveAdapter>,
    cell: RwLock<Option<Arc<StateCell>>>,
    computed: IndexMap<String, Memo>,
    guards: Mutex<Vec<WatchGuard>>,
    disposed: AtomicBool,
}

impl Record {
    /// Build a record over `cell` with one memo per computed definition.
    pub fn new(
        adapter: Arc<dyn ReactiveAdapter>,
        cell: Arc<StateCell>,
        computed: IndexMap<String, ComputedFn>,
    ) -> Arc<Self> {
        let id = adapter.next_id();
        let computed = computed
            .into_iter()
            .map(|(key, compute)| (key, Memo::new(Arc::clone(&adapter), compute)))
            .collect();

        Arc::new(Self {
            id,
            adapter,
            cell: RwLock::new(Some(cell)),
            computed,
            guards: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        })
    }

    /// The binding's source id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The bound state cell, or `None` once cleared. Tracks the binding.
    pub fn cell(&self) -> Option<Arc<StateCell>> {
        self.adapter.track_read(self.id);
        self.cell.read().clone()
    }

    /// Track the binding and the whole state tree behind it.
    pub fn touch(&self) {
        if let Some(cell) = self.cell() {
            cell.track();
        }
    }

    /// Read a computed value, using the cache when it is still valid.
    pub fn computed(&self, key: &str) -> Option<Value> {
        self.computed.get(key).map(Memo::get)
    }

    pub fn has_computed(&self, key: &str) -> bool {
        self.computed.contains_key(key)
    }

    pub fn computed_keys(&self) -> impl Iterator<Item = &str> {
        self.computed.keys().map(String::as_str)
    }

    /// Keep a watcher alive for as long as the record is.
    pub fn retain(&self, guard: WatchGuard) {
        self.guards.lock().push(guard);
    }

    /// Drop the state reference and notify everything bound through it.
    pub fn clear_state(&self) {
        self.cell.write().take();
        self.adapter.notify(self.id);
    }

    /// Unregister every computed and watcher from the runtime.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(record = self.id, "disposing reactive record");
        let guards = std::mem::take(&mut *self.guards.lock());
        drop(guards);
        for memo in self.computed.values() {
            memo.release();
        }
        self.adapter.remove_observer(self.id);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{watch, WatchOptions};
    use crate::runtime::ReactiveRuntime;
    use serde_json::json;

    #[test]
    fn computed_values_are_cached() {
        let runtime: Arc<dyn ReactiveAdapter> = ReactiveRuntime::new();
        let cell = StateCell::new(runtime.clone(), json!({ "n": 2 }));
        let mut computed: IndexMap<String, ComputedFn> = IndexMap::new();
        computed.insert("square".to_string(), {
            let cell = cell.clone();
            Arc::new(move || {
                let n = cell.with(|s| s["n"].as_i64().unwrap_or_default());
                json!(n * n)
            })
        });

        let record = Record::new(runtime, cell.clone(), computed);
        assert!(record.has_computed("square"));
        assert_eq!(record.computed("square"), Some(json!(4)));
        assert_eq!(record.computed("missing"), None);

        cell.update(|s| s["n"] = json!(3));
        assert_eq!(record.computed("square"), Some(json!(9)));
    }

    #[test]
    fn clear_state_wakes_readers_and_dispose_releases_observers() {
        let runtime = ReactiveRuntime::new();
        let adapter: Arc<dyn ReactiveAdapter> = runtime.clone();
        let cell = StateCell::new(adapter.clone(), json!({}));
        let record = Record::new(adapter.clone(), cell, IndexMap::new());
        let wakes = Arc::new(Mutex::new(0));

        let guard = watch(
            &adapter,
            {
                let record = record.clone();
                Arc::new(move || {
                    record.touch();
                    Value::Null
                })
            },
            {
                let wakes = wakes.clone();
                Arc::new(move |_: &Value, _: &Value| *wakes.lock() += 1)
            },
            WatchOptions::default().deep().sync(),
        );
        record.retain(guard);
        assert_eq!(runtime.observer_count(), 1);

        record.clear_state();
        assert_eq!(*wakes.lock(), 1);
        assert!(record.cell().is_none());

        record.dispose();
        assert!(record.is_disposed());
        assert_eq!(runtime.observer_count(), 0);
    }
}
