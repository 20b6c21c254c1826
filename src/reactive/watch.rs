use super::{WatchCallback, WatchSource};
use crate::runtime::{with_observer, ReactiveAdapter};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{Arc, Weak};

/// How a watcher reacts to changes of its tracked sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Fire on every notification, without comparing old and new values.
    pub deep: bool,
    /// Run inside the notifying write instead of waiting for the next flush.
    pub sync: bool,
    /// Invoke the callback once at registration with `(value, Null)`.
    pub immediate: bool,
}

impl WatchOptions {
    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }

    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }
}

/// Watch `source` and call `callback` with `(new, old)` when it changes.
///
/// The source is evaluated once at registration to collect its
/// dependencies, and re-evaluated (re-tracking them) whenever one of them
/// notifies. Without [`WatchOptions::deep`], the callback only fires when the
/// new value differs from the previous one.
///
/// The watcher lives as long as the returned guard.
pub fn watch(
    adapter: &Arc<dyn ReactiveAdapter>,
    source: WatchSource,
    callback: WatchCallback,
    options: WatchOptions,
) -> WatchGuard {
    let id = adapter.next_id();
    let initial = with_observer(&**adapter, id, || source());
    let last = Arc::new(Mutex::new(initial.clone()));

    let weak = Arc::downgrade(adapter);
    let callback_clone = Arc::clone(&callback);
    let run = move || {
        let Some(adapter) = weak.upgrade() else {
            return;
        };
        let new_value = with_observer(&*adapter, id, || source());
        let old_value = std::mem::replace(&mut *last.lock(), new_value.clone());
        if options.deep || new_value != old_value {
            callback_clone(&new_value, &old_value);
        }
    };
    adapter.register_watcher(id, Arc::new(run), options.sync);

    if options.immediate {
        callback(&initial, &Value::Null);
    }

    WatchGuard {
        id,
        adapter: Arc::downgrade(adapter),
    }
}

/// RAII guard for watchers. Dropping it stops the watcher.
pub struct WatchGuard {
    id: usize,
    adapter: Weak<dyn ReactiveAdapter>,
}

impl WatchGuard {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Stop watching now.
    pub fn unwatch(self) {}
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(adapter) = self.adapter.upgrade() {
            adapter.remove_observer(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::StateCell;
    use crate::runtime::ReactiveRuntime;
    use serde_json::json;

    fn setup() -> (Arc<dyn ReactiveAdapter>, Arc<StateCell>) {
        let runtime: Arc<dyn ReactiveAdapter> = ReactiveRuntime::new();
        let cell = StateCell::new(runtime.clone(), json!({ "a": 1, "b": 1 }));
        (runtime, cell)
    }

    #[test]
    fn watcher_fires_only_on_value_change() {
        let (runtime, cell) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _guard = watch(
            &runtime,
            {
                let cell = cell.clone();
                Arc::new(move || cell.with(|state| state["a"].clone()))
            },
            {
                let seen = seen.clone();
                Arc::new(move |new: &Value, old: &Value| seen.lock().push((new.clone(), old.clone())))
            },
            WatchOptions::default().sync(),
        );

        cell.update(|state| state["b"] = json!(2));
        cell.update(|state| state["a"] = json!(3));
        assert_eq!(*seen.lock(), vec![(json!(3), json!(1))]);
    }

    #[test]
    fn deep_watcher_fires_on_every_write() {
        let (runtime, cell) = setup();
        let count = Arc::new(Mutex::new(0));

        let _guard = watch(
            &runtime,
            {
                let cell = cell.clone();
                Arc::new(move || {
                    cell.track();
                    Value::Null
                })
            },
            {
                let count = count.clone();
                Arc::new(move |_: &Value, _: &Value| *count.lock() += 1)
            },
            WatchOptions::default().deep().sync(),
        );

        cell.update(|state| state["a"] = json!(1));
        cell.update(|state| state["b"] = json!(5));
        assert_eq!(*count.lock(), 2);
    }

    #[test]
    fn lazy_watcher_waits_for_flush_and_batches() {
        let (runtime, cell) = setup();
        let count = Arc::new(Mutex::new(0));

        let _guard = watch(
            &runtime,
            {
                let cell = cell.clone();
                Arc::new(move || cell.with(|state| state["a"].clone()))
            },
            {
                let count = count.clone();
                Arc::new(move |_: &Value, _: &Value| *count.lock() += 1)
            },
            WatchOptions::default(),
        );

        cell.update(|state| state["a"] = json!(2));
        cell.update(|state| state["a"] = json!(3));
        assert_eq!(*count.lock(), 0);

        runtime.flush();
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn dropping_the_guard_stops_the_watcher() {
        let (runtime, cell) = setup();
        let count = Arc::new(Mutex::new(0));

        let guard = watch(
            &runtime,
            {
                let cell = cell.clone();
                Arc::new(move || cell.get())
            },
            {
                let count = count.clone();
                Arc::new(move |_: &Value, _: &Value| *count.lock() += 1)
            },
            WatchOptions::default().sync().immediate(),
        );
        assert_eq!(*count.lock(), 1);

        guard.unwatch();
        cell.update(|state| state["a"] = json!(9));
        assert_eq!(*count.lock(), 1);
    }
}
