use super::ComputedFn;
use crate::runtime::{with_observer, ReactiveAdapter};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// A memoized computed value that automatically tracks dependencies.
///
/// Memos only recompute when one of the sources read during the last
/// computation has changed since.
pub struct Memo {
    compute: ComputedFn,
    cached: RwLock<Option<Value>>,
    id: usize,
    adapter: Arc<dyn ReactiveAdapter>,
}

impl Memo {
    /// Create a new memo with the given computation function.
    pub fn new(adapter: Arc<dyn ReactiveAdapter>, compute: ComputedFn) -> Self {
        let id = adapter.next_id();

        // Register this as a memo with the runtime
        adapter.register_memo(id);

        Self {
            compute,
            cached: RwLock::new(None),
            id,
            adapter,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> Value {
        // Track this read in the reactive context
        self.adapter.track_read(self.id);

        if !self.adapter.is_memo_dirty(self.id) {
            if let Some(value) = self.cached.read().as_ref() {
                return value.clone();
            }
        }

        // Recompute within observer context to track dependencies
        let value = with_observer(&*self.adapter, self.id, || (self.compute)());
        *self.cached.write() = Some(value.clone());
        self.adapter.mark_memo_clean(self.id);
        value
    }

    /// Unregister from the runtime. The memo recomputes on every read afterwards.
    pub(crate) fn release(&self) {
        self.adapter.remove_observer(self.id);
        self.cached.write().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::StateCell;
    use crate::runtime::ReactiveRuntime;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn memo_caches_until_source_changes() {
        let runtime = ReactiveRuntime::new();
        let cell = StateCell::new(runtime.clone(), json!(5));
        let calls = Arc::new(AtomicUsize::new(0));

        let doubled = Memo::new(runtime, {
            let cell = cell.clone();
            let calls = calls.clone();
            Arc::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                json!(cell.get().as_i64().unwrap_or_default() * 2)
            })
        });

        assert_eq!(doubled.get(), json!(10));
        assert_eq!(doubled.get(), json!(10));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cell.replace(json!(10));
        assert_eq!(doubled.get(), json!(20));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn memo_chain_invalidates() {
        let runtime = ReactiveRuntime::new();
        let cell = StateCell::new(runtime.clone(), json!(1));

        let doubled = Arc::new(Memo::new(runtime.clone(), {
            let cell = cell.clone();
            Arc::new(move || json!(cell.get().as_i64().unwrap_or_default() * 2))
        }));
        let quadrupled = Memo::new(runtime, {
            let doubled = doubled.clone();
            Arc::new(move || json!(doubled.get().as_i64().unwrap_or_default() * 2))
        });

        assert_eq!(quadrupled.get(), json!(4));
        cell.replace(json!(5));
        assert_eq!(quadrupled.get(), json!(20));
    }
}
