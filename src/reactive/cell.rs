use crate::error::StoreError;
use crate::path::resolve_local_state_mut;
use crate::runtime::ReactiveAdapter;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A reactive container for a state tree.
///
/// Reads are tracked against the current observer and every write notifies
/// the adapter once the write lock has been released. Nested writes through
/// a borrowed `&mut Value` are visible to watchers as a change of the whole
/// cell, which is what deep watches need.
pub struct StateCell {
    id: usize,
    value: RwLock<Value>,
    adapter: Arc<dyn ReactiveAdapter>,
}

impl StateCell {
    /// Create a new cell holding `initial`.
    pub fn new(adapter: Arc<dyn ReactiveAdapter>, initial: Value) -> Arc<Self> {
        let id = adapter.next_id();
        Arc::new(Self {
            value: RwLock::new(initial),
            id,
            adapter,
        })
    }

    /// The cell's source id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Record a read without looking at the value.
    pub fn track(&self) {
        self.adapter.track_read(self.id);
    }

    /// Get a clone of the current tree.
    pub fn get(&self) -> Value {
        self.with(Value::clone)
    }

    /// Read the tree with a function without cloning.
    ///
    /// Readers may nest (a getter reading another getter), so the read lock
    /// is taken recursively.
    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        self.track();
        let value = self.value.read_recursive();
        f(&value)
    }

    /// Write the tree using a function, then notify.
    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let result = {
            let mut value = self.value.write();
            f(&mut value)
        };
        self.adapter.notify(self.id);
        result
    }

    /// Swap in a whole new tree, returning the old one.
    pub fn replace(&self, new_value: Value) -> Value {
        self.update(|value| std::mem::replace(value, new_value))
    }

    /// Add or overwrite `key` on the object at `parent`.
    pub fn set(&self, parent: &[String], key: &str, new_value: Value) -> Result<(), StoreError> {
        self.update(|root| {
            let slot = object_at(root, parent)?;
            slot.insert(key.to_owned(), new_value);
            Ok(())
        })
    }

    /// Remove `key` from the object at `parent`, returning what was there.
    pub fn delete(&self, parent: &[String], key: &str) -> Result<Option<Value>, StoreError> {
        self.update(|root| object_at(root, parent).map(|slot| slot.remove(key)))
    }
}

fn object_at<'a>(root: &'a mut Value, path: &[String]) -> Result<&'a mut Map<String, Value>, StoreError> {
    resolve_local_state_mut(root, path)?
        .as_object_mut()
        .ok_or_else(|| StoreError::InvalidModuleState {
            path: path.join("."),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{with_observer, ReactiveRuntime};
    use serde_json::json;

    #[test]
    fn cell_get_update() {
        let cell = StateCell::new(ReactiveRuntime::new(), json!({ "count": 0 }));
        cell.update(|state| state["count"] = json!(2));
        assert_eq!(cell.get(), json!({ "count": 2 }));
        assert_eq!(cell.replace(json!({})), json!({ "count": 2 }));
    }

    #[test]
    fn structural_set_and_delete_notify() {
        let runtime = ReactiveRuntime::new();
        let cell = StateCell::new(runtime.clone(), json!({ "a": {} }));
        let memo = runtime.next_id();
        runtime.register_memo(memo);
        with_observer(&*runtime, memo, || cell.track());
        runtime.mark_memo_clean(memo);

        let parent = ["a".to_string()];
        cell.set(&parent, "b", json!({ "n": 1 })).unwrap();
        assert!(runtime.is_memo_dirty(memo));
        assert_eq!(cell.get()["a"]["b"]["n"], 1);

        runtime.mark_memo_clean(memo);
        with_observer(&*runtime, memo, || cell.track());
        assert_eq!(cell.delete(&parent, "b").unwrap(), Some(json!({ "n": 1 })));
        assert!(runtime.is_memo_dirty(memo));
        assert_eq!(cell.get(), json!({ "a": {} }));
    }

    #[test]
    fn set_on_non_object_parent_fails() {
        let cell = StateCell::new(ReactiveRuntime::new(), json!({ "a": 3 }));
        let err = cell.set(&["a".to_string()], "b", json!({})).unwrap_err();
        assert!(matches!(err, StoreError::InvalidModuleState { .. }));
    }
}
