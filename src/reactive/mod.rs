//! Reactive bindings built on a [`ReactiveAdapter`](crate::runtime::ReactiveAdapter).
//!
//! - [`StateCell`] holds a state tree and notifies readers when it is written
//! - [`Memo`] caches a computed value until one of its sources changes
//! - [`watch`] runs a callback when a tracked expression changes
//! - [`Record`] binds a state cell and a set of computeds together, the unit
//!   the store swaps out on hot reload

mod cell;
mod memo;
mod record;
mod watch;

use serde_json::Value;
use std::sync::Arc;

pub use cell::StateCell;
pub use memo::Memo;
pub use record::Record;
pub use watch::{watch, WatchGuard, WatchOptions};

/// Computed definition: evaluated lazily and cached by a [`Memo`].
pub type ComputedFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Expression evaluated by a watcher. Every source it reads is tracked.
pub type WatchSource = Arc<dyn Fn() -> Value + Send + Sync>;

/// Watcher callback, invoked with `(new, old)`.
pub type WatchCallback = Arc<dyn Fn(&Value, &Value) + Send + Sync>;
