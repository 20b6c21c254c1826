//! Runtime support for reactive bindings.
//!
//! The store does not track dependencies itself. Everything it needs from a
//! reactivity runtime goes through the [`ReactiveAdapter`] trait: observer ids,
//! read tracking, change notification, memo dirtiness and watcher scheduling.
//! [`ReactiveRuntime`] is the bundled implementation.

mod context;

pub use context::{with_observer, ReactiveAdapter, ReactiveRuntime};
