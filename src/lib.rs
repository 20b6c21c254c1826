//! # Corral
//!
//! A centralized, mutation-controlled state container for reactive
//! applications.
//!
//! A [`Store`] owns a single state tree. The tree changes only through
//! **mutations**, synchronous handlers registered by type. **Actions** do
//! asynchronous orchestration and commit mutations. **Getters** derive values
//! from state and are cached until the state they read changes.
//!
//! ## Modules
//!
//! Stores are built from a tree of [`Module`]s. Each module's state is nested
//! under its parent's state at the module key, and its handlers receive that
//! local slice. Modules can be added and removed at runtime, and handler
//! definitions can be hot-swapped without losing state.
//!
//! ## Reactivity
//!
//! Dependency tracking is delegated to a [`runtime::ReactiveAdapter`]; the
//! bundled [`runtime::ReactiveRuntime`] is used unless another one is
//! configured. In strict mode (the default) a deep synchronous watch over the
//! tree panics on any write made outside a mutation.
//!
//! ```
//! use corral::{Module, Store};
//! use serde_json::json;
//!
//! let store = Store::new(
//!     Module::new()
//!         .state(json!({ "count": 0 }))
//!         .mutation("increment", |state, n| {
//!             let count = state["count"].as_i64().unwrap_or(0);
//!             state["count"] = json!(count + n.as_i64().unwrap_or(1));
//!         })
//!         .action("incrementTwice", |ctx, n| {
//!             ctx.commit("increment", n.clone())?;
//!             ctx.commit("increment", n)?;
//!             Ok(json!(null))
//!         })
//!         .getter("isPositive", |state, _, _| json!(state["count"].as_i64().unwrap_or(0) > 0)),
//! )
//! .unwrap();
//!
//! futures::executor::block_on(store.dispatch("incrementTwice", json!(2)).unwrap()).unwrap();
//! assert_eq!(store.state()["count"], 4);
//! assert_eq!(store.getters().get("isPositive"), Some(json!(true)));
//! ```

pub mod error;
pub mod helpers;
pub mod module;
pub mod path;
pub mod reactive;
pub mod runtime;
pub mod scheduler;
pub mod store;

// Re-export main types for convenience
pub use error::StoreError;
pub use module::{ActionReturn, DispatchFuture, HotUpdate, Module};
pub use path::ModulePath;
pub use reactive::{WatchGuard, WatchOptions};
pub use store::{
    ActionContext, CommitOptions, DevtoolHook, Getters, Mutation, StateHandle, Store, StoreConfig,
    Subscriber, Unsubscribe,
};
