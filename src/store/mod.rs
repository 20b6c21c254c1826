//! The store: a single state tree changed only through mutations.
//!
//! Stores own the root state tree, flat registries of mutations, actions and
//! getters installed from a module tree, and the reactive record that caches
//! getters and watches for writes made outside a mutation.

mod config;
mod context;
mod install;
mod mutation;
mod store;

pub use config::{DevtoolHook, StoreConfig, ACTION_ERROR_EVENT};
pub use context::{ActionContext, Getters};
pub use mutation::{CommitOptions, Mutation, Subscriber, Unsubscribe};
pub use store::{StateHandle, Store, STRICT_MODE_VIOLATION};
