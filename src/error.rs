//! Error types for store operations.
//!
//! Only programmer errors surface as [`StoreError`]. Fail-soft conditions
//! (unknown mutation or action types, duplicate getters) are reported through
//! `tracing` and never reach the caller as an error.

/// Errors returned by store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A module path points at state that does not exist in the tree.
    #[error("module state not found at path `{path}`")]
    ModuleStateNotFound { path: String },

    /// A module's state must be an object to host nested module state.
    #[error("state at `{path}` is not an object and cannot hold module state")]
    InvalidModuleState { path: String },

    /// Module paths passed to registration must name at least one key.
    #[error("module path must be a non-empty key or sequence of keys")]
    InvalidModulePath,

    /// `unregister_module` was called for a path that was never registered at runtime.
    #[error("no runtime module registered at `{path}`")]
    UnknownRuntimeModule { path: String },

    /// Object-style commits need an object carrying a string `type` field.
    #[error("mutation descriptor must be an object with a string `type` field")]
    InvalidDescriptor,

    /// The root state cannot be assigned directly.
    #[error("use store.replace_state() to explicitly replace store state")]
    DirectStateAssignment,
}
