//! Module definitions and the flat handler registries they are installed into.
//!
//! A [`Module`] is a declarative unit of state, mutations, actions, getters
//! and nested modules. Installing a module tree flattens its handlers into a
//! [`Registry`] keyed by type, each handler closing over its module's path.

mod definition;
mod registry;

pub use definition::{
    ActionFn, ActionReturn, DispatchFuture, GetterFn, HotUpdate, Module, MutationFn,
};
pub(crate) use definition::start;
pub(crate) use registry::Registry;
