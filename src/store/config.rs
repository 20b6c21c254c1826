use crate::runtime::{ReactiveAdapter, ReactiveRuntime};
use crate::scheduler::{Scheduler, TokioScheduler};
use std::fmt;
use std::sync::Arc;

/// Event name emitted to the devtool hook when an action fails.
pub const ACTION_ERROR_EVENT: &str = "corral:error";

/// Observer for action failures, e.g. a tracing or telemetry bridge.
///
/// The hook sees every rejected action before the error reaches the caller.
/// It cannot swallow or alter the error.
pub trait DevtoolHook: Send + Sync {
    fn emit(&self, event: &str, error: &anyhow::Error);
}

/// Store construction settings.
///
/// ```
/// use corral::scheduler::ManualScheduler;
/// use corral::{Module, Store, StoreConfig};
/// use std::sync::Arc;
///
/// let config = StoreConfig::default()
///     .strict(false)
///     .scheduler(Arc::new(ManualScheduler::new()));
/// let store = Store::with_config(Module::new(), config).unwrap();
/// assert!(store.getter_keys().is_empty());
/// ```
#[derive(Clone)]
pub struct StoreConfig {
    /// Watch the whole tree and panic on writes outside a mutation.
    pub strict: bool,
    pub adapter: Arc<dyn ReactiveAdapter>,
    /// Where disposal of replaced reactive records is deferred to. The
    /// default [`TokioScheduler`] spawns onto the current tokio runtime, or
    /// without one runs the disposal when the store starts its next operation.
    pub scheduler: Arc<dyn Scheduler>,
    pub devtool_hook: Option<Arc<dyn DevtoolHook>>,
}

impl StoreConfig {
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn adapter(mut self, adapter: Arc<dyn ReactiveAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn devtool_hook(mut self, hook: Arc<dyn DevtoolHook>) -> Self {
        self.devtool_hook = Some(hook);
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            strict: true,
            adapter: ReactiveRuntime::new(),
            scheduler: Arc::new(TokioScheduler::new()),
            devtool_hook: None,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("strict", &self.strict)
            .field("devtool_hook", &self.devtool_hook.is_some())
            .finish_non_exhaustive()
    }
}
