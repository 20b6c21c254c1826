use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Upper bound on flush passes before queued watchers are considered to be
/// re-triggering each other forever.
const MAX_FLUSH_PASSES: usize = 100;

static NEXT_RUNTIME_KEY: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    // Current observer of each runtime on this thread, keyed by runtime.
    static CURRENT_OBSERVERS: RefCell<HashMap<usize, usize>> = RefCell::new(HashMap::new());
}

/// Dependency-tracking capability consumed by the store.
///
/// Sources (state cells, record bindings, memos) and observers (memos,
/// watchers) share one id space. An observer running between
/// [`enter_observer`](ReactiveAdapter::enter_observer) and
/// [`exit_observer`](ReactiveAdapter::exit_observer) records an edge for every
/// source passed to [`track_read`](ReactiveAdapter::track_read) on the same
/// thread.
/// [`notify`](ReactiveAdapter::notify) marks dependent memos dirty and runs or
/// queues dependent watchers.
pub trait ReactiveAdapter: Send + Sync {
    /// Allocate a fresh id for a source or observer.
    fn next_id(&self) -> usize;

    /// Record that the current observer, if any, read `source`.
    fn track_read(&self, source: usize);

    /// Propagate a change of `source` to everything that read it.
    fn notify(&self, source: usize);

    /// Register a memo, initially dirty.
    fn register_memo(&self, id: usize);

    fn is_memo_dirty(&self, id: usize) -> bool;

    fn mark_memo_clean(&self, id: usize);

    /// Register a watcher body. `sync` watchers run inside [`notify`](ReactiveAdapter::notify);
    /// others are queued until [`flush`](ReactiveAdapter::flush).
    fn register_watcher(&self, id: usize, run: Arc<dyn Fn() + Send + Sync>, sync: bool);

    /// Make `id` the current observer, dropping the dependencies it recorded
    /// last time. Returns the previous observer.
    fn enter_observer(&self, id: usize) -> Option<usize>;

    fn exit_observer(&self, previous: Option<usize>);

    /// Forget an observer and every edge touching it.
    fn remove_observer(&self, id: usize);

    /// Run queued watchers until the queue is empty.
    fn flush(&self);
}

/// Run `f` with `id` as the current observer, restoring the previous one
/// afterwards even if `f` unwinds.
pub fn with_observer<R>(adapter: &dyn ReactiveAdapter, id: usize, f: impl FnOnce() -> R) -> R {
    struct Restore<'a> {
        adapter: &'a dyn ReactiveAdapter,
        previous: Option<usize>,
    }

    impl Drop for Restore<'_> {
        fn drop(&mut self) {
            self.adapter.exit_observer(self.previous);
        }
    }

    let _restore = Restore {
        adapter,
        previous: adapter.enter_observer(id),
    };
    f()
}

struct Watcher {
    run: Arc<dyn Fn() + Send + Sync>,
    sync: bool,
}

/// Dependency graph for one runtime.
struct ReactiveContext {
    // Map from source ID to set of observer IDs that depend on it
    dependencies: HashMap<usize, HashSet<usize>>,
    // Map from observer ID to set of source IDs it depends on
    observer_deps: HashMap<usize, HashSet<usize>>,
    watchers: HashMap<usize, Watcher>,
    memo_dirty: HashMap<usize, bool>,
    pending: Vec<usize>,
}

impl ReactiveContext {
    fn new() -> Self {
        Self {
            dependencies: HashMap::new(),
            observer_deps: HashMap::new(),
            watchers: HashMap::new(),
            memo_dirty: HashMap::new(),
            pending: Vec::new(),
        }
    }

    fn clear_dependencies(&mut self, observer_id: usize) {
        if let Some(old_deps) = self.observer_deps.remove(&observer_id) {
            for source_id in old_deps {
                if let Some(deps) = self.dependencies.get_mut(&source_id) {
                    deps.remove(&observer_id);
                }
            }
        }
    }
}

/// What a dirty-marking pass decided to do with an observer.
enum Reaction {
    Propagate(Vec<usize>),
    Run(Arc<dyn Fn() + Send + Sync>),
    Nothing,
}

/// The bundled reactive runtime.
///
/// Each store owns a handle to one runtime; there is no global instance.
/// Create a dedicated runtime per store, or share one between stores that
/// should observe each other.
///
/// # Examples
///
/// ```
/// use corral::runtime::{with_observer, ReactiveAdapter, ReactiveRuntime};
///
/// let runtime = ReactiveRuntime::new();
/// let source = runtime.next_id();
/// let memo = runtime.next_id();
/// runtime.register_memo(memo);
///
/// with_observer(&*runtime, memo, || runtime.track_read(source));
/// runtime.mark_memo_clean(memo);
///
/// runtime.notify(source);
/// assert!(runtime.is_memo_dirty(memo));
/// ```
pub struct ReactiveRuntime {
    key: usize,
    next_id: AtomicUsize,
    context: Mutex<ReactiveContext>,
}

impl ReactiveRuntime {
    /// Create a new isolated runtime.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            key: NEXT_RUNTIME_KEY.fetch_add(1, Ordering::Relaxed),
            next_id: AtomicUsize::new(0),
            context: Mutex::new(ReactiveContext::new()),
        })
    }

    /// Number of live observers. Useful to check that disposal released
    /// everything.
    pub fn observer_count(&self) -> usize {
        let ctx = self.context.lock();
        ctx.watchers.len() + ctx.memo_dirty.len()
    }

    /// The observer running on this thread, if any.
    fn current_observer(&self) -> Option<usize> {
        CURRENT_OBSERVERS.with(|observers| observers.borrow().get(&self.key).copied())
    }

    /// Set this thread's current observer, returning the previous one.
    fn set_current_observer(&self, observer: Option<usize>) -> Option<usize> {
        CURRENT_OBSERVERS.with(|observers| {
            let mut observers = observers.borrow_mut();
            match observer {
                Some(id) => observers.insert(self.key, id),
                None => observers.remove(&self.key),
            }
        })
    }

    /// Mark an observer dirty and decide what to do about it.
    fn react(&self, observer_id: usize) -> Reaction {
        let mut ctx = self.context.lock();

        if let Some(dirty) = ctx.memo_dirty.get_mut(&observer_id) {
            if *dirty {
                return Reaction::Nothing;
            }
            *dirty = true;
            let dependents = ctx
                .dependencies
                .get(&observer_id)
                .map(|deps| deps.iter().copied().collect())
                .unwrap_or_default();
            return Reaction::Propagate(dependents);
        }

        let watcher = match ctx.watchers.get(&observer_id) {
            Some(watcher) if watcher.sync => Some(Arc::clone(&watcher.run)),
            Some(_) => None,
            None => return Reaction::Nothing,
        };
        match watcher {
            Some(run) => Reaction::Run(run),
            None => {
                if !ctx.pending.contains(&observer_id) {
                    ctx.pending.push(observer_id);
                }
                Reaction::Nothing
            }
        }
    }

    fn mark_observer_dirty(&self, observer_id: usize) {
        // The context lock is released before recursing or running a watcher.
        match self.react(observer_id) {
            Reaction::Propagate(dependents) => {
                for dependent_id in dependents {
                    self.mark_observer_dirty(dependent_id);
                }
            }
            Reaction::Run(run) => run(),
            Reaction::Nothing => {}
        }
    }
}

impl ReactiveAdapter for ReactiveRuntime {
    fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn track_read(&self, source: usize) {
        if let Some(current_observer) = self.current_observer() {
            if current_observer == source {
                return;
            }
            let mut ctx = self.context.lock();
            ctx.dependencies
                .entry(source)
                .or_default()
                .insert(current_observer);
            ctx.observer_deps
                .entry(current_observer)
                .or_default()
                .insert(source);
        }
    }

    fn notify(&self, source: usize) {
        let observers: Vec<usize> = {
            let ctx = self.context.lock();
            ctx.dependencies
                .get(&source)
                .map(|obs| obs.iter().copied().collect())
                .unwrap_or_default()
        };

        for observer_id in observers {
            self.mark_observer_dirty(observer_id);
        }
    }

    fn register_memo(&self, id: usize) {
        self.context.lock().memo_dirty.insert(id, true);
    }

    fn is_memo_dirty(&self, id: usize) -> bool {
        self.context
            .lock()
            .memo_dirty
            .get(&id)
            .copied()
            .unwrap_or(true)
    }

    fn mark_memo_clean(&self, id: usize) {
        if let Some(dirty) = self.context.lock().memo_dirty.get_mut(&id) {
            *dirty = false;
        }
    }

    fn register_watcher(&self, id: usize, run: Arc<dyn Fn() + Send + Sync>, sync: bool) {
        self.context
            .lock()
            .watchers
            .insert(id, Watcher { run, sync });
    }

    fn enter_observer(&self, id: usize) -> Option<usize> {
        self.context.lock().clear_dependencies(id);
        self.set_current_observer(Some(id))
    }

    fn exit_observer(&self, previous: Option<usize>) {
        self.set_current_observer(previous);
    }

    fn remove_observer(&self, id: usize) {
        let mut ctx = self.context.lock();
        ctx.watchers.remove(&id);
        ctx.memo_dirty.remove(&id);
        ctx.pending.retain(|pending| *pending != id);
        ctx.clear_dependencies(id);
        // Nobody can read a removed memo again.
        ctx.dependencies.remove(&id);
    }

    fn flush(&self) {
        for _ in 0..MAX_FLUSH_PASSES {
            let batch: Vec<Arc<dyn Fn() + Send + Sync>> = {
                let mut ctx = self.context.lock();
                let pending = std::mem::take(&mut ctx.pending);
                pending
                    .into_iter()
                    .filter_map(|id| ctx.watchers.get(&id).map(|w| Arc::clone(&w.run)))
                    .collect()
            };
            if batch.is_empty() {
                return;
            }
            for run in batch {
                run();
            }
        }
        tracing::warn!(
            passes = MAX_FLUSH_PASSES,
            "watchers kept re-triggering each other; remaining callbacks left queued"
        );
    }
}
