use std::{
    cell::RefCell,
    collections::HashSet,
    mem::swap,
    rc::{Rc, Weak},
    thread::AccessError,
};

use tracing::trace;

use crate::kvo::WeakKeyObservers;


thread_local! {
    static GLOBALS: RefCell<Globals> = RefCell::new(Globals::new());
}

struct Globals {
    depth: usize,
    pending: Vec<PendingTask>,
    queued: HashSet<TaskId>,
    next_id: usize,
}
impl Globals {
    fn new() -> Self {
        Self {
            depth: 0,
            pending: Vec::new(),
            queued: HashSet::new(),
            next_id: 0,
        }
    }
    fn with<T>(f: impl FnOnce(&mut Self) -> T) -> T {
        GLOBALS.with(|g| f(&mut g.borrow_mut()))
    }
    fn try_with<T>(f: impl FnOnce(&mut Self) -> T) -> Result<T, AccessError> {
        GLOBALS.try_with(|g| f(&mut g.borrow_mut()))
    }
    fn push(&mut self, id: TaskId, task: PendingTask) {
        if self.queued.insert(id) {
            self.pending.push(task);
        }
    }
    fn take_pending(tasks: &mut Vec<PendingTask>) -> bool {
        Self::with(|g| {
            if g.depth == 0 {
                swap(tasks, &mut g.pending);
                g.queued.clear();
            }
        });
        !tasks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TaskId {
    Property(usize, String),
    Flush(usize),
}

enum PendingTask {
    Property {
        observers: WeakKeyObservers,
        key: String,
    },
    Flush(Weak<dyn Flush>),
}
impl PendingTask {
    fn run(self) {
        match self {
            PendingTask::Property { observers, key } => {
                if let Some(observers) = observers.upgrade() {
                    observers.notify_now(&key);
                }
            }
            PendingTask::Flush(node) => {
                if let Some(node) = node.upgrade() {
                    node.flush();
                }
            }
        }
    }
}

/// Work deferred until the outermost batch scope ends.
pub(crate) trait Flush: 'static {
    fn flush(self: Rc<Self>);
}

pub(crate) fn next_id() -> usize {
    Globals::with(|g| {
        let id = g.next_id;
        g.next_id += 1;
        id
    })
}

/// Starts a batch scope.
///
/// Property notifications raised until the matching [`end_property_changes`] are
/// deferred, deduplicated, and delivered when the outermost scope ends.
pub fn begin_property_changes() {
    Globals::with(|g| g.depth += 1);
}

/// Ends a batch scope started by [`begin_property_changes`].
///
/// Panics if there is no open batch scope.
pub fn end_property_changes() {
    let is_outermost = Globals::with(|g| {
        assert!(
            g.depth > 0,
            "`end_property_changes` called without `begin_property_changes`"
        );
        g.depth -= 1;
        g.depth == 0
    });
    if is_outermost {
        flush_pending();
    }
}

/// Returns `true` while a batch scope is open on this thread.
pub fn is_batching() -> bool {
    Globals::with(|g| g.depth > 0)
}

/// Calls `f` inside a batch scope.
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    let _guard = BatchGuard::new();
    f()
}

/// RAII form of [`begin_property_changes`] / [`end_property_changes`].
#[must_use]
pub struct BatchGuard(());

impl BatchGuard {
    pub fn new() -> Self {
        begin_property_changes();
        Self(())
    }
}
impl Default for BatchGuard {
    fn default() -> Self {
        Self::new()
    }
}
impl Drop for BatchGuard {
    fn drop(&mut self) {
        let is_outermost = Globals::try_with(|g| {
            g.depth = g.depth.saturating_sub(1);
            g.depth == 0
        });
        if let Ok(true) = is_outermost {
            flush_pending();
        }
    }
}

fn flush_pending() {
    let mut tasks = Vec::new();
    while Globals::take_pending(&mut tasks) {
        trace!(count = tasks.len(), "flush deferred notifications");
        for task in tasks.drain(..) {
            task.run();
        }
    }
}

pub(crate) fn notify_property(observers: WeakKeyObservers, id: usize, key: &str) {
    let deferred = Globals::with(|g| {
        if g.depth == 0 {
            return false;
        }
        g.push(
            TaskId::Property(id, key.to_string()),
            PendingTask::Property {
                observers: observers.clone(),
                key: key.to_string(),
            },
        );
        true
    });
    if !deferred {
        if let Some(observers) = observers.upgrade() {
            observers.notify_now(key);
        }
    }
}

pub(crate) fn schedule_flush(node: Weak<dyn Flush>, id: usize) {
    let deferred = Globals::with(|g| {
        if g.depth == 0 {
            return false;
        }
        g.push(TaskId::Flush(id), PendingTask::Flush(node.clone()));
        true
    });
    if !deferred {
        if let Some(node) = node.upgrade() {
            node.flush();
        }
    }
}
