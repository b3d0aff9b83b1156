//! Ambient, per-call-chain context.
//!
//! Each scope pushes a frame onto a task-local chain. A lookup walks the
//! chain from the innermost frame outwards and returns the first frame that
//! belongs to the asking store, so nested scopes shadow their parent for
//! their own extent and vanish when it ends. Frames are immutable once
//! created; a nested scope never mutates the parent's value.

use crate::value::{ContextMap, LogValue};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

tokio::task_local! {
    static FRAME: Option<Arc<Frame>>;
}

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

struct Frame {
    store: u64,
    context: Arc<ContextMap>,
    parent: Option<Arc<Frame>>,
}

/// Handle to an ambient context store. Clones refer to the same store.
#[derive(Debug, Clone)]
pub struct ContextStore {
    id: u64,
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStore {
    pub fn new() -> Self {
        ContextStore {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Run `fut` with `context` visible to everything it awaits.
    pub fn scope<F>(&self, context: ContextMap, fut: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        FRAME.scope(Some(self.push(context)), fut)
    }

    /// Synchronous counterpart of [`ContextStore::scope`].
    pub fn sync_scope<R>(&self, context: ContextMap, f: impl FnOnce() -> R) -> R {
        FRAME.sync_scope(Some(self.push(context)), f)
    }

    /// Context currently visible to this store, empty outside any scope.
    pub fn current(&self) -> ContextMap {
        self.lookup()
            .map(|context| context.as_ref().clone())
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<LogValue> {
        self.lookup().and_then(|context| context.get(key).cloned())
    }

    /// Current context overlaid with `extra`, for scopes that should inherit
    /// rather than replace the enclosing value.
    pub fn derive(&self, extra: ContextMap) -> ContextMap {
        let mut context = self.current();
        context.extend(extra);
        context
    }

    /// Carry the caller's whole scope chain into `fut`, typically a future
    /// about to be handed to `tokio::spawn`.
    pub fn propagate<F>(fut: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        FRAME.scope(current_frame(), fut)
    }

    fn push(&self, context: ContextMap) -> Arc<Frame> {
        Arc::new(Frame {
            store: self.id,
            context: Arc::new(context),
            parent: current_frame(),
        })
    }

    fn lookup(&self) -> Option<Arc<ContextMap>> {
        let mut frame = current_frame();
        while let Some(f) = frame {
            if f.store == self.id {
                return Some(Arc::clone(&f.context));
            }
            frame = f.parent.clone();
        }
        None
    }
}

fn current_frame() -> Option<Arc<Frame>> {
    FRAME.try_with(|frame| frame.clone()).ok().flatten()
}
