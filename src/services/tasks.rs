// src/services/tasks.rs
//
// Task Executor - runs collaborator calls off the serialized context
//
// CRITICAL RULES:
// - Remote and cache calls run on the tokio worker pool
// - Results are never applied on the worker; they are marshalled back as state updates
// - A completion is submitted before the task stops counting as in flight
// - No cancellation: a spawned task always completes

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::AppResult;
use crate::state::MoviesState;

/// A deferred mutation of the store, applied on the serialized context
pub type StateUpdate = Box<dyn FnOnce(&mut MoviesState) + Send>;

/// Where finished tasks deliver their state updates
pub trait CompletionSink: Send + Sync {
    fn submit(&self, update: StateUpdate);
}

#[derive(Clone)]
pub struct TaskExecutor {
    sink: Arc<dyn CompletionSink>,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight counter even if the task panics
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TaskExecutor {
    pub fn new(sink: Arc<dyn CompletionSink>) -> Self {
        Self {
            sink,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `task` on the worker pool, then hand its result to `complete` on the
    /// serialized context.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T, Fut, F>(&self, label: &'static str, task: Fut, complete: F)
    where
        T: Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
        F: FnOnce(&mut MoviesState, AppResult<T>) + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        let sink = Arc::clone(&self.sink);

        log::debug!("[TASK] {} started", label);

        tokio::spawn(async move {
            let _guard = guard;
            let result = task.await;

            match &result {
                Ok(_) => log::debug!("[TASK] {} finished", label),
                Err(e) => log::warn!("[TASK] {} failed: {}", label, e),
            }

            sink.submit(Box::new(move |state: &mut MoviesState| complete(state, result)));
        });
    }

    /// Tasks spawned but not yet delivered
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
