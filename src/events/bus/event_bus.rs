// src/events/bus/event_bus.rs
//
// Core event bus implementation.
//
// DESIGN PRINCIPLES:
// 1. Synchronous - handlers execute on the emitting thread in subscription order
// 2. Queued - an event emitted from inside a handler runs after the current dispatch
// 3. Observable - every emission is logged
// 4. Type-safe - events are strongly typed
// 5. No magic - explicit, straightforward code

use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::events::types::StateEvent;

/// Type-erased event handler function
/// Takes a reference to Any (downcasted to concrete event type inside)
type EventHandler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Bounded in-memory history of emissions
const EVENT_LOG_CAPACITY: usize = 256;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct PendingEvent {
    type_id: TypeId,
    event_type: &'static str,
    event: Box<dyn Any + Send>,
}

/// The Event Bus
///
/// Owned by the shared state store; the store emits on every mutation and the view
/// controller subscribes to the topics it renders.
///
/// Key characteristics:
/// - Handlers for one event run in subscription order
/// - Re-entrant emits are queued, never recursed into
/// - A panicking handler does not stop the others
/// - Observable through logging
pub struct EventBus {
    /// Map from event TypeId to list of handlers
    handlers: Arc<RwLock<HashMap<TypeId, Vec<(SubscriptionId, EventHandler)>>>>,

    /// Events waiting for dispatch
    pending: Arc<Mutex<VecDeque<PendingEvent>>>,

    /// Set while some caller is draining `pending`
    dispatching: Arc<AtomicBool>,

    next_subscription: Arc<AtomicU64>,

    /// Event emission log (for debugging)
    event_log: Arc<RwLock<VecDeque<EventLogEntry>>>,
}

/// A logged event for debugging and tracing
#[derive(Debug, Clone)]
pub struct EventLogEntry {
    pub event_type: String,
    pub event_id: String,
    pub occurred_at: String,
    pub handler_count: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            pending: Arc::new(Mutex::new(VecDeque::new())),
            dispatching: Arc::new(AtomicBool::new(false)),
            next_subscription: Arc::new(AtomicU64::new(1)),
            event_log: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    /// Subscribe to a specific event type
    ///
    /// Handlers are executed in the order they are subscribed.
    ///
    /// Example:
    /// ```ignore
    /// bus.subscribe::<WatchlistChanged, _>(|event| {
    ///     log::info!("watchlist changed at {}", event.occurred_at);
    /// });
    /// ```
    pub fn subscribe<E, F>(&self, handler: F) -> SubscriptionId
    where
        E: StateEvent,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<E>();
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));

        // Wrap the typed handler in a type-erased closure
        let wrapped: EventHandler = Arc::new(move |event_any: &dyn Any| {
            if let Some(event) = event_any.downcast_ref::<E>() {
                handler(event);
            } else {
                log::error!(
                    "Failed to downcast event in handler for {}",
                    std::any::type_name::<E>()
                );
            }
        });

        let mut handlers = self.handlers.write().unwrap();
        handlers.entry(type_id).or_default().push((id, wrapped));
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap();
        let mut removed = false;
        for list in handlers.values_mut() {
            let before = list.len();
            list.retain(|(sub, _)| *sub != id);
            removed |= list.len() != before;
        }
        removed
    }

    /// Emit an event
    ///
    /// The event is logged and queued. If no dispatch is running, this call drains the
    /// queue, executing all handlers for each event in subscription order. If a dispatch
    /// is already running (a handler emitted), the event runs after the current one.
    pub fn emit<E>(&self, event: E)
    where
        E: StateEvent,
    {
        let type_id = TypeId::of::<E>();
        let handler_count = self.handler_count(type_id);

        let log_entry = EventLogEntry {
            event_type: event.event_type().to_string(),
            event_id: event.event_id().to_string(),
            occurred_at: event.occurred_at().to_rfc3339(),
            handler_count,
        };

        log::debug!(
            "[EVENT] {} (id: {}) | {} handlers",
            log_entry.event_type,
            log_entry.event_id,
            log_entry.handler_count
        );

        {
            let mut log = self.event_log.write().unwrap();
            if log.len() == EVENT_LOG_CAPACITY {
                log.pop_front();
            }
            log.push_back(log_entry);
        }

        self.pending.lock().unwrap().push_back(PendingEvent {
            type_id,
            event_type: event.event_type(),
            event: Box::new(event),
        });

        self.drain();
    }

    fn drain(&self) {
        loop {
            if self.dispatching.swap(true, Ordering::SeqCst) {
                // An outer emit owns the queue
                return;
            }

            loop {
                let next = self.pending.lock().unwrap().pop_front();
                match next {
                    Some(pending) => self.dispatch(pending),
                    None => break,
                }
            }

            self.dispatching.store(false, Ordering::SeqCst);

            // Another thread may have queued between the last pop and the release
            if self.pending.lock().unwrap().is_empty() {
                return;
            }
        }
    }

    fn dispatch(&self, pending: PendingEvent) {
        // Snapshot so handlers may subscribe/unsubscribe without deadlocking
        let handlers: Vec<EventHandler> = {
            let handlers = self.handlers.read().unwrap();
            handlers
                .get(&pending.type_id)
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        for (idx, handler) in handlers.iter().enumerate() {
            // Catch panics to prevent one handler from breaking others
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(pending.event.as_ref() as &dyn Any);
            }));

            if let Err(e) = result {
                log::error!(
                    "Handler {} for {} panicked: {:?}",
                    idx,
                    pending.event_type,
                    e
                );
            }
        }
    }

    fn handler_count(&self, type_id: TypeId) -> usize {
        let handlers = self.handlers.read().unwrap();
        handlers.get(&type_id).map(|h| h.len()).unwrap_or(0)
    }

    /// Get the event log (for debugging)
    pub fn get_event_log(&self) -> Vec<EventLogEntry> {
        self.event_log.read().unwrap().iter().cloned().collect()
    }

    /// Clear the event log
    pub fn clear_event_log(&self) {
        self.event_log.write().unwrap().clear();
    }

    /// Get the number of subscribers for a specific event type
    pub fn subscriber_count<E>(&self) -> usize
    where
        E: 'static,
    {
        self.handler_count(TypeId::of::<E>())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// Make EventBus cloneable (shared reference)
impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
            pending: Arc::clone(&self.pending),
            dispatching: Arc::clone(&self.dispatching),
            next_subscription: Arc::clone(&self.next_subscription),
            event_log: Arc::clone(&self.event_log),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.handlers.read().unwrap().len())
            .finish()
    }
}
