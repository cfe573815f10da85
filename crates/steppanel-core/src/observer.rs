//! Observer pattern for step lifecycle events.
//!
//! Renderers, plain-text reporters and loggers all subscribe the same way:
//! each mutation is delivered as a [`StepEvent`] together with the
//! [`Snapshot`] taken right after it.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::event::StepEvent;
use crate::snapshot::Snapshot;

/// Observer trait for receiving step events.
pub trait StepObserver: Send + Sync {
    /// Receive an event and the state right after it.
    fn on_event(&self, event: &StepEvent, snapshot: &Snapshot);
}

/// Subject that manages a collection of observers.
pub struct EventSubject {
    observers: RwLock<Vec<Arc<dyn StepObserver>>>,
}

impl EventSubject {
    /// Create a new subject with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Register an observer.
    pub fn register(&self, observer: Arc<dyn StepObserver>) {
        self.observers.write().push(observer);
    }

    /// Unregister all observers.
    pub fn clear(&self) {
        self.observers.write().clear();
    }

    /// Deliver one event to every observer, in registration order.
    pub fn notify(&self, event: &StepEvent, snapshot: &Snapshot) {
        let observers = self.observers.read();
        for observer in observers.iter() {
            observer.on_event(event, snapshot);
        }
    }

    /// Get the number of registered observers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.observers.read().len()
    }
}

impl Default for EventSubject {
    fn default() -> Self {
        Self::new()
    }
}
