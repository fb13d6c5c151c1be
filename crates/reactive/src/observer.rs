//! Observers attached to a stream.
//!
//! This module provides the observer callbacks and a registry for tracking
//! the observers of a single stream.

use crate::service::{ObserverId, StreamSnapshot};
use hashbrown::HashMap;
use std::rc::Rc;
use tether_core::StreamError;

/// Callback for result notifications.
pub type NextCallback = Rc<dyn Fn(&StreamSnapshot)>;

/// Callback for error notifications.
pub type ErrorCallback = Rc<dyn Fn(&StreamError)>;

/// A pair of callbacks receiving a stream's pushes.
#[derive(Clone)]
pub struct Observer {
    next: NextCallback,
    error: ErrorCallback,
}

impl Observer {
    /// Creates a new observer.
    pub fn new<N, E>(next: N, error: E) -> Self
    where
        N: Fn(&StreamSnapshot) + 'static,
        E: Fn(&StreamError) + 'static,
    {
        Self {
            next: Rc::new(next),
            error: Rc::new(error),
        }
    }

    /// Delivers a result.
    #[inline]
    pub fn on_next(&self, snapshot: &StreamSnapshot) {
        (self.next)(snapshot);
    }

    /// Delivers an error.
    #[inline]
    pub fn on_error(&self, error: &StreamError) {
        (self.error)(error);
    }
}

/// Tracks the observers of one stream.
///
/// Callbacks are handed out as cheap clones so a stream can release its
/// borrow of the registry before invoking them.
pub struct ObserverRegistry {
    /// Attached observers
    observers: HashMap<ObserverId, Observer>,
    /// Next observer ID to assign
    next_id: ObserverId,
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverRegistry {
    /// Creates a new registry.
    pub fn new() -> Self {
        Self {
            observers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Attaches an observer and returns its ID.
    pub fn subscribe(&mut self, observer: Observer) -> ObserverId {
        let id = self.reserve_id();
        self.observers.insert(id, observer);
        id
    }

    /// Allocates an ID without attaching anything.
    ///
    /// Used when an observer is terminated before it could be attached.
    pub fn reserve_id(&mut self) -> ObserverId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Detaches by ID.
    ///
    /// Returns true if the observer was found and removed.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.remove(&id).is_some()
    }

    /// Returns true if the observer is still attached.
    #[inline]
    pub fn contains(&self, id: ObserverId) -> bool {
        self.observers.contains_key(&id)
    }

    /// Returns every attached observer, ordered by ID.
    pub fn snapshot(&self) -> Vec<(ObserverId, Observer)> {
        let mut observers: Vec<_> = self
            .observers
            .iter()
            .map(|(id, observer)| (*id, observer.clone()))
            .collect();
        observers.sort_by_key(|(id, _)| *id);
        observers
    }

    /// Detaches and returns every observer, ordered by ID.
    pub fn drain(&mut self) -> Vec<(ObserverId, Observer)> {
        let mut observers: Vec<_> = self.observers.drain().collect();
        observers.sort_by_key(|(id, _)| *id);
        observers
    }

    /// Returns the number of attached observers.
    #[inline]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns true if there are no observers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tether_core::Value;

    fn counting_observer(count: &Rc<RefCell<u32>>) -> Observer {
        let next = count.clone();
        let error = count.clone();
        Observer::new(
            move |_| *next.borrow_mut() += 1,
            move |_| *error.borrow_mut() += 100,
        )
    }

    #[test]
    fn test_observer_callbacks() {
        let count = Rc::new(RefCell::new(0));
        let observer = counting_observer(&count);

        observer.on_next(&StreamSnapshot::ready(Value::Null));
        assert_eq!(*count.borrow(), 1);

        observer.on_error(&StreamError::transport("reset"));
        assert_eq!(*count.borrow(), 101);
    }

    #[test]
    fn test_registry_subscribe() {
        let mut registry = ObserverRegistry::new();

        let id1 = registry.subscribe(Observer::new(|_| {}, |_| {}));
        let id2 = registry.subscribe(Observer::new(|_| {}, |_| {}));

        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_unsubscribe() {
        let mut registry = ObserverRegistry::new();

        let id = registry.subscribe(Observer::new(|_| {}, |_| {}));
        assert!(registry.contains(id));

        assert!(registry.unsubscribe(id));
        assert!(registry.is_empty());

        assert!(!registry.unsubscribe(id)); // Already removed
    }

    #[test]
    fn test_registry_reserved_ids_are_unique() {
        let mut registry = ObserverRegistry::new();

        let reserved = registry.reserve_id();
        let attached = registry.subscribe(Observer::new(|_| {}, |_| {}));

        assert_ne!(reserved, attached);
        assert!(!registry.contains(reserved));
        assert!(registry.contains(attached));
    }

    #[test]
    fn test_registry_snapshot_is_detached() {
        let mut registry = ObserverRegistry::new();
        let count = Rc::new(RefCell::new(0));

        registry.subscribe(counting_observer(&count));
        registry.subscribe(counting_observer(&count));

        let observers = registry.snapshot();
        for (id, _) in &observers {
            registry.unsubscribe(*id);
        }

        for (_, observer) in observers {
            observer.on_next(&StreamSnapshot::ready(Value::Null));
        }
        assert_eq!(*count.borrow(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_drain() {
        let mut registry = ObserverRegistry::new();

        registry.subscribe(Observer::new(|_| {}, |_| {}));
        registry.subscribe(Observer::new(|_| {}, |_| {}));

        let drained = registry.drain();
        let ids: Vec<_> = drained.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(registry.is_empty());
    }
}
