//! Subscription management.
//!
//! A [`SubscriptionManager`] owns the zero-or-one active stream of a
//! component. Each stream it establishes is tagged with a fresh
//! [`Generation`]; observers capture the generation they were created for, so
//! a push that races a replacement can be recognized and dropped by the
//! listener.

use crate::observer::Observer;
use crate::options::QueryOptions;
use crate::service::{DataService, LastResults, ObserverId, StreamRef};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tether_core::{
    Error, KeywordClassifier, OperationClassifier, OperationKind, Result, StreamError,
};
use tracing::debug;

/// Monotonic tag identifying one established stream.
pub type Generation = u64;

/// Receives the pushes of the stream a manager is subscribed to.
///
/// Every call carries the generation the observer was created for; the
/// listener compares it against [`SubscriptionManager::is_current`].
pub trait StreamListener {
    /// A new result is available.
    fn on_push(&self, generation: Generation);

    /// The stream reported an error.
    fn on_error(&self, generation: Generation, error: &StreamError);
}

struct ActiveStream {
    stream: StreamRef,
    generation: Generation,
    observer: Option<ObserverId>,
}

/// Owns the active stream of one component.
pub struct SubscriptionManager {
    classifier: Rc<dyn OperationClassifier>,
    active: RefCell<Option<ActiveStream>>,
    generation: Cell<Generation>,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new(Rc::new(KeywordClassifier))
    }
}

impl SubscriptionManager {
    /// Creates a manager that validates documents with `classifier`.
    pub fn new(classifier: Rc<dyn OperationClassifier>) -> Self {
        Self {
            classifier,
            active: RefCell::new(None),
            generation: Cell::new(0),
        }
    }

    /// Opens a stream for `options` and makes it the active one.
    ///
    /// The document must describe a query; anything else fails with
    /// [`Error::WrongOperation`] before the current stream is touched.
    /// Otherwise the current observer is detached, a new stream is opened
    /// and tagged with the next generation.
    pub fn establish(
        &self,
        service: &dyn DataService,
        options: &QueryOptions,
    ) -> Result<StreamRef> {
        let kind = self.classifier.classify(&options.query)?;
        if kind != OperationKind::Query {
            return Err(Error::wrong_operation(kind));
        }

        self.dispose();
        let stream = service.open_stream(options)?;
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        *self.active.borrow_mut() = Some(ActiveStream {
            stream: stream.clone(),
            generation,
            observer: None,
        });

        debug!(
            operation = options.query.operation_name().unwrap_or("anonymous"),
            fetch_policy = %options.fetch_policy,
            generation,
            "established stream"
        );
        Ok(stream)
    }

    /// Attaches the single observer of the active stream.
    ///
    /// Fails with [`Error::NotEstablished`] when there is no stream and with
    /// [`Error::AlreadySubscribed`] when an observer is already attached.
    pub fn subscribe(&self, listener: Weak<dyn StreamListener>) -> Result<ObserverId> {
        let (stream, generation) = {
            let active = self.active.borrow();
            let active = active.as_ref().ok_or(Error::NotEstablished)?;
            if active.observer.is_some() {
                return Err(Error::AlreadySubscribed);
            }
            (active.stream.clone(), active.generation)
        };

        let next = listener.clone();
        let observer = Observer::new(
            move |_| {
                if let Some(listener) = next.upgrade() {
                    listener.on_push(generation);
                }
            },
            move |error| {
                if let Some(listener) = listener.upgrade() {
                    listener.on_error(generation, error);
                }
            },
        );

        // No borrow is held here: the stream may signal the observer
        // synchronously, and the listener may recover through this manager.
        let id = stream.subscribe(observer);

        if let Some(active) = self.active.borrow_mut().as_mut() {
            // Recovery triggered during `subscribe` has already recorded
            // the observer that is actually attached.
            if active.generation == generation && active.observer.is_none() {
                active.observer = Some(id);
            }
        }
        Ok(id)
    }

    /// Detaches the observer of the active stream.
    ///
    /// Returns false if none was attached.
    pub fn dispose(&self) -> bool {
        let detached = self.active.borrow_mut().as_mut().and_then(|active| {
            active
                .observer
                .take()
                .map(|id| (active.stream.clone(), active.generation, id))
        });

        match detached {
            Some((stream, generation, id)) => {
                stream.unsubscribe(id);
                debug!(generation, observer = id, "disposed listener");
                true
            }
            None => false,
        }
    }

    /// Detaches the observer and drops the active stream.
    pub fn release(&self) {
        self.dispose();
        if let Some(active) = self.active.borrow_mut().take() {
            debug!(generation = active.generation, "released stream");
        }
    }

    /// Re-subscribes after a terminal stream error.
    ///
    /// The stream's last error and last result are taken out while the new
    /// observer attaches, so it is not signalled with the error that ended
    /// the previous one, and put back afterwards.
    pub fn recover(&self, listener: Weak<dyn StreamListener>) -> Result<ObserverId> {
        let stream = self.current().ok_or(Error::NotEstablished)?;
        self.dispose();

        let last = LastResults::capture(&*stream);
        stream.reset_last_results();
        let subscribed = self.subscribe(listener);
        stream.restore_last_results(last);
        subscribed
    }

    /// Returns the active stream.
    pub fn current(&self) -> Option<StreamRef> {
        self.active
            .borrow()
            .as_ref()
            .map(|active| active.stream.clone())
    }

    /// Returns the generation of the active stream.
    pub fn current_generation(&self) -> Option<Generation> {
        self.active.borrow().as_ref().map(|active| active.generation)
    }

    /// Returns true if `generation` tags the active stream.
    #[inline]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current_generation() == Some(generation)
    }

    /// Returns the number of generations established so far.
    #[inline]
    pub fn generations(&self) -> Generation {
        self.generation.get()
    }

    /// Returns the number of attached observers, zero or one.
    pub fn listener_count(&self) -> usize {
        self.active
            .borrow()
            .as_ref()
            .map_or(0, |active| usize::from(active.observer.is_some()))
    }
}
