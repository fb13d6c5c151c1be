//! The query component.
//!
//! A [`QueryComponent`] ties one set of [`QueryOptions`] to a data service
//! and keeps a [`RenderState`] in sync with the pushes of the stream those
//! options describe. Its lifecycle is an explicit state machine:
//!
//! ```text
//! build() ──> Constructed ──mount()──> Mounted ──on_destroy()──> Disposed
//!                  │                     │  ▲
//!                  │                     └──┘ on_params_changed()
//!                  └──────────────on_destroy()──────────────> Disposed
//! ```
//!
//! Every operation on a disposed component fails with [`Error::Disposed`].

use crate::change::{same_service, should_replace};
use crate::manager::{Generation, StreamListener, SubscriptionManager};
use crate::options::QueryOptions;
use crate::prerender::DataProbe;
use crate::probe;
use crate::projector::{self, QueryResult, RenderState};
use crate::service::{PendingResult, ServiceRef, StreamRef};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tether_core::{Error, KeywordClassifier, OperationClassifier, Result, StreamError};
use tracing::{debug, trace, warn};

/// Lifecycle phase of a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Stream established, no observer attached yet
    Constructed,
    /// Observer attached; pushes update render state
    Mounted,
    /// Stream released; the component is unusable
    Disposed,
}

/// Rendering callback invoked with every new result.
pub type RenderCallback = Box<dyn FnMut(&QueryResult)>;

/// Builder for [`QueryComponent`].
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use tether_core::Value;
/// use tether_reactive::memory::MemoryService;
/// use tether_reactive::{QueryComponent, QueryOptions, ServiceRef};
///
/// let service = MemoryService::new(|_| Ok(Value::from("Luke")));
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = seen.clone();
///
/// let service_ref: ServiceRef = service.clone();
/// let component = QueryComponent::builder()
///     .service(service_ref)
///     .options(QueryOptions::new("query hero { hero { name } }"))
///     .children(move |result| sink.borrow_mut().push(result.data.clone()))
///     .build()
///     .unwrap();
///
/// component.mount().unwrap();
/// service.flush();
///
/// assert_eq!(*seen.borrow(), vec![Some(Value::from("Luke"))]);
/// ```
pub struct QueryComponentBuilder {
    service: Option<ServiceRef>,
    options: Option<QueryOptions>,
    classifier: Rc<dyn OperationClassifier>,
    children: Option<RenderCallback>,
}

impl Default for QueryComponentBuilder {
    fn default() -> Self {
        Self {
            service: None,
            options: None,
            classifier: Rc::new(KeywordClassifier),
            children: None,
        }
    }
}

impl QueryComponentBuilder {
    /// Sets the data service.
    pub fn service(mut self, service: ServiceRef) -> Self {
        self.service = Some(service);
        self
    }

    /// Sets the query options.
    pub fn options(mut self, options: QueryOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Replaces the default keyword classifier.
    pub fn classifier<C>(mut self, classifier: C) -> Self
    where
        C: OperationClassifier + 'static,
    {
        self.classifier = Rc::new(classifier);
        self
    }

    /// Sets the rendering callback.
    pub fn children<F>(mut self, children: F) -> Self
    where
        F: FnMut(&QueryResult) + 'static,
    {
        self.children = Some(Box::new(children));
        self
    }

    /// Creates the component and establishes its first stream.
    ///
    /// The render state is read synchronously from the new stream, so a
    /// cached result is available before the component is mounted.
    pub fn build(self) -> Result<QueryComponent> {
        let service = self.service.ok_or(Error::MissingService)?;
        let options = self.options.ok_or(Error::MissingOptions)?;

        let manager = SubscriptionManager::new(self.classifier);
        let stream = manager.establish(&*service, &options)?;
        let state = projector::snapshot(&*stream);

        let core = Rc::new_cyclic(|self_ref| ComponentCore {
            self_ref: self_ref.clone(),
            service: RefCell::new(service),
            options: RefCell::new(options),
            manager,
            state: RefCell::new(state),
            phase: Cell::new(Phase::Constructed),
            children: RefCell::new(self.children),
            rerender: Cell::new(false),
        });
        Ok(QueryComponent { core })
    }
}

/// A component bound to one query stream at a time.
pub struct QueryComponent {
    core: Rc<ComponentCore>,
}

impl QueryComponent {
    /// Returns a builder.
    pub fn builder() -> QueryComponentBuilder {
        QueryComponentBuilder::default()
    }

    /// Attaches the component's observer to its stream.
    ///
    /// Pushes that arrived between construction and mount are picked up
    /// here and rendered.
    pub fn mount(&self) -> Result<()> {
        self.core.ensure_live()?;
        self.core.manager.subscribe(self.core.listener())?;
        self.core.phase.set(Phase::Mounted);
        if self.core.update_state() {
            self.core.notify();
        }
        Ok(())
    }

    /// Applies new options and service.
    ///
    /// When either differs from the current ones the stream is replaced:
    /// the old observer is detached, a new stream is established and, if
    /// mounted, subscribed, and the render state is refreshed from the new
    /// stream before rendering. Returns true if the stream was replaced.
    pub fn on_params_changed(&self, options: QueryOptions, service: ServiceRef) -> Result<bool> {
        self.core.ensure_live()?;

        let (replace, changed, service_changed) = {
            let current = self.core.options.borrow();
            let current_service = self.core.service.borrow();
            (
                should_replace(&current, &options, &current_service, &service),
                current.changed_fields(&options),
                !same_service(&current_service, &service),
            )
        };
        if !replace {
            return Ok(false);
        }

        if let Err(err) = self.core.manager.establish(&*service, &options) {
            self.core.reattach();
            return Err(err);
        }
        debug!(?changed, service_changed, "replaced stream");
        *self.core.service.borrow_mut() = service;
        *self.core.options.borrow_mut() = options;

        if self.core.phase.get() == Phase::Mounted {
            self.core.manager.subscribe(self.core.listener())?;
        }
        self.core.update_state();
        self.core.notify();
        Ok(true)
    }

    /// Releases the stream. The component cannot be used afterwards.
    pub fn on_destroy(&self) -> Result<()> {
        self.core.ensure_live()?;
        self.core.phase.set(Phase::Disposed);
        self.core.manager.release();
        // Inside a rendering callback the callback is busy; it is dropped
        // with the component instead.
        if let Ok(mut children) = self.core.children.try_borrow_mut() {
            children.take();
        }
        debug!("unmounted component");
        Ok(())
    }

    /// Projects the current render state.
    pub fn render(&self) -> Result<QueryResult> {
        self.core.ensure_live()?;
        self.core.project().ok_or(Error::NotEstablished)
    }

    /// Returns the current render state.
    pub fn render_state(&self) -> Result<RenderState> {
        self.core.ensure_live()?;
        Ok(self.core.state.borrow().clone())
    }

    /// Returns the current options.
    pub fn options(&self) -> QueryOptions {
        self.core.options.borrow().clone()
    }

    /// Returns the lifecycle phase.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.core.phase.get()
    }

    /// Returns the active stream.
    pub fn stream(&self) -> Option<StreamRef> {
        self.core.manager.current()
    }

    /// Returns the generation of the active stream.
    pub fn generation(&self) -> Option<Generation> {
        self.core.manager.current_generation()
    }

    /// Returns the number of observers this component has attached.
    pub fn listener_count(&self) -> usize {
        self.core.manager.listener_count()
    }

    /// Returns a future for the data a prerender pass must wait on.
    ///
    /// See [`probe::pending`].
    pub fn probe_pending(&self) -> Result<Option<PendingResult>> {
        self.core.ensure_live()?;
        let stream = self.core.manager.current().ok_or(Error::NotEstablished)?;
        let service = self.core.service.borrow().clone();
        let options = self.core.options.borrow().clone();
        probe::pending(&*service, &options, &*stream)
    }
}

impl DataProbe for QueryComponent {
    fn probe_pending(&self) -> Result<Option<PendingResult>> {
        QueryComponent::probe_pending(self)
    }
}

impl fmt::Debug for QueryComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryComponent")
            .field("phase", &self.core.phase.get())
            .field("options", &*self.core.options.borrow())
            .field("generation", &self.core.manager.current_generation())
            .finish_non_exhaustive()
    }
}

struct ComponentCore {
    self_ref: Weak<ComponentCore>,
    service: RefCell<ServiceRef>,
    options: RefCell<QueryOptions>,
    manager: SubscriptionManager,
    state: RefCell<RenderState>,
    phase: Cell<Phase>,
    children: RefCell<Option<RenderCallback>>,
    /// Set when a render was requested while the callback was running
    rerender: Cell<bool>,
}

impl ComponentCore {
    fn ensure_live(&self) -> Result<()> {
        if self.phase.get() == Phase::Disposed {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }

    fn listener(&self) -> Weak<dyn StreamListener> {
        self.self_ref.clone()
    }

    /// Re-subscribes a mounted component to its retained stream after a
    /// replacement failed past the point of detaching.
    fn reattach(&self) {
        if self.phase.get() != Phase::Mounted || self.manager.listener_count() > 0 {
            return;
        }
        match self.manager.subscribe(self.listener()) {
            Ok(_) => {
                debug!("reattached to retained stream");
                if self.update_state() {
                    self.notify();
                }
            }
            Err(err) => warn!(%err, "could not reattach to retained stream"),
        }
    }

    fn accepts(&self, generation: Generation) -> bool {
        if self.phase.get() == Phase::Disposed || !self.manager.is_current(generation) {
            trace!(generation, "dropped stale push");
            return false;
        }
        true
    }

    /// Reads the active stream's snapshot into render state.
    ///
    /// Returns true if the render state changed.
    fn update_state(&self) -> bool {
        let Some(stream) = self.manager.current() else {
            return false;
        };
        let next = projector::snapshot(&*stream);
        let mut state = self.state.borrow_mut();
        if *state == next {
            return false;
        }
        *state = next;
        true
    }

    fn project(&self) -> Option<QueryResult> {
        let stream = self.manager.current()?;
        let service = self.service.borrow();
        let state = self.state.borrow();
        Some(projector::project(&service, &state, &stream))
    }

    /// Invokes the rendering callback with the current result.
    ///
    /// A render requested while the callback is running (for example a local
    /// update issued from inside it) runs once the callback returns.
    fn notify(&self) {
        let Ok(mut children) = self.children.try_borrow_mut() else {
            self.rerender.set(true);
            return;
        };
        let Some(callback) = children.as_mut() else {
            return;
        };
        loop {
            self.rerender.set(false);
            let Some(result) = self.project() else {
                break;
            };
            callback(&result);
            if !self.rerender.get() || self.phase.get() == Phase::Disposed {
                break;
            }
        }
    }
}

impl StreamListener for ComponentCore {
    fn on_push(&self, generation: Generation) {
        if !self.accepts(generation) {
            return;
        }
        self.update_state();
        self.notify();
    }

    fn on_error(&self, generation: Generation, error: &StreamError) {
        if !self.accepts(generation) {
            return;
        }
        if error.is_terminal() {
            warn!(generation, %error, "stream failed, recovering");
            if let Err(err) = self.manager.recover(self.listener()) {
                warn!(generation, %err, "recovery failed");
            }
        }
        self.update_state();
        self.notify();
    }
}

impl Drop for ComponentCore {
    fn drop(&mut self) {
        self.manager.release();
    }
}
