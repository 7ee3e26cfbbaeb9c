use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use basu::error::BasuError;
use basu::event::Event;
use basu::{EventBus, Handle, HandlerId};
use std::error::Error;
use std::marker::PhantomData;
use std::sync::Arc;

pub(crate) const CHANGE_TOPIC: &str = "olivine_change";

/// A synchronous publish-subscribe bus for store events.
///
/// Listeners run on the publishing thread. Bus level failures surface to
/// the caller, who decides whether to log or propagate them; listener
/// wrappers are responsible for containing their own callback failures.
#[derive(Clone)]
pub struct OlivineEventBus<E, L> {
    inner: Arc<OlivineEventBusInner<E, L>>,
}

impl<E, L> Default for OlivineEventBus<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, L> OlivineEventBus<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    pub fn new() -> Self {
        OlivineEventBus {
            inner: Arc::new(OlivineEventBusInner::new()),
        }
    }

    /// Registers a listener and returns a handle for later deregistration.
    pub fn register(&self, listener: L) -> OlivineResult<SubscriberRef> {
        self.inner.register(listener)
    }

    /// Removes a previously registered listener.
    pub fn deregister(&self, subscriber: SubscriberRef) -> OlivineResult<()> {
        self.inner.deregister(subscriber)
    }

    /// Delivers an event to every registered listener.
    pub fn publish(&self, event: E) -> OlivineResult<()> {
        self.inner.publish(event)
    }

    /// Clears all registered listeners.
    pub fn close(&self) -> OlivineResult<()> {
        self.inner.close()
    }

    pub fn has_listeners(&self) -> bool {
        self.inner.has_listeners()
    }
}

/// An opaque handle to a registered listener.
#[derive(Debug)]
pub struct SubscriberRef {
    pub(crate) inner: HandlerId,
}

impl SubscriberRef {
    pub(crate) fn new(inner: HandlerId) -> Self {
        SubscriberRef { inner }
    }
}

struct OlivineEventBusInner<E, L> {
    event_bus: EventBus<E>,
    phantom_data: PhantomData<L>,
}

impl<E, L> OlivineEventBusInner<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    fn new() -> Self {
        OlivineEventBusInner {
            event_bus: EventBus::new(),
            phantom_data: PhantomData,
        }
    }

    fn register(&self, listener: L) -> OlivineResult<SubscriberRef> {
        match self.event_bus.subscribe(CHANGE_TOPIC, Box::new(listener)) {
            Ok(subscriber) => Ok(SubscriberRef::new(subscriber)),
            Err(e) => Err(event_error(e)),
        }
    }

    #[inline]
    fn deregister(&self, subscriber: SubscriberRef) -> OlivineResult<()> {
        match self.event_bus.unsubscribe(CHANGE_TOPIC, &subscriber.inner) {
            Ok(_) => Ok(()),
            Err(e) => Err(event_error(e)),
        }
    }

    #[inline]
    fn publish(&self, event: E) -> OlivineResult<()> {
        // Fast path: skip event construction when nobody listens.
        let handler_count = match self.event_bus.get_handler_count(CHANGE_TOPIC) {
            Ok(count) => count,
            Err(e) => {
                if matches!(e, BasuError::EventTypeNotFOUND) {
                    return Ok(());
                }
                return Err(event_error(e));
            }
        };
        if handler_count == 0 {
            return Ok(());
        }

        let basu_event = Event::new(event);
        match self.event_bus.publish(CHANGE_TOPIC, &basu_event) {
            Ok(_) => Ok(()),
            Err(e) => Err(event_error(e)),
        }
    }

    #[inline]
    fn close(&self) -> OlivineResult<()> {
        match self.event_bus.clear() {
            Ok(_) => Ok(()),
            Err(e) => Err(event_error(e)),
        }
    }

    #[inline]
    fn has_listeners(&self) -> bool {
        match self.event_bus.get_handler_count(CHANGE_TOPIC) {
            Ok(count) => count > 0,
            Err(e) => {
                if !matches!(e, BasuError::EventTypeNotFOUND) {
                    log::warn!("Failed to check listeners: {}, defaulting to false", e);
                }
                false
            }
        }
    }
}

pub(crate) fn event_error(e: BasuError) -> OlivineError {
    match e {
        BasuError::EventTypeNotFOUND => OlivineError::new(
            "Event bus error: no handler is registered for this event type",
            ErrorKind::EventError,
        ),
        BasuError::MutexPoisoned => OlivineError::new(
            "Event bus error: internal mutex poisoned, the bus may be inconsistent",
            ErrorKind::EventError,
        ),
        BasuError::HandlerError(e) => {
            let message = e
                .source()
                .map(|source| source.to_string())
                .unwrap_or_else(|| "Unknown error in event listener".to_string());
            OlivineError::new(
                &format!("Event listener error: {}", message),
                ErrorKind::EventError,
            )
        }
    }
}
