//! Change notification for collections.
//!
//! Every successful write publishes one [`ChangeEvent`] per affected
//! record, in the order the records were written. Listeners run on the
//! writing thread and may perform further writes, but a listener failure
//! is logged and never fails the write or starves other listeners.

use crate::common::{get_current_time_or_zero, OlivineEventBus, SubscriberRef};
use crate::document::Document;
use crate::errors::OlivineResult;
use basu::error::BasuError;
use basu::event::Event;
use basu::Handle;
use std::fmt::Debug;
use std::sync::Arc;

/// The kind of change a [`ChangeEvent`] reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Remove,
}

/// A single record change on a collection.
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    inner: Arc<ChangeEventInner>,
}

#[derive(Debug)]
struct ChangeEventInner {
    kind: ChangeKind,
    item: Document,
    collection: String,
    timestamp: u128,
}

impl ChangeEvent {
    pub(crate) fn new(kind: ChangeKind, item: Document, collection: &str) -> Self {
        ChangeEvent {
            inner: Arc::new(ChangeEventInner {
                kind,
                item,
                collection: collection.to_string(),
                timestamp: get_current_time_or_zero(),
            }),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        self.inner.kind
    }

    /// The document as it was written, or as it stood before a removal.
    pub fn item(&self) -> &Document {
        &self.inner.item
    }

    pub fn collection(&self) -> &str {
        &self.inner.collection
    }

    /// Milliseconds since the Unix epoch at event creation.
    pub fn timestamp(&self) -> u128 {
        self.inner.timestamp
    }
}

/// Trait for closure-based change handlers.
///
/// Any closure with the signature `Fn(ChangeEvent) -> OlivineResult<()>`
/// implements this trait automatically.
pub trait ChangeCallback: Send + Sync + Fn(ChangeEvent) -> OlivineResult<()> {}

impl<F> ChangeCallback for F where F: Send + Sync + Fn(ChangeEvent) -> OlivineResult<()> {}

/// A registered change listener, optionally filtered to one [`ChangeKind`].
#[derive(Clone)]
pub struct ChangeListener {
    kind: Option<ChangeKind>,
    on_event: Arc<dyn ChangeCallback>,
}

impl ChangeListener {
    /// Creates a listener that receives every change.
    pub fn new(on_event: impl ChangeCallback + 'static) -> Self {
        ChangeListener {
            kind: None,
            on_event: Arc::new(on_event),
        }
    }

    /// Creates a listener that only receives changes of the given kind.
    pub fn for_kind(kind: ChangeKind, on_event: impl ChangeCallback + 'static) -> Self {
        ChangeListener {
            kind: Some(kind),
            on_event: Arc::new(on_event),
        }
    }
}

impl Handle<ChangeEvent> for ChangeListener {
    fn handle(&self, event: &Event<ChangeEvent>) -> Result<(), BasuError> {
        let change = event.data.clone();
        if let Some(kind) = self.kind {
            if change.kind() != kind {
                return Ok(());
            }
        }
        // A failing callback must not stop delivery to other listeners,
        // so the error is contained here instead of returned to the bus.
        if let Err(e) = (self.on_event)(change) {
            log::warn!(
                "Change listener failed for collection '{}': {}",
                event.data.collection(),
                e
            );
        }
        Ok(())
    }
}

impl Debug for ChangeListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeListener").field("kind", &self.kind).finish()
    }
}

/// Per-collection fan-out of change events.
#[derive(Clone)]
pub(crate) struct ChangeDispatcher {
    event_bus: OlivineEventBus<ChangeEvent, ChangeListener>,
}

impl ChangeDispatcher {
    pub(crate) fn new() -> Self {
        ChangeDispatcher {
            event_bus: OlivineEventBus::new(),
        }
    }

    pub(crate) fn subscribe(&self, listener: ChangeListener) -> OlivineResult<SubscriberRef> {
        self.event_bus.register(listener)
    }

    pub(crate) fn unsubscribe(&self, subscriber: SubscriberRef) -> OlivineResult<()> {
        self.event_bus.deregister(subscriber)
    }

    /// Publishes one change; failures are logged and never fail the write.
    pub(crate) fn dispatch(&self, kind: ChangeKind, item: Document, collection: &str) {
        if !self.event_bus.has_listeners() {
            return;
        }
        let event = ChangeEvent::new(kind, item, collection);
        if let Err(e) = self.event_bus.publish(event) {
            log::warn!("Failed to publish change event for '{}': {}", collection, e);
        }
    }

    pub(crate) fn close(&self) -> OlivineResult<()> {
        self.event_bus.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::errors::{ErrorKind, OlivineError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_dispatch_reaches_listener() {
        let dispatcher = ChangeDispatcher::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counted = seen.clone();
        dispatcher
            .subscribe(ChangeListener::new(move |event: ChangeEvent| {
                assert_eq!(event.collection(), "records");
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();

        dispatcher.dispatch(ChangeKind::Insert, doc! { a: 1i64 }, "records");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_kind_filter() {
        let dispatcher = ChangeDispatcher::new();
        let removes = Arc::new(AtomicUsize::new(0));
        let counted = removes.clone();
        dispatcher
            .subscribe(ChangeListener::for_kind(ChangeKind::Remove, move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();

        dispatcher.dispatch(ChangeKind::Insert, doc! {}, "records");
        dispatcher.dispatch(ChangeKind::Update, doc! {}, "records");
        dispatcher.dispatch(ChangeKind::Remove, doc! {}, "records");
        assert_eq!(removes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_listener_does_not_starve_others() {
        let dispatcher = ChangeDispatcher::new();
        dispatcher
            .subscribe(ChangeListener::new(|_| {
                Err(OlivineError::new("listener boom", ErrorKind::EventError))
            }))
            .unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let counted = seen.clone();
        dispatcher
            .subscribe(ChangeListener::new(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();

        dispatcher.dispatch(ChangeKind::Insert, doc! {}, "records");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let dispatcher = ChangeDispatcher::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counted = seen.clone();
        let subscriber = dispatcher
            .subscribe(ChangeListener::new(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();

        dispatcher.dispatch(ChangeKind::Insert, doc! {}, "records");
        dispatcher.unsubscribe(subscriber).unwrap();
        dispatcher.dispatch(ChangeKind::Insert, doc! {}, "records");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_carries_item_and_timestamp() {
        let event = ChangeEvent::new(ChangeKind::Update, doc! { a: 1i64 }, "records");
        assert_eq!(event.kind(), ChangeKind::Update);
        assert_eq!(event.item(), &doc! { a: 1i64 });
        assert!(event.timestamp() > 0);
    }
}
