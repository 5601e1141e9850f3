//! Event dispatch shared by layers, bindings and connections.
//!
//! Every asynchronous entity owns an [`EventDispatcher`] and exposes it
//! through the [`EventSource`] trait. Listeners are `Arc<dyn EventListener>`;
//! the `Arc` allocation is the listener's identity, so unregistering takes the
//! same `Arc` that was registered.
//!
//! # Delivery
//!
//! ```text
//! notify(ev) ──► pending FIFO ──► (any listener?) ──► pass: snapshot ──► L1, L2, ...
//!                     ▲                                    │
//!                     └──── re-entrant notify ◄────────────┘
//! ```
//!
//! - Events published while no listener is registered stay queued. The first
//!   registration delivers all of them, in order, before returning.
//! - Each pass delivers one event to the listeners present when the pass
//!   started, in registration order.
//! - A listener may publish from inside its callback. The nested event is
//!   queued and delivered after the current pass, so every listener sees
//!   events in publish order.
//! - Unregistering while a pass runs is deferred: the listener still receives
//!   the current event if it was part of the snapshot, is excluded from every
//!   later pass and is dropped from the set when the pass completes.
//! - A listener error or panic is caught, logged, counted and handed to the
//!   failure hook. Delivery to the remaining listeners continues.
//!
//! The listener lock is never held while a callback runs. One publisher at a
//! time owns the drain; events published concurrently by other threads are
//! queued and delivered by that owner, so publishers never wait on each
//! other's listeners. Callbacks must not block.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::RapiError;

/// State change published by a layer, binding or connection
#[derive(Debug, Clone)]
pub enum Event {
    /// Connection is established
    Connected,
    /// New data can be read from a connection
    DataAvailable,
    /// A binding received an incoming connection
    NewConnection,
    /// The entity was closed
    Closed,
    /// Asynchronous failure detected by a layer or peer
    Error(Arc<RapiError>),
}

impl Event {
    /// Short name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::DataAvailable => "data_available",
            Self::NewConnection => "new_connection",
            Self::Closed => "closed",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(cause) => write!(f, "error: {cause}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Receiver of events.
///
/// Runs synchronously on the publisher's thread and must not block.
pub trait EventListener: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &Event) -> anyhow::Result<()>;
}

impl<F> EventListener for F
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync,
{
    fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        self(event)
    }
}

/// Wrap a closure as a shareable listener
pub fn listener_fn<F>(f: F) -> Arc<dyn EventListener>
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Callback invoked for every failed listener delivery
pub type FailureHook = Box<dyn Fn(&Event, &anyhow::Error) + Send + Sync>;

struct Entry {
    listener: Arc<dyn EventListener>,
    removed: bool,
}

impl Entry {
    fn is(&self, listener: &Arc<dyn EventListener>) -> bool {
        same_listener(&self.listener, listener)
    }
}

fn same_listener(a: &Arc<dyn EventListener>, b: &Arc<dyn EventListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[derive(Default)]
struct Inner {
    listeners: Vec<Entry>,
    pending: VecDeque<Event>,
    /// Set while a pass is delivering to its snapshot
    in_pass: bool,
    /// Set while some publisher owns the drain loop
    draining: bool,
}

impl Inner {
    fn has_listeners(&self) -> bool {
        self.listeners.iter().any(|e| !e.removed)
    }

    fn snapshot(&self) -> Vec<Arc<dyn EventListener>> {
        self.listeners
            .iter()
            .filter(|e| !e.removed)
            .map(|e| Arc::clone(&e.listener))
            .collect()
    }
}

/// Listener registry with ordered, fault-isolated delivery
pub struct EventDispatcher {
    inner: Mutex<Inner>,
    failures: AtomicU64,
    failure_hook: Option<FailureHook>,
}

impl EventDispatcher {
    /// Create a dispatcher without listeners
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            failures: AtomicU64::new(0),
            failure_hook: None,
        }
    }

    /// Report listener failures to `hook` in addition to logging them
    pub fn with_failure_hook(
        mut self,
        hook: impl Fn(&Event, &anyhow::Error) + Send + Sync + 'static,
    ) -> Self {
        self.failure_hook = Some(Box::new(hook));
        self
    }

    /// Register a listener and deliver any queued events.
    ///
    /// Registering the same `Arc` twice has no effect.
    pub fn register(&self, listener: Arc<dyn EventListener>) {
        {
            let mut inner = self.inner.lock();
            if let Some(entry) = inner.listeners.iter_mut().find(|e| e.is(&listener)) {
                entry.removed = false;
            } else {
                inner.listeners.push(Entry {
                    listener,
                    removed: false,
                });
            }
        }

        self.drain();
    }

    /// Unregister a listener; returns `false` if it was not registered.
    ///
    /// During a delivery pass the removal is deferred until the pass ends.
    pub fn unregister(&self, listener: &Arc<dyn EventListener>) -> bool {
        let mut inner = self.inner.lock();

        let Some(index) = inner
            .listeners
            .iter()
            .position(|e| e.is(listener) && !e.removed)
        else {
            return false;
        };

        if inner.in_pass {
            inner.listeners[index].removed = true;
        } else {
            inner.listeners.remove(index);
        }
        true
    }

    /// Publish an event.
    ///
    /// If another publisher is draining, the event is queued and delivered
    /// by that publisher after its current pass.
    pub fn notify(&self, event: Event) {
        self.inner.lock().pending.push_back(event);
        self.drain();
    }

    /// Deliver queued events while listeners exist
    fn drain(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.draining {
                // the current owner picks the event up
                return;
            }
            if !inner.has_listeners() {
                tracing::trace!(queued = inner.pending.len(), "no listener, event queued");
                return;
            }
            inner.draining = true;
        }

        loop {
            let (event, listeners) = {
                let mut inner = self.inner.lock();
                let next = if inner.has_listeners() {
                    inner.pending.pop_front()
                } else {
                    None
                };
                let Some(event) = next else {
                    inner.draining = false;
                    break;
                };
                inner.in_pass = true;
                (event, inner.snapshot())
            };

            tracing::trace!(event = event.name(), listeners = listeners.len(), "delivering event");
            for listener in &listeners {
                self.deliver(listener, &event);
            }

            let mut inner = self.inner.lock();
            inner.in_pass = false;
            inner.listeners.retain(|e| !e.removed);
        }
    }

    fn deliver(&self, listener: &Arc<dyn EventListener>, event: &Event) {
        let error = match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
            Ok(Ok(())) => return,
            Ok(Err(error)) => error,
            Err(payload) => anyhow::anyhow!("listener panicked: {}", panic_message(&*payload)),
        };

        self.failures.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(event = event.name(), error = %error, "event listener failed");

        if let Some(hook) = &self.failure_hook {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hook(event, &error))) {
                tracing::warn!(
                    event = event.name(),
                    panic = %panic_message(&*payload),
                    "failure hook panicked"
                );
            }
        }
    }

    /// Number of listener deliveries that failed so far
    pub fn listener_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Number of registered listeners, excluding those pending removal
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.iter().filter(|e| !e.removed).count()
    }

    /// Number of events waiting for a listener
    pub fn pending_events(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_count())
            .field("pending", &self.pending_events())
            .field("failures", &self.listener_failures())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Entity that publishes events to registered listeners
pub trait EventSource {
    /// Dispatcher of this entity
    fn events(&self) -> &EventDispatcher;

    /// Register a listener; queued events are delivered before returning
    fn register_listener(&self, listener: Arc<dyn EventListener>) {
        self.events().register(listener);
    }

    /// Unregister a listener
    fn unregister_listener(&self, listener: &Arc<dyn EventListener>) -> bool {
        self.events().unregister(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, Arc<dyn EventListener>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let listener = listener_fn(move |event| {
            sink.lock().push(event.name().to_string());
            Ok(())
        });
        (log, listener)
    }

    #[test]
    fn test_queued_events_flushed_in_order() {
        let dispatcher = EventDispatcher::new();
        dispatcher.notify(Event::Connected);
        dispatcher.notify(Event::DataAvailable);
        dispatcher.notify(Event::Closed);
        assert_eq!(dispatcher.pending_events(), 3);

        let (log, listener) = recorder();
        dispatcher.register(listener);
        assert_eq!(*log.lock(), vec!["connected", "data_available", "closed"]);

        dispatcher.notify(Event::NewConnection);
        assert_eq!(log.lock().len(), 4);
        assert_eq!(log.lock()[3], "new_connection");
        assert_eq!(dispatcher.pending_events(), 0);
    }

    #[test]
    fn test_unregister_during_callback() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let (log_b, listener_b) = recorder();

        let d = Arc::clone(&dispatcher);
        let victim = Arc::clone(&listener_b);
        let listener_a = listener_fn(move |_| {
            d.unregister(&victim);
            Ok(())
        });

        dispatcher.register(listener_a);
        dispatcher.register(Arc::clone(&listener_b));

        dispatcher.notify(Event::DataAvailable);
        assert_eq!(*log_b.lock(), vec!["data_available"]);
        assert_eq!(dispatcher.listener_count(), 1);

        dispatcher.notify(Event::Closed);
        assert_eq!(log_b.lock().len(), 1);
    }

    #[test]
    fn test_self_unregister() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let calls = Arc::new(AtomicU64::new(0));

        let slot: Arc<Mutex<Option<Arc<dyn EventListener>>>> = Arc::new(Mutex::new(None));
        let d = Arc::clone(&dispatcher);
        let me = Arc::clone(&slot);
        let c = Arc::clone(&calls);
        let listener = listener_fn(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(this) = me.lock().take() {
                assert!(d.unregister(&this));
            }
            Ok(())
        });
        *slot.lock() = Some(Arc::clone(&listener));

        dispatcher.register(listener);
        dispatcher.notify(Event::Connected);
        dispatcher.notify(Event::Connected);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.pending_events(), 1);
    }

    #[test]
    fn test_reentrant_notify_keeps_order() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let (log, recorder) = recorder();

        let d = Arc::clone(&dispatcher);
        dispatcher.register(listener_fn(move |event| {
            if matches!(event, Event::DataAvailable) {
                d.notify(Event::Closed);
            }
            Ok(())
        }));
        dispatcher.register(recorder);

        dispatcher.notify(Event::DataAvailable);
        assert_eq!(*log.lock(), vec!["data_available", "closed"]);
    }

    #[test]
    fn test_listener_failures_isolated() {
        let hooked = Arc::new(AtomicU64::new(0));
        let h = Arc::clone(&hooked);
        let dispatcher = EventDispatcher::new().with_failure_hook(move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.register(listener_fn(|_| anyhow::bail!("refused")));
        dispatcher.register(listener_fn(|_| panic!("listener bug")));
        let (log, recorder) = recorder();
        dispatcher.register(recorder);

        dispatcher.notify(Event::Connected);
        assert_eq!(*log.lock(), vec!["connected"]);
        assert_eq!(dispatcher.listener_failures(), 2);
        assert_eq!(hooked.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let dispatcher = EventDispatcher::new();
        let (log, listener) = recorder();
        dispatcher.register(Arc::clone(&listener));
        dispatcher.register(Arc::clone(&listener));
        assert_eq!(dispatcher.listener_count(), 1);

        dispatcher.notify(Event::Closed);
        assert_eq!(log.lock().len(), 1);

        assert!(dispatcher.unregister(&listener));
        assert!(!dispatcher.unregister(&listener));
    }

    #[test]
    fn test_concurrent_publishers() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        dispatcher.register(listener_fn(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let d = Arc::clone(&dispatcher);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        d.notify(Event::DataAvailable);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(count.load(Ordering::SeqCst), 1000);
    }

    fn forwarder(
        target: Arc<EventDispatcher>,
        barrier: Arc<std::sync::Barrier>,
        seen: Arc<AtomicU64>,
    ) -> Arc<dyn EventListener> {
        listener_fn(move |event| {
            match event {
                Event::Connected => {
                    barrier.wait();
                    target.notify(Event::DataAvailable);
                },
                _ => {
                    seen.fetch_add(1, Ordering::SeqCst);
                },
            }
            Ok(())
        })
    }

    #[test]
    fn test_cross_publish_from_two_threads() {
        let a = Arc::new(EventDispatcher::new());
        let b = Arc::new(EventDispatcher::new());
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let seen_a = Arc::new(AtomicU64::new(0));
        let seen_b = Arc::new(AtomicU64::new(0));

        a.register(forwarder(Arc::clone(&b), Arc::clone(&barrier), Arc::clone(&seen_a)));
        b.register(forwarder(Arc::clone(&a), barrier, Arc::clone(&seen_b)));

        let handles: Vec<_> = [Arc::clone(&a), Arc::clone(&b)]
            .into_iter()
            .map(|d| std::thread::spawn(move || d.notify(Event::Connected)))
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(seen_a.load(Ordering::SeqCst), 1);
        assert_eq!(seen_b.load(Ordering::SeqCst), 1);
        assert_eq!(a.pending_events() + b.pending_events(), 0);
    }

    #[test]
    fn test_panicking_hook_keeps_delivering() {
        let dispatcher = EventDispatcher::new().with_failure_hook(|_, _| panic!("hook bug"));
        let failing = listener_fn(|_| anyhow::bail!("refused"));
        dispatcher.register(Arc::clone(&failing));

        dispatcher.notify(Event::Connected);
        assert_eq!(dispatcher.listener_failures(), 1);
        assert!(dispatcher.unregister(&failing));

        let (log, recorder) = recorder();
        dispatcher.register(recorder);
        dispatcher.notify(Event::Closed);
        assert_eq!(*log.lock(), vec!["closed"]);
        assert_eq!(dispatcher.pending_events(), 0);
    }
}
