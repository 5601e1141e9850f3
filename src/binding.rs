//! Service registrations.
//!
//! A [`Binding`] is created by a layer when an application registers a
//! service name. The layer queues every incoming connection for that name;
//! the application claims them with [`Binding::get_incoming_connection`] and
//! is told about new arrivals via [`Event::NewConnection`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::connection::ConnectionEndpoint;
use crate::description::Description;
use crate::error::RapiError;
use crate::event::{Event, EventDispatcher, EventSource};
use crate::identity::Identity;
use crate::name::Name;

/// Registered service accumulating unclaimed incoming connections
pub struct Binding {
    name: Name,
    identity: Option<Identity>,
    requirements: Option<Description>,
    queue: Mutex<VecDeque<Arc<ConnectionEndpoint>>>,
    active: AtomicBool,
    events: EventDispatcher,
}

impl Binding {
    /// Create an active binding for `name`
    pub fn new(name: Name, requirements: Option<&Description>, identity: Option<Identity>) -> Self {
        tracing::debug!(%name, "binding created");
        Self {
            name,
            identity,
            requirements: requirements.cloned(),
            queue: Mutex::new(VecDeque::new()),
            active: AtomicBool::new(true),
            events: EventDispatcher::new(),
        }
    }

    /// Create a binding whose registration failed.
    ///
    /// It is inactive from the start; the cause is queued as an
    /// [`Event::Error`] for the first listener.
    pub fn failed(name: Name, cause: RapiError) -> Self {
        tracing::debug!(%name, error = %cause, "binding failed");
        let binding = Self {
            name,
            identity: None,
            requirements: None,
            queue: Mutex::new(VecDeque::new()),
            active: AtomicBool::new(false),
            events: EventDispatcher::new(),
        };
        binding.events.notify(Event::Error(Arc::new(cause)));
        binding
    }

    /// Use a custom event dispatcher, e.g. one with a failure hook
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    /// Get the service name
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Identity of the service creator
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Requirements the service was registered with
    pub fn requirements(&self) -> Option<&Description> {
        self.requirements.as_ref()
    }

    /// Check if the binding accepts connections
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Layer hook: queue an incoming connection.
    ///
    /// Returns `false` and drops nothing into the queue if the binding is
    /// inactive.
    pub fn add_incoming_connection(&self, connection: Arc<ConnectionEndpoint>) -> bool {
        {
            let mut queue = self.queue.lock();
            if !self.is_active() {
                tracing::warn!(name = %self.name, id = connection.id(), "connection for inactive binding rejected");
                return false;
            }
            tracing::trace!(name = %self.name, id = connection.id(), "incoming connection");
            queue.push_back(connection);
        }

        self.events.notify(Event::NewConnection);
        true
    }

    /// Claim the oldest unclaimed connection without blocking
    pub fn get_incoming_connection(&self) -> Option<Arc<ConnectionEndpoint>> {
        self.queue.lock().pop_front()
    }

    /// Number of unclaimed connections
    pub fn waiting_connections(&self) -> usize {
        self.queue.lock().len()
    }

    /// Discard unclaimed connections and deactivate; idempotent
    pub fn close(&self) {
        {
            let mut queue = self.queue.lock();
            if !self.active.swap(false, Ordering::AcqRel) {
                return;
            }
            queue.clear();
        }

        tracing::debug!(name = %self.name, "binding closed");
        self.events.notify(Event::Closed);
    }

    /// Layer hook: asynchronous failure; closes, then publishes the error
    pub fn set_error(&self, cause: RapiError) {
        tracing::debug!(name = %self.name, error = %cause, "binding error");
        self.close();
        self.events.notify(Event::Error(Arc::new(cause)));
    }
}

impl EventSource for Binding {
    fn events(&self) -> &EventDispatcher {
        &self.events
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .field("waiting", &self.waiting_connections())
            .finish_non_exhaustive()
    }
}
