//! Connection endpoints.
//!
//! A [`ConnectionEndpoint`] is one side's handle to a data exchange. The
//! layer owning the connection supplies a [`PeerLink`] for outbound data and
//! pushes inbound data with [`ConnectionEndpoint::store_data_for_app`].
//!
//! ## Inbound modes
//!
//! | Mode        | Entered by                          | Read with                 |
//! |-------------|-------------------------------------|---------------------------|
//! | `Unset`     | creation                            | -                         |
//! | `Discrete`  | first `read()` or first stored data | `read()`                  |
//! | `Streaming` | `input_stream()`                    | [`InputStream`] (blocking)|
//!
//! Streaming is final. Switching to it moves already queued objects, in
//! order, into the stream; a discrete `read()` afterwards fails with
//! [`RapiError::WrongReadMode`].
//!
//! ```rust,ignore
//! use std::io::Read;
//!
//! let conn = layer.connect(&name, Some(&requirements), None);
//! conn.register_listener(listener_fn(|event| {
//!     tracing::info!(%event, "connection event");
//!     Ok(())
//! }));
//!
//! conn.write("hello")?;
//! let mut input = conn.input_stream()?;
//! let mut buf = [0u8; 1024];
//! let n = input.read(&mut buf)?;
//! ```

mod payload;
mod stream;

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

pub use payload::Payload;
pub use stream::{InputStream, OutputStream};

use self::stream::StreamBridge;
use crate::config::StreamConfig;
use crate::description::Description;
use crate::error::{RapiError, Result};
use crate::event::{Event, EventDispatcher, EventSource};
use crate::identity::Signature;
use crate::layer::PeerLink;
use crate::name::Name;

/// How inbound data is handed to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMode {
    /// No data and no accessor yet
    Unset,
    /// Discrete objects via `read()`
    Discrete,
    /// Bytes via the input stream
    Streaming,
}

enum Inbound {
    Unset,
    Discrete(VecDeque<Payload>),
    Streaming(Arc<StreamBridge>),
}

impl Inbound {
    fn mode(&self) -> InboundMode {
        match self {
            Self::Unset => InboundMode::Unset,
            Self::Discrete(_) => InboundMode::Discrete,
            Self::Streaming(_) => InboundMode::Streaming,
        }
    }
}

/// One side of a connection
pub struct ConnectionEndpoint {
    /// Unique endpoint ID
    id: String,
    /// Binding this connection targets
    binding_name: Option<Name>,
    /// Layer-specific transmit half; `None` for failed endpoints
    link: Option<Arc<dyn PeerLink>>,
    /// Snapshot of the connection requirements
    requirements: Option<Description>,
    /// Signatures supplied by the layer
    authentications: Vec<Signature>,
    inbound: Mutex<Inbound>,
    connecting: AtomicBool,
    closed: Arc<AtomicBool>,
    events: EventDispatcher,
    stream_config: StreamConfig,
}

impl ConnectionEndpoint {
    /// Create an endpoint towards `binding_name`, sending through `link`
    pub fn new(binding_name: Name, link: Arc<dyn PeerLink>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            binding_name: Some(binding_name),
            link: Some(link),
            requirements: None,
            authentications: Vec::new(),
            inbound: Mutex::new(Inbound::Unset),
            connecting: AtomicBool::new(false),
            closed: Arc::new(AtomicBool::new(false)),
            events: EventDispatcher::new(),
            stream_config: StreamConfig::default(),
        }
    }

    /// Create an endpoint that failed during setup.
    ///
    /// It is closed from the start; the cause is queued as an
    /// [`Event::Error`] for the first listener.
    pub fn failed(binding_name: Option<Name>, cause: RapiError) -> Self {
        let endpoint = Self {
            id: uuid::Uuid::new_v4().to_string(),
            binding_name,
            link: None,
            requirements: None,
            authentications: Vec::new(),
            inbound: Mutex::new(Inbound::Unset),
            connecting: AtomicBool::new(false),
            closed: Arc::new(AtomicBool::new(true)),
            events: EventDispatcher::new(),
            stream_config: StreamConfig::default(),
        };

        tracing::debug!(id = %endpoint.id, error = %cause, "connection endpoint failed");
        endpoint.events.notify(Event::Error(Arc::new(cause)));
        endpoint
    }

    /// Store a snapshot of the connection requirements
    pub fn with_requirements(mut self, requirements: &Description) -> Self {
        self.requirements = Some(requirements.clone());
        self
    }

    /// Attach signatures authenticating the connection
    pub fn with_authentications(mut self, authentications: Vec<Signature>) -> Self {
        self.authentications = authentications;
        self
    }

    /// Set stream configuration
    pub fn with_stream_config(mut self, config: StreamConfig) -> Self {
        self.stream_config = config;
        self
    }

    /// Use a custom event dispatcher, e.g. one with a failure hook
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    /// Get endpoint ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the target binding
    pub fn binding_name(&self) -> Option<&Name> {
        self.binding_name.as_ref()
    }

    /// Requirements the connection was created with
    pub fn requirements(&self) -> Option<&Description> {
        self.requirements.as_ref()
    }

    /// Signatures in the order the layer supplied them
    pub fn authentications(&self) -> &[Signature] {
        &self.authentications
    }

    /// Current inbound mode
    pub fn inbound_mode(&self) -> InboundMode {
        self.inbound.lock().mode()
    }

    /// Check if the endpoint was closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Check if the connection is usable
    pub fn is_connected(&self) -> bool {
        !self.is_closed() && self.link.as_ref().is_some_and(|link| link.is_connected())
    }

    /// Establish the connection.
    ///
    /// No-op while connected or while a connect is in flight.
    pub fn connect(&self) -> Result<()> {
        let link = self.live_link()?;

        if link.is_connected() || self.connecting.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        tracing::debug!(id = %self.id, "connecting");
        link.connect().inspect_err(|_| {
            self.connecting.store(false, Ordering::Release);
        })
    }

    /// Layer hook: the connection is up
    pub fn connection_established(&self) {
        self.connecting.store(false, Ordering::Release);
        tracing::debug!(id = %self.id, "connection established");
        self.events.notify(Event::Connected);
    }

    /// Send data to the peer without waiting for acknowledgment
    pub fn write(&self, data: impl Into<Payload>) -> Result<()> {
        if !self.is_connected() {
            return Err(RapiError::ConnectionBroken);
        }

        let link = self.live_link()?;
        let data = data.into();
        tracing::trace!(id = %self.id, kind = data.kind(), len = data.encoded_len(), "write");
        link.send_data_to_peer(data)
    }

    /// Take the next buffered object without blocking.
    ///
    /// Buffered objects are still returned after the connection broke;
    /// [`RapiError::ConnectionBroken`] is returned once they are drained.
    pub fn read(&self) -> Result<Option<Payload>> {
        {
            let mut inbound = self.inbound.lock();
            match &mut *inbound {
                Inbound::Streaming(_) => {
                    return Err(RapiError::WrongReadMode(
                        "connection delivers data through its input stream".to_string(),
                    ));
                },
                Inbound::Discrete(queue) => {
                    if let Some(data) = queue.pop_front() {
                        return Ok(Some(data));
                    }
                },
                Inbound::Unset if !self.is_closed() => {
                    *inbound = Inbound::Discrete(VecDeque::new());
                },
                Inbound::Unset => {},
            }
        }

        if self.is_connected() {
            Ok(None)
        } else {
            Err(RapiError::ConnectionBroken)
        }
    }

    /// Buffered objects, or readable bytes once streaming
    pub fn available(&self) -> usize {
        match &*self.inbound.lock() {
            Inbound::Unset => 0,
            Inbound::Discrete(queue) => queue.len(),
            Inbound::Streaming(bridge) => bridge.available(),
        }
    }

    /// Get a blocking reader over inbound data.
    ///
    /// The first call switches the endpoint to streaming mode. All readers
    /// share one stream; bytes go to whichever reader takes them first.
    pub fn input_stream(&self) -> Result<InputStream> {
        if self.is_closed() {
            return Err(RapiError::ConnectionBroken);
        }

        let mut inbound = self.inbound.lock();
        let bridge = match &mut *inbound {
            Inbound::Streaming(bridge) => Arc::clone(bridge),
            other => {
                let bridge = Arc::new(StreamBridge::new(self.stream_config.initial_capacity));
                if let Inbound::Discrete(queue) = &mut *other {
                    tracing::debug!(id = %self.id, queued = queue.len(), "migrating queued data to stream");
                    for data in queue.drain(..) {
                        bridge.push(&data.into_bytes());
                    }
                }
                *other = Inbound::Streaming(Arc::clone(&bridge));
                bridge
            },
        };

        Ok(InputStream::new(bridge))
    }

    /// Get a writer that sends every chunk to the peer
    pub fn output_stream(&self) -> Result<OutputStream> {
        let link = self.live_link()?;
        Ok(OutputStream::new(Arc::clone(link), Arc::clone(&self.closed)))
    }

    /// Layer hook: deliver received data to the application.
    ///
    /// Rejected with [`RapiError::ConnectionBroken`] after close.
    pub fn store_data_for_app(&self, data: impl Into<Payload>) -> Result<()> {
        let data = data.into();
        {
            let mut inbound = self.inbound.lock();
            if self.is_closed() {
                tracing::warn!(id = %self.id, "data for closed connection dropped");
                return Err(RapiError::ConnectionBroken);
            }

            tracing::trace!(id = %self.id, kind = data.kind(), len = data.encoded_len(), "data for app");
            match &mut *inbound {
                Inbound::Unset => *inbound = Inbound::Discrete(VecDeque::from([data])),
                Inbound::Discrete(queue) => queue.push_back(data),
                Inbound::Streaming(bridge) => {
                    bridge.push(&data.into_bytes());
                },
            }
        }

        self.events.notify(Event::DataAvailable);
        Ok(())
    }

    /// Release buffers and adapters and close the link.
    ///
    /// Readers blocked on the input stream wake up, drain what is buffered
    /// and then see end of stream.
    pub fn close(&self) {
        {
            let mut inbound = self.inbound.lock();
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            if let Inbound::Streaming(bridge) = std::mem::replace(&mut *inbound, Inbound::Unset) {
                bridge.close();
            }
        }

        if let Some(link) = &self.link {
            link.close();
        }

        tracing::debug!(id = %self.id, "connection closed");
        self.events.notify(Event::Closed);
    }

    /// Layer hook: asynchronous failure; publishes the error, then closes
    pub fn set_error(&self, cause: RapiError) {
        tracing::debug!(id = %self.id, error = %cause, "connection error");
        self.events.notify(Event::Error(Arc::new(cause)));
        self.close();
    }

    fn live_link(&self) -> Result<&Arc<dyn PeerLink>> {
        match &self.link {
            Some(link) if !self.is_closed() => Ok(link),
            _ => Err(RapiError::ConnectionBroken),
        }
    }
}

impl EventSource for ConnectionEndpoint {
    fn events(&self) -> &EventDispatcher {
        &self.events
    }
}

impl fmt::Debug for ConnectionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEndpoint")
            .field("id", &self.id)
            .field("binding_name", &self.binding_name)
            .field("connected", &self.is_connected())
            .field("mode", &self.inbound_mode())
            .finish_non_exhaustive()
    }
}
