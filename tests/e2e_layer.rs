//! End-to-end tests against an in-process loopback layer.
//!
//! The loopback layer pairs two endpoints in memory: data written on one side
//! is stored for the application on the other. It exercises the layer hooks
//! of bindings and endpoints the way a real transport layer drives them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use rapi::layer::filter_neighbors;
use rapi::{
    listener_fn, Binding, CommunicationType, ConnectionEndpoint, Datarate, Delay, Description,
    Event, EventDispatcher, EventSource, Identity, InboundMode, Layer, LayerStatus, Name,
    Namespace, Payload, PeerLink, RapiError, Result,
};

/// Link between two in-memory endpoints
#[derive(Default)]
struct PairLink {
    me: OnceLock<Weak<ConnectionEndpoint>>,
    peer: OnceLock<Weak<ConnectionEndpoint>>,
    connected: Arc<AtomicBool>,
}

impl PeerLink for PairLink {
    fn send_data_to_peer(&self, data: Payload) -> Result<()> {
        let peer = self
            .peer
            .get()
            .and_then(Weak::upgrade)
            .ok_or(RapiError::ConnectionBroken)?;
        peer.store_data_for_app(data)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        for side in [&self.me, &self.peer] {
            if let Some(endpoint) = side.get().and_then(Weak::upgrade) {
                endpoint.connection_established();
            }
        }
        Ok(())
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(peer) = self.peer.get().and_then(Weak::upgrade) {
            peer.close();
        }
    }
}

struct LoopbackLayer {
    capabilities: Description,
    bindings: Mutex<HashMap<Name, Arc<Binding>>>,
    events: EventDispatcher,
}

impl LoopbackLayer {
    fn new() -> Self {
        let capabilities = Description::from_properties([Datarate::at_most(1_000)])
            .expect("valid capabilities");
        Self {
            capabilities,
            bindings: Mutex::new(HashMap::new()),
            events: EventDispatcher::new(),
        }
    }
}

impl EventSource for LoopbackLayer {
    fn events(&self) -> &EventDispatcher {
        &self.events
    }
}

impl Layer for LoopbackLayer {
    fn status(&self) -> LayerStatus {
        LayerStatus::Operating
    }

    fn bind(
        &self,
        _parent: Option<&dyn Layer>,
        name: &Name,
        requirements: Option<&Description>,
        identity: Option<&Identity>,
    ) -> Arc<Binding> {
        let mut bindings = self.bindings.lock();
        if bindings.get(name).is_some_and(|b| b.is_active()) {
            return Arc::new(Binding::failed(
                name.clone(),
                RapiError::Network(format!("{name} already bound")),
            ));
        }

        let binding = Arc::new(Binding::new(name.clone(), requirements, identity.cloned()));
        bindings.insert(name.clone(), Arc::clone(&binding));
        binding
    }

    fn connect(
        &self,
        name: &Name,
        requirements: Option<&Description>,
        _requester: Option<&Identity>,
    ) -> Arc<ConnectionEndpoint> {
        let Some(binding) = self.bindings.lock().get(name).cloned() else {
            return Arc::new(ConnectionEndpoint::failed(
                Some(name.clone()),
                RapiError::Network(format!("{name} unknown")),
            ));
        };

        let requirements = requirements.cloned().unwrap_or_default();
        if let Err(e) = self.residual_requirements(name, &requirements) {
            return Arc::new(ConnectionEndpoint::failed(Some(name.clone()), e));
        }

        let connected = Arc::new(AtomicBool::new(false));
        let client_link = Arc::new(PairLink {
            connected: Arc::clone(&connected),
            ..PairLink::default()
        });
        let server_link = Arc::new(PairLink {
            connected,
            ..PairLink::default()
        });

        let client = Arc::new(
            ConnectionEndpoint::new(name.clone(), Arc::clone(&client_link) as Arc<dyn PeerLink>)
                .with_requirements(&requirements),
        );
        let server = Arc::new(
            ConnectionEndpoint::new(name.clone(), Arc::clone(&server_link) as Arc<dyn PeerLink>)
                .with_requirements(&requirements),
        );

        let _ = client_link.me.set(Arc::downgrade(&client));
        let _ = client_link.peer.set(Arc::downgrade(&server));
        let _ = server_link.me.set(Arc::downgrade(&server));
        let _ = server_link.peer.set(Arc::downgrade(&client));

        if !binding.add_incoming_connection(server) {
            return Arc::new(ConnectionEndpoint::failed(
                Some(name.clone()),
                RapiError::Network(format!("{name} no longer accepts connections")),
            ));
        }
        client
    }

    fn is_known(&self, name: &Name) -> bool {
        self.bindings.lock().contains_key(name)
    }

    fn capabilities(
        &self,
        _name: Option<&Name>,
        _requirements: Option<&Description>,
    ) -> Result<Description> {
        Ok(self.capabilities.clone())
    }

    fn neighbors(&self, prefix: Option<&Name>) -> Result<Vec<Name>> {
        Ok(filter_neighbors(self.bindings.lock().keys(), prefix))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn service(label: &str) -> Name {
    Name::new(Namespace::app("chat"), label)
}

fn record(source: &dyn EventSource) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    source.register_listener(listener_fn(move |event| {
        sink.lock().push(event.to_string());
        Ok(())
    }));
    log
}

/// Test a full bind, connect, exchange and close cycle
#[test]
fn test_connect_exchange_close() {
    init_tracing();
    let layer = LoopbackLayer::new();
    let binding = layer.bind(None, &service("lobby"), None, None);
    let binding_events = record(binding.as_ref());

    let client = layer.connect(&service("lobby"), None, None);
    assert_eq!(*binding_events.lock(), vec!["new_connection"]);

    let server = binding.get_incoming_connection().expect("queued connection");
    assert_eq!(server.binding_name(), Some(&service("lobby")));
    let server_events = record(server.as_ref());

    client.connect().unwrap();
    assert!(client.is_connected());
    assert!(server.is_connected());

    client.write("hello").unwrap();
    client.write(serde_json::json!({"seq": 2})).unwrap();
    assert_eq!(server.read().unwrap(), Some(Payload::from("hello")));
    assert_eq!(
        server.read().unwrap().and_then(|p| p.as_json().cloned()),
        Some(serde_json::json!({"seq": 2}))
    );
    assert_eq!(server.read().unwrap(), None);

    server.write("welcome").unwrap();
    assert_eq!(client.read().unwrap(), Some(Payload::from("welcome")));

    client.close();
    assert!(server.is_closed());
    assert!(matches!(server.read(), Err(RapiError::ConnectionBroken)));
    assert_eq!(
        *server_events.lock(),
        vec!["connected", "data_available", "data_available", "closed"]
    );
}

/// Test streaming on the accepting side
#[test]
fn test_stream_over_loopback() {
    use std::io::{Read, Write};

    let layer = LoopbackLayer::new();
    let binding = layer.bind(None, &service("files"), None, None);
    let client = layer.connect(&service("files"), None, None);
    let server = binding.get_incoming_connection().unwrap();
    client.connect().unwrap();

    client.write("header;").unwrap();
    let mut input = server.input_stream().unwrap();
    assert_eq!(server.inbound_mode(), InboundMode::Streaming);

    let mut output = client.output_stream().unwrap();
    output.write_all(b"body").unwrap();

    let reader = std::thread::spawn(move || {
        let mut all = Vec::new();
        input.read_to_end(&mut all).map(|_| all)
    });

    std::thread::sleep(std::time::Duration::from_millis(20));
    client.close();
    assert_eq!(reader.join().unwrap().unwrap(), b"header;body");
}

/// Test unknown names and unsatisfiable requirements fail via events
#[test]
fn test_failed_connects_report_errors() {
    init_tracing();
    let layer = LoopbackLayer::new();
    let unknown = layer.connect(&service("nobody"), None, None);
    assert!(!unknown.is_connected());
    let unknown_events = record(unknown.as_ref());
    assert_eq!(*unknown_events.lock(), vec!["error: Network error: chat://nobody unknown"]);

    layer.bind(None, &service("video"), None, None);
    let requirements = Description::from_properties([
        rapi::Property::from(Datarate::at_least(5_000)),
        rapi::Property::from(Delay::at_most(100)),
    ])
    .unwrap();
    let too_fast = layer.connect(&service("video"), Some(&requirements), None);

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    too_fast.register_listener(listener_fn(move |event| {
        if let Event::Error(cause) = event {
            sink.lock().push(matches!(cause.as_ref(), RapiError::Property(_)));
        }
        Ok(())
    }));
    assert_eq!(*errors.lock(), vec![true]);
}

/// Test negotiation of residual requirements through the layer
#[test]
fn test_residual_requirements() {
    let layer = LoopbackLayer::new();
    let requirements = Description::from_properties([
        rapi::Property::from(Datarate::at_least(300)),
        rapi::Property::from(CommunicationType::Stream),
    ])
    .unwrap();

    let residual = layer
        .residual_requirements(&service("any"), &requirements)
        .unwrap();
    assert_eq!(residual.datarate(), Some(&Datarate::exact(300)));
    assert_eq!(residual.communication_type(), Some(CommunicationType::Stream));
}

/// Test binding lifecycle as seen through the layer
#[test]
fn test_binding_lifecycle() {
    let layer = LoopbackLayer::new();
    let creator = Identity::new(service("alice"));
    let binding = layer.bind(None, &service("room-1"), None, Some(&creator));
    assert_eq!(binding.identity(), Some(&creator));
    assert!(layer.is_known(&service("room-1")));

    let duplicate = layer.bind(None, &service("room-1"), None, None);
    assert!(!duplicate.is_active());

    layer.bind(None, &service("room-2"), None, None);
    layer.bind(None, &service("hall"), None, None);
    let mut rooms = layer.neighbors(Some(&service("room"))).unwrap();
    rooms.sort_by(|a, b| a.label().cmp(b.label()));
    assert_eq!(rooms, vec![service("room-1"), service("room-2")]);

    binding.close();
    let rejected = layer.connect(&service("room-1"), None, None);
    assert!(!rejected.is_connected());
    assert_eq!(rejected.events().pending_events(), 1);
    assert_eq!(binding.waiting_connections(), 0);
}
