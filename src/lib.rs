//! # RAPI - Recursive API core
//!
//! Connection and capability negotiation core of a layered networking API.
//! Applications register services ("bindings"), connect to them and state
//! non-functional requirements (data rate, delay, loss rate, priority,
//! framing) that must hold end-to-end across an arbitrary stack of layers.
//!
//! ## Features
//!
//! - **Requirement algebra**: interval properties that fuse, derive and
//!   subtract correctly as a connection crosses layer boundaries
//! - **Event dispatch**: ordered, re-entrant and fault-isolated listener
//!   delivery shared by layers, bindings and connections
//! - **Dual-mode data path**: non-blocking discrete reads or a blocking byte
//!   stream over the same delivery buffer
//!
//! ## Architecture
//!
//! ```text
//!   Application
//!      │  bind / connect (requirements)          ▲ events, read, input stream
//!      v                                         │
//!  ┌─────────┐  Binding (FIFO of connections)    │
//!  │ Layer N │──────────────────────────────────►│
//!  │         │  ConnectionEndpoint ◄── store_data_for_app
//!  └────┬────┘        │ PeerLink::send_data_to_peer
//!       │ derive_requirements(capabilities of N)
//!       v
//!  ┌─────────┐
//!  │ Layer N-1│ ...
//!  └─────────┘
//! ```
//!
//! ### Requirement algebra
//!
//! | Operation             | `self`          | Argument        | Result                        |
//! |-----------------------|-----------------|-----------------|-------------------------------|
//! | `fuse`                | property        | same kind       | tightest consistent merge     |
//! | `derive_requirements` | capability      | requirement     | residual for layers beneath   |
//! | `remove_capabilities` | requirement     | offered         | what the rest of the path owes|
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rapi::{Datarate, Delay, Description};
//!
//! let mut requirements = Description::new();
//! requirements.add(Datarate::at_least(200))?;
//! requirements.add(Delay::at_most(50))?;
//!
//! let mut capabilities = Description::new();
//! capabilities.add(Datarate::at_most(300))?;
//!
//! let residual = capabilities.derive_requirements(&requirements)?;
//! assert_eq!(residual.datarate(), Some(&Datarate::exact(200)));
//! ```
//!
//! ## Modules
//!
//! - [`property`]: property kinds and their algebra
//! - [`description`]: requirement/capability sets
//! - [`event`]: event dispatch
//! - [`binding`]: service registrations
//! - [`connection`]: connection endpoints and stream adapters
//! - [`layer`]: contract for concrete layers
//! - [`name`], [`identity`]: opaque addressing and authentication values
//! - [`config`]: configuration
//! - [`error`]: error types

pub mod binding;
pub mod config;
pub mod connection;
pub mod description;
pub mod error;
pub mod event;
pub mod identity;
pub mod layer;
pub mod name;
pub mod property;

pub use binding::Binding;
pub use config::{Config, NegotiationConfig, StreamConfig};
pub use connection::{ConnectionEndpoint, InboundMode, InputStream, OutputStream, Payload};
pub use description::Description;
pub use error::{PropertyError, RapiError, Result};
pub use event::{listener_fn, Event, EventDispatcher, EventListener, EventSource};
pub use identity::{Identity, Signature};
pub use layer::{Layer, LayerStatus, PeerLink};
pub use name::{Name, Namespace};
pub use property::{
    CommunicationType, Datarate, Delay, IntervalProperty, Limit, LossRate, Ordered, Priority,
    Property, PropertyKind,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
