//! Contract between concrete layers and the core.
//!
//! A layer creates [`Binding`]s when services register and
//! [`ConnectionEndpoint`]s for both sides of a connect request. It drives them
//! through their layer hooks:
//!
//! | Hook                                        | Effect                          |
//! |---------------------------------------------|---------------------------------|
//! | `Binding::add_incoming_connection`          | queue + `NewConnection` event   |
//! | `ConnectionEndpoint::store_data_for_app`    | buffer + `DataAvailable` event  |
//! | `ConnectionEndpoint::connection_established`| `Connected` event               |
//! | `set_error` on either                       | `Error` event, then close       |
//!
//! In return the endpoint calls the layer only through its [`PeerLink`].
//!
//! Errors of `bind` and `connect` are reported as events on the returned
//! objects, since they are usually detected on the layer's own threads.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::binding::Binding;
use crate::connection::{ConnectionEndpoint, Payload};
use crate::description::Description;
use crate::error::Result;
use crate::event::EventSource;
use crate::identity::Identity;
use crate::name::Name;

/// Operational status of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerStatus {
    /// Layer is up and accepts requests
    Operating,
    /// Layer lost its lower-layer connectivity
    Disconnected,
    /// Layer failed
    Error,
}

impl fmt::Display for LayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Operating => "operating",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// A layer of the recursive stack
pub trait Layer: EventSource + Send + Sync {
    /// Current status
    fn status(&self) -> LayerStatus;

    /// Register a service `name`.
    ///
    /// `parent` is the layer on whose behalf the binding is created, if any.
    fn bind(
        &self,
        parent: Option<&dyn Layer>,
        name: &Name,
        requirements: Option<&Description>,
        identity: Option<&Identity>,
    ) -> Arc<Binding>;

    /// Connect to the service `name`
    fn connect(
        &self,
        name: &Name,
        requirements: Option<&Description>,
        requester: Option<&Identity>,
    ) -> Arc<ConnectionEndpoint>;

    /// Check whether the layer can resolve `name`
    fn is_known(&self, name: &Name) -> bool;

    /// Capabilities the layer offers, towards `name` if given
    fn capabilities(
        &self,
        name: Option<&Name>,
        requirements: Option<&Description>,
    ) -> Result<Description>;

    /// Reachable peers, filtered by `prefix` if given
    fn neighbors(&self, prefix: Option<&Name>) -> Result<Vec<Name>>;

    /// Requirements the layers beneath have to meet when this layer carries
    /// a connection to `name` with `requirements`.
    fn residual_requirements(&self, name: &Name, requirements: &Description) -> Result<Description> {
        let capabilities = self.capabilities(Some(name), Some(requirements))?;
        Ok(capabilities.derive_requirements(requirements)?)
    }
}

/// Layer-specific half of a connection endpoint
pub trait PeerLink: Send + Sync {
    /// Transmit data to the peer(s). Must not wait for acknowledgment.
    fn send_data_to_peer(&self, data: Payload) -> Result<()>;

    /// Check whether the underlying connection is up
    fn is_connected(&self) -> bool;

    /// Start establishing the connection.
    ///
    /// Completion is signalled via `ConnectionEndpoint::connection_established`.
    fn connect(&self) -> Result<()>;

    /// Release the underlying connection
    fn close(&self);
}

/// Keep the names starting with `prefix`; all of them if `prefix` is `None`
pub fn filter_neighbors<'a, I>(names: I, prefix: Option<&Name>) -> Vec<Name>
where
    I: IntoIterator<Item = &'a Name>,
{
    names
        .into_iter()
        .filter(|name| prefix.map_or(true, |p| name.starts_with(p)))
        .cloned()
        .collect()
}
