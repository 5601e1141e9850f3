//! Opaque authentication tokens.
//!
//! Identities and signatures are carried through bindings and connections but
//! never interpreted by the core; verification belongs to the layers.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::name::Name;

/// Identity of a service creator or connection requester
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    name: Name,
}

impl Identity {
    /// Create an identity for a name
    pub fn new(name: Name) -> Self {
        Self { name }
    }

    /// Name of the identity
    pub fn name(&self) -> &Name {
        &self.name
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Signature over a connection, supplied by a layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    signer: Identity,
    token: Bytes,
}

impl Signature {
    /// Create a signature of `signer` with opaque token bytes
    pub fn new(signer: Identity, token: impl Into<Bytes>) -> Self {
        Self {
            signer,
            token: token.into(),
        }
    }

    /// Identity that issued the signature
    pub fn signer(&self) -> &Identity {
        &self.signer
    }

    /// Opaque signature bytes
    pub fn token(&self) -> &Bytes {
        &self.token
    }
}
