//! Type of communication a connection provides.
//!
//! Covers two aspects: whether data is exchanged as a single message or as a
//! stream, and whether the sender's message boundaries are preserved.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Amount and delimiting of exchanged data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommunicationType {
    /// Stream of data without delimiting; TCP-equivalent
    Stream,
    /// Stream of data chunks, sender delimiting preserved; TP4-equivalent
    #[default]
    DatagramStream,
    /// Single data chunk, sender delimiting preserved; UDP-equivalent
    Datagram,
}

impl CommunicationType {
    /// Get canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stream => "STREAM",
            Self::DatagramStream => "DATAGRAM_STREAM",
            Self::Datagram => "DATAGRAM",
        }
    }

    /// Type suitable for both this and `other`.
    ///
    /// Two different types always meet at [`CommunicationType::DatagramStream`],
    /// which can emulate both pure streams and single datagrams.
    pub fn common_type(self, other: CommunicationType) -> CommunicationType {
        if self == other {
            self
        } else {
            Self::DatagramStream
        }
    }

    /// Check whether connection setup needs signaling
    pub fn requires_signaling(&self) -> bool {
        *self != Self::Datagram
    }
}

impl fmt::Display for CommunicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommunicationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stream" => Ok(Self::Stream),
            "datagram_stream" => Ok(Self::DatagramStream),
            "datagram" => Ok(Self::Datagram),
            _ => Err(format!("Unknown communication type: {}", s)),
        }
    }
}
