//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//!
//! ```toml
//! [stream]
//! initial_capacity = 64
//!
//! [negotiation]
//! default_max_delay_msec = 250
//! default_communication_type = "STREAM"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::description::Description;
use crate::error::{RapiError, Result};
use crate::property::{CommunicationType, Delay, DEFAULT_MAX_DELAY_MSEC};

/// Default initial capacity of the stream accumulator in bytes
pub const DEFAULT_STREAM_CAPACITY: usize = 32;

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Byte stream configuration
    #[serde(default)]
    pub stream: StreamConfig,

    /// Negotiation defaults
    #[serde(default)]
    pub negotiation: NegotiationConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| RapiError::Config(format!("Failed to read config file: {e}")))?;

        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RAPI_STREAM_INITIAL_CAPACITY") {
            if let Ok(val) = val.parse() {
                config.stream.initial_capacity = val;
            }
        }

        if let Ok(val) = std::env::var("RAPI_DEFAULT_MAX_DELAY_MSEC") {
            if let Ok(val) = val.parse() {
                config.negotiation.default_max_delay_msec = val;
            }
        }
        if let Ok(val) = std::env::var("RAPI_DEFAULT_COMMUNICATION_TYPE") {
            match val.parse() {
                Ok(ty) => config.negotiation.default_communication_type = ty,
                Err(e) => tracing::warn!(value = %val, error = %e, "ignoring communication type"),
            }
        }

        config
    }

    /// Merge with another config (other's non-default values take precedence)
    pub fn merge(self, other: Self) -> Self {
        let stream_default = StreamConfig::default();
        let negotiation_default = NegotiationConfig::default();

        Self {
            stream: StreamConfig {
                initial_capacity: if other.stream.initial_capacity != stream_default.initial_capacity {
                    other.stream.initial_capacity
                } else {
                    self.stream.initial_capacity
                },
            },
            negotiation: NegotiationConfig {
                default_max_delay_msec: if other.negotiation.default_max_delay_msec
                    != negotiation_default.default_max_delay_msec
                {
                    other.negotiation.default_max_delay_msec
                } else {
                    self.negotiation.default_max_delay_msec
                },
                default_communication_type: if other.negotiation.default_communication_type
                    != negotiation_default.default_communication_type
                {
                    other.negotiation.default_communication_type
                } else {
                    self.negotiation.default_communication_type
                },
            },
        }
    }
}

/// Byte stream configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Initial capacity of a fresh accumulator after each swap
    pub initial_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_STREAM_CAPACITY,
        }
    }
}

/// Defaults applied when a caller does not state requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Maximum delay of the default requirement in ms
    pub default_max_delay_msec: u32,

    /// Communication type of the default requirement
    pub default_communication_type: CommunicationType,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            default_max_delay_msec: DEFAULT_MAX_DELAY_MSEC,
            default_communication_type: CommunicationType::default(),
        }
    }
}

impl NegotiationConfig {
    /// Requirements used when a caller passes none
    pub fn default_requirements(&self) -> Description {
        let mut requirements = Description::new();
        requirements.set(Delay::at_most(self.default_max_delay_msec));
        requirements.set(self.default_communication_type);
        requirements
    }
}
