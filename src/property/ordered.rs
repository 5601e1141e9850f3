//! In-order delivery requirement.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Functional property requesting ordered delivery when activated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ordered {
    activated: bool,
}

impl Ordered {
    /// Create with the given activation
    pub fn new(activated: bool) -> Self {
        Self { activated }
    }

    /// Whether ordering is required
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Ordering is required as soon as one side requires it
    pub fn fuse(&mut self, other: &Ordered) {
        self.activated |= other.activated;
    }
}

impl fmt::Display for Ordered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.activated { "on" } else { "off" })
    }
}
