//! Scheduling priority of a connection.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Priority requirement; `0` means best effort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(i32);

impl Priority {
    /// Create a priority
    pub fn new(priority: i32) -> Self {
        Self(priority)
    }

    /// Numeric priority
    pub fn priority(&self) -> i32 {
        self.0
    }

    /// Keep the higher of both priorities
    pub fn fuse(&mut self, other: &Priority) {
        self.0 = self.0.max(other.0);
    }

    /// Check whether no priority is requested
    pub fn is_best_effort(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
