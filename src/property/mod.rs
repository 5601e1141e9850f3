//! Non-functional and functional connection properties.
//!
//! A [`Property`] is one requirement or capability. Each kind carries its own
//! payload and the requirement algebra is dispatched by matching on the kind:
//!
//! | Kind                | Family         | Best effort when       |
//! |---------------------|----------------|------------------------|
//! | `Datarate`          | interval       | no min                 |
//! | `Delay`             | interval       | no max                 |
//! | `LossRate`          | interval       | no max                 |
//! | `Priority`          | scalar         | priority 0             |
//! | `CommunicationType` | functional     | always                 |
//! | `Ordered`           | functional     | not activated          |
//!
//! ## Algebra
//!
//! - **fuse**: merge two properties of the same kind at `Description::add` time
//! - **derive_requirements**: `self` is a lower layer's capability, the argument
//!   the caller's requirement; yields what the layers beneath still have to meet
//! - **remove_capabilities**: `self` is the requirement, the argument what a
//!   layer provides; yields what remains unmet on the rest of the path
//!
//! ```rust,ignore
//! use rapi::property::{Datarate, Property};
//!
//! let offered = Property::from(Datarate::at_most(300));
//! let required = Property::from(Datarate::at_least(200));
//! let residual = offered.derive_requirements(&required)?;
//! assert_eq!(residual, Property::from(Datarate::exact(200)));
//! ```

mod communication_type;
mod datarate;
mod delay;
mod interval;
mod loss_rate;
mod ordered;
mod priority;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use communication_type::CommunicationType;
pub use datarate::Datarate;
pub use delay::{Delay, DEFAULT_MAX_DELAY_MSEC};
pub use interval::{Interval, IntervalProperty, Limit, EPS};
pub use loss_rate::LossRate;
pub use ordered::Ordered;
pub use priority::Priority;

use crate::error::PropertyError;

/// Tag identifying the kind of a [`Property`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Data rate in kbit/s
    Datarate,
    /// Delay in ms
    Delay,
    /// Loss rate in %
    LossRate,
    /// Scheduling priority
    Priority,
    /// Stream/datagram framing
    CommunicationType,
    /// In-order delivery
    Ordered,
}

impl PropertyKind {
    /// All kinds in declaration order
    pub const ALL: [PropertyKind; 6] = [
        Self::Datarate,
        Self::Delay,
        Self::LossRate,
        Self::Priority,
        Self::CommunicationType,
        Self::Ordered,
    ];

    /// Get type name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Datarate => "Datarate",
            Self::Delay => "Delay",
            Self::LossRate => "LossRate",
            Self::Priority => "Priority",
            Self::CommunicationType => "CommunicationType",
            Self::Ordered => "Ordered",
        }
    }

    /// Look up a kind by its type name, ignoring case
    pub fn from_name(name: &str) -> Option<PropertyKind> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    /// Check whether the kind takes part in requirement algebra
    pub fn is_non_functional(&self) -> bool {
        matches!(
            self,
            Self::Datarate | Self::Delay | Self::LossRate | Self::Priority
        )
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single requirement or capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Property {
    /// Data rate
    Datarate(Datarate),
    /// Delay
    Delay(Delay),
    /// Loss rate
    LossRate(LossRate),
    /// Priority
    Priority(Priority),
    /// Communication type
    CommunicationType(CommunicationType),
    /// Ordered delivery
    Ordered(Ordered),
}

impl Property {
    /// Kind tag of this property
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Datarate(_) => PropertyKind::Datarate,
            Self::Delay(_) => PropertyKind::Delay,
            Self::LossRate(_) => PropertyKind::LossRate,
            Self::Priority(_) => PropertyKind::Priority,
            Self::CommunicationType(_) => PropertyKind::CommunicationType,
            Self::Ordered(_) => PropertyKind::Ordered,
        }
    }

    /// Check whether this property takes part in requirement algebra
    pub fn is_non_functional(&self) -> bool {
        self.kind().is_non_functional()
    }

    /// Merge `other` into `self`.
    ///
    /// Both must be of the same kind. On failure `self` is left unchanged.
    pub fn fuse(&mut self, other: &Property) -> Result<(), PropertyError> {
        match (self, other) {
            (Self::Datarate(a), Self::Datarate(b)) => a.fuse(b),
            (Self::Delay(a), Self::Delay(b)) => a.fuse(b),
            (Self::LossRate(a), Self::LossRate(b)) => a.fuse(b),
            (Self::Priority(a), Self::Priority(b)) => {
                a.fuse(b);
                Ok(())
            },
            (Self::Ordered(a), Self::Ordered(b)) => {
                a.fuse(b);
                Ok(())
            },
            (Self::CommunicationType(_), Self::CommunicationType(_)) => Err(
                PropertyError::FuseNotAllowed(PropertyKind::CommunicationType),
            ),
            (this, other) => Err(PropertyError::KindMismatch {
                expected: this.kind(),
                found: other.kind(),
            }),
        }
    }

    /// Residual requirement for the layers beneath.
    ///
    /// `self` is the capability of a layer, `requirement` the caller's
    /// requirement of the same kind.
    pub fn derive_requirements(&self, requirement: &Property) -> Result<Property, PropertyError> {
        match (self, requirement) {
            (Self::Datarate(cap), Self::Datarate(req)) => {
                cap.derive_requirements(req).map(Self::Datarate)
            },
            (Self::Delay(cap), Self::Delay(req)) => cap.derive_requirements(req).map(Self::Delay),
            (Self::LossRate(cap), Self::LossRate(req)) => {
                cap.derive_requirements(req).map(Self::LossRate)
            },
            (Self::Priority(cap), Self::Priority(_)) => Ok(Self::Priority(*cap)),
            (this, other) => Err(Self::algebra_error(this, other)),
        }
    }

    /// Requirement left for the rest of the path.
    ///
    /// `self` is the requirement, `offered` what a layer actually provides.
    pub fn remove_capabilities(&self, offered: &Property) -> Result<Property, PropertyError> {
        match (self, offered) {
            (Self::Datarate(req), Self::Datarate(off)) => {
                req.remove_capabilities(off).map(Self::Datarate)
            },
            (Self::Delay(req), Self::Delay(off)) => req.remove_capabilities(off).map(Self::Delay),
            (Self::LossRate(req), Self::LossRate(off)) => {
                req.remove_capabilities(off).map(Self::LossRate)
            },
            (Self::Priority(req), Self::Priority(_)) => Ok(Self::Priority(*req)),
            (this, other) => Err(Self::algebra_error(this, other)),
        }
    }

    /// Check whether the property imposes no binding restriction
    pub fn is_best_effort(&self) -> bool {
        match self {
            Self::Datarate(p) => p.is_best_effort(),
            Self::Delay(p) => p.is_best_effort(),
            Self::LossRate(p) => p.is_best_effort(),
            Self::Priority(p) => p.is_best_effort(),
            Self::CommunicationType(_) => true,
            Self::Ordered(p) => !p.is_activated(),
        }
    }

    fn algebra_error(this: &Property, other: &Property) -> PropertyError {
        if this.is_non_functional() && this.kind() != other.kind() {
            PropertyError::KindMismatch {
                expected: this.kind(),
                found: other.kind(),
            }
        } else {
            PropertyError::NotNegotiable(this.kind())
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind())?;
        match self {
            Self::Datarate(p) => write!(f, "{p}")?,
            Self::Delay(p) => write!(f, "{p}")?,
            Self::LossRate(p) => write!(f, "{p}")?,
            Self::Priority(p) => write!(f, "{p}")?,
            Self::CommunicationType(p) => write!(f, "{p}")?,
            Self::Ordered(p) => write!(f, "{p}")?,
        }
        f.write_str(")")
    }
}

impl From<Datarate> for Property {
    fn from(value: Datarate) -> Self {
        Self::Datarate(value)
    }
}

impl From<Delay> for Property {
    fn from(value: Delay) -> Self {
        Self::Delay(value)
    }
}

impl From<LossRate> for Property {
    fn from(value: LossRate) -> Self {
        Self::LossRate(value)
    }
}

impl From<Priority> for Property {
    fn from(value: Priority) -> Self {
        Self::Priority(value)
    }
}

impl From<CommunicationType> for Property {
    fn from(value: CommunicationType) -> Self {
        Self::CommunicationType(value)
    }
}

impl From<Ordered> for Property {
    fn from(value: Ordered) -> Self {
        Self::Ordered(value)
    }
}
