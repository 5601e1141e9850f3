//! Delay requirement/capability in milliseconds.
//!
//! Delay accumulates along a path: removing an offered delay subtracts its
//! maximum from the remaining budget and adds up the variances. Loss rate
//! follows the same arithmetic, so the interval-level functions here are
//! shared with [`super::LossRate`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::interval::{Interval, IntervalProperty, Limit};
use super::PropertyKind;
use crate::error::PropertyError;

/// Default maximum delay of a [`Delay::default_requirement`] in ms.
pub const DEFAULT_MAX_DELAY_MSEC: u32 = 100;

/// Delay introduced or tolerated by a connection
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Interval", into = "Interval")]
pub struct Delay {
    interval: Interval,
}

impl Delay {
    /// Create from bounds, rejecting `min > max`
    pub fn new(min: Option<u32>, max: Option<u32>, variance: f64) -> Result<Self, PropertyError> {
        Interval::checked(PropertyKind::Delay, min, max, variance).map(Self::from_interval)
    }

    /// Create with a single bound
    pub fn with_limit(msec: u32, variance: f64, limit: Limit) -> Self {
        Self::from_interval(Interval::limit(msec, variance, limit))
    }

    /// Tolerate at most `msec`
    pub fn at_most(msec: u32) -> Self {
        Self::with_limit(msec, 0.0, Limit::Max)
    }

    /// Introduce at least `msec`
    pub fn at_least(msec: u32) -> Self {
        Self::with_limit(msec, 0.0, Limit::Min)
    }

    /// Requirement used when the caller does not name a delay
    pub fn default_requirement() -> Self {
        Self::at_most(DEFAULT_MAX_DELAY_MSEC)
    }

    pub(crate) fn from_interval(interval: Interval) -> Self {
        Self { interval }
    }

    /// Residual requirement after a layer with capability `self` carries
    /// `requirement`.
    pub fn derive_requirements(&self, requirement: &Delay) -> Result<Delay, PropertyError> {
        derive_additive(&self.interval, &requirement.interval, PropertyKind::Delay)
            .map(Self::from_interval)
    }

    /// Delay budget left for the rest of the path after `offered` is spent.
    pub fn remove_capabilities(&self, offered: &Delay) -> Result<Delay, PropertyError> {
        remove_additive(&self.interval, &offered.interval, PropertyKind::Delay)
            .map(Self::from_interval)
    }

    /// Merge another delay into this one
    pub fn fuse(&mut self, other: &Delay) -> Result<(), PropertyError> {
        self.interval.fuse(&other.interval, PropertyKind::Delay)
    }

    /// No maximum delay required
    pub fn is_best_effort(&self) -> bool {
        self.max().is_none()
    }
}

impl IntervalProperty for Delay {
    fn interval(&self) -> &Interval {
        &self.interval
    }

    fn unit(&self) -> &'static str {
        "ms"
    }
}

impl TryFrom<Interval> for Delay {
    type Error = PropertyError;

    fn try_from(interval: Interval) -> Result<Self, Self::Error> {
        Self::new(interval.min(), interval.max(), interval.variance())
    }
}

impl From<Delay> for Interval {
    fn from(value: Delay) -> Self {
        value.interval
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.interval.fmt_with_unit(f, self.unit())
    }
}

/// `capability` introduces at least its min; the requirement must tolerate it.
pub(crate) fn derive_additive(
    capability: &Interval,
    requirement: &Interval,
    kind: PropertyKind,
) -> Result<Interval, PropertyError> {
    let Some(cap_min) = capability.min() else {
        return Ok(*requirement);
    };

    match requirement.max() {
        Some(max) if cap_min <= max => Ok(Interval::exact(cap_min, capability.variance())),
        Some(max) => Err(PropertyError::Incompatible {
            kind,
            detail: format!("introduced min {cap_min} exceeds allowed max {max}"),
        }),
        None => Ok(Interval::raw(Some(cap_min), None, 0.0)),
    }
}

/// Subtract the offered max from the required budget and sum the variances.
pub(crate) fn remove_additive(
    requirement: &Interval,
    offered: &Interval,
    kind: PropertyKind,
) -> Result<Interval, PropertyError> {
    let Some(req_max) = requirement.max() else {
        return Ok(*requirement);
    };

    match (offered.max(), offered.min()) {
        (Some(off_max), _) if off_max <= req_max => Ok(Interval::raw(
            None,
            Some(req_max - off_max),
            requirement.variance() + offered.variance(),
        )),
        (Some(off_max), _) => Err(PropertyError::Incompatible {
            kind,
            detail: format!("offered max {off_max} exceeds budget {req_max}"),
        }),
        (None, Some(off_min)) => Err(PropertyError::Incompatible {
            kind,
            detail: format!("max restricted to {req_max} but offer introduces unbounded {off_min}+"),
        }),
        (None, None) => Ok(*requirement),
    }
}
