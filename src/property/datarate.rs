//! Data rate requirement/capability in kbit/s.
//!
//! Capacity adds up across parallel paths, so removing an offered capability
//! keeps the required minimum and widens the maximum to the larger of both.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::interval::{max_defined, Interval, IntervalProperty, Limit, EPS};
use super::PropertyKind;
use crate::error::PropertyError;

/// Data rate of a connection or gate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Interval", into = "Interval")]
pub struct Datarate {
    interval: Interval,
}

impl Datarate {
    /// Create from bounds, rejecting `min > max`
    pub fn new(min: Option<u32>, max: Option<u32>, variance: f64) -> Result<Self, PropertyError> {
        Interval::checked(PropertyKind::Datarate, min, max, variance).map(Self::from_interval)
    }

    /// Create with a single bound
    pub fn with_limit(kbit_per_sec: u32, variance: f64, limit: Limit) -> Self {
        Self::from_interval(Interval::limit(kbit_per_sec, variance, limit))
    }

    /// Require at least `kbit_per_sec`
    pub fn at_least(kbit_per_sec: u32) -> Self {
        Self::with_limit(kbit_per_sec, 0.0, Limit::Min)
    }

    /// Offer or allow at most `kbit_per_sec`
    pub fn at_most(kbit_per_sec: u32) -> Self {
        Self::with_limit(kbit_per_sec, 0.0, Limit::Max)
    }

    /// Exactly `kbit_per_sec`
    pub fn exact(kbit_per_sec: u32) -> Self {
        Self::from_interval(Interval::exact(kbit_per_sec, 0.0))
    }

    /// Soft requirement for a data rate.
    ///
    /// `minimal_share` is the fraction of `kbit_per_sec` that is required
    /// at minimum, clamped to `[0, 1]`. The request is modelled as a normal
    /// distribution whose mean sits halfway between the minimal share and the
    /// full rate, with three sigma reaching down to the minimal share.
    pub fn soft_requirement(kbit_per_sec: u32, minimal_share: f64) -> Self {
        let share = minimal_share.clamp(0.0, 1.0);

        if share >= 1.0 - EPS {
            return Self::at_least(kbit_per_sec);
        }

        let rate = f64::from(kbit_per_sec);
        let mean = (1.0 + share) / 2.0 * rate;
        let sigma = (mean - share * rate) / 3.0;

        Self::with_limit(mean.round() as u32, sigma * sigma, Limit::Min)
    }

    pub(crate) fn from_interval(interval: Interval) -> Self {
        Self { interval }
    }

    /// Residual requirement after a layer with capability `self` carries
    /// `requirement`.
    pub fn derive_requirements(&self, requirement: &Datarate) -> Result<Datarate, PropertyError> {
        let Some(cap_max) = self.max() else {
            // layer does not restrict the data rate
            return Ok(*requirement);
        };

        match requirement.min() {
            Some(min) if min <= cap_max => Ok(Self::exact(min)),
            Some(min) => Err(PropertyError::Incompatible {
                kind: PropertyKind::Datarate,
                detail: format!("required min {min}kbit/s exceeds offered max {cap_max}kbit/s"),
            }),
            None => Ok(Self::from_interval(Interval::raw(None, Some(cap_max), 0.0))),
        }
    }

    /// Requirement left for the rest of the path after `offered` is provided.
    pub fn remove_capabilities(&self, offered: &Datarate) -> Result<Datarate, PropertyError> {
        let Some(req_min) = self.min() else {
            return Ok(*self);
        };

        match (offered.min(), offered.max()) {
            (Some(off_min), _) if req_min <= off_min => Ok(Self::from_interval(Interval::raw(
                Some(req_min),
                max_defined(self.max(), offered.max()),
                0.0,
            ))),
            (Some(off_min), _) => Err(PropertyError::Incompatible {
                kind: PropertyKind::Datarate,
                detail: format!("min {req_min}kbit/s not supported by offered min {off_min}kbit/s"),
            }),
            (None, Some(off_max)) => Err(PropertyError::Incompatible {
                kind: PropertyKind::Datarate,
                detail: format!(
                    "min restricted to {req_min}kbit/s but offer limited to max {off_max}kbit/s without guarantee"
                ),
            }),
            (None, None) => Ok(*self),
        }
    }

    /// Merge another data rate into this one
    pub fn fuse(&mut self, other: &Datarate) -> Result<(), PropertyError> {
        self.interval.fuse(&other.interval, PropertyKind::Datarate)
    }

    /// No minimum rate required
    pub fn is_best_effort(&self) -> bool {
        self.min().is_none()
    }
}

impl IntervalProperty for Datarate {
    fn interval(&self) -> &Interval {
        &self.interval
    }

    fn unit(&self) -> &'static str {
        "kbit/s"
    }
}

impl TryFrom<Interval> for Datarate {
    type Error = PropertyError;

    fn try_from(interval: Interval) -> Result<Self, Self::Error> {
        Self::new(interval.min(), interval.max(), interval.variance())
    }
}

impl From<Datarate> for Interval {
    fn from(value: Datarate) -> Self {
        value.interval
    }
}

impl fmt::Display for Datarate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.interval.fmt_with_unit(f, self.unit())
    }
}
