//! Packet loss rate in percent.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::delay::{derive_additive, remove_additive};
use super::interval::{Interval, IntervalProperty, Limit};
use super::PropertyKind;
use crate::error::PropertyError;

const LOWER: u32 = 0;
const UPPER: u32 = 100;

/// Loss rate of a connection, constrained to `[0, 100]` percent
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Interval", into = "Interval")]
pub struct LossRate {
    interval: Interval,
}

impl LossRate {
    /// Create from bounds; fails outside `[0, 100]` or for `min > max`
    pub fn new(min: Option<u32>, max: Option<u32>, variance: f64) -> Result<Self, PropertyError> {
        Self::from_interval(Interval::checked(PropertyKind::LossRate, min, max, variance)?)
    }

    /// Create with a single bound, clamping the value into `[0, 100]`
    pub fn clamped(percent: u32, limit: Limit) -> Self {
        Self {
            interval: Interval::limit(percent.clamp(LOWER, UPPER), 0.0, limit),
        }
    }

    /// Loss-free connection
    pub fn lossless() -> Self {
        Self {
            interval: Interval::exact(0, 0.0),
        }
    }

    /// Validate the range of an interval
    pub fn from_interval(interval: Interval) -> Result<Self, PropertyError> {
        for value in [interval.min(), interval.max()].into_iter().flatten() {
            if !(LOWER..=UPPER).contains(&value) {
                return Err(PropertyError::OutOfRange {
                    kind: PropertyKind::LossRate,
                    value,
                    lower: LOWER,
                    upper: UPPER,
                });
            }
        }

        Ok(Self { interval })
    }

    /// Loss rate in % between `[0, 100]`
    pub fn loss_rate(&self) -> u32 {
        self.min().unwrap_or(0).max(self.max().unwrap_or(0))
    }

    /// Loss probability between `[0, 1]`
    pub fn loss_prob(&self) -> f32 {
        self.loss_rate() as f32 / 100.0
    }

    /// Residual requirement after a layer with capability `self` carries
    /// `requirement`.
    pub fn derive_requirements(&self, requirement: &LossRate) -> Result<LossRate, PropertyError> {
        derive_additive(&self.interval, &requirement.interval, PropertyKind::LossRate)
            .and_then(Self::from_interval)
    }

    /// Loss budget left for the rest of the path after `offered`.
    pub fn remove_capabilities(&self, offered: &LossRate) -> Result<LossRate, PropertyError> {
        remove_additive(&self.interval, &offered.interval, PropertyKind::LossRate)
            .and_then(Self::from_interval)
    }

    /// Merge another loss rate into this one
    pub fn fuse(&mut self, other: &LossRate) -> Result<(), PropertyError> {
        self.interval.fuse(&other.interval, PropertyKind::LossRate)
    }

    /// No maximum loss rate required
    pub fn is_best_effort(&self) -> bool {
        self.max().is_none()
    }
}

impl IntervalProperty for LossRate {
    fn interval(&self) -> &Interval {
        &self.interval
    }

    fn unit(&self) -> &'static str {
        "%"
    }
}

impl TryFrom<Interval> for LossRate {
    type Error = PropertyError;

    fn try_from(interval: Interval) -> Result<Self, Self::Error> {
        Interval::checked(
            PropertyKind::LossRate,
            interval.min(),
            interval.max(),
            interval.variance(),
        )
        .and_then(Self::from_interval)
    }
}

impl From<LossRate> for Interval {
    fn from(loss: LossRate) -> Self {
        loss.interval
    }
}

impl fmt::Display for LossRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.interval.fmt_with_unit(f, self.unit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_fails() {
        assert!(LossRate::new(None, Some(101), 0.0).is_err());
        assert!(LossRate::new(Some(150), None, 0.0).is_err());
        assert!(LossRate::new(Some(0), Some(100), 0.0).is_ok());
    }

    #[test]
    fn test_clamped_constructor() {
        let loss = LossRate::clamped(250, Limit::Max);
        assert_eq!(loss.max(), Some(100));
        assert!((loss.loss_prob() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_loss_prob() {
        let loss = LossRate::new(Some(5), Some(20), 0.0).unwrap();
        assert_eq!(loss.loss_rate(), 20);
        assert!((loss.loss_prob() - 0.2).abs() < f32::EPSILON);
        assert_eq!(LossRate::default().loss_prob(), 0.0);
        assert_eq!(LossRate::lossless().loss_rate(), 0);
    }

    #[test]
    fn test_remove_capabilities() {
        let budget = LossRate::clamped(10, Limit::Max);
        let hop = LossRate::clamped(3, Limit::Max);
        let rest = budget.remove_capabilities(&hop).unwrap();
        assert_eq!(rest.max(), Some(7));
        assert!(rest.remove_capabilities(&LossRate::clamped(8, Limit::Max)).is_err());
    }

    #[test]
    fn test_deserialize_checks_range() {
        let ok: LossRate = serde_json::from_str(r#"{"max":10}"#).unwrap();
        assert_eq!(ok.max(), Some(10));
        assert!(serde_json::from_str::<LossRate>(r#"{"max":300}"#).is_err());
    }
}
