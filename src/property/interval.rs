//! Min/max/variance shape shared by datarate, delay and loss rate.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::PropertyKind;
use crate::error::PropertyError;

/// Variances below this magnitude read as zero.
pub const EPS: f64 = 0.000_01;

/// Which bound a single-value constructor sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Limit {
    /// The value is a lower bound
    Min,
    /// The value is an upper bound
    Max,
}

/// A `[min, max]` interval where either bound may be undefined.
///
/// Invariant: `min <= max` whenever both are defined. Instances are only
/// built through [`Interval::checked`] or by the algebra, which preserves it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Interval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<u32>,
    #[serde(default)]
    variance: f64,
}

impl Interval {
    /// Interval without any restriction
    pub const UNBOUNDED: Interval = Interval {
        min: None,
        max: None,
        variance: 0.0,
    };

    /// Build an interval, rejecting `min > max`.
    pub fn checked(
        kind: PropertyKind,
        min: Option<u32>,
        max: Option<u32>,
        variance: f64,
    ) -> Result<Self, PropertyError> {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(PropertyError::InvertedInterval { kind, min, max });
            }
        }

        Ok(Self::raw(min, max, variance))
    }

    /// Interval with a single bound
    pub fn limit(value: u32, variance: f64, limit: Limit) -> Self {
        match limit {
            Limit::Min => Self::raw(Some(value), None, variance),
            Limit::Max => Self::raw(None, Some(value), variance),
        }
    }

    /// Interval collapsed to one value
    pub fn exact(value: u32, variance: f64) -> Self {
        Self::raw(Some(value), Some(value), variance)
    }

    /// Callers guarantee `min <= max`.
    pub(crate) fn raw(min: Option<u32>, max: Option<u32>, variance: f64) -> Self {
        Self {
            min,
            max,
            // also maps NaN to zero
            variance: variance.max(0.0),
        }
    }

    /// Lower bound, if any
    pub fn min(&self) -> Option<u32> {
        self.min
    }

    /// Upper bound, if any
    pub fn max(&self) -> Option<u32> {
        self.max
    }

    /// Variance, with values below [`EPS`] reported as zero
    pub fn variance(&self) -> f64 {
        if self.variance.abs() < EPS {
            0.0
        } else {
            self.variance
        }
    }

    /// Check whether both bounds are defined and equal
    pub fn is_exact(&self) -> bool {
        matches!((self.min, self.max), (Some(min), Some(max)) if min == max)
    }

    /// Check whether neither bound is defined
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Tighten this interval with another one of the same kind.
    ///
    /// The larger of the two mins and the smaller of the two maxes win;
    /// an undefined bound yields to a defined one. On failure `self` keeps
    /// its previous bounds.
    pub fn fuse(&mut self, other: &Interval, kind: PropertyKind) -> Result<(), PropertyError> {
        let min = tighter(self.min, other.min, u32::max);
        let max = tighter(self.max, other.max, u32::min);

        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(PropertyError::InvalidFuse {
                    kind,
                    detail: format!("fusing {} with {} gives [{lo}, {hi}]", self, other),
                });
            }
        }

        self.min = min;
        self.max = max;
        Ok(())
    }

    /// Write the human-readable bounds followed by `unit`.
    pub fn fmt_with_unit(&self, f: &mut fmt::Formatter<'_>, unit: &str) -> fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) if min == max => write!(f, "{min}{unit}")?,
            (Some(min), Some(max)) => write!(f, "[{min}, {max}]{unit}")?,
            (Some(min), None) => write!(f, "min {min}{unit}")?,
            (None, Some(max)) => write!(f, "max {max}{unit}")?,
            (None, None) => return f.write_str("no restrictions"),
        }

        let variance = self.variance();
        if variance != 0.0 {
            write!(f, " (var={variance})")?;
        }
        Ok(())
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with_unit(f, "")
    }
}

fn tighter(a: Option<u32>, b: Option<u32>, pick: fn(u32, u32) -> u32) -> Option<u32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

/// Larger of two optional values; an undefined value yields to a defined one.
pub(crate) fn max_defined(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    tighter(a, b, u32::max)
}

/// Accessors shared by every interval-shaped property.
pub trait IntervalProperty {
    /// Underlying interval
    fn interval(&self) -> &Interval;

    /// Lower bound, if any
    fn min(&self) -> Option<u32> {
        self.interval().min()
    }

    /// Upper bound, if any
    fn max(&self) -> Option<u32> {
        self.interval().max()
    }

    /// Variance of the quantity
    fn variance(&self) -> f64 {
        self.interval().variance()
    }

    /// Unit suffix used for display
    fn unit(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIND: PropertyKind = PropertyKind::Datarate;

    #[test]
    fn test_checked_rejects_inverted() {
        assert!(Interval::checked(KIND, Some(5), Some(3), 0.0).is_err());
        assert!(Interval::checked(KIND, Some(3), Some(3), 0.0).is_ok());
        assert!(Interval::checked(KIND, Some(7), None, 0.0).is_ok());
    }

    #[test]
    fn test_fuse_tightens_both_bounds() {
        let mut a = Interval::checked(KIND, Some(10), Some(100), 0.0).unwrap();
        let b = Interval::checked(KIND, Some(20), Some(80), 0.0).unwrap();
        a.fuse(&b, KIND).unwrap();
        assert_eq!(a.min(), Some(20));
        assert_eq!(a.max(), Some(80));
    }

    #[test]
    fn test_fuse_undefined_yields_to_defined() {
        let mut a = Interval::limit(50, 0.0, Limit::Min);
        let b = Interval::limit(90, 0.0, Limit::Max);
        a.fuse(&b, KIND).unwrap();
        assert_eq!(a.min(), Some(50));
        assert_eq!(a.max(), Some(90));
    }

    #[test]
    fn test_fuse_failure_leaves_bounds() {
        let mut a = Interval::limit(50, 0.0, Limit::Min);
        let b = Interval::limit(40, 0.0, Limit::Max);
        assert!(a.fuse(&b, KIND).is_err());
        assert_eq!(a, Interval::limit(50, 0.0, Limit::Min));
    }

    #[test]
    fn test_variance_epsilon() {
        assert_eq!(Interval::exact(1, 0.000_000_1).variance(), 0.0);
        assert_eq!(Interval::exact(1, -3.0).variance(), 0.0);
        assert!((Interval::exact(1, 2.5).variance() - 2.5).abs() < EPS);
    }

    #[test]
    fn test_display() {
        assert_eq!(Interval::exact(7, 0.0).to_string(), "7");
        assert_eq!(Interval::UNBOUNDED.to_string(), "no restrictions");
        assert_eq!(
            Interval::checked(KIND, Some(1), Some(4), 2.0).unwrap().to_string(),
            "[1, 4] (var=2)"
        );
    }
}
