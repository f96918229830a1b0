use crate::{Scalar, clamp, scalar_fmt};
use std::fmt;

/// Closed interval `[start, end]` of curve parameter values
///
/// Bounds are always ordered, constructing an interval from reversed bounds
/// swaps them. Default value is a degenerate `[0, 0]` interval of empty curves.
#[derive(Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Domain {
    start: Scalar,
    end: Scalar,
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        scalar_fmt(f, self.start)?;
        write!(f, ", ")?;
        scalar_fmt(f, self.end)?;
        write!(f, "]")
    }
}

impl Domain {
    pub fn new(start: Scalar, end: Scalar) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Unit interval `[0, 1]`
    pub fn unit() -> Self {
        Self::new(0.0, 1.0)
    }

    #[inline]
    pub fn start(&self) -> Scalar {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Scalar {
        self.end
    }

    #[inline]
    pub fn length(&self) -> Scalar {
        self.end - self.start
    }

    /// Interval contains only a single value
    pub fn is_degenerate(&self) -> bool {
        self.length() <= 0.0
    }

    pub fn contains(&self, value: Scalar) -> bool {
        self.start <= value && value <= self.end
    }

    /// Restrict value to the interval
    pub fn clamp(&self, value: Scalar) -> Scalar {
        clamp(value, self.start, self.end)
    }

    /// Intersection of two intervals, `None` if they are disjoint
    pub fn intersect(&self, other: Domain) -> Option<Domain> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(Domain { start, end })
    }

    /// Map global parameter to `[0, 1]`, degenerate interval maps everything to `0`
    pub fn local(&self, value: Scalar) -> Scalar {
        let length = self.length();
        if length <= 0.0 {
            0.0
        } else {
            (value - self.start) / length
        }
    }

    /// Map local parameter from `[0, 1]` to the interval
    pub fn global(&self, t: Scalar) -> Scalar {
        self.start + t * self.length()
    }
}

impl From<(Scalar, Scalar)> for Domain {
    fn from(bounds: (Scalar, Scalar)) -> Self {
        Self::new(bounds.0, bounds.1)
    }
}
