use std::fmt;

/// Error returned by curve operations
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Index or parameter is outside of the valid range
    OutOfRange { reason: String },
    /// Argument does not satisfy operation requirements
    InvalidParameter { reason: String },
    /// Operation is not applicable to the current state of the curve
    InvalidOperation { reason: String },
    /// Operation is not supported for this kind of curve
    MissedFeature { reason: String },
}

impl Error {
    pub(crate) fn out_of_range(reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    pub(crate) fn missed_feature(reason: impl Into<String>) -> Self {
        Self::MissedFeature {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}
