// Pool-level error taxonomy
//
// Every failure the device pool reports to its caller is one of these
// kinds. The classification helpers tell the caller (and the pool itself)
// how to react: skip the test, keep the device pooled, or retire it.

use std::time::Duration;

use thiserror::Error;

use crate::fault::LossReason;

/// Errors surfaced by the device pool
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The requested configuration is not supported by the adapter.
    /// Memoized per canonical key; callers should skip rather than fail.
    #[error("configuration unsupported: {0}")]
    ConfigurationUnsupported(String),

    /// Device creation failed for a reason other than a capability gap
    #[error("device creation failed: {0}")]
    CreationFailed(String),

    /// An out-of-memory fault was captured while the device was in use
    #[error("device out of memory: {0}")]
    OutOfMemory(String),

    /// A validation fault was captured while the device was in use. The
    /// device itself stays healthy and remains pooled.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The device was lost without the caller declaring that loss, or
    /// with a different reason than declared
    #[error("unexpected device loss ({reason}): {message}")]
    UnexpectedLoss {
        reason: LossReason,
        message: String,
    },

    /// The fault scope stack was not balanced at release time
    #[error("fault scope imbalance: {0}")]
    ScopeImbalance(String),

    /// Closing the fault scopes did not complete within the release timeout
    #[error("device release timed out after {0:?}")]
    ReleaseTimeout(Duration),

    /// A holder was driven through an invalid state transition (caller bug)
    #[error("invalid holder state: expected {expected}, found {actual}")]
    InvalidHolderState {
        expected: &'static str,
        actual: &'static str,
    },

    /// An unclassified device failure surfaced during release
    #[error("device failure during release: {0}")]
    Device(String),
}

impl PoolError {
    /// Returns a unique static string code for this error kind
    pub fn error_code(&self) -> &'static str {
        match self {
            PoolError::ConfigurationUnsupported(_) => "POOL_CONFIGURATION_UNSUPPORTED",
            PoolError::CreationFailed(_) => "POOL_CREATION_FAILED",
            PoolError::OutOfMemory(_) => "POOL_OUT_OF_MEMORY",
            PoolError::ValidationFailed(_) => "POOL_VALIDATION_FAILED",
            PoolError::UnexpectedLoss { .. } => "POOL_UNEXPECTED_LOSS",
            PoolError::ScopeImbalance(_) => "POOL_SCOPE_IMBALANCE",
            PoolError::ReleaseTimeout(_) => "POOL_RELEASE_TIMEOUT",
            PoolError::InvalidHolderState { .. } => "POOL_INVALID_HOLDER_STATE",
            PoolError::Device(_) => "POOL_DEVICE_FAILURE",
        }
    }

    /// True when the caller should treat the error as "skip", not "fail":
    /// the configuration reflects a capability gap, not a defect
    pub fn is_skip(&self) -> bool {
        matches!(self, PoolError::ConfigurationUnsupported(_))
    }

    /// True when the pooled device survives the failure and the error only
    /// marks the current test as failed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PoolError::ValidationFailed(_))
    }

    /// True when the failure forces the pool to discard the device
    pub fn requires_retirement(&self) -> bool {
        matches!(
            self,
            PoolError::OutOfMemory(_)
                | PoolError::UnexpectedLoss { .. }
                | PoolError::ScopeImbalance(_)
                | PoolError::ReleaseTimeout(_)
                | PoolError::Device(_)
        )
    }
}

/// Standard result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_is_skip_only() {
        let err = PoolError::ConfigurationUnsupported("key".to_string());
        assert!(err.is_skip());
        assert!(!err.is_recoverable());
        assert!(!err.requires_retirement());
    }

    #[test]
    fn validation_is_recoverable_only() {
        let err = PoolError::ValidationFailed("bad bind group".to_string());
        assert!(err.is_recoverable());
        assert!(!err.is_skip());
        assert!(!err.requires_retirement());
    }

    #[test]
    fn fatal_release_kinds_require_retirement() {
        let fatal = [
            PoolError::OutOfMemory("buffer allocation".to_string()),
            PoolError::UnexpectedLoss {
                reason: LossReason::Unknown,
                message: "gone".to_string(),
            },
            PoolError::ScopeImbalance("extra scope".to_string()),
            PoolError::ReleaseTimeout(Duration::from_millis(5000)),
            PoolError::Device("queue failure".to_string()),
        ];
        for err in fatal {
            assert!(err.requires_retirement(), "{} should retire", err.error_code());
            assert!(!err.is_recoverable());
        }
    }

    #[test]
    fn reserve_time_kinds_do_not_retire() {
        let err = PoolError::CreationFailed("out of adapters".to_string());
        assert!(!err.requires_retirement());
        let err = PoolError::InvalidHolderState {
            expected: "free",
            actual: "reserved",
        };
        assert!(!err.requires_retirement());
    }
}
