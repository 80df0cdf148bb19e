// Fault and loss vocabulary for pooled devices
//
// These types model the collaborator-facing side of fault capture: the
// scope kinds a device can record faults under, the faults themselves, and
// the loss information a device reports when it becomes permanently
// unusable.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of fault-capturing scope that can be opened on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultScopeKind {
    /// Captures resource-exhaustion faults (allocation failures)
    OutOfMemory,

    /// Captures usage-validation faults (malformed operations)
    Validation,
}

impl fmt::Display for FaultScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultScopeKind::OutOfMemory => write!(f, "out-of-memory"),
            FaultScopeKind::Validation => write!(f, "validation"),
        }
    }
}

/// A fault captured by an open scope on a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// Which scope kind captured the fault
    pub kind: FaultScopeKind,

    /// Human-readable description reported by the device
    pub message: String,
}

impl Fault {
    /// Create a new fault
    pub fn new(kind: FaultScopeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Reason a device reports for becoming permanently unusable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LossReason {
    /// The device was lost for an unspecified reason
    Unknown,

    /// The device was lost because it was explicitly destroyed
    Destroyed,
}

impl fmt::Display for LossReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossReason::Unknown => write!(f, "unknown"),
            LossReason::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Loss notification delivered out-of-band by a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossInfo {
    /// Why the device became unusable
    pub reason: LossReason,

    /// Human-readable description reported by the device
    pub message: String,
}

impl LossInfo {
    /// Create a new loss notification
    pub fn new(reason: LossReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// Errors reported by a device while operating on it
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No fault scope is open
    #[error("no fault scope is open")]
    EmptyScopeStack,

    /// The device has been lost and cannot complete the operation
    #[error("device lost ({reason}): {message}")]
    DeviceLost {
        reason: LossReason,
        message: String,
    },

    /// Any other device-side failure
    #[error("device failure: {0}")]
    Internal(String),
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors reported while creating a device
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CreateError {
    /// The adapter cannot satisfy a requested feature
    #[error("requested feature is not supported: {0}")]
    UnsupportedFeature(String),

    /// Creation failed for a reason other than a capability gap
    #[error("device creation failed: {0}")]
    Failed(String),
}
