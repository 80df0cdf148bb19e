// gpu-testbed Error Handling
// Central location for the error and fault types shared across the workspace

// Re-export common error handling tools for convenience
pub use anyhow;
pub use thiserror;

mod fault;
mod pool;

pub use fault::{
    CreateError, DeviceError, DeviceResult, Fault, FaultScopeKind, LossInfo, LossReason,
};
pub use pool::{PoolError, PoolResult};
