// Device traits consumed by the pool
//
// The pool never talks to a concrete GPU API; it drives these traits. A
// device carries a stack of fault-capturing scopes, reports loss
// out-of-band, and can always be destroyed.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use testbed_error::{CreateError, DeviceResult, Fault, FaultScopeKind, LossInfo};

use crate::descriptor::CanonicalDescriptor;

/// Identifies one live device instance
pub type DeviceId = u64;

/// One live device handle
#[async_trait]
pub trait Device: Debug + Send + Sync {
    /// Identity of this device instance
    fn id(&self) -> DeviceId;

    /// Open a fault-capturing scope. Faults raised while the scope is
    /// open are recorded instead of propagating to the caller.
    fn push_fault_scope(&self, kind: FaultScopeKind);

    /// Close the innermost open scope, returning the first fault it
    /// captured, if any. Fails with `EmptyScopeStack` when no scope is
    /// open and with `DeviceLost` when the device has been lost.
    async fn pop_fault_scope(&self) -> DeviceResult<Option<Fault>>;

    /// Submit a no-op batch of work, forcing any outstanding faults to
    /// surface in the open scopes.
    async fn flush(&self) -> DeviceResult<()>;

    /// Loss information, if the device has reported itself lost
    fn loss_info(&self) -> Option<LossInfo>;

    /// Discard the device and everything it owns
    fn destroy(&self);
}

/// Creates devices on behalf of the pool
#[async_trait]
pub trait DeviceProvider: Debug + Send + Sync {
    /// Create a device satisfying `descriptor`, or the default device
    /// when no descriptor is given
    async fn create_device(
        &self,
        descriptor: Option<&CanonicalDescriptor>,
    ) -> Result<Arc<dyn Device>, CreateError>;
}
