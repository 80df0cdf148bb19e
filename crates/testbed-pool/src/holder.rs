// Holder lifecycle for one pooled device
//
// A holder wraps exactly one live device and walks it through
// free -> reserved -> acquired -> free. Acquisition opens two nested
// fault-capturing scopes; release closes them, classifies what they
// captured, and always leaves the holder free again.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;
use testbed_device::{Device, DeviceId};
use testbed_error::{DeviceError, Fault, FaultScopeKind, LossInfo, LossReason, PoolError, PoolResult};

/// Lifecycle state of a holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HolderState {
    /// No caller has the device; it can be reserved
    Free,

    /// A caller reserved the device but has not acquired it yet
    Reserved,

    /// The device is in use with fault scopes open
    Acquired,
}

impl HolderState {
    fn name(self) -> &'static str {
        match self {
            HolderState::Free => "free",
            HolderState::Reserved => "reserved",
            HolderState::Acquired => "acquired",
        }
    }
}

/// Wraps one live device plus its lifecycle state
#[derive(Debug)]
pub struct DeviceHolder {
    device: Arc<dyn Device>,
    state: Mutex<HolderState>,
    expected_loss: Mutex<Option<LossReason>>,
}

impl DeviceHolder {
    /// Wrap a freshly created device
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self {
            device,
            state: Mutex::new(HolderState::Free),
            expected_loss: Mutex::new(None),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> HolderState {
        *self.state.lock().unwrap()
    }

    /// Identity of the wrapped device
    pub fn device_id(&self) -> DeviceId {
        self.device.id()
    }

    /// Move free -> reserved. Failing the precondition means the caller
    /// reserved the same device twice.
    pub fn reserve(&self) -> PoolResult<()> {
        self.transition(HolderState::Free, HolderState::Reserved)
    }

    /// Move reserved -> acquired and hand out the device for use. The
    /// out-of-memory scope is the outer one so exhaustion faults are
    /// still captured after the validation scope closes.
    pub fn acquire(&self) -> PoolResult<Arc<dyn Device>> {
        self.transition(HolderState::Reserved, HolderState::Acquired)?;
        self.device.push_fault_scope(FaultScopeKind::OutOfMemory);
        self.device.push_fault_scope(FaultScopeKind::Validation);
        Ok(Arc::clone(&self.device))
    }

    /// Loss information for the wrapped device, if it has been lost
    pub fn loss_info(&self) -> Option<LossInfo> {
        self.device.loss_info()
    }

    /// Declare that the device is expected to be lost with `reason`
    /// before release
    pub fn declare_expected_loss(&self, reason: LossReason) {
        *self.expected_loss.lock().unwrap() = Some(reason);
    }

    /// Destroy the wrapped device. Used by the pool when retiring the holder.
    pub(crate) fn destroy_device(&self) {
        self.device.destroy();
    }

    /// Close out the current reservation: surface and classify any faults
    /// captured while the device was in use. The holder is back in the
    /// free state when this returns, whatever the outcome.
    pub async fn ensure_release(&self, timeout: Duration) -> PoolResult<()> {
        let state = self.state();
        if state == HolderState::Free {
            return Err(PoolError::InvalidHolderState {
                expected: "reserved or acquired",
                actual: "free",
            });
        }
        let result = self.finalize(state, timeout).await;
        // Runs on every path so the holder never sticks in reserved or
        // acquired.
        *self.state.lock().unwrap() = HolderState::Free;
        *self.expected_loss.lock().unwrap() = None;
        result
    }

    fn transition(&self, from: HolderState, to: HolderState) -> PoolResult<()> {
        let mut state = self.state.lock().unwrap();
        if *state != from {
            return Err(PoolError::InvalidHolderState {
                expected: from.name(),
                actual: state.name(),
            });
        }
        debug!(
            "device {} holder: {} -> {}",
            self.device.id(),
            from.name(),
            to.name()
        );
        *state = to;
        Ok(())
    }

    async fn finalize(&self, state: HolderState, timeout: Duration) -> PoolResult<()> {
        let mut validation_fault = None;
        let mut oom_fault = None;

        if state == HolderState::Acquired {
            self.flush(timeout).await?;
            validation_fault = self.close_scope(timeout).await?;
            oom_fault = self.close_scope(timeout).await?;
            self.expect_scopes_exhausted(timeout).await?;
        }

        if let Some(fault) = oom_fault {
            return Err(PoolError::OutOfMemory(fault.message));
        }
        self.check_loss()?;
        if let Some(fault) = validation_fault {
            return Err(PoolError::ValidationFailed(fault.message));
        }
        Ok(())
    }

    /// Flush pending work so outstanding faults surface before the scopes
    /// close. A no-op submission is sufficient.
    async fn flush(&self, timeout: Duration) -> PoolResult<()> {
        match tokio::time::timeout(timeout, self.device.flush()).await {
            Err(_) => Err(PoolError::ReleaseTimeout(timeout)),
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => self.tolerate_loss(err),
        }
    }

    async fn close_scope(&self, timeout: Duration) -> PoolResult<Option<Fault>> {
        match tokio::time::timeout(timeout, self.device.pop_fault_scope()).await {
            Err(_) => Err(PoolError::ReleaseTimeout(timeout)),
            Ok(Ok(fault)) => Ok(fault),
            Ok(Err(err)) => self.tolerate_loss(err).map(|_| None),
        }
    }

    /// One extra pop must fail: the holder pushed exactly two scopes, so
    /// anything still open was pushed by the caller and never closed.
    async fn expect_scopes_exhausted(&self, timeout: Duration) -> PoolResult<()> {
        match tokio::time::timeout(timeout, self.device.pop_fault_scope()).await {
            Err(_) => Err(PoolError::ReleaseTimeout(timeout)),
            Ok(Err(_)) => Ok(()),
            Ok(Ok(_)) => Err(PoolError::ScopeImbalance(
                "a fault scope was still open at release".to_string(),
            )),
        }
    }

    /// A device failure during release is tolerable only when it is a
    /// loss the caller declared in advance.
    fn tolerate_loss(&self, err: DeviceError) -> PoolResult<()> {
        match err {
            DeviceError::DeviceLost { reason, message } => {
                if *self.expected_loss.lock().unwrap() == Some(reason) {
                    Ok(())
                } else {
                    Err(PoolError::UnexpectedLoss { reason, message })
                }
            }
            DeviceError::EmptyScopeStack => Err(PoolError::ScopeImbalance(
                "a fault scope was closed before release".to_string(),
            )),
            DeviceError::Internal(message) => Err(PoolError::Device(message)),
        }
    }

    fn check_loss(&self) -> PoolResult<()> {
        if let Some(loss) = self.device.loss_info() {
            if *self.expected_loss.lock().unwrap() != Some(loss.reason) {
                return Err(PoolError::UnexpectedLoss {
                    reason: loss.reason,
                    message: loss.message,
                });
            }
        }
        Ok(())
    }
}
