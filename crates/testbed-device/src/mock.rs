// In-memory mock collaborators for tests
//
// MockDevice implements the fault-scope discipline faithfully enough to
// exercise the pool: scopes capture injected faults by kind, loss makes
// scope operations fail, and a configurable delay lets tests drive the
// release timeout. MockProvider records every device it creates so tests
// can reach back into them.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use testbed_error::{
    CreateError, DeviceError, DeviceResult, Fault, FaultScopeKind, LossInfo, LossReason,
};

use crate::descriptor::CanonicalDescriptor;
use crate::device::{Device, DeviceId, DeviceProvider};

/// One open fault scope and the faults it has captured so far
#[derive(Debug)]
struct Scope {
    kind: FaultScopeKind,
    faults: Vec<Fault>,
}

/// A scriptable in-memory device
#[derive(Debug)]
pub struct MockDevice {
    id: DeviceId,
    scopes: Mutex<Vec<Scope>>,
    loss: Mutex<Option<LossInfo>>,
    destroyed: AtomicBool,
    pop_delay: Mutex<Option<Duration>>,
}

impl MockDevice {
    /// Create a healthy device with no open scopes
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            scopes: Mutex::new(Vec::new()),
            loss: Mutex::new(None),
            destroyed: AtomicBool::new(false),
            pop_delay: Mutex::new(None),
        }
    }

    /// Record a fault in the innermost open scope of the matching kind.
    /// Faults with no matching scope are dropped, as a real device would
    /// report them elsewhere.
    pub fn inject_fault(&self, kind: FaultScopeKind, message: impl Into<String>) {
        let mut scopes = self.scopes.lock().unwrap();
        if let Some(scope) = scopes.iter_mut().rev().find(|scope| scope.kind == kind) {
            scope.faults.push(Fault::new(kind, message));
        }
    }

    /// Mark the device lost with the given reason
    pub fn simulate_loss(&self, reason: LossReason, message: impl Into<String>) {
        *self.loss.lock().unwrap() = Some(LossInfo::new(reason, message));
    }

    /// Delay every subsequent scope pop by `delay`
    pub fn set_pop_delay(&self, delay: Duration) {
        *self.pop_delay.lock().unwrap() = Some(delay);
    }

    /// Whether `destroy` has been called
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Number of scopes currently open
    pub fn open_scopes(&self) -> usize {
        self.scopes.lock().unwrap().len()
    }

    fn lost(&self) -> Option<DeviceError> {
        self.loss.lock().unwrap().as_ref().map(|loss| DeviceError::DeviceLost {
            reason: loss.reason,
            message: loss.message.clone(),
        })
    }
}

#[async_trait]
impl Device for MockDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn push_fault_scope(&self, kind: FaultScopeKind) {
        self.scopes.lock().unwrap().push(Scope {
            kind,
            faults: Vec::new(),
        });
    }

    async fn pop_fault_scope(&self) -> DeviceResult<Option<Fault>> {
        let delay = *self.pop_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(lost) = self.lost() {
            return Err(lost);
        }
        let mut scopes = self.scopes.lock().unwrap();
        match scopes.pop() {
            Some(scope) => Ok(scope.faults.into_iter().next()),
            None => Err(DeviceError::EmptyScopeStack),
        }
    }

    async fn flush(&self) -> DeviceResult<()> {
        match self.lost() {
            Some(lost) => Err(lost),
            None => Ok(()),
        }
    }

    fn loss_info(&self) -> Option<LossInfo> {
        self.loss.lock().unwrap().clone()
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

/// A provider that manufactures mock devices and records what it created
#[derive(Debug, Default)]
pub struct MockProvider {
    supported_features: Mutex<HashSet<String>>,
    fail_with: Mutex<Option<String>>,
    next_id: AtomicU64,
    created: Mutex<Vec<Arc<MockDevice>>>,
}

impl MockProvider {
    /// A provider that supports no optional features
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider supporting the given features
    pub fn with_features<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        {
            let mut supported = provider.supported_features.lock().unwrap();
            supported.extend(features.into_iter().map(Into::into));
        }
        provider
    }

    /// Make every subsequent creation fail with `message` until cleared
    pub fn fail_creation(&self, message: impl Into<String>) {
        *self.fail_with.lock().unwrap() = Some(message.into());
    }

    /// Stop failing creations
    pub fn clear_creation_failure(&self) {
        *self.fail_with.lock().unwrap() = None;
    }

    /// Number of devices created so far
    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    /// The `index`-th device created, if any
    pub fn device(&self, index: usize) -> Option<Arc<MockDevice>> {
        self.created.lock().unwrap().get(index).cloned()
    }

    /// The most recently created device, if any
    pub fn last_device(&self) -> Option<Arc<MockDevice>> {
        self.created.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl DeviceProvider for MockProvider {
    async fn create_device(
        &self,
        descriptor: Option<&CanonicalDescriptor>,
    ) -> Result<Arc<dyn Device>, CreateError> {
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(CreateError::Failed(message));
        }
        if let Some(descriptor) = descriptor {
            let supported = self.supported_features.lock().unwrap();
            if let Some(missing) = descriptor
                .features
                .iter()
                .find(|feature| !supported.contains(*feature))
            {
                return Err(CreateError::UnsupportedFeature(missing.clone()));
            }
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let device = Arc::new(MockDevice::new(id));
        self.created.lock().unwrap().push(Arc::clone(&device));
        Ok(device)
    }
}
