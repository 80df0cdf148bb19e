// Top-level device pool
//
// Combines the default-device singleton with the descriptor cache and
// exposes reserve/release to the test runner. One pool instance is owned
// by the test-execution context and passed by reference; there is no
// ambient global.

use std::sync::Arc;

use log::{info, warn};
use testbed_device::{DeviceDescriptor, DeviceProvider};
use testbed_error::{PoolError, PoolResult};

use crate::cache::DescriptorCache;
use crate::config::PoolConfig;
use crate::holder::DeviceHolder;

/// State of the no-descriptor default device
#[derive(Debug)]
enum DefaultSlot {
    /// Never requested yet
    Uninitialized,

    /// Creation failed once; never retried
    Failed,

    /// Live default holder
    Ready(Arc<DeviceHolder>),
}

/// Pool of devices shared across test invocations
#[derive(Debug)]
pub struct DevicePool {
    provider: Arc<dyn DeviceProvider>,
    config: PoolConfig,
    default_slot: DefaultSlot,
    cache: DescriptorCache,
}

impl DevicePool {
    /// Create a pool with the default configuration
    pub fn new(provider: Arc<dyn DeviceProvider>) -> Self {
        Self::with_config(provider, PoolConfig::default())
    }

    /// Create a pool with an explicit configuration
    pub fn with_config(provider: Arc<dyn DeviceProvider>, config: PoolConfig) -> Self {
        let cache = DescriptorCache::new(config.capacity);
        Self {
            provider,
            config,
            default_slot: DefaultSlot::Uninitialized,
            cache,
        }
    }

    /// Number of descriptor-scoped devices currently pooled
    pub fn cached_devices(&self) -> usize {
        self.cache.len()
    }

    /// Reserve a holder for the given descriptor, or for the default
    /// device when none is given. The holder comes back in the reserved
    /// state; call `acquire` on it before operating on the device.
    pub async fn reserve(
        &mut self,
        descriptor: Option<&DeviceDescriptor>,
    ) -> PoolResult<Arc<DeviceHolder>> {
        let holder = match descriptor {
            None => self.default_holder().await?,
            Some(descriptor) => self.cache.get_or_create(&self.provider, descriptor).await?,
        };
        holder.reserve()?;
        Ok(holder)
    }

    /// Release a previously reserved holder. Recoverable validation
    /// failures leave the device pooled; any other release failure
    /// retires it. A declared loss releases cleanly but still retires
    /// the device, since a lost device can never serve another caller.
    pub async fn release(&mut self, holder: &Arc<DeviceHolder>) -> PoolResult<()> {
        match holder.ensure_release(self.config.release_timeout()).await {
            Ok(()) => {
                if holder.loss_info().is_some() {
                    info!(
                        "retiring lost device {} after clean release",
                        holder.device_id()
                    );
                    self.retire(holder);
                }
                Ok(())
            }
            Err(err) if err.requires_retirement() => {
                warn!(
                    "retiring device {} after release failure: {}",
                    holder.device_id(),
                    err
                );
                self.retire(holder);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn default_holder(&mut self) -> PoolResult<Arc<DeviceHolder>> {
        match &self.default_slot {
            DefaultSlot::Ready(holder) => Ok(Arc::clone(holder)),
            DefaultSlot::Failed => Err(PoolError::CreationFailed(
                "default device previously failed to initialize".to_string(),
            )),
            DefaultSlot::Uninitialized => match self.provider.create_device(None).await {
                Ok(device) => {
                    info!("created default device {}", device.id());
                    let holder = Arc::new(DeviceHolder::new(device));
                    self.default_slot = DefaultSlot::Ready(Arc::clone(&holder));
                    Ok(holder)
                }
                Err(err) => {
                    // Sticky: the default device is never retried.
                    warn!("default device failed to initialize: {}", err);
                    self.default_slot = DefaultSlot::Failed;
                    Err(PoolError::CreationFailed(err.to_string()))
                }
            },
        }
    }

    fn retire(&mut self, holder: &Arc<DeviceHolder>) {
        if let DefaultSlot::Ready(default) = &self.default_slot {
            if Arc::ptr_eq(default, holder) {
                // The next reserve recreates the default device from scratch.
                self.default_slot = DefaultSlot::Uninitialized;
                holder.destroy_device();
                return;
            }
        }
        self.cache.remove_by_device(holder.device_id());
        holder.destroy_device();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testbed_device::mock::MockProvider;

    #[tokio::test]
    async fn default_device_is_a_singleton() {
        let mock = Arc::new(MockProvider::new());
        let mut pool = DevicePool::new(Arc::clone(&mock) as Arc<dyn DeviceProvider>);

        let first = pool.reserve(None).await.unwrap();
        let id = first.device_id();
        pool.release(&first).await.unwrap();

        let second = pool.reserve(None).await.unwrap();
        assert_eq!(second.device_id(), id);
        assert_eq!(mock.created_count(), 1);
    }

    #[tokio::test]
    async fn default_failure_is_sticky() {
        let mock = Arc::new(MockProvider::new());
        let mut pool = DevicePool::new(Arc::clone(&mock) as Arc<dyn DeviceProvider>);

        mock.fail_creation("adapter exploded");
        let err = pool.reserve(None).await.unwrap_err();
        assert!(matches!(err, PoolError::CreationFailed(_)));

        // Even a recovered provider is never asked again.
        mock.clear_creation_failure();
        let err = pool.reserve(None).await.unwrap_err();
        assert!(matches!(err, PoolError::CreationFailed(_)));
        assert_eq!(mock.created_count(), 0);
    }
}
