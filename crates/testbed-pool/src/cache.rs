// Bounded descriptor-to-holder cache with LRU eviction
//
// Keeps one holder per canonical descriptor, bounded by the pool
// capacity. Configurations the provider cannot satisfy are memoized so
// they fail fast on every later request instead of retrying creation.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::{debug, info, warn};
use testbed_device::{canonicalize, DescriptorKey, DeviceDescriptor, DeviceId, DeviceProvider};
use testbed_error::{CreateError, PoolError, PoolResult};

use crate::holder::{DeviceHolder, HolderState};

/// Bounded map from canonical descriptor keys to device holders
#[derive(Debug)]
pub struct DescriptorCache {
    capacity: usize,

    /// Live holders by canonical key
    entries: HashMap<DescriptorKey, Arc<DeviceHolder>>,

    /// Recency order of live keys; the front is least recently used
    recency: VecDeque<DescriptorKey>,

    /// Unsupported configurations by canonical key, with the message
    /// reported on first failure
    unsupported: HashMap<DescriptorKey, String>,
}

impl DescriptorCache {
    /// Create an empty cache bounded at `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            // Capacity 0 would destroy each device as it is inserted.
            capacity: capacity.max(1),
            entries: HashMap::new(),
            recency: VecDeque::new(),
            unsupported: HashMap::new(),
        }
    }

    /// Number of live holders
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no devices
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a holder exists for this descriptor
    pub fn contains(&self, descriptor: &DeviceDescriptor) -> bool {
        let (_, key) = canonicalize(descriptor);
        self.entries.contains_key(&key)
    }

    /// Whether this descriptor is memoized as unsupported
    pub fn is_unsupported(&self, descriptor: &DeviceDescriptor) -> bool {
        let (_, key) = canonicalize(descriptor);
        self.unsupported.contains_key(&key)
    }

    /// Return the holder for `descriptor`, creating a device on first use
    pub async fn get_or_create(
        &mut self,
        provider: &Arc<dyn DeviceProvider>,
        descriptor: &DeviceDescriptor,
    ) -> PoolResult<Arc<DeviceHolder>> {
        let (canonical, key) = canonicalize(descriptor);

        if let Some(message) = self.unsupported.get(&key) {
            debug!("descriptor {} is memoized as unsupported", key);
            return Err(PoolError::ConfigurationUnsupported(message.clone()));
        }
        if let Some(holder) = self.entries.get(&key) {
            debug!("cache hit for descriptor {}", key);
            let holder = Arc::clone(holder);
            self.touch(&key);
            return Ok(holder);
        }

        match provider.create_device(Some(&canonical)).await {
            Ok(device) => {
                info!("created device {} for descriptor {}", device.id(), key);
                let holder = Arc::new(DeviceHolder::new(device));
                self.insert(key, Arc::clone(&holder));
                Ok(holder)
            }
            Err(CreateError::UnsupportedFeature(feature)) => {
                warn!("descriptor {} unsupported: missing feature {}", key, feature);
                let message = format!("{} (missing feature {})", key, feature);
                self.unsupported.insert(key, message.clone());
                Err(PoolError::ConfigurationUnsupported(message))
            }
            // Not memoized: a later attempt may succeed.
            Err(CreateError::Failed(message)) => Err(PoolError::CreationFailed(message)),
        }
    }

    /// Remove the entry wrapping the given device, outside the normal
    /// eviction path
    pub fn remove_by_device(&mut self, id: DeviceId) -> Option<Arc<DeviceHolder>> {
        let key = self
            .entries
            .iter()
            .find(|(_, holder)| holder.device_id() == id)
            .map(|(key, _)| key.clone())?;
        self.recency.retain(|k| *k != key);
        self.entries.remove(&key)
    }

    fn touch(&mut self, key: &DescriptorKey) {
        self.recency.retain(|k| k != key);
        self.recency.push_back(key.clone());
    }

    fn insert(&mut self, key: DescriptorKey, holder: Arc<DeviceHolder>) {
        self.entries.insert(key.clone(), holder);
        self.recency.push_back(key);
        while self.entries.len() > self.capacity {
            let lru = match self.recency.pop_front() {
                Some(key) => key,
                None => break,
            };
            if let Some(evicted) = self.entries.remove(&lru) {
                if evicted.state() != HolderState::Free {
                    warn!(
                        "evicting descriptor {} while its holder is {:?}",
                        lru,
                        evicted.state()
                    );
                }
                info!("evicting least recently used descriptor {}", lru);
                evicted.destroy_device();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testbed_device::mock::MockProvider;

    fn provider() -> Arc<dyn DeviceProvider> {
        Arc::new(MockProvider::new())
    }

    fn limit_descriptor(n: u64) -> DeviceDescriptor {
        DeviceDescriptor::new().with_limit("max_pooled_widgets", n)
    }

    #[tokio::test]
    async fn hit_returns_the_same_holder() {
        let provider = provider();
        let mut cache = DescriptorCache::new(5);
        let descriptor = limit_descriptor(1);

        let first = cache.get_or_create(&provider, &descriptor).await.unwrap();
        let second = cache.get_or_create(&provider, &descriptor).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let provider = provider();
        let mut cache = DescriptorCache::new(2);

        cache.get_or_create(&provider, &limit_descriptor(1)).await.unwrap();
        cache.get_or_create(&provider, &limit_descriptor(2)).await.unwrap();
        // Touch 1 so 2 becomes the LRU entry.
        cache.get_or_create(&provider, &limit_descriptor(1)).await.unwrap();
        cache.get_or_create(&provider, &limit_descriptor(3)).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&limit_descriptor(1)));
        assert!(!cache.contains(&limit_descriptor(2)));
        assert!(cache.contains(&limit_descriptor(3)));
    }

    #[tokio::test]
    async fn unsupported_configurations_are_memoized() {
        let mock = Arc::new(MockProvider::new());
        let provider: Arc<dyn DeviceProvider> = Arc::clone(&mock) as Arc<dyn DeviceProvider>;
        let mut cache = DescriptorCache::new(5);
        let descriptor = DeviceDescriptor::new().with_feature("ray-tracing");

        let first = cache.get_or_create(&provider, &descriptor).await.unwrap_err();
        assert!(first.is_skip());
        assert!(cache.is_unsupported(&descriptor));

        let second = cache.get_or_create(&provider, &descriptor).await.unwrap_err();
        assert!(second.is_skip());
        // The memoized failure repeats the original message verbatim and
        // never reaches the provider again.
        assert_eq!(first, second);
        assert!(first.to_string().contains("ray-tracing"));
        assert_eq!(mock.created_count(), 0);
    }

    #[tokio::test]
    async fn zero_capacity_is_clamped_to_one() {
        let mock = Arc::new(MockProvider::new());
        let provider: Arc<dyn DeviceProvider> = Arc::clone(&mock) as Arc<dyn DeviceProvider>;
        let mut cache = DescriptorCache::new(0);

        cache.get_or_create(&provider, &limit_descriptor(1)).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert!(!mock.device(0).unwrap().is_destroyed());

        // A second descriptor still evicts the first, keeping the bound.
        cache.get_or_create(&provider, &limit_descriptor(2)).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert!(mock.device(0).unwrap().is_destroyed());
        assert!(!mock.device(1).unwrap().is_destroyed());
    }

    #[tokio::test]
    async fn creation_failures_are_retried() {
        let mock = Arc::new(MockProvider::new());
        let provider: Arc<dyn DeviceProvider> = Arc::clone(&mock) as Arc<dyn DeviceProvider>;
        let mut cache = DescriptorCache::new(5);
        let descriptor = limit_descriptor(1);

        mock.fail_creation("no adapters available");
        let err = cache.get_or_create(&provider, &descriptor).await.unwrap_err();
        assert!(matches!(err, PoolError::CreationFailed(_)));

        mock.clear_creation_failure();
        cache.get_or_create(&provider, &descriptor).await.unwrap();
        assert_eq!(mock.created_count(), 1);
    }

    #[tokio::test]
    async fn remove_by_device_drops_the_entry() {
        let mock = Arc::new(MockProvider::new());
        let provider: Arc<dyn DeviceProvider> = Arc::clone(&mock) as Arc<dyn DeviceProvider>;
        let mut cache = DescriptorCache::new(5);
        let descriptor = limit_descriptor(1);

        let holder = cache.get_or_create(&provider, &descriptor).await.unwrap();
        let removed = cache.remove_by_device(holder.device_id()).unwrap();
        assert!(Arc::ptr_eq(&holder, &removed));
        assert!(cache.is_empty());
        assert!(cache.remove_by_device(holder.device_id()).is_none());
    }
}
