// Configuration for the device pool
//
// This module provides configuration options for the device pool.

use std::time::Duration;

/// Default number of descriptor-scoped devices kept alive at once
pub const DEFAULT_POOL_CAPACITY: usize = 5;

/// Default bound, in milliseconds, on closing fault scopes at release time
pub const DEFAULT_RELEASE_TIMEOUT_MS: u64 = 5000;

/// Configuration for the device pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of descriptor-scoped devices kept alive at once
    pub capacity: usize,

    /// Timeout in milliseconds for closing fault scopes at release time
    pub release_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            release_timeout_ms: DEFAULT_RELEASE_TIMEOUT_MS,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the release timeout
    pub fn with_release_timeout(mut self, timeout_ms: u64) -> Self {
        self.release_timeout_ms = timeout_ms;
        self
    }

    /// The release timeout as a duration
    pub fn release_timeout(&self) -> Duration {
        Duration::from_millis(self.release_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.capacity, 5);
        assert_eq!(config.release_timeout_ms, 5000);
    }

    #[test]
    fn test_config_builder() {
        let config = PoolConfig::new()
            .with_capacity(2)
            .with_release_timeout(100);
        assert_eq!(config.capacity, 2);
        assert_eq!(config.release_timeout(), Duration::from_millis(100));
    }
}
