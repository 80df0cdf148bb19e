// Device pool for the gpu-testbed harness
//
// Many short-lived test invocations need exclusive access to an
// expensive, stateful device handle. The pool hands out holders keyed by
// canonical descriptor, captures faults raised while a device is in use,
// classifies them at release time, and retires devices that are no longer
// usable.

mod cache;
mod config;
mod holder;
mod pool;

pub use cache::DescriptorCache;
pub use config::{PoolConfig, DEFAULT_POOL_CAPACITY, DEFAULT_RELEASE_TIMEOUT_MS};
pub use holder::{DeviceHolder, HolderState};
pub use pool::DevicePool;
