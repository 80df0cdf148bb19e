// Device abstraction for the gpu-testbed device pool
//
// This crate defines what the pool needs from a device: a configuration
// descriptor with a deterministic canonical form, traits for creating and
// operating on devices, and in-memory mock collaborators for tests.

pub mod descriptor;
pub mod device;
pub mod mock;

pub use descriptor::{
    canonicalize, default_limit, CanonicalDescriptor, DescriptorKey, DeviceDescriptor,
    DEFAULT_LIMITS,
};
pub use device::{Device, DeviceId, DeviceProvider};
