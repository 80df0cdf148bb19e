// Device descriptors and canonicalization
//
// A descriptor is the caller's configuration request for a pooled device.
// Canonicalization turns it into a deterministic form and key so that
// equivalent requests share one cache entry.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default values for the limits a device ships with. A requested limit
/// equal to its default carries no information and is dropped from the
/// canonical form.
pub const DEFAULT_LIMITS: &[(&str, u64)] = &[
    ("max_bind_groups", 4),
    ("max_buffer_size", 268_435_456),
    ("max_compute_invocations_per_workgroup", 256),
    ("max_dynamic_uniform_buffers_per_pipeline_layout", 8),
    ("max_texture_dimension_1d", 8192),
    ("max_texture_dimension_2d", 8192),
    ("max_texture_dimension_3d", 2048),
    ("max_uniform_buffer_binding_size", 65_536),
];

/// Look up the default value for a named limit
pub fn default_limit(name: &str) -> Option<u64> {
    DEFAULT_LIMITS
        .iter()
        .find(|(limit, _)| *limit == name)
        .map(|(_, value)| *value)
}

/// A configuration request for a pooled device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Optional named features the device must support
    #[serde(default)]
    pub features: Vec<String>,

    /// Requested limit overrides, by limit name
    #[serde(default)]
    pub limits: BTreeMap<String, u64>,
}

impl DeviceDescriptor {
    /// Create an empty descriptor (no requirements)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required feature
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.push(feature.into());
        self
    }

    /// Request a limit value
    pub fn with_limit(mut self, name: impl Into<String>, value: u64) -> Self {
        self.limits.insert(name.into(), value);
        self
    }
}

/// The canonical form of a descriptor: deduplicated, sorted features and
/// only the limits that differ from their known defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalDescriptor {
    /// Sorted, deduplicated feature names
    pub features: Vec<String>,

    /// Limits that differ from their defaults
    pub limits: BTreeMap<String, u64>,
}

/// Deterministic string key derived from a canonical descriptor, used for
/// cache lookup and descriptor equality
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DescriptorKey(String);

impl DescriptorKey {
    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DescriptorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonicalize a descriptor into its normalized form and cache key.
///
/// Pure and total: the same input always yields the same key. Feature
/// lists are deduplicated and sorted; limits equal to their known default
/// are dropped (unknown limit names are always kept); a descriptor with
/// no requirements canonicalizes to the fixed empty form.
pub fn canonicalize(descriptor: &DeviceDescriptor) -> (CanonicalDescriptor, DescriptorKey) {
    let mut features = descriptor.features.clone();
    features.sort();
    features.dedup();

    let limits: BTreeMap<String, u64> = descriptor
        .limits
        .iter()
        .filter(|(name, value)| default_limit(name) != Some(**value))
        .map(|(name, value)| (name.clone(), *value))
        .collect();

    let canonical = CanonicalDescriptor { features, limits };
    // The sorted feature list and BTreeMap ordering make this stable.
    let key = DescriptorKey(
        serde_json::to_string(&canonical).expect("canonical descriptor serializes to JSON"),
    );
    (canonical, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_order_does_not_matter() {
        let a = DeviceDescriptor::new()
            .with_feature("texture-compression-bc")
            .with_feature("depth-clip-control");
        let b = DeviceDescriptor::new()
            .with_feature("depth-clip-control")
            .with_feature("texture-compression-bc");
        assert_eq!(canonicalize(&a).1, canonicalize(&b).1);
    }

    #[test]
    fn duplicate_features_collapse() {
        let a = DeviceDescriptor::new()
            .with_feature("depth-clip-control")
            .with_feature("depth-clip-control");
        let b = DeviceDescriptor::new().with_feature("depth-clip-control");
        assert_eq!(canonicalize(&a).1, canonicalize(&b).1);
    }

    #[test]
    fn default_valued_limit_is_dropped() {
        let a = DeviceDescriptor::new().with_limit("max_bind_groups", 4);
        let b = DeviceDescriptor::new();
        assert_eq!(canonicalize(&a).1, canonicalize(&b).1);
    }

    #[test]
    fn non_default_limit_is_kept() {
        let a = DeviceDescriptor::new().with_limit("max_bind_groups", 8);
        let b = DeviceDescriptor::new();
        assert_ne!(canonicalize(&a).1, canonicalize(&b).1);
        assert_eq!(canonicalize(&a).0.limits.get("max_bind_groups"), Some(&8));
    }

    #[test]
    fn unknown_limit_is_kept() {
        let a = DeviceDescriptor::new().with_limit("max_rainbow_tables", 1);
        let (canonical, key) = canonicalize(&a);
        assert_eq!(canonical.limits.get("max_rainbow_tables"), Some(&1));
        assert_ne!(key, canonicalize(&DeviceDescriptor::new()).1);
    }

    #[test]
    fn empty_descriptor_has_fixed_form() {
        let (canonical, key) = canonicalize(&DeviceDescriptor::new());
        assert!(canonical.features.is_empty());
        assert!(canonical.limits.is_empty());
        assert_eq!(key, canonicalize(&DeviceDescriptor::default()).1);
    }

    #[test]
    fn canonicalization_is_stable() {
        let descriptor = DeviceDescriptor::new()
            .with_feature("shader-f16")
            .with_limit("max_buffer_size", 1 << 30);
        assert_eq!(canonicalize(&descriptor), canonicalize(&descriptor));
    }
}
