//! Built-in capabilities.
//!
//! Real capabilities live outside the engine; what ships here is the
//! minimum needed for wiring and tests: a pass-through `noop` and a
//! configurable stub with canned outputs.

pub mod noop;
pub mod stub;

pub use noop::NoopCapability;
pub use stub::StubCapability;

use crate::registry::CapabilityRegistry;

/// Create a registry holding only the built-in `noop` capability.
pub fn create_default_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register(NoopCapability);
    registry
}
