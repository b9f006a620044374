//! No-op capability.

use async_trait::async_trait;

use crate::error::CapabilityError;
use crate::registry::Capability;

/// Pass-through capability: returns its resolved input unchanged.
///
/// Useful for dry runs and for steps whose only purpose is to materialize
/// a resolved template into the run context.
pub struct NoopCapability;

#[async_trait]
impl Capability for NoopCapability {
    fn name(&self) -> &str {
        "noop"
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, CapabilityError> {
        Ok(input)
    }
}
