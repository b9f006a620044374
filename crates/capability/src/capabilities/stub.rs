//! Configurable stub capability for tests and dry runs.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::CapabilityError;
use crate::registry::Capability;

/// A capability that returns a canned output (or a canned failure).
///
/// Swapping the real registry for one populated with stubs is the intended
/// way to exercise blueprints without their external collaborators.
pub struct StubCapability {
    name: String,
    output: serde_json::Value,
    fail_with: Option<String>,
    delay: Option<Duration>,
}

impl StubCapability {
    /// Stub that succeeds with the given output.
    pub fn new(name: impl Into<String>, output: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            output,
            fail_with: None,
            delay: None,
        }
    }

    /// Stub that always fails with the given message.
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: serde_json::Value::Null,
            fail_with: Some(message.into()),
            delay: None,
        }
    }

    /// Add an artificial delay before responding.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Capability for StubCapability {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        _input: serde_json::Value,
    ) -> Result<serde_json::Value, CapabilityError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.fail_with {
            Some(message) => Err(CapabilityError::Invocation {
                capability: self.name.clone(),
                message: message.clone(),
            }),
            None => Ok(self.output.clone()),
        }
    }
}
