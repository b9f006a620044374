//! Capability registry and dispatch.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CapabilityError;

/// A named, invokable unit of work bound to workflow steps.
///
/// Implementations wrap external agents and services (content generation,
/// scraping, CRM sync, ...). The engine only sees the name, the resolved
/// input, and the returned output value.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The capability's unique name, as referenced by step definitions.
    fn name(&self) -> &str;

    /// Invoke the capability with an already-resolved input value.
    ///
    /// The output can be any JSON value; the engine inserts it into the
    /// run context without inspecting its shape.
    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, CapabilityError>;
}

/// Registry of available capabilities.
///
/// Populated once at startup and shared behind `Arc`; lookups are
/// read-only after population.
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    /// Register a capability under its own name.
    pub fn register<C: Capability + 'static>(&mut self, capability: C) {
        let name = capability.name().to_string();
        self.capabilities.insert(name, Arc::new(capability));
    }

    /// Get a capability by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    /// Check if a capability is registered.
    pub fn has(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// List all registered capability names.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.capabilities.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Invoke a capability by name.
    pub async fn invoke(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, CapabilityError> {
        let capability = self
            .get(name)
            .ok_or_else(|| CapabilityError::Unknown(name.to_string()))?;
        capability.invoke(input).await
    }

    /// Invoke a capability with an upper time bound.
    ///
    /// A `None` timeout invokes without a bound. The bound covers a single
    /// invocation; callers own any retry policy on top.
    pub async fn invoke_with_timeout(
        &self,
        name: &str,
        input: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value, CapabilityError> {
        match timeout {
            None => self.invoke(name, input).await,
            Some(bound) => match tokio::time::timeout(bound, self.invoke(name, input)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(capability = name, seconds = bound.as_secs(), "Capability invocation timed out");
                    Err(CapabilityError::Timeout {
                        capability: name.to_string(),
                        seconds: bound.as_secs(),
                    })
                }
            },
        }
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.list())
            .finish()
    }
}
