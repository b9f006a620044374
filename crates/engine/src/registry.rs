//! Blueprint registry.
//!
//! Holds every loaded blueprint behind `Arc`, indexed by id. Population
//! happens once at startup from the loader; afterwards the registry is
//! read-mostly and safe to share across concurrent runs.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use crate::blueprint::types::Blueprint;
use crate::error::{EngineError, EngineResult};

/// Listing entry for registry introspection.
#[derive(Debug, Clone, Serialize)]
pub struct BlueprintSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<String>,
    pub total_steps: usize,
}

/// Thread-safe store of loaded blueprints.
pub struct BlueprintRegistry {
    blueprints: RwLock<HashMap<String, Arc<Blueprint>>>,
}

impl BlueprintRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            blueprints: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Blueprint>>> {
        match self.blueprints.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a blueprint, replacing any previous entry with the same id.
    pub fn register(&self, blueprint: Blueprint) {
        tracing::info!(
            blueprint_id = %blueprint.id,
            steps = blueprint.total_steps(),
            "Registering blueprint"
        );
        let entry = Arc::new(blueprint);
        let mut guard = match self.blueprints.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(entry.id.clone(), entry);
    }

    /// Register a batch of blueprints (typically the loader's output).
    pub fn register_all(&self, blueprints: Vec<Blueprint>) {
        for blueprint in blueprints {
            self.register(blueprint);
        }
    }

    /// Get a blueprint by id.
    pub fn get(&self, id: &str) -> EngineResult<Arc<Blueprint>> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("blueprint '{}'", id)))
    }

    /// Whether a blueprint with this id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Number of registered blueprints.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Summaries of all registered blueprints, ordered by id.
    pub fn list(&self) -> Vec<BlueprintSummary> {
        let mut summaries: Vec<BlueprintSummary> = self
            .read()
            .values()
            .map(|bp| BlueprintSummary {
                id: bp.id.clone(),
                name: bp.name.clone(),
                description: bp.description.clone(),
                trigger_type: bp.trigger_type().map(|t| t.to_string()),
                total_steps: bp.total_steps(),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Find the blueprint a webhook event should route to.
    ///
    /// An exact `trigger.event` match wins; otherwise falls back to a
    /// substring match between the event name and the trigger source.
    pub fn find_by_webhook_event(&self, event: &str) -> Option<Arc<Blueprint>> {
        let guard = self.read();
        let mut webhooks: Vec<&Arc<Blueprint>> = guard
            .values()
            .filter(|bp| bp.trigger_type() == Some("webhook"))
            .collect();
        webhooks.sort_by(|a, b| a.id.cmp(&b.id));

        for bp in &webhooks {
            if bp.trigger.as_ref().and_then(|t| t.event()) == Some(event) {
                return Some(Arc::clone(bp));
            }
        }

        for bp in &webhooks {
            if let Some(source) = bp.trigger.as_ref().and_then(|t| t.source()) {
                if event.contains(source) || source.contains(event) {
                    return Some(Arc::clone(bp));
                }
            }
        }

        None
    }
}

impl Default for BlueprintRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BlueprintRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self.read().keys().cloned().collect();
        f.debug_struct("BlueprintRegistry")
            .field("blueprints", &ids)
            .finish()
    }
}
