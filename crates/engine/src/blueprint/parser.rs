//! Blueprint YAML parser.
//!
//! Parsing is purely structural: required fields must be present and step
//! names unique. Whether referenced capabilities exist or templates resolve
//! is a run-time concern, not checked here.

use crate::blueprint::types::Blueprint;
use crate::error::{EngineError, EngineResult};

/// Parse a YAML string into a Blueprint.
pub fn parse_blueprint(yaml_content: &str) -> EngineResult<Blueprint> {
    let blueprint: Blueprint =
        serde_yaml::from_str(yaml_content).map_err(|e| EngineError::Parse(e.to_string()))?;

    validate_blueprint(&blueprint)?;

    Ok(blueprint)
}

/// Validate a parsed blueprint's structure.
pub fn validate_blueprint(blueprint: &Blueprint) -> EngineResult<()> {
    if blueprint.id.trim().is_empty() {
        return Err(EngineError::Validation(
            "Blueprint 'id' must not be empty".to_string(),
        ));
    }
    if blueprint.name.trim().is_empty() {
        return Err(EngineError::Validation(format!(
            "Blueprint '{}': 'name' must not be empty",
            blueprint.id
        )));
    }

    let mut seen_steps = std::collections::HashSet::new();
    for step in &blueprint.steps {
        if step.name.trim().is_empty() {
            return Err(EngineError::Validation(format!(
                "Blueprint '{}': step name must not be empty",
                blueprint.id
            )));
        }
        if step.agent.trim().is_empty() {
            return Err(EngineError::Validation(format!(
                "Blueprint '{}': step '{}' has an empty agent",
                blueprint.id, step.name
            )));
        }
        if !seen_steps.insert(&step.name) {
            return Err(EngineError::Validation(format!(
                "Blueprint '{}': duplicate step name: {}",
                blueprint.id, step.name
            )));
        }
    }

    Ok(())
}
