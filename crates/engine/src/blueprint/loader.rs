//! Blueprint file and directory loading.

use std::path::Path;

use crate::blueprint::parser::parse_blueprint;
use crate::blueprint::types::Blueprint;
use crate::error::EngineResult;

/// Load a single blueprint definition from a YAML file.
pub fn load_file(path: &Path) -> EngineResult<Blueprint> {
    let content = std::fs::read_to_string(path)?;
    parse_blueprint(&content)
}

/// Load every blueprint definition in a directory.
///
/// Files are loaded independently: a malformed definition is logged and
/// skipped, never fatal to the batch. Only `.yaml`/`.yml` files are
/// considered.
pub fn load_dir(dir: &Path) -> EngineResult<Vec<Blueprint>> {
    let mut blueprints = Vec::new();

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    entries.sort();

    for path in entries {
        match load_file(&path) {
            Ok(blueprint) => {
                tracing::info!(
                    blueprint_id = %blueprint.id,
                    file = %path.display(),
                    steps = blueprint.total_steps(),
                    "Loaded blueprint definition"
                );
                blueprints.push(blueprint);
            }
            Err(e) => {
                tracing::warn!(
                    file = %path.display(),
                    error = %e,
                    "Skipping malformed blueprint definition"
                );
            }
        }
    }

    Ok(blueprints)
}
