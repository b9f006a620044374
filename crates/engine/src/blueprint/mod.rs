//! Blueprint definitions.
//!
//! This module provides blueprint parsing and loading:
//! - Type definitions for the blueprint structure
//! - YAML parsing and structural validation
//! - Directory loading with per-file error isolation

pub mod loader;
pub mod parser;
pub mod types;

pub use loader::{load_dir, load_file};
pub use parser::{parse_blueprint, validate_blueprint};
pub use types::{
    Blueprint, LoopBody, LoopMode, Step, StepKind, Trigger, HUMAN_APPROVAL_AGENT,
};
