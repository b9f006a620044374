//! Blueprint Capability Library
//!
//! The seam between the blueprint execution engine and the external
//! agents/services that steps invoke. The engine sees capabilities purely
//! as named, invokable units with a value-in/value-out contract:
//!
//! - [`Capability`]: async trait implemented by each unit
//! - [`CapabilityRegistry`]: name-indexed dispatch with optional time bounds
//! - [`CapabilityError`]: invocation failures carrying the capability name
//!
//! Real implementations (content generation, scraping, CRM sync, ...) are
//! external collaborators; this crate ships only a pass-through `noop` and
//! a configurable stub for tests and dry runs.

pub mod capabilities;
pub mod error;
pub mod registry;

pub use capabilities::{create_default_registry, NoopCapability, StubCapability};
pub use error::CapabilityError;
pub use registry::{Capability, CapabilityRegistry};
