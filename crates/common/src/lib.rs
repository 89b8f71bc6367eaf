//! Reelcheck Common Library
//!
//! Shared types, test definitions, and script plans for the Reelcheck
//! compliance testing platform.

pub mod error;
pub mod ids;
pub mod registry;
pub mod script;
pub mod types;

pub use error::{Error, Result};
pub use registry::{TestDefinition, TestKind, TestRegistry};
pub use script::{ScriptAction, ScriptPlan};
pub use types::*;

/// Reelcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
