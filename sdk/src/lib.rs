//! SysGestion SDK
//!
//! Shared types for the module subsystem of the SysGestion dashboard.
//! This crate is used by both the module manager and the engine binary.

/// Error types and handling
pub mod errors;

/// Manifest, action and role types
pub mod manifest;

/// Installed module record
pub mod types;

// Re-export commonly used types
pub use errors::{ModuleError, ModuleErrorExt};
pub use manifest::{Action, ModuleManifest, ModulePermission, Role};
pub use types::Module;
