//! Error types and handling
//!
//! This module provides the error type shared by the installer, the registry
//! and the engine. All errors implement the `ModuleErrorExt` trait which
//! provides a user-facing hint and tells whether the error can be worked
//! around without re-uploading the module.
//!
//! # Display
//!
//! Every failure in the module subsystem ends up as a displayable message:
//! - Install failures are terminal for that upload attempt
//! - Authorization failures never change registry state
//! - Nothing in this crate panics on bad input

use thiserror::Error;

/// Trait for module error extensions
pub trait ModuleErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is a static string, safe to show next to the error message.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be fixed by the user without uploading a new
    /// archive (changing role, freeing disk space, waiting for an install to
    /// finish). Non-recoverable errors mean the archive itself is unusable.
    fn is_recoverable(&self) -> bool;
}

/// Module subsystem error type
///
/// # Error Categories
///
/// - **Archive**: the upload is not a readable archive
/// - **Manifest**: `module.json` is missing, unparsable or invalid
/// - **Authorization**: the acting role may not perform the operation
/// - **Registry**: lookups and identifier conflicts
/// - **Storage / Config / IO**: local persistence failures
///
/// # Examples
///
/// ```
/// use sdk::errors::{ModuleError, ModuleErrorExt};
///
/// let error = ModuleError::MissingField("author".to_string());
/// assert_eq!(error.to_string(), "Invalid module: missing author");
/// assert!(!error.is_recoverable());
///
/// let denied = ModuleError::AuthorizationDenied("toggle module status".to_string());
/// assert!(denied.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum ModuleError {
    // Archive errors
    #[error("Invalid archive: {0}")]
    ArchiveFormat(String),

    #[error("Failed to read archive entry {path}: {reason}")]
    ArchiveRead { path: String, reason: String },

    #[error("Archive too large: {size} bytes > {limit} bytes")]
    ArchiveTooLarge { size: u64, limit: u64 },

    #[error("Unsupported archive type: {0}")]
    UnsupportedArchive(String),

    #[error("Another module installation is in progress")]
    InstallInProgress,

    // Manifest errors
    #[error("Invalid module: module.json not found")]
    ManifestNotFound,

    #[error("Invalid module: module.json is not valid JSON: {0}")]
    ManifestParse(String),

    #[error("Invalid module: missing {0}")]
    MissingField(String),

    #[error("Invalid module: invalid permission format: {0}")]
    MalformedPermissions(String),

    // Authorization errors
    #[error("Insufficient permissions to {0}")]
    AuthorizationDenied(String),

    // Registry errors
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Module already registered: {0}")]
    DuplicateModule(String),

    // Persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModuleErrorExt for ModuleError {
    fn user_hint(&self) -> &str {
        match self {
            // Archive errors
            Self::ArchiveFormat(_) => "Upload a valid .zip module archive",
            Self::ArchiveRead { .. } => "Every file in the module archive must be readable text",
            Self::ArchiveTooLarge { .. } => "Reduce the archive below the configured upload limit",
            Self::UnsupportedArchive(_) => "Upload a .zip or .rar module archive",
            Self::InstallInProgress => "Wait for the current installation to finish",

            // Manifest errors
            Self::ManifestNotFound => "Add a module.json file at the root of the archive",
            Self::ManifestParse(_) => "Fix the JSON syntax of module.json",
            Self::MissingField(_) => {
                "module.json must declare name, version, description and author"
            }
            Self::MalformedPermissions(_) => {
                "Each permission needs a known action and a list of known roles"
            }

            // Authorization errors
            Self::AuthorizationDenied(_) => "Ask an administrator to perform this action",

            // Registry errors
            Self::ModuleNotFound(_) => "Check the module id with 'sysgestion modules list'",
            Self::DuplicateModule(_) => "This module is already installed",

            // Persistence errors
            Self::Storage(_) => "Module storage could not be read or written",
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // The archive itself must be fixed and uploaded again
            Self::ArchiveFormat(_)
            | Self::ArchiveRead { .. }
            | Self::ArchiveTooLarge { .. }
            | Self::UnsupportedArchive(_)
            | Self::ManifestNotFound
            | Self::ManifestParse(_)
            | Self::MissingField(_)
            | Self::MalformedPermissions(_) => false,

            _ => true,
        }
    }
}

impl From<serde_json::Error> for ModuleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
