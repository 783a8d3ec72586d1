//! SysGestion Module Manager
//!
//! This crate handles installing, validating, authorizing and storing
//! dashboard modules. Modules arrive as ZIP archives carrying a
//! `module.json` manifest and are kept in a registry whose mutations are
//! gated by each module's role/action permission matrix.

pub mod installer;
pub mod permissions;
pub mod registry;
pub mod storage;
pub mod validator;

pub use installer::{EntryProcessor, InstallPolicy, ModuleInstaller};
pub use permissions::{default_permissions, has_permission, has_permission_str};
pub use registry::ModuleRegistry;
pub use storage::{FileStore, MemoryStore, ModuleStore, STORAGE_KEY};
pub use validator::validate_manifest;
