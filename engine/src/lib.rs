//! SysGestion Engine Library
//!
//! Configuration, session handling and command handlers for the module
//! manager. Used by both the `sysgestion` binary and integration tests.

/// Configuration management module
pub mod config;

/// Telemetry and Observability
pub mod telemetry;

/// Acting role for the current invocation
pub mod session;

/// Registry, installer and session wired together
pub mod context;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
