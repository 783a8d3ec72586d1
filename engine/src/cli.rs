//! CLI interface for SysGestion
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for managing dashboard modules.

use clap::{Parser, Subcommand};
use sdk::manifest::{Action, Role};
use std::path::PathBuf;

/// SysGestion module manager
///
/// Installs dashboard modules from archives and manages their status and
/// role permissions.
#[derive(Parser, Debug)]
#[command(name = "sysgestion")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Act as this role (admin, commercial, operator, supervisor, warehouse)
    #[arg(long, global = true, value_name = "ROLE")]
    pub role: Option<Role>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage installed modules
    Modules {
        #[command(subcommand)]
        action: ModuleAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Module management actions
#[derive(Subcommand, Debug)]
pub enum ModuleAction {
    /// Install a module from a .zip archive (administrators only)
    Install {
        /// Path to the module archive
        path: PathBuf,
    },

    /// List installed modules
    List,

    /// Show module details
    Info {
        /// Module id
        id: String,
    },

    /// Activate or deactivate a module
    Toggle {
        /// Module id
        id: String,
    },

    /// Grant an action on a module to a role
    Grant {
        /// Module id
        id: String,
        /// Action (read, write, execute, admin)
        action: Action,
        /// Role to grant it to
        role: Role,
    },

    /// Revoke an action on a module from a role
    Revoke {
        /// Module id
        id: String,
        /// Action (read, write, execute, admin)
        action: Action,
        /// Role to revoke it from
        role: Role,
    },

    /// Check whether the current role may perform an action on a module
    Check {
        /// Module id
        id: String,
        /// Action (read, write, execute, admin)
        action: Action,
    },

    /// Uninstall a module
    Uninstall {
        /// Module id
        id: String,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate,
}
