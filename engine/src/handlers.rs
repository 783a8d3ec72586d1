//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - modules install/uninstall: Add or remove a module archive
//! - modules list/info: Show installed modules
//! - modules toggle/grant/revoke: Authorized registry mutations
//! - modules check: Evaluate the permission matrix for the session role
//! - config show/validate: Inspect the configuration

use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

use sdk::errors::ModuleError;
use sdk::manifest::{Action, Role};
use sdk::types::Module;
use sysgestion_modules::permissions::set_role_permission;

use crate::config::Config;
use crate::context::AppContext;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Install a module archive and register it
///
/// Only an administrator session may upload. When registration fails the
/// retained archive is removed again.
pub async fn handle_install(
    ctx: &mut AppContext,
    path: &Path,
    format: OutputFormat,
) -> Result<()> {
    ctx.session.require_administrator("install modules")?;

    let module = ctx.installer.install_from_path(path).await?;

    if let Err(e) = ctx.registry.add_module(module.clone()) {
        ctx.installer.uninstall_module(&module.id).await.ok();
        return Err(e.into());
    }

    match format {
        OutputFormat::Text => {
            println!("Installed {} v{}", module.name, module.version);
            println!("  ID:       {}", module.id);
            println!("  Size:     {} bytes", module.size);
            println!("  Checksum: {}", module.checksum);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&module)?);
        }
    }

    Ok(())
}

/// List installed modules
pub async fn handle_list(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let modules = ctx.registry.modules();

    match format {
        OutputFormat::Text => {
            if modules.is_empty() {
                println!("No modules installed");
                return Ok(());
            }

            println!("Installed modules:");
            println!();
            for module in modules {
                println!(
                    "  {} v{} [{}]",
                    module.name,
                    module.version,
                    status_label(module.is_active)
                );
                println!("    ID: {}", module.id);
                println!("    {}", module.description);
            }
            println!();
            println!("{} module(s) installed.", modules.len());
        }
        OutputFormat::Json => {
            let output = json!({
                "modules": modules,
                "count": modules.len(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Show a single module with its permission matrix
pub async fn handle_info(ctx: &AppContext, module_id: &str, format: OutputFormat) -> Result<()> {
    let module = find_module(ctx, module_id)?;

    match format {
        OutputFormat::Text => {
            println!("Module: {}", module.name);
            println!("  ID:          {}", module.id);
            println!("  Version:     {}", module.version);
            println!("  Author:      {}", module.author);
            println!("  Description: {}", module.description);
            println!("  Status:      {}", status_label(module.is_active));
            println!("  Installed:   {}", module.installed_at.to_rfc3339());
            println!("  Size:        {} bytes", module.size);
            if !module.checksum.is_empty() {
                println!("  Checksum:    {}", module.checksum);
            }
            if let Some(deps) = &module.dependencies {
                if !deps.is_empty() {
                    println!("  Depends on:  {}", deps.join(", "));
                }
            }

            println!();
            println!("Permissions:");
            if module.permissions.is_empty() {
                println!("  (none)");
            }
            for permission in &module.permissions {
                let roles: Vec<&str> = permission.roles.iter().map(Role::as_str).collect();
                let roles = if roles.is_empty() {
                    "-".to_string()
                } else {
                    roles.join(", ")
                };
                println!("  {:<8} {}", permission.action.as_str(), roles);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(module)?);
        }
    }

    Ok(())
}

/// Flip a module between active and inactive
pub async fn handle_toggle(
    ctx: &mut AppContext,
    module_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let role = ctx.session.role();
    let active = ctx.registry.toggle_module_status(module_id, role)?;

    match format {
        OutputFormat::Text => {
            println!("Module {} is now {}", module_id, status_label(active));
        }
        OutputFormat::Json => {
            let output = json!({
                "id": module_id,
                "isActive": active,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Grant (`granted = true`) or revoke one role on one action of a module
pub async fn handle_set_permission(
    ctx: &mut AppContext,
    module_id: &str,
    action: Action,
    role: Role,
    granted: bool,
    format: OutputFormat,
) -> Result<()> {
    let current = find_module(ctx, module_id)?.permissions.clone();
    let updated = set_role_permission(&current, action, role, granted);

    let caller = ctx.session.role();
    ctx.registry
        .update_module_permissions(module_id, updated, caller)?;

    let verb = if granted { "Granted" } else { "Revoked" };
    match format {
        OutputFormat::Text => {
            println!("{} '{}' on {} for role {}", verb, action, module_id, role);
        }
        OutputFormat::Json => {
            let module = find_module(ctx, module_id)?;
            let output = json!({
                "id": module_id,
                "permissions": module.permissions,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Report whether the session role may perform `action` on a module
pub async fn handle_check(
    ctx: &AppContext,
    module_id: &str,
    action: Action,
    format: OutputFormat,
) -> Result<()> {
    find_module(ctx, module_id)?;

    let role = ctx.session.role();
    let allowed = ctx.registry.has_permission(module_id, action, role);

    match format {
        OutputFormat::Text => {
            if allowed {
                println!("Role {} may {} module {}", role, action, module_id);
            } else {
                println!("Role {} may not {} module {}", role, action, module_id);
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "id": module_id,
                "action": action,
                "role": role,
                "allowed": allowed,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Remove a module's files and its registry entry
pub async fn handle_uninstall(
    ctx: &mut AppContext,
    module_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let module = find_module(ctx, module_id)?;
    let role = ctx.session.role();

    if !ctx.registry.has_permission(module_id, Action::Admin, role) {
        warn!(
            "Insufficient permissions to uninstall module: {} as {}",
            module_id, role
        );
        return Err(ModuleError::AuthorizationDenied("uninstall modules".to_string()).into());
    }
    let name = module.name.clone();

    // Registry first: a failed store write must leave the files in place
    ctx.registry.remove_module(module_id)?;
    ctx.installer.uninstall_module(module_id).await?;

    match format {
        OutputFormat::Text => {
            println!("Uninstalled {} ({})", name, module_id);
        }
        OutputFormat::Json => {
            let output = json!({
                "id": module_id,
                "uninstalled": true,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Print the effective configuration
pub async fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let rendered =
                toml::to_string_pretty(config).context("Failed to serialize configuration")?;
            print!("{}", rendered);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }

    Ok(())
}

/// Re-read a configuration file and report whether it is valid
pub async fn handle_config_validate(path: &Path, format: OutputFormat) -> Result<()> {
    let result = Config::load_from_path(path);

    match format {
        OutputFormat::Text => match &result {
            Ok(_) => println!("Configuration is valid: {}", path.display()),
            Err(e) => println!("Configuration is invalid: {}", e),
        },
        OutputFormat::Json => {
            let output = json!({
                "path": path.display().to_string(),
                "valid": result.is_ok(),
                "error": result.as_ref().err().map(|e| e.to_string()),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    info!("Validated configuration: {}", path.display());
    result.map(|_| ()).map_err(Into::into)
}

fn find_module<'a>(ctx: &'a AppContext, module_id: &str) -> Result<&'a Module, ModuleError> {
    ctx.registry
        .get_module(module_id)
        .ok_or_else(|| ModuleError::ModuleNotFound(module_id.to_string()))
}

fn status_label(active: bool) -> &'static str {
    if active {
        "active"
    } else {
        "inactive"
    }
}
