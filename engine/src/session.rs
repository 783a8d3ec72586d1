//! Session collaborator
//!
//! The dashboard's login store is outside this workspace; all the module
//! subsystem needs from it is the role of whoever is acting. That role comes
//! from `--role` or the `[session]` config section.

use sdk::errors::ModuleError;
use sdk::manifest::Role;

use crate::config::Config;

/// The acting user's session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    role: Role,
}

impl Session {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    /// Pick the session role: command line first, then config
    pub fn resolve(cli_role: Option<Role>, config: &Config) -> Result<Self, ModuleError> {
        cli_role
            .or(config.session.role)
            .map(Self::new)
            .ok_or_else(|| {
                ModuleError::AuthorizationDenied(
                    "act without a session role (pass --role or set [session] role)".to_string(),
                )
            })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether this session belongs to the dashboard administrator
    pub fn is_administrator(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fail unless this session belongs to the dashboard administrator
    pub fn require_administrator(&self, operation: &str) -> Result<(), ModuleError> {
        if self.is_administrator() {
            Ok(())
        } else {
            Err(ModuleError::AuthorizationDenied(operation.to_string()))
        }
    }
}
