//! Manifest types for module metadata and permissions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An operation that can be granted on a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Execute,
    /// Per-module administration (toggle, uninstall). Not the same thing as
    /// the session-level [`Role::Admin`].
    Admin,
}

impl Action {
    /// All actions, in matrix order
    pub const ALL: [Action; 4] = [Action::Read, Action::Write, Action::Execute, Action::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Execute => "execute",
            Action::Admin => "admin",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown action '{}'", s))
    }
}

/// Role carried by the authenticated session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Dashboard administrator
    Admin,
    Commercial,
    Operator,
    Supervisor,
    Warehouse,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Commercial,
        Role::Operator,
        Role::Supervisor,
        Role::Warehouse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Commercial => "commercial",
            Role::Operator => "operator",
            Role::Supervisor => "supervisor",
            Role::Warehouse => "warehouse",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role '{}'", s))
    }
}

/// One row of a module's authorization matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePermission {
    pub action: Action,
    pub roles: Vec<Role>,
}

impl ModulePermission {
    pub fn new(action: Action, roles: impl Into<Vec<Role>>) -> Self {
        Self {
            action,
            roles: roles.into(),
        }
    }

    /// Check whether this row grants `action` to `role`
    pub fn allows(&self, action: Action, role: Role) -> bool {
        self.action == action && self.roles.contains(&role)
    }
}

/// A validated `module.json`
///
/// Produced by the manifest validator from untrusted JSON; every field here
/// has already passed the required-field and permission-shape checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    /// `None` when the manifest did not supply a matrix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<ModulePermission>>,
}
