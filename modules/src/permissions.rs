//! Permission model: role/action checks over a module's matrix
//!
//! Every per-module authorization decision goes through `has_permission`.

use sdk::manifest::{Action, ModulePermission, Role};
use sdk::types::Module;

/// Check whether `role` may perform `action` on `module`
///
/// An action with no row in the matrix is denied to everyone.
pub fn has_permission(module: &Module, action: Action, role: Role) -> bool {
    module
        .permissions
        .iter()
        .any(|permission| permission.allows(action, role))
}

/// String form of [`has_permission`]; unknown actions or roles are denied
pub fn has_permission_str(module: &Module, action: &str, role: &str) -> bool {
    match (action.parse::<Action>(), role.parse::<Role>()) {
        (Ok(action), Ok(role)) => has_permission(module, action, role),
        _ => false,
    }
}

/// Matrix applied when a manifest does not declare one
pub fn default_permissions() -> Vec<ModulePermission> {
    vec![
        ModulePermission::new(Action::Read, [Role::Admin, Role::Supervisor]),
        ModulePermission::new(Action::Write, [Role::Admin]),
        ModulePermission::new(Action::Execute, [Role::Admin, Role::Supervisor]),
        ModulePermission::new(Action::Admin, [Role::Admin]),
    ]
}

/// Collapse repeated action rows into one
///
/// Rows keep the position of the first occurrence of their action; roles are
/// unioned in first-seen order.
pub fn merge_duplicate_actions(permissions: Vec<ModulePermission>) -> Vec<ModulePermission> {
    let mut merged: Vec<ModulePermission> = Vec::with_capacity(permissions.len());

    for permission in permissions {
        match merged.iter_mut().find(|p| p.action == permission.action) {
            Some(existing) => {
                for role in permission.roles {
                    if !existing.roles.contains(&role) {
                        existing.roles.push(role);
                    }
                }
            }
            None => {
                let mut roles: Vec<Role> = Vec::with_capacity(permission.roles.len());
                for role in permission.roles {
                    if !roles.contains(&role) {
                        roles.push(role);
                    }
                }
                merged.push(ModulePermission::new(permission.action, roles));
            }
        }
    }

    merged
}

/// Grant or revoke a single role on a single action
///
/// Returns a new matrix; the input is left untouched. Granting on an action
/// with no row appends one. Revoking leaves the row in place even if its
/// role list becomes empty.
pub fn set_role_permission(
    permissions: &[ModulePermission],
    action: Action,
    role: Role,
    granted: bool,
) -> Vec<ModulePermission> {
    let mut updated = permissions.to_vec();

    match updated.iter_mut().find(|p| p.action == action) {
        Some(row) => {
            if granted {
                if !row.roles.contains(&role) {
                    row.roles.push(role);
                }
            } else {
                row.roles.retain(|r| *r != role);
            }
        }
        None if granted => updated.push(ModulePermission::new(action, [role])),
        None => {}
    }

    updated
}
