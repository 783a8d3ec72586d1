//! Module registry: installed modules and their authorized mutations
//!
//! The registry is loaded once from its store at startup and written back
//! on every mutation. A mutation is committed in memory only after the store
//! accepted it, so a failed write leaves the registry as it was.

use tracing::{info, warn};

use sdk::errors::ModuleError;
use sdk::manifest::{Action, ModulePermission, Role};
use sdk::types::Module;

use crate::permissions::{has_permission, merge_duplicate_actions};
use crate::storage::ModuleStore;

/// Process-wide collection of installed modules
pub struct ModuleRegistry {
    modules: Vec<Module>,
    store: Box<dyn ModuleStore>,
}

impl ModuleRegistry {
    /// Restore the registry from `store`; an empty store gives an empty registry
    pub fn load(store: Box<dyn ModuleStore>) -> Result<Self, ModuleError> {
        let modules = store.load()?.unwrap_or_default();
        info!("Loaded {} installed module(s)", modules.len());
        Ok(Self { modules, store })
    }

    /// All installed modules, in install order
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn get_module(&self, module_id: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == module_id)
    }

    /// Whether `role` may perform `action` on the module; unknown ids are denied
    pub fn has_permission(&self, module_id: &str, action: Action, role: Role) -> bool {
        self.get_module(module_id)
            .map_or(false, |module| has_permission(module, action, role))
    }

    /// Register a freshly installed module
    ///
    /// Upload authorization is the caller's concern; the registry only
    /// guards identifier uniqueness.
    pub fn add_module(&mut self, module: Module) -> Result<(), ModuleError> {
        if self.get_module(&module.id).is_some() {
            return Err(ModuleError::DuplicateModule(module.id));
        }

        let mut next = self.modules.clone();
        info!("Registering module: {} ({})", module.name, module.id);
        next.push(module);
        self.commit(next)
    }

    /// Drop a module from the registry; absent ids are ignored
    pub fn remove_module(&mut self, module_id: &str) -> Result<(), ModuleError> {
        if self.get_module(module_id).is_none() {
            return Ok(());
        }

        let next = self
            .modules
            .iter()
            .filter(|m| m.id != module_id)
            .cloned()
            .collect();
        info!("Removed module: {}", module_id);
        self.commit(next)
    }

    /// Flip a module's active flag
    ///
    /// Requires the per-module `admin` action for `caller`. Returns the new
    /// state.
    pub fn toggle_module_status(
        &mut self,
        module_id: &str,
        caller: Role,
    ) -> Result<bool, ModuleError> {
        let index = self.index_of(module_id)?;

        if !has_permission(&self.modules[index], Action::Admin, caller) {
            warn!(
                "Insufficient permissions to toggle module status: {} as {}",
                module_id, caller
            );
            return Err(ModuleError::AuthorizationDenied(
                "toggle module status".to_string(),
            ));
        }

        let mut next = self.modules.clone();
        next[index].is_active = !next[index].is_active;
        let active = next[index].is_active;
        self.commit(next)?;

        info!(
            "Module {} is now {}",
            module_id,
            if active { "active" } else { "inactive" }
        );
        Ok(active)
    }

    /// Replace a module's permission matrix
    ///
    /// Only the session-level administrator role may do this, whatever the
    /// module's own matrix says.
    pub fn update_module_permissions(
        &mut self,
        module_id: &str,
        permissions: Vec<ModulePermission>,
        caller: Role,
    ) -> Result<(), ModuleError> {
        if caller != Role::Admin {
            warn!(
                "Only administrators can update module permissions (caller: {})",
                caller
            );
            return Err(ModuleError::AuthorizationDenied(
                "update module permissions".to_string(),
            ));
        }

        let index = self.index_of(module_id)?;
        let mut next = self.modules.clone();
        next[index].permissions = merge_duplicate_actions(permissions);
        self.commit(next)?;

        info!("Updated permissions for module: {}", module_id);
        Ok(())
    }

    fn index_of(&self, module_id: &str) -> Result<usize, ModuleError> {
        self.modules
            .iter()
            .position(|m| m.id == module_id)
            .ok_or_else(|| ModuleError::ModuleNotFound(module_id.to_string()))
    }

    fn commit(&mut self, next: Vec<Module>) -> Result<(), ModuleError> {
        self.store.save(&next)?;
        self.modules = next;
        Ok(())
    }
}
