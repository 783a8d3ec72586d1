//! Application context
//!
//! Replaces the dashboard's ambient stores with one explicit object built at
//! startup: the registry is restored from storage once here, and every
//! registry mutation afterwards is flushed by the registry itself.

use anyhow::{Context as _, Result};
use tracing::debug;

use sysgestion_modules::{FileStore, ModuleInstaller, ModuleRegistry};

use crate::config::Config;
use crate::session::Session;

/// Everything a command handler needs
pub struct AppContext {
    pub config: Config,
    pub session: Session,
    pub installer: ModuleInstaller,
    pub registry: ModuleRegistry,
}

impl AppContext {
    /// Build the context from a validated config and the acting session
    pub fn open(config: Config, session: Session) -> Result<Self> {
        let store = FileStore::in_dir(&config.core.data_dir);
        debug!("Module storage: {}", store.path().display());

        let registry =
            ModuleRegistry::load(Box::new(store)).context("Failed to load module storage")?;

        let mut installer = ModuleInstaller::new().with_policy(config.install_policy());
        if config.modules.keep_archives {
            installer = installer.with_archive_dir(config.archive_dir());
        }

        Ok(Self {
            config,
            session,
            installer,
            registry,
        })
    }
}
