//! Module installer: unpack, validate and build module records

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::result::ZipError;
use zip::ZipArchive;

use sdk::errors::ModuleError;
use sdk::manifest::ModuleManifest;
use sdk::types::Module;

use crate::permissions::{default_permissions, merge_duplicate_actions};
use crate::validator::validate_manifest;

/// Name of the manifest entry at the root of every module archive
pub const MANIFEST_FILE: &str = "module.json";

/// Advertised upload limit (10MB)
pub const DEFAULT_MAX_ARCHIVE_SIZE: u64 = 10 * 1024 * 1024;

/// Hook run for every file in an archive once its manifest is valid
pub trait EntryProcessor: Send + Sync {
    fn process(
        &self,
        manifest: &ModuleManifest,
        path: &str,
        content: &str,
    ) -> Result<(), ModuleError>;
}

/// Default processor: records each entry in the debug log
#[derive(Debug, Default)]
pub struct LogEntries;

impl EntryProcessor for LogEntries {
    fn process(
        &self,
        manifest: &ModuleManifest,
        path: &str,
        content: &str,
    ) -> Result<(), ModuleError> {
        debug!(
            "Processing file: {} ({} bytes) for {}",
            path,
            content.len(),
            manifest.name
        );
        Ok(())
    }
}

/// Upload constraints checked before an archive is read
#[derive(Debug, Clone)]
pub struct InstallPolicy {
    /// Maximum archive size in bytes
    pub max_archive_size: u64,
    /// Accepted file extensions, without the dot
    pub allowed_extensions: Vec<String>,
}

impl Default for InstallPolicy {
    fn default() -> Self {
        Self {
            max_archive_size: DEFAULT_MAX_ARCHIVE_SIZE,
            allowed_extensions: vec!["zip".to_string(), "rar".to_string()],
        }
    }
}

impl InstallPolicy {
    /// Check an upload's file name and size against the policy
    pub fn check(&self, path: &Path, size: u64) -> Result<(), ModuleError> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        if !self
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
        {
            return Err(ModuleError::UnsupportedArchive(if extension.is_empty() {
                "no extension".to_string()
            } else {
                format!(".{}", extension)
            }));
        }

        if size > self.max_archive_size {
            return Err(ModuleError::ArchiveTooLarge {
                size,
                limit: self.max_archive_size,
            });
        }

        Ok(())
    }
}

/// Installs modules from uploaded archives
///
/// One installer accepts one upload at a time; a second call while an
/// install is running fails with `InstallInProgress`.
pub struct ModuleInstaller {
    policy: InstallPolicy,
    archive_dir: Option<PathBuf>,
    processors: Vec<Arc<dyn EntryProcessor>>,
    installing: AtomicBool,
}

impl Default for ModuleInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleInstaller {
    /// Create an installer with the default policy that keeps no archives
    pub fn new() -> Self {
        Self {
            policy: InstallPolicy::default(),
            archive_dir: None,
            processors: vec![Arc::new(LogEntries)],
            installing: AtomicBool::new(false),
        }
    }

    pub fn with_policy(mut self, policy: InstallPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Keep a copy of every installed archive under `dir`
    pub fn with_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn EntryProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn policy(&self) -> &InstallPolicy {
        &self.policy
    }

    /// Check an archive file against the upload policy, then install it
    pub async fn install_from_path(&self, path: &Path) -> Result<Module, ModuleError> {
        let metadata = tokio::fs::metadata(path).await?;
        self.policy.check(path, metadata.len())?;

        // The file may have changed since the metadata call
        let bytes = tokio::fs::read(path).await?;
        self.policy.check(path, bytes.len() as u64)?;

        self.install_module(bytes).await
    }

    /// Install a module from the raw bytes of an uploaded archive
    ///
    /// The returned module is not registered anywhere; adding it to a
    /// registry is the caller's job.
    pub async fn install_module(&self, archive: Vec<u8>) -> Result<Module, ModuleError> {
        let _guard = InstallGuard::acquire(&self.installing)?;

        let size = archive.len() as u64;
        let processors: Vec<Arc<dyn EntryProcessor>> =
            self.processors.iter().map(Arc::clone).collect();

        let (manifest, archive) = tokio::task::spawn_blocking(move || {
            let manifest = extract_manifest(&archive, &processors)?;
            Ok::<_, ModuleError>((manifest, archive))
        })
        .await
        .map_err(|e| ModuleError::ArchiveRead {
            path: MANIFEST_FILE.to_string(),
            reason: e.to_string(),
        })??;

        let module = build_module(manifest, size, compute_checksum(&archive));

        if let Some(dest) = self.archive_path(&module.id) {
            if let Err(e) = store_archive(&dest, &archive).await {
                tokio::fs::remove_file(&dest).await.ok();
                return Err(e);
            }
            debug!("  Archive kept at: {}", dest.display());
        }

        info!(
            "Installed module: {} v{} ({}, {} bytes)",
            module.name, module.version, module.id, module.size
        );
        Ok(module)
    }

    /// Remove everything left behind by an installed module
    ///
    /// Never fails for an id that is not installed. The registry entry is
    /// left alone.
    pub async fn uninstall_module(&self, module_id: &str) -> Result<(), ModuleError> {
        info!("Uninstalling module: {}", module_id);

        if let Some(path) = self.archive_path(module_id) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!("  Removed archive: {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    fn archive_path(&self, module_id: &str) -> Option<PathBuf> {
        let dir = self.archive_dir.as_ref()?;
        // ids are generated UUIDs, anything else never had files written
        if Uuid::parse_str(module_id).is_err() {
            warn!("Not a module id, nothing to clean up: {}", module_id);
            return None;
        }
        Some(dir.join(format!("{}.zip", module_id)))
    }
}

/// Open the archive, validate its manifest and walk its entries
fn extract_manifest(
    archive: &[u8],
    processors: &[Arc<dyn EntryProcessor>],
) -> Result<ModuleManifest, ModuleError> {
    let mut zip = ZipArchive::new(Cursor::new(archive))
        .map_err(|e| ModuleError::ArchiveFormat(e.to_string()))?;

    let raw = {
        let mut entry = match zip.by_name(MANIFEST_FILE) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Err(ModuleError::ManifestNotFound),
            Err(e) => return Err(ModuleError::ArchiveFormat(e.to_string())),
        };
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| ModuleError::ArchiveRead {
                path: MANIFEST_FILE.to_string(),
                reason: e.to_string(),
            })?;
        bytes
    };

    let text = String::from_utf8(raw).map_err(|e| ModuleError::ManifestParse(e.to_string()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| ModuleError::ManifestParse(e.to_string()))?;

    let manifest = validate_manifest(&value)?;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| ModuleError::ArchiveRead {
                path: format!("entry #{}", index),
                reason: e.to_string(),
            })?;
        if entry.is_dir() {
            continue;
        }

        let path = entry.name().to_string();
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| ModuleError::ArchiveRead {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        // Binary assets are handed over lossily decoded
        let content = String::from_utf8_lossy(&bytes);
        for processor in processors {
            processor.process(&manifest, &path, &content)?;
        }
    }

    Ok(manifest)
}

/// Compute the SHA-256 hash of an archive and return it as hex
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn build_module(manifest: ModuleManifest, size: u64, checksum: String) -> Module {
    let permissions = match manifest.permissions {
        Some(permissions) => merge_duplicate_actions(permissions),
        None => default_permissions(),
    };

    Module {
        id: Uuid::new_v4().to_string(),
        name: manifest.name,
        version: manifest.version,
        description: manifest.description,
        author: manifest.author,
        is_active: true,
        installed_at: Utc::now(),
        size,
        dependencies: manifest.dependencies,
        permissions,
        checksum,
    }
}

async fn store_archive(dest: &Path, archive: &[u8]) -> Result<(), ModuleError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, archive).await?;
    Ok(())
}

/// Marks the installer busy for the lifetime of one install
struct InstallGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InstallGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ModuleError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ModuleError::InstallInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for InstallGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_accepts_zip_and_rar() {
        let policy = InstallPolicy::default();

        assert!(policy.check(Path::new("inventario.zip"), 1024).is_ok());
        assert!(policy.check(Path::new("INVENTARIO.RAR"), 1024).is_ok());
    }

    #[test]
    fn test_policy_rejects_other_extensions() {
        let policy = InstallPolicy::default();

        assert!(matches!(
            policy.check(Path::new("module.tar.gz"), 10),
            Err(ModuleError::UnsupportedArchive(ext)) if ext == ".gz"
        ));
        assert!(matches!(
            policy.check(Path::new("module"), 10),
            Err(ModuleError::UnsupportedArchive(_))
        ));
    }

    #[test]
    fn test_policy_size_limit() {
        let policy = InstallPolicy::default();

        assert!(policy
            .check(Path::new("a.zip"), DEFAULT_MAX_ARCHIVE_SIZE)
            .is_ok());
        assert!(matches!(
            policy.check(Path::new("a.zip"), DEFAULT_MAX_ARCHIVE_SIZE + 1),
            Err(ModuleError::ArchiveTooLarge { limit, .. }) if limit == DEFAULT_MAX_ARCHIVE_SIZE
        ));
    }

    #[test]
    fn test_policy_extensions_case_insensitive() {
        let policy = InstallPolicy {
            allowed_extensions: vec!["ZIP".to_string()],
            ..InstallPolicy::default()
        };

        assert!(policy.check(Path::new("inventario.zip"), 10).is_ok());
        assert!(matches!(
            policy.check(Path::new("inventario.Rar"), 10),
            Err(ModuleError::UnsupportedArchive(ext)) if ext == ".Rar"
        ));
    }

    #[test]
    fn test_checksum_known_value() {
        assert_eq!(
            compute_checksum(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_guard_released_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let _guard = InstallGuard::acquire(&flag).unwrap();
            assert!(matches!(
                InstallGuard::acquire(&flag),
                Err(ModuleError::InstallInProgress)
            ));
        }
        assert!(InstallGuard::acquire(&flag).is_ok());
    }

    #[test]
    fn test_archive_path_requires_uuid() {
        let installer = ModuleInstaller::new().with_archive_dir("/tmp/sysgestion-test");

        assert!(installer.archive_path("../../etc/passwd").is_none());
        let id = Uuid::new_v4().to_string();
        assert_eq!(
            installer.archive_path(&id),
            Some(PathBuf::from("/tmp/sysgestion-test").join(format!("{}.zip", id)))
        );
        assert!(ModuleInstaller::new().archive_path(&id).is_none());
    }
}
