//! Integration tests for the install → register → authorize flow
//!
//! Archives are built in memory with `zip::ZipWriter`; retained archives and
//! upload files live in temp directories.

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sdk::errors::ModuleError;
use sdk::manifest::{Action, ModuleManifest, ModulePermission, Role};
use sysgestion_modules::installer::{EntryProcessor, InstallPolicy, ModuleInstaller};
use sysgestion_modules::permissions::{default_permissions, has_permission};
use sysgestion_modules::storage::{FileStore, MemoryStore};
use sysgestion_modules::ModuleRegistry;
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const INV_MANIFEST: &str =
    r#"{"name":"Inv","version":"1.0","description":"x","author":"y"}"#;

fn build_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, FileOptions::default()).unwrap();
            continue;
        }
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn inv_archive() -> Vec<u8> {
    build_archive(&[
        ("module.json", INV_MANIFEST),
        ("assets/", ""),
        ("assets/index.js", "export default {}"),
    ])
}

#[tokio::test]
async fn test_end_to_end_default_permissions() {
    let installer = ModuleInstaller::new();
    let mut registry = ModuleRegistry::load(Box::new(MemoryStore::new())).unwrap();

    let archive = inv_archive();
    let archive_len = archive.len() as u64;
    let module = installer.install_module(archive).await.unwrap();

    assert_eq!(module.name, "Inv");
    assert!(module.is_active);
    assert_eq!(module.size, archive_len);
    assert_eq!(module.permissions, default_permissions());
    assert_eq!(module.permissions.len(), 4);
    assert_eq!(module.checksum.len(), 64);

    assert!(!has_permission(&module, Action::Write, Role::Warehouse));
    assert!(has_permission(&module, Action::Write, Role::Admin));

    let id = module.id.clone();
    registry.add_module(module).unwrap();
    assert!(registry.get_module(&id).is_some());
    assert!(!registry.has_permission(&id, Action::Write, Role::Warehouse));
}

#[tokio::test]
async fn test_ids_are_unique() {
    let installer = ModuleInstaller::new();

    let first = installer.install_module(inv_archive()).await.unwrap();
    let second = installer.install_module(inv_archive()).await.unwrap();
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn test_manifest_permissions_used_and_merged() {
    let manifest = r#"{
        "name": "Contracts",
        "version": "2.1",
        "description": "Contract tracking",
        "author": "SysGestion",
        "dependencies": ["core"],
        "permissions": [
            { "action": "read", "roles": ["commercial"] },
            { "action": "read", "roles": ["operator", "commercial"] },
            { "action": "admin", "roles": ["supervisor"] }
        ]
    }"#;
    let archive = build_archive(&[("module.json", manifest)]);

    let module = ModuleInstaller::new().install_module(archive).await.unwrap();

    assert_eq!(module.dependencies, Some(vec!["core".to_string()]));
    assert_eq!(
        module.permissions,
        vec![
            ModulePermission::new(Action::Read, [Role::Commercial, Role::Operator]),
            ModulePermission::new(Action::Admin, [Role::Supervisor]),
        ]
    );
    assert!(!has_permission(&module, Action::Write, Role::Admin));
}

#[tokio::test]
async fn test_not_an_archive() {
    let result = ModuleInstaller::new()
        .install_module(b"Rar!\x1a\x07\x00 definitely not zip".to_vec())
        .await;

    assert!(matches!(result, Err(ModuleError::ArchiveFormat(_))));
}

#[tokio::test]
async fn test_manifest_must_be_top_level_and_exact_case() {
    let installer = ModuleInstaller::new();

    for name in ["Module.json", "inv/module.json"] {
        let archive = build_archive(&[(name, INV_MANIFEST)]);
        let result = installer.install_module(archive).await;
        assert!(
            matches!(result, Err(ModuleError::ManifestNotFound)),
            "{} should not count as a manifest",
            name
        );
    }
}

#[tokio::test]
async fn test_manifest_syntax_error() {
    let archive = build_archive(&[("module.json", "{\"name\": \"Inv\",")]);

    let result = ModuleInstaller::new().install_module(archive).await;
    assert!(matches!(result, Err(ModuleError::ManifestParse(_))));
}

#[tokio::test]
async fn test_missing_field_adds_nothing() {
    let mut registry = ModuleRegistry::load(Box::new(MemoryStore::new())).unwrap();
    let archive = build_archive(&[(
        "module.json",
        r#"{"name":"Inv","version":"1.0","description":"x"}"#,
    )]);

    match ModuleInstaller::new().install_module(archive).await {
        Err(ModuleError::MissingField(field)) => assert_eq!(field, "author"),
        other => panic!("expected MissingField, got {:?}", other),
    }
    assert!(registry.modules().is_empty());

    // the failed install did not wedge the installer or the registry
    let module = ModuleInstaller::new()
        .install_module(inv_archive())
        .await
        .unwrap();
    registry.add_module(module).unwrap();
    assert_eq!(registry.modules().len(), 1);
}

#[tokio::test]
async fn test_roles_not_a_list() {
    let manifest = r#"{"name":"Inv","version":"1.0","description":"x","author":"y",
        "permissions":[{"action":"read","roles":"admin"}]}"#;
    let archive = build_archive(&[("module.json", manifest)]);

    let result = ModuleInstaller::new().install_module(archive).await;
    assert!(matches!(result, Err(ModuleError::MalformedPermissions(_))));
}

#[tokio::test]
async fn test_corrupt_entry_fails_install() {
    const PAYLOAD: &[u8] = b"sysgestion-payload-0123456789";

    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file("module.json", FileOptions::default()).unwrap();
    writer.write_all(INV_MANIFEST.as_bytes()).unwrap();
    writer.start_file("notes.txt", stored).unwrap();
    writer.write_all(PAYLOAD).unwrap();
    let mut archive = writer.finish().unwrap().into_inner();

    // Flip one stored byte so the entry no longer matches its CRC
    let offset = archive
        .windows(PAYLOAD.len())
        .position(|window| window == PAYLOAD)
        .unwrap();
    archive[offset] ^= 0x20;

    match ModuleInstaller::new().install_module(archive).await {
        Err(ModuleError::ArchiveRead { path, .. }) => assert_eq!(path, "notes.txt"),
        other => panic!("expected ArchiveRead, got {:?}", other),
    }
}

/// Keeps the decoded content of one entry
#[derive(Default)]
struct CaptureEntry(Mutex<Option<String>>);

impl EntryProcessor for CaptureEntry {
    fn process(
        &self,
        _manifest: &ModuleManifest,
        path: &str,
        content: &str,
    ) -> Result<(), ModuleError> {
        if path == "assets/logo.png" {
            *self.0.lock().unwrap() = Some(content.to_string());
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_binary_assets_install() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file("module.json", FileOptions::default()).unwrap();
    writer.write_all(INV_MANIFEST.as_bytes()).unwrap();
    writer.start_file("assets/logo.png", FileOptions::default()).unwrap();
    writer
        .write_all(&[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0xff, 0x00])
        .unwrap();
    let archive = writer.finish().unwrap().into_inner();

    let capture = Arc::new(CaptureEntry::default());
    let installer = ModuleInstaller::new()
        .with_processor(Arc::clone(&capture) as Arc<dyn EntryProcessor>);

    let module = installer.install_module(archive).await.unwrap();
    assert_eq!(module.name, "Inv");

    let content = capture.0.lock().unwrap().clone().unwrap();
    assert!(content.contains("PNG"));
    assert!(content.contains('\u{FFFD}'));
}

/// Counts processed entries
#[derive(Default)]
struct CountEntries(AtomicUsize);

impl EntryProcessor for CountEntries {
    fn process(
        &self,
        _manifest: &ModuleManifest,
        _path: &str,
        _content: &str,
    ) -> Result<(), ModuleError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_processors_see_every_file() {
    let counter = Arc::new(CountEntries::default());
    let installer = ModuleInstaller::new()
        .with_processor(Arc::clone(&counter) as Arc<dyn EntryProcessor>);

    installer.install_module(inv_archive()).await.unwrap();

    // module.json and assets/index.js; the directory entry is skipped
    assert_eq!(counter.0.load(Ordering::SeqCst), 2);
}

/// Holds the blocking worker long enough for a second install to collide
struct SlowEntries;

impl EntryProcessor for SlowEntries {
    fn process(
        &self,
        _manifest: &ModuleManifest,
        _path: &str,
        _content: &str,
    ) -> Result<(), ModuleError> {
        std::thread::sleep(Duration::from_millis(50));
        Ok(())
    }
}

#[tokio::test]
async fn test_overlapping_install_rejected() {
    let installer = ModuleInstaller::new().with_processor(Arc::new(SlowEntries));

    let (first, second) = tokio::join!(
        installer.install_module(inv_archive()),
        installer.install_module(inv_archive())
    );

    let results = [first, second];
    let busy = results
        .iter()
        .filter(|r| matches!(r, Err(ModuleError::InstallInProgress)))
        .count();
    let installed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!((busy, installed), (1, 1));

    // guard released afterwards
    assert!(installer.install_module(inv_archive()).await.is_ok());
}

#[tokio::test]
async fn test_uninstall_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let installer = ModuleInstaller::new().with_archive_dir(temp_dir.path().join("modules"));

    let module = installer.install_module(inv_archive()).await.unwrap();
    let kept = temp_dir
        .path()
        .join("modules")
        .join(format!("{}.zip", module.id));
    assert!(kept.exists());

    installer.uninstall_module(&module.id).await.unwrap();
    assert!(!kept.exists());
    installer.uninstall_module(&module.id).await.unwrap();

    // never-installed ids are fine too
    installer.uninstall_module("not-a-module").await.unwrap();
    ModuleInstaller::new()
        .uninstall_module(&module.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_install_from_path_enforces_policy() {
    let temp_dir = TempDir::new().unwrap();
    let zip_path = temp_dir.path().join("inventario.zip");
    std::fs::write(&zip_path, inv_archive()).unwrap();

    let module = ModuleInstaller::new()
        .install_from_path(&zip_path)
        .await
        .unwrap();
    assert_eq!(module.name, "Inv");

    let strict = ModuleInstaller::new().with_policy(InstallPolicy {
        max_archive_size: 16,
        ..InstallPolicy::default()
    });
    assert!(matches!(
        strict.install_from_path(&zip_path).await,
        Err(ModuleError::ArchiveTooLarge { limit: 16, .. })
    ));

    let txt_path = temp_dir.path().join("inventario.txt");
    std::fs::write(&txt_path, inv_archive()).unwrap();
    assert!(matches!(
        ModuleInstaller::new().install_from_path(&txt_path).await,
        Err(ModuleError::UnsupportedArchive(_))
    ));

    // .rar passes the upload check but is not a readable archive
    let rar_path = temp_dir.path().join("inventario.rar");
    std::fs::write(&rar_path, b"Rar!\x1a\x07\x01\x00").unwrap();
    assert!(matches!(
        ModuleInstaller::new().install_from_path(&rar_path).await,
        Err(ModuleError::ArchiveFormat(_))
    ));
}

#[tokio::test]
async fn test_registry_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let module = ModuleInstaller::new()
        .install_module(inv_archive())
        .await
        .unwrap();
    let id = module.id.clone();

    {
        let mut registry =
            ModuleRegistry::load(Box::new(FileStore::in_dir(temp_dir.path()))).unwrap();
        registry.add_module(module).unwrap();
        assert!(!registry.toggle_module_status(&id, Role::Admin).unwrap());
        assert!(registry.toggle_module_status(&id, Role::Warehouse).is_err());
    }

    let registry = ModuleRegistry::load(Box::new(FileStore::in_dir(temp_dir.path()))).unwrap();
    let restored = registry.get_module(&id).unwrap();
    assert!(!restored.is_active);
    assert_eq!(restored.permissions, default_permissions());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_size_limit_applies_to_bytes_read() {
    // procfs files report a length of 0 but yield content when read
    let temp_dir = TempDir::new().unwrap();
    let link = temp_dir.path().join("grown.zip");
    std::os::unix::fs::symlink("/proc/self/maps", &link).unwrap();
    assert_eq!(std::fs::metadata(&link).unwrap().len(), 0);

    let strict = ModuleInstaller::new().with_policy(InstallPolicy {
        max_archive_size: 16,
        ..InstallPolicy::default()
    });
    assert!(matches!(
        strict.install_from_path(&link).await,
        Err(ModuleError::ArchiveTooLarge { limit: 16, .. })
    ));
}
