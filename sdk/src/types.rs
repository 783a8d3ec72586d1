//! Installed module record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::manifest::ModulePermission;

/// One installed module
///
/// Field names are camelCase on the wire to match the blob the dashboard
/// persists under `module-storage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    /// Generated at install time, never reused
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub is_active: bool,
    pub installed_at: DateTime<Utc>,
    /// Byte length of the uploaded archive
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    pub permissions: Vec<ModulePermission>,
    /// SHA-256 of the uploaded archive (hex)
    #[serde(default)]
    pub checksum: String,
}
