//! Manifest validation: required fields and permission shape checks
//!
//! `module.json` comes from an uploaded archive and is untrusted. Fields are
//! tested for truthiness: a missing key, `null`, `""`, `0` and `false` all
//! count as absent.

use serde_json::Value;
use tracing::warn;

use sdk::errors::ModuleError;
use sdk::manifest::{Action, ModuleManifest, ModulePermission, Role};

/// Required manifest fields, in the order they are checked
pub const REQUIRED_FIELDS: [&str; 4] = ["name", "version", "description", "author"];

/// Validate a decoded `module.json`
///
/// Stops at the first failure: the first absent required field yields
/// `MissingField`, the first bad permission row yields `MalformedPermissions`.
pub fn validate_manifest(raw: &Value) -> Result<ModuleManifest, ModuleError> {
    // First failure in REQUIRED_FIELDS order wins
    let [name, version, description, author] =
        REQUIRED_FIELDS.map(|field| required_field(raw, field));
    let (name, version, description, author) = (name?, version?, description?, author?);

    let permissions = match raw.get("permissions") {
        Some(value) if is_truthy(value) => Some(validate_permissions(value)?),
        _ => None,
    };

    let dependencies = match raw.get("dependencies") {
        Some(Value::Array(items)) => Some(items.iter().map(render_text).collect()),
        Some(Value::Null) | None => None,
        Some(other) => {
            warn!("Ignoring non-array dependencies field: {}", other);
            None
        }
    };

    Ok(ModuleManifest {
        name,
        version,
        description,
        author,
        dependencies,
        permissions,
    })
}

fn required_field(raw: &Value, field: &str) -> Result<String, ModuleError> {
    match raw.get(field) {
        Some(value) if is_truthy(value) => Ok(render_text(value)),
        _ => Err(ModuleError::MissingField(field.to_string())),
    }
}

fn validate_permissions(value: &Value) -> Result<Vec<ModulePermission>, ModuleError> {
    let entries = value
        .as_array()
        .ok_or_else(|| ModuleError::MalformedPermissions("permissions must be an array".into()))?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_permission(index, entry))
        .collect()
}

fn parse_permission(index: usize, entry: &Value) -> Result<ModulePermission, ModuleError> {
    let malformed = |reason: String| {
        ModuleError::MalformedPermissions(format!("permission #{}: {}", index, reason))
    };

    let action = match entry.get("action") {
        Some(value) if is_truthy(value) => value,
        _ => return Err(malformed("missing action".to_string())),
    };
    let roles = entry
        .get("roles")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("roles must be an array".to_string()))?;

    let action = action
        .as_str()
        .ok_or_else(|| malformed("action must be a string".to_string()))?
        .parse::<Action>()
        .map_err(malformed)?;

    let roles = roles
        .iter()
        .map(|role| {
            role.as_str()
                .ok_or_else(|| malformed("roles must be strings".to_string()))?
                .parse::<Role>()
                .map_err(malformed)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ModulePermission { action, roles })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Strings verbatim, anything else as its JSON text
fn render_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
