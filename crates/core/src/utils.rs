//! Utility functions shared by the flattener and the collaborators

use eyre::{Context, Result};
use serde::Serialize;
use std::path::Path;

pub fn hash_bytes(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(data))
}

/// Serializes `value` as pretty JSON indented with `indent`
pub fn to_json_with_indent<T: Serialize>(value: &T, indent: &[u8]) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8(buf)?)
}

/// Writes `contents`, creating the parent directory first
pub fn write_creating_dirs(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))
}
