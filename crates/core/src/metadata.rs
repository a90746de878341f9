//! Trimming of compiler build artifacts down to their essential metadata
//!
//! The build artifact of each configured contract is replaced by its
//! `metadata` object with source URLs, licenses, hashes, compiler version,
//! ABI/devdoc output and compilation target removed. Missing artifacts and
//! artifacts without metadata are expected during incremental builds and are
//! reported as skips.

use crate::{config::MetadataTrimConfig, utils};
use eyre::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Keys removed from every entry of `metadata.sources`
const SOURCE_KEYS: &[&str] = &["urls", "license", "keccak256"];

/// Top-level metadata keys removed
const METADATA_KEYS: &[&str] = &["compiler", "version", "output"];

/// Why a target was left untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No build artifact exists for the target
    MissingArtifact,
    /// The artifact has no `metadata` object
    NoMetadata,
}

/// Outcome of trimming one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrimOutcome {
    Trimmed { path: PathBuf, size: u64 },
    Skipped { path: PathBuf, reason: SkipReason },
}

impl TrimOutcome {
    pub fn is_trimmed(&self) -> bool {
        matches!(self, TrimOutcome::Trimmed { .. })
    }
}

/// Reduces an artifact to its trimmed `metadata` object.
///
/// Returns `None` when there is no metadata object to keep.
pub fn trim_metadata(artifact: Value) -> Option<Value> {
    let Value::Object(mut root) = artifact else {
        return None;
    };
    let Some(Value::Object(mut metadata)) = root.shift_remove("metadata") else {
        return None;
    };

    if let Some(Value::Object(sources)) = metadata.get_mut("sources") {
        for source in sources.values_mut().filter_map(Value::as_object_mut) {
            remove_keys(source, SOURCE_KEYS);
        }
    }
    remove_keys(&mut metadata, METADATA_KEYS);
    if let Some(Value::Object(settings)) = metadata.get_mut("settings") {
        settings.shift_remove("compilationTarget");
    }

    Some(Value::Object(metadata))
}

fn remove_keys(object: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        object.shift_remove(*key);
    }
}

/// Trims one artifact file in place
pub fn trim_artifact(path: &Path) -> Result<TrimOutcome> {
    if !path.exists() {
        tracing::warn!("Skipping {}: artifact not found", path.display());
        return Ok(TrimOutcome::Skipped {
            path: path.to_path_buf(),
            reason: SkipReason::MissingArtifact,
        });
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read artifact: {}", path.display()))?;
    let artifact: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse artifact: {}", path.display()))?;

    let Some(metadata) = trim_metadata(artifact) else {
        tracing::warn!("Skipping {}: no metadata", path.display());
        return Ok(TrimOutcome::Skipped {
            path: path.to_path_buf(),
            reason: SkipReason::NoMetadata,
        });
    };

    let json = utils::to_json_with_indent(&metadata, b" ")?;
    std::fs::write(path, &json)
        .with_context(|| format!("Failed to write artifact: {}", path.display()))?;

    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat artifact: {}", path.display()))?
        .len();
    tracing::info!("{} size: {}", path.display(), size);

    Ok(TrimOutcome::Trimmed {
        path: path.to_path_buf(),
        size,
    })
}

/// Trims every configured target under `project_root`
pub fn trim_targets(project_root: &Path, config: &MetadataTrimConfig) -> Result<Vec<TrimOutcome>> {
    let outcomes = config
        .targets
        .iter()
        .map(|target| trim_artifact(&config.artifact_path(project_root, target)))
        .collect::<Result<Vec<_>>>()?;

    let trimmed = outcomes.iter().filter(|o| o.is_trimmed()).count();
    tracing::info!("Trimmed {} of {} artifacts", trimmed, outcomes.len());
    Ok(outcomes)
}
