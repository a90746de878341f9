//! Merging discovered sources into flattened artifacts
//!
//! A project yields two jobs: the production artifact with every contract
//! except mocks, and the test artifact with the test sources followed by the
//! mocks. Each job owns its own pragma and import state, so one job can fail
//! or run elsewhere without affecting the other.

use crate::{
    config::FlattenConfig,
    discovery::{NameFilter, SourceDiscovery},
    imports::{dedupe_with, ImportTracker},
    normalize::{collapse_blank_lines, normalize},
    pragma::PragmaState,
    utils,
};
use eyre::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Which artifact a job produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Contracts,
    Tests,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Contracts => f.write_str("contracts"),
            JobKind::Tests => f.write_str("tests"),
        }
    }
}

/// A source file read from disk
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub raw_text: String,
}

impl SourceFile {
    pub fn read(path: &Path) -> Result<Self> {
        let raw_text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read source file: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            raw_text,
        })
    }
}

/// Ordered sources and the artifact they merge into
#[derive(Debug, Clone)]
pub struct MergeJob {
    pub kind: JobKind,
    pub files: Vec<PathBuf>,
    pub output_path: PathBuf,
}

/// Flattened text ready to be written
#[derive(Debug, Clone)]
pub struct MergedArtifact {
    pub output_path: PathBuf,
    pub content: String,
    pub file_count: usize,
}

/// What a written artifact looks like
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub kind: JobKind,
    pub output_path: PathBuf,
    pub file_count: usize,
    pub bytes: usize,
    pub sha256: String,
}

/// Result of one job of [`flatten_project`]
#[derive(Debug)]
pub struct JobOutcome {
    pub kind: JobKind,
    pub result: Result<MergeReport>,
}

/// Folds normalized sources into one buffer
#[derive(Debug, Default)]
pub struct Merger {
    pragma: PragmaState,
    imports: ImportTracker,
    buffer: String,
    file_count: usize,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one file, newline separated from the previous ones
    pub fn push(&mut self, file: &SourceFile) {
        let cleaned = normalize(&file.raw_text);
        let reduced = self.pragma.reduce(&cleaned);
        let chunk = collapse_blank_lines(&reduced);

        tracing::debug!(
            "Folded {} ({} -> {} bytes)",
            file.path.display(),
            file.raw_text.len(),
            chunk.trim().len()
        );

        self.buffer.push_str(chunk.trim());
        self.buffer.push('\n');
        self.file_count += 1;
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    /// Deduplicates external imports over the whole buffer and trims it
    pub fn finish(mut self) -> String {
        if self.file_count > 0 && !self.pragma.emitted() {
            tracing::warn!(
                "None of the {} merged files declares a compiler version",
                self.file_count
            );
        }
        dedupe_with(&mut self.imports, &self.buffer).trim().to_string()
    }
}

/// Reads `paths` in order and merges them into an artifact for `output_path`.
///
/// A file that cannot be read aborts the whole job.
pub fn merge_job(paths: &[PathBuf], output_path: &Path) -> Result<MergedArtifact> {
    let mut merger = Merger::new();
    for path in paths {
        let file = SourceFile::read(path)?;
        merger.push(&file);
    }

    Ok(MergedArtifact {
        output_path: output_path.to_path_buf(),
        file_count: merger.file_count(),
        content: merger.finish(),
    })
}

impl MergedArtifact {
    /// Writes the artifact, creating the destination directory if absent
    pub fn write(&self, kind: JobKind) -> Result<MergeReport> {
        utils::write_creating_dirs(&self.output_path, &self.content)
            .with_context(|| format!("Failed to write {kind} artifact"))?;

        Ok(MergeReport {
            kind,
            output_path: self.output_path.clone(),
            file_count: self.file_count,
            bytes: self.content.len(),
            sha256: utils::hash_bytes(self.content.as_bytes()),
        })
    }
}

impl MergeJob {
    /// Merges and writes this job's artifact
    pub fn run(&self) -> Result<MergeReport> {
        let artifact = merge_job(&self.files, &self.output_path)?;
        let report = artifact.write(self.kind)?;

        tracing::info!(
            "Merged {} contracts into {} ({} bytes)",
            report.file_count,
            report.output_path.display(),
            report.bytes
        );

        Ok(report)
    }
}

/// Builds the discovery used for both jobs of a project
pub fn project_discovery(config: &FlattenConfig) -> SourceDiscovery {
    SourceDiscovery::new(config.source_suffix.clone())
        .with_tests_root(config.tests_directory(), config.extra_test_path())
}

/// Production sources: every contract whose name lacks the mock marker
pub fn plan_contracts_job(config: &FlattenConfig, discovery: &SourceDiscovery) -> Result<MergeJob> {
    let marker = config.mock_marker.as_str();
    let not_mock: NameFilter<'_> = &|name: &str| !name.contains(marker);
    let files = discovery.discover(&config.contracts_directory(), Some(not_mock))?;

    Ok(MergeJob {
        kind: JobKind::Contracts,
        files,
        output_path: config.output_directory().join(&config.contracts_artifact),
    })
}

/// Test sources followed by the mocks found among the contracts
pub fn plan_tests_job(config: &FlattenConfig, discovery: &SourceDiscovery) -> Result<MergeJob> {
    let marker = config.mock_marker.as_str();
    let only_mock: NameFilter<'_> = &|name: &str| name.contains(marker);

    let mut files = discovery.discover(&config.tests_directory(), None)?;
    files.extend(discovery.discover(&config.contracts_directory(), Some(only_mock))?);

    Ok(MergeJob {
        kind: JobKind::Tests,
        files,
        output_path: config.output_directory().join(&config.tests_artifact),
    })
}

/// Flattens both artifacts of a project.
///
/// Jobs are independent units of failure: both are always attempted and
/// each outcome is reported separately.
pub fn flatten_project(config: &FlattenConfig) -> Vec<JobOutcome> {
    let discovery = project_discovery(config);

    let contracts = plan_contracts_job(config, &discovery).and_then(|job| job.run());
    let tests = plan_tests_job(config, &discovery).and_then(|job| job.run());

    [(JobKind::Contracts, contracts), (JobKind::Tests, tests)]
        .into_iter()
        .map(|(kind, result)| {
            if let Err(e) = &result {
                tracing::error!("Failed to flatten {} artifact: {:#}", kind, e);
            }
            JobOutcome { kind, result }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{import_path, is_relative_import, is_version_directive};
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn merge_sources<'a>(files: impl IntoIterator<Item = &'a SourceFile>) -> String {
        let mut merger = Merger::new();
        for file in files {
            merger.push(file);
        }
        merger.finish()
    }

    fn source(path: &str, text: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(path),
            raw_text: text.to_string(),
        }
    }

    fn write(root: &Path, relative: &str, text: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn test_config(root: &Path) -> FlattenConfig {
        FlattenConfig::builder()
            .project_root(root.to_path_buf())
            .build()
            .unwrap()
    }

    #[test]
    fn test_two_files_share_one_pragma_and_drop_local_imports() {
        let a = source(
            "A.sol",
            "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.0;\nimport \"./Local.sol\";\ncontract A {}\n",
        );
        let b = source(
            "B.sol",
            "pragma solidity ^0.8.0;\nimport \"x/Ext.sol\";\ncontract B {}\n",
        );

        let merged = merge_sources([&a, &b]);
        insta::assert_snapshot!(merged, @r#"
        pragma solidity ^0.8.0;
        contract A {}
        import "x/Ext.sol";
        contract B {}
        "#);
    }

    #[test]
    fn test_shared_external_import_appears_once() {
        let a = source("A.sol", "import \"x/Ext.sol\";\ncontract A {}");
        let b = source("B.sol", "import \"x/Ext.sol\";\ncontract B {}");

        let merged = merge_sources([&a, &b]);
        assert_eq!(merged.matches("import \"x/Ext.sol\";").count(), 1);
        assert!(merged.find("contract A").unwrap() < merged.find("contract B").unwrap());
    }

    #[test]
    fn test_pragma_survivor_is_first_in_order() {
        let files = [
            source("A.sol", "library Helpers {}"),
            source("B.sol", "pragma solidity >=0.8.4;\ncontract B {}"),
            source("C.sol", "pragma solidity ^0.8.20;\n\ncontract C {}"),
        ];

        let merged = merge_sources(&files);
        let pragmas: Vec<&str> = merged.lines().filter(|l| is_version_directive(l)).collect();
        assert_eq!(pragmas, vec!["pragma solidity >=0.8.4;"]);
        assert_eq!(
            merged,
            "library Helpers {}\npragma solidity >=0.8.4;\ncontract B {}\ncontract C {}"
        );
    }

    #[test]
    fn test_commented_out_pragma_never_survives() {
        let files = [
            source("A.sol", "/* Copyright Acme\npragma solidity 0.4.0; */\ncontract A {}"),
            source("B.sol", "pragma solidity ^0.8.0;\ncontract B {}"),
        ];
        let merged = merge_sources(&files);
        assert_eq!(merged, "contract A {}\npragma solidity ^0.8.0;\ncontract B {}");
    }

    #[test]
    fn test_empty_job_produces_empty_artifact() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("flat/out.sol");

        let artifact = merge_job(&[], &output).unwrap();
        assert_eq!(artifact.content, "");
        assert_eq!(artifact.file_count, 0);

        let report = artifact.write(JobKind::Contracts).unwrap();
        assert_eq!(report.bytes, 0);
        assert_eq!(fs::read_to_string(output).unwrap(), "");
    }

    #[test]
    fn test_missing_file_aborts_job() {
        let temp = TempDir::new().unwrap();
        let result = merge_job(&[temp.path().join("Gone.sol")], &temp.path().join("out.sol"));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to read source file"));
        assert!(!temp.path().join("out.sol").exists());
    }

    #[test]
    fn test_flatten_project_partitions_mocks() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "contracts/Token.sol", "pragma solidity ^0.8.0;\nimport \"./lib/Math.sol\";\ncontract Token {}");
        write(root, "contracts/lib/Math.sol", "pragma solidity ^0.8.0;\nlibrary Math {}");
        write(root, "contracts/mocks/MockToken.sol", "pragma solidity ^0.8.0;\nimport \"../Token.sol\";\ncontract MockToken {}");
        write(root, "test/Token.t.sol", "pragma solidity ^0.8.0;\nimport \"forge-std/Test.sol\";\ncontract TokenTest {}");
        write(root, "test/Vault.t.sol", "pragma solidity ^0.8.0;\nimport \"forge-std/Test.sol\";\ncontract VaultTest {}");
        write(root, "script/LibDeploy.sol", "pragma solidity ^0.8.0;\nlibrary LibDeploy {}");

        let config = test_config(root);
        let outcomes = flatten_project(&config);
        assert_eq!(outcomes.len(), 2);

        let contracts = outcomes[0].result.as_ref().unwrap();
        assert_eq!(contracts.kind, JobKind::Contracts);
        assert_eq!(contracts.file_count, 2);
        let production = fs::read_to_string(root.join("flat/contracts.sol")).unwrap();
        assert_eq!(
            production,
            "pragma solidity ^0.8.0;\ncontract Token {}\nlibrary Math {}"
        );

        let tests = outcomes[1].result.as_ref().unwrap();
        assert_eq!(tests.file_count, 4);
        let test_artifact = fs::read_to_string(root.join("flat/tests.sol")).unwrap();
        assert_eq!(
            test_artifact,
            "pragma solidity ^0.8.0;\nimport \"forge-std/Test.sol\";\ncontract TokenTest {}\n\
             contract VaultTest {}\nlibrary LibDeploy {}\ncontract MockToken {}"
        );

        assert!(!production.contains("MockToken"));
        assert!(!test_artifact.contains("contract Token {}"));
        for artifact in [&production, &test_artifact] {
            assert!(artifact.lines().all(|l| !is_relative_import(l)));
            assert_eq!(artifact.lines().filter(|l| is_version_directive(l)).count(), 1);
            let externals: Vec<&str> = artifact.lines().filter(|l| import_path(l).is_some()).collect();
            let unique: HashSet<&str> = externals.iter().copied().collect();
            assert_eq!(unique.len(), externals.len());
        }
    }

    #[test]
    fn test_failed_job_does_not_block_other() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "contracts/Token.sol", "contract Token {}");
        // no test directory and no deploy helper

        let outcomes = flatten_project(&test_config(root));
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_err());
        assert_eq!(
            fs::read_to_string(root.join("flat/contracts.sol")).unwrap(),
            "contract Token {}"
        );
    }

    #[test]
    fn test_report_hash_matches_content() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "contracts/A.sol", "contract A {}");

        let config = test_config(root);
        let job = plan_contracts_job(&config, &project_discovery(&config)).unwrap();
        let report = job.run().unwrap();
        assert_eq!(report.sha256, utils::hash_bytes(b"contract A {}"));
        assert_eq!(report.bytes, 13);
    }
}
