//! Configuration types for flattening and build output post-processing

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name looked up in the project root
pub const CONFIG_FILE_NAME: &str = "solflat.toml";

/// Main configuration for flattening a contract project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlattenConfig {
    /// Project root directory containing the contract sources
    #[serde(skip)]
    pub project_root: PathBuf,

    /// Production sources. If relative, it's relative to project_root
    pub contracts_dir: PathBuf,

    /// Test sources. If relative, it's relative to project_root
    pub tests_dir: PathBuf,

    /// Output directory for flattened artifacts
    /// If relative, it's relative to project_root
    pub output_dir: PathBuf,

    /// File name suffix of contract sources
    pub source_suffix: String,

    /// Files whose name contains this marker are test-only mocks
    pub mock_marker: String,

    /// Helper appended to the test sources, relative to project_root
    pub extra_test_source: Option<PathBuf>,

    /// File name of the production artifact
    pub contracts_artifact: String,

    /// File name of the test artifact
    pub tests_artifact: String,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            project_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            contracts_dir: PathBuf::from("contracts"),
            tests_dir: PathBuf::from("test"),
            output_dir: PathBuf::from("flat"),
            source_suffix: ".sol".to_string(),
            mock_marker: "Mock".to_string(),
            extra_test_source: Some(PathBuf::from("script/LibDeploy.sol")),
            contracts_artifact: "contracts.sol".to_string(),
            tests_artifact: "tests.sol".to_string(),
        }
    }
}

impl FlattenConfig {
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            ..Self::default()
        }
    }

    /// Returns the absolute contracts directory path
    pub fn contracts_directory(&self) -> PathBuf {
        resolve(&self.project_root, &self.contracts_dir)
    }

    /// Returns the absolute tests directory path
    pub fn tests_directory(&self) -> PathBuf {
        resolve(&self.project_root, &self.tests_dir)
    }

    /// Returns the absolute output directory path
    pub fn output_directory(&self) -> PathBuf {
        resolve(&self.project_root, &self.output_dir)
    }

    /// Returns the absolute path of the extra test helper, if any
    pub fn extra_test_path(&self) -> Option<PathBuf> {
        self.extra_test_source
            .as_deref()
            .map(|path| resolve(&self.project_root, path))
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.source_suffix.is_empty() {
            return Err(eyre::eyre!("Source suffix must not be empty"));
        }
        if self.mock_marker.is_empty() {
            return Err(eyre::eyre!("Mock marker must not be empty"));
        }
        if self.contracts_artifact == self.tests_artifact {
            return Err(eyre::eyre!(
                "Production and test artifacts share the file name {}",
                self.contracts_artifact
            ));
        }
        Ok(())
    }

    /// Create a new builder for FlattenConfig
    pub fn builder() -> FlattenConfigBuilder {
        FlattenConfigBuilder::default()
    }
}

/// Builder for creating FlattenConfig with a fluent API
#[derive(Default)]
pub struct FlattenConfigBuilder {
    config: FlattenConfig,
}

impl FlattenConfigBuilder {
    /// Set the project root directory
    pub fn project_root(mut self, path: PathBuf) -> Self {
        self.config.project_root = path;
        self
    }

    pub fn contracts_dir(mut self, path: PathBuf) -> Self {
        self.config.contracts_dir = path;
        self
    }

    pub fn tests_dir(mut self, path: PathBuf) -> Self {
        self.config.tests_dir = path;
        self
    }

    /// Set the output directory
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.config.output_dir = path;
        self
    }

    pub fn source_suffix(mut self, suffix: &str) -> Self {
        self.config.source_suffix = suffix.to_string();
        self
    }

    /// Set the marker identifying mock contracts
    pub fn mock_marker(mut self, marker: &str) -> Self {
        self.config.mock_marker = marker.to_string();
        self
    }

    /// Set or clear the helper appended to the test sources
    pub fn extra_test_source(mut self, path: Option<PathBuf>) -> Self {
        self.config.extra_test_source = path;
        self
    }

    /// Set artifact file names
    pub fn artifacts(mut self, contracts: &str, tests: &str) -> Self {
        self.config.contracts_artifact = contracts.to_string();
        self.config.tests_artifact = tests.to_string();
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<FlattenConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Targets for compiler metadata trimming
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetadataTrimConfig {
    /// Compiler output directory, relative to the project root
    pub artifacts_dir: PathBuf,
    /// Contract names whose build artifacts get trimmed
    pub targets: Vec<String>,
}

impl Default for MetadataTrimConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("out"),
            targets: [
                "Create3Factory",
                "CryptoLegacyBuildManager",
                "FeeRegistry",
                "LegacyMessenger",
                "CryptoLegacyFactory",
            ]
            .iter()
            .map(|name| name.to_string())
            .collect(),
        }
    }
}

impl MetadataTrimConfig {
    /// Path of the build artifact for `target`: `<artifacts_dir>/N.sol/N.json`
    pub fn artifact_path(&self, project_root: &Path, target: &str) -> PathBuf {
        resolve(project_root, &self.artifacts_dir)
            .join(format!("{target}.sol"))
            .join(format!("{target}.json"))
    }
}

/// Settings for backfilling broadcast receipts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackfillConfig {
    /// Broadcast directory, relative to the project root
    pub broadcast_dir: PathBuf,
    /// Deployment script the broadcast belongs to
    pub script_name: String,
    /// Chain the broadcast was sent to
    pub chain_id: Option<u64>,
    /// JSON-RPC endpoint, either a URL or a bare `host/path`
    pub rpc_url: Option<String>,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            broadcast_dir: PathBuf::from("broadcast"),
            script_name: "CryptoLegacyFactory.s.sol".to_string(),
            chain_id: None,
            rpc_url: None,
        }
    }
}

impl BackfillConfig {
    /// `<broadcast_dir>/<script_name>/<chain_id>/run-latest.json`
    pub fn record_path(&self, project_root: &Path, chain_id: u64) -> PathBuf {
        resolve(project_root, &self.broadcast_dir)
            .join(&self.script_name)
            .join(chain_id.to_string())
            .join("run-latest.json")
    }
}

/// Input and output of the coverage summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoverageConfig {
    pub lcov_path: PathBuf,
    pub summary_path: PathBuf,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            lcov_path: PathBuf::from("lcov.info"),
            summary_path: PathBuf::from("coverage/coverage-summary.json"),
        }
    }
}

impl CoverageConfig {
    pub fn lcov_file(&self, project_root: &Path) -> PathBuf {
        resolve(project_root, &self.lcov_path)
    }

    pub fn summary_file(&self, project_root: &Path) -> PathBuf {
        resolve(project_root, &self.summary_path)
    }
}

/// Everything `solflat.toml` can configure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    pub flatten: FlattenConfig,
    pub metadata: MetadataTrimConfig,
    pub backfill: BackfillConfig,
    pub coverage: CoverageConfig,
}

impl ProjectConfig {
    /// Loads a TOML config file. A missing file yields the defaults.
    ///
    /// Relative paths in the file resolve against `project_root`.
    pub fn load(path: &Path, project_root: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str::<ProjectConfig>(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            ProjectConfig::default()
        };

        config.flatten.project_root = project_root.to_path_buf();
        config.flatten.validate()?;
        Ok(config)
    }

    /// Project root all relative paths resolve against
    pub fn project_root(&self) -> &Path {
        &self.flatten.project_root
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
