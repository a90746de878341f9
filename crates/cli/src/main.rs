//! CLI for the solflat library
//!
//! Flattens Solidity projects and post-processes their build outputs.

use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use serde::Serialize;
use solflat::{
    backfill_file, flatten_project, trim_targets, write_summary, BackfillReport, CoverageSummary,
    HttpTransport, JobOutcome, MergeReport, ProjectConfig, TrimOutcome, CONFIG_FILE_NAME,
};
use std::path::{Path, PathBuf};
use tracing::Level;

/// Solidity source flattener
#[derive(Parser, Debug)]
#[command(name = "solflat")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all logging except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file (defaults to solflat.toml in the project root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge contract and test sources into flat/contracts.sol and flat/tests.sol
    Flatten {
        /// Path to the project root
        #[arg(default_value = ".")]
        project_root: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Name marker of test-only mock contracts
        #[arg(long)]
        mock_marker: Option<String>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Replace build artifacts by their trimmed compiler metadata
    TrimMetadata {
        /// Path to the project root
        #[arg(default_value = ".")]
        project_root: PathBuf,

        /// Contract to trim, may be repeated
        #[arg(long = "target")]
        targets: Vec<String>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Fetch receipts missing from the latest broadcast record
    BackfillReceipts {
        /// Path to the project root
        #[arg(default_value = ".")]
        project_root: PathBuf,

        /// RPC endpoint, a URL or a bare host/path
        #[arg(long, env = "RPC")]
        rpc: Option<String>,

        /// Chain ID of the broadcast
        #[arg(long, env = "NETWORK_ID")]
        chain_id: Option<u64>,

        /// Deployment script name
        #[arg(long)]
        script: Option<String>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Summarize lcov data into coverage-summary.json
    CoverageSummary {
        /// Path to the project root
        #[arg(default_value = ".")]
        project_root: PathBuf,

        /// lcov tracefile
        #[arg(long)]
        lcov: Option<PathBuf>,

        /// Summary file to write
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status")]
enum Output {
    #[serde(rename = "success")]
    Success {
        #[serde(flatten)]
        data: SuccessData,
    },

    #[serde(rename = "error")]
    Error { error_type: String, message: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "command")]
enum SuccessData {
    #[serde(rename = "flatten")]
    Flatten { artifacts: Vec<MergeReport> },

    #[serde(rename = "trim-metadata")]
    TrimMetadata { targets: Vec<TrimOutcome> },

    #[serde(rename = "backfill-receipts")]
    BackfillReceipts {
        record: PathBuf,
        #[serde(flatten)]
        report: BackfillReport,
    },

    #[serde(rename = "coverage-summary")]
    CoverageSummary {
        summary_path: PathBuf,
        #[serde(flatten)]
        summary: CoverageSummary,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config;
    let result = match cli.command {
        Commands::Flatten {
            project_root,
            output_dir,
            mock_marker,
            json,
        } => load_config(&project_root, config_path.as_deref())
            .and_then(|config| run_flatten(config, output_dir, mock_marker, json)),
        Commands::TrimMetadata {
            project_root,
            targets,
            json,
        } => load_config(&project_root, config_path.as_deref())
            .and_then(|config| run_trim_metadata(config, targets, json)),
        Commands::BackfillReceipts {
            project_root,
            rpc,
            chain_id,
            script,
            json,
        } => load_config(&project_root, config_path.as_deref())
            .and_then(|config| run_backfill(config, rpc, chain_id, script, json)),
        Commands::CoverageSummary {
            project_root,
            lcov,
            output,
            json,
        } => load_config(&project_root, config_path.as_deref())
            .and_then(|config| run_coverage(config, lcov, output, json)),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            output_error(e);
            std::process::exit(1);
        }
    }
}

/// Loads the project config. An explicitly named file must exist.
fn load_config(project_root: &Path, explicit: Option<&Path>) -> Result<ProjectConfig> {
    let path = match explicit {
        Some(path) if !path.exists() => {
            return Err(eyre::eyre!("Config file not found: {}", path.display()));
        }
        Some(path) => path.to_path_buf(),
        None => project_root.join(CONFIG_FILE_NAME),
    };
    ProjectConfig::load(&path, project_root).context("Invalid configuration")
}

fn print_json(data: SuccessData) -> Result<()> {
    let output = Output::Success { data };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

/// Splits job outcomes into written artifacts and failure messages
fn split_outcomes(outcomes: Vec<JobOutcome>) -> (Vec<MergeReport>, Vec<String>) {
    let mut artifacts = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(report) => artifacts.push(report),
            Err(e) => failures.push(format!("{} job: {:#}", outcome.kind, e)),
        }
    }
    (artifacts, failures)
}

/// Fails when any job failed. The success document is only printed when
/// every artifact was written.
fn run_flatten(
    mut config: ProjectConfig,
    output_dir: Option<PathBuf>,
    mock_marker: Option<String>,
    json: bool,
) -> Result<bool> {
    if let Some(dir) = output_dir {
        config.flatten.output_dir = dir;
    }
    if let Some(marker) = mock_marker {
        config.flatten.mock_marker = marker;
    }
    config.flatten.validate()?;

    let (artifacts, failures) = split_outcomes(flatten_project(&config.flatten));

    if !json {
        for report in &artifacts {
            println!(
                "✅ Flattened {} files into {}",
                report.file_count,
                report.output_path.display()
            );
            println!("   - {} bytes, sha256 {}", report.bytes, report.sha256);
        }
    }

    if !failures.is_empty() {
        return Err(eyre::eyre!("Flatten failed: {}", failures.join("; ")));
    }
    if json {
        print_json(SuccessData::Flatten { artifacts })?;
    }
    Ok(true)
}

fn run_trim_metadata(mut config: ProjectConfig, targets: Vec<String>, json: bool) -> Result<bool> {
    if !targets.is_empty() {
        config.metadata.targets = targets;
    }

    let outcomes = trim_targets(config.project_root(), &config.metadata)?;

    if json {
        print_json(SuccessData::TrimMetadata { targets: outcomes })?;
    } else {
        for outcome in &outcomes {
            match outcome {
                TrimOutcome::Trimmed { path, size } => {
                    println!("✅ {} ({} bytes)", path.display(), size)
                }
                TrimOutcome::Skipped { path, reason } => {
                    println!("⚠️  Skipped {} ({:?})", path.display(), reason)
                }
            }
        }
    }
    Ok(true)
}

/// Returns false when any receipt request was rejected
fn run_backfill(
    mut config: ProjectConfig,
    rpc: Option<String>,
    chain_id: Option<u64>,
    script: Option<String>,
    json: bool,
) -> Result<bool> {
    if let Some(script) = script {
        config.backfill.script_name = script;
    }
    let rpc = rpc
        .or_else(|| config.backfill.rpc_url.clone())
        .ok_or_else(|| eyre::eyre!("No RPC endpoint: pass --rpc or set RPC"))?;
    let chain_id = chain_id
        .or(config.backfill.chain_id)
        .ok_or_else(|| eyre::eyre!("No chain ID: pass --chain-id or set NETWORK_ID"))?;

    let record = config.backfill.record_path(config.project_root(), chain_id);
    let transport = HttpTransport::new(&rpc)?;
    tracing::debug!("Using RPC endpoint {}", transport.endpoint());

    let report = backfill_file(&record, &transport)?;
    let complete = report.is_complete();

    if json {
        print_json(SuccessData::BackfillReceipts { record, report })?;
    } else {
        println!("📄 Broadcast record: {}", record.display());
        println!("   - filled: {:?}", report.filled);
        println!("   - pending: {:?}", report.pending);
        for failed in &report.failed {
            println!("❌ Transaction {} ({}): {}", failed.index, failed.hash, failed.error);
        }
    }
    Ok(complete)
}

fn run_coverage(
    mut config: ProjectConfig,
    lcov: Option<PathBuf>,
    output: Option<PathBuf>,
    json: bool,
) -> Result<bool> {
    if let Some(lcov) = lcov {
        config.coverage.lcov_path = lcov;
    }
    if let Some(output) = output {
        config.coverage.summary_path = output;
    }

    let root = config.project_root();
    let summary_path = config.coverage.summary_file(root);
    let summary = write_summary(&config.coverage.lcov_file(root), &summary_path)?;

    if json {
        print_json(SuccessData::CoverageSummary {
            summary_path,
            summary,
        })?;
    } else {
        let lines = &summary.total.lines;
        println!("📁 Summary: {}", summary_path.display());
        match lines.pct {
            Some(pct) => println!("   - lines: {}/{} ({}%)", lines.covered, lines.total, pct),
            None => println!("   - lines: no coverable lines"),
        }
    }
    Ok(true)
}

fn output_error(error: eyre::Report) {
    let message = format!("{:#}", error);
    let error_type = if message.contains("Flatten failed") {
        "flatten_failed"
    } else if message.contains("Invalid configuration") || message.contains("Config file") {
        "invalid_config"
    } else if message.contains("No RPC endpoint") || message.contains("No chain ID") {
        "missing_argument"
    } else if message.contains("Failed to read") || message.contains("Failed to write") {
        "io_error"
    } else if message.contains("Failed to parse") {
        "invalid_json"
    } else {
        "unknown_error"
    };

    let output = Output::Error {
        error_type: error_type.to_string(),
        message,
    };

    match serde_json::to_string(&output) {
        Ok(json) => eprintln!("{}", json),
        Err(_) => eprintln!("{:#}", error),
    }
}
