//! Solidity source flattening library
//!
//! Walks a contract project, strips per-file boilerplate and merges the
//! sources into one production artifact and one test artifact. Also carries
//! the small post-processing steps that run next to flattening: compiler
//! metadata trimming, broadcast receipt backfilling and coverage summaries.
pub mod broadcast;
pub mod config;
pub mod coverage;
pub mod discovery;
pub mod imports;
pub mod merge;
pub mod metadata;
pub mod normalize;
pub mod pragma;
pub mod syntax;
mod utils;

pub use broadcast::{
    backfill_file, backfill_record, BackfillReport, FailedReceipt, HttpTransport, RpcError,
    RpcTransport,
};
pub use config::{
    BackfillConfig, CoverageConfig, FlattenConfig, MetadataTrimConfig, ProjectConfig,
    CONFIG_FILE_NAME,
};
pub use coverage::{write_summary, CoverageSummary};
pub use discovery::SourceDiscovery;
pub use imports::dedupe;
pub use merge::{flatten_project, merge_job, JobKind, JobOutcome, MergeReport, MergedArtifact};
pub use metadata::{trim_targets, SkipReason, TrimOutcome};
pub use normalize::normalize;
pub use pragma::PragmaState;
pub use utils::hash_bytes;
