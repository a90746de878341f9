//! Receipt backfilling for deployment broadcast records
//!
//! A broadcast record lists the transactions a deployment script sent and
//! the receipts collected for them. When the script exits before every
//! receipt arrives, the missing ones can be fetched afterwards with
//! `eth_getTransactionReceipt`.

use crate::utils;
use eyre::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;

/// Why fetching the receipt of one transaction failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RpcError {
    /// The node answered with a JSON-RPC error object
    #[error("{0}")]
    Rpc(String),

    #[error("Malformed RPC response: {0}")]
    MalformedResponse(String),

    #[error("RPC request failed: {0}")]
    Transport(String),
}

/// Sends one JSON-RPC payload and returns the raw response body
pub trait RpcTransport {
    fn send(&self, payload: &Value) -> Result<String, RpcError>;
}

/// JSON-RPC over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(rpc: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint_url(rpc),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RpcTransport for HttpTransport {
    fn send(&self, payload: &Value) -> Result<String, RpcError> {
        self.client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .and_then(|response| response.text())
            .map_err(|e| RpcError::Transport(e.to_string()))
    }
}

/// Turns an RPC setting into a URL.
///
/// Full `http(s)://` URLs are used as given. A bare `host/path` is served
/// over HTTPS with a trailing slash.
pub fn endpoint_url(rpc: &str) -> String {
    let rpc = rpc.trim();
    if rpc.starts_with("https://") || rpc.starts_with("http://") {
        return rpc.to_string();
    }
    format!("https://{}/", rpc.trim_end_matches('/'))
}

/// `eth_getTransactionReceipt` request for `hash`
pub fn receipt_request(hash: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "eth_getTransactionReceipt",
        "params": [hash],
        "id": 1,
    })
}

/// Interprets a JSON-RPC response body.
///
/// A `null` result means the transaction is still pending and is not an
/// error.
pub fn parse_receipt_response(body: &str) -> Result<Option<Value>, RpcError> {
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| RpcError::MalformedResponse(e.to_string()))?;
    let Value::Object(mut response) = parsed else {
        return Err(RpcError::MalformedResponse(format!("expected an object, got {body}")));
    };

    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(RpcError::Rpc(message));
    }

    match response.remove("result") {
        Some(Value::Null) => Ok(None),
        Some(receipt) => Ok(Some(receipt)),
        None => Err(RpcError::MalformedResponse("missing result".to_string())),
    }
}

/// Fetches the receipt of `hash`, `None` while it is pending
pub fn get_transaction_receipt(
    transport: &dyn RpcTransport,
    hash: &str,
) -> Result<Option<Value>, RpcError> {
    let body = transport.send(&receipt_request(hash))?;
    parse_receipt_response(&body)
}

/// A transaction whose receipt could not be fetched
#[derive(Debug, Clone, Serialize)]
pub struct FailedReceipt {
    pub index: usize,
    pub hash: String,
    pub error: RpcError,
}

/// What a backfill run changed
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillReport {
    /// Indices that received a receipt
    pub filled: Vec<usize>,
    /// Indices whose transaction is still pending
    pub pending: Vec<usize>,
    /// Indices whose request was rejected
    pub failed: Vec<FailedReceipt>,
}

impl BackfillReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fills missing receipts of a broadcast record in memory.
///
/// Each transaction with a hash but no receipt carrying the same
/// `transactionHash` gets its receipt stored at its own index. A rejected
/// request only affects that index.
pub fn backfill_record(record: &mut Value, transport: &dyn RpcTransport) -> Result<BackfillReport> {
    let hashes: Vec<(usize, String)> = record
        .get("transactions")
        .and_then(Value::as_array)
        .ok_or_else(|| eyre::eyre!("Broadcast record has no transactions array"))?
        .iter()
        .enumerate()
        .filter_map(|(index, tx)| {
            tx.get("hash")
                .and_then(Value::as_str)
                .filter(|hash| !hash.is_empty())
                .map(|hash| (index, hash.to_string()))
        })
        .collect();

    let record = record
        .as_object_mut()
        .ok_or_else(|| eyre::eyre!("Broadcast record is not an object"))?;
    let receipts = record
        .entry("receipts")
        .or_insert_with(|| Value::Array(Vec::new()));
    let receipts = receipts
        .as_array_mut()
        .ok_or_else(|| eyre::eyre!("Broadcast receipts is not an array"))?;

    let mut report = BackfillReport::default();
    for (index, hash) in hashes {
        if has_receipt(receipts, &hash) {
            continue;
        }

        match get_transaction_receipt(transport, &hash) {
            Ok(receipt) => {
                if receipt.is_some() {
                    report.filled.push(index);
                } else {
                    tracing::debug!("Transaction {} ({}) is pending", index, hash);
                    report.pending.push(index);
                }
                if receipts.len() <= index {
                    receipts.resize(index + 1, Value::Null);
                }
                receipts[index] = receipt.unwrap_or(Value::Null);
            }
            Err(error) => {
                tracing::warn!(
                    "Failed to fetch receipt for transaction {} ({}): {}",
                    index,
                    hash,
                    error
                );
                report.failed.push(FailedReceipt { index, hash, error });
            }
        }
    }

    Ok(report)
}

fn has_receipt(receipts: &[Value], hash: &str) -> bool {
    receipts
        .iter()
        .any(|r| r.get("transactionHash").and_then(Value::as_str) == Some(hash))
}

/// Backfills the record at `path` and writes it back
pub fn backfill_file(path: &Path, transport: &dyn RpcTransport) -> Result<BackfillReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read broadcast record: {}", path.display()))?;
    let mut record: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse broadcast record: {}", path.display()))?;

    let report = backfill_record(&mut record, transport)?;

    let json = utils::to_json_with_indent(&record, b"  ")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write broadcast record: {}", path.display()))?;

    tracing::info!(
        "Backfilled {} receipts in {} ({} pending, {} failed)",
        report.filled.len(),
        path.display(),
        report.pending.len(),
        report.failed.len()
    );

    Ok(report)
}
