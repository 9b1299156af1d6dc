//! Block sources
//!
//! Supplies blocks in height order to the ingest loop. Two sources exist:
//! a newline-delimited JSON file of [`Block`]s, and an HTTP client for
//! Substrate API Sidecar (`/blocks/head`, `/blocks/{n}`).

use crate::types::{Block, CallArg, EventRecord, Extrinsic, MethodId, Phase};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Source of finalized blocks.
#[allow(async_fn_in_trait)]
pub trait BlockSource {
    /// Height of the newest available block.
    async fn head_height(&self) -> Result<u64>;

    /// Fetch the block at `height`.
    async fn get_block(&self, height: u64) -> Result<Block>;
}

/// Blocks read from a newline-delimited JSON file, one block per line.
pub struct FileBlockSource {
    blocks: BTreeMap<u64, Block>,
}

impl FileBlockSource {
    /// Load all blocks from `path`. Empty lines are ignored.
    pub fn open(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read block file: {:?}", path))?;

        let mut blocks = BTreeMap::new();
        for (line_num, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let block: Block = serde_json::from_str(line)
                .with_context(|| format!("Invalid block on line {}", line_num + 1))?;
            if blocks.insert(block.height, block).is_some() {
                anyhow::bail!("Duplicate block height on line {}", line_num + 1);
            }
        }

        if blocks.is_empty() {
            anyhow::bail!("Block file is empty (no blocks found)");
        }

        Ok(Self { blocks })
    }

    /// Height of the first block in the file.
    pub fn first_height(&self) -> Option<u64> {
        self.blocks.keys().next().copied()
    }
}

impl BlockSource for FileBlockSource {
    async fn head_height(&self) -> Result<u64> {
        self.blocks
            .keys()
            .next_back()
            .copied()
            .context("Block file is empty")
    }

    async fn get_block(&self, height: u64) -> Result<Block> {
        self.blocks
            .get(&height)
            .cloned()
            .with_context(|| format!("Block {} not in file", height))
    }
}

/// HTTP client for Substrate API Sidecar.
pub struct SidecarClient {
    client: reqwest::Client,
    url: String,
    timestamp_call: MethodId,
}

impl SidecarClient {
    /// Create a new client for a sidecar at `url` (e.g. `http://127.0.0.1:8080`).
    pub fn new(url: String, timestamp_call: MethodId) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
            timestamp_call,
        }
    }

    /// GET a sidecar endpoint and deserialize the JSON body.
    async fn get(&self, path: &str) -> Result<SidecarBlock> {
        let url = format!("{}{}", self.url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Sidecar error {} for {}: {}", status, url, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }
}

impl BlockSource for SidecarClient {
    async fn head_height(&self) -> Result<u64> {
        let head = self.get("/blocks/head?finalized=true").await?;
        head.number.parse().context("Failed to parse head block number")
    }

    async fn get_block(&self, height: u64) -> Result<Block> {
        let block = self.get(&format!("/blocks/{}", height)).await?;
        block
            .into_block(&self.timestamp_call)
            .with_context(|| format!("Failed to convert sidecar block {}", height))
    }
}

// Sidecar response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SidecarBlock {
    /// Block number as a decimal string
    number: String,
    #[serde(default)]
    extrinsics: Vec<SidecarExtrinsic>,
    #[serde(default)]
    on_initialize: Option<SidecarHook>,
    #[serde(default)]
    on_finalize: Option<SidecarHook>,
}

#[derive(Debug, Deserialize)]
struct SidecarHook {
    #[serde(default)]
    events: Vec<SidecarEvent>,
}

#[derive(Debug, Deserialize)]
struct SidecarMethod {
    pallet: String,
    method: String,
}

impl From<SidecarMethod> for MethodId {
    fn from(m: SidecarMethod) -> Self {
        MethodId::new(m.pallet, m.method)
    }
}

#[derive(Debug, Deserialize)]
struct SidecarExtrinsic {
    method: SidecarMethod,
    #[serde(default)]
    signature: Option<SidecarSignature>,
    #[serde(default)]
    args: serde_json::Map<String, Value>,
    #[serde(default)]
    events: Vec<SidecarEvent>,
}

#[derive(Debug, Deserialize)]
struct SidecarSignature {
    signer: Value,
}

#[derive(Debug, Deserialize)]
struct SidecarEvent {
    method: SidecarMethod,
    #[serde(default)]
    data: Vec<Value>,
}

impl SidecarEvent {
    fn into_record(self, phase: Phase) -> EventRecord {
        EventRecord {
            phase,
            event: self.method.into(),
            data: self.data,
        }
    }
}

impl SidecarBlock {
    /// Flatten sidecar's per-extrinsic events into phase-tagged block events.
    ///
    /// The block timestamp is taken from the `now` argument of the
    /// timestamp inherent.
    fn into_block(self, timestamp_call: &MethodId) -> Result<Block> {
        let height: u64 = self.number.parse().context("Invalid block number")?;

        let timestamp = self
            .extrinsics
            .iter()
            .find(|ext| ext.method.pallet == timestamp_call.section && ext.method.method == timestamp_call.method)
            .and_then(|ext| ext.args.get("now"))
            .and_then(value_as_u64)
            .context("Block has no timestamp inherent")?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp as i64)
            .context("Timestamp out of range")?;

        let mut events = Vec::new();
        if let Some(hook) = self.on_initialize {
            events.extend(hook.events.into_iter().map(|e| e.into_record(Phase::Initialization)));
        }

        let mut extrinsics = Vec::with_capacity(self.extrinsics.len());
        for (index, ext) in self.extrinsics.into_iter().enumerate() {
            let phase = Phase::ApplyExtrinsic(index as u32);
            events.extend(ext.events.into_iter().map(|e| e.into_record(phase)));

            let signer = ext.signature.and_then(|sig| match sig.signer {
                Value::String(s) => Some(s),
                Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_string),
                _ => None,
            });
            extrinsics.push(Extrinsic {
                method: ext.method.into(),
                signer,
                args: ext
                    .args
                    .into_iter()
                    .map(|(name, value)| CallArg { name, value })
                    .collect(),
            });
        }

        if let Some(hook) = self.on_finalize {
            events.extend(hook.events.into_iter().map(|e| e.into_record(Phase::Finalization)));
        }

        Ok(Block {
            height,
            timestamp,
            extrinsics,
            events,
        })
    }
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_file_source() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"height": 2, "timestamp": 1704067200000}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"height": 1, "timestamp": 1704067188000}}"#).unwrap();
        file.flush().unwrap();

        let source = FileBlockSource::open(file.path()).unwrap();
        assert_eq!(source.first_height(), Some(1));
        assert_eq!(source.head_height().await.unwrap(), 2);
        assert_eq!(source.get_block(1).await.unwrap().height, 1);
        assert!(source.get_block(3).await.is_err());
    }

    #[test]
    fn test_file_source_rejects_duplicates_and_empty() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"height": 1, "timestamp": 0}}"#).unwrap();
        writeln!(file, r#"{{"height": 1, "timestamp": 0}}"#).unwrap();
        file.flush().unwrap();
        assert!(FileBlockSource::open(file.path()).is_err());

        let empty = NamedTempFile::new().unwrap();
        assert!(FileBlockSource::open(empty.path()).is_err());
    }

    #[test]
    fn test_sidecar_block_conversion() {
        let raw = json!({
            "number": "1234",
            "hash": "0xabc",
            "onInitialize": { "events": [] },
            "extrinsics": [
                {
                    "method": { "pallet": "timestamp", "method": "set" },
                    "signature": null,
                    "args": { "now": "1704067200000" },
                    "events": [
                        { "method": { "pallet": "system", "method": "ExtrinsicSuccess" }, "data": [] }
                    ],
                    "success": true
                },
                {
                    "method": { "pallet": "balances", "method": "transferKeepAlive" },
                    "signature": { "signature": "0x01", "signer": { "id": "A" } },
                    "args": { "dest": { "id": "X" }, "value": "10" },
                    "events": [
                        { "method": { "pallet": "balances", "method": "Deposit" }, "data": ["Pot", "7"] },
                        { "method": { "pallet": "system", "method": "ExtrinsicSuccess" }, "data": [] }
                    ],
                    "success": true
                }
            ],
            "onFinalize": {
                "events": [ { "method": { "pallet": "x", "method": "Y" }, "data": [] } ]
            }
        });

        let sidecar: SidecarBlock = serde_json::from_value(raw).unwrap();
        let block = sidecar.into_block(&MethodId::new("timestamp", "set")).unwrap();

        assert_eq!(block.height, 1234);
        assert_eq!(block.timestamp.timestamp_millis(), 1704067200000);
        assert_eq!(block.extrinsics.len(), 2);
        assert_eq!(block.extrinsics[1].signer.as_deref(), Some("A"));
        assert_eq!(block.extrinsics[1].arg("dest"), Some(&json!({ "id": "X" })));
        assert_eq!(block.events.len(), 4);
        assert!(block.events[0].belongs_to(0));
        assert!(block.events[1].belongs_to(1));
        assert_eq!(block.events[3].phase, Phase::Finalization);
    }

    #[test]
    fn test_sidecar_block_without_timestamp_fails() {
        let raw = json!({ "number": "1", "extrinsics": [] });
        let sidecar: SidecarBlock = serde_json::from_value(raw).unwrap();
        assert!(sidecar.into_block(&MethodId::new("timestamp", "set")).is_err());
    }
}
