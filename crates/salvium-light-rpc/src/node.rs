//! The abstract remote-node surface.
//!
//! Everything the wallet core needs from a daemon, independent of the
//! transport. Responses are decoded JSON: transaction bodies stay as
//! `serde_json::Value` and are interpreted by the scanner's typed parser.
//! Every call returns `Result`; a payload whose `status` is not `OK` is an
//! error even when the transport succeeded.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

/// `/get_info` subset the wallet consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeInfo {
    pub height: u64,
    #[serde(default)]
    pub top_block_hash: String,
    #[serde(default)]
    pub target_height: u64,
    #[serde(default)]
    pub synchronized: bool,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "OK".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub hash: String,
    #[serde(default)]
    pub prev_hash: String,
    pub timestamp: u64,
    #[serde(default)]
    pub reward: u64,
    #[serde(default)]
    pub major_version: u8,
    #[serde(default)]
    pub minor_version: u8,
    #[serde(default)]
    pub difficulty: u64,
    #[serde(default)]
    pub cumulative_difficulty: u64,
    #[serde(default)]
    pub block_weight: u64,
}

/// A block with its transactions' hashes and the decoded coinbase bodies.
#[derive(Debug, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub miner_tx: Option<Value>,
    pub miner_tx_hash: String,
    /// The per-block protocol transaction (yield/return payouts), when present.
    pub protocol_tx: Option<Value>,
    pub tx_hashes: Vec<String>,
}

/// One fetched transaction: its hash and decoded JSON body.
#[derive(Debug, Clone)]
pub struct TransactionEntry {
    pub tx_hash: String,
    pub as_json: Value,
    pub block_height: Option<u64>,
    pub in_pool: bool,
}

/// A `get_outs` request entry (amount is 0 for RCT outputs).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OutputRef {
    pub amount: u64,
    pub index: u64,
}

/// A ring-member candidate returned by `get_outs`.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputInfo {
    pub key: String,
    pub mask: String,
    pub unlocked: bool,
    pub height: u64,
    #[serde(default)]
    pub txid: Option<String>,
}

/// Per-transaction global output indices.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputIndexes {
    #[serde(default)]
    pub o_indexes: Vec<u64>,
    /// Within-asset indices, populated from the CARROT fork on.
    #[serde(default)]
    pub asset_type_output_indices: Vec<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendRawTxResult {
    pub status: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub double_spend: bool,
    #[serde(default)]
    pub fee_too_low: bool,
    #[serde(default)]
    pub too_big: bool,
}

impl SendRawTxResult {
    pub fn accepted(&self) -> bool {
        self.status == "OK"
    }
}

/// Abstract node. Implemented by the HTTP client behind the `transport`
/// feature and by in-memory mocks in tests.
#[allow(async_fn_in_trait)]
pub trait Node {
    async fn get_info(&self) -> Result<NodeInfo, RpcError>;

    async fn get_block(&self, height: u64) -> Result<Block, RpcError>;

    /// Inclusive header range `[lo, hi]`.
    async fn get_block_headers_range(
        &self,
        lo: u64,
        hi: u64,
    ) -> Result<Vec<BlockHeader>, RpcError>;

    async fn get_transactions(
        &self,
        hashes: &[String],
    ) -> Result<Vec<TransactionEntry>, RpcError>;

    async fn get_outs(&self, refs: &[OutputRef]) -> Result<Vec<OutputInfo>, RpcError>;

    /// Cumulative per-height output counts for the asset.
    async fn get_output_distribution(
        &self,
        asset: &str,
        from_height: u64,
        to_height: Option<u64>,
    ) -> Result<Vec<u64>, RpcError>;

    async fn get_output_indexes(&self, tx_hash: &str) -> Result<OutputIndexes, RpcError>;

    async fn get_tx_pool(&self) -> Result<Vec<TransactionEntry>, RpcError>;

    async fn send_raw_transaction(
        &self,
        tx_hex: &str,
        source_asset: &str,
    ) -> Result<SendRawTxResult, RpcError>;

    /// One entry per key image: 0 unspent, 1 spent on chain, 2 in pool.
    async fn is_key_image_spent(&self, key_images: &[String]) -> Result<Vec<u8>, RpcError>;
}
