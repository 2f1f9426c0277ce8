//! HTTP-backed [`Node`] implementation.
//!
//! Thin typed wrappers over the daemon's JSON-RPC and legacy endpoints.
//! Binary (`.bin`) endpoints are avoided: global output indices come from
//! `/get_transactions` with `decode_as_json`, which carries them alongside
//! the decoded body.

use log::trace;
use serde_json::{json, Value};

use crate::client::{require_ok, RpcClient, RpcConfig};
use crate::error::RpcError;
use crate::node::{
    Block, BlockHeader, Node, NodeInfo, OutputIndexes, OutputInfo, OutputRef, SendRawTxResult,
    TransactionEntry,
};

pub struct HttpNode {
    client: RpcClient,
}

impl HttpNode {
    pub fn new(url: &str) -> Result<Self, RpcError> {
        Ok(Self {
            client: RpcClient::new(url)?,
        })
    }

    pub fn with_config(config: RpcConfig) -> Result<Self, RpcError> {
        Ok(Self {
            client: RpcClient::with_config(config)?,
        })
    }

    pub fn url(&self) -> &str {
        self.client.url()
    }

    fn decode<T: serde::de::DeserializeOwned>(
        method: &str,
        value: Value,
    ) -> Result<T, RpcError> {
        serde_json::from_value(value).map_err(|e| RpcError::Json {
            context: method.to_string(),
            source: e,
        })
    }

    async fn fetch_transactions(
        &self,
        hashes: &[String],
    ) -> Result<Vec<Value>, RpcError> {
        let payload = self
            .client
            .post(
                "/get_transactions",
                json!({ "txs_hashes": hashes, "decode_as_json": true }),
            )
            .await?;
        require_ok("get_transactions", &payload)?;
        Ok(payload
            .get("txs")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

fn entry_from_tx_value(entry: &Value) -> TransactionEntry {
    let tx_hash = entry
        .get("tx_hash")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    // `as_json` is a JSON document embedded as a string.
    let as_json = entry
        .get("as_json")
        .and_then(Value::as_str)
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or(Value::Null);
    TransactionEntry {
        tx_hash,
        as_json,
        block_height: entry.get("block_height").and_then(Value::as_u64),
        in_pool: entry.get("in_pool").and_then(Value::as_bool).unwrap_or(false),
    }
}

impl Node for HttpNode {
    async fn get_info(&self) -> Result<NodeInfo, RpcError> {
        let payload = self.client.post("/get_info", json!({})).await?;
        require_ok("get_info", &payload)?;
        Self::decode("get_info", payload)
    }

    async fn get_block(&self, height: u64) -> Result<Block, RpcError> {
        let result = self
            .client
            .call("get_block", json!({ "height": height, "decode_as_json": true }))
            .await?;
        require_ok("get_block", &result)?;

        let header: BlockHeader = Self::decode(
            "get_block.block_header",
            result.get("block_header").cloned().unwrap_or(Value::Null),
        )?;

        // The decoded block body rides along as a JSON string.
        let body: Value = result
            .get("json")
            .and_then(Value::as_str)
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or(Value::Null);

        let tx_hashes: Vec<String> = body
            .get("tx_hashes")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        trace!("get_block({}): {} txs", height, tx_hashes.len());
        Ok(Block {
            header,
            miner_tx: body.get("miner_tx").cloned().filter(|v| !v.is_null()),
            miner_tx_hash: result
                .get("miner_tx_hash")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            protocol_tx: body.get("protocol_tx").cloned().filter(|v| !v.is_null()),
            tx_hashes,
        })
    }

    async fn get_block_headers_range(
        &self,
        lo: u64,
        hi: u64,
    ) -> Result<Vec<BlockHeader>, RpcError> {
        let result = self
            .client
            .call(
                "get_block_headers_range",
                json!({ "start_height": lo, "end_height": hi }),
            )
            .await?;
        require_ok("get_block_headers_range", &result)?;
        Self::decode(
            "get_block_headers_range",
            result.get("headers").cloned().unwrap_or(Value::Array(vec![])),
        )
    }

    async fn get_transactions(
        &self,
        hashes: &[String],
    ) -> Result<Vec<TransactionEntry>, RpcError> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let txs = self.fetch_transactions(hashes).await?;
        Ok(txs.iter().map(entry_from_tx_value).collect())
    }

    async fn get_outs(&self, refs: &[OutputRef]) -> Result<Vec<OutputInfo>, RpcError> {
        let payload = self
            .client
            .post("/get_outs", json!({ "outputs": refs, "get_txid": true }))
            .await?;
        require_ok("get_outs", &payload)?;
        Self::decode(
            "get_outs",
            payload.get("outs").cloned().unwrap_or(Value::Array(vec![])),
        )
    }

    async fn get_output_distribution(
        &self,
        asset: &str,
        from_height: u64,
        to_height: Option<u64>,
    ) -> Result<Vec<u64>, RpcError> {
        let mut params = json!({
            "amounts": [0u64],
            "from_height": from_height,
            "cumulative": true,
            "asset_type": asset,
        });
        if let Some(hi) = to_height {
            params["to_height"] = json!(hi);
        }
        let result = self.client.call("get_output_distribution", params).await?;
        require_ok("get_output_distribution", &result)?;

        let distribution = result
            .get("distributions")
            .and_then(Value::as_array)
            .and_then(|d| d.first())
            .and_then(|d| d.get("distribution"))
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_default();
        Ok(distribution)
    }

    async fn get_output_indexes(&self, tx_hash: &str) -> Result<OutputIndexes, RpcError> {
        let txs = self.fetch_transactions(&[tx_hash.to_string()]).await?;
        let entry = txs
            .first()
            .ok_or_else(|| RpcError::NoResult("get_output_indexes".to_string()))?;

        let read_indices = |key: &str| -> Vec<u64> {
            entry
                .get(key)
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_u64).collect())
                .unwrap_or_default()
        };
        Ok(OutputIndexes {
            o_indexes: read_indices("output_indices"),
            asset_type_output_indices: read_indices("asset_output_indices"),
        })
    }

    async fn get_tx_pool(&self) -> Result<Vec<TransactionEntry>, RpcError> {
        let payload = self.client.post("/get_transaction_pool", json!({})).await?;
        require_ok("get_transaction_pool", &payload)?;
        let txs = payload
            .get("transactions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(txs
            .iter()
            .map(|entry| TransactionEntry {
                tx_hash: entry
                    .get("id_hash")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                as_json: entry
                    .get("tx_json")
                    .and_then(Value::as_str)
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or(Value::Null),
                block_height: None,
                in_pool: true,
            })
            .collect())
    }

    async fn send_raw_transaction(
        &self,
        tx_hex: &str,
        source_asset: &str,
    ) -> Result<SendRawTxResult, RpcError> {
        let payload = self
            .client
            .post(
                "/send_raw_transaction",
                json!({
                    "tx_as_hex": tx_hex,
                    "source_asset_type": source_asset,
                    "do_not_relay": false,
                }),
            )
            .await?;
        // Deliberately no require_ok: the caller inspects status and reason.
        Self::decode("send_raw_transaction", payload)
    }

    async fn is_key_image_spent(&self, key_images: &[String]) -> Result<Vec<u8>, RpcError> {
        let payload = self
            .client
            .post("/is_key_image_spent", json!({ "key_images": key_images }))
            .await?;
        require_ok("is_key_image_spent", &payload)?;
        Ok(payload
            .get("spent_status")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_u64).map(|v| v as u8).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_entry_parses_embedded_json() {
        let entry = json!({
            "tx_hash": "ab".repeat(32),
            "as_json": "{\"version\":4}",
            "block_height": 77,
            "in_pool": false
        });
        let parsed = entry_from_tx_value(&entry);
        assert_eq!(parsed.block_height, Some(77));
        assert_eq!(parsed.as_json.get("version").and_then(Value::as_u64), Some(4));
    }

    #[test]
    fn tx_entry_tolerates_missing_fields() {
        let parsed = entry_from_tx_value(&json!({}));
        assert!(parsed.tx_hash.is_empty());
        assert!(parsed.as_json.is_null());
        assert_eq!(parsed.block_height, None);
    }
}
