//! Stored record shapes.
//!
//! Keys live as raw bytes here; hex only appears at API boundaries.

use salvium_light_types::AssetType;
use serde::{Deserialize, Serialize};

/// One owned on-chain output. Created by the scanner, mutated only through
/// the store's spend/unspend/freeze primitives, deleted only by reorg
/// rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Unique index of the record.
    pub key_image: [u8; 32],
    pub tx_hash: [u8; 32],
    /// Index within the transaction's outputs.
    pub output_index: u32,
    /// Transaction public key (legacy derivation input).
    pub tx_pub_key: [u8; 32],
    /// The one-time address.
    pub output_public_key: [u8; 32],
    pub amount: u64,
    /// Commitment blinding factor; scalar 1 for coinbase.
    pub mask: [u8; 32],
    /// Pedersen commitment; None for coinbase (derivable).
    pub commitment: Option<[u8; 32]>,
    /// (major, minor); (0, 0) is the main address.
    pub subaddress_index: (u32, u32),
    pub is_carrot: bool,
    /// Contextualized sender-receiver secret; required to spend a CARROT
    /// output.
    pub carrot_shared_secret: Option<[u8; 32]>,
    pub carrot_encrypted_anchor: Option<[u8; 16]>,
    pub asset_type: AssetType,
    pub block_height: u64,
    /// Spendable once the chain tip reaches this height.
    pub unlock_height: u64,
    /// Within-asset global position; resolved lazily from the node.
    pub global_index: Option<u64>,
    pub is_spent: bool,
    pub spent_tx_hash: Option<[u8; 32]>,
    pub spent_height: Option<u64>,
    pub is_frozen: bool,
}

impl OutputRecord {
    /// Unspent, unfrozen, matured, and (for CARROT) carrying the material
    /// needed to sign.
    pub fn is_spendable_at(&self, tip_height: u64) -> bool {
        if self.is_spent || self.is_frozen || self.unlock_height > tip_height {
            return false;
        }
        if self.is_carrot && (self.carrot_shared_secret.is_none() || self.commitment.is_none()) {
            return false;
        }
        true
    }

    /// `is_spent` implies both spent fields are populated.
    pub fn spent_state_consistent(&self) -> bool {
        if self.is_spent {
            self.spent_tx_hash.is_some() && self.spent_height.is_some()
        } else {
            self.spent_tx_hash.is_none() && self.spent_height.is_none()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Incoming,
    Outgoing,
    /// Self-transfer: we funded it and received outputs back.
    Both,
}

/// A wallet-relevant transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub tx_hash: [u8; 32],
    pub block_height: u64,
    pub direction: Direction,
    pub amount: u64,
    pub fee: u64,
    pub timestamp: u64,
}

/// Query shape for [`crate::WalletStore::get_outputs`].
#[derive(Debug, Clone, Default)]
pub struct OutputFilter {
    pub unspent_only: bool,
    pub include_frozen: bool,
    pub asset_type: Option<AssetType>,
    /// Only outputs with `unlock_height <= this`.
    pub spendable_at: Option<u64>,
    pub subaddress_major: Option<u32>,
}

impl OutputFilter {
    /// The builder's standard query: unspent, unfrozen, matured outputs of
    /// one asset.
    pub fn spendable(asset_type: AssetType, tip_height: u64) -> Self {
        Self {
            unspent_only: true,
            include_frozen: false,
            asset_type: Some(asset_type),
            spendable_at: Some(tip_height),
            subaddress_major: None,
        }
    }

    pub fn matches(&self, output: &OutputRecord) -> bool {
        if self.unspent_only && output.is_spent {
            return false;
        }
        if !self.include_frozen && output.is_frozen {
            return false;
        }
        if let Some(asset) = self.asset_type {
            if !AssetType::equivalent(asset, output.asset_type) {
                return false;
            }
        }
        if let Some(tip) = self.spendable_at {
            if output.unlock_height > tip {
                return false;
            }
        }
        if let Some(major) = self.subaddress_major {
            if output.subaddress_index.0 != major {
                return false;
            }
        }
        true
    }
}
