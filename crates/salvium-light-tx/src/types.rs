//! Typed transaction model.
//!
//! Inputs, outputs (as a tagged variant per target kind), the Salvium prefix
//! extensions, and the RingCT signature block. Byte arrays everywhere; hex
//! only at the API edge.

use salvium_light_types::{AssetType, RctType, TxType};

/// Wire tags.
pub mod wire {
    pub const TXIN_GEN: u8 = 0xff;
    pub const TXIN_KEY: u8 = 0x02;
    pub const TXOUT_KEY: u8 = 0x02;
    pub const TXOUT_TAGGED_KEY: u8 = 0x03;
    pub const TXOUT_CARROT_V1: u8 = 0x04;
    /// tx_extra tag for the transaction public key.
    pub const EXTRA_TX_PUBKEY: u8 = 0x01;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxInput {
    /// Coinbase input.
    Gen { height: u64 },
    Key {
        amount: u64,
        asset_type: AssetType,
        /// Relative offsets into the global output set.
        key_offsets: Vec<u64>,
        key_image: [u8; 32],
    },
}

/// Output target, one variant per generation of the format. The parser picks
/// the variant from the output's wire tag and view-tag fields rather than
/// sniffing optional keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutputTarget {
    Key {
        key: [u8; 32],
        asset_type: AssetType,
        unlock_time: u64,
    },
    TaggedKey {
        key: [u8; 32],
        asset_type: AssetType,
        unlock_time: u64,
        view_tag: u8,
    },
    CarrotV1 {
        key: [u8; 32],
        asset_type: AssetType,
        view_tag: [u8; 3],
        encrypted_janus_anchor: [u8; 16],
    },
}

impl TxOutputTarget {
    pub fn key(&self) -> &[u8; 32] {
        match self {
            Self::Key { key, .. } | Self::TaggedKey { key, .. } | Self::CarrotV1 { key, .. } => key,
        }
    }

    pub fn asset_type(&self) -> AssetType {
        match self {
            Self::Key { asset_type, .. }
            | Self::TaggedKey { asset_type, .. }
            | Self::CarrotV1 { asset_type, .. } => *asset_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    /// Cleartext amount; 0 once amounts are committed.
    pub amount: u64,
    pub target: TxOutputTarget,
}

/// CARROT-era stake/return payload carried in the prefix of v4 STAKE
/// transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolTxData {
    pub version: u64,
    pub return_address: [u8; 32],
    pub return_pubkey: [u8; 32],
    pub return_view_tag: [u8; 3],
    pub return_anchor_enc: [u8; 16],
}

#[derive(Debug, Clone)]
pub struct TxPrefix {
    pub version: u8,
    pub unlock_time: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub extra: Vec<u8>,

    // Salvium extensions.
    pub tx_type: TxType,
    pub amount_burnt: u64,
    /// Legacy (v2/v3 STAKE) one-shot return address.
    pub return_address: Option<[u8; 32]>,
    pub return_pubkey: Option<[u8; 32]>,
    /// v3+ TRANSFER: one return address per output, plus the change mask.
    pub return_address_list: Option<Vec<[u8; 32]>>,
    pub return_address_change_mask: Option<Vec<u8>>,
    /// v4 STAKE return enote.
    pub protocol_tx_data: Option<ProtocolTxData>,
    pub source_asset_type: AssetType,
    pub destination_asset_type: AssetType,
    pub amount_slippage_limit: u64,
}

/// Per-output encrypted amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdhInfo {
    pub amount: [u8; 8],
}

#[derive(Debug, Clone)]
pub struct ClsagData {
    pub s: Vec<[u8; 32]>,
    pub c1: [u8; 32],
    pub d: [u8; 32],
}

#[derive(Debug, Clone)]
pub struct TclsagData {
    pub sx: Vec<[u8; 32]>,
    pub sy: Vec<[u8; 32]>,
    pub c1: [u8; 32],
    pub d: [u8; 32],
}

/// Discrete-log proof over the blinding-factor difference (zeroed when the
/// transaction balances exactly).
#[derive(Debug, Clone, Copy)]
pub struct ZkProof {
    pub r: [u8; 32],
    pub z1: [u8; 32],
    pub z2: [u8; 32],
}

impl ZkProof {
    pub fn zero() -> Self {
        Self {
            r: [0; 32],
            z1: [0; 32],
            z2: [0; 32],
        }
    }
}

/// `salvium_data_t` for RCT types 8/9.
#[derive(Debug, Clone)]
pub struct SalviumData {
    /// 0 = SalviumZero, 2 = SalviumOne.
    pub data_type: u64,
    pub pr_proof: ZkProof,
    pub sa_proof: ZkProof,
}

#[derive(Debug, Clone)]
pub struct BpPlusData {
    pub a: [u8; 32],
    pub a1: [u8; 32],
    pub b: [u8; 32],
    pub r1: [u8; 32],
    pub s1: [u8; 32],
    pub d1: [u8; 32],
    pub l: Vec<[u8; 32]>,
    pub r: Vec<[u8; 32]>,
}

#[derive(Debug, Clone)]
pub struct RctSignatures {
    pub rct_type: RctType,
    pub txn_fee: u64,
    pub ecdh_info: Vec<EcdhInfo>,
    pub out_pk: Vec<[u8; 32]>,
    /// Commitment to the blinding difference (identity when balanced).
    pub p_r: [u8; 32],
    pub salvium_data: Option<SalviumData>,
    pub bulletproof_plus: Vec<BpPlusData>,
    pub clsags: Vec<ClsagData>,
    pub tclsags: Vec<TclsagData>,
    pub pseudo_outs: Vec<[u8; 32]>,
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub prefix: TxPrefix,
    pub rct: Option<RctSignatures>,
}

impl Transaction {
    /// `keccak256(serialized prefix)`.
    pub fn tx_hash(&self) -> [u8; 32] {
        salvium_light_crypto::keccak256(&crate::serialize::serialize_prefix(&self.prefix))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        crate::serialize::serialize_transaction(self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn key_images(&self) -> Vec<[u8; 32]> {
        self.prefix
            .inputs
            .iter()
            .filter_map(|i| match i {
                TxInput::Key { key_image, .. } => Some(*key_image),
                TxInput::Gen { .. } => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_target_accessors() {
        let target = TxOutputTarget::CarrotV1 {
            key: [7; 32],
            asset_type: AssetType::Sal1,
            view_tag: [1, 2, 3],
            encrypted_janus_anchor: [0; 16],
        };
        assert_eq!(target.key(), &[7; 32]);
        assert_eq!(target.asset_type(), AssetType::Sal1);
    }

    #[test]
    fn key_images_skip_gen_inputs() {
        let prefix = TxPrefix {
            version: 2,
            unlock_time: 0,
            inputs: vec![
                TxInput::Gen { height: 5 },
                TxInput::Key {
                    amount: 0,
                    asset_type: AssetType::Sal,
                    key_offsets: vec![1, 2],
                    key_image: [9; 32],
                },
            ],
            outputs: vec![],
            extra: vec![],
            tx_type: TxType::Transfer,
            amount_burnt: 0,
            return_address: None,
            return_pubkey: None,
            return_address_list: None,
            return_address_change_mask: None,
            protocol_tx_data: None,
            source_asset_type: AssetType::Sal,
            destination_asset_type: AssetType::Sal,
            amount_slippage_limit: 0,
        };
        let tx = Transaction { prefix, rct: None };
        assert_eq!(tx.key_images(), vec![[9; 32]]);
    }
}
