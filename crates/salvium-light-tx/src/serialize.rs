//! Canonical wire encoding.
//!
//! Serializes directly from the typed model: prefix (version, unlock_time,
//! vin, vout, extra, Salvium extensions), RCT base (type, fee, ecdhInfo,
//! outPk, p_r, salvium_data), then the prunable section (BP+, ring
//! signatures, pseudo-outs). Field order follows the reference
//! serializer byte for byte.
//!
//! Reference: salvium/src/cryptonote_basic/cryptonote_format_utils.cpp

use salvium_light_types::{RctType, TxType};

use crate::types::{wire, ProtocolTxData, RctSignatures, Transaction, TxInput, TxOutput, TxOutputTarget, TxPrefix, ZkProof};

pub(crate) fn write_varint(buf: &mut Vec<u8>, mut val: u64) {
    loop {
        let b = (val & 0x7f) as u8;
        val >>= 7;
        if val == 0 {
            buf.push(b);
            return;
        }
        buf.push(b | 0x80);
    }
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_varint(buf, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn write_zk_proof(buf: &mut Vec<u8>, proof: &ZkProof) {
    buf.extend_from_slice(&proof.r);
    buf.extend_from_slice(&proof.z1);
    buf.extend_from_slice(&proof.z2);
}

fn write_input(buf: &mut Vec<u8>, input: &TxInput) {
    match input {
        TxInput::Gen { height } => {
            buf.push(wire::TXIN_GEN);
            write_varint(buf, *height);
        }
        TxInput::Key {
            amount,
            asset_type,
            key_offsets,
            key_image,
        } => {
            buf.push(wire::TXIN_KEY);
            write_varint(buf, *amount);
            write_string(buf, asset_type.as_str());
            write_varint(buf, key_offsets.len() as u64);
            for offset in key_offsets {
                write_varint(buf, *offset);
            }
            buf.extend_from_slice(key_image);
        }
    }
}

fn write_output(buf: &mut Vec<u8>, output: &TxOutput) {
    write_varint(buf, output.amount);
    match &output.target {
        TxOutputTarget::Key {
            key,
            asset_type,
            unlock_time,
        } => {
            buf.push(wire::TXOUT_KEY);
            buf.extend_from_slice(key);
            write_string(buf, asset_type.as_str());
            write_varint(buf, *unlock_time);
        }
        TxOutputTarget::TaggedKey {
            key,
            asset_type,
            unlock_time,
            view_tag,
        } => {
            buf.push(wire::TXOUT_TAGGED_KEY);
            buf.extend_from_slice(key);
            write_string(buf, asset_type.as_str());
            write_varint(buf, *unlock_time);
            buf.push(*view_tag);
        }
        TxOutputTarget::CarrotV1 {
            key,
            asset_type,
            view_tag,
            encrypted_janus_anchor,
        } => {
            buf.push(wire::TXOUT_CARROT_V1);
            buf.extend_from_slice(key);
            write_string(buf, asset_type.as_str());
            buf.extend_from_slice(view_tag);
            buf.extend_from_slice(encrypted_janus_anchor);
        }
    }
}

fn write_protocol_tx_data(buf: &mut Vec<u8>, data: &ProtocolTxData) {
    write_varint(buf, data.version);
    buf.extend_from_slice(&data.return_address);
    buf.extend_from_slice(&data.return_pubkey);
    buf.extend_from_slice(&data.return_view_tag);
    buf.extend_from_slice(&data.return_anchor_enc);
}

/// Serialize the transaction prefix; `keccak256` of this is the tx hash.
pub fn serialize_prefix(prefix: &TxPrefix) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2048);

    write_varint(&mut buf, prefix.version as u64);
    write_varint(&mut buf, prefix.unlock_time);

    write_varint(&mut buf, prefix.inputs.len() as u64);
    for input in &prefix.inputs {
        write_input(&mut buf, input);
    }

    write_varint(&mut buf, prefix.outputs.len() as u64);
    for output in &prefix.outputs {
        write_output(&mut buf, output);
    }

    write_varint(&mut buf, prefix.extra.len() as u64);
    buf.extend_from_slice(&prefix.extra);

    // Salvium extensions.
    write_varint(&mut buf, prefix.tx_type as u64);
    if prefix.tx_type != TxType::Unset && prefix.tx_type != TxType::Protocol {
        write_varint(&mut buf, prefix.amount_burnt);

        if prefix.tx_type != TxType::Miner {
            if prefix.tx_type == TxType::Transfer && prefix.version >= 3 {
                let list = prefix.return_address_list.as_deref().unwrap_or(&[]);
                write_varint(&mut buf, list.len() as u64);
                for addr in list {
                    buf.extend_from_slice(addr);
                }
                let mask = prefix.return_address_change_mask.as_deref().unwrap_or(&[]);
                write_varint(&mut buf, mask.len() as u64);
                buf.extend_from_slice(mask);
            } else if prefix.tx_type == TxType::Stake && prefix.version >= 4 {
                if let Some(data) = &prefix.protocol_tx_data {
                    write_protocol_tx_data(&mut buf, data);
                }
            } else {
                buf.extend_from_slice(&prefix.return_address.unwrap_or([0u8; 32]));
                buf.extend_from_slice(&prefix.return_pubkey.unwrap_or([0u8; 32]));
            }

            write_string(&mut buf, prefix.source_asset_type.as_str());
            write_string(&mut buf, prefix.destination_asset_type.as_str());
            write_varint(&mut buf, prefix.amount_slippage_limit);
        }
    }

    buf
}

/// RCT base: type, fee, ecdhInfo, outPk, p_r, salvium_data.
pub fn serialize_rct_base(rct: &RctSignatures) -> Vec<u8> {
    let mut buf =
        Vec::with_capacity(16 + rct.ecdh_info.len() * 8 + rct.out_pk.len() * 32 + 32 + 200);

    buf.push(rct.rct_type as u8);
    if rct.rct_type == RctType::Null {
        return buf;
    }

    write_varint(&mut buf, rct.txn_fee);
    for info in &rct.ecdh_info {
        buf.extend_from_slice(&info.amount);
    }
    for pk in &rct.out_pk {
        buf.extend_from_slice(pk);
    }
    buf.extend_from_slice(&rct.p_r);

    match rct.rct_type {
        RctType::SalviumZero | RctType::SalviumOne => {
            if let Some(data) = &rct.salvium_data {
                write_varint(&mut buf, data.data_type);
                write_zk_proof(&mut buf, &data.pr_proof);
                write_zk_proof(&mut buf, &data.sa_proof);
            }
        }
        RctType::FullProofs => {
            if let Some(data) = &rct.salvium_data {
                write_zk_proof(&mut buf, &data.pr_proof);
                write_zk_proof(&mut buf, &data.sa_proof);
            }
        }
        _ => {}
    }

    buf
}

/// Prunable section: BP+ proofs, ring signatures, pseudo-outs.
pub fn serialize_rct_prunable(rct: &RctSignatures) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4096);

    write_varint(&mut buf, rct.bulletproof_plus.len() as u64);
    for proof in &rct.bulletproof_plus {
        buf.extend_from_slice(&proof.a);
        buf.extend_from_slice(&proof.a1);
        buf.extend_from_slice(&proof.b);
        buf.extend_from_slice(&proof.r1);
        buf.extend_from_slice(&proof.s1);
        buf.extend_from_slice(&proof.d1);
        write_varint(&mut buf, proof.l.len() as u64);
        for p in &proof.l {
            buf.extend_from_slice(p);
        }
        write_varint(&mut buf, proof.r.len() as u64);
        for p in &proof.r {
            buf.extend_from_slice(p);
        }
    }

    if rct.rct_type >= RctType::SalviumOne {
        for sig in &rct.tclsags {
            for s in &sig.sx {
                buf.extend_from_slice(s);
            }
            for s in &sig.sy {
                buf.extend_from_slice(s);
            }
            buf.extend_from_slice(&sig.c1);
            buf.extend_from_slice(&sig.d);
        }
    } else {
        for sig in &rct.clsags {
            for s in &sig.s {
                buf.extend_from_slice(s);
            }
            buf.extend_from_slice(&sig.c1);
            buf.extend_from_slice(&sig.d);
        }
    }

    for pseudo in &rct.pseudo_outs {
        buf.extend_from_slice(pseudo);
    }

    buf
}

/// Full transaction blob: prefix, then RCT base and prunable when present.
pub fn serialize_transaction(tx: &Transaction) -> Vec<u8> {
    let mut buf = serialize_prefix(&tx.prefix);
    if let Some(rct) = &tx.rct {
        buf.extend_from_slice(&serialize_rct_base(rct));
        buf.extend_from_slice(&serialize_rct_prunable(rct));
    }
    buf
}

/// Extra field holding one tx public key.
pub fn extra_with_tx_pubkey(tx_pubkey: &[u8; 32]) -> Vec<u8> {
    let mut extra = Vec::with_capacity(33);
    extra.push(wire::EXTRA_TX_PUBKEY);
    extra.extend_from_slice(tx_pubkey);
    extra
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvium_light_types::AssetType;

    fn transfer_prefix(version: u8) -> TxPrefix {
        TxPrefix {
            version,
            unlock_time: 0,
            inputs: vec![TxInput::Key {
                amount: 0,
                asset_type: AssetType::Sal1,
                key_offsets: vec![100, 20, 3],
                key_image: [0xaa; 32],
            }],
            outputs: vec![TxOutput {
                amount: 0,
                target: TxOutputTarget::TaggedKey {
                    key: [0xbb; 32],
                    asset_type: AssetType::Sal1,
                    unlock_time: 0,
                    view_tag: 0x5c,
                },
            }],
            extra: extra_with_tx_pubkey(&[0xcc; 32]),
            tx_type: TxType::Transfer,
            amount_burnt: 0,
            return_address: None,
            return_pubkey: None,
            return_address_list: Some(vec![[0xdd; 32]]),
            return_address_change_mask: Some(vec![0]),
            protocol_tx_data: None,
            source_asset_type: AssetType::Sal1,
            destination_asset_type: AssetType::Sal1,
            amount_slippage_limit: 0,
        }
    }

    #[test]
    fn varint_encoding() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 0);
        assert_eq!(buf, [0]);
        buf.clear();
        write_varint(&mut buf, 127);
        assert_eq!(buf, [0x7f]);
        buf.clear();
        write_varint(&mut buf, 128);
        assert_eq!(buf, [0x80, 0x01]);
        buf.clear();
        write_varint(&mut buf, 300);
        assert_eq!(buf, [0xac, 0x02]);
    }

    #[test]
    fn prefix_layout_starts_with_version_and_unlock() {
        let bytes = serialize_prefix(&transfer_prefix(3));
        assert_eq!(bytes[0], 3); // version
        assert_eq!(bytes[1], 0); // unlock_time
        assert_eq!(bytes[2], 1); // input count
        assert_eq!(bytes[3], wire::TXIN_KEY);
    }

    #[test]
    fn v3_transfer_carries_return_list() {
        let with = serialize_prefix(&transfer_prefix(3));
        let mut without_prefix = transfer_prefix(2);
        without_prefix.return_address_list = None;
        without_prefix.return_address_change_mask = None;
        let without = serialize_prefix(&without_prefix);
        // v3 adds 1 + 32 (list) + 1 + 1 (mask) and drops 64 bytes of legacy
        // return fields.
        assert_ne!(with.len(), without.len());
    }

    #[test]
    fn legacy_stake_writes_return_fields() {
        let mut prefix = transfer_prefix(2);
        prefix.tx_type = TxType::Stake;
        prefix.return_address = Some([0x11; 32]);
        prefix.return_pubkey = Some([0x22; 32]);
        prefix.return_address_list = None;
        prefix.return_address_change_mask = None;

        let bytes = serialize_prefix(&prefix);
        let hay = bytes.windows(32);
        assert!(hay.clone().any(|w| w == [0x11; 32]));
        assert!(hay.clone().any(|w| w == [0x22; 32]));
    }

    #[test]
    fn v4_stake_writes_protocol_tx_data() {
        let mut prefix = transfer_prefix(4);
        prefix.tx_type = TxType::Stake;
        prefix.return_address_list = None;
        prefix.return_address_change_mask = None;
        prefix.protocol_tx_data = Some(ProtocolTxData {
            version: 1,
            return_address: [0x31; 32],
            return_pubkey: [0x32; 32],
            return_view_tag: [1, 2, 3],
            return_anchor_enc: [4; 16],
        });
        let bytes = serialize_prefix(&prefix);
        assert!(bytes.windows(32).any(|w| w == [0x31; 32]));
        assert!(bytes.windows(3).any(|w| w == [1, 2, 3]));
    }

    #[test]
    fn rct_null_is_a_single_byte() {
        let rct = RctSignatures {
            rct_type: RctType::Null,
            txn_fee: 123,
            ecdh_info: vec![],
            out_pk: vec![],
            p_r: [0; 32],
            salvium_data: None,
            bulletproof_plus: vec![],
            clsags: vec![],
            tclsags: vec![],
            pseudo_outs: vec![],
        };
        assert_eq!(serialize_rct_base(&rct), vec![0]);
    }

    #[test]
    fn tx_hash_is_prefix_hash() {
        let tx = Transaction {
            prefix: transfer_prefix(3),
            rct: None,
        };
        assert_eq!(
            tx.tx_hash(),
            salvium_light_crypto::keccak256(&serialize_prefix(&tx.prefix))
        );
    }
}
