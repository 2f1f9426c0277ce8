//! Output scanning orchestration.
//!
//! Parses node-decoded transaction JSON into typed output targets (the
//! variant is picked from the wire tag and view-tag fields, never by key
//! sniffing) and drives the CryptoNote and CARROT recognition pipelines
//! from `salvium-light-crypto` over them.

use curve25519_dalek::scalar::Scalar;
use log::trace;
use serde_json::Value;

use salvium_light_crypto::carrot::CarrotKeys;
use salvium_light_crypto::carrot_scan::{self, CarrotEnote, EnoteType};
use salvium_light_crypto::cn_scan::{self, CnOutput};
use salvium_light_crypto::subaddress::SubaddressMap;
use salvium_light_crypto::{generate_key_derivation, generate_key_image};
use salvium_light_types::AssetType;

use crate::keys::WalletKeys;

/// Keys and lookahead tables the scanner needs.
pub struct ScanContext {
    pub cn_view_secret: Scalar,
    pub cn_spend_secret: Option<Scalar>,
    pub cn_subaddresses: SubaddressMap,
    pub carrot: Option<CarrotScanKeys>,
}

pub struct CarrotScanKeys {
    pub view_incoming_key: Scalar,
    pub view_balance_secret: [u8; 32],
    pub account_spend_pubkey: [u8; 32],
    pub prove_spend_key: Option<Scalar>,
    pub generate_image_key: Scalar,
    pub subaddresses: SubaddressMap,
}

impl ScanContext {
    pub fn new(
        keys: &WalletKeys,
        cn_subaddresses: SubaddressMap,
        carrot_subaddresses: Option<SubaddressMap>,
    ) -> Self {
        let carrot = keys.carrot.as_ref().map(|carrot: &CarrotKeys| CarrotScanKeys {
            view_incoming_key: carrot.view_incoming_key,
            view_balance_secret: carrot.view_balance_secret,
            account_spend_pubkey: carrot.account_spend_pubkey,
            prove_spend_key: carrot.prove_spend_key,
            generate_image_key: carrot.generate_image_key,
            subaddresses: carrot_subaddresses.unwrap_or_else(SubaddressMap::empty),
        });
        Self {
            cn_view_secret: keys.cn.view_secret,
            cn_spend_secret: keys.cn.spend_secret,
            cn_subaddresses,
            carrot,
        }
    }
}

/// A parsed candidate output.
#[derive(Debug, Clone)]
pub enum ParsedTarget {
    /// Bare stealth key (oldest format).
    Key { key: [u8; 32] },
    /// 1-byte view-tagged key.
    Tagged { key: [u8; 32], view_tag: u8 },
    /// CARROT v1 enote.
    CarrotV1 {
        key: [u8; 32],
        view_tag: [u8; 3],
        encrypted_janus_anchor: [u8; 16],
    },
}

impl ParsedTarget {
    pub fn key(&self) -> &[u8; 32] {
        match self {
            Self::Key { key } | Self::Tagged { key, .. } | Self::CarrotV1 { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedOutput {
    pub index: u32,
    pub target: ParsedTarget,
    pub asset_type: AssetType,
    /// Cleartext amount (coinbase) or 0.
    pub amount: u64,
    pub encrypted_amount: [u8; 8],
    pub commitment: Option<[u8; 32]>,
}

/// One transaction, ready to scan.
#[derive(Debug, Clone)]
pub struct ScanTxData {
    pub tx_hash: [u8; 32],
    pub tx_pub_key: [u8; 32],
    pub outputs: Vec<ParsedOutput>,
    pub is_coinbase: bool,
    pub block_height: u64,
    pub rct_type: u8,
    pub tx_type: u8,
    /// All input key images (spent detection).
    pub key_images: Vec<[u8; 32]>,
}

/// A recognized output, ready for storage.
#[derive(Debug, Clone)]
pub struct FoundOutput {
    pub output_index: u32,
    pub output_public_key: [u8; 32],
    pub amount: u64,
    pub mask: Scalar,
    pub commitment: Option<[u8; 32]>,
    pub key_image: Option<[u8; 32]>,
    pub subaddress_index: (u32, u32),
    pub is_carrot: bool,
    pub carrot_shared_secret: Option<[u8; 32]>,
    pub carrot_enote_type: Option<EnoteType>,
    pub carrot_encrypted_anchor: Option<[u8; 16]>,
    pub asset_type: AssetType,
}

// ─── JSON parsing ────────────────────────────────────────────────────────────

fn hex32(s: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(s).ok()?;
    bytes.try_into().ok()
}

fn field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| value.get(n))
}

/// Tx public key from the raw extra byte array (tag 0x01 + 32 bytes).
fn tx_pubkey_from_extra(tx: &Value) -> Option<[u8; 32]> {
    let extra = tx.get("extra")?.as_array()?;
    let bytes: Vec<u8> = extra
        .iter()
        .filter_map(|v| v.as_u64().map(|n| n as u8))
        .collect();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            0x00 => i += 1, // padding
            0x01 if i + 33 <= bytes.len() => {
                return bytes[i + 1..i + 33].try_into().ok();
            }
            0x02 if i + 2 <= bytes.len() => {
                // nonce: tag + length + payload
                i += 2 + bytes[i + 1] as usize;
            }
            _ => break,
        }
    }
    None
}

fn parse_target(out: &Value) -> Option<ParsedTarget> {
    let target = out.get("target")?;

    if let Some(carrot) = field(target, &["carrot_v1", "to_carrot_v1"]) {
        let key = hex32(carrot.get("key")?.as_str()?)?;
        let view_tag: [u8; 3] = hex::decode(carrot.get("view_tag")?.as_str()?)
            .ok()?
            .try_into()
            .ok()?;
        let anchor: [u8; 16] = carrot
            .get("encrypted_janus_anchor")
            .and_then(Value::as_str)
            .and_then(|s| hex::decode(s).ok())
            .and_then(|b| b.try_into().ok())
            .unwrap_or([0u8; 16]);
        return Some(ParsedTarget::CarrotV1 {
            key,
            view_tag,
            encrypted_janus_anchor: anchor,
        });
    }

    if let Some(tagged) = field(target, &["tagged_key", "to_tagged_key"]) {
        let key = hex32(tagged.get("key")?.as_str()?)?;
        let view_tag = tagged
            .get("view_tag")
            .and_then(Value::as_str)
            .and_then(|s| hex::decode(s).ok())
            .and_then(|b| b.first().copied())?;
        return Some(ParsedTarget::Tagged { key, view_tag });
    }

    if let Some(plain) = field(target, &["key", "to_key"]) {
        // Either `"target": {"key": "hex"}` or `"target": {"to_key": {"key": ...}}`.
        let key = match plain {
            Value::String(s) => hex32(s)?,
            other => hex32(other.get("key")?.as_str()?)?,
        };
        return Some(ParsedTarget::Key { key });
    }

    None
}

fn parse_asset_type(out: &Value) -> AssetType {
    let from_target = out.get("target").and_then(|t| {
        ["carrot_v1", "to_carrot_v1", "tagged_key", "to_tagged_key", "to_key", "key"]
            .iter()
            .find_map(|k| t.get(k))
            .and_then(|inner| inner.get("asset_type"))
            .and_then(Value::as_str)
    });
    from_target
        .or_else(|| out.get("asset_type").and_then(Value::as_str))
        .and_then(AssetType::parse)
        .unwrap_or(AssetType::Sal)
}

fn parse_key_images(tx: &Value) -> Vec<[u8; 32]> {
    let Some(vin) = tx.get("vin").and_then(Value::as_array) else {
        return Vec::new();
    };
    vin.iter()
        .filter_map(|input| {
            let key = input.get("key")?;
            field(key, &["k_image", "key_image"])
                .and_then(Value::as_str)
                .and_then(hex32)
        })
        .collect()
}

/// Parse one decoded transaction into scan-ready form.
///
/// Returns None when the body carries no outputs we could interpret.
pub fn parse_transaction(
    tx_json: &Value,
    tx_hash: [u8; 32],
    block_height: u64,
    is_coinbase: bool,
) -> Option<ScanTxData> {
    let tx_pub_key = tx_pubkey_from_extra(tx_json)?;
    let vout = tx_json.get("vout")?.as_array()?;

    let rct = field(tx_json, &["rct_signatures", "rct"]);
    let rct_type = rct
        .and_then(|r| r.get("type"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as u8;
    let ecdh_info = rct.and_then(|r| field(r, &["ecdhInfo", "ecdh_info"])).and_then(Value::as_array);
    let out_pk = rct.and_then(|r| field(r, &["outPk", "out_pk"])).and_then(Value::as_array);

    let tx_type = field(tx_json, &["tx_type", "type"])
        .and_then(Value::as_u64)
        .unwrap_or(if is_coinbase { 1 } else { 3 }) as u8;

    let mut outputs = Vec::with_capacity(vout.len());
    for (i, out) in vout.iter().enumerate() {
        let Some(target) = parse_target(out) else {
            continue;
        };

        let amount = out
            .get("amount")
            .and_then(|a| a.as_u64().or_else(|| a.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(0);

        let encrypted_amount = ecdh_info
            .and_then(|info| info.get(i))
            .and_then(|e| e.get("amount"))
            .and_then(Value::as_str)
            .and_then(|s| hex::decode(s).ok())
            .and_then(|b| b.get(..8).and_then(|s| <[u8; 8]>::try_from(s).ok()))
            .unwrap_or([0u8; 8]);

        let commitment = out_pk
            .and_then(|pks| pks.get(i))
            .and_then(|v| match v {
                Value::String(s) => Some(s.as_str()),
                other => other.get("mask").and_then(Value::as_str),
            })
            .and_then(hex32);

        outputs.push(ParsedOutput {
            index: i as u32,
            asset_type: parse_asset_type(out),
            target,
            amount,
            encrypted_amount,
            commitment,
        });
    }

    if outputs.is_empty() {
        return None;
    }

    Some(ScanTxData {
        tx_hash,
        tx_pub_key,
        outputs,
        is_coinbase,
        block_height,
        rct_type,
        tx_type,
        key_images: parse_key_images(tx_json),
    })
}

// ─── Scanning ────────────────────────────────────────────────────────────────

/// Scan every output of one transaction against the wallet.
pub fn scan_transaction(ctx: &ScanContext, tx: &ScanTxData) -> Vec<FoundOutput> {
    let mut found = Vec::new();

    // Legacy derivation is shared across the transaction's outputs.
    let cn_derivation = generate_key_derivation(&tx.tx_pub_key, &ctx.cn_view_secret).ok();

    // CARROT input context: first spent key image, or the height for coinbase.
    let input_context = if tx.is_coinbase {
        salvium_light_tx::carrot::input_context_coinbase(tx.block_height)
    } else if let Some(first) = tx.key_images.first() {
        salvium_light_tx::carrot::input_context_rct(first)
    } else {
        Vec::new()
    };

    for output in &tx.outputs {
        match &output.target {
            ParsedTarget::CarrotV1 {
                key,
                view_tag,
                encrypted_janus_anchor,
            } => {
                let Some(carrot) = &ctx.carrot else {
                    continue;
                };
                if input_context.is_empty() {
                    continue;
                }
                let enote = CarrotEnote {
                    onetime_address: *key,
                    view_tag: *view_tag,
                    ephemeral_pubkey: tx.tx_pub_key,
                    encrypted_amount: output.encrypted_amount,
                    commitment: output.commitment,
                    input_context: &input_context,
                    cleartext_amount: tx.is_coinbase.then_some(output.amount),
                };

                // External enotes first, then the self-send path.
                let result = carrot_scan::scan_output(
                    &enote,
                    &carrot.view_incoming_key,
                    &carrot.account_spend_pubkey,
                    &carrot.subaddresses,
                )
                .or_else(|| {
                    carrot_scan::scan_internal_output(
                        &enote,
                        &carrot.view_balance_secret,
                        &carrot.account_spend_pubkey,
                        &carrot.subaddresses,
                    )
                });

                if let Some(result) = result {
                    trace!(
                        "carrot output {}:{} amount {}",
                        hex::encode(tx.tx_hash),
                        output.index,
                        result.amount
                    );
                    // Key image needs the full key tier and the commitment.
                    let key_image = match (carrot.prove_spend_key, output.commitment) {
                        (Some(prove_spend), Some(commitment)) => {
                            let (x, _y) = carrot_scan::derive_spend_keys(
                                &prove_spend,
                                &carrot.generate_image_key,
                                &result.shared_secret,
                                &commitment,
                            );
                            Some(generate_key_image(key, &x))
                        }
                        _ => None,
                    };
                    found.push(FoundOutput {
                        output_index: output.index,
                        output_public_key: *key,
                        amount: result.amount,
                        mask: result.mask,
                        commitment: output.commitment,
                        key_image,
                        subaddress_index: (result.subaddress_major, result.subaddress_minor),
                        is_carrot: true,
                        carrot_shared_secret: Some(result.shared_secret),
                        carrot_enote_type: Some(result.enote_type),
                        carrot_encrypted_anchor: Some(*encrypted_janus_anchor),
                        asset_type: output.asset_type,
                    });
                }
            }

            ParsedTarget::Tagged { key, view_tag } => {
                self_scan_cn(ctx, tx, output, key, Some(*view_tag), &cn_derivation, &mut found);
            }
            ParsedTarget::Key { key } => {
                self_scan_cn(ctx, tx, output, key, None, &cn_derivation, &mut found);
            }
        }
    }

    found
}

#[allow(clippy::too_many_arguments)]
fn self_scan_cn(
    ctx: &ScanContext,
    tx: &ScanTxData,
    output: &ParsedOutput,
    key: &[u8; 32],
    view_tag: Option<u8>,
    derivation: &Option<[u8; 32]>,
    found: &mut Vec<FoundOutput>,
) {
    let Some(derivation) = derivation else {
        return;
    };
    let candidate = CnOutput {
        public_key: *key,
        output_index: output.index,
        view_tag,
        encrypted_amount: output.encrypted_amount,
        cleartext_amount: (output.amount > 0).then_some(output.amount),
        is_rct: tx.rct_type != 0,
    };

    if let Some(result) = cn_scan::scan_output(
        &candidate,
        derivation,
        &ctx.cn_view_secret,
        ctx.cn_spend_secret.as_ref(),
        &ctx.cn_subaddresses,
    ) {
        trace!(
            "cn output {}:{} amount {}",
            hex::encode(tx.tx_hash),
            output.index,
            result.amount
        );
        found.push(FoundOutput {
            output_index: output.index,
            output_public_key: *key,
            amount: result.amount,
            mask: result.mask,
            commitment: output.commitment,
            key_image: result.key_image,
            subaddress_index: (result.subaddress_major, result.subaddress_minor),
            is_carrot: false,
            carrot_shared_secret: None,
            carrot_enote_type: None,
            carrot_encrypted_anchor: None,
            asset_type: output.asset_type,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvium_light_crypto::subaddress::cn_subaddress_map;
    use salvium_light_crypto::{
        compress, derivation_to_scalar, derive_public_key, random_scalar, scalar_mul_base,
    };
    use salvium_light_types::Network;

    fn context(keys: &WalletKeys) -> ScanContext {
        let cn_map = cn_subaddress_map(&keys.cn.spend_public, &keys.cn.view_secret, 2, 4).unwrap();
        let carrot_map = keys.carrot.as_ref().map(|c| {
            salvium_light_crypto::subaddress::carrot_subaddress_map(
                &c.account_spend_pubkey,
                &c.generate_address_secret,
                2,
                4,
            )
            .unwrap()
        });
        ScanContext::new(keys, cn_map, carrot_map)
    }

    /// Decoded-JSON shape of a legacy transfer paying `keys` at output 0.
    fn legacy_tx_json(keys: &WalletKeys, amount: u64) -> (Value, [u8; 32]) {
        let tx_secret = random_scalar();
        let tx_pub = compress(&scalar_mul_base(&tx_secret));
        let derivation = generate_key_derivation(&keys.cn.view_public, &tx_secret).unwrap();
        let ko = derive_public_key(&derivation, 0, &keys.cn.spend_public).unwrap();
        let shared = derivation_to_scalar(&derivation, 0).to_bytes();

        let view_tag = cn_scan::view_tag(&derivation, 0);
        let enc_amount = cn_scan::ecdh_encode_amount(amount, &shared);
        let mask = cn_scan::commitment_mask(&shared);
        let commitment = salvium_light_crypto::pedersen_commit(amount, &mask);

        let mut extra = vec![1u8];
        extra.extend_from_slice(&tx_pub);

        let json = serde_json::json!({
            "version": 3,
            "unlock_time": 0,
            "tx_type": 3,
            "vin": [
                { "key": { "amount": 0, "key_offsets": [5, 1], "k_image": "aa".repeat(32) } }
            ],
            "vout": [
                {
                    "amount": 0,
                    "target": {
                        "tagged_key": {
                            "key": hex::encode(ko),
                            "asset_type": "SAL1",
                            "view_tag": hex::encode([view_tag])
                        }
                    }
                }
            ],
            "extra": extra,
            "rct_signatures": {
                "type": 8,
                "ecdhInfo": [ { "amount": hex::encode(enc_amount) } ],
                "outPk": [ hex::encode(commitment) ]
            }
        });
        (json, tx_pub)
    }

    #[test]
    fn parses_and_recognizes_legacy_output() {
        let keys = WalletKeys::from_seed([0x21u8; 32], Network::Testnet);
        let (json, tx_pub) = legacy_tx_json(&keys, 123_456_789);

        let parsed = parse_transaction(&json, [0xcc; 32], 500, false).unwrap();
        assert_eq!(parsed.tx_pub_key, tx_pub);
        assert_eq!(parsed.rct_type, 8);
        assert_eq!(parsed.outputs.len(), 1);
        assert!(matches!(parsed.outputs[0].target, ParsedTarget::Tagged { .. }));
        assert_eq!(parsed.outputs[0].asset_type, AssetType::Sal1);
        assert_eq!(parsed.key_images, vec![[0xaa; 32]]);

        let ctx = context(&keys);
        let found = scan_transaction(&ctx, &parsed);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].amount, 123_456_789);
        assert!(!found[0].is_carrot);
        assert!(found[0].key_image.is_some());
    }

    #[test]
    fn foreign_legacy_output_ignored() {
        let ours = WalletKeys::from_seed([0x22u8; 32], Network::Testnet);
        let theirs = WalletKeys::from_seed([0x23u8; 32], Network::Testnet);
        let (json, _) = legacy_tx_json(&theirs, 1);

        let parsed = parse_transaction(&json, [0xcd; 32], 500, false).unwrap();
        assert!(scan_transaction(&context(&ours), &parsed).is_empty());
    }

    #[test]
    fn parses_and_recognizes_carrot_enote() {
        let keys = WalletKeys::from_seed([0x24u8; 32], Network::Testnet);
        let carrot = keys.carrot.as_ref().unwrap();

        let first_ki = [0x66u8; 32];
        let input_context = salvium_light_tx::carrot::input_context_rct(&first_ki);
        let enote = salvium_light_tx::carrot::create_carrot_output(
            &salvium_light_tx::carrot::CarrotOutputParams {
                recipient_spend_pubkey: &carrot.account_spend_pubkey,
                recipient_view_pubkey: &carrot.account_view_pubkey,
                amount: 5_000_000,
                input_context: &input_context,
                enote_type: EnoteType::Payment,
                payment_id: [0u8; 8],
            },
        )
        .unwrap();

        let mut extra = vec![1u8];
        extra.extend_from_slice(&enote.ephemeral_pubkey);

        let json = serde_json::json!({
            "version": 4,
            "tx_type": 3,
            "vin": [
                { "key": { "amount": 0, "key_offsets": [9], "k_image": hex::encode(first_ki) } }
            ],
            "vout": [
                {
                    "amount": 0,
                    "target": {
                        "carrot_v1": {
                            "key": hex::encode(enote.onetime_address),
                            "asset_type": "SAL1",
                            "view_tag": hex::encode(enote.view_tag),
                            "encrypted_janus_anchor": hex::encode(enote.encrypted_anchor)
                        }
                    }
                }
            ],
            "extra": extra,
            "rct_signatures": {
                "type": 9,
                "ecdhInfo": [ { "amount": hex::encode(enote.encrypted_amount) } ],
                "outPk": [ hex::encode(enote.amount_commitment) ]
            }
        });

        let parsed = parse_transaction(&json, [0xce; 32], 1200, false).unwrap();
        assert!(matches!(parsed.outputs[0].target, ParsedTarget::CarrotV1 { .. }));

        let ctx = context(&keys);
        let found = scan_transaction(&ctx, &parsed);
        assert_eq!(found.len(), 1);
        let hit = &found[0];
        assert!(hit.is_carrot);
        assert_eq!(hit.amount, 5_000_000);
        assert!(hit.carrot_shared_secret.is_some());
        assert_eq!(hit.carrot_enote_type, Some(EnoteType::Payment));
        assert!(hit.key_image.is_some());
        assert_eq!(hit.commitment, Some(enote.amount_commitment));
    }

    #[test]
    fn view_tag_mismatch_rejects_carrot_enote() {
        let keys = WalletKeys::from_seed([0x25u8; 32], Network::Testnet);
        let other = WalletKeys::from_seed([0x26u8; 32], Network::Testnet);
        let carrot = other.carrot.as_ref().unwrap();

        let first_ki = [0x66u8; 32];
        let input_context = salvium_light_tx::carrot::input_context_rct(&first_ki);
        let enote = salvium_light_tx::carrot::create_carrot_output(
            &salvium_light_tx::carrot::CarrotOutputParams {
                recipient_spend_pubkey: &carrot.account_spend_pubkey,
                recipient_view_pubkey: &carrot.account_view_pubkey,
                amount: 1,
                input_context: &input_context,
                enote_type: EnoteType::Payment,
                payment_id: [0u8; 8],
            },
        )
        .unwrap();

        let mut extra = vec![1u8];
        extra.extend_from_slice(&enote.ephemeral_pubkey);
        let json = serde_json::json!({
            "version": 4,
            "tx_type": 3,
            "vin": [ { "key": { "k_image": hex::encode(first_ki) } } ],
            "vout": [ {
                "amount": 0,
                "target": { "carrot_v1": {
                    "key": hex::encode(enote.onetime_address),
                    "asset_type": "SAL1",
                    "view_tag": hex::encode(enote.view_tag),
                    "encrypted_janus_anchor": hex::encode(enote.encrypted_anchor)
                } }
            } ],
            "extra": extra,
            "rct_signatures": { "type": 9, "ecdhInfo": [], "outPk": [] }
        });

        let parsed = parse_transaction(&json, [0xcf; 32], 1200, false).unwrap();
        assert!(scan_transaction(&context(&keys), &parsed).is_empty());
    }

    #[test]
    fn coinbase_parses_with_gen_input() {
        let keys = WalletKeys::from_seed([0x27u8; 32], Network::Testnet);
        let tx_secret = random_scalar();
        let tx_pub = compress(&scalar_mul_base(&tx_secret));
        let derivation = generate_key_derivation(&keys.cn.view_public, &tx_secret).unwrap();
        let ko = derive_public_key(&derivation, 0, &keys.cn.spend_public).unwrap();

        let mut extra = vec![1u8];
        extra.extend_from_slice(&tx_pub);
        let json = serde_json::json!({
            "version": 2,
            "tx_type": 1,
            "vin": [ { "gen": { "height": 800 } } ],
            "vout": [ {
                "amount": 60_000_000_000u64,
                "target": { "key": hex::encode(ko) }
            } ],
            "extra": extra,
        });

        let parsed = parse_transaction(&json, [0xd0; 32], 800, true).unwrap();
        assert!(parsed.is_coinbase);
        assert!(parsed.key_images.is_empty());

        let found = scan_transaction(&context(&keys), &parsed);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].amount, 60_000_000_000);
        assert_eq!(found[0].mask, Scalar::ONE);
    }

    #[test]
    fn missing_extra_yields_none() {
        let json = serde_json::json!({
            "vin": [], "vout": [ { "amount": 0, "target": { "key": "00".repeat(32) } } ]
        });
        assert!(parse_transaction(&json, [0; 32], 1, false).is_none());
    }
}
