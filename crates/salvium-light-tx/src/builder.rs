//! Transaction builder.
//!
//! Assembles prepared inputs and destinations into an unsigned transaction:
//! fee and change math, output construction (CARROT enotes at RCT type 9,
//! legacy stealth outputs below), deterministic output/input ordering, the
//! tx extra, and the Salvium prefix extensions per transaction type.

use curve25519_dalek::scalar::Scalar;
use log::debug;

use salvium_light_crypto::carrot_scan::EnoteType;
use salvium_light_crypto::cn_scan;
use salvium_light_crypto::{
    compress, derivation_to_scalar, derive_public_key, generate_key_derivation,
    generate_key_image, pedersen_commit, random_scalar, scalar_mul_base,
};
use salvium_light_types::{AssetType, RctType, SigType, TxType};

use crate::carrot::{self, CarrotOutputParams};
use crate::fee::{self, FeePriority, OutputKind};
use crate::serialize::extra_with_tx_pubkey;
use crate::types::*;
use crate::TxError;

/// One payment target.
#[derive(Debug, Clone)]
pub struct Destination {
    pub spend_pubkey: [u8; 32],
    pub view_pubkey: [u8; 32],
    pub amount: u64,
    pub asset_type: AssetType,
    pub payment_id: [u8; 8],
}

/// A spendable input with its ring fully resolved.
#[derive(Clone)]
pub struct PreparedInput {
    /// One-time secret (G column).
    pub secret_key: Scalar,
    /// T-column secret for TCLSAG; None for legacy CLSAG inputs.
    pub secret_key_y: Option<Scalar>,
    pub public_key: [u8; 32],
    pub amount: u64,
    pub mask: Scalar,
    pub asset_type: AssetType,
    pub global_index: u64,
    /// Ring member one-time keys, sorted ascending by global index.
    pub ring: Vec<[u8; 32]>,
    pub ring_commitments: Vec<[u8; 32]>,
    pub ring_indices: Vec<u64>,
    /// Position of the real output within the sorted ring.
    pub real_index: usize,
}

impl PreparedInput {
    pub fn key_image(&self) -> [u8; 32] {
        generate_key_image(&self.public_key, &self.secret_key)
    }
}

/// Builder output, ready for [`crate::sign::sign_transaction`].
pub struct UnsignedTransaction {
    pub prefix: TxPrefix,
    pub output_masks: Vec<Scalar>,
    pub output_amounts: Vec<u64>,
    pub encrypted_amounts: Vec<[u8; 8]>,
    pub output_commitments: Vec<[u8; 32]>,
    pub inputs: Vec<PreparedInput>,
    pub rct_type: RctType,
    pub fee: u64,
}

pub struct TransactionBuilder {
    inputs: Vec<PreparedInput>,
    destinations: Vec<Destination>,
    change_spend_pubkey: Option<[u8; 32]>,
    change_view_pubkey: Option<[u8; 32]>,
    tx_type: TxType,
    fee: Option<u64>,
    priority: FeePriority,
    unlock_time: u64,
    source_asset_type: AssetType,
    destination_asset_type: AssetType,
    amount_burnt: u64,
    amount_slippage_limit: u64,
    rct_type: RctType,
    tx_version: u8,
    /// Needed for the legacy STAKE return-address derivation.
    view_secret_key: Option<Scalar>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            destinations: Vec::new(),
            change_spend_pubkey: None,
            change_view_pubkey: None,
            tx_type: TxType::Transfer,
            fee: None,
            priority: FeePriority::Default,
            unlock_time: 0,
            source_asset_type: AssetType::Sal1,
            destination_asset_type: AssetType::Sal1,
            amount_burnt: 0,
            amount_slippage_limit: 0,
            rct_type: RctType::SalviumOne,
            tx_version: 4,
            view_secret_key: None,
        }
    }

    pub fn add_input(mut self, input: PreparedInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn add_inputs(mut self, inputs: impl IntoIterator<Item = PreparedInput>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn add_destination(mut self, dest: Destination) -> Self {
        self.destinations.push(dest);
        self
    }

    pub fn change_address(mut self, spend_pubkey: [u8; 32], view_pubkey: [u8; 32]) -> Self {
        self.change_spend_pubkey = Some(spend_pubkey);
        self.change_view_pubkey = Some(view_pubkey);
        self
    }

    pub fn tx_type(mut self, tx_type: TxType) -> Self {
        self.tx_type = tx_type;
        self
    }

    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn priority(mut self, priority: FeePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn unlock_time(mut self, unlock_time: u64) -> Self {
        self.unlock_time = unlock_time;
        self
    }

    pub fn asset_types(mut self, source: AssetType, destination: AssetType) -> Self {
        self.source_asset_type = source;
        self.destination_asset_type = destination;
        self
    }

    pub fn amount_burnt(mut self, amount: u64) -> Self {
        self.amount_burnt = amount;
        self
    }

    pub fn slippage_limit(mut self, limit: u64) -> Self {
        self.amount_slippage_limit = limit;
        self
    }

    /// RCT type and transaction version, straight from the fork policy.
    pub fn protocol(mut self, rct_type: RctType, tx_version: u8) -> Self {
        self.rct_type = rct_type;
        self.tx_version = tx_version;
        self
    }

    pub fn view_secret_key(mut self, key: Scalar) -> Self {
        self.view_secret_key = Some(key);
        self
    }

    fn check_inputs(&self) -> Result<usize, TxError> {
        if self.inputs.is_empty() {
            return Err(TxError::InsufficientInputs { need: 1, have: 0 });
        }
        let ring_size = self.inputs[0].ring.len();
        for input in &self.inputs {
            if input.ring.len() != ring_size || input.ring_commitments.len() != ring_size {
                return Err(TxError::RingSizeMismatch {
                    expected: ring_size,
                    got: input.ring.len().min(input.ring_commitments.len()),
                });
            }
            if input.real_index >= ring_size {
                return Err(TxError::Invalid(format!(
                    "real index {} outside ring of {}",
                    input.real_index, ring_size
                )));
            }
            if input.ring[input.real_index] != input.public_key {
                return Err(TxError::Invalid("real ring slot does not hold our key".into()));
            }
        }
        Ok(ring_size)
    }

    pub fn build(self) -> Result<UnsignedTransaction, TxError> {
        // STAKE/BURN/CONVERT carry their value in amount_burnt and need no
        // payment destinations.
        if self.destinations.is_empty() && self.amount_burnt == 0 {
            return Err(TxError::NoDestinations);
        }
        let ring_size = self.check_inputs()?;
        let carrot_outputs = self.rct_type >= RctType::SalviumOne;

        let total_input: u64 = self.inputs.iter().map(|i| i.amount).sum();
        let total_dest: u64 = self.destinations.iter().map(|d| d.amount).sum();

        let sig_type = if carrot_outputs { SigType::Tclsag } else { SigType::Clsag };
        let fee = self.fee.unwrap_or_else(|| {
            fee::estimate_tx_fee(
                self.inputs.len(),
                self.destinations.len() + 1,
                ring_size,
                sig_type,
                OutputKind::for_rct(self.rct_type),
                self.priority,
            )
        });

        let need = total_dest + fee + self.amount_burnt;
        if total_input < need {
            return Err(TxError::InsufficientInputs {
                need,
                have: total_input,
            });
        }
        let change_amount = total_input - need;
        debug!(
            "building {} tx: {} in / {} out, fee {}, burnt {}, change {}",
            self.tx_type, total_input, total_dest, fee, self.amount_burnt, change_amount
        );

        // Input context: the first key image in consensus order (inputs are
        // serialized sorted by image, descending).
        let mut key_images: Vec<[u8; 32]> = self.inputs.iter().map(|i| i.key_image()).collect();
        key_images.sort_unstable_by(|a, b| b.cmp(a));
        let input_context = carrot::input_context_rct(&key_images[0]);

        // Build outputs (payments then change, sorted afterwards).
        let mut built = OutputAccumulator::default();
        let change_keys = self.change_spend_pubkey.zip(self.change_view_pubkey);

        if carrot_outputs {
            for dest in &self.destinations {
                let enote = carrot::create_carrot_output(&CarrotOutputParams {
                    recipient_spend_pubkey: &dest.spend_pubkey,
                    recipient_view_pubkey: &dest.view_pubkey,
                    amount: dest.amount,
                    input_context: &input_context,
                    enote_type: EnoteType::Payment,
                    payment_id: dest.payment_id,
                })?;
                built.push_carrot(enote, dest.amount, dest.asset_type);
            }
            if change_amount > 0 {
                let (spend, view) =
                    change_keys.ok_or_else(|| TxError::Invalid("change address required".into()))?;
                let enote = carrot::create_carrot_output(&CarrotOutputParams {
                    recipient_spend_pubkey: &spend,
                    recipient_view_pubkey: &view,
                    amount: change_amount,
                    input_context: &input_context,
                    enote_type: EnoteType::Change,
                    payment_id: [0u8; 8],
                })?;
                built.push_carrot(enote, change_amount, self.source_asset_type);
            }
        } else {
            // One shared tx secret key for all legacy outputs.
            let tx_secret = random_scalar();
            let mut index = 0u32;
            for dest in &self.destinations {
                built.push_legacy(
                    &tx_secret,
                    index,
                    &dest.spend_pubkey,
                    &dest.view_pubkey,
                    dest.amount,
                    dest.asset_type,
                )?;
                index += 1;
            }
            if change_amount > 0 {
                let (spend, view) =
                    change_keys.ok_or_else(|| TxError::Invalid("change address required".into()))?;
                built.push_legacy(&tx_secret, index, &spend, &view, change_amount, self.source_asset_type)?;
            }
            built.legacy_tx_pubkey = Some(compress(&scalar_mul_base(&tx_secret)));
        }

        let num_payments = self.destinations.len();
        let (outputs, order) = built.into_sorted();

        // Inputs sorted by key image, descending, as consensus requires.
        let mut inputs = self.inputs;
        inputs.sort_unstable_by(|a, b| b.key_image().cmp(&a.key_image()));

        let tx_inputs: Vec<TxInput> = inputs
            .iter()
            .map(|input| TxInput::Key {
                amount: 0,
                asset_type: input.asset_type,
                key_offsets: absolute_to_relative(&input.ring_indices),
                key_image: input.key_image(),
            })
            .collect();

        // Extra carries the (single) tx public key: the shared ephemeral for
        // CARROT, r*G for legacy.
        let tx_pubkey = outputs
            .tx_pubkey
            .ok_or_else(|| TxError::Invalid("no outputs were constructed".into()))?;
        let extra = extra_with_tx_pubkey(&tx_pubkey);

        // Return-address machinery per tx type and version.
        let (return_address_list, return_address_change_mask) =
            if self.tx_type == TxType::Transfer && self.tx_version >= 3 {
                let sender_key = self.change_spend_pubkey.unwrap_or([0u8; 32]);
                let list = vec![sender_key; outputs.targets.len()];
                // Mark which (sorted) outputs are change.
                let mut mask = vec![0u8; outputs.targets.len()];
                for (new_pos, &old_pos) in order.iter().enumerate() {
                    if old_pos >= num_payments {
                        mask[new_pos] = 1;
                    }
                }
                (Some(list), Some(mask))
            } else {
                (None, None)
            };

        // STAKE/BURN/CONVERT carry a one-shot return address derived from the
        // change output; v4 STAKE replaces it with a CARROT return enote.
        let wants_return = !matches!(self.tx_type, TxType::Transfer | TxType::Miner)
            && !(self.tx_type == TxType::Stake && self.tx_version >= 4);
        let (return_address, return_pubkey) = if wants_return {
            legacy_return_fields(self.view_secret_key, &outputs, &order, num_payments)?
        } else {
            (None, None)
        };

        let protocol_tx_data = if self.tx_type == TxType::Stake && self.tx_version >= 4 {
            let (spend, view) =
                change_keys.ok_or_else(|| TxError::Invalid("stake needs a return address".into()))?;
            let enote = carrot::create_carrot_output(&CarrotOutputParams {
                recipient_spend_pubkey: &spend,
                recipient_view_pubkey: &view,
                amount: 0,
                input_context: &input_context,
                enote_type: EnoteType::Change,
                payment_id: [0u8; 8],
            })?;
            Some(ProtocolTxData {
                version: 1,
                return_address: enote.onetime_address,
                return_pubkey: enote.ephemeral_pubkey,
                return_view_tag: enote.view_tag,
                return_anchor_enc: enote.encrypted_anchor,
            })
        } else {
            None
        };

        let prefix = TxPrefix {
            version: self.tx_version,
            unlock_time: self.unlock_time,
            inputs: tx_inputs,
            outputs: outputs.targets,
            extra,
            tx_type: self.tx_type,
            amount_burnt: self.amount_burnt,
            return_address,
            return_pubkey,
            return_address_list,
            return_address_change_mask,
            protocol_tx_data,
            source_asset_type: self.source_asset_type,
            destination_asset_type: self.destination_asset_type,
            amount_slippage_limit: self.amount_slippage_limit,
        };

        Ok(UnsignedTransaction {
            prefix,
            output_masks: outputs.masks,
            output_amounts: outputs.amounts,
            encrypted_amounts: outputs.encrypted_amounts,
            output_commitments: outputs.commitments,
            inputs,
            rct_type: self.rct_type,
            fee,
        })
    }

}

/// Pre-CARROT return path: a fresh scalar `s`, the return pubkey
/// `s * P_change`, and the derived one-time return address.
fn legacy_return_fields(
    view_secret_key: Option<Scalar>,
    outputs: &SortedOutputs,
    order: &[usize],
    num_payments: usize,
) -> Result<(Option<[u8; 32]>, Option<[u8; 32]>), TxError> {
    let view_secret = match view_secret_key {
        Some(v) => v,
        None => return Ok((None, None)),
    };

    // Locate the change output after sorting (pre-sort it came last).
    let change_key = order
        .iter()
        .position(|&old| old == num_payments)
        .or(if outputs.targets.is_empty() { None } else { Some(0) })
        .map(|pos| *outputs.targets[pos].target.key());
    let Some(p_change) = change_key else {
        return Ok((None, None));
    };

    let s = random_scalar();
    let p_change_pt = salvium_light_crypto::decompress(&p_change)?;
    let return_pubkey = compress(&(s * p_change_pt));

    let derivation = generate_key_derivation(&return_pubkey, &view_secret)?;
    let return_address = derive_public_key(&derivation, 0, &p_change)?;
    Ok((Some(return_address), Some(return_pubkey)))
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Output pieces gathered before the canonical sort.
#[derive(Default)]
struct OutputAccumulator {
    targets: Vec<TxOutput>,
    masks: Vec<Scalar>,
    amounts: Vec<u64>,
    encrypted_amounts: Vec<[u8; 8]>,
    commitments: Vec<[u8; 32]>,
    carrot_tx_pubkey: Option<[u8; 32]>,
    legacy_tx_pubkey: Option<[u8; 32]>,
}

struct SortedOutputs {
    targets: Vec<TxOutput>,
    masks: Vec<Scalar>,
    amounts: Vec<u64>,
    encrypted_amounts: Vec<[u8; 8]>,
    commitments: Vec<[u8; 32]>,
    tx_pubkey: Option<[u8; 32]>,
}

impl OutputAccumulator {
    fn push_carrot(&mut self, enote: carrot::CarrotOutput, amount: u64, asset_type: AssetType) {
        if self.carrot_tx_pubkey.is_none() {
            self.carrot_tx_pubkey = Some(enote.ephemeral_pubkey);
        }
        self.targets.push(TxOutput {
            amount: 0,
            target: TxOutputTarget::CarrotV1 {
                key: enote.onetime_address,
                asset_type,
                view_tag: enote.view_tag,
                encrypted_janus_anchor: enote.encrypted_anchor,
            },
        });
        self.masks.push(enote.commitment_mask);
        self.amounts.push(amount);
        self.encrypted_amounts.push(enote.encrypted_amount);
        self.commitments.push(enote.amount_commitment);
    }

    fn push_legacy(
        &mut self,
        tx_secret: &Scalar,
        output_index: u32,
        spend_pubkey: &[u8; 32],
        view_pubkey: &[u8; 32],
        amount: u64,
        asset_type: AssetType,
    ) -> Result<(), TxError> {
        let derivation = generate_key_derivation(view_pubkey, tx_secret)?;
        let ko = derive_public_key(&derivation, output_index, spend_pubkey)?;
        let shared = derivation_to_scalar(&derivation, output_index).to_bytes();

        let mask = cn_scan::commitment_mask(&shared);
        self.targets.push(TxOutput {
            amount: 0,
            target: TxOutputTarget::TaggedKey {
                key: ko,
                asset_type,
                unlock_time: 0,
                view_tag: cn_scan::view_tag(&derivation, output_index),
            },
        });
        self.masks.push(mask);
        self.amounts.push(amount);
        self.encrypted_amounts
            .push(cn_scan::ecdh_encode_amount(amount, &shared));
        self.commitments.push(pedersen_commit(amount, &mask));
        Ok(())
    }

    /// Sort lexicographically by one-time key; returns the permutation
    /// (new position -> old position).
    fn into_sorted(self) -> (SortedOutputs, Vec<usize>) {
        let mut order: Vec<usize> = (0..self.targets.len()).collect();
        order.sort_by(|&a, &b| self.targets[a].target.key().cmp(self.targets[b].target.key()));

        let pick = |src: &[TxOutput]| order.iter().map(|&i| src[i].clone()).collect::<Vec<_>>();
        let targets = pick(&self.targets);
        (
            SortedOutputs {
                targets,
                masks: order.iter().map(|&i| self.masks[i]).collect(),
                amounts: order.iter().map(|&i| self.amounts[i]).collect(),
                encrypted_amounts: order.iter().map(|&i| self.encrypted_amounts[i]).collect(),
                commitments: order.iter().map(|&i| self.commitments[i]).collect(),
                tx_pubkey: self.carrot_tx_pubkey.or(self.legacy_tx_pubkey),
            },
            order,
        )
    }
}

/// `[10, 50, 80]` -> `[10, 40, 30]`.
pub fn absolute_to_relative(indices: &[u64]) -> Vec<u64> {
    let mut out = Vec::with_capacity(indices.len());
    let mut prev = 0;
    for (i, &idx) in indices.iter().enumerate() {
        out.push(if i == 0 { idx } else { idx - prev });
        prev = idx;
    }
    out
}

/// Inverse of [`absolute_to_relative`].
pub fn relative_to_absolute(offsets: &[u64]) -> Vec<u64> {
    let mut out = Vec::with_capacity(offsets.len());
    let mut sum = 0;
    for &off in offsets {
        sum += off;
        out.push(sum);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_input(amount: u64) -> PreparedInput {
        let secret = random_scalar();
        let public_key = compress(&scalar_mul_base(&secret));
        let ring_size = salvium_light_types::constants::DEFAULT_RING_SIZE;
        let real_index = 5;

        let mut ring: Vec<[u8; 32]> = (0..ring_size)
            .map(|_| compress(&scalar_mul_base(&random_scalar())))
            .collect();
        ring[real_index] = public_key;

        let mask = random_scalar();
        let mut ring_commitments: Vec<[u8; 32]> = (0..ring_size)
            .map(|_| compress(&scalar_mul_base(&random_scalar())))
            .collect();
        ring_commitments[real_index] = pedersen_commit(amount, &mask);

        PreparedInput {
            secret_key: secret,
            secret_key_y: Some(random_scalar()),
            public_key,
            amount,
            mask,
            asset_type: AssetType::Sal1,
            global_index: 500,
            ring,
            ring_commitments,
            ring_indices: (0..ring_size as u64).map(|i| i * 100).collect(),
            real_index,
        }
    }

    fn test_destination(amount: u64) -> Destination {
        let keys = salvium_light_crypto::carrot::CarrotKeys::from_master(&[0x61u8; 32]);
        Destination {
            spend_pubkey: keys.account_spend_pubkey,
            view_pubkey: keys.account_view_pubkey,
            amount,
            asset_type: AssetType::Sal1,
            payment_id: [0u8; 8],
        }
    }

    #[test]
    fn offsets_roundtrip() {
        assert_eq!(absolute_to_relative(&[10, 50, 80, 100]), vec![10, 40, 30, 20]);
        assert_eq!(relative_to_absolute(&[10, 40, 30, 20]), vec![10, 50, 80, 100]);
        let abs = vec![100, 200, 350, 400];
        assert_eq!(relative_to_absolute(&absolute_to_relative(&abs)), abs);
        assert!(absolute_to_relative(&[]).is_empty());
    }

    #[test]
    fn no_destinations_rejected() {
        let result = TransactionBuilder::new().add_input(test_input(1_000_000_000)).build();
        assert!(matches!(result, Err(TxError::NoDestinations)));
    }

    #[test]
    fn no_inputs_rejected() {
        let result = TransactionBuilder::new()
            .add_destination(test_destination(1))
            .build();
        assert!(matches!(result, Err(TxError::InsufficientInputs { .. })));
    }

    #[test]
    fn insufficient_funds_rejected() {
        let result = TransactionBuilder::new()
            .add_input(test_input(100))
            .add_destination(test_destination(1_000_000_000))
            .change_address([0x31; 32], [0x32; 32])
            .build();
        assert!(matches!(result, Err(TxError::InsufficientInputs { .. })));
    }

    #[test]
    fn ring_size_mismatch_rejected() {
        let good = test_input(5_000_000_000);
        let mut bad = test_input(5_000_000_000);
        bad.ring.truncate(8);
        bad.ring_commitments.truncate(8);
        bad.ring_indices.truncate(8);
        bad.real_index = 5;

        let result = TransactionBuilder::new()
            .add_inputs([good, bad])
            .add_destination(test_destination(1))
            .change_address([0x31; 32], [0x32; 32])
            .build();
        assert!(matches!(result, Err(TxError::RingSizeMismatch { .. })));
    }

    #[test]
    fn carrot_transfer_shape() {
        let change = salvium_light_crypto::carrot::CarrotKeys::from_master(&[0x62u8; 32]);
        let unsigned = TransactionBuilder::new()
            .add_input(test_input(10_000_000_000))
            .add_destination(test_destination(1_000_000_000))
            .change_address(change.account_spend_pubkey, change.account_view_pubkey)
            .build()
            .unwrap();

        assert_eq!(unsigned.prefix.version, 4);
        assert_eq!(unsigned.rct_type, RctType::SalviumOne);
        // Payment plus change.
        assert_eq!(unsigned.prefix.outputs.len(), 2);
        assert!(unsigned
            .prefix
            .outputs
            .iter()
            .all(|o| matches!(o.target, TxOutputTarget::CarrotV1 { .. })));
        // Outputs sorted by one-time key.
        assert!(unsigned
            .prefix
            .outputs
            .windows(2)
            .all(|w| w[0].target.key() <= w[1].target.key()));
        // Amount balance: inputs = outputs + fee.
        let out_sum: u64 = unsigned.output_amounts.iter().sum();
        assert_eq!(out_sum + unsigned.fee, 10_000_000_000);
        // Extra starts with the tx pubkey tag.
        assert_eq!(unsigned.prefix.extra[0], wire::EXTRA_TX_PUBKEY);
        assert_eq!(unsigned.prefix.extra.len(), 33);
    }

    #[test]
    fn legacy_transfer_uses_tagged_outputs() {
        let unsigned = TransactionBuilder::new()
            .protocol(RctType::BulletproofPlus, 3)
            .add_input({
                let mut input = test_input(10_000_000_000);
                input.secret_key_y = None;
                input
            })
            .add_destination(test_destination(1_000_000_000))
            .change_address(
                compress(&scalar_mul_base(&random_scalar())),
                compress(&scalar_mul_base(&random_scalar())),
            )
            .build()
            .unwrap();

        assert_eq!(unsigned.prefix.version, 3);
        assert!(unsigned
            .prefix
            .outputs
            .iter()
            .all(|o| matches!(o.target, TxOutputTarget::TaggedKey { .. })));
        // v3 TRANSFER carries the return list and mask, one entry per output.
        let list = unsigned.prefix.return_address_list.as_ref().unwrap();
        let mask = unsigned.prefix.return_address_change_mask.as_ref().unwrap();
        assert_eq!(list.len(), unsigned.prefix.outputs.len());
        assert_eq!(mask.iter().filter(|&&b| b == 1).count(), 1);
    }

    #[test]
    fn burn_has_no_payment_outputs() {
        let change = salvium_light_crypto::carrot::CarrotKeys::from_master(&[0x63u8; 32]);
        let unsigned = TransactionBuilder::new()
            .tx_type(TxType::Burn)
            .amount_burnt(2_000_000_000)
            .asset_types(AssetType::Sal1, AssetType::Burn)
            .add_input(test_input(10_000_000_000))
            .change_address(change.account_spend_pubkey, change.account_view_pubkey)
            .build()
            .unwrap();

        // Only the change output exists; the burnt amount is a prefix field.
        assert_eq!(unsigned.prefix.outputs.len(), 1);
        assert_eq!(unsigned.prefix.amount_burnt, 2_000_000_000);
        assert_eq!(unsigned.prefix.destination_asset_type, AssetType::Burn);
        let out_sum: u64 = unsigned.output_amounts.iter().sum();
        assert_eq!(out_sum + unsigned.fee + 2_000_000_000, 10_000_000_000);
    }

    #[test]
    fn v4_stake_carries_protocol_tx_data() {
        let change = salvium_light_crypto::carrot::CarrotKeys::from_master(&[0x64u8; 32]);
        let unsigned = TransactionBuilder::new()
            .tx_type(TxType::Stake)
            .amount_burnt(5_000_000_000)
            .add_input(test_input(10_000_000_000))
            .change_address(change.account_spend_pubkey, change.account_view_pubkey)
            .build()
            .unwrap();
        let data = unsigned.prefix.protocol_tx_data.as_ref().unwrap();
        assert_eq!(data.version, 1);
        assert_ne!(data.return_address, [0u8; 32]);
    }

    #[test]
    fn legacy_stake_derives_return_address() {
        let view_secret = random_scalar();
        let unsigned = TransactionBuilder::new()
            .protocol(RctType::SalviumZero, 2)
            .tx_type(TxType::Stake)
            .amount_burnt(1_000_000_000)
            .view_secret_key(view_secret)
            .add_input({
                let mut input = test_input(10_000_000_000);
                input.secret_key_y = None;
                input
            })
            .change_address(
                compress(&scalar_mul_base(&random_scalar())),
                compress(&scalar_mul_base(&random_scalar())),
            )
            .build()
            .unwrap();
        assert!(unsigned.prefix.return_address.is_some());
        assert!(unsigned.prefix.return_pubkey.is_some());
        assert!(unsigned.prefix.protocol_tx_data.is_none());
    }

    #[test]
    fn inputs_sorted_by_key_image_descending() {
        let change = salvium_light_crypto::carrot::CarrotKeys::from_master(&[0x65u8; 32]);
        let unsigned = TransactionBuilder::new()
            .add_inputs([test_input(6_000_000_000), test_input(6_000_000_000)])
            .add_destination(test_destination(1_000_000_000))
            .change_address(change.account_spend_pubkey, change.account_view_pubkey)
            .build()
            .unwrap();

        let images: Vec<[u8; 32]> = unsigned
            .prefix
            .inputs
            .iter()
            .map(|i| match i {
                TxInput::Key { key_image, .. } => *key_image,
                _ => panic!("unexpected input"),
            })
            .collect();
        assert!(images.windows(2).all(|w| w[0] >= w[1]));
    }
}
