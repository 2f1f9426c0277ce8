//! Signing pipeline.
//!
//! Turns an [`UnsignedTransaction`] into a broadcastable [`Transaction`]:
//! pseudo-output commitments balanced against the output masks, one
//! aggregated Bulletproofs+ proof, the RCT message hash, and a CLSAG or
//! TCLSAG ring signature per input.

use curve25519_dalek::scalar::Scalar;

use salvium_light_crypto::bulletproofs_plus;
use salvium_light_crypto::{clsag, keccak256, keccak256_parts, pedersen_commit, random_scalar, tclsag};
use salvium_light_types::RctType;

use crate::builder::{PreparedInput, UnsignedTransaction};
use crate::serialize::{serialize_prefix, serialize_rct_base};
use crate::types::*;
use crate::TxError;

/// Compressed Ed25519 identity: the p_r commitment of a balanced transaction.
const IDENTITY_POINT: [u8; 32] = {
    let mut p = [0u8; 32];
    p[0] = 0x01;
    p
};

/// Sign all inputs and assemble the final transaction.
pub fn sign_transaction(unsigned: UnsignedTransaction) -> Result<Transaction, TxError> {
    if unsigned.inputs.is_empty() {
        return Err(TxError::Signing("no inputs".into()));
    }
    if unsigned.output_amounts.is_empty() {
        return Err(TxError::Signing("no outputs".into()));
    }
    let use_tclsag = unsigned.rct_type >= RctType::SalviumOne;

    let prefix_hash = keccak256(&serialize_prefix(&unsigned.prefix));

    let ecdh_info: Vec<EcdhInfo> = unsigned
        .encrypted_amounts
        .iter()
        .map(|amount| EcdhInfo { amount: *amount })
        .collect();

    // Pseudo-outs: random masks except the last, which balances
    // sum(pseudo) == sum(output masks) so the fee term stays public.
    let (pseudo_masks, pseudo_outs) =
        balanced_pseudo_outputs(&unsigned.inputs, &unsigned.output_masks);

    // Aggregated range proof over all outputs.
    let bp = bulletproofs_plus::prove(&unsigned.output_amounts, &unsigned.output_masks);
    let bp_data = BpPlusData {
        a: bp.a.compress().to_bytes(),
        a1: bp.a1.compress().to_bytes(),
        b: bp.b.compress().to_bytes(),
        r1: bp.r1.to_bytes(),
        s1: bp.s1.to_bytes(),
        d1: bp.d1.to_bytes(),
        l: bp.l.iter().map(|p| p.compress().to_bytes()).collect(),
        r: bp.r.iter().map(|p| p.compress().to_bytes()).collect(),
    };

    // Balanced transactions commit to a zero blinding difference.
    let salvium_data = match unsigned.rct_type {
        RctType::SalviumZero | RctType::SalviumOne => Some(SalviumData {
            data_type: if unsigned.rct_type == RctType::SalviumOne { 2 } else { 0 },
            pr_proof: ZkProof::zero(),
            sa_proof: ZkProof::zero(),
        }),
        RctType::FullProofs => Some(SalviumData {
            data_type: 0,
            pr_proof: ZkProof::zero(),
            sa_proof: ZkProof::zero(),
        }),
        _ => None,
    };

    let mut rct = RctSignatures {
        rct_type: unsigned.rct_type,
        txn_fee: unsigned.fee,
        ecdh_info,
        out_pk: unsigned.output_commitments.clone(),
        p_r: IDENTITY_POINT,
        salvium_data,
        bulletproof_plus: vec![bp_data],
        clsags: Vec::new(),
        tclsags: Vec::new(),
        pseudo_outs: pseudo_outs.clone(),
    };

    // Message = H(prefix_hash || H(rct_base) || H(bp_components)).
    let message = rct_message(&prefix_hash, &rct);

    for (input, (pseudo_mask, pseudo_out)) in unsigned
        .inputs
        .iter()
        .zip(pseudo_masks.iter().zip(pseudo_outs.iter()))
    {
        // The commitment column proves knowledge of mask - pseudo_mask.
        let z = input.mask - pseudo_mask;

        if use_tclsag {
            let secret_y = input
                .secret_key_y
                .ok_or_else(|| TxError::Signing("TCLSAG input without T-column secret".into()))?;
            let sig = tclsag::tclsag_sign(
                &message,
                &input.ring,
                &input.secret_key,
                &secret_y,
                &input.ring_commitments,
                &z,
                pseudo_out,
                input.real_index,
            )?;
            rct.tclsags.push(TclsagData {
                sx: sig.sx,
                sy: sig.sy,
                c1: sig.c1,
                d: sig.commitment_image,
            });
        } else {
            let sig = clsag::clsag_sign(
                &message,
                &input.ring,
                &input.secret_key,
                &input.ring_commitments,
                &z,
                pseudo_out,
                input.real_index,
            )?;
            rct.clsags.push(ClsagData {
                s: sig.s,
                c1: sig.c1,
                d: sig.commitment_image,
            });
        }
    }

    Ok(Transaction {
        prefix: unsigned.prefix,
        rct: Some(rct),
    })
}

/// Pseudo-output masks summing to the output-mask sum, plus their
/// commitments `C'_i = mask'_i*G + amount_i*H`.
fn balanced_pseudo_outputs(
    inputs: &[PreparedInput],
    output_masks: &[Scalar],
) -> (Vec<Scalar>, Vec<[u8; 32]>) {
    let target: Scalar = output_masks.iter().sum();
    let n = inputs.len();

    let mut masks = Vec::with_capacity(n);
    let mut partial = Scalar::ZERO;
    for _ in 0..n - 1 {
        let mask = random_scalar();
        partial += mask;
        masks.push(mask);
    }
    masks.push(target - partial);

    let commitments = inputs
        .iter()
        .zip(&masks)
        .map(|(input, mask)| pedersen_commit(input.amount, mask))
        .collect();
    (masks, commitments)
}

/// Pre-ring-signature message hash.
fn rct_message(prefix_hash: &[u8; 32], rct: &RctSignatures) -> [u8; 32] {
    let base_hash = keccak256(&serialize_rct_base(rct));
    let bp_hash = keccak256(&bp_components(rct));
    keccak256_parts(&[prefix_hash, &base_hash, &bp_hash])
}

/// The prunable pieces hashed into the message: BP+ elements only (the ring
/// signatures do not exist yet when the message is formed).
fn bp_components(rct: &RctSignatures) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1024);
    for proof in &rct.bulletproof_plus {
        buf.extend_from_slice(&proof.a);
        buf.extend_from_slice(&proof.a1);
        buf.extend_from_slice(&proof.b);
        buf.extend_from_slice(&proof.r1);
        buf.extend_from_slice(&proof.s1);
        buf.extend_from_slice(&proof.d1);
        for p in &proof.l {
            buf.extend_from_slice(p);
        }
        for p in &proof.r {
            buf.extend_from_slice(p);
        }
    }
    buf
}

/// Verify every ring signature in a signed transaction against its rings.
/// Used by tests and pre-broadcast sanity checks.
pub fn verify_ring_signatures(
    tx: &Transaction,
    rings: &[Vec<[u8; 32]>],
    ring_commitments: &[Vec<[u8; 32]>],
) -> bool {
    let Some(rct) = &tx.rct else {
        return false;
    };
    let prefix_hash = keccak256(&serialize_prefix(&tx.prefix));
    let message = rct_message(&prefix_hash, rct);

    if rct.rct_type >= RctType::SalviumOne {
        if rct.tclsags.len() != rings.len() {
            return false;
        }
        rct.tclsags
            .iter()
            .zip(rings.iter().zip(ring_commitments))
            .zip(&rct.pseudo_outs)
            .enumerate()
            .all(|(i, ((sig, (ring, commitments)), pseudo))| {
                let full = tclsag::TclsagSignature {
                    sx: sig.sx.clone(),
                    sy: sig.sy.clone(),
                    c1: sig.c1,
                    key_image: key_image_of(tx, i),
                    commitment_image: sig.d,
                };
                tclsag::tclsag_verify(&message, &full, ring, commitments, pseudo)
            })
    } else {
        if rct.clsags.len() != rings.len() {
            return false;
        }
        rct.clsags
            .iter()
            .zip(rings.iter().zip(ring_commitments))
            .zip(&rct.pseudo_outs)
            .enumerate()
            .all(|(i, ((sig, (ring, commitments)), pseudo))| {
                let full = clsag::ClsagSignature {
                    s: sig.s.clone(),
                    c1: sig.c1,
                    key_image: key_image_of(tx, i),
                    commitment_image: sig.d,
                };
                clsag::clsag_verify(&message, &full, ring, commitments, pseudo)
            })
    }
}

fn key_image_of(tx: &Transaction, input_index: usize) -> [u8; 32] {
    match &tx.prefix.inputs[input_index] {
        TxInput::Key { key_image, .. } => *key_image,
        TxInput::Gen { .. } => [0u8; 32],
    }
}
