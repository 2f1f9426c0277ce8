//! CARROT output recognition.
//!
//! The full receive-side pipeline for one enote: 3-byte view-tag filter,
//! contextualized sender-receiver secret, address-spend-pubkey recovery,
//! amount decryption, commitment re-verification (payment then change enote
//! type), and the dual spend-key derivation used by TCLSAG.
//!
//! Two entry points: `scan_output` runs the X25519 ECDH first; internal
//! (self-send) enotes use the view-balance secret directly as the
//! uncontextualized secret and skip the ladder.

use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::VartimeMultiscalarMul;

use crate::carrot::{build_transcript, derive_bytes_32, derive_scalar};
use crate::subaddress::SubaddressMap;
use crate::x25519;
use crate::{blake2b_keyed, compress, decompress, h_point, t_point};

const DOMAIN_VIEW_TAG: &[u8] = b"Carrot view tag";
const DOMAIN_SENDER_RECEIVER_SECRET: &[u8] = b"Carrot sender-receiver secret";
const DOMAIN_COMMITMENT_MASK: &[u8] = b"Carrot commitment mask";
const DOMAIN_EXTENSION_G: &[u8] = b"Carrot key extension G";
const DOMAIN_EXTENSION_T: &[u8] = b"Carrot key extension T";
const DOMAIN_ENCRYPTION_MASK_AMOUNT: &[u8] = b"Carrot encryption mask a";

/// Enote classification recovered during scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnoteType {
    Payment = 0,
    Change = 1,
}

/// One recognized CARROT enote.
pub struct CarrotScanResult {
    pub amount: u64,
    pub mask: Scalar,
    pub enote_type: EnoteType,
    /// Contextualized sender-receiver secret; required later for spending.
    pub shared_secret: [u8; 32],
    pub address_spend_pubkey: [u8; 32],
    pub subaddress_major: u32,
    pub subaddress_minor: u32,
}

/// An enote as it appears on chain, plus its transaction's input context.
pub struct CarrotEnote<'a> {
    pub onetime_address: [u8; 32],
    pub view_tag: [u8; 3],
    /// Ephemeral X25519 pubkey D_e from the tx extra.
    pub ephemeral_pubkey: [u8; 32],
    pub encrypted_amount: [u8; 8],
    /// Amount commitment; absent on coinbase enotes.
    pub commitment: Option<[u8; 32]>,
    /// `'R' || first_key_image` or `'C' || height` (33 bytes).
    pub input_context: &'a [u8],
    /// Cleartext amount for coinbase enotes.
    pub cleartext_amount: Option<u64>,
}

/// 3-byte view tag over the uncontextualized secret.
pub fn compute_view_tag(s_sr_unctx: &[u8; 32], input_context: &[u8], ko: &[u8; 32]) -> [u8; 3] {
    let transcript = build_transcript(DOMAIN_VIEW_TAG, &[input_context, ko]);
    let hash = blake2b_keyed(&transcript, 3, s_sr_unctx);
    [hash[0], hash[1], hash[2]]
}

/// `s^ctx_sr = H_32[s_sr](D_e || input_context)`.
pub fn sender_receiver_secret(
    s_sr_unctx: &[u8; 32],
    ephemeral_pubkey: &[u8; 32],
    input_context: &[u8],
) -> [u8; 32] {
    derive_bytes_32(
        s_sr_unctx,
        DOMAIN_SENDER_RECEIVER_SECRET,
        &[ephemeral_pubkey, input_context],
    )
}

fn extension_g(s_sr_ctx: &[u8; 32], commitment: &[u8; 32]) -> Scalar {
    derive_scalar(s_sr_ctx, DOMAIN_EXTENSION_G, &[commitment])
}

fn extension_t(s_sr_ctx: &[u8; 32], commitment: &[u8; 32]) -> Scalar {
    derive_scalar(s_sr_ctx, DOMAIN_EXTENSION_T, &[commitment])
}

/// `K^j_s = Ko - (k^o_g * G + k^o_t * T)`.
pub fn recover_address_spend_pubkey(
    ko: &[u8; 32],
    s_sr_ctx: &[u8; 32],
    commitment: &[u8; 32],
) -> Option<[u8; 32]> {
    let ext = EdwardsPoint::vartime_multiscalar_mul(
        [extension_g(s_sr_ctx, commitment), extension_t(s_sr_ctx, commitment)],
        [ED25519_BASEPOINT_POINT, t_point()],
    );
    let ko_pt = decompress(ko).ok()?;
    Some(compress(&(ko_pt - ext)))
}

/// XOR-decrypt the 8-byte amount.
pub fn decrypt_amount(enc_amount: &[u8; 8], s_sr_ctx: &[u8; 32], ko: &[u8; 32]) -> u64 {
    let transcript = build_transcript(DOMAIN_ENCRYPTION_MASK_AMOUNT, &[ko]);
    let mask = blake2b_keyed(&transcript, 8, s_sr_ctx);
    let mut clear = [0u8; 8];
    for i in 0..8 {
        clear[i] = enc_amount[i] ^ mask[i];
    }
    u64::from_le_bytes(clear)
}

/// Deterministic commitment mask for an enote.
pub fn commitment_mask(
    s_sr_ctx: &[u8; 32],
    amount: u64,
    address_spend_pubkey: &[u8; 32],
    enote_type: EnoteType,
) -> Scalar {
    derive_scalar(
        s_sr_ctx,
        DOMAIN_COMMITMENT_MASK,
        &[&amount.to_le_bytes(), address_spend_pubkey, &[enote_type as u8]],
    )
}

fn commit(amount: u64, mask: &Scalar) -> [u8; 32] {
    compress(&EdwardsPoint::vartime_multiscalar_mul(
        [*mask, Scalar::from(amount)],
        [ED25519_BASEPOINT_POINT, h_point()],
    ))
}

fn scan_with_secret(
    s_sr_unctx: &[u8; 32],
    enote: &CarrotEnote,
    account_spend_pubkey: &[u8; 32],
    subaddresses: &SubaddressMap,
) -> Option<CarrotScanResult> {
    // View-tag fast reject.
    if compute_view_tag(s_sr_unctx, enote.input_context, &enote.onetime_address) != enote.view_tag {
        return None;
    }

    let s_sr_ctx =
        sender_receiver_secret(s_sr_unctx, &enote.ephemeral_pubkey, enote.input_context);

    // Recover the address the sender targeted.
    let commitment_bytes = enote.commitment.unwrap_or([0u8; 32]);
    let recovered =
        recover_address_spend_pubkey(&enote.onetime_address, &s_sr_ctx, &commitment_bytes)?;

    // Ownership test against the lookahead table.
    let (major, minor) = if recovered == *account_spend_pubkey {
        (0, 0)
    } else {
        subaddresses.lookup(&recovered)?
    };

    let amount = match enote.cleartext_amount {
        Some(v) => v,
        None => decrypt_amount(&enote.encrypted_amount, &s_sr_ctx, &enote.onetime_address),
    };

    // Re-verify the commitment, trying payment then change. An enote whose
    // commitment matches neither is not ours (or is malformed) and is dropped.
    let (mask, enote_type) = match enote.commitment {
        None => (commitment_mask(&s_sr_ctx, amount, &recovered, EnoteType::Payment), EnoteType::Payment),
        Some(c) => {
            let payment = commitment_mask(&s_sr_ctx, amount, &recovered, EnoteType::Payment);
            if commit(amount, &payment) == c {
                (payment, EnoteType::Payment)
            } else {
                let change = commitment_mask(&s_sr_ctx, amount, &recovered, EnoteType::Change);
                if commit(amount, &change) == c {
                    (change, EnoteType::Change)
                } else {
                    return None;
                }
            }
        }
    };

    Some(CarrotScanResult {
        amount,
        mask,
        enote_type,
        shared_secret: s_sr_ctx,
        address_spend_pubkey: recovered,
        subaddress_major: major,
        subaddress_minor: minor,
    })
}

/// Standard scan: X25519 ECDH with the incoming view key, then the core
/// pipeline.
pub fn scan_output(
    enote: &CarrotEnote,
    view_incoming_key: &Scalar,
    account_spend_pubkey: &[u8; 32],
    subaddresses: &SubaddressMap,
) -> Option<CarrotScanResult> {
    let clamped = x25519::clamp_salvium(&view_incoming_key.to_bytes());
    let s_sr_unctx = x25519::ladder(&clamped, &enote.ephemeral_pubkey);
    scan_with_secret(&s_sr_unctx, enote, account_spend_pubkey, subaddresses)
}

/// Self-send scan: the view-balance secret stands in for the ECDH result.
pub fn scan_internal_output(
    enote: &CarrotEnote,
    view_balance_secret: &[u8; 32],
    account_spend_pubkey: &[u8; 32],
    subaddresses: &SubaddressMap,
) -> Option<CarrotScanResult> {
    scan_with_secret(view_balance_secret, enote, account_spend_pubkey, subaddresses)
}

/// Dual spend keys for a recognized enote:
/// `x = k_gi + k^o_g` (G column), `y = k_ps + k^o_t` (T column).
pub fn derive_spend_keys(
    prove_spend_key: &Scalar,
    generate_image_key: &Scalar,
    s_sr_ctx: &[u8; 32],
    commitment: &[u8; 32],
) -> (Scalar, Scalar) {
    let x = generate_image_key + extension_g(s_sr_ctx, commitment);
    let y = prove_spend_key + extension_t(s_sr_ctx, commitment);
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random_scalar;

    fn rct_context(key_image: &[u8; 32]) -> Vec<u8> {
        let mut ctx = Vec::with_capacity(33);
        ctx.push(b'R');
        ctx.extend_from_slice(key_image);
        ctx
    }

    #[test]
    fn view_tag_deterministic_and_context_bound() {
        let s = [0x42u8; 32];
        let ko = compress(&crate::scalar_mul_base(&Scalar::from(5u64)));
        let ctx_a = rct_context(&[0xaa; 32]);
        let ctx_b = rct_context(&[0xbb; 32]);

        assert_eq!(compute_view_tag(&s, &ctx_a, &ko), compute_view_tag(&s, &ctx_a, &ko));
        assert_ne!(compute_view_tag(&s, &ctx_a, &ko), compute_view_tag(&s, &ctx_b, &ko));
    }

    #[test]
    fn amount_encryption_roundtrip() {
        let s_ctx = [0x55u8; 32];
        let ko = [0x58u8; 32];
        let amount = 123_456_789u64;

        let transcript = build_transcript(DOMAIN_ENCRYPTION_MASK_AMOUNT, &[&ko]);
        let mask = blake2b_keyed(&transcript, 8, &s_ctx);
        let mut enc = [0u8; 8];
        for (i, b) in amount.to_le_bytes().iter().enumerate() {
            enc[i] = b ^ mask[i];
        }

        assert_eq!(decrypt_amount(&enc, &s_ctx, &ko), amount);
    }

    #[test]
    fn commitment_mask_separates_enote_types() {
        let s_ctx = [0x33u8; 32];
        let addr = [0x58u8; 32];
        let payment = commitment_mask(&s_ctx, 1000, &addr, EnoteType::Payment);
        let change = commitment_mask(&s_ctx, 1000, &addr, EnoteType::Change);
        assert_ne!(payment, change);
    }

    #[test]
    fn wrong_view_tag_rejects_before_any_curve_work() {
        let enote = CarrotEnote {
            onetime_address: compress(&crate::scalar_mul_base(&random_scalar())),
            view_tag: [0xff, 0xff, 0xff],
            ephemeral_pubkey: [9u8; 32],
            encrypted_amount: [0u8; 8],
            commitment: None,
            input_context: &rct_context(&[1; 32]),
            cleartext_amount: None,
        };
        let result = scan_internal_output(
            &enote,
            &[0x42; 32],
            &[0x01; 32],
            &SubaddressMap::empty(),
        );
        assert!(result.is_none());
    }

    #[test]
    fn spend_keys_reconstruct_onetime_address() {
        // Sender side: Ko = K_s + ext_g*G + ext_t*T for our own account;
        // receiver's derive_spend_keys must open it on the dual base.
        let keys = crate::carrot::CarrotKeys::from_master(&[7u8; 32]);
        let s_sr_ctx = [0x21u8; 32];
        let commitment = commit(500, &Scalar::from(3u64));

        let ko = {
            let spend_pt = decompress(&keys.account_spend_pubkey).unwrap();
            let ext = EdwardsPoint::vartime_multiscalar_mul(
                [extension_g(&s_sr_ctx, &commitment), extension_t(&s_sr_ctx, &commitment)],
                [ED25519_BASEPOINT_POINT, t_point()],
            );
            compress(&(spend_pt + ext))
        };

        let (x, y) = derive_spend_keys(
            &keys.prove_spend_key.unwrap(),
            &keys.generate_image_key,
            &s_sr_ctx,
            &commitment,
        );
        assert_eq!(crate::tclsag::tclsag_public_key(&x, &y), ko);

        // And the recovery direction gives back the account spend key.
        assert_eq!(
            recover_address_spend_pubkey(&ko, &s_sr_ctx, &commitment).unwrap(),
            keys.account_spend_pubkey
        );
    }
}
