//! CARROT enote construction (sender side).
//!
//! Derives the per-enote ephemeral key from a random Janus anchor, runs the
//! X25519 ECDH against the recipient's view key, and produces the one-time
//! address on the dual base along with the view tag and all encrypted
//! fields. The receiver pipeline in `salvium_light_crypto::carrot_scan`
//! mirrors every derivation here.

use curve25519_dalek::scalar::Scalar;

use salvium_light_crypto::carrot::{build_transcript, derive_bytes_32, derive_scalar};
use salvium_light_crypto::carrot_scan::{compute_view_tag, EnoteType};
use salvium_light_crypto::{
    blake2b, blake2b_keyed, decompress, pedersen_commit, reduce64, scalar_mul_base, t_point,
    x25519,
};

use crate::TxError;

mod domain {
    pub const EPHEMERAL_PRIVKEY: &[u8] = b"Carrot sending key normal";
    pub const SENDER_RECEIVER_SECRET: &[u8] = b"Carrot sender-receiver secret";
    pub const COMMITMENT_MASK: &[u8] = b"Carrot commitment mask";
    pub const EXTENSION_G: &[u8] = b"Carrot key extension G";
    pub const EXTENSION_T: &[u8] = b"Carrot key extension T";
    pub const ENCRYPTION_MASK_ANCHOR: &[u8] = b"Carrot encryption mask anchor";
    pub const ENCRYPTION_MASK_AMOUNT: &[u8] = b"Carrot encryption mask a";
    pub const ENCRYPTION_MASK_PAYMENT_ID: &[u8] = b"Carrot encryption mask pid";
}

/// A constructed enote plus everything the builder needs to account for it.
#[derive(Debug, Clone)]
pub struct CarrotOutput {
    pub onetime_address: [u8; 32],
    pub amount_commitment: [u8; 32],
    pub commitment_mask: Scalar,
    pub encrypted_amount: [u8; 8],
    pub view_tag: [u8; 3],
    pub encrypted_anchor: [u8; 16],
    pub encrypted_payment_id: [u8; 8],
    /// X25519 ephemeral pubkey D_e for the tx extra.
    pub ephemeral_pubkey: [u8; 32],
}

pub struct CarrotOutputParams<'a> {
    pub recipient_spend_pubkey: &'a [u8; 32],
    pub recipient_view_pubkey: &'a [u8; 32],
    pub amount: u64,
    /// 33 bytes: `'R' || first key image` or `'C' || height`.
    pub input_context: &'a [u8],
    pub enote_type: EnoteType,
    pub payment_id: [u8; 8],
}

/// `'R' || first_key_image`.
pub fn input_context_rct(first_key_image: &[u8; 32]) -> Vec<u8> {
    let mut ctx = Vec::with_capacity(33);
    ctx.push(b'R');
    ctx.extend_from_slice(first_key_image);
    ctx
}

/// `'C' || height_le || zero padding` (33 bytes).
pub fn input_context_coinbase(block_height: u64) -> Vec<u8> {
    let mut ctx = vec![0u8; 33];
    ctx[0] = b'C';
    ctx[1..9].copy_from_slice(&block_height.to_le_bytes());
    ctx
}

fn random_anchor() -> [u8; 16] {
    let mut anchor = [0u8; 16];
    getrandom::getrandom(&mut anchor).expect("OS randomness unavailable");
    anchor
}

fn xor_into<const N: usize>(data: &[u8; N], mask: &[u8]) -> [u8; N] {
    let mut out = *data;
    for i in 0..N {
        out[i] ^= mask[i];
    }
    out
}

/// Build one CARROT v1 enote.
pub fn create_carrot_output(params: &CarrotOutputParams) -> Result<CarrotOutput, TxError> {
    let anchor = random_anchor();

    // d_e = H_n(anchor || input_context || K_s || payment_id), unkeyed.
    let mut seed = Vec::with_capacity(16 + params.input_context.len() + 32 + 8);
    seed.extend_from_slice(&anchor);
    seed.extend_from_slice(params.input_context);
    seed.extend_from_slice(params.recipient_spend_pubkey);
    seed.extend_from_slice(&params.payment_id);
    let transcript = build_transcript(domain::EPHEMERAL_PRIVKEY, &[&seed]);
    let d_e = {
        let wide: [u8; 64] = blake2b(&transcript, 64)
            .try_into()
            .expect("blake2b returns the requested length");
        reduce64(&wide)
    };
    let d_e_bytes = d_e.to_bytes();

    // D_e = d_e * ConvertPointE(K_s). The spend key is the base for every
    // address kind: with the view key tied as K_v = k_vi * K_s, the
    // receiver's k_vi * D_e lands on the same Montgomery point as our
    // d_e * ConvertPointE(K_v) below.
    let spend_u = x25519::edwards_to_montgomery_u(params.recipient_spend_pubkey);
    let ephemeral_pubkey = x25519::ladder(&d_e_bytes, &spend_u);

    // s_sr = d_e * ConvertPointE(K_v), then contextualize.
    let view_u = x25519::edwards_to_montgomery_u(params.recipient_view_pubkey);
    let s_sr_unctx = x25519::ladder(&d_e_bytes, &view_u);
    let s_sr_ctx = derive_bytes_32(
        &s_sr_unctx,
        domain::SENDER_RECEIVER_SECRET,
        &[&ephemeral_pubkey, params.input_context],
    );

    // Commitment mask and amount commitment.
    let commitment_mask = derive_scalar(
        &s_sr_ctx,
        domain::COMMITMENT_MASK,
        &[
            &params.amount.to_le_bytes(),
            params.recipient_spend_pubkey,
            &[params.enote_type as u8],
        ],
    );
    let amount_commitment = pedersen_commit(params.amount, &commitment_mask);

    // Ko = K_s + k^o_g*G + k^o_t*T.
    let ext_g = derive_scalar(&s_sr_ctx, domain::EXTENSION_G, &[&amount_commitment]);
    let ext_t = derive_scalar(&s_sr_ctx, domain::EXTENSION_T, &[&amount_commitment]);
    let spend_pt = decompress(params.recipient_spend_pubkey)
        .map_err(|e| TxError::CarrotOutput(e.to_string()))?;
    let onetime_address = salvium_light_crypto::compress(
        &(spend_pt + scalar_mul_base(&ext_g) + ext_t * t_point()),
    );

    // View tag binds the uncontextualized secret to (input context, Ko).
    let view_tag = compute_view_tag(&s_sr_unctx, params.input_context, &onetime_address);

    // Encrypted fields, all XOR streams keyed by s_sr_ctx.
    let anchor_mask = blake2b_keyed(
        &build_transcript(domain::ENCRYPTION_MASK_ANCHOR, &[&onetime_address]),
        16,
        &s_sr_ctx,
    );
    let amount_mask = blake2b_keyed(
        &build_transcript(domain::ENCRYPTION_MASK_AMOUNT, &[&onetime_address]),
        8,
        &s_sr_ctx,
    );
    let pid_mask = blake2b_keyed(
        &build_transcript(domain::ENCRYPTION_MASK_PAYMENT_ID, &[&onetime_address]),
        8,
        &s_sr_ctx,
    );

    Ok(CarrotOutput {
        onetime_address,
        amount_commitment,
        commitment_mask,
        encrypted_amount: xor_into(&params.amount.to_le_bytes(), &amount_mask),
        view_tag,
        encrypted_anchor: xor_into(&anchor, &anchor_mask),
        encrypted_payment_id: xor_into(&params.payment_id, &pid_mask),
        ephemeral_pubkey,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvium_light_crypto::carrot::CarrotKeys;
    use salvium_light_crypto::carrot_scan::{self, CarrotEnote};
    use salvium_light_crypto::subaddress::SubaddressMap;

    #[test]
    fn input_contexts() {
        let ctx = input_context_rct(&[0xaa; 32]);
        assert_eq!(ctx.len(), 33);
        assert_eq!(ctx[0], b'R');
        assert_eq!(&ctx[1..], &[0xaa; 32]);

        let ctx = input_context_coinbase(12_345);
        assert_eq!(ctx.len(), 33);
        assert_eq!(ctx[0], b'C');
        assert_eq!(u64::from_le_bytes(ctx[1..9].try_into().unwrap()), 12_345);
        assert!(ctx[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn created_output_scans_back_on_receiver_side() {
        // End to end: sender constructs an enote for a CARROT main address,
        // the receiver's scan pipeline must recognize it and recover the
        // amount and mask.
        let keys = CarrotKeys::from_master(&[0x77u8; 32]);
        let input_context = input_context_rct(&[0x11; 32]);

        let params = CarrotOutputParams {
            recipient_spend_pubkey: &keys.account_spend_pubkey,
            recipient_view_pubkey: &keys.account_view_pubkey,
            amount: 2_500_000_000,
            input_context: &input_context,
            enote_type: EnoteType::Payment,
            payment_id: [0u8; 8],
        };
        let output = create_carrot_output(&params).unwrap();

        let enote = CarrotEnote {
            onetime_address: output.onetime_address,
            view_tag: output.view_tag,
            ephemeral_pubkey: output.ephemeral_pubkey,
            encrypted_amount: output.encrypted_amount,
            commitment: Some(output.amount_commitment),
            input_context: &input_context,
            cleartext_amount: None,
        };

        let result = carrot_scan::scan_output(
            &enote,
            &keys.view_incoming_key,
            &keys.account_spend_pubkey,
            &SubaddressMap::empty(),
        )
        .expect("receiver must recognize own enote");

        assert_eq!(result.amount, 2_500_000_000);
        assert_eq!(result.mask, output.commitment_mask);
        assert_eq!(result.enote_type, EnoteType::Payment);
        assert_eq!(result.address_spend_pubkey, keys.account_spend_pubkey);
        assert_eq!((result.subaddress_major, result.subaddress_minor), (0, 0));
    }

    #[test]
    fn change_enote_type_survives_roundtrip() {
        let keys = CarrotKeys::from_master(&[0x78u8; 32]);
        let input_context = input_context_rct(&[0x22; 32]);
        let params = CarrotOutputParams {
            recipient_spend_pubkey: &keys.account_spend_pubkey,
            recipient_view_pubkey: &keys.account_view_pubkey,
            amount: 42,
            input_context: &input_context,
            enote_type: EnoteType::Change,
            payment_id: [0u8; 8],
        };
        let output = create_carrot_output(&params).unwrap();

        let enote = CarrotEnote {
            onetime_address: output.onetime_address,
            view_tag: output.view_tag,
            ephemeral_pubkey: output.ephemeral_pubkey,
            encrypted_amount: output.encrypted_amount,
            commitment: Some(output.amount_commitment),
            input_context: &input_context,
            cleartext_amount: None,
        };
        let result = carrot_scan::scan_output(
            &enote,
            &keys.view_incoming_key,
            &keys.account_spend_pubkey,
            &SubaddressMap::empty(),
        )
        .unwrap();
        assert_eq!(result.enote_type, EnoteType::Change);
    }

    #[test]
    fn recovered_spend_keys_open_the_enote() {
        let keys = CarrotKeys::from_master(&[0x79u8; 32]);
        let input_context = input_context_rct(&[0x33; 32]);
        let params = CarrotOutputParams {
            recipient_spend_pubkey: &keys.account_spend_pubkey,
            recipient_view_pubkey: &keys.account_view_pubkey,
            amount: 1,
            input_context: &input_context,
            enote_type: EnoteType::Payment,
            payment_id: [0u8; 8],
        };
        let output = create_carrot_output(&params).unwrap();

        let enote = CarrotEnote {
            onetime_address: output.onetime_address,
            view_tag: output.view_tag,
            ephemeral_pubkey: output.ephemeral_pubkey,
            encrypted_amount: output.encrypted_amount,
            commitment: Some(output.amount_commitment),
            input_context: &input_context,
            cleartext_amount: None,
        };
        let scan = carrot_scan::scan_output(
            &enote,
            &keys.view_incoming_key,
            &keys.account_spend_pubkey,
            &SubaddressMap::empty(),
        )
        .unwrap();

        let (x, y) = carrot_scan::derive_spend_keys(
            &keys.prove_spend_key.unwrap(),
            &keys.generate_image_key,
            &scan.shared_secret,
            &output.amount_commitment,
        );
        assert_eq!(
            salvium_light_crypto::tclsag::tclsag_public_key(&x, &y),
            output.onetime_address
        );
    }

    #[test]
    fn enotes_differ_per_anchor() {
        let keys = CarrotKeys::from_master(&[0x7au8; 32]);
        let input_context = input_context_coinbase(7);
        let params = CarrotOutputParams {
            recipient_spend_pubkey: &keys.account_spend_pubkey,
            recipient_view_pubkey: &keys.account_view_pubkey,
            amount: 100,
            input_context: &input_context,
            enote_type: EnoteType::Payment,
            payment_id: [0u8; 8],
        };
        let a = create_carrot_output(&params).unwrap();
        let b = create_carrot_output(&params).unwrap();
        assert_ne!(a.onetime_address, b.onetime_address);
        assert_ne!(a.ephemeral_pubkey, b.ephemeral_pubkey);
    }
}
