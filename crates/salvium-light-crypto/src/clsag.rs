//! CLSAG ring signatures.
//!
//! Concise Linkable Spontaneous Anonymous Group signatures over the pair
//! `(one-time key, commitment difference)`, with aggregated challenge
//! coefficients. Used by RCT types 6-8.
//!
//! Reference: salvium/src/ringct/rctSigs.cpp CLSAG_Gen / CLSAG_Ver

use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::VartimeMultiscalarMul;

use crate::{
    compress, decompress, generate_key_image, hash_to_point, hash_to_scalar, inv_eight, mul8,
    random_scalar, scalar_mul_base, CryptoError,
};

/// Domain separators, zero-padded to a full 32-byte block.
fn domain(tag: &[u8]) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf[..tag.len()].copy_from_slice(tag);
    buf
}

fn agg_domain_0() -> [u8; 32] {
    domain(b"CLSAG_agg_0")
}
fn agg_domain_1() -> [u8; 32] {
    domain(b"CLSAG_agg_1")
}
fn round_domain() -> [u8; 32] {
    domain(b"CLSAG_round")
}

/// A CLSAG signature: per-member responses, the closing challenge, the key
/// image, and the cofactor-divided commitment image D/8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClsagSignature {
    pub s: Vec<[u8; 32]>,
    pub c1: [u8; 32],
    pub key_image: [u8; 32],
    pub commitment_image: [u8; 32],
}

/// Aggregation coefficients mu_P and mu_C.
fn aggregation_coefficients(
    ring: &[[u8; 32]],
    commitments: &[[u8; 32]],
    key_image: &[u8; 32],
    d8: &[u8; 32],
    pseudo_output: &[u8; 32],
) -> (Scalar, Scalar) {
    let d0 = agg_domain_0();
    let d1 = agg_domain_1();
    let mut parts: Vec<&[u8]> = Vec::with_capacity(2 * ring.len() + 4);
    parts.push(&d0);
    parts.extend(ring.iter().map(|k| k.as_slice()));
    parts.extend(commitments.iter().map(|c| c.as_slice()));
    parts.push(key_image);
    parts.push(d8);
    parts.push(pseudo_output);
    let mu_p = hash_to_scalar(&parts);

    parts[0] = &d1;
    let mu_c = hash_to_scalar(&parts);
    (mu_p, mu_c)
}

fn round_challenge(
    ring: &[[u8; 32]],
    commitments: &[[u8; 32]],
    pseudo_output: &[u8; 32],
    message: &[u8; 32],
    l: &[u8; 32],
    r: &[u8; 32],
) -> Scalar {
    let dom = round_domain();
    let mut parts: Vec<&[u8]> = Vec::with_capacity(2 * ring.len() + 5);
    parts.push(&dom);
    parts.extend(ring.iter().map(|k| k.as_slice()));
    parts.extend(commitments.iter().map(|c| c.as_slice()));
    parts.push(pseudo_output);
    parts.push(message);
    parts.push(l);
    parts.push(r);
    hash_to_scalar(&parts)
}

/// Sign `message` with the ring at `secret_index`.
///
/// `commitment_mask` is `z = real_mask - pseudo_mask`; the signature proves
/// `commitments[secret_index] - pseudo_output = z * G`.
pub fn clsag_sign(
    message: &[u8; 32],
    ring: &[[u8; 32]],
    secret_key: &Scalar,
    commitments: &[[u8; 32]],
    commitment_mask: &Scalar,
    pseudo_output: &[u8; 32],
    secret_index: usize,
) -> Result<ClsagSignature, CryptoError> {
    let n = ring.len();
    assert!(n > 0 && n == commitments.len() && secret_index < n);

    let pseudo_pt = decompress(pseudo_output)?;
    let c_diff: Vec<EdwardsPoint> = commitments
        .iter()
        .map(|c| decompress(c).map(|p| p - pseudo_pt))
        .collect::<Result<_, _>>()?;

    let h_p = hash_to_point(&ring[secret_index]);
    let key_image_pt = secret_key * h_p;
    let key_image = compress(&key_image_pt);

    let d_full = commitment_mask * h_p;
    let d8 = compress(&(inv_eight() * d_full));

    let (mu_p, mu_c) = aggregation_coefficients(ring, commitments, &key_image, &d8, pseudo_output);

    let alpha = random_scalar();
    let mut c = round_challenge(
        ring,
        commitments,
        pseudo_output,
        message,
        &compress(&scalar_mul_base(&alpha)),
        &compress(&(alpha * h_p)),
    );

    let mut s = vec![[0u8; 32]; n];
    let mut c1 = None;
    let mut i = (secret_index + 1) % n;
    if i == 0 {
        c1 = Some(c);
    }

    while i != secret_index {
        let s_i = random_scalar();
        s[i] = s_i.to_bytes();

        let ring_pt = decompress(&ring[i])?;
        let h_p_i = hash_to_point(&ring[i]);
        let (c_mu_p, c_mu_c) = (c * mu_p, c * mu_c);

        // L = s*G + c*mu_P*P[i] + c*mu_C*C[i]
        let l = EdwardsPoint::vartime_multiscalar_mul(
            [s_i, c_mu_p, c_mu_c],
            [ED25519_BASEPOINT_POINT, ring_pt, c_diff[i]],
        );
        // R = s*H_p(P[i]) + c*mu_P*I + c*mu_C*D
        let r = EdwardsPoint::vartime_multiscalar_mul(
            [s_i, c_mu_p, c_mu_c],
            [h_p_i, key_image_pt, d_full],
        );

        c = round_challenge(ring, commitments, pseudo_output, message, &compress(&l), &compress(&r));

        i = (i + 1) % n;
        if i == 0 {
            c1 = Some(c);
        }
    }

    // Close the ring.
    let s_l = alpha - c * (mu_p * secret_key + mu_c * commitment_mask);
    s[secret_index] = s_l.to_bytes();

    let c1 = match c1 {
        Some(v) => v,
        None => {
            // Single-member ring: the closing L/R produce c1 directly.
            let ring_pt = decompress(&ring[secret_index])?;
            let (c_mu_p, c_mu_c) = (c * mu_p, c * mu_c);
            let l = EdwardsPoint::vartime_multiscalar_mul(
                [s_l, c_mu_p, c_mu_c],
                [ED25519_BASEPOINT_POINT, ring_pt, c_diff[secret_index]],
            );
            let r = EdwardsPoint::vartime_multiscalar_mul(
                [s_l, c_mu_p, c_mu_c],
                [h_p, key_image_pt, d_full],
            );
            round_challenge(ring, commitments, pseudo_output, message, &compress(&l), &compress(&r))
        }
    };

    Ok(ClsagSignature {
        s,
        c1: c1.to_bytes(),
        key_image,
        commitment_image: d8,
    })
}

/// Verify a CLSAG signature against its ring.
pub fn clsag_verify(
    message: &[u8; 32],
    sig: &ClsagSignature,
    ring: &[[u8; 32]],
    commitments: &[[u8; 32]],
    pseudo_output: &[u8; 32],
) -> bool {
    let n = ring.len();
    if n == 0 || n != commitments.len() || sig.s.len() != n {
        return false;
    }

    let Ok(pseudo_pt) = decompress(pseudo_output) else {
        return false;
    };
    let Ok(c_diff) = commitments
        .iter()
        .map(|c| decompress(c).map(|p| p - pseudo_pt))
        .collect::<Result<Vec<_>, _>>()
    else {
        return false;
    };
    let Ok(d8_pt) = decompress(&sig.commitment_image) else {
        return false;
    };
    let Ok(key_image_pt) = decompress(&sig.key_image) else {
        return false;
    };
    let d_full = mul8(&d8_pt);

    let (mu_p, mu_c) =
        aggregation_coefficients(ring, commitments, &sig.key_image, &sig.commitment_image, pseudo_output);

    let mut c = Scalar::from_bytes_mod_order(sig.c1);
    for i in 0..n {
        let s_i = Scalar::from_bytes_mod_order(sig.s[i]);
        let Ok(ring_pt) = decompress(&ring[i]) else {
            return false;
        };
        let h_p_i = hash_to_point(&ring[i]);
        let (c_mu_p, c_mu_c) = (c * mu_p, c * mu_c);

        let l = EdwardsPoint::vartime_multiscalar_mul(
            [s_i, c_mu_p, c_mu_c],
            [ED25519_BASEPOINT_POINT, ring_pt, c_diff[i]],
        );
        let r = EdwardsPoint::vartime_multiscalar_mul(
            [s_i, c_mu_p, c_mu_c],
            [h_p_i, key_image_pt, d_full],
        );

        c = round_challenge(ring, commitments, pseudo_output, message, &compress(&l), &compress(&r));
    }

    c.to_bytes() == sig.c1
}

/// Convenience: key image for a one-time keypair.
pub fn key_image_for(public_key: &[u8; 32], secret: &Scalar) -> [u8; 32] {
    generate_key_image(public_key, secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keccak256;

    fn pedersen_g(mask: &Scalar) -> [u8; 32] {
        compress(&scalar_mul_base(mask))
    }

    struct RingFixture {
        ring: Vec<[u8; 32]>,
        commitments: Vec<[u8; 32]>,
        pseudo_output: [u8; 32],
        z: Scalar,
        secret: Scalar,
    }

    fn fixture(n: usize, secret_index: usize) -> RingFixture {
        let mut ring = Vec::with_capacity(n);
        let mut masks = Vec::with_capacity(n);
        let mut commitments = Vec::with_capacity(n);
        let mut secret = Scalar::ZERO;

        for i in 0..n {
            let sk = random_scalar();
            if i == secret_index {
                secret = sk;
            }
            ring.push(compress(&scalar_mul_base(&sk)));
            let mask = random_scalar();
            commitments.push(pedersen_g(&mask));
            masks.push(mask);
        }

        let pseudo_mask = random_scalar();
        RingFixture {
            ring,
            commitments,
            pseudo_output: pedersen_g(&pseudo_mask),
            z: masks[secret_index] - pseudo_mask,
            secret,
        }
    }

    #[test]
    fn sign_verify_default_ring() {
        let n = salvium_light_types::constants::DEFAULT_RING_SIZE;
        let f = fixture(n, 5);
        let message = keccak256(b"ring of eleven");

        let sig = clsag_sign(
            &message,
            &f.ring,
            &f.secret,
            &f.commitments,
            &f.z,
            &f.pseudo_output,
            5,
        )
        .unwrap();
        assert_eq!(sig.s.len(), n);
        assert!(clsag_verify(&message, &sig, &f.ring, &f.commitments, &f.pseudo_output));
    }

    #[test]
    fn sign_verify_single_member() {
        let f = fixture(1, 0);
        let message = keccak256(b"one");
        let sig = clsag_sign(&message, &f.ring, &f.secret, &f.commitments, &f.z, &f.pseudo_output, 0)
            .unwrap();
        assert!(clsag_verify(&message, &sig, &f.ring, &f.commitments, &f.pseudo_output));
    }

    #[test]
    fn tampering_breaks_verification() {
        let f = fixture(4, 2);
        let message = keccak256(b"tamper");
        let sig = clsag_sign(&message, &f.ring, &f.secret, &f.commitments, &f.z, &f.pseudo_output, 2)
            .unwrap();

        // Wrong message.
        assert!(!clsag_verify(&keccak256(b"other"), &sig, &f.ring, &f.commitments, &f.pseudo_output));

        // Mutated ring member.
        let mut bad_ring = f.ring.clone();
        bad_ring[0] = compress(&scalar_mul_base(&random_scalar()));
        assert!(!clsag_verify(&message, &sig, &bad_ring, &f.commitments, &f.pseudo_output));

        // Mutated response scalar.
        let mut bad_sig = sig.clone();
        bad_sig.s[1] = random_scalar().to_bytes();
        assert!(!clsag_verify(&message, &bad_sig, &f.ring, &f.commitments, &f.pseudo_output));

        // Mutated challenge.
        let mut bad_sig = sig.clone();
        bad_sig.c1 = random_scalar().to_bytes();
        assert!(!clsag_verify(&message, &bad_sig, &f.ring, &f.commitments, &f.pseudo_output));
    }

    #[test]
    fn key_image_is_stable_across_messages() {
        let f = fixture(3, 1);
        let sig_a = clsag_sign(&keccak256(b"a"), &f.ring, &f.secret, &f.commitments, &f.z, &f.pseudo_output, 1)
            .unwrap();
        let sig_b = clsag_sign(&keccak256(b"b"), &f.ring, &f.secret, &f.commitments, &f.z, &f.pseudo_output, 1)
            .unwrap();
        assert_eq!(sig_a.key_image, sig_b.key_image);
        assert_eq!(sig_a.key_image, key_image_for(&f.ring[1], &f.secret));
        assert_ne!(sig_a.c1, sig_b.c1);
    }

    #[test]
    fn ring_length_mismatch_rejected() {
        let f = fixture(3, 0);
        let message = keccak256(b"len");
        let sig = clsag_sign(&message, &f.ring, &f.secret, &f.commitments, &f.z, &f.pseudo_output, 0)
            .unwrap();
        assert!(!clsag_verify(&message, &sig, &f.ring[..2], &f.commitments[..2], &f.pseudo_output));
    }
}
