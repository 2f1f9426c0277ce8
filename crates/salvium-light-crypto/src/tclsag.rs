//! TCLSAG: twin-key CLSAG over the dual base (G, T).
//!
//! The CARROT one-time key is `Ko = x*G + y*T`; TCLSAG carries a second
//! response vector for the T column while the key image and commitment
//! column stay as in CLSAG. Used by RCT type 9 (SalviumOne).
//!
//! Reference: salvium/src/ringct/rctSigs.cpp TCLSAG_Gen / TCLSAG_Ver

use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::VartimeMultiscalarMul;

use crate::{
    compress, decompress, hash_to_point, hash_to_scalar, inv_eight, mul8, random_scalar, t_point,
    CryptoError,
};

fn domain(tag: &[u8]) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf[..tag.len()].copy_from_slice(tag);
    buf
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TclsagSignature {
    pub sx: Vec<[u8; 32]>,
    pub sy: Vec<[u8; 32]>,
    pub c1: [u8; 32],
    pub key_image: [u8; 32],
    pub commitment_image: [u8; 32],
}

fn aggregation_coefficients(
    ring: &[[u8; 32]],
    commitments: &[[u8; 32]],
    key_image: &[u8; 32],
    d8: &[u8; 32],
    pseudo_output: &[u8; 32],
) -> (Scalar, Scalar) {
    let d0 = domain(b"CLSAG_agg_0");
    let d1 = domain(b"CLSAG_agg_1");
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
    let dom = domain(b"CLSAG_round");
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

/// Sign with the twin secret `(x, y)` where `ring[secret_index] = x*G + y*T`.
#[allow(clippy::too_many_arguments)]
pub fn tclsag_sign(
    message: &[u8; 32],
    ring: &[[u8; 32]],
    secret_x: &Scalar,
    secret_y: &Scalar,
    commitments: &[[u8; 32]],
    commitment_mask: &Scalar,
    pseudo_output: &[u8; 32],
    secret_index: usize,
) -> Result<TclsagSignature, CryptoError> {
    let n = ring.len();
    assert!(n > 0 && n == commitments.len() && secret_index < n);

    let t_gen = t_point();
    let pseudo_pt = decompress(pseudo_output)?;
    let c_diff: Vec<EdwardsPoint> = commitments
        .iter()
        .map(|c| decompress(c).map(|p| p - pseudo_pt))
        .collect::<Result<_, _>>()?;

    // Only the G component links: I = x * H_p(P_l).
    let h_p = hash_to_point(&ring[secret_index]);
    let key_image_pt = secret_x * h_p;
    let key_image = compress(&key_image_pt);

    let d_full = commitment_mask * h_p;
    let d8 = compress(&(inv_eight() * d_full));

    let (mu_p, mu_c) = aggregation_coefficients(ring, commitments, &key_image, &d8, pseudo_output);

    let a = random_scalar();
    let b = random_scalar();
    let l_init = EdwardsPoint::vartime_multiscalar_mul([a, b], [ED25519_BASEPOINT_POINT, t_gen]);
    let mut c = round_challenge(
        ring,
        commitments,
        pseudo_output,
        message,
        &compress(&l_init),
        &compress(&(a * h_p)),
    );

    let mut sx = vec![[0u8; 32]; n];
    let mut sy = vec![[0u8; 32]; n];
    let mut c1 = None;
    let mut i = (secret_index + 1) % n;
    if i == 0 {
        c1 = Some(c);
    }

    while i != secret_index {
        let sx_i = random_scalar();
        let sy_i = random_scalar();
        sx[i] = sx_i.to_bytes();
        sy[i] = sy_i.to_bytes();

        let ring_pt = decompress(&ring[i])?;
        let h_p_i = hash_to_point(&ring[i]);
        let (c_mu_p, c_mu_c) = (c * mu_p, c * mu_c);

        // L = sx*G + sy*T + c*mu_P*P[i] + c*mu_C*C[i]
        let l = EdwardsPoint::vartime_multiscalar_mul(
            [sx_i, sy_i, c_mu_p, c_mu_c],
            [ED25519_BASEPOINT_POINT, t_gen, ring_pt, c_diff[i]],
        );
        // R = sx*H_p(P[i]) + c*mu_P*I + c*mu_C*D
        let r = EdwardsPoint::vartime_multiscalar_mul(
            [sx_i, c_mu_p, c_mu_c],
            [h_p_i, key_image_pt, d_full],
        );

        c = round_challenge(ring, commitments, pseudo_output, message, &compress(&l), &compress(&r));

        i = (i + 1) % n;
        if i == 0 {
            c1 = Some(c);
        }
    }

    let sx_l = a - c * (mu_p * secret_x + mu_c * commitment_mask);
    let sy_l = b - c * mu_p * secret_y;
    sx[secret_index] = sx_l.to_bytes();
    sy[secret_index] = sy_l.to_bytes();

    let c1 = match c1 {
        Some(v) => v,
        None => {
            let ring_pt = decompress(&ring[secret_index])?;
            let (c_mu_p, c_mu_c) = (c * mu_p, c * mu_c);
            let l = EdwardsPoint::vartime_multiscalar_mul(
                [sx_l, sy_l, c_mu_p, c_mu_c],
                [ED25519_BASEPOINT_POINT, t_gen, ring_pt, c_diff[secret_index]],
            );
            let r = EdwardsPoint::vartime_multiscalar_mul(
                [sx_l, c_mu_p, c_mu_c],
                [h_p, key_image_pt, d_full],
            );
            round_challenge(ring, commitments, pseudo_output, message, &compress(&l), &compress(&r))
        }
    };

    Ok(TclsagSignature {
        sx,
        sy,
        c1: c1.to_bytes(),
        key_image,
        commitment_image: d8,
    })
}

pub fn tclsag_verify(
    message: &[u8; 32],
    sig: &TclsagSignature,
    ring: &[[u8; 32]],
    commitments: &[[u8; 32]],
    pseudo_output: &[u8; 32],
) -> bool {
    let n = ring.len();
    if n == 0 || n != commitments.len() || sig.sx.len() != n || sig.sy.len() != n {
        return false;
    }

    let t_gen = t_point();
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
        let sx_i = Scalar::from_bytes_mod_order(sig.sx[i]);
        let sy_i = Scalar::from_bytes_mod_order(sig.sy[i]);
        let Ok(ring_pt) = decompress(&ring[i]) else {
            return false;
        };
        let h_p_i = hash_to_point(&ring[i]);
        let (c_mu_p, c_mu_c) = (c * mu_p, c * mu_c);

        let l = EdwardsPoint::vartime_multiscalar_mul(
            [sx_i, sy_i, c_mu_p, c_mu_c],
            [ED25519_BASEPOINT_POINT, t_gen, ring_pt, c_diff[i]],
        );
        let r = EdwardsPoint::vartime_multiscalar_mul(
            [sx_i, c_mu_p, c_mu_c],
            [h_p_i, key_image_pt, d_full],
        );

        c = round_challenge(ring, commitments, pseudo_output, message, &compress(&l), &compress(&r));
    }

    c.to_bytes() == sig.c1
}

/// Twin public key `x*G + y*T`.
pub fn tclsag_public_key(x: &Scalar, y: &Scalar) -> [u8; 32] {
    compress(&EdwardsPoint::vartime_multiscalar_mul(
        [*x, *y],
        [ED25519_BASEPOINT_POINT, t_point()],
    ))
}
