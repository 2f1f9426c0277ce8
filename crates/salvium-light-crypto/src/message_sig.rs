//! Schnorr-style message signatures ("SigV1" / "SigV2").
//!
//! A signature is the 5-byte ASCII header followed by the CryptoNote-base58
//! encoding of a 65-byte blob `c || r || sign_mask`. V1 signs
//! `keccak256(message)`; V2 domain-separates and binds the signing address:
//! `keccak256(domain || K_s || K_v || mode || varint(len) || message)` with
//! mode 0 for the spend key and 1 for the view key. Verification recomputes
//! `R' = c*K + r*G` and checks `c == H_s(h || K || R')`, trying the spend
//! key before the view key.

use curve25519_dalek::scalar::Scalar;

use salvium_light_types::address::Address;
use salvium_light_types::base58;

use crate::{
    compress, decompress, double_scalar_mul_base, hash_to_scalar, keccak256, random_scalar,
    scalar_mul_base,
};

const HEADER_V1: &str = "SigV1";
const HEADER_V2: &str = "SigV2";
const DOMAIN_V2: &[u8] = b"MoneroMessageSignature\0";
const BLOB_LEN: usize = 65;

/// Which of the address keys produced a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningKey {
    Spend = 0,
    View = 1,
}

/// Verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSignatureInfo {
    pub valid: bool,
    pub version: u8,
    pub key_type: Option<SigningKey>,
}

impl MessageSignatureInfo {
    fn invalid(version: u8) -> Self {
        Self {
            valid: false,
            version,
            key_type: None,
        }
    }
}

/// The hash a V2 signature commits to.
fn v2_digest(message: &[u8], address: &Address, key: SigningKey) -> [u8; 32] {
    let mut data = Vec::with_capacity(DOMAIN_V2.len() + 64 + 1 + 5 + message.len());
    data.extend_from_slice(DOMAIN_V2);
    data.extend_from_slice(&address.spend_public_key);
    data.extend_from_slice(&address.view_public_key);
    data.push(key as u8);
    crate::append_varint(&mut data, message.len() as u64);
    data.extend_from_slice(message);
    keccak256(&data)
}

fn challenge(digest: &[u8; 32], public_key: &[u8; 32], r_point: &[u8; 32]) -> Scalar {
    hash_to_scalar(&[digest, public_key, r_point])
}

/// Sign `message` with `secret` for the given address slot, producing a
/// "SigV2..." string.
pub fn sign_v2(message: &[u8], address: &Address, secret: &Scalar, key: SigningKey) -> String {
    let digest = v2_digest(message, address, key);
    let public_key = match key {
        SigningKey::Spend => address.spend_public_key,
        SigningKey::View => address.view_public_key,
    };

    let k = random_scalar();
    let r_point = compress(&scalar_mul_base(&k));
    let c = challenge(&digest, &public_key, &r_point);
    let r = k - c * secret;

    let mut blob = [0u8; BLOB_LEN];
    blob[..32].copy_from_slice(&c.to_bytes());
    blob[32..64].copy_from_slice(&r.to_bytes());
    blob[64] = key as u8;

    format!("{}{}", HEADER_V2, base58::encode(&blob))
}

fn check(digest: &[u8; 32], public_key: &[u8; 32], c: &Scalar, r: &Scalar) -> bool {
    let Ok(k_pt) = decompress(public_key) else {
        return false;
    };
    let r_point = compress(&double_scalar_mul_base(c, &k_pt, r));
    challenge(digest, public_key, &r_point) == *c
}

/// Verify a "SigV1"/"SigV2" signature for `message` from `address`.
pub fn verify(message: &[u8], address: &Address, signature: &str) -> MessageSignatureInfo {
    let (version, body) = if let Some(rest) = signature.strip_prefix(HEADER_V2) {
        (2u8, rest)
    } else if let Some(rest) = signature.strip_prefix(HEADER_V1) {
        (1u8, rest)
    } else {
        return MessageSignatureInfo::invalid(0);
    };

    let Ok(blob) = base58::decode(body) else {
        return MessageSignatureInfo::invalid(version);
    };
    if blob.len() != BLOB_LEN {
        return MessageSignatureInfo::invalid(version);
    }

    let mut c_bytes = [0u8; 32];
    c_bytes.copy_from_slice(&blob[..32]);
    let mut r_bytes = [0u8; 32];
    r_bytes.copy_from_slice(&blob[32..64]);
    let c = Scalar::from_bytes_mod_order(c_bytes);
    let r = Scalar::from_bytes_mod_order(r_bytes);

    // Spend first, then view.
    for key in [SigningKey::Spend, SigningKey::View] {
        let digest = match version {
            1 => keccak256(message),
            _ => v2_digest(message, address, key),
        };
        let public_key = match key {
            SigningKey::Spend => address.spend_public_key,
            SigningKey::View => address.view_public_key,
        };
        if check(&digest, &public_key, &c, &r) {
            return MessageSignatureInfo {
                valid: true,
                version,
                key_type: Some(key),
            };
        }
    }

    MessageSignatureInfo::invalid(version)
}
