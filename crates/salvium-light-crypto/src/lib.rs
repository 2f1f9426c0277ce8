//! Crypto primitives for the Salvium light-wallet core.
//!
//! Keccak-256 (CryptoNote `cn_fast_hash`), Blake2b with the keyed mode used
//! by CARROT, and the Ed25519 scalar/point operations every other module
//! builds on. Keys are `[u8; 32]` at module boundaries and dalek types
//! internally; nothing in this crate suspends or talks to the network.
//!
//! Secret-path scalar arithmetic goes through dalek's constant-time
//! `Scalar`/`EdwardsPoint` operators. The vartime multiscalar shortcuts are
//! used only where every scalar is public (verification, commitment
//! recomputation).

use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

pub mod bulletproofs_plus;
pub mod carrot;
pub mod carrot_scan;
pub mod clsag;
pub mod cn_scan;
pub mod elligator2;
pub mod message_sig;
pub mod subaddress;
pub mod tclsag;
pub mod x25519;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("32 bytes are not a canonical scalar")]
    ScalarInvalid,

    #[error("32 bytes are not a curve point")]
    PointInvalid,
}

// =============================================================================
// Fixed points
// =============================================================================

/// The CryptoNote amount generator H (nothing-up-my-sleeve point).
pub const H_POINT_BYTES: [u8; 32] = [
    0x8b, 0x65, 0x59, 0x70, 0x15, 0x37, 0x99, 0xaf, 0x2a, 0xea, 0xdc, 0x9f, 0xf1, 0xad, 0xd0,
    0xea, 0x6c, 0x72, 0x51, 0xd5, 0x41, 0x54, 0xcf, 0xa9, 0x2c, 0x17, 0x3a, 0x0d, 0xd3, 0x9c,
    0x1f, 0x94,
];

/// Salvium's second generator T, the dual base of CARROT account keys and
/// TCLSAG rings.
pub const T_POINT_BYTES: [u8; 32] = [
    0x96, 0x6f, 0xc6, 0x6b, 0x82, 0xcd, 0x56, 0xcf, 0x85, 0xea, 0xec, 0x80, 0x1c, 0x42, 0x84,
    0x5f, 0x5f, 0x40, 0x88, 0x78, 0xd1, 0x56, 0x1e, 0x00, 0xd3, 0xd7, 0xde, 0xd2, 0x79, 0x4d,
    0x09, 0x4f,
];

/// The decompressed amount generator.
pub fn h_point() -> EdwardsPoint {
    CompressedEdwardsY(H_POINT_BYTES)
        .decompress()
        .expect("H is a fixed valid point")
}

/// The decompressed second generator.
pub fn t_point() -> EdwardsPoint {
    CompressedEdwardsY(T_POINT_BYTES)
        .decompress()
        .expect("T is a fixed valid point")
}

// =============================================================================
// Hashes
// =============================================================================

/// Keccak-256 with 0x01 padding (CryptoNote `cn_fast_hash`, not SHA3).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut k = Keccak::v256();
    let mut out = [0u8; 32];
    k.update(data);
    k.finalize(&mut out);
    out
}

/// Keccak-256 over several concatenated slices.
pub fn keccak256_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut k = Keccak::v256();
    let mut out = [0u8; 32];
    for p in parts {
        k.update(p);
    }
    k.finalize(&mut out);
    out
}

/// Unkeyed Blake2b with output length 1..=64 (RFC 7693).
pub fn blake2b(data: &[u8], out_len: usize) -> Vec<u8> {
    blake2b_simd::Params::new()
        .hash_length(out_len)
        .hash(data)
        .as_bytes()
        .to_vec()
}

/// Keyed Blake2b (key <= 64 bytes, applied as the zero-padded first block).
pub fn blake2b_keyed(data: &[u8], out_len: usize, key: &[u8]) -> Vec<u8> {
    blake2b_simd::Params::new()
        .hash_length(out_len)
        .key(key)
        .hash(data)
        .as_bytes()
        .to_vec()
}

// =============================================================================
// Scalars
// =============================================================================

/// Interpret 32 little-endian bytes mod L.
pub fn reduce32(bytes: &[u8; 32]) -> Scalar {
    Scalar::from_bytes_mod_order(*bytes)
}

/// Interpret 64 little-endian bytes mod L.
pub fn reduce64(bytes: &[u8; 64]) -> Scalar {
    Scalar::from_bytes_mod_order_wide(bytes)
}

/// Canonical scalar check (`sc_check`): accepts only fully reduced encodings.
pub fn scalar_from_canonical(bytes: &[u8; 32]) -> Result<Scalar, CryptoError> {
    Option::<Scalar>::from(Scalar::from_canonical_bytes(*bytes)).ok_or(CryptoError::ScalarInvalid)
}

/// Uniform random scalar from 64 bytes of OS entropy.
pub fn random_scalar() -> Scalar {
    let mut bytes = [0u8; 64];
    getrandom::getrandom(&mut bytes).expect("OS randomness unavailable");
    Scalar::from_bytes_mod_order_wide(&bytes)
}

/// Hash arbitrary slices to a scalar: Keccak-256 then reduce32.
pub fn hash_to_scalar(parts: &[&[u8]]) -> Scalar {
    Scalar::from_bytes_mod_order(keccak256_parts(parts))
}

// =============================================================================
// Points
// =============================================================================

/// Decompress a 32-byte key; fails on non-points.
pub fn decompress(bytes: &[u8; 32]) -> Result<EdwardsPoint, CryptoError> {
    CompressedEdwardsY(*bytes)
        .decompress()
        .ok_or(CryptoError::PointInvalid)
}

pub fn compress(point: &EdwardsPoint) -> [u8; 32] {
    point.compress().to_bytes()
}

/// `s * G` (constant time via the basepoint table).
pub fn scalar_mul_base(s: &Scalar) -> EdwardsPoint {
    ED25519_BASEPOINT_TABLE * s
}

/// `a * P + b * G` (constant time; both scalars may be secret).
pub fn double_scalar_mul_base(a: &Scalar, p: &EdwardsPoint, b: &Scalar) -> EdwardsPoint {
    a * p + ED25519_BASEPOINT_TABLE * b
}

/// Multiply by the cofactor 8 (three doublings).
pub fn mul8(p: &EdwardsPoint) -> EdwardsPoint {
    let t = p + p;
    let t = &t + &t;
    &t + &t
}

/// 8^(-1) mod L, used to store cofactor-divided commitment images.
pub fn inv_eight() -> Scalar {
    Scalar::from(8u64).invert()
}

/// Hash-to-point: Keccak-256, Elligator-2, then cofactor clearing.
pub fn hash_to_point(data: &[u8]) -> EdwardsPoint {
    let fe = keccak256(data);
    mul8(&elligator2::ge_fromfe_frombytes_vartime(&fe))
}

/// Key image `I = sec * H_p(pub)`.
pub fn generate_key_image(public_key: &[u8; 32], secret: &Scalar) -> [u8; 32] {
    compress(&(secret * hash_to_point(public_key)))
}

// =============================================================================
// CryptoNote derivations
// =============================================================================

pub(crate) fn append_varint(buf: &mut Vec<u8>, mut val: u64) {
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

/// `D = 8 * (secret * P)`, the legacy Diffie-Hellman key derivation.
pub fn generate_key_derivation(
    public_key: &[u8; 32],
    secret: &Scalar,
) -> Result<[u8; 32], CryptoError> {
    let p = decompress(public_key)?;
    Ok(compress(&mul8(&(secret * p))))
}

/// `H_s(D || varint(index))`.
pub fn derivation_to_scalar(derivation: &[u8; 32], output_index: u32) -> Scalar {
    let mut buf = Vec::with_capacity(32 + 5);
    buf.extend_from_slice(derivation);
    append_varint(&mut buf, output_index as u64);
    Scalar::from_bytes_mod_order(keccak256(&buf))
}

/// One-time public key: `Ko = H_s(D || i) * G + base`.
pub fn derive_public_key(
    derivation: &[u8; 32],
    output_index: u32,
    base: &[u8; 32],
) -> Result<[u8; 32], CryptoError> {
    let base_pt = decompress(base)?;
    let s = derivation_to_scalar(derivation, output_index);
    Ok(compress(&(scalar_mul_base(&s) + base_pt)))
}

/// Pedersen commitment `C = mask * G + amount * H`.
pub fn pedersen_commit(amount: u64, mask: &Scalar) -> [u8; 32] {
    compress(&(scalar_mul_base(mask) + Scalar::from(amount) * h_point()))
}
