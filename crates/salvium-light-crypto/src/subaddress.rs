//! Subaddress lookahead tables.
//!
//! The scanner's ownership oracle: a precomputed map from candidate spend
//! public keys to their (major, minor) index, over a bounded lookahead grid.
//! Both derivations are covered: legacy CryptoNote (`K_s + H_s(...)*G`) and
//! CARROT (`k^j_subscal * K_s` through the generate-address tier).

use std::collections::HashMap;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::VartimeMultiscalarMul;

use crate::carrot::{derive_bytes_32, derive_scalar};
use crate::{compress, decompress, keccak256_parts, scalar_mul_base, CryptoError};

const DOMAIN_ADDRESS_INDEX_GEN: &[u8] = b"Carrot address index generator";
const DOMAIN_SUBADDRESS_SCALAR: &[u8] = b"Carrot subaddress scalar";

/// spend pubkey -> (major, minor).
pub struct SubaddressMap {
    entries: HashMap<[u8; 32], (u32, u32)>,
}

impl SubaddressMap {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn lookup(&self, spend_pubkey: &[u8; 32]) -> Option<(u32, u32)> {
        self.entries.get(spend_pubkey).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─── Legacy CryptoNote ───────────────────────────────────────────────────────

/// `m = H_s("SubAddr\0" || k_v || major || minor)`.
pub fn cn_subaddress_secret(view_secret: &Scalar, major: u32, minor: u32) -> Scalar {
    let hash = keccak256_parts(&[
        b"SubAddr\0",
        &view_secret.to_bytes(),
        &major.to_le_bytes(),
        &minor.to_le_bytes(),
    ]);
    Scalar::from_bytes_mod_order(hash)
}

/// `D = K_s + m*G`; the (0,0) entry is the account key itself.
pub fn cn_subaddress_spend_pubkey(
    spend_pubkey: &EdwardsPoint,
    view_secret: &Scalar,
    major: u32,
    minor: u32,
) -> EdwardsPoint {
    if major == 0 && minor == 0 {
        return *spend_pubkey;
    }
    spend_pubkey + scalar_mul_base(&cn_subaddress_secret(view_secret, major, minor))
}

/// Precompute the legacy lookahead grid (inclusive of the main address).
pub fn cn_subaddress_map(
    spend_pubkey: &[u8; 32],
    view_secret: &Scalar,
    major_lookahead: u32,
    minor_lookahead: u32,
) -> Result<SubaddressMap, CryptoError> {
    let spend_pt = decompress(spend_pubkey)?;
    let capacity = (major_lookahead as usize + 1) * (minor_lookahead as usize + 1);
    let mut entries = HashMap::with_capacity(capacity);

    for major in 0..=major_lookahead {
        for minor in 0..=minor_lookahead {
            let key = compress(&cn_subaddress_spend_pubkey(&spend_pt, view_secret, major, minor));
            entries.entry(key).or_insert((major, minor));
        }
    }

    Ok(SubaddressMap { entries })
}

// ─── CARROT ──────────────────────────────────────────────────────────────────

/// `s^j_gen = H_32[s_ga](major || minor)`.
fn carrot_index_generator(generate_address_secret: &[u8; 32], major: u32, minor: u32) -> [u8; 32] {
    derive_bytes_32(
        generate_address_secret,
        DOMAIN_ADDRESS_INDEX_GEN,
        &[&major.to_le_bytes(), &minor.to_le_bytes()],
    )
}

/// `k^j_subscal = H_n[s^j_gen](K_s || major || minor)`.
fn carrot_subaddress_scalar(
    account_spend_pubkey: &[u8; 32],
    index_generator: &[u8; 32],
    major: u32,
    minor: u32,
) -> Scalar {
    derive_scalar(
        index_generator,
        DOMAIN_SUBADDRESS_SCALAR,
        &[account_spend_pubkey, &major.to_le_bytes(), &minor.to_le_bytes()],
    )
}

/// `K^j_s = k^j_subscal * K_s`; (0,0) is the account key.
pub fn carrot_subaddress_spend_pubkey(
    account_spend_pt: &EdwardsPoint,
    account_spend_pubkey: &[u8; 32],
    generate_address_secret: &[u8; 32],
    major: u32,
    minor: u32,
) -> EdwardsPoint {
    if major == 0 && minor == 0 {
        return *account_spend_pt;
    }
    let gen = carrot_index_generator(generate_address_secret, major, minor);
    let k = carrot_subaddress_scalar(account_spend_pubkey, &gen, major, minor);
    EdwardsPoint::vartime_multiscalar_mul([k], [*account_spend_pt])
}

/// Precompute the CARROT lookahead grid.
pub fn carrot_subaddress_map(
    account_spend_pubkey: &[u8; 32],
    generate_address_secret: &[u8; 32],
    major_lookahead: u32,
    minor_lookahead: u32,
) -> Result<SubaddressMap, CryptoError> {
    let spend_pt = decompress(account_spend_pubkey)?;
    let capacity = (major_lookahead as usize + 1) * (minor_lookahead as usize + 1);
    let mut entries = HashMap::with_capacity(capacity);

    for major in 0..=major_lookahead {
        for minor in 0..=minor_lookahead {
            let key = compress(&carrot_subaddress_spend_pubkey(
                &spend_pt,
                account_spend_pubkey,
                generate_address_secret,
                major,
                minor,
            ));
            entries.entry(key).or_insert((major, minor));
        }
    }

    Ok(SubaddressMap { entries })
}
