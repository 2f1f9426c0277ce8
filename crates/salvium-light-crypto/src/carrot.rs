//! CARROT key hierarchy.
//!
//! All five secrets hang off the 32-byte master secret through keyed Blake2b
//! with length-prefixed domain separators (the key parameter is the parent
//! secret). The account spend key lives on the dual base:
//! `K_s = k_gi*G + k_ps*T`, and the main-address view key is tied to the
//! view-balance tier: `K_v = k_vi * K_s`.
//!
//! Reference: salvium/src/carrot_core/account_secrets.cpp, config.h

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;

use crate::{blake2b_keyed, compress, decompress, scalar_mul_base, t_point, CryptoError};

const DOMAIN_PROVE_SPEND_KEY: &[u8] = b"Carrot prove-spend key";
const DOMAIN_VIEW_BALANCE_SECRET: &[u8] = b"Carrot view-balance secret";
const DOMAIN_GENERATE_IMAGE_KEY: &[u8] = b"Carrot generate-image key";
const DOMAIN_INCOMING_VIEW_KEY: &[u8] = b"Carrot incoming view key";
const DOMAIN_GENERATE_ADDRESS_SECRET: &[u8] = b"Carrot generate-address secret";

/// `[len(domain) as u8] || domain || data...` (SpFixedTranscript).
pub fn build_transcript(domain: &[u8], data: &[&[u8]]) -> Vec<u8> {
    let total = 1 + domain.len() + data.iter().map(|d| d.len()).sum::<usize>();
    let mut buf = Vec::with_capacity(total);
    buf.push(domain.len() as u8);
    buf.extend_from_slice(domain);
    for d in data {
        buf.extend_from_slice(d);
    }
    buf
}

/// H_n: 64-byte keyed Blake2b reduced to a scalar.
pub fn derive_scalar(key: &[u8], domain: &[u8], data: &[&[u8]]) -> Scalar {
    let hash = blake2b_keyed(&build_transcript(domain, data), 64, key);
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hash);
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// H_32: 32-byte keyed Blake2b.
pub fn derive_bytes_32(key: &[u8], domain: &[u8], data: &[&[u8]]) -> [u8; 32] {
    let hash = blake2b_keyed(&build_transcript(domain, data), 32, key);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    out
}

/// Full CARROT account: spend-capable key material plus the view tier.
#[derive(Clone)]
pub struct CarrotKeys {
    pub master_secret: Option<[u8; 32]>,
    pub prove_spend_key: Option<Scalar>,
    pub view_balance_secret: [u8; 32],
    pub generate_image_key: Scalar,
    pub view_incoming_key: Scalar,
    pub generate_address_secret: [u8; 32],
    pub account_spend_pubkey: [u8; 32],
    /// `k_vi * G`, the primary-address view pubkey.
    pub primary_view_pubkey: [u8; 32],
    /// `k_vi * K_s`, the account view pubkey used for subaddressing.
    pub account_view_pubkey: [u8; 32],
}

impl CarrotKeys {
    /// Derive the complete hierarchy from a master secret.
    pub fn from_master(master_secret: &[u8; 32]) -> Self {
        let prove_spend_key = derive_scalar(master_secret, DOMAIN_PROVE_SPEND_KEY, &[]);
        let view_balance_secret =
            derive_bytes_32(master_secret, DOMAIN_VIEW_BALANCE_SECRET, &[]);
        let generate_image_key =
            derive_scalar(&view_balance_secret, DOMAIN_GENERATE_IMAGE_KEY, &[]);
        let view_incoming_key =
            derive_scalar(&view_balance_secret, DOMAIN_INCOMING_VIEW_KEY, &[]);
        let generate_address_secret =
            derive_bytes_32(&view_balance_secret, DOMAIN_GENERATE_ADDRESS_SECRET, &[]);

        // K_s = k_gi*G + k_ps*T
        let spend_pt = scalar_mul_base(&generate_image_key) + prove_spend_key * t_point();
        let account_spend_pubkey = compress(&spend_pt);

        Self {
            master_secret: Some(*master_secret),
            prove_spend_key: Some(prove_spend_key),
            view_balance_secret,
            generate_image_key,
            view_incoming_key,
            generate_address_secret,
            account_spend_pubkey,
            primary_view_pubkey: compress(&scalar_mul_base(&view_incoming_key)),
            account_view_pubkey: compress(&(view_incoming_key * spend_pt)),
        }
    }

    /// Derive the view tier only, from the view-balance secret and the
    /// (externally provided) account spend pubkey.
    pub fn view_only(
        view_balance_secret: &[u8; 32],
        account_spend_pubkey: &[u8; 32],
    ) -> Result<Self, CryptoError> {
        let spend_pt: EdwardsPoint = decompress(account_spend_pubkey)?;
        let generate_image_key =
            derive_scalar(view_balance_secret, DOMAIN_GENERATE_IMAGE_KEY, &[]);
        let view_incoming_key =
            derive_scalar(view_balance_secret, DOMAIN_INCOMING_VIEW_KEY, &[]);
        let generate_address_secret =
            derive_bytes_32(view_balance_secret, DOMAIN_GENERATE_ADDRESS_SECRET, &[]);

        Ok(Self {
            master_secret: None,
            prove_spend_key: None,
            view_balance_secret: *view_balance_secret,
            generate_image_key,
            view_incoming_key,
            generate_address_secret,
            account_spend_pubkey: *account_spend_pubkey,
            primary_view_pubkey: compress(&scalar_mul_base(&view_incoming_key)),
            account_view_pubkey: compress(&(view_incoming_key * spend_pt)),
        })
    }

    pub fn can_spend(&self) -> bool {
        self.prove_spend_key.is_some()
    }
}
