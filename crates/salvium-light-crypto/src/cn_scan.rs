//! Legacy CryptoNote output recognition.
//!
//! Pre-CARROT pipeline: optional 1-byte view-tag filter, reverse derivation
//! of the targeted spend pubkey, subaddress-table lookup, ECDH amount and
//! mask recovery, and key-image computation for full wallets.

use curve25519_dalek::scalar::Scalar;

use crate::subaddress::{cn_subaddress_secret, SubaddressMap};
use crate::{
    compress, decompress, derivation_to_scalar, generate_key_derivation, generate_key_image,
    keccak256, keccak256_parts, scalar_mul_base,
};

/// One recognized legacy output.
pub struct CnScanResult {
    pub amount: u64,
    pub mask: Scalar,
    pub subaddress_major: u32,
    pub subaddress_minor: u32,
    /// Present only when the spend secret was available.
    pub key_image: Option<[u8; 32]>,
}

/// 1-byte view tag: `keccak256("view_tag" || D || varint(index))[0]`.
pub fn view_tag(derivation: &[u8; 32], output_index: u32) -> u8 {
    let mut buf = Vec::with_capacity(8 + 32 + 5);
    buf.extend_from_slice(b"view_tag");
    buf.extend_from_slice(derivation);
    crate::append_varint(&mut buf, output_index as u64);
    keccak256(&buf)[0]
}

fn amount_factor(shared_secret: &[u8; 32]) -> [u8; 32] {
    keccak256_parts(&[b"amount", shared_secret])
}

/// XOR the low 8 bytes of `keccak256("amount" || shared_secret)`.
pub fn ecdh_encode_amount(amount: u64, shared_secret: &[u8; 32]) -> [u8; 8] {
    let factor = amount_factor(shared_secret);
    let mut enc = amount.to_le_bytes();
    for i in 0..8 {
        enc[i] ^= factor[i];
    }
    enc
}

pub fn ecdh_decode_amount(encrypted: &[u8; 8], shared_secret: &[u8; 32]) -> u64 {
    let factor = amount_factor(shared_secret);
    let mut clear = *encrypted;
    for i in 0..8 {
        clear[i] ^= factor[i];
    }
    u64::from_le_bytes(clear)
}

/// `mask = H_s("commitment_mask" || shared_secret)`.
pub fn commitment_mask(shared_secret: &[u8; 32]) -> Scalar {
    Scalar::from_bytes_mod_order(keccak256_parts(&[b"commitment_mask", shared_secret]))
}

/// A legacy output candidate handed to the scanner.
pub struct CnOutput {
    pub public_key: [u8; 32],
    pub output_index: u32,
    /// 1-byte view tag for tagged-key targets; untagged outputs scan fully.
    pub view_tag: Option<u8>,
    pub encrypted_amount: [u8; 8],
    /// Cleartext amount on coinbase outputs.
    pub cleartext_amount: Option<u64>,
    pub is_rct: bool,
}

/// Scan one output against the wallet's derivation `D = 8*k_v*R`.
pub fn scan_output(
    output: &CnOutput,
    derivation: &[u8; 32],
    view_secret: &Scalar,
    spend_secret: Option<&Scalar>,
    subaddresses: &SubaddressMap,
) -> Option<CnScanResult> {
    // View-tag fast reject.
    if let Some(expected) = output.view_tag {
        if view_tag(derivation, output.output_index) != expected {
            return None;
        }
    }

    // Reverse derivation: the targeted spend key is Ko - H_s(D||i)*G.
    let ko = decompress(&output.public_key).ok()?;
    let d2s = derivation_to_scalar(derivation, output.output_index);
    let candidate = compress(&(ko - scalar_mul_base(&d2s)));

    let (major, minor) = subaddresses.lookup(&candidate)?;

    let (amount, mask) = if output.is_rct {
        let shared = d2s.to_bytes();
        (
            ecdh_decode_amount(&output.encrypted_amount, &shared),
            commitment_mask(&shared),
        )
    } else {
        // Coinbase and pre-RCT outputs: cleartext amount, identity mask.
        (output.cleartext_amount.unwrap_or(0), Scalar::ONE)
    };

    let key_image = spend_secret.map(|spend| {
        let base = if major != 0 || minor != 0 {
            spend + cn_subaddress_secret(view_secret, major, minor)
        } else {
            *spend
        };
        generate_key_image(&output.public_key, &(base + d2s))
    });

    Some(CnScanResult {
        amount,
        mask,
        subaddress_major: major,
        subaddress_minor: minor,
        key_image,
    })
}

/// One-time spend secret for a stored output:
/// `k_o = k_s [+ m_subaddr] + H_s(8*k_v*R || i)`.
pub fn derive_output_spend_key(
    view_secret: &Scalar,
    spend_secret: &Scalar,
    tx_pub_key: &[u8; 32],
    output_index: u32,
    subaddress_major: u32,
    subaddress_minor: u32,
) -> Option<Scalar> {
    let derivation = generate_key_derivation(tx_pub_key, view_secret).ok()?;
    let d2s = derivation_to_scalar(&derivation, output_index);

    let base = if subaddress_major != 0 || subaddress_minor != 0 {
        spend_secret + cn_subaddress_secret(view_secret, subaddress_major, subaddress_minor)
    } else {
        *spend_secret
    };
    Some(base + d2s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subaddress::cn_subaddress_map;
    use crate::{derive_public_key, random_scalar};

    struct Fixture {
        view: Scalar,
        spend: Scalar,
        spend_pub: [u8; 32],
        tx_secret: Scalar,
        tx_pub: [u8; 32],
        map: SubaddressMap,
    }

    fn fixture() -> Fixture {
        let view = random_scalar();
        let spend = random_scalar();
        let spend_pub = compress(&scalar_mul_base(&spend));
        let tx_secret = random_scalar();
        let tx_pub = compress(&scalar_mul_base(&tx_secret));
        let map = cn_subaddress_map(&spend_pub, &view, 2, 4).unwrap();
        Fixture {
            view,
            spend,
            spend_pub,
            tx_secret,
            tx_pub,
            map,
        }
    }

    /// Build a main-address output the wallet should recognize.
    fn make_output(f: &Fixture, index: u32, amount: u64, tagged: bool) -> ([u8; 32], CnOutput) {
        let view_pub = compress(&scalar_mul_base(&f.view));
        let derivation = generate_key_derivation(&view_pub, &f.tx_secret).unwrap();
        let ko = derive_public_key(&derivation, index, &f.spend_pub).unwrap();

        let shared = derivation_to_scalar(&derivation, index).to_bytes();
        let output = CnOutput {
            public_key: ko,
            output_index: index,
            view_tag: tagged.then(|| view_tag(&derivation, index)),
            encrypted_amount: ecdh_encode_amount(amount, &shared),
            cleartext_amount: None,
            is_rct: true,
        };
        (derivation, output)
    }

    #[test]
    fn recognizes_own_output_and_recovers_amount() {
        let f = fixture();
        let (derivation, output) = make_output(&f, 1, 777_000, true);

        let result = scan_output(&output, &derivation, &f.view, Some(&f.spend), &f.map)
            .expect("own output must be recognized");
        assert_eq!(result.amount, 777_000);
        assert_eq!((result.subaddress_major, result.subaddress_minor), (0, 0));
        assert!(result.key_image.is_some());
        assert_eq!(result.mask, commitment_mask(&derivation_to_scalar(&derivation, 1).to_bytes()));
    }

    #[test]
    fn view_tag_mismatch_short_circuits() {
        let f = fixture();
        let (derivation, mut output) = make_output(&f, 0, 100, true);
        output.view_tag = Some(output.view_tag.unwrap().wrapping_add(1));
        assert!(scan_output(&output, &derivation, &f.view, None, &f.map).is_none());
    }

    #[test]
    fn untagged_outputs_still_scan() {
        let f = fixture();
        let (derivation, output) = make_output(&f, 2, 50, false);
        assert!(output.view_tag.is_none());
        assert!(scan_output(&output, &derivation, &f.view, None, &f.map).is_some());
    }

    #[test]
    fn foreign_output_not_recognized() {
        let f = fixture();
        let g = fixture(); // different wallet
        let (derivation, output) = make_output(&g, 0, 42, false);
        // Scan with f's table against g's output: derivation matches g's view
        // key, but the recovered spend key is not in f's map.
        assert!(scan_output(&output, &derivation, &f.view, None, &f.map).is_none());
    }

    #[test]
    fn view_only_scan_omits_key_image() {
        let f = fixture();
        let (derivation, output) = make_output(&f, 0, 1, true);
        let result = scan_output(&output, &derivation, &f.view, None, &f.map).unwrap();
        assert!(result.key_image.is_none());
    }

    #[test]
    fn spend_key_opens_onetime_address() {
        let f = fixture();
        let (_, output) = make_output(&f, 3, 5, false);
        let k_o =
            derive_output_spend_key(&f.view, &f.spend, &f.tx_pub, 3, 0, 0).unwrap();
        assert_eq!(compress(&scalar_mul_base(&k_o)), output.public_key);
    }

    #[test]
    fn subaddress_output_roundtrip() {
        let f = fixture();
        // Sender targets subaddress (1,2): R = r*D_spend, Ko = H_s(r*C||i)*G + D.
        let sub_spend = compress(&crate::subaddress::cn_subaddress_spend_pubkey(
            &decompress(&f.spend_pub).unwrap(),
            &f.view,
            1,
            2,
        ));
        // Subaddress view pubkey C = k_v * D.
        let sub_view = compress(&(f.view * decompress(&sub_spend).unwrap()));
        let derivation = generate_key_derivation(&sub_view, &f.tx_secret).unwrap();
        let ko = derive_public_key(&derivation, 0, &sub_spend).unwrap();

        let shared = derivation_to_scalar(&derivation, 0).to_bytes();
        let output = CnOutput {
            public_key: ko,
            output_index: 0,
            view_tag: Some(view_tag(&derivation, 0)),
            encrypted_amount: ecdh_encode_amount(9_999, &shared),
            cleartext_amount: None,
            is_rct: true,
        };

        let result = scan_output(&output, &derivation, &f.view, Some(&f.spend), &f.map)
            .expect("subaddress output must be recognized");
        assert_eq!((result.subaddress_major, result.subaddress_minor), (1, 2));
        assert_eq!(result.amount, 9_999);

        // The derived spend key must open Ko.
        let m = cn_subaddress_secret(&f.view, 1, 2);
        let k_o = f.spend + m + derivation_to_scalar(&derivation, 0);
        assert_eq!(compress(&scalar_mul_base(&k_o)), ko);
        assert_eq!(result.key_image.unwrap(), generate_key_image(&ko, &k_o));
    }

    #[test]
    fn coinbase_gets_identity_mask() {
        let f = fixture();
        let view_pub = compress(&scalar_mul_base(&f.view));
        let derivation = generate_key_derivation(&view_pub, &f.tx_secret).unwrap();
        let ko = derive_public_key(&derivation, 0, &f.spend_pub).unwrap();
        let output = CnOutput {
            public_key: ko,
            output_index: 0,
            view_tag: None,
            encrypted_amount: [0u8; 8],
            cleartext_amount: Some(60_000_000_000),
            is_rct: false,
        };
        let result = scan_output(&output, &derivation, &f.view, None, &f.map).unwrap();
        assert_eq!(result.amount, 60_000_000_000);
        assert_eq!(result.mask, Scalar::ONE);
    }
}
