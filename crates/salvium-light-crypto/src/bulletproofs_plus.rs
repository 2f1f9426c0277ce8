//! Bulletproofs+ aggregate range proofs.
//!
//! Proves every committed amount lies in [0, 2^64) with one logarithmic-size
//! proof per transaction. Prove and verify follow the reference
//! `bulletproofs_plus.cc`; the weighted batch verification equation collapses
//! to a single multiscalar multiplication that must land on the identity.
//!
//! Reference: https://eprint.iacr.org/2020/735.pdf

use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::VartimeMultiscalarMul;

use crate::{h_point, hash_to_point, inv_eight, keccak256, mul8, random_scalar, H_POINT_BYTES};

/// Bits per range proof.
const N_BITS: usize = 64;
const LOG_N: usize = 6;
/// Maximum aggregated outputs per proof.
pub const MAX_OUTPUTS: usize = 16;

#[derive(Debug, Clone)]
pub struct BulletproofPlus {
    /// Output commitments the proof binds to (V; not part of the wire blob).
    pub v: Vec<EdwardsPoint>,
    pub a: EdwardsPoint,
    pub a1: EdwardsPoint,
    pub b: EdwardsPoint,
    pub r1: Scalar,
    pub s1: Scalar,
    pub d1: Scalar,
    pub l: Vec<EdwardsPoint>,
    pub r: Vec<EdwardsPoint>,
}

// ─── Generators and transcript ───────────────────────────────────────────────

fn varint(mut val: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(5);
    loop {
        let b = (val & 0x7f) as u8;
        val >>= 7;
        if val == 0 {
            out.push(b);
            return out;
        }
        out.push(b | 0x80);
    }
}

/// `get_exponent`: H || "bulletproof_plus" || varint(index), double-hashed
/// into the prime-order subgroup (hash_to_point hashes once more itself).
fn generator_at(index: u32) -> EdwardsPoint {
    let mut data = Vec::with_capacity(32 + 16 + 5);
    data.extend_from_slice(&H_POINT_BYTES);
    data.extend_from_slice(b"bulletproof_plus");
    data.extend_from_slice(&varint(index));
    hash_to_point(&keccak256(&data))
}

/// Gi at odd indices, Hi at even, as the reference lays them out.
fn generators(count: usize) -> (Vec<EdwardsPoint>, Vec<EdwardsPoint>) {
    let mut gi = Vec::with_capacity(count);
    let mut hi = Vec::with_capacity(count);
    for i in 0..count as u32 {
        hi.push(generator_at(2 * i));
        gi.push(generator_at(2 * i + 1));
    }
    (gi, hi)
}

fn transcript_seed() -> [u8; 32] {
    let h1 = keccak256(b"bulletproof_plus_transcript");
    hash_to_point(&h1).compress().to_bytes()
}

fn scalar_of(bytes: &[u8; 32]) -> Scalar {
    Scalar::from_bytes_mod_order(*bytes)
}

fn absorb1(transcript: &[u8; 32], e: &[u8; 32]) -> [u8; 32] {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(transcript);
    data[32..].copy_from_slice(e);
    scalar_of(&keccak256(&data)).to_bytes()
}

fn absorb2(transcript: &[u8; 32], e1: &[u8; 32], e2: &[u8; 32]) -> [u8; 32] {
    let mut data = [0u8; 96];
    data[..32].copy_from_slice(transcript);
    data[32..64].copy_from_slice(e1);
    data[64..].copy_from_slice(e2);
    scalar_of(&keccak256(&data)).to_bytes()
}

fn hash_points(points: &[EdwardsPoint]) -> Scalar {
    let mut data = Vec::with_capacity(points.len() * 32);
    for p in points {
        data.extend_from_slice(&p.compress().to_bytes());
    }
    scalar_of(&keccak256(&data))
}

fn padded_size(m: usize) -> (usize, usize) {
    let mut padded = 1usize;
    let mut log = 0usize;
    while padded < m {
        padded *= 2;
        log += 1;
    }
    (padded, log)
}

// ─── Prove ───────────────────────────────────────────────────────────────────

pub fn prove(amounts: &[u64], masks: &[Scalar]) -> BulletproofPlus {
    assert!(!amounts.is_empty() && amounts.len() == masks.len());
    assert!(amounts.len() <= MAX_OUTPUTS);

    let (m_padded, log_m) = padded_size(amounts.len());
    let mn = m_padded * N_BITS;
    let log_mn = log_m + LOG_N;

    let inv8 = inv_eight();
    let g = ED25519_BASEPOINT_POINT;
    let h = h_point();
    let (gi, hi) = generators(mn);

    let mut transcript = transcript_seed();

    // V_j = (mask_j * G + amount_j * H) / 8
    let v: Vec<EdwardsPoint> = amounts
        .iter()
        .zip(masks)
        .map(|(&amount, mask)| {
            EdwardsPoint::vartime_multiscalar_mul(
                [mask * inv8, Scalar::from(amount) * inv8],
                [g, h],
            )
        })
        .collect();
    transcript = absorb1(&transcript, &hash_points(&v).to_bytes());

    // Bit decomposition: aL bit vector, aR = aL - 1.
    let minus_one = -Scalar::ONE;
    let mut a_l = vec![Scalar::ZERO; mn];
    let mut a_r = vec![minus_one; mn];
    for (j, &amount) in amounts.iter().enumerate() {
        for i in 0..N_BITS {
            if (amount >> i) & 1 == 1 {
                a_l[j * N_BITS + i] = Scalar::ONE;
                a_r[j * N_BITS + i] = Scalar::ZERO;
            }
        }
    }

    // A = (sum aL_i Gi + sum aR_i Hi + alpha G) / 8
    let alpha = random_scalar();
    let a_point = {
        let mut scalars = Vec::with_capacity(2 * mn + 1);
        let mut points = Vec::with_capacity(2 * mn + 1);
        for i in 0..mn {
            scalars.push(a_l[i] * inv8);
            points.push(gi[i]);
            scalars.push(a_r[i] * inv8);
            points.push(hi[i]);
        }
        scalars.push(alpha * inv8);
        points.push(g);
        EdwardsPoint::vartime_multiscalar_mul(scalars, points)
    };

    transcript = absorb1(&transcript, &a_point.compress().to_bytes());
    let y = scalar_of(&transcript);
    debug_assert!(y != Scalar::ZERO);
    let z = scalar_of(&keccak256(&y.to_bytes()));
    debug_assert!(z != Scalar::ZERO);
    transcript = z.to_bytes();
    let z2 = z * z;

    // d: per-slot weights z^(2(j+1)) * 2^i.
    let mut d = vec![Scalar::ZERO; mn];
    let mut z_pow = z2;
    for j in 0..m_padded {
        let mut two_pow = Scalar::ONE;
        for i in 0..N_BITS {
            d[j * N_BITS + i] = z_pow * two_pow;
            two_pow = two_pow + two_pow;
        }
        z_pow *= z2;
    }

    // Powers of y (0..=mn+1) and of y^-1 (0..mn).
    let mut y_pows = Vec::with_capacity(mn + 2);
    y_pows.push(Scalar::ONE);
    for i in 1..=mn + 1 {
        y_pows.push(y_pows[i - 1] * y);
    }
    let y_inv = y.invert();
    let mut y_inv_pows = Vec::with_capacity(mn);
    y_inv_pows.push(Scalar::ONE);
    for i in 1..mn {
        y_inv_pows.push(y_inv_pows[i - 1] * y_inv);
    }

    // Shifted vectors entering the inner product argument.
    let mut a_vec: Vec<Scalar> = (0..mn).map(|i| a_l[i] - z).collect();
    let mut b_vec: Vec<Scalar> = (0..mn).map(|i| a_r[i] + z + d[i] * y_pows[mn - i]).collect();

    let mut alpha1 = alpha;
    let mut z_acc = Scalar::ONE;
    for mask in masks {
        z_acc *= z2;
        alpha1 += z_acc * y_pows[mn + 1] * mask;
    }

    // Inner-product rounds.
    let mut nprime = mn;
    let mut g_prime = gi;
    let mut h_prime = hi;
    let mut l_points = Vec::with_capacity(log_mn);
    let mut r_points = Vec::with_capacity(log_mn);

    while nprime > 1 {
        nprime /= 2;

        let mut c_l = Scalar::ZERO;
        let mut c_r = Scalar::ZERO;
        let mut y_pow = y;
        for i in 0..nprime {
            c_l += a_vec[i] * b_vec[nprime + i] * y_pow;
            c_r += a_vec[nprime + i] * y_pows[nprime] * b_vec[i] * y_pow;
            y_pow *= y;
        }

        let d_l = random_scalar();
        let d_r = random_scalar();

        let l_point = {
            let mut scalars = Vec::with_capacity(2 * nprime + 2);
            let mut points = Vec::with_capacity(2 * nprime + 2);
            for i in 0..nprime {
                scalars.push(a_vec[i] * y_inv_pows[nprime] * inv8);
                points.push(g_prime[nprime + i]);
                scalars.push(b_vec[nprime + i] * inv8);
                points.push(h_prime[i]);
            }
            scalars.push(c_l * inv8);
            points.push(h);
            scalars.push(d_l * inv8);
            points.push(g);
            EdwardsPoint::vartime_multiscalar_mul(scalars, points)
        };
        l_points.push(l_point);

        let r_point = {
            let mut scalars = Vec::with_capacity(2 * nprime + 2);
            let mut points = Vec::with_capacity(2 * nprime + 2);
            for i in 0..nprime {
                scalars.push(a_vec[nprime + i] * y_pows[nprime] * inv8);
                points.push(g_prime[i]);
                scalars.push(b_vec[i] * inv8);
                points.push(h_prime[nprime + i]);
            }
            scalars.push(c_r * inv8);
            points.push(h);
            scalars.push(d_r * inv8);
            points.push(g);
            EdwardsPoint::vartime_multiscalar_mul(scalars, points)
        };
        r_points.push(r_point);

        transcript = absorb2(
            &transcript,
            &l_point.compress().to_bytes(),
            &r_point.compress().to_bytes(),
        );
        let x = scalar_of(&transcript);
        debug_assert!(x != Scalar::ZERO);
        let x_inv = x.invert();

        // Fold generators and witness vectors.
        let gw = y_inv_pows[nprime] * x;
        let aw = x_inv * y_pows[nprime];
        let mut next_g = Vec::with_capacity(nprime);
        let mut next_h = Vec::with_capacity(nprime);
        for i in 0..nprime {
            next_g.push(EdwardsPoint::vartime_multiscalar_mul(
                [x_inv, gw],
                [g_prime[i], g_prime[nprime + i]],
            ));
            next_h.push(EdwardsPoint::vartime_multiscalar_mul(
                [x, x_inv],
                [h_prime[i], h_prime[nprime + i]],
            ));
        }
        g_prime = next_g;
        h_prime = next_h;

        let mut next_a = Vec::with_capacity(nprime);
        let mut next_b = Vec::with_capacity(nprime);
        for i in 0..nprime {
            next_a.push(a_vec[i] * x + a_vec[nprime + i] * aw);
            next_b.push(b_vec[i] * x_inv + b_vec[nprime + i] * x);
        }
        a_vec = next_a;
        b_vec = next_b;

        alpha1 += d_l * x * x + d_r * x_inv * x_inv;
    }

    // Closing round.
    let r = random_scalar();
    let s = random_scalar();
    let d_last = random_scalar();
    let eta = random_scalar();

    let h_coeff = r * y * b_vec[0] + s * y * a_vec[0];
    let a1 = EdwardsPoint::vartime_multiscalar_mul(
        [r * inv8, s * inv8, d_last * inv8, h_coeff * inv8],
        [g_prime[0], h_prime[0], g, h],
    );
    let b_point =
        EdwardsPoint::vartime_multiscalar_mul([eta * inv8, r * y * s * inv8], [g, h]);

    transcript = absorb2(
        &transcript,
        &a1.compress().to_bytes(),
        &b_point.compress().to_bytes(),
    );
    let e = scalar_of(&transcript);
    debug_assert!(e != Scalar::ZERO);

    BulletproofPlus {
        v,
        a: a_point,
        a1,
        b: b_point,
        r1: r + a_vec[0] * e,
        s1: s + b_vec[0] * e,
        d1: eta + d_last * e + alpha1 * e * e,
        l: l_points,
        r: r_points,
    }
}

// ─── Verify ──────────────────────────────────────────────────────────────────

pub fn verify(commitments: &[EdwardsPoint], proof: &BulletproofPlus) -> bool {
    verify_batch(&[(commitments, proof)])
}

struct Recon {
    m: usize,
    m_padded: usize,
    mn: usize,
    rounds: usize,
    y: Scalar,
    z: Scalar,
    e: Scalar,
    challenges: Vec<Scalar>,
    inv_challenges: Vec<Scalar>,
    y_inv: Scalar,
}

pub fn verify_batch(proofs: &[(&[EdwardsPoint], &BulletproofPlus)]) -> bool {
    if proofs.is_empty() {
        return true;
    }

    let seed = transcript_seed();
    let g = ED25519_BASEPOINT_POINT;
    let h = h_point();

    // Reconstruct all Fiat-Shamir challenges, collecting inversions.
    let mut to_invert: Vec<Scalar> = Vec::new();
    let mut recons: Vec<Recon> = Vec::with_capacity(proofs.len());

    for &(v, proof) in proofs {
        let m = v.len();
        if m == 0 || m > MAX_OUTPUTS {
            return false;
        }
        let (m_padded, log_m) = padded_size(m);
        let mn = m_padded * N_BITS;
        let rounds = proof.l.len();
        if rounds != LOG_N + log_m || proof.r.len() != rounds {
            return false;
        }

        let mut transcript = absorb1(&seed, &hash_points(v).to_bytes());
        transcript = absorb1(&transcript, &proof.a.compress().to_bytes());
        let y = scalar_of(&transcript);
        if y == Scalar::ZERO {
            return false;
        }
        let z = scalar_of(&keccak256(&y.to_bytes()));
        if z == Scalar::ZERO {
            return false;
        }
        transcript = z.to_bytes();

        let mut challenges = Vec::with_capacity(rounds);
        for j in 0..rounds {
            transcript = absorb2(
                &transcript,
                &proof.l[j].compress().to_bytes(),
                &proof.r[j].compress().to_bytes(),
            );
            let x = scalar_of(&transcript);
            if x == Scalar::ZERO {
                return false;
            }
            challenges.push(x);
            to_invert.push(x);
        }

        transcript = absorb2(
            &transcript,
            &proof.a1.compress().to_bytes(),
            &proof.b.compress().to_bytes(),
        );
        let e = scalar_of(&transcript);
        to_invert.push(y);

        recons.push(Recon {
            m,
            m_padded,
            mn,
            rounds,
            y,
            z,
            e,
            challenges,
            inv_challenges: Vec::new(),
            y_inv: Scalar::ZERO,
        });
    }

    let inverses = batch_invert(&to_invert);
    let mut idx = 0;
    for recon in &mut recons {
        recon.inv_challenges = inverses[idx..idx + recon.rounds].to_vec();
        idx += recon.rounds;
        recon.y_inv = inverses[idx];
        idx += 1;
    }

    // One weighted multiscalar equation across all proofs.
    let max_mn = recons.iter().map(|d| d.mn).max().unwrap_or(0);
    let (gi, hi) = generators(max_mn);

    let mut scalars: Vec<Scalar> = Vec::new();
    let mut points: Vec<EdwardsPoint> = Vec::new();
    let mut g_scalar = Scalar::ZERO;
    let mut h_scalar = Scalar::ZERO;

    for (&(v, proof), data) in proofs.iter().zip(&recons) {
        let w = if proofs.len() == 1 {
            Scalar::ONE
        } else {
            random_scalar()
        };
        let e2 = data.e * data.e;

        let y_mn = scalar_pow(&data.y, data.mn);
        let y_mn_p1 = y_mn * data.y;

        let z2 = data.z * data.z;
        let mut z_pows = Vec::with_capacity(data.m_padded);
        z_pows.push(z2);
        for j in 1..data.m_padded {
            z_pows.push(z_pows[j - 1] * z2);
        }

        let sum_z: Scalar = z_pows.iter().sum();
        let sum_d = Scalar::from(u64::MAX) * sum_z;

        let mut sum_y = Scalar::ZERO;
        let mut yp = data.y;
        for _ in 0..data.mn {
            sum_y += yp;
            yp *= data.y;
        }

        for (j, commitment) in v.iter().enumerate() {
            scalars.push(-(w * e2 * z_pows[j] * y_mn_p1));
            points.push(mul8(commitment));
        }

        scalars.push(-(w * e2));
        points.push(mul8(&proof.a));
        scalars.push(-(w * data.e));
        points.push(mul8(&proof.a1));
        scalars.push(-w);
        points.push(mul8(&proof.b));

        g_scalar += w * proof.d1;

        let h_term = proof.r1 * data.y * proof.s1
            + e2 * (y_mn_p1 * data.z * sum_d + (z2 - data.z) * sum_y);
        h_scalar += w * h_term;

        let cache = challenge_products(&data.challenges, &data.inv_challenges, data.mn);

        let mut e_r1_w = data.e * proof.r1 * w;
        let e_s1_w = data.e * proof.s1 * w;
        let e2_z_w = e2 * data.z * w;
        let mut neg_e2_w_y = -(e2 * w * y_mn);

        for i in 0..data.mn {
            let d_val = z_pows[i / N_BITS] * Scalar::from(1u64 << (i % N_BITS));

            scalars.push(e_r1_w * cache[i] + e2_z_w);
            points.push(gi[i]);

            let mirror = (!i) & (data.mn - 1);
            scalars.push(e_s1_w * cache[mirror] - e2_z_w + neg_e2_w_y * d_val);
            points.push(hi[i]);

            e_r1_w *= data.y_inv;
            neg_e2_w_y *= data.y_inv;
        }

        for j in 0..data.rounds {
            let x2 = data.challenges[j] * data.challenges[j];
            let x_inv2 = data.inv_challenges[j] * data.inv_challenges[j];
            scalars.push(-(w * e2 * x2));
            points.push(mul8(&proof.l[j]));
            scalars.push(-(w * e2 * x_inv2));
            points.push(mul8(&proof.r[j]));
        }
    }

    if g_scalar != Scalar::ZERO {
        scalars.push(g_scalar);
        points.push(g);
    }
    if h_scalar != Scalar::ZERO {
        scalars.push(h_scalar);
        points.push(h);
    }

    EdwardsPoint::vartime_multiscalar_mul(scalars, points) == EdwardsPoint::default()
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn scalar_pow(base: &Scalar, mut exp: usize) -> Scalar {
    let mut result = Scalar::ONE;
    let mut b = *base;
    while exp > 0 {
        if exp & 1 == 1 {
            result *= b;
        }
        b *= b;
        exp >>= 1;
    }
    result
}

/// Montgomery's trick: invert all scalars with one field inversion.
fn batch_invert(scalars: &[Scalar]) -> Vec<Scalar> {
    if scalars.is_empty() {
        return vec![];
    }
    let n = scalars.len();
    let mut products = Vec::with_capacity(n);
    let mut acc = scalars[0];
    products.push(acc);
    for s in &scalars[1..] {
        acc *= s;
        products.push(acc);
    }

    let mut inv = acc.invert();
    let mut out = vec![Scalar::ZERO; n];
    for i in (1..n).rev() {
        out[i] = products[i - 1] * inv;
        inv *= scalars[i];
    }
    out[0] = inv;
    out
}

/// Per-slot products of round challenges: slot i gets prod of x_j or x_j^-1
/// according to i's bits.
fn challenge_products(challenges: &[Scalar], inverses: &[Scalar], mn: usize) -> Vec<Scalar> {
    let rounds = challenges.len();
    let mut cache = vec![Scalar::ZERO; mn];
    cache[0] = inverses[0];
    cache[1] = challenges[0];
    for j in 1..rounds {
        let slots = 1usize << (j + 1);
        for s in (0..slots).rev() {
            cache[s] = if s % 2 == 1 {
                cache[s / 2] * challenges[j]
            } else {
                cache[s / 2] * inverses[j]
            };
        }
    }
    cache
}

// ─── Wire form ───────────────────────────────────────────────────────────────

/// Serialize the proof body (A, A1, B, r1, s1, d1, L[], R[]).
pub fn serialize(proof: &BulletproofPlus) -> Vec<u8> {
    let mut out = Vec::with_capacity(6 * 32 + 2 + (proof.l.len() + proof.r.len()) * 32);
    out.extend_from_slice(&proof.a.compress().to_bytes());
    out.extend_from_slice(&proof.a1.compress().to_bytes());
    out.extend_from_slice(&proof.b.compress().to_bytes());
    out.extend_from_slice(&proof.r1.to_bytes());
    out.extend_from_slice(&proof.s1.to_bytes());
    out.extend_from_slice(&proof.d1.to_bytes());
    out.extend_from_slice(&varint(proof.l.len() as u32));
    for p in &proof.l {
        out.extend_from_slice(&p.compress().to_bytes());
    }
    out.extend_from_slice(&varint(proof.r.len() as u32));
    for p in &proof.r {
        out.extend_from_slice(&p.compress().to_bytes());
    }
    out
}

pub fn deserialize(bytes: &[u8]) -> Option<BulletproofPlus> {
    fn take32(bytes: &[u8], offset: &mut usize) -> Option<[u8; 32]> {
        let chunk = bytes.get(*offset..*offset + 32)?;
        *offset += 32;
        let mut out = [0u8; 32];
        out.copy_from_slice(chunk);
        Some(out)
    }
    fn take_varint(bytes: &[u8], offset: &mut usize) -> Option<usize> {
        let mut value = 0usize;
        let mut shift = 0;
        loop {
            let b = *bytes.get(*offset)?;
            *offset += 1;
            value |= ((b & 0x7f) as usize) << shift;
            if b & 0x80 == 0 {
                return Some(value);
            }
            shift += 7;
        }
    }
    fn take_point(bytes: &[u8], offset: &mut usize) -> Option<EdwardsPoint> {
        CompressedEdwardsY(take32(bytes, offset)?).decompress()
    }

    let mut offset = 0;
    let a = take_point(bytes, &mut offset)?;
    let a1 = take_point(bytes, &mut offset)?;
    let b = take_point(bytes, &mut offset)?;
    let r1 = Scalar::from_bytes_mod_order(take32(bytes, &mut offset)?);
    let s1 = Scalar::from_bytes_mod_order(take32(bytes, &mut offset)?);
    let d1 = Scalar::from_bytes_mod_order(take32(bytes, &mut offset)?);

    let l_count = take_varint(bytes, &mut offset)?;
    let mut l = Vec::with_capacity(l_count);
    for _ in 0..l_count {
        l.push(take_point(bytes, &mut offset)?);
    }
    let r_count = take_varint(bytes, &mut offset)?;
    let mut r = Vec::with_capacity(r_count);
    for _ in 0..r_count {
        r.push(take_point(bytes, &mut offset)?);
    }

    Some(BulletproofPlus {
        v: Vec::new(),
        a,
        a1,
        b,
        r1,
        s1,
        d1,
        l,
        r,
    })
}
