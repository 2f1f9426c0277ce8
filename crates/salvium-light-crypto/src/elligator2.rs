//! Elligator-2 map from a 32-byte hash to an Ed25519 point.
//!
//! Port of `ge_fromfe_frombytes_vartime` from the reference `crypto-ops.c`.
//! The output is NOT cofactor-cleared; callers multiply by 8.
//!
//! The field arithmetic is a straightforward 4x64-limb implementation mod
//! p = 2^255 - 19. None of it runs on secret data (the input is a public
//! hash), so vartime operations are fine here.

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};

/// Montgomery curve parameter A = 486662.
const A: u64 = 486662;

/// 256-bit little-endian integer for field arithmetic mod p.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Fe([u64; 4]);

impl Fe {
    const ZERO: Fe = Fe([0, 0, 0, 0]);
    const ONE: Fe = Fe([1, 0, 0, 0]);
    const TWO: Fe = Fe([2, 0, 0, 0]);

    /// p = 2^255 - 19
    const P: Fe = Fe([
        0xffff_ffff_ffff_ffed,
        0xffff_ffff_ffff_ffff,
        0xffff_ffff_ffff_ffff,
        0x7fff_ffff_ffff_ffff,
    ]);

    fn from_bytes(bytes: &[u8; 32]) -> Fe {
        let mut limbs = [0u64; 4];
        for (i, limb) in limbs.iter_mut().enumerate() {
            *limb = u64::from_le_bytes(bytes[i * 8..i * 8 + 8].try_into().unwrap());
        }
        Fe(limbs)
    }

    fn to_bytes(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, limb) in self.0.iter().enumerate() {
            out[i * 8..i * 8 + 8].copy_from_slice(&limb.to_le_bytes());
        }
        out
    }

    fn is_zero(&self) -> bool {
        self.0 == [0; 4]
    }

    fn is_odd(&self) -> bool {
        self.0[0] & 1 == 1
    }

    fn geq(&self, other: &Fe) -> bool {
        for i in (0..4).rev() {
            if self.0[i] != other.0[i] {
                return self.0[i] > other.0[i];
            }
        }
        true
    }

    fn wrapping_add(&self, other: &Fe) -> (Fe, bool) {
        let mut out = [0u64; 4];
        let mut carry = 0u128;
        for i in 0..4 {
            let sum = self.0[i] as u128 + other.0[i] as u128 + carry;
            out[i] = sum as u64;
            carry = sum >> 64;
        }
        (Fe(out), carry != 0)
    }

    fn wrapping_sub(&self, other: &Fe) -> (Fe, bool) {
        let mut out = [0u64; 4];
        let mut borrow = 0i128;
        for i in 0..4 {
            let diff = self.0[i] as i128 - other.0[i] as i128 + borrow;
            if diff < 0 {
                out[i] = (diff + (1i128 << 64)) as u64;
                borrow = -1;
            } else {
                out[i] = diff as u64;
                borrow = 0;
            }
        }
        (Fe(out), borrow != 0)
    }

    fn reduce(&self) -> Fe {
        let mut r = *self;
        while r.geq(&Self::P) {
            r = r.wrapping_sub(&Self::P).0;
        }
        r
    }
}

fn add(a: &Fe, b: &Fe) -> Fe {
    a.wrapping_add(b).0.reduce()
}

fn sub(a: &Fe, b: &Fe) -> Fe {
    if a.geq(b) {
        a.wrapping_sub(b).0
    } else {
        a.wrapping_add(&Fe::P).0.wrapping_sub(b).0.reduce()
    }
}

fn neg(a: &Fe) -> Fe {
    if a.is_zero() {
        Fe::ZERO
    } else {
        Fe::P.wrapping_sub(a).0
    }
}

fn mul_small(a: &Fe, c: u64) -> Fe {
    let mut out = [0u64; 4];
    let mut carry = 0u128;
    for i in 0..4 {
        let v = a.0[i] as u128 * c as u128 + carry;
        out[i] = v as u64;
        carry = v >> 64;
    }
    let mut r = Fe(out);
    if carry > 0 {
        // carry * 2^256 == carry * 38 (mod p)
        r = r.wrapping_add(&Fe([carry as u64 * 38, 0, 0, 0])).0;
    }
    r.reduce()
}

fn mul(a: &Fe, b: &Fe) -> Fe {
    let mut prod = [0u128; 8];
    for i in 0..4 {
        let mut carry = 0u128;
        for j in 0..4 {
            let v = a.0[i] as u128 * b.0[j] as u128 + prod[i + j] + carry;
            prod[i + j] = v & 0xffff_ffff_ffff_ffff;
            carry = v >> 64;
        }
        prod[i + 4] += carry;
    }

    // Fold the high half: 2^256 == 38 (mod p).
    let lo = Fe([prod[0] as u64, prod[1] as u64, prod[2] as u64, prod[3] as u64]);
    let hi = Fe([prod[4] as u64, prod[5] as u64, prod[6] as u64, prod[7] as u64]);
    let (sum, carry) = lo.wrapping_add(&mul_small(&hi, 38));
    let folded = if carry {
        sum.wrapping_add(&Fe([38, 0, 0, 0])).0
    } else {
        sum
    };
    folded.reduce()
}

fn sq(a: &Fe) -> Fe {
    mul(a, a)
}

fn pow(base: &Fe, exp: &Fe) -> Fe {
    let mut result = Fe::ONE;
    let mut b = *base;
    for limb in exp.0 {
        let mut bits = limb;
        for _ in 0..64 {
            if bits & 1 == 1 {
                result = mul(&result, &b);
            }
            b = sq(&b);
            bits >>= 1;
        }
    }
    result
}

fn invert(a: &Fe) -> Fe {
    // a^(p-2)
    pow(
        a,
        &Fe([
            0xffff_ffff_ffff_ffeb,
            0xffff_ffff_ffff_ffff,
            0xffff_ffff_ffff_ffff,
            0x7fff_ffff_ffff_ffff,
        ]),
    )
}

/// sqrt(-1) mod p.
fn sqrt_m1() -> Fe {
    Fe::from_bytes(&[
        0xb0, 0xa0, 0x0e, 0x4a, 0x27, 0x1b, 0xee, 0xc4, 0x78, 0xe4, 0x2f, 0xad, 0x06, 0x18,
        0x43, 0x2f, 0xa7, 0xd7, 0xfb, 0x3d, 0x99, 0x00, 0x4d, 0x2b, 0x0b, 0xdf, 0xc1, 0x4f,
        0x80, 0x24, 0x83, 0x2b,
    ])
}

/// x^((p-5)/8) = x^(2^252 - 3).
fn pow_pm5d8(x: &Fe) -> Fe {
    pow(
        x,
        &Fe([
            0xffff_ffff_ffff_fffd,
            0xffff_ffff_ffff_ffff,
            0xffff_ffff_ffff_ffff,
            0x0fff_ffff_ffff_ffff,
        ]),
    )
}

/// (u/v)^((p+3)/8) = u * v^3 * (u * v^7)^((p-5)/8).
fn divpowm1(u: &Fe, v: &Fe) -> Fe {
    let v3 = mul(&sq(v), v);
    let v7 = mul(&sq(&sq(v)), &v3);
    mul(&mul(u, &v3), &pow_pm5d8(&mul(u, &v7)))
}

/// Square root mod p, trying the direct candidate then the sqrt(-1) twist.
fn sqrt(a: &Fe) -> Option<Fe> {
    if a.is_zero() {
        return Some(Fe::ZERO);
    }
    // a^((p+3)/8) = a^(2^252 - 2)
    let candidate = pow(
        a,
        &Fe([
            0xffff_ffff_ffff_fffe,
            0xffff_ffff_ffff_ffff,
            0xffff_ffff_ffff_ffff,
            0x0fff_ffff_ffff_ffff,
        ]),
    );
    if sq(&candidate) == *a {
        return Some(candidate);
    }
    let twisted = mul(&candidate, &sqrt_m1());
    if sq(&twisted) == *a {
        return Some(twisted);
    }
    None
}

/// Map a 32-byte hash to a curve point (no cofactor clearing).
pub fn ge_fromfe_frombytes_vartime(hash: &[u8; 32]) -> EdwardsPoint {
    let u = Fe::from_bytes(hash).reduce();
    let a_fe = Fe([A, 0, 0, 0]);
    let neg_a = neg(&a_fe);
    let neg_a_sq = neg(&sq(&a_fe));

    // v = 2u^2, w = 2u^2 + 1
    let u2 = sq(&u);
    let v = add(&u2, &u2);
    let w = add(&v, &Fe::ONE);

    // x = w^2 - 2 A^2 u^2
    let mut x = add(&sq(&w), &mul(&add(&neg_a_sq, &neg_a_sq), &u2));

    let mut r_x = divpowm1(&w, &x);
    let mut y = mul(&sq(&r_x), &x);

    let sqm1 = sqrt_m1();
    let mut z = neg_a;
    let sign;

    let a_plus_2 = add(&a_fe, &Fe::TWO);
    let two_a_ap2 = mul(&add(&a_fe, &a_fe), &a_plus_2);

    if sub(&w, &y).is_zero() {
        // y == w: multiply by sqrt(2A(A+2))
        if let Some(fffb2) = sqrt(&two_a_ap2) {
            r_x = mul(&r_x, &fffb2);
        }
        r_x = mul(&r_x, &u);
        z = mul(&z, &v);
        sign = false;
    } else if add(&w, &y).is_zero() {
        // y == -w: multiply by sqrt(-2A(A+2))
        if let Some(fffb1) = sqrt(&neg(&two_a_ap2)) {
            r_x = mul(&r_x, &fffb1);
        }
        r_x = mul(&r_x, &u);
        z = mul(&z, &v);
        sign = false;
    } else {
        // Twist branch: x *= sqrt(-1)
        x = mul(&x, &sqm1);
        y = mul(&sq(&r_x), &x);
        let a_ap2 = mul(&a_fe, &a_plus_2);
        if sub(&w, &y).is_zero() {
            if let Some(fffb4) = sqrt(&mul(&sqm1, &a_ap2)) {
                r_x = mul(&r_x, &fffb4);
            }
        } else if let Some(fffb3) = sqrt(&neg(&mul(&sqm1, &a_ap2))) {
            r_x = mul(&r_x, &fffb3);
        }
        sign = true;
    }

    if r_x.is_odd() != sign {
        r_x = neg(&r_x);
    }

    // Projective (X : Y : Z) = (r_x (z+w) : z-w : z+w), then to affine and
    // compressed Ed25519 form.
    let z_coord = add(&z, &w);
    let y_coord = sub(&z, &w);
    let x_coord = mul(&r_x, &z_coord);

    let z_inv = invert(&z_coord);
    let affine_x = mul(&x_coord, &z_inv);
    let affine_y = mul(&y_coord, &z_inv);

    let mut compressed = affine_y.to_bytes();
    if affine_x.is_odd() {
        compressed[31] |= 0x80;
    }

    CompressedEdwardsY(compressed)
        .decompress()
        .expect("elligator2 output is on the curve by construction")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_basics() {
        let mut b = [0u8; 32];
        b[0] = 42;
        let a = Fe::from_bytes(&b);
        assert_eq!(mul(&a, &Fe::ONE), a);
        assert_eq!(mul(&a, &invert(&a)), Fe::ONE);
        assert_eq!(add(&a, &neg(&a)), Fe::ZERO);
        assert_eq!(sub(&Fe::ZERO, &Fe::ONE), Fe::P.wrapping_sub(&Fe::ONE).0);
    }

    #[test]
    fn sqrt_m1_squares_to_minus_one() {
        assert_eq!(sq(&sqrt_m1()), neg(&Fe::ONE));
    }

    #[test]
    fn sqrt_of_square_roundtrips() {
        let mut b = [0u8; 32];
        b[0] = 123;
        b[5] = 7;
        let a = Fe::from_bytes(&b);
        let a2 = sq(&a);
        let root = sqrt(&a2).expect("square must have a root");
        assert_eq!(sq(&root), a2);
    }

    #[test]
    fn map_is_deterministic_and_varies() {
        let p1 = ge_fromfe_frombytes_vartime(&[1u8; 32]);
        let p1_again = ge_fromfe_frombytes_vartime(&[1u8; 32]);
        let p2 = ge_fromfe_frombytes_vartime(&[2u8; 32]);
        assert_eq!(p1.compress(), p1_again.compress());
        assert_ne!(p1.compress(), p2.compress());
    }

    #[test]
    fn map_handles_unreduced_input() {
        // Inputs >= p must be reduced, not rejected.
        let p = ge_fromfe_frombytes_vartime(&[0xff; 32]);
        let _ = p.compress();
    }
}
