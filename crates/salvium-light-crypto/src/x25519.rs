//! X25519 Montgomery ladder over GF(2^255 - 19).
//!
//! CARROT's ECDH uses the ladder WITHOUT RFC 7748 scalar clamping: the
//! protocol only clears bit 255 of the scalar, so `ladder` takes the scalar
//! exactly as given. Constant time in the scalar.
//!
//! Curve: v^2 = u^3 + A u^2 + u with A = 486662, a24 = (A - 2) / 4.

const MASK51: u64 = 0x7_ffff_ffff_ffff;

/// 2p in radix-2^51 so subtraction never underflows.
const TWO_P: [u64; 5] = [
    (0x7_ffff_ffff_ffed) * 2,
    MASK51 * 2,
    MASK51 * 2,
    MASK51 * 2,
    MASK51 * 2,
];

const A24: u64 = 121_666;

/// Field element, radix-2^51, five limbs.
#[derive(Clone, Copy)]
struct Fe51([u64; 5]);

fn carry_chain(t: &mut [u128; 5]) -> Fe51 {
    let mut carry = t[0] >> 51;
    t[0] &= MASK51 as u128;
    t[1] += carry;
    carry = t[1] >> 51;
    t[1] &= MASK51 as u128;
    t[2] += carry;
    carry = t[2] >> 51;
    t[2] &= MASK51 as u128;
    t[3] += carry;
    carry = t[3] >> 51;
    t[3] &= MASK51 as u128;
    t[4] += carry;
    carry = t[4] >> 51;
    t[4] &= MASK51 as u128;
    t[0] += carry * 19;
    carry = t[0] >> 51;
    t[0] &= MASK51 as u128;
    t[1] += carry;
    Fe51([t[0] as u64, t[1] as u64, t[2] as u64, t[3] as u64, t[4] as u64])
}

impl Fe51 {
    const ZERO: Fe51 = Fe51([0; 5]);
    const ONE: Fe51 = Fe51([1, 0, 0, 0, 0]);

    fn from_bytes(bytes: &[u8; 32]) -> Fe51 {
        let load = |src: &[u8]| -> u64 {
            let mut buf = [0u8; 8];
            let len = src.len().min(8);
            buf[..len].copy_from_slice(&src[..len]);
            u64::from_le_bytes(buf)
        };
        Fe51([
            load(&bytes[0..]) & MASK51,
            (load(&bytes[6..]) >> 3) & MASK51,
            (load(&bytes[12..]) >> 6) & MASK51,
            (load(&bytes[19..]) >> 1) & MASK51,
            (load(&bytes[24..]) >> 12) & MASK51,
        ])
    }

    /// Fully reduced 32-byte little-endian encoding.
    fn to_bytes(self) -> [u8; 32] {
        let mut h = self.0;

        // Two carry passes bring every limb under 2^51.
        for _ in 0..2 {
            for i in 0..4 {
                let carry = h[i] >> 51;
                h[i] &= MASK51;
                h[i + 1] += carry;
            }
            let carry = h[4] >> 51;
            h[4] &= MASK51;
            h[0] += carry * 19;
        }

        // Conditional final subtraction of p: h >= p iff h + 19 >= 2^255.
        let mut q = (h[0] + 19) >> 51;
        for limb in h.iter().skip(1) {
            q = (limb + q) >> 51;
        }
        h[0] += 19 * q;
        let mut carry = h[0] >> 51;
        h[0] &= MASK51;
        for limb in h.iter_mut().take(4).skip(1) {
            *limb += carry;
            carry = *limb >> 51;
            *limb &= MASK51;
        }
        h[4] = (h[4] + carry) & MASK51;

        let t0 = h[0] | (h[1] << 51);
        let t1 = (h[1] >> 13) | (h[2] << 38);
        let t2 = (h[2] >> 26) | (h[3] << 25);
        let t3 = (h[3] >> 39) | (h[4] << 12);

        let mut out = [0u8; 32];
        out[0..8].copy_from_slice(&t0.to_le_bytes());
        out[8..16].copy_from_slice(&t1.to_le_bytes());
        out[16..24].copy_from_slice(&t2.to_le_bytes());
        out[24..32].copy_from_slice(&t3.to_le_bytes());
        out
    }

    fn add(a: &Fe51, b: &Fe51) -> Fe51 {
        let mut t = [0u128; 5];
        for i in 0..5 {
            t[i] = (a.0[i] + b.0[i]) as u128;
        }
        carry_chain(&mut t)
    }

    fn sub(a: &Fe51, b: &Fe51) -> Fe51 {
        let mut t = [0u128; 5];
        for i in 0..5 {
            t[i] = (a.0[i] + TWO_P[i] - b.0[i]) as u128;
        }
        carry_chain(&mut t)
    }

    fn mul(a: &Fe51, b: &Fe51) -> Fe51 {
        let (a0, a1, a2, a3, a4) = (
            a.0[0] as u128,
            a.0[1] as u128,
            a.0[2] as u128,
            a.0[3] as u128,
            a.0[4] as u128,
        );
        let (b0, b1, b2, b3, b4) = (
            b.0[0] as u128,
            b.0[1] as u128,
            b.0[2] as u128,
            b.0[3] as u128,
            b.0[4] as u128,
        );

        // Terms past limb 4 wrap with factor 19 (2^255 == 19 mod p).
        let b1_19 = 19 * b1;
        let b2_19 = 19 * b2;
        let b3_19 = 19 * b3;
        let b4_19 = 19 * b4;

        let mut t = [
            a0 * b0 + a1 * b4_19 + a2 * b3_19 + a3 * b2_19 + a4 * b1_19,
            a0 * b1 + a1 * b0 + a2 * b4_19 + a3 * b3_19 + a4 * b2_19,
            a0 * b2 + a1 * b1 + a2 * b0 + a3 * b4_19 + a4 * b3_19,
            a0 * b3 + a1 * b2 + a2 * b1 + a3 * b0 + a4 * b4_19,
            a0 * b4 + a1 * b3 + a2 * b2 + a3 * b1 + a4 * b0,
        ];
        carry_chain(&mut t)
    }

    fn sq(a: &Fe51) -> Fe51 {
        Fe51::mul(a, a)
    }

    fn mul_small(a: &Fe51, c: u64) -> Fe51 {
        let c = c as u128;
        let mut t = [
            a.0[0] as u128 * c,
            a.0[1] as u128 * c,
            a.0[2] as u128 * c,
            a.0[3] as u128 * c,
            a.0[4] as u128 * c,
        ];
        carry_chain(&mut t)
    }

    /// a^(p-2) via the standard 2^255 - 21 addition chain.
    fn invert(a: &Fe51) -> Fe51 {
        let sq_n = |mut x: Fe51, n: usize| {
            for _ in 0..n {
                x = Fe51::sq(&x);
            }
            x
        };

        let z2 = Fe51::sq(a);
        let z9 = Fe51::mul(&sq_n(z2, 2), a);
        let z11 = Fe51::mul(&z9, &z2);
        let z_5_0 = Fe51::mul(&Fe51::sq(&z11), &z9);
        let z_10_0 = Fe51::mul(&sq_n(z_5_0, 5), &z_5_0);
        let z_20_0 = Fe51::mul(&sq_n(z_10_0, 10), &z_10_0);
        let z_40_0 = Fe51::mul(&sq_n(z_20_0, 20), &z_20_0);
        let z_50_0 = Fe51::mul(&sq_n(z_40_0, 10), &z_10_0);
        let z_100_0 = Fe51::mul(&sq_n(z_50_0, 50), &z_50_0);
        let z_200_0 = Fe51::mul(&sq_n(z_100_0, 100), &z_100_0);
        let z_250_0 = Fe51::mul(&sq_n(z_200_0, 50), &z_50_0);
        Fe51::mul(&sq_n(z_250_0, 5), &z11)
    }

    /// Constant-time conditional swap.
    fn cswap(a: &mut Fe51, b: &mut Fe51, swap: u64) {
        let mask = 0u64.wrapping_sub(swap);
        for i in 0..5 {
            let t = mask & (a.0[i] ^ b.0[i]);
            a.0[i] ^= t;
            b.0[i] ^= t;
        }
    }
}

/// Ed25519 compressed point -> X25519 u-coordinate: u = (1 + y) / (1 - y).
pub fn edwards_to_montgomery_u(ed_point: &[u8; 32]) -> [u8; 32] {
    let mut y_bytes = *ed_point;
    y_bytes[31] &= 0x7f;
    let y = Fe51::from_bytes(&y_bytes);

    let num = Fe51::add(&Fe51::ONE, &y);
    let den = Fe51::sub(&Fe51::ONE, &y);
    Fe51::mul(&num, &Fe51::invert(&den)).to_bytes()
}

/// `scalar * point` on the Montgomery curve (RFC 7748 §5 ladder, no
/// clamping). Both arguments are 32-byte little-endian.
pub fn ladder(scalar: &[u8; 32], u_coord: &[u8; 32]) -> [u8; 32] {
    let u = Fe51::from_bytes(u_coord);

    let mut x2 = Fe51::ONE;
    let mut z2 = Fe51::ZERO;
    let mut x3 = u;
    let mut z3 = Fe51::ONE;
    let mut swap: u64 = 0;

    // Bit 255 is cleared by the protocol's clamping; walk 254..=0.
    for pos in (0..=254usize).rev() {
        let bit = ((scalar[pos / 8] >> (pos % 8)) & 1) as u64;
        swap ^= bit;
        Fe51::cswap(&mut x2, &mut x3, swap);
        Fe51::cswap(&mut z2, &mut z3, swap);
        swap = bit;

        let a = Fe51::add(&x2, &z2);
        let aa = Fe51::sq(&a);
        let b = Fe51::sub(&x2, &z2);
        let bb = Fe51::sq(&b);
        let e = Fe51::sub(&aa, &bb);
        let c = Fe51::add(&x3, &z3);
        let d = Fe51::sub(&x3, &z3);
        let da = Fe51::mul(&d, &a);
        let cb = Fe51::mul(&c, &b);
        x3 = Fe51::sq(&Fe51::add(&da, &cb));
        z3 = Fe51::mul(&u, &Fe51::sq(&Fe51::sub(&da, &cb)));
        x2 = Fe51::mul(&aa, &bb);
        z2 = Fe51::mul(&e, &Fe51::add(&bb, &Fe51::mul_small(&e, A24)));
    }

    Fe51::cswap(&mut x2, &mut x3, swap);
    Fe51::cswap(&mut z2, &mut z3, swap);

    Fe51::mul(&x2, &Fe51::invert(&z2)).to_bytes()
}

/// Salvium's scalar preparation for the CARROT ECDH: only bit 255 is
/// cleared (unlike RFC 7748, bits 0-2 and 254 are left alone).
pub fn clamp_salvium(scalar: &[u8; 32]) -> [u8; 32] {
    let mut out = *scalar;
    out[31] &= 0x7f;
    out
}

/// The X25519 base point u = 9.
pub const BASE_U: [u8; 32] = {
    let mut u = [0u8; 32];
    u[0] = 9;
    u
};
