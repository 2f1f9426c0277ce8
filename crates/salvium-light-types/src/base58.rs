//! CryptoNote block-based Base58.
//!
//! Not Bitcoin Base58Check: data is cut into 8-byte blocks, each encoded as
//! exactly 11 characters; the final partial block maps through a fixed size
//! table. Addresses are framed as
//! `varint(tag) || payload || keccak256(varint(tag) || payload)[0..4]`.
//!
//! Reference: salvium/src/common/base58.cpp

use crate::constants::CHECKSUM_SIZE;
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const FULL_BLOCK_SIZE: usize = 8;
const FULL_ENCODED_BLOCK_SIZE: usize = 11;

/// Encoded length per decoded partial-block length.
const ENCODED_BLOCK_SIZES: [usize; 9] = [0, 2, 3, 5, 6, 7, 9, 10, 11];

/// Decoded length per encoded partial-block length; `None` is unreachable by
/// a valid encoding.
fn decoded_block_size(encoded_len: usize) -> Option<usize> {
    ENCODED_BLOCK_SIZES.iter().position(|&e| e == encoded_len)
}

#[derive(Debug, Error)]
pub enum Base58Error {
    #[error("invalid base58 character '{0}'")]
    InvalidCharacter(char),

    #[error("invalid encoded block length {0}")]
    InvalidBlockLength(usize),

    #[error("block value overflows {0}-byte block")]
    Overflow(usize),

    #[error("decoded address too short ({0} bytes)")]
    TooShort(usize),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("truncated or oversized varint")]
    Varint,
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut k = Keccak::v256();
    let mut out = [0u8; 32];
    k.update(data);
    k.finalize(&mut out);
    out
}

const fn reverse_alphabet() -> [i8; 128] {
    let mut table = [-1i8; 128];
    let mut i = 0;
    while i < 58 {
        table[ALPHABET[i] as usize] = i as i8;
        i += 1;
    }
    table
}

static REVERSE_ALPHABET: [i8; 128] = reverse_alphabet();

fn encode_block(block: &[u8], out: &mut String) {
    let encoded_len = ENCODED_BLOCK_SIZES[block.len()];
    let mut num = block.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);

    let mut chars = [ALPHABET[0]; FULL_ENCODED_BLOCK_SIZE];
    let mut i = encoded_len;
    while num > 0 {
        i -= 1;
        chars[i] = ALPHABET[(num % 58) as usize];
        num /= 58;
    }
    for &c in &chars[..encoded_len] {
        out.push(c as char);
    }
}

fn decode_block(block: &[u8], out: &mut Vec<u8>) -> Result<(), Base58Error> {
    let decoded_len =
        decoded_block_size(block.len()).ok_or(Base58Error::InvalidBlockLength(block.len()))?;

    let mut num: u64 = 0;
    for &ch in block {
        let digit = if ch < 128 { REVERSE_ALPHABET[ch as usize] } else { -1 };
        if digit < 0 {
            return Err(Base58Error::InvalidCharacter(ch as char));
        }
        num = num
            .checked_mul(58)
            .and_then(|n| n.checked_add(digit as u64))
            .ok_or(Base58Error::Overflow(decoded_len))?;
    }

    if decoded_len < FULL_BLOCK_SIZE && num >= 1u64 << (8 * decoded_len) {
        return Err(Base58Error::Overflow(decoded_len));
    }

    for shift in (0..decoded_len).rev() {
        out.push((num >> (8 * shift)) as u8);
    }
    Ok(())
}

/// Encode raw bytes.
pub fn encode(data: &[u8]) -> String {
    let full = data.len() / FULL_BLOCK_SIZE;
    let tail = data.len() % FULL_BLOCK_SIZE;
    let mut out =
        String::with_capacity(full * FULL_ENCODED_BLOCK_SIZE + ENCODED_BLOCK_SIZES[tail]);
    for block in data.chunks(FULL_BLOCK_SIZE) {
        encode_block(block, &mut out);
    }
    out
}

/// Decode a Base58 string back to raw bytes.
pub fn decode(encoded: &str) -> Result<Vec<u8>, Base58Error> {
    let bytes = encoded.as_bytes();
    let tail = bytes.len() % FULL_ENCODED_BLOCK_SIZE;
    if tail > 0 && decoded_block_size(tail).is_none() {
        return Err(Base58Error::InvalidBlockLength(tail));
    }

    let mut out = Vec::with_capacity(bytes.len() * FULL_BLOCK_SIZE / FULL_ENCODED_BLOCK_SIZE + 8);
    for block in bytes.chunks(FULL_ENCODED_BLOCK_SIZE) {
        decode_block(block, &mut out)?;
    }
    Ok(out)
}

/// LEB128 unsigned varint.
pub fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(10);
    loop {
        let mut b = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            b |= 0x80;
        }
        bytes.push(b);
        if value == 0 {
            return bytes;
        }
    }
}

/// Decode a varint from the front of `data`. Returns `(value, bytes_read)`.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize), Base58Error> {
    let mut value: u64 = 0;
    for (i, &b) in data.iter().enumerate().take(10) {
        value |= ((b & 0x7f) as u64) << (7 * i as u32);
        if b & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(Base58Error::Varint)
}

/// Frame and encode an address: tag + payload + 4-byte Keccak checksum.
pub fn encode_address(tag: u64, payload: &[u8]) -> String {
    let mut framed = encode_varint(tag);
    framed.extend_from_slice(payload);
    let checksum = keccak256(&framed);
    framed.extend_from_slice(&checksum[..CHECKSUM_SIZE]);
    encode(&framed)
}

/// Decode an address, verify the checksum, and split off the varint tag.
pub fn decode_address(address: &str) -> Result<(u64, Vec<u8>), Base58Error> {
    let framed = decode(address)?;
    if framed.len() <= CHECKSUM_SIZE {
        return Err(Base58Error::TooShort(framed.len()));
    }

    let (body, checksum) = framed.split_at(framed.len() - CHECKSUM_SIZE);
    if &keccak256(body)[..CHECKSUM_SIZE] != checksum {
        return Err(Base58Error::ChecksumMismatch);
    }

    let (tag, read) = decode_varint(body)?;
    Ok((tag, body[read..].to_vec()))
}
