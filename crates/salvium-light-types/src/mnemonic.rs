//! 25-word mnemonic seed codec.
//!
//! 24 data words encode the 32-byte seed in groups of three (4 bytes per
//! group, base 1626 with a wrap-around twist); the 25th word is a checksum
//! selected by CRC32 over the unique prefixes of the first 24. Decoding is
//! case-insensitive and whitespace-tolerant.

use crate::wordlists::{truncated, WordList, WORD_LIST_SIZE};
use thiserror::Error;

const N: u32 = WORD_LIST_SIZE as u32;

#[derive(Debug, Error)]
pub enum MnemonicError {
    #[error("expected 25 words, got {0}")]
    WrongWordCount(usize),

    #[error("unknown word \"{word}\" at position {position}")]
    UnknownWord { word: String, position: usize },

    #[error("checksum word mismatch: expected \"{expected}\", got \"{actual}\"")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("inconsistent word group at position {0}")]
    InvalidEncoding(usize),

    #[error("phrase does not match any registered wordlist")]
    LanguageDetectionFailed,
}

/// zlib/PNG polynomial CRC32.
fn crc32(data: &str) -> u32 {
    let mut crc: u32 = 0xffff_ffff;
    for byte in data.bytes() {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xedb8_8320
            } else {
                crc >> 1
            };
        }
    }
    crc ^ 0xffff_ffff
}

/// Checksum word index: CRC32 of the concatenated unique prefixes, mod 24.
fn checksum_index(words: &[&str], prefix_length: usize) -> usize {
    let prefixes: String = words.iter().map(|w| truncated(w, prefix_length)).collect();
    (crc32(&prefixes) % 24) as usize
}

/// Pick the wordlist whose vocabulary covers the phrase.
///
/// Every candidate containing the first word is scored by how many of the
/// first five words it also contains; the best score wins.
pub fn detect_language<'a>(
    phrase: &str,
    lists: &[&'a WordList],
) -> Result<&'a WordList, MnemonicError> {
    let lowered = phrase.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    let first = words.first().ok_or(MnemonicError::LanguageDetectionFailed)?;

    let mut best: Option<(&WordList, usize)> = None;
    for list in lists {
        if !list.contains(first) {
            continue;
        }
        let score = words
            .iter()
            .take(5)
            .filter(|w| list.contains(w))
            .count();
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((list, score));
        }
    }

    best.map(|(l, _)| l)
        .ok_or(MnemonicError::LanguageDetectionFailed)
}

/// Decode a 25-word phrase into the 32-byte seed.
pub fn mnemonic_to_seed(phrase: &str, list: &WordList) -> Result<[u8; 32], MnemonicError> {
    let lowered = phrase.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    if words.len() != 25 {
        return Err(MnemonicError::WrongWordCount(words.len()));
    }

    let mut indices = Vec::with_capacity(25);
    for (i, word) in words.iter().enumerate() {
        let idx = list.position(word).ok_or_else(|| MnemonicError::UnknownWord {
            word: word.to_string(),
            position: i + 1,
        })?;
        indices.push(idx as u32);
    }

    // Checksum word must match the CRC-selected data word (by prefix).
    let expected_at = checksum_index(&words[..24], list.prefix_length);
    let expected = truncated(words[expected_at], list.prefix_length);
    let actual = truncated(words[24], list.prefix_length);
    if expected != actual {
        return Err(MnemonicError::ChecksumMismatch {
            expected: words[expected_at].to_string(),
            actual: words[24].to_string(),
        });
    }

    let mut seed = [0u8; 32];
    for group in 0..8 {
        let w1 = indices[group * 3];
        let w2 = indices[group * 3 + 1];
        let w3 = indices[group * 3 + 2];

        // Undo the wrap-around: each later word stores its delta from the
        // previous one mod N.
        let val = w1 + N * ((N - w1 + w2) % N) + N * N * ((N - w2 + w3) % N);
        if val % N != w1 {
            return Err(MnemonicError::InvalidEncoding(group * 3 + 1));
        }

        seed[group * 4..group * 4 + 4].copy_from_slice(&val.to_le_bytes());
    }

    Ok(seed)
}

/// Encode a 32-byte seed as a 25-word phrase.
pub fn seed_to_mnemonic(seed: &[u8; 32], list: &WordList) -> String {
    let mut words: Vec<&str> = Vec::with_capacity(25);

    for group in 0..8 {
        let val = u32::from_le_bytes(seed[group * 4..group * 4 + 4].try_into().unwrap());
        let w1 = val % N;
        let w2 = (val / N + w1) % N;
        let w3 = (val / N / N + w2) % N;
        words.push(&list.words[w1 as usize]);
        words.push(&list.words[w2 as usize]);
        words.push(&list.words[w3 as usize]);
    }

    words.push(words[checksum_index(&words, list.prefix_length)]);
    words.join(" ")
}

/// Validate a phrase without keeping the seed.
pub fn validate_mnemonic(phrase: &str, list: &WordList) -> Result<(), MnemonicError> {
    mnemonic_to_seed(phrase, list).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wordlists::synthetic;

    #[test]
    fn crc32_known_values() {
        assert_eq!(crc32(""), 0);
        assert_eq!(crc32("123456789"), 0xcbf4_3926);
    }

    #[test]
    fn roundtrip_fixed_seed() {
        let list = synthetic("test");
        let seed = [
            0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66,
            0x77, 0x88, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55,
            0x66, 0x77, 0x88, 0x99,
        ];

        let phrase = seed_to_mnemonic(&seed, &list);
        assert_eq!(phrase.split_whitespace().count(), 25);
        assert_eq!(mnemonic_to_seed(&phrase, &list).unwrap(), seed);
    }

    #[test]
    fn roundtrip_many_seeds() {
        let list = synthetic("test");
        for fill in 0u8..32 {
            let seed = [fill.wrapping_mul(37); 32];
            let phrase = seed_to_mnemonic(&seed, &list);
            assert_eq!(mnemonic_to_seed(&phrase, &list).unwrap(), seed);
        }
    }

    #[test]
    fn case_and_whitespace_tolerant() {
        let list = synthetic("test");
        let seed = [0x5a; 32];
        let phrase = seed_to_mnemonic(&seed, &list);
        let noisy = format!("  {}  ", phrase.to_uppercase().replace(' ', "   "));
        assert_eq!(mnemonic_to_seed(&noisy, &list).unwrap(), seed);
    }

    #[test]
    fn rejects_wrong_count() {
        let list = synthetic("test");
        assert!(matches!(
            mnemonic_to_seed("ab0001 ab0002 ab0003", &list),
            Err(MnemonicError::WrongWordCount(3))
        ));
    }

    #[test]
    fn rejects_unknown_word() {
        let list = synthetic("test");
        let seed = [7u8; 32];
        let mut words: Vec<String> = seed_to_mnemonic(&seed, &list)
            .split_whitespace()
            .map(str::to_string)
            .collect();
        words[3] = "nonsense".into();
        assert!(matches!(
            mnemonic_to_seed(&words.join(" "), &list),
            Err(MnemonicError::UnknownWord { position: 4, .. })
        ));
    }

    #[test]
    fn rejects_altered_checksum() {
        let list = synthetic("test");
        let seed = [0x42; 32];
        let mut words: Vec<String> = seed_to_mnemonic(&seed, &list)
            .split_whitespace()
            .map(str::to_string)
            .collect();
        // Replace the checksum word with a different valid word.
        let current = words[24].clone();
        words[24] = if current == "ab0000" { "ab0001".into() } else { "ab0000".into() };
        assert!(matches!(
            mnemonic_to_seed(&words.join(" "), &list),
            Err(MnemonicError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn language_detection() {
        let ab = synthetic("ab");
        let words: Vec<String> = (0..WORD_LIST_SIZE).map(|i| format!("xy{:04}", i)).collect();
        let xy = WordList::new("xy", 6, &words).unwrap();

        let seed = [9u8; 32];
        let phrase = seed_to_mnemonic(&seed, &ab);
        let detected = detect_language(&phrase, &[&xy, &ab]).unwrap();
        assert_eq!(detected.name, "ab");

        assert!(detect_language("zzz", &[&xy, &ab]).is_err());
    }
}
