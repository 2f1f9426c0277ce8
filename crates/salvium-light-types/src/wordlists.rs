//! Mnemonic wordlist descriptor.
//!
//! The word data itself ships with the embedding application (12 languages in
//! the reference distribution); this module only defines the container and
//! its validity rules: exactly 1626 words, and the per-list prefix length
//! under which all words must stay pairwise distinct (the checksum hashes
//! only word prefixes).

use thiserror::Error;

/// Number of words in every supported list (base-1626 encoding).
pub const WORD_LIST_SIZE: usize = 1626;

#[derive(Debug, Error)]
pub enum WordListError {
    #[error("wordlist must contain {WORD_LIST_SIZE} words, got {0}")]
    WrongSize(usize),

    #[error("prefix length must be at least 1")]
    ZeroPrefix,

    #[error("words \"{0}\" and \"{1}\" collide under prefix length {2}")]
    PrefixCollision(String, String, usize),
}

/// A mnemonic language: its words and the unique-prefix length used for
/// checksum computation and prefix matching.
pub struct WordList {
    pub name: &'static str,
    pub prefix_length: usize,
    pub words: Vec<String>,
}

impl WordList {
    /// Validate and build a wordlist from caller-supplied data.
    pub fn new<S: AsRef<str>>(
        name: &'static str,
        prefix_length: usize,
        words: &[S],
    ) -> Result<Self, WordListError> {
        if words.len() != WORD_LIST_SIZE {
            return Err(WordListError::WrongSize(words.len()));
        }
        if prefix_length == 0 {
            return Err(WordListError::ZeroPrefix);
        }

        let words: Vec<String> = words.iter().map(|w| w.as_ref().to_lowercase()).collect();

        let mut seen = std::collections::HashMap::new();
        for w in &words {
            let prefix = truncated(w, prefix_length).to_string();
            if let Some(prev) = seen.insert(prefix, w.clone()) {
                return Err(WordListError::PrefixCollision(prev, w.clone(), prefix_length));
            }
        }

        Ok(Self {
            name,
            prefix_length,
            words,
        })
    }

    /// Index of `word` in this list, by full word or unique prefix.
    pub fn position(&self, word: &str) -> Option<usize> {
        let word = word.to_lowercase();
        if let Some(i) = self.words.iter().position(|w| *w == word) {
            return Some(i);
        }
        // Fall back to prefix matching (tolerates user-truncated words).
        let prefix = truncated(&word, self.prefix_length);
        if word.len() >= self.prefix_length {
            return self
                .words
                .iter()
                .position(|w| truncated(w, self.prefix_length) == prefix);
        }
        None
    }

    pub fn contains(&self, word: &str) -> bool {
        self.position(word).is_some()
    }
}

/// Character-boundary-safe prefix.
pub(crate) fn truncated(word: &str, len: usize) -> &str {
    match word.char_indices().nth(len) {
        Some((idx, _)) => &word[..idx],
        None => word,
    }
}

/// Deterministic synthetic list for tests and examples: `ab0000`..`ab1625`
/// under prefix length 6 (all prefixes distinct).
pub fn synthetic(name: &'static str) -> WordList {
    let words: Vec<String> = (0..WORD_LIST_SIZE).map(|i| format!("ab{:04}", i)).collect();
    WordList::new(name, 6, &words).expect("synthetic list is valid")
}
