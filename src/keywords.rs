//! # keywords.rs - Length-bucketed keyword sets
//!
//! A [`KeywordSet`] stores the members of one `<list>` from a language
//! definition, bucketed by string length so that lookup at a buffer
//! position can try the longest possible keyword first. Case folding for
//! case-insensitive languages happens at insertion time; the lookup folds
//! the buffer side to match.

use std::collections::{BTreeMap, HashSet};

use crate::utils::{word_char, word_char_before};

/// Identifier of a keyword list in a [`crate::LanguageSet`] registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListId {
    pub lang: usize,
    pub list: usize,
}

/// A set of keywords bucketed by length, remembering the maximum length.
///
/// Lookup walks the buckets in descending length order and returns the
/// length of the longest keyword matching at the probe position, so
/// `elsewhere` is preferred over `else` when both are present.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    max_len: usize,
    buckets: BTreeMap<usize, HashSet<String>>,
}

impl KeywordSet {
    pub fn new() -> Self {
        KeywordSet::default()
    }

    /// Insert a keyword. Returns false when the keyword was already present;
    /// duplicates are tolerated (Kate's stock cpp.xml relies on this).
    pub fn insert(&mut self, key: String) -> bool {
        let len = key.len();
        if len > self.max_len {
            self.max_len = len;
        }
        self.buckets.entry(len).or_default().insert(key)
    }

    /// Number of distinct keywords across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(HashSet::is_empty)
    }

    /// Find the longest keyword matching at `pos` in `buf`.
    ///
    /// With `whole_word` set, the match is rejected when the character
    /// before `pos` is a word character, and buckets whose match would be
    /// followed by a word character are skipped. With `fold_case` set, the
    /// candidate substring is lowercased before lookup (members are folded
    /// at insertion by the loader).
    ///
    /// ## Returns
    ///
    /// `Some(length)` of the longest matching keyword, or None.
    pub fn match_at(&self, buf: &str, pos: usize, whole_word: bool, fold_case: bool) -> Option<usize> {
        let bytes = buf.as_bytes();
        if pos >= bytes.len() {
            return None;
        }
        if whole_word && word_char_before(bytes, pos) {
            return None;
        }

        let max = self.max_len.min(bytes.len() - pos);
        if max == 0 {
            return None;
        }

        for (&len, bucket) in self.buckets.range(1..=max).rev() {
            if whole_word && word_char(bytes, pos + len) {
                continue;
            }
            // Reject probes that would split a multi-byte character
            let Some(candidate) = buf.get(pos..pos + len) else {
                continue;
            };
            let hit = if fold_case {
                bucket.contains(&candidate.to_ascii_lowercase())
            } else {
                bucket.contains(candidate)
            };
            if hit {
                return Some(len);
            }
        }

        None
    }
}
