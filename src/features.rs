//! Species and disease derivation from free-text class labels.
//!
//! A class label such as "Tomato Blight" carries both the plant species
//! and the disease. The lexicon splits the two: the species is the first
//! known name found in the text, the disease is whatever remains once
//! every species occurrence is removed. Both derivations run for every
//! record, whether or not a species was recognized.

use crate::record::RecordSet;

/// Ordered list of known plant species names.
///
/// Matching is linear and returns the first hit in list order, so callers
/// must order names deliberately when one species name is a substring of
/// another (e.g. "Corn" before "Sweet Corn" would shadow the latter).
#[derive(Clone, Debug)]
pub struct SpeciesLexicon {
    species: Vec<String>,
}

impl SpeciesLexicon {
    pub fn new(species: Vec<String>) -> Self {
        Self { species }
    }

    /// Returns the first species name occurring in `text` as a whole
    /// word, matched ASCII case-insensitively.
    pub fn extract_species(&self, text: &str) -> Option<&str> {
        self.species
            .iter()
            .find(|name| find_word(text, name).is_some())
            .map(String::as_str)
    }

    /// Returns the disease part of `text`: every species-name occurrence
    /// is removed, the remainder is whitespace-collapsed and title-cased.
    /// An empty remainder yields the sentinel "healthy".
    pub fn extract_disease(&self, text: &str) -> String {
        let mut remainder = text.to_string();
        for name in &self.species {
            remainder = remove_word(&remainder, name);
        }

        let titled = title_case(&remainder);
        // "healthy" is a sentinel, not a disease name; keep it lowercase
        // whether it came from an empty remainder or a literal token.
        if titled.is_empty() || titled.eq_ignore_ascii_case("healthy") {
            "healthy".to_string()
        } else {
            titled
        }
    }

    /// Populates `species` and `disease` on every record in the set.
    pub fn annotate(&self, set: &mut RecordSet) {
        for record in &mut set.records {
            record.species = self.extract_species(&record.class_label).map(String::from);
            record.disease = Some(self.extract_disease(&record.class_label));
        }
    }
}

/// Finds `word` in `text` at a word boundary, ASCII case-insensitively.
/// Returns the byte offset of the match start.
fn find_word(text: &str, word: &str) -> Option<usize> {
    if word.is_empty() {
        return None;
    }

    let bytes = text.as_bytes();
    let pat = word.as_bytes();
    let mut i = 0;

    while i + pat.len() <= bytes.len() {
        if bytes[i..i + pat.len()].eq_ignore_ascii_case(pat)
            && is_boundary(bytes, i)
            && is_boundary(bytes, i + pat.len())
        {
            return Some(i);
        }
        i += text[i..].chars().next().map_or(1, char::len_utf8);
    }

    None
}

/// True if position `at` sits on a word boundary: the start/end of the
/// text, or adjacent to a non-alphanumeric byte.
fn is_boundary(bytes: &[u8], at: usize) -> bool {
    let before = at.checked_sub(1).map(|i| bytes[i]);
    let after = bytes.get(at).copied();

    let word_byte = |b: Option<u8>| b.is_some_and(|b| b.is_ascii_alphanumeric());

    // A boundary needs a word byte on at most one side.
    !(word_byte(before) && word_byte(after))
}

/// Removes every whole-word occurrence of `word` from `text`.
fn remove_word(text: &str, word: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(at) = find_word(rest, word) {
        out.push_str(&rest[..at]);
        rest = &rest[at + word.len()..];
    }
    out.push_str(rest);

    out
}

/// Capitalizes the first letter of each whitespace-separated word and
/// lowercases the rest, joining with single spaces.
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
