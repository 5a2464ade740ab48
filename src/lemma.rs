//! Text-to-lemma conversion
//!
//! Turns page markup or query text into a multiset of dictionary forms,
//! dropping functional parts of speech and malformed tokens. Morphological
//! analysis itself is delegated to the [`crate::morph::Morphology`] trait.

use crate::morph::AnalyzerHandle;
use crate::parse;
use regex::Regex;
use std::collections::HashMap;

/// Part-of-speech markers treated as functional (interjection, preposition,
/// conjunction, particle) and excluded from the index
const FUNCTIONAL_POS: [&str; 4] = ["МЕЖД", "ПРЕДЛ", "СОЮЗ", "ЧАСТ"];

/// Stateless lemmatizer over a shared analyzer handle
pub struct Lemmatizer {
    analyzer: AnalyzerHandle,
    strip_re: Regex,
    word_re: Regex,
}

impl Lemmatizer {
    pub fn new(analyzer: AnalyzerHandle) -> Self {
        // Everything outside the target alphabet plus hyphen/apostrophe is a
        // separator; a token must start with a letter to count as a word.
        let strip_re = Regex::new(r"[^а-яё'\-]+").expect("valid regex");
        let word_re = Regex::new(r"^[а-яё][а-яё'\-]*$").expect("valid regex");
        Self {
            analyzer,
            strip_re,
            word_re,
        }
    }

    /// Lemma multiset of an HTML document's text content
    pub fn lemmas_from_html(&self, html: &str) -> HashMap<String, i64> {
        self.lemmas_from_text(&parse::extract_text(html))
    }

    /// Lemma multiset of plain text: each surviving dictionary form mapped to
    /// its occurrence count
    pub fn lemmas_from_text(&self, text: &str) -> HashMap<String, i64> {
        let lowered = text.to_lowercase();
        let cleaned = self.strip_re.replace_all(&lowered, " ");
        let mut counts = HashMap::new();
        for word in cleaned.split_whitespace() {
            let lemma = self.lemma_of(word);
            if !lemma.is_empty() {
                *counts.entry(lemma).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Dictionary form of a single word; empty when the word is malformed,
    /// unanalyzable or a functional part of speech
    pub fn lemma_of(&self, word: &str) -> String {
        let word = word.to_lowercase();
        if !self.is_word(&word) {
            return String::new();
        }
        let forms = self.analyzer.normal_forms(&word);
        let Some(first) = forms.first() else {
            return String::new();
        };
        let info = self.analyzer.morph_info(&word).to_uppercase();
        if FUNCTIONAL_POS.iter().any(|pos| info.contains(pos)) {
            return String::new();
        }
        first.clone()
    }

    fn is_word(&self, word: &str) -> bool {
        word.chars().count() >= 2 && self.word_re.is_match(word)
    }
}
