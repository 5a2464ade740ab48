//! Pluggable morphological analysis
//!
//! The lemmatizer asks an analyzer for the dictionary form of each word and
//! for its part-of-speech description. The analyzer is an external concern
//! behind a trait so a real dictionary backend can be swapped in without
//! touching the indexing pipeline.

use std::sync::Arc;

/// Contract for a morphological analyzer.
///
/// `normal_forms` returns the dictionary forms of a surface word, empty when
/// the word cannot be analyzed. `morph_info` returns an implementation-defined
/// tag text in which part-of-speech markers can be substring-matched.
pub trait Morphology: Send + Sync {
    fn normal_forms(&self, word: &str) -> Vec<String>;
    fn morph_info(&self, word: &str) -> String;
}

/// Shared analyzer handle
pub type AnalyzerHandle = Arc<dyn Morphology>;

/// Pass-through analyzer: every word is its own dictionary form with no
/// part-of-speech information. Used when no dictionary backend is wired in;
/// indexing degrades to surface-form matching.
#[derive(Debug, Default)]
pub struct Passthrough;

impl Morphology for Passthrough {
    fn normal_forms(&self, word: &str) -> Vec<String> {
        vec![word.to_string()]
    }

    fn morph_info(&self, _word: &str) -> String {
        String::new()
    }
}
