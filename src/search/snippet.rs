//! Snippet extraction for search results

use crate::lemma::Lemmatizer;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Upper bound on snippet length, in chars (markup included)
const SNIPPET_MAX_CHARS: usize = 240;

/// Build a highlighted snippet for a page's plain text.
///
/// The first sentence containing a query lemma is used; every word in it
/// whose dictionary form matches a query lemma is wrapped in `<b>` tags.
/// Oversized sentences are clamped to a window around the first match, with
/// ellipses marking the cut. When nothing matches (the hit came from content
/// no longer present in the text) the head of the text is returned unmarked.
pub(crate) fn build_snippet(
    text: &str,
    query_lemmas: &HashSet<String>,
    lemmatizer: &Lemmatizer,
) -> String {
    for sentence in text.unicode_sentences() {
        if let Some(marked) = mark_matches(sentence.trim(), query_lemmas, lemmatizer) {
            return clamp_around_match(&marked);
        }
    }
    clamp_head(text.trim())
}

/// Wrap every matching word of the sentence in bold tags, keeping the
/// surrounding punctuation outside the markup. None when nothing matched.
fn mark_matches(
    sentence: &str,
    query_lemmas: &HashSet<String>,
    lemmatizer: &Lemmatizer,
) -> Option<String> {
    let mut matched = false;
    let mut out = Vec::new();
    for token in sentence.split_whitespace() {
        let core = token.trim_matches(|c: char| !c.is_alphabetic());
        if !core.is_empty() && query_lemmas.contains(&lemmatizer.lemma_of(core)) {
            matched = true;
            out.push(token.replacen(core, &format!("<b>{}</b>", core), 1));
        } else {
            out.push(token.to_string());
        }
    }
    if matched {
        Some(out.join(" "))
    } else {
        None
    }
}

/// Clamp a marked sentence to the length budget, growing a word window
/// outward from the first highlighted word so the match stays visible
fn clamp_around_match(marked: &str) -> String {
    if marked.chars().count() <= SNIPPET_MAX_CHARS {
        return marked.to_string();
    }
    let words: Vec<&str> = marked.split_whitespace().collect();
    let first = words.iter().position(|w| w.contains("<b>")).unwrap_or(0);

    let mut lo = first;
    let mut hi = first;
    let mut len = words[first].chars().count();
    loop {
        let mut grew = false;
        if hi + 1 < words.len() {
            let extra = words[hi + 1].chars().count() + 1;
            if len + extra <= SNIPPET_MAX_CHARS {
                hi += 1;
                len += extra;
                grew = true;
            }
        }
        if lo > 0 {
            let extra = words[lo - 1].chars().count() + 1;
            if len + extra <= SNIPPET_MAX_CHARS {
                lo -= 1;
                len += extra;
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }

    let mut out = String::new();
    if lo > 0 {
        out.push_str("... ");
    }
    out.push_str(&words[lo..=hi].join(" "));
    if hi + 1 < words.len() {
        out.push_str(" ...");
    }
    out
}

/// Fallback: the beginning of the text, cut at a word boundary
fn clamp_head(text: &str) -> String {
    let mut out = String::new();
    for word in text.split_whitespace() {
        if out.chars().count() + word.chars().count() + 1 > SNIPPET_MAX_CHARS {
            out.push_str(" ...");
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}
